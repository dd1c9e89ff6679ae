/// Calculate Simple Moving Average (SMA) over the trailing `period` prices
///
/// Returns `None` when there are fewer than `period` prices or `period` is zero.
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices[prices.len() - period..].iter().sum();
    Some(sum / period as f64)
}
