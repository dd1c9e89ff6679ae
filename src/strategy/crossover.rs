use super::Strategy;
use crate::error::BotError;
use crate::indicators::calculate_sma;
use crate::models::Signal;
use crate::Result;

/// Closing prices for one evaluation cycle, most recent last
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    closes: Vec<f64>,
}

impl CandleSeries {
    pub fn new(closes: Vec<f64>) -> Self {
        Self { closes }
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Most recent close
    pub fn latest(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    /// The series as it looked one candle earlier
    pub fn without_latest(&self) -> &[f64] {
        match self.closes.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

impl From<Vec<f64>> for CandleSeries {
    fn from(closes: Vec<f64>) -> Self {
        Self::new(closes)
    }
}

/// Fast and slow simple moving averages for one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverages {
    pub fast: f64,
    pub slow: f64,
}

impl MovingAverages {
    /// Average the trailing `fast_window` and `slow_window` closes
    pub fn compute(closes: &[f64], fast_window: usize, slow_window: usize) -> Result<Self> {
        if fast_window == 0 || slow_window == 0 {
            return Err(BotError::Configuration(
                "moving average windows must be positive".to_string(),
            ));
        }

        let need = fast_window.max(slow_window);
        let insufficient = || BotError::InsufficientData {
            have: closes.len(),
            need,
        };

        let fast = calculate_sma(closes, fast_window).ok_or_else(insufficient)?;
        let slow = calculate_sma(closes, slow_window).ok_or_else(insufficient)?;

        Ok(Self { fast, slow })
    }
}

/// Validated pair of averaging windows (fast strictly shorter than slow)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossoverWindows {
    fast: usize,
    slow: usize,
}

impl CrossoverWindows {
    pub fn new(fast: usize, slow: usize) -> Result<Self> {
        if fast == 0 {
            return Err(BotError::Configuration(
                "fast_window must be greater than 0".to_string(),
            ));
        }
        if fast >= slow {
            return Err(BotError::Configuration(format!(
                "fast_window ({}) must be smaller than slow_window ({})",
                fast, slow
            )));
        }
        Ok(Self { fast, slow })
    }

    pub fn fast(&self) -> usize {
        self.fast
    }

    pub fn slow(&self) -> usize {
        self.slow
    }
}

/// Derive the crossover signal for the current cycle
///
/// A cross needs both cycles: `Buy` when fast moves from at-or-below slow to
/// above it, `Sell` for the mirror case. Without previous averages the result
/// is always `Hold`.
pub fn compute_signal(
    previous_averages: Option<MovingAverages>,
    current_series: &CandleSeries,
    fast_window: usize,
    slow_window: usize,
) -> Result<(MovingAverages, Signal)> {
    let current = MovingAverages::compute(current_series.closes(), fast_window, slow_window)?;

    let signal = match previous_averages {
        Some(prev) if prev.fast <= prev.slow && current.fast > current.slow => Signal::Buy,
        Some(prev) if prev.fast >= prev.slow && current.fast < current.slow => Signal::Sell,
        _ => Signal::Hold,
    };

    Ok((current, signal))
}

/// Fast/slow SMA crossover strategy
///
/// Remembers the averages of the previous cycle so each call compares two
/// consecutive evaluations. With `warm_start` the very first call seeds the
/// previous pair from the series minus its latest close instead of holding.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    windows: CrossoverWindows,
    warm_start: bool,
    previous: Option<MovingAverages>,
}

impl SmaCrossover {
    pub fn new(windows: CrossoverWindows) -> Self {
        Self {
            windows,
            warm_start: false,
            previous: None,
        }
    }

    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }

    fn seed_previous(&self, series: &CandleSeries) -> Option<MovingAverages> {
        if !self.warm_start || series.len() <= self.windows.slow() {
            return None;
        }
        MovingAverages::compute(
            series.without_latest(),
            self.windows.fast(),
            self.windows.slow(),
        )
        .ok()
    }
}

impl Strategy for SmaCrossover {
    fn generate_signal(&mut self, series: &CandleSeries) -> Result<Signal> {
        let previous = self.previous.or_else(|| self.seed_previous(series));

        let (current, signal) = compute_signal(
            previous,
            series,
            self.windows.fast(),
            self.windows.slow(),
        )?;

        tracing::info!(
            price = series.latest().unwrap_or_default(),
            fast = current.fast,
            slow = current.slow,
            ?signal,
            "Computed moving averages"
        );

        self.previous = Some(current);
        Ok(signal)
    }

    fn name(&self) -> &str {
        "SmaCrossover"
    }

    fn min_candles_required(&self) -> usize {
        self.windows.slow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(fast: usize, slow: usize) -> CrossoverWindows {
        CrossoverWindows::new(fast, slow).unwrap()
    }

    #[test]
    fn test_windows_require_fast_below_slow() {
        assert!(CrossoverWindows::new(5, 20).is_ok());

        let err = CrossoverWindows::new(20, 20).unwrap_err();
        assert!(matches!(err, BotError::Configuration(_)));
        assert!(err.to_string().contains("must be smaller"));

        assert!(CrossoverWindows::new(25, 7).is_err());
        assert!(CrossoverWindows::new(0, 7).is_err());
    }

    #[test]
    fn test_insufficient_data() {
        for len in 0..4 {
            let series = CandleSeries::new(vec![100.0; len]);
            let result = compute_signal(None, &series, 2, 4);
            assert_eq!(
                result.unwrap_err(),
                BotError::InsufficientData { have: len, need: 4 }
            );
        }
    }

    #[test]
    fn test_exactly_slow_window_is_enough() {
        let series = CandleSeries::new(vec![100.0, 101.0, 102.0, 103.0]);
        let (averages, _) = compute_signal(None, &series, 2, 4).unwrap();
        assert_eq!(averages.fast, 102.5);
        assert_eq!(averages.slow, 101.5);
    }

    #[test]
    fn test_first_cycle_always_holds() {
        // Strong upward shape, but there is no prior cycle to cross from
        let series = CandleSeries::new(vec![10.0, 10.0, 10.0, 20.0]);
        let (_, signal) = compute_signal(None, &series, 2, 4).unwrap();
        assert_eq!(signal, Signal::Hold);

        let series = CandleSeries::new(vec![20.0, 20.0, 20.0, 10.0]);
        let (_, signal) = compute_signal(None, &series, 2, 4).unwrap();
        assert_eq!(signal, Signal::Hold);
    }

    #[test]
    fn test_upward_cross_is_buy() {
        let previous = MovingAverages {
            fast: 10.0,
            slow: 10.0,
        };
        // fast = 11.0, slow = 10.5
        let series = CandleSeries::new(vec![10.0, 10.0, 10.0, 12.0]);
        let (current, signal) = compute_signal(Some(previous), &series, 2, 4).unwrap();

        assert_eq!(current.fast, 11.0);
        assert_eq!(current.slow, 10.5);
        assert_eq!(signal, Signal::Buy);
    }

    #[test]
    fn test_downward_cross_is_sell() {
        let previous = MovingAverages {
            fast: 10.5,
            slow: 10.0,
        };
        // fast = 9.0, slow = 9.5
        let series = CandleSeries::new(vec![10.0, 10.0, 10.0, 8.0]);
        let (_, signal) = compute_signal(Some(previous), &series, 2, 4).unwrap();
        assert_eq!(signal, Signal::Sell);
    }

    #[test]
    fn test_equal_previous_allows_both_directions() {
        let flat = MovingAverages {
            fast: 10.0,
            slow: 10.0,
        };
        let up = CandleSeries::new(vec![10.0, 10.0, 10.0, 12.0]);
        let down = CandleSeries::new(vec![10.0, 10.0, 10.0, 8.0]);

        assert_eq!(compute_signal(Some(flat), &up, 2, 4).unwrap().1, Signal::Buy);
        assert_eq!(
            compute_signal(Some(flat), &down, 2, 4).unwrap().1,
            Signal::Sell
        );
    }

    #[test]
    fn test_fast_above_slow_without_cross_holds() {
        // Previous cycle: fast 101.5 / slow 100.5, current: fast 102.5 / slow 101.5
        let closes = vec![98.0, 99.0, 100.0, 101.0, 102.0, 103.0];
        let series = CandleSeries::new(closes.clone());
        let previous = MovingAverages::compute(series.without_latest(), 2, 4).unwrap();
        assert_eq!(previous.fast, 101.5);
        assert_eq!(previous.slow, 100.5);

        let (current, signal) = compute_signal(Some(previous), &series, 2, 4).unwrap();
        assert!(current.fast > current.slow);
        assert_eq!(signal, Signal::Hold);
    }

    #[test]
    fn test_no_cross_transitions_hold() {
        let below = MovingAverages {
            fast: 9.0,
            slow: 10.0,
        };
        let above = MovingAverages {
            fast: 11.0,
            slow: 10.0,
        };
        let still_below = CandleSeries::new(vec![10.0, 10.0, 10.0, 8.0]);
        let still_above = CandleSeries::new(vec![10.0, 10.0, 10.0, 12.0]);
        let touching = CandleSeries::new(vec![10.0, 10.0, 10.0, 10.0]);

        assert_eq!(
            compute_signal(Some(below), &still_below, 2, 4).unwrap().1,
            Signal::Hold
        );
        assert_eq!(
            compute_signal(Some(above), &still_above, 2, 4).unwrap().1,
            Signal::Hold
        );
        // Meeting the slow average is not a cross
        assert_eq!(
            compute_signal(Some(below), &touching, 2, 4).unwrap().1,
            Signal::Hold
        );
        assert_eq!(
            compute_signal(Some(above), &touching, 2, 4).unwrap().1,
            Signal::Hold
        );
    }

    #[test]
    fn test_strategy_remembers_previous_cycle() {
        let mut strategy = SmaCrossover::new(windows(2, 4));

        let first = CandleSeries::new(vec![10.0, 10.0, 10.0, 10.0]);
        assert_eq!(strategy.generate_signal(&first).unwrap(), Signal::Hold);

        let second = CandleSeries::new(vec![10.0, 10.0, 10.0, 12.0]);
        assert_eq!(strategy.generate_signal(&second).unwrap(), Signal::Buy);

        // Still above: no new signal
        let third = CandleSeries::new(vec![10.0, 10.0, 12.0, 13.0]);
        assert_eq!(strategy.generate_signal(&third).unwrap(), Signal::Hold);
    }

    #[test]
    fn test_strategy_keeps_previous_on_insufficient_data() {
        let mut strategy = SmaCrossover::new(windows(2, 4));
        strategy
            .generate_signal(&CandleSeries::new(vec![10.0; 4]))
            .unwrap();

        let result = strategy.generate_signal(&CandleSeries::new(vec![10.0; 2]));
        assert!(matches!(result, Err(BotError::InsufficientData { .. })));

        // The baseline from the first cycle still counts
        let up = CandleSeries::new(vec![10.0, 10.0, 10.0, 12.0]);
        assert_eq!(strategy.generate_signal(&up).unwrap(), Signal::Buy);
    }

    #[test]
    fn test_warm_start_seeds_from_history() {
        let series = CandleSeries::new(vec![10.0, 10.0, 10.0, 10.0, 12.0]);

        let mut cold = SmaCrossover::new(windows(2, 4));
        assert_eq!(cold.generate_signal(&series).unwrap(), Signal::Hold);

        let mut warm = SmaCrossover::new(windows(2, 4)).with_warm_start(true);
        assert_eq!(warm.generate_signal(&series).unwrap(), Signal::Buy);
    }

    #[test]
    fn test_warm_start_needs_extra_close() {
        // Only slow_window closes: nothing to seed from, behaves like a cold start
        let series = CandleSeries::new(vec![10.0, 10.0, 10.0, 12.0]);
        let mut warm = SmaCrossover::new(windows(2, 4)).with_warm_start(true);
        assert_eq!(warm.generate_signal(&series).unwrap(), Signal::Hold);
    }

    #[test]
    fn test_strategy_metadata() {
        let strategy = SmaCrossover::new(windows(7, 25));
        assert_eq!(strategy.name(), "SmaCrossover");
        assert_eq!(strategy.min_candles_required(), 25);
    }

    #[test]
    fn test_series_helpers() {
        let series = CandleSeries::from(vec![1.0, 2.0, 3.0]);
        assert_eq!(series.latest(), Some(3.0));
        assert_eq!(series.without_latest(), &[1.0, 2.0]);
        assert!(CandleSeries::new(vec![]).without_latest().is_empty());
    }
}
