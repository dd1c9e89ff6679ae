// Trading strategy module
pub mod crossover;

use crate::models::Signal;
use crate::Result;

pub use crossover::{compute_signal, CandleSeries, CrossoverWindows, MovingAverages, SmaCrossover};

/// Base trait for signal generators driven by the poll loop
pub trait Strategy: Send + Sync {
    /// Generate a trading signal from the latest closes (most recent last)
    fn generate_signal(&mut self, series: &CandleSeries) -> Result<Signal>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum closes required before a signal can be computed
    fn min_candles_required(&self) -> usize;
}
