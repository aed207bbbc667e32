//! Historical-simulation Value-at-Risk

use std::collections::VecDeque;

/// VaR of a return sample at `confidence`, as a positive loss fraction
///
/// Sorts ascending and takes the `floor((1 - confidence) * n)`-th return.
/// Absent for an empty sample.
pub fn historical_var(returns: &[f64], confidence: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let index = ((1.0 - confidence) * sorted.len() as f64) as usize;
    Some(-sorted[index.min(sorted.len() - 1)])
}

/// Expected shortfall: mean loss of the tail at and below the VaR cut
pub fn historical_cvar(returns: &[f64], confidence: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let cutoff = (((1.0 - confidence) * sorted.len() as f64) as usize).min(sorted.len() - 1);
    let tail = &sorted[..=cutoff];
    Some(-tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Rolling return window with VaR and CVaR queries
pub struct VarCalculator {
    returns: VecDeque<f64>,
    lookback: usize,
}

impl VarCalculator {
    /// Window keeping the most recent `lookback` returns
    pub fn new(lookback: usize) -> Self {
        Self {
            returns: VecDeque::with_capacity(lookback),
            lookback,
        }
    }

    /// Append a per-period return, evicting the oldest past the lookback
    pub fn add_return(&mut self, period_return: f64) {
        self.returns.push_back(period_return);
        while self.returns.len() > self.lookback {
            self.returns.pop_front();
        }
    }

    /// Samples currently in the window
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// VaR at `confidence`; zero while the window is empty
    pub fn var(&self, confidence: f64) -> f64 {
        let returns: Vec<f64> = self.returns.iter().copied().collect();
        historical_var(&returns, confidence).unwrap_or(0.0)
    }

    /// CVaR (expected shortfall) at `confidence`; zero while empty
    pub fn cvar(&self, confidence: f64) -> f64 {
        let returns: Vec<f64> = self.returns.iter().copied().collect();
        historical_cvar(&returns, confidence).unwrap_or(0.0)
    }
}
