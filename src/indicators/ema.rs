// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first EMA value is the first input itself. The average is considered
// stable once `period` inputs have been folded in.
// =============================================================================

/// Explicit, per-call EMA accumulator.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
    value: Option<f64>,
    samples: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            value: None,
            samples: 0,
        }
    }

    /// Fold one input into the average and return the updated value.
    pub fn update(&mut self, input: f64) -> f64 {
        let next = match self.value {
            None => input,
            Some(prev) => input * self.multiplier + prev * (1.0 - self.multiplier),
        };
        self.value = Some(next);
        self.samples += 1;
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_stable(&self) -> bool {
        self.samples >= self.period
    }
}

/// EMA value after each input of `values`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut ema = Ema::new(period);
    values.iter().map(|&v| ema.update(v)).collect()
}
