//! Momentum crossover signal
//!
//! The signal is the difference between the mean of a fast and a slow window
//! of mid-price returns. A tick produces a *new* signal when the sign of the
//! freshly computed value differs from the sign of the remembered previous
//! signal, with zero treated as a sign of its own.

use serde::{Deserialize, Serialize};

use crate::rolling::RollingWindow;

/// Tri-state sign of a signal value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    Negative,
    Zero,
    Positive,
}

impl Sign {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Sign::Positive
        } else if value < 0.0 {
            Sign::Negative
        } else {
            Sign::Zero
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Sign::Negative => -1,
            Sign::Zero => 0,
            Sign::Positive => 1,
        }
    }
}

/// Outcome of crossover detection for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossover {
    /// Raw `fast_mean - slow_mean` for this tick
    pub signal: f64,
    pub is_new: bool,
}

impl Crossover {
    pub fn detect(signal: f64, previous: f64) -> Self {
        Crossover {
            signal,
            is_new: Sign::of(signal) != Sign::of(previous),
        }
    }

    /// Value handed to order decisioning: the raw signal on a new-signal
    /// tick, zero otherwise.
    pub fn forwarded(&self) -> f64 {
        if self.is_new {
            self.signal
        } else {
            0.0
        }
    }
}

/// Fast/slow return windows plus the remembered previous signal.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    fast: RollingWindow,
    slow: RollingWindow,
    previous: f64,
}

impl SignalGenerator {
    pub fn new(fast_length: usize, slow_length: usize) -> Self {
        SignalGenerator {
            fast: RollingWindow::new(fast_length),
            slow: RollingWindow::new(slow_length),
            previous: 0.0,
        }
    }

    /// Push `mid - last_mid` into both windows and return the differential.
    pub fn compute(&mut self, last_mid: f64, mid: f64) -> f64 {
        let ret = mid - last_mid;
        self.fast.push(ret);
        self.slow.push(ret);
        self.fast.mean() - self.slow.mean()
    }

    /// Compute the signal for this tick and run crossover detection.
    ///
    /// The previous-signal state becomes the forwarded value, so any tick that
    /// is not a new signal resets it to zero. The tick after that registers as
    /// new again unless its signal is exactly zero.
    pub fn next(&mut self, last_mid: f64, mid: f64) -> Crossover {
        let signal = self.compute(last_mid, mid);
        let crossover = Crossover::detect(signal, self.previous);
        self.previous = crossover.forwarded();
        crossover
    }

    pub fn previous_signal(&self) -> f64 {
        self.previous
    }

    pub fn fast(&self) -> &RollingWindow {
        &self.fast
    }

    pub fn slow(&self) -> &RollingWindow {
        &self.slow
    }
}
