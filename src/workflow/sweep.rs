//! Parameter Sweeps
//!
//! A sweep expands one pattern variable into a numeric range, producing one
//! job per value. Ranges are checked eagerly so that iterating them always
//! terminates.

use serde::{Deserialize, Serialize};

use super::error::MeowError;

/// Upper bound on the number of values a single sweep may expand to.
pub const MAX_SWEEP_VALUES: u64 = 1_000_000;

/// Numeric range definition for a sweeping variable.
///
/// # Example
///
/// ```
/// use meow::workflow::SweepRange;
///
/// let sweep = SweepRange::new(0.0, 1.0, 0.25);
/// assert_eq!(sweep.values("x").unwrap(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SweepRange {
    pub start: f64,
    pub stop: f64,
    pub jump: f64,
}

impl SweepRange {
    pub fn new(start: f64, stop: f64, jump: f64) -> Self {
        Self { start, stop, jump }
    }

    /// Rejects ranges that would never terminate.
    ///
    /// `name` only feeds the error message.
    pub fn validate(&self, name: &str) -> Result<(), MeowError> {
        let fail = |reason: &str| MeowError::Configuration {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if !(self.start.is_finite() && self.stop.is_finite() && self.jump.is_finite()) {
            return Err(fail("start, stop and jump must all be finite numbers"));
        }

        if self.jump == 0.0 {
            return Err(fail(
                "a jump value of zero would never reach the stop value",
            ));
        }

        if self.jump > 0.0 && self.stop <= self.start {
            return Err(fail(
                "a positive jump requires the stop value to be larger than the start",
            ));
        }

        if self.jump < 0.0 && self.stop >= self.start {
            return Err(fail(
                "a negative jump requires the stop value to be smaller than the start",
            ));
        }

        let steps = ((self.stop - self.start) / self.jump).floor();
        if steps >= MAX_SWEEP_VALUES as f64 {
            return Err(fail(&format!(
                "the range expands to more than {} values",
                MAX_SWEEP_VALUES
            )));
        }

        Ok(())
    }

    /// Returns every value of the range, stop inclusive.
    pub fn values(&self, name: &str) -> Result<Vec<f64>, MeowError> {
        self.validate(name)?;

        let mut values = Vec::new();
        let mut step: u64 = 0;
        while step <= MAX_SWEEP_VALUES {
            let value = self.start + step as f64 * self.jump;
            let past_stop = if self.jump > 0.0 {
                value > self.stop
            } else {
                value < self.stop
            };
            if past_stop {
                break;
            }
            values.push(value);
            step += 1;
        }

        Ok(values)
    }
}
