use std::fmt;
use serde_derive::{Deserialize, Serialize};
use crate::clock::{AsServerTimingDuration, Timestamp};

/// An interval that has been started but not yet closed.
#[derive(Debug, Clone)]
pub(crate) struct PendingInterval {
    pub started_at: Timestamp,
    pub description: Option<String>,
}

impl PendingInterval {
    /// Closes the interval at `ended_at`.
    pub(crate) fn finish(self, name: String, ended_at: Timestamp) -> FinishedInterval {
        let duration_ms = ended_at
            .saturating_duration_since(self.started_at)
            .as_server_timing_duration();
        FinishedInterval{
            name,
            duration_ms,
            description: self.description,
        }
    }
}

/// A named interval with a recorded duration in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FinishedInterval {
    pub name: String,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FinishedInterval {
    pub fn new(name: impl Into<String>, duration_ms: f64, description: Option<String>) -> Self {
        Self{
            name: name.into(),
            duration_ms,
            description,
        }
    }

    /// Formats this interval as a single `Server-Timing` entry with `precision` fractional digits.
    #[inline]
    pub fn token(&self, precision: usize) -> IntervalToken<'_> {
        IntervalToken{
            interval: self,
            precision,
        }
    }
}

pub struct IntervalToken<'a> {
    interval: &'a FinishedInterval,
    precision: usize,
}

impl fmt::Display for IntervalToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interval = self.interval;
        write!(f, "{};dur={}", interval.name, FixedDuration{value: interval.duration_ms, precision: self.precision})?;
        match interval.description.as_deref() {
            Some(description) if !description.is_empty() => write!(f, r#";desc="{description}""#),
            _ => Ok(()),
        }
    }
}

/// Fixed-point rendering of a duration in the format browsers expect in `dur=`.
///
/// Exact ties round away from zero, non-finite values print as `NaN`/`Infinity` and magnitudes
/// of 1e21 or more switch to exponent notation with an explicit `+`.
struct FixedDuration {
    value: f64,
    precision: usize,
}

impl fmt::Display for FixedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value;
        if value.is_nan() {
            return f.write_str("NaN");
        }
        if value.is_infinite() {
            return f.write_str(if value < 0.0 { "-Infinity" } else { "Infinity" });
        }
        if value.abs() >= 1e21 {
            return f.write_str(&format!("{value:e}").replacen('e', "e+", 1));
        }
        // -0.0 would otherwise print with a sign
        if value == 0.0 {
            return write!(f, "{:.*}", self.precision, 0.0f64);
        }
        let value = if is_tie(value, self.precision) {
            // std rounds exact ties to even, step one ulp away from zero to round them up instead
            f64::from_bits(value.abs().to_bits() + 1).copysign(value)
        } else {
            value
        };
        write!(f, "{:.*}", self.precision, value)
    }
}

/// Whether `value` lies exactly halfway between two multiples of `10^-precision`.
fn is_tie(value: f64, precision: usize) -> bool {
    let bits = value.abs().to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = match exponent {
        0 => (fraction, -1074),
        _ => (fraction | (1u64 << 52), exponent - 1075),
    };
    if mantissa == 0 || exponent >= 0 {
        return false;
    }
    // value * 10^precision = odd * 5^precision * 2^(zeros + precision + exponent), which has a
    // fractional part of exactly one half only when that power of two is 2^-1
    let Ok(precision) = i64::try_from(precision) else {
        return false;
    };
    mantissa.trailing_zeros() as i64 + precision + 1 == -exponent
}
