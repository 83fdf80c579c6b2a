//! Speedup accounting for accelerated-vs-reference runs.

use serde::{Deserialize, Serialize};

/// Ratio of reference time to accelerated time. `None` when the accelerated time is not
/// strictly positive, so a zero measurement never divides.
pub fn speedup(reference_secs: f64, accelerated_secs: f64) -> Option<f64> {
    if accelerated_secs > 0.0 {
        Some(reference_secs / accelerated_secs)
    } else {
        None
    }
}

/// Running totals over passing cases, owned by the run loop and threaded through it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    /// Cases whose outputs matched.
    pub passed: usize,
    /// Passing cases with a usable (non-zero) accelerated time; only these enter the time totals.
    pub timed: usize,
    pub total_accelerated_secs: f64,
    pub total_reference_secs: f64,
}

impl RunTotals {
    /// Records a passing case and returns its speedup, if defined.
    pub fn record_pass(&mut self, accelerated_secs: f64, reference_secs: f64) -> Option<f64> {
        self.passed += 1;
        let ratio = speedup(reference_secs, accelerated_secs)?;
        self.timed += 1;
        self.total_accelerated_secs += accelerated_secs;
        self.total_reference_secs += reference_secs;
        Some(ratio)
    }

    pub fn aggregate_speedup(&self) -> Option<f64> {
        if self.timed == 0 {
            return None;
        }
        speedup(self.total_reference_secs, self.total_accelerated_secs)
    }
}

/// Absorbs binary rounding below a hundredth (1.15 is stored as 1.1499999...).
const TRUNCATION_SLACK: f64 = 1e-9;

/// Formats a speedup the way `bc` with `scale=2` prints it: truncated, two decimals.
pub fn format_speedup(ratio: Option<f64>) -> String {
    match ratio {
        Some(value) if value.is_finite() => {
            let hundredths = (value * 100.0 + TRUNCATION_SLACK).trunc();
            format!("{:.2}", hundredths / 100.0)
        }
        _ => "N/A".to_string(),
    }
}

/// `1234567` -> `"1,234,567"`.
pub fn format_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_accelerated_time_has_no_speedup() {
        assert_eq!(speedup(1.0, 0.0), None);
        assert_eq!(speedup(3.0, 1.5), Some(2.0));
    }

    #[test]
    fn totals_skip_untimed_passes() {
        let mut totals = RunTotals::default();
        assert_eq!(totals.record_pass(0.5, 2.0), Some(4.0));
        assert_eq!(totals.record_pass(0.0, 1.0), None);
        assert_eq!(totals.record_pass(1.5, 2.0), Some(2.0 / 1.5));

        assert_eq!(totals.passed, 3);
        assert_eq!(totals.timed, 2);
        assert_eq!(totals.total_accelerated_secs, 2.0);
        assert_eq!(totals.total_reference_secs, 4.0);
        assert_eq!(totals.aggregate_speedup(), Some(2.0));
    }

    #[test]
    fn empty_totals_have_no_aggregate() {
        let mut totals = RunTotals::default();
        assert_eq!(totals.aggregate_speedup(), None);
        totals.record_pass(0.0, 5.0);
        assert_eq!(totals.aggregate_speedup(), None);
    }

    #[test]
    fn speedup_is_truncated_like_bc() {
        assert_eq!(format_speedup(Some(2.0 / 3.0)), "0.66");
        assert_eq!(format_speedup(Some(12.0)), "12.00");
        assert_eq!(format_speedup(None), "N/A");
    }

    #[test]
    fn decimal_hundredths_survive_binary_rounding() {
        assert_eq!(format_speedup(Some(1.15)), "1.15");
        assert_eq!(format_speedup(speedup(2.3, 2.0)), "1.15");
        assert_eq!(format_speedup(Some(0.29)), "0.29");
        assert_eq!(format_speedup(Some(1.149)), "1.14");
        assert_eq!(format_speedup(Some(1.0)), "1.00");
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1_000), "1,000");
        assert_eq!(format_thousands(100_000_000), "100,000,000");
    }
}
