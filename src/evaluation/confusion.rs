// Confusion matrix for the authentic-vs-fraud decision.
//
// Ground truth is whether a sample was written by the author (own) or by
// someone else (other). The positive class is fraud: a true positive is an
// other-author sample the model flagged.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Other-author samples flagged as fraud.
    pub fraud_flagged: u64,
    /// Other-author samples passed as authentic.
    pub fraud_missed: u64,
    /// Own samples flagged as fraud.
    pub false_alarms: u64,
    /// Own samples passed as authentic.
    pub genuine_passed: u64,
}

fn ratio(num: u64, den: u64) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

impl ConfusionMatrix {
    /// Tally predictions (`true` = flagged) for own and other samples.
    pub fn from_predictions(own_flags: &[bool], other_flags: &[bool]) -> Self {
        let mut m = Self::default();
        for &flagged in own_flags {
            if flagged {
                m.false_alarms += 1;
            } else {
                m.genuine_passed += 1;
            }
        }
        for &flagged in other_flags {
            if flagged {
                m.fraud_flagged += 1;
            } else {
                m.fraud_missed += 1;
            }
        }
        m
    }

    pub fn total(&self) -> u64 {
        self.fraud_flagged + self.fraud_missed + self.false_alarms + self.genuine_passed
    }

    /// Fraction of other-author samples caught. `None` without any.
    pub fn true_positive_rate(&self) -> Option<f64> {
        ratio(self.fraud_flagged, self.fraud_flagged + self.fraud_missed)
    }

    /// Fraction of own samples wrongly flagged. `None` without any.
    pub fn false_positive_rate(&self) -> Option<f64> {
        ratio(self.false_alarms, self.false_alarms + self.genuine_passed)
    }

    /// Of everything flagged, how much was really someone else.
    pub fn fraud_precision(&self) -> Option<f64> {
        ratio(self.fraud_flagged, self.fraud_flagged + self.false_alarms)
    }

    /// Same as the true positive rate.
    pub fn fraud_recall(&self) -> Option<f64> {
        self.true_positive_rate()
    }

    /// Of everything passed, how much was really the author.
    pub fn genuine_precision(&self) -> Option<f64> {
        ratio(self.genuine_passed, self.genuine_passed + self.fraud_missed)
    }

    /// Fraction of own samples passed.
    pub fn genuine_recall(&self) -> Option<f64> {
        ratio(self.genuine_passed, self.genuine_passed + self.false_alarms)
    }

    /// Rows are truth (other, own); columns are prediction (fraud, authentic).
    pub fn as_array(&self) -> [[u64; 2]; 2] {
        [
            [self.fraud_flagged, self.fraud_missed],
            [self.false_alarms, self.genuine_passed],
        ]
    }
}

impl Add for ConfusionMatrix {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            fraud_flagged: self.fraud_flagged + rhs.fraud_flagged,
            fraud_missed: self.fraud_missed + rhs.fraud_missed,
            false_alarms: self.false_alarms + rhs.false_alarms,
            genuine_passed: self.genuine_passed + rhs.genuine_passed,
        }
    }
}

impl AddAssign for ConfusionMatrix {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [[a, b], [c, d]] = self.as_array();
        writeln!(f, "{:>8} {:>8} {:>8}", "", "fraud", "genuine")?;
        writeln!(f, "{:>8} {:>8} {:>8}", "other", a, b)?;
        write!(f, "{:>8} {:>8} {:>8}", "own", c, d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_predictions() {
        let m = ConfusionMatrix::from_predictions(&[false, false, true], &[true, false]);
        assert_eq!(m.genuine_passed, 2);
        assert_eq!(m.false_alarms, 1);
        assert_eq!(m.fraud_flagged, 1);
        assert_eq!(m.fraud_missed, 1);
        assert_eq!(m.total(), 5);
    }

    #[test]
    fn test_rates() {
        let m = ConfusionMatrix {
            fraud_flagged: 3,
            fraud_missed: 1,
            false_alarms: 1,
            genuine_passed: 3,
        };
        assert_eq!(m.true_positive_rate(), Some(0.75));
        assert_eq!(m.false_positive_rate(), Some(0.25));
        assert_eq!(m.fraud_precision(), Some(0.75));
        assert_eq!(m.genuine_recall(), Some(0.75));
    }

    #[test]
    fn test_empty_rates_are_none() {
        let m = ConfusionMatrix::default();
        assert!(m.true_positive_rate().is_none());
        assert!(m.false_positive_rate().is_none());
    }

    #[test]
    fn test_add() {
        let a = ConfusionMatrix::from_predictions(&[true], &[true]);
        let mut b = ConfusionMatrix::from_predictions(&[false], &[false]);
        b += a;
        assert_eq!(b.as_array(), [[1, 1], [1, 1]]);
    }
}
