use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

/// Signed money amount represented as **integer cents**.
///
/// Use this type for **all** monetary values in the engine (balances, prices,
/// deposits, settlement shares) to avoid floating-point drift.
///
/// The value is signed:
/// - positive = credit / increase
/// - negative = debit / decrease
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34€");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }

    /// This participant's share of `self` when the pool is divided by weight.
    ///
    /// Computes `self * weight / total_weight` rounded half-up to the nearest
    /// cent, in pure integer arithmetic. Each share is rounded independently;
    /// the sum of all shares may therefore drift from the pool total by up to
    /// half a cent per weight unit, and no correction is applied.
    ///
    /// `total_weight == 0` yields zero.
    #[must_use]
    pub fn proportional_share(self, weight: i64, total_weight: i64) -> MoneyCents {
        if total_weight <= 0 || weight <= 0 {
            return MoneyCents::ZERO;
        }
        let numer = i128::from(self.0) * i128::from(weight);
        let denom = i128::from(total_weight);
        // round-half-up(n / d) == floor((2n + d) / 2d) for n >= 0
        let share = if numer >= 0 {
            (2 * numer + denom) / (2 * denom)
        } else {
            -((2 * -numer + denom) / (2 * denom))
        };
        MoneyCents(share as i64)
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / 100;
        let cents = abs % 100;
        write!(f, "{sign}{units}.{cents:02}€")
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        self.0 += rhs.0;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        self.0 -= rhs.0;
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> Self::Output {
        MoneyCents(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_eur() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00€");
        assert_eq!(MoneyCents::new(1).to_string(), "0.01€");
        assert_eq!(MoneyCents::new(10).to_string(), "0.10€");
        assert_eq!(MoneyCents::new(1050).to_string(), "10.50€");
        assert_eq!(MoneyCents::new(-1050).to_string(), "-10.50€");
    }

    #[test]
    fn share_rounds_half_up() {
        let pool = MoneyCents::new(1000);
        assert_eq!(pool.proportional_share(1, 6).cents(), 167);
        assert_eq!(pool.proportional_share(2, 6).cents(), 333);
        assert_eq!(pool.proportional_share(3, 6).cents(), 500);
    }

    #[test]
    fn share_sum_may_drift_from_pool() {
        let pool = MoneyCents::new(100);
        let shares: i64 = (0..3).map(|_| pool.proportional_share(1, 3).cents()).sum();
        // 33.33 rounds down three times; the missing cent is not redistributed.
        assert_eq!(shares, 99);
    }

    #[test]
    fn share_with_zero_weight_is_zero() {
        assert_eq!(MoneyCents::new(500).proportional_share(1, 0), MoneyCents::ZERO);
        assert_eq!(MoneyCents::new(500).proportional_share(0, 3), MoneyCents::ZERO);
    }
}
