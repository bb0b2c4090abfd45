use bnum::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Amount in the smallest currency unit (wei, satoshis, cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn new(units: u128) -> Self {
        Amount(units)
    }

    /// create from a whole amount of major units with the given decimals
    /// (e.g. `from_major(2, 18)` is 2 ether in wei)
    pub fn from_major(amount: u64, decimals: u32) -> Option<Self> {
        10_u128
            .checked_pow(decimals)
            .and_then(|scale| scale.checked_mul(amount as u128))
            .map(Amount)
    }

    pub const fn units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_mul(self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(factor as u128).map(Amount)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// floor of `percent`% of this amount, computed exactly
    ///
    /// The product is taken in 256 bits, so only a result that does not fit
    /// in 128 bits returns `None`. Negative percentages also return `None`.
    pub fn percentage(&self, percent: Percent) -> Option<Amount> {
        let p = percent.as_decimal().normalize();
        if p.is_sign_negative() && !p.is_zero() {
            return None;
        }

        let mantissa = u128::try_from(p.mantissa()).ok()?;
        let divisor = 10_u128.checked_pow(p.scale())?.checked_mul(100)?;

        let product = U256::from(self.0).checked_mul(U256::from(mantissa))?;
        let floored = product.checked_div(U256::from(divisor))?;
        u128::try_from(floored).ok().map(Amount)
    }

    /// render in major units, dropping trailing zeros of the fraction
    pub fn format_units(&self, decimals: u32) -> String {
        let Some(scale) = 10_u128.checked_pow(decimals) else {
            return self.0.to_string();
        };
        if decimals == 0 {
            return self.0.to_string();
        }

        let whole = self.0 / scale;
        let fraction = self.0 % scale;
        if fraction == 0 {
            return whole.to_string();
        }

        let digits = format!("{:0width$}", fraction, width = decimals as usize);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(Amount)
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Amount(units as u128)
    }
}

impl From<u128> for Amount {
    fn from(units: u128) -> Self {
        Amount(units)
    }
}

/// percentage value, stored as the percent figure itself (5 means 5%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Percent(Decimal);

impl Percent {
    pub const ZERO: Percent = Percent(Decimal::ZERO);

    /// create from decimal (e.g., 2.5 for 2.5%)
    pub fn from_decimal(d: Decimal) -> Self {
        Percent(d)
    }

    /// create from whole percentage (e.g., 5 for 5%)
    pub fn from_percentage(p: u32) -> Self {
        Percent(Decimal::from(p))
    }

    /// create from basis points (e.g., 250 for 2.5%)
    pub fn from_bps(bps: u32) -> Self {
        Percent(Decimal::from(bps) / Decimal::from(100))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// as a fraction (5% -> 0.05)
    pub fn as_fraction(&self) -> Decimal {
        self.0 / Decimal::from(100)
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

impl From<Decimal> for Percent {
    fn from(d: Decimal) -> Self {
        Percent::from_decimal(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_whole_percentage() {
        let principal = Amount::new(1_000);
        assert_eq!(principal.percentage(Percent::from_percentage(5)), Some(Amount::new(50)));
        assert_eq!(principal.percentage(Percent::from_percentage(10)), Some(Amount::new(100)));
    }

    #[test]
    fn test_percentage_floors() {
        // 7% of 999 = 69.93
        let amount = Amount::new(999);
        assert_eq!(amount.percentage(Percent::from_percentage(7)), Some(Amount::new(69)));

        // 2.5% of 101 = 2.525
        let fractional = Percent::from_decimal(dec!(2.5));
        assert_eq!(Amount::new(101).percentage(fractional), Some(Amount::new(2)));
    }

    #[test]
    fn test_percentage_of_wei_amounts() {
        // 3 ether at 5% is 0.15 ether
        let principal = Amount::from_major(3, 18).unwrap();
        let interest = principal.percentage(Percent::from_percentage(5)).unwrap();
        assert_eq!(interest, Amount::new(150_000_000_000_000_000));
        assert_eq!(interest.format_units(18), "0.15");
    }

    #[test]
    fn test_high_scale_rate_on_wei_amounts() {
        // 1/3 % of one ether
        let third = Percent::from_decimal(dec!(100) / dec!(300));
        let principal = Amount::from_major(1, 18).unwrap();
        assert_eq!(principal.percentage(third), Some(Amount::new(3_333_333_333_333_333)));

        let large = Amount::from_major(1_000_000_000, 18).unwrap();
        assert_eq!(large.percentage(third), Some(Amount::new(3_333_333_333_333_333_333_333_333)));
    }

    #[test]
    fn test_negative_percentage_rejected() {
        let negative = Percent::from_decimal(dec!(-1));
        assert!(negative.is_negative());
        assert_eq!(Amount::new(100).percentage(negative), None);
    }

    #[test]
    fn test_percentage_overflow_is_none() {
        let huge = Amount::new(u128::MAX);
        assert_eq!(huge.percentage(Percent::from_percentage(500)), None);
        assert_eq!(huge.percentage(Percent::ZERO), Some(Amount::ZERO));
    }

    #[test]
    fn test_format_units() {
        assert_eq!(Amount::new(1_500_000_000_000_000_000).format_units(18), "1.5");
        assert_eq!(Amount::new(2_000_000_000_000_000_000).format_units(18), "2");
        assert_eq!(Amount::new(1).format_units(18), "0.000000000000000001");
        assert_eq!(Amount::new(42).format_units(0), "42");
    }

    #[test]
    fn test_bps_and_display() {
        assert_eq!(Percent::from_bps(250).as_decimal(), dec!(2.5));
        assert_eq!(Percent::from_percentage(5).to_string(), "5%");
        assert_eq!(Percent::from_percentage(5).as_fraction(), dec!(0.05));
    }
}
