use {
    super::error::PipelineError,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Amount in minor currency units (kopecks, cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub const ZERO: MoneyAmount = MoneyAmount(0);

    pub fn new(minor: i64) -> Result<Self, PipelineError> {
        if minor < 0 {
            return Err(PipelineError::Validation(format!(
                "MoneyAmount cannot be negative, got: {minor}"
            )));
        }
        Ok(Self(minor))
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    pub fn checked_mul(self, factor: i64) -> Option<MoneyAmount> {
        if factor < 0 {
            return None;
        }
        self.0.checked_mul(factor).map(MoneyAmount)
    }

    /// Whole major units, truncated. Used where a vendor or a human-facing
    /// message expects rubles rather than kopecks.
    pub fn major_units(&self) -> i64 {
        self.0 / 100
    }

    /// Parses a vendor decimal string (`"100.00"`, `"99.5"`, `"12"`) into
    /// minor units without going through floating point.
    pub fn parse_decimal(raw: &str) -> Result<Self, PipelineError> {
        let s = raw.trim();
        let invalid = || PipelineError::Validation(format!("invalid decimal amount: {raw:?}"));

        if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
            return Err(invalid());
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        // Anything past the second fractional digit must be zero padding.
        if frac.len() > 2 && frac[2..].bytes().any(|b| b != b'0') {
            return Err(PipelineError::Validation(format!(
                "amount has sub-minor precision: {raw:?}"
            )));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let cents: i64 = match frac.len() {
            0 => 0,
            1 => i64::from(frac.as_bytes()[0] - b'0') * 10,
            _ => frac[..2].parse().map_err(|_| invalid())?,
        };

        whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .map(MoneyAmount)
            .ok_or_else(|| PipelineError::Validation(format!("amount overflows: {raw:?}")))
    }

    /// `10000` → `"100.00"`.
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Rub,
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rub => "RUB",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Currency {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_uppercase().as_str() {
            "RUB" => Ok(Self::Rub),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            _ => Err(PipelineError::Validation(format!("unknown currency: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: MoneyAmount,
    currency: Currency,
}

impl Money {
    pub fn new(amount: MoneyAmount, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn amount(&self) -> MoneyAmount {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }
}

/// Wire shape shared by every provider that speaks decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecimalAmount {
    pub value: String,
    pub currency: String,
}

impl From<Money> for DecimalAmount {
    fn from(m: Money) -> Self {
        Self {
            value: m.amount().to_decimal_string(),
            currency: m.currency().as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_decimal_places() {
        assert_eq!(MoneyAmount::parse_decimal("100.00").unwrap().minor_units(), 10000);
        assert_eq!(MoneyAmount::parse_decimal("0.01").unwrap().minor_units(), 1);
    }

    #[test]
    fn parses_short_forms() {
        assert_eq!(MoneyAmount::parse_decimal("12").unwrap().minor_units(), 1200);
        assert_eq!(MoneyAmount::parse_decimal("99.5").unwrap().minor_units(), 9950);
        assert_eq!(MoneyAmount::parse_decimal(".5").unwrap().minor_units(), 50);
        assert_eq!(MoneyAmount::parse_decimal("7.").unwrap().minor_units(), 700);
    }

    #[test]
    fn trailing_zero_padding_is_accepted() {
        assert_eq!(MoneyAmount::parse_decimal("1.5000").unwrap().minor_units(), 150);
    }

    #[test]
    fn rejects_garbage_and_sub_minor_precision() {
        for bad in ["", ".", "-1.00", "+1", "1,00", "abc", "1.2.3", "1.005"] {
            assert!(MoneyAmount::parse_decimal(bad).is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn formats_back_to_decimal() {
        assert_eq!(MoneyAmount::new(10000).unwrap().to_decimal_string(), "100.00");
        assert_eq!(MoneyAmount::new(5).unwrap().to_decimal_string(), "0.05");
        assert_eq!(MoneyAmount::ZERO.to_decimal_string(), "0.00");
    }

    #[test]
    fn negative_amount_is_rejected() {
        assert!(MoneyAmount::new(-1).is_err());
    }

    #[test]
    fn currency_parse_is_case_insensitive() {
        assert_eq!(Currency::try_from("rub").unwrap(), Currency::Rub);
        assert_eq!(Currency::try_from("EUR").unwrap(), Currency::Eur);
        assert!(Currency::try_from("jpy").is_err());
    }
}
