use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::format::to_fixed;

/// A metric the producer may emit either as a JSON number or as a string
/// (`"frag": "0.250000"`, `"speed": "1000"`).
///
/// Numeric strings coerce on the way in. Anything else is kept verbatim so the
/// row survives and only the consumer of that one field sees the problem.
#[derive(Clone, Debug, PartialEq)]
pub enum Numeric {
    Number(f64),
    Malformed(String),
}

impl Numeric {
    pub fn value(&self) -> Option<f64> {
        match self {
            Numeric::Number(v) => Some(*v),
            Numeric::Malformed(_) => None,
        }
    }

    /// Ordering key for descending sorts: malformed values rank below every
    /// number so comparators stay a total order.
    pub fn sort_key(&self) -> f64 {
        match self.value() {
            Some(v) if !v.is_nan() => v,
            _ => f64::NEG_INFINITY,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            // Mirrors `"" * 1 === 0` on the dashboard side.
            return Numeric::Number(0.0);
        }
        match trimmed.parse::<f64>() {
            Ok(v) => Numeric::Number(v),
            Err(_) => Numeric::Malformed(raw.to_string()),
        }
    }
}

impl Default for Numeric {
    fn default() -> Self {
        Numeric::Number(0.0)
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeric::Number(v) => write!(f, "{v}"),
            Numeric::Malformed(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Numeric::Number(v) => serialize_number(v, serializer),
            Numeric::Malformed(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for Numeric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NumericVisitor;

        impl Visitor<'_> for NumericVisitor {
            type Value = Numeric;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number or a numeric string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Numeric, E> {
                Ok(Numeric::Number(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Numeric, E> {
                Ok(Numeric::Number(v as f64))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Numeric, E> {
                Ok(Numeric::Number(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Numeric, E> {
                Ok(Numeric::parse(v))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Numeric, E> {
                Ok(Numeric::Number(0.0))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Numeric, E> {
                Ok(Numeric::Number(if v { 1.0 } else { 0.0 }))
            }
        }

        deserializer.deserialize_any(NumericVisitor)
    }
}

/// Integer or float slot a raw counter can be coerced into.
pub trait Counter: Copy + Default {
    fn from_f64(v: f64) -> Self;
}

// `as` saturates at the type bounds and maps NaN to zero.
macro_rules! counter {
    ($($t:ty),*) => {
        $(impl Counter for $t {
            fn from_f64(v: f64) -> Self {
                v as $t
            }
        })*
    };
}

counter!(u32, u64, i32, i64, f64);

/// `deserialize_with` for counters. A value that is not a number (or a
/// numeric string) reads as zero instead of failing the whole sample.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Counter,
{
    let raw = Value::deserialize(deserializer)?;
    let parsed = match &raw {
        Value::Number(n) => n.as_f64().map(Numeric::Number),
        Value::String(s) => Some(Numeric::parse(s)),
        Value::Bool(b) => Some(Numeric::Number(if *b { 1.0 } else { 0.0 })),
        Value::Null => Some(Numeric::default()),
        Value::Array(_) | Value::Object(_) => None,
    };
    match parsed.as_ref().and_then(Numeric::value) {
        Some(v) => Ok(T::from_f64(v)),
        None => {
            tracing::debug!(value = %raw, "non-numeric counter read as zero");
            Ok(T::default())
        }
    }
}

/// A number rounded for display the way the dashboard templates expect it:
/// a fixed count of decimals, serialized as a string.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fixed {
    value: f64,
    digits: usize,
}

impl Fixed {
    pub fn new(value: f64, digits: usize) -> Self {
        Self { value, digits }
    }

    /// Percentages above 100 collapse to a bare `100`.
    pub fn clamped_percent(value: f64, digits: usize) -> Self {
        let rounded = Self::new(value, digits);
        if rounded.rounded() > 100.0 {
            Self::new(100.0, 0)
        } else {
            rounded
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// The value as it reads after rounding.
    pub fn rounded(&self) -> f64 {
        self.to_string().parse().unwrap_or(self.value)
    }

    pub fn digits(&self) -> usize {
        self.digits
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_fixed(self.value, self.digits))
    }
}

impl Serialize for Fixed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Integral values go out as JSON integers so passthrough fields keep their
/// original shape.
pub fn serialize_number<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        serializer.serialize_i64(*v as i64)
    } else {
        serializer.serialize_f64(*v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_accepts_numbers_and_numeric_strings() {
        let parsed: Vec<Numeric> =
            serde_json::from_str(r#"[12, 1.5, "0.250000", " 42 ", "", null]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                Numeric::Number(12.0),
                Numeric::Number(1.5),
                Numeric::Number(0.25),
                Numeric::Number(42.0),
                Numeric::Number(0.0),
                Numeric::Number(0.0),
            ]
        );
    }

    #[test]
    fn numeric_keeps_malformed_strings() {
        let parsed: Numeric = serde_json::from_str(r#""n/a""#).unwrap();
        assert_eq!(parsed, Numeric::Malformed("n/a".to_string()));
        assert_eq!(parsed.value(), None);
        assert_eq!(parsed.sort_key(), f64::NEG_INFINITY);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#""n/a""#);
    }

    #[test]
    fn numeric_serializes_integral_values_as_integers() {
        assert_eq!(serde_json::to_string(&Numeric::Number(1000.0)).unwrap(), "1000");
        assert_eq!(serde_json::to_string(&Numeric::Number(2.5)).unwrap(), "2.5");
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Counters {
        #[serde(deserialize_with = "lenient")]
        ticks: u64,
        #[serde(deserialize_with = "lenient")]
        grow: i64,
        #[serde(deserialize_with = "lenient")]
        avg: f64,
    }

    #[test]
    fn lenient_counters_coerce_or_fall_back_to_zero() {
        let c: Counters = serde_json::from_str(r#"{"ticks": "17", "grow": -3, "avg": "0.5"}"#).unwrap();
        assert_eq!((c.ticks, c.grow, c.avg), (17, -3, 0.5));

        let c: Counters = serde_json::from_str(r#"{"ticks": -1, "grow": 1.9, "avg": "n/a"}"#).unwrap();
        assert_eq!((c.ticks, c.grow, c.avg), (0, 1, 0.0));

        let c: Counters = serde_json::from_str(r#"{"ticks": [1], "grow": {"a": 1}}"#).unwrap();
        assert_eq!((c.ticks, c.grow, c.avg), (0, 0, 0.0));
    }

    #[test]
    fn fixed_rounds_like_to_fixed() {
        assert_eq!(Fixed::new(66.666_666, 1).to_string(), "66.7");
        assert_eq!(Fixed::new(0.0, 2).to_string(), "0.00");
        assert_eq!(Fixed::new(3.0, 0).to_string(), "3");
        assert_eq!(serde_json::to_string(&Fixed::new(1.26, 1)).unwrap(), r#""1.3""#);
    }

    #[test]
    fn clamped_percent_collapses_above_hundred() {
        assert_eq!(Fixed::clamped_percent(250.0, 1).to_string(), "100");
        assert_eq!(Fixed::clamped_percent(100.0, 1).to_string(), "100.0");
        assert_eq!(Fixed::clamped_percent(20.0, 1).to_string(), "20.0");
    }
}
