//! Human-readable sizes and durations for configuration values

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Value out of range: {0}")]
    Overflow(String),
}

const KIB: u64 = 1024;
const SIZE_UNITS: &[(&str, u64)] = &[
    ("TB", KIB * KIB * KIB * KIB),
    ("GB", KIB * KIB * KIB),
    ("MB", KIB * KIB),
    ("KB", KIB),
    ("B", 1),
];

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const DURATION_UNITS: &[(&str, u64)] = &[("d", DAY), ("h", HOUR), ("m", MINUTE), ("s", 1)];

/// Split `"10MB"` into `(10, "MB")`; a bare number has an empty unit.
fn split_number(input: &str) -> Result<(u64, &str), ParseError> {
    let input = input.trim();
    let pos = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if pos == 0 {
        return Err(ParseError::InvalidFormat(input.to_string()));
    }
    Ok((input[..pos].parse()?, input[pos..].trim()))
}

/// Byte count, written as `"512"`, `"64KB"`, `"10MB"` (binary multiples)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Largest unit that divides the value exactly, so the text parses back.
    pub fn to_human_readable(&self) -> String {
        if self.0 == 0 {
            return "0B".to_string();
        }
        let (unit, divisor) = SIZE_UNITS
            .iter()
            .copied()
            .find(|&(_, divisor)| self.0 % divisor == 0)
            .unwrap_or(("B", 1));
        format!("{}{}", self.0 / divisor, unit)
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (value, unit) = split_number(s)?;
        let multiplier = match unit.to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => KIB,
            "M" | "MB" | "MIB" => KIB * KIB,
            "G" | "GB" | "GIB" => KIB * KIB * KIB,
            "T" | "TB" | "TIB" => KIB * KIB * KIB * KIB,
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };
        value
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ParseError::Overflow(s.trim().to_string()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human_readable())
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(HumanVisitor::<ByteSize>::new("a byte size such as \"10MB\" or an integer"))
    }
}

/// Duration written as `"90s"`, `"30m"`, `"24h"`, `"7d"` or plain seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn to_human_readable(&self) -> String {
        let secs = self.0.as_secs();
        if secs == 0 {
            return "0s".to_string();
        }
        let (unit, divisor) = DURATION_UNITS
            .iter()
            .copied()
            .find(|&(_, divisor)| secs % divisor == 0)
            .unwrap_or(("s", 1));
        format!("{}{}", secs / divisor, unit)
    }
}

impl FromStr for HumanDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (value, unit) = split_number(s)?;
        let multiplier = match unit.to_ascii_lowercase().as_str() {
            "" | "s" | "sec" | "secs" => 1,
            "m" | "min" | "mins" => MINUTE,
            "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
            "d" | "day" | "days" => DAY,
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };
        value
            .checked_mul(multiplier)
            .map(|secs| HumanDuration(Duration::from_secs(secs)))
            .ok_or_else(|| ParseError::Overflow(s.trim().to_string()))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human_readable())
    }
}

impl Serialize for HumanDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(HumanVisitor::<HumanDuration>::new("a duration such as \"7d\" or seconds"))
    }
}

/// Accepts either an integer (base unit) or a string with a unit suffix.
struct HumanVisitor<T> {
    expecting: &'static str,
    _marker: std::marker::PhantomData<T>,
}

impl<T> HumanVisitor<T> {
    fn new(expecting: &'static str) -> Self {
        Self {
            expecting,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'de, T> serde::de::Visitor<'de> for HumanVisitor<T>
where
    T: FromStr<Err = ParseError>,
{
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.expecting)
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.to_string().parse().map_err(serde::de::Error::custom)
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        let v = u64::try_from(v).map_err(|_| E::custom(format!("negative value: {v}")))?;
        self.visit_u64(v)
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.parse().map_err(serde::de::Error::custom)
    }
}
