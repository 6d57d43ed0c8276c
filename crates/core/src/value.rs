//! Value type definitions.
//!
//! This module defines the `Value` enum which represents the content of one
//! attribute field of a feature, together with the explicit conversions the
//! query layer applies when a column declares a target type.

use crate::numfmt::format_g;
use crate::types::FieldType;
use alloc::format;
use alloc::string::{String, ToString};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use core::cmp::Ordering;
use core::hash::{Hash, Hasher};

/// A value stored in a feature field.
#[derive(Clone, Debug)]
pub enum Value {
    /// Unset or null value
    Null,
    Boolean(bool),
    Integer(i32),
    Integer64(i64),
    Real(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Returns the field type of this value, or None if it's Null.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(FieldType::Boolean),
            Value::Integer(_) => Some(FieldType::Integer),
            Value::Integer64(_) => Some(FieldType::Integer64),
            Value::Real(_) => Some(FieldType::Real),
            Value::String(_) => Some(FieldType::String),
            Value::Date(_) => Some(FieldType::Date),
            Value::Time(_) => Some(FieldType::Time),
            Value::DateTime(_) => Some(FieldType::DateTime),
        }
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string slice if this is a String.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value as a boolean, treating non-zero numbers as true.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::Integer64(i) => Some(*i != 0),
            Value::Real(f) => Some(*f != 0.0),
            _ => None,
        }
    }

    /// Converts numeric and textual values to a 64-bit integer.
    ///
    /// Reals are truncated toward zero; strings are read like C `atoll`, so a
    /// string without a leading number yields 0.
    pub fn as_integer64(&self) -> Option<i64> {
        match self {
            Value::Boolean(b) => Some(*b as i64),
            Value::Integer(i) => Some(*i as i64),
            Value::Integer64(i) => Some(*i),
            Value::Real(f) => Some(libm::trunc(*f) as i64),
            Value::String(s) => Some(parse_leading_i64(s)),
            _ => None,
        }
    }

    /// Converts numeric and textual values to a 32-bit integer, saturating on overflow.
    pub fn as_integer(&self) -> Option<i32> {
        self.as_integer64()
            .map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }

    /// Converts numeric and textual values to a real.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Integer(i) => Some(*i as f64),
            Value::Integer64(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::String(s) => Some(parse_leading_f64(s)),
            _ => None,
        }
    }

    /// Renders the value as text. Null renders as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Integer64(i) => i.to_string(),
            Value::Real(f) => format_g(*f, 15),
            Value::String(s) => s.clone(),
            Value::Date(d) => format_date(d),
            Value::Time(t) => format_time(t),
            Value::DateTime(dt) => format!("{} {}", format_date(&dt.date()), format_time(&dt.time())),
        }
    }

    /// Converts this value to `target`.
    ///
    /// Null stays Null. Conversions with no meaningful result (for example a
    /// date to an integer, or an unparsable string to a date) yield Null.
    pub fn coerce(&self, target: FieldType) -> Value {
        if self.is_null() {
            return Value::Null;
        }
        match target {
            FieldType::Boolean => self.as_bool().map(Value::Boolean).unwrap_or_else(|| {
                match self.as_str() {
                    Some(s) => Value::Boolean(s.eq_ignore_ascii_case("true") || parse_leading_i64(s) != 0),
                    None => Value::Null,
                }
            }),
            FieldType::Integer => self.as_integer().map(Value::Integer).unwrap_or(Value::Null),
            FieldType::Integer64 => self.as_integer64().map(Value::Integer64).unwrap_or(Value::Null),
            FieldType::Real => self.as_real().map(Value::Real).unwrap_or(Value::Null),
            FieldType::String => Value::String(self.to_text()),
            FieldType::Date => match self {
                Value::Date(d) => Value::Date(*d),
                Value::DateTime(dt) => Value::Date(dt.date()),
                Value::String(s) => parse_datetime(s)
                    .map(|dt| Value::Date(dt.date()))
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
            FieldType::Time => match self {
                Value::Time(t) => Value::Time(*t),
                Value::DateTime(dt) => Value::Time(dt.time()),
                Value::String(s) => parse_time(s)
                    .or_else(|| parse_datetime(s).map(|dt| dt.time()))
                    .map(Value::Time)
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
            FieldType::DateTime => match self {
                Value::DateTime(dt) => Value::DateTime(*dt),
                Value::Date(d) => d.and_hms_opt(0, 0, 0).map(Value::DateTime).unwrap_or(Value::Null),
                Value::String(s) => parse_datetime(s).map(Value::DateTime).unwrap_or(Value::Null),
                _ => Value::Null,
            },
        }
    }

    /// Compares two values of compatible types.
    ///
    /// Returns None when either side is Null. Integers and reals compare
    /// numerically, strings lexically by bytes, dates and times by calendar
    /// position. Incompatible types fall back to a fixed type order.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        Some(self.cmp(other))
    }

    /// Seconds since the Unix epoch for temporal values (seconds since
    /// midnight for times). Used to average dates.
    pub fn to_unix_seconds(&self) -> Option<f64> {
        match self {
            Value::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp() as f64),
            Value::Time(t) => {
                Some(t.num_seconds_from_midnight() as f64 + millis(t) as f64 / 1000.0)
            }
            Value::DateTime(dt) => {
                Some(dt.and_utc().timestamp() as f64 + millis(&dt.time()) as f64 / 1000.0)
            }
            _ => None,
        }
    }

    /// Builds a temporal value of type `target` from seconds since the Unix epoch.
    pub fn from_unix_seconds(seconds: f64, target: FieldType) -> Value {
        let whole = libm::floor(seconds);
        let nanos = ((seconds - whole) * 1_000.0) as u32 * 1_000_000;
        let Some(dt) = chrono::DateTime::from_timestamp(whole as i64, nanos) else {
            return Value::Null;
        };
        let naive = dt.naive_utc();
        match target {
            FieldType::Date => Value::Date(naive.date()),
            FieldType::Time => Value::Time(naive.time()),
            FieldType::DateTime => Value::DateTime(naive),
            _ => Value::Real(seconds),
        }
    }

    fn numeric(&self) -> Option<NumericKey> {
        match self {
            Value::Boolean(b) => Some(NumericKey::Int(*b as i64)),
            Value::Integer(i) => Some(NumericKey::Int(*i as i64)),
            Value::Integer64(i) => Some(NumericKey::Int(*i)),
            Value::Real(f) => Some(NumericKey::Real(*f)),
            _ => None,
        }
    }

    fn temporal(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) | Value::Integer(_) | Value::Integer64(_) | Value::Real(_) => 1,
            Value::String(_) => 2,
            Value::Date(_) | Value::DateTime(_) => 3,
            Value::Time(_) => 4,
        }
    }
}

#[derive(Clone, Copy)]
enum NumericKey {
    Int(i64),
    Real(f64),
}

fn compare_reals(a: f64, b: f64) -> Ordering {
    // NaN sorts after every other real
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            _ => {
                if let (Some(a), Some(b)) = (self.numeric(), other.numeric()) {
                    return match (a, b) {
                        (NumericKey::Int(a), NumericKey::Int(b)) => a.cmp(&b),
                        (NumericKey::Int(a), NumericKey::Real(b)) => compare_reals(a as f64, b),
                        (NumericKey::Real(a), NumericKey::Int(b)) => compare_reals(a, b as f64),
                        (NumericKey::Real(a), NumericKey::Real(b)) => compare_reals(a, b),
                    };
                }
                if let (Some(a), Some(b)) = (self.temporal(), other.temporal()) {
                    return a.cmp(&b);
                }
                self.type_order().cmp(&other.type_order())
            }
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_order().hash(state);
        match self {
            Value::Null => {}
            Value::String(s) => s.hash(state),
            Value::Time(t) => t.hash(state),
            // Equal numerics and equal temporals must hash alike across variants.
            _ => {
                if let Some(n) = self.numeric() {
                    match n {
                        NumericKey::Int(i) => (i as f64).to_bits().hash(state),
                        NumericKey::Real(f) => f.to_bits().hash(state),
                    }
                } else if let Some(dt) = self.temporal() {
                    dt.hash(state);
                }
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

fn millis(t: &NaiveTime) -> u32 {
    t.nanosecond() / 1_000_000
}

fn format_date(d: &NaiveDate) -> String {
    format!("{:04}/{:02}/{:02}", d.year(), d.month(), d.day())
}

fn format_time(t: &NaiveTime) -> String {
    let ms = millis(t);
    if ms == 0 {
        format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second())
    } else {
        format!("{:02}:{:02}:{:02}.{:03}", t.hour(), t.minute(), t.second(), ms)
    }
}

/// Parses `YYYY/MM/DD` or `YYYY-MM-DD`, optionally followed by a space or `T`
/// and a time of day.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    let (date_part, time_part) = match text.find([' ', 'T']) {
        Some(pos) => (&text[..pos], Some(text[pos + 1..].trim())),
        None => (text, None),
    };
    let mut parts = date_part.split(['/', '-']);
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = match time_part {
        Some(t) if !t.is_empty() => parse_time(t)?,
        _ => NaiveTime::from_hms_opt(0, 0, 0)?,
    };
    Some(NaiveDateTime::new(date, time))
}

/// Parses `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fff`.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let mut parts = text.trim().split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    let (second, milli) = match parts.next() {
        Some(sec) => match sec.split_once('.') {
            Some((s, frac)) => {
                let digits: String = frac.chars().take(3).collect();
                let scale = match digits.len() {
                    1 => 100,
                    2 => 10,
                    _ => 1,
                };
                (s.parse().ok()?, digits.parse::<u32>().ok()? * scale)
            }
            None => (sec.parse().ok()?, 0),
        },
        None => (0, 0),
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveTime::from_hms_milli_opt(hour, minute, second, milli)
}

/// Reads a leading integer like C `atoll`: optional whitespace, optional sign,
/// then digits. Anything else yields 0.
pub fn parse_leading_i64(text: &str) -> i64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    text[..end].parse().unwrap_or(0)
}

/// Reads a leading real like C `atof`. Anything unparsable yields 0.0.
pub fn parse_leading_f64(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }
    text[..end].parse().unwrap_or(0.0)
}
