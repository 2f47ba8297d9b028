//! Declared column datatypes and their conversion rules.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The declared datatype of an attribute binding.
///
/// A datatype owns two conversions: [`SqlType::convert`] runs when a caller
/// assigns a value and is strict, [`SqlType::from_sql`] runs when a record
/// is hydrated from a row and accepts the shapes backends actually return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    Integer,
    BigInt,
    Float,
    Text,
    Boolean,
    Date,
    Time,
    Timestamp,
    Binary,
    Json,
}

impl SqlType {
    pub const fn name(self) -> &'static str {
        match self {
            SqlType::Integer => "integer",
            SqlType::BigInt => "bigint",
            SqlType::Float => "float",
            SqlType::Text => "text",
            SqlType::Boolean => "boolean",
            SqlType::Date => "date",
            SqlType::Time => "time",
            SqlType::Timestamp => "timestamp",
            SqlType::Binary => "binary",
            SqlType::Json => "json",
        }
    }

    /// Converts an assigned value to this datatype.
    ///
    /// `Null` is always accepted. Integers widen (and narrow when they fit),
    /// integers become floats, timestamps truncate to dates. Anything else is
    /// handed back unchanged as the error.
    pub fn convert(self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (SqlType::Integer, Value::Int(v)) => Ok(Value::Int(v)),
            (SqlType::Integer, Value::BigInt(v)) => {
                i32::try_from(v).map(Value::Int).map_err(|_| Value::BigInt(v))
            }
            (SqlType::BigInt, Value::Int(v)) => Ok(Value::BigInt(i64::from(v))),
            (SqlType::BigInt, Value::BigInt(v)) => Ok(Value::BigInt(v)),
            (SqlType::Float, Value::Double(v)) => Ok(Value::Double(v)),
            (SqlType::Float, Value::Int(v)) => Ok(Value::Double(f64::from(v))),
            (SqlType::Float, Value::BigInt(v)) => Ok(Value::Double(v as f64)),
            (SqlType::Text, v @ Value::Text(_))
            | (SqlType::Boolean, v @ Value::Bool(_))
            | (SqlType::Date, v @ Value::Date(_))
            | (SqlType::Time, v @ Value::Time(_))
            | (SqlType::Timestamp, v @ Value::Timestamp(_))
            | (SqlType::Binary, v @ Value::Bytes(_))
            | (SqlType::Json, v @ Value::Json(_)) => Ok(v),
            (SqlType::Date, Value::Timestamp(ts)) => Ok(Value::Date(ts.date())),
            (_, other) => Err(other),
        }
    }

    /// Converts a raw value fetched from a backend to this datatype.
    ///
    /// On top of [`SqlType::convert`] this accepts integer booleans, ISO text
    /// for temporal types, UTF-8 blobs for text and JSON documents stored as
    /// text.
    pub fn from_sql(self, raw: Value) -> Result<Value, Value> {
        match (self, raw) {
            (SqlType::Boolean, Value::Int(v)) => Ok(Value::Bool(v != 0)),
            (SqlType::Boolean, Value::BigInt(v)) => Ok(Value::Bool(v != 0)),
            (SqlType::Text, Value::Bytes(b)) => {
                String::from_utf8(b).map(Value::Text).map_err(|e| Value::Bytes(e.into_bytes()))
            }
            (SqlType::Binary, Value::Text(s)) => Ok(Value::Bytes(s.into_bytes())),
            (SqlType::Date, Value::Text(s)) => parse_date(&s).map(Value::Date).ok_or(Value::Text(s)),
            (SqlType::Time, Value::Text(s)) => parse_time(&s).map(Value::Time).ok_or(Value::Text(s)),
            (SqlType::Timestamp, Value::Text(s)) => {
                parse_timestamp(&s).map(Value::Timestamp).ok_or(Value::Text(s))
            }
            (SqlType::Timestamp, Value::Date(d)) => Ok(Value::Timestamp(d.and_time(NaiveTime::default()))),
            (SqlType::Json, Value::Text(s)) => match serde_json::from_str(&s) {
                Ok(json) => Ok(Value::Json(json)),
                Err(_) => Err(Value::Text(s)),
            },
            (ty, raw) => ty.convert(raw),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::default())))
}
