//! Per-kind conversion between typed values and wire strings.
//!
//! `encode` validates and fails before anything is written. `decode` is total:
//! absent or malformed stored data maps to a fixed fallback instead of an
//! error, so reads never fail on bad data.

use kvorm_refs::TypeRef;
use kvorm_types::{
    date_from_epoch, date_to_epoch, datetime_from_epoch, datetime_to_epoch, PrimaryKey,
};

use crate::error::{ModelError, ModelResult};
use crate::mapper::Mapper;
use crate::value::Value;

/// Value codec of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum Codec {
    /// Any string. Absent decodes to `""`.
    String,
    /// `"1"` / `"0"`. Anything but `"1"` decodes to `false`.
    Boolean,
    /// Decimal integer. Absent or empty decodes to `0`, garbage to `Null`.
    Integer,
    /// Whole epoch seconds, decoded to a date.
    Date,
    /// Whole epoch seconds, decoded to a datetime.
    DateTime,
    /// One of a fixed set of strings, with a fallback member.
    Enum { values: Vec<String>, default: String },
    /// A primary key of another entity type.
    Foreign {
        target: TypeRef,
        default_pk: Option<PrimaryKey>,
    },
}

impl Codec {
    pub fn string() -> Self {
        Codec::String
    }

    pub fn boolean() -> Self {
        Codec::Boolean
    }

    pub fn integer() -> Self {
        Codec::Integer
    }

    pub fn date() -> Self {
        Codec::Date
    }

    pub fn datetime() -> Self {
        Codec::DateTime
    }

    /// An enumerated codec.
    ///
    /// Fails if `values` is empty, holds an empty string, or does not contain
    /// `default`.
    pub fn enumeration<I, S>(values: I, default: &str) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(ModelError::Configuration(
                "enumerated field needs at least one value".into(),
            ));
        }
        if values.iter().any(String::is_empty) {
            return Err(ModelError::Configuration(
                "enumerated values must be non-empty strings".into(),
            ));
        }
        if !values.iter().any(|v| v == default) {
            return Err(ModelError::Configuration(format!(
                "default {default:?} is not one of {values:?}"
            )));
        }
        Ok(Codec::Enum {
            values,
            default: default.to_string(),
        })
    }

    /// A foreign reference decoding to `target`, or to the raw key when the
    /// target is [`TypeRef::Unbound`].
    pub fn foreign(target: TypeRef) -> Self {
        Codec::Foreign {
            target,
            default_pk: None,
        }
    }

    /// A foreign reference that decodes an absent value to `default_pk`.
    /// An empty `default_pk` means no default.
    pub fn foreign_with_default(target: TypeRef, default_pk: impl Into<PrimaryKey>) -> Self {
        Codec::Foreign {
            target,
            default_pk: Some(default_pk.into()).filter(|pk| !pk.as_str().is_empty()),
        }
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self, Codec::Foreign { .. })
    }

    /// Short name of the codec, for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::String => "string",
            Codec::Boolean => "boolean",
            Codec::Integer => "integer",
            Codec::Date => "date",
            Codec::DateTime => "datetime",
            Codec::Enum { .. } => "enumerated",
            Codec::Foreign { .. } => "foreign-reference",
        }
    }

    pub(crate) fn type_ref_mut(&mut self) -> Option<&mut TypeRef> {
        match self {
            Codec::Foreign { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Convert a value to its wire form, failing if it does not fit.
    pub fn encode(&self, field: &str, value: &Value) -> ModelResult<String> {
        let mismatch = |expected: &str| {
            ModelError::validation(
                field,
                format!("{expected} expected, but {} was given", value.type_name()),
            )
        };

        match (self, value) {
            (Codec::String, Value::Str(s)) => Ok(s.clone()),
            (Codec::String, _) => Err(mismatch("string")),

            (Codec::Boolean, Value::Bool(b)) => Ok(if *b { "1" } else { "0" }.to_string()),
            (Codec::Boolean, _) => Err(mismatch("boolean")),

            (Codec::Integer, Value::Int(n)) => Ok(n.to_string()),
            (Codec::Integer, _) => Err(mismatch("integer")),

            (Codec::Date | Codec::DateTime, Value::Date(d)) => Ok(date_to_epoch(*d).to_string()),
            (Codec::Date | Codec::DateTime, Value::DateTime(dt)) => {
                Ok(datetime_to_epoch(*dt).to_string())
            }
            (Codec::Date | Codec::DateTime, _) => Err(mismatch("date or datetime")),

            (Codec::Enum { values, .. }, Value::Str(s)) => {
                if values.contains(s) {
                    Ok(s.clone())
                } else {
                    Err(ModelError::validation(
                        field,
                        format!("{s:?} is not one of {values:?}"),
                    ))
                }
            }
            (Codec::Enum { .. }, _) => Err(mismatch("enumerated string")),

            (Codec::Foreign { .. }, Value::Entity(e)) => Ok(e.pk().to_string()),
            (Codec::Foreign { .. }, Value::Str(s)) => Ok(s.clone()),
            (Codec::Foreign { .. }, Value::Int(n)) => Ok(n.to_string()),
            (Codec::Foreign { .. }, _) => Err(mismatch("entity, string or integer")),
        }
    }

    /// Convert a stored wire value (or its absence) back to a typed value.
    pub fn decode(&self, raw: Option<&str>, mapper: &Mapper) -> Value {
        match self {
            Codec::String => Value::Str(raw.unwrap_or_default().to_string()),
            Codec::Boolean => Value::Bool(raw == Some("1")),
            Codec::Integer => match raw {
                None | Some("") => Value::Int(0),
                Some(s) => s.parse().map(Value::Int).unwrap_or_else(|_| {
                    tracing::warn!(raw = s, "stored integer does not parse, decoding as null");
                    Value::Null
                }),
            },
            Codec::Date => epoch_seconds(raw)
                .and_then(date_from_epoch)
                .map_or(Value::Null, Value::Date),
            Codec::DateTime => epoch_seconds(raw)
                .and_then(datetime_from_epoch)
                .map_or(Value::Null, Value::DateTime),
            Codec::Enum { values, default } => match raw {
                Some(s) if values.iter().any(|v| v == s) => Value::Str(s.to_string()),
                Some(s) => {
                    tracing::warn!(raw = s, default = %default, "stored value left the enumeration, using default");
                    Value::Str(default.clone())
                }
                None => Value::Str(default.clone()),
            },
            Codec::Foreign { target, default_pk } => {
                let pk = match raw.filter(|s| !s.is_empty()) {
                    Some(s) => PrimaryKey::from(s),
                    None => match default_pk {
                        Some(pk) => pk.clone(),
                        None => return Value::Null,
                    },
                };
                match target.target() {
                    Ok(Some(index)) => Value::from(mapper.entity(index, pk)),
                    Ok(None) => Value::Str(pk.into_string()),
                    Err(e) => {
                        tracing::warn!(error = %e, "reference target never linked, returning raw key");
                        Value::Str(pk.into_string())
                    }
                }
            }
        }
    }
}

fn epoch_seconds(raw: Option<&str>) -> Option<i64> {
    let raw = raw.filter(|s| !s.is_empty())?;
    match raw.parse() {
        Ok(secs) => Some(secs),
        Err(_) => {
            tracing::warn!(raw, "stored epoch seconds do not parse, decoding as null");
            None
        }
    }
}
