use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
    binder::{Binder, BoundArgs},
    error::Error,
    request::Request,
    settings::asbool,
};

/// A coerced parameter value.
///
/// Raw request data is JSON-shaped; this is the closed set of shapes a
/// parameter can take after coercion. `Raw` is what an untyped parameter
/// yields, `Custom` holds a user-constructed value and `Nested` the output
/// of a nested binder.
#[derive(Clone)]
pub enum ParamValue {
    Raw(Value),
    Str(String),
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Dict(Map<String, Value>),
    Set(Vec<Value>),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Duration(Duration),
    Custom(Arc<dyn Any + Send + Sync>),
    Nested(BoundArgs),
}

impl std::fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Raw(value) => f.debug_tuple("Raw").field(value).finish(),
            ParamValue::Str(value) => f.debug_tuple("Str").field(value).finish(),
            ParamValue::Bytes(value) => f.debug_tuple("Bytes").field(value).finish(),
            ParamValue::Int(value) => f.debug_tuple("Int").field(value).finish(),
            ParamValue::Float(value) => f.debug_tuple("Float").field(value).finish(),
            ParamValue::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            ParamValue::List(value) => f.debug_tuple("List").field(value).finish(),
            ParamValue::Dict(value) => f.debug_tuple("Dict").field(value).finish(),
            ParamValue::Set(value) => f.debug_tuple("Set").field(value).finish(),
            ParamValue::DateTime(value) => f.debug_tuple("DateTime").field(value).finish(),
            ParamValue::Date(value) => f.debug_tuple("Date").field(value).finish(),
            ParamValue::Duration(value) => f.debug_tuple("Duration").field(value).finish(),
            ParamValue::Custom(_) => f.write_str("Custom(..)"),
            ParamValue::Nested(args) => f.debug_tuple("Nested").field(args).finish(),
        }
    }
}

impl ParamValue {
    pub fn as_raw(&self) -> Option<&Value> {
        match self {
            ParamValue::Raw(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ParamValue::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            ParamValue::List(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Map<String, Value>> {
        match self {
            ParamValue::Dict(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&[Value]> {
        match self {
            ParamValue::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ParamValue::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            ParamValue::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            ParamValue::Duration(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&BoundArgs> {
        match self {
            ParamValue::Nested(args) => Some(args),
            _ => None,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            ParamValue::Custom(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

/// A user-type constructor. Receives the originating request and the
/// decoded parameter value.
pub type Constructor =
    Arc<dyn Fn(&Request<String>, Value) -> Result<ParamValue, Error> + Send + Sync>;

/// Construction capability for types that want to see the originating
/// request. The value-only form is the default entry point.
pub trait FromParams: Sized + Send + Sync + 'static {
    fn from_value(value: Value) -> Result<Self, Error>;

    fn from_request(_request: &Request<String>, value: Value) -> Result<Self, Error> {
        Self::from_value(value)
    }
}

/// The type a parameter is coerced to.
#[derive(Clone)]
pub enum TypeDescriptor {
    Str,
    Bytes,
    Int,
    Float,
    Bool,
    List,
    Dict,
    Set,
    DateTime,
    Date,
    Duration,
    Custom(Constructor),
    Nested(Arc<Binder>),
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TypeDescriptor::Str => "Str",
            TypeDescriptor::Bytes => "Bytes",
            TypeDescriptor::Int => "Int",
            TypeDescriptor::Float => "Float",
            TypeDescriptor::Bool => "Bool",
            TypeDescriptor::List => "List",
            TypeDescriptor::Dict => "Dict",
            TypeDescriptor::Set => "Set",
            TypeDescriptor::DateTime => "DateTime",
            TypeDescriptor::Date => "Date",
            TypeDescriptor::Duration => "Duration",
            TypeDescriptor::Custom(_) => "Custom(..)",
            TypeDescriptor::Nested(_) => "Nested(..)",
        };
        f.write_str(name)
    }
}

impl TypeDescriptor {
    /// A user type deserialized straight from the decoded JSON value.
    pub fn deserialized<T>() -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        TypeDescriptor::Custom(Arc::new(|_request, value| {
            serde_json::from_value::<T>(value)
                .map(|parsed| ParamValue::Custom(Arc::new(parsed)))
                .map_err(internal)
        }))
    }

    /// A user type built through its request-aware constructor.
    pub fn from_params<T: FromParams>() -> Self {
        TypeDescriptor::Custom(Arc::new(|request, value| {
            T::from_request(request, value).map(|parsed| ParamValue::Custom(Arc::new(parsed)))
        }))
    }

    /// A plain factory over the decoded value.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(Value) -> Result<ParamValue, Error> + Send + Sync + 'static,
    {
        TypeDescriptor::Custom(Arc::new(move |_request, value| factory(value)))
    }

    /// A multi-parameter type: the nested binder consumes its own declared
    /// parameters atomically.
    pub fn nested(binder: Binder) -> Self {
        TypeDescriptor::Nested(Arc::new(binder))
    }
}

// Unclassified failure; `coerce` turns these into a 400 naming the
// parameter, while 400-class errors pass through untouched.
fn internal(detail: impl ToString) -> Error {
    Error::new(detail.to_string(), 500)
}

/// Coerce a raw parameter value to `descriptor`.
///
/// `needs_decode` is true for query-style sources, where structured values
/// arrive as JSON-encoded strings. Conversion failures surface as
/// `Badly formatted parameter '<name>'` unless already classified as a
/// client error.
pub fn coerce(
    request: &Request<String>,
    name: &str,
    raw: Value,
    descriptor: Option<&TypeDescriptor>,
    needs_decode: bool,
) -> Result<ParamValue, Error> {
    let Some(descriptor) = descriptor else {
        return Ok(ParamValue::Raw(raw));
    };

    convert(request, name, raw, descriptor, needs_decode).map_err(|err| {
        if err.is_client_error() {
            err
        } else {
            tracing::debug!(parameter = name, error = %err, "coercion failed");
            Error::bad_format(name)
        }
    })
}

fn convert(
    request: &Request<String>,
    name: &str,
    raw: Value,
    descriptor: &TypeDescriptor,
    needs_decode: bool,
) -> Result<ParamValue, Error> {
    match descriptor {
        TypeDescriptor::Str => match raw {
            Value::String(value) => Ok(ParamValue::Str(value)),
            _ => Err(Error::wrong_type(name)),
        },
        TypeDescriptor::Bytes => match raw {
            Value::String(value) => Ok(ParamValue::Bytes(value.into_bytes())),
            _ => Err(internal("bytes want a string value")),
        },
        TypeDescriptor::List => match decode_structured(raw, needs_decode)? {
            Value::Array(items) => Ok(ParamValue::List(items)),
            _ => Err(Error::wrong_type(name)),
        },
        TypeDescriptor::Dict => match decode_structured(raw, needs_decode)? {
            Value::Object(map) => Ok(ParamValue::Dict(map)),
            _ => Err(Error::wrong_type(name)),
        },
        TypeDescriptor::Set => match decode_structured(raw, needs_decode)? {
            Value::Array(items) => {
                let mut set: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    if !set.contains(&item) {
                        set.push(item);
                    }
                }
                Ok(ParamValue::Set(set))
            }
            _ => Err(internal("set wants a sequence")),
        },
        TypeDescriptor::DateTime => {
            let seconds = epoch_seconds(&raw)?;
            DateTime::from_timestamp_millis((seconds * 1000.0) as i64)
                .map(ParamValue::DateTime)
                .ok_or_else(|| internal("timestamp out of range"))
        }
        TypeDescriptor::Date => match &raw {
            Value::Number(_) => epoch_date(&raw),
            Value::String(value) if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) => {
                epoch_date(&raw)
            }
            Value::String(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(ParamValue::Date)
                .map_err(internal),
            _ => Err(internal("date wants a timestamp or YYYY-MM-DD")),
        },
        TypeDescriptor::Duration => {
            let seconds = epoch_seconds(&raw)?;
            Duration::try_from_secs_f64(seconds)
                .map(ParamValue::Duration)
                .map_err(internal)
        }
        TypeDescriptor::Bool => match raw {
            Value::Bool(value) => Ok(ParamValue::Bool(value)),
            Value::Number(value) => Ok(ParamValue::Bool(value.as_f64() != Some(0.0))),
            Value::String(value) => Ok(ParamValue::Bool(asbool(&value))),
            _ => Err(internal("boolean wants a scalar")),
        },
        TypeDescriptor::Int => match raw {
            Value::Number(value) => value
                .as_i64()
                .or_else(|| value.as_f64().map(|float| float as i64))
                .map(ParamValue::Int)
                .ok_or_else(|| internal("number out of range")),
            Value::String(value) => value
                .trim()
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(internal),
            _ => Err(internal("integer wants a number")),
        },
        TypeDescriptor::Float => match raw {
            Value::Number(value) => value
                .as_f64()
                .map(ParamValue::Float)
                .ok_or_else(|| internal("number out of range")),
            Value::String(value) => value
                .trim()
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(internal),
            _ => Err(internal("float wants a number")),
        },
        TypeDescriptor::Custom(constructor) => {
            let decoded = decode_structured(raw, needs_decode)?;
            constructor(request, decoded)
        }
        TypeDescriptor::Nested(binder) => binder.bind(request).map(ParamValue::Nested),
    }
}

// Query-sourced structured values are JSON-encoded strings; body-sourced
// ones arrive pre-decoded.
fn decode_structured(raw: Value, needs_decode: bool) -> Result<Value, Error> {
    if !needs_decode {
        return Ok(raw);
    }
    match raw {
        Value::String(encoded) => serde_json::from_str(&encoded).map_err(internal),
        other => Ok(other),
    }
}

fn epoch_seconds(raw: &Value) -> Result<f64, Error> {
    match raw {
        Value::Number(value) => value
            .as_f64()
            .ok_or_else(|| internal("number out of range")),
        Value::String(value) => value.trim().parse::<f64>().map_err(internal),
        _ => Err(internal("timestamp wants a number")),
    }
}

fn epoch_date(raw: &Value) -> Result<ParamValue, Error> {
    let seconds = epoch_seconds(raw)?;
    DateTime::from_timestamp_millis((seconds * 1000.0) as i64)
        .map(|timestamp| ParamValue::Date(timestamp.date_naive()))
        .ok_or_else(|| internal("timestamp out of range"))
}
