use crate::{Error, Parse, Result};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
    mem::discriminant,
};
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Dynamically typed database value.
///
/// Every variant carries its own null (`Value::Varchar(None)`), which is the type-correct null
/// marker used when binding absent values. `Value::Null` is reserved for untyped nulls coming
/// back from a driver.
#[derive(Default, Debug, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Time(Option<Time>),
    Timestamp(Option<PrimitiveDateTime>),
    Uuid(Option<Uuid>),
    List(Option<Vec<Value>>, /* type: */ Box<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Boolean(v) => v.is_none(),
            Value::Int32(v) => v.is_none(),
            Value::Int64(v) => v.is_none(),
            Value::Float64(v) => v.is_none(),
            Value::Decimal(v) => v.is_none(),
            Value::Varchar(v) => v.is_none(),
            Value::Blob(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
            Value::Time(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
            Value::Uuid(v) => v.is_none(),
            Value::List(v, ..) => v.is_none(),
        }
    }

    pub fn same_type(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(.., l), Self::List(.., r)) => l.same_type(r),
            _ => discriminant(self) == discriminant(other),
        }
    }

    /// The null of the same type as `self`.
    pub fn as_null(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Boolean(..) => Value::Boolean(None),
            Value::Int32(..) => Value::Int32(None),
            Value::Int64(..) => Value::Int64(None),
            Value::Float64(..) => Value::Float64(None),
            Value::Decimal(..) => Value::Decimal(None),
            Value::Varchar(..) => Value::Varchar(None),
            Value::Blob(..) => Value::Blob(None),
            Value::Date(..) => Value::Date(None),
            Value::Time(..) => Value::Time(None),
            Value::Timestamp(..) => Value::Timestamp(None),
            Value::Uuid(..) => Value::Uuid(None),
            Value::List(.., inner) => Value::List(None, inner.clone()),
        }
    }

    /// Value used when a column is NULL but the destination cannot hold a null.
    ///
    /// Types without a natural zero (dates, times, identifiers) return `None`.
    pub fn default_of_type(&self) -> Option<Value> {
        Some(match self {
            Value::Boolean(..) => Value::Boolean(Some(false)),
            Value::Int32(..) => Value::Int32(Some(0)),
            Value::Int64(..) => Value::Int64(Some(0)),
            Value::Float64(..) => Value::Float64(Some(0.0)),
            Value::Decimal(..) => Value::Decimal(Some(Decimal::ZERO)),
            Value::Varchar(..) => Value::Varchar(Some(String::new())),
            Value::Blob(..) => Value::Blob(Some(Box::default())),
            Value::List(.., inner) => Value::List(Some(Vec::new()), inner.clone()),
            _ => return None,
        })
    }

    /// Name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(..) => "boolean",
            Value::Int32(..) => "integer",
            Value::Int64(..) => "long",
            Value::Float64(..) => "double",
            Value::Decimal(..) => "decimal",
            Value::Varchar(..) => "string",
            Value::Blob(..) => "blob",
            Value::Date(..) => "date",
            Value::Time(..) => "time",
            Value::Timestamp(..) => "timestamp",
            Value::Uuid(..) => "uuid",
            Value::List(..) => "list",
        }
    }

    /// Convert `self` into the variant of `prototype`.
    ///
    /// Drivers do not always return the declared type (SQLite has only integers, reals, text
    /// and blobs), this reconciles the two sides. Nulls become the null of `prototype`.
    pub fn try_as(self, prototype: &Value) -> Result<Value> {
        if self.is_null() {
            return Ok(prototype.as_null());
        }
        if self.same_type(prototype) || matches!(prototype, Value::Null) {
            return Ok(self);
        }
        let error = || {
            Error::msg(format!(
                "Cannot convert {} value `{}` into {}",
                self.type_name(),
                self,
                prototype.type_name()
            ))
        };
        Ok(match (&self, prototype) {
            (Value::Int64(Some(v)), Value::Int32(..)) => {
                Value::Int32(Some(i32::try_from(*v).map_err(|_| error())?))
            }
            (Value::Int32(Some(v)), Value::Int64(..)) => Value::Int64(Some(*v as i64)),
            (Value::Int64(Some(v)), Value::Boolean(..)) => Value::Boolean(Some(*v != 0)),
            (Value::Int32(Some(v)), Value::Boolean(..)) => Value::Boolean(Some(*v != 0)),
            (Value::Boolean(Some(v)), Value::Int32(..)) => Value::Int32(Some(*v as i32)),
            (Value::Boolean(Some(v)), Value::Int64(..)) => Value::Int64(Some(*v as i64)),
            (Value::Int32(Some(v)), Value::Float64(..)) => Value::Float64(Some(*v as f64)),
            (Value::Int64(Some(v)), Value::Float64(..)) => Value::Float64(Some(*v as f64)),
            (Value::Int32(Some(v)), Value::Decimal(..)) => Value::Decimal(Some((*v).into())),
            (Value::Int64(Some(v)), Value::Decimal(..)) => Value::Decimal(Some((*v).into())),
            (Value::Float64(Some(v)), Value::Decimal(..)) => {
                Value::Decimal(Some(Decimal::from_f64(*v).ok_or_else(error)?))
            }
            (Value::Decimal(Some(v)), Value::Float64(..)) => {
                Value::Float64(Some(v.to_f64().ok_or_else(error)?))
            }
            (Value::Decimal(Some(v)), Value::Int64(..)) if v.is_integer() => {
                Value::Int64(Some(v.to_i64().ok_or_else(error)?))
            }
            (Value::Decimal(Some(v)), Value::Int32(..)) if v.is_integer() => {
                Value::Int32(Some(v.to_i32().ok_or_else(error)?))
            }
            (Value::Varchar(Some(v)), Value::Decimal(..)) => {
                Value::Decimal(Some(v.parse().map_err(|_| error())?))
            }
            (Value::Varchar(Some(v)), Value::Date(..)) => {
                Value::Date(Some(<Date as Parse>::parse(v)?))
            }
            (Value::Varchar(Some(v)), Value::Time(..)) => {
                Value::Time(Some(<Time as Parse>::parse(v)?))
            }
            (Value::Varchar(Some(v)), Value::Timestamp(..)) => {
                Value::Timestamp(Some(<PrimitiveDateTime as Parse>::parse(v)?))
            }
            (Value::Varchar(Some(v)), Value::Uuid(..)) => {
                Value::Uuid(Some(Uuid::parse_str(v).map_err(|e| error().context(e))?))
            }
            (Value::Varchar(Some(v)), Value::Blob(..)) => {
                Value::Blob(Some(v.as_bytes().into()))
            }
            (Value::Blob(Some(v)), Value::Uuid(..)) => {
                Value::Uuid(Some(Uuid::from_slice(v).map_err(|e| error().context(e))?))
            }
            (Value::List(Some(items), ..), Value::List(.., inner)) => Value::List(
                Some(
                    items
                        .iter()
                        .cloned()
                        .map(|v| v.try_as(inner))
                        .collect::<Result<_>>()?,
                ),
                inner.clone(),
            ),
            _ => return Err(error()),
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Int32(l), Self::Int32(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => match (l, r) {
                (Some(l), Some(r)) => l.to_bits() == r.to_bits(),
                _ => l.is_none() && r.is_none(),
            },
            (Self::Decimal(l), Self::Decimal(r)) => l == r,
            (Self::Varchar(l), Self::Varchar(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Date(l), Self::Date(r)) => l == r,
            (Self::Time(l), Self::Time(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::Uuid(l), Self::Uuid(r)) => l == r,
            (Self::List(l, ..), Self::List(r, ..)) => l == r && self.same_type(other),
            _ => discriminant(self) == discriminant(other),
        }
    }
}

// Floats compare by bit pattern, which keeps equality reflexive.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(v) => v.hash(state),
            Value::Int32(v) => v.hash(state),
            Value::Int64(v) => v.hash(state),
            Value::Float64(v) => v.map(f64::to_bits).hash(state),
            Value::Decimal(v) => v.hash(state),
            Value::Varchar(v) => v.hash(state),
            Value::Blob(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Time(v) => v.hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
            Value::List(v, ..) => v.hash(state),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("NULL");
        }
        match self {
            Value::Boolean(Some(v)) => write!(f, "{v}"),
            Value::Int32(Some(v)) => write!(f, "{v}"),
            Value::Int64(Some(v)) => write!(f, "{v}"),
            Value::Float64(Some(v)) => write!(f, "{v}"),
            Value::Decimal(Some(v)) => write!(f, "{v}"),
            Value::Varchar(Some(v)) => write!(f, "{v}"),
            Value::Blob(Some(v)) => write!(f, "<{} bytes>", v.len()),
            Value::Date(Some(v)) => write!(f, "{v}"),
            Value::Time(Some(v)) => write!(f, "{v}"),
            Value::Timestamp(Some(v)) => write!(f, "{v}"),
            Value::Uuid(Some(v)) => write!(f, "{v}"),
            Value::List(Some(v), ..) => {
                f.write_str("[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            _ => f.write_str("NULL"),
        }
    }
}
