use crate::{Error, Result, Value};
use rust_decimal::Decimal;
use std::any;
use time::{
    Date, PrimitiveDateTime, Time,
    macros::{date, datetime},
};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// Every persistent field of a mapped type implements this trait. The empty value doubles as
/// the column prototype: it tells the marshalling layer which variant to bind and which variant
/// to convert driver results into.
///
/// # Examples
/// ```rust
/// use tether_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert!(matches!(v, Value::Int32(Some(42))));
/// let n: i32 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// Whether the type can hold a null.
    const NULLABLE: bool = false;
    /// Typed null of the variant this type maps to.
    fn as_empty_value() -> Value;
    /// Convert into the owned [`Value`] representation.
    fn as_value(self) -> Value;
    /// Convert back from a [`Value`], accepting any variant [`Value::try_as`] can reconcile.
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
    /// Content of a field before its mutator assigns it.
    fn initial() -> Self
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn null_error<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {} {} into {}",
        value.type_name(),
        value,
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value {
    ($source:ty, $variant:path, $initial:expr $(, $into:expr, $from:expr)? $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $variant(None)
            }
            fn initial() -> Self {
                $initial
            }
            fn as_value(self) -> Value {
                let v = self;
                $(let v = ($into)(v);)?
                $variant(Some(v))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                let value = value.try_as(&Self::as_empty_value())?;
                match value {
                    $variant(Some(v)) => {
                        $(let v = ($from)(v)?;)?
                        Ok(v)
                    }
                    _ => Err(null_error::<Self>(&value)),
                }
            }
        }
    };
}

impl_as_value!(bool, Value::Boolean, false);
impl_as_value!(i32, Value::Int32, 0);
impl_as_value!(i64, Value::Int64, 0);
impl_as_value!(f64, Value::Float64, 0.0);
impl_as_value!(Decimal, Value::Decimal, Decimal::ZERO);
impl_as_value!(String, Value::Varchar, String::new());
impl_as_value!(Box<[u8]>, Value::Blob, Box::default());
impl_as_value!(Date, Value::Date, date!(1970 - 01 - 01));
impl_as_value!(Time, Value::Time, Time::MIDNIGHT);
impl_as_value!(PrimitiveDateTime, Value::Timestamp, datetime!(1970-01-01 00:00));
impl_as_value!(Uuid, Value::Uuid, Uuid::nil());
impl_as_value!(
    i16,
    Value::Int32,
    0,
    |v: i16| v as i32,
    |v: i32| i16::try_from(v).map_err(|e| Error::new(e).context(format!("{v} out of range for i16")))
);
impl_as_value!(
    u32,
    Value::Int64,
    0,
    |v: u32| v as i64,
    |v: i64| u32::try_from(v).map_err(|e| Error::new(e).context(format!("{v} out of range for u32")))
);
impl_as_value!(
    f32,
    Value::Float64,
    0.0,
    |v: f32| v as f64,
    |v: f64| Ok::<_, Error>(v as f32)
);

impl<T: AsValue> AsValue for Option<T> {
    const NULLABLE: bool = true;
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn initial() -> Self {
        None
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(if value.is_null() {
            None
        } else {
            Some(<T as AsValue>::try_from_value(value)?)
        })
    }
}

impl<T: AsValue> AsValue for Vec<T> {
    fn as_empty_value() -> Value {
        Value::List(None, Box::new(T::as_empty_value()))
    }
    fn as_value(self) -> Value {
        Value::List(
            Some(self.into_iter().map(AsValue::as_value).collect()),
            Box::new(T::as_empty_value()),
        )
    }
    fn initial() -> Self {
        Vec::new()
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value.try_as(&Self::as_empty_value())? {
            Value::List(Some(items), ..) => items.into_iter().map(T::try_from_value).collect(),
            value => Err(null_error::<Self>(&value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AsValue;
    use crate::Value;
    use rust_decimal::Decimal;
    use time::macros::date;

    #[test]
    fn nullability_follows_option() {
        assert!(!<i32 as AsValue>::NULLABLE);
        assert!(<Option<i32> as AsValue>::NULLABLE);
        assert_eq!(<Option<String>>::as_empty_value(), Value::Varchar(None));
        assert_eq!(None::<i64>.as_value(), Value::Int64(None));
    }

    #[test]
    fn reconciles_driver_shapes() {
        assert_eq!(i32::try_from_value(Value::Int64(Some(7))).unwrap(), 7);
        assert_eq!(
            Decimal::try_from_value(Value::Varchar(Some("12.50".into()))).unwrap(),
            Decimal::new(1250, 2)
        );
        assert_eq!(
            <time::Date>::try_from_value(Value::Varchar(Some("2000-01-01".into()))).unwrap(),
            date!(2000 - 01 - 01)
        );
        assert!(i32::try_from_value(Value::Int32(None)).is_err());
        assert_eq!(
            Option::<i32>::try_from_value(Value::Null).unwrap(),
            None
        );
        assert!(i16::try_from_value(Value::Int32(Some(100_000))).is_err());
    }

    #[test]
    fn lists() {
        let list = vec![1i64, 2, 3].as_value();
        assert_eq!(
            list,
            Value::List(
                Some(vec![
                    Value::Int64(Some(1)),
                    Value::Int64(Some(2)),
                    Value::Int64(Some(3))
                ]),
                Box::new(Value::Int64(None))
            )
        );
        assert_eq!(Vec::<i64>::try_from_value(list).unwrap(), vec![1, 2, 3]);
        assert_eq!(Vec::<i32>::as_empty_value().type_name(), "list");
    }
}
