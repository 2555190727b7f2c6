use crate::{
    Error, FieldValue, Lookups, MappingError, Prepared, PropertyDescriptor, PropertyKind,
    Registry, Result, Value, snake_case,
};
use std::any::TypeId;

/// Persistent property resolved against its column.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub property: &'static str,
    pub nullable: bool,
    pub marshal: Marshal,
}

/// How a property crosses the statement boundary.
#[derive(Debug, Clone)]
pub enum Marshal {
    /// Bound and extracted as the variant of the prototype.
    Scalar(Value),
    /// Another identity-cached type, marshalled through its key.
    Lookup {
        target: TypeId,
        target_name: &'static str,
        key: &'static str,
        prototype: Value,
    },
}

fn is_supported(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::List(.., inner) => {
            !matches!(**inner, Value::List(..) | Value::Blob(..)) && is_supported(inner)
        }
        _ => true,
    }
}

fn scrub(value: Value) -> Value {
    match value {
        Value::Varchar(Some(v)) if v.contains('\0') => Value::Varchar(Some(v.replace('\0', ""))),
        Value::List(Some(v), inner) if matches!(*inner, Value::Varchar(..)) => {
            Value::List(Some(v.into_iter().map(scrub).collect()), inner)
        }
        v => v,
    }
}

impl Marshal {
    /// Pick the marshalling of a persistent property.
    pub fn resolve(
        registry: &Registry,
        type_name: &'static str,
        property: &PropertyDescriptor,
    ) -> Result<Marshal> {
        let unsupported = |value_type| MappingError::UnsupportedType {
            type_name,
            property: property.name.into(),
            value_type,
        };
        match &property.kind {
            PropertyKind::Value(prototype) => {
                if !is_supported(prototype) {
                    return Err(unsupported(prototype.type_name()).into());
                }
                Ok(Marshal::Scalar(prototype.clone()))
            }
            PropertyKind::Reference {
                target,
                target_name,
                describe,
            } => {
                let descriptor = describe(registry)?;
                let key = descriptor.single_key()?;
                let PropertyKind::Value(prototype) = &key.kind else {
                    return Err(unsupported("reference key").into());
                };
                if !is_supported(prototype) {
                    return Err(unsupported(prototype.type_name()).into());
                }
                Ok(Marshal::Lookup {
                    target: *target,
                    target_name: *target_name,
                    key: key.name,
                    prototype: prototype.clone(),
                })
            }
            PropertyKind::Transient => Err(unsupported("transient").into()),
        }
    }

    /// Typed null of the column.
    pub fn prototype(&self) -> &Value {
        match self {
            Marshal::Scalar(v) => v,
            Marshal::Lookup { prototype, .. } => prototype,
        }
    }

    /// Lookup columns are named after the property followed by the referenced key.
    pub fn column_name(&self, property: &str) -> String {
        match self {
            Marshal::Scalar(..) => snake_case(property),
            Marshal::Lookup { key, .. } => format!("{}_{}", snake_case(property), snake_case(key)),
        }
    }

    /// The value to send for `value`.
    pub fn to_value(&self, property: &str, value: FieldValue) -> Result<Value> {
        let value = match (self, value) {
            (Marshal::Scalar(prototype), FieldValue::Value(v)) => v.try_as(prototype)?,
            (Marshal::Scalar(prototype), FieldValue::Reference(None)) => prototype.as_null(),
            (Marshal::Scalar(..), FieldValue::Reference(Some(r))) => {
                return Err(Error::msg(format!(
                    "Property `{}` is not a lookup, cannot bind a reference to `{}`",
                    property,
                    r.type_name()
                )));
            }
            (Marshal::Lookup { prototype, .. }, FieldValue::Reference(None)) => prototype.as_null(),
            (
                Marshal::Lookup {
                    target,
                    target_name,
                    key,
                    prototype,
                },
                FieldValue::Reference(Some(r)),
            ) => {
                if r.target_type() != *target {
                    return Err(MappingError::ReferenceMismatch {
                        property: property.into(),
                        expected: *target_name,
                        actual: r.type_name(),
                    }
                    .into());
                }
                match r.property(key) {
                    Some(FieldValue::Value(v)) => v.try_as(prototype)?,
                    _ => {
                        return Err(Error::msg(format!(
                            "Referenced `{}` does not expose its key `{}`",
                            target_name, key
                        )));
                    }
                }
            }
            // Raw key value
            (Marshal::Lookup { prototype, .. }, FieldValue::Value(v)) => v.try_as(prototype)?,
        };
        Ok(scrub(value))
    }

    pub fn bind<P: Prepared>(
        &self,
        prepared: &mut P,
        index: u64,
        property: &str,
        value: FieldValue,
    ) -> Result<()> {
        let value = self.to_value(property, value)?;
        prepared.bind_index(value, index)?;
        Ok(())
    }

    /// Convert a column value read from a row.
    ///
    /// Nulls become the typed default when the destination cannot hold a null, lookup keys
    /// resolve through the identity cache of the referenced type.
    pub fn extract(&self, value: Value, nullable: bool, lookups: &Lookups) -> Result<FieldValue> {
        match self {
            Marshal::Scalar(prototype) => {
                let value = value.try_as(prototype)?;
                Ok(FieldValue::Value(if value.is_null() && !nullable {
                    prototype.default_of_type().unwrap_or(value)
                } else {
                    value
                }))
            }
            Marshal::Lookup {
                target, prototype, ..
            } => {
                let key = value.try_as(prototype)?;
                if key.is_null() {
                    return Ok(FieldValue::Reference(None));
                }
                Ok(FieldValue::Reference(lookups.reference(*target, &key)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Marshal, is_supported};
    use crate::{FieldValue, Lookups, Value};

    #[test]
    fn supported_prototypes() {
        assert!(is_supported(&Value::Int32(None)));
        assert!(is_supported(&Value::List(None, Box::new(Value::Varchar(None)))));
        assert!(!is_supported(&Value::Null));
        assert!(!is_supported(&Value::List(
            None,
            Box::new(Value::List(None, Box::new(Value::Int32(None))))
        )));
    }

    #[test]
    fn strings_are_scrubbed() {
        let marshal = Marshal::Scalar(Value::Varchar(None));
        assert_eq!(
            marshal
                .to_value("message", Value::Varchar(Some("a\0b\0".into())).into())
                .unwrap(),
            Value::Varchar(Some("ab".into()))
        );
        assert_eq!(
            marshal
                .to_value("message", FieldValue::Reference(None))
                .unwrap(),
            Value::Varchar(None)
        );
    }

    #[test]
    fn null_into_not_nullable() {
        let lookups = Lookups::default();
        let list = Marshal::Scalar(Value::List(None, Box::new(Value::Int32(None))));
        assert!(matches!(
            list.extract(Value::Null, false, &lookups).unwrap(),
            FieldValue::Value(Value::List(Some(v), ..)) if v.is_empty()
        ));
        assert!(matches!(
            list.extract(Value::Null, true, &lookups).unwrap(),
            FieldValue::Value(Value::List(None, ..))
        ));
        let flag = Marshal::Scalar(Value::Boolean(None));
        assert!(matches!(
            flag.extract(Value::Int64(Some(1)), false, &lookups).unwrap(),
            FieldValue::Value(Value::Boolean(Some(true)))
        ));
    }
}
