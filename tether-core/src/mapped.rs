use crate::{AsValue, BindingError, Error, MappingError, Registry, Result, TypeDescriptor, Value};
use std::{
    any::{self, Any, TypeId},
    collections::HashMap,
    fmt::{self, Debug},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// A business object persisted by the engine.
///
/// Normally implemented through `#[derive(Mapped)]`. The descriptor returned by
/// [`Mapped::describe`] is built once per [`Registry`] and drives every statement, the
/// remaining methods give the engine access to the object without runtime introspection.
pub trait Mapped: Sized + Send + Sync + 'static {
    /// Simple name of the type, the table name derives from it.
    fn type_name() -> &'static str;

    fn describe(registry: &Registry) -> Result<TypeDescriptor>;

    /// Build an instance from the constructor-supplied properties.
    ///
    /// Arguments must be taken in the order the descriptor declares them.
    fn construct(arguments: &mut Arguments) -> Result<Self>;

    /// Current value of a property, `None` if the type has no such property.
    fn get(&self, property: &str) -> Option<FieldValue>;

    /// Assign a property through its mutator. Returns `false` when the property has none.
    fn set(&mut self, property: &str, value: FieldValue) -> Result<bool>;
}

/// What flows between objects and statements.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Value(Value),
    /// Lookup-typed property, holding the referenced instance if any.
    Reference(Option<Reference>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Value(v) => v.is_null(),
            FieldValue::Reference(v) => v.is_none(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Value(v) => v.type_name(),
            FieldValue::Reference(Some(v)) => v.type_name(),
            FieldValue::Reference(None) => "null reference",
        }
    }

    /// Convert into a plain field type.
    pub fn into_field<T: AsValue>(self) -> Result<T> {
        match self {
            FieldValue::Value(v) => T::try_from_value(v),
            FieldValue::Reference(None) => T::try_from_value(Value::Null),
            FieldValue::Reference(Some(r)) => Err(Error::msg(format!(
                "Cannot convert a reference to `{}` into {}",
                r.type_name(),
                any::type_name::<T>()
            ))),
        }
    }

    /// Convert into a lookup field.
    pub fn into_lookup<L: LookupField>(self) -> Result<L> {
        match self {
            FieldValue::Reference(r) => L::from_reference(r),
            FieldValue::Value(v) if v.is_null() => L::from_reference(None),
            FieldValue::Value(v) => Err(Error::msg(format!(
                "Expected a reference to `{}`, got the {} value {}",
                L::Target::type_name(),
                v.type_name(),
                v
            ))),
        }
    }
}

impl<T: AsValue> From<T> for FieldValue {
    fn from(value: T) -> Self {
        FieldValue::Value(value.as_value())
    }
}

impl From<&'static str> for FieldValue {
    fn from(value: &'static str) -> Self {
        FieldValue::Value(value.into())
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<Reference> for FieldValue {
    fn from(value: Reference) -> Self {
        FieldValue::Reference(Some(value))
    }
}

impl<E: Mapped> From<&Instance<E>> for FieldValue {
    fn from(value: &Instance<E>) -> Self {
        FieldValue::Reference(Some(value.reference()))
    }
}

/// Shared handle to a materialized object.
///
/// The identity cache hands out clones of the same handle for the same key, so two handles
/// designate the same row when [`Instance::ptr_eq`] holds.
pub struct Instance<E>(Arc<RwLock<E>>);

impl<E: Mapped> Instance<E> {
    pub fn new(value: E) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, E> {
        self.0.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, E> {
        self.0.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }

    pub fn reference(&self) -> Reference {
        Reference(self.0.clone())
    }

    pub fn get(&self, property: &str) -> Option<FieldValue> {
        self.read().get(property)
    }
}

impl<E> Clone for Instance<E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<E: Debug> Debug for Instance<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.read() {
            Ok(v) => f.debug_tuple("Instance").field(&*v).finish(),
            Err(..) => f.write_str("Instance(<poisoned>)"),
        }
    }
}

/// Type-erased view of an [`Instance`].
pub trait Referenced: Send + Sync {
    fn target_type(&self) -> TypeId;
    fn type_name(&self) -> &'static str;
    fn property(&self, name: &str) -> Option<FieldValue>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<E: Mapped> Referenced for RwLock<E> {
    fn target_type(&self) -> TypeId {
        TypeId::of::<E>()
    }
    fn type_name(&self) -> &'static str {
        E::type_name()
    }
    fn property(&self, name: &str) -> Option<FieldValue> {
        self.read().unwrap_or_else(|e| e.into_inner()).get(name)
    }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Reference to a materialized object of any mapped type.
#[derive(Clone)]
pub struct Reference(Arc<dyn Referenced>);

impl Reference {
    pub fn target_type(&self) -> TypeId {
        self.0.target_type()
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn property(&self, name: &str) -> Option<FieldValue> {
        self.0.property(name)
    }

    pub fn downcast<E: Mapped>(&self) -> Option<Instance<E>> {
        self.0
            .clone()
            .into_any()
            .downcast::<RwLock<E>>()
            .ok()
            .map(Instance)
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }
}

impl Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({} @ {:p})", self.type_name(), Arc::as_ptr(&self.0))
    }
}

/// Field type of a property holding another identity-cached object.
pub trait LookupField: Sized {
    type Target: Mapped;
    fn from_reference(reference: Option<Reference>) -> Result<Self>;
    fn to_reference(&self) -> Option<Reference>;
}

impl<E: Mapped> LookupField for Option<Instance<E>> {
    type Target = E;
    fn from_reference(reference: Option<Reference>) -> Result<Self> {
        let Some(reference) = reference else {
            return Ok(None);
        };
        reference.downcast::<E>().map(Some).ok_or_else(|| {
            MappingError::ReferenceMismatch {
                property: String::new(),
                expected: E::type_name(),
                actual: reference.type_name(),
            }
            .into()
        })
    }
    fn to_reference(&self) -> Option<Reference> {
        self.as_ref().map(Instance::reference)
    }
}

/// Constructor arguments handed to [`Mapped::construct`].
pub struct Arguments {
    type_name: &'static str,
    values: HashMap<String, FieldValue>,
    position: usize,
}

impl Arguments {
    pub fn new(type_name: &'static str, values: HashMap<String, FieldValue>) -> Self {
        Self {
            type_name,
            values,
            position: 0,
        }
    }

    fn next(&mut self, name: &str) -> (usize, FieldValue) {
        let position = self.position;
        self.position += 1;
        (
            position,
            self.values
                .remove(name)
                .unwrap_or(FieldValue::Value(Value::Null)),
        )
    }

    fn mismatch(&self, name: &str, position: usize, expected: &str, actual: &str) -> Error {
        BindingError::ArgumentMismatch {
            type_name: self.type_name,
            parameter: name.into(),
            position,
            expected: expected.into(),
            actual: actual.into(),
        }
        .into()
    }

    /// Next constructor argument, converted to the parameter type.
    pub fn take<T: AsValue>(&mut self, name: &str) -> Result<T> {
        let (position, value) = self.next(name);
        let actual = value.type_name();
        value.into_field::<T>().map_err(|e| {
            let error = self.mismatch(name, position, any::type_name::<T>(), actual);
            log::debug!("{:#}", e);
            error
        })
    }

    /// Next constructor argument for a lookup-typed parameter.
    pub fn take_reference<L: LookupField>(&mut self, name: &str) -> Result<L> {
        let (position, value) = self.next(name);
        let actual = value.type_name();
        value.into_lookup::<L>().map_err(|e| {
            let error = self.mismatch(name, position, L::Target::type_name(), actual);
            log::debug!("{:#}", e);
            error
        })
    }

    /// Values not consumed by the constructor.
    pub fn into_remaining(self) -> HashMap<String, FieldValue> {
        self.values
    }
}

/// Build an object through its constructor, then assign the remaining writable properties.
pub(crate) fn materialize<E: Mapped>(
    descriptor: &TypeDescriptor,
    values: HashMap<String, FieldValue>,
) -> Result<Instance<E>> {
    let mut arguments = Arguments::new(E::type_name(), values);
    let mut object = E::construct(&mut arguments)?;
    for (name, value) in arguments.into_remaining() {
        if !descriptor.property(&name).is_some_and(|v| v.writable) {
            continue;
        }
        if !object.set(&name, value)? {
            log::debug!("`{}` has no mutator for `{}`", E::type_name(), name);
        }
    }
    Ok(Instance::new(object))
}

/// Assign the writable properties of an existing object.
pub(crate) fn refresh<E: Mapped>(
    descriptor: &TypeDescriptor,
    instance: &Instance<E>,
    values: HashMap<String, FieldValue>,
) -> Result<()> {
    let mut object = instance.write();
    for (name, value) in values {
        if descriptor.property(&name).is_some_and(|v| v.writable) {
            object.set(&name, value)?;
        }
    }
    Ok(())
}
