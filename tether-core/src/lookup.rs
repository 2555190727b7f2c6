use crate::{
    FieldValue, Instance, Mapped, Reference, Result, TypeDescriptor, Value,
    mapped::{materialize, refresh},
};
use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

/// Type-erased identity cache.
pub trait AnyCache: Send + Sync {
    fn key(&self) -> &'static str;
    fn reference(&self, key: &Value) -> Option<Reference>;
    fn reconcile(
        &mut self,
        descriptor: &TypeDescriptor,
        key: Value,
        values: HashMap<String, FieldValue>,
    ) -> Result<Reference>;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Key to instance map of one mapped type.
///
/// Last write wins, entries are never evicted.
pub struct IdentityCache<E> {
    key: &'static str,
    prototype: Value,
    entries: HashMap<Value, Instance<E>>,
}

impl<E: Mapped> IdentityCache<E> {
    pub fn new(key: &'static str, prototype: Value) -> Self {
        Self {
            key,
            prototype,
            entries: HashMap::new(),
        }
    }

    /// Name of the key property.
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Key values are compared after conversion to the key variant, `5_i32` finds `5_i64`.
    pub fn normalize(&self, key: Value) -> Result<Value> {
        key.try_as(&self.prototype)
    }

    pub fn get(&self, key: &Value) -> Option<Instance<E>> {
        let key = self.normalize(key.clone()).ok()?;
        self.entries.get(&key).cloned()
    }

    /// Cache the instance under `key`. Null keys identify nothing and are skipped.
    pub fn insert(&mut self, key: Value, instance: Instance<E>) -> Result<()> {
        let key = self.normalize(key)?;
        if key.is_null() {
            log::debug!("`{}` without a key is not cached", E::type_name());
            return Ok(());
        }
        self.entries.insert(key, instance);
        Ok(())
    }

    /// Refresh the instance cached under `key` with the row values, or materialize and cache a
    /// new one.
    pub fn reconcile(
        &mut self,
        descriptor: &TypeDescriptor,
        key: Value,
        values: HashMap<String, FieldValue>,
    ) -> Result<Instance<E>> {
        if let Some(instance) = self.get(&key) {
            refresh(descriptor, &instance, values)?;
            return Ok(instance);
        }
        let instance = materialize::<E>(descriptor, values)?;
        self.insert(key, instance.clone())?;
        Ok(instance)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<E: Mapped> AnyCache for IdentityCache<E> {
    fn key(&self) -> &'static str {
        self.key
    }
    fn reference(&self, key: &Value) -> Option<Reference> {
        self.get(key).map(|v| v.reference())
    }
    fn reconcile(
        &mut self,
        descriptor: &TypeDescriptor,
        key: Value,
        values: HashMap<String, FieldValue>,
    ) -> Result<Reference> {
        IdentityCache::reconcile(self, descriptor, key, values).map(|v| v.reference())
    }
    fn len(&self) -> usize {
        self.entries.len()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Identity caches of one connection, one per registered type.
#[derive(Default)]
pub struct Lookups {
    caches: HashMap<TypeId, Box<dyn AnyCache>>,
}

impl Lookups {
    pub fn new() -> Self {
        Default::default()
    }

    /// Start tracking `E`, keeping the current cache if already registered.
    pub fn register<E: Mapped>(&mut self, key: &'static str, prototype: Value) {
        self.caches
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(IdentityCache::<E>::new(key, prototype)));
    }

    pub fn is_registered(&self, type_id: TypeId) -> bool {
        self.caches.contains_key(&type_id)
    }

    pub fn cache<E: Mapped>(&self) -> Option<&IdentityCache<E>> {
        self.caches
            .get(&TypeId::of::<E>())?
            .as_any()
            .downcast_ref::<IdentityCache<E>>()
    }

    pub fn cache_mut<E: Mapped>(&mut self) -> Option<&mut IdentityCache<E>> {
        self.caches
            .get_mut(&TypeId::of::<E>())?
            .as_any_mut()
            .downcast_mut::<IdentityCache<E>>()
    }

    /// Cached instance of the type identified by `target`.
    pub fn reference(&self, target: TypeId, key: &Value) -> Option<Reference> {
        self.caches.get(&target)?.reference(key)
    }

    /// Key property of a tracked type.
    pub fn key_of(&self, target: TypeId) -> Option<&'static str> {
        self.caches.get(&target).map(|v| v.key())
    }

    /// [`IdentityCache::reconcile`] on the cache of the type identified by `target`.
    pub fn reconcile(
        &mut self,
        target: TypeId,
        descriptor: &TypeDescriptor,
        key: Value,
        values: HashMap<String, FieldValue>,
    ) -> Result<Option<Reference>> {
        let Some(cache) = self.caches.get_mut(&target) else {
            return Ok(None);
        };
        cache.reconcile(descriptor, key, values).map(Some)
    }

    /// Number of cached instances across all types.
    pub fn len(&self) -> usize {
        self.caches.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached instance and registration.
    pub fn clear(&mut self) {
        self.caches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::Lookups;
    use crate::{
        Arguments, FieldValue, Instance, Mapped, PropertyDescriptor, Registry, Result,
        TypeDescriptor, Value,
    };
    use std::{any::TypeId, collections::HashMap};

    struct Country {
        code: i64,
    }

    impl Mapped for Country {
        fn type_name() -> &'static str {
            "Country"
        }
        fn describe(registry: &Registry) -> Result<TypeDescriptor> {
            TypeDescriptor::builder::<Self>()
                .property(PropertyDescriptor::value("code", Value::Int64(None)).key())
                .constructor(&["code"])
                .build(registry)
        }
        fn construct(arguments: &mut Arguments) -> Result<Self> {
            Ok(Self {
                code: arguments.take("code")?,
            })
        }
        fn get(&self, property: &str) -> Option<FieldValue> {
            match property {
                "code" => Some(self.code.into()),
                _ => None,
            }
        }
        fn set(&mut self, _property: &str, _value: FieldValue) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn keys_are_normalized() {
        let mut lookups = Lookups::new();
        assert!(lookups.cache::<Country>().is_none());
        lookups.register::<Country>("code", Value::Int64(None));
        let italy = Instance::new(Country { code: 39 });
        lookups
            .cache_mut::<Country>()
            .unwrap()
            .insert(Value::Int64(Some(39)), italy.clone())
            .unwrap();
        let found = lookups
            .cache::<Country>()
            .unwrap()
            .get(&Value::Int32(Some(39)))
            .unwrap();
        assert!(Instance::ptr_eq(&found, &italy));
        assert!(
            lookups
                .reference(TypeId::of::<Country>(), &Value::Varchar(Some("x".into())))
                .is_none()
        );
        assert_eq!(lookups.len(), 1);
        lookups.clear();
        assert!(lookups.is_empty());
        assert!(!lookups.is_registered(TypeId::of::<Country>()));
    }

    #[test]
    fn null_keys_are_not_cached() {
        let mut lookups = Lookups::new();
        lookups.register::<Country>("code", Value::Int64(None));
        let cache = lookups.cache_mut::<Country>().unwrap();
        cache
            .insert(Value::Int64(None), Instance::new(Country { code: 0 }))
            .unwrap();
        cache
            .insert(Value::Null, Instance::new(Country { code: 0 }))
            .unwrap();
        assert!(cache.get(&Value::Int64(None)).is_none());
        assert_eq!(lookups.len(), 0);
    }

    #[test]
    fn rows_reconcile_to_one_instance() {
        let registry = Registry::new();
        let descriptor = registry.descriptor_for::<Country>().unwrap();
        let mut lookups = Lookups::new();
        lookups.register::<Country>("code", Value::Int64(None));
        assert_eq!(lookups.key_of(TypeId::of::<Country>()), Some("code"));
        let values = || HashMap::from([("code".to_string(), FieldValue::from(44_i64))]);
        let cache = lookups.cache_mut::<Country>().unwrap();
        let first = cache
            .reconcile(&descriptor, Value::Int64(Some(44)), values())
            .unwrap();
        let second = cache
            .reconcile(&descriptor, Value::Int32(Some(44)), values())
            .unwrap();
        assert!(Instance::ptr_eq(&first, &second));
        assert_eq!(first.read().code, 44);
        assert_eq!(lookups.len(), 1);
        assert!(
            lookups
                .reconcile(
                    TypeId::of::<Country>(),
                    &descriptor,
                    Value::Int64(Some(44)),
                    values()
                )
                .unwrap()
                .is_some()
        );
        assert_eq!(lookups.len(), 1);
        assert!(lookups.key_of(TypeId::of::<String>()).is_none());
    }
}
