use crate::{Error, Mapped, Result, TypeDescriptor};
use std::{
    any::TypeId,
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, RwLock},
    thread::{self, ThreadId},
};

/// Memoized type descriptors, keyed by type identity.
///
/// Created once at start-up and shared by every connection through an `Arc`.
#[derive(Default, Debug)]
pub struct Registry {
    descriptors: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
    building: Mutex<HashSet<(TypeId, ThreadId)>>,
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Descriptor of `T`, built on first request.
    pub fn descriptor_for<T: Mapped>(&self) -> Result<Arc<TypeDescriptor>> {
        let type_id = TypeId::of::<T>();
        if let Some(descriptor) = self.get(type_id) {
            return Ok(descriptor);
        }
        let building = (type_id, thread::current().id());
        if !self
            .building
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(building)
        {
            return Err(Error::msg(format!(
                "Type `{}` is referenced while it is being described",
                T::type_name()
            )));
        }
        log::debug!("Describing {}", T::type_name());
        let result = T::describe(self);
        self.building
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&building);
        let descriptor = Arc::new(result?);
        let mut descriptors = self.descriptors.write().unwrap_or_else(|e| e.into_inner());
        Ok(descriptors.entry(type_id).or_insert(descriptor).clone())
    }

    /// Descriptor of an already described type.
    pub fn get(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.descriptors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&type_id)
            .cloned()
    }

    /// Whether the current thread is in the middle of describing the type.
    pub fn is_building(&self, type_id: TypeId) -> bool {
        self.building
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(type_id, thread::current().id()))
    }
}
