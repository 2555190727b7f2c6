use crate::{FieldValue, Instance, Mapped};
use std::collections::HashMap;

/// Property values handed to insert and bulk update, in insertion order.
///
/// ```rust,ignore
/// let values = Values::new()
///     .with("name", "Ada")
///     .with("salary", Decimal::new(1200, 0))
///     .with_reference("department", &research);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Values(Vec<(String, FieldValue)>);

impl Values {
    pub fn new() -> Self {
        Default::default()
    }

    /// Set a property, replacing a previous value with the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_reference<E: Mapped>(self, name: impl Into<String>, object: &Instance<E>) -> Self {
        self.with(name, object)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Values {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut result = Values::new();
        for (k, v) in iter {
            result.set(k, v);
        }
        result
    }
}

impl IntoIterator for Values {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Values> for HashMap<String, FieldValue> {
    fn from(value: Values) -> Self {
        value.0.into_iter().collect()
    }
}
