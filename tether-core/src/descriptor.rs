use crate::{
    Column, Mapped, MappingError, Marshal, Registry, Result, Value, pascal_case,
    snake_case,
};
use std::{any::TypeId, collections::HashSet, fmt, sync::Arc};

/// How a property gets its value at insert time.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initialization {
    #[default]
    Manual,
    /// Supplied by the `schema.TypeProperty` sequence.
    AutoIncrement,
}

type Describe = fn(&Registry) -> Result<Arc<TypeDescriptor>>;

#[derive(Clone)]
pub enum PropertyKind {
    /// Scalar or collection value, described by its typed null.
    Value(Value),
    /// Another mapped type, stored through that type's key.
    Reference {
        target: TypeId,
        target_name: &'static str,
        describe: Describe,
    },
    /// Not persisted.
    Transient,
}

impl fmt::Debug for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::Value(v) => f.debug_tuple("Value").field(v).finish(),
            PropertyKind::Reference { target_name, .. } => {
                f.debug_tuple("Reference").field(target_name).finish()
            }
            PropertyKind::Transient => f.write_str("Transient"),
        }
    }
}

/// One mapped attribute of a type.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub key: bool,
    pub persistent: bool,
    pub initialization: Initialization,
    /// Has a mutator.
    pub writable: bool,
    pub nullable: bool,
    /// Filled by the database: selected, never inserted nor updated.
    pub computed: bool,
}

impl PropertyDescriptor {
    fn new(name: &'static str, kind: PropertyKind) -> Self {
        Self {
            name,
            persistent: !matches!(kind, PropertyKind::Transient),
            kind,
            key: false,
            initialization: Initialization::Manual,
            writable: true,
            nullable: false,
            computed: false,
        }
    }

    pub fn value(name: &'static str, prototype: Value) -> Self {
        Self::new(name, PropertyKind::Value(prototype))
    }

    pub fn reference<T: Mapped>(name: &'static str) -> Self {
        Self::new(
            name,
            PropertyKind::Reference {
                target: TypeId::of::<T>(),
                target_name: T::type_name(),
                describe: Registry::descriptor_for::<T>,
            },
        )
        .nullable(true)
    }

    pub fn transient(name: &'static str) -> Self {
        Self::new(name, PropertyKind::Transient)
    }

    /// Part of the object identity, implies read only.
    pub fn key(mut self) -> Self {
        self.key = true;
        self.writable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.initialization = Initialization::AutoIncrement;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, PropertyKind::Reference { .. })
    }
}

/// Cached shape of a mapped type.
///
/// Immutable once built. Properties inherited from the parent come first in every derived
/// set, followed by the type's own properties in declaration order.
#[derive(Debug)]
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    table_name: String,
    parent: Option<Arc<TypeDescriptor>>,
    own: Vec<PropertyDescriptor>,
    all: Vec<PropertyDescriptor>,
    keys: Vec<usize>,
    persistent: Vec<usize>,
    constructor: Vec<&'static str>,
}

impl TypeDescriptor {
    pub fn builder<T: Mapped>() -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
            table_name: None,
            parents: Vec::new(),
            properties: Vec::new(),
            constructors: Vec::new(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn parent(&self) -> Option<&Arc<TypeDescriptor>> {
        self.parent.as_ref()
    }

    /// Properties declared directly on the type.
    pub fn own_properties(&self) -> &[PropertyDescriptor] {
        &self.own
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.all
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.all.iter().find(|v| v.name == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PropertyDescriptor> + Clone {
        self.keys.iter().map(|i| &self.all[*i])
    }

    pub fn persistent(&self) -> impl Iterator<Item = &PropertyDescriptor> + Clone {
        self.persistent.iter().map(|i| &self.all[*i])
    }

    /// Constructor-supplied property names, parent parameters first.
    pub fn constructor(&self) -> &[&'static str] {
        &self.constructor
    }

    /// The single key property, as required by identity caching.
    pub fn single_key(&self) -> Result<&PropertyDescriptor> {
        match self.keys.len() {
            0 => Err(MappingError::MissingKey {
                type_name: self.type_name,
            }
            .into()),
            1 => Ok(&self.all[self.keys[0]]),
            count => Err(MappingError::MultipleKeys {
                type_name: self.type_name,
                count,
            }
            .into()),
        }
    }

    /// Name of the sequence feeding an auto-increment property.
    pub fn sequence_name(&self, schema: &str, property: &str) -> String {
        let name = format!("{}{}", self.type_name, pascal_case(property));
        if schema.is_empty() {
            name
        } else {
            format!("{schema}.{name}")
        }
    }

    /// Resolve the column of a persistent property.
    pub fn column(&self, registry: &Registry, name: &str) -> Result<Column> {
        let property = self
            .property(name)
            .filter(|v| v.persistent)
            .ok_or_else(|| MappingError::UnknownProperty {
                type_name: self.type_name,
                property: name.into(),
            })?;
        let marshal = Marshal::resolve(registry, self.type_name, property)?;
        Ok(Column {
            name: marshal.column_name(property.name),
            property: property.name,
            nullable: property.nullable,
            marshal,
        })
    }

    /// Columns of every persistent property.
    pub fn columns(&self, registry: &Registry) -> Result<Vec<Column>> {
        self.persistent()
            .map(|v| self.column(registry, v.name))
            .collect()
    }
}

pub struct TypeDescriptorBuilder {
    type_id: TypeId,
    type_name: &'static str,
    table_name: Option<String>,
    parents: Vec<Describe>,
    properties: Vec<PropertyDescriptor>,
    constructors: Vec<Vec<&'static str>>,
}

impl TypeDescriptorBuilder {
    /// Override the table name, defaults to the snake case type name.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn parent<P: Mapped>(mut self) -> Self {
        self.parents.push(Registry::descriptor_for::<P>);
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Declare the key-initializing constructor by its parameter names.
    pub fn constructor(mut self, parameters: &[&'static str]) -> Self {
        self.constructors.push(parameters.to_vec());
        self
    }

    pub fn build(self, registry: &Registry) -> Result<TypeDescriptor> {
        let type_name = self.type_name;
        let parent = match self.parents.as_slice() {
            [] => None,
            [describe] => Some(describe(registry)?),
            _ => return Err(MappingError::MultipleParents { type_name }.into()),
        };
        let own_constructor = match self.constructors.len() {
            0 => return Err(MappingError::MissingConstructor { type_name }.into()),
            1 => self.constructors.into_iter().next().unwrap_or_default(),
            _ => return Err(MappingError::AmbiguousConstructor { type_name }.into()),
        };
        let mut all: Vec<PropertyDescriptor> = parent
            .as_ref()
            .map(|v| v.all.clone())
            .unwrap_or_default();
        let mut names: HashSet<&'static str> = all.iter().map(|v| v.name).collect();
        for property in &self.properties {
            if !names.insert(property.name) {
                return Err(MappingError::DuplicateProperty {
                    type_name,
                    property: property.name.into(),
                }
                .into());
            }
            all.push(property.clone());
        }
        let mut constructor: Vec<&'static str> = parent
            .as_ref()
            .map(|v| v.constructor.clone())
            .unwrap_or_default();
        for name in own_constructor {
            if !names.contains(name) {
                return Err(MappingError::UnknownProperty {
                    type_name,
                    property: name.into(),
                }
                .into());
            }
            constructor.push(name);
        }
        let keys = (0..all.len()).filter(|i| all[*i].key).collect();
        let persistent = (0..all.len()).filter(|i| all[*i].persistent).collect();
        for property in all.iter().filter(|v| v.persistent) {
            if let PropertyKind::Reference { target, .. } = &property.kind
                && registry.is_building(*target)
            {
                // Cyclic reference, checked when the statement is built
                continue;
            }
            Marshal::resolve(registry, type_name, property).map_err(|e| {
                log::error!("{:#}", e);
                e
            })?;
        }
        Ok(TypeDescriptor {
            type_id: self.type_id,
            type_name,
            table_name: self.table_name.unwrap_or_else(|| snake_case(type_name)),
            parent,
            own: self.properties,
            all,
            keys,
            persistent,
            constructor,
        })
    }
}
