use quote::ToTokens;
use syn::{Field, Ident, LitStr, Type, parse::ParseBuffer};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    #[default]
    Value,
    Lookup,
    Transient,
    Parent,
}

pub(crate) struct FieldMetadata {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    /// Property name.
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) key: bool,
    pub(crate) auto_increment: bool,
    pub(crate) read_only: bool,
    pub(crate) computed: bool,
}

impl FieldMetadata {
    /// Supplied through the constructor rather than a mutator.
    pub(crate) fn is_constructor(&self) -> bool {
        matches!(self.kind, FieldKind::Value | FieldKind::Lookup) && (self.key || self.read_only)
    }

    pub(crate) fn is_writable(&self) -> bool {
        matches!(self.kind, FieldKind::Value | FieldKind::Lookup) && !self.key && !self.read_only
    }
}

pub(crate) fn decode_field(field: &Field) -> FieldMetadata {
    let ident = field
        .ident
        .clone()
        .expect("Field is expected to have a name");
    let mut name = ident.to_string();
    if name.starts_with('_') {
        name.remove(0);
    }
    let mut metadata = FieldMetadata {
        ident,
        ty: field.ty.clone(),
        name,
        kind: FieldKind::Value,
        key: false,
        auto_increment: false,
        read_only: false,
        computed: false,
    };
    let set_kind = |kind: FieldKind, metadata: &mut FieldMetadata| {
        if metadata.kind != FieldKind::Value {
            panic!(
                "Field `{}` can be just one of `lookup`, `transient` or `parent`",
                metadata.ident
            );
        }
        metadata.kind = kind;
    };
    for attr in &field.attrs {
        let meta = &attr.meta;
        if meta.path().is_ident("tether") {
            let Ok(list) = meta.require_list() else {
                panic!(
                    "Error while parsing `tether`, use it like: `#[tether(attribute, ...)]`",
                );
            };
            let _ = list.parse_nested_meta(|arg| {
                if arg.path.is_ident("name") {
                    let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                        panic!("Error while parsing `name`, use it like: `#[tether(name = \"property\")]`");
                    };
                    metadata.name = v.value();
                } else if arg.path.is_ident("key") {
                    metadata.key = true;
                } else if arg.path.is_ident("auto_increment") {
                    metadata.auto_increment = true;
                } else if arg.path.is_ident("read_only") {
                    metadata.read_only = true;
                } else if arg.path.is_ident("computed") {
                    metadata.computed = true;
                } else if arg.path.is_ident("lookup") {
                    set_kind(FieldKind::Lookup, &mut metadata);
                } else if arg.path.is_ident("transient") {
                    set_kind(FieldKind::Transient, &mut metadata);
                } else if arg.path.is_ident("parent") {
                    set_kind(FieldKind::Parent, &mut metadata);
                } else {
                    panic!(
                        "Unknown attribute `{}` inside tether macro",
                        arg.path.to_token_stream().to_string()
                    );
                }
                Ok(())
            });
        }
    }
    if metadata.kind == FieldKind::Transient && (metadata.key || metadata.auto_increment) {
        panic!("Transient field `{}` cannot be a key", metadata.ident);
    }
    if metadata.kind == FieldKind::Parent
        && (metadata.key || metadata.read_only || metadata.auto_increment || metadata.computed)
    {
        panic!(
            "Parent field `{}` accepts no other attribute, declare them on the parent type",
            metadata.ident
        );
    }
    metadata
}
