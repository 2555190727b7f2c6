use crate::decode_field::{FieldKind, FieldMetadata, decode_field};
use quote::ToTokens;
use syn::{Fields, ItemStruct, LitStr, parse::ParseBuffer};

pub(crate) struct MappedMetadata {
    pub(crate) item: ItemStruct,
    pub(crate) type_name: String,
    pub(crate) table: Option<String>,
    pub(crate) fields: Vec<FieldMetadata>,
}

impl MappedMetadata {
    pub(crate) fn parent(&self) -> Option<&FieldMetadata> {
        self.fields.iter().find(|v| v.kind == FieldKind::Parent)
    }
}

pub(crate) fn decode_mapped(item: ItemStruct) -> MappedMetadata {
    if !matches!(item.fields, Fields::Named(..)) {
        panic!("Mapped types must be structs with named fields");
    }
    if !item.generics.params.is_empty() {
        panic!("Mapped types cannot be generic");
    }
    let fields: Vec<_> = item.fields.iter().map(decode_field).collect();
    if fields.iter().filter(|v| v.kind == FieldKind::Parent).count() > 1 {
        panic!("Type `{}` can have at most one parent field", item.ident);
    }
    let mut type_name = item.ident.to_string();
    let mut table = None;
    for attr in &item.attrs {
        let meta = &attr.meta;
        if meta.path().is_ident("tether") {
            let Ok(list) = meta.require_list() else {
                panic!("Error while parsing `tether`, use it like: `#[tether(attribute = value, ..)]`",);
            };
            let _ = list.parse_nested_meta(|arg| {
                if arg.path.is_ident("name") {
                    let Ok(value) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                        panic!("Error while parsing `name`, use it like: `#[tether(name = \"Person\")]`");
                    };
                    type_name = value.value();
                } else if arg.path.is_ident("table") {
                    let Ok(value) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                        panic!("Error while parsing `table`, use it like: `#[tether(table = \"people\")]`");
                    };
                    table = Some(value.value());
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
    MappedMetadata {
        item,
        type_name,
        table,
        fields,
    }
}
