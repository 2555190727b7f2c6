mod decode_field;
mod decode_mapped;
mod mapped_trait;

use decode_mapped::decode_mapped;
use mapped_trait::mapped_trait;
use proc_macro::TokenStream;
use syn::{ItemStruct, parse_macro_input};

/// Implement `tether::Mapped` for a struct with named fields.
///
/// Type attributes: `#[tether(name = "..", table = "..")]`.
/// Field attributes: `key`, `auto_increment`, `read_only`, `computed`, `lookup`, `transient`,
/// `parent` and `name = ".."`.
#[proc_macro_derive(Mapped, attributes(tether))]
pub fn derive_mapped(input: TokenStream) -> TokenStream {
    let item: ItemStruct = parse_macro_input!(input as ItemStruct);
    let mapped = decode_mapped(item);
    mapped_trait(&mapped).into()
}
