use crate::{
    decode_field::{FieldKind, FieldMetadata},
    decode_mapped::MappedMetadata,
};
use proc_macro2::TokenStream;
use quote::quote;

fn property_descriptor(field: &FieldMetadata) -> TokenStream {
    let name = &field.name;
    let ty = &field.ty;
    let mut result = match field.kind {
        FieldKind::Value => quote! {
            ::tether::PropertyDescriptor::value(
                #name,
                <#ty as ::tether::AsValue>::as_empty_value(),
            )
            .nullable(<#ty as ::tether::AsValue>::NULLABLE)
        },
        FieldKind::Lookup => quote! {
            ::tether::PropertyDescriptor::reference::<<#ty as ::tether::LookupField>::Target>(#name)
        },
        FieldKind::Transient => quote!(::tether::PropertyDescriptor::transient(#name)),
        FieldKind::Parent => unreachable!("The parent field is not a property"),
    };
    if field.key {
        result = quote!(#result.key());
    }
    if field.auto_increment {
        result = quote!(#result.auto_increment());
    }
    if field.read_only {
        result = quote!(#result.read_only());
    }
    if field.computed {
        result = quote!(#result.computed());
    }
    result
}

pub(crate) fn mapped_trait(mapped: &MappedMetadata) -> TokenStream {
    let struct_name = &mapped.item.ident;
    let type_name = &mapped.type_name;
    let properties = mapped.fields.iter().filter(|v| v.kind != FieldKind::Parent);
    let table = mapped.table.as_ref().map(|v| quote!(.table(#v)));
    let parent = mapped.parent().map(|v| {
        let ty = &v.ty;
        quote!(.parent::<#ty>())
    });
    let property_descriptors = properties.clone().map(property_descriptor);
    let constructor_names = properties
        .clone()
        .filter(|v| v.is_constructor())
        .map(|v| &v.name);

    // Parent first, then the constructor parameters in declaration order
    let construct_parent = mapped.parent().map(|v| {
        let ident = &v.ident;
        let ty = &v.ty;
        quote!(#ident: <#ty as ::tether::Mapped>::construct(arguments)?,)
    });
    let construct_fields = properties.clone().filter(|v| v.is_constructor()).map(|v| {
        let ident = &v.ident;
        let name = &v.name;
        match v.kind {
            FieldKind::Lookup => quote!(#ident: arguments.take_reference(#name)?),
            _ => quote!(#ident: arguments.take(#name)?),
        }
    });
    let construct_defaults = properties
        .clone()
        .filter(|v| !v.is_constructor())
        .map(|v| {
            let ident = &v.ident;
            let ty = &v.ty;
            match v.kind {
                FieldKind::Value => quote!(#ident: <#ty as ::tether::AsValue>::initial()),
                _ => quote!(#ident: ::std::default::Default::default()),
            }
        });

    let get_arms = properties.clone().filter_map(|v| {
        let ident = &v.ident;
        let name = &v.name;
        match v.kind {
            FieldKind::Value => Some(quote! {
                #name => Some(::tether::FieldValue::Value(
                    ::tether::AsValue::as_value(::std::clone::Clone::clone(&self.#ident)),
                ))
            }),
            FieldKind::Lookup => Some(quote! {
                #name => Some(::tether::FieldValue::Reference(
                    ::tether::LookupField::to_reference(&self.#ident),
                ))
            }),
            _ => None,
        }
    });
    let set_arms = properties
        .clone()
        .filter(|v| v.is_writable())
        .map(|v| {
            let ident = &v.ident;
            let name = &v.name;
            match v.kind {
                FieldKind::Lookup => quote!(#name => self.#ident = value.into_lookup()?),
                _ => quote!(#name => self.#ident = value.into_field()?),
            }
        });
    let (get_fallback, set_fallback) = match mapped.parent() {
        Some(parent) => {
            let ident = &parent.ident;
            (
                quote!(::tether::Mapped::get(&self.#ident, property)),
                quote!(return ::tether::Mapped::set(&mut self.#ident, property, value)),
            )
        }
        None => (quote!(None), quote!(return Ok(false))),
    };

    quote! {
        impl ::tether::Mapped for #struct_name {
            fn type_name() -> &'static str {
                #type_name
            }

            fn describe(
                registry: &::tether::Registry,
            ) -> ::tether::Result<::tether::TypeDescriptor> {
                ::tether::TypeDescriptor::builder::<Self>()
                    #table
                    #parent
                    #(.property(#property_descriptors))*
                    .constructor(&[#(#constructor_names),*])
                    .build(registry)
            }

            fn construct(arguments: &mut ::tether::Arguments) -> ::tether::Result<Self> {
                Ok(Self {
                    #construct_parent
                    #(#construct_fields,)*
                    #(#construct_defaults,)*
                })
            }

            fn get(&self, property: &str) -> Option<::tether::FieldValue> {
                match property {
                    #(#get_arms,)*
                    _ => #get_fallback,
                }
            }

            #[allow(unreachable_code, unused_variables)]
            fn set(
                &mut self,
                property: &str,
                value: ::tether::FieldValue,
            ) -> ::tether::Result<bool> {
                match property {
                    #(#set_arms,)*
                    _ => #set_fallback,
                }
                Ok(true)
            }
        }
    }
}
