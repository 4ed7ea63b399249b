// These lints are triggered by darling's generated code for
// `#[darling(default)]`.
#![allow(clippy::option_if_let_else)]
#![allow(clippy::needless_continue)]

use darling::{FromDeriveInput, FromField, FromVariant, ast};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, Ident, Path, parse_macro_input};

/// Configuration for the `#[event_set(...)]` attribute.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(event_set), supports(enum_newtype))]
struct EventSetArgs {
    ident: Ident,
    generics: syn::Generics,
    data: ast::Data<EventVariant, ()>,
    /// Path to the `sequent` crate, for crates that rename it.
    #[darling(default, rename = "crate")]
    krate: Option<Path>,
}

/// One `Variant(Payload)` arm of the enum.
#[derive(Debug, FromVariant)]
struct EventVariant {
    ident: Ident,
    fields: ast::Fields<PayloadField>,
}

#[derive(Debug, FromField)]
struct PayloadField {
    ty: syn::Type,
}

impl EventVariant {
    /// `supports(enum_newtype)` guarantees exactly one field.
    fn payload(&self) -> &syn::Type {
        &self.fields.fields[0].ty
    }
}

/// Parse derive input with darling and render errors as tokens.
fn parse_or_error<T, F>(input: &DeriveInput, f: F) -> TokenStream2
where
    T: FromDeriveInput,
    F: FnOnce(T) -> TokenStream2,
{
    match T::from_derive_input(input) {
        Ok(args) => f(args),
        Err(err) => err.write_errors(),
    }
}

/// Derives `EventSet` for an enum whose variants each wrap one payload type.
///
/// Every payload must implement `EventData`. The derive generates:
/// - `EventSet`, dispatching discriminator, version and encoding to the
///   wrapped payload, and registering every payload with a `Registry`
/// - `From<Payload>` for each variant, which registration relies on
///
/// Each payload type may appear in only one variant.
///
/// # Attributes
///
/// ## Optional
/// - `crate = "path"` - Path to the `sequent` crate (default: `::sequent`)
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, Debug, EventSet)]
/// pub enum OrderEvent {
///     Placed(OrderPlaced),
///     Cancelled(OrderCancelled),
/// }
/// ```
#[proc_macro_derive(EventSet, attributes(event_set))]
pub fn derive_event_set(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    derive_event_set_impl(&input).into()
}

/// Internal entry point that returns tokens for the event set derive.
fn derive_event_set_impl(input: &DeriveInput) -> TokenStream2 {
    parse_or_error::<EventSetArgs, _>(input, |args| generate_event_set_impl(args, input))
}

/// Generate the event set derive implementation tokens.
fn generate_event_set_impl(args: EventSetArgs, input: &DeriveInput) -> TokenStream2 {
    let variants = match args.data {
        ast::Data::Enum(variants) => variants,
        ast::Data::Struct(_) => {
            return darling::Error::unsupported_shape("struct")
                .with_span(&input.ident)
                .write_errors();
        }
    };

    if variants.is_empty() {
        return darling::Error::custom("EventSet requires at least one payload variant")
            .with_span(&input.ident)
            .write_errors();
    }

    let krate = args
        .krate
        .map_or_else(|| quote!(::sequent), |path| quote!(#path));
    let enum_name = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();

    let variant_names: Vec<&Ident> = variants.iter().map(|v| &v.ident).collect();
    let payloads: Vec<&syn::Type> = variants.iter().map(EventVariant::payload).collect();

    quote! {
        #(
            impl #impl_generics ::core::convert::From<#payloads> for #enum_name #ty_generics
            #where_clause
            {
                fn from(payload: #payloads) -> Self {
                    Self::#variant_names(payload)
                }
            }
        )*

        impl #impl_generics #krate::event::EventSet for #enum_name #ty_generics #where_clause {
            const EVENT_TYPES: &'static [&'static str] = &[
                #(<#payloads as #krate::event::EventData>::EVENT_TYPE),*
            ];

            fn event_type(&self) -> &'static str {
                match self {
                    #(Self::#variant_names(_) => {
                        <#payloads as #krate::event::EventData>::EVENT_TYPE
                    }),*
                }
            }

            fn version(&self) -> u32 {
                match self {
                    #(Self::#variant_names(_) => {
                        <#payloads as #krate::event::EventData>::VERSION
                    }),*
                }
            }

            fn encode(
                &self,
            ) -> ::core::result::Result<
                ::std::boxed::Box<#krate::__private::serde_json::value::RawValue>,
                #krate::__private::serde_json::Error,
            > {
                match self {
                    #(Self::#variant_names(payload) => {
                        #krate::__private::serde_json::value::to_raw_value(payload)
                    }),*
                }
            }

            fn register_all(registry: &mut #krate::registry::Registry<Self>) {
                #(
                    registry.register::<#payloads>();
                )*
            }
        }
    }
}
