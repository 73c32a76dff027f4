use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_error::{abort_call_site, proc_macro_error, ResultExt};
use quote::{quote, ToTokens};
use syn::{self, ext::IdentExt, Attribute, DataEnum, DataStruct, DeriveInput, Fields, Variant};

fn has_attr(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|a| match a.path.get_ident() {
        None => false,
        Some(ident) => ident.unraw().to_string().eq(name),
    })
}

fn find_attr_field<'a>(fields: &'a Fields, name: &str) -> Option<&'a Ident> {
    let fields = fields
        .iter()
        .filter(|f| has_attr(&f.attrs, name))
        .collect::<Vec<_>>();
    match fields.len() {
        0 => None,
        1 => fields[0].ident.as_ref(),
        _ => abort_call_site!(format!("Multiple fields found with attribute #[{name}]")),
    }
}

/// Implements `MIDIEvent` for an event struct, plus inherent `channel()`/`key()`
/// getters when a field is tagged with `#[channel]`/`#[key]`.
#[proc_macro_derive(MIDIEvent, attributes(key, channel))]
#[proc_macro_error]
pub fn midi_event(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect_or_abort("Couldn't parse for MIDIEvent");

    let name = &ast.ident;
    let generics = &ast.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match ast.data {
        syn::Data::Struct(DataStruct { ref fields, .. }) => fields,
        _ => abort_call_site!("#[derive(MIDIEvent)] is only defined for structs, not for enums!"),
    };

    let key_field = find_attr_field(fields, "key");
    let channel_field = find_attr_field(fields, "channel");

    if key_field.is_some() && channel_field.is_none() {
        abort_call_site!("Key events must also have a channel (use #[channel] along with #[key])!");
    }

    let mut generated_impl = Vec::new();
    let mut generated_trait_impl = Vec::new();

    match key_field {
        None => {
            generated_trait_impl.push(quote! {
                #[inline(always)]
                fn key(&self) -> Option<u8> {
                    None
                }
            });
        }
        Some(ident) => {
            generated_impl.push(quote! {
                #[inline(always)]
                pub fn key(&self) -> u8 {
                    self.#ident
                }
            });

            generated_trait_impl.push(quote! {
                #[inline(always)]
                fn key(&self) -> Option<u8> {
                    Some(self.#ident)
                }
            });
        }
    }

    match channel_field {
        None => {
            generated_trait_impl.push(quote! {
                #[inline(always)]
                fn channel(&self) -> Option<u8> {
                    None
                }
            });
        }
        Some(ident) => {
            generated_impl.push(quote! {
                #[inline(always)]
                pub fn channel(&self) -> u8 {
                    self.#ident
                }
            });

            generated_trait_impl.push(quote! {
                #[inline(always)]
                fn channel(&self) -> Option<u8> {
                    Some(self.#ident)
                }
            });
        }
    }

    let gen = quote! {
        impl #impl_generics MIDIEvent for #name #ty_generics #where_clause {
            #(#generated_trait_impl)*
        }

        impl #impl_generics #name #ty_generics #where_clause {
            #(#generated_impl)*
        }
    };

    gen.into()
}

fn event_enum_from_struct(name: &Ident) -> Ident {
    let event_name = name.unraw().to_string();
    let event_name = event_name.strip_suffix("Event").unwrap_or(&event_name);
    Ident::new(event_name, name.span())
}

fn event_struct_from_enum(name: &Ident) -> Ident {
    let event_name = name.unraw().to_string() + "Event";
    Ident::new(&event_name, name.span())
}

/// Generates `new` for an event struct, and `Event::new_*`/`Event::new_delta_*`
/// constructors that wrap it.
#[proc_macro_derive(NewEvent)]
#[proc_macro_error]
pub fn create_new_event(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect_or_abort("Couldn't parse for NewEvent");

    let name = &ast.ident;
    let generics = &ast.generics;
    let (impl_generics, _ty_generics, where_clause) = generics.split_for_impl();

    let fields = match ast.data {
        syn::Data::Struct(DataStruct { ref fields, .. }) => fields,
        _ => abort_call_site!("#[derive(NewEvent)] is only defined for structs, not for enums!"),
    };

    let mut new_args = Vec::new();
    let mut assign = Vec::new();

    let event_ident = event_enum_from_struct(name);
    let snake_case = name.unraw().to_string().to_case(Case::Snake);
    let new_ident = Ident::new(&format!("new_{snake_case}"), Span::call_site());
    let new_delta_ident = Ident::new(&format!("new_delta_{snake_case}"), Span::call_site());

    let doc_str = &format!("Creates a new `{name}`.");
    let doc_str_event = &format!(
        "Creates a new [`{name}`](crate::events::{name}) wrapped in [`Event::{ident}`](crate::events::Event::{ident}).",
        ident = event_ident.unraw(),
    );
    let doc_str_delta = &format!(
        "Creates a new [`{name}`](crate::events::{name}) wrapped in [`Event::{ident}`](crate::events::Event::{ident}), preceded by a delta time.",
        ident = event_ident.unraw(),
    );

    for field in fields.iter() {
        if let Some(ident) = &field.ident {
            let ty = &field.ty;
            new_args.push(quote! {#ident: #ty,});
            assign.push(quote! {#ident,});
        }
    }

    let gen = quote! {
        impl #impl_generics #name #where_clause {
            #[doc=#doc_str]
            #[inline(always)]
            pub fn new(#(#new_args)*) -> Self {
                Self {
                    #(#assign)*
                }
            }
        }

        impl Event {
            #[doc=#doc_str_event]
            #[inline(always)]
            pub fn #new_ident(#(#new_args)*) -> Event {
                (#name :: new(#(#assign)*)).as_event()
            }

            #[doc=#doc_str_delta]
            #[inline(always)]
            pub fn #new_delta_ident(delta: u64, #(#new_args)*) -> Delta<Event> {
                Delta::new(delta, (#name :: new(#(#assign)*)).as_event())
            }
        }
    };

    gen.into()
}

/// Implements `Clone` and `MIDIEvent` for the event enum by dispatching to the
/// wrapped structs, and generates `as_event` on each wrapped struct.
#[proc_macro_derive(EventImpl, attributes(channel, key))]
#[proc_macro_error]
pub fn event_impl(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect_or_abort("Couldn't parse for EventImpl");

    let name = &ast.ident;
    let generics = &ast.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let variants = match ast.data {
        syn::Data::Enum(DataEnum { ref variants, .. }) => variants.iter().collect::<Vec<_>>(),
        _ => abort_call_site!("#[derive(EventImpl)] is only defined for enums, not for structs!"),
    };

    fn is_boxed(variant: &Variant) -> bool {
        let field = match variant.fields.iter().next() {
            Some(field) => field,
            None => abort_call_site!("Event variants must wrap exactly one event struct"),
        };
        let mut tokens = TokenStream2::new();
        field.ty.to_tokens(&mut tokens);
        tokens.to_string().starts_with("Box <")
    }

    fn match_all(
        name: &Ident,
        variants: &[&Variant],
        map: impl Fn(&Variant) -> TokenStream2,
    ) -> TokenStream2 {
        let lines = variants.iter().map(|v| {
            let ident = &v.ident;
            let res = map(v);
            quote! {
                #name::#ident(event) => #res,
            }
        });
        quote! {
            match self {
                #(#lines)*
            }
        }
    }

    let clone_match = match_all(name, &variants, |v| {
        let ident = &v.ident;
        if is_boxed(v) {
            quote! { #name::#ident(Box::new(event.as_ref().clone())) }
        } else {
            quote! { #name::#ident(event.clone()) }
        }
    });

    let key_match = match_all(name, &variants, |v| {
        if has_attr(&v.attrs, "key") {
            quote! { Some(event.key()) }
        } else {
            quote! { None }
        }
    });

    let channel_match = match_all(name, &variants, |v| {
        if has_attr(&v.attrs, "channel") {
            quote! { Some(event.channel()) }
        } else {
            quote! { None }
        }
    });

    let mut event_wrap_impl = Vec::new();
    for variant in variants.iter() {
        let ident = &variant.ident;
        let struct_ident = event_struct_from_enum(ident);
        let doc_str = &format!(
            "Wraps the `{}` in a `{}::{}`.",
            struct_ident.unraw(),
            name.unraw(),
            ident.unraw()
        );
        let wrapped = if is_boxed(variant) {
            quote! { #name::#ident(Box::new(self)) }
        } else {
            quote! { #name::#ident(self) }
        };
        event_wrap_impl.push(quote! {
            impl #struct_ident {
                #[doc=#doc_str]
                #[inline(always)]
                pub fn as_event(self) -> #name #ty_generics {
                    #wrapped
                }
            }
        });
    }

    let gen = quote! {
        impl #impl_generics Clone for #name #ty_generics #where_clause {
            #[inline(always)]
            fn clone(&self) -> #name #ty_generics {
                #clone_match
            }
        }

        impl #impl_generics MIDIEvent for #name #ty_generics #where_clause {
            #[inline(always)]
            #[allow(unused_variables)]
            fn key(&self) -> Option<u8> {
                #key_match
            }

            #[inline(always)]
            #[allow(unused_variables)]
            fn channel(&self) -> Option<u8> {
                #channel_match
            }
        }

        #(#event_wrap_impl)*
    };

    gen.into()
}
