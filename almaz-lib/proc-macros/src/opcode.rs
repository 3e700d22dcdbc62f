use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, ItemEnum};

struct VariantInfo<'a> {
    name: &'a syn::Ident,
    id_const: syn::Ident,
    operand: Option<&'a syn::Type>,
}

pub fn opcode_impl(tokens: TokenStream) -> TokenStream {
    let input = parse_macro_input!(tokens as ItemEnum);
    assert!(
        input.variants.len() <= u16::MAX as usize,
        "Too many variants"
    );
    let enum_name = &input.ident;
    let infos: Vec<_> = input.variants.iter().map(variant_info).collect();

    let (consts, id_arms, size_arms, size_of_arms, write_arms, read_arms): (
        TokenStream2,
        TokenStream2,
        TokenStream2,
        TokenStream2,
        TokenStream2,
        TokenStream2,
    ) = itertools::multiunzip(
        infos
            .iter()
            .enumerate()
            .map(|(i, info)| generate_arms(i as u16, info)),
    );

    quote! {
        impl #enum_name {
            #consts

            /// the discriminant that starts the encoded form of this opcode
            pub fn get_id(&self) -> u16 {
                match self {
                    #id_arms
                }
            }

            /// number of bytes that `to_bytes` produces
            pub fn serialized_size(&self) -> usize {
                match self {
                    #size_arms
                }
            }

            /// encoded size of the opcode with the given discriminant, None for unknown ids
            pub fn serialized_size_of(id: u16) -> Option<usize> {
                match id {
                    #size_of_arms
                    _ => None,
                }
            }

            pub fn to_bytes(&self) -> Vec<u8> {
                let mut buf = Vec::with_capacity(self.serialized_size());
                buf.extend_from_slice(&self.get_id().to_le_bytes());
                match self {
                    #write_arms
                }
                buf
            }

            pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
                let id = u16::from_le_bytes([*bytes.first()?, *bytes.get(1)?]);
                let body = &bytes[2..];
                match id {
                    #read_arms
                    _ => None,
                }
            }
        }
    }
    .into()
}

fn variant_info(v: &syn::Variant) -> VariantInfo<'_> {
    let operand = match v.fields {
        syn::Fields::Unit => None,
        syn::Fields::Named(_) => {
            panic!("Only variants with zero or one unnamed field allowed")
        }
        syn::Fields::Unnamed(ref fields) => {
            assert!(
                fields.unnamed.len() == 1,
                "Only variants with zero or one unnamed field allowed"
            );
            fields.unnamed.first().map(|f| &f.ty)
        }
    };
    VariantInfo {
        name: &v.ident,
        id_const: ident_to_upper(&v.ident),
        operand,
    }
}

/// generates, for one variant: the discriminant const, and its arms for get_id,
/// serialized_size, serialized_size_of, to_bytes and from_bytes
fn generate_arms(
    i: u16,
    info: &VariantInfo,
) -> (
    TokenStream2,
    TokenStream2,
    TokenStream2,
    TokenStream2,
    TokenStream2,
    TokenStream2,
) {
    let VariantInfo {
        name,
        id_const,
        operand,
    } = info;
    let konst = quote! { pub const #id_const: u16 = #i; };
    match operand {
        Some(ty) => (
            konst,
            quote! { Self::#name(_) => Self::#id_const, },
            quote! { Self::#name(_) => 2 + <#ty as crate::core::Operand>::SIZE, },
            quote! { Self::#id_const => Some(2 + <#ty as crate::core::Operand>::SIZE), },
            quote! { Self::#name(operand) => crate::core::Operand::write_to(operand, &mut buf), },
            quote! { Self::#id_const => <#ty as crate::core::Operand>::read_from(body).map(Self::#name), },
        ),
        None => (
            konst,
            quote! { Self::#name => Self::#id_const, },
            quote! { Self::#name => 2, },
            quote! { Self::#id_const => Some(2), },
            quote! { Self::#name => {} },
            quote! { Self::#id_const => Some(Self::#name), },
        ),
    }
}

fn ident_to_upper(ident: &syn::Ident) -> syn::Ident {
    format_ident!("{}", ident.to_string().to_uppercase())
}
