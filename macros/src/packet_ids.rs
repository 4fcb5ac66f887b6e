//! Derives packet identifiers, id-keyed body coding and `From` conversions
//! for a packet enum.

use crate::protocol::VariantOptions;
use darling::FromVariant;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields};

pub fn derive_packet_ids_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    let Data::Enum(en) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "only enums are supported",
        ));
    };

    let enum_ident = &input.ident;
    let mut impls = Vec::new();
    let mut decode_arms = Vec::new();
    let mut id_arms = Vec::new();
    let mut encode_arms = Vec::new();
    let mut conversions = Vec::new();

    for variant in &en.variants {
        let options = VariantOptions::from_variant(variant)?;
        let variant_ident = &variant.ident;
        let Fields::Unnamed(fields) = &variant.fields else {
            return Err(syn::Error::new_spanned(
                variant,
                "packet variants must wrap exactly one packet struct",
            ));
        };
        if fields.unnamed.len() != 1 {
            return Err(syn::Error::new_spanned(
                variant,
                "packet variants must wrap exactly one packet struct",
            ));
        }
        let ty = &fields.unnamed[0].ty;
        let id = u32::try_from(options.id)
            .map_err(|_| syn::Error::new_spanned(variant, "packet id must fit in a u32"))?;
        let name = variant_ident.to_string();

        if !options.shared {
            impls.push(quote! {
                impl crate::protocol::PacketId for #ty {
                    const ID: u32 = #id;
                    const NAME: &'static str = #name;
                }
            });
        }
        conversions.push(quote! {
            impl From<#ty> for #enum_ident {
                fn from(packet: #ty) -> Self {
                    Self::#variant_ident(packet)
                }
            }
        });
        decode_arms.push(quote! {
            #id => Ok(Self::#variant_ident(<#ty as crate::protocol::Decode>::decode(decoder)?)),
        });
        id_arms.push(quote! {
            Self::#variant_ident(_) => #id,
        });
        encode_arms.push(quote! {
            Self::#variant_ident(packet) => crate::protocol::Encode::encode(packet, encoder),
        });
    }

    Ok(quote! {
        #(#impls)*
        #(#conversions)*

        impl #enum_ident {
            /// Decodes the body of the packet with the given id.
            pub fn decode_body(
                id: u32,
                decoder: &mut crate::protocol::Decoder,
            ) -> ::std::result::Result<Self, crate::protocol::DecodeError> {
                match id {
                    #(#decode_arms)*
                    _ => Err(crate::protocol::DecodeError::UnknownPacket(id)),
                }
            }

            /// Gets the wire id of this packet.
            pub fn id(&self) -> u32 {
                match self {
                    #(#id_arms)*
                }
            }

            /// Encodes the packet body, without its id.
            pub fn encode_body(&self, encoder: &mut crate::protocol::Encoder) {
                match self {
                    #(#encode_arms)*
                }
            }
        }
    })
}
