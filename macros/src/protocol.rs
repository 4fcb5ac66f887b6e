//! Implements derives for the protocol Encode and Decode traits.
//!
//! Each field resolves to a [`Layout`], from which both directions are
//! generated.

use darling::{FromDeriveInput, FromField, FromMeta, FromVariant};
use proc_macro2::{Ident, Span, TokenStream};
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DataStruct, DeriveInput, Fields};

/// Options to encode a field.
#[derive(Default, Debug, FromField)]
#[darling(attributes(encoding), forward_attrs(allow, doc, cfg))]
#[darling(default)]
pub struct FieldOptions {
    /// Java varint.
    varint: bool,
    /// Java varlong.
    varlong: bool,
    /// Unsigned LEB128 encoding of a 32-bit value.
    var_u32: bool,
    /// Unsigned LEB128 encoding of a 64-bit value.
    var_u64: bool,
    /// ZigZag LEB128 encoding of a signed 32-bit value.
    zigzag32: bool,
    /// ZigZag LEB128 encoding of a signed 64-bit value.
    zigzag64: bool,
    /// Little-endian fixed-width encoding.
    le: bool,
    /// Rotation packed into a byte (1/256 of a turn).
    angle: bool,
    /// For an option field, prefix the field with a boolean
    /// to determine whether the field is present.
    bool_prefixed: bool,
    /// For a list field, how the length is written.
    length_prefix: Option<LengthPrefix>,
}

#[derive(Debug, Clone, Copy, FromMeta)]
pub enum LengthPrefix {
    #[darling(rename = "varint")]
    VarInt,
    #[darling(rename = "var_u32")]
    VarU32,
    #[darling(rename = "u16_le")]
    U16Le,
    #[darling(rename = "i32_le")]
    I32Le,
    /// The list runs to the end of the packet. Only valid on the last field.
    #[darling(rename = "inferred")]
    Inferred,
}

impl LengthPrefix {
    fn write(self, list: &TokenStream) -> TokenStream {
        match self {
            LengthPrefix::VarInt => quote! {
                encoder.write_var_int(#list.len().try_into().unwrap_or(i32::MAX));
            },
            LengthPrefix::VarU32 => quote! {
                encoder.write_var_u32(#list.len().try_into().unwrap_or(u32::MAX));
            },
            LengthPrefix::U16Le => quote! {
                encoder.write_u16_le(#list.len().try_into().unwrap_or(u16::MAX));
            },
            LengthPrefix::I32Le => quote! {
                encoder.write_i32_le(#list.len().try_into().unwrap_or(i32::MAX));
            },
            LengthPrefix::Inferred => quote! {},
        }
    }

    fn read(self) -> Option<TokenStream> {
        match self {
            LengthPrefix::VarInt => Some(quote! { usize::try_from(decoder.read_var_int()?)? }),
            LengthPrefix::VarU32 => Some(quote! { usize::try_from(decoder.read_var_u32()?)? }),
            LengthPrefix::U16Le => Some(quote! { usize::from(decoder.read_u16_le()?) }),
            LengthPrefix::I32Le => Some(quote! { usize::try_from(decoder.read_i32_le()?)? }),
            LengthPrefix::Inferred => None,
        }
    }
}

/// Wire layout of one field.
enum Layout {
    /// The field type's own `Encode`/`Decode`.
    Plain,
    /// An integer written through a dedicated encoder method, e.g.
    /// `write_var_int`/`read_var_int`. Values out of range saturate.
    Integer { method: &'static str, wire: Ident },
    LittleEndian,
    Angle,
    BoolPrefixed,
    List(LengthPrefix),
}

impl FieldOptions {
    fn layout(&self) -> syn::Result<Layout> {
        let integers = [
            (self.varint, "var_int", "i32"),
            (self.varlong, "var_long", "i64"),
            (self.var_u32, "var_u32", "u32"),
            (self.var_u64, "var_u64", "u64"),
            (self.zigzag32, "zigzag32", "i32"),
            (self.zigzag64, "zigzag64", "i64"),
        ];
        let set = integers.iter().filter(|(set, ..)| *set).count()
            + usize::from(self.le)
            + usize::from(self.angle)
            + usize::from(self.bool_prefixed)
            + usize::from(self.length_prefix.is_some());
        if set > 1 {
            return Err(syn::Error::new(
                Span::call_site(),
                "at most one encoding option can be set",
            ));
        }

        if let Some(&(_, method, wire)) = integers.iter().find(|(set, ..)| *set) {
            return Ok(Layout::Integer {
                method,
                wire: Ident::new(wire, Span::call_site()),
            });
        }
        Ok(if self.le {
            Layout::LittleEndian
        } else if self.angle {
            Layout::Angle
        } else if self.bool_prefixed {
            Layout::BoolPrefixed
        } else if let Some(prefix) = self.length_prefix {
            Layout::List(prefix)
        } else {
            Layout::Plain
        })
    }
}

/// Options to encode an enum.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(encoding), forward_attrs(allow, doc, cfg))]
struct EnumOptions {
    discriminant: Discriminant,
}

/// How the variant of an enum is written ahead of its fields.
#[derive(Debug, Clone, Copy, FromMeta)]
enum Discriminant {
    #[darling(rename = "varint")]
    VarInt,
    #[darling(rename = "var_u32")]
    VarU32,
    #[darling(rename = "byte")]
    Byte,
    /// Big-endian i32.
    #[darling(rename = "int")]
    Int,
}

impl Discriminant {
    fn write(self, id: i64) -> syn::Result<TokenStream> {
        let overflow =
            |_| syn::Error::new(Span::call_site(), "discriminant does not fit its encoding");
        Ok(match self {
            Discriminant::Byte => {
                let id = u8::try_from(id).map_err(overflow)?;
                quote! { encoder.write_u8(#id); }
            }
            Discriminant::Int => {
                let id = i32::try_from(id).map_err(overflow)?;
                quote! { encoder.write_i32(#id); }
            }
            Discriminant::VarInt => {
                let id = i32::try_from(id).map_err(overflow)?;
                quote! { encoder.write_var_int(#id); }
            }
            Discriminant::VarU32 => {
                let id = u32::try_from(id).map_err(overflow)?;
                quote! { encoder.write_var_u32(#id); }
            }
        })
    }

    fn read(self) -> TokenStream {
        match self {
            Discriminant::VarInt => quote! { decoder.read_var_int()? },
            Discriminant::VarU32 => quote! { decoder.read_var_u32()? },
            Discriminant::Byte => quote! { decoder.read_u8()? },
            Discriminant::Int => quote! { decoder.read_i32()? },
        }
    }
}

/// Options to encode an enum variant.
#[derive(Debug, FromVariant)]
#[darling(attributes(encoding), forward_attrs(allow, doc, cfg))]
pub struct VariantOptions {
    pub id: i64,
    /// The packet type is also listed in the enum for the opposite direction,
    /// which owns its `PacketId` implementation.
    #[darling(default)]
    pub shared: bool,
}

struct Field {
    ident: Ident,
    /// Expression reading the field while encoding.
    access: TokenStream,
    layout: Layout,
}

struct Variant {
    ident: Ident,
    id: i64,
    fields: Vec<Field>,
    named: bool,
}

enum Shape {
    Struct(Vec<Field>),
    Enum {
        discriminant: Discriminant,
        variants: Vec<Variant>,
    },
}

fn encode_field(field: &Field) -> TokenStream {
    let access = &field.access;
    match &field.layout {
        Layout::Plain => quote! {
            crate::protocol::Encode::encode(&#access, encoder);
        },
        Layout::Integer { method, wire } => {
            let write = format_ident!("write_{}", method);
            quote! {
                encoder.#write(#access.try_into().unwrap_or(#wire::MAX));
            }
        }
        Layout::LittleEndian => quote! {
            crate::protocol::EncodeLe::encode_le(&#access, encoder);
        },
        Layout::Angle => quote! {
            encoder.write_angle(#access);
        },
        Layout::BoolPrefixed => quote! {
            encoder.write_bool(#access.is_some());
            if let Some(value) = &#access {
                crate::protocol::Encode::encode(value, encoder);
            }
        },
        Layout::List(prefix) => {
            let length = prefix.write(access);
            quote! {
                #length
                for item in &#access {
                    crate::protocol::Encode::encode(item, encoder);
                }
            }
        }
    }
}

fn decode_field(field: &Field) -> TokenStream {
    let ident = &field.ident;
    match &field.layout {
        Layout::Plain => quote! {
            let #ident = crate::protocol::Decode::decode(decoder)?;
        },
        Layout::Integer { method, .. } => {
            let read = format_ident!("read_{}", method);
            quote! {
                let #ident = decoder.#read()?.try_into()?;
            }
        }
        Layout::LittleEndian => quote! {
            let #ident = crate::protocol::DecodeLe::decode_le(decoder)?;
        },
        Layout::Angle => quote! {
            let #ident = decoder.read_angle()?;
        },
        Layout::BoolPrefixed => quote! {
            let #ident = if decoder.read_bool()? {
                Some(crate::protocol::Decode::decode(decoder)?)
            } else {
                None
            };
        },
        Layout::List(prefix) => match prefix.read() {
            Some(length) => quote! {
                let #ident = {
                    let length = #length;
                    decoder.check_collection_length(length)?;
                    let mut items = Vec::with_capacity(length);
                    for _ in 0..length {
                        items.push(crate::protocol::Decode::decode(decoder)?);
                    }
                    items
                };
            },
            None => quote! {
                let mut #ident = Vec::new();
                while !decoder.is_finished() {
                    #ident.push(crate::protocol::Decode::decode(decoder)?);
                }
            },
        },
    }
}

/// `{ a, b }`, `(a)` or nothing, for both patterns and constructors.
fn field_list(fields: &[Field], named: bool) -> TokenStream {
    let idents = fields.iter().map(|field| &field.ident);
    if named {
        quote! { { #(#idents),* } }
    } else if fields.is_empty() {
        quote! {}
    } else {
        quote! { (#(#idents),*) }
    }
}

fn encode_body(shape: &Shape) -> syn::Result<TokenStream> {
    match shape {
        Shape::Struct(fields) => {
            let fields = fields.iter().map(encode_field);
            Ok(quote! { #(#fields)* })
        }
        Shape::Enum {
            discriminant,
            variants,
        } => {
            let mut arms = Vec::new();
            for variant in variants {
                let ident = &variant.ident;
                let pattern = field_list(&variant.fields, variant.named);
                let discriminant = discriminant.write(variant.id)?;
                let fields = variant.fields.iter().map(encode_field);
                arms.push(quote! {
                    Self::#ident #pattern => {
                        #discriminant
                        #(#fields)*
                    }
                });
            }
            Ok(quote! {
                match self {
                    #(#arms,)*
                }
            })
        }
    }
}

fn decode_body(shape: &Shape) -> TokenStream {
    match shape {
        Shape::Struct(fields) => {
            let decode = fields.iter().map(decode_field);
            let init = field_list(fields, true);
            quote! {
                #(#decode)*
                Ok(Self #init)
            }
        }
        Shape::Enum {
            discriminant,
            variants,
        } => {
            let read = discriminant.read();
            let arms = variants.iter().map(|variant| {
                let ident = &variant.ident;
                let id = variant.id;
                let decode = variant.fields.iter().map(decode_field);
                let init = field_list(&variant.fields, variant.named);
                quote! {
                    #id => {
                        #(#decode)*
                        Ok(Self::#ident #init)
                    }
                }
            });
            quote! {
                let discriminant = i64::from(#read);
                match discriminant {
                    #(#arms,)*
                    _ => Err(crate::protocol::DecodeError::InvalidDiscriminant(discriminant)),
                }
            }
        }
    }
}

fn shape_of(input: &DeriveInput) -> syn::Result<Shape> {
    match &input.data {
        Data::Struct(data) => struct_fields(data).map(Shape::Struct),
        Data::Enum(data) => enum_shape(data, input),
        Data::Union(data) => Err(syn::Error::new_spanned(
            data.union_token,
            "cannot derive Encode/Decode on a union",
        )),
    }
}

fn struct_fields(data: &DataStruct) -> syn::Result<Vec<Field>> {
    match &data.fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|field| field.ident.clone().map(|ident| (field, ident)))
            .map(|(field, ident)| -> syn::Result<Field> {
                Ok(Field {
                    access: quote! { self.#ident },
                    layout: FieldOptions::from_field(field)?.layout()?,
                    ident,
                })
            })
            .collect(),
        Fields::Unnamed(unnamed) => Err(syn::Error::new_spanned(
            &unnamed.unnamed,
            "structs with unnamed fields are unsupported",
        )),
        Fields::Unit => Ok(Vec::new()),
    }
}

fn enum_shape(data: &DataEnum, input: &DeriveInput) -> syn::Result<Shape> {
    let EnumOptions { discriminant } = EnumOptions::from_derive_input(input)?;
    let mut variants = Vec::new();
    for variant in &data.variants {
        let options = VariantOptions::from_variant(variant)?;
        let fields = match &variant.fields {
            Fields::Named(named) => named
                .named
                .iter()
                .filter_map(|field| field.ident.clone().map(|ident| (field, ident)))
                .map(|(field, ident)| -> syn::Result<Field> {
                    Ok(Field {
                        access: quote! { (*#ident) },
                        layout: FieldOptions::from_field(field)?.layout()?,
                        ident,
                    })
                })
                .collect::<syn::Result<Vec<_>>>()?,
            Fields::Unnamed(unnamed) => {
                if unnamed.unnamed.len() > 1 {
                    return Err(syn::Error::new_spanned(
                        &unnamed.unnamed,
                        "more than one unnamed field in a variant is unsupported",
                    ));
                }
                let ident = Ident::new("__field", Span::call_site());
                vec![Field {
                    access: quote! { (*#ident) },
                    layout: FieldOptions::from_field(&unnamed.unnamed[0])?.layout()?,
                    ident,
                }]
            }
            Fields::Unit => Vec::new(),
        };
        variants.push(Variant {
            ident: variant.ident.clone(),
            id: options.id,
            fields,
            named: matches!(variant.fields, Fields::Named(_)),
        });
    }
    Ok(Shape::Enum {
        discriminant,
        variants,
    })
}

pub fn derive_encode_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let body = encode_body(&shape_of(input)?)?;
    Ok(quote! {
        impl crate::protocol::Encode for #ident {
            fn encode(&self, encoder: &mut crate::protocol::Encoder) {
                #body
            }
        }
    })
}

pub fn derive_decode_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let body = decode_body(&shape_of(input)?);
    Ok(quote! {
        impl crate::protocol::Decode for #ident {
            fn decode(
                decoder: &mut crate::protocol::Decoder,
            ) -> ::std::result::Result<Self, crate::protocol::DecodeError> {
                #body
            }
        }
    })
}
