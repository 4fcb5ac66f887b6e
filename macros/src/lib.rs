use syn::DeriveInput;

mod packet_ids;
mod protocol;

#[proc_macro_derive(Encode, attributes(encoding))]
pub fn derive_encode(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    protocol::derive_encode_on(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_derive(Decode, attributes(encoding))]
pub fn derive_decode(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    protocol::derive_decode_on(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Implements `PacketId` and `From` for every packet struct wrapped by the
/// enum, plus `decode_body`/`encode_body`/`id` helpers on the enum itself.
#[proc_macro_derive(PacketIds, attributes(encoding))]
pub fn derive_packet_ids(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    packet_ids::derive_packet_ids_on(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
