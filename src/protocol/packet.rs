//! Packet types for both protocols.
//!
//! Only the packets the bridge translates are modeled field by field.
//! Packets that are relayed or skipped keep their body as opaque bytes,
//! so they round-trip without loss.

pub mod bedrock;
pub mod java;
