//! Wire codecs for both sides of the bridge.

/// Java Edition 1.20.4.
pub const JAVA_PROTOCOL_VERSION: i32 = 765;
/// Bedrock Edition 1.20.50.
pub const BEDROCK_PROTOCOL_VERSION: i32 = 630;
pub const BEDROCK_GAME_VERSION: &str = "1.20.50";

pub mod bedrock_codec;
mod decoder;
mod encoder;
pub mod nbt;
pub mod packet;
pub mod vanilla_codec;

pub use decoder::{Decode, DecodeError, DecodeLe, Decoder};
pub use encoder::{Encode, EncodeLe, Encoder};

/// Limit to avoid out-of-memory DOS.
const BUFFER_LIMIT: usize = 1024 * 1024 * 2; // 2 MiB, the Java maximum

/// Bedrock batches can carry full chunk columns.
const BATCH_LIMIT: usize = 8 * 1024 * 1024;

/// Connection phase of the Java side.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum::AsRefStr)]
pub enum JavaState {
    Handshake,
    Login,
    Configuration,
    Play,
}

/// Associates a packet struct with its wire id.
pub trait PacketId {
    const ID: u32;
    const NAME: &'static str;
}

/// A packet whose id has been read but whose body is still opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: u32,
    pub body: Vec<u8>,
}

impl RawPacket {
    pub fn new(id: u32, body: Vec<u8>) -> Self {
        Self { id, body }
    }

    /// Builds a raw packet from a typed one.
    pub fn from_packet<P: Encode + PacketId>(packet: &P) -> Self {
        Self::new(P::ID, encode_to_vec(packet))
    }

    /// Decodes the body as `P`.
    pub fn decode<P: Decode>(&self) -> Result<P, DecodeError> {
        P::decode(&mut Decoder::new(&self.body))
    }
}

pub fn encode_to_vec<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut Encoder::new(&mut buf));
    buf
}

/// Var-int encoded i32 as a list element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarInt(pub i32);

impl Decode for VarInt {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        decoder.read_var_int().map(VarInt)
    }
}

impl Encode for VarInt {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_int(self.0);
    }
}

/// Var-long encoded i64 as a list element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarLong(pub i64);

impl Decode for VarLong {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        decoder.read_var_long().map(VarLong)
    }
}

impl Encode for VarLong {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_long(self.0);
    }
}
