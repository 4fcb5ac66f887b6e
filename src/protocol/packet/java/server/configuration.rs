use crate::protocol::packet::java::{Nbt, TextComponent};
use bedrock_bridge_macros::{Decode, Encode, PacketIds};

#[derive(Debug, Clone, PacketIds, strum::AsRefStr)]
pub enum Packet {
    #[encoding(id = 0x00)]
    PluginMessage(PluginMessage),
    #[encoding(id = 0x01)]
    Disconnect(Disconnect),
    #[encoding(id = 0x02)]
    FinishConfiguration(FinishConfiguration),
    #[encoding(id = 0x03)]
    KeepAlive(KeepAlive),
    #[encoding(id = 0x04)]
    Ping(Ping),
    #[encoding(id = 0x05)]
    RegistryData(RegistryData),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PluginMessage {
    pub channel: String,
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Disconnect {
    pub reason: TextComponent,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct FinishConfiguration {}

#[derive(Debug, Clone, Encode, Decode)]
pub struct KeepAlive {
    pub id: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Ping {
    pub id: i32,
}

/// Every synchronized registry in one compound keyed by registry name.
#[derive(Debug, Clone, Encode, Decode)]
pub struct RegistryData {
    pub codec: Nbt,
}
