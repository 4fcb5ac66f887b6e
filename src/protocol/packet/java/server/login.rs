use bedrock_bridge_macros::{Decode, Encode, PacketIds};
use uuid::Uuid;

#[derive(Debug, Clone, PacketIds, strum::AsRefStr)]
pub enum Packet {
    #[encoding(id = 0x00)]
    Disconnect(Disconnect),
    #[encoding(id = 0x01)]
    EncryptionRequest(EncryptionRequest),
    #[encoding(id = 0x02)]
    LoginSuccess(LoginSuccess),
    #[encoding(id = 0x03)]
    SetCompression(SetCompression),
    #[encoding(id = 0x04)]
    LoginPluginRequest(LoginPluginRequest),
}

/// The reason is a JSON chat component in this phase.
#[derive(Debug, Clone, Encode, Decode)]
pub struct Disconnect {
    pub reason: String,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EncryptionRequest {
    #[encoding(length_prefix = "inferred")]
    pub ignored_data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct LoginSuccess {
    pub uuid: Uuid,
    pub username: String,
    #[encoding(length_prefix = "varint")]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Property {
    pub name: String,
    pub value: String,
    #[encoding(bool_prefixed)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetCompression {
    #[encoding(varint)]
    pub threshold: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct LoginPluginRequest {
    #[encoding(varint)]
    pub message_id: i32,
    pub channel: String,
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}
