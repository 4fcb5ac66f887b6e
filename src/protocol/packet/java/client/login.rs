use bedrock_bridge_macros::{Decode, Encode, PacketIds};
use uuid::Uuid;

#[derive(Debug, Clone, PacketIds, strum::AsRefStr)]
pub enum Packet {
    #[encoding(id = 0x00)]
    LoginStart(LoginStart),
    #[encoding(id = 0x02)]
    LoginPluginResponse(LoginPluginResponse),
    #[encoding(id = 0x03)]
    LoginAcknowledged(LoginAcknowledged),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct LoginStart {
    pub name: String,
    pub uuid: Uuid,
}

/// Answer to a login plugin request. `successful = false` means
/// the channel is not understood.
#[derive(Debug, Clone, Encode, Decode)]
pub struct LoginPluginResponse {
    #[encoding(varint)]
    pub message_id: i32,
    pub successful: bool,
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct LoginAcknowledged {}
