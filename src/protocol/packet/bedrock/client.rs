//! Packets sent by the Bedrock client.

use super::{
    types::{ItemInstance, Vec3},
    ContainerClose, NetworkStackLatency, Text,
};
use crate::protocol::{Decode, DecodeError, Decoder, Encode, Encoder};
use bedrock_bridge_macros::{Decode, Encode, PacketIds};

#[derive(Debug, Clone, PacketIds, strum::AsRefStr)]
pub enum Packet {
    #[encoding(id = 0x01)]
    Login(Login),
    #[encoding(id = 0x04)]
    ClientToServerHandshake(ClientToServerHandshake),
    #[encoding(id = 0x08)]
    ResourcePackClientResponse(ResourcePackClientResponse),
    #[encoding(id = 0x09)]
    Text(Text),
    #[encoding(id = 0x13)]
    MovePlayer(MovePlayer),
    #[encoding(id = 0x1e)]
    InventoryTransaction(InventoryTransaction),
    #[encoding(id = 0x2f)]
    ContainerClose(ContainerClose),
    #[encoding(id = 0x45)]
    RequestChunkRadius(RequestChunkRadius),
    #[encoding(id = 0x71)]
    SetLocalPlayerAsInitialized(SetLocalPlayerAsInitialized),
    #[encoding(id = 0x73)]
    NetworkStackLatency(NetworkStackLatency),
    #[encoding(id = 0x81)]
    ClientCacheStatus(ClientCacheStatus),
    #[encoding(id = 0xc1)]
    RequestNetworkSettings(RequestNetworkSettings),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct RequestNetworkSettings {
    pub protocol_version: i32,
}

/// The identity chain and the client data token.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionRequest {
    /// JSON object `{"chain": [token, ...]}`.
    pub chain: String,
    pub client_data: String,
}

impl Decode for ConnectionRequest {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let payload = decoder.read_byte_array()?;
        let mut payload = Decoder::new(payload);
        let chain = payload.read_long_string_le()?.to_owned();
        let client_data = payload.read_long_string_le()?.to_owned();
        payload.finish()?;
        Ok(Self { chain, client_data })
    }
}

impl Encode for ConnectionRequest {
    fn encode(&self, encoder: &mut Encoder) {
        let mut payload = Vec::new();
        let mut inner = Encoder::new(&mut payload);
        inner.write_long_string_le(&self.chain);
        inner.write_long_string_le(&self.client_data);
        encoder.write_byte_array(&payload);
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Login {
    pub protocol_version: i32,
    pub request: ConnectionRequest,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ClientToServerHandshake {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode)]
#[encoding(discriminant = "byte")]
pub enum ResourcePackStatus {
    #[encoding(id = 0)]
    Unknown,
    #[encoding(id = 1)]
    Refused,
    #[encoding(id = 2)]
    SendPacks,
    #[encoding(id = 3)]
    HaveAllPacks,
    #[encoding(id = 4)]
    Completed,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ResourcePackClientResponse {
    pub status: ResourcePackStatus,
    #[encoding(length_prefix = "u16_le")]
    pub pack_ids: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MoveMode {
    Normal,
    Reset,
    Teleport { cause: i32, source_entity_type: i32 },
    Rotation,
}

/// Player movement, sent by the client every tick while moving and by the
/// bridge to teleport the player.
#[derive(Debug, Clone, PartialEq)]
pub struct MovePlayer {
    pub runtime_entity_id: u64,
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub mode: MoveMode,
    pub on_ground: bool,
    pub riding_runtime_entity_id: u64,
    pub tick: u64,
}

impl Decode for MovePlayer {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let runtime_entity_id = decoder.read_var_u64()?;
        let position = Vec3::decode(decoder)?;
        let pitch = decoder.read_f32_le()?;
        let yaw = decoder.read_f32_le()?;
        let head_yaw = decoder.read_f32_le()?;
        let mode = decoder.read_u8()?;
        let on_ground = decoder.read_bool()?;
        let riding_runtime_entity_id = decoder.read_var_u64()?;
        let mode = match mode {
            0 => MoveMode::Normal,
            1 => MoveMode::Reset,
            2 => MoveMode::Teleport {
                cause: decoder.read_i32_le()?,
                source_entity_type: decoder.read_i32_le()?,
            },
            3 => MoveMode::Rotation,
            other => return Err(DecodeError::InvalidDiscriminant(other.into())),
        };
        Ok(Self {
            runtime_entity_id,
            position,
            pitch,
            yaw,
            head_yaw,
            mode,
            on_ground,
            riding_runtime_entity_id,
            tick: decoder.read_var_u64()?,
        })
    }
}

impl Encode for MovePlayer {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_u64(self.runtime_entity_id);
        self.position.encode(encoder);
        encoder.write_f32_le(self.pitch);
        encoder.write_f32_le(self.yaw);
        encoder.write_f32_le(self.head_yaw);
        encoder.write_u8(match self.mode {
            MoveMode::Normal => 0,
            MoveMode::Reset => 1,
            MoveMode::Teleport { .. } => 2,
            MoveMode::Rotation => 3,
        });
        encoder.write_bool(self.on_ground);
        encoder.write_var_u64(self.riding_runtime_entity_id);
        if let MoveMode::Teleport {
            cause,
            source_entity_type,
        } = self.mode
        {
            encoder.write_i32_le(cause);
            encoder.write_i32_le(source_entity_type);
        }
        encoder.write_var_u64(self.tick);
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct RequestChunkRadius {
    #[encoding(zigzag32)]
    pub radius: i32,
    pub max_radius: u8,
}

/// Whether the client supports the blob cache. Chunks are never cached.
#[derive(Debug, Clone, Encode, Decode)]
pub struct ClientCacheStatus {
    pub supported: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetLocalPlayerAsInitialized {
    #[encoding(var_u64)]
    pub runtime_entity_id: u64,
}

/// Where an inventory action took its item from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActionSource {
    Container { window_id: i32 },
    Global,
    WorldInteraction { flags: u32 },
    Creative,
    CraftingGrid { window_id: i32 },
    Todo { window_id: i32 },
}

impl Decode for ActionSource {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(match decoder.read_var_u32()? {
            0 => ActionSource::Container {
                window_id: decoder.read_zigzag32()?,
            },
            1 => ActionSource::Global,
            2 => ActionSource::WorldInteraction {
                flags: decoder.read_var_u32()?,
            },
            3 => ActionSource::Creative,
            100 => ActionSource::CraftingGrid {
                window_id: decoder.read_zigzag32()?,
            },
            99999 => ActionSource::Todo {
                window_id: decoder.read_zigzag32()?,
            },
            other => return Err(DecodeError::InvalidDiscriminant(other.into())),
        })
    }
}

impl Encode for ActionSource {
    fn encode(&self, encoder: &mut Encoder) {
        match *self {
            ActionSource::Container { window_id } => {
                encoder.write_var_u32(0);
                encoder.write_zigzag32(window_id);
            }
            ActionSource::Global => {
                encoder.write_var_u32(1);
            }
            ActionSource::WorldInteraction { flags } => {
                encoder.write_var_u32(2);
                encoder.write_var_u32(flags);
            }
            ActionSource::Creative => {
                encoder.write_var_u32(3);
            }
            ActionSource::CraftingGrid { window_id } => {
                encoder.write_var_u32(100);
                encoder.write_zigzag32(window_id);
            }
            ActionSource::Todo { window_id } => {
                encoder.write_var_u32(99999);
                encoder.write_zigzag32(window_id);
            }
        }
    }
}

/// One slot the client changed, with the stack before and after.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct InventoryAction {
    pub source: ActionSource,
    #[encoding(var_u32)]
    pub slot: u32,
    pub from_item: ItemInstance,
    pub to_item: ItemInstance,
}

/// Slots the client wants confirmed for a legacy request.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct LegacySetSlot {
    pub container_id: u8,
    #[encoding(length_prefix = "var_u32")]
    pub slots: Vec<u8>,
}

pub mod transaction_kind {
    pub const NORMAL: u32 = 0;
    pub const MISMATCH: u32 = 1;
    pub const USE_ITEM: u32 = 2;
    pub const USE_ITEM_ON_ENTITY: u32 = 3;
    pub const RELEASE_ITEM: u32 = 4;
}

/// Client-authoritative inventory changes. Only the actions are decoded;
/// the data trailing item-use transactions is kept as is.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryTransaction {
    pub legacy_request_id: i32,
    pub legacy_slots: Vec<LegacySetSlot>,
    /// See [`transaction_kind`].
    pub kind: u32,
    pub actions: Vec<InventoryAction>,
    pub data: Vec<u8>,
}

impl InventoryTransaction {
    pub fn normal(actions: Vec<InventoryAction>) -> Self {
        Self {
            legacy_request_id: 0,
            legacy_slots: Vec::new(),
            kind: transaction_kind::NORMAL,
            actions,
            data: Vec::new(),
        }
    }
}

impl Decode for InventoryTransaction {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let legacy_request_id = decoder.read_zigzag32()?;
        let mut legacy_slots = Vec::new();
        if legacy_request_id != 0 {
            let length = usize::try_from(decoder.read_var_u32()?)?;
            decoder.check_collection_length(length)?;
            for _ in 0..length {
                legacy_slots.push(LegacySetSlot::decode(decoder)?);
            }
        }
        let kind = decoder.read_var_u32()?;
        let length = usize::try_from(decoder.read_var_u32()?)?;
        decoder.check_collection_length(length)?;
        let mut actions = Vec::with_capacity(length);
        for _ in 0..length {
            actions.push(InventoryAction::decode(decoder)?);
        }
        Ok(Self {
            legacy_request_id,
            legacy_slots,
            kind,
            actions,
            data: decoder.consume_rest().to_vec(),
        })
    }
}

impl Encode for InventoryTransaction {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_zigzag32(self.legacy_request_id);
        if self.legacy_request_id != 0 {
            encoder.write_var_u32(self.legacy_slots.len().try_into().unwrap_or(u32::MAX));
            for slots in &self.legacy_slots {
                slots.encode(encoder);
            }
        }
        encoder.write_var_u32(self.kind);
        encoder.write_var_u32(self.actions.len().try_into().unwrap_or(u32::MAX));
        for action in &self.actions {
            action.encode(encoder);
        }
        encoder.write_slice(&self.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_to_vec, RawPacket};

    #[test]
    fn connection_request_round_trips() {
        let login = Login {
            protocol_version: 630,
            request: ConnectionRequest {
                chain: r#"{"chain":[]}"#.into(),
                client_data: "a.b.c".into(),
            },
        };
        let raw = RawPacket::from_packet(&login);
        assert_eq!(raw.id, 0x01);
        assert_eq!(&raw.body[..4], 630i32.to_be_bytes());
        let decoded: Login = raw.decode().unwrap();
        assert_eq!(decoded.request, login.request);
    }

    #[test]
    fn teleport_moves_carry_their_cause() {
        let packet = MovePlayer {
            runtime_entity_id: 1,
            position: Vec3::new(0.5, 65.62, 0.5),
            pitch: 0.0,
            yaw: 90.0,
            head_yaw: 90.0,
            mode: MoveMode::Teleport {
                cause: 0,
                source_entity_type: 0,
            },
            on_ground: false,
            riding_runtime_entity_id: 0,
            tick: 0,
        };
        let bytes = encode_to_vec(&packet);
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(MovePlayer::decode(&mut decoder).unwrap(), packet);
        assert!(decoder.is_finished());
    }

    #[test]
    fn item_use_data_is_kept_raw() {
        let mut packet = InventoryTransaction::normal(vec![InventoryAction {
            source: ActionSource::Container { window_id: 0 },
            slot: 3,
            from_item: ItemInstance::air(),
            to_item: ItemInstance::air(),
        }]);
        packet.kind = transaction_kind::USE_ITEM;
        packet.data = vec![1, 2, 3];
        packet.legacy_request_id = -2;
        packet.legacy_slots = vec![LegacySetSlot {
            container_id: 28,
            slots: vec![1, 2],
        }];
        let bytes = encode_to_vec(&packet);
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(InventoryTransaction::decode(&mut decoder).unwrap(), packet);
        assert!(decoder.is_finished());
    }

    #[test]
    fn unknown_action_sources_are_rejected() {
        // normal transaction, one action, source type 7
        let bytes = [0, 0, 1, 7];
        assert!(matches!(
            InventoryTransaction::decode(&mut Decoder::new(&bytes)),
            Err(DecodeError::InvalidDiscriminant(7))
        ));
    }

    #[test]
    fn packets_decode_by_id() {
        let body = encode_to_vec(&RequestNetworkSettings {
            protocol_version: 630,
        });
        let packet = Packet::decode_body(0xc1, &mut Decoder::new(&body)).unwrap();
        assert_eq!(packet.as_ref(), "RequestNetworkSettings");
        assert!(matches!(
            Packet::decode_body(0x3ff, &mut Decoder::new(&[])),
            Err(DecodeError::UnknownPacket(0x3ff))
        ));
    }
}
