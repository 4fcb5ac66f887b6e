//! Packets sent by the bridge to the Bedrock client.

use super::{
    client::MovePlayer,
    types::{
        AttributeValue, BlockProperty, ChunkCoordinate, EntityDataMap, EntityLink, Experiment,
        GameRule, ItemInstance, ItemState, NetworkBlockPosition, NetworkNbt, NetworkUuid,
        PropertySyncData, Vec2, Vec3,
    },
    ContainerClose, NetworkStackLatency, Text,
};
use crate::protocol::{Decode, DecodeError, Decoder, Encode, Encoder};
use bedrock_bridge_macros::{Decode, Encode, PacketIds};

#[derive(Debug, Clone, PacketIds, strum::AsRefStr)]
pub enum Packet {
    #[encoding(id = 0x02)]
    PlayStatus(PlayStatus),
    #[encoding(id = 0x03)]
    ServerToClientHandshake(ServerToClientHandshake),
    #[encoding(id = 0x05)]
    Disconnect(Disconnect),
    #[encoding(id = 0x06)]
    ResourcePacksInfo(ResourcePacksInfo),
    #[encoding(id = 0x07)]
    ResourcePackStack(ResourcePackStack),
    #[encoding(id = 0x09, shared)]
    Text(Text),
    #[encoding(id = 0x0b)]
    StartGame(StartGame),
    #[encoding(id = 0x0d)]
    AddEntity(AddEntity),
    #[encoding(id = 0x0e)]
    RemoveEntity(RemoveEntity),
    #[encoding(id = 0x12)]
    MoveEntityAbsolute(MoveEntityAbsolute),
    #[encoding(id = 0x13, shared)]
    MovePlayer(MovePlayer),
    #[encoding(id = 0x15)]
    UpdateBlock(UpdateBlock),
    #[encoding(id = 0x27)]
    SetEntityData(SetEntityData),
    #[encoding(id = 0x28)]
    SetEntityMotion(SetEntityMotion),
    #[encoding(id = 0x29)]
    SetEntityLink(SetEntityLink),
    #[encoding(id = 0x2e)]
    ContainerOpen(ContainerOpen),
    #[encoding(id = 0x2f, shared)]
    ContainerClose(ContainerClose),
    #[encoding(id = 0x31)]
    InventoryContent(InventoryContent),
    #[encoding(id = 0x32)]
    InventorySlot(InventorySlot),
    #[encoding(id = 0x3a)]
    LevelChunk(LevelChunk),
    #[encoding(id = 0x3d)]
    ChangeDimension(ChangeDimension),
    #[encoding(id = 0x46)]
    ChunkRadiusUpdated(ChunkRadiusUpdated),
    #[encoding(id = 0x73, shared)]
    NetworkStackLatency(NetworkStackLatency),
    #[encoding(id = 0x79)]
    NetworkChunkPublisherUpdate(NetworkChunkPublisherUpdate),
    #[encoding(id = 0x7a)]
    BiomeDefinitionList(BiomeDefinitionList),
    #[encoding(id = 0x8f)]
    NetworkSettings(NetworkSettings),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode)]
#[encoding(discriminant = "int")]
pub enum PlayStatus {
    #[encoding(id = 0)]
    LoginSuccess,
    #[encoding(id = 1)]
    FailedClient,
    #[encoding(id = 2)]
    FailedServer,
    #[encoding(id = 3)]
    PlayerSpawn,
    #[encoding(id = 4)]
    FailedInvalidTenant,
    #[encoding(id = 5)]
    FailedVanillaEdu,
    #[encoding(id = 6)]
    FailedIncompatible,
    #[encoding(id = 7)]
    FailedServerFull,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ServerToClientHandshake {
    /// Signed token carrying the server public key and salt.
    pub token: String,
}

/// Kicks the client. With `message` absent the client shows no screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect {
    pub reason: i32,
    pub message: Option<String>,
}

impl Decode for Disconnect {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let reason = decoder.read_zigzag32()?;
        let hide_screen = decoder.read_bool()?;
        let message = if hide_screen {
            None
        } else {
            Some(String::decode(decoder)?)
        };
        Ok(Self { reason, message })
    }
}

impl Encode for Disconnect {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_zigzag32(self.reason);
        encoder.write_bool(self.message.is_none());
        if let Some(message) = &self.message {
            encoder.write_string(message);
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BehaviourPackEntry {
    pub id: String,
    pub version: String,
    #[encoding(le)]
    pub size: u64,
    pub content_key: String,
    pub sub_pack_name: String,
    pub content_id: String,
    pub has_scripts: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ResourcePackEntry {
    pub id: String,
    pub version: String,
    #[encoding(le)]
    pub size: u64,
    pub content_key: String,
    pub sub_pack_name: String,
    pub content_id: String,
    pub has_scripts: bool,
    pub raytracing_capable: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CdnUrl {
    pub pack_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ResourcePacksInfo {
    pub must_accept: bool,
    pub has_scripts: bool,
    pub force_server_packs: bool,
    #[encoding(length_prefix = "u16_le")]
    pub behaviour_packs: Vec<BehaviourPackEntry>,
    #[encoding(length_prefix = "u16_le")]
    pub resource_packs: Vec<ResourcePackEntry>,
    #[encoding(length_prefix = "var_u32")]
    pub cdn_urls: Vec<CdnUrl>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct StackEntry {
    pub id: String,
    pub version: String,
    pub sub_pack_name: String,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ResourcePackStack {
    pub must_accept: bool,
    #[encoding(length_prefix = "var_u32")]
    pub behaviour_packs: Vec<StackEntry>,
    #[encoding(length_prefix = "var_u32")]
    pub resource_packs: Vec<StackEntry>,
    pub game_version: String,
    #[encoding(length_prefix = "i32_le")]
    pub experiments: Vec<Experiment>,
    pub experiments_previously_toggled: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnSettings {
    #[encoding(le)]
    pub biome_type: i16,
    pub user_defined_biome_name: String,
    #[encoding(zigzag32)]
    pub dimension: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EducationUriResource {
    pub button_name: String,
    pub link_uri: String,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerMovementSettings {
    #[encoding(zigzag32)]
    pub authority: i32,
    #[encoding(zigzag32)]
    pub rewind_history_size: i32,
    pub server_authoritative_block_breaking: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct StartGame {
    #[encoding(zigzag64)]
    pub unique_entity_id: i64,
    #[encoding(var_u64)]
    pub runtime_entity_id: u64,
    #[encoding(zigzag32)]
    pub player_game_mode: i32,
    pub player_position: Vec3,
    pub rotation: Vec2,
    #[encoding(le)]
    pub seed: u64,
    pub spawn_settings: SpawnSettings,
    #[encoding(zigzag32)]
    pub generator: i32,
    #[encoding(zigzag32)]
    pub world_game_mode: i32,
    #[encoding(zigzag32)]
    pub difficulty: i32,
    pub world_spawn: NetworkBlockPosition,
    pub achievements_disabled: bool,
    pub editor_world: bool,
    pub created_in_editor: bool,
    pub exported_from_editor: bool,
    #[encoding(zigzag32)]
    pub day_cycle_stop_time: i32,
    #[encoding(zigzag32)]
    pub education_offer: i32,
    pub education_features_enabled: bool,
    pub education_product_id: String,
    #[encoding(le)]
    pub rain_level: f32,
    #[encoding(le)]
    pub lightning_level: f32,
    pub confirmed_platform_locked_content: bool,
    pub multiplayer_game: bool,
    pub broadcast_to_lan: bool,
    #[encoding(zigzag32)]
    pub xbox_live_broadcast_mode: i32,
    #[encoding(zigzag32)]
    pub platform_broadcast_mode: i32,
    pub commands_enabled: bool,
    pub texture_packs_required: bool,
    #[encoding(length_prefix = "var_u32")]
    pub game_rules: Vec<GameRule>,
    #[encoding(length_prefix = "i32_le")]
    pub experiments: Vec<Experiment>,
    pub experiments_previously_toggled: bool,
    pub bonus_chest: bool,
    pub start_with_map: bool,
    #[encoding(zigzag32)]
    pub player_permission: i32,
    #[encoding(le)]
    pub server_chunk_tick_range: i32,
    pub behaviour_pack_locked: bool,
    pub resource_pack_locked: bool,
    pub from_locked_template: bool,
    pub msa_gamertags_only: bool,
    pub from_world_template: bool,
    pub world_template_option_locked: bool,
    pub only_spawn_v1_villagers: bool,
    pub persona_disabled: bool,
    pub custom_skins_disabled: bool,
    pub emote_chat_muted: bool,
    pub game_version: String,
    #[encoding(le)]
    pub limited_world_width: i32,
    #[encoding(le)]
    pub limited_world_depth: i32,
    pub nether_type: bool,
    pub education_uri: EducationUriResource,
    #[encoding(bool_prefixed)]
    pub force_experimental_gameplay: Option<bool>,
    pub chat_restriction_level: u8,
    pub disable_player_interactions: bool,
    pub level_id: String,
    pub level_name: String,
    pub premium_world_template_id: String,
    pub trial: bool,
    pub movement_settings: PlayerMovementSettings,
    #[encoding(le)]
    pub current_tick: u64,
    #[encoding(zigzag32)]
    pub enchantment_seed: i32,
    #[encoding(length_prefix = "var_u32")]
    pub block_properties: Vec<BlockProperty>,
    #[encoding(length_prefix = "var_u32")]
    pub item_states: Vec<ItemState>,
    pub multiplayer_correlation_id: String,
    pub server_authoritative_inventory: bool,
    pub server_engine: String,
    pub player_property_data: NetworkNbt,
    #[encoding(le)]
    pub block_registry_checksum: u64,
    pub world_template_id: NetworkUuid,
    pub client_side_generation: bool,
    pub block_network_ids_are_hashes: bool,
    pub server_authoritative_sound: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct AddEntity {
    #[encoding(zigzag64)]
    pub unique_entity_id: i64,
    #[encoding(var_u64)]
    pub runtime_entity_id: u64,
    pub identifier: String,
    pub position: Vec3,
    pub motion: Vec3,
    #[encoding(le)]
    pub pitch: f32,
    #[encoding(le)]
    pub yaw: f32,
    #[encoding(le)]
    pub head_yaw: f32,
    #[encoding(le)]
    pub body_yaw: f32,
    #[encoding(length_prefix = "var_u32")]
    pub attributes: Vec<AttributeValue>,
    pub metadata: EntityDataMap,
    pub properties: PropertySyncData,
    #[encoding(length_prefix = "var_u32")]
    pub links: Vec<EntityLink>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct RemoveEntity {
    #[encoding(zigzag64)]
    pub unique_entity_id: i64,
}

pub mod move_flags {
    pub const ON_GROUND: u8 = 0x01;
    pub const TELEPORT: u8 = 0x02;
    pub const FORCE_MOVE_LOCAL_ENTITY: u8 = 0x04;
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct MoveEntityAbsolute {
    #[encoding(var_u64)]
    pub runtime_entity_id: u64,
    pub flags: u8,
    pub position: Vec3,
    #[encoding(angle)]
    pub pitch: f32,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub head_yaw: f32,
}

pub mod update_block_flags {
    pub const NEIGHBORS: u32 = 0x01;
    pub const NETWORK: u32 = 0x02;
    pub const PRIORITY: u32 = 0x08;
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct UpdateBlock {
    pub position: NetworkBlockPosition,
    #[encoding(var_u32)]
    pub runtime_id: u32,
    #[encoding(var_u32)]
    pub flags: u32,
    /// 0 for the block layer, 1 for the liquid layer.
    #[encoding(var_u32)]
    pub layer: u32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetEntityData {
    #[encoding(var_u64)]
    pub runtime_entity_id: u64,
    pub metadata: EntityDataMap,
    pub properties: PropertySyncData,
    #[encoding(var_u64)]
    pub tick: u64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetEntityMotion {
    #[encoding(var_u64)]
    pub runtime_entity_id: u64,
    pub motion: Vec3,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetEntityLink {
    pub link: EntityLink,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ContainerOpen {
    pub window_id: u8,
    pub container_type: i8,
    pub position: NetworkBlockPosition,
    #[encoding(zigzag64)]
    pub unique_entity_id: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct InventoryContent {
    #[encoding(var_u32)]
    pub window_id: u32,
    #[encoding(length_prefix = "var_u32")]
    pub items: Vec<ItemInstance>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct InventorySlot {
    #[encoding(var_u32)]
    pub window_id: u32,
    #[encoding(var_u32)]
    pub slot: u32,
    pub item: ItemInstance,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct LevelChunk {
    #[encoding(zigzag32)]
    pub chunk_x: i32,
    #[encoding(zigzag32)]
    pub chunk_z: i32,
    #[encoding(var_u32)]
    pub sub_chunk_count: u32,
    /// Blob caching is never negotiated, so this is always false.
    pub cache_enabled: bool,
    #[encoding(length_prefix = "var_u32")]
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChangeDimension {
    #[encoding(zigzag32)]
    pub dimension: i32,
    pub position: Vec3,
    pub respawn: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChunkRadiusUpdated {
    #[encoding(zigzag32)]
    pub radius: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct NetworkChunkPublisherUpdate {
    pub position: NetworkBlockPosition,
    #[encoding(var_u32)]
    pub radius: u32,
    #[encoding(length_prefix = "i32_le")]
    pub saved_chunks: Vec<ChunkCoordinate>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BiomeDefinitionList {
    pub definitions: NetworkNbt,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct NetworkSettings {
    #[encoding(le)]
    pub compression_threshold: u16,
    #[encoding(le)]
    pub compression_algorithm: u16,
    pub client_throttle_enabled: bool,
    pub client_throttle_threshold: u8,
    #[encoding(le)]
    pub client_throttle_scalar: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_to_vec, PacketId};

    #[test]
    fn shared_packets_keep_their_ids() {
        assert_eq!(<Text as PacketId>::ID, 0x09);
        assert_eq!(<ContainerClose as PacketId>::ID, 0x2f);
        let packet = Packet::from(Text::system("hi"));
        assert_eq!(packet.id(), 0x09);
    }

    #[test]
    fn hidden_disconnect_has_no_message() {
        let bytes = encode_to_vec(&Disconnect {
            reason: 0,
            message: None,
        });
        assert_eq!(bytes, [0, 1]);
        let decoded = Disconnect::decode(&mut Decoder::new(&bytes)).unwrap();
        assert_eq!(decoded.message, None);
    }

    #[test]
    fn play_status_is_a_big_endian_int() {
        assert_eq!(encode_to_vec(&PlayStatus::PlayerSpawn), [0, 0, 0, 3]);
    }
}
