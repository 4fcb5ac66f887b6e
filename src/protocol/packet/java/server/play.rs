use crate::{
    position::{BlockPosition, EntityPositionDelta},
    protocol::{
        packet::java::{EntityMetadata, Nbt, Slot, TextComponent},
        VarInt, VarLong,
    },
};
use bedrock_bridge_macros::{Decode, Encode, PacketIds};
use bitflags::bitflags;
use uuid::Uuid;

#[derive(Debug, Clone, PacketIds, strum::AsRefStr)]
pub enum Packet {
    #[encoding(id = 0x01)]
    SpawnEntity(SpawnEntity),
    #[encoding(id = 0x02)]
    SpawnExperienceOrb(SpawnExperienceOrb),
    #[encoding(id = 0x09)]
    BlockUpdate(BlockUpdate),
    #[encoding(id = 0x0c)]
    ChunkBatchFinished(ChunkBatchFinished),
    #[encoding(id = 0x12)]
    CloseContainer(CloseContainer),
    #[encoding(id = 0x13)]
    SetContainerContents(SetContainerContents),
    #[encoding(id = 0x15)]
    SetContainerSlot(SetContainerSlot),
    #[encoding(id = 0x1b)]
    Disconnect(Disconnect),
    #[encoding(id = 0x1f)]
    UnloadChunk(UnloadChunk),
    #[encoding(id = 0x24)]
    KeepAlive(KeepAlive),
    #[encoding(id = 0x25)]
    ChunkAndLightData(ChunkAndLightData),
    #[encoding(id = 0x29)]
    Login(Login),
    #[encoding(id = 0x2c)]
    UpdateEntityPosition(UpdateEntityPosition),
    #[encoding(id = 0x2d)]
    UpdateEntityPositionAndRotation(UpdateEntityPositionAndRotation),
    #[encoding(id = 0x2e)]
    UpdateEntityRotation(UpdateEntityRotation),
    #[encoding(id = 0x31)]
    OpenScreen(OpenScreen),
    #[encoding(id = 0x33)]
    Ping(Ping),
    #[encoding(id = 0x3e)]
    SynchronizePlayerPosition(SynchronizePlayerPosition),
    #[encoding(id = 0x40)]
    RemoveEntities(RemoveEntities),
    #[encoding(id = 0x45)]
    Respawn(Respawn),
    #[encoding(id = 0x47)]
    UpdateSectionBlocks(UpdateSectionBlocks),
    #[encoding(id = 0x56)]
    SetEntityMetadata(SetEntityMetadata),
    #[encoding(id = 0x58)]
    SetEntityVelocity(SetEntityVelocity),
    #[encoding(id = 0x5d)]
    SetPassengers(SetPassengers),
    #[encoding(id = 0x69)]
    SystemChatMessage(SystemChatMessage),
    #[encoding(id = 0x6d)]
    TeleportEntity(TeleportEntity),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnEntity {
    #[encoding(varint)]
    pub entity_id: i32,
    pub uuid: Uuid,
    #[encoding(varint)]
    pub kind: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[encoding(angle)]
    pub pitch: f32,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub head_yaw: f32,
    #[encoding(varint)]
    pub data: i32,
    pub velocity_x: i16,
    pub velocity_y: i16,
    pub velocity_z: i16,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnExperienceOrb {
    #[encoding(varint)]
    pub entity_id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub count: i16,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BlockUpdate {
    pub location: BlockPosition,
    #[encoding(varint)]
    pub block_id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChunkBatchFinished {
    #[encoding(varint)]
    pub batch_size: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CloseContainer {
    pub window_id: u8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetContainerContents {
    pub window_id: u8,
    #[encoding(varint)]
    pub state_id: i32,
    #[encoding(length_prefix = "varint")]
    pub slots: Vec<Slot>,
    pub carried_item: Slot,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetContainerSlot {
    pub window_id: i8,
    #[encoding(varint)]
    pub state_id: i32,
    pub slot: i16,
    pub data: Slot,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Disconnect {
    pub reason: TextComponent,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UnloadChunk {
    pub chunk_z: i32,
    pub chunk_x: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct KeepAlive {
    pub id: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChunkAndLightData {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub heightmaps: Nbt,
    #[encoding(length_prefix = "varint")]
    pub data: Vec<u8>,
    #[encoding(length_prefix = "varint")]
    pub block_entities: Vec<ChunkBlockEntity>,
    /// Light data. Bedrock computes its own lighting.
    #[encoding(length_prefix = "inferred")]
    pub light: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChunkBlockEntity {
    /// `(x << 4) | z` within the column.
    pub packed_xz: u8,
    pub y: i16,
    #[encoding(varint)]
    pub kind: i32,
    pub data: Nbt,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct DeathLocation {
    pub dimension: String,
    pub location: BlockPosition,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Login {
    pub entity_id: i32,
    pub is_hardcore: bool,
    #[encoding(length_prefix = "varint")]
    pub dimension_names: Vec<String>,
    #[encoding(varint)]
    pub max_players: i32,
    #[encoding(varint)]
    pub view_distance: i32,
    #[encoding(varint)]
    pub simulation_distance: i32,
    pub reduced_debug_info: bool,
    pub enable_respawn_screen: bool,
    pub do_limited_crafting: bool,
    pub dimension_type: String,
    pub dimension_name: String,
    pub hashed_seed: i64,
    pub game_mode: u8,
    pub previous_game_mode: i8,
    pub is_debug: bool,
    pub is_flat: bool,
    #[encoding(bool_prefixed)]
    pub death_location: Option<DeathLocation>,
    #[encoding(varint)]
    pub portal_cooldown: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateEntityPosition {
    #[encoding(varint)]
    pub entity_id: i32,
    pub delta_x: i16,
    pub delta_y: i16,
    pub delta_z: i16,
    pub on_ground: bool,
}

impl UpdateEntityPosition {
    pub fn delta(&self) -> EntityPositionDelta {
        EntityPositionDelta {
            dx: self.delta_x,
            dy: self.delta_y,
            dz: self.delta_z,
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateEntityPositionAndRotation {
    #[encoding(varint)]
    pub entity_id: i32,
    pub delta_x: i16,
    pub delta_y: i16,
    pub delta_z: i16,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub pitch: f32,
    pub on_ground: bool,
}

impl UpdateEntityPositionAndRotation {
    pub fn delta(&self) -> EntityPositionDelta {
        EntityPositionDelta {
            dx: self.delta_x,
            dy: self.delta_y,
            dz: self.delta_z,
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateEntityRotation {
    #[encoding(varint)]
    pub entity_id: i32,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub pitch: f32,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct OpenScreen {
    #[encoding(varint)]
    pub window_id: i32,
    #[encoding(varint)]
    pub window_type: i32,
    pub title: TextComponent,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Ping {
    pub id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SynchronizePlayerPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    /// See [`RelativeFlags`].
    pub flags: u8,
    #[encoding(varint)]
    pub teleport_id: i32,
}

bitflags! {
    /// Fields of a position synchronization that are offsets from the
    /// current value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RelativeFlags: u8 {
        const X = 0x01;
        const Y = 0x02;
        const Z = 0x04;
        const YAW = 0x08;
        const PITCH = 0x10;
    }
}

impl SynchronizePlayerPosition {
    pub fn relative(&self) -> RelativeFlags {
        RelativeFlags::from_bits_truncate(self.flags)
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct RemoveEntities {
    #[encoding(length_prefix = "varint")]
    pub entities: Vec<VarInt>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Respawn {
    pub dimension_type: String,
    pub dimension_name: String,
    pub hashed_seed: i64,
    pub game_mode: u8,
    pub previous_game_mode: i8,
    pub is_debug: bool,
    pub is_flat: bool,
    #[encoding(bool_prefixed)]
    pub death_location: Option<DeathLocation>,
    #[encoding(varint)]
    pub portal_cooldown: i32,
    pub data_kept: u8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateSectionBlocks {
    /// Packed section coordinate: x (22 bits), z (22 bits), y (20 bits).
    pub section_position: i64,
    /// Each entry is `state << 12 | x << 8 | z << 4 | y`.
    #[encoding(length_prefix = "varint")]
    pub blocks: Vec<VarLong>,
}

impl UpdateSectionBlocks {
    /// Expands the packed entries into absolute block changes.
    pub fn changes(&self) -> impl Iterator<Item = (BlockPosition, i32)> + '_ {
        let section_x = (self.section_position >> 42) as i32;
        let section_y = (self.section_position << 44 >> 44) as i32;
        let section_z = (self.section_position << 22 >> 42) as i32;
        self.blocks.iter().map(move |&VarLong(entry)| {
            let state = (entry >> 12) as i32;
            let position = BlockPosition {
                x: section_x * 16 + ((entry >> 8) & 0xF) as i32,
                y: section_y * 16 + (entry & 0xF) as i32,
                z: section_z * 16 + ((entry >> 4) & 0xF) as i32,
            };
            (position, state)
        })
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetEntityMetadata {
    #[encoding(varint)]
    pub entity_id: i32,
    pub metadata: EntityMetadata,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetEntityVelocity {
    #[encoding(varint)]
    pub entity_id: i32,
    pub velocity_x: i16,
    pub velocity_y: i16,
    pub velocity_z: i16,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetPassengers {
    #[encoding(varint)]
    pub entity_id: i32,
    #[encoding(length_prefix = "varint")]
    pub passengers: Vec<VarInt>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SystemChatMessage {
    pub content: TextComponent,
    pub overlay: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct TeleportEntity {
    #[encoding(varint)]
    pub entity_id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub pitch: f32,
    pub on_ground: bool,
}
