use crate::protocol::packet::java::Slot;
use bedrock_bridge_macros::{Decode, Encode, PacketIds};

#[derive(Debug, Clone, PacketIds, strum::AsRefStr)]
pub enum Packet {
    #[encoding(id = 0x00)]
    ConfirmTeleportation(ConfirmTeleportation),
    #[encoding(id = 0x04)]
    ChatCommand(ChatCommand),
    #[encoding(id = 0x05)]
    ChatMessage(ChatMessage),
    #[encoding(id = 0x07)]
    ChunkBatchReceived(ChunkBatchReceived),
    #[encoding(id = 0x0d)]
    ClickContainer(ClickContainer),
    #[encoding(id = 0x0e)]
    CloseContainer(CloseContainer),
    #[encoding(id = 0x15)]
    KeepAlive(KeepAlive),
    #[encoding(id = 0x17)]
    SetPlayerPosition(SetPlayerPosition),
    #[encoding(id = 0x18)]
    SetPlayerPositionAndRotation(SetPlayerPositionAndRotation),
    #[encoding(id = 0x24)]
    Pong(Pong),
    #[encoding(id = 0x2f)]
    SetCreativeModeSlot(SetCreativeModeSlot),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ConfirmTeleportation {
    #[encoding(varint)]
    pub teleport_id: i32,
}

/// Unsigned chat. The trailer holds the (absent) signature, the
/// acknowledgement count and the acknowledgement bitset.
#[derive(Debug, Clone, Encode, Decode)]
pub struct ChatMessage {
    pub message: String,
    pub timestamp: i64,
    pub salt: i64,
    #[encoding(length_prefix = "inferred")]
    pub trailer: Vec<u8>,
}

impl ChatMessage {
    pub fn unsigned(message: String, timestamp: i64) -> Self {
        Self {
            message,
            timestamp,
            salt: 0,
            // no signature, zero acknowledged messages, empty bitset
            trailer: vec![0, 0, 0, 0, 0],
        }
    }
}

/// A command without its leading slash, with no argument signatures.
#[derive(Debug, Clone, Encode, Decode)]
pub struct ChatCommand {
    pub command: String,
    pub timestamp: i64,
    pub salt: i64,
    #[encoding(length_prefix = "inferred")]
    pub trailer: Vec<u8>,
}

impl ChatCommand {
    pub fn unsigned(command: String, timestamp: i64) -> Self {
        Self {
            command,
            timestamp,
            salt: 0,
            // zero signatures, zero acknowledged messages, empty bitset
            trailer: vec![0, 0, 0, 0, 0],
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChunkBatchReceived {
    pub chunks_per_tick: f32,
}

pub mod click_mode {
    pub const PICKUP: i32 = 0;
}

/// Slot index meaning "outside the window".
pub const SLOT_OUTSIDE: i16 = -999;

/// A click in a container window, with the slots the client believes it
/// changed. The server resyncs the window when it disagrees.
#[derive(Debug, Clone, Encode, Decode)]
pub struct ClickContainer {
    pub window_id: u8,
    /// Last state id the server sent for this window.
    #[encoding(varint)]
    pub state_id: i32,
    pub slot: i16,
    pub button: i8,
    /// See [`click_mode`].
    #[encoding(varint)]
    pub mode: i32,
    #[encoding(length_prefix = "varint")]
    pub changed_slots: Vec<ChangedSlot>,
    pub carried_item: Slot,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ChangedSlot {
    pub slot: i16,
    pub item: Slot,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CloseContainer {
    pub window_id: u8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct KeepAlive {
    pub id: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetPlayerPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetPlayerPositionAndRotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Pong {
    pub id: i32,
}

/// Creative players set player-window slots directly.
#[derive(Debug, Clone, Encode, Decode)]
pub struct SetCreativeModeSlot {
    pub slot: i16,
    pub clicked_item: Slot,
}
