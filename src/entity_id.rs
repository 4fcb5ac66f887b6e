use serde::{Deserialize, Serialize};

/// Wrapper for a Java network entity ID.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JavaEntityId(i32);

impl JavaEntityId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(self) -> i32 {
        self.0
    }
}

/// Wrapper for a Bedrock entity ID.
///
/// The bridge uses the same value for the runtime id and the unique id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BedrockEntityId(u64);

impl BedrockEntityId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn runtime_id(self) -> u64 {
        self.0
    }

    pub fn unique_id(self) -> i64 {
        self.0 as i64
    }
}

/// Hands out Bedrock ids in increasing order. Ids are never reused.
#[derive(Debug)]
pub struct BedrockIdAllocator {
    next: u64,
}

impl BedrockIdAllocator {
    /// Id 1 is reserved for the local player.
    pub const LOCAL_PLAYER: BedrockEntityId = BedrockEntityId(1);

    pub fn new() -> Self {
        Self { next: 2 }
    }

    pub fn allocate(&mut self) -> BedrockEntityId {
        let id = BedrockEntityId(self.next);
        self.next += 1;
        id
    }
}

impl Default for BedrockIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
