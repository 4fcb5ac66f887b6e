use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub x: i32,
    pub z: i32,
}

impl ChunkPosition {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPosition {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn chunk(self) -> ChunkPosition {
        ChunkPosition {
            x: self.x.div_euclid(16),
            z: self.z.div_euclid(16),
        }
    }

    /// Section index along Y in world coordinates (not offset by `min_y`).
    pub fn section_y(self) -> i32 {
        self.y.div_euclid(16)
    }

    /// Position within the containing 16x16x16 section.
    pub fn local(self) -> LocalPosition {
        LocalPosition {
            x: self.x.rem_euclid(16) as u8,
            y: self.y.rem_euclid(16) as u8,
            z: self.z.rem_euclid(16) as u8,
        }
    }
}

/// Coordinates inside a section, each in `0..16`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalPosition {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalPosition {
    /// Java section order: `y << 8 | z << 4 | x`.
    pub fn java_index(self) -> usize {
        usize::from(self.y) << 8 | usize::from(self.z) << 4 | usize::from(self.x)
    }

    /// Bedrock section order: `x << 8 | z << 4 | y`.
    pub fn bedrock_index(self) -> usize {
        usize::from(self.x) << 8 | usize::from(self.z) << 4 | usize::from(self.y)
    }

    pub fn from_java_index(index: usize) -> Self {
        Self {
            x: (index & 0xF) as u8,
            y: ((index >> 8) & 0xF) as u8,
            z: ((index >> 4) & 0xF) as u8,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct EntityPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl EntityPosition {
    pub fn block(self) -> BlockPosition {
        BlockPosition {
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
            z: self.z.floor() as i32,
        }
    }
}

/// Delta encoding for a new entity position.
/// Used in the UpdateEntityPosition packet family.
#[derive(Copy, Clone, Debug)]
pub struct EntityPositionDelta {
    pub dx: i16,
    pub dy: i16,
    pub dz: i16,
}

impl Add<EntityPositionDelta> for EntityPosition {
    type Output = EntityPosition;

    fn add(self, rhs: EntityPositionDelta) -> Self::Output {
        EntityPosition {
            x: self.x + convert_delta(rhs.dx),
            y: self.y + convert_delta(rhs.dy),
            z: self.z + convert_delta(rhs.dz),
            yaw: self.yaw,
            pitch: self.pitch,
        }
    }
}

impl AddAssign<EntityPositionDelta> for EntityPosition {
    fn add_assign(&mut self, rhs: EntityPositionDelta) {
        *self = *self + rhs;
    }
}

fn convert_delta(delta: i16) -> f64 {
    f64::from(delta) / 4096.0
}

/// Entity velocity in blocks per tick.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Velocity {
    /// Java sends velocity in 1/8000 blocks per tick.
    pub fn from_java(x: i16, y: i16, z: i16) -> Self {
        Self {
            x: f32::from(x) / 8000.0,
            y: f32::from(y) / 8000.0,
            z: f32::from(z) / 8000.0,
        }
    }
}
