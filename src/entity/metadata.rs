//! Java entity metadata to Bedrock entity data.

use crate::{
    catalog::EntityEntry,
    entity::kind::{self, EntityKind},
    protocol::packet::{
        bedrock::types::{EntityDataMap, EntityDataValue},
        java::{MetadataEntry, MetadataValue},
    },
};

/// Bedrock entity data keys.
pub mod keys {
    pub const FLAGS: u32 = 0;
    pub const NAME: u32 = 4;
    pub const AIR: u32 = 7;
    pub const SCALE: u32 = 38;
    pub const MAX_AIR: u32 = 42;
    pub const BOUNDING_BOX_WIDTH: u32 = 53;
    pub const BOUNDING_BOX_HEIGHT: u32 = 54;
    pub const RIDER_ROTATION_LOCKED: u32 = 57;
    pub const RIDER_MAX_ROTATION: u32 = 58;
    pub const RIDER_MIN_ROTATION: u32 = 59;
    pub const FLAGS_EXTENDED: u32 = 92;
}

/// Bit positions in the Bedrock entity flag set.
pub mod flags {
    pub const ONFIRE: u32 = 0;
    pub const SNEAKING: u32 = 1;
    pub const RIDING: u32 = 2;
    pub const SPRINTING: u32 = 3;
    pub const INVISIBLE: u32 = 5;
    pub const SADDLED: u32 = 8;
    pub const BABY: u32 = 11;
    pub const CAN_SHOW_NAMETAG: u32 = 14;
    pub const ALWAYS_SHOW_NAMETAG: u32 = 15;
    pub const NO_AI: u32 = 16;
    pub const SILENT: u32 = 17;
    pub const CAN_CLIMB: u32 = 19;
    pub const TAMED: u32 = 28;
    pub const GLIDING: u32 = 32;
    pub const CHESTED: u32 = 36;
    pub const REARING: u32 = 39;
    pub const HAS_COLLISION: u32 = 47;
    pub const AFFECTED_BY_GRAVITY: u32 = 48;
    pub const SWIMMING: u32 = 56;
    pub const EATING: u32 = 62;
    pub const SLEEPING: u32 = 75;
}

/// Java metadata indices shared by all entities.
mod java {
    pub const SHARED_FLAGS: u8 = 0;
    pub const AIR: u8 = 1;
    pub const CUSTOM_NAME: u8 = 2;
    pub const NAME_VISIBLE: u8 = 3;
    pub const SILENT: u8 = 4;
    pub const NO_GRAVITY: u8 = 5;
    pub const POSE: u8 = 6;
    pub const BABY: u8 = 16;
    pub const HORSE_FLAGS: u8 = 17;

    pub const ON_FIRE: i8 = 0x01;
    pub const CROUCHING: i8 = 0x02;
    pub const SPRINTING: i8 = 0x08;
    pub const SWIMMING: i8 = 0x10;
    pub const INVISIBLE: i8 = 0x20;
    pub const GLIDING: i8 = -0x80;

    pub const HORSE_TAMED: i8 = 0x02;
    pub const HORSE_SADDLED: i8 = 0x04;
    // 0x08 (bred) has no Bedrock counterpart.
    pub const HORSE_EATING: i8 = 0x10;
    pub const HORSE_REARING: i8 = 0x20;

    pub const POSE_SLEEPING: i32 = 2;
    pub const POSE_SWIMMING: i32 = 3;
    pub const POSE_CROUCHING: i32 = 5;
}

pub const MAX_AIR: i16 = 300;

/// The Bedrock flag set: bits 0..64 travel in `FLAGS`, the rest in
/// `FLAGS_EXTENDED`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityFlags(u128);

impl EntityFlags {
    pub fn get(self, bit: u32) -> bool {
        self.0 & (1 << bit) != 0
    }

    pub fn set(&mut self, bit: u32, on: bool) {
        if on {
            self.0 |= 1 << bit;
        } else {
            self.0 &= !(1 << bit);
        }
    }

    pub fn write(self, data: &mut EntityDataMap) {
        data.insert(keys::FLAGS, EntityDataValue::Long(self.0 as u64 as i64));
        data.insert(
            keys::FLAGS_EXTENDED,
            EntityDataValue::Long((self.0 >> 64) as u64 as i64),
        );
    }
}

/// Data every freshly spawned entity starts with.
pub fn spawn_defaults(kind: EntityKind, entry: &EntityEntry) -> (EntityFlags, EntityDataMap) {
    let mut flags = EntityFlags::default();
    flags.set(flags::HAS_COLLISION, true);
    flags.set(flags::AFFECTED_BY_GRAVITY, kind::has_gravity(kind));
    flags.set(flags::CAN_SHOW_NAMETAG, true);
    flags.set(flags::CAN_CLIMB, true);

    let mut data = EntityDataMap::new();
    data.insert(keys::SCALE, EntityDataValue::Float(1.0));
    data.insert(keys::BOUNDING_BOX_WIDTH, EntityDataValue::Float(entry.width));
    data.insert(keys::BOUNDING_BOX_HEIGHT, EntityDataValue::Float(entry.height));
    data.insert(keys::AIR, EntityDataValue::Short(MAX_AIR));
    data.insert(keys::MAX_AIR, EntityDataValue::Short(MAX_AIR));
    flags.write(&mut data);
    (flags, data)
}

/// Data for an invisible composite part.
pub fn part_defaults(width: f32, height: f32) -> (EntityFlags, EntityDataMap) {
    let mut flags = EntityFlags::default();
    flags.set(flags::INVISIBLE, true);
    flags.set(flags::NO_AI, true);
    flags.set(flags::HAS_COLLISION, true);

    let mut data = EntityDataMap::new();
    data.insert(keys::SCALE, EntityDataValue::Float(1.0));
    data.insert(keys::BOUNDING_BOX_WIDTH, EntityDataValue::Float(width));
    data.insert(keys::BOUNDING_BOX_HEIGHT, EntityDataValue::Float(height));
    flags.write(&mut data);
    (flags, data)
}

/// Rider data for mounting (`Some(vehicle kind)`) or dismounting (`None`).
pub fn apply_riding(flags: &mut EntityFlags, out: &mut EntityDataMap, vehicle: Option<EntityKind>) {
    flags.set(flags::RIDING, vehicle.is_some());
    let locked = vehicle.is_some_and(kind::locks_rider_rotation);
    out.insert(
        keys::RIDER_ROTATION_LOCKED,
        EntityDataValue::Byte(u8::from(locked)),
    );
    if locked {
        out.insert(keys::RIDER_MAX_ROTATION, EntityDataValue::Float(90.0));
        out.insert(keys::RIDER_MIN_ROTATION, EntityDataValue::Float(-90.0));
    }
}

/// Translates a metadata delta into `out`, updating `flags` in place.
///
/// Entries with no Bedrock counterpart are skipped.
pub fn translate(
    kind: EntityKind,
    entries: &[MetadataEntry],
    flags: &mut EntityFlags,
    out: &mut EntityDataMap,
) {
    for entry in entries {
        match (entry.index, &entry.value) {
            (java::SHARED_FLAGS, MetadataValue::Byte(bits)) => {
                let bits = *bits;
                flags.set(flags::ONFIRE, bits & java::ON_FIRE != 0);
                flags.set(flags::SNEAKING, bits & java::CROUCHING != 0);
                flags.set(flags::SPRINTING, bits & java::SPRINTING != 0);
                flags.set(flags::SWIMMING, bits & java::SWIMMING != 0);
                flags.set(flags::INVISIBLE, bits & java::INVISIBLE != 0);
                flags.set(flags::GLIDING, bits & java::GLIDING != 0);
            }
            (java::AIR, MetadataValue::VarInt(air)) => {
                let air = (*air).clamp(0, i32::from(MAX_AIR)) as i16;
                out.insert(keys::AIR, EntityDataValue::Short(air));
            }
            (java::CUSTOM_NAME, MetadataValue::OptionalText(name)) => {
                let name = name.as_ref().map(|text| text.to_plain()).unwrap_or_default();
                out.insert(keys::NAME, EntityDataValue::String(name));
            }
            (java::NAME_VISIBLE, MetadataValue::Boolean(visible)) => {
                flags.set(flags::ALWAYS_SHOW_NAMETAG, *visible);
            }
            (java::SILENT, MetadataValue::Boolean(silent)) => {
                flags.set(flags::SILENT, *silent);
            }
            (java::NO_GRAVITY, MetadataValue::Boolean(no_gravity)) => {
                flags.set(flags::AFFECTED_BY_GRAVITY, !no_gravity);
            }
            (java::POSE, MetadataValue::Pose(pose)) => {
                flags.set(flags::SLEEPING, *pose == java::POSE_SLEEPING);
                if *pose == java::POSE_SWIMMING {
                    flags.set(flags::SWIMMING, true);
                }
                if *pose == java::POSE_CROUCHING {
                    flags.set(flags::SNEAKING, true);
                }
            }
            (java::BABY, MetadataValue::Boolean(baby)) if kind::has_baby_flag(kind) => {
                flags.set(flags::BABY, *baby);
                let scale = if *baby { 0.55 } else { 1.0 };
                out.insert(keys::SCALE, EntityDataValue::Float(scale));
            }
            (java::HORSE_FLAGS, MetadataValue::Byte(bits)) if kind == EntityKind::AbstractHorse => {
                let bits = *bits;
                flags.set(flags::TAMED, bits & java::HORSE_TAMED != 0);
                flags.set(flags::SADDLED, bits & java::HORSE_SADDLED != 0);
                flags.set(flags::EATING, bits & java::HORSE_EATING != 0);
                flags.set(flags::REARING, bits & java::HORSE_REARING != 0);
            }
            _ => {}
        }
    }
}
