use crate::protocol::packet::bedrock::types::Vec3;

/// Closed set of entity behaviours the mirror distinguishes.
///
/// Every catalog entity maps onto one of these; the kind only decides which
/// metadata fields are meaningful and how the entity is spawned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum EntityKind {
    Player,
    Boat,
    Minecart,
    /// Horses, donkeys, mules and their undead variants.
    AbstractHorse,
    /// Mobs with a baby variant.
    Ageable,
    /// Zombies carry their baby flag at the ageable index without being ageable.
    Zombie,
    EnderDragon,
    /// Invisible hitbox entity that belongs to a composite entity.
    DragonPart,
    ItemLike,
    Projectile,
    ArmorStand,
    Mob,
}

impl EntityKind {
    pub fn from_java_name(name: &str) -> Self {
        let path = name.strip_prefix("minecraft:").unwrap_or(name);
        match path {
            "player" => EntityKind::Player,
            "boat" | "chest_boat" => EntityKind::Boat,
            "minecart" | "chest_minecart" | "furnace_minecart" | "hopper_minecart"
            | "tnt_minecart" => EntityKind::Minecart,
            "horse" | "donkey" | "mule" | "skeleton_horse" | "zombie_horse" | "llama"
            | "trader_llama" | "camel" => EntityKind::AbstractHorse,
            "cow" | "pig" | "sheep" | "chicken" | "villager" | "wolf" | "cat" | "rabbit"
            | "fox" | "goat" | "mooshroom" | "panda" | "polar_bear" | "turtle" | "sniffer" => {
                EntityKind::Ageable
            }
            "zombie" | "zombie_villager" | "husk" | "drowned" => EntityKind::Zombie,
            "ender_dragon" => EntityKind::EnderDragon,
            "item" | "experience_orb" => EntityKind::ItemLike,
            "arrow" | "spectral_arrow" | "trident" | "snowball" | "egg" | "ender_pearl"
            | "fireball" | "small_fireball" => EntityKind::Projectile,
            "armor_stand" => EntityKind::ArmorStand,
            _ => EntityKind::Mob,
        }
    }
}

/// Whether the Java baby flag lives at index 16 for this kind.
pub fn has_baby_flag(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::Ageable | EntityKind::AbstractHorse | EntityKind::Zombie
    )
}

/// Riders of these vehicles cannot turn further than ±90° from its heading.
pub fn locks_rider_rotation(kind: EntityKind) -> bool {
    kind == EntityKind::Boat
}

pub fn has_gravity(kind: EntityKind) -> bool {
    !matches!(kind, EntityKind::EnderDragon | EntityKind::DragonPart)
}

/// One extra Bedrock entity making up a composite entity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PartShape {
    pub name: &'static str,
    /// Offset from the owner in its own frame (`-z` is forward).
    pub offset: Vec3,
    pub width: f32,
    pub height: f32,
}

const DRAGON_PARTS: &[PartShape] = &[
    part("head", 0.0, 3.0, -6.5, 1.0, 1.0),
    part("neck", 0.0, 3.0, -5.5, 3.0, 3.0),
    part("body", 0.0, 2.0, 0.5, 5.0, 3.0),
    part("tail1", 0.0, 2.0, 4.0, 2.0, 2.0),
    part("tail2", 0.0, 2.0, 6.0, 2.0, 2.0),
    part("tail3", 0.0, 2.0, 8.0, 2.0, 2.0),
    part("wing_left", 4.5, 2.0, 2.0, 4.0, 2.0),
    part("wing_right", -4.5, 2.0, 2.0, 4.0, 2.0),
];

const fn part(name: &'static str, x: f32, y: f32, z: f32, width: f32, height: f32) -> PartShape {
    PartShape {
        name,
        offset: Vec3::new(x, y, z),
        width,
        height,
    }
}

/// Extra entities spawned alongside the main one.
pub fn composite_parts(kind: EntityKind) -> &'static [PartShape] {
    match kind {
        EntityKind::EnderDragon => DRAGON_PARTS,
        _ => &[],
    }
}

/// Bedrock identifier used for composite parts.
pub const PART_IDENTIFIER: &str = "minecraft:armor_stand";

/// World position of a part for an owner at `origin` facing `yaw` degrees.
pub fn part_position(origin: Vec3, yaw: f32, part: &PartShape) -> Vec3 {
    let (sin, cos) = yaw.to_radians().sin_cos();
    Vec3::new(
        origin.x + part.offset.x * cos - part.offset.z * sin,
        origin.y + part.offset.y,
        origin.z + part.offset.x * sin + part.offset.z * cos,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_come_from_catalog_names() {
        assert_eq!(EntityKind::from_java_name("minecraft:boat"), EntityKind::Boat);
        assert_eq!(
            EntityKind::from_java_name("minecraft:skeleton_horse"),
            EntityKind::AbstractHorse
        );
        assert_eq!(EntityKind::from_java_name("minecraft:creeper"), EntityKind::Mob);
    }

    #[test]
    fn the_dragon_has_eight_parts() {
        assert_eq!(composite_parts(EntityKind::EnderDragon).len(), 8);
        assert!(composite_parts(EntityKind::Boat).is_empty());
    }

    #[test]
    fn parts_rotate_with_the_owner() {
        let head = &DRAGON_PARTS[0];
        let facing_south = part_position(Vec3::ZERO, 0.0, head);
        assert!((facing_south.z + 6.5).abs() < 1e-4);
        let turned = part_position(Vec3::ZERO, 90.0, head);
        assert!((turned.x - 6.5).abs() < 1e-4);
        assert!(turned.z.abs() < 1e-4);
    }
}
