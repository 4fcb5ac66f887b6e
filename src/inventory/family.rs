//! Per-family item rules layered on top of the generic tag translation.
//!
//! A family claims the tags it understands before the generic pass runs, so
//! both directions stay inverses of each other.

use super::item::{enchantments_to_bedrock, enchantments_to_java, ItemTranslator, Translation};
use crate::{
    persistence::TrackedPosition,
    position::BlockPosition,
    protocol::nbt::{Compound, List, Tag},
};
use ahash::AHashMap;
use once_cell::sync::Lazy;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::AsRefStr)]
pub enum ItemFamily {
    Default,
    EnchantedBook,
    Banner,
    Potion,
    /// Plain and tipped arrows share one Bedrock item.
    Arrow,
    DyedArmor,
    /// Compasses; a lodestone target turns one into a lodestone compass.
    Compass,
}

#[derive(Copy, Clone, Debug)]
enum Rule {
    Exact(&'static str),
    Prefix(&'static str),
    Suffix(&'static str),
}

impl Rule {
    fn matches(self, name: &str) -> bool {
        match self {
            Rule::Exact(exact) => name == exact,
            Rule::Prefix(prefix) => name.starts_with(prefix),
            Rule::Suffix(suffix) => name.ends_with(suffix),
        }
    }
}

/// First match wins.
const RULES: &[(Rule, ItemFamily)] = &[
    (Rule::Exact("minecraft:enchanted_book"), ItemFamily::EnchantedBook),
    (Rule::Suffix("_banner"), ItemFamily::Banner),
    (Rule::Exact("minecraft:potion"), ItemFamily::Potion),
    (Rule::Exact("minecraft:splash_potion"), ItemFamily::Potion),
    (Rule::Exact("minecraft:lingering_potion"), ItemFamily::Potion),
    (Rule::Exact("minecraft:arrow"), ItemFamily::Arrow),
    (Rule::Exact("minecraft:tipped_arrow"), ItemFamily::Arrow),
    (Rule::Prefix("minecraft:leather_"), ItemFamily::DyedArmor),
    (Rule::Exact("minecraft:compass"), ItemFamily::Compass),
    (Rule::Exact("minecraft:lodestone_compass"), ItemFamily::Compass),
];

pub fn family_for(java_name: &str) -> ItemFamily {
    RULES
        .iter()
        .find(|(rule, _)| rule.matches(java_name))
        .map(|&(_, family)| family)
        .unwrap_or(ItemFamily::Default)
}

/// Java potion names by Bedrock potion id.
const POTIONS: &[(&str, u32)] = &[
    ("minecraft:water", 0),
    ("minecraft:mundane", 1),
    ("minecraft:thick", 3),
    ("minecraft:awkward", 4),
    ("minecraft:night_vision", 5),
    ("minecraft:long_night_vision", 6),
    ("minecraft:invisibility", 7),
    ("minecraft:long_invisibility", 8),
    ("minecraft:leaping", 9),
    ("minecraft:long_leaping", 10),
    ("minecraft:strong_leaping", 11),
    ("minecraft:fire_resistance", 12),
    ("minecraft:long_fire_resistance", 13),
    ("minecraft:swiftness", 14),
    ("minecraft:long_swiftness", 15),
    ("minecraft:strong_swiftness", 16),
    ("minecraft:slowness", 17),
    ("minecraft:long_slowness", 18),
    ("minecraft:water_breathing", 19),
    ("minecraft:long_water_breathing", 20),
    ("minecraft:healing", 21),
    ("minecraft:strong_healing", 22),
    ("minecraft:harming", 23),
    ("minecraft:strong_harming", 24),
    ("minecraft:poison", 25),
    ("minecraft:long_poison", 26),
    ("minecraft:strong_poison", 27),
    ("minecraft:regeneration", 28),
    ("minecraft:long_regeneration", 29),
    ("minecraft:strong_regeneration", 30),
    ("minecraft:strength", 31),
    ("minecraft:long_strength", 32),
    ("minecraft:strong_strength", 33),
    ("minecraft:weakness", 34),
    ("minecraft:long_weakness", 35),
    ("minecraft:turtle_master", 37),
    ("minecraft:long_turtle_master", 38),
    ("minecraft:strong_turtle_master", 39),
    ("minecraft:slow_falling", 40),
    ("minecraft:long_slow_falling", 41),
    ("minecraft:strong_slowness", 42),
];

static POTIONS_BY_NAME: Lazy<AHashMap<&'static str, u32>> =
    Lazy::new(|| POTIONS.iter().copied().collect());
static POTIONS_BY_ID: Lazy<AHashMap<u32, &'static str>> =
    Lazy::new(|| POTIONS.iter().map(|&(name, id)| (id, name)).collect());

const OMINOUS_BANNER_NAME: &str = r#"{"color":"gold","translate":"block.minecraft.ominous_banner"}"#;
const OMINOUS_BANNER_KEY: &str = "block.minecraft.ominous_banner";
/// Bedrock banner `Type` for the ominous banner.
const BANNER_TYPE_OMINOUS: i32 = 1;

/// `(pattern, Java colour)` of the ominous banner, bottom layer first.
const OMINOUS_PATTERNS: &[(&str, i32)] = &[
    ("mr", 9),
    ("bs", 8),
    ("cs", 7),
    ("bo", 8),
    ("ms", 15),
    ("hh", 8),
    ("mc", 8),
    ("bo", 15),
];

const TRACKING_HANDLE_TAG: &str = "trackingHandle";
const LODESTONE_COMPASS: &str = "minecraft:lodestone_compass";
const JAVA_COMPASS: &str = "minecraft:compass";
const JAVA_TIPPED_ARROW: &str = "minecraft:tipped_arrow";

impl ItemFamily {
    /// Families that store their own data in the Bedrock aux value.
    pub fn owns_aux_value(self) -> bool {
        matches!(self, ItemFamily::Potion | ItemFamily::Arrow)
    }

    pub(super) fn to_bedrock(self, items: &ItemTranslator, t: &mut Translation) {
        match self {
            ItemFamily::Default => {}
            ItemFamily::EnchantedBook => {
                if let Some(Tag::List(stored)) = t.java.remove("StoredEnchantments") {
                    t.bedrock_nbt
                        .insert("ench", Tag::List(enchantments_to_bedrock(&stored)));
                }
            }
            ItemFamily::Banner => banner_to_bedrock(t),
            ItemFamily::Potion => {
                if let Some(Tag::String(potion)) = t.java.remove("Potion") {
                    t.bedrock.damage = potion_id(&potion);
                }
            }
            ItemFamily::Arrow => {
                if let Some(Tag::String(potion)) = t.java.remove("Potion") {
                    t.bedrock.damage = potion_id(&potion) + 1;
                }
            }
            ItemFamily::DyedArmor => {
                if let Some(Tag::Compound(display)) = t.java.get_mut("display") {
                    if let Some(color) = display.remove("color") {
                        t.bedrock_nbt.insert("customColor", color);
                    }
                    if display.is_empty() {
                        t.java.remove("display");
                    }
                }
            }
            ItemFamily::Compass => lodestone_to_bedrock(items, t),
        }
    }

    pub(super) fn to_java(self, items: &ItemTranslator, t: &mut Translation) {
        match self {
            ItemFamily::Default => {}
            ItemFamily::EnchantedBook => {
                if let Some(Tag::List(ench)) = t.bedrock_nbt.remove("ench") {
                    t.java
                        .insert("StoredEnchantments", Tag::List(enchantments_to_java(&ench)));
                }
            }
            ItemFamily::Banner => banner_to_java(t),
            ItemFamily::Potion => {
                t.java
                    .insert("Potion", Tag::String(potion_name(t.bedrock.damage).to_owned()));
            }
            ItemFamily::Arrow => {
                if t.bedrock.damage > 0 {
                    if let Some(entry) = items.catalog().item_table().by_java_name(JAVA_TIPPED_ARROW) {
                        t.java_id = entry.java_id;
                    }
                    t.java.insert(
                        "Potion",
                        Tag::String(potion_name(t.bedrock.damage - 1).to_owned()),
                    );
                }
            }
            ItemFamily::DyedArmor => {
                if let Some(color) = t.bedrock_nbt.remove("customColor") {
                    let mut display = Compound::new();
                    display.insert("color", color);
                    t.java.insert("display", Tag::Compound(display));
                }
            }
            ItemFamily::Compass => lodestone_to_java(items, t),
        }
    }
}

fn potion_id(name: &str) -> u32 {
    POTIONS_BY_NAME.get(name).copied().unwrap_or_else(|| {
        tracing::debug!("Unknown potion {name}, using water");
        0
    })
}

fn potion_name(id: u32) -> &'static str {
    POTIONS_BY_ID.get(&id).copied().unwrap_or("minecraft:water")
}

fn banner_to_bedrock(t: &mut Translation) {
    let Some(mut block_entity) = t.java.take_compound("BlockEntityTag") else {
        return;
    };
    let patterns: Vec<(String, i32)> = block_entity
        .remove("Patterns")
        .and_then(|tag| match tag {
            Tag::List(list) => Some(list),
            _ => None,
        })
        .map(|list| {
            list.compounds()
                .filter_map(|pattern| {
                    Some((
                        pattern.get_str("Pattern")?.to_owned(),
                        pattern.get_i64("Color")? as i32,
                    ))
                })
                .collect()
        })
        .unwrap_or_default();
    if !block_entity.is_empty() {
        t.java.insert("BlockEntityTag", Tag::Compound(block_entity));
    }

    if is_ominous(&patterns) {
        t.bedrock_nbt.insert("Type", Tag::Int(BANNER_TYPE_OMINOUS));
        // The ominous name is implied by the type.
        if let Some(Tag::Compound(display)) = t.java.get_mut("display") {
            if display.get_str("Name").is_some_and(|name| name.contains(OMINOUS_BANNER_KEY)) {
                display.remove("Name");
            }
            if display.is_empty() {
                t.java.remove("display");
            }
        }
        return;
    }
    let patterns = patterns
        .into_iter()
        .map(|(pattern, color)| {
            let mut out = Compound::new();
            out.insert("Pattern", Tag::String(pattern));
            out.insert("Color", Tag::Int(15 - color));
            Tag::Compound(out)
        })
        .collect();
    t.bedrock_nbt.insert("Patterns", Tag::List(List::new(patterns)));
}

fn banner_to_java(t: &mut Translation) {
    let ominous = t.bedrock_nbt.remove("Type").and_then(|tag| tag.as_i64())
        == Some(BANNER_TYPE_OMINOUS.into());
    let patterns: Vec<Tag> = if ominous {
        OMINOUS_PATTERNS
            .iter()
            .map(|&(pattern, color)| java_pattern(pattern, color))
            .collect()
    } else {
        let Some(Tag::List(patterns)) = t.bedrock_nbt.remove("Patterns") else {
            return;
        };
        patterns
            .compounds()
            .filter_map(|pattern| {
                let color = pattern.get_i64("Color")? as i32;
                Some(java_pattern(pattern.get_str("Pattern")?, 15 - color))
            })
            .collect()
    };
    let mut block_entity = Compound::new();
    block_entity.insert("Patterns", Tag::List(List::new(patterns)));
    t.java.insert("BlockEntityTag", Tag::Compound(block_entity));
    if ominous {
        let mut display = match t.bedrock_nbt.take_compound("display") {
            Some(display) => display,
            None => Compound::new(),
        };
        display.insert("Name", Tag::String(OMINOUS_BANNER_NAME.to_owned()));
        t.java.insert("display", Tag::Compound(display));
    }
}

fn java_pattern(pattern: &str, color: i32) -> Tag {
    let mut out = Compound::new();
    out.insert("Pattern", Tag::String(pattern.to_owned()));
    out.insert("Color", Tag::Int(color));
    Tag::Compound(out)
}

fn is_ominous(patterns: &[(String, i32)]) -> bool {
    patterns.len() == OMINOUS_PATTERNS.len()
        && patterns
            .iter()
            .zip(OMINOUS_PATTERNS)
            .all(|((pattern, color), (expected, expected_color))| {
                pattern == expected && color == expected_color
            })
}

fn lodestone_to_bedrock(items: &ItemTranslator, t: &mut Translation) {
    let Some(pos) = t.java.take_compound("LodestonePos") else {
        return;
    };
    let (Some(x), Some(y), Some(z)) = (pos.get_i64("X"), pos.get_i64("Y"), pos.get_i64("Z")) else {
        tracing::debug!("Malformed LodestonePos {pos:?}");
        return;
    };
    let dimension = match t.java.remove("LodestoneDimension") {
        Some(Tag::String(dimension)) => dimension,
        _ => "minecraft:overworld".to_owned(),
    };
    let position = BlockPosition::new(x as i32, y as i32, z as i32);
    let handle = items
        .positions()
        .track(TrackedPosition::new(position, dimension));
    if let Some(id) = items.catalog().item_table().bedrock_id(LODESTONE_COMPASS) {
        t.bedrock.id = id;
    }
    t.bedrock_nbt.insert(TRACKING_HANDLE_TAG, Tag::Int(handle));
}

fn lodestone_to_java(items: &ItemTranslator, t: &mut Translation) {
    let table = items.catalog().item_table();
    if let Some(compass) = table.by_java_name(JAVA_COMPASS) {
        t.java_id = compass.java_id;
    }
    let Some(handle) = t.bedrock_nbt.remove(TRACKING_HANDLE_TAG).and_then(|tag| tag.as_i64()) else {
        return;
    };
    let Some(tracked) = items.positions().get(handle as i32) else {
        tracing::debug!("Lodestone compass refers to unknown handle {handle}");
        return;
    };
    let mut pos = Compound::new();
    pos.insert("X", Tag::Int(tracked.position.x));
    pos.insert("Y", Tag::Int(tracked.position.y));
    pos.insert("Z", Tag::Int(tracked.position.z));
    t.java.insert("LodestonePos", Tag::Compound(pos));
    t.java.insert("LodestoneDimension", Tag::String(tracked.dimension));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::Catalog,
        persistence::TrackedPositionRegistry,
        protocol::packet::java::{Slot, SlotData},
    };
    use std::sync::Arc;

    fn translator() -> ItemTranslator {
        ItemTranslator::new(
            Catalog::builtin().into_shared(),
            Arc::new(TrackedPositionRegistry::in_memory()),
        )
    }

    fn java_id(items: &ItemTranslator, name: &str) -> i32 {
        items.catalog().item_table().by_java_name(name).unwrap().java_id
    }

    fn stack(item_id: i32, nbt: Compound) -> Slot {
        Slot(Some(SlotData {
            item_id,
            count: 1,
            nbt: Some(nbt),
        }))
    }

    fn data(slot: &Slot) -> &SlotData {
        slot.0.as_ref().unwrap()
    }

    #[test]
    fn rules_pick_families() {
        assert_eq!(family_for("minecraft:red_banner"), ItemFamily::Banner);
        assert_eq!(family_for("minecraft:leather_boots"), ItemFamily::DyedArmor);
        assert_eq!(family_for("minecraft:tipped_arrow"), ItemFamily::Arrow);
        assert_eq!(family_for("minecraft:stone"), ItemFamily::Default);
    }

    #[test]
    fn lodestone_compass_round_trip() {
        let items = translator();
        let mut pos = Compound::new();
        pos.insert("X", Tag::Int(10));
        pos.insert("Y", Tag::Int(64));
        pos.insert("Z", Tag::Int(-5));
        let mut nbt = Compound::new();
        nbt.insert("LodestonePos", Tag::Compound(pos));
        nbt.insert("LodestoneDimension", Tag::String("minecraft:overworld".to_owned()));
        let compass = java_id(&items, JAVA_COMPASS);

        let bedrock = items.to_bedrock(&stack(compass, nbt));
        assert_eq!(Some(bedrock.id), items.catalog().item_table().bedrock_id(LODESTONE_COMPASS));
        let handle = bedrock.nbt.as_ref().unwrap().get_i64(TRACKING_HANDLE_TAG).unwrap();
        assert_eq!(
            items.positions().get(handle as i32),
            Some(TrackedPosition::new(BlockPosition::new(10, 64, -5), "minecraft:overworld"))
        );

        let java = items.to_java(&bedrock).unwrap();
        let java = data(&java);
        assert_eq!(java.item_id, compass);
        let nbt = java.nbt.as_ref().unwrap();
        let pos = nbt.get_compound("LodestonePos").unwrap();
        assert_eq!(
            (pos.get_i64("X"), pos.get_i64("Y"), pos.get_i64("Z")),
            (Some(10), Some(64), Some(-5))
        );
        assert_eq!(nbt.get_str("LodestoneDimension"), Some("minecraft:overworld"));
    }

    #[test]
    fn banner_colours_are_inverted() {
        let items = translator();
        let mut patterns = Compound::new();
        patterns.insert(
            "Patterns",
            Tag::List(List::new(vec![java_pattern("bri", 14), java_pattern("cre", 0)])),
        );
        let mut nbt = Compound::new();
        nbt.insert("BlockEntityTag", Tag::Compound(patterns));
        let banner = java_id(&items, "minecraft:red_banner");

        let bedrock = items.to_bedrock(&stack(banner, nbt));
        let bedrock_patterns = bedrock.nbt.as_ref().unwrap().get_list("Patterns").unwrap();
        let colors: Vec<_> = bedrock_patterns
            .compounds()
            .filter_map(|p| p.get_i64("Color"))
            .collect();
        assert_eq!(colors, vec![1, 15]);
        // Base colour travels in the aux value.
        assert_eq!(bedrock.damage, 1);

        let java = items.to_java(&bedrock).unwrap();
        assert_eq!(data(&java).item_id, banner);
        let back = data(&java)
            .nbt
            .as_ref()
            .and_then(|nbt| nbt.get_compound("BlockEntityTag"))
            .and_then(|tag| tag.get_list("Patterns"))
            .unwrap();
        let colors: Vec<_> = back.compounds().filter_map(|p| p.get_i64("Color")).collect();
        assert_eq!(colors, vec![14, 0]);
    }

    #[test]
    fn ominous_banners_use_the_bedrock_type() {
        let items = translator();
        let mut block_entity = Compound::new();
        block_entity.insert(
            "Patterns",
            Tag::List(List::new(
                OMINOUS_PATTERNS
                    .iter()
                    .map(|&(pattern, color)| java_pattern(pattern, color))
                    .collect(),
            )),
        );
        let mut display = Compound::new();
        display.insert("Name", Tag::String(OMINOUS_BANNER_NAME.to_owned()));
        let mut nbt = Compound::new();
        nbt.insert("BlockEntityTag", Tag::Compound(block_entity));
        nbt.insert("display", Tag::Compound(display));
        let banner = java_id(&items, "minecraft:white_banner");

        let bedrock = items.to_bedrock(&stack(banner, nbt));
        let bedrock_nbt = bedrock.nbt.as_ref().unwrap();
        assert_eq!(bedrock_nbt.get_i64("Type"), Some(1));
        assert!(!bedrock_nbt.contains("Patterns"));

        let java = items.to_java(&bedrock).unwrap();
        let nbt = data(&java).nbt.as_ref().unwrap();
        let patterns = nbt
            .get_compound("BlockEntityTag")
            .and_then(|tag| tag.get_list("Patterns"))
            .unwrap();
        assert_eq!(patterns.len(), OMINOUS_PATTERNS.len());
        assert_eq!(
            nbt.get_compound("display").and_then(|d| d.get_str("Name")),
            Some(OMINOUS_BANNER_NAME)
        );
    }

    #[test]
    fn potions_and_tipped_arrows_use_the_aux_value() {
        let items = translator();
        let mut nbt = Compound::new();
        nbt.insert("Potion", Tag::String("minecraft:swiftness".to_owned()));
        let potion = java_id(&items, "minecraft:potion");
        let bedrock = items.to_bedrock(&stack(potion, nbt.clone()));
        assert_eq!((bedrock.damage, bedrock.nbt.as_ref()), (14, None));
        let java = items.to_java(&bedrock).unwrap();
        assert_eq!(data(&java).nbt.as_ref().unwrap().get_str("Potion"), Some("minecraft:swiftness"));

        let tipped = java_id(&items, JAVA_TIPPED_ARROW);
        let bedrock = items.to_bedrock(&stack(tipped, nbt));
        assert_eq!(bedrock.damage, 15);
        let java = items.to_java(&bedrock).unwrap();
        assert_eq!(data(&java).item_id, tipped);

        let arrow = java_id(&items, "minecraft:arrow");
        let plain = items.to_bedrock(&Slot(Some(SlotData {
            item_id: arrow,
            count: 16,
            nbt: None,
        })));
        assert_eq!(plain.damage, 0);
        assert_eq!(data(&items.to_java(&plain).unwrap()).item_id, arrow);
    }

    #[test]
    fn dyed_armor_keeps_its_colour() {
        let items = translator();
        let mut display = Compound::new();
        display.insert("color", Tag::Int(0x3366ff));
        let mut nbt = Compound::new();
        nbt.insert("display", Tag::Compound(display));
        let helmet = java_id(&items, "minecraft:leather_helmet");

        let bedrock = items.to_bedrock(&stack(helmet, nbt));
        let bedrock_nbt = bedrock.nbt.as_ref().unwrap();
        assert_eq!(bedrock_nbt.get_i64("customColor"), Some(0x3366ff));
        assert!(!bedrock_nbt.contains("display"));

        let java = items.to_java(&bedrock).unwrap();
        let color = data(&java)
            .nbt
            .as_ref()
            .and_then(|nbt| nbt.get_compound("display"))
            .and_then(|display| display.get_i64("color"));
        assert_eq!(color, Some(0x3366ff));
    }

    #[test]
    fn enchanted_books_store_enchantments() {
        let items = translator();
        let mut mending = Compound::new();
        mending.insert("id", Tag::String("minecraft:mending".to_owned()));
        mending.insert("lvl", Tag::Short(1));
        let mut nbt = Compound::new();
        nbt.insert("StoredEnchantments", Tag::List(List::new(vec![Tag::Compound(mending)])));
        let book = java_id(&items, "minecraft:enchanted_book");

        let bedrock = items.to_bedrock(&stack(book, nbt));
        let ench = bedrock.nbt.as_ref().unwrap().get_list("ench").unwrap();
        assert_eq!(ench.compounds().next().unwrap().get_i64("id"), Some(26));

        let java = items.to_java(&bedrock).unwrap();
        let nbt = data(&java).nbt.as_ref().unwrap();
        assert!(nbt.get_list("StoredEnchantments").is_some());
        assert!(!nbt.contains("Enchantments"));
    }
}
