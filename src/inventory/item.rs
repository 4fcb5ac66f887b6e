//! Java item stacks to Bedrock item instances and back.

use super::family::{self, ItemFamily};
use crate::{
    catalog::{Catalog, ItemEntry, PLACEHOLDER_ITEM},
    error::TranslationError,
    persistence::TrackedPositionRegistry,
    protocol::{
        nbt::{Compound, List, Tag},
        packet::{
            bedrock::types::ItemInstance,
            java::{Slot, SlotData},
        },
    },
};
use ahash::AHashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Bedrock tag that keeps the Java id of an item without a Bedrock mapping.
pub const JAVA_ID_TAG: &str = "bridge:java_id";

/// Java enchantment names by Bedrock enchantment id.
const ENCHANTMENTS: &[(&str, i16)] = &[
    ("minecraft:protection", 0),
    ("minecraft:fire_protection", 1),
    ("minecraft:feather_falling", 2),
    ("minecraft:blast_protection", 3),
    ("minecraft:projectile_protection", 4),
    ("minecraft:thorns", 5),
    ("minecraft:respiration", 6),
    ("minecraft:depth_strider", 7),
    ("minecraft:aqua_affinity", 8),
    ("minecraft:sharpness", 9),
    ("minecraft:smite", 10),
    ("minecraft:bane_of_arthropods", 11),
    ("minecraft:knockback", 12),
    ("minecraft:fire_aspect", 13),
    ("minecraft:looting", 14),
    ("minecraft:efficiency", 15),
    ("minecraft:silk_touch", 16),
    ("minecraft:unbreaking", 17),
    ("minecraft:fortune", 18),
    ("minecraft:power", 19),
    ("minecraft:punch", 20),
    ("minecraft:flame", 21),
    ("minecraft:infinity", 22),
    ("minecraft:luck_of_the_sea", 23),
    ("minecraft:lure", 24),
    ("minecraft:frost_walker", 25),
    ("minecraft:mending", 26),
    ("minecraft:binding_curse", 27),
    ("minecraft:vanishing_curse", 28),
    ("minecraft:impaling", 29),
    ("minecraft:riptide", 30),
    ("minecraft:loyalty", 31),
    ("minecraft:channeling", 32),
    ("minecraft:multishot", 33),
    ("minecraft:piercing", 34),
    ("minecraft:quick_charge", 35),
    ("minecraft:soul_speed", 36),
    ("minecraft:swift_sneak", 37),
];

static ENCHANTMENTS_BY_NAME: Lazy<AHashMap<&'static str, i16>> =
    Lazy::new(|| ENCHANTMENTS.iter().copied().collect());
static ENCHANTMENTS_BY_ID: Lazy<AHashMap<i16, &'static str>> =
    Lazy::new(|| ENCHANTMENTS.iter().map(|&(name, id)| (id, name)).collect());

/// An item in the middle of translation.
///
/// Translation moves tags out of the source compound into the target one;
/// whatever nobody claims is copied over unchanged at the end.
#[derive(Debug)]
pub(super) struct Translation {
    pub java_id: i32,
    pub java: Compound,
    pub bedrock: ItemInstance,
    pub bedrock_nbt: Compound,
}

/// Converts item stacks in both directions. Shared by the inventory mirror
/// and any other translator that carries items.
#[derive(Debug, Clone)]
pub struct ItemTranslator {
    catalog: Arc<Catalog>,
    positions: Arc<TrackedPositionRegistry>,
}

impl ItemTranslator {
    pub fn new(catalog: Arc<Catalog>, positions: Arc<TrackedPositionRegistry>) -> Self {
        Self { catalog, positions }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn positions(&self) -> &TrackedPositionRegistry {
        &self.positions
    }

    /// Unknown Java items become a placeholder that remembers the Java id.
    pub fn to_bedrock(&self, slot: &Slot) -> ItemInstance {
        let Some(data) = &slot.0 else {
            return ItemInstance::air();
        };
        if data.count <= 0 {
            return ItemInstance::air();
        }
        let items = self.catalog.item_table();
        let Some(entry) = items.by_java_id(data.item_id) else {
            tracing::debug!("{}", TranslationError::UnknownItemId(data.item_id));
            return self.placeholder(data);
        };

        let family = family::family_for(&entry.java_name);
        let mut translation = Translation {
            java_id: data.item_id,
            java: data.nbt.clone().unwrap_or_default(),
            bedrock: ItemInstance {
                id: entry.bedrock_id,
                count: data.count as u16,
                damage: entry.bedrock_damage.unwrap_or(0),
                ..ItemInstance::default()
            },
            bedrock_nbt: Compound::new(),
        };
        family.to_bedrock(self, &mut translation);
        generic_to_bedrock(&mut translation, aux_is_damage(entry, family));

        let Translation {
            mut bedrock,
            bedrock_nbt,
            ..
        } = translation;
        bedrock.nbt = (!bedrock_nbt.is_empty()).then_some(bedrock_nbt);
        bedrock
    }

    pub fn to_java(&self, item: &ItemInstance) -> Result<Slot, TranslationError> {
        if item.is_air() || item.count == 0 {
            return Ok(Slot(None));
        }
        let mut bedrock_nbt = item.nbt.clone().unwrap_or_default();
        let count = item.count.min(i8::MAX as u16) as i8;

        if let Some(java_id) = bedrock_nbt.remove(JAVA_ID_TAG).and_then(|tag| tag.as_i64()) {
            return Ok(Slot(Some(SlotData {
                item_id: java_id as i32,
                count,
                nbt: (!bedrock_nbt.is_empty()).then_some(bedrock_nbt),
            })));
        }

        let items = self.catalog.item_table();
        let entry = items
            .by_bedrock(item.id, item.damage)
            .ok_or(TranslationError::UnknownItemId(item.id))?;
        let family = family::family_for(&entry.java_name);
        let mut translation = Translation {
            java_id: entry.java_id,
            java: Compound::new(),
            bedrock: ItemInstance {
                nbt: None,
                ..item.clone()
            },
            bedrock_nbt,
        };
        family.to_java(self, &mut translation);
        generic_to_java(&mut translation, aux_is_damage(entry, family));

        let Translation { java_id, java, .. } = translation;
        Ok(Slot(Some(SlotData {
            item_id: java_id,
            count,
            nbt: (!java.is_empty()).then_some(java),
        })))
    }

    fn placeholder(&self, data: &SlotData) -> ItemInstance {
        let mut nbt = Compound::new();
        nbt.insert(JAVA_ID_TAG, Tag::Int(data.item_id));
        if let Some(java) = &data.nbt {
            for (key, tag) in java.iter() {
                nbt.insert(key, tag.clone());
            }
        }
        ItemInstance {
            id: self
                .catalog
                .item_table()
                .bedrock_id(PLACEHOLDER_ITEM)
                .unwrap_or(0),
            count: data.count as u16,
            nbt: Some(nbt),
            ..ItemInstance::default()
        }
    }
}

/// Whether the Bedrock aux value carries the Java `Damage` tag.
fn aux_is_damage(entry: &ItemEntry, family: ItemFamily) -> bool {
    entry.bedrock_damage.is_none() && !family.owns_aux_value()
}

fn generic_to_bedrock(t: &mut Translation, aux_is_damage: bool) {
    if let Some(damage) = t.java.get_i64("Damage") {
        if aux_is_damage {
            t.java.remove("Damage");
            t.bedrock.damage = damage.max(0) as u32;
        }
    }
    if let Some(mut display) = t.java.take_compound("display") {
        if let Some(name) = display.remove("Name") {
            if let Some(json) = name.as_str() {
                display.insert("Name", Tag::String(json_to_plain(json)));
            }
        }
        if let Some(Tag::List(lore)) = display.remove("Lore") {
            let lines = lore
                .iter()
                .filter_map(Tag::as_str)
                .map(|line| Tag::String(json_to_plain(line)))
                .collect();
            display.insert("Lore", Tag::List(List::new(lines)));
        }
        if !display.is_empty() {
            t.bedrock_nbt.insert("display", Tag::Compound(display));
        }
    }
    if let Some(Tag::List(enchantments)) = t.java.remove("Enchantments") {
        t.bedrock_nbt
            .insert("ench", Tag::List(enchantments_to_bedrock(&enchantments)));
    }
    if let Some(unbreakable) = t.java.remove("Unbreakable") {
        t.bedrock_nbt.insert("Unbreakable", unbreakable);
    }
    for (key, tag) in t.java.iter() {
        t.bedrock_nbt.insert(key, tag.clone());
    }
}

fn generic_to_java(t: &mut Translation, aux_is_damage: bool) {
    if aux_is_damage && t.bedrock.damage > 0 {
        t.java
            .insert("Damage", Tag::Int(t.bedrock.damage.min(i32::MAX as u32) as i32));
    }
    if let Some(mut display) = t.bedrock_nbt.take_compound("display") {
        if let Some(name) = display.remove("Name") {
            if let Some(text) = name.as_str() {
                display.insert("Name", Tag::String(plain_to_json(text)));
            }
        }
        if let Some(Tag::List(lore)) = display.remove("Lore") {
            let lines = lore
                .iter()
                .filter_map(Tag::as_str)
                .map(|line| Tag::String(plain_to_json(line)))
                .collect();
            display.insert("Lore", Tag::List(List::new(lines)));
        }
        if !display.is_empty() {
            t.java.insert("display", Tag::Compound(display));
        }
    }
    if let Some(Tag::List(enchantments)) = t.bedrock_nbt.remove("ench") {
        t.java
            .insert("Enchantments", Tag::List(enchantments_to_java(&enchantments)));
    }
    if let Some(unbreakable) = t.bedrock_nbt.remove("Unbreakable") {
        t.java.insert("Unbreakable", unbreakable);
    }
    for (key, tag) in t.bedrock_nbt.iter() {
        t.java.insert(key, tag.clone());
    }
}

/// `[{id: "minecraft:x", lvl}]` to `[{id: <short>, lvl: <short>}]`.
/// Enchantments Bedrock does not know are dropped.
pub(super) fn enchantments_to_bedrock(list: &List) -> List {
    let entries = list
        .compounds()
        .filter_map(|enchantment| {
            let name = enchantment.get_str("id")?;
            let Some(&id) = ENCHANTMENTS_BY_NAME.get(name) else {
                tracing::debug!("Dropping enchantment {name} with no Bedrock counterpart");
                return None;
            };
            let level = enchantment.get_i64("lvl").unwrap_or(1);
            let mut out = Compound::new();
            out.insert("id", Tag::Short(id));
            out.insert("lvl", Tag::Short(level.clamp(0, i16::MAX as i64) as i16));
            Some(Tag::Compound(out))
        })
        .collect();
    List::new(entries)
}

pub(super) fn enchantments_to_java(list: &List) -> List {
    let entries = list
        .compounds()
        .filter_map(|enchantment| {
            let id = enchantment.get_i64("id")? as i16;
            let name = ENCHANTMENTS_BY_ID.get(&id)?;
            let level = enchantment.get_i64("lvl").unwrap_or(1);
            let mut out = Compound::new();
            out.insert("id", Tag::String((*name).to_owned()));
            out.insert("lvl", Tag::Short(level.clamp(0, i16::MAX as i64) as i16));
            Some(Tag::Compound(out))
        })
        .collect();
    List::new(entries)
}

/// Visible text of a JSON chat component. Strings that are not JSON are
/// returned as they are.
pub fn json_to_plain(json: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(value) => {
            let mut out = String::new();
            flatten_json(&value, &mut out);
            out
        }
        Err(_) => json.to_owned(),
    }
}

fn flatten_json(value: &serde_json::Value, out: &mut String) {
    use serde_json::Value;
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(parts) => parts.iter().for_each(|part| flatten_json(part, out)),
        Value::Object(object) => {
            if let Some(Value::String(text)) = object.get("text") {
                out.push_str(text);
            } else if let Some(Value::String(key)) = object.get("translate") {
                out.push_str(key);
            }
            if let Some(Value::Array(extra)) = object.get("extra") {
                extra.iter().for_each(|part| flatten_json(part, out));
            }
        }
        _ => {}
    }
}

pub fn plain_to_json(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> ItemTranslator {
        ItemTranslator::new(
            Catalog::builtin().into_shared(),
            Arc::new(TrackedPositionRegistry::in_memory()),
        )
    }

    fn stack(item_id: i32, count: i8, nbt: Option<Compound>) -> Slot {
        Slot(Some(SlotData {
            item_id,
            count,
            nbt,
        }))
    }

    fn java_nbt(slot: &Slot) -> &Compound {
        slot.0.as_ref().and_then(|data| data.nbt.as_ref()).unwrap()
    }

    const IRON_SWORD: i32 = 805;

    #[test]
    fn empty_slots_are_air() {
        let items = translator();
        assert!(items.to_bedrock(&Slot(None)).is_air());
        assert_eq!(items.to_java(&ItemInstance::air()).unwrap(), Slot(None));
    }

    #[test]
    fn plain_items_keep_id_and_count() {
        let items = translator();
        let bedrock = items.to_bedrock(&stack(1, 12, None));
        assert_eq!((bedrock.id, bedrock.count, bedrock.nbt.as_ref()), (1, 12, None));
        assert_eq!(items.to_java(&bedrock).unwrap(), stack(1, 12, None));
    }

    #[test]
    fn damage_moves_to_the_aux_value() {
        let items = translator();
        let mut nbt = Compound::new();
        nbt.insert("Damage", Tag::Int(17));
        let bedrock = items.to_bedrock(&stack(IRON_SWORD, 1, Some(nbt)));
        assert_eq!(bedrock.damage, 17);
        assert_eq!(bedrock.nbt, None);

        let java = items.to_java(&bedrock).unwrap();
        assert_eq!(java_nbt(&java).get_i64("Damage"), Some(17));
    }

    #[test]
    fn display_and_enchantments_round_trip() {
        let items = translator();
        let mut display = Compound::new();
        display.insert("Name", Tag::String(r#"{"text":"Excalibur"}"#.to_owned()));
        let mut sharpness = Compound::new();
        sharpness.insert("id", Tag::String("minecraft:sharpness".to_owned()));
        sharpness.insert("lvl", Tag::Short(5));
        let mut nbt = Compound::new();
        nbt.insert("display", Tag::Compound(display));
        nbt.insert("Enchantments", Tag::List(List::new(vec![Tag::Compound(sharpness)])));
        nbt.insert("Unbreakable", Tag::Byte(1));

        let bedrock = items.to_bedrock(&stack(IRON_SWORD, 1, Some(nbt)));
        let bedrock_nbt = bedrock.nbt.as_ref().unwrap();
        assert_eq!(
            bedrock_nbt.get_compound("display").and_then(|d| d.get_str("Name")),
            Some("Excalibur")
        );
        let ench = bedrock_nbt.get_list("ench").unwrap();
        let first = ench.compounds().next().unwrap();
        assert_eq!(first.get("id"), Some(&Tag::Short(9)));

        let java = items.to_java(&bedrock).unwrap();
        let nbt = java_nbt(&java);
        assert_eq!(
            nbt.get_compound("display")
                .and_then(|d| d.get_str("Name"))
                .map(json_to_plain),
            Some("Excalibur".to_owned())
        );
        let enchantment = nbt.get_list("Enchantments").unwrap().compounds().next().unwrap();
        assert_eq!(enchantment.get_str("id"), Some("minecraft:sharpness"));
        assert_eq!(enchantment.get_i64("lvl"), Some(5));
        assert_eq!(nbt.get_i64("Unbreakable"), Some(1));
    }

    #[test]
    fn unknown_items_survive_as_placeholders() {
        let items = translator();
        let bedrock = items.to_bedrock(&stack(4242, 3, None));
        assert_eq!(items.catalog().item_table().bedrock_id(PLACEHOLDER_ITEM), Some(bedrock.id));
        assert_eq!(items.to_java(&bedrock).unwrap(), stack(4242, 3, None));
    }

    #[test]
    fn json_text_is_flattened() {
        assert_eq!(
            json_to_plain(r#"{"text":"a","extra":[{"text":"b"},"c"]}"#),
            "abc"
        );
        assert_eq!(json_to_plain("not json"), "not json");
        assert_eq!(json_to_plain(&plain_to_json("quote\"d")), "quote\"d");
    }
}
