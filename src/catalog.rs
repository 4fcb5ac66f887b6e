//! Immutable lookup tables for items, blocks, biomes and entity types.
//!
//! A small built-in table covers the common vanilla content. A data
//! directory may supply full tables as `items.json`, `blocks.json`,
//! `biomes.json` and `entities.json`; each file replaces its built-in table.
//! Tables are never mutated after load and are shared by all sessions.

use crate::protocol::{
    nbt::{Compound, Tag},
    packet::bedrock::types::ItemState,
};
use ahash::AHashMap;
use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{path::Path, sync::Arc};

/// Bedrock item used for Java items without a mapping.
pub const PLACEHOLDER_ITEM: &str = "minecraft:info_update";
/// Bedrock block used for Java block states without a mapping.
pub const PLACEHOLDER_BLOCK: &str = "minecraft:info_update";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub java_id: i32,
    pub java_name: String,
    pub bedrock_name: String,
    pub bedrock_id: i32,
    /// Aux value that is part of the item's identity (banner colours).
    /// `None` when the aux value carries data such as durability.
    #[serde(default)]
    pub bedrock_damage: Option<u32>,
    #[serde(default = "default_stack_size")]
    pub stack_size: u8,
}

fn default_stack_size() -> u8 {
    64
}

#[derive(Debug, Clone)]
pub struct ItemTable {
    entries: Vec<ItemEntry>,
    by_java_id: AHashMap<i32, usize>,
    by_java_name: AHashMap<String, usize>,
    by_bedrock: AHashMap<(i32, Option<u32>), usize>,
    by_bedrock_name: AHashMap<String, usize>,
}

impl ItemTable {
    pub fn new(entries: Vec<ItemEntry>) -> Self {
        let mut by_java_id = AHashMap::new();
        let mut by_java_name = AHashMap::new();
        let mut by_bedrock = AHashMap::new();
        let mut by_bedrock_name = AHashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            by_java_id.insert(entry.java_id, index);
            by_java_name.insert(entry.java_name.clone(), index);
            by_bedrock
                .entry((entry.bedrock_id, entry.bedrock_damage))
                .or_insert(index);
            by_bedrock_name
                .entry(entry.bedrock_name.clone())
                .or_insert(index);
        }
        Self {
            entries,
            by_java_id,
            by_java_name,
            by_bedrock,
            by_bedrock_name,
        }
    }

    pub fn by_java_id(&self, id: i32) -> Option<&ItemEntry> {
        self.by_java_id.get(&id).map(|&i| &self.entries[i])
    }

    pub fn by_java_name(&self, name: &str) -> Option<&ItemEntry> {
        self.by_java_name.get(name).map(|&i| &self.entries[i])
    }

    /// Finds the Java item for a Bedrock id and aux value. An exact
    /// `(id, damage)` match wins over an entry whose aux value is data.
    pub fn by_bedrock(&self, id: i32, damage: u32) -> Option<&ItemEntry> {
        self.by_bedrock
            .get(&(id, Some(damage)))
            .or_else(|| self.by_bedrock.get(&(id, None)))
            .map(|&i| &self.entries[i])
    }

    pub fn by_bedrock_name(&self, name: &str) -> Option<&ItemEntry> {
        self.by_bedrock_name.get(name).map(|&i| &self.entries[i])
    }

    /// Bedrock runtime id of a Bedrock item name.
    pub fn bedrock_id(&self, name: &str) -> Option<i32> {
        self.by_bedrock_name(name).map(|entry| entry.bedrock_id)
    }

    /// Item palette announced to the client in `StartGame`.
    pub fn item_states(&self) -> Vec<ItemState> {
        let mut seen = AHashMap::new();
        for entry in &self.entries {
            seen.entry(entry.bedrock_name.as_str())
                .or_insert(entry.bedrock_id);
        }
        let mut states: Vec<_> = seen
            .into_iter()
            .filter(|(_, id)| *id != 0)
            .map(|(name, id)| ItemState {
                name: name.to_owned(),
                runtime_id: id as i16,
                component_based: false,
            })
            .collect();
        states.sort_by_key(|state| state.runtime_id);
        states
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub java_id: i32,
    pub java_name: String,
    pub bedrock_runtime_id: u32,
    /// The Java state is waterlogged; Bedrock renders water on layer 1.
    #[serde(default)]
    pub waterlogged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockFile {
    pub air: u32,
    pub solid: u32,
    pub water: u32,
    pub placeholder: u32,
    pub states: Vec<BlockEntry>,
}

#[derive(Debug, Clone)]
pub struct BlockTable {
    by_java_id: AHashMap<i32, BlockEntry>,
    air: u32,
    solid: u32,
    water: u32,
    placeholder: u32,
}

impl BlockTable {
    pub fn new(file: BlockFile) -> Self {
        Self {
            by_java_id: file
                .states
                .into_iter()
                .map(|entry| (entry.java_id, entry))
                .collect(),
            air: file.air,
            solid: file.solid,
            water: file.water,
            placeholder: file.placeholder,
        }
    }

    pub fn get(&self, java_state: i32) -> Option<&BlockEntry> {
        self.by_java_id.get(&java_state)
    }

    /// Runtime id for a Java state, or `None` when unmapped.
    pub fn bedrock_runtime_id(&self, java_state: i32) -> Option<u32> {
        self.get(java_state).map(|entry| entry.bedrock_runtime_id)
    }

    pub fn is_waterlogged(&self, java_state: i32) -> bool {
        self.get(java_state).is_some_and(|entry| entry.waterlogged)
    }

    pub fn air(&self) -> u32 {
        self.air
    }

    /// The full-solid state that gets a reserved palette slot.
    pub fn solid(&self) -> u32 {
        self.solid
    }

    pub fn water(&self) -> u32 {
        self.water
    }

    pub fn placeholder(&self) -> u32 {
        self.placeholder
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeEntry {
    pub java_name: String,
    pub bedrock_id: u32,
    /// Coarse biome family used when a server sends an unknown biome.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_downfall")]
    pub downfall: f32,
}

fn default_temperature() -> f32 {
    0.8
}

fn default_downfall() -> f32 {
    0.4
}

#[derive(Debug, Clone)]
pub struct BiomeTable {
    entries: Vec<BiomeEntry>,
    by_java_name: AHashMap<String, usize>,
    by_category: AHashMap<String, u32>,
}

impl BiomeTable {
    pub fn new(entries: Vec<BiomeEntry>) -> Self {
        let mut by_java_name = AHashMap::new();
        let mut by_category = AHashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            by_java_name.insert(entry.java_name.clone(), index);
            if let Some(category) = &entry.category {
                by_category
                    .entry(category.clone())
                    .or_insert(entry.bedrock_id);
            }
        }
        Self {
            entries,
            by_java_name,
            by_category,
        }
    }

    pub fn by_java_name(&self, name: &str) -> Option<&BiomeEntry> {
        self.by_java_name.get(name).map(|&i| &self.entries[i])
    }

    /// First biome registered under a category.
    pub fn by_category(&self, category: &str) -> Option<u32> {
        self.by_category.get(category).copied()
    }

    /// Known categories and the biome each maps to.
    pub fn categories(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.by_category
            .iter()
            .map(|(category, &id)| (category.as_str(), id))
    }

    /// Biome definitions sent in `BiomeDefinitionList`.
    pub fn definitions(&self) -> Compound {
        self.entries
            .iter()
            .map(|entry| {
                let name = entry
                    .java_name
                    .strip_prefix("minecraft:")
                    .unwrap_or(&entry.java_name)
                    .to_owned();
                let mut definition = Compound::new();
                definition.insert("temperature", Tag::Float(entry.temperature));
                definition.insert("downfall", Tag::Float(entry.downfall));
                (name, Tag::Compound(definition))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEntry {
    pub java_id: i32,
    pub java_name: String,
    pub bedrock_identifier: String,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub struct EntityTable {
    by_java_id: AHashMap<i32, EntityEntry>,
}

impl EntityTable {
    pub fn new(entries: Vec<EntityEntry>) -> Self {
        Self {
            by_java_id: entries
                .into_iter()
                .map(|entry| (entry.java_id, entry))
                .collect(),
        }
    }

    pub fn get(&self, java_type: i32) -> Option<&EntityEntry> {
        self.by_java_id.get(&java_type)
    }

    pub fn by_java_name(&self, name: &str) -> Option<&EntityEntry> {
        self.by_java_id.values().find(|entry| entry.java_name == name)
    }
}

/// All tables, shared read-only by every session.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: ItemTable,
    blocks: BlockTable,
    biomes: BiomeTable,
    entities: EntityTable,
}

impl Catalog {
    pub fn new(
        items: ItemTable,
        blocks: BlockTable,
        biomes: BiomeTable,
        entities: EntityTable,
    ) -> Self {
        Self {
            items,
            blocks,
            biomes,
            entities,
        }
    }

    pub fn builtin() -> Self {
        Self::new(
            ItemTable::new(builtin::items()),
            BlockTable::new(builtin::blocks()),
            BiomeTable::new(builtin::biomes()),
            EntityTable::new(builtin::entities()),
        )
    }

    /// Loads tables from `dir`, falling back to the built-in table for each
    /// missing file.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let items = read_table(dir, "items.json")?.unwrap_or_else(builtin::items);
        let blocks = read_table(dir, "blocks.json")?.unwrap_or_else(builtin::blocks);
        let biomes = read_table(dir, "biomes.json")?.unwrap_or_else(builtin::biomes);
        let entities = read_table(dir, "entities.json")?.unwrap_or_else(builtin::entities);
        tracing::info!(
            "Loaded catalog: {} items, {} block states, {} biomes, {} entity types",
            items.len(),
            blocks.states.len(),
            biomes.len(),
            entities.len()
        );
        Ok(Self::new(
            ItemTable::new(items),
            BlockTable::new(blocks),
            BiomeTable::new(biomes),
            EntityTable::new(entities),
        ))
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn item_table(&self) -> &ItemTable {
        &self.items
    }

    pub fn block_table(&self) -> &BlockTable {
        &self.blocks
    }

    pub fn biome_table(&self) -> &BiomeTable {
        &self.biomes
    }

    pub fn entity_table(&self) -> &EntityTable {
        &self.entities
    }
}

fn read_table<T: DeserializeOwned>(dir: &Path, name: &str) -> anyhow::Result<Option<T>> {
    let path = dir.join(name);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs_err::read_to_string(&path)?;
    let table = serde_json::from_str(&text)
        .with_context(|| format!("invalid catalog table {}", path.display()))?;
    Ok(Some(table))
}

/// A minimal set of vanilla content for Java 1.20.4 and Bedrock 1.20.50.
mod builtin {
    use super::*;

    pub fn items() -> Vec<ItemEntry> {
        const ITEMS: &[(i32, &str, &str, i32, Option<u32>, u8)] = &[
            (0, "minecraft:air", "minecraft:air", 0, None, 64),
            (1, "minecraft:stone", "minecraft:stone", 1, None, 64),
            (27, "minecraft:grass_block", "minecraft:grass", 2, None, 64),
            (28, "minecraft:dirt", "minecraft:dirt", 3, None, 64),
            (35, "minecraft:cobblestone", "minecraft:cobblestone", 4, None, 64),
            (36, "minecraft:oak_planks", "minecraft:planks", 5, Some(0), 64),
            (53, "minecraft:sand", "minecraft:sand", 12, None, 64),
            (130, "minecraft:oak_log", "minecraft:log", 17, Some(0), 64),
            (187, "minecraft:glass", "minecraft:glass", 20, None, 64),
            (745, "minecraft:compass", "minecraft:compass", 391, None, 64),
            (746, "minecraft:recovery_compass", "minecraft:recovery_compass", 392, None, 1),
            (795, "minecraft:bow", "minecraft:bow", 300, None, 1),
            (796, "minecraft:arrow", "minecraft:arrow", 301, None, 64),
            (805, "minecraft:iron_sword", "minecraft:iron_sword", 307, None, 1),
            (820, "minecraft:diamond_sword", "minecraft:diamond_sword", 316, None, 1),
            (839, "minecraft:leather_helmet", "minecraft:leather_helmet", 335, None, 1),
            (840, "minecraft:leather_chestplate", "minecraft:leather_chestplate", 336, None, 1),
            (841, "minecraft:leather_leggings", "minecraft:leather_leggings", 337, None, 1),
            (842, "minecraft:leather_boots", "minecraft:leather_boots", 338, None, 1),
            (856, "minecraft:bread", "minecraft:bread", 261, None, 64),
            (875, "minecraft:water_bucket", "minecraft:water_bucket", 363, None, 1),
            (1024, "minecraft:potion", "minecraft:potion", 426, None, 1),
            (1051, "minecraft:splash_potion", "minecraft:splash_potion", 561, None, 1),
            (1054, "minecraft:lingering_potion", "minecraft:lingering_potion", 562, None, 1),
            (1052, "minecraft:tipped_arrow", "minecraft:arrow", 301, None, 64),
            (1053, "minecraft:shield", "minecraft:shield", 357, None, 1),
            (1036, "minecraft:enchanted_book", "minecraft:enchanted_book", 522, None, 1),
            (1039, "minecraft:leather_horse_armor", "minecraft:leather_horse_armor", 527, None, 1),
            (1090, "minecraft:white_banner", "minecraft:banner", 567, Some(15), 16),
            (1091, "minecraft:orange_banner", "minecraft:banner", 567, Some(14), 16),
            (1096, "minecraft:gray_banner", "minecraft:banner", 567, Some(8), 16),
            (1101, "minecraft:blue_banner", "minecraft:banner", 567, Some(4), 16),
            (1104, "minecraft:red_banner", "minecraft:banner", 567, Some(1), 16),
            (1105, "minecraft:black_banner", "minecraft:banner", 567, Some(0), 16),
            (-1, "minecraft:lodestone_compass", "minecraft:lodestone_compass", 741, None, 1),
            (-2, "minecraft:unknown", PLACEHOLDER_ITEM, 248, None, 64),
        ];
        ITEMS
            .iter()
            .map(
                |&(java_id, java_name, bedrock_name, bedrock_id, bedrock_damage, stack_size)| {
                    ItemEntry {
                        java_id,
                        java_name: java_name.to_owned(),
                        bedrock_name: bedrock_name.to_owned(),
                        bedrock_id,
                        bedrock_damage,
                        stack_size,
                    }
                },
            )
            .collect()
    }

    pub fn blocks() -> BlockFile {
        const AIR: u32 = 0;
        const STONE: u32 = 1;
        const WATER: u32 = 2;
        const PLACEHOLDER: u32 = 3;
        let mut states = vec![
            (0, "minecraft:air", AIR, false),
            (1, "minecraft:stone", STONE, false),
            (2, "minecraft:granite", 4, false),
            (4, "minecraft:diorite", 5, false),
            (6, "minecraft:andesite", 6, false),
            (8, "minecraft:grass_block[snowy=true]", 7, false),
            (9, "minecraft:grass_block[snowy=false]", 7, false),
            (10, "minecraft:dirt", 8, false),
            (14, "minecraft:cobblestone", 9, false),
            (15, "minecraft:oak_planks", 10, false),
            (79, "minecraft:bedrock", 11, false),
            (112, "minecraft:sand", 12, false),
            (137, "minecraft:oak_log[axis=y]", 13, false),
            (519, "minecraft:glass", 14, false),
            (1956, "minecraft:seagrass", 15, true),
            (11077, "minecraft:oak_slab[type=bottom,waterlogged=true]", 16, true),
            (11079, "minecraft:oak_slab[type=bottom,waterlogged=false]", 16, false),
        ];
        // Water levels 0..15 all render as the same source block.
        for level in 0..16 {
            states.push((80 + level, "minecraft:water", WATER, false));
        }
        BlockFile {
            air: AIR,
            solid: STONE,
            water: WATER,
            placeholder: PLACEHOLDER,
            states: states
                .into_iter()
                .map(|(java_id, java_name, bedrock_runtime_id, waterlogged)| BlockEntry {
                    java_id,
                    java_name: java_name.to_owned(),
                    bedrock_runtime_id,
                    waterlogged,
                })
                .collect(),
        }
    }

    pub fn biomes() -> Vec<BiomeEntry> {
        const BIOMES: &[(&str, u32, &str, f32, f32)] = &[
            ("minecraft:ocean", 0, "ocean", 0.5, 0.5),
            ("minecraft:plains", 1, "plains", 0.8, 0.4),
            ("minecraft:desert", 2, "desert", 2.0, 0.0),
            ("minecraft:windswept_hills", 3, "extreme_hills", 0.2, 0.3),
            ("minecraft:forest", 4, "forest", 0.7, 0.8),
            ("minecraft:taiga", 5, "taiga", 0.25, 0.8),
            ("minecraft:swamp", 6, "swamp", 0.8, 0.9),
            ("minecraft:river", 7, "river", 0.5, 0.5),
            ("minecraft:nether_wastes", 8, "nether", 2.0, 0.0),
            ("minecraft:the_end", 9, "the_end", 0.5, 0.5),
            ("minecraft:snowy_plains", 12, "icy", 0.0, 0.5),
            ("minecraft:beach", 16, "beach", 0.8, 0.4),
            ("minecraft:jungle", 21, "jungle", 0.95, 0.9),
            ("minecraft:deep_ocean", 24, "ocean", 0.5, 0.5),
            ("minecraft:birch_forest", 27, "forest", 0.6, 0.6),
            ("minecraft:savanna", 35, "savanna", 1.2, 0.0),
            ("minecraft:badlands", 37, "mesa", 2.0, 0.0),
            ("minecraft:cherry_grove", 192, "forest", 0.5, 0.8),
        ];
        BIOMES
            .iter()
            .map(
                |&(java_name, bedrock_id, category, temperature, downfall)| BiomeEntry {
                    java_name: java_name.to_owned(),
                    bedrock_id,
                    category: Some(category.to_owned()),
                    temperature,
                    downfall,
                },
            )
            .collect()
    }

    pub fn entities() -> Vec<EntityEntry> {
        const ENTITIES: &[(i32, &str, &str, f32, f32)] = &[
            (2, "minecraft:armor_stand", "minecraft:armor_stand", 0.5, 1.975),
            (3, "minecraft:arrow", "minecraft:arrow", 0.5, 0.5),
            (10, "minecraft:boat", "minecraft:boat", 1.375, 0.5625),
            (13, "minecraft:chest_boat", "minecraft:chest_boat", 1.375, 0.5625),
            (17, "minecraft:cow", "minecraft:cow", 0.9, 1.4),
            (19, "minecraft:creeper", "minecraft:creeper", 0.6, 1.7),
            (27, "minecraft:donkey", "minecraft:donkey", 1.3964844, 1.5),
            (34, "minecraft:ender_dragon", "minecraft:ender_dragon", 16.0, 8.0),
            (39, "minecraft:experience_orb", "minecraft:xp_orb", 0.5, 0.5),
            (54, "minecraft:horse", "minecraft:horse", 1.3964844, 1.6),
            (58, "minecraft:item", "minecraft:item", 0.25, 0.25),
            (68, "minecraft:minecart", "minecraft:minecart", 0.98, 0.7),
            (72, "minecraft:mule", "minecraft:mule", 1.3964844, 1.6),
            (83, "minecraft:pig", "minecraft:pig", 0.9, 0.9),
            (93, "minecraft:sheep", "minecraft:sheep", 0.9, 1.3),
            (99, "minecraft:skeleton", "minecraft:skeleton", 0.6, 1.99),
            (100, "minecraft:skeleton_horse", "minecraft:skeleton_horse", 1.3964844, 1.6),
            (122, "minecraft:villager", "minecraft:villager_v2", 0.6, 1.95),
            (131, "minecraft:wolf", "minecraft:wolf", 0.6, 0.85),
            (133, "minecraft:zombie", "minecraft:zombie", 0.6, 1.95),
            (134, "minecraft:zombie_horse", "minecraft:zombie_horse", 1.3964844, 1.6),
            (136, "minecraft:zombie_villager", "minecraft:zombie_villager_v2", 0.6, 1.95),
            (124, "minecraft:player", "minecraft:player", 0.6, 1.8),
        ];
        ENTITIES
            .iter()
            .map(
                |&(java_id, java_name, bedrock_identifier, width, height)| EntityEntry {
                    java_id,
                    java_name: java_name.to_owned(),
                    bedrock_identifier: bedrock_identifier.to_owned(),
                    width,
                    height,
                },
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_colours_resolve_by_aux_value() {
        let catalog = Catalog::builtin();
        let items = catalog.item_table();
        let banner = items.bedrock_id("minecraft:banner").unwrap();
        assert_eq!(
            items.by_bedrock(banner, 1).unwrap().java_name,
            "minecraft:red_banner"
        );
        assert_eq!(
            items.by_bedrock(banner, 15).unwrap().java_name,
            "minecraft:white_banner"
        );
    }

    #[test]
    fn data_aux_values_fall_back_to_the_item() {
        let catalog = Catalog::builtin();
        let items = catalog.item_table();
        let sword = items.bedrock_id("minecraft:diamond_sword").unwrap();
        assert_eq!(
            items.by_bedrock(sword, 120).unwrap().java_name,
            "minecraft:diamond_sword"
        );
    }

    #[test]
    fn item_states_list_each_bedrock_item_once() {
        let states = Catalog::builtin().item_table().item_states();
        let banners = states
            .iter()
            .filter(|state| state.name == "minecraft:banner")
            .count();
        assert_eq!(banners, 1);
        assert!(states.iter().all(|state| state.name != "minecraft:air"));
    }

    #[test]
    fn missing_files_use_builtin_tables() {
        let dir = std::env::temp_dir().join("bedrock-bridge-empty-catalog");
        fs_err::create_dir_all(&dir).unwrap();
        let catalog = Catalog::load(&dir).unwrap();
        assert!(catalog.block_table().get(1).is_some());
    }

    #[test]
    fn entity_table_loads_from_json() {
        let dir = std::env::temp_dir().join("bedrock-bridge-json-catalog");
        fs_err::create_dir_all(&dir).unwrap();
        fs_err::write(
            dir.join("entities.json"),
            r#"[{"java_id": 7, "java_name": "minecraft:pig", "bedrock_identifier": "minecraft:pig", "width": 0.9, "height": 0.9}]"#,
        )
        .unwrap();
        let catalog = Catalog::load(&dir).unwrap();
        assert_eq!(
            catalog.entity_table().get(7).unwrap().bedrock_identifier,
            "minecraft:pig"
        );
        assert!(catalog.entity_table().get(83).is_none());
    }
}
