//! Per-session mirror of the chunk columns the client has loaded.
//!
//! Java sends chunks as paletted global block states in its own section
//! order. The mirror stores each section already translated to Bedrock
//! runtime ids so that later single-block changes and queries never touch
//! the Java representation again. Changes for columns that have not arrived
//! yet are buffered (up to a configured bound) and applied on arrival.

use crate::{
    catalog::Catalog,
    error::TranslationError,
    position::{BlockPosition, ChunkPosition, LocalPosition},
    protocol::{
        packet::{
            bedrock::{
                server::{update_block_flags, LevelChunk, UpdateBlock},
                types::NetworkBlockPosition,
            },
            java::server::play::ChunkAndLightData,
        },
        DecodeError, Encoder,
    },
};
use ahash::AHashMap;
use std::sync::Arc;

pub mod biome;
pub mod bit_array;
pub mod java_chunk;
pub mod section;

pub use biome::{BiomeRemap, DimensionType, RegistryInfo};
use section::{ChunkSection, COPY_PREVIOUS_BIOMES};

/// Biome storages a LevelChunk carries regardless of dimension height.
const BIOME_STORAGE_COUNT: usize = 25;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::AsRefStr)]
pub enum BedrockDimension {
    Overworld,
    Nether,
    End,
}

impl BedrockDimension {
    pub fn from_java_name(name: &str) -> Self {
        match name {
            "minecraft:the_nether" => BedrockDimension::Nether,
            "minecraft:the_end" => BedrockDimension::End,
            _ => BedrockDimension::Overworld,
        }
    }

    pub fn id(self) -> i32 {
        match self {
            BedrockDimension::Overworld => 0,
            BedrockDimension::Nether => 1,
            BedrockDimension::End => 2,
        }
    }

    pub fn min_y(self) -> i32 {
        match self {
            BedrockDimension::Overworld => -64,
            BedrockDimension::Nether | BedrockDimension::End => 0,
        }
    }

    pub fn height(self) -> i32 {
        match self {
            BedrockDimension::Overworld => 384,
            BedrockDimension::Nether => 128,
            BedrockDimension::End => 256,
        }
    }

    fn min_section(self) -> i32 {
        self.min_y() >> 4
    }

    fn section_count(self) -> i32 {
        self.height() >> 4
    }

    fn contains_section(self, section_y: i32) -> bool {
        (self.min_section()..self.min_section() + self.section_count()).contains(&section_y)
    }
}

#[derive(Debug, Default)]
struct Column {
    sections: AHashMap<i32, ChunkSection>,
}

type PendingChanges = AHashMap<LocalPosition, i32>;

#[derive(Debug)]
pub struct WorldMirror {
    catalog: Arc<Catalog>,
    columns: AHashMap<ChunkPosition, Column>,
    /// Keyed by column and world section index.
    pending: AHashMap<(ChunkPosition, i32), PendingChanges>,
    pending_len: usize,
    pending_capacity: usize,
    registry: RegistryInfo,
    biomes: BiomeRemap,
    dimension_name: String,
    java_dimension: DimensionType,
    dimension: BedrockDimension,
}

impl WorldMirror {
    pub fn new(catalog: Arc<Catalog>, pending_capacity: usize) -> Self {
        Self {
            catalog,
            columns: AHashMap::new(),
            pending: AHashMap::new(),
            pending_len: 0,
            pending_capacity,
            registry: RegistryInfo::default(),
            biomes: BiomeRemap::identity(),
            dimension_name: "minecraft:overworld".to_owned(),
            java_dimension: DimensionType::OVERWORLD,
            dimension: BedrockDimension::Overworld,
        }
    }

    /// Installs the server's registry data.
    pub fn apply_registry(&mut self, registry: RegistryInfo) {
        self.biomes = BiomeRemap::new(&registry.biomes, self.catalog.biome_table());
        tracing::debug!(
            "Registry data: {} biomes, {} dimension types",
            self.biomes.len(),
            registry.dimension_types.len()
        );
        self.registry = registry;
    }

    /// Switches dimension and forgets every loaded column.
    pub fn change_dimension(&mut self, dimension_type: &str, dimension_name: &str) -> BedrockDimension {
        let dimension = BedrockDimension::from_java_name(dimension_name);
        self.java_dimension = match self.registry.dimension_types.get(dimension_type) {
            Some(&java) => java,
            None => {
                tracing::warn!("Unknown dimension type {dimension_type}, assuming Bedrock extent");
                DimensionType {
                    min_y: dimension.min_y(),
                    height: dimension.height(),
                }
            }
        };
        self.dimension = dimension;
        self.dimension_name = dimension_name.to_owned();
        self.columns.clear();
        self.pending.clear();
        self.pending_len = 0;
        dimension
    }

    pub fn dimension(&self) -> BedrockDimension {
        self.dimension
    }

    pub fn dimension_name(&self) -> &str {
        &self.dimension_name
    }

    pub fn remap_biome(&self, java_id: i32) -> u32 {
        self.biomes.remap(java_id)
    }

    pub fn is_loaded(&self, column: ChunkPosition) -> bool {
        self.columns.contains_key(&column)
    }

    pub fn loaded_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn pending_changes(&self) -> usize {
        self.pending_len
    }

    /// Translates a Java chunk and returns the Bedrock chunk to send.
    pub fn ingest_chunk(&mut self, packet: &ChunkAndLightData) -> Result<LevelChunk, DecodeError> {
        let position = ChunkPosition::new(packet.chunk_x, packet.chunk_z);
        let sections = java_chunk::read_sections(&packet.data, self.java_dimension.section_count())?;

        self.columns.insert(position, Column::default());
        let min_section = self.java_dimension.min_y >> 4;
        for (offset, section) in sections.iter().enumerate() {
            let section_y = min_section + offset as i32;
            if !self.dimension.contains_section(section_y) {
                continue;
            }
            self.ingest_section(position, section_y, &section.blocks, &section.biomes);
        }

        let leftover: Vec<_> = self
            .pending
            .keys()
            .filter(|(column, _)| *column == position)
            .copied()
            .collect();
        for (_, section_y) in leftover {
            self.flush_pending(position, section_y);
        }

        Ok(self.encode_column(position))
    }

    /// Replaces one section of a loaded column from Java block states
    /// (`y << 8 | z << 4 | x` order) and biome ids.
    pub fn ingest_section(
        &mut self,
        column: ChunkPosition,
        section_y: i32,
        blocks: &[i32],
        biomes: &[i32],
    ) {
        let mut section = self.empty_section();
        let mut unknown = 0usize;
        for (index, &state) in blocks.iter().enumerate() {
            let (runtime_id, waterlogged) = self.translate_state(state).unwrap_or_else(|_| {
                unknown += 1;
                (self.catalog.block_table().placeholder(), false)
            });
            let local = LocalPosition::from_java_index(index);
            section.set_block(local, runtime_id);
            if waterlogged {
                section.set_waterlogged(local, true);
            }
        }
        if unknown > 0 {
            tracing::warn!(
                "{unknown} unknown block states in section {:?}/{section_y}, using placeholder",
                column
            );
        }
        let biomes: Vec<u32> = biomes.iter().map(|&id| self.biomes.remap(id)).collect();
        section.set_biomes(&biomes);

        self.columns
            .entry(column)
            .or_default()
            .sections
            .insert(section_y, section);
        self.flush_pending(column, section_y);
    }

    /// Updates the mirror and returns the packets the client needs, or
    /// nothing if the column is not loaded yet.
    pub fn apply_block_change(&mut self, position: BlockPosition, java_state: i32) -> Vec<UpdateBlock> {
        let section_y = position.section_y();
        if !self.dimension.contains_section(section_y) {
            return Vec::new();
        }
        let column = position.chunk();
        if !self.columns.contains_key(&column) {
            self.buffer_change(column, section_y, position.local(), java_state);
            return Vec::new();
        }

        let (runtime_id, waterlogged) = self.translate_or_placeholder(java_state);
        self.set_block(column, section_y, position.local(), runtime_id, waterlogged);

        let table = self.catalog.block_table();
        let flags = update_block_flags::NEIGHBORS | update_block_flags::NETWORK;
        vec![
            UpdateBlock {
                position: NetworkBlockPosition(position),
                runtime_id,
                flags,
                layer: 0,
            },
            UpdateBlock {
                position: NetworkBlockPosition(position),
                runtime_id: if waterlogged { table.water() } else { table.air() },
                flags,
                layer: 1,
            },
        ]
    }

    /// Bedrock runtime id at `position`, if its column is loaded.
    pub fn query_block(&self, position: BlockPosition) -> Option<u32> {
        let column = self.columns.get(&position.chunk())?;
        if !self.dimension.contains_section(position.section_y()) {
            return None;
        }
        Some(match column.sections.get(&position.section_y()) {
            Some(section) => section.block(position.local()),
            None => self.catalog.block_table().air(),
        })
    }

    pub fn query_waterlogged(&self, position: BlockPosition) -> Option<bool> {
        let column = self.columns.get(&position.chunk())?;
        Some(
            column
                .sections
                .get(&position.section_y())
                .is_some_and(|section| section.is_waterlogged(position.local())),
        )
    }

    /// Bedrock biome id at `position`, if its section is loaded.
    pub fn query_biome(&self, position: BlockPosition) -> Option<u32> {
        self.columns
            .get(&position.chunk())?
            .sections
            .get(&position.section_y())
            .map(|section| section.biome(position.local()))
    }

    /// Forgets a column and any changes buffered for it.
    pub fn unload(&mut self, column: ChunkPosition) -> bool {
        let dropped: usize = self
            .pending
            .iter()
            .filter(|((c, _), _)| *c == column)
            .map(|(_, changes)| changes.len())
            .sum();
        self.pending.retain(|(c, _), _| *c != column);
        self.pending_len -= dropped;
        self.columns.remove(&column).is_some()
    }

    fn translate_state(&self, java_state: i32) -> Result<(u32, bool), TranslationError> {
        let table = self.catalog.block_table();
        let runtime_id = table
            .bedrock_runtime_id(java_state)
            .ok_or(TranslationError::UnknownBlockState(java_state))?;
        Ok((runtime_id, table.is_waterlogged(java_state)))
    }

    fn translate_or_placeholder(&self, java_state: i32) -> (u32, bool) {
        self.translate_state(java_state).unwrap_or_else(|e| {
            tracing::warn!("{e}, using placeholder");
            (self.catalog.block_table().placeholder(), false)
        })
    }

    fn empty_section(&self) -> ChunkSection {
        let table = self.catalog.block_table();
        ChunkSection::new(table.air(), table.solid(), table.water())
    }

    fn set_block(
        &mut self,
        column: ChunkPosition,
        section_y: i32,
        local: LocalPosition,
        runtime_id: u32,
        waterlogged: bool,
    ) {
        let empty = self.empty_section();
        let section = self
            .columns
            .entry(column)
            .or_default()
            .sections
            .entry(section_y)
            .or_insert(empty);
        section.set_block(local, runtime_id);
        section.set_waterlogged(local, waterlogged);
    }

    fn buffer_change(&mut self, column: ChunkPosition, section_y: i32, local: LocalPosition, java_state: i32) {
        let full = self.pending_len >= self.pending_capacity;
        let changes = self.pending.entry((column, section_y)).or_default();
        if let Some(state) = changes.get_mut(&local) {
            *state = java_state;
            return;
        }
        if full {
            tracing::warn!(
                "Pending block change buffer full ({} entries), dropping change in {:?}",
                self.pending_capacity,
                column
            );
            if changes.is_empty() {
                self.pending.remove(&(column, section_y));
            }
            return;
        }
        changes.insert(local, java_state);
        self.pending_len += 1;
    }

    fn flush_pending(&mut self, column: ChunkPosition, section_y: i32) {
        let Some(changes) = self.pending.remove(&(column, section_y)) else {
            return;
        };
        self.pending_len -= changes.len();
        tracing::trace!("Applying {} buffered changes to {:?}/{section_y}", changes.len(), column);
        for (local, java_state) in changes {
            let (runtime_id, waterlogged) = self.translate_or_placeholder(java_state);
            self.set_block(column, section_y, local, runtime_id, waterlogged);
        }
    }

    fn encode_column(&self, position: ChunkPosition) -> LevelChunk {
        let min_section = self.dimension.min_section();
        let count = self.dimension.section_count();
        let column = self.columns.get(&position);
        let section = |relative: i32| column.and_then(|c| c.sections.get(&(min_section + relative)));

        let sub_chunk_count = (0..count)
            .rev()
            .find(|&relative| section(relative).is_some_and(|s| !s.is_empty()))
            .map_or(0, |highest| highest + 1);

        let mut payload = Vec::new();
        let mut encoder = Encoder::new(&mut payload);
        let empty = self.empty_section();
        for relative in 0..sub_chunk_count {
            section(relative)
                .unwrap_or(&empty)
                .encode_blocks(&mut encoder, (min_section + relative) as i8);
        }
        for relative in 0..BIOME_STORAGE_COUNT as i32 {
            match section(relative) {
                Some(section) if relative < count => section.encode_biomes(&mut encoder),
                _ if relative == 0 => empty.encode_biomes(&mut encoder),
                _ => encoder.write_u8(COPY_PREVIOUS_BIOMES),
            }
        }
        // Border blocks.
        encoder.write_u8(0);

        LevelChunk {
            chunk_x: position.x,
            chunk_z: position.z,
            sub_chunk_count: sub_chunk_count as u32,
            cache_enabled: false,
            payload,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::{nbt::Compound, packet::java::Nbt, Decoder};
    use java_chunk::tests::{write_paletted_section, write_single_section};

    pub(crate) const STONE: i32 = 1;
    const GRANITE: i32 = 2;
    const WATER: i32 = 80;
    const SEAGRASS: i32 = 1956;

    fn mirror() -> WorldMirror {
        let mut mirror = WorldMirror::new(Catalog::builtin().into_shared(), 16);
        mirror.apply_registry(RegistryInfo::parse(&biome::tests::sample_codec()));
        mirror.change_dimension("minecraft:overworld", "minecraft:overworld");
        mirror
    }

    /// Overworld column: stone in the section at y 0..16, air elsewhere.
    pub(crate) fn chunk(x: i32, z: i32) -> ChunkAndLightData {
        let mut data = Vec::new();
        let mut encoder = Encoder::new(&mut data);
        for section in 0..24 {
            if section == 4 {
                write_paletted_section(&mut encoder, &[STONE, GRANITE], |i| usize::from(i == 0), 1);
            } else {
                write_single_section(&mut encoder, 0, 0);
            }
        }
        ChunkAndLightData {
            chunk_x: x,
            chunk_z: z,
            heightmaps: Nbt(Some(Compound::new())),
            data,
            block_entities: Vec::new(),
            light: Vec::new(),
        }
    }

    #[test]
    fn chunks_translate_to_bedrock_sections() {
        let mut world = mirror();
        let level_chunk = world.ingest_chunk(&chunk(0, 0)).unwrap();
        assert_eq!(level_chunk.sub_chunk_count, 5);
        assert!(!level_chunk.cache_enabled);

        let mut decoder = Decoder::new(&level_chunk.payload);
        // First sub-chunk (y -64) is empty: version, one storage, index, single air.
        assert_eq!(decoder.consume_slice(3).unwrap(), &[9, 1, (-4i8) as u8]);

        assert_eq!(world.query_block(BlockPosition::new(0, 0, 0)), Some(4));
        assert_eq!(world.query_block(BlockPosition::new(1, 0, 0)), Some(1));
        assert_eq!(world.query_block(BlockPosition::new(0, 100, 0)), Some(0));
        assert_eq!(world.query_block(BlockPosition::new(16, 0, 0)), None);
        // Java biome 1 is desert in the sample registry.
        assert_eq!(world.query_biome(BlockPosition::new(0, 5, 0)), Some(2));
    }

    #[test]
    fn changes_produce_both_layers() {
        let mut world = mirror();
        world.ingest_chunk(&chunk(0, 0)).unwrap();
        let position = BlockPosition::new(3, 1, 3);
        let updates = world.apply_block_change(position, SEAGRASS);
        assert_eq!(updates.len(), 2);
        assert_eq!((updates[0].layer, updates[0].runtime_id), (0, 15));
        assert_eq!((updates[1].layer, updates[1].runtime_id), (1, 2));
        assert_eq!(world.query_waterlogged(position), Some(true));

        let updates = world.apply_block_change(position, WATER);
        assert_eq!(updates[1].runtime_id, 0);
        assert_eq!(world.query_waterlogged(position), Some(false));
    }

    #[test]
    fn unknown_states_become_the_placeholder() {
        let mut world = mirror();
        world.ingest_chunk(&chunk(0, 0)).unwrap();
        let updates = world.apply_block_change(BlockPosition::new(0, 0, 0), 999_999);
        assert_eq!(updates[0].runtime_id, 3);
    }

    #[test]
    fn changes_before_the_chunk_are_replayed() {
        let mut world = mirror();
        let position = BlockPosition::new(20, 0, 4);
        assert!(world.apply_block_change(position, GRANITE).is_empty());
        assert_eq!(world.pending_changes(), 1);

        world.ingest_chunk(&chunk(1, 0)).unwrap();
        assert_eq!(world.pending_changes(), 0);
        assert_eq!(world.query_block(position), Some(4));
    }

    #[test]
    fn pending_changes_are_bounded() {
        let mut world = mirror();
        for x in 0..32 {
            world.apply_block_change(BlockPosition::new(100 + x, 0, 0), STONE);
        }
        assert_eq!(world.pending_changes(), 16);
        // Overwriting a buffered position does not need room.
        world.apply_block_change(BlockPosition::new(100, 0, 0), GRANITE);
        assert_eq!(world.pending_changes(), 16);

        // x 100..112 fall in column 6, the other four in column 7.
        world.unload(ChunkPosition::new(6, 0));
        assert_eq!(world.pending_changes(), 4);
    }

    #[test]
    fn a_thousand_changes_in_one_section() {
        let mut world = mirror();
        world.ingest_chunk(&chunk(0, 0)).unwrap();
        let states = [STONE, GRANITE, 4, 6, 10, 14, 15];
        let mut last = AHashMap::new();
        for i in 0..1000i32 {
            let position = BlockPosition::new(i % 16, (i / 16) % 16, (i / 3) % 16);
            let state = states[(i % 7) as usize];
            world.apply_block_change(position, state);
            last.insert(position, state);
        }
        let section = &world.columns[&ChunkPosition::new(0, 0)].sections[&0];
        let mut entries = section.palette().entries().to_vec();
        let len = entries.len();
        entries.sort_unstable();
        entries.dedup();
        assert_eq!(entries.len(), len);

        let table = world.catalog.block_table();
        for (position, state) in last {
            assert_eq!(world.query_block(position), table.bedrock_runtime_id(state));
        }
    }

    #[test]
    fn out_of_range_changes_are_ignored() {
        let mut world = mirror();
        world.ingest_chunk(&chunk(0, 0)).unwrap();
        assert!(world.apply_block_change(BlockPosition::new(0, 400, 0), STONE).is_empty());
        assert_eq!(world.pending_changes(), 0);
    }

    #[test]
    fn dimension_change_forgets_columns() {
        let mut world = mirror();
        world.ingest_chunk(&chunk(0, 0)).unwrap();
        let dimension = world.change_dimension("minecraft:the_nether", "minecraft:the_nether");
        assert_eq!(dimension, BedrockDimension::Nether);
        assert_eq!(world.loaded_columns(), 0);
        assert_eq!(world.dimension().id(), 1);
    }
}
