//! A 16x16x16 section of Bedrock block and biome state.

use crate::{
    position::LocalPosition,
    protocol::Encoder,
    world::bit_array::{bedrock_bits_for, write_bedrock_words},
};
use ahash::AHashMap;

pub const SECTION_VOLUME: usize = 4096;
/// Java stores biomes at 4x4x4 resolution.
pub const JAVA_BIOME_VOLUME: usize = 64;

const SUB_CHUNK_VERSION: u8 = 9;
/// Low bit of a storage header marks runtime (network) palette ids.
const RUNTIME_FLAG: u8 = 1;

/// Maps compact indices to block runtime ids.
///
/// Index 0 is always air and index 1 the catalog's solid block, so the two
/// most common states resolve without a lookup. Entries are never removed.
#[derive(Debug, Clone)]
pub struct Palette {
    entries: Vec<u32>,
    lookup: AHashMap<u32, u16>,
}

impl Palette {
    pub fn new(air: u32, solid: u32) -> Self {
        let mut entries = vec![air];
        if solid != air {
            entries.push(solid);
        }
        Self {
            entries,
            lookup: AHashMap::new(),
        }
    }

    /// Index of `state`, inserting it if it is new.
    pub fn index_of(&mut self, state: u32) -> u16 {
        if state == self.entries[0] {
            return 0;
        }
        if self.entries.get(1) == Some(&state) {
            return 1;
        }
        if let Some(&index) = self.lookup.get(&state) {
            return index;
        }
        // A section holds at most 4096 distinct states plus the two reserved.
        let index = self.entries.len() as u16;
        self.entries.push(state);
        self.lookup.insert(state, index);
        index
    }

    pub fn get(&self, index: u16) -> Option<u32> {
        self.entries.get(usize::from(index)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[u32] {
        &self.entries
    }
}

#[derive(Debug, Clone)]
pub struct ChunkSection {
    /// Palette indices in Bedrock `x << 8 | z << 4 | y` order.
    blocks: Box<[u16]>,
    palette: Palette,
    /// Liquid layer, one bit per block, same order as `blocks`.
    water: Option<Box<[u64]>>,
    water_id: u32,
    /// Indices into `biome_palette` in Java `y << 4 | z << 2 | x` order.
    biomes: [u8; JAVA_BIOME_VOLUME],
    biome_palette: Vec<u32>,
}

impl ChunkSection {
    pub fn new(air: u32, solid: u32, water: u32) -> Self {
        Self {
            blocks: vec![0; SECTION_VOLUME].into_boxed_slice(),
            palette: Palette::new(air, solid),
            water: None,
            water_id: water,
            biomes: [0; JAVA_BIOME_VOLUME],
            biome_palette: vec![0],
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn block(&self, local: LocalPosition) -> u32 {
        let index = self.blocks[local.bedrock_index()];
        // Indices always come from the palette.
        self.palette.get(index).unwrap_or(self.palette.entries[0])
    }

    pub fn set_block(&mut self, local: LocalPosition, state: u32) {
        let index = self.palette.index_of(state);
        self.blocks[local.bedrock_index()] = index;
    }

    pub fn block_index(&self, local: LocalPosition) -> u16 {
        self.blocks[local.bedrock_index()]
    }

    pub fn is_waterlogged(&self, local: LocalPosition) -> bool {
        let index = local.bedrock_index();
        self.water
            .as_ref()
            .is_some_and(|bits| bits[index / 64] & (1 << (index % 64)) != 0)
    }

    pub fn set_waterlogged(&mut self, local: LocalPosition, waterlogged: bool) {
        let index = local.bedrock_index();
        if !waterlogged && self.water.is_none() {
            return;
        }
        let bits = self
            .water
            .get_or_insert_with(|| vec![0; SECTION_VOLUME / 64].into_boxed_slice());
        if waterlogged {
            bits[index / 64] |= 1 << (index % 64);
        } else {
            bits[index / 64] &= !(1 << (index % 64));
        }
    }

    /// Replaces the biome grid. `biomes` is in Java 4x4x4 order.
    pub fn set_biomes(&mut self, biomes: &[u32]) {
        self.biome_palette.clear();
        for (cell, &biome) in self.biomes.iter_mut().zip(biomes) {
            let index = match self.biome_palette.iter().position(|&b| b == biome) {
                Some(index) => index,
                None => {
                    self.biome_palette.push(biome);
                    self.biome_palette.len() - 1
                }
            };
            // At most 64 distinct biomes fit in a section.
            *cell = index as u8;
        }
        if self.biome_palette.is_empty() {
            self.biome_palette.push(0);
        }
    }

    pub fn biome(&self, local: LocalPosition) -> u32 {
        let cell = usize::from(local.y >> 2) << 4
            | usize::from(local.z >> 2) << 2
            | usize::from(local.x >> 2);
        self.biome_palette[usize::from(self.biomes[cell])]
    }

    pub fn is_empty(&self) -> bool {
        self.water.is_none() && self.blocks.iter().all(|&index| index == 0)
    }

    /// Writes the sub-chunk in network format version 9.
    pub fn encode_blocks(&self, encoder: &mut Encoder, section_y: i8) {
        encoder.write_u8(SUB_CHUNK_VERSION);
        encoder.write_u8(if self.water.is_some() { 2 } else { 1 });
        encoder.write_i8(section_y);
        write_storage(encoder, &self.blocks, self.palette.entries());

        if let Some(bits) = &self.water {
            let layer: Vec<u16> = (0..SECTION_VOLUME)
                .map(|index| u16::from(bits[index / 64] & (1 << (index % 64)) != 0))
                .collect();
            write_storage(encoder, &layer, &[self.palette.entries[0], self.water_id]);
        }
    }

    /// Writes the biome storage expanded to one entry per block.
    pub fn encode_biomes(&self, encoder: &mut Encoder) {
        let indices: Vec<u16> = (0..SECTION_VOLUME)
            .map(|index| {
                let (x, z, y) = (index >> 8, (index >> 4) & 0xF, index & 0xF);
                let cell = (y >> 2) << 4 | (z >> 2) << 2 | (x >> 2);
                u16::from(self.biomes[cell])
            })
            .collect();
        write_storage(encoder, &indices, &self.biome_palette);
    }
}

/// Writes one paletted storage. Uniform storages use the zero-width form.
fn write_storage(encoder: &mut Encoder, indices: &[u16], palette: &[u32]) {
    let first = indices.first().copied().unwrap_or(0);
    if indices.iter().all(|&index| index == first) {
        encoder.write_u8(RUNTIME_FLAG);
        encoder.write_zigzag32(palette.get(usize::from(first)).copied().unwrap_or(0) as i32);
        return;
    }

    let bits = bedrock_bits_for(palette.len());
    encoder.write_u8(bits << 1 | RUNTIME_FLAG);
    write_bedrock_words(encoder, bits, indices);
    encoder.write_zigzag32(palette.len() as i32);
    for &entry in palette {
        encoder.write_zigzag32(entry as i32);
    }
}

/// Header telling the client to reuse the previous section's biomes.
pub const COPY_PREVIOUS_BIOMES: u8 = 0xff;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Decoder;
    use std::collections::HashSet;

    const AIR: u32 = 0;
    const STONE: u32 = 1;
    const WATER: u32 = 2;

    fn local(x: u8, y: u8, z: u8) -> LocalPosition {
        LocalPosition { x, y, z }
    }

    #[test]
    fn reserved_indices_need_no_palette_growth() {
        let mut section = ChunkSection::new(AIR, STONE, WATER);
        section.set_block(local(0, 0, 0), STONE);
        section.set_block(local(1, 0, 0), AIR);
        assert_eq!(section.palette().len(), 2);
        assert_eq!(section.block_index(local(0, 0, 0)), 1);
    }

    #[test]
    fn repeated_changes_are_idempotent() {
        let mut section = ChunkSection::new(AIR, STONE, WATER);
        section.set_block(local(3, 4, 5), 77);
        let (len, index) = (section.palette().len(), section.block_index(local(3, 4, 5)));
        section.set_block(local(3, 4, 5), 77);
        assert_eq!(section.palette().len(), len);
        assert_eq!(section.block_index(local(3, 4, 5)), index);
    }

    #[test]
    fn rapid_changes_grow_the_palette_by_distinct_states_only() {
        let mut section = ChunkSection::new(AIR, STONE, WATER);
        let mut expected = std::collections::HashMap::new();
        for i in 0..1000u32 {
            let position = local((i % 16) as u8, ((i / 16) % 16) as u8, ((i / 7) % 16) as u8);
            let state = 100 + i % 13;
            section.set_block(position, state);
            expected.insert(position.bedrock_index(), (position, state));
        }
        assert!(section.palette().len() <= 2 + 13);
        let unique: HashSet<_> = section.palette().entries().iter().collect();
        assert_eq!(unique.len(), section.palette().len());
        for (position, state) in expected.values() {
            assert_eq!(section.block(*position), *state);
        }
    }

    #[test]
    fn water_layer_adds_a_second_storage() {
        let mut section = ChunkSection::new(AIR, STONE, WATER);
        section.set_block(local(0, 0, 0), 50);
        section.set_waterlogged(local(0, 0, 0), true);
        let mut buf = Vec::new();
        section.encode_blocks(&mut Encoder::new(&mut buf), -4);
        assert_eq!(&buf[..3], &[9, 2, (-4i8) as u8]);
        assert!(section.is_waterlogged(local(0, 0, 0)));
        assert!(!section.is_waterlogged(local(1, 0, 0)));
    }

    #[test]
    fn uniform_sections_use_a_single_entry() {
        let section = ChunkSection::new(AIR, STONE, WATER);
        let mut buf = Vec::new();
        section.encode_blocks(&mut Encoder::new(&mut buf), 0);
        assert_eq!(buf, [9, 1, 0, RUNTIME_FLAG, 0]);
    }

    #[test]
    fn biomes_expand_to_block_resolution() {
        let mut section = ChunkSection::new(AIR, STONE, WATER);
        let mut biomes = [1u32; JAVA_BIOME_VOLUME];
        biomes[63] = 7;
        section.set_biomes(&biomes);
        assert_eq!(section.biome(local(15, 15, 15)), 7);
        assert_eq!(section.biome(local(0, 0, 0)), 1);

        let mut buf = Vec::new();
        section.encode_biomes(&mut Encoder::new(&mut buf));
        let mut decoder = Decoder::new(&buf);
        assert_eq!(decoder.read_u8().unwrap(), 1 << 1 | RUNTIME_FLAG);
        decoder.consume_slice(4096 / 32 * 4).unwrap();
        assert_eq!(decoder.read_zigzag32().unwrap(), 2);
        assert_eq!(decoder.read_zigzag32().unwrap(), 1);
        assert_eq!(decoder.read_zigzag32().unwrap(), 7);
        assert!(decoder.is_finished());
    }
}
