//! Parsing of the section array inside Java `ChunkAndLightData`.

use crate::{
    protocol::{DecodeError, Decoder},
    world::{
        bit_array::JavaPackedArray,
        section::{JAVA_BIOME_VOLUME, SECTION_VOLUME},
    },
};

/// One decoded Java section with palettes resolved to global ids.
#[derive(Debug, Clone, PartialEq)]
pub struct JavaSection {
    pub block_count: i16,
    /// Block states in `y << 8 | z << 4 | x` order.
    pub blocks: Vec<i32>,
    /// Biome ids in `y << 4 | z << 2 | x` order.
    pub biomes: Vec<i32>,
}

#[derive(Copy, Clone, Debug)]
enum Container {
    Blocks,
    Biomes,
}

impl Container {
    fn len(self) -> usize {
        match self {
            Container::Blocks => SECTION_VOLUME,
            Container::Biomes => JAVA_BIOME_VOLUME,
        }
    }

    /// Adjusted width if `bits` selects an indirect palette.
    fn indirect_bits(self, bits: u8) -> Option<u8> {
        match (self, bits) {
            (Container::Blocks, 1..=8) => Some(bits.max(4)),
            (Container::Biomes, 1..=3) => Some(bits),
            _ => None,
        }
    }
}

/// Reads `count` sections from the chunk data buffer.
pub fn read_sections(data: &[u8], count: usize) -> Result<Vec<JavaSection>, DecodeError> {
    let mut decoder = Decoder::new(data);
    let mut sections = Vec::with_capacity(count);
    for _ in 0..count {
        let block_count = decoder.read_i16()?;
        let blocks = read_container(&mut decoder, Container::Blocks)?;
        let biomes = read_container(&mut decoder, Container::Biomes)?;
        sections.push(JavaSection {
            block_count,
            blocks,
            biomes,
        });
    }
    // Servers may pad the buffer; trailing bytes are ignored.
    Ok(sections)
}

fn read_container(decoder: &mut Decoder, container: Container) -> Result<Vec<i32>, DecodeError> {
    let bits = decoder.read_u8()?;
    let len = container.len();

    if bits == 0 {
        let value = decoder.read_var_int()?;
        // Singular containers still carry an (empty) data array.
        let longs = read_longs(decoder)?;
        if !longs.is_empty() {
            return Err(DecodeError::TrailingBytes(longs.len() * 8));
        }
        return Ok(vec![value; len]);
    }

    match container.indirect_bits(bits) {
        Some(bits) => {
            let palette_len = decoder.read_var_int()?;
            let palette_len = usize::try_from(palette_len)?;
            decoder.check_collection_length(palette_len)?;
            let palette = (0..palette_len)
                .map(|_| decoder.read_var_int())
                .collect::<Result<Vec<_>, _>>()?;
            let longs = read_longs(decoder)?;
            JavaPackedArray::new(&longs, bits, len)?
                .iter()
                .map(|index| {
                    palette
                        .get(index as usize)
                        .copied()
                        .ok_or(DecodeError::InvalidDiscriminant(index.into()))
                })
                .collect()
        }
        None => {
            let longs = read_longs(decoder)?;
            Ok(JavaPackedArray::new(&longs, bits, len)?
                .iter()
                .map(|value| value as i32)
                .collect())
        }
    }
}

fn read_longs(decoder: &mut Decoder) -> Result<Vec<i64>, DecodeError> {
    let len = usize::try_from(decoder.read_var_int()?)?;
    decoder.check_collection_length(len.saturating_mul(8))?;
    (0..len).map(|_| decoder.read_i64()).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::Encoder;

    /// Writes a section whose blocks come from a 4-bit palette.
    pub(crate) fn write_paletted_section(
        encoder: &mut Encoder,
        palette: &[i32],
        block_at: impl Fn(usize) -> usize,
        biome: i32,
    ) {
        encoder.write_i16(4096);
        encoder.write_u8(4);
        encoder.write_var_int(palette.len() as i32);
        for &state in palette {
            encoder.write_var_int(state);
        }
        encoder.write_var_int(256);
        for long in 0..256 {
            let mut word = 0u64;
            for i in 0..16 {
                word |= (block_at(long * 16 + i) as u64) << (i * 4);
            }
            encoder.write_i64(word as i64);
        }
        encoder.write_u8(0);
        encoder.write_var_int(biome);
        encoder.write_var_int(0);
    }

    pub(crate) fn write_single_section(encoder: &mut Encoder, state: i32, biome: i32) {
        encoder.write_i16(if state == 0 { 0 } else { 4096 });
        encoder.write_u8(0);
        encoder.write_var_int(state);
        encoder.write_var_int(0);
        encoder.write_u8(0);
        encoder.write_var_int(biome);
        encoder.write_var_int(0);
    }

    #[test]
    fn single_valued_sections() {
        let mut buf = Vec::new();
        write_single_section(&mut Encoder::new(&mut buf), 1, 3);
        let sections = read_sections(&buf, 1).unwrap();
        assert!(sections[0].blocks.iter().all(|&state| state == 1));
        assert!(sections[0].biomes.iter().all(|&biome| biome == 3));
    }

    #[test]
    fn indirect_palettes_resolve_to_global_ids() {
        let mut buf = Vec::new();
        write_paletted_section(&mut Encoder::new(&mut buf), &[0, 1, 9], |i| i % 3, 1);
        let sections = read_sections(&buf, 1).unwrap();
        assert_eq!(&sections[0].blocks[..4], &[0, 1, 9, 0]);
    }

    #[test]
    fn palette_indices_are_bounds_checked() {
        let mut buf = Vec::new();
        write_paletted_section(&mut Encoder::new(&mut buf), &[0], |_| 5, 1);
        assert!(matches!(
            read_sections(&buf, 1),
            Err(DecodeError::InvalidDiscriminant(5))
        ));
    }

    #[test]
    fn direct_biomes() {
        let mut buf = Vec::new();
        let mut encoder = Encoder::new(&mut buf);
        encoder.write_i16(0);
        encoder.write_u8(0);
        encoder.write_var_int(0);
        encoder.write_var_int(0);
        // 6 bits per biome: 10 per long, 7 longs for 64 entries.
        encoder.write_u8(6);
        encoder.write_var_int(7);
        for _ in 0..7 {
            let mut word = 0u64;
            for i in 0..10 {
                word |= 40 << (i * 6);
            }
            encoder.write_i64(word as i64);
        }
        let sections = read_sections(&buf, 1).unwrap();
        assert!(sections[0].biomes.iter().all(|&biome| biome == 40));
    }

    #[test]
    fn truncated_data_is_an_error() {
        let mut buf = Vec::new();
        write_single_section(&mut Encoder::new(&mut buf), 1, 3);
        assert!(read_sections(&buf, 2).is_err());
    }
}
