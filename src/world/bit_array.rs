//! Fixed-width integers packed into machine words without spanning.
//!
//! Java packs into big-endian `i64`s, Bedrock into little-endian `u32`s. In
//! both, an entry never straddles two words and the high bits of each word
//! are left as padding.

use crate::protocol::{DecodeError, Encoder};

/// Bits per entry Bedrock accepts in a paletted storage.
pub const BEDROCK_STORAGE_BITS: [u8; 8] = [1, 2, 3, 4, 5, 6, 8, 16];

/// A read-only view over a Java packed long array.
#[derive(Debug)]
pub struct JavaPackedArray<'a> {
    longs: &'a [i64],
    bits: u8,
    per_long: usize,
    len: usize,
}

impl<'a> JavaPackedArray<'a> {
    pub fn new(longs: &'a [i64], bits: u8, len: usize) -> Result<Self, DecodeError> {
        if bits == 0 || bits > 32 {
            return Err(DecodeError::InvalidDiscriminant(bits.into()));
        }
        let per_long = 64 / usize::from(bits);
        let needed = len.div_ceil(per_long);
        if longs.len() != needed {
            return Err(DecodeError::EndOfStream(needed.saturating_sub(longs.len())));
        }
        Ok(Self {
            longs,
            bits,
            per_long,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> u32 {
        let word = self.longs[index / self.per_long] as u64;
        let shift = (index % self.per_long) * usize::from(self.bits);
        let mask = (1u64 << self.bits) - 1;
        ((word >> shift) & mask) as u32
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).map(|index| self.get(index))
    }
}

/// Smallest Bedrock storage width that can index `palette_len` entries.
pub fn bedrock_bits_for(palette_len: usize) -> u8 {
    let needed = usize::BITS - palette_len.saturating_sub(1).leading_zeros();
    BEDROCK_STORAGE_BITS
        .into_iter()
        .find(|&bits| u32::from(bits) >= needed)
        .unwrap_or(16)
}

/// Writes `indices` as Bedrock storage words.
pub fn write_bedrock_words(encoder: &mut Encoder, bits: u8, indices: &[u16]) {
    let per_word = 32 / usize::from(bits);
    for chunk in indices.chunks(per_word) {
        let mut word = 0u32;
        for (i, &index) in chunk.iter().enumerate() {
            word |= u32::from(index) << (i * usize::from(bits));
        }
        encoder.write_u32_le(word);
    }
}

/// Number of words [`write_bedrock_words`] produces.
pub fn bedrock_word_count(bits: u8, len: usize) -> usize {
    len.div_ceil(32 / usize::from(bits))
}
