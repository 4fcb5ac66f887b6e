use crate::position::BlockPosition;
use std::{convert::Infallible, num::TryFromIntError, str::Utf8Error};

/// An error while decoding packets.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("need at least {0} more bytes")]
    EndOfStream(usize),
    #[error("invalid boolean pattern {0} - expected either 0 or 1")]
    InvalidBool(u8),
    #[error("varint / varlong is too long")]
    VarIntTooLong,
    #[error("string exceeds max allowed length")]
    StringTooLong,
    #[error("invalid discriminant '{0}'")]
    InvalidDiscriminant(i64),
    #[error("unknown packet id {0:#x}")]
    UnknownPacket(u32),
    #[error("unknown compound tag type {0}")]
    UnknownTag(u8),
    #[error("compound tag nesting exceeds {0} levels")]
    TagTooDeep(usize),
    #[error("{0} trailing bytes after packet body")]
    TrailingBytes(usize),
    #[error(transparent)]
    Utf8(#[from] Utf8Error),
    #[error(transparent)]
    IntConversion(#[from] TryFromIntError),
    /// Special variant for derive macro integer conversions to work.
    /// Cannot occur.
    #[error(transparent)]
    Infallible(#[from] Infallible),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;

const MAX_STRING_LENGTH: usize = i16::MAX as usize;

/// A raw decoder for a protocol bitstream.
///
/// Fixed-width reads default to big-endian (Java); the `_le` variants
/// serve the Bedrock side.
#[derive(Debug)]
pub struct Decoder<'a> {
    buffer: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Creates a decoder from the buffer it will read from.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Gets the remaining buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Returns if there is no data left in the buffer.
    pub fn is_finished(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Fails if the buffer still holds unread bytes.
    pub fn finish(&self) -> Result<()> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes(self.buffer.len()))
        }
    }

    /// Consumes `n` bytes from the buffer, returning them as a slice.
    pub fn consume_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        if n <= self.buffer.len() {
            let (data, buffer) = self.buffer.split_at(n);
            self.buffer = buffer;
            Ok(data)
        } else {
            Err(DecodeError::EndOfStream(n - self.buffer.len()))
        }
    }

    /// Consumes the rest of the buffer.
    pub fn consume_rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buffer)
    }

    /// Consumes `N` bytes into an array.
    pub fn consume<const N: usize>(&mut self) -> Result<[u8; N]> {
        let data = self.consume_slice(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(data);
        Ok(array)
    }

    /// Rejects a collection length that cannot possibly fit
    /// in the remaining buffer.
    pub fn check_collection_length(&self, length: usize) -> Result<()> {
        if length > self.buffer.len() {
            Err(DecodeError::EndOfStream(length - self.buffer.len()))
        } else {
            Ok(())
        }
    }

    /// Reads an unsigned byte from the stream.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.consume::<1>().map(|[x]| x)
    }

    /// Reads a signed byte from the stream.
    pub fn read_i8(&mut self) -> Result<i8> {
        self.consume().map(i8::from_be_bytes)
    }

    /// Reads an unsigned short from the stream.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.consume().map(u16::from_be_bytes)
    }

    /// Reads a signed short from the stream.
    pub fn read_i16(&mut self) -> Result<i16> {
        self.consume().map(i16::from_be_bytes)
    }

    /// Reads an unsigned int from the stream.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.consume().map(u32::from_be_bytes)
    }

    /// Reads a signed int from the stream.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.consume().map(i32::from_be_bytes)
    }

    /// Reads an unsigned long from the stream.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.consume().map(u64::from_be_bytes)
    }

    /// Reads a signed long from the stream.
    pub fn read_i64(&mut self) -> Result<i64> {
        self.consume().map(i64::from_be_bytes)
    }

    /// Reads a float from the stream.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.consume().map(f32::from_be_bytes)
    }

    /// Reads a double from the stream.
    pub fn read_f64(&mut self) -> Result<f64> {
        self.consume().map(f64::from_be_bytes)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.consume().map(u16::from_le_bytes)
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        self.consume().map(i16::from_le_bytes)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.consume().map(u32::from_le_bytes)
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        self.consume().map(i32::from_le_bytes)
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        self.consume().map(u64::from_le_bytes)
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        self.consume().map(i64::from_le_bytes)
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        self.consume().map(f32::from_le_bytes)
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        self.consume().map(f64::from_le_bytes)
    }

    /// Reads a boolean from the stream.
    pub fn read_bool(&mut self) -> Result<bool> {
        let x = self.read_u8()?;
        match x {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::InvalidBool(x)),
        }
    }

    /// Reads a VarInt from the stream.
    pub fn read_var_int(&mut self) -> Result<i32> {
        self.read_var_int_with_size().map(|(x, _)| x)
    }

    /// Reads a VarInt from the stream, additionally
    /// returning the number of bytes read.
    pub fn read_var_int_with_size(&mut self) -> Result<(i32, usize)> {
        let (value, size) = self.read_leb128(5)?;
        Ok((bytemuck::cast(value as u32), size))
    }

    /// Reads a VarLong from the stream.
    pub fn read_var_long(&mut self) -> Result<i64> {
        let (value, _) = self.read_leb128(10)?;
        Ok(bytemuck::cast(value))
    }

    /// Reads an unsigned 32-bit LEB128 integer.
    pub fn read_var_u32(&mut self) -> Result<u32> {
        let (value, _) = self.read_leb128(5)?;
        Ok(value as u32)
    }

    /// Reads an unsigned 64-bit LEB128 integer.
    pub fn read_var_u64(&mut self) -> Result<u64> {
        self.read_leb128(10).map(|(x, _)| x)
    }

    /// Reads a ZigZag-encoded signed 32-bit integer.
    pub fn read_zigzag32(&mut self) -> Result<i32> {
        let raw = self.read_var_u32()?;
        Ok((raw >> 1) as i32 ^ -((raw & 1) as i32))
    }

    /// Reads a ZigZag-encoded signed 64-bit integer.
    pub fn read_zigzag64(&mut self) -> Result<i64> {
        let raw = self.read_var_u64()?;
        Ok((raw >> 1) as i64 ^ -((raw & 1) as i64))
    }

    /// Shared LEB128 loop. Bits past the target width are discarded, and a
    /// continuation bit on the last permitted byte is an error.
    fn read_leb128(&mut self, max_bytes: usize) -> Result<(u64, usize)> {
        let mut result = 0u64;
        for num_read in 0..max_bytes {
            let read = self.read_u8()?;
            result |= u64::from(read & 0b0111_1111)
                .checked_shl(7 * num_read as u32)
                .unwrap_or(0);
            if read & 0b1000_0000 == 0 {
                return Ok((result, num_read + 1));
            }
        }
        Err(DecodeError::VarIntTooLong)
    }

    pub fn read_block_position(&mut self) -> Result<BlockPosition> {
        let value = self.read_i64()?;

        let x = (value >> 38) as i32;
        let y = (value << 52 >> 52) as i32;
        let z = (value << 26 >> 38) as i32;

        Ok(BlockPosition { x, y, z })
    }

    /// Reads a Bedrock block position: ZigZag x, unsigned y, ZigZag z.
    pub fn read_bedrock_block_position(&mut self) -> Result<BlockPosition> {
        let x = self.read_zigzag32()?;
        let y = self.read_var_u32()? as i32;
        let z = self.read_zigzag32()?;
        Ok(BlockPosition { x, y, z })
    }

    /// Reads a string from the stream.
    pub fn read_string(&mut self) -> Result<&'a str> {
        let length = usize::try_from(self.read_var_u32()?)?;

        if length > MAX_STRING_LENGTH {
            return Err(DecodeError::StringTooLong);
        }

        let bytes = std::str::from_utf8(self.consume_slice(length)?)?;
        Ok(bytes)
    }

    /// Reads a string with a little-endian i32 length prefix,
    /// as used by the Bedrock login payload.
    pub fn read_long_string_le(&mut self) -> Result<&'a str> {
        let length = usize::try_from(self.read_i32_le()?)?;
        Ok(std::str::from_utf8(self.consume_slice(length)?)?)
    }

    /// Reads a var-int length-prefixed byte array.
    pub fn read_byte_array(&mut self) -> Result<&'a [u8]> {
        let length = usize::try_from(self.read_var_u32()?)?;
        self.consume_slice(length)
    }

    pub fn read_angle(&mut self) -> Result<f32> {
        let fixed = self.read_u8()?;
        Ok(f32::from(fixed) * 360.0 / 256.0)
    }
}

/// A type that can be read from a [`Decoder`].
pub trait Decode: Sized {
    fn decode(decoder: &mut Decoder) -> Result<Self>;
}

/// A type with a little-endian wire form, selected with `#[encoding(le)]`.
pub trait DecodeLe: Sized {
    fn decode_le(decoder: &mut Decoder) -> Result<Self>;
}

macro_rules! primitive_decode {
    ($($ty:ty => $be:ident, $le:ident;)*) => {
        $(
            impl Decode for $ty {
                fn decode(decoder: &mut Decoder) -> Result<Self> {
                    decoder.$be()
                }
            }

            impl DecodeLe for $ty {
                fn decode_le(decoder: &mut Decoder) -> Result<Self> {
                    decoder.$le()
                }
            }
        )*
    };
}

primitive_decode! {
    u16 => read_u16, read_u16_le;
    i16 => read_i16, read_i16_le;
    u32 => read_u32, read_u32_le;
    i32 => read_i32, read_i32_le;
    u64 => read_u64, read_u64_le;
    i64 => read_i64, read_i64_le;
    f32 => read_f32, read_f32_le;
    f64 => read_f64, read_f64_le;
}

impl Decode for u8 {
    fn decode(decoder: &mut Decoder) -> Result<Self> {
        decoder.read_u8()
    }
}

impl Decode for i8 {
    fn decode(decoder: &mut Decoder) -> Result<Self> {
        decoder.read_i8()
    }
}

impl Decode for bool {
    fn decode(decoder: &mut Decoder) -> Result<Self> {
        decoder.read_bool()
    }
}

impl Decode for String {
    fn decode(decoder: &mut Decoder) -> Result<Self> {
        decoder.read_string().map(str::to_owned)
    }
}

impl Decode for u128 {
    fn decode(decoder: &mut Decoder) -> Result<Self> {
        let bytes = decoder.consume::<16>()?;
        Ok(Self::from_be_bytes(bytes))
    }
}

impl Decode for uuid::Uuid {
    fn decode(decoder: &mut Decoder) -> Result<Self> {
        u128::decode(decoder).map(uuid::Uuid::from_u128)
    }
}

impl Decode for BlockPosition {
    fn decode(decoder: &mut Decoder) -> Result<Self> {
        decoder.read_block_position()
    }
}

impl Decode for () {
    fn decode(_decoder: &mut Decoder) -> Result<Self> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlong_var_int() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(matches!(
            Decoder::new(&bytes).read_var_int(),
            Err(DecodeError::VarIntTooLong)
        ));
        let bytes = [0xff; 11];
        assert!(matches!(
            Decoder::new(&bytes).read_var_u64(),
            Err(DecodeError::VarIntTooLong)
        ));
    }

    #[test]
    fn truncated_var_int_is_end_of_stream() {
        let bytes = [0x80, 0x80];
        assert!(matches!(
            Decoder::new(&bytes).read_var_u32(),
            Err(DecodeError::EndOfStream(_))
        ));
    }

    #[test]
    fn reads_known_encodings() {
        assert_eq!(Decoder::new(&[0xff, 0xff, 0xff, 0xff, 0x0f]).read_var_int().unwrap(), -1);
        assert_eq!(Decoder::new(&[0x01]).read_zigzag32().unwrap(), -1);
        assert_eq!(Decoder::new(&[0x02]).read_zigzag32().unwrap(), 1);
        assert_eq!(Decoder::new(&[0xac, 0x02]).read_var_u32().unwrap(), 300);
    }

    #[test]
    fn block_position_sign_extends() {
        let packed: i64 = ((-5i64 & 0x3FF_FFFF) << 38) | ((7i64 & 0x3FF_FFFF) << 12) | (-64i64 & 0xFFF);
        let bytes = packed.to_be_bytes();
        let position = Decoder::new(&bytes).read_block_position().unwrap();
        assert_eq!(position, BlockPosition { x: -5, y: -64, z: 7 });
    }
}
