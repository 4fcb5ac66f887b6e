use crate::position::BlockPosition;

/// A raw encoder for a protocol bitstream.
#[derive(Debug)]
pub struct Encoder<'a> {
    buffer: &'a mut Vec<u8>,
}

impl<'a> Encoder<'a> {
    /// Creates an encoder that will append to the provided
    /// byte buffer.
    ///
    /// Any existing contents of `buffer` are left untouched.
    pub fn new(buffer: &'a mut Vec<u8>) -> Self {
        Self { buffer }
    }

    /// Number of bytes in the underlying buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Writes an unsigned byte to the stream.
    pub fn write_u8(&mut self, x: u8) {
        self.buffer.push(x);
    }

    /// Writes a signed byte to the stream.
    pub fn write_i8(&mut self, x: i8) {
        self.write_u8(bytemuck::cast(x));
    }

    /// Writes an unsigned short to the stream.
    pub fn write_u16(&mut self, x: u16) {
        self.buffer.extend(x.to_be_bytes());
    }

    /// Writes a signed short to the stream.
    pub fn write_i16(&mut self, x: i16) {
        self.buffer.extend(x.to_be_bytes());
    }

    /// Writes an unsigned int to the stream.
    pub fn write_u32(&mut self, x: u32) {
        self.buffer.extend(x.to_be_bytes());
    }

    /// Writes a signed int to the stream.
    pub fn write_i32(&mut self, x: i32) {
        self.buffer.extend(x.to_be_bytes());
    }

    /// Writes an unsigned long to the stream.
    pub fn write_u64(&mut self, x: u64) {
        self.buffer.extend(x.to_be_bytes());
    }

    /// Writes a signed long to the stream.
    pub fn write_i64(&mut self, x: i64) {
        self.buffer.extend(x.to_be_bytes());
    }

    /// Writes a float to the stream.
    pub fn write_f32(&mut self, x: f32) {
        self.buffer.extend(x.to_be_bytes());
    }

    /// Writes a double to the stream.
    pub fn write_f64(&mut self, x: f64) {
        self.buffer.extend(x.to_be_bytes());
    }

    pub fn write_u16_le(&mut self, x: u16) {
        self.buffer.extend(x.to_le_bytes());
    }

    pub fn write_i16_le(&mut self, x: i16) {
        self.buffer.extend(x.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, x: u32) {
        self.buffer.extend(x.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, x: i32) {
        self.buffer.extend(x.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, x: u64) {
        self.buffer.extend(x.to_le_bytes());
    }

    pub fn write_i64_le(&mut self, x: i64) {
        self.buffer.extend(x.to_le_bytes());
    }

    pub fn write_f32_le(&mut self, x: f32) {
        self.buffer.extend(x.to_le_bytes());
    }

    pub fn write_f64_le(&mut self, x: f64) {
        self.buffer.extend(x.to_le_bytes());
    }

    /// Writes a boolean to the stream.
    pub fn write_bool(&mut self, x: bool) {
        self.write_u8(if x { 0x01 } else { 0x00 });
    }

    /// Writes a series of bytes to the stream. Does not write
    /// any sort of length prefix.
    pub fn write_slice(&mut self, slice: &[u8]) {
        self.buffer.extend_from_slice(slice);
    }

    /// Writes a VarInt to the stream. Returns the number of bytes written.
    pub fn write_var_int(&mut self, x: i32) -> usize {
        self.write_leb128(u64::from(bytemuck::cast::<i32, u32>(x)))
    }

    /// Writes a VarLong to the stream. Returns the number of bytes written.
    pub fn write_var_long(&mut self, x: i64) -> usize {
        self.write_leb128(bytemuck::cast(x))
    }

    pub fn write_var_u32(&mut self, x: u32) -> usize {
        self.write_leb128(u64::from(x))
    }

    pub fn write_var_u64(&mut self, x: u64) -> usize {
        self.write_leb128(x)
    }

    pub fn write_zigzag32(&mut self, x: i32) -> usize {
        self.write_var_u32(((x << 1) ^ (x >> 31)) as u32)
    }

    pub fn write_zigzag64(&mut self, x: i64) -> usize {
        self.write_var_u64(((x << 1) ^ (x >> 63)) as u64)
    }

    fn write_leb128(&mut self, mut x: u64) -> usize {
        let mut bytes_written = 0;
        loop {
            let mut temp = (x & 0b0111_1111) as u8;
            x >>= 7;
            if x != 0 {
                temp |= 0b1000_0000;
            }

            self.buffer.push(temp);
            bytes_written += 1;

            if x == 0 {
                break bytes_written;
            }
        }
    }

    /// Writes a length-prefixed string to the stream.
    pub fn write_string(&mut self, x: &str) {
        self.write_var_u32(x.len().try_into().unwrap_or(u32::MAX));
        self.buffer.extend_from_slice(x.as_bytes());
    }

    /// Writes a string with a little-endian i32 length prefix.
    pub fn write_long_string_le(&mut self, x: &str) {
        self.write_i32_le(x.len().try_into().unwrap_or(i32::MAX));
        self.buffer.extend_from_slice(x.as_bytes());
    }

    /// Writes a var-int length-prefixed byte array.
    pub fn write_byte_array(&mut self, bytes: &[u8]) {
        self.write_var_u32(bytes.len().try_into().unwrap_or(u32::MAX));
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes a fixed-point-encoded angle to the stream.
    pub fn write_angle(&mut self, degrees: f32) {
        let x = (degrees.rem_euclid(360.0) / 360.0 * 256.0).round() as u32;
        self.buffer.push(x as u8);
    }

    pub fn write_block_position(&mut self, position: BlockPosition) {
        let packed = ((i64::from(position.x) & 0x3FF_FFFF) << 38)
            | ((i64::from(position.z) & 0x3FF_FFFF) << 12)
            | (i64::from(position.y) & 0xFFF);
        self.write_i64(packed);
    }

    pub fn write_bedrock_block_position(&mut self, position: BlockPosition) {
        self.write_zigzag32(position.x);
        self.write_var_u32(position.y as u32);
        self.write_zigzag32(position.z);
    }
}

/// A type that can be written to an [`Encoder`].
pub trait Encode {
    fn encode(&self, encoder: &mut Encoder);
}

/// A type with a little-endian wire form, selected with `#[encoding(le)]`.
pub trait EncodeLe {
    fn encode_le(&self, encoder: &mut Encoder);
}

macro_rules! primitive_encode {
    ($($ty:ty => $be:ident, $le:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, encoder: &mut Encoder) {
                    encoder.$be(*self);
                }
            }

            impl EncodeLe for $ty {
                fn encode_le(&self, encoder: &mut Encoder) {
                    encoder.$le(*self);
                }
            }
        )*
    };
}

primitive_encode! {
    u16 => write_u16, write_u16_le;
    i16 => write_i16, write_i16_le;
    u32 => write_u32, write_u32_le;
    i32 => write_i32, write_i32_le;
    u64 => write_u64, write_u64_le;
    i64 => write_i64, write_i64_le;
    f32 => write_f32, write_f32_le;
    f64 => write_f64, write_f64_le;
}

impl Encode for u8 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_u8(*self);
    }
}

impl Encode for i8 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_i8(*self);
    }
}

impl Encode for bool {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_bool(*self);
    }
}

impl Encode for String {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_string(self);
    }
}

impl Encode for u128 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_slice(&self.to_be_bytes())
    }
}

impl Encode for uuid::Uuid {
    fn encode(&self, encoder: &mut Encoder) {
        self.as_u128().encode(encoder)
    }
}

impl Encode for BlockPosition {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_block_position(*self)
    }
}

impl Encode for () {
    fn encode(&self, _encoder: &mut Encoder) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Decoder;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn var_int_round_trips(x in any::<i32>()) {
            let mut buf = Vec::new();
            Encoder::new(&mut buf).write_var_int(x);
            prop_assert!(buf.len() <= 5);
            prop_assert_eq!(Decoder::new(&buf).read_var_int().unwrap(), x);
        }

        #[test]
        fn var_long_round_trips(x in any::<i64>()) {
            let mut buf = Vec::new();
            Encoder::new(&mut buf).write_var_long(x);
            prop_assert!(buf.len() <= 10);
            prop_assert_eq!(Decoder::new(&buf).read_var_long().unwrap(), x);
        }

        #[test]
        fn zigzag_round_trips(x in any::<i32>(), y in any::<i64>()) {
            let mut buf = Vec::new();
            let mut encoder = Encoder::new(&mut buf);
            encoder.write_zigzag32(x);
            encoder.write_zigzag64(y);
            let mut decoder = Decoder::new(&buf);
            prop_assert_eq!(decoder.read_zigzag32().unwrap(), x);
            prop_assert_eq!(decoder.read_zigzag64().unwrap(), y);
            prop_assert!(decoder.is_finished());
        }

        #[test]
        fn unsigned_var_ints_round_trip(x in any::<u32>(), y in any::<u64>()) {
            let mut buf = Vec::new();
            let mut encoder = Encoder::new(&mut buf);
            encoder.write_var_u32(x);
            encoder.write_var_u64(y);
            let mut decoder = Decoder::new(&buf);
            prop_assert_eq!(decoder.read_var_u32().unwrap(), x);
            prop_assert_eq!(decoder.read_var_u64().unwrap(), y);
        }
    }

    #[test]
    fn var_int_boundaries() {
        for x in [0, 1, -1, i32::MIN, i32::MAX, 127, 128, -128] {
            let mut buf = Vec::new();
            Encoder::new(&mut buf).write_var_int(x);
            assert_eq!(Decoder::new(&buf).read_var_int().unwrap(), x);
        }
        let mut buf = Vec::new();
        Encoder::new(&mut buf).write_var_int(-1);
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn zigzag_small_magnitudes_are_one_byte() {
        let mut buf = Vec::new();
        Encoder::new(&mut buf).write_zigzag32(-64);
        assert_eq!(buf, [0x7f]);
    }

    #[test]
    fn block_positions_round_trip() {
        let position = BlockPosition { x: -30_000, y: -64, z: 29_999 };
        let mut buf = Vec::new();
        Encoder::new(&mut buf).write_block_position(position);
        assert_eq!(Decoder::new(&buf).read_block_position().unwrap(), position);

        let mut buf = Vec::new();
        Encoder::new(&mut buf).write_bedrock_block_position(BlockPosition { x: -3, y: 70, z: 12 });
        assert_eq!(
            Decoder::new(&buf).read_bedrock_block_position().unwrap(),
            BlockPosition { x: -3, y: 70, z: 12 }
        );
    }

    #[test]
    fn angles_use_256_steps() {
        let mut buf = Vec::new();
        let mut encoder = Encoder::new(&mut buf);
        encoder.write_angle(90.0);
        encoder.write_angle(-90.0);
        assert_eq!(buf, [64, 192]);
        assert_eq!(Decoder::new(&buf).read_angle().unwrap(), 90.0);
    }
}
