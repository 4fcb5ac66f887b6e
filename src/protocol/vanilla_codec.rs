//! Framing for the Java side: var-int length prefixes with optional zlib
//! compression. Back-side connections run in offline mode, so there is no
//! encryption layer here.

use super::{RawPacket, BUFFER_LIMIT};
use crate::protocol::{DecodeError, Decoder, Encode, Encoder, PacketId};
use anyhow::bail;
use flate2::Compression;
use std::io::{Read, Write};

/// Most serverbound Java packets are tiny; do not spend time compressing hard.
const COMPRESSION_LEVEL: Compression = Compression::fast();

/// Threshold in bytes where a packet will be compressed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompressionThreshold(usize);

impl CompressionThreshold {
    /// Interprets the threshold announced by the server.
    /// Negative values disable compression.
    pub fn from_announced(threshold: i32) -> Option<Self> {
        usize::try_from(threshold).ok().map(Self)
    }
}

/// Codec state for one Java connection.
#[derive(Default)]
pub struct VanillaCodec {
    /// Buffered incoming bytes.
    read_buffer: Vec<u8>,
    compression: Option<CompressionThreshold>,
}

impl VanillaCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables (or, with `None`, disables) compression for both directions.
    pub fn set_compression(&mut self, threshold: Option<CompressionThreshold>) {
        self.compression = threshold;
    }

    pub fn compression(&self) -> Option<CompressionThreshold> {
        self.compression
    }

    /// Encodes a typed packet to a frame.
    pub fn encode_packet<P: Encode + PacketId>(&self, packet: &P) -> anyhow::Result<Vec<u8>> {
        let mut body = Vec::new();
        packet.encode(&mut Encoder::new(&mut body));
        self.encode_raw(P::ID, &body)
    }

    /// Encodes an already serialized packet body to a frame.
    pub fn encode_raw(&self, id: u32, body: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut plain_buf = Vec::with_capacity(body.len() + 5);
        let mut encoder = Encoder::new(&mut plain_buf);
        encoder.write_var_int(i32::try_from(id)?);
        encoder.write_slice(body);

        let uncompressed_length = i32::try_from(plain_buf.len())?;
        let mut frame = Vec::new();
        let mut encoder = Encoder::new(&mut frame);
        match self.compression {
            Some(CompressionThreshold(threshold)) => {
                let (data_length, data) = if plain_buf.len() >= threshold {
                    let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), COMPRESSION_LEVEL);
                    zlib.write_all(&plain_buf)?;
                    (uncompressed_length, zlib.finish()?)
                } else {
                    (0, plain_buf)
                };
                encoder.write_var_int(var_int_size(data_length) as i32 + i32::try_from(data.len())?);
                encoder.write_var_int(data_length);
                encoder.write_slice(&data);
            }
            None => {
                encoder.write_var_int(uncompressed_length);
                encoder.write_slice(&plain_buf);
            }
        }
        Ok(frame)
    }

    /// Gives data to the internal read buffer.
    ///
    /// Call `decode_packet` to get packets.
    pub fn give_data(&mut self, data: &[u8]) {
        self.read_buffer.extend_from_slice(data);
    }

    /// Attempts to decode a packet.
    /// This should be called in a loop after any call to `give_data`
    /// until this function returns `None`.
    ///
    /// * If not enough data is available, returns `Ok(None)`.
    /// * If a packet was read, returns `Ok(Some(packet))`. More packets may be available.
    /// * If an error occurs, returns `Err(e)`, invalidating the stream.
    pub fn decode_packet(&mut self) -> anyhow::Result<Option<RawPacket>> {
        let mut decoder = Decoder::new(&self.read_buffer);
        let (length, length_size) = match decoder.read_var_int_with_size() {
            Ok(x) => x,
            Err(DecodeError::EndOfStream(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let length = usize::try_from(length)?;
        if length > BUFFER_LIMIT {
            bail!("packet length of {length} exceeds maximum allowed");
        }
        let packet_contents = match decoder.consume_slice(length) {
            Ok(x) => x,
            Err(DecodeError::EndOfStream(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let plain_data = match self.compression {
            Some(_) => {
                let mut decoder = Decoder::new(packet_contents);
                let uncompressed_length = usize::try_from(decoder.read_var_int()?)?;
                if uncompressed_length == 0 {
                    decoder.buffer().to_vec()
                } else {
                    if uncompressed_length > BUFFER_LIMIT {
                        bail!("uncompressed length of {uncompressed_length} exceeds maximum allowed");
                    }
                    let mut buf = Vec::with_capacity(uncompressed_length);
                    flate2::read::ZlibDecoder::new(decoder.buffer())
                        .take(BUFFER_LIMIT as u64)
                        .read_to_end(&mut buf)?;
                    buf
                }
            }
            None => packet_contents.to_vec(),
        };

        self.read_buffer.drain(..length_size + length);

        let mut decoder = Decoder::new(&plain_data);
        let id = u32::try_from(decoder.read_var_int()?)?;
        let header = plain_data.len() - decoder.buffer().len();
        Ok(Some(RawPacket::new(id, plain_data[header..].to_vec())))
    }
}

pub fn var_int_size(x: i32) -> usize {
    Encoder::new(&mut Vec::new()).write_var_int(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_split_frames() {
        let codec = VanillaCodec::new();
        let frame = codec.encode_raw(0x24, &[1, 2, 3, 4]).unwrap();

        let mut reader = VanillaCodec::new();
        reader.give_data(&frame[..2]);
        assert!(reader.decode_packet().unwrap().is_none());
        reader.give_data(&frame[2..]);
        let packet = reader.decode_packet().unwrap().unwrap();
        assert_eq!(packet.id, 0x24);
        assert_eq!(packet.body, [1, 2, 3, 4]);
        assert!(reader.decode_packet().unwrap().is_none());
    }

    #[test]
    fn compressed_frames_round_trip() {
        let mut codec = VanillaCodec::new();
        codec.set_compression(CompressionThreshold::from_announced(16));
        let small = codec.encode_raw(0x01, &[9; 4]).unwrap();
        let large = codec.encode_raw(0x25, &[7; 4096]).unwrap();
        assert!(large.len() < 4096);

        let mut reader = VanillaCodec::new();
        reader.set_compression(CompressionThreshold::from_announced(16));
        reader.give_data(&small);
        reader.give_data(&large);
        assert_eq!(reader.decode_packet().unwrap().unwrap().body, [9; 4]);
        let packet = reader.decode_packet().unwrap().unwrap();
        assert_eq!(packet.id, 0x25);
        assert_eq!(packet.body.len(), 4096);
    }

    #[test]
    fn negative_threshold_disables_compression() {
        assert_eq!(CompressionThreshold::from_announced(-1), None);
    }
}
