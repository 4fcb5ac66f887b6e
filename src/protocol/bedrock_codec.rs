//! Batch framing for the Bedrock side.
//!
//! A frame is the `0xFE` marker followed by the (optionally encrypted,
//! optionally compressed) concatenation of var-uint length-prefixed packets.

use super::{RawPacket, BATCH_LIMIT};
use crate::protocol::{DecodeError, Decoder, Encode, Encoder, PacketId};
use aes::Aes256;
use anyhow::{bail, Context};
use ctr::cipher::{KeyIvInit, StreamCipher};
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

pub const BATCH_MARKER: u8 = 0xfe;

const ALGORITHM_DEFLATE: u8 = 0x00;
const ALGORITHM_NONE: u8 = 0xff;
const CHECKSUM_LENGTH: usize = 8;

/// The low ten bits of a packet header carry the id.
const PACKET_ID_MASK: u32 = 0x3ff;

type Aes256Ctr = ctr::Ctr32BE<Aes256>;

/// Per-connection AES-256-CTR state with the batch checksum counters.
pub struct BatchCipher {
    key: [u8; 32],
    encryptor: Aes256Ctr,
    decryptor: Aes256Ctr,
    send_counter: u64,
    receive_counter: u64,
}

impl BatchCipher {
    /// Creates the cipher for a derived 32-byte key. Both directions share
    /// the IV `key[0..12] ‖ 00 00 00 02`.
    pub fn new(key: [u8; 32]) -> Self {
        let mut iv = [0u8; 16];
        iv[..12].copy_from_slice(&key[..12]);
        iv[15] = 2;
        Self {
            key,
            encryptor: Aes256Ctr::new(&key.into(), &iv.into()),
            decryptor: Aes256Ctr::new(&key.into(), &iv.into()),
            send_counter: 0,
            receive_counter: 0,
        }
    }

    fn checksum(&self, counter: u64, payload: &[u8]) -> [u8; CHECKSUM_LENGTH] {
        let digest = Sha256::new()
            .chain_update(counter.to_le_bytes())
            .chain_update(payload)
            .chain_update(self.key)
            .finalize();
        let mut checksum = [0u8; CHECKSUM_LENGTH];
        checksum.copy_from_slice(&digest[..CHECKSUM_LENGTH]);
        checksum
    }

    /// Appends the checksum and encrypts in place.
    pub fn encrypt(&mut self, payload: &mut Vec<u8>) {
        let checksum = self.checksum(self.send_counter, payload);
        self.send_counter = self.send_counter.wrapping_add(1);
        payload.extend_from_slice(&checksum);
        self.encryptor.apply_keystream(payload);
    }

    /// Decrypts in place and verifies the checksum, returning the payload.
    pub fn decrypt<'a>(&mut self, data: &'a mut [u8]) -> anyhow::Result<&'a [u8]> {
        self.decryptor.apply_keystream(data);
        if data.len() < CHECKSUM_LENGTH {
            bail!("encrypted batch shorter than its checksum");
        }
        let (payload, checksum) = data.split_at(data.len() - CHECKSUM_LENGTH);
        let expected = self.checksum(self.receive_counter, payload);
        self.receive_counter = self.receive_counter.wrapping_add(1);
        if checksum != expected {
            bail!("batch checksum mismatch");
        }
        Ok(payload)
    }
}

/// Codec state for one Bedrock connection.
#[derive(Default)]
pub struct BedrockCodec {
    /// Payloads at or above this size are deflated once negotiated.
    compression_threshold: Option<u16>,
    cipher: Option<BatchCipher>,
}

impl BedrockCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches to the compressed layout (algorithm byte per batch).
    pub fn enable_compression(&mut self, threshold: u16) {
        self.compression_threshold = Some(threshold);
    }

    pub fn is_compressed(&self) -> bool {
        self.compression_threshold.is_some()
    }

    /// Encrypts every batch from now on. Refuses to replace an active cipher.
    pub fn enable_encryption(&mut self, cipher: BatchCipher) -> anyhow::Result<()> {
        if self.cipher.is_some() {
            bail!("encryption is already enabled");
        }
        self.cipher = Some(cipher);
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Serializes a typed packet into its in-batch form (header + body).
    pub fn packet_bytes<P: Encode + PacketId>(packet: &P) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut encoder = Encoder::new(&mut buf);
        encoder.write_var_u32(P::ID);
        packet.encode(&mut encoder);
        buf
    }

    /// In-batch form of a packet whose body is already encoded.
    pub fn raw_packet_bytes(id: u32, body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(body.len() + 2);
        let mut encoder = Encoder::new(&mut buf);
        encoder.write_var_u32(id);
        encoder.write_slice(body);
        buf
    }

    /// Builds one frame from packets already in their in-batch form.
    pub fn encode_batch<'p>(
        &mut self,
        packets: impl IntoIterator<Item = &'p [u8]>,
    ) -> anyhow::Result<Vec<u8>> {
        let mut batch = Vec::new();
        let mut encoder = Encoder::new(&mut batch);
        for packet in packets {
            encoder.write_byte_array(packet);
        }

        let mut payload = match self.compression_threshold {
            Some(threshold) if batch.len() >= usize::from(threshold) => {
                let mut deflate = flate2::write::DeflateEncoder::new(
                    vec![ALGORITHM_DEFLATE],
                    Compression::default(),
                );
                deflate.write_all(&batch)?;
                deflate.finish()?
            }
            Some(_) => {
                let mut payload = Vec::with_capacity(batch.len() + 1);
                payload.push(ALGORITHM_NONE);
                payload.extend_from_slice(&batch);
                payload
            }
            None => batch,
        };

        if let Some(cipher) = &mut self.cipher {
            cipher.encrypt(&mut payload);
        }

        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.push(BATCH_MARKER);
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Splits one frame into its packets.
    pub fn decode_batch(&mut self, frame: &[u8]) -> anyhow::Result<Vec<RawPacket>> {
        if frame.len() > BATCH_LIMIT {
            bail!("batch of {} bytes exceeds maximum allowed", frame.len());
        }
        let Some((&BATCH_MARKER, payload)) = frame.split_first() else {
            bail!("frame does not start with the batch marker");
        };

        let mut owned = payload.to_vec();
        let payload: &[u8] = match &mut self.cipher {
            Some(cipher) => cipher.decrypt(&mut owned)?,
            None => &owned,
        };

        let batch = if self.compression_threshold.is_some() {
            let (&algorithm, compressed) = payload
                .split_first()
                .context("compressed batch is missing its algorithm byte")?;
            match algorithm {
                ALGORITHM_DEFLATE => {
                    let mut buf = Vec::new();
                    flate2::read::DeflateDecoder::new(compressed)
                        .take(BATCH_LIMIT as u64 + 1)
                        .read_to_end(&mut buf)?;
                    if buf.len() > BATCH_LIMIT {
                        bail!("decompressed batch exceeds maximum allowed");
                    }
                    buf
                }
                ALGORITHM_NONE => compressed.to_vec(),
                other => bail!("unsupported compression algorithm {other:#x}"),
            }
        } else {
            payload.to_vec()
        };

        let mut decoder = Decoder::new(&batch);
        let mut packets = Vec::new();
        while !decoder.is_finished() {
            let packet = decoder.read_byte_array()?;
            packets.push(split_header(packet)?);
        }
        Ok(packets)
    }
}

fn split_header(packet: &[u8]) -> Result<RawPacket, DecodeError> {
    let mut decoder = Decoder::new(packet);
    let header = decoder.read_var_u32()?;
    Ok(RawPacket::new(header & PACKET_ID_MASK, decoder.buffer().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packets() -> Vec<Vec<u8>> {
        vec![vec![0x09, 1, 2, 3], vec![0x8f, 0x01, 0xaa], vec![0x45; 600]]
    }

    #[test]
    fn plain_batches_round_trip() {
        let mut codec = BedrockCodec::new();
        let packets = packets();
        let frame = codec.encode_batch(packets.iter().map(Vec::as_slice)).unwrap();
        assert_eq!(frame[0], BATCH_MARKER);
        let decoded = codec.decode_batch(&frame).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].id, 0x09);
        assert_eq!(decoded[0].body, [1, 2, 3]);
        assert_eq!(decoded[1].id, 0x8f);
    }

    #[test]
    fn compressed_and_encrypted_batches_round_trip() {
        let key = [7u8; 32];
        let mut server = BedrockCodec::new();
        let mut client = BedrockCodec::new();
        for codec in [&mut server, &mut client] {
            codec.enable_compression(256);
            codec.enable_encryption(BatchCipher::new(key)).unwrap();
        }
        let packets = packets();
        for _ in 0..3 {
            let frame = server.encode_batch(packets.iter().map(Vec::as_slice)).unwrap();
            let decoded = client.decode_batch(&frame).unwrap();
            assert_eq!(decoded[2].body.len(), 599);
        }
    }

    #[test]
    fn tampered_batch_fails_checksum() {
        let mut server = BedrockCodec::new();
        let mut client = BedrockCodec::new();
        server.enable_encryption(BatchCipher::new([1; 32])).unwrap();
        client.enable_encryption(BatchCipher::new([1; 32])).unwrap();
        let mut frame = server.encode_batch([&[0x09u8, 0][..]]).unwrap();
        frame[1] ^= 0x40;
        assert!(client.decode_batch(&frame).is_err());
    }

    #[test]
    fn encryption_cannot_be_replaced() {
        let mut codec = BedrockCodec::new();
        codec.enable_encryption(BatchCipher::new([0; 32])).unwrap();
        assert!(codec.enable_encryption(BatchCipher::new([1; 32])).is_err());
        assert!(codec.is_encrypted());
    }

    #[test]
    fn header_sub_client_bits_are_masked() {
        // 0x2409: id 9 with sender 1 and target 2
        let packet = split_header(&[0x89, 0x48, 5]).unwrap();
        assert_eq!(packet.id, 0x09);
        assert_eq!(packet.body, [5]);
    }
}
