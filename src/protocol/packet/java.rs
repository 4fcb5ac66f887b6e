//! Java Edition packets (protocol 765).
//!
//! `client` holds packets sent by the client (the bridge, on the back side);
//! `server` holds packets sent by the Java server.

use crate::{
    position::BlockPosition,
    protocol::{
        nbt::{self, Compound, Tag},
        Decode, DecodeError, Decoder, Encode, Encoder,
    },
};
use uuid::Uuid;

pub mod client;
pub mod server;

/// A root compound that may be absent (lone end tag).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Nbt(pub Option<Compound>);

impl Decode for Nbt {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        nbt::read_root(decoder, nbt::Flavor::Java).map(Nbt)
    }
}

impl Encode for Nbt {
    fn encode(&self, encoder: &mut Encoder) {
        nbt::write_root(encoder, nbt::Flavor::Java, self.0.as_ref());
    }
}

/// A chat component sent as a network tag (string or compound).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextComponent(pub Option<Tag>);

impl TextComponent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self(Some(Tag::String(text.into())))
    }

    /// Flattens the component to its visible text.
    pub fn to_plain(&self) -> String {
        let mut out = String::new();
        if let Some(tag) = &self.0 {
            flatten_text_tag(tag, &mut out);
        }
        out
    }
}

fn flatten_text_tag(tag: &Tag, out: &mut String) {
    match tag {
        Tag::String(s) => out.push_str(s),
        Tag::Compound(compound) => {
            if let Some(text) = compound.get_str("text") {
                out.push_str(text);
            } else if let Some(key) = compound.get_str("translate") {
                out.push_str(key);
            }
            if let Some(extra) = compound.get_list("extra") {
                for child in extra.iter() {
                    flatten_text_tag(child, out);
                }
            }
        }
        Tag::List(list) => {
            for child in list.iter() {
                flatten_text_tag(child, out);
            }
        }
        _ => {}
    }
}

impl Decode for TextComponent {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        nbt::read_network_tag(decoder).map(TextComponent)
    }
}

impl Encode for TextComponent {
    fn encode(&self, encoder: &mut Encoder) {
        nbt::write_network_tag(encoder, self.0.as_ref());
    }
}

/// An item slot. `None` is an empty slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slot(pub Option<SlotData>);

#[derive(Debug, Clone, PartialEq)]
pub struct SlotData {
    pub item_id: i32,
    pub count: i8,
    pub nbt: Option<Compound>,
}

impl Decode for Slot {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        if !decoder.read_bool()? {
            return Ok(Slot(None));
        }
        let item_id = decoder.read_var_int()?;
        let count = decoder.read_i8()?;
        let nbt = nbt::read_root(decoder, nbt::Flavor::Java)?;
        Ok(Slot(Some(SlotData {
            item_id,
            count,
            nbt,
        })))
    }
}

impl Encode for Slot {
    fn encode(&self, encoder: &mut Encoder) {
        match &self.0 {
            None => encoder.write_bool(false),
            Some(data) => {
                encoder.write_bool(true);
                encoder.write_var_int(data.item_id);
                encoder.write_i8(data.count);
                nbt::write_root(encoder, nbt::Flavor::Java, data.nbt.as_ref());
            }
        }
    }
}

/// Entity metadata: indexed typed values terminated by `0xFF`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityMetadata(pub Vec<MetadataEntry>);

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub index: u8,
    pub value: MetadataValue,
}

const METADATA_END: u8 = 0xff;

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Byte(i8),
    VarInt(i32),
    VarLong(i64),
    Float(f32),
    String(String),
    Text(TextComponent),
    OptionalText(Option<TextComponent>),
    Slot(Slot),
    Boolean(bool),
    Rotation([f32; 3]),
    Position(BlockPosition),
    OptionalPosition(Option<BlockPosition>),
    Direction(i32),
    OptionalUuid(Option<Uuid>),
    BlockState(i32),
    OptionalBlockState(i32),
    Nbt(Nbt),
    VillagerData([i32; 3]),
    OptionalVarInt(i32),
    Pose(i32),
    CatVariant(i32),
    FrogVariant(i32),
    OptionalGlobalPosition(Option<(String, BlockPosition)>),
    PaintingVariant(i32),
    SnifferState(i32),
    Vector3([f32; 3]),
    Quaternion([f32; 4]),
    /// A particle value and every entry after it, kept as raw bytes
    /// (including the terminator). Particle payloads depend on a registry
    /// the bridge does not mirror.
    Opaque(u8, Vec<u8>),
}

impl MetadataValue {
    fn type_id(&self) -> i32 {
        match self {
            MetadataValue::Byte(_) => 0,
            MetadataValue::VarInt(_) => 1,
            MetadataValue::VarLong(_) => 2,
            MetadataValue::Float(_) => 3,
            MetadataValue::String(_) => 4,
            MetadataValue::Text(_) => 5,
            MetadataValue::OptionalText(_) => 6,
            MetadataValue::Slot(_) => 7,
            MetadataValue::Boolean(_) => 8,
            MetadataValue::Rotation(_) => 9,
            MetadataValue::Position(_) => 10,
            MetadataValue::OptionalPosition(_) => 11,
            MetadataValue::Direction(_) => 12,
            MetadataValue::OptionalUuid(_) => 13,
            MetadataValue::BlockState(_) => 14,
            MetadataValue::OptionalBlockState(_) => 15,
            MetadataValue::Nbt(_) => 16,
            MetadataValue::Opaque(..) => 17,
            MetadataValue::VillagerData(_) => 18,
            MetadataValue::OptionalVarInt(_) => 19,
            MetadataValue::Pose(_) => 20,
            MetadataValue::CatVariant(_) => 21,
            MetadataValue::FrogVariant(_) => 22,
            MetadataValue::OptionalGlobalPosition(_) => 23,
            MetadataValue::PaintingVariant(_) => 24,
            MetadataValue::SnifferState(_) => 25,
            MetadataValue::Vector3(_) => 26,
            MetadataValue::Quaternion(_) => 27,
        }
    }
}

fn read_floats<const N: usize>(decoder: &mut Decoder) -> Result<[f32; N], DecodeError> {
    let mut values = [0.0; N];
    for value in &mut values {
        *value = decoder.read_f32()?;
    }
    Ok(values)
}

impl Decode for EntityMetadata {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let mut entries = Vec::new();
        loop {
            let index = decoder.read_u8()?;
            if index == METADATA_END {
                return Ok(EntityMetadata(entries));
            }
            let type_id = decoder.read_var_int()?;
            let value = match type_id {
                0 => MetadataValue::Byte(decoder.read_i8()?),
                1 => MetadataValue::VarInt(decoder.read_var_int()?),
                2 => MetadataValue::VarLong(decoder.read_var_long()?),
                3 => MetadataValue::Float(decoder.read_f32()?),
                4 => MetadataValue::String(String::decode(decoder)?),
                5 => MetadataValue::Text(TextComponent::decode(decoder)?),
                6 => MetadataValue::OptionalText(if decoder.read_bool()? {
                    Some(TextComponent::decode(decoder)?)
                } else {
                    None
                }),
                7 => MetadataValue::Slot(Slot::decode(decoder)?),
                8 => MetadataValue::Boolean(decoder.read_bool()?),
                9 => MetadataValue::Rotation(read_floats(decoder)?),
                10 => MetadataValue::Position(decoder.read_block_position()?),
                11 => MetadataValue::OptionalPosition(if decoder.read_bool()? {
                    Some(decoder.read_block_position()?)
                } else {
                    None
                }),
                12 => MetadataValue::Direction(decoder.read_var_int()?),
                13 => MetadataValue::OptionalUuid(if decoder.read_bool()? {
                    Some(Uuid::decode(decoder)?)
                } else {
                    None
                }),
                14 => MetadataValue::BlockState(decoder.read_var_int()?),
                15 => MetadataValue::OptionalBlockState(decoder.read_var_int()?),
                16 => MetadataValue::Nbt(Nbt::decode(decoder)?),
                17 => {
                    let rest = decoder.consume_rest().to_vec();
                    entries.push(MetadataEntry {
                        index,
                        value: MetadataValue::Opaque(index, rest),
                    });
                    return Ok(EntityMetadata(entries));
                }
                18 => MetadataValue::VillagerData([
                    decoder.read_var_int()?,
                    decoder.read_var_int()?,
                    decoder.read_var_int()?,
                ]),
                19 => MetadataValue::OptionalVarInt(decoder.read_var_int()?),
                20 => MetadataValue::Pose(decoder.read_var_int()?),
                21 => MetadataValue::CatVariant(decoder.read_var_int()?),
                22 => MetadataValue::FrogVariant(decoder.read_var_int()?),
                23 => MetadataValue::OptionalGlobalPosition(if decoder.read_bool()? {
                    Some((String::decode(decoder)?, decoder.read_block_position()?))
                } else {
                    None
                }),
                24 => MetadataValue::PaintingVariant(decoder.read_var_int()?),
                25 => MetadataValue::SnifferState(decoder.read_var_int()?),
                26 => MetadataValue::Vector3(read_floats(decoder)?),
                27 => MetadataValue::Quaternion(read_floats(decoder)?),
                other => return Err(DecodeError::InvalidDiscriminant(i64::from(other))),
            };
            entries.push(MetadataEntry { index, value });
        }
    }
}

impl Encode for EntityMetadata {
    fn encode(&self, encoder: &mut Encoder) {
        for entry in &self.0 {
            if let MetadataValue::Opaque(index, rest) = &entry.value {
                encoder.write_u8(*index);
                encoder.write_var_int(17);
                encoder.write_slice(rest);
                return;
            }
            encoder.write_u8(entry.index);
            encoder.write_var_int(entry.value.type_id());
            match &entry.value {
                MetadataValue::Byte(x) => encoder.write_i8(*x),
                MetadataValue::VarInt(x)
                | MetadataValue::Direction(x)
                | MetadataValue::BlockState(x)
                | MetadataValue::OptionalBlockState(x)
                | MetadataValue::OptionalVarInt(x)
                | MetadataValue::Pose(x)
                | MetadataValue::CatVariant(x)
                | MetadataValue::FrogVariant(x)
                | MetadataValue::PaintingVariant(x)
                | MetadataValue::SnifferState(x) => {
                    encoder.write_var_int(*x);
                }
                MetadataValue::VarLong(x) => {
                    encoder.write_var_long(*x);
                }
                MetadataValue::Float(x) => encoder.write_f32(*x),
                MetadataValue::String(s) => encoder.write_string(s),
                MetadataValue::Text(text) => text.encode(encoder),
                MetadataValue::OptionalText(text) => {
                    encoder.write_bool(text.is_some());
                    if let Some(text) = text {
                        text.encode(encoder);
                    }
                }
                MetadataValue::Slot(slot) => slot.encode(encoder),
                MetadataValue::Boolean(b) => encoder.write_bool(*b),
                MetadataValue::Rotation(v) | MetadataValue::Vector3(v) => {
                    v.iter().for_each(|x| encoder.write_f32(*x))
                }
                MetadataValue::Quaternion(v) => v.iter().for_each(|x| encoder.write_f32(*x)),
                MetadataValue::Position(p) => encoder.write_block_position(*p),
                MetadataValue::OptionalPosition(p) => {
                    encoder.write_bool(p.is_some());
                    if let Some(p) = p {
                        encoder.write_block_position(*p);
                    }
                }
                MetadataValue::OptionalUuid(uuid) => {
                    encoder.write_bool(uuid.is_some());
                    if let Some(uuid) = uuid {
                        uuid.encode(encoder);
                    }
                }
                MetadataValue::Nbt(nbt) => nbt.encode(encoder),
                MetadataValue::VillagerData(v) => v.iter().for_each(|x| {
                    encoder.write_var_int(*x);
                }),
                MetadataValue::OptionalGlobalPosition(pos) => {
                    encoder.write_bool(pos.is_some());
                    if let Some((dimension, p)) = pos {
                        encoder.write_string(dimension);
                        encoder.write_block_position(*p);
                    }
                }
                MetadataValue::Opaque(..) => {}
            }
        }
        encoder.write_u8(METADATA_END);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_to_vec;

    #[test]
    fn metadata_round_trips_with_terminator() {
        let metadata = EntityMetadata(vec![
            MetadataEntry {
                index: 0,
                value: MetadataValue::Byte(0x02),
            },
            MetadataEntry {
                index: 2,
                value: MetadataValue::OptionalText(Some(TextComponent::plain("Steve"))),
            },
            MetadataEntry {
                index: 6,
                value: MetadataValue::Pose(1),
            },
        ]);
        let bytes = encode_to_vec(&metadata);
        assert_eq!(*bytes.last().unwrap(), METADATA_END);
        assert_eq!(EntityMetadata::decode(&mut Decoder::new(&bytes)).unwrap(), metadata);
    }

    #[test]
    fn particle_entries_keep_the_remainder_opaque() {
        let bytes = [0u8, 0, 0x01, 10, 17, 5, 0xab, METADATA_END];
        let metadata = EntityMetadata::decode(&mut Decoder::new(&bytes)).unwrap();
        assert_eq!(metadata.0.len(), 2);
        assert_eq!(metadata.0[0].value, MetadataValue::Byte(1));
        assert_eq!(encode_to_vec(&metadata), bytes);
    }

    #[test]
    fn text_components_flatten() {
        let mut root = Compound::new();
        root.insert("text", Tag::String("Hello ".into()));
        root.insert(
            "extra",
            Tag::List(nbt::List::new(vec![Tag::String("world".into())])),
        );
        assert_eq!(TextComponent(Some(Tag::Compound(root))).to_plain(), "Hello world");
    }
}
