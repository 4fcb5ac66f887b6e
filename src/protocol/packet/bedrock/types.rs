//! Compound field types shared by several Bedrock packets.

use crate::{
    position::BlockPosition,
    protocol::{
        nbt::{self, Compound},
        Decode, DecodeError, Decoder, Encode, Encoder,
    },
};
use bedrock_bridge_macros::{Decode, Encode};
use std::collections::BTreeMap;

#[derive(Copy, Clone, Debug, Default, PartialEq, Encode, Decode)]
pub struct Vec3 {
    #[encoding(le)]
    pub x: f32,
    #[encoding(le)]
    pub y: f32,
    #[encoding(le)]
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Encode, Decode)]
pub struct Vec2 {
    #[encoding(le)]
    pub x: f32,
    #[encoding(le)]
    pub y: f32,
}

/// A Bedrock block position: ZigZag x and z, unsigned y.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkBlockPosition(pub BlockPosition);

impl Decode for NetworkBlockPosition {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        decoder.read_bedrock_block_position().map(Self)
    }
}

impl Encode for NetworkBlockPosition {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_bedrock_block_position(self.0);
    }
}

/// Signed block position used inside entity data (all three ZigZag).
fn read_signed_block_position(decoder: &mut Decoder) -> Result<BlockPosition, DecodeError> {
    Ok(BlockPosition {
        x: decoder.read_zigzag32()?,
        y: decoder.read_zigzag32()?,
        z: decoder.read_zigzag32()?,
    })
}

/// Bedrock writes UUIDs as two little-endian halves, most significant first.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkUuid(pub uuid::Uuid);

impl Decode for NetworkUuid {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let most = decoder.read_u64_le()?;
        let least = decoder.read_u64_le()?;
        Ok(Self(uuid::Uuid::from_u64_pair(most, least)))
    }
}

impl Encode for NetworkUuid {
    fn encode(&self, encoder: &mut Encoder) {
        let (most, least) = self.0.as_u64_pair();
        encoder.write_u64_le(most);
        encoder.write_u64_le(least);
    }
}

/// Root compound in the Bedrock network flavor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkNbt(pub Compound);

impl Decode for NetworkNbt {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self(
            nbt::read_root(decoder, nbt::Flavor::BedrockNetwork)?.unwrap_or_default(),
        ))
    }
}

impl Encode for NetworkNbt {
    fn encode(&self, encoder: &mut Encoder) {
        nbt::write_root(encoder, nbt::Flavor::BedrockNetwork, Some(&self.0));
    }
}

fn read_short_string_le(decoder: &mut Decoder) -> Result<String, DecodeError> {
    let length = usize::from(decoder.read_u16_le()?);
    Ok(std::str::from_utf8(decoder.consume_slice(length)?)?.to_owned())
}

fn write_short_string_le(encoder: &mut Encoder, s: &str) {
    encoder.write_u16_le(s.len().try_into().unwrap_or(u16::MAX));
    encoder.write_slice(s.as_bytes());
}

/// Marker announcing user data in an item's extra data blob.
const ITEM_USER_DATA_MARKER: i16 = -1;
const ITEM_USER_DATA_VERSION: u8 = 1;

/// A network item stack.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemInstance {
    /// Runtime item id. Zero is air, which carries no further fields.
    pub id: i32,
    pub count: u16,
    pub damage: u32,
    pub net_id: Option<i32>,
    pub block_runtime_id: i32,
    pub nbt: Option<Compound>,
    pub can_place_on: Vec<String>,
    pub can_destroy: Vec<String>,
}

impl ItemInstance {
    pub fn air() -> Self {
        Self::default()
    }

    pub fn is_air(&self) -> bool {
        self.id == 0
    }

    fn decode_extra(&mut self, extra: &[u8]) -> Result<(), DecodeError> {
        let mut decoder = Decoder::new(extra);
        let marker = decoder.read_i16_le()?;
        if marker == ITEM_USER_DATA_MARKER {
            let version = decoder.read_u8()?;
            if version != ITEM_USER_DATA_VERSION {
                return Err(DecodeError::InvalidDiscriminant(version.into()));
            }
            self.nbt = nbt::read_root(&mut decoder, nbt::Flavor::BedrockLittleEndian)?;
        } else if marker > 0 {
            let root = decoder.consume_slice(usize::try_from(marker)?)?;
            self.nbt = nbt::read_root(&mut Decoder::new(root), nbt::Flavor::BedrockLittleEndian)?;
        }

        for list in [&mut self.can_place_on, &mut self.can_destroy] {
            let length = usize::try_from(decoder.read_i32_le()?)?;
            decoder.check_collection_length(length)?;
            for _ in 0..length {
                list.push(read_short_string_le(&mut decoder)?);
            }
        }
        // Shield blocking ticks and other trailers are not mirrored.
        decoder.consume_rest();
        Ok(())
    }

    fn encode_extra(&self) -> Vec<u8> {
        let mut extra = Vec::new();
        let mut encoder = Encoder::new(&mut extra);
        match &self.nbt {
            Some(root) => {
                encoder.write_i16_le(ITEM_USER_DATA_MARKER);
                encoder.write_u8(ITEM_USER_DATA_VERSION);
                nbt::write_root(&mut encoder, nbt::Flavor::BedrockLittleEndian, Some(root));
            }
            None => encoder.write_i16_le(0),
        }
        for list in [&self.can_place_on, &self.can_destroy] {
            encoder.write_i32_le(list.len().try_into().unwrap_or(i32::MAX));
            for entry in list {
                write_short_string_le(&mut encoder, entry);
            }
        }
        extra
    }
}

impl Decode for ItemInstance {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let id = decoder.read_zigzag32()?;
        if id == 0 {
            return Ok(Self::air());
        }
        let mut item = Self {
            id,
            count: decoder.read_u16_le()?,
            damage: decoder.read_var_u32()?,
            net_id: if decoder.read_bool()? {
                Some(decoder.read_zigzag32()?)
            } else {
                None
            },
            block_runtime_id: decoder.read_zigzag32()?,
            ..Self::default()
        };
        let extra = decoder.read_byte_array()?;
        item.decode_extra(extra)?;
        Ok(item)
    }
}

impl Encode for ItemInstance {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_zigzag32(self.id);
        if self.is_air() {
            return;
        }
        encoder.write_u16_le(self.count);
        encoder.write_var_u32(self.damage);
        encoder.write_bool(self.net_id.is_some());
        if let Some(net_id) = self.net_id {
            encoder.write_zigzag32(net_id);
        }
        encoder.write_zigzag32(self.block_runtime_id);
        encoder.write_byte_array(&self.encode_extra());
    }
}

/// One typed entity data value.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityDataValue {
    Byte(u8),
    Short(i16),
    Int(i32),
    Float(f32),
    String(String),
    Compound(Compound),
    BlockPosition(BlockPosition),
    Long(i64),
    Vec3(Vec3),
}

impl EntityDataValue {
    fn type_id(&self) -> u32 {
        match self {
            EntityDataValue::Byte(_) => 0,
            EntityDataValue::Short(_) => 1,
            EntityDataValue::Int(_) => 2,
            EntityDataValue::Float(_) => 3,
            EntityDataValue::String(_) => 4,
            EntityDataValue::Compound(_) => 5,
            EntityDataValue::BlockPosition(_) => 6,
            EntityDataValue::Long(_) => 7,
            EntityDataValue::Vec3(_) => 8,
        }
    }
}

/// Entity data keyed by field id. Writes in ascending key order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityDataMap(BTreeMap<u32, EntityDataValue>);

impl EntityDataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any earlier value for the same key.
    pub fn insert(&mut self, key: u32, value: EntityDataValue) {
        self.0.insert(key, value);
    }

    pub fn get(&self, key: u32) -> Option<&EntityDataValue> {
        self.0.get(&key)
    }

    /// Moves all fields of `other` into `self`; later values win.
    pub fn merge(&mut self, other: EntityDataMap) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &EntityDataValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn take(&mut self) -> EntityDataMap {
        std::mem::take(self)
    }
}

impl Decode for EntityDataMap {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let length = usize::try_from(decoder.read_var_u32()?)?;
        decoder.check_collection_length(length)?;
        let mut map = EntityDataMap::new();
        for _ in 0..length {
            let key = decoder.read_var_u32()?;
            let value = match decoder.read_var_u32()? {
                0 => EntityDataValue::Byte(decoder.read_u8()?),
                1 => EntityDataValue::Short(decoder.read_i16_le()?),
                2 => EntityDataValue::Int(decoder.read_zigzag32()?),
                3 => EntityDataValue::Float(decoder.read_f32_le()?),
                4 => EntityDataValue::String(decoder.read_string()?.to_owned()),
                5 => EntityDataValue::Compound(
                    nbt::read_root(decoder, nbt::Flavor::BedrockNetwork)?.unwrap_or_default(),
                ),
                6 => EntityDataValue::BlockPosition(read_signed_block_position(decoder)?),
                7 => EntityDataValue::Long(decoder.read_zigzag64()?),
                8 => EntityDataValue::Vec3(Vec3::decode(decoder)?),
                other => return Err(DecodeError::InvalidDiscriminant(other.into())),
            };
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl Encode for EntityDataMap {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_u32(self.0.len().try_into().unwrap_or(u32::MAX));
        for (key, value) in &self.0 {
            encoder.write_var_u32(*key);
            encoder.write_var_u32(value.type_id());
            match value {
                EntityDataValue::Byte(x) => encoder.write_u8(*x),
                EntityDataValue::Short(x) => encoder.write_i16_le(*x),
                EntityDataValue::Int(x) => {
                    encoder.write_zigzag32(*x);
                }
                EntityDataValue::Float(x) => encoder.write_f32_le(*x),
                EntityDataValue::String(x) => encoder.write_string(x),
                EntityDataValue::Compound(x) => {
                    nbt::write_root(encoder, nbt::Flavor::BedrockNetwork, Some(x))
                }
                EntityDataValue::BlockPosition(position) => {
                    encoder.write_zigzag32(position.x);
                    encoder.write_zigzag32(position.y);
                    encoder.write_zigzag32(position.z);
                }
                EntityDataValue::Long(x) => {
                    encoder.write_zigzag64(*x);
                }
                EntityDataValue::Vec3(x) => x.encode(encoder),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Encode, Decode)]
pub struct IntProperty {
    #[encoding(var_u32)]
    pub index: u32,
    #[encoding(zigzag32)]
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Encode, Decode)]
pub struct FloatProperty {
    #[encoding(var_u32)]
    pub index: u32,
    #[encoding(le)]
    pub value: f32,
}

/// Data-driven entity properties. The bridge never sets any.
#[derive(Debug, Clone, PartialEq, Default, Encode, Decode)]
pub struct PropertySyncData {
    #[encoding(length_prefix = "var_u32")]
    pub int_properties: Vec<IntProperty>,
    #[encoding(length_prefix = "var_u32")]
    pub float_properties: Vec<FloatProperty>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode)]
#[encoding(discriminant = "byte")]
pub enum EntityLinkKind {
    #[encoding(id = 0)]
    Remove,
    #[encoding(id = 1)]
    Rider,
    #[encoding(id = 2)]
    Passenger,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct EntityLink {
    /// Unique id of the vehicle.
    #[encoding(zigzag64)]
    pub from: i64,
    /// Unique id of the rider.
    #[encoding(zigzag64)]
    pub to: i64,
    pub kind: EntityLinkKind,
    pub immediate: bool,
    pub rider_initiated: bool,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct AttributeValue {
    pub name: String,
    #[encoding(le)]
    pub min: f32,
    #[encoding(le)]
    pub value: f32,
    #[encoding(le)]
    pub max: f32,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Experiment {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameRuleValue {
    Bool(bool),
    Int(u32),
    Float(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameRule {
    pub name: String,
    pub editable: bool,
    pub value: GameRuleValue,
}

impl Decode for GameRule {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let name = decoder.read_string()?.to_owned();
        let editable = decoder.read_bool()?;
        let value = match decoder.read_var_u32()? {
            1 => GameRuleValue::Bool(decoder.read_bool()?),
            2 => GameRuleValue::Int(decoder.read_var_u32()?),
            3 => GameRuleValue::Float(decoder.read_f32_le()?),
            other => return Err(DecodeError::InvalidDiscriminant(other.into())),
        };
        Ok(Self {
            name,
            editable,
            value,
        })
    }
}

impl Encode for GameRule {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_string(&self.name);
        encoder.write_bool(self.editable);
        match self.value {
            GameRuleValue::Bool(x) => {
                encoder.write_var_u32(1);
                encoder.write_bool(x);
            }
            GameRuleValue::Int(x) => {
                encoder.write_var_u32(2);
                encoder.write_var_u32(x);
            }
            GameRuleValue::Float(x) => {
                encoder.write_var_u32(3);
                encoder.write_f32_le(x);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ItemState {
    pub name: String,
    #[encoding(le)]
    pub runtime_id: i16,
    pub component_based: bool,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct BlockProperty {
    pub name: String,
    pub definition: NetworkNbt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ChunkCoordinate {
    #[encoding(zigzag32)]
    pub x: i32,
    #[encoding(zigzag32)]
    pub z: i32,
}
