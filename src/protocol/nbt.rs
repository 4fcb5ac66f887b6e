//! Compound tag trees in the three wire flavors the bridge meets.
//!
//! Compounds keep insertion order so a decoded tree re-encodes byte for byte.

use crate::protocol::{DecodeError, Decoder, Encoder};

const MAX_DEPTH: usize = 512;

pub const TAG_END: u8 = 0;
pub const TAG_BYTE: u8 = 1;
pub const TAG_SHORT: u8 = 2;
pub const TAG_INT: u8 = 3;
pub const TAG_LONG: u8 = 4;
pub const TAG_FLOAT: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_BYTE_ARRAY: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_LIST: u8 = 9;
pub const TAG_COMPOUND: u8 = 10;
pub const TAG_INT_ARRAY: u8 = 11;
pub const TAG_LONG_ARRAY: u8 = 12;

/// Byte layout of a tag tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flavor {
    /// Big-endian, u16 string lengths, nameless root.
    Java,
    /// Little-endian with var-int lengths and ZigZag ints/longs.
    BedrockNetwork,
    /// Little-endian fixed width, u16 string lengths.
    BedrockLittleEndian,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(List),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn tag_type(&self) -> u8 {
        match self {
            Tag::Byte(_) => TAG_BYTE,
            Tag::Short(_) => TAG_SHORT,
            Tag::Int(_) => TAG_INT,
            Tag::Long(_) => TAG_LONG,
            Tag::Float(_) => TAG_FLOAT,
            Tag::Double(_) => TAG_DOUBLE,
            Tag::ByteArray(_) => TAG_BYTE_ARRAY,
            Tag::String(_) => TAG_STRING,
            Tag::List(_) => TAG_LIST,
            Tag::Compound(_) => TAG_COMPOUND,
            Tag::IntArray(_) => TAG_INT_ARRAY,
            Tag::LongArray(_) => TAG_LONG_ARRAY,
        }
    }

    /// Numeric value widened to i64, for tags whose width varies
    /// between protocol versions.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Tag::Byte(x) => Some(i64::from(*x)),
            Tag::Short(x) => Some(i64::from(*x)),
            Tag::Int(x) => Some(i64::from(*x)),
            Tag::Long(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Tag::List(l) => Some(l),
            _ => None,
        }
    }
}

/// A homogeneous list. An empty list carries the end tag as element type.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    element_type: u8,
    items: Vec<Tag>,
}

impl Default for List {
    fn default() -> Self {
        Self {
            element_type: TAG_END,
            items: Vec::new(),
        }
    }
}

impl List {
    /// Builds a list, taking the element type from the first item.
    /// Items of any other type are discarded.
    pub fn new(items: Vec<Tag>) -> Self {
        let Some(element_type) = items.first().map(Tag::tag_type) else {
            return Self::default();
        };
        let items = items
            .into_iter()
            .filter(|item| item.tag_type() == element_type)
            .collect();
        Self {
            element_type,
            items,
        }
    }

    pub fn element_type(&self) -> u8 {
        self.element_type
    }

    pub fn items(&self) -> &[Tag] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.items.iter()
    }

    pub fn compounds(&self) -> impl Iterator<Item = &Compound> {
        self.items.iter().filter_map(Tag::as_compound)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An insertion-ordered string-keyed map of tags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, tag)| tag)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Tag> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == key)
            .map(|(_, tag)| tag)
    }

    /// Inserts a tag. An existing entry with the same name is replaced
    /// in place, keeping its position.
    pub fn insert(&mut self, key: impl Into<String>, tag: Tag) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(existing) => *existing = tag,
            None => self.entries.push((key, tag)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Tag> {
        let index = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(name, tag)| (name.as_str(), tag))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Tag::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Tag::as_str)
    }

    pub fn get_compound(&self, key: &str) -> Option<&Compound> {
        self.get(key).and_then(Tag::as_compound)
    }

    pub fn get_list(&self, key: &str) -> Option<&List> {
        self.get(key).and_then(Tag::as_list)
    }

    /// Removes and returns a nested compound.
    pub fn take_compound(&mut self, key: &str) -> Option<Compound> {
        match self.get(key) {
            Some(Tag::Compound(_)) => match self.remove(key) {
                Some(Tag::Compound(c)) => Some(c),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<T: IntoIterator<Item = (String, Tag)>>(iter: T) -> Self {
        let mut compound = Compound::new();
        for (key, tag) in iter {
            compound.insert(key, tag);
        }
        compound
    }
}

/// Reads a root compound. A lone end tag decodes as `None`.
///
/// Java roots are nameless; Bedrock roots carry a (usually empty) name
/// which is discarded.
pub fn read_root(decoder: &mut Decoder, flavor: Flavor) -> Result<Option<Compound>, DecodeError> {
    let tag_type = decoder.read_u8()?;
    match tag_type {
        TAG_END => Ok(None),
        TAG_COMPOUND => {
            let mut reader = Reader { decoder, flavor };
            if flavor != Flavor::Java {
                reader.read_string()?;
            }
            reader.read_compound(0).map(Some)
        }
        other => Err(DecodeError::UnknownTag(other)),
    }
}

/// Writes a root compound, or a lone end tag for `None`.
pub fn write_root(encoder: &mut Encoder, flavor: Flavor, root: Option<&Compound>) {
    let Some(root) = root else {
        encoder.write_u8(TAG_END);
        return;
    };
    encoder.write_u8(TAG_COMPOUND);
    let mut writer = Writer { encoder, flavor };
    if flavor != Flavor::Java {
        writer.write_string("");
    }
    writer.write_compound(root);
}

/// Reads a nameless Java root of any tag type. Text components travel
/// this way and are often a bare string tag.
pub fn read_network_tag(decoder: &mut Decoder) -> Result<Option<Tag>, DecodeError> {
    let tag_type = decoder.read_u8()?;
    if tag_type == TAG_END {
        return Ok(None);
    }
    let mut reader = Reader {
        decoder,
        flavor: Flavor::Java,
    };
    reader.read_payload(tag_type, 0).map(Some)
}

pub fn write_network_tag(encoder: &mut Encoder, tag: Option<&Tag>) {
    let Some(tag) = tag else {
        encoder.write_u8(TAG_END);
        return;
    };
    encoder.write_u8(tag.tag_type());
    Writer {
        encoder,
        flavor: Flavor::Java,
    }
    .write_payload(tag);
}

/// Convenience for encoding a root into a fresh buffer.
pub fn to_bytes(flavor: Flavor, root: &Compound) -> Vec<u8> {
    let mut buf = Vec::new();
    write_root(&mut Encoder::new(&mut buf), flavor, Some(root));
    buf
}

struct Reader<'d, 'a> {
    decoder: &'d mut Decoder<'a>,
    flavor: Flavor,
}

impl Reader<'_, '_> {
    fn read_string(&mut self) -> Result<String, DecodeError> {
        let length = match self.flavor {
            Flavor::Java => usize::from(self.decoder.read_u16()?),
            Flavor::BedrockNetwork => usize::try_from(self.decoder.read_var_u32()?)?,
            Flavor::BedrockLittleEndian => usize::from(self.decoder.read_u16_le()?),
        };
        let bytes = self.decoder.consume_slice(length)?;
        Ok(std::str::from_utf8(bytes)?.to_owned())
    }

    fn read_short(&mut self) -> Result<i16, DecodeError> {
        match self.flavor {
            Flavor::Java => self.decoder.read_i16(),
            _ => self.decoder.read_i16_le(),
        }
    }

    fn read_int(&mut self) -> Result<i32, DecodeError> {
        match self.flavor {
            Flavor::Java => self.decoder.read_i32(),
            Flavor::BedrockNetwork => self.decoder.read_zigzag32(),
            Flavor::BedrockLittleEndian => self.decoder.read_i32_le(),
        }
    }

    fn read_long(&mut self) -> Result<i64, DecodeError> {
        match self.flavor {
            Flavor::Java => self.decoder.read_i64(),
            Flavor::BedrockNetwork => self.decoder.read_zigzag64(),
            Flavor::BedrockLittleEndian => self.decoder.read_i64_le(),
        }
    }

    fn read_length(&mut self) -> Result<usize, DecodeError> {
        let length = usize::try_from(self.read_int()?)?;
        self.decoder.check_collection_length(length)?;
        Ok(length)
    }

    fn read_payload(&mut self, tag_type: u8, depth: usize) -> Result<Tag, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TagTooDeep(MAX_DEPTH));
        }
        let tag = match tag_type {
            TAG_BYTE => Tag::Byte(self.decoder.read_i8()?),
            TAG_SHORT => Tag::Short(self.read_short()?),
            TAG_INT => Tag::Int(self.read_int()?),
            TAG_LONG => Tag::Long(self.read_long()?),
            TAG_FLOAT => Tag::Float(match self.flavor {
                Flavor::Java => self.decoder.read_f32()?,
                _ => self.decoder.read_f32_le()?,
            }),
            TAG_DOUBLE => Tag::Double(match self.flavor {
                Flavor::Java => self.decoder.read_f64()?,
                _ => self.decoder.read_f64_le()?,
            }),
            TAG_BYTE_ARRAY => {
                let length = self.read_length()?;
                let bytes = self.decoder.consume_slice(length)?;
                Tag::ByteArray(bytes.iter().map(|&b| bytemuck::cast(b)).collect())
            }
            TAG_STRING => Tag::String(self.read_string()?),
            TAG_LIST => {
                let element_type = self.decoder.read_u8()?;
                let length = self.read_length()?;
                if element_type == TAG_END && length > 0 {
                    return Err(DecodeError::UnknownTag(TAG_END));
                }
                let mut items = Vec::with_capacity(length);
                for _ in 0..length {
                    items.push(self.read_payload(element_type, depth + 1)?);
                }
                Tag::List(List {
                    element_type,
                    items,
                })
            }
            TAG_COMPOUND => Tag::Compound(self.read_compound(depth + 1)?),
            TAG_INT_ARRAY => {
                let length = self.read_length()?;
                let mut values = Vec::with_capacity(length);
                for _ in 0..length {
                    values.push(self.read_int()?);
                }
                Tag::IntArray(values)
            }
            TAG_LONG_ARRAY => {
                let length = self.read_length()?;
                let mut values = Vec::with_capacity(length);
                for _ in 0..length {
                    values.push(self.read_long()?);
                }
                Tag::LongArray(values)
            }
            other => return Err(DecodeError::UnknownTag(other)),
        };
        Ok(tag)
    }

    fn read_compound(&mut self, depth: usize) -> Result<Compound, DecodeError> {
        let mut compound = Compound::new();
        loop {
            let tag_type = self.decoder.read_u8()?;
            if tag_type == TAG_END {
                return Ok(compound);
            }
            let name = self.read_string()?;
            let tag = self.read_payload(tag_type, depth)?;
            compound.insert(name, tag);
        }
    }
}

struct Writer<'e, 'a> {
    encoder: &'e mut Encoder<'a>,
    flavor: Flavor,
}

impl Writer<'_, '_> {
    fn write_string(&mut self, s: &str) {
        match self.flavor {
            Flavor::Java => self.encoder.write_u16(s.len().try_into().unwrap_or(u16::MAX)),
            Flavor::BedrockNetwork => {
                self.encoder.write_var_u32(s.len().try_into().unwrap_or(u32::MAX));
            }
            Flavor::BedrockLittleEndian => self
                .encoder
                .write_u16_le(s.len().try_into().unwrap_or(u16::MAX)),
        }
        self.encoder.write_slice(s.as_bytes());
    }

    fn write_int(&mut self, x: i32) {
        match self.flavor {
            Flavor::Java => self.encoder.write_i32(x),
            Flavor::BedrockNetwork => {
                self.encoder.write_zigzag32(x);
            }
            Flavor::BedrockLittleEndian => self.encoder.write_i32_le(x),
        }
    }

    fn write_long(&mut self, x: i64) {
        match self.flavor {
            Flavor::Java => self.encoder.write_i64(x),
            Flavor::BedrockNetwork => {
                self.encoder.write_zigzag64(x);
            }
            Flavor::BedrockLittleEndian => self.encoder.write_i64_le(x),
        }
    }

    fn write_length(&mut self, length: usize) {
        self.write_int(length.try_into().unwrap_or(i32::MAX));
    }

    fn write_payload(&mut self, tag: &Tag) {
        let java = self.flavor == Flavor::Java;
        match tag {
            Tag::Byte(x) => self.encoder.write_i8(*x),
            Tag::Short(x) if java => self.encoder.write_i16(*x),
            Tag::Short(x) => self.encoder.write_i16_le(*x),
            Tag::Int(x) => self.write_int(*x),
            Tag::Long(x) => self.write_long(*x),
            Tag::Float(x) if java => self.encoder.write_f32(*x),
            Tag::Float(x) => self.encoder.write_f32_le(*x),
            Tag::Double(x) if java => self.encoder.write_f64(*x),
            Tag::Double(x) => self.encoder.write_f64_le(*x),
            Tag::ByteArray(bytes) => {
                self.write_length(bytes.len());
                for &b in bytes {
                    self.encoder.write_i8(b);
                }
            }
            Tag::String(s) => self.write_string(s),
            Tag::List(list) => {
                self.encoder.write_u8(list.element_type);
                self.write_length(list.items.len());
                for item in &list.items {
                    self.write_payload(item);
                }
            }
            Tag::Compound(compound) => self.write_compound(compound),
            Tag::IntArray(values) => {
                self.write_length(values.len());
                for &x in values {
                    self.write_int(x);
                }
            }
            Tag::LongArray(values) => {
                self.write_length(values.len());
                for &x in values {
                    self.write_long(x);
                }
            }
        }
    }

    fn write_compound(&mut self, compound: &Compound) {
        for (name, tag) in &compound.entries {
            self.encoder.write_u8(tag.tag_type());
            self.write_string(name);
            self.write_payload(tag);
        }
        self.encoder.write_u8(TAG_END);
    }
}
