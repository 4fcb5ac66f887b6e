//! Bedrock Edition packets (protocol 630).
//!
//! `client` holds packets sent by the Bedrock client, `server` those sent by
//! the bridge. Packets that travel both ways live here; the client enum owns
//! their ids.

use crate::protocol::{Decode, DecodeError, Decoder, Encode, Encoder};
use bedrock_bridge_macros::{Decode, Encode};

pub mod client;
pub mod server;
pub mod types;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextKind {
    Raw,
    Chat,
    Translation,
    Popup,
    JukeboxPopup,
    Tip,
    System,
    Whisper,
    Announcement,
    Json,
    JsonWhisper,
    JsonAnnouncement,
}

impl TextKind {
    fn from_id(id: u8) -> Result<Self, DecodeError> {
        Ok(match id {
            0 => TextKind::Raw,
            1 => TextKind::Chat,
            2 => TextKind::Translation,
            3 => TextKind::Popup,
            4 => TextKind::JukeboxPopup,
            5 => TextKind::Tip,
            6 => TextKind::System,
            7 => TextKind::Whisper,
            8 => TextKind::Announcement,
            9 => TextKind::Json,
            10 => TextKind::JsonWhisper,
            11 => TextKind::JsonAnnouncement,
            other => return Err(DecodeError::InvalidDiscriminant(other.into())),
        })
    }

    fn id(self) -> u8 {
        self as u8
    }

    fn has_source(self) -> bool {
        matches!(
            self,
            TextKind::Chat | TextKind::Whisper | TextKind::Announcement
        )
    }

    fn has_parameters(self) -> bool {
        matches!(
            self,
            TextKind::Translation | TextKind::Popup | TextKind::JukeboxPopup
        )
    }
}

/// Chat and system text, in both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub kind: TextKind,
    pub needs_translation: bool,
    pub source_name: String,
    pub message: String,
    pub parameters: Vec<String>,
    pub xuid: String,
    pub platform_chat_id: String,
}

impl Text {
    /// A server-originated system line.
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Raw,
            needs_translation: false,
            source_name: String::new(),
            message: message.into(),
            parameters: Vec::new(),
            xuid: String::new(),
            platform_chat_id: String::new(),
        }
    }
}

impl Decode for Text {
    fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let kind = TextKind::from_id(decoder.read_u8()?)?;
        let needs_translation = decoder.read_bool()?;
        let source_name = if kind.has_source() {
            String::decode(decoder)?
        } else {
            String::new()
        };
        let message = String::decode(decoder)?;
        let mut parameters = Vec::new();
        if kind.has_parameters() {
            let length = usize::try_from(decoder.read_var_u32()?)?;
            decoder.check_collection_length(length)?;
            for _ in 0..length {
                parameters.push(String::decode(decoder)?);
            }
        }
        Ok(Self {
            kind,
            needs_translation,
            source_name,
            message,
            parameters,
            xuid: String::decode(decoder)?,
            platform_chat_id: String::decode(decoder)?,
        })
    }
}

impl Encode for Text {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_u8(self.kind.id());
        encoder.write_bool(self.needs_translation);
        if self.kind.has_source() {
            encoder.write_string(&self.source_name);
        }
        encoder.write_string(&self.message);
        if self.kind.has_parameters() {
            encoder.write_var_u32(self.parameters.len().try_into().unwrap_or(u32::MAX));
            for parameter in &self.parameters {
                encoder.write_string(parameter);
            }
        }
        encoder.write_string(&self.xuid);
        encoder.write_string(&self.platform_chat_id);
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ContainerClose {
    pub window_id: u8,
    pub server_initiated: bool,
}

/// Latency measurement. The bridge uses it as an out-of-band ping.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct NetworkStackLatency {
    #[encoding(le)]
    pub timestamp: u64,
    pub needs_response: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_to_vec;

    #[test]
    fn chat_text_carries_its_source() {
        let text = Text {
            kind: TextKind::Chat,
            source_name: "Steve".into(),
            ..Text::system("hello")
        };
        let bytes = encode_to_vec(&text);
        assert_eq!(&bytes[..3], [1, 0, 5]);
        let decoded = Text::decode(&mut Decoder::new(&bytes)).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn unknown_text_kind_is_rejected() {
        assert!(matches!(
            Text::decode(&mut Decoder::new(&[42, 0])),
            Err(DecodeError::InvalidDiscriminant(42))
        ));
    }
}
