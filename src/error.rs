//! Error classes raised while bridging a session.

use crate::{protocol::DecodeError, session::state::LifecycleState};

/// Shown to the player for any failure whose detail must stay in the logs.
pub const REASON_INTERNAL_ERROR: &str = "disconnectionScreen.internalError";
pub const REASON_BAD_PACKET: &str = "disconnectionScreen.badPacket";
pub const REASON_PROTOCOL_ERROR: &str = "disconnect.protocolError";
pub const REASON_SERVER_CLOSED: &str = "disconnectionScreen.disconnected";
pub const REASON_RESOURCES_EXHAUSTED: &str = "disconnectionScreen.serverFull";
pub const REASON_OUTDATED_CLIENT: &str = "disconnectionScreen.outdatedClient";
pub const REASON_RESOURCE_PACK: &str = "disconnectionScreen.resourcePack";

/// A failure while validating the identity chain or agreeing on a key.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("malformed identity chain: {0}")]
    MalformedChain(&'static str),
    #[error("token signature does not verify")]
    InvalidSignature,
    #[error("token key does not match the key announced by the previous token")]
    KeyMismatch,
    #[error("identity chain is not signed by a trusted root")]
    UntrustedChain,
    #[error("token is missing the '{0}' claim")]
    MissingClaim(&'static str),
    #[error("unsupported key or curve")]
    UnsupportedKey,
    #[error("token has expired or is not yet valid")]
    Expired,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}

/// A mirror could not resolve a mapping. The caller substitutes a placeholder.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("unknown item '{0}'")]
    UnknownItem(String),
    #[error("unknown item id {0}")]
    UnknownItemId(i32),
    #[error("unknown block state {0}")]
    UnknownBlockState(i32),
    #[error("unknown entity kind {0}")]
    UnknownEntityKind(i32),
    #[error("entity {0} is not known")]
    UnknownEntity(i32),
    #[error("container {0} is not open")]
    UnknownContainer(i32),
    #[error("slot {slot} is out of range for a container of {size} slots")]
    SlotOutOfRange { slot: usize, size: usize },
}

/// Any reason a session ends.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("malformed packet: {0}")]
    Decode(#[from] DecodeError),
    #[error("packet {packet} is not valid in state {state:?}")]
    ProtocolState {
        packet: String,
        state: LifecycleState,
    },
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
    #[error("client protocol {0} is not supported")]
    UnsupportedVersion(i32),
    #[error("transport closed")]
    TransportClosed,
    #[error("kicked by the server: {0}")]
    Kicked(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BridgeError {
    /// Message shown on the disconnect screen. Never includes internal detail.
    pub fn disconnect_reason(&self) -> &str {
        match self {
            BridgeError::Decode(_) => REASON_BAD_PACKET,
            BridgeError::ProtocolState { .. } => REASON_PROTOCOL_ERROR,
            BridgeError::Auth(_) | BridgeError::Other(_) => REASON_INTERNAL_ERROR,
            BridgeError::ResourceExhausted(_) => REASON_RESOURCES_EXHAUSTED,
            BridgeError::UnsupportedVersion(_) => REASON_OUTDATED_CLIENT,
            BridgeError::TransportClosed => REASON_SERVER_CLOSED,
            BridgeError::Kicked(reason) => reason,
        }
    }

    /// Finds the bridge error inside a handler error, if there is one.
    pub fn classify(error: anyhow::Error) -> BridgeError {
        match error.downcast::<BridgeError>() {
            Ok(bridge) => bridge,
            Err(error) => match error.downcast::<DecodeError>() {
                Ok(decode) => BridgeError::Decode(decode),
                Err(error) => match error.downcast::<AuthError>() {
                    Ok(auth) => BridgeError::Auth(auth),
                    Err(error) => BridgeError::Other(error),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_do_not_leak_detail() {
        let error = BridgeError::Auth(AuthError::InvalidSignature);
        assert_eq!(error.disconnect_reason(), REASON_INTERNAL_ERROR);
    }

    #[test]
    fn handler_errors_are_classified() {
        let error = anyhow::Error::from(DecodeError::VarIntTooLong);
        assert!(matches!(
            BridgeError::classify(error),
            BridgeError::Decode(DecodeError::VarIntTooLong)
        ));
        let error = anyhow::Error::from(AuthError::UntrustedChain);
        assert!(matches!(
            BridgeError::classify(error),
            BridgeError::Auth(AuthError::UntrustedChain)
        ));
    }
}
