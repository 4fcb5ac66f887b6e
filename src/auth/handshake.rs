//! Key agreement for the encrypted Bedrock transport.

use super::token;
use crate::error::AuthError;
use base64::{engine::general_purpose::STANDARD, Engine};
use p384::{
    ecdh::diffie_hellman,
    ecdsa::{SigningKey, VerifyingKey},
    PublicKey, SecretKey,
};
use rand::{rngs::OsRng, RngCore};
use serde_json::json;
use sha2::{Digest, Sha256};

pub const SALT_LENGTH: usize = 16;

/// What the server sends and keeps after agreeing on a key.
pub struct ServerHandshake {
    /// Body of the `ServerToClientHandshake` packet.
    pub token: String,
    /// AES-256 key for both directions.
    pub key: [u8; 32],
}

impl std::fmt::Debug for ServerHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandshake")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Agrees on a key with `client_key` using a fresh server key pair.
pub fn begin(client_key: &VerifyingKey) -> Result<ServerHandshake, AuthError> {
    let secret = SecretKey::random(&mut OsRng);
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(&secret, &PublicKey::from(client_key), &salt);
    let signing = SigningKey::from(&secret);
    let token = token::encode_token(&json!({ "salt": STANDARD.encode(salt) }), &signing)?;
    Ok(ServerHandshake { token, key })
}

/// `SHA-256(salt ‖ ECDH(secret, peer))`.
pub fn derive_key(secret: &SecretKey, peer: &PublicKey, salt: &[u8]) -> [u8; 32] {
    let shared = diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
    Sha256::new()
        .chain_update(salt)
        .chain_update(shared.raw_secret_bytes())
        .finalize()
        .into()
}
