//! Compact JWS tokens signed with ES384.

use crate::error::AuthError;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use p384::{
    ecdsa::{
        signature::{Signer, Verifier},
        Signature, SigningKey, VerifyingKey,
    },
    pkcs8::{DecodePublicKey, EncodePublicKey},
    PublicKey,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

pub const ALGORITHM: &str = "ES384";

/// Clock skew tolerated on `exp` and `nbf`.
const CLOCK_LEEWAY_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    /// Base64 DER public key of the signer.
    pub x5u: String,
}

/// A parsed token whose signature has not been checked yet.
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub header: Header,
    pub claims: Value,
    signing_input: &'a str,
    signature: Vec<u8>,
}

impl<'a> Token<'a> {
    pub fn parse(token: &'a str) -> Result<Self, AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedChain("token does not have three parts"));
        };
        let signing_input = &token[..header.len() + 1 + claims.len()];

        let header: Header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header)?)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::UnsupportedKey);
        }
        let claims: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims)?)?;
        if !claims.is_object() {
            return Err(AuthError::MalformedChain("token claims are not an object"));
        }
        Ok(Self {
            header,
            claims,
            signing_input,
            signature: URL_SAFE_NO_PAD.decode(signature)?,
        })
    }

    /// The key this token claims to be signed with.
    pub fn signer(&self) -> Result<VerifyingKey, AuthError> {
        decode_key(&self.header.x5u)
    }

    pub fn verify(&self, key: &VerifyingKey) -> Result<(), AuthError> {
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| AuthError::InvalidSignature)?;
        key.verify(self.signing_input.as_bytes(), &signature)
            .map_err(|_| AuthError::InvalidSignature)
    }

    /// Rejects tokens outside their validity window. Missing bounds pass.
    pub fn check_time(&self, now: i64) -> Result<(), AuthError> {
        if let Some(exp) = self.claims.get("exp").and_then(Value::as_i64) {
            if now > exp + CLOCK_LEEWAY_SECS {
                return Err(AuthError::Expired);
            }
        }
        if let Some(nbf) = self.claims.get("nbf").and_then(Value::as_i64) {
            if now + CLOCK_LEEWAY_SECS < nbf {
                return Err(AuthError::Expired);
            }
        }
        Ok(())
    }

    pub fn claim_str(&self, name: &'static str) -> Result<&str, AuthError> {
        self.claims
            .get(name)
            .and_then(Value::as_str)
            .ok_or(AuthError::MissingClaim(name))
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// Parses a base64 DER (SubjectPublicKeyInfo) P-384 key.
pub fn decode_key(encoded: &str) -> Result<VerifyingKey, AuthError> {
    let der = STANDARD.decode(encoded)?;
    VerifyingKey::from_public_key_der(&der).map_err(|_| AuthError::UnsupportedKey)
}

pub fn encode_key(key: &PublicKey) -> Result<String, AuthError> {
    let der = key
        .to_public_key_der()
        .map_err(|_| AuthError::UnsupportedKey)?;
    Ok(STANDARD.encode(der.as_bytes()))
}

/// Signs `claims` into a compact token announcing the signer's key.
pub fn encode_token(claims: &Value, key: &SigningKey) -> Result<String, AuthError> {
    let header = Header {
        alg: ALGORITHM.to_owned(),
        x5u: encode_key(&PublicKey::from(key.verifying_key()))?,
    };
    let mut token = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?)
    );
    let signature: Signature = key.sign(token.as_bytes());
    token.push('.');
    token.push_str(&URL_SAFE_NO_PAD.encode(signature.to_bytes()));
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use serde_json::json;

    #[test]
    fn signed_tokens_verify() {
        let key = SigningKey::random(&mut OsRng);
        let token = encode_token(&json!({ "hello": "world" }), &key).unwrap();
        let parsed = Token::parse(&token).unwrap();
        parsed.verify(&parsed.signer().unwrap()).unwrap();
        assert_eq!(parsed.claim_str("hello").unwrap(), "world");
        assert!(matches!(parsed.claim_str("missing"), Err(AuthError::MissingClaim("missing"))));
    }

    #[test]
    fn tampered_claims_fail() {
        let key = SigningKey::random(&mut OsRng);
        let token = encode_token(&json!({ "name": "Steve" }), &key).unwrap();
        let mut parts: Vec<_> = token.split('.').map(str::to_owned).collect();
        parts[1] = URL_SAFE_NO_PAD.encode(br#"{"name":"Alex"}"#);
        let tampered = parts.join(".");
        let parsed = Token::parse(&tampered).unwrap();
        assert!(matches!(
            parsed.verify(&parsed.signer().unwrap()),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn expiry_is_checked_with_leeway() {
        let key = SigningKey::random(&mut OsRng);
        let token = encode_token(&json!({ "exp": 1000, "nbf": 900 }), &key).unwrap();
        let parsed = Token::parse(&token).unwrap();
        assert!(parsed.check_time(950).is_ok());
        assert!(parsed.check_time(1050).is_ok());
        assert!(matches!(parsed.check_time(2000), Err(AuthError::Expired)));
        assert!(matches!(parsed.check_time(100), Err(AuthError::Expired)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            Token::parse("only.two"),
            Err(AuthError::MalformedChain(_))
        ));
        assert!(Token::parse("a.b.c").is_err());
    }
}
