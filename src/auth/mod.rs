//! Identity chain validation and the encryption handshake.
//!
//! A Bedrock login carries a chain of tokens, each naming the key that signs
//! the next, followed by a client data token signed by the last identity key.
//! A chain is trusted when one of its signers is a configured root key.

use crate::{error::AuthError, protocol::packet::bedrock::client::ConnectionRequest};
use base64::{engine::general_purpose::STANDARD, Engine};
use p384::ecdsa::VerifyingKey;
use serde::Deserialize;
use serde_json::Value;
use token::Token;
use uuid::Uuid;

pub mod handshake;
pub mod token;

/// Public key that signs identity chains of Xbox-authenticated players.
pub const MOJANG_ROOT_KEY: &str = "MHYwEAYHKoZIzj0CAQYFK4EEACIDYgAECRXueJeTDqNRRgJi/vlRufByu/2G0i2Ebt6YMar5QX/R0DIIyrJMcUpruK4QveTfJSTp3Shlq4Gk34cD/4GUWwkv0DVuzeuB+tXija7HBxii03NHDbPAD0AKnLr2wdAp";

/// Longer chains are rejected outright.
const MAX_CHAIN_LENGTH: usize = 8;

/// The player identity carried by the last token of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub display_name: String,
    pub uuid: Uuid,
    pub xuid: String,
}

/// Self-reported details from the client data token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClientData {
    #[serde(rename = "DeviceOS")]
    pub device_os: i32,
    pub device_model: String,
    pub game_version: String,
    pub language_code: String,
    pub server_address: String,
    pub skin_id: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedLogin {
    pub identity: Identity,
    pub client_data: ClientData,
    /// Key of the final chain token, used for key agreement.
    pub client_key: VerifyingKey,
    pub trusted: bool,
}

/// Root keys a chain may be anchored to.
#[derive(Debug, Clone)]
pub struct TrustedRoots {
    /// DER encodings, compared byte for byte.
    keys: Vec<Vec<u8>>,
    allow_untrusted: bool,
}

impl TrustedRoots {
    /// Parses base64 DER keys; an empty list means the Mojang root.
    pub fn new(keys: &[String], allow_untrusted: bool) -> Result<Self, AuthError> {
        let mut decoded = Vec::new();
        if keys.is_empty() {
            decoded.push(STANDARD.decode(MOJANG_ROOT_KEY)?);
        }
        for key in keys {
            token::decode_key(key)?;
            decoded.push(STANDARD.decode(key)?);
        }
        Ok(Self {
            keys: decoded,
            allow_untrusted,
        })
    }

    pub fn mojang() -> Self {
        Self {
            keys: STANDARD.decode(MOJANG_ROOT_KEY).into_iter().collect(),
            allow_untrusted: false,
        }
    }

    fn contains(&self, encoded: &str) -> bool {
        STANDARD
            .decode(encoded)
            .is_ok_and(|der| self.keys.iter().any(|key| *key == der))
    }
}

#[derive(Deserialize)]
struct Chain {
    chain: Vec<String>,
}

/// Validates the identity chain and the client data token of a login.
///
/// Runs on a blocking thread; signature checks are comparatively slow.
pub fn verify_login(
    request: &ConnectionRequest,
    roots: &TrustedRoots,
) -> Result<VerifiedLogin, AuthError> {
    let Chain { chain } = serde_json::from_str(&request.chain)?;
    if chain.is_empty() {
        return Err(AuthError::MalformedChain("empty chain"));
    }
    if chain.len() > MAX_CHAIN_LENGTH {
        return Err(AuthError::MalformedChain("chain is too long"));
    }

    let now = token::unix_now();
    let mut expected_key: Option<String> = None;
    let mut trusted = false;
    let mut last = None;
    for raw in &chain {
        let token = Token::parse(raw)?;
        // The first token announces its own signer.
        let signer = expected_key.take().unwrap_or_else(|| token.header.x5u.clone());
        if token.header.x5u != signer {
            return Err(AuthError::KeyMismatch);
        }
        token.verify(&token::decode_key(&signer)?)?;
        token.check_time(now)?;
        trusted |= roots.contains(&signer);
        expected_key = Some(token.claim_str("identityPublicKey")?.to_owned());
        last = Some(token);
    }
    let (Some(last), Some(identity_key)) = (last, expected_key) else {
        return Err(AuthError::MalformedChain("empty chain"));
    };

    if !trusted {
        if !roots.allow_untrusted {
            return Err(AuthError::UntrustedChain);
        }
        tracing::warn!("Accepting an identity chain without a trusted root");
    }

    let identity = identity_of(&last)?;
    let client_key = token::decode_key(&identity_key)?;

    let client_token = Token::parse(&request.client_data)?;
    if client_token.header.x5u != identity_key {
        return Err(AuthError::KeyMismatch);
    }
    client_token.verify(&client_key)?;
    let client_data = serde_json::from_value(client_token.claims)?;

    Ok(VerifiedLogin {
        identity,
        client_data,
        client_key,
        trusted,
    })
}

fn identity_of(token: &Token) -> Result<Identity, AuthError> {
    let extra = token
        .claims
        .get("extraData")
        .filter(|extra| extra.is_object())
        .ok_or(AuthError::MissingClaim("extraData"))?;
    let field = |name: &'static str| {
        extra
            .get(name)
            .and_then(Value::as_str)
            .ok_or(AuthError::MissingClaim(name))
    };
    let uuid = Uuid::parse_str(field("identity")?)
        .map_err(|_| AuthError::MalformedChain("identity is not a UUID"))?;
    Ok(Identity {
        display_name: field("displayName")?.to_owned(),
        uuid,
        // Offline chains carry no XUID.
        xuid: field("XUID").unwrap_or_default().to_owned(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use p384::{ecdsa::SigningKey, PublicKey};
    use rand::rngs::OsRng;
    use serde_json::json;

    /// A login with a root-signed chain for `name`.
    pub(crate) struct TestLogin {
        pub root: SigningKey,
        pub client: SigningKey,
        pub request: ConnectionRequest,
    }

    fn encoded(key: &SigningKey) -> String {
        token::encode_key(&PublicKey::from(key.verifying_key())).unwrap()
    }

    pub(crate) fn signed_login(name: &str) -> TestLogin {
        let root = SigningKey::random(&mut OsRng);
        let client = SigningKey::random(&mut OsRng);
        // The client self-signs a token handing over to the root, which then
        // vouches for the client key.
        let first = token::encode_token(
            &json!({ "identityPublicKey": encoded(&root), "certificateAuthority": true }),
            &client,
        )
        .unwrap();
        let second = token::encode_token(
            &json!({
                "identityPublicKey": encoded(&client),
                "extraData": {
                    "displayName": name,
                    "identity": "8b1a9953-c461-3296-a827-abf8c47804d7",
                    "XUID": "2535400000000000",
                },
            }),
            &root,
        )
        .unwrap();
        let client_data = token::encode_token(
            &json!({ "GameVersion": "1.20.50", "LanguageCode": "en_US", "DeviceOS": 7 }),
            &client,
        )
        .unwrap();
        let request = ConnectionRequest {
            chain: json!({ "chain": [first, second] }).to_string(),
            client_data,
        };
        TestLogin {
            root,
            client,
            request,
        }
    }

    pub(crate) fn roots_for(login: &TestLogin) -> TrustedRoots {
        TrustedRoots::new(&[encoded(&login.root)], false).unwrap()
    }

    #[test]
    fn a_rooted_chain_verifies() {
        let login = signed_login("Steve");
        let verified = verify_login(&login.request, &roots_for(&login)).unwrap();
        assert!(verified.trusted);
        assert_eq!(verified.identity.display_name, "Steve");
        assert_eq!(verified.identity.xuid, "2535400000000000");
        assert_eq!(verified.client_data.language_code, "en_US");
        assert_eq!(verified.client_key, *login.client.verifying_key());
    }

    #[test]
    fn unknown_roots_are_untrusted() {
        let login = signed_login("Steve");
        assert!(matches!(
            verify_login(&login.request, &TrustedRoots::mojang()),
            Err(AuthError::UntrustedChain)
        ));
        let lenient = TrustedRoots::new(&[], true).unwrap();
        assert!(!verify_login(&login.request, &lenient).unwrap().trusted);
    }

    #[test]
    fn a_tampered_final_token_is_rejected() {
        let mut login = signed_login("Steve");
        let chain: Value = serde_json::from_str(&login.request.chain).unwrap();
        let last = chain["chain"][1].as_str().unwrap();
        let mut parts: Vec<String> = last.split('.').map(str::to_owned).collect();
        let mut claims: Value =
            serde_json::from_slice(&base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(&parts[1]).unwrap())
                .unwrap();
        claims["extraData"]["displayName"] = json!("Notch");
        parts[1] = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&claims).unwrap());
        login.request.chain = json!({ "chain": [chain["chain"][0], parts.join(".")] }).to_string();

        assert!(matches!(
            verify_login(&login.request, &roots_for(&login)),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn client_data_must_be_signed_by_the_identity_key() {
        let mut login = signed_login("Steve");
        let stranger = SigningKey::random(&mut OsRng);
        login.request.client_data = token::encode_token(&json!({}), &stranger).unwrap();
        assert!(matches!(
            verify_login(&login.request, &roots_for(&login)),
            Err(AuthError::KeyMismatch)
        ));
    }

    #[test]
    fn the_mojang_key_parses() {
        token::decode_key(MOJANG_ROOT_KEY).unwrap();
    }
}
