//! Whole sessions driven through in-memory transports: a scripted Bedrock
//! client on the front and a scripted Java server on the back.

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine};
use bedrock_bridge::{
    auth::{handshake, token},
    catalog::Catalog,
    config::Config,
    error::BridgeError,
    persistence::TrackedPositionRegistry,
    protocol::{
        bedrock_codec::{BatchCipher, BedrockCodec},
        packet::{
            bedrock::{
                client::{
                    ClientToServerHandshake, ConnectionRequest, Login, RequestNetworkSettings,
                    ResourcePackClientResponse, ResourcePackStatus,
                },
                server::{
                    BiomeDefinitionList, ChunkRadiusUpdated, Disconnect, NetworkSettings, PlayStatus,
                    ResourcePackStack, ResourcePacksInfo, ServerToClientHandshake, StartGame,
                },
            },
            java::{
                client::{
                    configuration::{ClientInformation, FinishConfiguration as FinishAcknowledged},
                    handshake::Handshake,
                    login::{LoginAcknowledged, LoginStart},
                    play::{ConfirmTeleportation, KeepAlive as KeepAliveReply},
                },
                server::{
                    configuration::FinishConfiguration,
                    login::LoginSuccess,
                    play::{self, KeepAlive, SynchronizePlayerPosition},
                },
                TextComponent,
            },
        },
        vanilla_codec::VanillaCodec,
        Decode, Encode, PacketId, RawPacket, BEDROCK_PROTOCOL_VERSION, JAVA_PROTOCOL_VERSION,
    },
    session::{actor, Services},
    transport::{BackConnector, Channel},
};
use futures::future::BoxFuture;
use p384::{ecdsa::SigningKey, PublicKey, SecretKey};
use rand::rngs::OsRng;
use serde_json::json;
use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Hands the bridge one end of an in-memory Java connection.
struct ScriptedServer {
    channel: Mutex<Option<Channel>>,
}

impl BackConnector for ScriptedServer {
    fn connect(&self, _cancel: CancellationToken) -> BoxFuture<'static, anyhow::Result<Channel>> {
        let channel = self.channel.lock().unwrap().take();
        Box::pin(async move { channel.context("connected twice") })
    }

    fn address(&self) -> (String, u16) {
        ("java.test".to_owned(), 25565)
    }
}

struct BedrockClient {
    channel: Channel,
    codec: BedrockCodec,
    inbox: VecDeque<RawPacket>,
}

impl BedrockClient {
    async fn send<P: Encode + PacketId>(&mut self, packet: &P) {
        let bytes = BedrockCodec::packet_bytes(packet);
        let frame = self.codec.encode_batch([bytes.as_slice()]).unwrap();
        self.channel.send(frame).await.unwrap();
    }

    async fn next(&mut self) -> Option<RawPacket> {
        loop {
            if let Some(packet) = self.inbox.pop_front() {
                return Some(packet);
            }
            let frame = timeout(STEP_TIMEOUT, self.channel.recv()).await.unwrap()?;
            self.inbox.extend(self.codec.decode_batch(&frame).unwrap());
        }
    }

    /// Skips packets until one of type `P` arrives.
    async fn expect<P: Decode + PacketId>(&mut self) -> P {
        loop {
            let packet = self.next().await.expect("bridge hung up");
            if packet.id == P::ID {
                return packet.decode().unwrap();
            }
        }
    }
}

struct JavaServer {
    channel: Channel,
    codec: VanillaCodec,
}

impl JavaServer {
    async fn send<P: Encode + PacketId>(&self, packet: &P) {
        let bytes = VanillaCodec::new().encode_packet(packet).unwrap();
        self.channel.send(bytes).await.unwrap();
    }

    async fn next(&mut self) -> RawPacket {
        loop {
            if let Some(packet) = self.codec.decode_packet().unwrap() {
                return packet;
            }
            let bytes = timeout(STEP_TIMEOUT, self.channel.recv())
                .await
                .unwrap()
                .expect("bridge hung up");
            self.codec.give_data(&bytes);
        }
    }

    async fn expect<P: Decode + PacketId>(&mut self) -> P {
        let packet = self.next().await;
        assert_eq!(packet.id, P::ID, "expected {}", P::NAME);
        packet.decode().unwrap()
    }
}

/// A chain for `Steve` anchored at `root`, with the client key last.
fn login_request(root: &SigningKey, client: &SigningKey) -> ConnectionRequest {
    let encoded = |key: &SigningKey| token::encode_key(&PublicKey::from(key.verifying_key())).unwrap();
    let first = token::encode_token(
        &json!({ "identityPublicKey": encoded(root), "certificateAuthority": true }),
        client,
    )
    .unwrap();
    let second = token::encode_token(
        &json!({
            "identityPublicKey": encoded(client),
            "extraData": {
                "displayName": "Steve",
                "identity": "8b1a9953-c461-3296-a827-abf8c47804d7",
                "XUID": "2535400000000000",
            },
        }),
        root,
    )
    .unwrap();
    let client_data = token::encode_token(
        &json!({ "GameVersion": "1.20.50", "LanguageCode": "en_US", "DeviceOS": 7 }),
        client,
    )
    .unwrap();
    ConnectionRequest {
        chain: json!({ "chain": [first, second] }).to_string(),
        client_data,
    }
}

struct Bridge {
    client: BedrockClient,
    server: Option<Channel>,
    session: JoinHandle<Option<BridgeError>>,
}

fn start(config: Config) -> Bridge {
    let (bridge_back, server) = Channel::pair();
    let connector = Arc::new(ScriptedServer {
        channel: Mutex::new(Some(bridge_back)),
    });
    let services = Services::new(
        Arc::new(config),
        Catalog::builtin().into_shared(),
        Arc::new(TrackedPositionRegistry::in_memory()),
        connector,
    )
    .unwrap();

    let (bridge_front, client) = Channel::pair();
    let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
    let session = tokio::spawn(actor::run(services, bridge_front, peer, CancellationToken::new()));
    Bridge {
        client: BedrockClient {
            channel: client,
            codec: BedrockCodec::new(),
            inbox: VecDeque::new(),
        },
        server: Some(server),
        session,
    }
}

async fn negotiate_settings(client: &mut BedrockClient) {
    client
        .send(&RequestNetworkSettings {
            protocol_version: BEDROCK_PROTOCOL_VERSION,
        })
        .await;
    let settings: NetworkSettings = client.expect().await;
    client.codec.enable_compression(settings.compression_threshold);
}

fn join_packet() -> play::Login {
    play::Login {
        entity_id: 17,
        is_hardcore: false,
        dimension_names: vec!["minecraft:overworld".to_owned()],
        max_players: 20,
        view_distance: 10,
        simulation_distance: 10,
        reduced_debug_info: false,
        enable_respawn_screen: true,
        do_limited_crafting: false,
        dimension_type: "minecraft:overworld".to_owned(),
        dimension_name: "minecraft:overworld".to_owned(),
        hashed_seed: 0,
        game_mode: 0,
        previous_game_mode: -1,
        is_debug: false,
        is_flat: false,
        death_location: None,
        portal_cooldown: 0,
    }
}

#[tokio::test]
async fn a_client_logs_in_spawns_and_is_kicked() {
    let root = SigningKey::random(&mut OsRng);
    let client_secret = SecretKey::random(&mut OsRng);
    let client_key = SigningKey::from(&client_secret);

    let mut config = Config::default();
    config.auth.trusted_root_keys =
        vec![token::encode_key(&PublicKey::from(root.verifying_key())).unwrap()];
    let mut bridge = start(config);
    let client = &mut bridge.client;

    negotiate_settings(client).await;
    client
        .send(&Login {
            protocol_version: BEDROCK_PROTOCOL_VERSION,
            request: login_request(&root, &client_key),
        })
        .await;

    let ServerToClientHandshake { token: raw } = client.expect().await;
    let handshake_token = token::Token::parse(&raw).unwrap();
    let server_key = handshake_token.signer().unwrap();
    handshake_token.verify(&server_key).unwrap();
    let salt = STANDARD
        .decode(handshake_token.claim_str("salt").unwrap())
        .unwrap();
    let key = handshake::derive_key(&client_secret, &PublicKey::from(&server_key), &salt);
    client.codec.enable_encryption(BatchCipher::new(key)).unwrap();

    client.send(&ClientToServerHandshake {}).await;
    assert_eq!(client.expect::<PlayStatus>().await, PlayStatus::LoginSuccess);
    let info: ResourcePacksInfo = client.expect().await;
    assert!(info.resource_packs.is_empty());

    client
        .send(&ResourcePackClientResponse {
            status: ResourcePackStatus::HaveAllPacks,
            pack_ids: Vec::new(),
        })
        .await;
    client.expect::<ResourcePackStack>().await;
    client
        .send(&ResourcePackClientResponse {
            status: ResourcePackStatus::Completed,
            pack_ids: Vec::new(),
        })
        .await;

    let mut server = JavaServer {
        channel: bridge.server.take().unwrap(),
        codec: VanillaCodec::new(),
    };
    let java_handshake: Handshake = server.expect().await;
    assert_eq!(java_handshake.protocol_version, JAVA_PROTOCOL_VERSION);
    assert_eq!(java_handshake.server_address, "java.test");
    let start: LoginStart = server.expect().await;
    assert_eq!(start.name, "Steve");

    server
        .send(&LoginSuccess {
            uuid: start.uuid,
            username: start.name,
            properties: Vec::new(),
        })
        .await;
    server.expect::<LoginAcknowledged>().await;
    let information: ClientInformation = server.expect().await;
    assert_eq!(information.locale, "en_us");

    server.send(&FinishConfiguration {}).await;
    server.expect::<FinishAcknowledged>().await;

    server.send(&join_packet()).await;
    let start_game: StartGame = client.expect().await;
    assert_eq!(start_game.player_game_mode, 0);
    client.expect::<BiomeDefinitionList>().await;
    client.expect::<ChunkRadiusUpdated>().await;

    server
        .send(&SynchronizePlayerPosition {
            x: 0.5,
            y: 64.0,
            z: 0.5,
            yaw: 0.0,
            pitch: 0.0,
            flags: 0,
            teleport_id: 1,
        })
        .await;
    assert_eq!(client.expect::<PlayStatus>().await, PlayStatus::PlayerSpawn);
    let confirmed: ConfirmTeleportation = server.expect().await;
    assert_eq!(confirmed.teleport_id, 1);

    server.send(&KeepAlive { id: 1234 }).await;
    let reply: KeepAliveReply = server.expect().await;
    assert_eq!(reply.id, 1234);

    server
        .send(&play::Disconnect {
            reason: TextComponent::plain("Server closed"),
        })
        .await;
    let kicked: Disconnect = client.expect().await;
    assert_eq!(kicked.message.as_deref(), Some("Server closed"));

    let reason = bridge.session.await.unwrap();
    assert!(matches!(reason, Some(BridgeError::Kicked(text)) if text == "Server closed"));
}

#[tokio::test]
async fn outdated_clients_are_told_why_and_dropped() {
    let mut bridge = start(Config::default());
    bridge
        .client
        .send(&RequestNetworkSettings { protocol_version: 1 })
        .await;
    let disconnect: Disconnect = bridge.client.expect().await;
    assert!(disconnect.message.is_some());

    let reason = bridge.session.await.unwrap();
    assert!(matches!(reason, Some(BridgeError::UnsupportedVersion(1))));
}

#[tokio::test]
async fn chains_from_unknown_roots_are_refused() {
    let root = SigningKey::random(&mut OsRng);
    let client_key = SigningKey::random(&mut OsRng);
    let mut bridge = start(Config::default());

    negotiate_settings(&mut bridge.client).await;
    bridge
        .client
        .send(&Login {
            protocol_version: BEDROCK_PROTOCOL_VERSION,
            request: login_request(&root, &client_key),
        })
        .await;
    bridge.client.expect::<Disconnect>().await;

    let reason = bridge.session.await.unwrap();
    assert!(matches!(reason, Some(BridgeError::Auth(_))));
}

#[tokio::test]
async fn a_client_hanging_up_ends_the_session() {
    let mut bridge = start(Config::default());
    negotiate_settings(&mut bridge.client).await;
    drop(bridge.client);

    let reason = timeout(STEP_TIMEOUT, bridge.session).await.unwrap().unwrap();
    assert!(matches!(reason, Some(BridgeError::TransportClosed)));
}
