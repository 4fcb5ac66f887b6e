//! Front-side login: network settings, the identity chain, the encryption
//! handshake and the resource pack exchange.

use super::{
    java_setup,
    resources::{self, ResourcePack},
};
use crate::{
    auth::{self, handshake, VerifiedLogin},
    error::{AuthError, BridgeError, REASON_RESOURCE_PACK},
    protocol::{
        packet::bedrock::{
            client::{
                ClientCacheStatus, ClientToServerHandshake, Login, RequestNetworkSettings,
                ResourcePackClientResponse, ResourcePackStatus,
            },
            server::{
                NetworkSettings, PlayStatus, ResourcePackStack, ResourcePacksInfo,
                ServerToClientHandshake,
            },
        },
        BEDROCK_GAME_VERSION, BEDROCK_PROTOCOL_VERSION,
    },
    registry::{HandlerOutcome, Phase, Priority, Registry},
    session::{
        state::{LifecycleState, ANY_STATE, AUTHENTICATING, AWAITING_RESOURCES, UNAUTHENTICATED},
        Event, Session,
    },
};
use std::sync::Arc;

pub fn register(registry: &mut Registry<Session>) -> anyhow::Result<()> {
    registry.register(Phase::Bedrock, UNAUTHENTICATED, Priority::Normal, on_request_network_settings)?;
    registry.register(Phase::Bedrock, UNAUTHENTICATED, Priority::Normal, on_login)?;
    registry.register(Phase::Bedrock, AUTHENTICATING, Priority::Normal, on_client_handshake)?;
    registry.register(Phase::Bedrock, AWAITING_RESOURCES, Priority::Normal, on_pack_response)?;
    registry.register(Phase::Bedrock, ANY_STATE, Priority::Normal, on_cache_status)?;
    Ok(())
}

fn check_version(version: i32) -> Result<(), BridgeError> {
    if version != BEDROCK_PROTOCOL_VERSION {
        return Err(BridgeError::UnsupportedVersion(version));
    }
    Ok(())
}

fn on_request_network_settings(
    session: &mut Session,
    packet: &mut RequestNetworkSettings,
) -> anyhow::Result<HandlerOutcome> {
    check_version(packet.protocol_version)?;
    if session.is_front_compressed() {
        return Err(BridgeError::ProtocolState {
            packet: "RequestNetworkSettings (repeated)".to_owned(),
            state: session.state(),
        }
        .into());
    }
    let threshold = session.config().network.compression_threshold;
    session.send_front(NetworkSettings {
        compression_threshold: threshold,
        compression_algorithm: 0,
        client_throttle_enabled: false,
        client_throttle_threshold: 0,
        client_throttle_scalar: 0.0,
    });
    session.enable_front_compression(threshold);
    Ok(HandlerOutcome::Handled)
}

fn on_login(session: &mut Session, packet: &mut Login) -> anyhow::Result<HandlerOutcome> {
    check_version(packet.protocol_version)?;
    if !session.is_front_compressed() {
        return Err(BridgeError::ProtocolState {
            packet: "Login before RequestNetworkSettings".to_owned(),
            state: session.state(),
        }
        .into());
    }
    session.lifecycle.advance(LifecycleState::Authenticating)?;

    let request = std::mem::take(&mut packet.request);
    let services = Arc::clone(session.services());
    let mailbox = session.mailbox();
    tokio::task::spawn_blocking(move || {
        let result = auth::verify_login(&request, &services.roots);
        mailbox.send(Event::LoginVerified(Box::new(result))).ok();
    });
    Ok(HandlerOutcome::Handled)
}

/// The identity chain has been checked. Starts encryption.
pub fn login_verified(
    session: &mut Session,
    result: Result<VerifiedLogin, AuthError>,
) -> anyhow::Result<()> {
    let login = result?;
    if session.state() != LifecycleState::Authenticating {
        return Ok(());
    }
    let handshake = handshake::begin(&login.client_key)?;

    let name = login.identity.display_name.as_str();
    tracing::Span::current().record("player", name);
    tracing::info!(
        "{name} logged in (xuid {}, {})",
        login.identity.xuid,
        if login.trusted { "authenticated" } else { "unauthenticated" }
    );
    session.identity = Some(login.identity);
    session.client_data = Some(login.client_data);

    session.send_front(ServerToClientHandshake {
        token: handshake.token,
    });
    session.enable_front_encryption(handshake.key)?;
    session.play.handshake_sent = true;
    Ok(())
}

fn on_client_handshake(
    session: &mut Session,
    _packet: &mut ClientToServerHandshake,
) -> anyhow::Result<HandlerOutcome> {
    if !session.play.handshake_sent {
        return Err(BridgeError::ProtocolState {
            packet: "ClientToServerHandshake before the server handshake".to_owned(),
            state: session.state(),
        }
        .into());
    }
    session.send_front(PlayStatus::LoginSuccess);
    session.lifecycle.advance(LifecycleState::AwaitingResources)?;

    let pack_dir = session.config().resources.pack_dir.clone();
    let mailbox = session.mailbox();
    tokio::task::spawn_blocking(move || {
        let result = match pack_dir {
            Some(dir) => resources::load_packs(&dir),
            None => Ok(Vec::new()),
        };
        mailbox.send(Event::PacksLoaded(result)).ok();
    });
    Ok(HandlerOutcome::Handled)
}

/// Pack manifests have been read. Offers them to the client.
pub fn packs_loaded(session: &mut Session, result: anyhow::Result<Vec<ResourcePack>>) -> anyhow::Result<()> {
    let packs = result.unwrap_or_else(|e| {
        tracing::warn!("Resource packs unavailable: {e:#}");
        Vec::new()
    });
    let forced = session.config().resources.force_packs && !packs.is_empty();
    session.send_front(ResourcePacksInfo {
        must_accept: forced,
        has_scripts: false,
        force_server_packs: false,
        behaviour_packs: Vec::new(),
        resource_packs: packs.iter().map(ResourcePack::info_entry).collect(),
        cdn_urls: Vec::new(),
    });
    session.packs = packs;
    Ok(())
}

fn pack_stack(session: &Session, include_packs: bool) -> ResourcePackStack {
    let resource_packs = if include_packs {
        session.packs.iter().map(ResourcePack::stack_entry).collect()
    } else {
        Vec::new()
    };
    ResourcePackStack {
        must_accept: include_packs && session.config().resources.force_packs,
        behaviour_packs: Vec::new(),
        resource_packs,
        game_version: BEDROCK_GAME_VERSION.to_owned(),
        experiments: Vec::new(),
        experiments_previously_toggled: false,
    }
}

fn on_pack_response(
    session: &mut Session,
    packet: &mut ResourcePackClientResponse,
) -> anyhow::Result<HandlerOutcome> {
    match packet.status {
        ResourcePackStatus::HaveAllPacks => {
            session.send_front(pack_stack(session, true));
        }
        ResourcePackStatus::SendPacks => {
            tracing::warn!(
                "Client asked for {} packs, but pack transfer is not supported",
                packet.pack_ids.len()
            );
            session.send_front(pack_stack(session, false));
        }
        ResourcePackStatus::Refused => {
            if session.config().resources.force_packs && !session.packs.is_empty() {
                return Err(BridgeError::Kicked(REASON_RESOURCE_PACK.to_owned()).into());
            }
            session.send_front(pack_stack(session, false));
        }
        ResourcePackStatus::Completed => {
            session.lifecycle.advance(LifecycleState::Spawning)?;
            java_setup::connect(session);
        }
        ResourcePackStatus::Unknown => {}
    }
    Ok(HandlerOutcome::Handled)
}

fn on_cache_status(_session: &mut Session, packet: &mut ClientCacheStatus) -> anyhow::Result<HandlerOutcome> {
    tracing::debug!(
        "Client blob cache {}; chunks are sent uncached",
        if packet.supported { "supported" } else { "unsupported" }
    );
    Ok(HandlerOutcome::Handled)
}
