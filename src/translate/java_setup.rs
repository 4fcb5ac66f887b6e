//! Back-side connection setup: the Java handshake, login and configuration
//! phases. Nothing here reaches the Bedrock client except kicks.

use crate::{
    error::BridgeError,
    inventory::item::json_to_plain,
    protocol::{
        packet::java::{
            client::{
                configuration::{ClientInformation, FinishConfiguration as ClientFinishConfiguration},
                handshake::{Handshake, NextState},
                login::{LoginAcknowledged, LoginPluginResponse, LoginStart},
            },
            server::{
                configuration::{self, FinishConfiguration, PluginMessage, RegistryData},
                login::{self, EncryptionRequest, LoginPluginRequest, LoginSuccess, SetCompression},
            },
        },
        vanilla_codec::CompressionThreshold,
        JavaState, JAVA_PROTOCOL_VERSION,
    },
    registry::{HandlerOutcome, Phase, Priority, Registry},
    session::{state::IN_WORLD, Event, Session},
    world::RegistryInfo,
};
use anyhow::anyhow;
use std::sync::Arc;
use tracing::Instrument;

/// Longest name a Java server accepts.
const MAX_JAVA_NAME_LENGTH: usize = 16;

pub fn register(registry: &mut Registry<Session>) -> anyhow::Result<()> {
    let login = Phase::Java(JavaState::Login);
    registry.register(login, IN_WORLD, Priority::Normal, on_login_disconnect)?;
    registry.register(login, IN_WORLD, Priority::Normal, on_encryption_request)?;
    registry.register(login, IN_WORLD, Priority::Normal, on_set_compression)?;
    registry.register(login, IN_WORLD, Priority::Normal, on_login_success)?;
    registry.register(login, IN_WORLD, Priority::Normal, on_login_plugin_request)?;

    let configuration = Phase::Java(JavaState::Configuration);
    registry.register(configuration, IN_WORLD, Priority::Normal, on_configuration_disconnect)?;
    registry.register(configuration, IN_WORLD, Priority::Normal, on_registry_data)?;
    registry.register(configuration, IN_WORLD, Priority::Normal, on_finish_configuration)?;
    registry.register(configuration, IN_WORLD, Priority::Normal, on_plugin_message)?;
    Ok(())
}

/// Starts connecting to the Java server. Completes with
/// [`Event::BackConnected`].
pub fn connect(session: &mut Session) {
    let connector = Arc::clone(&session.services().connector);
    let cancel = session.cancel_token().child_token();
    let mailbox = session.mailbox();
    tokio::spawn(
        async move {
            let result = connector.connect(cancel).await;
            mailbox.send_async(Event::BackConnected(result)).await.ok();
        }
        .in_current_span(),
    );
}

/// The Java connection is open: log in under the Bedrock identity.
pub fn back_connected(session: &mut Session) -> anyhow::Result<()> {
    let identity = session
        .identity
        .clone()
        .ok_or_else(|| anyhow!("connected to the Java server before login finished"))?;
    let (server_address, server_port) = session.services().connector.address();
    session.send_back(&Handshake {
        protocol_version: JAVA_PROTOCOL_VERSION,
        server_address,
        server_port,
        next_state: NextState::Login,
    });
    session.java_state = JavaState::Login;
    session.send_back(&LoginStart {
        name: java_name(&identity.display_name),
        uuid: identity.uuid,
    });
    Ok(())
}

/// Bedrock names may contain spaces and run longer than Java allows.
fn java_name(display_name: &str) -> String {
    display_name
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .take(MAX_JAVA_NAME_LENGTH)
        .collect()
}

fn on_login_disconnect(_session: &mut Session, packet: &mut login::Disconnect) -> anyhow::Result<HandlerOutcome> {
    Err(BridgeError::Kicked(json_to_plain(&packet.reason)).into())
}

fn on_encryption_request(
    _session: &mut Session,
    _packet: &mut EncryptionRequest,
) -> anyhow::Result<HandlerOutcome> {
    Err(anyhow!("the Java server requested encryption; only offline-mode servers are supported"))
}

fn on_set_compression(session: &mut Session, packet: &mut SetCompression) -> anyhow::Result<HandlerOutcome> {
    tracing::debug!("Java compression threshold {}", packet.threshold);
    session.set_back_compression(CompressionThreshold::from_announced(packet.threshold));
    Ok(HandlerOutcome::Handled)
}

fn on_login_success(session: &mut Session, packet: &mut LoginSuccess) -> anyhow::Result<HandlerOutcome> {
    tracing::debug!("Logged in to the Java server as {} ({})", packet.username, packet.uuid);
    session.send_back(&LoginAcknowledged {});
    session.java_state = JavaState::Configuration;

    let locale = session
        .client_data
        .as_ref()
        .map(|data| data.language_code.to_lowercase())
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| "en_us".to_owned());
    let view_distance = i8::try_from(session.play.chunk_radius).unwrap_or(i8::MAX);
    session.send_back(&ClientInformation {
        locale,
        view_distance,
        chat_mode: 0,
        chat_colors: true,
        displayed_skin_parts: 0x7f,
        main_hand: 1,
        enable_text_filtering: false,
        allow_server_listings: true,
    });
    Ok(HandlerOutcome::Handled)
}

fn on_login_plugin_request(
    session: &mut Session,
    packet: &mut LoginPluginRequest,
) -> anyhow::Result<HandlerOutcome> {
    tracing::debug!("Declining login plugin channel {}", packet.channel);
    session.send_back(&LoginPluginResponse {
        message_id: packet.message_id,
        successful: false,
        data: Vec::new(),
    });
    Ok(HandlerOutcome::Handled)
}

fn on_configuration_disconnect(
    _session: &mut Session,
    packet: &mut configuration::Disconnect,
) -> anyhow::Result<HandlerOutcome> {
    Err(BridgeError::Kicked(packet.reason.to_plain()).into())
}

fn on_registry_data(session: &mut Session, packet: &mut RegistryData) -> anyhow::Result<HandlerOutcome> {
    match &packet.codec.0 {
        Some(codec) => session.world.apply_registry(RegistryInfo::parse(codec)),
        None => tracing::warn!("Empty registry data"),
    }
    Ok(HandlerOutcome::Handled)
}

fn on_finish_configuration(
    session: &mut Session,
    _packet: &mut FinishConfiguration,
) -> anyhow::Result<HandlerOutcome> {
    session.send_back(&ClientFinishConfiguration {});
    session.java_state = JavaState::Play;
    tracing::debug!("Java connection entered play");
    Ok(HandlerOutcome::Handled)
}

fn on_plugin_message(_session: &mut Session, packet: &mut PluginMessage) -> anyhow::Result<HandlerOutcome> {
    tracing::trace!("Ignoring plugin message on {}", packet.channel);
    Ok(HandlerOutcome::Handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::packet::java::client::handshake::Handshake,
        session::tests::{java_bytes, sent_back, spawning_session},
    };

    #[test]
    fn names_are_made_java_safe() {
        assert_eq!(java_name("Steve Minecraft Player"), "Steve_Minecraft_");
        assert_eq!(java_name("Alex"), "Alex");
    }

    #[test]
    fn login_runs_through_to_play() {
        let (mut session, _rx) = spawning_session();
        back_connected(&mut session).unwrap();
        let sent = sent_back(&session);
        let handshake: Handshake = sent[0].decode().unwrap();
        assert_eq!(handshake.protocol_version, JAVA_PROTOCOL_VERSION);
        assert_eq!(handshake.next_state, NextState::Login);
        let start: LoginStart = sent[1].decode().unwrap();
        assert_eq!(start.name, "Steve");

        session
            .receive_back(&java_bytes(&LoginSuccess {
                uuid: start.uuid,
                username: start.name,
                properties: Vec::new(),
            }))
            .unwrap();
        assert_eq!(session.java_state, JavaState::Configuration);
        let sent = sent_back(&session);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].id, 0x03);
        let information: ClientInformation = sent[1].decode().unwrap();
        assert_eq!(information.locale, "en_us");

        session.receive_back(&java_bytes(&FinishConfiguration {})).unwrap();
        assert_eq!(session.java_state, JavaState::Play);
        assert_eq!(sent_back(&session)[0].id, 0x02);
    }

    #[test]
    fn configuration_keep_alives_are_reflected() {
        let (mut session, _rx) = spawning_session();
        session.java_state = JavaState::Configuration;
        session
            .receive_back(&java_bytes(&configuration::KeepAlive { id: 77 }))
            .unwrap();
        let sent = sent_back(&session);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, 0x03);
        assert_eq!(sent[0].body, 77i64.to_be_bytes());
    }

    #[test]
    fn online_mode_servers_are_refused() {
        let (mut session, _rx) = spawning_session();
        session.java_state = JavaState::Login;
        let error = session
            .receive_back(&java_bytes(&EncryptionRequest {
                ignored_data: vec![0; 4],
            }))
            .unwrap_err();
        assert!(matches!(BridgeError::classify(error), BridgeError::Other(_)));
    }

    #[test]
    fn login_kicks_carry_the_server_reason() {
        let (mut session, _rx) = spawning_session();
        session.java_state = JavaState::Login;
        let error = session
            .receive_back(&java_bytes(&login::Disconnect {
                reason: r#"{"text":"Whitelisted"}"#.to_owned(),
            }))
            .unwrap_err();
        let error = BridgeError::classify(error);
        assert_eq!(error.disconnect_reason(), "Whitelisted");
    }
}
