//! The local player: joining the world, spawning, movement, view distance
//! and chat.

use crate::{
    catalog::Catalog,
    entity_id::{BedrockEntityId, BedrockIdAllocator, JavaEntityId},
    error::BridgeError,
    position::EntityPosition,
    protocol::{
        nbt::Compound,
        packet::{
            bedrock::{
                client::{MoveMode, MovePlayer, RequestChunkRadius, SetLocalPlayerAsInitialized},
                server::{
                    BiomeDefinitionList, ChangeDimension, ChunkRadiusUpdated, EducationUriResource,
                    NetworkChunkPublisherUpdate, PlayStatus, PlayerMovementSettings, SpawnSettings,
                    StartGame,
                },
                types::{NetworkBlockPosition, NetworkNbt, NetworkUuid, Vec2, Vec3},
                NetworkStackLatency, Text, TextKind,
            },
            java::{
                client::play::{ChatCommand, ChatMessage, ConfirmTeleportation, SetPlayerPositionAndRotation},
                server::play::{
                    Disconnect, Login, RelativeFlags, Respawn, SynchronizePlayerPosition, SystemChatMessage,
                },
            },
        },
        JavaState,
    },
    registry::{HandlerOutcome, Phase, Priority, Registry},
    session::{
        outbound::CoalesceKey,
        state::{LifecycleState, ANY_STATE, IN_WORLD, PLAYING},
        tasks::TimerKind,
        Session,
    },
    world::BedrockDimension,
};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Bedrock reports player positions at eye level, Java at the feet.
const EYE_HEIGHT: f64 = 1.62;

/// Longest chat line a Java server accepts.
const MAX_CHAT_LENGTH: usize = 256;

/// Where the client is placed until the server's first position arrives.
const PLACEHOLDER_SPAWN: Vec3 = Vec3::new(0.0, 69.0, 0.0);

pub fn register(registry: &mut Registry<Session>) -> anyhow::Result<()> {
    let play = Phase::Java(JavaState::Play);
    registry.register(play, IN_WORLD, Priority::Normal, on_join)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_synchronize_position)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_respawn)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_system_chat)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_play_disconnect)?;

    registry.register(Phase::Bedrock, PLAYING, Priority::Normal, on_move_player)?;
    registry.register(Phase::Bedrock, IN_WORLD, Priority::Normal, on_request_chunk_radius)?;
    registry.register(Phase::Bedrock, IN_WORLD, Priority::Normal, on_local_player_initialized)?;
    registry.register(Phase::Bedrock, ANY_STATE, Priority::Normal, on_stack_latency)?;
    registry.register(Phase::Bedrock, PLAYING, Priority::High, tidy_text)?;
    registry.register(Phase::Bedrock, PLAYING, Priority::Normal, on_text)?;
    Ok(())
}

fn bedrock_game_mode(java: u8) -> i32 {
    match java {
        1 => 1,
        2 => 2,
        3 => 6,
        _ => 0,
    }
}

fn local_runtime_id(session: &Session) -> u64 {
    session
        .entities
        .local_player()
        .map(|record| record.bedrock_id())
        .unwrap_or(BedrockIdAllocator::LOCAL_PLAYER)
        .runtime_id()
}

fn eye_position(position: EntityPosition) -> Vec3 {
    Vec3::new(
        position.x as f32,
        (position.y + EYE_HEIGHT) as f32,
        position.z as f32,
    )
}

fn start_game(
    player: BedrockEntityId,
    game_mode: i32,
    dimension: BedrockDimension,
    catalog: &Catalog,
) -> StartGame {
    StartGame {
        unique_entity_id: player.unique_id(),
        runtime_entity_id: player.runtime_id(),
        player_game_mode: game_mode,
        player_position: PLACEHOLDER_SPAWN,
        rotation: Vec2::default(),
        seed: 0,
        spawn_settings: SpawnSettings {
            biome_type: 0,
            user_defined_biome_name: "plains".to_owned(),
            dimension: dimension.id(),
        },
        generator: 1,
        world_game_mode: game_mode,
        difficulty: 1,
        world_spawn: NetworkBlockPosition::default(),
        achievements_disabled: true,
        editor_world: false,
        created_in_editor: false,
        exported_from_editor: false,
        day_cycle_stop_time: -1,
        education_offer: 0,
        education_features_enabled: false,
        education_product_id: String::new(),
        rain_level: 0.0,
        lightning_level: 0.0,
        confirmed_platform_locked_content: false,
        multiplayer_game: true,
        broadcast_to_lan: true,
        xbox_live_broadcast_mode: 4,
        platform_broadcast_mode: 4,
        commands_enabled: true,
        texture_packs_required: false,
        game_rules: Vec::new(),
        experiments: Vec::new(),
        experiments_previously_toggled: false,
        bonus_chest: false,
        start_with_map: false,
        player_permission: 1,
        server_chunk_tick_range: 4,
        behaviour_pack_locked: false,
        resource_pack_locked: false,
        from_locked_template: false,
        msa_gamertags_only: false,
        from_world_template: false,
        world_template_option_locked: false,
        only_spawn_v1_villagers: false,
        persona_disabled: false,
        custom_skins_disabled: false,
        emote_chat_muted: false,
        game_version: "*".to_owned(),
        limited_world_width: 0,
        limited_world_depth: 0,
        nether_type: false,
        education_uri: EducationUriResource {
            button_name: String::new(),
            link_uri: String::new(),
        },
        force_experimental_gameplay: None,
        chat_restriction_level: 0,
        disable_player_interactions: false,
        level_id: String::new(),
        level_name: "world".to_owned(),
        premium_world_template_id: Uuid::nil().to_string(),
        trial: false,
        movement_settings: PlayerMovementSettings {
            authority: 0,
            rewind_history_size: 0,
            server_authoritative_block_breaking: false,
        },
        current_tick: 0,
        enchantment_seed: 0,
        block_properties: Vec::new(),
        item_states: catalog.item_table().item_states(),
        multiplayer_correlation_id: String::new(),
        server_authoritative_inventory: false,
        server_engine: String::new(),
        player_property_data: NetworkNbt(Compound::new()),
        block_registry_checksum: 0,
        world_template_id: NetworkUuid(Uuid::nil()),
        client_side_generation: false,
        block_network_ids_are_hashes: false,
        server_authoritative_sound: false,
    }
}

/// The Java join packet: the client gets its world.
fn on_join(session: &mut Session, packet: &mut Login) -> anyhow::Result<HandlerOutcome> {
    let java_id = JavaEntityId::new(packet.entity_id);
    let player = session.entities.register_local_player(java_id);
    session.play.java_entity_id = Some(java_id);
    let dimension = session
        .world
        .change_dimension(&packet.dimension_type, &packet.dimension_name);
    tracing::debug!(
        "Joined {} as entity {} (Bedrock {})",
        packet.dimension_name,
        packet.entity_id,
        player.runtime_id()
    );

    let catalog = std::sync::Arc::clone(&session.services().catalog);
    session.send_front(start_game(
        player,
        bedrock_game_mode(packet.game_mode),
        dimension,
        &catalog,
    ));
    session.send_front(BiomeDefinitionList {
        definitions: NetworkNbt(catalog.biome_table().definitions()),
    });
    session.send_front(ChunkRadiusUpdated {
        radius: session.play.chunk_radius,
    });
    Ok(HandlerOutcome::Handled)
}

/// Tells the client which columns to keep around. Only sent when the player
/// moves into another column unless `force` is set.
fn publish_center(session: &mut Session, force: bool) {
    let block = session.play.position.block();
    let column = block.chunk();
    if !force && session.play.center == Some(column) {
        return;
    }
    session.play.center = Some(column);
    session.send_front(NetworkChunkPublisherUpdate {
        position: NetworkBlockPosition(block),
        radius: u32::try_from(session.play.chunk_radius << 4).unwrap_or(0),
        saved_chunks: Vec::new(),
    });
}

fn on_synchronize_position(
    session: &mut Session,
    packet: &mut SynchronizePlayerPosition,
) -> anyhow::Result<HandlerOutcome> {
    let current = session.play.position;
    let relative = packet.relative();
    let offset = |flag: RelativeFlags, base: f64, value: f64| {
        if relative.contains(flag) {
            base + value
        } else {
            value
        }
    };
    let angle = |flag: RelativeFlags, base: f32, value: f32| {
        if relative.contains(flag) {
            base + value
        } else {
            value
        }
    };
    let position = EntityPosition {
        x: offset(RelativeFlags::X, current.x, packet.x),
        y: offset(RelativeFlags::Y, current.y, packet.y),
        z: offset(RelativeFlags::Z, current.z, packet.z),
        yaw: angle(RelativeFlags::YAW, current.yaw, packet.yaw),
        pitch: angle(RelativeFlags::PITCH, current.pitch, packet.pitch),
    };
    session.play.position = position;
    session.entities.set_local_position(position);

    session.send_front(MovePlayer {
        runtime_entity_id: local_runtime_id(session),
        position: eye_position(position),
        pitch: position.pitch,
        yaw: position.yaw,
        head_yaw: position.yaw,
        mode: MoveMode::Teleport {
            cause: 0,
            source_entity_type: 0,
        },
        on_ground: false,
        riding_runtime_entity_id: 0,
        tick: 0,
    });
    session.send_back(&ConfirmTeleportation {
        teleport_id: packet.teleport_id,
    });
    publish_center(session, true);

    if session.state() == LifecycleState::Spawning {
        session.send_front(PlayStatus::PlayerSpawn);
        session.lifecycle.advance(LifecycleState::Playing)?;
        session.tasks.cancel(TimerKind::LoginTimeout);
        tracing::info!("Spawned at {:.1} {:.1} {:.1}", position.x, position.y, position.z);
    }
    Ok(HandlerOutcome::Handled)
}

fn on_respawn(session: &mut Session, packet: &mut Respawn) -> anyhow::Result<HandlerOutcome> {
    let previous = session.world.dimension();
    session.entities.clear();
    session.tasks.cancel(TimerKind::VehicleRebroadcast);
    let dimension = session
        .world
        .change_dimension(&packet.dimension_type, &packet.dimension_name);
    session.play.center = None;
    if dimension != previous {
        tracing::debug!("Changing dimension to {}", dimension.as_ref());
        session.send_front(ChangeDimension {
            dimension: dimension.id(),
            position: eye_position(session.play.position),
            respawn: true,
        });
    }
    Ok(HandlerOutcome::Handled)
}

fn on_system_chat(session: &mut Session, packet: &mut SystemChatMessage) -> anyhow::Result<HandlerOutcome> {
    let mut text = Text::system(packet.content.to_plain());
    if packet.overlay {
        text.kind = TextKind::Tip;
    }
    session.send_front(text);
    Ok(HandlerOutcome::Handled)
}

fn on_play_disconnect(_session: &mut Session, packet: &mut Disconnect) -> anyhow::Result<HandlerOutcome> {
    Err(BridgeError::Kicked(packet.reason.to_plain()).into())
}

fn on_move_player(session: &mut Session, packet: &mut MovePlayer) -> anyhow::Result<HandlerOutcome> {
    let Vec3 { x, y, z } = packet.position;
    if ![x, y, z, packet.yaw, packet.pitch].iter().all(|v| v.is_finite()) {
        tracing::warn!("Ignoring movement to a non-finite position");
        return Ok(HandlerOutcome::Handled);
    }
    let position = EntityPosition {
        x: f64::from(x),
        y: f64::from(y) - EYE_HEIGHT,
        z: f64::from(z),
        yaw: packet.yaw,
        pitch: packet.pitch,
    };
    session.play.position = position;
    session.entities.set_local_position(position);
    session.send_back_coalesced(
        CoalesceKey::PlayerMove,
        &SetPlayerPositionAndRotation {
            x: position.x,
            y: position.y,
            z: position.z,
            yaw: position.yaw,
            pitch: position.pitch,
            on_ground: packet.on_ground,
        },
    );
    publish_center(session, false);
    Ok(HandlerOutcome::Handled)
}

fn on_request_chunk_radius(
    session: &mut Session,
    packet: &mut RequestChunkRadius,
) -> anyhow::Result<HandlerOutcome> {
    let radius = packet.radius.clamp(1, session.play.max_chunk_radius.max(1));
    session.play.chunk_radius = radius;
    session.send_front(ChunkRadiusUpdated { radius });
    Ok(HandlerOutcome::Handled)
}

fn on_local_player_initialized(
    _session: &mut Session,
    packet: &mut SetLocalPlayerAsInitialized,
) -> anyhow::Result<HandlerOutcome> {
    tracing::debug!("Client initialized local player {}", packet.runtime_entity_id);
    Ok(HandlerOutcome::Handled)
}

fn on_stack_latency(session: &mut Session, packet: &mut NetworkStackLatency) -> anyhow::Result<HandlerOutcome> {
    if packet.needs_response {
        session.send_front(NetworkStackLatency {
            timestamp: packet.timestamp,
            needs_response: false,
        });
    }
    Ok(HandlerOutcome::Handled)
}

/// Trims chat before it is sent on. Blank lines never reach the server.
fn tidy_text(_session: &mut Session, packet: &mut Text) -> anyhow::Result<HandlerOutcome> {
    let message = packet.message.trim();
    if message.is_empty() {
        return Ok(HandlerOutcome::Handled);
    }
    if message.len() == packet.message.len() && message.chars().count() <= MAX_CHAT_LENGTH {
        return Ok(HandlerOutcome::Unhandled);
    }
    packet.message = message.chars().take(MAX_CHAT_LENGTH).collect();
    Ok(HandlerOutcome::Modified)
}

fn on_text(session: &mut Session, packet: &mut Text) -> anyhow::Result<HandlerOutcome> {
    let message = std::mem::take(&mut packet.message);
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    match message.strip_prefix('/') {
        Some(command) => session.send_back(&ChatCommand::unsigned(command.to_owned(), timestamp)),
        None => session.send_back(&ChatMessage::unsigned(message.clone(), timestamp)),
    }
    Ok(HandlerOutcome::Handled)
}
