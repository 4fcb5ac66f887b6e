//! Entities spawned, moved and changed by the Java server.

use crate::{
    entity_id::JavaEntityId,
    position::{EntityPosition, Velocity},
    protocol::{
        packet::java::server::play::{
            RemoveEntities, SetEntityMetadata, SetEntityVelocity, SetPassengers, SpawnEntity, TeleportEntity,
            UpdateEntityPosition, UpdateEntityPositionAndRotation, UpdateEntityRotation,
        },
        JavaState, VarInt,
    },
    registry::{HandlerOutcome, Phase, Priority, Registry},
    session::{
        state::IN_WORLD,
        tasks::{TimerKind, GAME_TICK},
        Session,
    },
};

pub fn register(registry: &mut Registry<Session>) -> anyhow::Result<()> {
    let play = Phase::Java(JavaState::Play);
    registry.register(play, IN_WORLD, Priority::Normal, on_spawn)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_remove)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_metadata)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_velocity)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_move)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_move_and_rotate)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_rotate)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_teleport)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_passengers)?;
    Ok(())
}

/// Runs the vehicle rebroadcast exactly while the local player rides
/// something.
fn sync_vehicle_timer(session: &mut Session) {
    let riding = session.entities.local_vehicle().is_some();
    let running = session.tasks.is_running(TimerKind::VehicleRebroadcast);
    if riding && !running {
        tracing::debug!("Local player mounted, rebroadcasting vehicle position");
        session.tasks.start_repeating(TimerKind::VehicleRebroadcast, GAME_TICK);
    } else if !riding && running {
        session.tasks.cancel(TimerKind::VehicleRebroadcast);
    }
}

fn on_spawn(session: &mut Session, packet: &mut SpawnEntity) -> anyhow::Result<HandlerOutcome> {
    let packets = session.entities.spawn(packet);
    session.send_front_all(packets);
    sync_vehicle_timer(session);
    Ok(HandlerOutcome::Handled)
}

fn on_remove(session: &mut Session, packet: &mut RemoveEntities) -> anyhow::Result<HandlerOutcome> {
    for &VarInt(id) in &packet.entities {
        let packets = session.entities.despawn(JavaEntityId::new(id));
        session.send_front_all(packets);
    }
    sync_vehicle_timer(session);
    Ok(HandlerOutcome::Handled)
}

/// Buffered; the session flushes after each read from the server.
fn on_metadata(session: &mut Session, packet: &mut SetEntityMetadata) -> anyhow::Result<HandlerOutcome> {
    let entries = std::mem::take(&mut packet.metadata.0);
    session
        .entities
        .apply_metadata(JavaEntityId::new(packet.entity_id), entries);
    Ok(HandlerOutcome::Handled)
}

fn on_velocity(session: &mut Session, packet: &mut SetEntityVelocity) -> anyhow::Result<HandlerOutcome> {
    let velocity = Velocity::from_java(packet.velocity_x, packet.velocity_y, packet.velocity_z);
    if let Some(motion) = session
        .entities
        .set_velocity(JavaEntityId::new(packet.entity_id), velocity)
    {
        session.send_front(motion);
    }
    Ok(HandlerOutcome::Handled)
}

fn on_move(session: &mut Session, packet: &mut UpdateEntityPosition) -> anyhow::Result<HandlerOutcome> {
    let packets = session.entities.move_relative(
        JavaEntityId::new(packet.entity_id),
        packet.delta(),
        None,
        packet.on_ground,
    );
    session.send_front_all(packets);
    Ok(HandlerOutcome::Handled)
}

fn on_move_and_rotate(
    session: &mut Session,
    packet: &mut UpdateEntityPositionAndRotation,
) -> anyhow::Result<HandlerOutcome> {
    let packets = session.entities.move_relative(
        JavaEntityId::new(packet.entity_id),
        packet.delta(),
        Some((packet.yaw, packet.pitch)),
        packet.on_ground,
    );
    session.send_front_all(packets);
    Ok(HandlerOutcome::Handled)
}

fn on_rotate(session: &mut Session, packet: &mut UpdateEntityRotation) -> anyhow::Result<HandlerOutcome> {
    let packets = session.entities.rotate(
        JavaEntityId::new(packet.entity_id),
        packet.yaw,
        packet.pitch,
        packet.on_ground,
    );
    session.send_front_all(packets);
    Ok(HandlerOutcome::Handled)
}

fn on_teleport(session: &mut Session, packet: &mut TeleportEntity) -> anyhow::Result<HandlerOutcome> {
    let position = EntityPosition {
        x: packet.x,
        y: packet.y,
        z: packet.z,
        yaw: packet.yaw,
        pitch: packet.pitch,
    };
    let packets = session
        .entities
        .teleport(JavaEntityId::new(packet.entity_id), position, packet.on_ground);
    session.send_front_all(packets);
    Ok(HandlerOutcome::Handled)
}

fn on_passengers(session: &mut Session, packet: &mut SetPassengers) -> anyhow::Result<HandlerOutcome> {
    let passengers = packet
        .passengers
        .iter()
        .map(|&VarInt(id)| JavaEntityId::new(id))
        .collect();
    let packets = session
        .entities
        .set_passengers(JavaEntityId::new(packet.entity_id), passengers);
    session.send_front_all(packets);
    sync_vehicle_timer(session);
    Ok(HandlerOutcome::Handled)
}
