//! The registration table: which translator handles which packet, in which
//! phase and lifecycle states.
//!
//! Handlers take the session and the decoded packet and queue whatever the
//! other side should see. A packet no handler claims goes to [`route`], which
//! only passes on the few packets that are identical on both sides of a
//! Java connection.

use crate::{
    entity_id::JavaEntityId,
    position::{ChunkPosition, EntityPosition},
    protocol::JavaState,
    registry::{Phase, Registry},
    session::{state::LifecycleState, tasks::TimerKind, Session},
};

pub mod entity;
pub mod inventory;
pub mod java_setup;
pub mod login;
pub mod player;
pub mod resources;
pub mod world;

/// Player state owned by the translators.
#[derive(Debug)]
pub struct PlayState {
    pub java_entity_id: Option<JavaEntityId>,
    /// Last position confirmed by the server or reported by the client.
    pub position: EntityPosition,
    /// Column the client was last told to center on.
    pub center: Option<ChunkPosition>,
    pub chunk_radius: i32,
    pub max_chunk_radius: i32,
    pub handshake_sent: bool,
}

impl PlayState {
    pub fn new(max_chunk_radius: i32) -> Self {
        Self {
            java_entity_id: None,
            position: EntityPosition::default(),
            center: None,
            chunk_radius: max_chunk_radius,
            max_chunk_radius,
            handshake_sent: false,
        }
    }
}

/// Builds the handler table shared by every session.
pub fn build_registry() -> anyhow::Result<Registry<Session>> {
    let mut registry = Registry::new();
    login::register(&mut registry)?;
    java_setup::register(&mut registry)?;
    player::register(&mut registry)?;
    world::register(&mut registry)?;
    entity::register(&mut registry)?;
    inventory::register(&mut registry)?;
    Ok(registry)
}

/// Java packets passed back to the server unchanged, as
/// `(phase, clientbound id, serverbound id)`. Keep-alives and pings carry the
/// same body in both directions.
const ROUTES: &[(Phase, u32, u32)] = &[
    (Phase::Java(JavaState::Configuration), 0x03, 0x03),
    (Phase::Java(JavaState::Configuration), 0x04, 0x04),
    (Phase::Java(JavaState::Play), 0x24, 0x15),
    (Phase::Java(JavaState::Play), 0x33, 0x24),
];

/// Output opcode for an unclaimed packet, if it is forwarded at all.
pub fn route(phase: Phase, id: u32) -> Option<u32> {
    ROUTES
        .iter()
        .find(|(p, from, _)| *p == phase && *from == id)
        .map(|&(_, _, to)| to)
}

pub fn timer_fired(session: &mut Session, kind: TimerKind) -> anyhow::Result<()> {
    match kind {
        TimerKind::VehicleRebroadcast => {
            if let Some(packet) = session.entities.vehicle_rebroadcast() {
                session.send_front(packet);
            } else {
                session.tasks.cancel(TimerKind::VehicleRebroadcast);
            }
            Ok(())
        }
        TimerKind::LoginTimeout => {
            if session.state() != LifecycleState::Playing {
                anyhow::bail!(
                    "client did not finish logging in (stuck in {})",
                    session.state().as_ref()
                );
            }
            Ok(())
        }
    }
}
