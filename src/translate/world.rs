//! Chunks and block changes from the Java server.

use crate::{
    position::ChunkPosition,
    protocol::{
        packet::java::{
            client::play::ChunkBatchReceived,
            server::play::{BlockUpdate, ChunkAndLightData, ChunkBatchFinished, UnloadChunk, UpdateSectionBlocks},
        },
        JavaState,
    },
    registry::{HandlerOutcome, Phase, Priority, Registry},
    session::{state::IN_WORLD, Session},
};

/// Chunks per tick the bridge asks the server for after each batch.
const CHUNKS_PER_TICK: f32 = 20.0;

pub fn register(registry: &mut Registry<Session>) -> anyhow::Result<()> {
    let play = Phase::Java(JavaState::Play);
    registry.register(play, IN_WORLD, Priority::Normal, on_chunk)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_chunk_batch_finished)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_unload_chunk)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_block_update)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_section_update)?;
    Ok(())
}

fn on_chunk(session: &mut Session, packet: &mut ChunkAndLightData) -> anyhow::Result<HandlerOutcome> {
    match session.world.ingest_chunk(packet) {
        Ok(chunk) => session.send_front(chunk),
        Err(e) => tracing::warn!(
            "Dropping malformed chunk {} {}: {e}",
            packet.chunk_x,
            packet.chunk_z
        ),
    }
    Ok(HandlerOutcome::Handled)
}

fn on_chunk_batch_finished(
    session: &mut Session,
    packet: &mut ChunkBatchFinished,
) -> anyhow::Result<HandlerOutcome> {
    tracing::trace!("Chunk batch of {} finished", packet.batch_size);
    session.send_back(&ChunkBatchReceived {
        chunks_per_tick: CHUNKS_PER_TICK,
    });
    Ok(HandlerOutcome::Handled)
}

fn on_unload_chunk(session: &mut Session, packet: &mut UnloadChunk) -> anyhow::Result<HandlerOutcome> {
    let column = ChunkPosition::new(packet.chunk_x, packet.chunk_z);
    if !session.world.unload(column) {
        tracing::debug!("Unload of column {column:?} that was never loaded");
    }
    Ok(HandlerOutcome::Handled)
}

fn on_block_update(session: &mut Session, packet: &mut BlockUpdate) -> anyhow::Result<HandlerOutcome> {
    let updates = session.world.apply_block_change(packet.location, packet.block_id);
    session.send_front_all(updates.into_iter().map(Into::into));
    Ok(HandlerOutcome::Handled)
}

fn on_section_update(session: &mut Session, packet: &mut UpdateSectionBlocks) -> anyhow::Result<HandlerOutcome> {
    let mut updates = Vec::new();
    for (position, state) in packet.changes() {
        updates.extend(session.world.apply_block_change(position, state));
    }
    session.send_front_all(updates.into_iter().map(Into::into));
    Ok(HandlerOutcome::Handled)
}
