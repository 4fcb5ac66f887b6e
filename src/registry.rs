//! Opcode-keyed packet decoders with priority-ordered handler chains.
//!
//! Each registration names a packet type, the phase it arrives in, the
//! lifecycle states it is valid in, a priority and a handler. Dispatching a
//! raw packet decodes it once, runs the permitted handlers from the highest
//! priority down (ties in registration order) and reports what should happen
//! to the packet:
//!
//! - a handler returning [`HandlerOutcome::Handled`] stops the chain and the
//!   packet is not forwarded;
//! - [`HandlerOutcome::Modified`] means the handler mutated the packet; later
//!   handlers see the mutation and the packet is re-encoded once at the end;
//! - [`HandlerOutcome::Unhandled`] leaves the packet as it was.

use crate::{
    error::BridgeError,
    protocol::{Decode, DecodeError, Decoder, Encode, Encoder, JavaState, PacketId, RawPacket},
    session::state::{Allowed, LifecycleState},
};
use ahash::AHashMap;
use anyhow::{anyhow, bail};
use std::any::{Any, TypeId};

/// Five-level handler priority. Handlers run from `Highest` to `Lowest`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    Handled,
    Unhandled,
    Modified,
}

/// Which way a packet travels through the bridge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// From the Bedrock client towards the Java server.
    Serverbound,
    /// From the Java server towards the Bedrock client.
    Clientbound,
}

/// The protocol and connection phase a packet was read in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Bedrock,
    Java(JavaState),
}

impl Phase {
    pub fn direction(self) -> Direction {
        match self {
            Phase::Bedrock => Direction::Serverbound,
            Phase::Java(_) => Direction::Clientbound,
        }
    }
}

/// Result of dispatching one packet.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing is registered for this opcode.
    Unknown,
    Handled,
    Unhandled,
    /// The re-encoded packet after at least one handler modified it.
    Modified(RawPacket),
}

type ErasedHandler<C> = Box<dyn Fn(&mut C, &mut dyn Any) -> anyhow::Result<HandlerOutcome> + Send + Sync>;

struct Registered<C> {
    priority: Priority,
    allowed: Allowed,
    handler: ErasedHandler<C>,
}

struct Entry<C> {
    name: &'static str,
    type_id: TypeId,
    decode: fn(&mut Decoder) -> Result<Box<dyn Any>, DecodeError>,
    encode: fn(&dyn Any, &mut Encoder),
    /// Sorted by descending priority, stable for equal priorities.
    handlers: Vec<Registered<C>>,
}

fn decode_erased<P: Decode + 'static>(decoder: &mut Decoder) -> Result<Box<dyn Any>, DecodeError> {
    Ok(Box::new(P::decode(decoder)?))
}

fn encode_erased<P: Encode + 'static>(packet: &dyn Any, encoder: &mut Encoder) {
    if let Some(packet) = packet.downcast_ref::<P>() {
        packet.encode(encoder);
    }
}

/// The handler table, generic over the context handlers mutate.
pub struct Registry<C> {
    entries: AHashMap<(Phase, u32), Entry<C>>,
}

impl<C: 'static> Registry<C> {
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }

    /// Adds a handler for packet type `P` in `phase`.
    ///
    /// Fails if the opcode is already bound to a different packet type.
    pub fn register<P, F>(
        &mut self,
        phase: Phase,
        allowed: Allowed,
        priority: Priority,
        handler: F,
    ) -> anyhow::Result<()>
    where
        P: Decode + Encode + PacketId + 'static,
        F: Fn(&mut C, &mut P) -> anyhow::Result<HandlerOutcome> + Send + Sync + 'static,
    {
        let entry = self.entries.entry((phase, P::ID)).or_insert_with(|| Entry {
            name: P::NAME,
            type_id: TypeId::of::<P>(),
            decode: decode_erased::<P>,
            encode: encode_erased::<P>,
            handlers: Vec::new(),
        });
        if entry.type_id != TypeId::of::<P>() {
            bail!(
                "opcode {:#x} in {phase:?} is bound to {} and cannot also decode {}",
                P::ID,
                entry.name,
                P::NAME
            );
        }

        let erased: ErasedHandler<C> = Box::new(move |context, packet| {
            let packet = packet
                .downcast_mut::<P>()
                .ok_or_else(|| anyhow!("handler for {} received another packet type", P::NAME))?;
            handler(context, packet)
        });
        // Insert after every handler of greater or equal priority.
        let position = entry
            .handlers
            .iter()
            .position(|registered| registered.priority < priority)
            .unwrap_or(entry.handlers.len());
        entry.handlers.insert(
            position,
            Registered {
                priority,
                allowed,
                handler: erased,
            },
        );
        Ok(())
    }

    /// Decodes `raw` and runs its handler chain.
    ///
    /// Fails with a decode error for malformed bodies and with a protocol
    /// state error when no handler for the packet is allowed in `state`.
    pub fn dispatch(
        &self,
        context: &mut C,
        state: LifecycleState,
        phase: Phase,
        raw: &RawPacket,
    ) -> anyhow::Result<Dispatch> {
        let Some(entry) = self.entries.get(&(phase, raw.id)) else {
            return Ok(Dispatch::Unknown);
        };

        let mut permitted = entry
            .handlers
            .iter()
            .filter(|registered| registered.allowed.contains(&state))
            .peekable();
        if permitted.peek().is_none() {
            return Err(BridgeError::ProtocolState {
                packet: entry.name.to_owned(),
                state,
            }
            .into());
        }

        let mut packet = (entry.decode)(&mut Decoder::new(&raw.body))?;
        let mut modified = false;
        for registered in permitted {
            match (registered.handler)(context, packet.as_mut())? {
                HandlerOutcome::Handled => return Ok(Dispatch::Handled),
                HandlerOutcome::Modified => modified = true,
                HandlerOutcome::Unhandled => {}
            }
        }

        if modified {
            let mut body = Vec::new();
            (entry.encode)(packet.as_ref(), &mut Encoder::new(&mut body));
            Ok(Dispatch::Modified(RawPacket::new(raw.id, body)))
        } else {
            Ok(Dispatch::Unhandled)
        }
    }

    pub fn contains(&self, phase: Phase, id: u32) -> bool {
        self.entries.contains_key(&(phase, id))
    }

    /// Every registered opcode with its packet name and handler count.
    pub fn registrations(&self) -> impl Iterator<Item = (Phase, u32, &'static str, usize)> + '_ {
        self.entries
            .iter()
            .map(|(&(phase, id), entry)| (phase, id, entry.name, entry.handlers.len()))
    }
}

impl<C: 'static> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}
