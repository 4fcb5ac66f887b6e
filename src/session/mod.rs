//! One bridged connection.
//!
//! A [`Session`] owns everything mirrored for its player and is driven by a
//! single actor task (see [`actor`]), so none of its state is shared or
//! locked. Work that has to leave the actor (chain verification, resource
//! pack I/O, connecting to the Java server, timers) reports back as an
//! [`Event`] through the session mailbox.

use crate::{
    auth::{ClientData, Identity, TrustedRoots, VerifiedLogin},
    catalog::Catalog,
    config::Config,
    entity::EntityMirror,
    error::{AuthError, BridgeError},
    inventory::{item::ItemTranslator, InventoryMirror},
    persistence::TrackedPositionRegistry,
    protocol::{
        bedrock_codec::{BatchCipher, BedrockCodec},
        packet::bedrock::server::{self, Packet as BedrockPacket},
        vanilla_codec::{CompressionThreshold, VanillaCodec},
        DecodeError, Encode, Encoder, JavaState, PacketId, RawPacket,
    },
    registry::{Dispatch, Phase, Registry},
    transport::{BackConnector, Channel},
    translate::{self, resources::ResourcePack, PlayState},
    world::WorldMirror,
};
use outbound::{CoalesceKey, Delivery, OutboundQueue};
use state::{Lifecycle, LifecycleState};
use bytes::Bytes;
use std::{sync::Arc, time::Duration};
use tasks::{TaskSet, TimerId, TimerKind};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub mod actor;
pub mod outbound;
pub mod state;
pub mod tasks;

/// Read-only state shared by every session.
pub struct Services {
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub registry: Registry<Session>,
    pub positions: Arc<TrackedPositionRegistry>,
    pub roots: TrustedRoots,
    pub connector: Arc<dyn BackConnector>,
}

impl Services {
    pub fn new(
        config: Arc<Config>,
        catalog: Arc<Catalog>,
        positions: Arc<TrackedPositionRegistry>,
        connector: Arc<dyn BackConnector>,
    ) -> anyhow::Result<Arc<Self>> {
        let roots = TrustedRoots::new(
            &config.auth.trusted_root_keys,
            config.auth.allow_untrusted_chains,
        )?;
        Ok(Arc::new(Self {
            registry: translate::build_registry()?,
            config,
            catalog,
            positions,
            roots,
            connector,
        }))
    }
}

/// Completions of work that ran outside the session actor.
pub enum Event {
    LoginVerified(Box<Result<VerifiedLogin, AuthError>>),
    PacksLoaded(anyhow::Result<Vec<ResourcePack>>),
    BackConnected(anyhow::Result<Channel>),
    Timer(TimerId),
}

/// Work for the front writer, applied in order.
pub enum FrontItem {
    /// A packet in its in-batch form.
    Packet(Vec<u8>),
    EnableCompression(u16),
    EnableEncryption(Box<BatchCipher>),
}

/// Work for the back writer, applied in order.
pub enum BackItem {
    Packet(RawPacket),
    SetCompression(Option<CompressionThreshold>),
}

pub struct Session {
    services: Arc<Services>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) java_state: JavaState,
    pub(crate) identity: Option<Identity>,
    pub(crate) client_data: Option<ClientData>,
    pub(crate) entities: EntityMirror,
    pub(crate) world: WorldMirror,
    pub(crate) inventory: InventoryMirror,
    pub(crate) tasks: TaskSet,
    pub(crate) play: PlayState,
    pub(crate) packs: Vec<ResourcePack>,
    front: Arc<OutboundQueue<FrontItem>>,
    back: Arc<OutboundQueue<BackItem>>,
    /// Decoding state for frames from the client.
    front_codec: BedrockCodec,
    /// Decoding state for bytes from the Java server.
    back_codec: VanillaCodec,
    /// Bytes from the Java server, once connected.
    back_incoming: Option<flume::Receiver<Bytes>>,
    mailbox: flume::Sender<Event>,
    cancel: CancellationToken,
    /// Why the session ended, once it has.
    close_reason: Option<BridgeError>,
}

impl Session {
    pub fn new(
        services: Arc<Services>,
        mailbox: flume::Sender<Event>,
        cancel: CancellationToken,
    ) -> Self {
        let config = &services.config;
        let catalog = Arc::clone(&services.catalog);
        let capacity = config.network.outbound_queue_capacity;
        let items = ItemTranslator::new(Arc::clone(&catalog), Arc::clone(&services.positions));
        Self {
            lifecycle: Lifecycle::new(),
            java_state: JavaState::Handshake,
            identity: None,
            client_data: None,
            entities: EntityMirror::new(Arc::clone(&catalog)),
            world: WorldMirror::new(
                catalog,
                usize::try_from(config.world.pending_block_change_capacity).unwrap_or(usize::MAX),
            ),
            inventory: InventoryMirror::new(items),
            tasks: TaskSet::new(cancel.clone(), mailbox.clone()),
            play: PlayState::new(config.world.max_chunk_radius),
            packs: Vec::new(),
            front: Arc::new(OutboundQueue::new(capacity)),
            back: Arc::new(OutboundQueue::new(capacity)),
            front_codec: BedrockCodec::new(),
            back_codec: VanillaCodec::new(),
            back_incoming: None,
            mailbox,
            cancel,
            close_reason: None,
            services,
        }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn config(&self) -> &Config {
        &self.services.config
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn close_reason(&self) -> Option<&BridgeError> {
        self.close_reason.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle.is(LifecycleState::Disconnecting)
    }

    /// Starts the timers every session runs from the first packet on.
    pub fn start(&mut self) {
        let timeout = Duration::from_secs(self.config().network.login_timeout_secs);
        self.tasks.start_once(TimerKind::LoginTimeout, timeout);
    }

    pub(crate) fn front_queue(&self) -> Arc<OutboundQueue<FrontItem>> {
        Arc::clone(&self.front)
    }

    pub(crate) fn back_queue(&self) -> Arc<OutboundQueue<BackItem>> {
        Arc::clone(&self.back)
    }

    pub(crate) fn back_incoming(&self) -> Option<flume::Receiver<Bytes>> {
        self.back_incoming.clone()
    }

    pub(crate) fn mailbox(&self) -> flume::Sender<Event> {
        self.mailbox.clone()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Queues a packet for the client.
    pub fn send_front(&self, packet: impl Into<BedrockPacket>) {
        let packet = packet.into();
        let delivery = match &packet {
            BedrockPacket::MoveEntityAbsolute(p) => {
                Delivery::Coalesce(CoalesceKey::EntityMove(p.runtime_entity_id))
            }
            BedrockPacket::SetEntityMotion(p) => {
                Delivery::Coalesce(CoalesceKey::EntityMotion(p.runtime_entity_id))
            }
            _ => Delivery::Reliable,
        };
        let mut body = Vec::new();
        packet.encode_body(&mut Encoder::new(&mut body));
        self.front.push(
            FrontItem::Packet(BedrockCodec::raw_packet_bytes(packet.id(), &body)),
            delivery,
        );
    }

    pub fn send_front_all(&self, packets: impl IntoIterator<Item = BedrockPacket>) {
        for packet in packets {
            self.send_front(packet);
        }
    }

    /// Queues a packet for the Java server. Packets queued before the
    /// connection exists are sent once it does.
    pub fn send_back<P: Encode + PacketId>(&self, packet: &P) {
        self.back
            .push(BackItem::Packet(RawPacket::from_packet(packet)), Delivery::Reliable);
    }

    /// Like [`Session::send_back`], but only the latest packet per key is kept.
    pub fn send_back_coalesced<P: Encode + PacketId>(&self, key: CoalesceKey, packet: &P) {
        self.back.push(
            BackItem::Packet(RawPacket::from_packet(packet)),
            Delivery::Coalesce(key),
        );
    }

    pub(crate) fn send_back_raw(&self, packet: RawPacket) {
        self.back.push(BackItem::Packet(packet), Delivery::Reliable);
    }

    /// Compresses front traffic in both directions from the next batch on.
    pub(crate) fn enable_front_compression(&mut self, threshold: u16) {
        self.front_codec.enable_compression(threshold);
        self.front
            .push(FrontItem::EnableCompression(threshold), Delivery::Reliable);
    }

    /// Encrypts front traffic in both directions from the next batch on.
    pub(crate) fn enable_front_encryption(&mut self, key: [u8; 32]) -> anyhow::Result<()> {
        self.front_codec.enable_encryption(BatchCipher::new(key))?;
        self.front.push(
            FrontItem::EnableEncryption(Box::new(BatchCipher::new(key))),
            Delivery::Reliable,
        );
        Ok(())
    }

    pub(crate) fn is_front_compressed(&self) -> bool {
        self.front_codec.is_compressed()
    }

    pub(crate) fn set_back_compression(&mut self, threshold: Option<CompressionThreshold>) {
        self.back_codec.set_compression(threshold);
        self.back
            .push(BackItem::SetCompression(threshold), Delivery::Reliable);
    }

    /// Handles one frame from the client.
    pub fn receive_front(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        let packets = self
            .front_codec
            .decode_batch(frame)
            .map_err(|e| BridgeError::Decode(DecodeError::Other(e)))?;
        for packet in packets {
            if self.is_closed() {
                break;
            }
            self.dispatch(Phase::Bedrock, packet)?;
        }
        Ok(())
    }

    /// Handles bytes from the Java server.
    pub fn receive_back(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.back_codec.give_data(bytes);
        while !self.is_closed() {
            let Some(packet) = self
                .back_codec
                .decode_packet()
                .map_err(|e| BridgeError::Decode(DecodeError::Other(e)))?
            else {
                break;
            };
            self.dispatch(Phase::Java(self.java_state), packet)?;
        }
        self.flush_entities();
        Ok(())
    }

    fn dispatch(&mut self, phase: Phase, packet: RawPacket) -> anyhow::Result<()> {
        let services = Arc::clone(&self.services);
        let state = self.lifecycle.state();
        match services.registry.dispatch(self, state, phase, &packet)? {
            Dispatch::Handled => {}
            Dispatch::Unhandled => self.forward(phase, packet),
            Dispatch::Modified(packet) => self.forward(phase, packet),
            Dispatch::Unknown => {
                if phase == Phase::Bedrock && state.is_strict() {
                    return Err(BridgeError::ProtocolState {
                        packet: format!("unknown packet {:#x}", packet.id),
                        state,
                    }
                    .into());
                }
                self.forward(phase, packet);
            }
        }
        Ok(())
    }

    /// Passes a packet on when the route table maps its opcode, otherwise
    /// drops it.
    fn forward(&mut self, phase: Phase, packet: RawPacket) {
        match translate::route(phase, packet.id) {
            Some(id) => self.send_back_raw(RawPacket::new(id, packet.body)),
            None => tracing::trace!("No route for {phase:?} packet {:#x}, dropped", packet.id),
        }
    }

    /// Sends the metadata changes accumulated since the last flush.
    pub(crate) fn flush_entities(&mut self) {
        let packets = self.entities.flush();
        self.send_front_all(packets);
    }

    /// Handles the completion of off-actor work.
    pub fn handle_event(&mut self, event: Event) -> anyhow::Result<()> {
        match event {
            Event::LoginVerified(result) => translate::login::login_verified(self, *result),
            Event::PacksLoaded(result) => translate::login::packs_loaded(self, result),
            Event::BackConnected(Ok(channel)) => {
                self.back_incoming = Some(channel.incoming);
                tokio::spawn(actor::write_back(self.back_queue(), channel.outgoing).in_current_span());
                translate::java_setup::back_connected(self)
            }
            Event::BackConnected(Err(e)) => Err(e.context("failed to reach the Java server")),
            Event::Timer(id) => {
                if !self.tasks.accept(id) {
                    return Ok(());
                }
                translate::timer_fired(self, id.kind)
            }
        }
    }

    /// Ends the session: tells the client why (when it can still hear us),
    /// stops every task and closes both queues. Later calls do nothing.
    pub fn disconnect(&mut self, error: BridgeError) {
        if !self.lifecycle.begin_disconnect() {
            return;
        }
        match &error {
            BridgeError::TransportClosed => tracing::info!("Session closed"),
            BridgeError::Kicked(reason) => tracing::info!("Kicked by the server: {reason}"),
            error => tracing::warn!("Disconnecting: {error}"),
        }
        self.send_front(server::Disconnect {
            reason: 0,
            message: Some(error.disconnect_reason().to_owned()),
        });
        self.teardown();
        self.close_reason = Some(error);
    }

    fn teardown(&mut self) {
        self.tasks.cancel_all();
        self.entities.clear();
        self.front.close();
        self.back.close();
    }
}
