//! Per-session mirror of the entities the server has told the client about.
//!
//! Records live in an arena and refer to each other (vehicle, passengers)
//! through generation-checked handles, so removing an entity can never leave
//! a dangling reference: stale handles simply stop resolving.

use crate::{
    catalog::Catalog,
    entity_id::{BedrockEntityId, BedrockIdAllocator, JavaEntityId},
    error::TranslationError,
    position::{EntityPosition, EntityPositionDelta, Velocity},
    protocol::packet::{
        bedrock::{
            server::{
                move_flags, AddEntity, MoveEntityAbsolute, Packet as BedrockPacket, RemoveEntity,
                SetEntityData, SetEntityLink, SetEntityMotion,
            },
            types::{EntityDataMap, EntityLink, EntityLinkKind, PropertySyncData, Vec3},
        },
        java::{server::play::SpawnEntity, MetadataEntry},
    },
};
use ahash::AHashMap;
use kind::EntityKind;
use metadata::EntityFlags;
use std::sync::Arc;

pub mod kind;
pub mod metadata;

/// Entities whose metadata may wait for a spawn at any one time.
const PENDING_METADATA_LIMIT: usize = 1024;

/// Index into the arena plus the generation it was issued for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub java_id: JavaEntityId,
    /// The main Bedrock entity first, then any composite parts.
    pub bedrock_ids: Vec<BedrockEntityId>,
    pub kind: EntityKind,
    pub position: EntityPosition,
    pub head_yaw: f32,
    pub velocity: Velocity,
    pub on_ground: bool,
    pub flags: EntityFlags,
    /// Everything the client currently has.
    pub metadata: EntityDataMap,
    /// Changes not yet sent.
    dirty: EntityDataMap,
    flags_dirty: bool,
    pub vehicle: Option<EntityHandle>,
    pub passengers: Vec<EntityHandle>,
}

impl EntityRecord {
    pub fn bedrock_id(&self) -> BedrockEntityId {
        self.bedrock_ids[0]
    }

    fn bedrock_position(&self) -> Vec3 {
        Vec3::new(
            self.position.x as f32,
            self.position.y as f32,
            self.position.z as f32,
        )
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    record: Option<EntityRecord>,
}

#[derive(Debug)]
pub struct EntityMirror {
    catalog: Arc<Catalog>,
    ids: BedrockIdAllocator,
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_java: AHashMap<JavaEntityId, EntityHandle>,
    by_bedrock: AHashMap<BedrockEntityId, EntityHandle>,
    /// Metadata received before the entity spawned.
    pending_metadata: AHashMap<JavaEntityId, Vec<MetadataEntry>>,
    /// Passenger lists whose vehicle or some passengers have not spawned.
    pending_passengers: AHashMap<JavaEntityId, Vec<JavaEntityId>>,
    local_player: Option<EntityHandle>,
}

impl EntityMirror {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            ids: BedrockIdAllocator::new(),
            slots: Vec::new(),
            free: Vec::new(),
            by_java: AHashMap::new(),
            by_bedrock: AHashMap::new(),
            pending_metadata: AHashMap::new(),
            pending_passengers: AHashMap::new(),
            local_player: None,
        }
    }

    pub fn len(&self) -> usize {
        self.by_java.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_java.is_empty()
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&EntityRecord> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.record.as_ref()
    }

    fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut EntityRecord> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.record.as_mut()
    }

    pub fn handle(&self, java_id: JavaEntityId) -> Option<EntityHandle> {
        self.by_java.get(&java_id).copied()
    }

    pub fn by_java(&self, java_id: JavaEntityId) -> Option<&EntityRecord> {
        self.get(self.handle(java_id)?)
    }

    pub fn bedrock_id(&self, java_id: JavaEntityId) -> Option<BedrockEntityId> {
        self.by_java(java_id).map(EntityRecord::bedrock_id)
    }

    pub fn java_id(&self, bedrock_id: BedrockEntityId) -> Option<JavaEntityId> {
        let handle = self.by_bedrock.get(&bedrock_id)?;
        self.get(*handle).map(|record| record.java_id)
    }

    fn insert(&mut self, record: EntityRecord) -> EntityHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let handle = EntityHandle {
            index,
            generation: slot.generation,
        };
        self.by_java.insert(record.java_id, handle);
        for &id in &record.bedrock_ids {
            self.by_bedrock.insert(id, handle);
        }
        slot.record = Some(record);
        handle
    }

    fn remove(&mut self, handle: EntityHandle) -> Option<EntityRecord> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.by_java.remove(&record.java_id);
        for id in &record.bedrock_ids {
            self.by_bedrock.remove(id);
        }
        Some(record)
    }

    /// Registers the player's own entity. The client already knows it, so no
    /// packet is produced.
    pub fn register_local_player(&mut self, java_id: JavaEntityId) -> BedrockEntityId {
        if let Some(old) = self.local_player.take() {
            self.remove(old);
        }
        let entry = self.catalog.entity_table().by_java_name("minecraft:player").cloned();
        let (flags, metadata) = match &entry {
            Some(entry) => metadata::spawn_defaults(EntityKind::Player, entry),
            None => (EntityFlags::default(), EntityDataMap::new()),
        };
        let record = EntityRecord {
            java_id,
            bedrock_ids: vec![BedrockIdAllocator::LOCAL_PLAYER],
            kind: EntityKind::Player,
            position: EntityPosition::default(),
            head_yaw: 0.0,
            velocity: Velocity::default(),
            on_ground: false,
            flags,
            metadata,
            dirty: EntityDataMap::new(),
            flags_dirty: false,
            vehicle: None,
            passengers: Vec::new(),
        };
        let handle = self.insert(record);
        self.local_player = Some(handle);
        BedrockIdAllocator::LOCAL_PLAYER
    }

    pub fn local_player(&self) -> Option<&EntityRecord> {
        self.get(self.local_player?)
    }

    /// Records the player's own position as reported by the server.
    pub fn set_local_position(&mut self, position: EntityPosition) {
        if let Some(record) = self.local_player.and_then(|handle| self.get_mut(handle)) {
            record.position = position;
        }
    }

    /// The vehicle the local player is riding, if any.
    pub fn local_vehicle(&self) -> Option<&EntityRecord> {
        self.get(self.local_player()?.vehicle?)
    }

    /// Absolute move for the local player's vehicle at its last known position.
    pub fn vehicle_rebroadcast(&self) -> Option<BedrockPacket> {
        let vehicle = self.local_vehicle()?;
        Some(move_packet(vehicle, vehicle.bedrock_id(), vehicle.bedrock_position(), 0).into())
    }

    /// Spawns the Bedrock counterpart of a Java entity.
    pub fn spawn(&mut self, packet: &SpawnEntity) -> Vec<BedrockPacket> {
        let java_id = JavaEntityId::new(packet.entity_id);
        if self.local_player.is_some() && self.handle(java_id) == self.local_player {
            tracing::warn!("Server spawned the local player entity {}, ignoring", packet.entity_id);
            return Vec::new();
        }
        let mut out = Vec::new();
        if self.by_java.contains_key(&java_id) {
            tracing::debug!("Entity {} respawned without removal", packet.entity_id);
            out.extend(self.despawn(java_id));
        }

        let entry = match self
            .catalog
            .entity_table()
            .get(packet.kind)
            .ok_or(TranslationError::UnknownEntityKind(packet.kind))
        {
            Ok(entry) => entry.clone(),
            Err(e) => {
                tracing::warn!("{e}, entity {} not mirrored", packet.entity_id);
                self.pending_metadata.remove(&java_id);
                return out;
            }
        };
        let kind = EntityKind::from_java_name(&entry.java_name);
        let parts = kind::composite_parts(kind);

        let main = self.ids.allocate();
        let mut bedrock_ids = vec![main];
        bedrock_ids.extend(parts.iter().map(|_| self.ids.allocate()));

        let (flags, metadata) = metadata::spawn_defaults(kind, &entry);
        let position = EntityPosition {
            x: packet.x,
            y: packet.y,
            z: packet.z,
            yaw: packet.yaw,
            pitch: packet.pitch,
        };
        let mut record = EntityRecord {
            java_id,
            bedrock_ids,
            kind,
            position,
            head_yaw: packet.head_yaw,
            velocity: Velocity::from_java(packet.velocity_x, packet.velocity_y, packet.velocity_z),
            on_ground: false,
            flags,
            metadata: metadata.clone(),
            dirty: EntityDataMap::new(),
            flags_dirty: false,
            vehicle: None,
            passengers: Vec::new(),
        };

        let origin = record.bedrock_position();
        out.push(
            AddEntity {
                unique_entity_id: main.unique_id(),
                runtime_entity_id: main.runtime_id(),
                identifier: entry.bedrock_identifier.clone(),
                position: origin,
                motion: Vec3::new(record.velocity.x, record.velocity.y, record.velocity.z),
                pitch: packet.pitch,
                yaw: packet.yaw,
                head_yaw: packet.head_yaw,
                body_yaw: packet.yaw,
                attributes: Vec::new(),
                metadata,
                properties: PropertySyncData::default(),
                links: Vec::new(),
            }
            .into(),
        );
        for (part, id) in parts.iter().zip(&record.bedrock_ids[1..]) {
            let (_, part_metadata) = metadata::part_defaults(part.width, part.height);
            out.push(
                AddEntity {
                    unique_entity_id: id.unique_id(),
                    runtime_entity_id: id.runtime_id(),
                    identifier: kind::PART_IDENTIFIER.to_owned(),
                    position: kind::part_position(origin, packet.yaw, part),
                    motion: Vec3::ZERO,
                    pitch: 0.0,
                    yaw: packet.yaw,
                    head_yaw: packet.yaw,
                    body_yaw: packet.yaw,
                    attributes: Vec::new(),
                    metadata: part_metadata,
                    properties: PropertySyncData::default(),
                    links: Vec::new(),
                }
                .into(),
            );
        }

        if let Some(entries) = self.pending_metadata.remove(&java_id) {
            metadata::translate(kind, &entries, &mut record.flags, &mut record.dirty);
            record.flags_dirty = true;
        }
        self.insert(record);

        out.extend(self.resolve_pending_links(java_id));
        out
    }

    /// Removes an entity, its composite parts and every link to it.
    pub fn despawn(&mut self, java_id: JavaEntityId) -> Vec<BedrockPacket> {
        self.pending_metadata.remove(&java_id);
        self.pending_passengers.remove(&java_id);
        let Some(handle) = self.handle(java_id) else {
            return Vec::new();
        };
        if Some(handle) == self.local_player {
            tracing::warn!("Server removed the local player entity, ignoring");
            return Vec::new();
        }
        let Some(record) = self.remove(handle) else {
            return Vec::new();
        };

        for slot in &mut self.slots {
            if let Some(other) = &mut slot.record {
                other.passengers.retain(|&passenger| passenger != handle);
            }
        }
        for waiting in self.pending_passengers.values_mut() {
            waiting.retain(|&passenger| passenger != java_id);
        }
        for &passenger in &record.passengers {
            if let Some(passenger) = self.get_mut(passenger) {
                passenger.vehicle = None;
                metadata::apply_riding(&mut passenger.flags, &mut passenger.dirty, None);
                passenger.flags_dirty = true;
            }
        }

        record
            .bedrock_ids
            .iter()
            .map(|id| {
                RemoveEntity {
                    unique_entity_id: id.unique_id(),
                }
                .into()
            })
            .collect()
    }

    /// Forgets every entity except the local player (dimension change).
    pub fn clear(&mut self) {
        let handles: Vec<_> = self
            .by_java
            .values()
            .copied()
            .filter(|&handle| Some(handle) != self.local_player)
            .collect();
        for handle in handles {
            self.remove(handle);
        }
        if let Some(player) = self.local_player.and_then(|handle| self.get_mut(handle)) {
            player.vehicle = None;
            player.passengers.clear();
        }
        self.pending_metadata.clear();
        self.pending_passengers.clear();
    }

    /// Buffers a metadata delta; it reaches the client on the next [`flush`](Self::flush).
    pub fn apply_metadata(&mut self, java_id: JavaEntityId, entries: Vec<MetadataEntry>) {
        match self.handle(java_id).and_then(|handle| self.get_mut(handle)) {
            Some(record) => {
                metadata::translate(record.kind, &entries, &mut record.flags, &mut record.dirty);
                record.flags_dirty = true;
            }
            None => {
                if !self.pending_metadata.contains_key(&java_id)
                    && self.pending_metadata.len() >= PENDING_METADATA_LIMIT
                {
                    tracing::warn!("Too much metadata for unspawned entities, dropping {java_id:?}");
                    return;
                }
                self.pending_metadata.entry(java_id).or_default().extend(entries);
            }
        }
    }

    /// One `SetEntityData` per entity with unsent changes.
    pub fn flush(&mut self) -> Vec<BedrockPacket> {
        let mut out = Vec::new();
        for slot in &mut self.slots {
            let Some(record) = &mut slot.record else {
                continue;
            };
            if record.flags_dirty {
                record.flags.write(&mut record.dirty);
                record.flags_dirty = false;
            }
            if record.dirty.is_empty() {
                continue;
            }
            // Flags that did not change are not resent.
            let mut changes = record.dirty.take();
            retain_changed(&mut changes, &record.metadata);
            if changes.is_empty() {
                continue;
            }
            record.metadata.merge(changes.clone());
            out.push(
                SetEntityData {
                    runtime_entity_id: record.bedrock_id().runtime_id(),
                    metadata: changes,
                    properties: PropertySyncData::default(),
                    tick: 0,
                }
                .into(),
            );
        }
        out
    }

    /// Applies a Java passenger list to `vehicle`.
    pub fn set_passengers(
        &mut self,
        vehicle: JavaEntityId,
        passengers: Vec<JavaEntityId>,
    ) -> Vec<BedrockPacket> {
        let Some(vehicle_handle) = self.handle(vehicle) else {
            self.pending_passengers.insert(vehicle, passengers);
            return Vec::new();
        };
        let Some(vehicle_record) = self.get(vehicle_handle) else {
            return Vec::new();
        };
        let vehicle_unique = vehicle_record.bedrock_id().unique_id();
        let vehicle_kind = vehicle_record.kind;
        let previous = vehicle_record.passengers.clone();

        let mut out = Vec::new();
        let mut linked = Vec::new();
        let mut missing = false;
        for (seat, &java_id) in passengers.iter().enumerate() {
            let Some(handle) = self.handle(java_id) else {
                missing = true;
                continue;
            };
            linked.push(handle);
            let kind = if seat == 0 {
                EntityLinkKind::Rider
            } else {
                EntityLinkKind::Passenger
            };
            let already = previous.get(seat) == Some(&handle);
            let switched = self
                .get(handle)
                .and_then(|record| record.vehicle)
                .filter(|&old| old != vehicle_handle);
            if let Some(old) = switched {
                out.extend(self.detach(old, handle));
            }
            let Some(record) = self.get_mut(handle) else {
                continue;
            };
            record.vehicle = Some(vehicle_handle);
            if already {
                continue;
            }
            metadata::apply_riding(&mut record.flags, &mut record.dirty, Some(vehicle_kind));
            record.flags_dirty = true;
            out.push(link(vehicle_unique, record.bedrock_id().unique_id(), kind));
        }

        for handle in previous {
            if linked.contains(&handle) {
                continue;
            }
            // Already seated elsewhere; that vehicle owns the link now.
            let Some(record) = self
                .get_mut(handle)
                .filter(|record| record.vehicle == Some(vehicle_handle))
            else {
                continue;
            };
            record.vehicle = None;
            metadata::apply_riding(&mut record.flags, &mut record.dirty, None);
            record.flags_dirty = true;
            out.push(link(
                vehicle_unique,
                record.bedrock_id().unique_id(),
                EntityLinkKind::Remove,
            ));
        }

        if missing {
            self.pending_passengers.insert(vehicle, passengers);
        } else {
            self.pending_passengers.remove(&vehicle);
        }
        if let Some(record) = self.get_mut(vehicle_handle) {
            record.passengers = linked;
        }
        out
    }

    /// Takes `passenger` off `vehicle`'s list and unlinks it on the client.
    fn detach(&mut self, vehicle: EntityHandle, passenger: EntityHandle) -> Option<BedrockPacket> {
        let rider = self.get(passenger)?.bedrock_id().unique_id();
        let vehicle = self.get_mut(vehicle)?;
        vehicle.passengers.retain(|&seated| seated != passenger);
        Some(link(vehicle.bedrock_id().unique_id(), rider, EntityLinkKind::Remove))
    }

    /// Re-applies passenger lists waiting on `java_id`.
    fn resolve_pending_links(&mut self, java_id: JavaEntityId) -> Vec<BedrockPacket> {
        let vehicles: Vec<_> = self
            .pending_passengers
            .iter()
            .filter(|(vehicle, passengers)| **vehicle == java_id || passengers.contains(&java_id))
            .map(|(vehicle, _)| *vehicle)
            .collect();
        let mut out = Vec::new();
        for vehicle in vehicles {
            if !self.by_java.contains_key(&vehicle) {
                continue;
            }
            if let Some(passengers) = self.pending_passengers.remove(&vehicle) {
                out.extend(self.set_passengers(vehicle, passengers));
            }
        }
        out
    }

    /// Relative move; rotation is updated when given.
    pub fn move_relative(
        &mut self,
        java_id: JavaEntityId,
        delta: EntityPositionDelta,
        rotation: Option<(f32, f32)>,
        on_ground: bool,
    ) -> Vec<BedrockPacket> {
        let Some(record) = self.moved_record(java_id) else {
            return Vec::new();
        };
        record.position += delta;
        if let Some((yaw, pitch)) = rotation {
            record.position.yaw = yaw;
            record.position.pitch = pitch;
        }
        record.on_ground = on_ground;
        moves_for(record)
    }

    pub fn rotate(&mut self, java_id: JavaEntityId, yaw: f32, pitch: f32, on_ground: bool) -> Vec<BedrockPacket> {
        let Some(record) = self.moved_record(java_id) else {
            return Vec::new();
        };
        record.position.yaw = yaw;
        record.position.pitch = pitch;
        record.on_ground = on_ground;
        moves_for(record)
    }

    pub fn teleport(&mut self, java_id: JavaEntityId, position: EntityPosition, on_ground: bool) -> Vec<BedrockPacket> {
        let Some(record) = self.moved_record(java_id) else {
            return Vec::new();
        };
        record.position = position;
        record.on_ground = on_ground;
        let mut out = moves_for(record);
        for packet in &mut out {
            if let BedrockPacket::MoveEntityAbsolute(packet) = packet {
                packet.flags |= move_flags::TELEPORT;
            }
        }
        out
    }

    pub fn set_velocity(&mut self, java_id: JavaEntityId, velocity: Velocity) -> Option<BedrockPacket> {
        let record = self.moved_record(java_id)?;
        record.velocity = velocity;
        Some(
            SetEntityMotion {
                runtime_entity_id: record.bedrock_id().runtime_id(),
                motion: Vec3::new(velocity.x, velocity.y, velocity.z),
            }
            .into(),
        )
    }

    /// Record for a server-driven move. The local player's movement is
    /// client-authoritative on Bedrock, so it is never echoed back.
    fn moved_record(&mut self, java_id: JavaEntityId) -> Option<&mut EntityRecord> {
        let handle = self.handle(java_id);
        if handle.is_none() {
            tracing::debug!("Move for unknown entity {java_id:?}");
        }
        let handle = handle?;
        if Some(handle) == self.local_player {
            return None;
        }
        self.get_mut(handle)
    }
}

fn link(vehicle: i64, rider: i64, kind: EntityLinkKind) -> BedrockPacket {
    SetEntityLink {
        link: EntityLink {
            from: vehicle,
            to: rider,
            kind,
            immediate: false,
            rider_initiated: false,
        },
    }
    .into()
}

fn move_packet(record: &EntityRecord, id: BedrockEntityId, position: Vec3, extra_flags: u8) -> MoveEntityAbsolute {
    MoveEntityAbsolute {
        runtime_entity_id: id.runtime_id(),
        flags: extra_flags | if record.on_ground { move_flags::ON_GROUND } else { 0 },
        position,
        pitch: record.position.pitch,
        yaw: record.position.yaw,
        head_yaw: record.position.yaw,
    }
}

/// Absolute moves for an entity and each of its parts.
fn moves_for(record: &EntityRecord) -> Vec<BedrockPacket> {
    let origin = record.bedrock_position();
    let mut out = vec![move_packet(record, record.bedrock_id(), origin, 0).into()];
    let parts = kind::composite_parts(record.kind);
    for (part, &id) in parts.iter().zip(&record.bedrock_ids[1..]) {
        let position = kind::part_position(origin, record.position.yaw, part);
        out.push(move_packet(record, id, position, 0).into());
    }
    out
}

/// Drops entries whose value the client already has.
fn retain_changed(changes: &mut EntityDataMap, current: &EntityDataMap) {
    let mut kept = EntityDataMap::new();
    for (key, value) in changes.iter() {
        if current.get(key) != Some(value) {
            kept.insert(key, value.clone());
        }
    }
    *changes = kept;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::packet::{
        bedrock::types::EntityDataValue,
        java::MetadataValue,
    };
    use metadata::{flags, keys};
    use uuid::Uuid;

    pub(crate) const ZOMBIE: i32 = 133;
    pub(crate) const BOAT: i32 = 10;
    const DRAGON: i32 = 34;

    fn mirror() -> EntityMirror {
        EntityMirror::new(Catalog::builtin().into_shared())
    }

    pub(crate) fn spawn_packet(entity_id: i32, kind: i32) -> SpawnEntity {
        SpawnEntity {
            entity_id,
            uuid: Uuid::new_v4(),
            kind,
            x: 1.0,
            y: 64.0,
            z: -3.0,
            pitch: 0.0,
            yaw: 0.0,
            head_yaw: 0.0,
            data: 0,
            velocity_x: 0,
            velocity_y: 0,
            velocity_z: 0,
        }
    }

    fn java(id: i32) -> JavaEntityId {
        JavaEntityId::new(id)
    }

    #[test]
    fn spawned_entities_get_fresh_ids() {
        let mut entities = mirror();
        entities.register_local_player(java(1));
        let out = entities.spawn(&spawn_packet(42, ZOMBIE));
        assert!(matches!(&out[..], [BedrockPacket::AddEntity(add)] if add.identifier == "minecraft:zombie"));
        let first = entities.bedrock_id(java(42)).unwrap();
        assert_ne!(first, BedrockIdAllocator::LOCAL_PLAYER);

        entities.despawn(java(42));
        entities.spawn(&spawn_packet(42, ZOMBIE));
        let second = entities.bedrock_id(java(42)).unwrap();
        assert!(second > first);
        assert_eq!(entities.java_id(first), None);
        assert_eq!(entities.java_id(second), Some(java(42)));
    }

    #[test]
    fn unknown_kinds_are_not_mirrored() {
        let mut entities = mirror();
        assert!(entities.spawn(&spawn_packet(5, 9999)).is_empty());
        assert!(entities.is_empty());
    }

    #[test]
    fn metadata_before_spawn_is_coalesced() {
        let mut entities = mirror();
        entities.apply_metadata(
            java(42),
            vec![MetadataEntry {
                index: 0,
                value: MetadataValue::Byte(0x01),
            }],
        );
        entities.apply_metadata(
            java(42),
            vec![MetadataEntry {
                index: 1,
                value: MetadataValue::VarInt(100),
            }],
        );
        assert!(entities.flush().is_empty());

        entities.spawn(&spawn_packet(42, ZOMBIE));
        let updates = entities.flush();
        assert_eq!(updates.len(), 1);
        let BedrockPacket::SetEntityData(update) = &updates[0] else {
            panic!("expected SetEntityData");
        };
        assert_eq!(update.metadata.get(keys::AIR), Some(&EntityDataValue::Short(100)));
        let record = entities.by_java(java(42)).unwrap();
        assert!(record.flags.get(flags::ONFIRE));
        assert!(entities.flush().is_empty());
    }

    #[test]
    fn despawn_severs_passenger_links() {
        let mut entities = mirror();
        entities.spawn(&spawn_packet(10, BOAT));
        entities.spawn(&spawn_packet(11, ZOMBIE));
        let links = entities.set_passengers(java(10), vec![java(11)]);
        assert_eq!(links.len(), 1);
        let rider = entities.handle(java(11)).unwrap();
        assert!(entities.get(rider).unwrap().vehicle.is_some());
        let boat = entities.handle(java(10)).unwrap();

        entities.despawn(java(10));
        assert!(entities.get(boat).is_none());
        let rider = entities.get(rider).unwrap();
        assert_eq!(rider.vehicle, None);
        assert!(!rider.flags.get(flags::RIDING));
    }

    #[test]
    fn switching_vehicles_leaves_the_old_one() {
        let mut entities = mirror();
        entities.spawn(&spawn_packet(10, BOAT));
        entities.spawn(&spawn_packet(11, ZOMBIE));
        entities.spawn(&spawn_packet(12, BOAT));
        entities.set_passengers(java(10), vec![java(11)]);

        let out = entities.set_passengers(java(12), vec![java(11)]);
        let kinds: Vec<_> = out
            .iter()
            .filter_map(|packet| match packet {
                BedrockPacket::SetEntityLink(SetEntityLink { link }) => Some(link.kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, [EntityLinkKind::Remove, EntityLinkKind::Rider]);
        assert!(entities.by_java(java(10)).unwrap().passengers.is_empty());

        // The old vehicle's empty list arriving late changes nothing.
        assert!(entities.set_passengers(java(10), vec![]).is_empty());
        let boat = entities.handle(java(12)).unwrap();
        let rider = entities.by_java(java(11)).unwrap();
        assert_eq!(rider.vehicle, Some(boat));
        assert!(rider.flags.get(flags::RIDING));
    }

    #[test]
    fn despawning_a_passenger_that_switched_vehicles() {
        let mut entities = mirror();
        entities.spawn(&spawn_packet(10, BOAT));
        entities.spawn(&spawn_packet(11, ZOMBIE));
        entities.spawn(&spawn_packet(12, BOAT));
        entities.set_passengers(java(10), vec![java(11)]);
        entities.set_passengers(java(12), vec![java(11)]);
        let rider = entities.handle(java(11)).unwrap();

        entities.despawn(java(11));
        for vehicle in [10, 12] {
            let record = entities.by_java(java(vehicle)).unwrap();
            assert!(!record.passengers.contains(&rider), "vehicle {vehicle} still lists the rider");
        }
    }

    #[test]
    fn despawn_clears_waiting_passenger_lists() {
        let mut entities = mirror();
        entities.spawn(&spawn_packet(11, ZOMBIE));
        entities.set_passengers(java(10), vec![java(11)]);
        entities.despawn(java(11));
        entities.spawn(&spawn_packet(10, BOAT));
        // A new entity reusing the id is not the one that was waiting.
        let out = entities.spawn(&spawn_packet(11, ZOMBIE));
        assert!(!out.iter().any(|packet| matches!(packet, BedrockPacket::SetEntityLink(_))));
        assert!(entities.by_java(java(10)).unwrap().passengers.is_empty());
        assert_eq!(entities.by_java(java(11)).unwrap().vehicle, None);
    }

    #[test]
    fn the_local_player_is_never_spawned_twice() {
        let mut entities = mirror();
        entities.register_local_player(java(1));
        assert!(entities.spawn(&spawn_packet(1, ZOMBIE)).is_empty());
        assert_eq!(entities.len(), 1);
        let player = entities.local_player().unwrap();
        assert_eq!(player.bedrock_id(), BedrockIdAllocator::LOCAL_PLAYER);
        assert_eq!(entities.bedrock_id(java(1)), Some(BedrockIdAllocator::LOCAL_PLAYER));
    }

    #[test]
    fn passenger_links_wait_for_both_ends() {
        let mut entities = mirror();
        assert!(entities.set_passengers(java(10), vec![java(11)]).is_empty());
        assert!(entities.spawn(&spawn_packet(10, BOAT)).len() == 1);
        let out = entities.spawn(&spawn_packet(11, ZOMBIE));
        assert!(out.iter().any(|packet| matches!(
            packet,
            BedrockPacket::SetEntityLink(SetEntityLink { link: EntityLink { kind: EntityLinkKind::Rider, .. } })
        )));
        let rider = entities.by_java(java(11)).unwrap();
        assert!(rider.flags.get(flags::RIDING));
    }

    #[test]
    fn dismount_sends_a_remove_link() {
        let mut entities = mirror();
        entities.spawn(&spawn_packet(10, BOAT));
        entities.spawn(&spawn_packet(11, ZOMBIE));
        entities.set_passengers(java(10), vec![java(11)]);
        let out = entities.set_passengers(java(10), vec![]);
        assert!(matches!(
            &out[..],
            [BedrockPacket::SetEntityLink(SetEntityLink { link: EntityLink { kind: EntityLinkKind::Remove, .. } })]
        ));
    }

    #[test]
    fn the_local_vehicle_is_rebroadcast() {
        let mut entities = mirror();
        entities.register_local_player(java(1));
        entities.spawn(&spawn_packet(10, BOAT));
        assert!(entities.vehicle_rebroadcast().is_none());
        entities.set_passengers(java(10), vec![java(1)]);
        let boat = entities.bedrock_id(java(10)).unwrap();
        assert!(matches!(
            entities.vehicle_rebroadcast(),
            Some(BedrockPacket::MoveEntityAbsolute(packet)) if packet.runtime_entity_id == boat.runtime_id()
        ));
    }

    #[test]
    fn composite_entities_cascade() {
        let mut entities = mirror();
        let out = entities.spawn(&spawn_packet(7, DRAGON));
        assert_eq!(out.len(), 9);
        let record = entities.by_java(java(7)).unwrap();
        assert_eq!(record.bedrock_ids.len(), 9);
        let part = record.bedrock_ids[3];
        assert_eq!(entities.java_id(part), Some(java(7)));

        let moves = entities.move_relative(
            java(7),
            EntityPositionDelta { dx: 4096, dy: 0, dz: 0 },
            None,
            false,
        );
        assert_eq!(moves.len(), 9);
        assert_eq!(entities.despawn(java(7)).len(), 9);
        assert_eq!(entities.java_id(part), None);
    }

    #[test]
    fn relative_moves_become_absolute() {
        let mut entities = mirror();
        entities.spawn(&spawn_packet(3, ZOMBIE));
        let moves = entities.move_relative(
            java(3),
            EntityPositionDelta { dx: 4096 * 2, dy: -2048, dz: 0 },
            Some((90.0, 10.0)),
            true,
        );
        let BedrockPacket::MoveEntityAbsolute(packet) = &moves[0] else {
            panic!("expected MoveEntityAbsolute");
        };
        assert_eq!(packet.position, Vec3::new(3.0, 63.5, -3.0));
        assert_eq!(packet.yaw, 90.0);
        assert_eq!(packet.flags & move_flags::ON_GROUND, move_flags::ON_GROUND);
    }
}
