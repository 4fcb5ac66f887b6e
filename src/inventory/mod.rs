//! Mirror of the player inventory and the currently open container.
//!
//! The first contents of a window go out in full; after that only slots
//! whose Java stack changed are sent. Each window keeps two cursors: the
//! stacks the client was last shown, and the last state id the server
//! sent, which every click sent back must carry.

use crate::{
    error::TranslationError,
    position::BlockPosition,
    protocol::packet::{
        bedrock::{
            client::{ActionSource, InventoryAction},
            server::{ContainerOpen, InventoryContent, InventorySlot, Packet as BedrockPacket},
            types::{ItemInstance, NetworkBlockPosition},
            ContainerClose,
        },
        java::{
            client::play::{
                click_mode, ChangedSlot, ClickContainer, CloseContainer as JavaCloseContainer,
                SetCreativeModeSlot, SLOT_OUTSIDE,
            },
            server::play::{OpenScreen, SetContainerContents, SetContainerSlot},
            Slot,
        },
    },
};

pub mod family;
pub mod item;

pub use item::ItemTranslator;

/// Bedrock window ids with a fixed meaning.
pub mod window {
    pub const INVENTORY: u32 = 0;
    pub const OFFHAND: u32 = 119;
    pub const ARMOR: u32 = 120;
    pub const UI: u32 = 124;
}

/// Slots of the Bedrock UI window.
mod ui_slot {
    pub const CURSOR: u32 = 0;
    pub const CRAFTING_INPUT: u32 = 28;
    pub const CRAFTING_RESULT: u32 = 50;
}

const PLAYER_WINDOW_SLOTS: usize = 46;
/// Main inventory plus hotbar, appended to every container with one.
const PLAYER_INVENTORY_SLOTS: usize = 36;
/// First Java player-window index of the main inventory.
const JAVA_MAIN_START: usize = 9;
const JAVA_HOTBAR_START: usize = 36;
const JAVA_CURSOR_WINDOW: i8 = -1;
/// Player-window update that plays no pickup animation.
const JAVA_PLAYER_SILENT_WINDOW: i8 = -2;

/// A Java menu type and its Bedrock counterpart.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContainerKind {
    pub name: &'static str,
    /// Slots before the trailing player inventory.
    pub slots: usize,
    pub bedrock_type: i8,
    pub has_player_inventory: bool,
}

const fn kind(name: &'static str, slots: usize, bedrock_type: i8) -> ContainerKind {
    ContainerKind {
        name,
        slots,
        bedrock_type,
        has_player_inventory: true,
    }
}

/// Indexed by Java menu type id.
const CONTAINER_KINDS: &[ContainerKind] = &[
    kind("generic_9x1", 9, 0),
    kind("generic_9x2", 18, 0),
    kind("generic_9x3", 27, 0),
    kind("generic_9x4", 36, 0),
    kind("generic_9x5", 45, 0),
    kind("generic_9x6", 54, 0),
    kind("generic_3x3", 9, 6),
    kind("crafter_3x3", 10, 36),
    kind("anvil", 3, 5),
    kind("beacon", 1, 13),
    kind("blast_furnace", 3, 27),
    kind("brewing_stand", 5, 4),
    kind("crafting", 10, 1),
    kind("enchantment", 2, 3),
    kind("furnace", 3, 2),
    kind("grindstone", 3, 26),
    kind("hopper", 5, 8),
    ContainerKind {
        name: "lectern",
        slots: 1,
        bedrock_type: 25,
        has_player_inventory: false,
    },
    kind("loom", 4, 24),
    kind("merchant", 3, 15),
    kind("shulker_box", 27, 0),
    kind("smithing", 4, 33),
    kind("smoker", 3, 28),
    kind("cartography_table", 3, 30),
    kind("stonecutter", 2, 29),
];

impl ContainerKind {
    pub fn from_java(window_type: i32) -> Option<&'static ContainerKind> {
        CONTAINER_KINDS.get(usize::try_from(window_type).ok()?)
    }

    pub fn total_slots(&self) -> usize {
        if self.has_player_inventory {
            self.slots + PLAYER_INVENTORY_SLOTS
        } else {
            self.slots
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BedrockSlot {
    pub window: u32,
    pub slot: u32,
}

impl BedrockSlot {
    const fn new(window: u32, slot: u32) -> Self {
        Self { window, slot }
    }
}

/// Where a Java player-window slot lives on Bedrock.
pub fn player_slot(index: usize) -> Option<BedrockSlot> {
    let index_u32 = u32::try_from(index).ok()?;
    Some(match index {
        0 => BedrockSlot::new(window::UI, ui_slot::CRAFTING_RESULT),
        1..=4 => BedrockSlot::new(window::UI, ui_slot::CRAFTING_INPUT + index_u32 - 1),
        5..=8 => BedrockSlot::new(window::ARMOR, index_u32 - 5),
        9..=35 => BedrockSlot::new(window::INVENTORY, index_u32),
        36..=44 => BedrockSlot::new(window::INVENTORY, index_u32 - 36),
        45 => BedrockSlot::new(window::OFFHAND, 0),
        _ => return None,
    })
}

#[derive(Debug)]
struct OpenContainer {
    java_window: u8,
    kind: &'static ContainerKind,
    slots: Vec<Slot>,
    announced: bool,
    state_id: i32,
}

/// What the client's own inventory changes become on the Java side.
#[derive(Debug)]
pub enum ServerboundChange {
    Creative(Vec<SetCreativeModeSlot>),
    Click(ClickContainer),
}

/// A client-side slot resolved to the Java window layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Located {
    /// Index in the Java player window.
    Player(usize),
    /// Index among the open container's own slots.
    Container(usize),
}

#[derive(Debug)]
pub struct InventoryMirror {
    items: ItemTranslator,
    player: Vec<Slot>,
    player_announced: bool,
    player_state_id: i32,
    cursor: Slot,
    open: Option<OpenContainer>,
}

impl InventoryMirror {
    pub fn new(items: ItemTranslator) -> Self {
        Self {
            items,
            player: vec![Slot::default(); PLAYER_WINDOW_SLOTS],
            player_announced: false,
            player_state_id: 0,
            cursor: Slot::default(),
            open: None,
        }
    }

    pub fn items(&self) -> &ItemTranslator {
        &self.items
    }

    pub fn player_slot(&self, index: usize) -> Option<&Slot> {
        self.player.get(index)
    }

    pub fn open_window(&self) -> Option<(u8, &'static ContainerKind)> {
        self.open.as_ref().map(|open| (open.java_window, open.kind))
    }

    /// Last state id the server sent for `java_window`.
    pub fn state_id(&self, java_window: u8) -> Option<i32> {
        if java_window == 0 {
            return Some(self.player_state_id);
        }
        self.open
            .as_ref()
            .filter(|open| open.java_window == java_window)
            .map(|open| open.state_id)
    }

    /// Opens a container window at `position`, closing any window already open.
    pub fn open(
        &mut self,
        packet: &OpenScreen,
        position: BlockPosition,
    ) -> Result<Vec<BedrockPacket>, TranslationError> {
        let kind = ContainerKind::from_java(packet.window_type)
            .ok_or(TranslationError::UnknownContainer(packet.window_type))?;
        let java_window =
            u8::try_from(packet.window_id).map_err(|_| TranslationError::UnknownContainer(packet.window_id))?;

        let mut out = Vec::new();
        if let Some(previous) = self.open.take() {
            out.push(close_packet(previous.java_window));
        }
        tracing::debug!("Opening {} as window {java_window}", kind.name);
        self.open = Some(OpenContainer {
            java_window,
            kind,
            slots: vec![Slot::default(); kind.slots],
            announced: false,
            state_id: 0,
        });
        out.push(
            ContainerOpen {
                window_id: java_window,
                container_type: kind.bedrock_type,
                position: NetworkBlockPosition(position),
                unique_entity_id: -1,
            }
            .into(),
        );
        Ok(out)
    }

    /// Server-initiated close.
    pub fn close(&mut self, java_window: u8) -> Vec<BedrockPacket> {
        match &self.open {
            Some(open) if open.java_window == java_window => {
                self.open = None;
                vec![close_packet(java_window)]
            }
            _ => Vec::new(),
        }
    }

    /// The client closed a window; tells the server which one.
    pub fn client_closed(&mut self, bedrock_window: u8) -> Option<JavaCloseContainer> {
        match &self.open {
            Some(open) if open.java_window == bedrock_window => {
                self.open = None;
                Some(JavaCloseContainer {
                    window_id: bedrock_window,
                })
            }
            _ if u32::from(bedrock_window) == window::INVENTORY => {
                Some(JavaCloseContainer { window_id: 0 })
            }
            _ => None,
        }
    }

    pub fn set_contents(
        &mut self,
        packet: &SetContainerContents,
    ) -> Result<Vec<BedrockPacket>, TranslationError> {
        let mut out = Vec::new();
        if packet.window_id == 0 {
            self.player_state_id = packet.state_id;
            if packet.slots.len() != PLAYER_WINDOW_SLOTS {
                tracing::debug!(
                    "Player window sent {} slots, expected {PLAYER_WINDOW_SLOTS}",
                    packet.slots.len()
                );
            }
            for (index, slot) in packet.slots.iter().enumerate().take(PLAYER_WINDOW_SLOTS) {
                out.extend(self.store_player_slot(index, slot.clone(), true));
            }
            if !self.player_announced {
                out.extend(self.player_contents());
                self.player_announced = true;
            }
        } else {
            let Some(open) = self.open.as_mut().filter(|open| open.java_window == packet.window_id)
            else {
                return Err(TranslationError::UnknownContainer(packet.window_id.into()));
            };
            open.state_id = packet.state_id;
            let kind = open.kind;
            let window = u32::from(open.java_window);
            let announced = open.announced;
            let mut diffs = Vec::new();
            for (index, slot) in packet.slots.iter().enumerate().take(kind.slots) {
                if open.slots[index] != *slot {
                    open.slots[index] = slot.clone();
                    if announced {
                        diffs.push(slot_packet(
                            BedrockSlot::new(window, index as u32),
                            self.items.to_bedrock(slot),
                        ));
                    }
                }
            }
            if !announced {
                let items = open.slots.iter().map(|slot| self.items.to_bedrock(slot)).collect();
                open.announced = true;
                out.push(
                    InventoryContent {
                        window_id: window,
                        items,
                    }
                    .into(),
                );
            }
            out.extend(diffs);
            if kind.has_player_inventory {
                let trailing = packet.slots.iter().skip(kind.slots).take(PLAYER_INVENTORY_SLOTS);
                for (offset, slot) in trailing.enumerate() {
                    out.extend(self.store_player_slot(
                        JAVA_MAIN_START + offset,
                        slot.clone(),
                        self.player_announced,
                    ));
                }
            }
        }
        out.extend(self.set_cursor(packet.carried_item.clone()));
        Ok(out)
    }

    pub fn set_slot(
        &mut self,
        packet: &SetContainerSlot,
    ) -> Result<Vec<BedrockPacket>, TranslationError> {
        if packet.window_id == JAVA_CURSOR_WINDOW {
            return Ok(self.set_cursor(packet.data.clone()).into_iter().collect());
        }
        let index = usize::try_from(packet.slot).map_err(|_| TranslationError::SlotOutOfRange {
            slot: 0,
            size: 0,
        })?;
        if packet.window_id == 0 || packet.window_id == JAVA_PLAYER_SILENT_WINDOW {
            if index >= PLAYER_WINDOW_SLOTS {
                return Err(TranslationError::SlotOutOfRange {
                    slot: index,
                    size: PLAYER_WINDOW_SLOTS,
                });
            }
            self.player_state_id = packet.state_id;
            return Ok(self.store_player_slot(index, packet.data.clone(), true).into_iter().collect());
        }

        let window_id = u8::try_from(packet.window_id)
            .map_err(|_| TranslationError::UnknownContainer(packet.window_id.into()))?;
        let Some(open) = self.open.as_mut().filter(|open| open.java_window == window_id) else {
            return Err(TranslationError::UnknownContainer(packet.window_id.into()));
        };
        open.state_id = packet.state_id;
        let kind = open.kind;
        if index >= kind.total_slots() {
            return Err(TranslationError::SlotOutOfRange {
                slot: index,
                size: kind.total_slots(),
            });
        }
        if index < kind.slots {
            open.slots[index] = packet.data.clone();
            let item = self.items.to_bedrock(&packet.data);
            return Ok(vec![slot_packet(
                BedrockSlot::new(u32::from(window_id), index as u32),
                item,
            )]);
        }
        let player_index = JAVA_MAIN_START + (index - kind.slots);
        Ok(self
            .store_player_slot(player_index, packet.data.clone(), true)
            .into_iter()
            .collect())
    }

    /// Takes the slot changes the client made on its own and returns what the
    /// server must be told. The mirror adopts the new stacks, so the server
    /// echoing them back produces no update.
    pub fn client_changes(
        &mut self,
        actions: &[InventoryAction],
    ) -> Result<Option<ServerboundChange>, TranslationError> {
        let creative = actions.iter().any(|action| action.source == ActionSource::Creative);
        let mut changed = Vec::new();
        let mut carried = None;
        for action in actions {
            let ActionSource::Container { window_id } = action.source else {
                continue;
            };
            let container =
                u32::try_from(window_id).map_err(|_| TranslationError::UnknownContainer(window_id))?;
            let target = BedrockSlot::new(container, action.slot);
            let stack = self.items.to_java(&action.to_item)?;
            if target == BedrockSlot::new(window::UI, ui_slot::CURSOR) {
                carried = Some(stack);
            } else {
                changed.push((self.locate(target)?, stack));
            }
        }
        if changed.is_empty() && carried.is_none() {
            return Ok(None);
        }

        let creative = creative
            && self.open.is_none()
            && changed.iter().all(|(located, _)| matches!(located, Located::Player(_)));
        let mut changed_slots = Vec::with_capacity(changed.len());
        for (located, stack) in &changed {
            let index = self.java_index(*located)?;
            changed_slots.push(ChangedSlot {
                slot: i16::try_from(index).unwrap_or(SLOT_OUTSIDE),
                item: stack.clone(),
            });
        }

        for (located, stack) in changed {
            match located {
                Located::Player(index) => self.player[index] = stack,
                Located::Container(index) => {
                    if let Some(open) = &mut self.open {
                        open.slots[index] = stack;
                    }
                }
            }
        }
        if let Some(stack) = carried {
            self.cursor = stack;
        }

        if creative {
            let slots = changed_slots
                .into_iter()
                .map(|changed| SetCreativeModeSlot {
                    slot: changed.slot,
                    clicked_item: changed.item,
                })
                .collect();
            return Ok(Some(ServerboundChange::Creative(slots)));
        }
        let (window_id, state_id) = match &self.open {
            Some(open) => (open.java_window, open.state_id),
            None => (0, self.player_state_id),
        };
        Ok(Some(ServerboundChange::Click(ClickContainer {
            window_id,
            state_id,
            slot: changed_slots.first().map_or(SLOT_OUTSIDE, |changed| changed.slot),
            button: 0,
            mode: click_mode::PICKUP,
            changed_slots,
            carried_item: self.cursor.clone(),
        })))
    }

    /// Everything the client should be showing, for when its view diverged.
    pub fn resync(&self) -> Vec<BedrockPacket> {
        let mut out = self.player_contents();
        if let Some(open) = &self.open {
            let items = open.slots.iter().map(|slot| self.items.to_bedrock(slot)).collect();
            out.push(
                InventoryContent {
                    window_id: u32::from(open.java_window),
                    items,
                }
                .into(),
            );
        }
        out.push(slot_packet(
            BedrockSlot::new(window::UI, ui_slot::CURSOR),
            self.items.to_bedrock(&self.cursor),
        ));
        out
    }

    fn locate(&self, target: BedrockSlot) -> Result<Located, TranslationError> {
        if let Some(open) = self.open.as_ref().filter(|open| u32::from(open.java_window) == target.window) {
            let index = target.slot as usize;
            if index >= open.kind.slots {
                return Err(TranslationError::SlotOutOfRange {
                    slot: index,
                    size: open.kind.slots,
                });
            }
            return Ok(Located::Container(index));
        }
        (0..PLAYER_WINDOW_SLOTS)
            .find(|&index| player_slot(index) == Some(target))
            .map(Located::Player)
            .ok_or(TranslationError::UnknownContainer(
                i32::try_from(target.window).unwrap_or(i32::MAX),
            ))
    }

    /// Index of a located slot in the window a click would be sent for.
    fn java_index(&self, located: Located) -> Result<usize, TranslationError> {
        match (located, &self.open) {
            (Located::Container(index), _) | (Located::Player(index), None) => Ok(index),
            (Located::Player(index), Some(open)) => {
                let trailing = JAVA_MAIN_START..JAVA_MAIN_START + PLAYER_INVENTORY_SLOTS;
                if open.kind.has_player_inventory && trailing.contains(&index) {
                    Ok(open.kind.slots + index - JAVA_MAIN_START)
                } else {
                    Err(TranslationError::SlotOutOfRange {
                        slot: index,
                        size: open.kind.total_slots(),
                    })
                }
            }
        }
    }

    /// Records a player-window slot; returns the update when it changed.
    fn store_player_slot(&mut self, index: usize, slot: Slot, send: bool) -> Option<BedrockPacket> {
        let target = player_slot(index)?;
        let current = self.player.get_mut(index)?;
        if *current == slot {
            return None;
        }
        *current = slot;
        if !send || !self.player_announced {
            return None;
        }
        Some(slot_packet(target, self.items.to_bedrock(&self.player[index])))
    }

    fn set_cursor(&mut self, slot: Slot) -> Option<BedrockPacket> {
        if self.cursor == slot {
            return None;
        }
        self.cursor = slot;
        Some(slot_packet(
            BedrockSlot::new(window::UI, ui_slot::CURSOR),
            self.items.to_bedrock(&self.cursor),
        ))
    }

    /// Full player inventory, armor and offhand windows.
    fn player_contents(&self) -> Vec<BedrockPacket> {
        let inventory = (0..PLAYER_INVENTORY_SLOTS)
            .map(|slot| {
                let java = if slot < 9 { JAVA_HOTBAR_START + slot } else { slot };
                self.items.to_bedrock(&self.player[java])
            })
            .collect();
        let armor = (5..=8).map(|java| self.items.to_bedrock(&self.player[java])).collect();
        let offhand = vec![self.items.to_bedrock(&self.player[45])];
        let mut out: Vec<BedrockPacket> = [
            (window::INVENTORY, inventory),
            (window::ARMOR, armor),
            (window::OFFHAND, offhand),
        ]
        .into_iter()
        .map(|(window_id, items)| InventoryContent { window_id, items }.into())
        .collect();
        // The crafting grid lives in the UI window, which has no full update.
        for java in 0..=4 {
            if self.player[java].0.is_some() {
                if let Some(target) = player_slot(java) {
                    out.push(slot_packet(target, self.items.to_bedrock(&self.player[java])));
                }
            }
        }
        out
    }
}

fn slot_packet(target: BedrockSlot, item: ItemInstance) -> BedrockPacket {
    InventorySlot {
        window_id: target.window,
        slot: target.slot,
        item,
    }
    .into()
}

fn close_packet(java_window: u8) -> BedrockPacket {
    ContainerClose {
        window_id: java_window,
        server_initiated: true,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::Catalog,
        persistence::TrackedPositionRegistry,
        protocol::packet::java::{SlotData, TextComponent},
    };
    use std::sync::Arc;

    const STONE: i32 = 1;
    const DIRT: i32 = 28;

    fn mirror() -> InventoryMirror {
        InventoryMirror::new(ItemTranslator::new(
            Catalog::builtin().into_shared(),
            Arc::new(TrackedPositionRegistry::in_memory()),
        ))
    }

    fn stack(item_id: i32, count: i8) -> Slot {
        Slot(Some(SlotData {
            item_id,
            count,
            nbt: None,
        }))
    }

    fn contents(window_id: u8, slots: Vec<Slot>) -> SetContainerContents {
        SetContainerContents {
            window_id,
            state_id: 1,
            slots,
            carried_item: Slot(None),
        }
    }

    fn chest(window_id: i32) -> OpenScreen {
        OpenScreen {
            window_id,
            window_type: 2,
            title: TextComponent::plain("Chest"),
        }
    }

    #[test]
    fn player_slots_map_hotbar_first() {
        assert_eq!(player_slot(36), Some(BedrockSlot::new(window::INVENTORY, 0)));
        assert_eq!(player_slot(44), Some(BedrockSlot::new(window::INVENTORY, 8)));
        assert_eq!(player_slot(9), Some(BedrockSlot::new(window::INVENTORY, 9)));
        assert_eq!(player_slot(5), Some(BedrockSlot::new(window::ARMOR, 0)));
        assert_eq!(player_slot(45), Some(BedrockSlot::new(window::OFFHAND, 0)));
        assert_eq!(player_slot(46), None);
    }

    #[test]
    fn first_contents_are_full_then_diffs() {
        let mut inventory = mirror();
        let mut slots = vec![Slot(None); PLAYER_WINDOW_SLOTS];
        slots[36] = stack(STONE, 64);
        let out = inventory.set_contents(&contents(0, slots.clone())).unwrap();
        assert_eq!(out.len(), 3);
        let BedrockPacket::InventoryContent(main) = &out[0] else {
            panic!("expected InventoryContent");
        };
        assert_eq!(main.items.len(), PLAYER_INVENTORY_SLOTS);
        assert_eq!(main.items[0].count, 64);

        slots[10] = stack(DIRT, 3);
        let out = inventory.set_contents(&contents(0, slots)).unwrap();
        assert!(matches!(
            &out[..],
            [BedrockPacket::InventorySlot(InventorySlot { window_id: 0, slot: 10, .. })]
        ));
    }

    #[test]
    fn containers_announce_then_diff() {
        let mut inventory = mirror();
        let out = inventory.open(&chest(3), BlockPosition::new(0, 64, 0)).unwrap();
        assert!(matches!(
            &out[..],
            [BedrockPacket::ContainerOpen(ContainerOpen { window_id: 3, container_type: 0, .. })]
        ));

        let mut slots = vec![Slot(None); 27 + PLAYER_INVENTORY_SLOTS];
        slots[0] = stack(STONE, 1);
        let out = inventory.set_contents(&contents(3, slots.clone())).unwrap();
        let BedrockPacket::InventoryContent(content) = &out[0] else {
            panic!("expected InventoryContent");
        };
        assert_eq!((content.window_id, content.items.len()), (3, 27));

        slots[4] = stack(DIRT, 2);
        let out = inventory.set_contents(&contents(3, slots)).unwrap();
        assert!(matches!(
            &out[..],
            [BedrockPacket::InventorySlot(InventorySlot { window_id: 3, slot: 4, .. })]
        ));
    }

    #[test]
    fn trailing_container_slots_are_the_player_inventory() {
        let mut inventory = mirror();
        inventory
            .set_contents(&contents(0, vec![Slot(None); PLAYER_WINDOW_SLOTS]))
            .unwrap();
        inventory.open(&chest(3), BlockPosition::default()).unwrap();
        // Last slot of a 27-slot chest window is the last hotbar slot.
        let out = inventory
            .set_slot(&SetContainerSlot {
                window_id: 3,
                state_id: 2,
                slot: 27 + 35,
                data: stack(STONE, 5),
            })
            .unwrap();
        assert!(matches!(
            &out[..],
            [BedrockPacket::InventorySlot(InventorySlot { window_id: 0, slot: 8, .. })]
        ));
        assert_eq!(inventory.player_slot(44), Some(&stack(STONE, 5)));
    }

    #[test]
    fn out_of_range_slots_are_rejected() {
        let mut inventory = mirror();
        inventory.open(&chest(3), BlockPosition::default()).unwrap();
        let err = inventory
            .set_slot(&SetContainerSlot {
                window_id: 3,
                state_id: 0,
                slot: 200,
                data: Slot(None),
            })
            .unwrap_err();
        assert!(matches!(err, TranslationError::SlotOutOfRange { slot: 200, size: 63 }));

        let err = inventory
            .set_slot(&SetContainerSlot {
                window_id: 9,
                state_id: 0,
                slot: 0,
                data: Slot(None),
            })
            .unwrap_err();
        assert!(matches!(err, TranslationError::UnknownContainer(9)));
    }

    #[test]
    fn unknown_menu_types_are_rejected() {
        let mut inventory = mirror();
        let screen = OpenScreen {
            window_id: 1,
            window_type: 99,
            title: TextComponent::default(),
        };
        assert!(matches!(
            inventory.open(&screen, BlockPosition::default()),
            Err(TranslationError::UnknownContainer(99))
        ));
    }

    #[test]
    fn closing_goes_both_ways() {
        let mut inventory = mirror();
        inventory.open(&chest(3), BlockPosition::default()).unwrap();
        assert_eq!(inventory.client_closed(3).map(|c| c.window_id), Some(3));
        assert!(inventory.open_window().is_none());

        inventory.open(&chest(4), BlockPosition::default()).unwrap();
        let out = inventory.close(4);
        assert!(matches!(
            &out[..],
            [BedrockPacket::ContainerClose(ContainerClose { window_id: 4, server_initiated: true })]
        ));
        assert!(inventory.close(4).is_empty());
    }

    fn action(window_id: u32, slot: u32, to_item: ItemInstance) -> InventoryAction {
        InventoryAction {
            source: ActionSource::Container {
                window_id: window_id as i32,
            },
            slot,
            from_item: ItemInstance::air(),
            to_item,
        }
    }

    #[test]
    fn state_ids_follow_the_server() {
        let mut inventory = mirror();
        inventory
            .set_contents(&SetContainerContents {
                state_id: 5,
                ..contents(0, vec![Slot(None); PLAYER_WINDOW_SLOTS])
            })
            .unwrap();
        assert_eq!(inventory.state_id(0), Some(5));
        inventory
            .set_slot(&SetContainerSlot {
                window_id: 0,
                state_id: 7,
                slot: 36,
                data: stack(STONE, 1),
            })
            .unwrap();
        assert_eq!(inventory.state_id(0), Some(7));

        inventory.open(&chest(3), BlockPosition::default()).unwrap();
        inventory
            .set_contents(&SetContainerContents {
                state_id: 9,
                ..contents(3, vec![Slot(None); 27 + PLAYER_INVENTORY_SLOTS])
            })
            .unwrap();
        inventory
            .set_slot(&SetContainerSlot {
                window_id: 3,
                state_id: 10,
                slot: 0,
                data: stack(DIRT, 1),
            })
            .unwrap();
        assert_eq!(inventory.state_id(3), Some(10));
        assert_eq!(inventory.state_id(0), Some(7));
        assert_eq!(inventory.state_id(4), None);
    }

    #[test]
    fn silent_player_window_updates_are_applied() {
        let mut inventory = mirror();
        inventory
            .set_contents(&contents(0, vec![Slot(None); PLAYER_WINDOW_SLOTS]))
            .unwrap();
        let out = inventory
            .set_slot(&SetContainerSlot {
                window_id: -2,
                state_id: 4,
                slot: 36,
                data: stack(STONE, 2),
            })
            .unwrap();
        assert!(matches!(
            &out[..],
            [BedrockPacket::InventorySlot(InventorySlot { window_id: 0, slot: 0, .. })]
        ));
        assert_eq!(inventory.player_slot(36), Some(&stack(STONE, 2)));
        assert_eq!(inventory.state_id(0), Some(4));
    }

    #[test]
    fn client_moves_become_clicks() {
        let mut inventory = mirror();
        let mut slots = vec![Slot(None); PLAYER_WINDOW_SLOTS];
        slots[36] = stack(STONE, 4);
        inventory
            .set_contents(&SetContainerContents {
                state_id: 12,
                ..contents(0, slots)
            })
            .unwrap();
        let stone = inventory.items().to_bedrock(&stack(STONE, 4));

        // First hotbar slot into the first main inventory slot.
        let change = inventory
            .client_changes(&[
                action(window::INVENTORY, 0, ItemInstance::air()),
                action(window::INVENTORY, 9, stone),
            ])
            .unwrap();
        let Some(ServerboundChange::Click(click)) = change else {
            panic!("expected a click");
        };
        assert_eq!((click.window_id, click.state_id, click.slot), (0, 12, 36));
        assert_eq!(
            click.changed_slots,
            [
                ChangedSlot {
                    slot: 36,
                    item: Slot(None)
                },
                ChangedSlot {
                    slot: 9,
                    item: stack(STONE, 4)
                },
            ]
        );
        assert_eq!(inventory.player_slot(9), Some(&stack(STONE, 4)));

        // The server confirming the move is not sent back to the client.
        let echo = inventory
            .set_slot(&SetContainerSlot {
                window_id: 0,
                state_id: 13,
                slot: 9,
                data: stack(STONE, 4),
            })
            .unwrap();
        assert!(echo.is_empty());
    }

    #[test]
    fn clicks_in_a_container_use_its_layout() {
        let mut inventory = mirror();
        inventory.open(&chest(3), BlockPosition::default()).unwrap();
        inventory
            .set_contents(&SetContainerContents {
                state_id: 6,
                ..contents(3, vec![Slot(None); 27 + PLAYER_INVENTORY_SLOTS])
            })
            .unwrap();
        let dirt = inventory.items().to_bedrock(&stack(DIRT, 2));
        let change = inventory
            .client_changes(&[action(3, 4, dirt.clone()), action(window::INVENTORY, 0, dirt)])
            .unwrap();
        let Some(ServerboundChange::Click(click)) = change else {
            panic!("expected a click");
        };
        assert_eq!((click.window_id, click.state_id), (3, 6));
        let indices: Vec<_> = click.changed_slots.iter().map(|changed| changed.slot).collect();
        // The hotbar follows the 27 main inventory slots after the chest's own.
        assert_eq!(indices, [4, 27 + 27]);

        let armor = inventory.items().to_bedrock(&stack(STONE, 1));
        assert!(matches!(
            inventory.client_changes(&[action(window::ARMOR, 0, armor)]),
            Err(TranslationError::SlotOutOfRange { slot: 5, .. })
        ));
    }

    #[test]
    fn creative_takes_set_slots_directly() {
        let mut inventory = mirror();
        let stone = inventory.items().to_bedrock(&stack(STONE, 64));
        let change = inventory
            .client_changes(&[
                InventoryAction {
                    source: ActionSource::Creative,
                    slot: 0,
                    from_item: ItemInstance::air(),
                    to_item: stone.clone(),
                },
                action(window::INVENTORY, 2, stone),
            ])
            .unwrap();
        let Some(ServerboundChange::Creative(slots)) = change else {
            panic!("expected creative slots");
        };
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].slot, 38);
        assert_eq!(slots[0].clicked_item, stack(STONE, 64));
    }

    #[test]
    fn cursor_only_changes_carry_the_cursor() {
        let mut inventory = mirror();
        let stone = inventory.items().to_bedrock(&stack(STONE, 3));
        let change = inventory
            .client_changes(&[action(window::UI, ui_slot::CURSOR, stone)])
            .unwrap();
        let Some(ServerboundChange::Click(click)) = change else {
            panic!("expected a click");
        };
        assert_eq!(click.slot, SLOT_OUTSIDE);
        assert!(click.changed_slots.is_empty());
        assert_eq!(click.carried_item, stack(STONE, 3));
        assert!(inventory.client_changes(&[]).unwrap().is_none());
    }

    #[test]
    fn the_cursor_lives_in_the_ui_window() {
        let mut inventory = mirror();
        let out = inventory
            .set_slot(&SetContainerSlot {
                window_id: -1,
                state_id: 0,
                slot: -1,
                data: stack(STONE, 1),
            })
            .unwrap();
        assert!(matches!(
            &out[..],
            [BedrockPacket::InventorySlot(InventorySlot { window_id: window::UI, slot: 0, .. })]
        ));
    }
}
