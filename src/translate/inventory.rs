//! Container windows and their contents.

use crate::{
    inventory::ServerboundChange,
    protocol::{
        packet::{
            bedrock::{
                client::{transaction_kind, InventoryTransaction},
                ContainerClose,
            },
            java::{
                client::play::CloseContainer as JavaCloseContainer,
                server::play::{CloseContainer, OpenScreen, SetContainerContents, SetContainerSlot},
            },
        },
        JavaState,
    },
    registry::{HandlerOutcome, Phase, Priority, Registry},
    session::{
        state::{IN_WORLD, PLAYING},
        Session,
    },
};

pub fn register(registry: &mut Registry<Session>) -> anyhow::Result<()> {
    let play = Phase::Java(JavaState::Play);
    registry.register(play, IN_WORLD, Priority::Normal, on_open_screen)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_contents)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_slot)?;
    registry.register(play, IN_WORLD, Priority::Normal, on_server_close)?;
    registry.register(Phase::Bedrock, PLAYING, Priority::Normal, on_client_close)?;
    registry.register(Phase::Bedrock, PLAYING, Priority::Normal, on_transaction)?;
    Ok(())
}

fn on_open_screen(session: &mut Session, packet: &mut OpenScreen) -> anyhow::Result<HandlerOutcome> {
    let position = session.play.position.block();
    match session.inventory.open(packet, position) {
        Ok(packets) => session.send_front_all(packets),
        Err(e) => {
            tracing::warn!("Cannot open {:?}: {e}", packet.title.to_plain());
            if let Ok(window_id) = u8::try_from(packet.window_id) {
                session.send_back(&JavaCloseContainer { window_id });
            }
        }
    }
    Ok(HandlerOutcome::Handled)
}

fn on_contents(session: &mut Session, packet: &mut SetContainerContents) -> anyhow::Result<HandlerOutcome> {
    match session.inventory.set_contents(packet) {
        Ok(packets) => session.send_front_all(packets),
        Err(e) => tracing::warn!("Dropping contents of window {}: {e}", packet.window_id),
    }
    Ok(HandlerOutcome::Handled)
}

fn on_slot(session: &mut Session, packet: &mut SetContainerSlot) -> anyhow::Result<HandlerOutcome> {
    match session.inventory.set_slot(packet) {
        Ok(packets) => session.send_front_all(packets),
        Err(e) => tracing::warn!(
            "Dropping slot {} of window {}: {e}",
            packet.slot,
            packet.window_id
        ),
    }
    Ok(HandlerOutcome::Handled)
}

fn on_server_close(session: &mut Session, packet: &mut CloseContainer) -> anyhow::Result<HandlerOutcome> {
    let packets = session.inventory.close(packet.window_id);
    session.send_front_all(packets);
    Ok(HandlerOutcome::Handled)
}

fn on_client_close(session: &mut Session, packet: &mut ContainerClose) -> anyhow::Result<HandlerOutcome> {
    if let Some(close) = session.inventory.client_closed(packet.window_id) {
        session.send_back(&close);
    }
    // The client keeps the window up until the close is acknowledged.
    session.send_front(ContainerClose {
        window_id: packet.window_id,
        server_initiated: false,
    });
    Ok(HandlerOutcome::Handled)
}

fn on_transaction(
    session: &mut Session,
    packet: &mut InventoryTransaction,
) -> anyhow::Result<HandlerOutcome> {
    match packet.kind {
        transaction_kind::NORMAL => {}
        transaction_kind::MISMATCH => {
            let packets = session.inventory.resync();
            session.send_front_all(packets);
            return Ok(HandlerOutcome::Handled);
        }
        // Item use is not translated.
        _ => return Ok(HandlerOutcome::Unhandled),
    }
    match session.inventory.client_changes(&packet.actions) {
        Ok(Some(ServerboundChange::Creative(slots))) => {
            for slot in &slots {
                session.send_back(slot);
            }
        }
        Ok(Some(ServerboundChange::Click(click))) => session.send_back(&click),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!("Rejecting inventory transaction: {e}");
            let packets = session.inventory.resync();
            session.send_front_all(packets);
        }
    }
    Ok(HandlerOutcome::Handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::{
            bedrock_codec::BedrockCodec,
            packet::{
                bedrock::{
                    client::{ActionSource, InventoryAction},
                    server::{ContainerOpen, InventoryContent},
                },
                java::{
                    client::play::{ClickContainer, SetCreativeModeSlot},
                    Slot, SlotData, TextComponent,
                },
            },
            PacketId,
        },
        session::tests::{client_frame, java_bytes, playing_session, sent_back, sent_front_plain},
    };

    fn screen(window_type: i32) -> OpenScreen {
        OpenScreen {
            window_id: 3,
            window_type,
            title: TextComponent::plain("Chest"),
        }
    }

    #[test]
    fn chests_open_and_fill() {
        let (mut session, _rx) = playing_session();
        session.receive_back(&java_bytes(&screen(2))).unwrap();
        let sent = sent_front_plain(&session);
        let opened: ContainerOpen = sent[0].decode().unwrap();
        assert_eq!(opened.window_id, 3);

        let mut slots = vec![Slot(None); 27 + 36];
        slots[0] = Slot(Some(SlotData {
            item_id: 1,
            count: 5,
            nbt: None,
        }));
        session
            .receive_back(&java_bytes(&SetContainerContents {
                window_id: 3,
                state_id: 1,
                slots,
                carried_item: Slot(None),
            }))
            .unwrap();
        let sent = sent_front_plain(&session);
        assert_eq!(sent[0].id, <InventoryContent as PacketId>::ID);
        let content: InventoryContent = sent[0].decode().unwrap();
        assert_eq!(content.items.len(), 27);
        assert_eq!(content.items[0].count, 5);
    }

    #[test]
    fn unknown_windows_are_closed_on_the_server() {
        let (mut session, _rx) = playing_session();
        session.receive_back(&java_bytes(&screen(-7))).unwrap();
        assert!(sent_front_plain(&session).is_empty());
        let close: JavaCloseContainer = sent_back(&session)[0].decode().unwrap();
        assert_eq!(close.window_id, 3);
    }

    #[test]
    fn client_closes_are_relayed_and_acknowledged() {
        let (mut session, _rx) = playing_session();
        session.receive_back(&java_bytes(&screen(2))).unwrap();
        sent_front_plain(&session);

        let mut client = BedrockCodec::new();
        let close = BedrockCodec::packet_bytes(&ContainerClose {
            window_id: 3,
            server_initiated: false,
        });
        session.receive_front(&client_frame(&mut client, &close)).unwrap();

        let relayed: JavaCloseContainer = sent_back(&session)[0].decode().unwrap();
        assert_eq!(relayed.window_id, 3);
        let echoed: ContainerClose = sent_front_plain(&session)[0].decode().unwrap();
        assert_eq!(echoed.window_id, 3);
        assert!(session.inventory.open_window().is_none());
    }

    fn stone(count: i8) -> Slot {
        Slot(Some(SlotData {
            item_id: 1,
            count,
            nbt: None,
        }))
    }

    fn moved_into(session: &Session, window_id: i32, slot: u32, stack: &Slot) -> InventoryAction {
        InventoryAction {
            source: ActionSource::Container { window_id },
            slot,
            from_item: Default::default(),
            to_item: session.inventory.items().to_bedrock(stack),
        }
    }

    #[test]
    fn container_moves_reach_the_server_as_clicks() {
        let (mut session, _rx) = playing_session();
        session.receive_back(&java_bytes(&screen(2))).unwrap();
        session
            .receive_back(&java_bytes(&SetContainerContents {
                window_id: 3,
                state_id: 8,
                slots: vec![Slot(None); 27 + 36],
                carried_item: Slot(None),
            }))
            .unwrap();
        sent_front_plain(&session);

        let mut client = BedrockCodec::new();
        let transaction = InventoryTransaction::normal(vec![moved_into(&session, 3, 0, &stone(5))]);
        session
            .receive_front(&client_frame(&mut client, &BedrockCodec::packet_bytes(&transaction)))
            .unwrap();

        let sent = sent_back(&session);
        assert_eq!(sent[0].id, <ClickContainer as PacketId>::ID);
        let click: ClickContainer = sent[0].decode().unwrap();
        assert_eq!((click.window_id, click.state_id, click.slot), (3, 8, 0));
        assert_eq!(click.changed_slots[0].item, stone(5));
        assert!(sent_front_plain(&session).is_empty());
    }

    #[test]
    fn creative_picks_set_the_slot() {
        let (mut session, _rx) = playing_session();
        let mut actions = vec![moved_into(&session, 0, 4, &stone(64))];
        actions.insert(
            0,
            InventoryAction {
                source: ActionSource::Creative,
                ..moved_into(&session, 0, 0, &stone(64))
            },
        );
        let mut client = BedrockCodec::new();
        let transaction = InventoryTransaction::normal(actions);
        session
            .receive_front(&client_frame(&mut client, &BedrockCodec::packet_bytes(&transaction)))
            .unwrap();

        let set: SetCreativeModeSlot = sent_back(&session)[0].decode().unwrap();
        assert_eq!(set.slot, 40);
        assert_eq!(set.clicked_item, stone(64));
    }

    #[test]
    fn impossible_moves_resync_the_client() {
        let (mut session, _rx) = playing_session();
        let mut client = BedrockCodec::new();
        let transaction = InventoryTransaction::normal(vec![moved_into(&session, 77, 0, &stone(1))]);
        session
            .receive_front(&client_frame(&mut client, &BedrockCodec::packet_bytes(&transaction)))
            .unwrap();

        assert!(sent_back(&session).is_empty());
        let sent = sent_front_plain(&session);
        assert!(sent.iter().any(|packet| packet.id == <InventoryContent as PacketId>::ID));
    }
}
