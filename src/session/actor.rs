//! The task that drives one session, and its writer tasks.

use super::{outbound::OutboundQueue, BackItem, Event, FrontItem, Services, Session};
use crate::{
    error::BridgeError,
    protocol::{bedrock_codec::BedrockCodec, vanilla_codec::VanillaCodec},
    transport::Channel,
};
use anyhow::Context;
use bytes::Bytes;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Packets are split across frames past this many bytes.
const MAX_BATCH_BYTES: usize = 1024 * 1024;

/// How long the disconnect packet gets to reach the client.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs a session for a client connected through `front` until either side
/// closes or `cancel` fires.
pub async fn run(
    services: Arc<Services>,
    front: Channel,
    peer: SocketAddr,
    cancel: CancellationToken,
) -> Option<BridgeError> {
    let span = tracing::info_span!("session", %peer, player = tracing::field::Empty);
    drive(services, front, cancel).instrument(span).await
}

async fn drive(
    services: Arc<Services>,
    front: Channel,
    cancel: CancellationToken,
) -> Option<BridgeError> {
    tracing::info!("Accepted connection");
    let (mailbox, events) = flume::bounded(services.config.network.mailbox_capacity);
    let mut session = Session::new(services, mailbox, cancel.clone());
    session.start();

    let writer = tokio::spawn(
        write_front(session.front_queue(), front.outgoing.clone()).in_current_span(),
    );

    while !session.is_closed() {
        let back = session.back_incoming();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(BridgeError::TransportClosed.into()),
            event = events.recv_async() => match event {
                Ok(event) => session.handle_event(event),
                Err(_) => Err(BridgeError::TransportClosed.into()),
            },
            frame = front.incoming.recv_async() => match frame {
                Ok(frame) => session.receive_front(&frame),
                Err(_) => Err(BridgeError::TransportClosed.into()),
            },
            chunk = recv_back(back.as_ref()) => match chunk {
                Some(chunk) => session.receive_back(&chunk),
                None => Err(BridgeError::TransportClosed.into()),
            },
        };
        if let Err(e) = result {
            session.disconnect(BridgeError::classify(e));
        }
    }

    match timeout(FLUSH_TIMEOUT, writer).await {
        Ok(Ok(Err(e))) => tracing::debug!("Front writer stopped: {e:#}"),
        Ok(_) => {}
        Err(_) => tracing::debug!("Front writer did not finish flushing"),
    }
    cancel.cancel();
    session.close_reason.take()
}

async fn recv_back(incoming: Option<&flume::Receiver<Bytes>>) -> Option<Bytes> {
    match incoming {
        Some(incoming) => incoming.recv_async().await.ok(),
        None => std::future::pending().await,
    }
}

/// Owns the outbound Bedrock codec. Consecutive packets share a frame, and
/// codec changes apply from the next frame on.
pub(crate) async fn write_front(
    queue: Arc<OutboundQueue<FrontItem>>,
    outgoing: flume::Sender<Bytes>,
) -> anyhow::Result<()> {
    let mut codec = BedrockCodec::new();
    let mut pending = Vec::new();
    while let Some(items) = queue.next_batch().await {
        for item in items {
            match item {
                FrontItem::Packet(packet) => {
                    pending.push(packet);
                    if pending.iter().map(Vec::len).sum::<usize>() >= MAX_BATCH_BYTES {
                        flush_front(&mut codec, &mut pending, &outgoing).await?;
                    }
                }
                FrontItem::EnableCompression(threshold) => {
                    flush_front(&mut codec, &mut pending, &outgoing).await?;
                    codec.enable_compression(threshold);
                }
                FrontItem::EnableEncryption(cipher) => {
                    flush_front(&mut codec, &mut pending, &outgoing).await?;
                    codec.enable_encryption(*cipher)?;
                }
            }
        }
        flush_front(&mut codec, &mut pending, &outgoing).await?;
    }
    Ok(())
}

async fn flush_front(
    codec: &mut BedrockCodec,
    pending: &mut Vec<Vec<u8>>,
    outgoing: &flume::Sender<Bytes>,
) -> anyhow::Result<()> {
    if pending.is_empty() {
        return Ok(());
    }
    let frame = codec.encode_batch(pending.iter().map(Vec::as_slice))?;
    pending.clear();
    outgoing
        .send_async(Bytes::from(frame))
        .await
        .ok()
        .context("client transport closed")
}

/// Owns the outbound Java codec.
pub(crate) async fn write_back(
    queue: Arc<OutboundQueue<BackItem>>,
    outgoing: flume::Sender<Bytes>,
) -> anyhow::Result<()> {
    let mut codec = VanillaCodec::new();
    while let Some(items) = queue.next_batch().await {
        let mut bytes = Vec::new();
        for item in items {
            match item {
                BackItem::Packet(packet) => {
                    bytes.extend_from_slice(&codec.encode_raw(packet.id, &packet.body)?)
                }
                BackItem::SetCompression(threshold) => codec.set_compression(threshold),
            }
        }
        if !bytes.is_empty() {
            outgoing
                .send_async(Bytes::from(bytes))
                .await
                .ok()
                .context("server transport closed")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::outbound::Delivery;

    #[tokio::test]
    async fn front_frames_switch_codec_between_packets() {
        let queue = Arc::new(OutboundQueue::new(16));
        let (tx, rx) = flume::unbounded();
        let writer = tokio::spawn(write_front(Arc::clone(&queue), tx));

        queue.push(FrontItem::Packet(vec![0x8f, 1]), Delivery::Reliable);
        queue.push(FrontItem::EnableCompression(0), Delivery::Reliable);
        queue.push(FrontItem::Packet(vec![0x02, 0, 0, 0, 0]), Delivery::Reliable);
        queue.close();
        writer.await.unwrap().unwrap();

        let mut client = BedrockCodec::new();
        let first = client.decode_batch(&rx.recv().unwrap()).unwrap();
        assert_eq!(first[0].id, 0x8f);
        client.enable_compression(0);
        let second = client.decode_batch(&rx.recv().unwrap()).unwrap();
        assert_eq!(second[0].id, 0x02);
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn back_writer_frames_packets() {
        let queue = Arc::new(OutboundQueue::new(16));
        let (tx, rx) = flume::unbounded();
        let writer = tokio::spawn(write_back(Arc::clone(&queue), tx));
        queue.push(
            BackItem::Packet(crate::protocol::RawPacket::new(0x15, vec![0; 8])),
            Delivery::Reliable,
        );
        queue.close();
        writer.await.unwrap().unwrap();

        let mut codec = VanillaCodec::new();
        codec.give_data(&rx.recv().unwrap());
        let packet = codec.decode_packet().unwrap().unwrap();
        assert_eq!(packet.id, 0x15);
        assert_eq!(packet.body.len(), 8);
    }
}
