//! Accepts Bedrock connections and runs one session per connection.

use crate::{
    session::{actor, Services},
    transport,
};
use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Accepts connections on `listener` until `shutdown` fires. A failing
/// session never affects the others.
pub async fn run(
    listener: TcpListener,
    services: Arc<Services>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!(
        "Listening on {}, bridging to {}",
        listener.local_addr()?,
        services.config.network.remote
    );
    loop {
        let (socket, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted.context("listener closed")?,
        };
        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!("Could not disable Nagle for {peer}: {e}");
        }

        let cancel = shutdown.child_token();
        let front = transport::framed(socket, cancel.clone());
        let services = Arc::clone(&services);
        tokio::spawn(
            async move {
                if let Some(reason) = actor::run(services, front, peer, cancel).await {
                    tracing::debug!("Session for {peer} ended: {reason}");
                }
            }
            .in_current_span(),
        );
    }
    tracing::info!("Listener stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        protocol::{
            bedrock_codec::BedrockCodec,
            packet::bedrock::{client::RequestNetworkSettings, server::NetworkSettings},
            PacketId, BEDROCK_PROTOCOL_VERSION,
        },
        session::tests::services_with,
    };
    use bytes::Bytes;
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio_util::codec::{Framed, LengthDelimitedCodec};

    #[tokio::test]
    async fn accepted_clients_get_their_own_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(run(listener, services_with(Config::default()), shutdown.clone()));

        let socket = TcpStream::connect(address).await.unwrap();
        let mut framed = Framed::new(socket, LengthDelimitedCodec::new());
        let mut client = BedrockCodec::new();
        let request = BedrockCodec::packet_bytes(&RequestNetworkSettings {
            protocol_version: BEDROCK_PROTOCOL_VERSION,
        });
        framed
            .send(Bytes::from(client.encode_batch([request.as_slice()]).unwrap()))
            .await
            .unwrap();

        let frame = framed.next().await.unwrap().unwrap();
        let packets = client.decode_batch(&frame).unwrap();
        assert_eq!(packets[0].id, <NetworkSettings as PacketId>::ID);

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }
}
