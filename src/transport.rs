//! Byte transports for both sides of a session.
//!
//! A [`Channel`] is a pair of bounded flume channels. Reading and writing the
//! socket is offloaded to Tokio tasks so a session only ever deals with whole
//! frames (front side) or byte chunks (back side). Closing the channel, or
//! cancelling its token, shuts the socket down.

use anyhow::Context;
use bytes::Bytes;
use futures::{future::BoxFuture, SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite, LengthDelimitedCodec},
    sync::CancellationToken,
};

/// Frames or chunks buffered in each direction.
const CHANNEL_CAPACITY: usize = 64;
const READ_BUFFER_SIZE: usize = 8 * 1024;
/// Front frames carry whole batches.
const MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024 + 1;

/// One side of a duplex byte transport.
pub struct Channel {
    /// Received frames. Disconnects at end of stream.
    pub incoming: flume::Receiver<Bytes>,
    pub outgoing: flume::Sender<Bytes>,
}

impl Channel {
    /// Two connected in-memory ends.
    pub fn pair() -> (Channel, Channel) {
        let (a_tx, a_rx) = flume::bounded(CHANNEL_CAPACITY);
        let (b_tx, b_rx) = flume::bounded(CHANNEL_CAPACITY);
        (
            Channel {
                incoming: a_rx,
                outgoing: b_tx,
            },
            Channel {
                incoming: b_rx,
                outgoing: a_tx,
            },
        )
    }

    pub async fn send(&self, bytes: impl Into<Bytes>) -> anyhow::Result<()> {
        self.outgoing
            .send_async(bytes.into())
            .await
            .ok()
            .context("transport closed")
    }

    /// Next frame, or `None` at end of stream.
    pub async fn recv(&self) -> Option<Bytes> {
        self.incoming.recv_async().await.ok()
    }
}

/// Length-delimited frames over a byte stream. Used for the front side.
pub fn framed<S>(stream: S, cancel: CancellationToken) -> Channel
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let codec = || {
        LengthDelimitedCodec::builder()
            .max_frame_length(MAX_FRAME_LENGTH)
            .new_codec()
    };
    let (ours, theirs) = Channel::pair();

    let mut frames_in = FramedRead::new(reader, codec());
    let to_session = theirs.outgoing;
    let read_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = read_cancel.cancelled() => break,
                frame = frames_in.next() => frame,
            };
            match frame {
                Some(Ok(frame)) => {
                    if to_session.send_async(frame.freeze()).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!("Front read failed: {e}");
                    break;
                }
                None => break,
            }
        }
    });

    let mut frames_out = FramedWrite::new(writer, codec());
    let from_session = theirs.incoming;
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = from_session.recv_async() => frame,
            };
            let Ok(frame) = frame else { break };
            if let Err(e) = frames_out.send(frame).await {
                tracing::debug!("Front write failed: {e}");
                break;
            }
        }
        // Frames queued before the close are still written.
        for frame in from_session.drain() {
            if frames_out.send(frame).await.is_err() {
                break;
            }
        }
        frames_out.get_mut().shutdown().await.ok();
    });

    ours
}

/// Raw byte chunks over a byte stream. Used for the back side.
pub fn stream<S>(stream: S, cancel: CancellationToken) -> Channel
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (ours, theirs) = Channel::pair();

    let to_session = theirs.outgoing;
    let read_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let read = tokio::select! {
                _ = read_cancel.cancelled() => break,
                read = reader.read(&mut buffer) => read,
            };
            match read {
                Ok(0) => break,
                Ok(n) => {
                    if to_session
                        .send_async(Bytes::copy_from_slice(&buffer[..n]))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Back read failed: {e}");
                    break;
                }
            }
        }
    });

    let from_session = theirs.incoming;
    tokio::spawn(async move {
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => break,
                chunk = from_session.recv_async() => chunk,
            };
            let Ok(chunk) = chunk else { break };
            if let Err(e) = writer.write_all(&chunk).await {
                tracing::debug!("Back write failed: {e}");
                break;
            }
        }
        for chunk in from_session.drain() {
            if writer.write_all(&chunk).await.is_err() {
                break;
            }
        }
        writer.shutdown().await.ok();
    });

    ours
}

/// Opens the back-side connection for a session.
pub trait BackConnector: Send + Sync + 'static {
    fn connect(&self, cancel: CancellationToken) -> BoxFuture<'static, anyhow::Result<Channel>>;

    /// Host and port announced in the Java handshake.
    fn address(&self) -> (String, u16);
}

/// Connects to a Java server over TCP.
pub struct TcpConnector {
    remote: String,
}

impl TcpConnector {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
        }
    }
}

impl BackConnector for TcpConnector {
    fn connect(&self, cancel: CancellationToken) -> BoxFuture<'static, anyhow::Result<Channel>> {
        let remote = self.remote.clone();
        Box::pin(async move {
            let socket = TcpStream::connect(&remote)
                .await
                .with_context(|| format!("failed to connect to {remote}"))?;
            socket.set_nodelay(true)?;
            tracing::info!("Connected to Java server {remote}");
            Ok(stream(socket, cancel))
        })
    }

    fn address(&self) -> (String, u16) {
        match self.remote.rsplit_once(':') {
            Some((host, port)) => (host.to_owned(), port.parse().unwrap_or(25565)),
            None => (self.remote.clone(), 25565),
        }
    }
}
