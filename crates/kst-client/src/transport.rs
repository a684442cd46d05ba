//! TCP transport for the chat session.
//!
//! A thin layer: dial with a timeout, read raw chunks, write whole lines.
//! Framing of inbound data stays in the session, which needs the
//! unterminated tail to spot prompts.

use std::{io, time::Duration};

use bytes::BytesMut;
use futures::SinkExt;
use kst_proto::LineCodec;
use socket2::{SockRef, TcpKeepalive};
use tokio::{
    io::AsyncReadExt,
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};
use tokio_util::codec::FramedWrite;

use crate::{config::KeepaliveConfig, error::ClientError};

/// Initial capacity of the read buffer.
const READ_BUFFER_CAPACITY: usize = 4096;

/// Open a TCP connection to `server`.
pub async fn dial(
    server: String,
    timeout: Duration,
    keepalive: Option<KeepaliveConfig>,
) -> Result<TcpStream, ClientError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(&server))
        .await
        .map_err(|_| ClientError::ConnectTimeout { server: server.clone(), after: timeout })??;

    stream.set_nodelay(true)?;
    if let Some(keepalive) = keepalive
        && let Err(e) = enable_keepalive(&stream, keepalive)
    {
        tracing::warn!("failed to enable TCP keepalive: {}", e);
    }

    tracing::debug!(%server, "tcp connected");
    Ok(stream)
}

fn enable_keepalive(stream: &TcpStream, config: KeepaliveConfig) -> io::Result<()> {
    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new().with_time(config.time).with_interval(config.interval);
    sock.set_tcp_keepalive(&keepalive)
}

/// An open connection.
#[derive(Debug)]
pub struct Transport {
    reader: OwnedReadHalf,
    writer: FramedWrite<OwnedWriteHalf, LineCodec>,
    buffer: BytesMut,
}

impl Transport {
    /// Wrap a connected stream.
    pub fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader,
            writer: FramedWrite::new(writer, LineCodec::new()),
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
        }
    }

    /// Read whatever is available. An empty chunk means the peer closed.
    ///
    /// Cancel safe: no bytes are lost if the future is dropped.
    pub async fn read_chunk(&mut self) -> io::Result<Vec<u8>> {
        self.buffer.reserve(READ_BUFFER_CAPACITY);
        self.reader.read_buf(&mut self.buffer).await?;
        Ok(self.buffer.split().to_vec())
    }

    /// Write one line followed by `\r\n` and flush.
    pub async fn send_line(&mut self, line: String) -> io::Result<()> {
        self.writer.send(line).await
    }
}
