//! TCP syslog listener feeding the aggregator queue.
//!
//! Frames are either octet-counted (`<len> <msg>`) or newline-terminated;
//! the first byte of each frame decides which.

pub mod rfc5424;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::record::IngestionRecord;

/// Largest accepted frame.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Digits in the longest accepted octet count.
const MAX_LEN_DIGITS: u64 = 7;

/// Accepts syslog connections and pushes parsed records to the queue.
pub struct Listener {
    listener: TcpListener,
    read_timeout: Duration,
}

impl Listener {
    pub async fn bind(addr: &str, read_timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding syslog listener on {addr}"))?;

        Ok(Self {
            listener,
            read_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("reading listener address")
    }

    /// Serves until cancelled, then waits for every connection to finish so
    /// that no queue handle outlives the listener.
    pub async fn run(self, queue: mpsc::Sender<IngestionRecord>, cancel: CancellationToken) {
        if let Ok(addr) = self.local_addr() {
            info!(addr = %addr, "syslog listener started");
        }

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "syslog connection accepted");
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            queue.clone(),
                            cancel.clone(),
                            self.read_timeout,
                        ));
                    }
                    Err(e) => warn!(error = %e, "accepting syslog connection failed"),
                },

                // Reap finished connections.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(queue);
        while connections.join_next().await.is_some() {}

        info!("syslog listener stopped");
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    queue: mpsc::Sender<IngestionRecord>,
    cancel: CancellationToken,
    read_timeout: Duration,
) {
    let mut reader = BufReader::new(stream);

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = tokio::time::timeout(read_timeout, read_frame(&mut reader)) => frame,
        };

        let frame = match frame {
            Err(_) => {
                debug!(peer = %peer, "syslog connection idle, closing");
                break;
            }
            Ok(Err(e)) => {
                warn!(peer = %peer, error = %e, "reading syslog frame failed");
                break;
            }
            Ok(Ok(None)) => break,
            Ok(Ok(Some(frame))) => frame,
        };

        if frame.trim().is_empty() {
            continue;
        }

        match rfc5424::parse(&frame, Utc::now()) {
            Ok(record) => {
                if queue.send(record).await.is_err() {
                    debug!(peer = %peer, "queue closed, dropping connection");
                    break;
                }
            }
            Err(e) => warn!(peer = %peer, error = %e, "dropping malformed syslog message"),
        }
    }
}

/// Reads one frame. Returns `None` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let first = match reader.fill_buf().await?.first() {
        Some(b) => *b,
        None => return Ok(None),
    };

    let mut buf = Vec::new();

    if first.is_ascii_digit() {
        // MSG-LEN is NONZERO-DIGIT *DIGIT followed by a single space.
        if first == b'0' {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid frame length"));
        }

        let mut len = Vec::with_capacity(MAX_LEN_DIGITS as usize + 1);
        (&mut *reader)
            .take(MAX_LEN_DIGITS + 1)
            .read_until(b' ', &mut len)
            .await?;
        match len.pop() {
            Some(b' ') => {}
            _ if len.len() as u64 >= MAX_LEN_DIGITS => {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "frame length too long"));
            }
            _ => {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated frame length"));
            }
        }

        let len: usize = std::str::from_utf8(&len)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "invalid frame length"))?;
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds limit"),
            ));
        }

        buf.resize(len, 0);
        reader.read_exact(&mut buf).await?;
    } else {
        let mut limited = reader.take(MAX_FRAME_LEN as u64 + 1);
        limited.read_until(b'\n', &mut buf).await?;
        if buf.len() > MAX_FRAME_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "frame exceeds limit"));
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
