// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Frame transports for devpmd (in-process loopback, Unix stream socket)
//!
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - Transport: frame-level recv/send used by the service loop
//!   - loopback_transport(): client/server pair backed by in-memory channels
//!   - UnixTransport / UnixClient: u16le length-prefixed frames over a Unix stream socket
//!
//! INVARIANTS:
//!   - An accepted connection that stays silent or stalls mid-frame for longer than the I/O
//!     timeout is dropped, so one client cannot hold the socket
//!   - Accept failures other than a broken listener are logged and retried
//!
//! ERROR CONDITIONS:
//!   - TransportError::Closed: peer went away mid-call
//!   - TransportError::Io: socket failure
//!   - TransportError::FrameTooLarge: frame does not fit the u16 length prefix

use std::io::{self, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use parking_lot::Mutex;
use thiserror::Error;

/// Transport abstraction used by devpmd.
pub trait Transport {
    /// Error surfaced by the transport implementation.
    type Error: Into<TransportError>;

    /// Receives the next frame, `None` once the transport is closed.
    fn recv(&mut self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Sends a response frame back to the caller.
    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;
}

/// Transport level failures surfaced by [`Transport`] and the clients.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection closed by the peer.
    #[error("transport closed")]
    Closed,
    /// I/O failure.
    #[error("io error: {0}")]
    Io(String),
    /// Frame exceeds the length prefix.
    #[error("frame of {0} bytes exceeds the transport limit")]
    FrameTooLarge(usize),
}

impl From<io::Error> for TransportError {
    fn from(value: io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

/// Creates a loopback transport pair for host tests.
pub fn loopback_transport() -> (LoopbackClient, LoopbackTransport) {
    let (req_tx, req_rx) = mpsc::channel::<Vec<u8>>();
    let (rsp_tx, rsp_rx) = mpsc::channel::<Vec<u8>>();
    (
        LoopbackClient { request_tx: req_tx, response_rx: Mutex::new(rsp_rx) },
        LoopbackTransport { request_rx: req_rx, response_tx: rsp_tx },
    )
}

/// Client half of [`loopback_transport`].
pub struct LoopbackClient {
    request_tx: Sender<Vec<u8>>,
    response_rx: Mutex<Receiver<Vec<u8>>>,
}

impl LoopbackClient {
    /// Sends `frame` and blocks for the response.
    pub fn call(&self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.request_tx.send(frame.to_vec()).map_err(|_| TransportError::Closed)?;
        self.response_rx.lock().recv().map_err(|_| TransportError::Closed)
    }
}

/// Server half of [`loopback_transport`]; closes once every client is dropped.
pub struct LoopbackTransport {
    request_rx: Receiver<Vec<u8>>,
    response_tx: Sender<Vec<u8>>,
}

impl Transport for LoopbackTransport {
    type Error = TransportError;

    fn recv(&mut self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.request_rx.recv().ok())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.response_tx.send(frame.to_vec()).map_err(|_| TransportError::Closed)
    }
}

/// Reads one length-prefixed frame; `None` on a clean end of stream.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 2];
    match reader.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }
    let mut frame = vec![0u8; u16::from_le_bytes(prefix) as usize];
    reader.read_exact(&mut frame)?;
    Ok(Some(frame))
}

/// Writes one length-prefixed frame.
pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> Result<(), TransportError> {
    let len = u16::try_from(frame.len()).map_err(|_| TransportError::FrameTooLarge(frame.len()))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(frame)?;
    writer.flush()?;
    Ok(())
}

/// Read/write timeout applied to accepted connections unless overridden.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Whether an `accept` failure means the listener itself is unusable.
///
/// Aborted handshakes, descriptor or memory exhaustion and interrupts are transient.
pub fn accept_failure_is_fatal(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported)
}

/// Listening Unix socket serving one connection at a time.
///
/// Responses go to the connection the last request arrived on. A connection that ends, fails or
/// times out is dropped and the next one accepted; the socket file is removed when the transport
/// drops.
pub struct UnixTransport {
    listener: UnixListener,
    path: PathBuf,
    stream: Option<UnixStream>,
    io_timeout: Option<Duration>,
}

impl UnixTransport {
    /// Binds `path`, replacing a stale socket file.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref().to_path_buf();
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("devpmd: removed stale socket {}", path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        let listener = UnixListener::bind(&path)?;
        Ok(Self { listener, path, stream: None, io_timeout: Some(DEFAULT_IO_TIMEOUT) })
    }

    /// Sets the per-connection read/write timeout; zero disables it.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    fn accept(&mut self) -> Result<(), TransportError> {
        let stream = match self.listener.accept() {
            Ok((stream, _)) => stream,
            Err(err) if accept_failure_is_fatal(&err) => return Err(err.into()),
            Err(err) => {
                error!("devpmd: accept failed: {err}");
                thread::sleep(ACCEPT_BACKOFF);
                return Ok(());
            }
        };
        let configured = stream
            .set_read_timeout(self.io_timeout)
            .and_then(|()| stream.set_write_timeout(self.io_timeout));
        match configured {
            Ok(()) => self.stream = Some(stream),
            Err(err) => warn!("devpmd: dropping connection: {err}"),
        }
        Ok(())
    }

    /// Filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transport for UnixTransport {
    type Error = TransportError;

    fn recv(&mut self) -> Result<Option<Vec<u8>>, Self::Error> {
        loop {
            if self.stream.is_none() {
                self.accept()?;
            }
            let Some(stream) = self.stream.as_mut() else { continue };
            match read_frame(stream) {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => self.stream = None,
                Err(err) => {
                    warn!("devpmd: dropping connection: {err}");
                    self.stream = None;
                }
            }
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        write_frame(stream, frame)
    }
}

impl Drop for UnixTransport {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Client connection to a [`UnixTransport`].
pub struct UnixClient {
    stream: UnixStream,
}

impl UnixClient {
    /// Connects to the socket at `path`.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        Ok(Self { stream: UnixStream::connect(path)? })
    }

    /// Sends `frame` and blocks for the response.
    pub fn call(&mut self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        write_frame(&mut self.stream, frame)?;
        read_frame(&mut self.stream)?.ok_or(TransportError::Closed)
    }
}
