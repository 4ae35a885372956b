// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: devpmd service loop: decode request frames, dispatch, answer every frame
//!
//! OWNERS: @runtime
//!
//! TEST_COVERAGE: `tests/control_roundtrip.rs` drives this loop over the loopback transport

use std::sync::Arc;

use log::{error, info};
use thiserror::Error;

use crate::config::DaemonConfig;
use crate::control::{reply_for, ControlContext};
use crate::protocol::{self, OP_INVALID};
use crate::transport::{Transport, TransportError, UnixTransport};

/// Result alias used by the service.
pub type Result<T> = core::result::Result<T, ServerError>;

/// Errors surfaced while serving requests.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Transport level failure.
    #[error("transport error: {0}")]
    Transport(TransportError),
}

impl From<TransportError> for ServerError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

/// Notifies the init process once the service is accepting requests.
pub struct ReadyNotifier(Box<dyn FnOnce() + Send>);

impl ReadyNotifier {
    /// Creates a notifier from `func`.
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(func))
    }

    /// Emits the ready marker.
    pub fn notify(self) {
        (self.0)();
    }
}

/// Runs the service on the Unix socket named by `config`.
pub fn service_main_loop(config: &DaemonConfig, notifier: ReadyNotifier) -> Result<()> {
    let context = ControlContext::new(Arc::new(config.build_bus()));
    let mut transport =
        UnixTransport::bind(&config.socket_path)?.with_io_timeout(config.io_timeout());
    info!("devpmd: listening on {}", transport.path().display());
    let outcome = run_with_transport(&mut transport, &context, notifier);
    drop(transport);
    drop(context);
    info!("devpmd: shut down");
    outcome
}

/// Runs the service loop over `transport` until it closes.
pub fn run_with_transport<T: Transport>(
    transport: &mut T,
    context: &ControlContext,
    notifier: ReadyNotifier,
) -> Result<()> {
    notifier.notify();
    info!("devpmd: ready (bus {})", context.bus_name());
    run_loop(transport, context)
}

fn run_loop<T: Transport>(transport: &mut T, context: &ControlContext) -> Result<()> {
    loop {
        let frame = match transport.recv() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(()),
            Err(err) => return Err(ServerError::Transport(err.into())),
        };
        let response = handle_frame(context, &frame);
        if let Err(err) = transport.send(&response) {
            let err: TransportError = err.into();
            error!("devpmd: send error: {err}");
        }
    }
}

/// Decodes one request frame and returns the response frame.
///
/// Frames that cannot be decoded are answered with an error status; this never panics.
pub fn handle_frame(context: &ControlContext, frame: &[u8]) -> Vec<u8> {
    let request = match protocol::decode_request(frame) {
        Ok(request) => request,
        Err(err) => {
            error!("devpmd: rejecting frame: {err}");
            let opcode = frame.get(3).copied().unwrap_or(OP_INVALID) & !protocol::OP_RESPONSE;
            return protocol::encode_response(opcode, err.status(), 0);
        }
    };
    let opcode = request.command.opcode();
    let name = core::str::from_utf8(&request.name).ok();
    let outcome = match name {
        Some(name) => context.dispatch(Some(name), request.command),
        None => Err(devpm::Error::InvalidArgument("device name is not utf-8")),
    };
    let reply = reply_for(&outcome);
    protocol::encode_response(opcode, reply.status, reply.detail)
}
