// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

//! CONTEXT: devpmd: control service forcing storage power domains into suspend or back to active
//!
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - service_main_loop(config, notifier): serve the Unix control socket
//!   - run_with_transport(transport, context, notifier): serve any frame transport
//!   - handle_frame(context, frame): decode, dispatch and encode one request
//!   - ControlContext::dispatch(name, command): control interface behind the wire protocol
//!
//! ADR: docs/adr/0017-service-architecture.md

pub mod config;
pub mod control;
#[allow(missing_docs)]
pub mod protocol;
mod std_server;
pub mod transport;

pub use config::{ConfigError, DaemonConfig, DEFAULT_SOCKET_PATH};
pub use control::{reply_for, status_code, Command, ControlContext, Reply};
pub use std_server::*;
pub use transport::{
    loopback_transport, LoopbackClient, LoopbackTransport, Transport, TransportError, UnixClient,
    UnixTransport, DEFAULT_IO_TIMEOUT,
};
