// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy shared by the locator, the engine and the control interface.

use crate::bus::{FaultCode, RuntimeStatus};
use crate::engine::Direction;

/// Result alias for device power operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Failures surfaced by a lookup or a forced transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Request rejected before any lookup (empty name, unknown command).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// No device with the requested name on the bus.
    #[error("no device named {name:?} on the bus")]
    NotFound {
        /// Requested device name.
        name: String,
    },
    /// More than one device on the bus carries the requested name.
    #[error("device name {name:?} matches {count} devices")]
    Ambiguous {
        /// Requested device name.
        name: String,
        /// Number of matching devices.
        count: usize,
    },
    /// The device has no power-manageable domain above it.
    #[error("device {name:?} has no power-manageable domain")]
    NotSupported {
        /// Requested device name.
        name: String,
    },
    /// The forced primitive itself reported failure.
    #[error("forced {direction} failed with code {code}")]
    TransitionFailed {
        /// Direction of the failed transition.
        direction: Direction,
        /// Code passed through from the bus backend.
        code: FaultCode,
    },
    /// The primitive succeeded but the domain did not reach the expected status.
    #[error("forced {direction} left the domain {observed}, expected {expected}")]
    VerificationFailed {
        /// Direction of the transition.
        direction: Direction,
        /// Status the transition must produce.
        expected: RuntimeStatus,
        /// Status observed after the primitive returned.
        observed: RuntimeStatus,
    },
}

impl Error {
    /// Backend code carried by [`Error::TransitionFailed`], zero for every other kind.
    pub fn fault_code(&self) -> FaultCode {
        match self {
            Self::TransitionFailed { code, .. } => *code,
            _ => 0,
        }
    }
}
