// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Forced runtime power-state transitions for bus-attached storage devices
//! OWNERS: @runtime
//! STATUS: Functional (host backend)
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module + `userspace/devpm/tests/transitions.rs`
//!
//! PUBLIC API:
//!   - `DeviceBus`: collaborator trait implemented by bus backends
//!   - `Locator`: name lookup one level below each top-level bus device
//!   - `TransitionEngine`: guarded forced suspend/resume with status verification
//!   - `FlagOverride`: scoped policy-flag override restored on drop
//!   - `HostBus`: in-memory bus backend (feature `backend-host`)
//!
//! INVARIANTS:
//!   - Every policy flag forced during a transition is restored before the call returns
//!   - Flag save/force/restore for a power domain is serialized by a per-domain lock
//!   - A transition reports success only after the expected runtime status is observed
//!
//! ADR: docs/adr/0017-service-architecture.md

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

pub mod bus;
pub mod engine;
pub mod error;
pub mod guard;
pub mod locator;
pub mod locks;

#[cfg(feature = "backend-host")]
pub mod host;

pub use bus::{DeviceBus, DeviceId, FaultCode, PolicyFlag, RuntimeStatus, StorageView};
pub use engine::{Direction, TransitionEngine};
pub use error::{Error, Result};
pub use guard::{FlagOverride, FlagSite};
pub use locator::{sysfs_streq, DeviceRef, Locator};
pub use locks::DomainLocks;

#[cfg(feature = "backend-host")]
pub use host::{FlagWrite, HostBus, UnitConfig, FLAG_JOURNAL_CAPACITY};
