// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Collaborator interface consumed by the locator and the transition engine.
//!
//! A [`DeviceBus`] owns the device objects, their policy flags and their runtime power status.
//! This crate never caches anything it reads through the trait: every request walks the bus
//! again and discards the handles afterwards.

use core::fmt;

/// Low-level failure code reported by a forced transition primitive (negative errno style).
pub type FaultCode = i32;

/// Opaque identifier of a device known to a [`DeviceBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(u64);

impl DeviceId {
    /// Wraps a backend specific raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev#{}", self.0)
    }
}

/// Runtime power status of a power domain as observed through the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeStatus {
    /// Domain is powered and serving requests.
    Active,
    /// Domain is in its low-power state.
    Suspended,
    /// Any other state, including transitions in flight and error states.
    Other,
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Policy flags temporarily overridden during a forced transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyFlag {
    /// Start/stop of the storage domain is under manual control.
    ManageStartStop,
    /// Aggregate status computation of a domain ignores its children.
    IgnoreChildren,
}

impl fmt::Display for PolicyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManageStartStop => f.write_str("manage_start_stop"),
            Self::IgnoreChildren => f.write_str("ignore_children"),
        }
    }
}

/// Power-manageable view of a storage domain.
///
/// Only a bus hands these out, through [`DeviceBus::storage_view`]; the flag accessors and the
/// forced primitives require one, so a device without the capability cannot reach them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageView {
    device: DeviceId,
}

impl StorageView {
    /// Creates a view for `device`. Intended for [`DeviceBus`] implementations only.
    pub const fn new(device: DeviceId) -> Self {
        Self { device }
    }

    /// Device the view refers to.
    pub const fn device(self) -> DeviceId {
        self.device
    }
}

/// Devices of one fixed bus type plus the power-management primitives acting on them.
pub trait DeviceBus: Send + Sync {
    /// Name of the bus type (for example `scsi`).
    fn bus_name(&self) -> &str;

    /// Enumerates the top-level devices registered on the bus.
    fn top_level(&self) -> Vec<DeviceId>;

    /// Returns every direct child of `parent` whose name satisfies `matches`.
    fn find_children(&self, parent: DeviceId, matches: &dyn Fn(&str) -> bool) -> Vec<DeviceId>;

    /// Name of `device`, `None` if the device vanished.
    fn name(&self, device: DeviceId) -> Option<String>;

    /// Parent of `device`, `None` for roots.
    fn parent(&self, device: DeviceId) -> Option<DeviceId>;

    /// Capability query for the power-manageable storage view of `device`.
    fn storage_view(&self, device: DeviceId) -> Option<StorageView>;

    /// Reads `manage_start_stop` of the storage domain.
    fn manage_start_stop(&self, view: StorageView) -> bool;

    /// Writes `manage_start_stop` of the storage domain.
    fn set_manage_start_stop(&self, view: StorageView, value: bool);

    /// Reads `ignore_children` of `device`.
    fn ignore_children(&self, device: DeviceId) -> bool;

    /// Writes `ignore_children` of `device`.
    fn set_ignore_children(&self, device: DeviceId, value: bool);

    /// Forces the domain into the suspended state. Blocks until the backend is done.
    fn force_suspend(&self, view: StorageView) -> Result<(), FaultCode>;

    /// Forces the domain back to the active state. Blocks until the backend is done.
    fn force_resume(&self, view: StorageView) -> Result<(), FaultCode>;

    /// Current runtime power status of `device`.
    fn runtime_status(&self, device: DeviceId) -> RuntimeStatus;
}
