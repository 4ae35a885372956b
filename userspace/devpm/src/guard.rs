// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scoped policy-flag override.
//!
//! [`FlagOverride::force`] saves the current value of one flag and forces it to `true`; dropping
//! the guard writes the saved value back. Early returns, `?` and panics all unwind through
//! `Drop`, so there is no exit path that leaves a forced flag behind.

use log::debug;

use crate::bus::{DeviceBus, DeviceId, PolicyFlag, StorageView};

/// Location of one policy flag on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagSite {
    /// `manage_start_stop` of a storage domain.
    ManageStartStop(StorageView),
    /// `ignore_children` of a domain.
    IgnoreChildren(DeviceId),
}

impl FlagSite {
    /// Flag addressed by this site.
    pub fn flag(self) -> PolicyFlag {
        match self {
            Self::ManageStartStop(_) => PolicyFlag::ManageStartStop,
            Self::IgnoreChildren(_) => PolicyFlag::IgnoreChildren,
        }
    }

    /// Device carrying the flag.
    pub fn device(self) -> DeviceId {
        match self {
            Self::ManageStartStop(view) => view.device(),
            Self::IgnoreChildren(device) => device,
        }
    }

    /// Reads the flag through `bus`.
    pub fn read(self, bus: &dyn DeviceBus) -> bool {
        match self {
            Self::ManageStartStop(view) => bus.manage_start_stop(view),
            Self::IgnoreChildren(device) => bus.ignore_children(device),
        }
    }

    /// Writes the flag through `bus`.
    pub fn write(self, bus: &dyn DeviceBus, value: bool) {
        match self {
            Self::ManageStartStop(view) => bus.set_manage_start_stop(view, value),
            Self::IgnoreChildren(device) => bus.set_ignore_children(device, value),
        }
    }
}

/// Forced flag value that is restored when the guard goes out of scope.
#[must_use = "the flag is restored as soon as the guard is dropped"]
pub struct FlagOverride<'a> {
    bus: &'a dyn DeviceBus,
    site: FlagSite,
    saved: bool,
}

impl<'a> FlagOverride<'a> {
    /// Saves the flag at `site` and forces it to `true`.
    pub fn force(bus: &'a dyn DeviceBus, site: FlagSite) -> Self {
        let saved = site.read(bus);
        site.write(bus, true);
        debug!("devpm: forced {} on {} (saved {saved})", site.flag(), site.device());
        Self { bus, site, saved }
    }

    /// Value the flag had before it was forced.
    pub fn saved(&self) -> bool {
        self.saved
    }

    /// Site this guard overrides.
    pub fn site(&self) -> FlagSite {
        self.site
    }
}

impl Drop for FlagOverride<'_> {
    fn drop(&mut self) {
        self.site.write(self.bus, self.saved);
        debug!("devpm: restored {} on {} to {}", self.site.flag(), self.site.device(), self.saved);
    }
}
