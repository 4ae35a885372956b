// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Guarded forced suspend/resume of a located device's power domain.
//!
//! The domain acted upon is the located device's parent. Resume additionally forces
//! `ignore_children` on the grandparent so the domain can become active without waiting on its
//! siblings. Each call performs exactly one attempt; retry policy belongs to the caller.

use core::fmt;
use std::sync::Arc;

use log::{debug, info};

use crate::bus::{DeviceBus, DeviceId, RuntimeStatus, StorageView};
use crate::error::{Error, Result};
use crate::guard::{FlagOverride, FlagSite};
use crate::locator::DeviceRef;
use crate::locks::DomainLocks;

/// Direction of a forced transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Drive the domain into the suspended state.
    Suspend,
    /// Drive the domain back to the active state.
    Resume,
}

impl Direction {
    /// Status the domain must report once the transition completed.
    pub const fn expected_status(self) -> RuntimeStatus {
        match self {
            Self::Suspend => RuntimeStatus::Suspended,
            Self::Resume => RuntimeStatus::Active,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspend => f.write_str("suspend"),
            Self::Resume => f.write_str("resume"),
        }
    }
}

/// Performs forced transitions against one bus.
pub struct TransitionEngine {
    bus: Arc<dyn DeviceBus>,
    locks: DomainLocks,
}

impl TransitionEngine {
    /// Creates an engine acting on `bus`.
    pub fn new(bus: Arc<dyn DeviceBus>) -> Self {
        Self { bus, locks: DomainLocks::new() }
    }

    /// Runs the transition selected by `direction`.
    pub fn transition(&self, device: &DeviceRef, direction: Direction) -> Result<()> {
        match direction {
            Direction::Suspend => self.suspend(device),
            Direction::Resume => self.resume(device),
        }
    }

    /// Forces the parent domain of `device` into the suspended state.
    pub fn suspend(&self, device: &DeviceRef) -> Result<()> {
        let target = self.domain_of(device, device.id())?;
        let outcome = {
            let target_lock = self.locks.handle(target);
            let _serialized = target_lock.lock();
            let view = self.view_of(device, target)?;
            let _start_stop = FlagOverride::force(&*self.bus, FlagSite::ManageStartStop(view));
            self.bus.force_suspend(view)
        };
        outcome.map_err(|code| Error::TransitionFailed { direction: Direction::Suspend, code })?;
        self.verify(device, target, Direction::Suspend)
    }

    /// Forces the parent domain of `device` back to the active state.
    pub fn resume(&self, device: &DeviceRef) -> Result<()> {
        let target = self.domain_of(device, device.id())?;
        let domain = self.domain_of(device, target)?;
        let outcome = {
            let domain_lock = self.locks.handle(domain);
            let target_lock = self.locks.handle(target);
            let _domain_serialized = domain_lock.lock();
            let _target_serialized = target_lock.lock();

            let _ignore_children = FlagOverride::force(&*self.bus, FlagSite::IgnoreChildren(domain));
            let view = self.view_of(device, target)?;
            let _start_stop = FlagOverride::force(&*self.bus, FlagSite::ManageStartStop(view));
            self.bus.force_resume(view)
        };
        outcome.map_err(|code| Error::TransitionFailed { direction: Direction::Resume, code })?;
        self.verify(device, target, Direction::Resume)
    }

    fn domain_of(&self, device: &DeviceRef, child: DeviceId) -> Result<DeviceId> {
        self.bus
            .parent(child)
            .ok_or_else(|| Error::NotSupported { name: device.name().to_string() })
    }

    fn view_of(&self, device: &DeviceRef, target: DeviceId) -> Result<StorageView> {
        self.bus
            .storage_view(target)
            .ok_or_else(|| Error::NotSupported { name: device.name().to_string() })
    }

    fn verify(&self, device: &DeviceRef, target: DeviceId, direction: Direction) -> Result<()> {
        let expected = direction.expected_status();
        let observed = self.bus.runtime_status(target);
        if observed != expected {
            debug!("devpm: {} {direction} verification saw {observed}", device.name());
            return Err(Error::VerificationFailed { direction, expected, observed });
        }
        info!("devpm: {} {direction} complete ({observed})", device.name());
        Ok(())
    }
}
