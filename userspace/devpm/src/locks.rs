// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-domain exclusive locks serializing flag save/force/restore sequences.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::DeviceId;

/// Lazily populated table of one lock per power domain.
///
/// Callers that need several domains must lock ancestors before descendants.
#[derive(Default)]
pub struct DomainLocks {
    domains: Mutex<HashMap<DeviceId, Arc<Mutex<()>>>>,
}

impl DomainLocks {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `domain`, creating it on first use.
    pub fn handle(&self, domain: DeviceId) -> Arc<Mutex<()>> {
        self.domains.lock().entry(domain).or_default().clone()
    }

    /// Number of domains that have been locked at least once.
    pub fn len(&self) -> usize {
        self.domains.lock().len()
    }

    /// Returns `true` when no domain has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.domains.lock().is_empty()
    }
}
