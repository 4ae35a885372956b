// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: In-memory bus backend for host-first development and tests
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Exercised by every engine/locator test and `tests/transitions.rs`
//!
//! Topology is three levels deep: hosts (not enumerated on the bus) own units (the top-level bus
//! devices and the power domains that get suspended), units own named disks.
//!
//! Forced primitives follow the gates the engine has to override:
//!   - suspend and resume fail with [`EPERM`] unless the unit's `manage_start_stop` is set
//!   - resume fails with [`EBUSY`] unless the owning host has `ignore_children` set
//!
//! Fault injection: [`HostBus::fail_next`] makes the next primitive on a unit fail with a code,
//! [`HostBus::pin_status`] makes primitives report success without changing the status.
//! The flag-write journal keeps the newest [`FLAG_JOURNAL_CAPACITY`] writes.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::bus::{DeviceBus, DeviceId, FaultCode, PolicyFlag, RuntimeStatus, StorageView};

/// Operation not permitted.
pub const EPERM: FaultCode = -1;
/// I/O error.
pub const EIO: FaultCode = -5;
/// Device or resource busy.
pub const EBUSY: FaultCode = -16;

/// Flag writes retained by [`HostBus::flag_writes`]; older entries are discarded.
pub const FLAG_JOURNAL_CAPACITY: usize = 256;

/// One recorded write to a policy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagWrite {
    /// Device whose flag was written.
    pub device: DeviceId,
    /// Flag that was written.
    pub flag: PolicyFlag,
    /// Value written.
    pub value: bool,
}

/// Initial state of a unit added with [`HostBus::add_unit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitConfig {
    name: String,
    storage: bool,
    manage_start_stop: bool,
    status: RuntimeStatus,
}

impl UnitConfig {
    /// Active storage unit with `manage_start_stop` cleared.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage: true,
            manage_start_stop: false,
            status: RuntimeStatus::Active,
        }
    }

    /// Whether the unit exposes a power-manageable storage view.
    pub fn storage(mut self, storage: bool) -> Self {
        self.storage = storage;
        self
    }

    /// Initial `manage_start_stop` value.
    pub fn manage_start_stop(mut self, value: bool) -> Self {
        self.manage_start_stop = value;
        self
    }

    /// Initial runtime status.
    pub fn status(mut self, status: RuntimeStatus) -> Self {
        self.status = status;
        self
    }
}

struct Node {
    name: String,
    parent: Option<DeviceId>,
    children: Vec<DeviceId>,
    storage: bool,
    manage_start_stop: bool,
    ignore_children: bool,
    status: RuntimeStatus,
    fail_next: Option<FaultCode>,
    pinned: bool,
    transitions: u64,
}

impl Node {
    fn new(name: String, parent: Option<DeviceId>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            storage: false,
            manage_start_stop: false,
            ignore_children: false,
            status: RuntimeStatus::Active,
            fail_next: None,
            pinned: false,
            transitions: 0,
        }
    }
}

#[derive(Default)]
struct Topology {
    nodes: Vec<Node>,
    bus_devices: Vec<DeviceId>,
    flag_writes: VecDeque<FlagWrite>,
}

impl Topology {
    fn insert(&mut self, node: Node) -> DeviceId {
        let id = DeviceId::new(self.nodes.len() as u64);
        if let Some(parent) = node.parent {
            if let Some(parent) = self.node_mut(parent) {
                parent.children.push(id);
            }
        }
        self.nodes.push(node);
        id
    }

    fn node(&self, id: DeviceId) -> Option<&Node> {
        self.nodes.get(id.raw() as usize)
    }

    fn node_mut(&mut self, id: DeviceId) -> Option<&mut Node> {
        self.nodes.get_mut(id.raw() as usize)
    }

    fn record(&mut self, device: DeviceId, flag: PolicyFlag, value: bool) {
        if self.flag_writes.len() == FLAG_JOURNAL_CAPACITY {
            self.flag_writes.pop_front();
        }
        self.flag_writes.push_back(FlagWrite { device, flag, value });
    }

    /// Shared gate/fault handling of both forced primitives.
    fn force(&mut self, device: DeviceId, to: RuntimeStatus) -> Result<(), FaultCode> {
        let domain_ignores_children = self
            .node(device)
            .and_then(|node| node.parent)
            .and_then(|parent| self.node(parent))
            .is_some_and(|parent| parent.ignore_children);
        let node = self.node_mut(device).ok_or(EIO)?;
        node.transitions += 1;
        if let Some(code) = node.fail_next.take() {
            return Err(code);
        }
        if !node.manage_start_stop {
            return Err(EPERM);
        }
        if to == RuntimeStatus::Active && !domain_ignores_children {
            return Err(EBUSY);
        }
        if !node.pinned {
            node.status = to;
        }
        Ok(())
    }
}

/// In-memory [`DeviceBus`] implementation.
pub struct HostBus {
    bus_name: String,
    topology: Mutex<Topology>,
}

impl HostBus {
    /// Creates an empty bus called `bus_name`.
    pub fn new(bus_name: impl Into<String>) -> Self {
        Self { bus_name: bus_name.into(), topology: Mutex::new(Topology::default()) }
    }

    /// Adds a host (grandparent domain). Hosts are not enumerated as bus devices.
    pub fn add_host(&self, name: &str, ignore_children: bool) -> DeviceId {
        let mut node = Node::new(name.to_string(), None);
        node.ignore_children = ignore_children;
        self.topology.lock().insert(node)
    }

    /// Adds a unit below `host` and registers it as a top-level bus device.
    pub fn add_unit(&self, host: DeviceId, config: UnitConfig) -> DeviceId {
        let mut node = Node::new(config.name, Some(host));
        node.storage = config.storage;
        node.manage_start_stop = config.manage_start_stop;
        node.status = config.status;
        let mut topology = self.topology.lock();
        let id = topology.insert(node);
        topology.bus_devices.push(id);
        id
    }

    /// Adds a named disk below `unit`.
    pub fn add_disk(&self, unit: DeviceId, name: &str) -> DeviceId {
        self.topology.lock().insert(Node::new(name.to_string(), Some(unit)))
    }

    /// Makes the next forced primitive on `device` fail with `code`.
    pub fn fail_next(&self, device: DeviceId, code: FaultCode) {
        if let Some(node) = self.topology.lock().node_mut(device) {
            node.fail_next = Some(code);
        }
    }

    /// While pinned, forced primitives on `device` succeed without changing its status.
    pub fn pin_status(&self, device: DeviceId, pinned: bool) {
        if let Some(node) = self.topology.lock().node_mut(device) {
            node.pinned = pinned;
        }
    }

    /// Reads a flag without going through a storage view.
    pub fn flag(&self, device: DeviceId, flag: PolicyFlag) -> bool {
        let topology = self.topology.lock();
        topology.node(device).is_some_and(|node| match flag {
            PolicyFlag::ManageStartStop => node.manage_start_stop,
            PolicyFlag::IgnoreChildren => node.ignore_children,
        })
    }

    /// Recent flag writes issued through the [`DeviceBus`] interface, oldest first.
    pub fn flag_writes(&self) -> Vec<FlagWrite> {
        self.topology.lock().flag_writes.iter().copied().collect()
    }

    /// Number of forced primitives invoked on `device`.
    pub fn transitions(&self, device: DeviceId) -> u64 {
        self.topology.lock().node(device).map_or(0, |node| node.transitions)
    }
}

impl DeviceBus for HostBus {
    fn bus_name(&self) -> &str {
        &self.bus_name
    }

    fn top_level(&self) -> Vec<DeviceId> {
        self.topology.lock().bus_devices.clone()
    }

    fn find_children(&self, parent: DeviceId, matches: &dyn Fn(&str) -> bool) -> Vec<DeviceId> {
        let topology = self.topology.lock();
        let Some(parent) = topology.node(parent) else {
            return Vec::new();
        };
        parent
            .children
            .iter()
            .copied()
            .filter(|child| topology.node(*child).is_some_and(|node| matches(&node.name)))
            .collect()
    }

    fn name(&self, device: DeviceId) -> Option<String> {
        self.topology.lock().node(device).map(|node| node.name.clone())
    }

    fn parent(&self, device: DeviceId) -> Option<DeviceId> {
        self.topology.lock().node(device).and_then(|node| node.parent)
    }

    fn storage_view(&self, device: DeviceId) -> Option<StorageView> {
        let topology = self.topology.lock();
        let node = topology.node(device)?;
        node.storage.then_some(StorageView::new(device))
    }

    fn manage_start_stop(&self, view: StorageView) -> bool {
        self.flag(view.device(), PolicyFlag::ManageStartStop)
    }

    fn set_manage_start_stop(&self, view: StorageView, value: bool) {
        let mut topology = self.topology.lock();
        if let Some(node) = topology.node_mut(view.device()) {
            node.manage_start_stop = value;
            topology.record(view.device(), PolicyFlag::ManageStartStop, value);
        }
    }

    fn ignore_children(&self, device: DeviceId) -> bool {
        self.flag(device, PolicyFlag::IgnoreChildren)
    }

    fn set_ignore_children(&self, device: DeviceId, value: bool) {
        let mut topology = self.topology.lock();
        if let Some(node) = topology.node_mut(device) {
            node.ignore_children = value;
            topology.record(device, PolicyFlag::IgnoreChildren, value);
        }
    }

    fn force_suspend(&self, view: StorageView) -> Result<(), FaultCode> {
        self.topology.lock().force(view.device(), RuntimeStatus::Suspended)
    }

    fn force_resume(&self, view: StorageView) -> Result<(), FaultCode> {
        self.topology.lock().force(view.device(), RuntimeStatus::Active)
    }

    fn runtime_status(&self, device: DeviceId) -> RuntimeStatus {
        self.topology.lock().node(device).map_or(RuntimeStatus::Other, |node| node.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_are_the_only_bus_devices() {
        let bus = HostBus::new("scsi");
        let host = bus.add_host("host0", false);
        let unit = bus.add_unit(host, UnitConfig::new("0:0:0:0"));
        bus.add_disk(unit, "sda");
        assert_eq!(bus.top_level(), vec![unit]);
        assert_eq!(bus.parent(unit), Some(host));
        assert_eq!(bus.bus_name(), "scsi");
    }

    #[test]
    fn suspend_gate_requires_manage_start_stop() {
        let bus = HostBus::new("scsi");
        let host = bus.add_host("host0", false);
        let unit = bus.add_unit(host, UnitConfig::new("0:0:0:0"));
        let view = bus.storage_view(unit).unwrap();
        assert_eq!(bus.force_suspend(view), Err(EPERM));
        bus.set_manage_start_stop(view, true);
        assert_eq!(bus.force_suspend(view), Ok(()));
        assert_eq!(bus.runtime_status(unit), RuntimeStatus::Suspended);
    }

    #[test]
    fn injected_fault_fires_once() {
        let bus = HostBus::new("scsi");
        let host = bus.add_host("host0", true);
        let unit = bus.add_unit(host, UnitConfig::new("0:0:0:0").manage_start_stop(true));
        let view = bus.storage_view(unit).unwrap();
        bus.fail_next(unit, EIO);
        assert_eq!(bus.force_resume(view), Err(EIO));
        assert_eq!(bus.force_resume(view), Ok(()));
        assert_eq!(bus.transitions(unit), 2);
    }

    #[test]
    fn units_without_storage_have_no_view() {
        let bus = HostBus::new("scsi");
        let host = bus.add_host("host0", false);
        let unit = bus.add_unit(host, UnitConfig::new("enclosure").storage(false));
        assert!(bus.storage_view(unit).is_none());
    }

    #[test]
    fn only_interface_writes_are_journaled() {
        let bus = HostBus::new("scsi");
        let host = bus.add_host("host0", false);
        let unit = bus.add_unit(host, UnitConfig::new("0:0:0:0"));
        assert!(bus.flag_writes().is_empty());
        bus.set_ignore_children(host, true);
        assert_eq!(
            bus.flag_writes(),
            vec![FlagWrite { device: host, flag: PolicyFlag::IgnoreChildren, value: true }]
        );
        assert!(!bus.flag(unit, PolicyFlag::ManageStartStop));
    }

    #[test]
    fn journal_keeps_only_recent_writes() {
        let bus = HostBus::new("scsi");
        let host = bus.add_host("host0", false);
        for round in 0..FLAG_JOURNAL_CAPACITY * 40 {
            bus.set_ignore_children(host, round % 2 == 0);
        }
        bus.set_ignore_children(host, true);

        let writes = bus.flag_writes();
        assert_eq!(writes.len(), FLAG_JOURNAL_CAPACITY);
        assert_eq!(
            writes.last(),
            Some(&FlagWrite { device: host, flag: PolicyFlag::IgnoreChildren, value: true })
        );
    }
}
