// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Device lookup by name, one level below each top-level device of the bus.

use std::sync::Arc;

use crate::bus::{DeviceBus, DeviceId};
use crate::error::{Error, Result};

/// Device located on the bus for the duration of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRef {
    id: DeviceId,
    name: String,
}

impl DeviceRef {
    /// Wraps a located device.
    pub fn new(id: DeviceId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }

    /// Bus identifier of the device.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Name the device was looked up by.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// sysfs-style string equality: one trailing newline on either side is ignored.
pub fn sysfs_streq(a: &str, b: &str) -> bool {
    a.strip_suffix('\n').unwrap_or(a) == b.strip_suffix('\n').unwrap_or(b)
}

/// Searches the children of every top-level bus device for an exact name match.
pub struct Locator {
    bus: Arc<dyn DeviceBus>,
}

impl Locator {
    /// Creates a locator over `bus`.
    pub fn new(bus: Arc<dyn DeviceBus>) -> Self {
        Self { bus }
    }

    /// Finds the device called `name`.
    ///
    /// The whole bus is walked; a name carried by more than one device is reported as
    /// [`Error::Ambiguous`] instead of picking whichever match the traversal hit first.
    pub fn find(&self, name: &str) -> Result<DeviceRef> {
        let matches: Vec<DeviceId> = self
            .bus
            .top_level()
            .into_iter()
            .flat_map(|top| self.bus.find_children(top, &|candidate| sysfs_streq(name, candidate)))
            .collect();
        let wanted = name.strip_suffix('\n').unwrap_or(name);
        match matches.as_slice() {
            [] => Err(Error::NotFound { name: wanted.to_string() }),
            [id] => Ok(DeviceRef::new(*id, wanted)),
            many => Err(Error::Ambiguous { name: wanted.to_string(), count: many.len() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streq_ignores_single_trailing_newline() {
        assert!(sysfs_streq("sda", "sda"));
        assert!(sysfs_streq("sda\n", "sda"));
        assert!(sysfs_streq("sda", "sda\n"));
        assert!(!sysfs_streq("sda\n\n", "sda"));
        assert!(!sysfs_streq("sda", "sdb"));
        assert!(!sysfs_streq("sd", "sda"));
    }

    #[cfg(feature = "backend-host")]
    mod host {
        use super::super::*;
        use crate::host::{HostBus, UnitConfig};

        fn bus() -> Arc<HostBus> {
            let bus = Arc::new(HostBus::new("scsi"));
            let host0 = bus.add_host("host0", false);
            let host1 = bus.add_host("host1", false);
            let u0 = bus.add_unit(host0, UnitConfig::new("0:0:0:0"));
            let u1 = bus.add_unit(host1, UnitConfig::new("1:0:0:0"));
            bus.add_disk(u0, "sda");
            bus.add_disk(u1, "sdb");
            bus
        }

        #[test]
        fn finds_child_of_second_top_level_device() {
            let bus = bus();
            let locator = Locator::new(bus.clone());
            let found = locator.find("sdb").unwrap();
            assert_eq!(found.name(), "sdb");
            assert_eq!(bus.name(found.id()).as_deref(), Some("sdb"));
        }

        #[test]
        fn newline_terminated_name_matches() {
            let locator = Locator::new(bus());
            assert_eq!(locator.find("sda\n").unwrap().name(), "sda");
        }

        #[test]
        fn top_level_names_are_not_matched() {
            let locator = Locator::new(bus());
            let err = locator.find("0:0:0:0").unwrap_err();
            assert_eq!(err, Error::NotFound { name: "0:0:0:0".into() });
        }

        #[test]
        fn missing_name_is_not_found() {
            let locator = Locator::new(bus());
            assert_eq!(locator.find("zzz").unwrap_err(), Error::NotFound { name: "zzz".into() });
        }

        #[test]
        fn duplicate_names_are_ambiguous() {
            let bus = bus();
            let host = bus.add_host("host2", false);
            let unit = bus.add_unit(host, UnitConfig::new("2:0:0:0"));
            bus.add_disk(unit, "sda");
            let locator = Locator::new(bus);
            assert_eq!(
                locator.find("sda").unwrap_err(),
                Error::Ambiguous { name: "sda".into(), count: 2 }
            );
        }

        #[test]
        fn siblings_sharing_a_name_are_ambiguous() {
            let bus = bus();
            let unit = bus.top_level()[0];
            bus.add_disk(unit, "sda\n");
            let locator = Locator::new(bus);
            assert_eq!(
                locator.find("sda").unwrap_err(),
                Error::Ambiguous { name: "sda".into(), count: 2 }
            );
        }
    }
}
