// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: devpmd TOML configuration (socket, bus type, log level, host-bus topology)
//! DEPS: serde, toml, std::fs
//! TESTS: defaults without a file; topology seeding; unknown keys and bad syntax rejected

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use devpm::{HostBus, RuntimeStatus, UnitConfig};

/// Socket used when neither the config file nor the command line names one.
pub const DEFAULT_SOCKET_PATH: &str = "/run/devpmd.sock";

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Offending file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// File is not valid devpmd TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Underlying parse failure.
        #[source]
        source: toml::de::Error,
    },
}

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Control socket path.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Bus type whose top-level devices are searched.
    #[serde(default = "default_bus")]
    pub bus: String,
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Per-connection read/write timeout in milliseconds, 0 disables it.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
    /// Topology seeded into the host bus.
    #[serde(default, rename = "host")]
    pub hosts: Vec<HostEntry>,
}

/// One `[[host]]` entry: the grandparent of every disk below it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostEntry {
    /// Host name.
    pub name: String,
    /// Initial `ignore_children` policy.
    #[serde(default)]
    pub ignore_children: bool,
    /// Units (power domains) attached to this host.
    #[serde(default, rename = "unit")]
    pub units: Vec<UnitEntry>,
}

/// One `[[host.unit]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitEntry {
    /// Unit name, e.g. `0:0:0:0`.
    pub name: String,
    /// Whether the unit exposes a storage power view.
    #[serde(default = "enabled")]
    pub storage: bool,
    /// Initial `manage_start_stop` policy.
    #[serde(default)]
    pub manage_start_stop: bool,
    /// Initial runtime status.
    #[serde(default)]
    pub status: StatusEntry,
    /// Names of the disks below this unit.
    #[serde(default)]
    pub disks: Vec<String>,
}

/// Runtime status as spelled in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusEntry {
    /// `active`
    #[default]
    Active,
    /// `suspended`
    Suspended,
    /// `other`
    Other,
}

impl From<StatusEntry> for RuntimeStatus {
    fn from(value: StatusEntry) -> Self {
        match value {
            StatusEntry::Active => Self::Active,
            StatusEntry::Suspended => Self::Suspended,
            StatusEntry::Other => Self::Other,
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_bus() -> String {
    "scsi".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_io_timeout_ms() -> u64 {
    crate::transport::DEFAULT_IO_TIMEOUT.as_millis() as u64
}

fn enabled() -> bool {
    true
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            bus: default_bus(),
            log_level: default_log_level(),
            io_timeout_ms: default_io_timeout_ms(),
            hosts: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Loads `path`, or returns the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::parse(&data).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Parses a configuration document.
    pub fn parse(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    /// Connection timeout for the control socket.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Builds the in-memory bus described by the topology entries.
    pub fn build_bus(&self) -> HostBus {
        let bus = HostBus::new(self.bus.clone());
        for host in &self.hosts {
            let host_id = bus.add_host(&host.name, host.ignore_children);
            for unit in &host.units {
                let config = UnitConfig::new(unit.name.clone())
                    .storage(unit.storage)
                    .manage_start_stop(unit.manage_start_stop)
                    .status(unit.status.into());
                let unit_id = bus.add_unit(host_id, config);
                for disk in &unit.disks {
                    bus.add_disk(unit_id, disk);
                }
            }
        }
        bus
    }
}
