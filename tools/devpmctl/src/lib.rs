// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! CONTEXT: devpmctl: ask devpmd to force a named storage device into suspend or back to active
//! INTENT: `devpmctl <device-name> <action>`; action `0`/`suspend` or `1`/`resume`
//! EXIT CODES: 0 success, 1 usage, wire status of a rejected request, 10 transport failure
//!   (a daemon-side INVALID_ARGUMENT is status 1 and shares the usage code)
//! TESTS: `tools/devpmctl/tests/cli.rs` against a devpmd loop on a temporary socket

use std::fmt;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use log::debug;
use thiserror::Error;

use devpmd::protocol::{
    self, FrameError, OP_RESUME, OP_SUSPEND, STATUS_OK, STATUS_TRANSITION_FAILED,
};
use devpmd::{TransportError, UnixClient, DEFAULT_SOCKET_PATH};

/// Exit code for usage errors.
pub const EXIT_USAGE: i32 = 1;
/// Exit code when devpmd could not be reached or answered garbage.
pub const EXIT_TRANSPORT: i32 = 10;

#[derive(Parser, Debug)]
#[command(name = "devpmctl", about = "Force a storage device into suspend or back to active")]
struct Cli {
    /// Device name as listed under the bus, e.g. sda
    device: Option<String>,

    /// 0 or suspend, 1 or resume
    action: Option<String>,

    /// devpmd control socket
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,
}

/// Requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Force suspend.
    Suspend,
    /// Force resume.
    Resume,
}

impl Action {
    /// Parses `0`/`1` (only the first character is significant) or the action name.
    pub fn parse(arg: &str) -> Result<Self, ClientError> {
        match arg {
            "suspend" => return Ok(Self::Suspend),
            "resume" => return Ok(Self::Resume),
            _ => {}
        }
        match arg.as_bytes().first() {
            Some(b'0') => Ok(Self::Suspend),
            Some(b'1') => Ok(Self::Resume),
            _ => Err(ClientError::Usage(format!("unknown action {arg:?}\n\n{}", help()))),
        }
    }

    fn opcode(self) -> u8 {
        match self {
            Self::Suspend => OP_SUSPEND,
            Self::Resume => OP_RESUME,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspend => f.write_str("suspend"),
            Self::Resume => f.write_str("resume"),
        }
    }
}

/// Client failures, each mapped to an exit code.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad or missing arguments.
    #[error("{0}")]
    Usage(String),
    /// devpmd unreachable or the connection broke.
    #[error("cannot reach devpmd: {0}")]
    Transport(#[from] TransportError),
    /// Frame could not be built or the reply could not be decoded.
    #[error("protocol error: {0}")]
    Frame(#[from] FrameError),
    /// devpmd answered with a failure status.
    #[error("{device}: {}", rejection(.status, .detail))]
    Rejected {
        /// Device named in the request.
        device: String,
        /// Wire status.
        status: u8,
        /// Backend code for failed transitions.
        detail: i32,
    },
}

impl ClientError {
    /// Process exit code for this error.
    ///
    /// Rejections exit with their wire status, so `STATUS_INVALID_ARGUMENT` coincides with
    /// [`EXIT_USAGE`]: both mean the request itself was unacceptable.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => EXIT_USAGE,
            Self::Transport(_) | Self::Frame(_) => EXIT_TRANSPORT,
            Self::Rejected { status, .. } => i32::from(*status),
        }
    }
}

fn rejection(status: &u8, detail: &i32) -> String {
    let label = protocol::status_label(*status);
    if *status == STATUS_TRANSITION_FAILED {
        format!("{label} (code {detail})")
    } else {
        label.to_string()
    }
}

/// Returns the CLI usage text.
pub fn help() -> String {
    Cli::command().render_help().to_string()
}

/// Sends one request to devpmd at `socket`.
pub fn request(socket: &Path, device: &str, action: Action) -> Result<(), ClientError> {
    debug!("devpmctl: {action} {device} via {}", socket.display());
    let frame = protocol::encode_request(action.opcode(), device.as_bytes())
        .map_err(|err| ClientError::Usage(format!("invalid device name: {err}")))?;
    let mut client = UnixClient::connect(socket)?;
    let response = protocol::decode_response(&client.call(&frame)?)?;
    if response.status != STATUS_OK {
        return Err(ClientError::Rejected {
            device: device.to_string(),
            status: response.status,
            detail: response.detail,
        });
    }
    Ok(())
}

/// Executes the CLI using provided arguments (program name excluded).
pub fn execute(args: &[&str]) -> Result<String, ClientError> {
    let cli = match Cli::try_parse_from(std::iter::once("devpmctl").chain(args.iter().copied())) {
        Ok(cli) => cli,
        Err(err) if err.kind() == clap::error::ErrorKind::DisplayHelp => return Ok(help()),
        Err(err) => return Err(ClientError::Usage(err.to_string())),
    };
    let (device, action) = match (cli.device.as_deref(), cli.action.as_deref()) {
        (Some(device), Some(action)) if !device.is_empty() && !action.is_empty() => {
            (device, Action::parse(action)?)
        }
        _ => return Err(ClientError::Usage(help())),
    };
    request(&cli.socket, device, action)?;
    Ok(format!("{device}: {action} ok"))
}

/// Parses `std::env::args`, prints the outcome and returns the exit code.
pub fn run() -> i32 {
    let owned: Vec<String> = std::env::args().skip(1).collect();
    let refs: Vec<&str> = owned.iter().map(|s| s.as_str()).collect();
    match execute(&refs) {
        Ok(message) => {
            println!("{message}");
            0
        }
        Err(err) => {
            eprintln!("devpmctl: {err}");
            err.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_by_first_digit_or_name() {
        assert_eq!(Action::parse("0").unwrap(), Action::Suspend);
        assert_eq!(Action::parse("1").unwrap(), Action::Resume);
        assert_eq!(Action::parse("10").unwrap(), Action::Resume);
        assert_eq!(Action::parse("resume").unwrap(), Action::Resume);
        assert_eq!(Action::parse("2").unwrap_err().exit_code(), EXIT_USAGE);
    }

    #[test]
    fn help_names_the_tool() {
        assert!(help().contains("devpmctl"));
        assert!(execute(&["--help"]).unwrap().contains("devpmctl"));
    }

    #[test]
    fn missing_or_empty_arguments_are_usage_errors() {
        for args in [&[][..], &["sda"][..], &["", "0"][..], &["sda", ""][..]] {
            let err = execute(args).unwrap_err();
            assert_eq!(err.exit_code(), EXIT_USAGE, "{args:?}");
        }
    }

    #[test]
    fn overlong_device_name_is_a_usage_error() {
        let name = "a".repeat(protocol::MAX_NAME_LEN + 1);
        let err = execute(&["--socket", "/nonexistent/devpmd.sock", name.as_str(), "0"]).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_USAGE);
        assert!(err.to_string().contains("invalid device name"));
    }

    #[test]
    fn invalid_argument_rejection_shares_usage_code() {
        let err = ClientError::Rejected {
            device: "sda".into(),
            status: protocol::STATUS_INVALID_ARGUMENT,
            detail: 0,
        };
        assert_eq!(err.exit_code(), EXIT_USAGE);
        let err = ClientError::Rejected {
            device: "sda".into(),
            status: protocol::STATUS_AMBIGUOUS,
            detail: 0,
        };
        assert_eq!(err.exit_code(), i32::from(protocol::STATUS_AMBIGUOUS));
    }

    #[test]
    fn rejection_messages_distinguish_kinds() {
        let message = |status| {
            ClientError::Rejected { device: "sda".into(), status, detail: -5 }.to_string()
        };
        assert!(message(protocol::STATUS_NOT_FOUND).contains("device not found"));
        assert!(message(protocol::STATUS_NOT_SUPPORTED).contains("unsupported device"));
        assert!(message(STATUS_TRANSITION_FAILED).contains("operation failed (code -5)"));
    }
}
