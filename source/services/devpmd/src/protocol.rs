// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! CONTEXT: devpmd control wire protocol v1 (versioned byte frames; bounded inputs)
//!
//! OWNERS: @runtime
//!
//! STATUS: Experimental
//!
//! API_STABILITY: Unstable
//!
//! TEST_COVERAGE: Tests in `source/services/devpmd/tests/protocol.rs`
//!   - Decode: SUSPEND/RESUME happy path, reject malformed/oversized/unsupported inputs
//!   - Property test for panic-freedom on arbitrary input
//!
//! ADR: docs/adr/0017-service-architecture.md

use crate::control::Command;

pub const MAGIC0: u8 = b'P';
pub const MAGIC1: u8 = b'M';
pub const VERSION: u8 = 1;

pub const OP_SUSPEND: u8 = 0;
pub const OP_RESUME: u8 = 1;
/// Opcode echoed for frames that could not be decoded far enough to read one.
pub const OP_INVALID: u8 = 0x7f;
pub const OP_RESPONSE: u8 = 0x80;

pub const STATUS_OK: u8 = 0;
pub const STATUS_INVALID_ARGUMENT: u8 = 1;
pub const STATUS_NOT_FOUND: u8 = 2;
pub const STATUS_NOT_SUPPORTED: u8 = 3;
pub const STATUS_TRANSITION_FAILED: u8 = 4;
pub const STATUS_VERIFICATION_FAILED: u8 = 5;
pub const STATUS_AMBIGUOUS: u8 = 6;
pub const STATUS_MALFORMED: u8 = 7;
pub const STATUS_UNSUPPORTED: u8 = 8;

pub const MAX_NAME_LEN: usize = u8::MAX as usize;
pub const REQUEST_HEADER_LEN: usize = 5;
pub const RESPONSE_LEN: usize = 9;

/// A decoded v1 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub name: Vec<u8>,
}

/// A decoded v1 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub opcode: u8,
    pub status: u8,
    /// Backend fault code for `STATUS_TRANSITION_FAILED`, zero otherwise.
    pub detail: i32,
}

/// Frame errors for v1 frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[must_use = "frame errors must be handled"]
pub enum FrameError {
    #[error("malformed frame")]
    Malformed,
    #[error("unsupported protocol version")]
    Unsupported,
    #[error("device name exceeds 255 bytes")]
    TooLarge,
}

impl FrameError {
    /// Wire status reported back for this error.
    pub const fn status(self) -> u8 {
        match self {
            Self::Malformed => STATUS_MALFORMED,
            Self::Unsupported => STATUS_UNSUPPORTED,
            Self::TooLarge => STATUS_INVALID_ARGUMENT,
        }
    }
}

pub fn decode_request(frame: &[u8]) -> Result<Request, FrameError> {
    // [P,M,ver,OP, name_len:u8, name]
    if frame.len() < REQUEST_HEADER_LEN || frame[0] != MAGIC0 || frame[1] != MAGIC1 {
        return Err(FrameError::Malformed);
    }
    if frame[2] != VERSION {
        return Err(FrameError::Unsupported);
    }
    let name_len = frame[4] as usize;
    if frame.len() != REQUEST_HEADER_LEN + name_len {
        return Err(FrameError::Malformed);
    }
    Ok(Request {
        command: Command::from_opcode(frame[3]),
        name: frame[REQUEST_HEADER_LEN..].to_vec(),
    })
}

pub fn encode_request(opcode: u8, name: &[u8]) -> Result<Vec<u8>, FrameError> {
    if name.len() > MAX_NAME_LEN {
        return Err(FrameError::TooLarge);
    }
    let mut out = Vec::with_capacity(REQUEST_HEADER_LEN + name.len());
    out.extend_from_slice(&[MAGIC0, MAGIC1, VERSION, opcode, name.len() as u8]);
    out.extend_from_slice(name);
    Ok(out)
}

pub fn encode_response(opcode: u8, status: u8, detail: i32) -> Vec<u8> {
    // [P,M,ver,OP|0x80, status:u8, detail:i32le]
    let mut out = Vec::with_capacity(RESPONSE_LEN);
    out.extend_from_slice(&[MAGIC0, MAGIC1, VERSION, opcode | OP_RESPONSE, status]);
    out.extend_from_slice(&detail.to_le_bytes());
    out
}

pub fn decode_response(frame: &[u8]) -> Result<Response, FrameError> {
    if frame.len() < 4 || frame[0] != MAGIC0 || frame[1] != MAGIC1 {
        return Err(FrameError::Malformed);
    }
    if frame[2] != VERSION {
        return Err(FrameError::Unsupported);
    }
    if frame.len() != RESPONSE_LEN || frame[3] & OP_RESPONSE == 0 {
        return Err(FrameError::Malformed);
    }
    Ok(Response {
        opcode: frame[3] & !OP_RESPONSE,
        status: frame[4],
        detail: i32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]),
    })
}

/// Human readable label for a wire status.
pub fn status_label(status: u8) -> &'static str {
    match status {
        STATUS_OK => "ok",
        STATUS_INVALID_ARGUMENT => "invalid argument",
        STATUS_NOT_FOUND => "device not found",
        STATUS_NOT_SUPPORTED => "unsupported device",
        STATUS_TRANSITION_FAILED => "operation failed",
        STATUS_VERIFICATION_FAILED => "operation failed: device did not reach the requested state",
        STATUS_AMBIGUOUS => "device name is ambiguous",
        STATUS_MALFORMED => "malformed request",
        STATUS_UNSUPPORTED => "unsupported protocol version",
        _ => "unknown status",
    }
}
