// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Flat, stable error taxonomy shared by every layer of the commissioner
//! core (CoAP engine, secure session, TLV codec, state machine).
//!
//! Every variant carries a human-readable message so CLIs and tests can
//! surface the failure without re-deriving it from the code alone.

use thiserror::Error;

/// Stable error codes. Do not renumber or reorder: external tooling may
/// persist `ErrorCode as u8` in logs.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    None = 0,
    Cancelled = 1,
    InvalidArgs = 2,
    InvalidCommand = 3,
    Timeout = 4,
    NotFound = 5,
    Security = 6,
    Unimplemented = 7,
    BadFormat = 8,
    Busy = 9,
    OutOfMemory = 10,
    IoError = 11,
    IoBusy = 12,
    AlreadyExists = 13,
    Aborted = 14,
    InvalidState = 15,
    Rejected = 16,
    CoapError = 17,
    RegistryError = 18,
    Unknown = 19,
}

/// The single error type returned by every fallible operation in this
/// crate. Carries an [`ErrorCode`] plus a human-readable message.
#[derive(Debug, Error, Clone)]
#[error("{code:?}: {message}")]
pub struct CommissionerError {
    pub code: ErrorCode,
    pub message: String,
}

impl CommissionerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, msg)
    }

    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgs, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, msg)
    }

    pub fn security(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Security, msg)
    }

    pub fn bad_format(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadFormat, msg)
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Aborted, msg)
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, msg)
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Rejected, msg)
    }

    pub fn coap_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CoapError, msg)
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, msg)
    }

    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }
}

pub type Result<T> = std::result::Result<T, CommissionerError>;

/// Maps a would-block style condition onto [`ErrorCode::IoBusy`], the one
/// code callers are expected to swallow and retry rather than propagate.
pub fn is_io_busy(err: &CommissionerError) -> bool {
    err.code == ErrorCode::IoBusy
}
