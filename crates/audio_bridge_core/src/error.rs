//! Error taxonomy and the native error sanitizer.
//!
//! Validation failures (arity, type, required member, conversion) are raised
//! where they are detected and never pass through [`sanitize`]. Anything
//! coming back from the native engine always does.

use std::fmt;

use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref RE_CATEGORY: Regex =
        Regex::new(r"^\s*([A-Za-z]+Error)\s+-\s+(.+?)\s*$").unwrap();
    static ref RE_LOCATION: Regex =
        Regex::new(r"\s*(\(\s*[^()\s]+\.rs(:\d+){1,2}\s*\)|\bat\s+[^\s]+\.rs(:\d+){1,2})").unwrap();
    static ref RE_ADDRESS: Regex = Regex::new(r"\s*\b0x[0-9a-fA-F]+\b").unwrap();
}

/// Message used when a native failure has no recognizable shape.
pub const GENERIC_NATIVE_FAILURE: &str = "An unexpected error occurred in the audio engine";

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error categories the native engine may report, mapped one to one onto
/// host error names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorKind {
    TypeError,
    RangeError,
    NotSupportedError,
    InvalidStateError,
    IndexSizeError,
    InvalidAccessError,
    SyntaxError,
}

impl NativeErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            NativeErrorKind::TypeError => "TypeError",
            NativeErrorKind::RangeError => "RangeError",
            NativeErrorKind::NotSupportedError => "NotSupportedError",
            NativeErrorKind::InvalidStateError => "InvalidStateError",
            NativeErrorKind::IndexSizeError => "IndexSizeError",
            NativeErrorKind::InvalidAccessError => "InvalidAccessError",
            NativeErrorKind::SyntaxError => "SyntaxError",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "TypeError" => NativeErrorKind::TypeError,
            "RangeError" => NativeErrorKind::RangeError,
            "NotSupportedError" => NativeErrorKind::NotSupportedError,
            "InvalidStateError" => NativeErrorKind::InvalidStateError,
            "IndexSizeError" => NativeErrorKind::IndexSizeError,
            "InvalidAccessError" => NativeErrorKind::InvalidAccessError,
            "SyntaxError" => NativeErrorKind::SyntaxError,
            _ => return None,
        })
    }
}

impl fmt::Display for NativeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque failure returned by the native engine. Its text may carry source
/// locations and addresses and must not reach the host as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    raw: String,
}

impl NativeError {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Build a categorized error in the `<Category> - <message>` shape the
    /// sanitizer understands.
    pub fn categorized(kind: NativeErrorKind, message: impl fmt::Display) -> Self {
        Self::new(format!("{} - {}", kind.name(), message))
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Host-visible failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("{0}")]
    Arity(String),

    #[error("{0}")]
    TypeMismatch(String),

    #[error("{0}")]
    RequiredMemberMissing(String),

    #[error("{0}")]
    Conversion(String),

    #[error("{message}")]
    Native {
        kind: NativeErrorKind,
        message: String,
    },

    #[error("{0}")]
    Generic(String),
}

impl BridgeError {
    /// Name of the error class the host should raise.
    pub fn host_error_name(&self) -> &'static str {
        match self {
            BridgeError::Arity(_)
            | BridgeError::TypeMismatch(_)
            | BridgeError::RequiredMemberMissing(_)
            | BridgeError::Conversion(_) => "TypeError",
            BridgeError::Native { kind, .. } => kind.name(),
            BridgeError::Generic(_) => "Error",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BridgeError::Arity(_)
                | BridgeError::TypeMismatch(_)
                | BridgeError::RequiredMemberMissing(_)
                | BridgeError::Conversion(_)
        )
    }
}

fn scrub(message: &str) -> String {
    let without_locations = RE_LOCATION.replace_all(message, "");
    let without_addresses = RE_ADDRESS.replace_all(&without_locations, "");
    without_addresses.trim().to_string()
}

/// Map a native failure onto the host error surface.
///
/// Only the first line of the native text is considered; stack frames and
/// anything after them are dropped. Unknown shapes fail closed to
/// [`BridgeError::Generic`].
pub fn sanitize(err: NativeError) -> BridgeError {
    let first_line = err.raw().lines().next().unwrap_or_default();

    if let Some(caps) = RE_CATEGORY.captures(first_line) {
        if let Some(kind) = NativeErrorKind::from_name(&caps[1]) {
            let message = scrub(&caps[2]);
            if !message.is_empty() {
                return BridgeError::Native { kind, message };
            }
        }
    }

    tracing::warn!("unrecognized native error shape, failing closed");
    tracing::debug!(raw = %err.raw(), "native error detail");
    BridgeError::Generic(GENERIC_NATIVE_FAILURE.to_string())
}
