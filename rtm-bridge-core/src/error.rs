//! Bridge error taxonomy and the error mapper.
//!
//! Every bridge-level failure is one of a closed set of negative codes; the
//! mapper resolves any code (bridge or native) to a stable human-readable
//! string. The code table is part of the versioned contract surface:
//! existing codes never change meaning.

use thiserror::Error;

/// Status code returned by a successful dispatch call.
pub const STATUS_OK: i32 = 0;

/// Errors produced by the bridge itself, as opposed to the native engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The referenced handle is zero, unknown, or already destroyed.
    #[error("handle not found")]
    HandleNotFound,
    /// The function identifier is not in the dispatch table.
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    /// The envelope's arguments do not match the function's declared shape.
    #[error("invalid argument shape: {0}")]
    InvalidArgumentShape(String),
    /// The envelope could not be decoded at all.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    /// The target object's backing session no longer exists.
    #[error("engine not initialized")]
    NotInitialized,
    /// The call requires an active (logged-in / joined) session.
    #[error("not active: login or join required first")]
    NotActive,
    /// The native engine reported a failure code of its own.
    #[error("native failure ({0})")]
    NativeFailure(i32),
}

impl BridgeError {
    /// The stable negative status code for this error.
    pub fn code(&self) -> i32 {
        match self {
            BridgeError::HandleNotFound => -1,
            BridgeError::UnknownFunction(_) => -2,
            BridgeError::InvalidArgumentShape(_) => -3,
            BridgeError::MalformedEnvelope(_) => -4,
            BridgeError::NotInitialized => -5,
            BridgeError::NotActive => -6,
            // Native codes pass through untouched.
            BridgeError::NativeFailure(code) => *code,
        }
    }
}

/// Resolve any status code to a stable, human-readable reason string.
///
/// Pure lookup: unknown codes resolve to a generic string rather than
/// failing. Zero is the success code.
pub fn reason_for(code: i32) -> &'static str {
    match code {
        0 => "ok",
        -1 => "handle not found",
        -2 => "unknown function",
        -3 => "invalid argument shape",
        -4 => "malformed envelope",
        -5 => "engine not initialized",
        -6 => "not active: login or join required first",
        // Native engine code ranges.
        -10001 => "not logged in",
        -10002 => "login rejected",
        -10003 => "login timed out",
        -10004 => "invalid token",
        -10005 => "token expired",
        -10006 => "channel not subscribed",
        -10007 => "operation timed out",
        -10008 => "too many requests",
        -11001 => "channel not joined",
        -11002 => "topic not joined",
        -11003 => "topic subscriber limit reached",
        -12001 => "lock not acquired",
        -12002 => "lock owned by another user",
        -12003 => "lock does not exist",
        -13001 => "metadata item not found",
        -13002 => "metadata revision mismatch",
        -14001 => "user not present in channel",
        _ => "unknown error",
    }
}

/// Version of the bridge contract surface.
///
/// Bumped whenever an existing function identifier is removed or reshaped;
/// adding identifiers is backward compatible and does not bump it.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(BridgeError::HandleNotFound.code(), -1);
        assert_eq!(BridgeError::UnknownFunction("x".into()).code(), -2);
        assert_eq!(BridgeError::InvalidArgumentShape("x".into()).code(), -3);
        assert_eq!(BridgeError::MalformedEnvelope("x".into()).code(), -4);
        assert_eq!(BridgeError::NotInitialized.code(), -5);
        assert_eq!(BridgeError::NotActive.code(), -6);
        assert_eq!(BridgeError::NativeFailure(-10001).code(), -10001);
    }

    #[test]
    fn test_reason_for_known_codes() {
        assert_eq!(reason_for(-1), "handle not found");
        assert_eq!(reason_for(-10001), "not logged in");
        assert!(!reason_for(-1).is_empty());
    }

    #[test]
    fn test_reason_for_unknown_code_never_fails() {
        assert_eq!(reason_for(-987654), "unknown error");
        assert_eq!(reason_for(i32::MIN), "unknown error");
        assert_eq!(reason_for(999999), "unknown error");
        assert_eq!(reason_for(0), "ok");
    }

    #[test]
    fn test_every_bridge_code_has_a_specific_reason() {
        for code in [-1, -2, -3, -4, -5, -6] {
            assert_ne!(reason_for(code), "unknown error");
        }
    }

    #[test]
    fn test_version_is_nonempty() {
        assert!(!version().is_empty());
    }
}
