//! Contract surface for the RTM dispatch bridge.
//!
//! This crate defines everything the two sides of the bridge must agree on:
//! the bounded value type system, the call envelope and its codec, the
//! function-identifier table, and the error taxonomy with its code-to-reason
//! mapper. It contains no engine logic; the bridge itself lives in the
//! `rtm-bridge` crate.

pub mod envelope;
pub mod error;
pub mod function;
pub mod value;

pub use envelope::{ApiParam, CallOutcome, check_shape, decode_call, decode_result, encode_call};
pub use error::{BridgeError, STATUS_OK, reason_for, version};
pub use function::{ApiFunction, ArgSpec, Requirement, Target};
pub use value::{Value, ValueKind};
