//! Dispatch bridge between a managed caller and a native real-time-messaging
//! engine.
//!
//! The caller drives the engine through a narrow, string-keyed surface:
//! engine handles come from [`Bridge::create_engine`], every operation goes
//! through [`Bridge::call`] with an [`ApiParam`] envelope, and asynchronous
//! engine events come back through a registered [`EventSink`]. The contract
//! types (envelope, function table, error taxonomy) live in
//! [`rtm_bridge_core`] and are re-exported here.
//!
//! Concurrency contract: the bridge performs no internal threading and the
//! call surface takes `&mut self`, so all calls are serialized onto one
//! logical thread of control. Event delivery is the one exception — it runs
//! in whatever thread the native engine raises events on, and only ever
//! touches the sink table behind its lock.

pub mod bridge;
pub mod engine;
pub mod event;
pub mod loopback;
pub mod registry;
mod router;

pub use bridge::Bridge;
pub use engine::{ClientHandle, EngineFactory, NativeError, NativeResult, RtmEngine, StreamChannel};
pub use event::{ChannelSink, EventEnvelope, EventForwarder, EventHandlerHandle, EventRouter, EventSink};
pub use registry::{EngineState, Handle, Registry, RegistryObject};

pub use rtm_bridge_core::{
    ApiFunction, ApiParam, BridgeError, CallOutcome, STATUS_OK, Value, ValueKind, decode_call,
    decode_result, encode_call, reason_for, version,
};
