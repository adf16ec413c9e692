//! The seam between the bridge and the native engine.
//!
//! The engine's internal logic (connection establishment, presence
//! computation, storage replication, distributed locking) is an external
//! collaborator; the bridge only forwards to it through these traits. A
//! dispatch call may block for the duration of the underlying operation —
//! the bridge imposes no timeout of its own.

use rtm_bridge_core::Value;

use crate::event::EventRouter;

/// Raw client handle supplied by the host runtime when creating an engine.
/// Zero is "invalid/none"; its meaning beyond that is the factory's concern.
pub type ClientHandle = u64;

/// A negative failure code reported by the native engine.
///
/// The bridge does not reinterpret these beyond the error mapper's string
/// lookup; retry policy belongs to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeError(pub i32);

impl From<NativeError> for rtm_bridge_core::BridgeError {
    fn from(err: NativeError) -> Self {
        rtm_bridge_core::BridgeError::NativeFailure(err.0)
    }
}

pub type NativeResult<T> = Result<T, NativeError>;

/// One ordered key/value options or data block, as carried by `Value::Map`.
pub type Pairs = [(String, Value)];

/// A stateful engine session created from a client handle.
///
/// All methods take `&mut self`: the bridge serializes every call onto one
/// logical thread of control, so the engine never sees concurrent calls on
/// the same instance.
pub trait RtmEngine: Send {
    fn login(&mut self, token: &str) -> NativeResult<()>;
    fn logout(&mut self) -> NativeResult<()>;
    fn renew_token(&mut self, token: &str) -> NativeResult<()>;
    fn publish(&mut self, channel: &str, message: &[u8], options: &Pairs) -> NativeResult<()>;
    fn subscribe(&mut self, channel: &str, options: &Pairs) -> NativeResult<()>;
    fn unsubscribe(&mut self, channel: &str) -> NativeResult<()>;
    fn create_stream_channel(&mut self, channel: &str) -> NativeResult<Box<dyn StreamChannel>>;
    fn set_parameters(&mut self, parameters: &str) -> NativeResult<()>;

    // Log configuration is an opaque pass-through; the bridge does not
    // reinterpret any of it.
    fn set_log_file(&mut self, path: &str) -> NativeResult<()>;
    fn set_log_level(&mut self, level: i64) -> NativeResult<()>;
    fn set_log_file_size(&mut self, size_kb: i64) -> NativeResult<()>;

    // Storage
    fn set_channel_metadata(
        &mut self,
        channel: &str,
        data: &Pairs,
        options: &Pairs,
    ) -> NativeResult<()>;
    fn update_channel_metadata(
        &mut self,
        channel: &str,
        data: &Pairs,
        options: &Pairs,
    ) -> NativeResult<()>;
    fn remove_channel_metadata(&mut self, channel: &str, keys: &[Value]) -> NativeResult<()>;
    fn get_channel_metadata(&mut self, channel: &str) -> NativeResult<Value>;
    fn set_user_metadata(&mut self, user: &str, data: &Pairs, options: &Pairs)
    -> NativeResult<()>;
    fn update_user_metadata(
        &mut self,
        user: &str,
        data: &Pairs,
        options: &Pairs,
    ) -> NativeResult<()>;
    fn remove_user_metadata(&mut self, user: &str, keys: &[Value]) -> NativeResult<()>;
    fn get_user_metadata(&mut self, user: &str) -> NativeResult<Value>;
    fn subscribe_user_metadata(&mut self, user: &str) -> NativeResult<()>;
    fn unsubscribe_user_metadata(&mut self, user: &str) -> NativeResult<()>;

    // Locks
    fn set_lock(&mut self, channel: &str, lock: &str, ttl: i64) -> NativeResult<()>;
    fn get_locks(&mut self, channel: &str) -> NativeResult<Value>;
    fn remove_lock(&mut self, channel: &str, lock: &str) -> NativeResult<()>;
    fn acquire_lock(&mut self, channel: &str, lock: &str, retry: bool) -> NativeResult<()>;
    fn release_lock(&mut self, channel: &str, lock: &str) -> NativeResult<()>;
    fn revoke_lock(&mut self, channel: &str, lock: &str, owner: &str) -> NativeResult<()>;

    // Presence
    fn who_now(&mut self, channel: &str, options: &Pairs) -> NativeResult<Value>;
    fn where_now(&mut self, user: &str) -> NativeResult<Value>;
    fn set_state(&mut self, channel: &str, state: &Pairs) -> NativeResult<()>;
    fn remove_state(&mut self, channel: &str, keys: &[Value]) -> NativeResult<()>;
    fn get_state(&mut self, channel: &str, user: &str) -> NativeResult<Value>;
    fn get_online_users(&mut self, channel: &str, options: &Pairs) -> NativeResult<Value>;
    fn get_user_channels(&mut self, user: &str) -> NativeResult<Value>;
}

/// A stream channel created from an engine session.
pub trait StreamChannel: Send {
    fn join(&mut self, options: &Pairs) -> NativeResult<()>;
    fn renew_token(&mut self, token: &str) -> NativeResult<()>;
    fn leave(&mut self) -> NativeResult<()>;
    fn channel_name(&self) -> &str;
    fn join_topic(&mut self, topic: &str, options: &Pairs) -> NativeResult<()>;
    fn publish_topic_message(
        &mut self,
        topic: &str,
        message: &[u8],
        options: &Pairs,
    ) -> NativeResult<()>;
    fn leave_topic(&mut self, topic: &str) -> NativeResult<()>;
    fn subscribe_topic(&mut self, topic: &str, users: &[Value]) -> NativeResult<()>;
    fn unsubscribe_topic(&mut self, topic: &str, users: &[Value]) -> NativeResult<()>;
    fn subscribed_user_list(&mut self, topic: &str) -> NativeResult<Value>;
}

/// Constructs native engine sessions for the bridge.
///
/// Receives the event router so the native side can mint forwarders for
/// whatever handler handle the caller attached; the attachment mechanism
/// itself is the collaborator's concern, not the bridge's.
pub trait EngineFactory: Send {
    /// `None` when the client handle is invalid or the engine cannot be
    /// constructed; the bridge then reports creation failure (zero handle)
    /// and registers nothing.
    fn create_engine(
        &mut self,
        client: ClientHandle,
        events: &EventRouter,
    ) -> Option<Box<dyn RtmEngine>>;
}
