//! Dispatch router: maps a function identifier plus argument envelope onto
//! the concrete native operation for the resolved target object.
//!
//! Check order, pinned by tests: table lookup, then handle resolution, then
//! argument shape, then lifecycle state, then the native call. An unknown
//! identifier therefore reports `UnknownFunction` even on a bogus handle.

use std::str::FromStr;

use rtm_bridge_core::{
    ApiFunction, ApiParam, BridgeError, Requirement, STATUS_OK, Value, check_shape,
};

use crate::engine::Pairs;
use crate::registry::{EngineState, Handle, Registry, RegistryObject};

/// Execute one dispatch call against the registry, writing the outcome into
/// the envelope's result slot. Returns the status code (`0` success).
pub(crate) fn dispatch(registry: &mut Registry, handle: Handle, param: &mut ApiParam) -> i32 {
    match dispatch_inner(registry, handle, param) {
        Ok(data) => {
            param.set_ok(data);
            STATUS_OK
        }
        Err(err) => {
            tracing::debug!("dispatch {} on {} failed: {}", param.fun, handle, err);
            param.set_err(&err);
            err.code()
        }
    }
}

fn dispatch_inner(
    registry: &mut Registry,
    handle: Handle,
    param: &ApiParam,
) -> Result<Option<Value>, BridgeError> {
    let fun = ApiFunction::from_str(&param.fun)
        .map_err(|_| BridgeError::UnknownFunction(param.fun.clone()))?;
    dispatch_typed(registry, handle, fun, &param.args)
}

/// Typed entry point for callers that already hold an [`ApiFunction`].
pub(crate) fn dispatch_typed(
    registry: &mut Registry,
    handle: Handle,
    fun: ApiFunction,
    args: &[Value],
) -> Result<Option<Value>, BridgeError> {
    match fun.target() {
        rtm_bridge_core::Target::Engine => dispatch_engine(registry, handle, fun, args),
        rtm_bridge_core::Target::Channel => dispatch_channel(registry, handle, fun, args),
    }
}

// Post-shape-check extractors. The shape was validated against the declared
// kinds, so a mismatch here cannot happen; defaults keep them total anyway.

fn str_arg(args: &[Value], index: usize) -> &str {
    args[index].as_str().unwrap_or_default()
}

fn bytes_arg(args: &[Value], index: usize) -> &[u8] {
    args[index].as_bytes().unwrap_or_default()
}

fn int_arg(args: &[Value], index: usize) -> i64 {
    args[index].as_int().unwrap_or_default()
}

fn bool_arg(args: &[Value], index: usize) -> bool {
    args[index].as_bool().unwrap_or_default()
}

fn map_arg(args: &[Value], index: usize) -> &Pairs {
    args[index].as_map().unwrap_or_default()
}

fn list_arg(args: &[Value], index: usize) -> &[Value] {
    args[index].as_list().unwrap_or_default()
}

fn dispatch_engine(
    registry: &mut Registry,
    handle: Handle,
    fun: ApiFunction,
    args: &[Value],
) -> Result<Option<Value>, BridgeError> {
    use ApiFunction::*;

    // Creation is special-cased: the native call and the registry insert
    // must both happen, or neither.
    if fun == ClientCreateStreamChannel {
        let channel = match registry.get_mut(handle) {
            Some(RegistryObject::Engine { state, native }) => {
                check_shape(fun, args)?;
                if *state != EngineState::Active {
                    return Err(BridgeError::NotActive);
                }
                native.create_stream_channel(str_arg(args, 0))?
            }
            _ => return Err(BridgeError::HandleNotFound),
        };
        let channel_handle = registry.insert_channel(handle, channel);
        tracing::info!("stream channel {} created from engine {}", channel_handle, handle);
        return Ok(Some(Value::Int(channel_handle.raw() as i64)));
    }

    let (state, native) = match registry.get_mut(handle) {
        Some(RegistryObject::Engine { state, native }) => (state, native),
        _ => return Err(BridgeError::HandleNotFound),
    };
    check_shape(fun, args)?;
    if fun.requirement() == Requirement::EngineActive && *state != EngineState::Active {
        return Err(BridgeError::NotActive);
    }

    match fun {
        ClientLogin => {
            native.login(str_arg(args, 0))?;
            *state = EngineState::Active;
            Ok(None)
        }
        ClientLogout => {
            native.logout()?;
            *state = EngineState::Created;
            Ok(None)
        }
        ClientRenewToken => {
            native.renew_token(str_arg(args, 0))?;
            Ok(None)
        }
        ClientPublish => {
            native.publish(str_arg(args, 0), bytes_arg(args, 1), map_arg(args, 2))?;
            Ok(None)
        }
        ClientSubscribe => {
            native.subscribe(str_arg(args, 0), map_arg(args, 1))?;
            Ok(None)
        }
        ClientUnsubscribe => {
            native.unsubscribe(str_arg(args, 0))?;
            Ok(None)
        }
        ClientSetParameters => {
            native.set_parameters(str_arg(args, 0))?;
            Ok(None)
        }
        ClientSetLogFile => {
            native.set_log_file(str_arg(args, 0))?;
            Ok(None)
        }
        ClientSetLogLevel => {
            native.set_log_level(int_arg(args, 0))?;
            Ok(None)
        }
        ClientSetLogFileSize => {
            native.set_log_file_size(int_arg(args, 0))?;
            Ok(None)
        }

        StorageSetChannelMetadata => {
            native.set_channel_metadata(str_arg(args, 0), map_arg(args, 1), map_arg(args, 2))?;
            Ok(None)
        }
        StorageUpdateChannelMetadata => {
            native.update_channel_metadata(str_arg(args, 0), map_arg(args, 1), map_arg(args, 2))?;
            Ok(None)
        }
        StorageRemoveChannelMetadata => {
            native.remove_channel_metadata(str_arg(args, 0), list_arg(args, 1))?;
            Ok(None)
        }
        StorageGetChannelMetadata => {
            Ok(Some(native.get_channel_metadata(str_arg(args, 0))?))
        }
        StorageSetUserMetadata => {
            native.set_user_metadata(str_arg(args, 0), map_arg(args, 1), map_arg(args, 2))?;
            Ok(None)
        }
        StorageUpdateUserMetadata => {
            native.update_user_metadata(str_arg(args, 0), map_arg(args, 1), map_arg(args, 2))?;
            Ok(None)
        }
        StorageRemoveUserMetadata => {
            native.remove_user_metadata(str_arg(args, 0), list_arg(args, 1))?;
            Ok(None)
        }
        StorageGetUserMetadata => Ok(Some(native.get_user_metadata(str_arg(args, 0))?)),
        StorageSubscribeUserMetadata => {
            native.subscribe_user_metadata(str_arg(args, 0))?;
            Ok(None)
        }
        StorageUnsubscribeUserMetadata => {
            native.unsubscribe_user_metadata(str_arg(args, 0))?;
            Ok(None)
        }

        LockSetLock => {
            native.set_lock(str_arg(args, 0), str_arg(args, 1), int_arg(args, 2))?;
            Ok(None)
        }
        LockGetLocks => Ok(Some(native.get_locks(str_arg(args, 0))?)),
        LockRemoveLock => {
            native.remove_lock(str_arg(args, 0), str_arg(args, 1))?;
            Ok(None)
        }
        LockAcquireLock => {
            native.acquire_lock(str_arg(args, 0), str_arg(args, 1), bool_arg(args, 2))?;
            Ok(None)
        }
        LockReleaseLock => {
            native.release_lock(str_arg(args, 0), str_arg(args, 1))?;
            Ok(None)
        }
        LockRevokeLock => {
            native.revoke_lock(str_arg(args, 0), str_arg(args, 1), str_arg(args, 2))?;
            Ok(None)
        }

        PresenceWhoNow => Ok(Some(native.who_now(str_arg(args, 0), map_arg(args, 1))?)),
        PresenceWhereNow => Ok(Some(native.where_now(str_arg(args, 0))?)),
        PresenceSetState => {
            native.set_state(str_arg(args, 0), map_arg(args, 1))?;
            Ok(None)
        }
        PresenceRemoveState => {
            native.remove_state(str_arg(args, 0), list_arg(args, 1))?;
            Ok(None)
        }
        PresenceGetState => Ok(Some(native.get_state(str_arg(args, 0), str_arg(args, 1))?)),
        PresenceGetOnlineUsers => {
            Ok(Some(native.get_online_users(str_arg(args, 0), map_arg(args, 1))?))
        }
        PresenceGetUserChannels => Ok(Some(native.get_user_channels(str_arg(args, 0))?)),

        ClientCreateStreamChannel | ChannelJoin | ChannelRenewToken | ChannelLeave
        | ChannelGetChannelName | ChannelJoinTopic | ChannelPublishTopicMessage
        | ChannelLeaveTopic | ChannelSubscribeTopic | ChannelUnsubscribeTopic
        | ChannelGetSubscribedUserList | ChannelRelease => {
            unreachable!("handled before the engine match")
        }
    }
}

fn dispatch_channel(
    registry: &mut Registry,
    handle: Handle,
    fun: ApiFunction,
    args: &[Value],
) -> Result<Option<Value>, BridgeError> {
    use ApiFunction::*;

    let parent = registry
        .channel_parent(handle)
        .ok_or(BridgeError::HandleNotFound)?;
    check_shape(fun, args)?;

    // Release works even when the backing engine is already gone; every
    // other call needs a live session behind the channel.
    if fun == ChannelRelease {
        registry.remove(handle);
        tracing::info!("stream channel {} released", handle);
        return Ok(None);
    }
    if !registry.contains(parent) {
        return Err(BridgeError::NotInitialized);
    }

    let (joined, native) = match registry.get_mut(handle) {
        Some(RegistryObject::Channel { joined, native, .. }) => (joined, native),
        _ => return Err(BridgeError::HandleNotFound),
    };
    if fun.requirement() == Requirement::ChannelJoined && !*joined {
        return Err(BridgeError::NotActive);
    }

    match fun {
        ChannelJoin => {
            native.join(map_arg(args, 0))?;
            *joined = true;
            Ok(None)
        }
        ChannelRenewToken => {
            native.renew_token(str_arg(args, 0))?;
            Ok(None)
        }
        ChannelLeave => {
            native.leave()?;
            *joined = false;
            Ok(None)
        }
        ChannelGetChannelName => Ok(Some(Value::str(native.channel_name()))),
        ChannelJoinTopic => {
            native.join_topic(str_arg(args, 0), map_arg(args, 1))?;
            Ok(None)
        }
        ChannelPublishTopicMessage => {
            native.publish_topic_message(str_arg(args, 0), bytes_arg(args, 1), map_arg(args, 2))?;
            Ok(None)
        }
        ChannelLeaveTopic => {
            native.leave_topic(str_arg(args, 0))?;
            Ok(None)
        }
        ChannelSubscribeTopic => {
            native.subscribe_topic(str_arg(args, 0), list_arg(args, 1))?;
            Ok(None)
        }
        ChannelUnsubscribeTopic => {
            native.unsubscribe_topic(str_arg(args, 0), list_arg(args, 1))?;
            Ok(None)
        }
        ChannelGetSubscribedUserList => {
            Ok(Some(native.subscribed_user_list(str_arg(args, 0))?))
        }
        _ => unreachable!("engine functions are dispatched separately"),
    }
}

#[cfg(test)]
mod tests {
    use rtm_bridge_core::{CallOutcome, encode_call};

    use super::*;
    use crate::loopback::LoopbackEngine;

    fn registry_with_engine() -> (Registry, Handle) {
        let mut registry = Registry::new();
        let handle = registry.insert_engine(Box::new(LoopbackEngine::detached("alice")));
        (registry, handle)
    }

    fn call(
        registry: &mut Registry,
        handle: Handle,
        fun: ApiFunction,
        args: Vec<Value>,
    ) -> (i32, ApiParam) {
        let mut param = encode_call(fun, args).unwrap();
        let status = dispatch(registry, handle, &mut param);
        (status, param)
    }

    #[test]
    fn test_unknown_function_checked_before_handle() {
        let mut registry = Registry::new();
        let mut param = ApiParam {
            fun: "Unknown_op".to_string(),
            args: vec![],
            result: None,
        };
        // No object was ever created; the table miss still wins.
        let status = dispatch(&mut registry, Handle::from_raw(7), &mut param);
        assert_eq!(status, -2);
    }

    #[test]
    fn test_handle_checked_before_shape() {
        let mut registry = Registry::new();
        let mut param = ApiParam {
            fun: "RtmClient_login".to_string(),
            args: vec![Value::Int(99)], // wrong kind
            result: None,
        };
        let status = dispatch(&mut registry, Handle::NONE, &mut param);
        assert_eq!(status, -1);
    }

    #[test]
    fn test_shape_checked_before_state() {
        let (mut registry, handle) = registry_with_engine();
        // Publish requires an active session AND has a 3-argument shape;
        // the shape error must win on a merely created engine.
        let mut param = ApiParam {
            fun: "RtmClient_publish".to_string(),
            args: vec![Value::str("room")],
            result: None,
        };
        assert_eq!(dispatch(&mut registry, handle, &mut param), -3);
    }

    #[test]
    fn test_not_active_before_login() {
        let (mut registry, handle) = registry_with_engine();
        let (status, _) = call(
            &mut registry,
            handle,
            ApiFunction::ClientPublish,
            vec![
                Value::str("room"),
                Value::Bytes(b"hi".to_vec()),
                Value::Map(vec![]),
            ],
        );
        assert_eq!(status, -6);
    }

    #[test]
    fn test_login_activates_and_logout_deactivates() {
        let (mut registry, handle) = registry_with_engine();
        let (status, _) = call(
            &mut registry,
            handle,
            ApiFunction::ClientLogin,
            vec![Value::str("tok")],
        );
        assert_eq!(status, 0);

        let publish_args = vec![
            Value::str("room"),
            Value::Bytes(b"hi".to_vec()),
            Value::Map(vec![]),
        ];
        let (status, _) = call(
            &mut registry,
            handle,
            ApiFunction::ClientPublish,
            publish_args.clone(),
        );
        assert_eq!(status, 0);

        let (status, _) = call(&mut registry, handle, ApiFunction::ClientLogout, vec![]);
        assert_eq!(status, 0);
        let (status, _) = call(&mut registry, handle, ApiFunction::ClientPublish, publish_args);
        assert_eq!(status, -6);
    }

    #[test]
    fn test_native_failure_passes_through() {
        let (mut registry, handle) = registry_with_engine();
        // Empty token is rejected by the engine with its own code.
        let (status, param) = call(
            &mut registry,
            handle,
            ApiFunction::ClientLogin,
            vec![Value::str("")],
        );
        assert_eq!(status, -10004);
        match param.result {
            Some(CallOutcome::Err { code, .. }) => assert_eq!(code, -10004),
            other => panic!("unexpected result: {other:?}"),
        }
        // Failed login does not activate the engine.
        let (status, _) = call(&mut registry, handle, ApiFunction::ClientLogout, vec![]);
        assert_eq!(status, -6);
    }

    #[test]
    fn test_channel_create_join_publish_release() {
        let (mut registry, handle) = registry_with_engine();
        call(&mut registry, handle, ApiFunction::ClientLogin, vec![Value::str("tok")]);

        let (status, param) = call(
            &mut registry,
            handle,
            ApiFunction::ClientCreateStreamChannel,
            vec![Value::str("room")],
        );
        assert_eq!(status, 0);
        let raw = match param.result {
            Some(CallOutcome::Ok { data: Some(Value::Int(raw)) }) => raw as u64,
            other => panic!("expected a handle, got {other:?}"),
        };
        let channel = Handle::from_raw(raw);
        assert_ne!(channel, handle);

        // Topic publish before join is a lifecycle error.
        let publish = vec![
            Value::str("news"),
            Value::Bytes(b"hi".to_vec()),
            Value::Map(vec![]),
        ];
        let (status, _) = call(
            &mut registry,
            channel,
            ApiFunction::ChannelPublishTopicMessage,
            publish.clone(),
        );
        assert_eq!(status, -6);

        let (status, _) = call(
            &mut registry,
            channel,
            ApiFunction::ChannelJoin,
            vec![Value::Map(vec![])],
        );
        assert_eq!(status, 0);
        let (status, _) = call(
            &mut registry,
            channel,
            ApiFunction::ChannelJoinTopic,
            vec![Value::str("news"), Value::Map(vec![])],
        );
        assert_eq!(status, 0);
        let (status, _) = call(
            &mut registry,
            channel,
            ApiFunction::ChannelPublishTopicMessage,
            publish,
        );
        assert_eq!(status, 0);

        let (status, param) = call(
            &mut registry,
            channel,
            ApiFunction::ChannelGetChannelName,
            vec![],
        );
        assert_eq!(status, 0);
        assert_eq!(
            param.result,
            Some(CallOutcome::Ok { data: Some(Value::str("room")) })
        );

        let (status, _) = call(&mut registry, channel, ApiFunction::ChannelRelease, vec![]);
        assert_eq!(status, 0);
        let (status, _) = call(&mut registry, channel, ApiFunction::ChannelLeave, vec![]);
        assert_eq!(status, -1);
    }

    #[test]
    fn test_channel_ops_against_engine_handle_fail() {
        let (mut registry, handle) = registry_with_engine();
        let (status, _) = call(
            &mut registry,
            handle,
            ApiFunction::ChannelJoin,
            vec![Value::Map(vec![])],
        );
        assert_eq!(status, -1);
        // And engine ops against a channel handle likewise.
        call(&mut registry, handle, ApiFunction::ClientLogin, vec![Value::str("t")]);
        let (_, param) = call(
            &mut registry,
            handle,
            ApiFunction::ClientCreateStreamChannel,
            vec![Value::str("room")],
        );
        let raw = match param.result {
            Some(CallOutcome::Ok { data: Some(Value::Int(raw)) }) => raw as u64,
            _ => unreachable!(),
        };
        let channel = Handle::from_raw(raw);
        let (status, _) = call(
            &mut registry,
            channel,
            ApiFunction::ClientLogout,
            vec![],
        );
        assert_eq!(status, -1);
    }

    #[test]
    fn test_orphaned_channel_reports_not_initialized() {
        let (mut registry, handle) = registry_with_engine();
        call(&mut registry, handle, ApiFunction::ClientLogin, vec![Value::str("t")]);
        let (_, param) = call(
            &mut registry,
            handle,
            ApiFunction::ClientCreateStreamChannel,
            vec![Value::str("room")],
        );
        let raw = match param.result {
            Some(CallOutcome::Ok { data: Some(Value::Int(raw)) }) => raw as u64,
            _ => unreachable!(),
        };
        let channel = Handle::from_raw(raw);

        registry.remove(handle);
        let (status, _) = call(
            &mut registry,
            channel,
            ApiFunction::ChannelJoin,
            vec![Value::Map(vec![])],
        );
        assert_eq!(status, -5);
        // Release still frees the orphan.
        let (status, _) = call(&mut registry, channel, ApiFunction::ChannelRelease, vec![]);
        assert_eq!(status, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sequential_results_come_back_in_order() {
        let (mut registry, handle) = registry_with_engine();
        call(&mut registry, handle, ApiFunction::ClientLogin, vec![Value::str("t")]);

        let mut statuses = Vec::new();
        for channel in ["c1", "c2", "c3"] {
            let (status, _) = call(
                &mut registry,
                handle,
                ApiFunction::ClientSubscribe,
                vec![Value::str(channel), Value::Map(vec![])],
            );
            statuses.push(status);
        }
        assert_eq!(statuses, vec![0, 0, 0]);

        let (_, param) = call(
            &mut registry,
            handle,
            ApiFunction::PresenceGetUserChannels,
            vec![Value::str("alice")],
        );
        assert_eq!(
            param.result,
            Some(CallOutcome::Ok {
                data: Some(Value::List(vec![
                    Value::str("c1"),
                    Value::str("c2"),
                    Value::str("c3"),
                ]))
            })
        );
    }
}
