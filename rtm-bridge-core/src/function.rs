//! The function-identifier table: every operation reachable through the
//! dispatch surface, with its declared argument shape and lifecycle
//! requirement.
//!
//! Identifiers are flat `"<Component>_<operation>"` strings. The enum is the
//! compile-time-checked form: an unknown string simply fails to parse, and a
//! shape mismatch is caught before any native code is invoked. This table is
//! the versioned contract surface — removing or reshaping an entry is a
//! breaking change, adding one is not.

use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::value::ValueKind;

/// A named argument slot in a function's declared shape.
pub type ArgSpec = (&'static str, ValueKind);

/// Which object kind a function dispatches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The engine handle obtained from `create_engine`.
    Engine,
    /// A stream channel handle obtained from `RtmClient_createStreamChannel`.
    Channel,
}

/// Lifecycle state the target must be in before the call is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Legal as soon as the object exists.
    None,
    /// Engine must have completed a successful `RtmClient_login`.
    EngineActive,
    /// Channel must have completed a successful `StreamChannel_join`.
    ChannelJoined,
}

/// Every function identifier in the dispatch table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum ApiFunction {
    // RtmClient
    #[strum(serialize = "RtmClient_login")]
    ClientLogin,
    #[strum(serialize = "RtmClient_logout")]
    ClientLogout,
    #[strum(serialize = "RtmClient_renewToken")]
    ClientRenewToken,
    #[strum(serialize = "RtmClient_publish")]
    ClientPublish,
    #[strum(serialize = "RtmClient_subscribe")]
    ClientSubscribe,
    #[strum(serialize = "RtmClient_unsubscribe")]
    ClientUnsubscribe,
    #[strum(serialize = "RtmClient_createStreamChannel")]
    ClientCreateStreamChannel,
    #[strum(serialize = "RtmClient_setParameters")]
    ClientSetParameters,
    #[strum(serialize = "RtmClient_setLogFile")]
    ClientSetLogFile,
    #[strum(serialize = "RtmClient_setLogLevel")]
    ClientSetLogLevel,
    #[strum(serialize = "RtmClient_setLogFileSize")]
    ClientSetLogFileSize,

    // StreamChannel
    #[strum(serialize = "StreamChannel_join")]
    ChannelJoin,
    #[strum(serialize = "StreamChannel_renewToken")]
    ChannelRenewToken,
    #[strum(serialize = "StreamChannel_leave")]
    ChannelLeave,
    #[strum(serialize = "StreamChannel_getChannelName")]
    ChannelGetChannelName,
    #[strum(serialize = "StreamChannel_joinTopic")]
    ChannelJoinTopic,
    #[strum(serialize = "StreamChannel_publishTopicMessage")]
    ChannelPublishTopicMessage,
    #[strum(serialize = "StreamChannel_leaveTopic")]
    ChannelLeaveTopic,
    #[strum(serialize = "StreamChannel_subscribeTopic")]
    ChannelSubscribeTopic,
    #[strum(serialize = "StreamChannel_unsubscribeTopic")]
    ChannelUnsubscribeTopic,
    #[strum(serialize = "StreamChannel_getSubscribedUserList")]
    ChannelGetSubscribedUserList,
    #[strum(serialize = "StreamChannel_release")]
    ChannelRelease,

    // RtmStorage
    #[strum(serialize = "RtmStorage_setChannelMetadata")]
    StorageSetChannelMetadata,
    #[strum(serialize = "RtmStorage_updateChannelMetadata")]
    StorageUpdateChannelMetadata,
    #[strum(serialize = "RtmStorage_removeChannelMetadata")]
    StorageRemoveChannelMetadata,
    #[strum(serialize = "RtmStorage_getChannelMetadata")]
    StorageGetChannelMetadata,
    #[strum(serialize = "RtmStorage_setUserMetadata")]
    StorageSetUserMetadata,
    #[strum(serialize = "RtmStorage_updateUserMetadata")]
    StorageUpdateUserMetadata,
    #[strum(serialize = "RtmStorage_removeUserMetadata")]
    StorageRemoveUserMetadata,
    #[strum(serialize = "RtmStorage_getUserMetadata")]
    StorageGetUserMetadata,
    #[strum(serialize = "RtmStorage_subscribeUserMetadata")]
    StorageSubscribeUserMetadata,
    #[strum(serialize = "RtmStorage_unsubscribeUserMetadata")]
    StorageUnsubscribeUserMetadata,

    // RtmLock
    #[strum(serialize = "RtmLock_setLock")]
    LockSetLock,
    #[strum(serialize = "RtmLock_getLocks")]
    LockGetLocks,
    #[strum(serialize = "RtmLock_removeLock")]
    LockRemoveLock,
    #[strum(serialize = "RtmLock_acquireLock")]
    LockAcquireLock,
    #[strum(serialize = "RtmLock_releaseLock")]
    LockReleaseLock,
    #[strum(serialize = "RtmLock_revokeLock")]
    LockRevokeLock,

    // RtmPresence
    #[strum(serialize = "RtmPresence_whoNow")]
    PresenceWhoNow,
    #[strum(serialize = "RtmPresence_whereNow")]
    PresenceWhereNow,
    #[strum(serialize = "RtmPresence_setState")]
    PresenceSetState,
    #[strum(serialize = "RtmPresence_removeState")]
    PresenceRemoveState,
    #[strum(serialize = "RtmPresence_getState")]
    PresenceGetState,
    #[strum(serialize = "RtmPresence_getOnlineUsers")]
    PresenceGetOnlineUsers,
    #[strum(serialize = "RtmPresence_getUserChannels")]
    PresenceGetUserChannels,
}

use ApiFunction::*;
use ValueKind::*;

impl ApiFunction {
    /// Wire identifier of this function.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Declared argument shape: ordered `(name, kind)` slots.
    pub fn shape(&self) -> &'static [ArgSpec] {
        match self {
            ClientLogin => &[("token", Str)],
            ClientLogout => &[],
            ClientRenewToken => &[("token", Str)],
            ClientPublish => &[("channelName", Str), ("message", Bytes), ("options", Map)],
            ClientSubscribe => &[("channelName", Str), ("options", Map)],
            ClientUnsubscribe => &[("channelName", Str)],
            ClientCreateStreamChannel => &[("channelName", Str)],
            ClientSetParameters => &[("parameters", Str)],
            ClientSetLogFile => &[("filePath", Str)],
            ClientSetLogLevel => &[("level", Int)],
            ClientSetLogFileSize => &[("fileSizeInKb", Int)],

            ChannelJoin => &[("options", Map)],
            ChannelRenewToken => &[("token", Str)],
            ChannelLeave => &[],
            ChannelGetChannelName => &[],
            ChannelJoinTopic => &[("topic", Str), ("options", Map)],
            ChannelPublishTopicMessage => {
                &[("topic", Str), ("message", Bytes), ("options", Map)]
            }
            ChannelLeaveTopic => &[("topic", Str)],
            ChannelSubscribeTopic => &[("topic", Str), ("users", List)],
            ChannelUnsubscribeTopic => &[("topic", Str), ("users", List)],
            ChannelGetSubscribedUserList => &[("topic", Str)],
            ChannelRelease => &[],

            StorageSetChannelMetadata => {
                &[("channelName", Str), ("data", Map), ("options", Map)]
            }
            StorageUpdateChannelMetadata => {
                &[("channelName", Str), ("data", Map), ("options", Map)]
            }
            StorageRemoveChannelMetadata => &[("channelName", Str), ("keys", List)],
            StorageGetChannelMetadata => &[("channelName", Str)],
            StorageSetUserMetadata => &[("userId", Str), ("data", Map), ("options", Map)],
            StorageUpdateUserMetadata => &[("userId", Str), ("data", Map), ("options", Map)],
            StorageRemoveUserMetadata => &[("userId", Str), ("keys", List)],
            StorageGetUserMetadata => &[("userId", Str)],
            StorageSubscribeUserMetadata => &[("userId", Str)],
            StorageUnsubscribeUserMetadata => &[("userId", Str)],

            LockSetLock => &[("channelName", Str), ("lockName", Str), ("ttl", Int)],
            LockGetLocks => &[("channelName", Str)],
            LockRemoveLock => &[("channelName", Str), ("lockName", Str)],
            LockAcquireLock => &[("channelName", Str), ("lockName", Str), ("retry", Bool)],
            LockReleaseLock => &[("channelName", Str), ("lockName", Str)],
            LockRevokeLock => &[("channelName", Str), ("lockName", Str), ("owner", Str)],

            PresenceWhoNow => &[("channelName", Str), ("options", Map)],
            PresenceWhereNow => &[("userId", Str)],
            PresenceSetState => &[("channelName", Str), ("state", Map)],
            PresenceRemoveState => &[("channelName", Str), ("keys", List)],
            PresenceGetState => &[("channelName", Str), ("userId", Str)],
            PresenceGetOnlineUsers => &[("channelName", Str), ("options", Map)],
            PresenceGetUserChannels => &[("userId", Str)],
        }
    }

    /// The object kind this function dispatches against.
    pub fn target(&self) -> Target {
        match self {
            ChannelJoin | ChannelRenewToken | ChannelLeave | ChannelGetChannelName
            | ChannelJoinTopic | ChannelPublishTopicMessage | ChannelLeaveTopic
            | ChannelSubscribeTopic | ChannelUnsubscribeTopic
            | ChannelGetSubscribedUserList | ChannelRelease => Target::Channel,
            _ => Target::Engine,
        }
    }

    /// Lifecycle state the target must already be in.
    pub fn requirement(&self) -> Requirement {
        match self {
            // Legal on a freshly created engine, before login.
            ClientLogin | ClientSetParameters | ClientSetLogFile | ClientSetLogLevel
            | ClientSetLogFileSize => Requirement::None,
            // Legal on a freshly created channel, before join.
            ChannelJoin | ChannelRenewToken | ChannelGetChannelName | ChannelRelease => {
                Requirement::None
            }
            ChannelLeave | ChannelJoinTopic | ChannelPublishTopicMessage
            | ChannelLeaveTopic | ChannelSubscribeTopic | ChannelUnsubscribeTopic
            | ChannelGetSubscribedUserList => Requirement::ChannelJoined,
            _ => Requirement::EngineActive,
        }
    }

    /// Whether a successful call registers a new object and returns its
    /// handle in the result slot.
    pub fn creates_handle(&self) -> bool {
        matches!(self, ClientCreateStreamChannel)
    }

    /// Whether a successful call destroys the target object's handle.
    pub fn releases_handle(&self) -> bool {
        matches!(self, ChannelRelease)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for fun in ApiFunction::iter() {
            let name = fun.name();
            assert_eq!(ApiFunction::from_str(name).unwrap(), fun);
        }
    }

    #[test]
    fn test_names_are_component_prefixed() {
        for fun in ApiFunction::iter() {
            let name = fun.name();
            let (component, op) = name.split_once('_').unwrap();
            assert!(!component.is_empty());
            assert!(!op.is_empty());
        }
    }

    #[test]
    fn test_unknown_identifier_fails_to_parse() {
        assert!(ApiFunction::from_str("Unknown_op").is_err());
        // Identifiers are case sensitive.
        assert!(ApiFunction::from_str("rtmclient_login").is_err());
    }

    #[test]
    fn test_channel_functions_target_channels() {
        for fun in ApiFunction::iter() {
            let is_channel = fun.name().starts_with("StreamChannel_");
            assert_eq!(fun.target() == Target::Channel, is_channel);
        }
    }

    #[test]
    fn test_channel_functions_never_require_engine_active() {
        for fun in ApiFunction::iter() {
            if fun.target() == Target::Channel {
                assert_ne!(fun.requirement(), Requirement::EngineActive);
            }
        }
    }

    #[test]
    fn test_login_is_legal_before_activation() {
        assert_eq!(ApiFunction::ClientLogin.requirement(), Requirement::None);
        assert_eq!(
            ApiFunction::ClientPublish.requirement(),
            Requirement::EngineActive
        );
    }

    #[test]
    fn test_create_and_release_classification() {
        for fun in ApiFunction::iter() {
            assert!(!(fun.creates_handle() && fun.releases_handle()));
        }
        assert!(ApiFunction::ClientCreateStreamChannel.creates_handle());
        assert!(ApiFunction::ChannelRelease.releases_handle());
    }
}
