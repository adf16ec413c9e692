//! In-memory engine implementation.
//!
//! Stands in for the real native engine in tests and demos: state lives in
//! plain maps, "network" operations succeed immediately, and events are
//! raised synchronously through whatever forwarder the factory wired in.

use std::collections::{HashMap, HashSet};

use rtm_bridge_core::Value;

use crate::engine::{
    ClientHandle, EngineFactory, NativeError, NativeResult, Pairs, RtmEngine, StreamChannel,
};
use crate::event::{EventForwarder, EventHandlerHandle, EventRouter};

// Native code ranges used by the loopback engine; these line up with the
// reason table in the error mapper.
const ERR_INVALID_TOKEN: i32 = -10004;
const ERR_NOT_SUBSCRIBED: i32 = -10006;
const ERR_TOPIC_NOT_JOINED: i32 = -11002;
const ERR_LOCK_NOT_HELD: i32 = -12001;
const ERR_LOCK_OWNED_ELSEWHERE: i32 = -12002;
const ERR_LOCK_MISSING: i32 = -12003;
const ERR_METADATA_MISSING: i32 = -13001;

struct LockEntry {
    owner: Option<String>,
    ttl: i64,
}

/// Factory producing [`LoopbackEngine`] sessions.
pub struct LoopbackFactory {
    user: String,
    handler: EventHandlerHandle,
}

impl LoopbackFactory {
    /// Engines from this factory emit no events.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            handler: EventHandlerHandle::NONE,
        }
    }

    /// Engines from this factory deliver events to `handler`.
    pub fn with_handler(user: impl Into<String>, handler: EventHandlerHandle) -> Self {
        Self {
            user: user.into(),
            handler,
        }
    }
}

impl EngineFactory for LoopbackFactory {
    fn create_engine(
        &mut self,
        client: ClientHandle,
        events: &EventRouter,
    ) -> Option<Box<dyn RtmEngine>> {
        if client == 0 {
            return None;
        }
        let forwarder = if self.handler.is_none() {
            None
        } else {
            Some(events.forwarder(self.handler))
        };
        Some(Box::new(LoopbackEngine {
            user: self.user.clone(),
            token: None,
            subscriptions: HashSet::new(),
            channel_metadata: HashMap::new(),
            user_metadata: HashMap::new(),
            metadata_subscriptions: HashSet::new(),
            locks: HashMap::new(),
            states: HashMap::new(),
            events: forwarder,
        }))
    }
}

/// In-memory engine session.
pub struct LoopbackEngine {
    user: String,
    token: Option<String>,
    subscriptions: HashSet<String>,
    channel_metadata: HashMap<String, Vec<(String, Value)>>,
    user_metadata: HashMap<String, Vec<(String, Value)>>,
    metadata_subscriptions: HashSet<String>,
    locks: HashMap<(String, String), LockEntry>,
    /// `(channel, user)` → presence state pairs.
    states: HashMap<(String, String), Vec<(String, Value)>>,
    events: Option<EventForwarder>,
}

impl LoopbackEngine {
    /// An engine with no event forwarder, for tests that only dispatch.
    pub fn detached(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: None,
            subscriptions: HashSet::new(),
            channel_metadata: HashMap::new(),
            user_metadata: HashMap::new(),
            metadata_subscriptions: HashSet::new(),
            locks: HashMap::new(),
            states: HashMap::new(),
            events: None,
        }
    }

    fn emit(&self, name: &str, payload: Value) {
        if let Some(events) = &self.events {
            events.deliver(name, payload);
        }
    }

    fn merge(entry: &mut Vec<(String, Value)>, data: &Pairs) {
        for (key, value) in data {
            match entry.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value.clone(),
                None => entry.push((key.clone(), value.clone())),
            }
        }
    }

    fn strip(entry: &mut Vec<(String, Value)>, keys: &[Value]) {
        entry.retain(|(k, _)| !keys.iter().any(|key| key.as_str() == Some(k)));
    }
}

impl RtmEngine for LoopbackEngine {
    fn login(&mut self, token: &str) -> NativeResult<()> {
        if token.is_empty() {
            return Err(NativeError(ERR_INVALID_TOKEN));
        }
        self.token = Some(token.to_string());
        self.emit(
            "loginResult",
            Value::map([("user", Value::str(&self.user))]),
        );
        Ok(())
    }

    fn logout(&mut self) -> NativeResult<()> {
        self.token = None;
        self.emit(
            "connectionStateChanged",
            Value::map([("state", Value::str("disconnected"))]),
        );
        Ok(())
    }

    fn renew_token(&mut self, token: &str) -> NativeResult<()> {
        if token.is_empty() {
            return Err(NativeError(ERR_INVALID_TOKEN));
        }
        self.token = Some(token.to_string());
        Ok(())
    }

    fn publish(&mut self, channel: &str, message: &[u8], _options: &Pairs) -> NativeResult<()> {
        self.emit(
            "messageEvent",
            Value::map([
                ("channelName", Value::str(channel)),
                ("publisher", Value::str(&self.user)),
                ("message", Value::Bytes(message.to_vec())),
            ]),
        );
        Ok(())
    }

    fn subscribe(&mut self, channel: &str, _options: &Pairs) -> NativeResult<()> {
        self.subscriptions.insert(channel.to_string());
        self.emit(
            "presenceEvent",
            Value::map([
                ("channelName", Value::str(channel)),
                ("user", Value::str(&self.user)),
                ("type", Value::str("join")),
            ]),
        );
        Ok(())
    }

    fn unsubscribe(&mut self, channel: &str) -> NativeResult<()> {
        if !self.subscriptions.remove(channel) {
            return Err(NativeError(ERR_NOT_SUBSCRIBED));
        }
        Ok(())
    }

    fn create_stream_channel(&mut self, channel: &str) -> NativeResult<Box<dyn StreamChannel>> {
        Ok(Box::new(LoopbackChannel {
            name: channel.to_string(),
            user: self.user.clone(),
            joined: false,
            topics: HashSet::new(),
            topic_users: HashMap::new(),
            events: self.events.clone(),
        }))
    }

    fn set_parameters(&mut self, _parameters: &str) -> NativeResult<()> {
        Ok(())
    }

    fn set_log_file(&mut self, _path: &str) -> NativeResult<()> {
        Ok(())
    }

    fn set_log_level(&mut self, _level: i64) -> NativeResult<()> {
        Ok(())
    }

    fn set_log_file_size(&mut self, _size_kb: i64) -> NativeResult<()> {
        Ok(())
    }

    fn set_channel_metadata(
        &mut self,
        channel: &str,
        data: &Pairs,
        _options: &Pairs,
    ) -> NativeResult<()> {
        self.channel_metadata
            .insert(channel.to_string(), data.to_vec());
        self.emit(
            "storageEvent",
            Value::map([("channelName", Value::str(channel))]),
        );
        Ok(())
    }

    fn update_channel_metadata(
        &mut self,
        channel: &str,
        data: &Pairs,
        _options: &Pairs,
    ) -> NativeResult<()> {
        let entry = self
            .channel_metadata
            .get_mut(channel)
            .ok_or(NativeError(ERR_METADATA_MISSING))?;
        Self::merge(entry, data);
        Ok(())
    }

    fn remove_channel_metadata(&mut self, channel: &str, keys: &[Value]) -> NativeResult<()> {
        if let Some(entry) = self.channel_metadata.get_mut(channel) {
            Self::strip(entry, keys);
        }
        Ok(())
    }

    fn get_channel_metadata(&mut self, channel: &str) -> NativeResult<Value> {
        Ok(Value::Map(
            self.channel_metadata.get(channel).cloned().unwrap_or_default(),
        ))
    }

    fn set_user_metadata(
        &mut self,
        user: &str,
        data: &Pairs,
        _options: &Pairs,
    ) -> NativeResult<()> {
        self.user_metadata.insert(user.to_string(), data.to_vec());
        Ok(())
    }

    fn update_user_metadata(
        &mut self,
        user: &str,
        data: &Pairs,
        _options: &Pairs,
    ) -> NativeResult<()> {
        let entry = self
            .user_metadata
            .get_mut(user)
            .ok_or(NativeError(ERR_METADATA_MISSING))?;
        Self::merge(entry, data);
        Ok(())
    }

    fn remove_user_metadata(&mut self, user: &str, keys: &[Value]) -> NativeResult<()> {
        if let Some(entry) = self.user_metadata.get_mut(user) {
            Self::strip(entry, keys);
        }
        Ok(())
    }

    fn get_user_metadata(&mut self, user: &str) -> NativeResult<Value> {
        Ok(Value::Map(
            self.user_metadata.get(user).cloned().unwrap_or_default(),
        ))
    }

    fn subscribe_user_metadata(&mut self, user: &str) -> NativeResult<()> {
        self.metadata_subscriptions.insert(user.to_string());
        Ok(())
    }

    fn unsubscribe_user_metadata(&mut self, user: &str) -> NativeResult<()> {
        self.metadata_subscriptions.remove(user);
        Ok(())
    }

    fn set_lock(&mut self, channel: &str, lock: &str, ttl: i64) -> NativeResult<()> {
        self.locks
            .insert((channel.to_string(), lock.to_string()), LockEntry {
                owner: None,
                ttl,
            });
        Ok(())
    }

    fn get_locks(&mut self, channel: &str) -> NativeResult<Value> {
        let locks: Vec<Value> = self
            .locks
            .iter()
            .filter(|((ch, _), _)| ch == channel)
            .map(|((_, name), entry)| {
                Value::map([
                    ("lockName", Value::str(name)),
                    (
                        "owner",
                        Value::str(entry.owner.as_deref().unwrap_or_default()),
                    ),
                    ("ttl", Value::Int(entry.ttl)),
                ])
            })
            .collect();
        Ok(Value::List(locks))
    }

    fn remove_lock(&mut self, channel: &str, lock: &str) -> NativeResult<()> {
        self.locks
            .remove(&(channel.to_string(), lock.to_string()))
            .map(|_| ())
            .ok_or(NativeError(ERR_LOCK_MISSING))
    }

    fn acquire_lock(&mut self, channel: &str, lock: &str, _retry: bool) -> NativeResult<()> {
        let entry = self
            .locks
            .get_mut(&(channel.to_string(), lock.to_string()))
            .ok_or(NativeError(ERR_LOCK_MISSING))?;
        match &entry.owner {
            Some(owner) if owner != &self.user => Err(NativeError(ERR_LOCK_OWNED_ELSEWHERE)),
            _ => {
                entry.owner = Some(self.user.clone());
                self.emit(
                    "lockEvent",
                    Value::map([
                        ("channelName", Value::str(channel)),
                        ("lockName", Value::str(lock)),
                        ("owner", Value::str(&self.user)),
                    ]),
                );
                Ok(())
            }
        }
    }

    fn release_lock(&mut self, channel: &str, lock: &str) -> NativeResult<()> {
        let entry = self
            .locks
            .get_mut(&(channel.to_string(), lock.to_string()))
            .ok_or(NativeError(ERR_LOCK_MISSING))?;
        if entry.owner.as_deref() != Some(self.user.as_str()) {
            return Err(NativeError(ERR_LOCK_NOT_HELD));
        }
        entry.owner = None;
        Ok(())
    }

    fn revoke_lock(&mut self, channel: &str, lock: &str, owner: &str) -> NativeResult<()> {
        let entry = self
            .locks
            .get_mut(&(channel.to_string(), lock.to_string()))
            .ok_or(NativeError(ERR_LOCK_MISSING))?;
        if entry.owner.as_deref() != Some(owner) {
            return Err(NativeError(ERR_LOCK_OWNED_ELSEWHERE));
        }
        entry.owner = None;
        Ok(())
    }

    fn who_now(&mut self, channel: &str, _options: &Pairs) -> NativeResult<Value> {
        let mut users: Vec<String> = self
            .states
            .keys()
            .filter(|(ch, _)| ch == channel)
            .map(|(_, user)| user.clone())
            .collect();
        if self.subscriptions.contains(channel) && !users.iter().any(|u| u == &self.user) {
            users.push(self.user.clone());
        }
        users.sort();
        Ok(Value::List(users.into_iter().map(Value::Str).collect()))
    }

    fn where_now(&mut self, user: &str) -> NativeResult<Value> {
        let mut channels: Vec<String> = self
            .states
            .keys()
            .filter(|(_, u)| u == user)
            .map(|(ch, _)| ch.clone())
            .collect();
        if user == self.user {
            for channel in &self.subscriptions {
                if !channels.contains(channel) {
                    channels.push(channel.clone());
                }
            }
        }
        channels.sort();
        Ok(Value::List(channels.into_iter().map(Value::Str).collect()))
    }

    fn set_state(&mut self, channel: &str, state: &Pairs) -> NativeResult<()> {
        let entry = self
            .states
            .entry((channel.to_string(), self.user.clone()))
            .or_default();
        Self::merge(entry, state);
        Ok(())
    }

    fn remove_state(&mut self, channel: &str, keys: &[Value]) -> NativeResult<()> {
        if let Some(entry) = self
            .states
            .get_mut(&(channel.to_string(), self.user.clone()))
        {
            Self::strip(entry, keys);
        }
        Ok(())
    }

    fn get_state(&mut self, channel: &str, user: &str) -> NativeResult<Value> {
        Ok(Value::Map(
            self.states
                .get(&(channel.to_string(), user.to_string()))
                .cloned()
                .unwrap_or_default(),
        ))
    }

    fn get_online_users(&mut self, channel: &str, options: &Pairs) -> NativeResult<Value> {
        self.who_now(channel, options)
    }

    fn get_user_channels(&mut self, user: &str) -> NativeResult<Value> {
        self.where_now(user)
    }
}

/// In-memory stream channel.
pub struct LoopbackChannel {
    name: String,
    user: String,
    joined: bool,
    topics: HashSet<String>,
    topic_users: HashMap<String, Vec<Value>>,
    events: Option<EventForwarder>,
}

impl LoopbackChannel {
    fn emit(&self, name: &str, payload: Value) {
        if let Some(events) = &self.events {
            events.deliver(name, payload);
        }
    }
}

impl StreamChannel for LoopbackChannel {
    fn join(&mut self, _options: &Pairs) -> NativeResult<()> {
        self.joined = true;
        self.emit(
            "presenceEvent",
            Value::map([
                ("channelName", Value::str(&self.name)),
                ("user", Value::str(&self.user)),
                ("type", Value::str("join")),
            ]),
        );
        Ok(())
    }

    fn renew_token(&mut self, token: &str) -> NativeResult<()> {
        if token.is_empty() {
            return Err(NativeError(ERR_INVALID_TOKEN));
        }
        Ok(())
    }

    fn leave(&mut self) -> NativeResult<()> {
        self.joined = false;
        self.emit(
            "presenceEvent",
            Value::map([
                ("channelName", Value::str(&self.name)),
                ("user", Value::str(&self.user)),
                ("type", Value::str("leave")),
            ]),
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        &self.name
    }

    fn join_topic(&mut self, topic: &str, _options: &Pairs) -> NativeResult<()> {
        self.topics.insert(topic.to_string());
        Ok(())
    }

    fn publish_topic_message(
        &mut self,
        topic: &str,
        message: &[u8],
        _options: &Pairs,
    ) -> NativeResult<()> {
        if !self.topics.contains(topic) {
            return Err(NativeError(ERR_TOPIC_NOT_JOINED));
        }
        self.emit(
            "topicMessage",
            Value::map([
                ("channelName", Value::str(&self.name)),
                ("topic", Value::str(topic)),
                ("publisher", Value::str(&self.user)),
                ("message", Value::Bytes(message.to_vec())),
            ]),
        );
        Ok(())
    }

    fn leave_topic(&mut self, topic: &str) -> NativeResult<()> {
        if !self.topics.remove(topic) {
            return Err(NativeError(ERR_TOPIC_NOT_JOINED));
        }
        Ok(())
    }

    fn subscribe_topic(&mut self, topic: &str, users: &[Value]) -> NativeResult<()> {
        let entry = self.topic_users.entry(topic.to_string()).or_default();
        for user in users {
            if !entry.contains(user) {
                entry.push(user.clone());
            }
        }
        Ok(())
    }

    fn unsubscribe_topic(&mut self, topic: &str, users: &[Value]) -> NativeResult<()> {
        if let Some(entry) = self.topic_users.get_mut(topic) {
            entry.retain(|user| !users.contains(user));
        }
        Ok(())
    }

    fn subscribed_user_list(&mut self, topic: &str) -> NativeResult<Value> {
        Ok(Value::List(
            self.topic_users.get(topic).cloned().unwrap_or_default(),
        ))
    }
}
