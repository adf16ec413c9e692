//! Handle registry: sole owner of the mapping from opaque handle values to
//! live native objects.
//!
//! Handles are generation-tagged slotmap keys in their `u64` FFI form, so a
//! stale handle can never alias a newly created object in the same slot, and
//! zero is never a live key. Callers own only the right to present a handle,
//! never the object behind it.

use slotmap::{Key, KeyData, SlotMap};

use crate::engine::{RtmEngine, StreamChannel};

slotmap::new_key_type! {
    struct ObjectKey;
}

/// Opaque identifier for a registered native object. Zero is "invalid/none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Handle(u64);

impl Handle {
    pub const NONE: Handle = Handle(0);

    /// The raw fixed-width value that crosses the boundary.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from its raw value. Unknown or stale values are
    /// harmless: they simply fail to resolve.
    pub fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    fn key(self) -> ObjectKey {
        KeyData::from_ffi(self.0).into()
    }

    fn from_key(key: ObjectKey) -> Self {
        Handle(key.data().as_ffi())
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Lifecycle state of a registered engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created but not logged in yet.
    Created,
    /// Logged in; session-requiring calls are legal.
    Active,
}

/// A live object addressable through the registry.
pub enum RegistryObject {
    Engine {
        state: EngineState,
        native: Box<dyn RtmEngine>,
    },
    Channel {
        joined: bool,
        /// Engine the channel was created from. Not a cascade: destroying
        /// the engine does not destroy the channel, it only invalidates the
        /// channel's backing session.
        parent: Handle,
        native: Box<dyn StreamChannel>,
    },
}

/// Owns every live engine and stream channel instance.
#[derive(Default)]
pub struct Registry {
    objects: SlotMap<ObjectKey, RegistryObject>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly constructed engine. The returned handle is valid
    /// until `remove`.
    pub fn insert_engine(&mut self, native: Box<dyn RtmEngine>) -> Handle {
        let key = self.objects.insert(RegistryObject::Engine {
            state: EngineState::Created,
            native,
        });
        Handle::from_key(key)
    }

    /// Register a stream channel created from `parent`.
    pub fn insert_channel(&mut self, parent: Handle, native: Box<dyn StreamChannel>) -> Handle {
        let key = self.objects.insert(RegistryObject::Channel {
            joined: false,
            parent,
            native,
        });
        Handle::from_key(key)
    }

    /// Resolve a handle for the duration of the current call.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut RegistryObject> {
        self.objects.get_mut(handle.key())
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.objects.contains_key(handle.key())
    }

    /// True if the handle resolves to an engine (not a channel).
    pub fn is_engine(&self, handle: Handle) -> bool {
        matches!(
            self.objects.get(handle.key()),
            Some(RegistryObject::Engine { .. })
        )
    }

    /// Parent engine of a channel handle, if the handle is a live channel.
    pub fn channel_parent(&self, handle: Handle) -> Option<Handle> {
        match self.objects.get(handle.key()) {
            Some(RegistryObject::Channel { parent, .. }) => Some(*parent),
            _ => None,
        }
    }

    /// Remove the mapping and release the native object. A handle passed
    /// here a second time resolves to nothing; there is no double free.
    pub fn remove(&mut self, handle: Handle) -> Option<RegistryObject> {
        self.objects.remove(handle.key())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
