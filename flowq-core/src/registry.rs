//! Generation-checked handle registry.
//!
//! The C-ABI cannot hand raw pointers across the boundary, so every live
//! interface object sits in a dense entry array and is addressed by an
//! `(index, generation)` pair. Releasing an entry bumps its generation, so
//! a stale handle fails every typed access instead of touching a recycled
//! slot. The registry is externally serialised: callers (the C layer) wrap
//! it in a mutex and never touch one handle from two threads at once.

use std::sync::Arc;

use tracing::debug;

use crate::backend::{BackendKind, Connect, Queue, QueueList};

/// Generation value reserved for handles that were never issued.
pub const GENERATION_NEVER: u16 = 0;

/// Largest generation before the counter wraps back to 1.
pub const GENERATION_MAX: u16 = u16::MAX;

/// Opaque reference to a registry entry.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    pub index: u32,
    pub generation: u16,
}

impl Handle {
    /// A handle that no registry ever issued.
    pub const INVALID: Handle = Handle {
        index: 0,
        generation: GENERATION_NEVER,
    };
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Which interface family an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Connect,
    QueueList,
    Queue,
}

/// A registered interface object, tagged by family.
pub enum RegistryObject {
    Connect(Arc<dyn Connect>),
    QueueList(Arc<dyn QueueList>),
    Queue(Arc<dyn Queue>),
}

impl RegistryObject {
    fn kind(&self) -> ObjectKind {
        match self {
            RegistryObject::Connect(_) => ObjectKind::Connect,
            RegistryObject::QueueList(_) => ObjectKind::QueueList,
            RegistryObject::Queue(_) => ObjectKind::Queue,
        }
    }

    fn backend(&self) -> BackendKind {
        match self {
            RegistryObject::Connect(conn) => conn.backend(),
            RegistryObject::QueueList(list) => list.backend(),
            RegistryObject::Queue(queue) => queue.backend(),
        }
    }
}

struct Entry {
    object: Option<RegistryObject>,
    generation: u16,
    alive: bool,
    /// Cleared by `take_owned`: the referent now belongs to a parent object
    /// and outlives the handle.
    owned: bool,
}

/// Dense entry array with a free-index list.
pub struct Registry {
    entries: Vec<Entry>,
    free_indices: Vec<u32>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_indices: Vec::new(),
        }
    }

    /// Register an object and return its handle. Freed indices are reused
    /// with the generation their release left behind.
    pub fn create(&mut self, object: RegistryObject) -> Handle {
        let index = match self.free_indices.pop() {
            Some(index) => index,
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Entry {
                    object: None,
                    generation: 1,
                    alive: false,
                    owned: true,
                });
                index
            }
        };

        let entry = &mut self.entries[index as usize];
        entry.object = Some(object);
        entry.alive = true;
        entry.owned = true;

        Handle {
            index,
            generation: entry.generation,
        }
    }

    fn entry(&self, handle: Handle) -> Option<&Entry> {
        let entry = self.entries.get(handle.index as usize)?;
        if !entry.alive || entry.generation != handle.generation {
            return None;
        }
        Some(entry)
    }

    pub fn is_valid(&self, handle: Handle) -> bool {
        handle.generation != GENERATION_NEVER && self.entry(handle).is_some()
    }

    /// Family tag of the referent, or `None` for a stale or dead handle.
    pub fn kind(&self, handle: Handle) -> Option<ObjectKind> {
        self.entry(handle)?.object.as_ref().map(RegistryObject::kind)
    }

    /// Variant tag of the referent.
    pub fn backend(&self, handle: Handle) -> Option<BackendKind> {
        self.entry(handle)?
            .object
            .as_ref()
            .map(RegistryObject::backend)
    }

    pub fn connect(&self, handle: Handle) -> Option<Arc<dyn Connect>> {
        match self.entry(handle)?.object.as_ref()? {
            RegistryObject::Connect(conn) => Some(Arc::clone(conn)),
            _ => None,
        }
    }

    pub fn queue_list(&self, handle: Handle) -> Option<Arc<dyn QueueList>> {
        match self.entry(handle)?.object.as_ref()? {
            RegistryObject::QueueList(list) => Some(Arc::clone(list)),
            _ => None,
        }
    }

    pub fn queue(&self, handle: Handle) -> Option<Arc<dyn Queue>> {
        match self.entry(handle)?.object.as_ref()? {
            RegistryObject::Queue(queue) => Some(Arc::clone(queue)),
            _ => None,
        }
    }

    /// Mark the referent as owned by a parent object, so removing the
    /// handle later only drops the registry's reference.
    pub fn take_owned(&mut self, handle: Handle) -> bool {
        let Some(entry) = self.entries.get_mut(handle.index as usize) else {
            return false;
        };
        if !entry.alive || entry.generation != handle.generation {
            return false;
        }
        entry.owned = false;
        true
    }

    /// Release the entry: drop the object, bump the generation (wrapping
    /// past the maximum back to 1, never 0) and recycle the index.
    pub fn remove(&mut self, handle: Handle) -> bool {
        let Some(entry) = self.entries.get_mut(handle.index as usize) else {
            return false;
        };
        if !entry.alive || entry.generation != handle.generation {
            return false;
        }

        entry.object = None;
        entry.alive = false;
        entry.generation = if entry.generation >= GENERATION_MAX {
            1
        } else {
            entry.generation + 1
        };
        self.free_indices.push(handle.index);
        debug!(index = handle.index, "handle released");
        true
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.alive).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
