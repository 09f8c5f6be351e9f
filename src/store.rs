//! Storage collaborator seam
//!
//! The core does not talk to a database directly; it goes through the
//! [`RoomStore`] trait, which models the external live document store as a
//! keyed collection of [`RoomDocument`]s with one crucial primitive:
//! [`RoomStore::transact`], a read-modify-write closure executed with
//! at-least-serializable isolation on the touched document. Every
//! score-affecting operation runs inside it, which is what makes judging
//! race-free without any in-process coordination in the core itself.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and
//! single-process deployments; a real backend only needs to satisfy the
//! same trait.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ledger::Ledger, room::Room, room_id::RoomId};

/// The unit of storage and transactional isolation: one room plus its ledger
///
/// Keeping the ledger in the same document as the room lets a single
/// transaction jointly observe a player's score and a submission's judged
/// state, which the judging contract requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDocument {
    /// Authoritative room state
    pub room: Room,
    /// Everything players have written
    pub ledger: Ledger,
}

impl RoomDocument {
    /// Wraps a freshly created room with an empty ledger
    pub fn new(room: Room) -> Self {
        Self {
            room,
            ledger: Ledger::default(),
        }
    }
}

/// Errors raised by storage backends
#[derive(Error, Debug)]
pub enum StoreError {
    /// No document exists under the given room ID
    #[error("room {0} does not exist")]
    Missing(RoomId),
    /// A document already exists under the given room ID
    #[error("room {0} already exists")]
    Duplicate(RoomId),
    /// The backend failed for reasons unrelated to the request
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A keyed store of room documents with a transaction primitive
///
/// Implementations must give `transact` at-least-serializable isolation per
/// document: the closure observes a consistent snapshot and its writes land
/// atomically, or the whole call fails without partial effects.
pub trait RoomStore {
    /// Creates the document for a new room
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the room ID is taken (the
    /// caller regenerates the join code and retries).
    fn insert(&self, document: RoomDocument) -> Result<(), StoreError>;

    /// Reads a consistent copy of a document
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Missing`] if the room does not exist.
    fn snapshot(&self, id: RoomId) -> Result<RoomDocument, StoreError>;

    /// Runs a read-modify-write closure against one document
    ///
    /// If the closure returns an error, its mutations are still persisted
    /// only when the closure says so by design: closures in this crate
    /// mutate the document only on their success paths, so an error return
    /// leaves no partial state behind.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or [`StoreError::Missing`] (converted
    /// into `E`) if the room does not exist.
    fn transact<T, E, F>(&self, id: RoomId, operation: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut RoomDocument) -> Result<T, E>;
}

/// In-process room store
///
/// One mutex per document gives each room serializable isolation, matching
/// what the external document store's transaction primitive provides. The
/// outer map lock is held only long enough to find the document.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: Mutex<HashMap<RoomId, Arc<Mutex<RoomDocument>>>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: RoomId) -> Result<Arc<Mutex<RoomDocument>>, StoreError> {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(StoreError::Missing(id))
    }
}

impl RoomStore for MemoryStore {
    fn insert(&self, document: RoomDocument) -> Result<(), StoreError> {
        let id = document.room.id;
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if rooms.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        rooms.insert(id, Arc::new(Mutex::new(document)));
        Ok(())
    }

    fn snapshot(&self, id: RoomId) -> Result<RoomDocument, StoreError> {
        let entry = self.entry(id)?;
        let document = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(document.clone())
    }

    fn transact<T, E, F>(&self, id: RoomId, operation: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut RoomDocument) -> Result<T, E>,
    {
        let entry = self.entry(id).map_err(E::from)?;
        let mut document = entry.lock().unwrap_or_else(PoisonError::into_inner);
        operation(&mut document)
    }
}
