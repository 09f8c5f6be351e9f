//! Player identity and player state
//!
//! This module defines the opaque identifiers used by players and hosts,
//! the per-player state tracked inside a room, display-name validation,
//! and the client-side identity allocator that lets a rejoining player
//! reattach to their existing score.

use std::{fmt::Display, str::FromStr};

use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;
use web_time::SystemTime;

use super::{constants, room_id::RoomId};

/// An opaque identifier for a player
///
/// The ID is generated client-side and persisted in client-local storage,
/// so it stays stable for a browser session. It carries no authority; it
/// only keys the player's score and submissions within a room.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Creates a new random player ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    /// Creates a new random player ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PlayerId {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    /// Parses a player ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The capability token granting host authority over a room
///
/// Knowledge of the secret is the only thing that distinguishes the host
/// from a player: any call presenting the matching secret is authorized,
/// and nothing else is. The secret is delivered out-of-band to the host
/// (typically embedded in a private URL) and never appears in any
/// player-facing view.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct HostSecret(Uuid);

impl HostSecret {
    /// Creates a new random host secret
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HostSecret {
    /// Creates a new random host secret (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for HostSecret {
    /// Formats the secret as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for HostSecret {
    type Err = uuid::Error;

    /// Parses a host secret from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Per-player state tracked inside a room
///
/// Created when the player joins; the score is mutated only by judged
/// scoring operations, and the entry is removed only by explicit
/// player-initiated removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// The player's opaque identifier
    pub id: PlayerId,
    /// The player's validated display name
    pub name: String,
    /// Total score; never observed below zero because final-round wagers
    /// are clamped to the score at judgment time
    pub score: i64,
    /// When the player joined the room
    pub joined_at: SystemTime,
}

impl Player {
    /// Creates a new player with a zero score, joined now
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            score: 0,
            joined_at: SystemTime::now(),
        }
    }
}

/// Errors that can occur during display-name validation
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Inappropriate,
}

/// Validates and normalizes a display name
///
/// The name is trimmed of surrounding whitespace, checked against the
/// length limit, and content-filtered. Unlike names in a ranked system,
/// duplicates are allowed: players are keyed by ID, not by name.
///
/// # Errors
///
/// * `NameError::Empty` - name is empty after trimming whitespace
/// * `NameError::TooLong` - name exceeds the maximum length in characters
/// * `NameError::Inappropriate` - name fails the content filter
pub fn clean_name(name: &str) -> Result<String, NameError> {
    let name = rustrict::trim_whitespace(name);
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.chars().count() > constants::player::MAX_NAME_LENGTH {
        return Err(NameError::TooLong);
    }
    if name.is_inappropriate() {
        return Err(NameError::Inappropriate);
    }
    Ok(name.to_owned())
}

/// Client-local persistent storage
///
/// This trait abstracts whatever key-value storage the client has available
/// (browser local storage, a config file, nothing at all). It is the seam
/// the identity allocator uses; no server round-trip is ever involved.
pub trait LocalStorage {
    /// Reads the value stored under `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, best-effort
    ///
    /// Implementations may silently drop the write if storage is
    /// unavailable; the allocator degrades to an ephemeral identity.
    fn set(&self, key: &str, value: &str);
}

/// Returns the stable local player ID for a room, creating one if needed
///
/// On the first call for a given room this generates a fresh random ID and
/// persists it keyed by the room; subsequent calls return the same ID so a
/// rejoining player reattaches to their existing score. This never fails:
/// if storage is unavailable or holds a corrupt value, a fresh ID is
/// returned and continuity across reloads is simply lost.
pub fn ensure_local_player_id(storage: &impl LocalStorage, room: RoomId) -> PlayerId {
    let key = format!("{}:{room}", constants::player::LOCAL_ID_KEY_PREFIX);

    if let Some(existing) = storage.get(&key)
        && let Ok(id) = PlayerId::from_str(&existing)
    {
        return id;
    }

    let id = PlayerId::new();
    storage.set(&key, &id.to_string());
    id
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashMap};

    use super::*;

    /// In-memory stand-in for browser local storage
    #[derive(Default)]
    struct MapStorage {
        values: RefCell<HashMap<String, String>>,
    }

    impl LocalStorage for MapStorage {
        fn get(&self, key: &str) -> Option<String> {
            self.values.borrow().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) {
            self.values.borrow_mut().insert(key.to_owned(), value.to_owned());
        }
    }

    /// Storage that accepts nothing, like a browser with local storage off
    struct BrokenStorage;

    impl LocalStorage for BrokenStorage {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _value: &str) {}
    }

    #[test]
    fn test_player_id_serde_round_trip() {
        let id = PlayerId::new();
        let serialized = serde_json::to_string(&id).unwrap();
        let deserialized: PlayerId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_host_secret_unique() {
        assert_ne!(HostSecret::new(), HostSecret::new());
    }

    #[test]
    fn test_host_secret_round_trip_display() {
        let secret = HostSecret::new();
        let parsed = HostSecret::from_str(&secret.to_string()).unwrap();
        assert_eq!(secret, parsed);
    }

    #[test]
    fn test_player_starts_at_zero() {
        let player = Player::new(PlayerId::new(), "Ada".to_owned());
        assert_eq!(player.score, 0);
        assert_eq!(player.name, "Ada");
    }

    #[test]
    fn test_clean_name_trims() {
        assert_eq!(clean_name("  Ada  ").unwrap(), "Ada");
    }

    #[test]
    fn test_clean_name_empty() {
        assert_eq!(clean_name(""), Err(NameError::Empty));
        assert_eq!(clean_name("   "), Err(NameError::Empty));
        assert_eq!(clean_name("\t\n"), Err(NameError::Empty));
    }

    #[test]
    fn test_clean_name_too_long() {
        let long = "a".repeat(constants::player::MAX_NAME_LENGTH + 1);
        assert_eq!(clean_name(&long), Err(NameError::TooLong));

        let max = "a".repeat(constants::player::MAX_NAME_LENGTH);
        assert!(clean_name(&max).is_ok());
    }

    #[test]
    fn test_clean_name_length_counts_characters() {
        // Multibyte characters count once each, not once per byte
        let name = "é".repeat(constants::player::MAX_NAME_LENGTH);
        assert_eq!(clean_name(&name).unwrap(), name);

        let long = "é".repeat(constants::player::MAX_NAME_LENGTH + 1);
        assert_eq!(clean_name(&long), Err(NameError::TooLong));
    }

    #[test]
    fn test_clean_name_measures_after_trimming() {
        let padded = format!("   {}   ", "a".repeat(constants::player::MAX_NAME_LENGTH));
        assert!(clean_name(&padded).is_ok());
    }

    #[test]
    fn test_clean_name_inappropriate() {
        for name in ["fuck", "shit"] {
            assert_eq!(
                clean_name(name),
                Err(NameError::Inappropriate),
                "expected '{name}' to be filtered"
            );
        }
    }

    #[test]
    fn test_ensure_local_player_id_stable() {
        let storage = MapStorage::default();
        let room = RoomId::new();

        let first = ensure_local_player_id(&storage, room);
        let second = ensure_local_player_id(&storage, room);
        assert_eq!(first, second);
    }

    #[test]
    fn test_ensure_local_player_id_per_room() {
        let storage = MapStorage::default();
        let room_a = RoomId::from_str("100001").unwrap();
        let room_b = RoomId::from_str("100002").unwrap();

        let id_a = ensure_local_player_id(&storage, room_a);
        let id_b = ensure_local_player_id(&storage, room_b);
        assert_ne!(id_a, id_b);

        assert_eq!(ensure_local_player_id(&storage, room_a), id_a);
    }

    #[test]
    fn test_ensure_local_player_id_corrupt_value() {
        let storage = MapStorage::default();
        let room = RoomId::new();
        let key = format!("{}:{room}", constants::player::LOCAL_ID_KEY_PREFIX);
        storage.set(&key, "not-a-uuid");

        // A corrupt stored value is replaced, not an error
        let id = ensure_local_player_id(&storage, room);
        assert_eq!(ensure_local_player_id(&storage, room), id);
    }

    #[test]
    fn test_ensure_local_player_id_without_storage() {
        let room = RoomId::new();

        // Degrades to ephemeral IDs rather than failing
        let first = ensure_local_player_id(&BrokenStorage, room);
        let second = ensure_local_player_id(&BrokenStorage, room);
        assert_ne!(first, second);
    }
}
