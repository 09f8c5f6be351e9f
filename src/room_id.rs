//! Room ID generation and management
//!
//! This module provides functionality for generating and managing the unique
//! IDs that identify game rooms. A room ID doubles as the public join code,
//! so it is generated as a 6-digit decimal number that is easy to read out
//! loud or type on a phone keypad.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

/// Minimum value for generated room IDs (smallest 6-digit number)
const MIN_VALUE: u32 = 100_000;
/// Upper bound for generated room IDs (exclusive)
const MAX_VALUE: u32 = 1_000_000;

/// A unique identifier for a game room
///
/// Room IDs are generated randomly within a fixed range so they always
/// display as 6 decimal digits. The ID is public and is the join code
/// players use to enter the room; it grants no authority by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomId(u32);

impl RoomId {
    /// Creates a new random room ID
    ///
    /// The ID is generated within the valid range to ensure it displays
    /// as a 6-digit decimal number for easy communication.
    pub fn new() -> Self {
        Self(fastrand::u32(MIN_VALUE..MAX_VALUE))
    }
}

impl Default for RoomId {
    /// Creates a new random room ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoomId {
    /// Formats the room ID as a 6-digit decimal number
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl Serialize for RoomId {
    /// Serializes the room ID as a decimal string
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RoomId {
    /// Deserializes a room ID from a decimal string
    fn deserialize<D>(deserializer: D) -> Result<RoomId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RoomId::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl FromStr for RoomId {
    type Err = ParseIntError;

    /// Parses a room ID from a decimal string representation
    ///
    /// # Errors
    ///
    /// Returns a `ParseIntError` if the string cannot be parsed as a valid
    /// decimal number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_new_in_range() {
        for _ in 0..100 {
            let id = RoomId::new();
            assert!(id.0 >= MIN_VALUE);
            assert!(id.0 < MAX_VALUE);
        }
    }

    #[test]
    fn test_room_id_display_format() {
        let id = RoomId(MIN_VALUE);
        assert_eq!(id.to_string(), "100000");

        let id = RoomId(123_456);
        assert_eq!(id.to_string(), "123456");

        let id = RoomId(MAX_VALUE - 1);
        assert_eq!(id.to_string(), "999999");
    }

    #[test]
    fn test_room_id_from_str() {
        let id = RoomId::from_str("100000").unwrap();
        assert_eq!(id.0, MIN_VALUE);

        let id = RoomId::from_str("424242").unwrap();
        assert_eq!(id.0, 424_242);
    }

    #[test]
    fn test_room_id_from_str_invalid() {
        assert!(RoomId::from_str("invalid").is_err());
        assert!(RoomId::from_str("").is_err());
        assert!(RoomId::from_str("12a456").is_err());
    }

    #[test]
    fn test_room_id_serialization() {
        let id = RoomId(123_456);
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, "\"123456\"");

        let deserialized: RoomId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, id);
    }

    #[test]
    fn test_room_id_deserialization_error() {
        // Number instead of string
        let result: Result<RoomId, _> = serde_json::from_str("123456");
        assert!(result.is_err());
    }

    #[test]
    fn test_room_id_round_trip_display() {
        let id = RoomId::new();
        let parsed = RoomId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }
}
