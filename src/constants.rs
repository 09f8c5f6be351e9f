//! Configuration constants for the trivia game system
//!
//! This module contains the limits, sentinels, and timing constants used
//! throughout the game core to ensure data integrity and provide consistent
//! boundaries for the different components.

/// Board layout constants
pub mod board {
    /// Number of question slots every room holds, without exception
    pub const QUESTION_COUNT: usize = 10;
    /// Index of the final-round slot (always the last slot)
    pub const FINAL_QUESTION_INDEX: usize = 9;
    /// Reserved sentinel index under which sudden-death submissions are keyed
    ///
    /// Main-round submissions only ever use indices below
    /// [`QUESTION_COUNT`], so this value can never collide with them.
    pub const SUDDEN_DEATH_INDEX: usize = 100;
    /// Maximum length of a room title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
}

/// Player-related constants
pub mod player {
    /// Maximum length of a player display name in characters
    pub const MAX_NAME_LENGTH: usize = 30;
    /// Prefix under which the local player identity is persisted client-side
    pub const LOCAL_ID_KEY_PREFIX: &str = "trivia-player-id";
}

/// Answer submission constants
pub mod answer {
    /// Maximum length of a free-text answer in characters
    pub const MAX_LENGTH: usize = 200;
    /// Advisory answer window in seconds, measured from the reveal timestamp
    ///
    /// The window is enforced by whichever client observes the countdown
    /// reach zero and closes answers; the core accepts late writes until
    /// that happens.
    pub const WINDOW_SECONDS: u64 = 30;
}

/// Question generation constants
pub mod generate {
    /// Maximum length of any generated question field in characters
    pub const MAX_FIELD_LENGTH: usize = 500;
}
