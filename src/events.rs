//! Observer fan-out
//!
//! The core exposes plain request/response operations; keeping every device
//! in sync is the job of an adapter layer subscribed through this module.
//! After each successful mutation the coordinator publishes a typed
//! [`RoomEvent`] into a channel-per-room registry, fully decoupled from the
//! mutation logic: publishing never blocks, never fails an operation, and
//! subscribers that went away are silently dropped.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex, PoisonError,
        mpsc::{Receiver, Sender, channel},
    },
};

use serde::Serialize;
use serde_with::skip_serializing_none;

use super::{
    player::PlayerId,
    room::Phase,
    room_id::RoomId,
};

/// Events about players entering and leaving a room
#[derive(Debug, Serialize, Clone)]
pub enum PlayerEvent {
    /// A player joined (or rejoined under the same ID)
    Joined {
        /// The joining player
        player_id: PlayerId,
        /// Their validated display name
        name: String,
    },
    /// A player removed themselves
    Left {
        /// The departing player
        player_id: PlayerId,
    },
}

/// Events about the board and game flow
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum BoardEvent {
    /// The room changed phase
    PhaseChanged {
        /// The new phase
        phase: Phase,
    },
    /// The host moved to a different question slot
    IndexChanged {
        /// The newly selected slot
        index: usize,
    },
    /// The current question became visible and open for answers
    Revealed {
        /// The revealed slot
        index: usize,
    },
    /// Answers to the current question closed
    AnswersClosed,
    /// The current question was hidden again
    Hidden,
    /// A question slot's content changed
    QuestionChanged {
        /// The edited slot; `None` when the whole board was replaced
        index: Option<usize>,
    },
    /// The room title changed
    TitleChanged,
    /// A player wrote or edited an answer
    AnswerSubmitted {
        /// The question being answered
        question_index: usize,
        /// The submitting player
        player_id: PlayerId,
    },
    /// A player declared or changed their final-round wager
    WagerSubmitted {
        /// The wagering player
        player_id: PlayerId,
    },
    /// A player wrote or edited their final-round answer
    FinalAnswerSubmitted {
        /// The submitting player
        player_id: PlayerId,
    },
    /// The host flipped the final answer key's visibility
    AnswerKeyToggled,
    /// The game ended
    Ended,
}

/// Events about judgments and their score effects
#[derive(Debug, Serialize, Clone)]
pub enum JudgmentEvent {
    /// A submission was judged and the delta applied atomically
    Scored {
        /// The judged player
        player_id: PlayerId,
        /// The question the judgment concerns; the sudden-death sentinel
        /// for tiebreaker judgments
        question_index: usize,
        /// Whether the answer was accepted
        correct: bool,
        /// The applied score delta
        delta: i64,
        /// The player's score after the delta
        score: i64,
    },
}

/// Events about the sudden-death excursion
#[derive(Debug, Serialize, Clone)]
pub enum SuddenDeathEvent {
    /// A tiebreaker round was created
    Started {
        /// The players allowed to answer
        eligible: HashSet<PlayerId>,
    },
    /// The tiebreaker question became visible and open for answers
    Revealed,
    /// Tiebreaker answers closed
    AnswersClosed,
    /// The tiebreaker question was swapped out
    QuestionReplaced,
    /// A player wrote or edited a tiebreaker answer
    AnswerSubmitted {
        /// The submitting player
        player_id: PlayerId,
    },
    /// A tiebreaker answer was judged correct, deciding the round
    Won {
        /// The winning player
        player_id: PlayerId,
    },
}

/// Everything observers can be told about a room
///
/// This enum wraps the per-concern event types so adapters subscribe to a
/// single stream per room.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum RoomEvent {
    /// Player lifecycle events
    Player(PlayerEvent),
    /// Board and game-flow events
    Board(BoardEvent),
    /// Judgment and scoring events
    Judgment(JudgmentEvent),
    /// Sudden-death events
    SuddenDeath(SuddenDeathEvent),
}

impl RoomEvent {
    /// Converts the event to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Channel-per-room publish/subscribe registry
///
/// Subscribers receive every event published for their room after the point
/// of subscription. Senders whose receivers have been dropped are pruned on
/// the next publish.
#[derive(Debug, Default)]
pub struct Fanout {
    channels: Mutex<HashMap<RoomId, Vec<Sender<RoomEvent>>>>,
}

impl Fanout {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a subscription to one room's event stream
    pub fn subscribe(&self, room: RoomId) -> Receiver<RoomEvent> {
        let (sender, receiver) = channel();
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(room)
            .or_default()
            .push(sender);
        receiver
    }

    /// Delivers an event to every live subscriber of a room
    ///
    /// Best-effort: unknown rooms and dropped subscribers are not errors.
    pub fn publish(&self, room: RoomId, event: impl Into<RoomEvent>) {
        let event = event.into();
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(senders) = channels.get_mut(&room) {
            senders.retain(|sender| sender.send(event.clone()).is_ok());
        }
    }
}
