//! Room state machine
//!
//! This module defines the authoritative model of a game room: its phases,
//! the transitions a host may drive it through, and the invariants each
//! transition preserves. The room knows nothing about authorization or
//! storage; the coordinator checks the host secret and persists the result,
//! and every method here keeps the structural invariants (exactly ten
//! question slots, current index within range) intact.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::SystemTime;

use super::{
    constants::{answer, board},
    player::{HostSecret, Player, PlayerId},
    room_id::RoomId,
};

/// A single question slot on the board
///
/// All fields may be empty (the host may not have filled them in yet), but
/// they are never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The question text shown to players
    pub question: String,
    /// The answer text, visible to the host only until revealed
    pub answer: String,
    /// Category label for the question
    pub category: String,
}

/// The room's current stage in the overall game lifecycle
///
/// `Question` is the steady state cycled through for slots 0-8; the final
/// slot only opens through the two final-round phases. `Ended` is terminal
/// for the main game (a sudden-death excursion does not change it).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for players before the game starts
    #[default]
    Lobby,
    /// Cycling through the standard question slots
    Question,
    /// Collecting final-round wagers
    FinalWager,
    /// Collecting final-round answers
    FinalAnswer,
    /// Game over
    Ended,
}

/// Final-round sub-state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalRound {
    /// Whether players may currently submit wagers
    pub wagers_open: bool,
    /// Whether players may currently submit final answers
    pub answers_open: bool,
    /// Host-only visibility toggle for the answer key; does not affect scoring
    pub revealed_answer: bool,
}

/// Sudden-death tiebreaker sub-state
///
/// Created only when final-round judging leaves two or more players tied
/// for the maximum score. Eligibility is fixed at creation; later score
/// changes do not alter it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuddenDeath {
    /// Whether the tiebreaker is running
    pub active: bool,
    /// The tiebreaker question
    pub question: Question,
    /// The players allowed to answer, fixed at creation
    pub eligible: HashSet<PlayerId>,
    /// Whether the tiebreaker question is visible to players
    pub revealed: bool,
    /// Whether tiebreaker answers are currently accepted
    pub accepting_answers: bool,
}

/// Errors for transitions that are illegal in the current state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// `reveal` was called on the final slot, which only opens via
    /// `open_final_wagers`
    #[error("the final slot opens through final wagers, not reveal")]
    RevealOnFinalSlot,
    /// `open_final_wagers` was called while not on the final slot
    #[error("final wagers only open on the final slot")]
    NotOnFinalSlot,
    /// A question index outside the board was referenced
    #[error("question index {0} is out of range")]
    QuestionIndexOutOfRange(usize),
    /// Sudden death was started with fewer than two players
    #[error("sudden death requires at least two tied players")]
    TieRequired,
    /// Sudden death was started with a player not tied for the lead
    #[error("all sudden death players must be tied for the maximum score")]
    NotTiedForLead,
    /// A sudden-death control was used while no tiebreaker exists
    #[error("no sudden death round exists")]
    NoSuddenDeath,
}

/// One game room
///
/// Invariants: `questions` holds exactly [`board::QUESTION_COUNT`] slots at
/// all times, slot [`board::FINAL_QUESTION_INDEX`] is always the final-round
/// slot, and `current_index` never leaves the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Public identifier, doubling as the join code
    pub id: RoomId,
    /// Capability token granting host authority
    pub host_secret: HostSecret,
    /// Display title chosen by the host
    pub title: String,
    /// The board; always exactly ten slots
    pub questions: Vec<Question>,
    /// Index of the currently selected slot (0-9)
    pub current_index: usize,
    /// Current lifecycle phase
    pub phase: Phase,
    /// Whether the current question is visible to players
    pub revealed: bool,
    /// Whether answers to the current question are accepted
    pub accepting_answers: bool,
    /// When the current question was revealed, for the advisory answer timer
    pub revealed_at: Option<SystemTime>,
    /// Final-round sub-state
    pub final_round: FinalRound,
    /// Sudden-death sub-state, if a tiebreaker was started
    pub sudden_death: Option<SuddenDeath>,
    /// Players in the room, keyed by their opaque ID
    pub players: HashMap<PlayerId, Player>,
}

impl Room {
    /// Creates a new room in the lobby with ten empty question slots
    pub fn new(id: RoomId, host_secret: HostSecret, title: String) -> Self {
        Self {
            id,
            host_secret,
            title,
            questions: vec![Question::default(); board::QUESTION_COUNT],
            current_index: 0,
            phase: Phase::Lobby,
            revealed: false,
            accepting_answers: false,
            revealed_at: None,
            final_round: FinalRound::default(),
            sudden_death: None,
            players: HashMap::new(),
        }
    }

    /// Moves the current index by `delta`, clamped to the board
    ///
    /// A newly selected question always starts hidden: the revealed and
    /// accepting flags are reset as a side effect, whatever `delta` is, and
    /// any open final sub-state closes (wagers and final answers are only
    /// collected while the final slot is showing). Advancing onto the final
    /// slot does not open the final round; that takes an explicit
    /// [`Room::open_final_wagers`].
    pub fn advance(&mut self, delta: i64) {
        let max = board::FINAL_QUESTION_INDEX as i64;
        self.current_index = (self.current_index as i64 + delta).clamp(0, max) as usize;
        self.revealed = false;
        self.accepting_answers = false;
        self.revealed_at = None;
        self.final_round.wagers_open = false;
        self.final_round.answers_open = false;
    }

    /// Reveals the current question and opens answers
    ///
    /// Stamps the reveal timestamp used to derive the advisory answer
    /// window. The window itself is client-enforced: the core keeps
    /// accepting answers until the host (or a host-side timer) calls
    /// [`Room::close_answers`].
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::RevealOnFinalSlot`] on the final slot.
    pub fn reveal(&mut self, now: SystemTime) -> Result<(), TransitionError> {
        if self.current_index == board::FINAL_QUESTION_INDEX {
            return Err(TransitionError::RevealOnFinalSlot);
        }
        self.phase = Phase::Question;
        self.revealed = true;
        self.accepting_answers = true;
        self.revealed_at = Some(now);
        Ok(())
    }

    /// Stops accepting answers for the current question. Idempotent.
    pub fn close_answers(&mut self) {
        self.accepting_answers = false;
    }

    /// Hides the current question and stops accepting answers. Idempotent.
    pub fn hide(&mut self) {
        self.revealed = false;
        self.accepting_answers = false;
    }

    /// Opens the final round for wagers
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotOnFinalSlot`] unless the current index
    /// is the final slot.
    pub fn open_final_wagers(&mut self) -> Result<(), TransitionError> {
        if self.current_index != board::FINAL_QUESTION_INDEX {
            return Err(TransitionError::NotOnFinalSlot);
        }
        self.phase = Phase::FinalWager;
        self.revealed = true;
        self.accepting_answers = false;
        self.final_round = FinalRound {
            wagers_open: true,
            answers_open: false,
            revealed_answer: false,
        };
        Ok(())
    }

    /// Closes wagers and opens the final round for answers
    ///
    /// The answer-key visibility toggle is preserved across this transition.
    pub fn open_final_answers(&mut self) {
        self.phase = Phase::FinalAnswer;
        self.accepting_answers = true;
        self.final_round.wagers_open = false;
        self.final_round.answers_open = true;
    }

    /// Flips the host-only visibility of the final answer key
    pub fn toggle_reveal_final_answer_key(&mut self) {
        self.final_round.revealed_answer = !self.final_round.revealed_answer;
    }

    /// Ends the main game
    ///
    /// The host may call this at any time; waiting for all final judgments
    /// is convention, not a precondition. Terminal: only sudden-death
    /// controls act after this.
    pub fn end_game(&mut self) {
        self.phase = Phase::Ended;
        self.accepting_answers = false;
        self.final_round.wagers_open = false;
        self.final_round.answers_open = false;
    }

    /// Creates the sudden-death tiebreaker for the given players
    ///
    /// The players must all be tied for the maximum score and there must be
    /// at least two of them. The tiebreaker starts hidden, not accepting
    /// answers, and its eligibility set never changes afterwards.
    ///
    /// # Errors
    ///
    /// * [`TransitionError::TieRequired`] - fewer than two players given
    /// * [`TransitionError::NotTiedForLead`] - a given player is absent or
    ///   not at the maximum score
    pub fn start_sudden_death(
        &mut self,
        eligible: HashSet<PlayerId>,
        question: Question,
    ) -> Result<(), TransitionError> {
        if eligible.len() < 2 {
            return Err(TransitionError::TieRequired);
        }
        let leaders = self.tied_leaders();
        if !eligible.iter().all(|id| leaders.contains(id)) {
            return Err(TransitionError::NotTiedForLead);
        }
        self.sudden_death = Some(SuddenDeath {
            active: true,
            question,
            eligible,
            revealed: false,
            accepting_answers: false,
        });
        Ok(())
    }

    /// Reveals the tiebreaker question and opens its answers
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NoSuddenDeath`] if no tiebreaker exists.
    pub fn reveal_sudden_death(&mut self) -> Result<(), TransitionError> {
        let sudden = self
            .sudden_death
            .as_mut()
            .ok_or(TransitionError::NoSuddenDeath)?;
        sudden.revealed = true;
        sudden.accepting_answers = true;
        Ok(())
    }

    /// Stops accepting tiebreaker answers. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NoSuddenDeath`] if no tiebreaker exists.
    pub fn close_sudden_death_answers(&mut self) -> Result<(), TransitionError> {
        let sudden = self
            .sudden_death
            .as_mut()
            .ok_or(TransitionError::NoSuddenDeath)?;
        sudden.accepting_answers = false;
        Ok(())
    }

    /// Swaps out the tiebreaker question, hiding it again
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NoSuddenDeath`] if no tiebreaker exists.
    pub fn replace_sudden_death_question(
        &mut self,
        question: Question,
    ) -> Result<(), TransitionError> {
        let sudden = self
            .sudden_death
            .as_mut()
            .ok_or(TransitionError::NoSuddenDeath)?;
        sudden.question = question;
        sudden.revealed = false;
        sudden.accepting_answers = false;
        Ok(())
    }

    /// Replaces the question in one board slot
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::QuestionIndexOutOfRange`] for an index
    /// outside the board.
    pub fn set_question(
        &mut self,
        index: usize,
        question: Question,
    ) -> Result<(), TransitionError> {
        let slot = self
            .questions
            .get_mut(index)
            .ok_or(TransitionError::QuestionIndexOutOfRange(index))?;
        *slot = question;
        Ok(())
    }

    /// Replaces the whole board in one write
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::QuestionIndexOutOfRange`] if the batch is
    /// not exactly one question per slot.
    pub fn set_board(&mut self, questions: Vec<Question>) -> Result<(), TransitionError> {
        if questions.len() != board::QUESTION_COUNT {
            return Err(TransitionError::QuestionIndexOutOfRange(questions.len()));
        }
        self.questions = questions;
        Ok(())
    }

    /// Returns the set of players tied for the maximum score
    ///
    /// Empty when the room has no players.
    pub fn tied_leaders(&self) -> HashSet<PlayerId> {
        let Some(max) = self.players.values().map(|p| p.score).max() else {
            return HashSet::new();
        };
        self.players
            .values()
            .filter(|p| p.score == max)
            .map(|p| p.id)
            .collect()
    }

    /// Returns `(id, name, score)` for every player, highest score first
    ///
    /// Ties keep join order so the standings stay stable between renders.
    pub fn standings(&self) -> Vec<(PlayerId, String, i64)> {
        self.players
            .values()
            .sorted_by_key(|p| (std::cmp::Reverse(p.score), p.joined_at))
            .map(|p| (p.id, p.name.clone(), p.score))
            .collect()
    }

    /// Time left in the advisory answer window, if one is running
    ///
    /// Returns `None` when nothing is revealed or answers are closed, and
    /// `Duration::ZERO` once the window has elapsed. Whoever observes zero
    /// is expected to call [`Room::close_answers`]; racing calls are safe
    /// because closing is idempotent.
    pub fn answer_window_remaining(&self, now: SystemTime) -> Option<Duration> {
        if !self.accepting_answers {
            return None;
        }
        let revealed_at = self.revealed_at?;
        let window = Duration::from_secs(answer::WINDOW_SECONDS);
        let elapsed = now.duration_since(revealed_at).unwrap_or_default();
        Some(window.saturating_sub(elapsed))
    }
}
