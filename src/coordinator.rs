//! Room coordinator
//!
//! The coordinator is the sole writer of authoritative game state. Players
//! and the host issue intents against it; it validates host authority where
//! required, drives the room state machine, and applies scoring through the
//! ledger - always inside a single store transaction when a score is
//! involved, so a judgment and its score delta land together or not at all.
//! Every successful mutation is published to the room's event stream for
//! whatever adapter keeps the devices in sync.
//!
//! Judging is idempotent by contract: an already-judged target is a
//! success-no-op, never an error, so double-taps and UI retries are
//! harmless. The judged tri-state is read inside the same transaction that
//! writes it, which is what guarantees exactly one delta under concurrent
//! duplicate judge calls.

use std::{collections::HashSet, sync::mpsc::Receiver};

use thiserror::Error;
use web_time::SystemTime;

use super::{
    constants::{answer, board},
    events::{BoardEvent, Fanout, JudgmentEvent, PlayerEvent, RoomEvent, SuddenDeathEvent},
    generate::{self, GenerateError, ReplacementRequest},
    ledger::LedgerError,
    player::{self, HostSecret, NameError, Player, PlayerId},
    room::{Phase, Question, Room, TransitionError},
    room_id::RoomId,
    scoring,
    store::{RoomDocument, RoomStore, StoreError},
};

/// Broad classification of a coordinator error, for surfacing
///
/// Authorization and existence failures must be reported to the caller
/// distinctly from validation failures, which are recovered locally, and
/// from storage failures, which the caller may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The room, player, or submission does not exist
    NotFound,
    /// The presented host secret does not match
    Unauthorized,
    /// The request was rejected by a rule; the room is unchanged
    Validation,
    /// The storage backend failed
    Storage,
}

/// Errors raised by coordinator operations
///
/// An already-judged target is deliberately absent: judging one is a
/// success-no-op (see [`JudgeOutcome::AlreadyJudged`]), not an error.
#[derive(Error, Debug)]
pub enum Error {
    /// No room exists under the given ID
    #[error("room {0} does not exist")]
    RoomNotFound(RoomId),
    /// The player has not joined the room
    #[error("player is not in the room")]
    PlayerNotFound,
    /// No submission exists for the judged target
    #[error("no such submission")]
    SubmissionNotFound,
    /// The presented host secret does not match the room's
    #[error("host secret mismatch")]
    Unauthorized,
    /// The display name failed validation
    #[error(transparent)]
    Name(#[from] NameError),
    /// The transition is illegal in the room's current state
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// The generation payload was rejected; room state is unchanged
    #[error(transparent)]
    Generation(#[from] GenerateError),
    /// The room title exceeds the length limit
    #[error("room title is too long")]
    TitleTooLong,
    /// The answer text exceeds the length limit
    #[error("answer is too long")]
    AnswerTooLong,
    /// Answers to the current question are not being accepted
    #[error("answers are not being accepted")]
    AnswersClosed,
    /// Final-round wagers are not open
    #[error("wagers are not open")]
    WagersNotOpen,
    /// Final-round answers are not open
    #[error("final answers are not open")]
    FinalAnswersNotOpen,
    /// A declared wager was negative
    #[error("wager cannot be negative")]
    NegativeWager,
    /// Sudden death cannot start until every final answer is judged
    #[error("final round judging is incomplete")]
    FinalJudgingIncomplete,
    /// The player is not in the sudden-death eligibility set
    #[error("player is not eligible for sudden death")]
    NotEligible,
    /// Sudden-death answers are not being accepted
    #[error("sudden death answers are not being accepted")]
    SuddenDeathClosed,
    /// A sudden-death winner already exists
    #[error("sudden death already has a winner")]
    SuddenDeathDecided,
    /// The storage backend failed
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for Error {
    /// Surfaces a missing document as the not-found taxonomy entry
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Missing(id) => Error::RoomNotFound(id),
            other => Error::Store(other),
        }
    }
}

impl Error {
    /// Classifies this error for caller-side surfacing
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RoomNotFound(_) | Error::PlayerNotFound | Error::SubmissionNotFound => {
                ErrorKind::NotFound
            }
            Error::Unauthorized => ErrorKind::Unauthorized,
            Error::Store(_) => ErrorKind::Storage,
            _ => ErrorKind::Validation,
        }
    }
}

/// Result of a judge call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeOutcome {
    /// The judgment was recorded and the delta applied
    Applied {
        /// The score delta that was applied
        delta: i64,
        /// The player's score after the delta
        score: i64,
    },
    /// The target was judged before; nothing changed
    AlreadyJudged,
}

/// The authoritative service-side coordinator for all rooms
///
/// Generic over the storage backend; see [`crate::store::MemoryStore`] for
/// the in-process one.
pub struct Coordinator<S> {
    store: S,
    fanout: Fanout,
}

impl<S: RoomStore> Coordinator<S> {
    /// Creates a coordinator over the given store
    pub fn new(store: S) -> Self {
        Self {
            store,
            fanout: Fanout::new(),
        }
    }

    /// Opens a subscription to one room's event stream
    pub fn subscribe(&self, room_id: RoomId) -> Receiver<RoomEvent> {
        self.fanout.subscribe(room_id)
    }

    /// Reads a consistent copy of a room and its ledger
    ///
    /// # Errors
    ///
    /// Returns [`Error::RoomNotFound`] if the room does not exist.
    pub fn snapshot(&self, room_id: RoomId) -> Result<RoomDocument, Error> {
        Ok(self.store.snapshot(room_id)?)
    }

    fn authorize(room: &Room, presented: HostSecret) -> Result<(), Error> {
        if room.host_secret == presented {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }

    /// Runs a host-authorized mutation inside a transaction
    fn with_host<T>(
        &self,
        room_id: RoomId,
        presented: HostSecret,
        operation: impl FnOnce(&mut RoomDocument) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.store.transact(room_id, |document| {
            Self::authorize(&document.room, presented)?;
            operation(document)
        })
    }

    // Room lifecycle

    /// Creates a new room and returns its join code and host secret
    ///
    /// The room starts in the lobby at index 0 with ten empty question
    /// slots and everything hidden. The secret is returned exactly once,
    /// here; deliver it to the host out-of-band.
    ///
    /// # Errors
    ///
    /// * [`Error::TitleTooLong`] - the title exceeds the length limit
    /// * [`Error::Store`] - the backend failed
    pub fn create_room(&self, title: &str) -> Result<(RoomId, HostSecret), Error> {
        if title.chars().count() > board::MAX_TITLE_LENGTH {
            return Err(Error::TitleTooLong);
        }
        let secret = HostSecret::new();
        loop {
            let id = RoomId::new();
            let room = Room::new(id, secret, title.to_owned());
            match self.store.insert(RoomDocument::new(room)) {
                Ok(()) => return Ok((id, secret)),
                // Join-code collision: roll a new code
                Err(StoreError::Duplicate(_)) => {}
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Adds a player to a room, or reattaches a returning one
    ///
    /// A player rejoining under the same ID keeps their score; only their
    /// display name is refreshed. Returns the validated name.
    ///
    /// # Errors
    ///
    /// * [`Error::RoomNotFound`] - no such room
    /// * [`Error::Name`] - the display name failed validation
    pub fn join_as_player(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        name: &str,
    ) -> Result<String, Error> {
        let name = player::clean_name(name)?;
        let assigned = self.store.transact(room_id, |document| {
            document
                .room
                .players
                .entry(player_id)
                .and_modify(|existing| existing.name = name.clone())
                .or_insert_with(|| Player::new(player_id, name.clone()));
            Ok::<_, Error>(name.clone())
        })?;
        self.fanout.publish(
            room_id,
            PlayerEvent::Joined {
                player_id,
                name: assigned.clone(),
            },
        );
        Ok(assigned)
    }

    /// Removes a player at their own request
    ///
    /// Their ledger rows are kept for the host's records; only the player
    /// entry (and with it the score) goes away.
    ///
    /// # Errors
    ///
    /// * [`Error::RoomNotFound`] - no such room
    /// * [`Error::PlayerNotFound`] - the player is not in the room
    pub fn remove_player(&self, room_id: RoomId, player_id: PlayerId) -> Result<(), Error> {
        self.store.transact(room_id, |document| {
            document
                .room
                .players
                .remove(&player_id)
                .map(|_| ())
                .ok_or(Error::PlayerNotFound)
        })?;
        self.fanout
            .publish(room_id, PlayerEvent::Left { player_id });
        Ok(())
    }

    // Player submissions

    /// Writes or edits a player's answer to the current question
    ///
    /// Accepted only while the current question is open for answers;
    /// overwrites any prior unjudged answer for the same question. An
    /// already-judged answer makes this a silent no-op.
    ///
    /// # Errors
    ///
    /// * [`Error::AnswersClosed`] - no question is open for answers
    /// * [`Error::AnswerTooLong`] - text exceeds the length limit
    /// * [`Error::PlayerNotFound`] - the player has not joined
    pub fn submit_answer(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        text: &str,
    ) -> Result<(), Error> {
        if text.chars().count() > answer::MAX_LENGTH {
            return Err(Error::AnswerTooLong);
        }
        let written = self.store.transact(room_id, |document| {
            let room = &document.room;
            if room.phase != Phase::Question || !room.accepting_answers {
                return Err(Error::AnswersClosed);
            }
            let index = room.current_index;
            let name = room
                .players
                .get(&player_id)
                .ok_or(Error::PlayerNotFound)?
                .name
                .clone();
            match document.ledger.upsert_answer(index, player_id, &name, text) {
                Ok(()) => Ok(Some(index)),
                // Judged while still open: drop the edit silently
                Err(LedgerError::AlreadyJudged) => Ok(None),
                Err(LedgerError::NoSuchSubmission) => Err(Error::SubmissionNotFound),
            }
        })?;
        if let Some(question_index) = written {
            self.fanout.publish(
                room_id,
                BoardEvent::AnswerSubmitted {
                    question_index,
                    player_id,
                },
            );
        }
        Ok(())
    }

    /// Declares or changes a player's final-round wager
    ///
    /// The raw amount is stored unclamped; clamping to the player's score
    /// happens at judgment time, not here.
    ///
    /// # Errors
    ///
    /// * [`Error::WagersNotOpen`] - the final round is not taking wagers
    /// * [`Error::NegativeWager`] - the amount is negative
    /// * [`Error::PlayerNotFound`] - the player has not joined
    pub fn submit_wager(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        amount: i64,
    ) -> Result<(), Error> {
        if amount < 0 {
            return Err(Error::NegativeWager);
        }
        self.store.transact(room_id, |document| {
            if !document.room.final_round.wagers_open {
                return Err(Error::WagersNotOpen);
            }
            if !document.room.players.contains_key(&player_id) {
                return Err(Error::PlayerNotFound);
            }
            document.ledger.upsert_wager(player_id, amount);
            Ok(())
        })?;
        self.fanout
            .publish(room_id, BoardEvent::WagerSubmitted { player_id });
        Ok(())
    }

    /// Writes or edits a player's final-round answer
    ///
    /// # Errors
    ///
    /// * [`Error::FinalAnswersNotOpen`] - final answers are not open
    /// * [`Error::AnswerTooLong`] - text exceeds the length limit
    /// * [`Error::PlayerNotFound`] - the player has not joined
    pub fn submit_final_answer(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        text: &str,
    ) -> Result<(), Error> {
        if text.chars().count() > answer::MAX_LENGTH {
            return Err(Error::AnswerTooLong);
        }
        let written = self.store.transact(room_id, |document| {
            if !document.room.final_round.answers_open {
                return Err(Error::FinalAnswersNotOpen);
            }
            let name = document
                .room
                .players
                .get(&player_id)
                .ok_or(Error::PlayerNotFound)?
                .name
                .clone();
            match document.ledger.upsert_final_answer(player_id, &name, text) {
                Ok(()) => Ok(true),
                Err(LedgerError::AlreadyJudged) => Ok(false),
                Err(LedgerError::NoSuchSubmission) => Err(Error::SubmissionNotFound),
            }
        })?;
        if written {
            self.fanout
                .publish(room_id, BoardEvent::FinalAnswerSubmitted { player_id });
        }
        Ok(())
    }

    /// Writes or edits an eligible player's sudden-death answer
    ///
    /// # Errors
    ///
    /// * [`Error::Transition`] - no sudden-death round exists
    /// * [`Error::SuddenDeathClosed`] - tiebreaker answers are not open
    /// * [`Error::NotEligible`] - the player is not in the eligibility set
    /// * [`Error::AnswerTooLong`] - text exceeds the length limit
    pub fn submit_sudden_death_answer(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        text: &str,
    ) -> Result<(), Error> {
        if text.chars().count() > answer::MAX_LENGTH {
            return Err(Error::AnswerTooLong);
        }
        let written = self.store.transact(room_id, |document| {
            let sudden = document
                .room
                .sudden_death
                .as_ref()
                .ok_or(Error::Transition(TransitionError::NoSuddenDeath))?;
            if !sudden.active || !sudden.accepting_answers {
                return Err(Error::SuddenDeathClosed);
            }
            if !sudden.eligible.contains(&player_id) {
                return Err(Error::NotEligible);
            }
            let name = document
                .room
                .players
                .get(&player_id)
                .ok_or(Error::PlayerNotFound)?
                .name
                .clone();
            match document.ledger.upsert_answer(
                board::SUDDEN_DEATH_INDEX,
                player_id,
                &name,
                text,
            ) {
                Ok(()) => Ok(true),
                Err(LedgerError::AlreadyJudged) => Ok(false),
                Err(LedgerError::NoSuchSubmission) => Err(Error::SubmissionNotFound),
            }
        })?;
        if written {
            self.fanout
                .publish(room_id, SuddenDeathEvent::AnswerSubmitted { player_id });
        }
        Ok(())
    }

    // Host controls

    /// Moves the current question index by `delta`, host-only
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] on a secret mismatch.
    pub fn advance(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        delta: i64,
    ) -> Result<(), Error> {
        let index = self.with_host(room_id, secret, |document| {
            document.room.advance(delta);
            Ok(document.room.current_index)
        })?;
        self.fanout
            .publish(room_id, BoardEvent::IndexChanged { index });
        Ok(())
    }

    /// Reveals the current question and opens its answer window, host-only
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::Transition`] - called on the final slot
    pub fn reveal(&self, room_id: RoomId, secret: HostSecret) -> Result<(), Error> {
        let index = self.with_host(room_id, secret, |document| {
            document.room.reveal(SystemTime::now())?;
            Ok(document.room.current_index)
        })?;
        self.fanout.publish(room_id, BoardEvent::Revealed { index });
        Ok(())
    }

    /// Closes answers for the current question, host-only and idempotent
    ///
    /// Host-side timers observing the 30-second window expire race freely
    /// against the host's own click; both land here harmlessly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] on a secret mismatch.
    pub fn close_answers(&self, room_id: RoomId, secret: HostSecret) -> Result<(), Error> {
        self.with_host(room_id, secret, |document| {
            document.room.close_answers();
            Ok(())
        })?;
        self.fanout.publish(room_id, BoardEvent::AnswersClosed);
        Ok(())
    }

    /// Hides the current question, host-only and idempotent
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] on a secret mismatch.
    pub fn hide(&self, room_id: RoomId, secret: HostSecret) -> Result<(), Error> {
        self.with_host(room_id, secret, |document| {
            document.room.hide();
            Ok(())
        })?;
        self.fanout.publish(room_id, BoardEvent::Hidden);
        Ok(())
    }

    /// Opens the final round for wagers, host-only
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::Transition`] - not on the final slot
    pub fn open_final_wagers(&self, room_id: RoomId, secret: HostSecret) -> Result<(), Error> {
        self.with_host(room_id, secret, |document| {
            document.room.open_final_wagers()?;
            Ok(())
        })?;
        self.fanout.publish(
            room_id,
            BoardEvent::PhaseChanged {
                phase: Phase::FinalWager,
            },
        );
        Ok(())
    }

    /// Closes wagers and opens the final round for answers, host-only
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] on a secret mismatch.
    pub fn open_final_answers(&self, room_id: RoomId, secret: HostSecret) -> Result<(), Error> {
        self.with_host(room_id, secret, |document| {
            document.room.open_final_answers();
            Ok(())
        })?;
        self.fanout.publish(
            room_id,
            BoardEvent::PhaseChanged {
                phase: Phase::FinalAnswer,
            },
        );
        Ok(())
    }

    /// Flips the final answer key's host-side visibility, host-only
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] on a secret mismatch.
    pub fn toggle_reveal_final_answer_key(
        &self,
        room_id: RoomId,
        secret: HostSecret,
    ) -> Result<(), Error> {
        self.with_host(room_id, secret, |document| {
            document.room.toggle_reveal_final_answer_key();
            Ok(())
        })?;
        self.fanout.publish(room_id, BoardEvent::AnswerKeyToggled);
        Ok(())
    }

    /// Ends the game, host-only
    ///
    /// Allowed at any time; ending before final judging completes is the
    /// host's override to make.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] on a secret mismatch.
    pub fn end_game(&self, room_id: RoomId, secret: HostSecret) -> Result<(), Error> {
        self.with_host(room_id, secret, |document| {
            document.room.end_game();
            Ok(())
        })?;
        self.fanout.publish(room_id, BoardEvent::Ended);
        Ok(())
    }

    /// Renames the room, host-only
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::TitleTooLong`] - the title exceeds the length limit
    pub fn set_title(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        title: &str,
    ) -> Result<(), Error> {
        if title.chars().count() > board::MAX_TITLE_LENGTH {
            return Err(Error::TitleTooLong);
        }
        self.with_host(room_id, secret, |document| {
            document.room.title = title.to_owned();
            Ok(())
        })?;
        self.fanout.publish(room_id, BoardEvent::TitleChanged);
        Ok(())
    }

    /// Edits one question slot, host-only
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::Transition`] - index outside the board
    pub fn set_question(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        index: usize,
        question: Question,
    ) -> Result<(), Error> {
        self.with_host(room_id, secret, |document| {
            document.room.set_question(index, question)?;
            Ok(())
        })?;
        self.fanout.publish(
            room_id,
            BoardEvent::QuestionChanged { index: Some(index) },
        );
        Ok(())
    }

    // Question generation

    /// Installs a bulk generation payload as the room's board, host-only
    ///
    /// The payload is parsed and validated before the room is touched, so a
    /// malformed response is fully recoverable: the host sees a generation
    /// failure and the board stays as it was.
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::Generation`] - the payload failed parsing or validation
    pub fn load_generated_board(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        payload: &str,
    ) -> Result<(), Error> {
        let questions = generate::parse_bulk(payload)?;
        self.with_host(room_id, secret, |document| {
            document.room.set_board(questions)?;
            Ok(())
        })?;
        self.fanout
            .publish(room_id, BoardEvent::QuestionChanged { index: None });
        Ok(())
    }

    /// Builds the avoid-list request for regenerating one slot, host-only
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::Transition`] - index outside the board
    pub fn replacement_request(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        index: usize,
    ) -> Result<ReplacementRequest, Error> {
        let document = self.snapshot(room_id)?;
        Self::authorize(&document.room, secret)?;
        if index >= board::QUESTION_COUNT {
            return Err(TransitionError::QuestionIndexOutOfRange(index).into());
        }
        Ok(generate::replacement_request(&document.room, index))
    }

    /// Installs a single-replacement payload into one slot, host-only
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::Generation`] - the payload failed parsing or validation
    /// * [`Error::Transition`] - index outside the board
    pub fn replace_question(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        index: usize,
        payload: &str,
    ) -> Result<(), Error> {
        let question = generate::parse_replacement(payload)?;
        self.set_question(room_id, secret, index, question)
    }

    // Sudden death

    /// Creates the sudden-death tiebreaker, host-only
    ///
    /// Permitted only once every submitted final answer is judged and the
    /// given players are all tied for the maximum score.
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::FinalJudgingIncomplete`] - unjudged final answers remain
    /// * [`Error::Transition`] - fewer than two players, or not all tied
    pub fn start_sudden_death(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        eligible: HashSet<PlayerId>,
        question: Question,
    ) -> Result<(), Error> {
        let announced = eligible.clone();
        self.with_host(room_id, secret, |document| {
            if !document.ledger.final_round_judged() {
                return Err(Error::FinalJudgingIncomplete);
            }
            document.room.start_sudden_death(eligible, question)?;
            Ok(())
        })?;
        self.fanout.publish(
            room_id,
            SuddenDeathEvent::Started {
                eligible: announced,
            },
        );
        Ok(())
    }

    /// Reveals the tiebreaker question and opens its answers, host-only
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::Transition`] - no tiebreaker exists
    pub fn reveal_sudden_death(&self, room_id: RoomId, secret: HostSecret) -> Result<(), Error> {
        self.with_host(room_id, secret, |document| {
            document.room.reveal_sudden_death()?;
            Ok(())
        })?;
        self.fanout.publish(room_id, SuddenDeathEvent::Revealed);
        Ok(())
    }

    /// Closes tiebreaker answers, host-only and idempotent
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::Transition`] - no tiebreaker exists
    pub fn close_sudden_death_answers(
        &self,
        room_id: RoomId,
        secret: HostSecret,
    ) -> Result<(), Error> {
        self.with_host(room_id, secret, |document| {
            document.room.close_sudden_death_answers()?;
            Ok(())
        })?;
        self.fanout.publish(room_id, SuddenDeathEvent::AnswersClosed);
        Ok(())
    }

    /// Swaps out the tiebreaker question, host-only
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::Transition`] - no tiebreaker exists
    pub fn replace_sudden_death_question(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        question: Question,
    ) -> Result<(), Error> {
        self.with_host(room_id, secret, |document| {
            document.room.replace_sudden_death_question(question)?;
            Ok(())
        })?;
        self.fanout
            .publish(room_id, SuddenDeathEvent::QuestionReplaced);
        Ok(())
    }

    // Judging

    /// Judges a standard-question submission, host-only
    ///
    /// Runs as one transaction: the judged tri-state is read, the delta
    /// computed, and the judgment plus the score increment written
    /// together. An already-judged submission is a success-no-op, so
    /// concurrent duplicate calls apply exactly one delta.
    ///
    /// Only board indices are accepted here; sudden-death rows live under a
    /// reserved index and are judged exclusively through
    /// [`Coordinator::judge_sudden_death`], which carries the winner guard.
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::Transition`] - index outside the board
    /// * [`Error::SubmissionNotFound`] - no such submission
    /// * [`Error::PlayerNotFound`] - the player left the room
    pub fn judge_submission(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        question_index: usize,
        player_id: PlayerId,
        correct: bool,
    ) -> Result<JudgeOutcome, Error> {
        if question_index >= board::QUESTION_COUNT {
            return Err(TransitionError::QuestionIndexOutOfRange(question_index).into());
        }
        let outcome = self.with_host(room_id, secret, |document| {
            let submission = document
                .ledger
                .answer(question_index, player_id)
                .ok_or(Error::SubmissionNotFound)?;
            if submission.is_judged() {
                return Ok(JudgeOutcome::AlreadyJudged);
            }
            if !document.room.players.contains_key(&player_id) {
                return Err(Error::PlayerNotFound);
            }
            let delta = scoring::judge_standard(correct);
            document
                .ledger
                .judge_answer(question_index, player_id, correct.into(), delta)
                .map_err(|_| Error::SubmissionNotFound)?;
            let player = document
                .room
                .players
                .get_mut(&player_id)
                .ok_or(Error::PlayerNotFound)?;
            player.score += delta;
            Ok(JudgeOutcome::Applied {
                delta,
                score: player.score,
            })
        })?;
        self.publish_scored(room_id, player_id, question_index, correct, outcome);
        Ok(outcome)
    }

    /// Judges a final-round answer, host-only
    ///
    /// The declared wager is clamped to the player's score as of this
    /// judgment, then applied positively or negatively. Same transactional
    /// and idempotence guarantees as [`Coordinator::judge_submission`]. A
    /// player who never declared a wager is judged at zero.
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::SubmissionNotFound`] - the player never answered
    /// * [`Error::PlayerNotFound`] - the player left the room
    pub fn judge_final(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        player_id: PlayerId,
        correct: bool,
    ) -> Result<JudgeOutcome, Error> {
        let outcome = self.with_host(room_id, secret, |document| {
            let submission = document
                .ledger
                .final_answer(player_id)
                .ok_or(Error::SubmissionNotFound)?;
            if submission.is_judged() {
                return Ok(JudgeOutcome::AlreadyJudged);
            }
            let declared = document
                .ledger
                .wager(player_id)
                .map_or(0, |wager| wager.amount);
            let current_score = document
                .room
                .players
                .get(&player_id)
                .ok_or(Error::PlayerNotFound)?
                .score;
            let delta = scoring::judge_final(correct, declared, current_score);
            document
                .ledger
                .judge_final_answer(player_id, correct.into(), delta)
                .map_err(|_| Error::SubmissionNotFound)?;
            let player = document
                .room
                .players
                .get_mut(&player_id)
                .ok_or(Error::PlayerNotFound)?;
            player.score += delta;
            Ok(JudgeOutcome::Applied {
                delta,
                score: player.score,
            })
        })?;
        self.publish_scored(
            room_id,
            player_id,
            board::FINAL_QUESTION_INDEX,
            correct,
            outcome,
        );
        Ok(outcome)
    }

    /// Judges a sudden-death answer, host-only
    ///
    /// The first submission judged correct wins and closes the tiebreaker.
    /// Once a winner exists, judging a different submission correct is
    /// rejected; judging it incorrect remains available, and re-judging
    /// any judged row stays a no-op.
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - secret mismatch
    /// * [`Error::SubmissionNotFound`] - no such tiebreaker answer
    /// * [`Error::SuddenDeathDecided`] - a winner already exists
    /// * [`Error::PlayerNotFound`] - the player left the room
    pub fn judge_sudden_death(
        &self,
        room_id: RoomId,
        secret: HostSecret,
        player_id: PlayerId,
        correct: bool,
    ) -> Result<JudgeOutcome, Error> {
        let outcome = self.with_host(room_id, secret, |document| {
            let submission = document
                .ledger
                .answer(board::SUDDEN_DEATH_INDEX, player_id)
                .ok_or(Error::SubmissionNotFound)?;
            if submission.is_judged() {
                return Ok(JudgeOutcome::AlreadyJudged);
            }
            if correct && document.ledger.sudden_death_winner().is_some() {
                return Err(Error::SuddenDeathDecided);
            }
            if !document.room.players.contains_key(&player_id) {
                return Err(Error::PlayerNotFound);
            }
            let delta = scoring::judge_sudden_death(correct);
            document
                .ledger
                .judge_answer(board::SUDDEN_DEATH_INDEX, player_id, correct.into(), delta)
                .map_err(|_| Error::SubmissionNotFound)?;
            let player = document
                .room
                .players
                .get_mut(&player_id)
                .ok_or(Error::PlayerNotFound)?;
            player.score += delta;
            if correct {
                // The round is decided; stop taking answers
                if let Some(sudden) = document.room.sudden_death.as_mut() {
                    sudden.accepting_answers = false;
                }
            }
            Ok(JudgeOutcome::Applied {
                delta,
                score: player.score,
            })
        })?;
        self.publish_scored(
            room_id,
            player_id,
            board::SUDDEN_DEATH_INDEX,
            correct,
            outcome,
        );
        if correct && matches!(outcome, JudgeOutcome::Applied { .. }) {
            self.fanout
                .publish(room_id, SuddenDeathEvent::Won { player_id });
        }
        Ok(outcome)
    }

    fn publish_scored(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        question_index: usize,
        correct: bool,
        outcome: JudgeOutcome,
    ) {
        if let JudgeOutcome::Applied { delta, score } = outcome {
            self.fanout.publish(
                room_id,
                JudgmentEvent::Scored {
                    player_id,
                    question_index,
                    correct,
                    delta,
                    score,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::RoomEvent, store::MemoryStore};

    fn coordinator() -> Coordinator<MemoryStore> {
        Coordinator::new(MemoryStore::new())
    }

    /// Creates a room with two joined players, ready to play
    fn room_with_players(
        coordinator: &Coordinator<MemoryStore>,
    ) -> (RoomId, HostSecret, PlayerId, PlayerId) {
        let (room_id, secret) = coordinator.create_room("Friday Night").unwrap();
        let alice = PlayerId::new();
        let bob = PlayerId::new();
        coordinator.join_as_player(room_id, alice, "Alice").unwrap();
        coordinator.join_as_player(room_id, bob, "Bob").unwrap();
        (room_id, secret, alice, bob)
    }

    /// Walks a room to the final slot with wagers open
    fn open_final(coordinator: &Coordinator<MemoryStore>, room_id: RoomId, secret: HostSecret) {
        coordinator.advance(room_id, secret, 9).unwrap();
        coordinator.open_final_wagers(room_id, secret).unwrap();
    }

    fn score_of(coordinator: &Coordinator<MemoryStore>, room_id: RoomId, id: PlayerId) -> i64 {
        coordinator
            .snapshot(room_id)
            .unwrap()
            .room
            .players
            .get(&id)
            .unwrap()
            .score
    }

    /// Awards a player points through real judged submissions
    fn win_points(
        coordinator: &Coordinator<MemoryStore>,
        room_id: RoomId,
        secret: HostSecret,
        player: PlayerId,
        points: i64,
    ) {
        for _ in 0..points {
            let index = coordinator.snapshot(room_id).unwrap().room.current_index;
            coordinator.reveal(room_id, secret).unwrap();
            coordinator.submit_answer(room_id, player, "right").unwrap();
            coordinator.close_answers(room_id, secret).unwrap();
            coordinator
                .judge_submission(room_id, secret, index, player, true)
                .unwrap();
            coordinator.advance(room_id, secret, 1).unwrap();
        }
    }

    #[test]
    fn test_create_room_initial_state() {
        let coordinator = coordinator();
        let (room_id, _) = coordinator.create_room("Friday Night").unwrap();

        let document = coordinator.snapshot(room_id).unwrap();
        assert_eq!(document.room.phase, Phase::Lobby);
        assert_eq!(document.room.current_index, 0);
        assert_eq!(document.room.questions.len(), 10);
        assert!(document.room.questions.iter().all(|q| q.question.is_empty()));
        assert!(!document.room.revealed);
        assert_eq!(document.room.title, "Friday Night");
    }

    #[test]
    fn test_create_room_title_too_long() {
        let coordinator = coordinator();
        let result = coordinator.create_room(&"x".repeat(201));
        assert!(matches!(result, Err(Error::TitleTooLong)));
    }

    #[test]
    fn test_host_secret_required() {
        let coordinator = coordinator();
        let (room_id, _) = coordinator.create_room("Game").unwrap();

        let wrong = HostSecret::new();
        for result in [
            coordinator.reveal(room_id, wrong),
            coordinator.advance(room_id, wrong, 1),
            coordinator.close_answers(room_id, wrong),
            coordinator.end_game(room_id, wrong),
        ] {
            assert!(matches!(result, Err(Error::Unauthorized)));
        }
        assert_eq!(
            coordinator.reveal(room_id, wrong).unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn test_operations_on_missing_room() {
        let coordinator = coordinator();
        let result = coordinator.reveal(RoomId::new(), HostSecret::new());
        assert!(matches!(result, Err(Error::RoomNotFound(_))));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_join_validates_name() {
        let coordinator = coordinator();
        let (room_id, _) = coordinator.create_room("Game").unwrap();

        let result = coordinator.join_as_player(room_id, PlayerId::new(), "   ");
        assert!(matches!(result, Err(Error::Name(NameError::Empty))));
    }

    #[test]
    fn test_rejoin_keeps_score() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);

        coordinator.reveal(room_id, secret).unwrap();
        coordinator.submit_answer(room_id, alice, "yes").unwrap();
        coordinator
            .judge_submission(room_id, secret, 0, alice, true)
            .unwrap();
        assert_eq!(score_of(&coordinator, room_id, alice), 1);

        // Rejoining under the same ID refreshes the name, keeps the score
        let name = coordinator
            .join_as_player(room_id, alice, "Alice II")
            .unwrap();
        assert_eq!(name, "Alice II");
        assert_eq!(score_of(&coordinator, room_id, alice), 1);
    }

    #[test]
    fn test_remove_player() {
        let coordinator = coordinator();
        let (room_id, _, alice, _) = room_with_players(&coordinator);

        coordinator.remove_player(room_id, alice).unwrap();
        assert!(matches!(
            coordinator.remove_player(room_id, alice),
            Err(Error::PlayerNotFound)
        ));
    }

    #[test]
    fn test_submit_requires_open_answers() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);

        assert!(matches!(
            coordinator.submit_answer(room_id, alice, "early"),
            Err(Error::AnswersClosed)
        ));

        coordinator.reveal(room_id, secret).unwrap();
        coordinator.submit_answer(room_id, alice, "on time").unwrap();

        coordinator.close_answers(room_id, secret).unwrap();
        assert!(matches!(
            coordinator.submit_answer(room_id, alice, "late"),
            Err(Error::AnswersClosed)
        ));
    }

    #[test]
    fn test_submit_requires_membership() {
        let coordinator = coordinator();
        let (room_id, secret, _, _) = room_with_players(&coordinator);
        coordinator.reveal(room_id, secret).unwrap();

        assert!(matches!(
            coordinator.submit_answer(room_id, PlayerId::new(), "hi"),
            Err(Error::PlayerNotFound)
        ));
    }

    #[test]
    fn test_players_edit_answers_until_judged() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        coordinator.reveal(room_id, secret).unwrap();

        coordinator.submit_answer(room_id, alice, "draft").unwrap();
        coordinator.submit_answer(room_id, alice, "final").unwrap();

        let document = coordinator.snapshot(room_id).unwrap();
        assert_eq!(document.ledger.answer(0, alice).unwrap().text, "final");

        coordinator
            .judge_submission(room_id, secret, 0, alice, true)
            .unwrap();
        // Judged: the edit is silently dropped
        coordinator.submit_answer(room_id, alice, "too late").unwrap();
        let document = coordinator.snapshot(room_id).unwrap();
        assert_eq!(document.ledger.answer(0, alice).unwrap().text, "final");
    }

    #[test]
    fn test_judge_applies_exactly_once() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        coordinator.reveal(room_id, secret).unwrap();
        coordinator.submit_answer(room_id, alice, "yes").unwrap();

        let first = coordinator
            .judge_submission(room_id, secret, 0, alice, true)
            .unwrap();
        assert_eq!(first, JudgeOutcome::Applied { delta: 1, score: 1 });

        // Double-tap: same call again is a no-op, even with the verdict flipped
        let second = coordinator
            .judge_submission(room_id, secret, 0, alice, false)
            .unwrap();
        assert_eq!(second, JudgeOutcome::AlreadyJudged);
        assert_eq!(score_of(&coordinator, room_id, alice), 1);
    }

    #[test]
    fn test_judge_incorrect_scores_nothing() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        coordinator.reveal(room_id, secret).unwrap();
        coordinator.submit_answer(room_id, alice, "no").unwrap();

        let outcome = coordinator
            .judge_submission(room_id, secret, 0, alice, false)
            .unwrap();
        assert_eq!(outcome, JudgeOutcome::Applied { delta: 0, score: 0 });
    }

    #[test]
    fn test_judge_missing_submission() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        assert!(matches!(
            coordinator.judge_submission(room_id, secret, 0, alice, true),
            Err(Error::SubmissionNotFound)
        ));
    }

    #[test]
    fn test_concurrent_judges_apply_one_delta() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        coordinator.reveal(room_id, secret).unwrap();
        coordinator.submit_answer(room_id, alice, "yes").unwrap();

        let outcomes: Vec<JudgeOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let coordinator = &coordinator;
                    scope.spawn(move || {
                        coordinator
                            .judge_submission(room_id, secret, 0, alice, true)
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let applied = outcomes
            .iter()
            .filter(|o| matches!(o, JudgeOutcome::Applied { .. }))
            .count();
        assert_eq!(applied, 1, "exactly one of the two judges must apply");
        assert_eq!(score_of(&coordinator, room_id, alice), 1);
    }

    #[test]
    fn test_reveal_rejected_on_final_slot() {
        let coordinator = coordinator();
        let (room_id, secret, _, _) = room_with_players(&coordinator);
        coordinator.advance(room_id, secret, 9).unwrap();

        assert!(matches!(
            coordinator.reveal(room_id, secret),
            Err(Error::Transition(TransitionError::RevealOnFinalSlot))
        ));
    }

    #[test]
    fn test_wager_gating() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);

        assert!(matches!(
            coordinator.submit_wager(room_id, alice, 5),
            Err(Error::WagersNotOpen)
        ));

        open_final(&coordinator, room_id, secret);
        coordinator.submit_wager(room_id, alice, 5).unwrap();
        assert!(matches!(
            coordinator.submit_wager(room_id, alice, -1),
            Err(Error::NegativeWager)
        ));

        // Opening answers closes wagers
        coordinator.open_final_answers(room_id, secret).unwrap();
        assert!(matches!(
            coordinator.submit_wager(room_id, alice, 2),
            Err(Error::WagersNotOpen)
        ));
    }

    #[test]
    fn test_final_wager_clamped_to_score_at_judgment() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        win_points(&coordinator, room_id, secret, alice, 5);
        assert_eq!(score_of(&coordinator, room_id, alice), 5);

        open_final(&coordinator, room_id, secret);
        coordinator.submit_wager(room_id, alice, 9999).unwrap();
        coordinator.open_final_answers(room_id, secret).unwrap();
        coordinator
            .submit_final_answer(room_id, alice, "answer")
            .unwrap();

        let outcome = coordinator
            .judge_final(room_id, secret, alice, true)
            .unwrap();
        assert_eq!(outcome, JudgeOutcome::Applied { delta: 5, score: 10 });
    }

    #[test]
    fn test_final_incorrect_never_goes_negative() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        win_points(&coordinator, room_id, secret, alice, 2);

        open_final(&coordinator, room_id, secret);
        coordinator.submit_wager(room_id, alice, 9999).unwrap();
        coordinator.open_final_answers(room_id, secret).unwrap();
        coordinator.submit_final_answer(room_id, alice, "no").unwrap();

        let outcome = coordinator
            .judge_final(room_id, secret, alice, false)
            .unwrap();
        assert_eq!(outcome, JudgeOutcome::Applied { delta: -2, score: 0 });
    }

    #[test]
    fn test_final_without_wager_judged_at_zero() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        win_points(&coordinator, room_id, secret, alice, 3);

        open_final(&coordinator, room_id, secret);
        coordinator.open_final_answers(room_id, secret).unwrap();
        coordinator.submit_final_answer(room_id, alice, "x").unwrap();

        let outcome = coordinator
            .judge_final(room_id, secret, alice, true)
            .unwrap();
        assert_eq!(outcome, JudgeOutcome::Applied { delta: 0, score: 3 });
    }

    #[test]
    fn test_judge_final_idempotent() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        win_points(&coordinator, room_id, secret, alice, 4);

        open_final(&coordinator, room_id, secret);
        coordinator.submit_wager(room_id, alice, 4).unwrap();
        coordinator.open_final_answers(room_id, secret).unwrap();
        coordinator.submit_final_answer(room_id, alice, "x").unwrap();

        coordinator.judge_final(room_id, secret, alice, true).unwrap();
        let again = coordinator
            .judge_final(room_id, secret, alice, true)
            .unwrap();
        assert_eq!(again, JudgeOutcome::AlreadyJudged);
        assert_eq!(score_of(&coordinator, room_id, alice), 8);
    }

    #[test]
    fn test_close_answers_twice_is_harmless() {
        let coordinator = coordinator();
        let (room_id, secret, _, _) = room_with_players(&coordinator);
        coordinator.reveal(room_id, secret).unwrap();

        coordinator.close_answers(room_id, secret).unwrap();
        let before = coordinator.snapshot(room_id).unwrap();
        coordinator.close_answers(room_id, secret).unwrap();
        let after = coordinator.snapshot(room_id).unwrap();
        assert_eq!(before.room.accepting_answers, after.room.accepting_answers);
        assert_eq!(before.room.revealed, after.room.revealed);
        assert_eq!(before.room.phase, after.room.phase);
    }

    /// Drives both players to a 10-10 tie through the final round
    fn tied_after_final(
        coordinator: &Coordinator<MemoryStore>,
    ) -> (RoomId, HostSecret, PlayerId, PlayerId) {
        let (room_id, secret, alice, bob) = room_with_players(coordinator);
        // Both earn 7 across the main rounds
        for index in 0..7 {
            coordinator.reveal(room_id, secret).unwrap();
            coordinator.submit_answer(room_id, alice, "a").unwrap();
            coordinator.submit_answer(room_id, bob, "b").unwrap();
            coordinator.close_answers(room_id, secret).unwrap();
            coordinator
                .judge_submission(room_id, secret, index, alice, true)
                .unwrap();
            coordinator
                .judge_submission(room_id, secret, index, bob, true)
                .unwrap();
            coordinator.advance(room_id, secret, 1).unwrap();
        }
        open_final(coordinator, room_id, secret);
        coordinator.submit_wager(room_id, alice, 3).unwrap();
        coordinator.submit_wager(room_id, bob, 3).unwrap();
        coordinator.open_final_answers(room_id, secret).unwrap();
        coordinator.submit_final_answer(room_id, alice, "a").unwrap();
        coordinator.submit_final_answer(room_id, bob, "b").unwrap();
        coordinator.judge_final(room_id, secret, alice, true).unwrap();
        coordinator.judge_final(room_id, secret, bob, true).unwrap();
        assert_eq!(score_of(coordinator, room_id, alice), 10);
        assert_eq!(score_of(coordinator, room_id, bob), 10);
        (room_id, secret, alice, bob)
    }

    #[test]
    fn test_sudden_death_requires_complete_final_judging() {
        let coordinator = coordinator();
        let (room_id, secret, alice, bob) = room_with_players(&coordinator);
        open_final(&coordinator, room_id, secret);
        coordinator.open_final_answers(room_id, secret).unwrap();
        coordinator.submit_final_answer(room_id, alice, "a").unwrap();

        let result = coordinator.start_sudden_death(
            room_id,
            secret,
            HashSet::from([alice, bob]),
            Question::default(),
        );
        assert!(matches!(result, Err(Error::FinalJudgingIncomplete)));
    }

    #[test]
    fn test_sudden_death_permitted_on_tie() {
        let coordinator = coordinator();
        let (room_id, secret, alice, bob) = tied_after_final(&coordinator);

        coordinator
            .start_sudden_death(
                room_id,
                secret,
                HashSet::from([alice, bob]),
                Question::default(),
            )
            .unwrap();
        let document = coordinator.snapshot(room_id).unwrap();
        let sudden = document.room.sudden_death.as_ref().unwrap();
        assert_eq!(sudden.eligible, HashSet::from([alice, bob]));
    }

    #[test]
    fn test_sudden_death_first_correct_wins() {
        let coordinator = coordinator();
        let (room_id, secret, alice, bob) = tied_after_final(&coordinator);
        coordinator
            .start_sudden_death(
                room_id,
                secret,
                HashSet::from([alice, bob]),
                Question::default(),
            )
            .unwrap();
        coordinator.reveal_sudden_death(room_id, secret).unwrap();
        coordinator
            .submit_sudden_death_answer(room_id, alice, "mine")
            .unwrap();
        coordinator
            .submit_sudden_death_answer(room_id, bob, "mine too")
            .unwrap();

        let outcome = coordinator
            .judge_sudden_death(room_id, secret, alice, true)
            .unwrap();
        assert_eq!(outcome, JudgeOutcome::Applied { delta: 1, score: 11 });

        // A second correct verdict is rejected outright
        let result = coordinator.judge_sudden_death(room_id, secret, bob, true);
        assert!(matches!(result, Err(Error::SuddenDeathDecided)));

        // Judging the loser incorrect is still fine
        let outcome = coordinator
            .judge_sudden_death(room_id, secret, bob, false)
            .unwrap();
        assert_eq!(outcome, JudgeOutcome::Applied { delta: 0, score: 10 });

        // And re-judging the winner stays a no-op
        let again = coordinator
            .judge_sudden_death(room_id, secret, alice, true)
            .unwrap();
        assert_eq!(again, JudgeOutcome::AlreadyJudged);
    }

    #[test]
    fn test_judge_submission_rejects_off_board_indices() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);

        for index in [10, board::SUDDEN_DEATH_INDEX, usize::MAX] {
            let result = coordinator.judge_submission(room_id, secret, index, alice, true);
            assert!(matches!(
                result,
                Err(Error::Transition(TransitionError::QuestionIndexOutOfRange(_)))
            ));
        }
    }

    #[test]
    fn test_standard_judge_cannot_reach_tiebreaker_rows() {
        let coordinator = coordinator();
        let (room_id, secret, alice, bob) = tied_after_final(&coordinator);
        coordinator
            .start_sudden_death(
                room_id,
                secret,
                HashSet::from([alice, bob]),
                Question::default(),
            )
            .unwrap();
        coordinator.reveal_sudden_death(room_id, secret).unwrap();
        coordinator
            .submit_sudden_death_answer(room_id, alice, "x")
            .unwrap();
        coordinator
            .submit_sudden_death_answer(room_id, bob, "y")
            .unwrap();
        coordinator
            .judge_sudden_death(room_id, secret, alice, true)
            .unwrap();

        // The decided round cannot be reopened through the standard path
        // under the tiebreaker's reserved index
        let result = coordinator.judge_submission(
            room_id,
            secret,
            board::SUDDEN_DEATH_INDEX,
            bob,
            true,
        );
        assert!(matches!(result, Err(Error::Transition(_))));

        let document = coordinator.snapshot(room_id).unwrap();
        assert_eq!(document.ledger.sudden_death_winner(), Some(alice));
        assert!(!document.ledger.answer(board::SUDDEN_DEATH_INDEX, bob).unwrap().is_judged());
        assert_eq!(score_of(&coordinator, room_id, bob), 10);
    }

    #[test]
    fn test_advancing_off_final_slot_closes_wagers() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        open_final(&coordinator, room_id, secret);
        coordinator.submit_wager(room_id, alice, 3).unwrap();

        coordinator.advance(room_id, secret, -1).unwrap();
        assert!(matches!(
            coordinator.submit_wager(room_id, alice, 5),
            Err(Error::WagersNotOpen)
        ));
    }

    #[test]
    fn test_sudden_death_win_closes_answers() {
        let coordinator = coordinator();
        let (room_id, secret, alice, bob) = tied_after_final(&coordinator);
        coordinator
            .start_sudden_death(
                room_id,
                secret,
                HashSet::from([alice, bob]),
                Question::default(),
            )
            .unwrap();
        coordinator.reveal_sudden_death(room_id, secret).unwrap();
        coordinator
            .submit_sudden_death_answer(room_id, alice, "x")
            .unwrap();
        coordinator
            .judge_sudden_death(room_id, secret, alice, true)
            .unwrap();

        // The round is decided: late answers are rejected
        let result = coordinator.submit_sudden_death_answer(room_id, bob, "late");
        assert!(matches!(result, Err(Error::SuddenDeathClosed)));
    }

    #[test]
    fn test_sudden_death_rejects_outsiders() {
        let coordinator = coordinator();
        let (room_id, secret, alice, bob) = tied_after_final(&coordinator);
        let eve = PlayerId::new();
        coordinator.join_as_player(room_id, eve, "Eve").unwrap();
        coordinator
            .start_sudden_death(
                room_id,
                secret,
                HashSet::from([alice, bob]),
                Question::default(),
            )
            .unwrap();
        coordinator.reveal_sudden_death(room_id, secret).unwrap();

        let result = coordinator.submit_sudden_death_answer(room_id, eve, "me!");
        assert!(matches!(result, Err(Error::NotEligible)));
    }

    #[test]
    fn test_load_generated_board() {
        let coordinator = coordinator();
        let (room_id, secret) = coordinator.create_room("Game").unwrap();

        let payload = serde_json::json!({
            "questions": (0..10).map(|i| serde_json::json!({
                "question": format!("Q{i}?"),
                "answer": format!("A{i}"),
                "category": "General",
            })).collect::<Vec<_>>()
        })
        .to_string();
        coordinator
            .load_generated_board(room_id, secret, &payload)
            .unwrap();

        let document = coordinator.snapshot(room_id).unwrap();
        assert_eq!(document.room.questions[0].question, "Q0?");
        assert_eq!(document.room.questions[9].answer, "A9");
    }

    #[test]
    fn test_generation_failure_leaves_board_unchanged() {
        let coordinator = coordinator();
        let (room_id, secret) = coordinator.create_room("Game").unwrap();
        let question = Question {
            question: "Handwritten".to_owned(),
            answer: "Kept".to_owned(),
            category: "Misc".to_owned(),
        };
        coordinator
            .set_question(room_id, secret, 0, question)
            .unwrap();

        let result = coordinator.load_generated_board(room_id, secret, "not json at all");
        assert!(matches!(result, Err(Error::Generation(_))));
        assert_eq!(
            result.unwrap_err().kind(),
            ErrorKind::Validation,
            "generation failures are recoverable"
        );

        let document = coordinator.snapshot(room_id).unwrap();
        assert_eq!(document.room.questions[0].question, "Handwritten");
    }

    #[test]
    fn test_replace_question_flow() {
        let coordinator = coordinator();
        let (room_id, secret) = coordinator.create_room("Game").unwrap();
        let question = Question {
            question: "Old one".to_owned(),
            answer: "A".to_owned(),
            category: "C".to_owned(),
        };
        coordinator
            .set_question(room_id, secret, 2, question)
            .unwrap();

        let request = coordinator
            .replacement_request(room_id, secret, 2)
            .unwrap();
        assert_eq!(request.slot_index, 2);
        assert_eq!(request.avoid, vec!["Old one".to_owned()]);

        let payload = serde_json::json!({
            "question": {"question": "New one", "answer": "B", "category": "C"}
        })
        .to_string();
        coordinator
            .replace_question(room_id, secret, 2, &payload)
            .unwrap();
        let document = coordinator.snapshot(room_id).unwrap();
        assert_eq!(document.room.questions[2].question, "New one");
    }

    #[test]
    fn test_events_published() {
        let coordinator = coordinator();
        let (room_id, secret) = coordinator.create_room("Game").unwrap();
        let receiver = coordinator.subscribe(room_id);

        let alice = PlayerId::new();
        coordinator.join_as_player(room_id, alice, "Alice").unwrap();
        coordinator.reveal(room_id, secret).unwrap();
        coordinator.submit_answer(room_id, alice, "hi").unwrap();
        coordinator
            .judge_submission(room_id, secret, 0, alice, true)
            .unwrap();

        let events: Vec<RoomEvent> = receiver.try_iter().collect();
        assert!(matches!(events[0], RoomEvent::Player(PlayerEvent::Joined { .. })));
        assert!(matches!(
            events[1],
            RoomEvent::Board(BoardEvent::Revealed { index: 0 })
        ));
        assert!(matches!(
            events[2],
            RoomEvent::Board(BoardEvent::AnswerSubmitted { .. })
        ));
        assert!(matches!(
            events[3],
            RoomEvent::Judgment(JudgmentEvent::Scored {
                delta: 1,
                score: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_no_op_judge_publishes_nothing() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        coordinator.reveal(room_id, secret).unwrap();
        coordinator.submit_answer(room_id, alice, "x").unwrap();
        coordinator
            .judge_submission(room_id, secret, 0, alice, true)
            .unwrap();

        let receiver = coordinator.subscribe(room_id);
        coordinator
            .judge_submission(room_id, secret, 0, alice, true)
            .unwrap();
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_end_game() {
        let coordinator = coordinator();
        let (room_id, secret, alice, _) = room_with_players(&coordinator);
        coordinator.end_game(room_id, secret).unwrap();

        let document = coordinator.snapshot(room_id).unwrap();
        assert_eq!(document.room.phase, Phase::Ended);
        assert!(matches!(
            coordinator.submit_answer(room_id, alice, "x"),
            Err(Error::AnswersClosed)
        ));
    }
}
