//! Submission ledger
//!
//! This module tracks everything players write during a game: per-question
//! answers, final-round wagers, and final-round answers. Each collection is
//! an upsert model keyed to prevent duplicate scoring - one submission per
//! (question, player), one wager and one final answer per player. Rows stay
//! editable by their owning player until the host judges them; a judged row
//! is immutable forever after. Sudden-death answers reuse the submission
//! shape under a reserved sentinel question index.
//!
//! The ledger itself never touches scores. The coordinator reads the judged
//! tri-state, computes the delta through the scoring engine, and records the
//! judgment here inside the same transaction that bumps the player's score.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use thiserror::Error;

use super::{constants::board, player::PlayerId};

/// The host's verdict on a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    /// The answer was accepted
    Correct,
    /// The answer was rejected
    Incorrect,
}

impl Judgment {
    /// Whether this judgment awards the answer
    pub fn is_correct(self) -> bool {
        matches!(self, Judgment::Correct)
    }
}

/// Converts a host's boolean verdict into a [`Judgment`]
impl From<bool> for Judgment {
    fn from(correct: bool) -> Self {
        if correct {
            Judgment::Correct
        } else {
            Judgment::Incorrect
        }
    }
}

/// One player's answer to one question
///
/// Identity key is the (question index, player id) pair; later writes before
/// judging overwrite the text, and at most one row ever exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// The submitting player
    pub player_id: PlayerId,
    /// Snapshot of the player's name at submission time
    pub player_name: String,
    /// The question this answers; the sudden-death sentinel for tiebreakers
    pub question_index: usize,
    /// Free-text answer, editable until judged
    pub text: String,
    /// Tri-state: unjudged / correct / incorrect
    pub judgment: Option<Judgment>,
    /// Score delta applied when judged; zero until then
    pub points_delta: i64,
    /// Creation order within the ledger, for stable host display
    seq: u64,
}

impl Submission {
    /// Whether the host has judged this submission
    pub fn is_judged(&self) -> bool {
        self.judgment.is_some()
    }
}

/// One player's declared final-round wager
///
/// Stored raw and unclamped; clamping happens against the score as of
/// judgment, not as of submission, so a stale score can never inflate the
/// effective wager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wager {
    /// The wagering player
    pub player_id: PlayerId,
    /// Declared amount, as submitted
    pub amount: i64,
    /// Creation order within the ledger
    seq: u64,
}

/// Errors raised by ledger writes
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    /// The targeted row was already judged and is immutable
    #[error("submission is already judged")]
    AlreadyJudged,
    /// A judgment referenced a row that does not exist
    #[error("no such submission")]
    NoSuchSubmission,
}

/// All player-written records for one game
///
/// Reading any projection never mutates the ledger; the creation-order views
/// are plain iterators the host UI can restart at will.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Answers keyed by (question index, player); includes sudden-death rows
    /// under the sentinel index
    #[serde_as(as = "Vec<(_, _)>")]
    answers: HashMap<(usize, PlayerId), Submission>,
    /// Final-round answers, one per player
    final_answers: HashMap<PlayerId, Submission>,
    /// Final-round wagers, one per player
    wagers: HashMap<PlayerId, Wager>,
    /// Monotonic counter assigning creation order across all collections
    next_seq: u64,
}

impl Ledger {
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Writes or overwrites a player's answer to a question
    ///
    /// A fresh row is appended on first write; later writes replace the
    /// text in place (players may edit until the host closes answers).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyJudged`] once the row is judged; the
    /// existing row is left untouched.
    pub fn upsert_answer(
        &mut self,
        question_index: usize,
        player_id: PlayerId,
        player_name: &str,
        text: &str,
    ) -> Result<(), LedgerError> {
        let seq = self.take_seq();
        match self.answers.entry((question_index, player_id)) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let submission = entry.get_mut();
                if submission.is_judged() {
                    return Err(LedgerError::AlreadyJudged);
                }
                submission.text = text.to_owned();
                Ok(())
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(Submission {
                    player_id,
                    player_name: player_name.to_owned(),
                    question_index,
                    text: text.to_owned(),
                    judgment: None,
                    points_delta: 0,
                    seq,
                });
                Ok(())
            }
        }
    }

    /// Writes or overwrites a player's final-round answer
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyJudged`] once the row is judged.
    pub fn upsert_final_answer(
        &mut self,
        player_id: PlayerId,
        player_name: &str,
        text: &str,
    ) -> Result<(), LedgerError> {
        let seq = self.take_seq();
        match self.final_answers.entry(player_id) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let submission = entry.get_mut();
                if submission.is_judged() {
                    return Err(LedgerError::AlreadyJudged);
                }
                submission.text = text.to_owned();
                Ok(())
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(Submission {
                    player_id,
                    player_name: player_name.to_owned(),
                    question_index: board::FINAL_QUESTION_INDEX,
                    text: text.to_owned(),
                    judgment: None,
                    points_delta: 0,
                    seq,
                });
                Ok(())
            }
        }
    }

    /// Writes or overwrites a player's declared wager
    ///
    /// Keyed by player only: there is a single final round per game.
    pub fn upsert_wager(&mut self, player_id: PlayerId, amount: i64) {
        let seq = self.take_seq();
        self.wagers
            .entry(player_id)
            .and_modify(|wager| wager.amount = amount)
            .or_insert(Wager {
                player_id,
                amount,
                seq,
            });
    }

    /// Looks up one answer row
    pub fn answer(&self, question_index: usize, player_id: PlayerId) -> Option<&Submission> {
        self.answers.get(&(question_index, player_id))
    }

    /// Looks up one final-round answer row
    pub fn final_answer(&self, player_id: PlayerId) -> Option<&Submission> {
        self.final_answers.get(&player_id)
    }

    /// Looks up one wager
    pub fn wager(&self, player_id: PlayerId) -> Option<&Wager> {
        self.wagers.get(&player_id)
    }

    /// Records a judgment on an answer row
    ///
    /// The first judgment wins; the row becomes immutable with the applied
    /// delta recorded on it.
    ///
    /// # Errors
    ///
    /// * [`LedgerError::NoSuchSubmission`] - no row exists for the key
    /// * [`LedgerError::AlreadyJudged`] - the row was judged before
    pub fn judge_answer(
        &mut self,
        question_index: usize,
        player_id: PlayerId,
        judgment: Judgment,
        points_delta: i64,
    ) -> Result<(), LedgerError> {
        let submission = self
            .answers
            .get_mut(&(question_index, player_id))
            .ok_or(LedgerError::NoSuchSubmission)?;
        Self::record_judgment(submission, judgment, points_delta)
    }

    /// Records a judgment on a final-round answer row
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::judge_answer`].
    pub fn judge_final_answer(
        &mut self,
        player_id: PlayerId,
        judgment: Judgment,
        points_delta: i64,
    ) -> Result<(), LedgerError> {
        let submission = self
            .final_answers
            .get_mut(&player_id)
            .ok_or(LedgerError::NoSuchSubmission)?;
        Self::record_judgment(submission, judgment, points_delta)
    }

    fn record_judgment(
        submission: &mut Submission,
        judgment: Judgment,
        points_delta: i64,
    ) -> Result<(), LedgerError> {
        if submission.is_judged() {
            return Err(LedgerError::AlreadyJudged);
        }
        submission.judgment = Some(judgment);
        submission.points_delta = points_delta;
        Ok(())
    }

    /// Answers to one question in creation order
    ///
    /// A restartable projection for host display; reading never mutates.
    pub fn answers_in_order(
        &self,
        question_index: usize,
    ) -> impl Iterator<Item = &Submission> {
        self.answers
            .values()
            .filter(move |s| s.question_index == question_index)
            .sorted_by_key(|s| s.seq)
    }

    /// Final-round answers in creation order
    pub fn final_answers_in_order(&self) -> impl Iterator<Item = &Submission> {
        self.final_answers.values().sorted_by_key(|s| s.seq)
    }

    /// Wagers in creation order
    pub fn wagers_in_order(&self) -> impl Iterator<Item = &Wager> {
        self.wagers.values().sorted_by_key(|w| w.seq)
    }

    /// Sudden-death answers in creation order
    pub fn sudden_death_answers_in_order(&self) -> impl Iterator<Item = &Submission> {
        self.answers_in_order(board::SUDDEN_DEATH_INDEX)
    }

    /// Whether every submitted final-round answer has been judged
    ///
    /// Vacuously true when nobody answered.
    pub fn final_round_judged(&self) -> bool {
        self.final_answers.values().all(Submission::is_judged)
    }

    /// The sudden-death winner, if one has been judged correct
    ///
    /// The coordinator guarantees at most one row is ever judged correct;
    /// earliest creation order breaks any tie defensively.
    pub fn sudden_death_winner(&self) -> Option<PlayerId> {
        self.sudden_death_answers_in_order()
            .find(|s| s.judgment == Some(Judgment::Correct))
            .map(|s| s.player_id)
    }
}
