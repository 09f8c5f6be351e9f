//! # Trivia Night Game Core
//!
//! This library provides the core game logic for a live multi-player trivia
//! night: room lifecycle, player identity, answer and wager collection,
//! host-driven judging with atomic scoring, the final wagered round, and
//! the sudden-death tiebreaker. Transport, persistence backends, and UI are
//! collaborators behind seams ([`store::RoomStore`], [`events::Fanout`],
//! [`player::LocalStorage`]); the crate itself is the single authority on
//! what the game state is and how it may change.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

pub mod constants;

pub mod coordinator;
pub mod events;
pub mod generate;
pub mod ledger;
pub mod player;
pub mod room;
pub mod room_id;
pub mod scoring;
pub mod store;
