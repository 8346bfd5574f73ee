//! Top-level module for the bigram text-synthesis system.
//!
//! This crate provides a bigram-to-next-word text generator, including:
//! - The transition model (`BigramModel`)
//! - Corpus ingestion (`CorpusBuilder`)
//! - Generation configuration (`GenerationInput`)
//! - A high-level generation interface (`Generator`)

/// High-level interface for synthesizing texts from a `BigramModel`.
///
/// Exposes randomized backtracking generation with injectable
/// randomness and call-site policy (length and word-count bounds).
pub mod generator;

/// Bigram transition model.
///
/// Maps a two-word key to the list of observed next words. Supports
/// merging, JSON persistence with a binary fast-load cache, and
/// lookups used during generation.
pub mod bigram_model;

/// Corpus ingestion.
///
/// Normalizes raw short texts (entity decoding, token filtering,
/// capitalization, punctuation) and windows them into transitions.
pub mod corpus;

/// Internal representation of a single observed transition.
///
/// One record of "after these two words, this word followed".
/// This module is not exposed publicly.
mod transition;

/// Generation parameter structure.
///
/// Stores call-site policy such as maximum character count, minimum
/// word count and retry budget. Used by `Generator::predict`.
pub mod generation_input;
