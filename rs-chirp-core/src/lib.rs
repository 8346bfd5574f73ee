//! Bigram-based text synthesis library.
//!
//! This crate provides the core of a text-synthesis bot including:
//! - Corpus ingestion (raw short texts into a bigram transition model)
//! - A bigram transition model with JSON persistence and merging
//! - Randomized backtracking generation of new, well-formed texts
//! - Internal utilities for I/O and path handling
//!
//! Only the high-level API is exposed publicly. Low-level components
//! are kept internal to ensure consistency and prevent misuse.
//!
//! The crate performs no network access; retrieval of raw texts and
//! posting of generated ones are the caller's concern.

/// Core transition model, corpus ingestion and generation logic.
///
/// This module exposes the high-level interfaces while keeping
/// internal model representations private.
pub mod model;

/// I/O utilities (corpus file loading, path helpers).
///
/// Shared with the server and example binaries.
pub mod io;
