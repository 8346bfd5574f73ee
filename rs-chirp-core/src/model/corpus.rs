use std::sync::mpsc;
use std::thread;

use chrono::{Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};

use super::bigram_model::BigramModel;
use super::transition::Transition;

/// Time source for transition timestamps.
///
/// Ingestion is a pure function of its input and a clock; injecting the
/// clock keeps the builder independently testable.
pub trait Clock {
	/// Current time as a compact `YYYYMMDDhhmm` integer.
	fn now(&self) -> u64;
}

/// Wall-clock `Clock` backed by the local time zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> u64 {
		let now = Local::now();
		now.year() as u64 * 100_000_000
			+ now.month() as u64 * 1_000_000
			+ now.day() as u64 * 10_000
			+ now.hour() as u64 * 100
			+ now.minute() as u64
	}
}

/// One raw input text, as handed over by the retrieval subsystem.
///
/// The text may arrive HTML-entity-encoded; ingestion decodes it. No other
/// shape requirements are imposed on the source.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RawText {
	pub text: String,
}

/// Converts batches of raw texts into fresh model entries.
///
/// # Responsibilities
/// - Normalize each text (entity decoding, token filtering, casing,
///   terminal punctuation)
/// - Window the normalized tokens into bigram-to-word transitions
/// - Stamp every transition with the injected clock
///
/// The builder only ever produces a *fresh* model holding the new
/// observations; merging into a persisted model is the caller's concern.
/// Malformed input degrades gracefully and an empty batch produces an
/// empty model — there are no failure conditions.
pub struct CorpusBuilder<C: Clock> {
	clock: C,
}

impl CorpusBuilder<SystemClock> {
	/// Creates a builder stamping entries with the system clock.
	pub fn new() -> Self {
		Self::with_clock(SystemClock)
	}
}

impl Default for CorpusBuilder<SystemClock> {
	fn default() -> Self {
		Self::new()
	}
}

impl<C: Clock> CorpusBuilder<C> {
	/// Creates a builder with a custom time source.
	pub fn with_clock(clock: C) -> Self {
		Self { clock }
	}

	/// Builds a fresh model from a batch of raw texts.
	///
	/// # Behavior
	/// Per input text, in order:
	/// - Decode HTML entities back to literal characters.
	/// - Split on whitespace and drop mention (`@...`) and link
	///   (`http...`) tokens.
	/// - Discard the whole text if fewer than 3 tokens remain; a text
	///   that short cannot yield a single transition.
	/// - Lowercase everything, then capitalize the first token and every
	///   token following a `.`/`!`/`?`-terminated one.
	/// - Append `.` to the final token unless it already ends in
	///   terminal punctuation or a comma.
	/// - Slide a width-3 window: the first two tokens form the key, the
	///   third the observed next word.
	pub fn build(&self, texts: &[RawText]) -> BigramModel {
		let mut model = BigramModel::new();

		for raw in texts {
			let Some(tokens) = normalize(&raw.text) else {
				continue;
			};

			for window in tokens.windows(3) {
				let key = format!("{} {}", window[0], window[1]);
				model.observe(key, Transition::new(&window[2], self.clock.now()));
			}
		}

		model
	}
}

impl<C: Clock + Clone + Send + 'static> CorpusBuilder<C> {
	/// Builds a model from a large batch by splitting the work across
	/// threads.
	///
	/// # Behavior
	/// - Splits the batch into chunks (based on CPU cores * factor).
	/// - Spawns a thread per chunk building a partial model.
	/// - Merges all partial models sequentially.
	///
	/// # Notes
	/// - Uses MPSC channels to collect models from threads.
	/// - Produces the same observations as `build`; only the entry order
	///   under shared keys may differ, which carries no semantics.
	pub fn build_parallel(&self, texts: &[RawText]) -> BigramModel {
		if texts.is_empty() {
			return BigramModel::new();
		}

		let cpus = num_cpus::get();
		let factor = 8;
		let chunks = cpus * factor;
		let chunk_size = ((texts.len() + chunks - 1) / chunks).max(1);

		let (tx, rx) = mpsc::channel();
		for chunk in texts.chunks(chunk_size) {
			let tx = tx.clone();
			let chunk: Vec<RawText> = chunk.to_vec();
			let clock = self.clock.clone();

			thread::spawn(move || {
				let partial_model = CorpusBuilder::with_clock(clock).build(&chunk);
				tx.send(partial_model).expect("Failed to send from thread");
			});
		}
		drop(tx);

		let mut final_model = BigramModel::new();
		for partial_model in rx.iter() {
			final_model.merge(&partial_model);
		}

		final_model
	}
}

/// Decodes the HTML entities source texts arrive with.
///
/// The ampersand is decoded last so that double-encoded input degrades
/// to the literal entity instead of re-decoding.
fn decode_entities(text: &str) -> String {
	text.replace("&lt;", "<")
		.replace("&gt;", ">")
		.replace("&quot;", "\"")
		.replace("&#39;", "'")
		.replace("&amp;", "&")
}

/// Capitalizes the first character of a token, leaving the rest as-is.
fn capitalize_first(s: &str) -> String {
	let mut chars = s.chars();
	match chars.next() {
		None => String::new(),
		Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
	}
}

/// Runs the normalization pipeline on one raw text.
///
/// Returns `None` if fewer than 3 tokens survive filtering; such a text
/// contributes nothing to the model.
fn normalize(text: &str) -> Option<Vec<String>> {
	let decoded = decode_entities(text);

	let mut tokens: Vec<String> = decoded
		.split_whitespace()
		.filter(|token| !token.starts_with('@') && !token.starts_with("http"))
		.map(str::to_lowercase)
		.collect();

	if tokens.len() < 3 {
		return None;
	}

	tokens[0] = capitalize_first(&tokens[0]);
	for i in 1..tokens.len() {
		if tokens[i - 1].ends_with(['.', '!', '?']) {
			tokens[i] = capitalize_first(&tokens[i]);
		}
	}

	// Cannot fail, there are at least 3 tokens
	let last = tokens.last_mut()?;
	if !last.ends_with(['.', '!', '?', ',']) {
		last.push('.');
	}

	Some(tokens)
}
