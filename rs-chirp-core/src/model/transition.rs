use serde::{Deserialize, Serialize};

/// Represents one observed transition in the bigram model.
///
/// A `Transition` records that, after some two-word prefix (the key it is
/// stored under), `word` was observed to follow, at `time`.
///
/// Conceptually, this is one edge observation in a word graph. A transition
/// observed N times across the corpus is stored as N separate entries under
/// the same key; selection during generation is uniform over entries, so
/// this duplication is the sole weighting mechanism.
///
/// ## Invariants
/// - `word` is a single whitespace-free token, lowercase unless
///   sentence-initial, possibly carrying trailing `.`, `!`, `?` or `,`
/// - `time` is a compact `YYYYMMDDhhmm` timestamp; it is informational
///   only and never read during generation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transition {
	/// The literal next token.
	pub word: String,
	/// When the transition was observed (`YYYYMMDDhhmm` as an integer).
	pub time: u64,
}

impl Transition {
	/// Creates a new transition record.
	pub fn new(word: &str, time: u64) -> Self {
		Self {
			word: word.to_owned(),
			time,
		}
	}

	/// Returns true if this transition's word can end a text.
	///
	/// A word ending in `.`, `!` or `?` is a legal finishing move for
	/// the generator; a trailing comma is not.
	pub fn is_terminal(&self) -> bool {
		self.word.ends_with(['.', '!', '?'])
	}
}
