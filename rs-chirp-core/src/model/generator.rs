use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;

use super::bigram_model::BigramModel;
use super::generation_input::GenerationInput;

/// High-level generator synthesizing texts from a `BigramModel`.
///
/// # Responsibilities
/// - Walk the model with a randomized backtracking search
/// - Keep per-call visited state in a side table, never in the model
/// - Apply call-site policy (`GenerationInput`) with a retry budget
///
/// The randomness source is injected so generation is reproducible
/// in tests with a fixed seed.
pub struct Generator<R: Rng> {
	rng: R,
}

impl Generator<ThreadRng> {
	/// Creates a generator backed by the thread-local RNG.
	pub fn new() -> Self {
		Self { rng: rand::rng() }
	}
}

impl Default for Generator<ThreadRng> {
	fn default() -> Self {
		Self::new()
	}
}

impl<R: Rng> Generator<R> {
	/// Creates a generator with a custom randomness source.
	pub fn with_rng(rng: R) -> Self {
		Self { rng }
	}

	/// Generates a text satisfying the call-site policy.
	///
	/// # Behavior
	/// - Calls `internal_predict`.
	/// - Checks the result against the bounds in `input`, retrying up
	///   to `input.nb_try` times.
	/// - Returns `None` on exhaustion (the model has no usable path to
	///   a terminal word from any starting key) or when no attempt
	///   satisfied the bounds.
	///
	/// # Notes
	/// - Exhaustion is an expected, recoverable outcome, distinct from
	///   an empty string. The caller decides whether to skip a cycle,
	///   retry later or grow the model first.
	/// - Every attempt starts from a clean slate; no search state
	///   survives between calls.
	pub fn predict(&mut self, model: &BigramModel, input: &GenerationInput) -> Option<String> {
		let mut nb_try = input.nb_try.max(1);

		loop {
			let text = self.internal_predict(model)?;
			if input.accepts(&text) {
				return Some(text);
			}
			nb_try -= 1;
			if nb_try == 0 {
				return None;
			}
		}
	}

	/// Internal generation logic: randomized backtracking search over
	/// the bigram graph.
	///
	/// # Behavior
	/// - Shuffles the sentence-starting keys uniformly; that order is
	///   the exhaustive trial order.
	/// - Grows a word stack per starting key until a terminal word is
	///   pushed (success) or the key is proven dead (move on).
	/// - Returns `None` once every starting key is exhausted.
	///
	/// # Notes
	/// - Visited entries live in a side table keyed by pair key and
	///   entry index, discarded when the call returns; the model itself
	///   is never touched.
	/// - The side table spans starting keys within one call: each
	///   backtrack either consumes one entry for the rest of the call
	///   or shrinks the stack, which bounds the whole search.
	fn internal_predict(&mut self, model: &BigramModel) -> Option<String> {
		let mut starting_keys = model.starting_keys();
		starting_keys.shuffle(&mut self.rng);

		let mut visited: HashMap<String, HashSet<usize>> = HashMap::new();
		for key in starting_keys {
			if let Some(text) = self.grow(model, key, &mut visited) {
				return Some(text);
			}
		}

		None
	}

	/// Attempts to grow a full text from one starting key.
	///
	/// The stack starts as the key's two tokens. Each step looks up the
	/// pair formed by the last two words:
	/// - the unvisited entries under that pair form the move set, one
	///   move per entry, duplicates included — duplication is what
	///   biases the choice toward more frequently observed transitions;
	/// - a chosen terminal word (ending `.`, `!`, `?`) finishes the
	///   text, any other word extends the stack;
	/// - an empty move set means backtracking: the entry that produced
	///   the current last word is marked visited and the word dropped,
	///   or the key is abandoned once only the two seed words remain.
	fn grow(
		&mut self,
		model: &BigramModel,
		starting_key: &str,
		visited: &mut HashMap<String, HashSet<usize>>,
	) -> Option<String> {
		let mut stack: Vec<String> = starting_key.split(' ').map(str::to_owned).collect();

		loop {
			let pair = format!("{} {}", stack[stack.len() - 2], stack[stack.len() - 1]);

			let entries = model.transitions(&pair).unwrap_or(&[]);
			let seen = visited.get(pair.as_str());
			let moves: Vec<usize> = (0..entries.len())
				.filter(|index| seen.is_none_or(|s| !s.contains(index)))
				.collect();

			if moves.is_empty() {
				if stack.len() < 3 {
					// Down to the two seed words: no viable continuation
					return None;
				}
				let previous_pair =
					format!("{} {}", stack[stack.len() - 3], stack[stack.len() - 2]);
				mark_dead_end(model, visited, &previous_pair, &stack[stack.len() - 1]);
				stack.pop();
				continue;
			}

			let entry = &entries[moves[self.rng.random_range(0..moves.len())]];
			let terminal = entry.is_terminal();
			stack.push(entry.word.clone());

			if terminal {
				return Some(compile(&stack));
			}
		}
	}
}

/// Marks the entry that produced `word` under `key` as visited.
///
/// With duplicated entries the producing occurrence is ambiguous after
/// the fact; the first unvisited match is marked, which consumes exactly
/// one entry either way. A key that was never observed marks nothing.
fn mark_dead_end(
	model: &BigramModel,
	visited: &mut HashMap<String, HashSet<usize>>,
	key: &str,
	word: &str,
) {
	let Some(entries) = model.transitions(key) else {
		return;
	};

	let seen = visited.entry(key.to_owned()).or_default();
	let index = entries
		.iter()
		.enumerate()
		.find(|(index, entry)| entry.word == word && !seen.contains(index))
		.map(|(index, _)| index);

	if let Some(index) = index {
		seen.insert(index);
	}
}

/// Compiles a finished word stack into the final text.
///
/// Tokens are joined with single spaces; a trailing `.` is appended if
/// the text does not already end in terminal punctuation (it normally
/// will, coming from a finishing move).
fn compile(stack: &[String]) -> String {
	let mut text = stack.join(" ");
	if !text.ends_with(['.', '!', '?']) {
		text.push('.');
	}
	text
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::transition::Transition;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn seeded() -> Generator<StdRng> {
		Generator::with_rng(StdRng::seed_from_u64(42))
	}

	fn model_of(observations: &[(&str, &str)]) -> BigramModel {
		let mut model = BigramModel::new();
		for (key, word) in observations {
			model.observe((*key).to_owned(), Transition::new(word, 202501011200));
		}
		model
	}

	#[test]
	fn empty_model_yields_none() {
		let model = BigramModel::new();
		assert_eq!(seeded().predict(&model, &GenerationInput::new()), None);
	}

	#[test]
	fn model_without_starting_keys_yields_none() {
		// No key starts with an uppercase character
		let model = model_of(&[("this is", "a"), ("is a", "test.")]);
		assert_eq!(seeded().predict(&model, &GenerationInput::new()), None);
	}

	#[test]
	fn dead_end_starting_key_yields_none() {
		// "a" never terminates and has no continuation
		let model = model_of(&[("This is", "a")]);
		assert_eq!(seeded().predict(&model, &GenerationInput::new()), None);
	}

	#[test]
	fn single_path_is_followed_to_its_terminal_word() {
		let model = model_of(&[("This is", "a"), ("is a", "test.")]);
		assert_eq!(
			seeded().predict(&model, &GenerationInput::new()),
			Some("This is a test.".to_owned())
		);
	}

	#[test]
	fn backtracking_recovers_from_a_dead_branch() {
		// "alpha" dead-ends; whichever branch is tried first, the search
		// must end up on "beta works."
		let model = model_of(&[
			("This is", "alpha"),
			("This is", "beta"),
			("is beta", "works."),
		]);

		for seed in 0..16 {
			let mut generator = Generator::with_rng(StdRng::seed_from_u64(seed));
			assert_eq!(
				generator.predict(&model, &GenerationInput::new()),
				Some("This is beta works.".to_owned())
			);
		}
	}

	#[test]
	fn cyclic_model_terminates() {
		// A cycle with no terminal word anywhere: the search must consume
		// the entries and give up rather than loop forever
		let model = model_of(&[("Ab cd", "ab"), ("cd ab", "cd")]);
		assert_eq!(seeded().predict(&model, &GenerationInput::new()), None);
	}

	#[test]
	fn results_end_with_terminal_punctuation() {
		let model = model_of(&[
			("This is", "a"),
			("is a", "test,"),
			("a test,", "really."),
			("This is", "fine!"),
		]);

		for seed in 0..16 {
			let mut generator = Generator::with_rng(StdRng::seed_from_u64(seed));
			let text = generator
				.predict(&model, &GenerationInput::new())
				.expect("model has a terminal path");
			assert!(text.ends_with(['.', '!', '?']), "got {text:?}");
		}
	}

	#[test]
	fn no_visited_marker_leaks_into_the_model() {
		let model = model_of(&[
			("This is", "alpha"),
			("This is", "beta"),
			("is beta", "works."),
		]);
		let snapshot = model.clone();

		let mut generator = seeded();
		let first = generator.predict(&model, &GenerationInput::new());
		let second = generator.predict(&model, &GenerationInput::new());

		// The model is untouched, and the second call sees the same
		// search space as the first
		assert_eq!(model, snapshot);
		assert_eq!(first, second);
		assert!(first.is_some());
	}

	#[test]
	fn bounds_are_applied_at_the_call_site() {
		let model = model_of(&[("This is", "a"), ("is a", "test.")]);

		let mut input = GenerationInput::new();
		input.min_words = Some(5);
		input.nb_try = 3;
		assert_eq!(seeded().predict(&model, &input), None);

		let mut input = GenerationInput::new();
		input.max_chars = Some(10);
		input.nb_try = 3;
		assert_eq!(seeded().predict(&model, &input), None);

		// The same model passes with the bounds relaxed
		let mut input = GenerationInput::new();
		input.max_chars = Some(280);
		input.min_words = Some(4);
		assert!(seeded().predict(&model, &input).is_some());
	}

	#[test]
	fn compile_appends_a_period_when_needed() {
		let stack = vec!["Trailing".to_owned(), "comma,".to_owned()];
		assert_eq!(compile(&stack), "Trailing comma,.");

		let stack = vec!["Already".to_owned(), "done.".to_owned()];
		assert_eq!(compile(&stack), "Already done.");
	}
}
