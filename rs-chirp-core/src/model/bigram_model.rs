use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::transition::Transition;
use crate::io::build_output_path;

/// The bigram transition model.
///
/// Maps a *bigram key* (exactly two tokens joined by a single space, e.g.
/// `"This is"`) to the ordered list of transitions observed after that pair.
/// Entry order reflects observation order and carries no lookup semantics.
///
/// # Responsibilities
/// - Accumulate transitions produced by corpus ingestion
/// - Answer lookups during generation (entries under a key, starting keys)
/// - Merge freshly built entries into a persisted model (per-key append)
/// - Load from / save to disk (JSON canonical, binary fast-load cache)
///
/// # Invariants
/// - Every key splits into exactly two non-empty space-separated tokens
/// - Every entry list is non-empty (empty lists are never created)
/// - Keys are only appended to, never removed
/// - A key is sentence-starting iff its first character is uppercase;
///   this is produced by the corpus builder's capitalization rule, not
///   inferred here
///
/// The model is never mutated by generation: the generator borrows it
/// immutably and keeps its scratch state in a per-call side table.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct BigramModel {
	/// Mapping from a bigram key to its observed transitions.
	transitions: HashMap<String, Vec<Transition>>,
}

impl BigramModel {
	/// Returns an empty model.
	pub fn new() -> Self {
		Self { transitions: HashMap::new() }
	}

	/// Loads a model from a JSON file if no binary cache exists,
	/// otherwise loads the compact binary snapshot directly.
	///
	/// - `filepath` is the canonical JSON model file.
	/// - Checks if a `.bin` sibling exists for fast loading.
	/// - Uses `postcard` for compact serialization/deserialization.
	/// - On a cold load, writes the `.bin` cache for future fast loading.
	///
	/// # Errors
	/// Returns an error on I/O failure or if the persisted JSON is corrupt.
	pub fn load<P: AsRef<Path>>(filepath: P) -> Result<Self, Box<dyn std::error::Error>> {
		let binary_data_path = build_output_path(&filepath, "bin")?;
		if binary_data_path.exists() {
			let bytes = fs::read(binary_data_path)?;
			Ok(postcard::from_bytes(&bytes)?)
		} else {
			let bytes = fs::read(&filepath)?;
			let model: Self = serde_json::from_slice(&bytes)?;
			let cache = postcard::to_stdvec(&model)?;
			fs::write(binary_data_path, cache)?;
			Ok(model)
		}
	}

	/// Saves the model to disk.
	///
	/// The canonical JSON file is written atomically (temp file + rename),
	/// then the binary cache is refreshed so the fast-load path stays
	/// consistent with the JSON.
	///
	/// # Format
	/// JSON object at top level; keys are bigram strings; values are arrays
	/// of `{ "word": string, "time": integer }` objects. Mergeable by simple
	/// list concatenation per key.
	pub fn save<P: AsRef<Path>>(&self, filepath: P) -> Result<(), Box<dyn std::error::Error>> {
		let filepath = filepath.as_ref();
		let parent = filepath.parent().unwrap_or_else(|| Path::new("."));
		fs::create_dir_all(parent)?;

		let temp_file = NamedTempFile::new_in(parent)?;
		let mut writer = BufWriter::new(&temp_file);
		serde_json::to_writer(&mut writer, self)?;
		writer.flush()?;
		drop(writer);
		temp_file.persist(filepath)?;

		let cache = postcard::to_stdvec(self)?;
		fs::write(build_output_path(filepath, "bin")?, cache)?;

		Ok(())
	}

	/// Appends one observed transition under `key`, creating the entry
	/// list if the key is new.
	pub(crate) fn observe(&mut self, key: String, transition: Transition) {
		self.transitions.entry(key).or_default().push(transition);
	}

	/// Returns the transitions observed under `key`, or `None` if the
	/// key was never observed.
	pub(crate) fn transitions(&self, key: &str) -> Option<&[Transition]> {
		self.transitions.get(key).map(Vec::as_slice)
	}

	/// Returns all sentence-starting keys: keys whose first character is
	/// uppercase. These are the only legal generation start points.
	pub fn starting_keys(&self) -> Vec<&str> {
		self.transitions
			.keys()
			.filter(|key| key.chars().next().is_some_and(|c| c.is_uppercase()))
			.map(String::as_str)
			.collect()
	}

	/// Merges another model into this one.
	///
	/// # Behavior
	/// - Per-key list concatenation: existing keys are appended to,
	///   missing keys are created.
	/// - No deduplication: repeated observations stay repeated entries.
	///   This is what keeps more-common transitions more likely during
	///   generation.
	pub fn merge(&mut self, other: &Self) {
		for (key, entries) in &other.transitions {
			self.transitions
				.entry(key.clone())
				.or_default()
				.extend(entries.iter().cloned());
		}
	}

	/// Number of distinct bigram keys.
	pub fn key_count(&self) -> usize {
		self.transitions.len()
	}

	/// Total number of transition entries, duplicates included.
	pub fn entry_count(&self) -> usize {
		self.transitions.values().map(Vec::len).sum()
	}

	/// Returns true if the model holds no transitions at all.
	pub fn is_empty(&self) -> bool {
		self.transitions.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(word: &str) -> Transition {
		Transition::new(word, 202501011200)
	}

	#[test]
	fn merge_appends_without_dedup() {
		let mut a = BigramModel::new();
		a.observe("This is".to_owned(), entry("a"));

		let mut b = BigramModel::new();
		b.observe("This is".to_owned(), entry("a"));
		b.observe("is a".to_owned(), entry("test."));

		a.merge(&b);

		assert_eq!(a.key_count(), 2);
		assert_eq!(a.entry_count(), 3);
		// The repeated observation is kept as two identical entries
		assert_eq!(a.transitions("This is").unwrap().len(), 2);
	}

	#[test]
	fn starting_keys_need_an_uppercase_first_token() {
		let mut model = BigramModel::new();
		model.observe("This is".to_owned(), entry("a"));
		model.observe("is a".to_owned(), entry("test."));
		model.observe("one. Two".to_owned(), entry("three."));

		let mut starts = model.starting_keys();
		starts.sort_unstable();
		assert_eq!(starts, vec!["This is"]);
	}

	#[test]
	fn json_wire_shape() {
		let mut model = BigramModel::new();
		model.observe("This is".to_owned(), entry("a"));

		let value = serde_json::to_value(&model).unwrap();
		let expected = serde_json::json!({
			"This is": [{ "word": "a", "time": 202501011200u64 }]
		});
		assert_eq!(value, expected);
	}

	#[test]
	fn save_then_load_round_trips() {
		let mut model = BigramModel::new();
		model.observe("This is".to_owned(), entry("a"));
		model.observe("is a".to_owned(), entry("test."));

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.json");
		model.save(&path).unwrap();

		assert!(path.exists());
		// Save refreshes the binary fast-load cache as well
		assert!(dir.path().join("model.bin").exists());

		let loaded = BigramModel::load(&path).unwrap();
		assert_eq!(loaded, model);
	}

	#[test]
	fn cold_load_writes_the_binary_cache() {
		let mut model = BigramModel::new();
		model.observe("This is".to_owned(), entry("a"));

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.json");
		fs::write(&path, serde_json::to_vec(&model).unwrap()).unwrap();

		let loaded = BigramModel::load(&path).unwrap();
		assert_eq!(loaded, model);
		assert!(dir.path().join("model.bin").exists());
	}

	#[test]
	fn corrupt_json_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.json");
		fs::write(&path, b"{ not json").unwrap();

		assert!(BigramModel::load(&path).is_err());
	}
}
