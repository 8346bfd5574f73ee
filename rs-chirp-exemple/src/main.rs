use rs_chirp_core::io::read_file;
use rs_chirp_core::model::bigram_model::BigramModel;
use rs_chirp_core::model::corpus::{CorpusBuilder, RawText};
use rs_chirp_core::model::generation_input::GenerationInput;
use rs_chirp_core::model::generator::Generator;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load the corpus: one raw text per line, as handed over by the
    // retrieval subsystem (may still be HTML-entity-encoded)
    let lines = read_file("./data/corpus.txt")?;
    let texts: Vec<RawText> = lines.into_iter().map(|text| RawText { text }).collect();

    // Build a fresh model from the whole batch
    // 'build_parallel' chunks the batch across CPU cores and merges the
    // partial models; 'build' does the same work on one thread
    let builder = CorpusBuilder::new();
    let fresh = builder.build_parallel(&texts);
    println!(
        "Built {} keys / {} entries from {} texts",
        fresh.key_count(),
        fresh.entry_count(),
        texts.len()
    );

    // Merge into the persisted model and save it back
    // The store format is a JSON object (bigram key -> entry list); a
    // compact .bin cache is refreshed next to it for fast reloading
    let model_file = "./data/chirp.json";
    let mut model = if std::path::Path::new(model_file).exists() {
        BigramModel::load(model_file)?
    } else {
        BigramModel::new()
    };
    model.merge(&fresh);
    model.save(model_file)?;

    // Generation knobs live at the call site, not inside the engine
    let mut input = GenerationInput::new();

    // Length bound of the posting surface (characters, UTF-8 aware)
    input.max_chars = Some(280);

    // Drop one-liner results; short texts read like noise
    input.min_words = Some(4);

    // Number of retries when a generated text fails the bounds above
    input.nb_try = 10;

    // Generate 10 texts using the input settings
    // 'None' means exhaustion: the model has no usable path to a
    // terminal word this time. It is an expected outcome, not an error
    let mut generator = Generator::new();
    for i in 0..10 {
        match generator.predict(&model, &input) {
            Some(text) => println!("Generated text {}: {}", i + 1, text),
            None => println!("Generated text {}: nothing to say this cycle", i + 1),
        }
    }

    Ok(())
}
