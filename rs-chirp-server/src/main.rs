use std::path::PathBuf;
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, put, web};

use rs_chirp_core::io::list_files;
use rs_chirp_core::model::bigram_model::BigramModel;
use rs_chirp_core::model::corpus::{CorpusBuilder, RawText};
use rs_chirp_core::model::generation_input::GenerationInput;
use rs_chirp_core::model::generator::Generator;
use serde::Deserialize;

/// Struct representing query parameters for the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	max_chars: Option<usize>,
	min_words: Option<usize>,
	nb_try: Option<usize>,
}

#[derive(Deserialize)]
struct LearnQuery {
	name: Option<String>,
}

#[derive(Deserialize)]
struct ModelQuery {
	names: Option<String>,
}

struct SharedData {
	model: BigramModel,
	loaded: Vec<String>,
}

/// Path of a named model file under the data directory.
fn model_path(name: &str) -> PathBuf {
	PathBuf::from(format!("./data/{}.json", name))
}

/// HTTP GET endpoint `/v1/generate`
///
/// Synthesizes one text from the in-memory model. Length and word-count
/// bounds are call-site policy carried by the query, never enforced by
/// the engine itself.
///
/// Returns 204 on exhaustion: "no text could be produced" must stay
/// distinct from an empty string for posting clients.
#[get("/v1/generate")]
async fn get_generated(
	data: web::Data<Mutex<SharedData>>,
	query: web::Query<GenerateParams>,
) -> impl Responder {
	let mut input = GenerationInput::new();
	input.max_chars = query.max_chars;
	input.min_words = query.min_words;
	input.nb_try = query.nb_try.unwrap_or(5);

	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	match Generator::new().predict(&shared_data.model, &input) {
		Some(text) => HttpResponse::Ok().body(text),
		None => HttpResponse::NoContent().finish(),
	}
}

/// HTTP PUT endpoint `/v1/learn`
///
/// Body: JSON array of `{"text": ...}` objects (raw, possibly
/// HTML-entity-encoded). Builds fresh transitions, merges them into the
/// in-memory model and, when `name` is given, appends them into the
/// persisted model file as well. Responds with the number of entries
/// added.
#[put("/v1/learn")]
async fn put_learn(
	data: web::Data<Mutex<SharedData>>,
	query: web::Query<LearnQuery>,
	body: web::Json<Vec<RawText>>,
) -> impl Responder {
	let fresh = CorpusBuilder::new().build_parallel(&body);
	let added = fresh.entry_count();

	if let Some(name) = &query.name {
		let path = model_path(name);
		let mut persisted = if path.exists() {
			match BigramModel::load(&path) {
				Ok(m) => m,
				Err(e) => {
					return HttpResponse::InternalServerError()
						.body(format!("Failed to load model: {e}"));
				}
			}
		} else {
			BigramModel::new()
		};

		persisted.merge(&fresh);
		if let Err(e) = persisted.save(&path) {
			return HttpResponse::InternalServerError().body(format!("Failed to save model: {e}"));
		}
	}

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	shared_data.model.merge(&fresh);

	log::info!("learned {} transitions from {} texts", added, body.len());
	HttpResponse::Ok().body(added.to_string())
}

#[get("/v1/models")]
async fn get_models() -> impl Responder {
	match list_files(&"./data".to_owned(), "json") {
		Ok(files) => HttpResponse::Ok().body(files.join("\n").replace(".json", "")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list models"),
	}
}

#[get("/v1/loaded_models")]
async fn get_loaded_models(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	HttpResponse::Ok().body(shared_data.loaded.join("\n"))
}

/// HTTP GET endpoint `/v1/stats`
///
/// Key and entry counts of the in-memory model.
#[get("/v1/stats")]
async fn get_stats(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	HttpResponse::Ok().body(format!(
		"keys: {}\nentries: {}",
		shared_data.model.key_count(),
		shared_data.model.entry_count()
	))
}

/// HTTP PUT endpoint `/v1/load_models`
///
/// Replaces the in-memory model by loading and merging the named model
/// files from the data directory.
#[put("/v1/load_models")]
async fn put_model(
	data: web::Data<Mutex<SharedData>>,
	query: web::Query<ModelQuery>,
) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let query_names = match &query.names {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty model name"),
	};

	let model_names: Vec<&str> = query_names
		.split(',')
		.map(|s| s.trim())
		.filter(|s| !s.is_empty())
		.collect();

	shared_data.model = BigramModel::new();
	shared_data.loaded.clear();
	for name in model_names {
		let partial_model = match BigramModel::load(model_path(name)) {
			Ok(m) => m,
			Err(e) => {
				return HttpResponse::InternalServerError()
					.body(format!("Failed to load model: {e}"));
			}
		};
		shared_data.model.merge(&partial_model);
		shared_data.loaded.push(name.to_owned());
	}

	HttpResponse::Ok().body("Models loaded successfully")
}

/// Main entry point for the server.
///
/// Starts an Actix-web HTTP server around an initially empty model,
/// wrapped in a `Mutex` for thread safety. Models are loaded on demand
/// through `/v1/load_models` and grown through `/v1/learn`.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000.
/// - Currently, the data directory is hardcoded and should be made
///   configurable.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

	let shared_data = SharedData {
		model: BigramModel::new(),
		loaded: Vec::new(),
	};
	let shared_model = web::Data::new(Mutex::new(shared_data));

	log::info!("listening on 127.0.0.1:5000");

	HttpServer::new(move || {
		App::new()
			.wrap(Logger::default())
			.wrap(Cors::permissive())
			.app_data(shared_model.clone())
			.service(get_generated)
			.service(put_learn)
			.service(get_models)
			.service(put_model)
			.service(get_loaded_models)
			.service(get_stats)
	})
	.bind(("127.0.0.1", 5000))?
	.run()
	.await
}
