use std::sync::{Arc, RwLock};

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{get, post, put, web, App, HttpResponse, HttpServer, Responder};
use log::{error, info};
use serde::Deserialize;

use accord_core::config::AccordConfig;
use accord_core::constraints::{AgreementChecker, ConstrainedDecoder, Constraint};
use accord_core::evaluation::GrammaticalityEvaluator;
use accord_core::generation::TemplateGenerator;
use accord_core::morphology::LexiconAnalyzer;
use accord_core::verification::Verifier;
use accord_core::AccordError;

/// Query parameters of `/v1/verify`
#[derive(Deserialize)]
struct VerifyParams {
	sentence: Option<String>
}

/// Query parameters of `/v1/generate`
#[derive(Deserialize)]
struct GenerateParams {
	template: Option<String>,
	limit: Option<usize>
}

/// JSON body of `/v1/decode`
#[derive(Deserialize)]
struct DecodeRequest {
	vocabulary: Vec<String>,
	scores: Vec<f32>,
	beam_width: Option<usize>,
	max_length: Option<usize>,
	constraints: Option<Vec<Constraint>>
}

#[derive(Deserialize)]
struct LexiconQuery {
	names: Option<String>
}

struct SharedData {
	config: AccordConfig,
	analyzer: Arc<LexiconAnalyzer>
}

type SharedState = web::Data<RwLock<SharedData>>;

impl SharedData {
	fn checker(&self) -> AgreementChecker {
		AgreementChecker::new(self.config.checker.clone())
	}
}

/// Maps core errors to HTTP statuses: caller mistakes are 4xx, the rest 500.
fn error_response(e: &AccordError) -> HttpResponse {
	match e {
		AccordError::TemplateNotFound(_) => HttpResponse::NotFound().body(e.to_string()),
		AccordError::InvalidInput(_) | AccordError::InvalidPattern(_) | AccordError::UnknownConstraint(_) => {
			HttpResponse::BadRequest().body(e.to_string())
		}
		_ => {
			error!("{e}");
			HttpResponse::InternalServerError().body(e.to_string())
		}
	}
}

macro_rules! read_state {
	($data:expr) => {
		match $data.read() {
			Ok(guard) => guard,
			Err(_) => return HttpResponse::InternalServerError().body("State lock failed"),
		}
	};
}

/// HTTP GET endpoint `/v1/verify`
///
/// Returns the JSON verdict of one sentence.
#[get("/v1/verify")]
async fn get_verify(data: SharedState, query: web::Query<VerifyParams>) -> impl Responder {
	let sentence = match &query.sentence {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty sentence"),
	};

	let shared_data = read_state!(data);
	let verdict = Verifier::new(shared_data.analyzer.as_ref()).verify(sentence);
	HttpResponse::Ok().json(verdict)
}

/// HTTP GET endpoint `/v1/generate`
///
/// Fills a template with the configured lexical items.
/// Returns one sentence per line.
#[get("/v1/generate")]
async fn get_generated(data: SharedState, query: web::Query<GenerateParams>) -> impl Responder {
	let template = query.template.as_deref().unwrap_or("SN");
	let (analyzer, checker, settings) = {
		let shared_data = read_state!(data);
		(shared_data.analyzer.clone(), shared_data.checker(), shared_data.config.generation.clone())
	};

	let items = match settings.items() {
		Ok(items) => items,
		Err(e) => return error_response(&e),
	};
	let generator = TemplateGenerator::with_checker(analyzer.as_ref(), checker)
		.with_max_repetitions(settings.max_repetitions);

	match generator.generate_with_constraints(template, &items, settings.chunk_size) {
		Ok(sentences) => {
			let limit = query.limit.unwrap_or(sentences.len());
			HttpResponse::Ok().body(sentences.into_iter().take(limit).collect::<Vec<_>>().join("\n"))
		}
		Err(e) => error_response(&e),
	}
}

/// HTTP POST endpoint `/v1/decode`
///
/// Runs the constrained beam search and returns the hypotheses as JSON.
/// Requests beyond the `[decoder]` bounds are rejected with 400.
#[post("/v1/decode")]
async fn post_decode(data: SharedState, body: web::Json<DecodeRequest>) -> impl Responder {
	let (analyzer, checker, defaults) = {
		let shared_data = read_state!(data);
		(shared_data.analyzer.clone(), shared_data.checker(), shared_data.config.decoder.clone())
	};

	let beam_width = body.beam_width.unwrap_or(defaults.beam_width);
	let max_length = body.max_length.unwrap_or(defaults.max_length);
	let constraints = body.constraints.as_deref().unwrap_or(defaults.constraints.as_slice());
	if let Err(e) = defaults.check_request(beam_width, max_length, body.vocabulary.len()) {
		return error_response(&e);
	}

	let decoder = ConstrainedDecoder::with_checker(analyzer.as_ref(), checker);
	match decoder.beam_search_with_constraints(&body.scores, &body.vocabulary, beam_width, max_length, constraints) {
		Ok(hypotheses) => HttpResponse::Ok().json(hypotheses),
		Err(e) => error_response(&e),
	}
}

/// HTTP POST endpoint `/v1/evaluate`
///
/// Takes a JSON array of sentences, returns the evaluation report.
#[post("/v1/evaluate")]
async fn post_evaluate(data: SharedState, body: web::Json<Vec<String>>) -> impl Responder {
	let shared_data = read_state!(data);
	let evaluator = GrammaticalityEvaluator::new(shared_data.analyzer.as_ref(), shared_data.checker());
	HttpResponse::Ok().json(evaluator.evaluate_grammaticality(&body))
}

#[get("/v1/templates")]
async fn get_templates(data: SharedState) -> impl Responder {
	let shared_data = read_state!(data);
	let generator = TemplateGenerator::new(shared_data.analyzer.as_ref());
	HttpResponse::Ok().body(generator.template_names().join("\n"))
}

#[get("/v1/lexicons")]
async fn get_lexicons(data: SharedState) -> impl Responder {
	let shared_data = read_state!(data);
	match shared_data.config.lexicon.available() {
		Ok(files) => HttpResponse::Ok().body(files.join("\n")),
		Err(e) => error_response(&e),
	}
}

#[get("/v1/loaded_lexicons")]
async fn get_loaded_lexicons(data: SharedState) -> impl Responder {
	let shared_data = read_state!(data);
	HttpResponse::Ok().body(shared_data.analyzer.lexicon().sources().join("\n"))
}

/// HTTP PUT endpoint `/v1/load_lexicons`
///
/// Rebuilds the analyzer from the embedded lexicon plus the named files.
#[put("/v1/load_lexicons")]
async fn put_lexicons(data: SharedState, query: web::Query<LexiconQuery>) -> impl Responder {
	let query_names = match &query.names {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty lexicon name"),
	};

	let names: Vec<String> = query_names
		.split(',')
		.map(|s| s.trim().to_owned())
		.filter(|s| !s.is_empty())
		.collect();

	let mut shared_data = match data.write() {
		Ok(guard) => guard,
		Err(_) => return HttpResponse::InternalServerError().body("State lock failed"),
	};

	let rebuilt = shared_data.config.lexicon.build_lexicon_with(&names);
	match rebuilt {
		Ok(lexicon) => {
			info!("Analyzer rebuilt with {} forms", lexicon.len());
			shared_data.analyzer = Arc::new(LexiconAnalyzer::new(lexicon));
			HttpResponse::Ok().body("Lexicons loaded successfully")
		}
		Err(e) => error_response(&e),
	}
}

/// Registers every endpoint.
fn routes(cfg: &mut web::ServiceConfig) {
	cfg.service(get_verify)
		.service(get_generated)
		.service(post_decode)
		.service(post_evaluate)
		.service(get_templates)
		.service(get_lexicons)
		.service(get_loaded_lexicons)
		.service(put_lexicons);
}

/// Main entry point for the server.
///
/// Reads the configuration (`ACCORD_CONFIG`), builds the analyzer, wraps it
/// in a `RwLock` and serves the HTTP API on `server.host:server.port`.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = AccordConfig::from_env().map_err(std::io::Error::other)?;
	let analyzer = config.lexicon.build_analyzer().map_err(std::io::Error::other)?;
	let address = (config.server.host.clone(), config.server.port);
	info!("Serving on {}:{} with {} forms", address.0, address.1, analyzer.lexicon().len());

	let shared_state = web::Data::new(RwLock::new(SharedData { config, analyzer: Arc::new(analyzer) }));

	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.wrap(Logger::default())
			.app_data(shared_state.clone())
			.configure(routes)
	})
		.bind(address)?
		.run()
		.await
}

#[cfg(test)]
mod tests {
	use std::fs;

	use actix_web::http::StatusCode;
	use actix_web::test::{self, TestRequest};
	use serde_json::json;

	use accord_core::config::LexiconSettings;
	use accord_core::verification::Verdict;

	use super::*;

	fn state(config: AccordConfig) -> SharedState {
		let analyzer = config.lexicon.build_analyzer().unwrap();
		web::Data::new(RwLock::new(SharedData { config, analyzer: Arc::new(analyzer) }))
	}

	macro_rules! app {
		($state:expr) => {
			test::init_service(App::new().app_data($state.clone()).configure(routes)).await
		};
	}

	#[actix_web::test]
	async fn verify_requires_a_sentence() {
		let state = state(AccordConfig::default());
		let app = app!(state);

		for uri in ["/v1/verify", "/v1/verify?sentence=", "/v1/verify?sentence=%20%20"] {
			let response = test::call_service(&app, TestRequest::get().uri(uri).to_request()).await;
			assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
		}

		let request = TestRequest::get().uri("/v1/verify?sentence=Le%20chat%20dort").to_request();
		let verdict: Verdict = test::call_and_read_body_json(&app, request).await;
		assert!(verdict.correct);

		let request = TestRequest::get().uri("/v1/verify?sentence=La%20chat").to_request();
		let verdict: Verdict = test::call_and_read_body_json(&app, request).await;
		assert!(!verdict.correct);
	}

	#[actix_web::test]
	async fn generate_unknown_template_is_not_found() {
		let state = state(AccordConfig::default());
		let app = app!(state);

		let request = TestRequest::get().uri("/v1/generate?template=XYZ").to_request();
		assert_eq!(test::call_service(&app, request).await.status(), StatusCode::NOT_FOUND);

		let request = TestRequest::get().uri("/v1/generate?template=SN&limit=2").to_request();
		let body = test::call_and_read_body(&app, request).await;
		assert_eq!(String::from_utf8_lossy(&body).lines().count(), 2);
	}

	#[actix_web::test]
	async fn decode_rejects_bad_requests() {
		let state = state(AccordConfig::default());
		let app = app!(state);

		let mismatch = json!({ "vocabulary": ["Le", "chat"], "scores": [0.5] });
		let request = TestRequest::post().uri("/v1/decode").set_json(mismatch).to_request();
		assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);

		let too_long = json!({ "vocabulary": ["chat"], "scores": [1.0], "beam_width": 1, "max_length": 3000 });
		let request = TestRequest::post().uri("/v1/decode").set_json(too_long).to_request();
		assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);

		let too_wide = json!({ "vocabulary": ["chat"], "scores": [1.0], "beam_width": 1000 });
		let request = TestRequest::post().uri("/v1/decode").set_json(too_wide).to_request();
		assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);

		let valid = json!({ "vocabulary": ["La", "chat", "souris"], "scores": [0.9, 0.5, 0.4], "beam_width": 2, "max_length": 2 });
		let request = TestRequest::post().uri("/v1/decode").set_json(valid).to_request();
		assert_eq!(test::call_service(&app, request).await.status(), StatusCode::OK);
	}

	#[actix_web::test]
	async fn load_lexicons_rebuilds_the_analyzer() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("extra.tsv"), "licorne\tlicorne\tnc\tfs\n").unwrap();
		let mut config = AccordConfig::default();
		config.lexicon = LexiconSettings { dict_path: dir.path().to_path_buf(), cache: false, ..LexiconSettings::default() };
		let state = state(config);
		let app = app!(state);

		let request = TestRequest::put().uri("/v1/load_lexicons").to_request();
		assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);

		let request = TestRequest::put().uri("/v1/load_lexicons?names=%2Fetc%2Fpasswd").to_request();
		assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);

		let request = TestRequest::put().uri("/v1/load_lexicons?names=..%2Fextra.tsv").to_request();
		assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);

		let request = TestRequest::put().uri("/v1/load_lexicons?names=extra.tsv").to_request();
		assert_eq!(test::call_service(&app, request).await.status(), StatusCode::OK);

		let request = TestRequest::get().uri("/v1/loaded_lexicons").to_request();
		let body = test::call_and_read_body(&app, request).await;
		assert_eq!(String::from_utf8_lossy(&body), "builtin\nextra");

		let request = TestRequest::get().uri("/v1/lexicons").to_request();
		let body = test::call_and_read_body(&app, request).await;
		assert_eq!(String::from_utf8_lossy(&body), "extra.tsv");
	}
}
