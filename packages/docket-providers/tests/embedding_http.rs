//! Provider wire behavior against a local stub embedding server.

use std::{
	future::IntoFuture,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing};
use serde_json::Value;
use tokio::{
	net::TcpListener,
	sync::{oneshot, oneshot::Sender},
};

use docket_config::EmbeddingProviderConfig;
use docket_providers::embedding;

const DIM: usize = 4;

#[derive(Clone)]
struct EmbedState {
	requests: Arc<AtomicUsize>,
	fail: bool,
}

async fn embed_handler(
	State(state): State<EmbedState>,
	Json(body): Json<Value>,
) -> impl IntoResponse {
	state.requests.fetch_add(1, Ordering::SeqCst);

	if state.fail {
		return (StatusCode::SERVICE_UNAVAILABLE, Json(Value::Null));
	}

	let count = body
		.get("input")
		.and_then(|input| input.as_array())
		.map(|input| input.len())
		.unwrap_or_default();
	// Reversed indexes exercise the client-side reordering.
	let data = (0..count)
		.rev()
		.map(|index| {
			serde_json::json!({
				"index": index,
				"embedding": vec![index as f32; DIM],
			})
		})
		.collect::<Vec<_>>();

	(StatusCode::OK, Json(serde_json::json!({ "data": data })))
}

async fn start_embed_server(fail: bool) -> (String, Arc<AtomicUsize>, Sender<()>) {
	let requests = Arc::new(AtomicUsize::new(0));
	let state = EmbedState { requests: requests.clone(), fail };
	let app = Router::new().route("/embeddings", routing::post(embed_handler)).with_state(state);
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind embed server.");
	let addr = listener.local_addr().expect("Failed to read embed server address.");
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}"), requests, tx)
}

fn provider_config(api_base: String) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "stub".to_string(),
		api_base,
		api_key: "test-key".to_string(),
		path: "/embeddings".to_string(),
		model: "stub-embed".to_string(),
		dimensions: DIM as u32,
		timeout_ms: 2_000,
		default_headers: serde_json::Map::new(),
	}
}

#[tokio::test]
async fn embeds_batch_in_input_order() {
	let (api_base, requests, shutdown) = start_embed_server(false).await;
	let cfg = provider_config(api_base);
	let texts =
		vec!["first".to_string(), "second".to_string(), "third".to_string()];
	let vectors = embedding::embed(&cfg, &texts).await.expect("embed failed");

	assert_eq!(vectors.len(), 3);
	assert_eq!(vectors[0], vec![0.0; DIM]);
	assert_eq!(vectors[2], vec![2.0; DIM]);
	assert_eq!(requests.load(Ordering::SeqCst), 1);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn server_error_surfaces_as_an_error() {
	let (api_base, _, shutdown) = start_embed_server(true).await;
	let cfg = provider_config(api_base);
	let texts = vec!["first".to_string()];

	assert!(embedding::embed(&cfg, &texts).await.is_err());

	let _ = shutdown.send(());
}
