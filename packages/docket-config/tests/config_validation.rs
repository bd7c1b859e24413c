use docket_config::{Config, validate};

const BASE: &str = r#"
[service]
log_level = "info"

[storage.postgres]
dsn = "postgres://localhost/docket"
pool_max_conns = 8

[storage.qdrant]
url = "http://localhost:6334"
collection = "docket_records"
vector_dim = 1536

[providers.embedding]
provider_id = "openai"
api_base = "https://api.openai.com/v1"
api_key = "test-key"
path = "/embeddings"
model = "text-embedding-3-small"
dimensions = 1536
timeout_ms = 10000
default_headers = {}
"#;

fn parse(raw: &str) -> Config {
	toml::from_str(raw).expect("Failed to parse test config.")
}

#[test]
fn base_config_is_valid() {
	let cfg = parse(BASE);

	assert!(validate(&cfg).is_ok());
	assert_eq!(cfg.search.default_limit, 10);
	assert_eq!(cfg.search.large_query_limit, 50);
	assert_eq!(cfg.search.cache.ttl_minutes, 60);
	assert_eq!(cfg.sync.batch_size, 50);
	assert_eq!(cfg.sync.max_retries, 3);
	assert_eq!(cfg.retrieval.top_sources, 10);
}

#[test]
fn rejects_dimension_mismatch() {
	let raw = BASE.replace("dimensions = 1536", "dimensions = 768");
	let cfg = parse(&raw);
	let err = validate(&cfg).expect_err("Expected validation error.");

	assert_eq!(
		err.to_string(),
		"providers.embedding.dimensions must match storage.qdrant.vector_dim."
	);
}

#[test]
fn rejects_empty_api_key() {
	let raw = BASE.replace(r#"api_key = "test-key""#, r#"api_key = " ""#);
	let cfg = parse(&raw);
	let err = validate(&cfg).expect_err("Expected validation error.");

	assert_eq!(err.to_string(), "providers.embedding.api_key must be non-empty.");
}

#[test]
fn rejects_out_of_range_threshold() {
	let raw = format!("{BASE}\n[search]\ndefault_threshold = 1.5\n");
	let cfg = parse(&raw);
	let err = validate(&cfg).expect_err("Expected validation error.");

	assert_eq!(err.to_string(), "search.default_threshold must be in the range 0.0-1.0.");
}

#[test]
fn rejects_zero_batch_size() {
	let raw = format!("{BASE}\n[sync]\nbatch_size = 0\n");
	let cfg = parse(&raw);
	let err = validate(&cfg).expect_err("Expected validation error.");

	assert_eq!(err.to_string(), "sync.batch_size must be greater than zero.");
}

#[test]
fn rejects_nonpositive_cache_ttl() {
	let raw = format!("{BASE}\n[search.cache]\nttl_minutes = 0\n");
	let cfg = parse(&raw);
	let err = validate(&cfg).expect_err("Expected validation error.");

	assert_eq!(err.to_string(), "search.cache.ttl_minutes must be greater than zero.");
}

#[test]
fn normalizes_blank_log_level_on_load() {
	let raw = BASE.replace(r#"log_level = "info""#, r#"log_level = "  ""#);
	let dir = std::env::temp_dir().join(format!("docket-config-{}", std::process::id()));

	std::fs::create_dir_all(&dir).expect("Failed to create temp dir.");

	let path = dir.join("docket.toml");

	std::fs::write(&path, raw).expect("Failed to write temp config.");

	let cfg = docket_config::load(&path).expect("Failed to load config.");

	assert_eq!(cfg.service.log_level, "info");

	let _ = std::fs::remove_file(&path);
}
