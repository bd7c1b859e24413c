pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Embedding provider unavailable: {message}")]
	EmbeddingUnavailable { message: String },
	#[error("Search backend {backend} unavailable: {message}")]
	BackendUnavailable { backend: &'static str, message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Sync apply failed: {message}")]
	SyncApplyFailed { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Vector index error: {message}")]
	Qdrant { message: String },
}
impl From<docket_storage::Error> for Error {
	fn from(err: docket_storage::Error) -> Self {
		match err {
			docket_storage::Error::Qdrant(err) => Self::Qdrant { message: err.to_string() },
			err => Self::Storage { message: err.to_string() },
		}
	}
}
