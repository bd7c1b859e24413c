use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use docket_config::Config;
use docket_service::{
	adapters::{DefaultEmbedding, PgRecordStore, QdrantIndex},
	retrieval::RetrievalService,
	search::{SearchOptions, SearchRouter},
	sync::SyncService,
	usage::UsageTracker,
};
use docket_storage::{cache::MemoryCache, db::Db, qdrant::QdrantStore};

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE", global = true, default_value = "docket.toml")]
	pub config: std::path::PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Run the synchronization worker.
	Run,
	/// Execute a single semantic search and print the response as JSON.
	Search {
		query: String,
		#[arg(long)]
		limit: Option<u32>,
		#[arg(long)]
		threshold: Option<f32>,
		#[arg(long)]
		text_query: Option<String>,
		#[arg(long)]
		entity_type: Option<String>,
		#[arg(long)]
		case_id: Option<Uuid>,
		#[arg(long)]
		content_type: Option<String>,
	},
	/// Gather retrieval context for a query and print it as JSON.
	Retrieve {
		query: String,
		#[arg(long)]
		user_id: Option<Uuid>,
		#[arg(long)]
		case_id: Option<Uuid>,
	},
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = Arc::new(docket_config::load(&args.config)?);
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.storage.qdrant.vector_dim).await?;

	let qdrant = QdrantStore::new(&config.storage.qdrant)?;

	qdrant.ensure_collection().await?;
	tracing::info!(
		collection = %config.storage.qdrant.collection,
		vector_dim = config.storage.qdrant.vector_dim,
		"Storage ready."
	);

	match args.command {
		Command::Run => run_sync(config, db, qdrant).await,
		Command::Search { query, limit, threshold, text_query, entity_type, case_id, content_type } => {
			let opts = SearchOptions {
				limit: limit.unwrap_or(config.search.default_limit),
				threshold: threshold.unwrap_or(config.search.default_threshold),
				text_query,
				entity_type,
				case_id,
				content_type,
				use_cache: false,
			};
			let router = build_router(config, db, qdrant);
			let response = router.search(&query, &opts).await?;

			println!("{}", serde_json::to_string_pretty(&response)?);

			Ok(())
		},
		Command::Retrieve { query, user_id, case_id } => {
			let usage = UsageTracker::spawn(db.clone());
			let retrieval = RetrievalService::new(config, db, usage);
			let context = retrieval.retrieve(&query, user_id, case_id).await?;

			println!("{}", serde_json::to_string_pretty(&context)?);

			Ok(())
		},
	}
}

async fn run_sync(config: Arc<Config>, db: Db, qdrant: QdrantStore) -> color_eyre::Result<()> {
	let cache = Arc::new(MemoryCache::new());
	let store = Arc::new(PgRecordStore::new(db, config.clone()));
	let index = Arc::new(QdrantIndex::new(qdrant));
	let sync = Arc::new(SyncService::new(config, store, index, cache));

	sync.run().await;

	Ok(())
}

fn build_router(config: Arc<Config>, db: Db, qdrant: QdrantStore) -> SearchRouter {
	SearchRouter::new(
		config.clone(),
		Arc::new(MemoryCache::new()),
		Arc::new(DefaultEmbedding),
		Arc::new(PgRecordStore::new(db, config)),
		Arc::new(QdrantIndex::new(qdrant)),
	)
}
