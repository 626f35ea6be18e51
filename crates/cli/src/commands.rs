//! Subcommand implementations behind the `notedex` binary.

use crate::recall::{self, RecallOptions};
use crate::server::{build_router, AppState};
use anyhow::{bail, Context, Result};
use clap::Args;
use notedex_ann::VectorIndex;
use notedex_chunk::WeightConfig;
use notedex_embed::{Embedder, OllamaEmbedder};
use notedex_indexer::watcher::VaultWatcher;
use notedex_indexer::{
    rebuild_and_stamp, reconcile_at_startup, replay_active_embeddings, IndexOutcome, Indexer,
};
use notedex_query::QueryEngine;
use notedex_store::{Store, META_DIM, META_MODEL};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

const DRAIN_WINDOW: Duration = Duration::from_secs(5);

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Path to the note vault
    #[arg(long)]
    pub vault: PathBuf,

    /// Path to the SQLite database
    #[arg(long, default_value = ".obsidian-index/obsidx.db")]
    pub db: PathBuf,

    /// Directory reserved for vector-index snapshots (the index itself is
    /// rebuilt from the database at startup)
    #[arg(long, default_value = ".obsidian-index/hnsw")]
    pub index: PathBuf,

    /// Embedding service endpoint
    #[arg(long, default_value = "http://localhost:11434")]
    pub embed_endpoint: String,

    /// Embedding model name
    #[arg(long, default_value = "nomic-embed-text")]
    pub model: String,

    /// Keep running and re-index files as they change
    #[arg(long)]
    pub watch: bool,

    /// Per-path debounce in milliseconds for watch mode
    #[arg(long, default_value_t = 500)]
    pub debounce_ms: u64,

    /// Path to the retrieval weight configuration
    #[arg(long, default_value = ".obsidian-index/weights.json")]
    pub weights: PathBuf,

    /// Physically delete soft-deleted chunks older than this many days
    /// (0 disables the vacuum)
    #[arg(long, default_value_t = 0)]
    pub vacuum_days: u64,
}

#[derive(Args, Debug)]
pub struct RebuildArgs {
    /// Path to the SQLite database
    #[arg(long, default_value = ".obsidian-index/obsidx.db")]
    pub db: PathBuf,

    /// Embedding dimension to stamp into the index metadata
    #[arg(long, default_value_t = 768)]
    pub dim: usize,

    /// Embedding model name to stamp into the index metadata
    #[arg(long, default_value = "default")]
    pub model: String,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to the SQLite database
    #[arg(long, default_value = ".obsidian-index/obsidx.db")]
    pub db: PathBuf,

    /// HTTP port to listen on
    #[arg(long, default_value_t = 8765)]
    pub port: u16,

    /// Embedding service endpoint
    #[arg(long, default_value = "http://localhost:11434")]
    pub embed_endpoint: String,

    /// Embedding model name
    #[arg(long, default_value = "nomic-embed-text")]
    pub model: String,
}

#[derive(Args, Debug)]
pub struct RecallArgs {
    /// Recall server URL
    #[arg(long, default_value = "http://localhost:8765")]
    pub server: String,

    /// Number of results to return
    #[arg(long, default_value_t = 12)]
    pub top: usize,

    /// Number of ANN candidates to retrieve before reranking
    #[arg(long, default_value_t = 200)]
    pub candidates: usize,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Query text
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,
}

#[derive(Args, Debug)]
pub struct WeightsArgs {
    /// Path to the weight configuration file
    #[arg(long, default_value = ".obsidian-index/weights.json")]
    pub config: PathBuf,

    /// Print the built-in default configuration and exit
    #[arg(long)]
    pub defaults: bool,

    /// Write the default configuration to the config path
    #[arg(long)]
    pub init: bool,
}

/// One-shot or watching vault index run.
pub async fn index(args: IndexArgs) -> Result<()> {
    // File records are keyed by path string; canonicalizing up front keeps
    // the walker and the watcher producing identical keys.
    let vault = args
        .vault
        .canonicalize()
        .with_context(|| format!("vault {} is not accessible", args.vault.display()))?;
    std::fs::create_dir_all(&args.index)
        .with_context(|| format!("create index directory {}", args.index.display()))?;

    let embedder = OllamaEmbedder::new(&args.embed_endpoint, &args.model);
    embedder.ping().await.with_context(|| {
        format!(
            "cannot reach embedding service at {} (start it with `ollama serve` and pull {})",
            args.embed_endpoint, args.model
        )
    })?;
    let probe = embedder
        .embed("dimension probe")
        .await
        .context("probe embedding failed")?;
    let dim = probe.len();
    log::info!("embedding service ready: model={} dim={dim}", args.model);

    let store = Arc::new(Mutex::new(Store::open(&args.db, dim)?));
    let ann = Arc::new(RwLock::new(VectorIndex::new(dim)));
    reconcile_at_startup(&store, &ann, dim, &args.model)?;

    if args.vacuum_days > 0 {
        let cutoff = now_unix() - (args.vacuum_days as i64) * 86_400;
        let removed = lock(&store).delete_inactive_chunks_older_than(cutoff)?;
        log::info!(
            "vacuumed {removed} inactive chunks older than {} days",
            args.vacuum_days
        );
    }

    let weights = WeightConfig::load(&args.weights)?;
    let indexer = Arc::new(Indexer::new(
        store.clone(),
        ann.clone(),
        Arc::new(embedder),
        weights,
    ));

    let stats = indexer.index_vault(&vault).await?;
    println!("{stats}");

    if args.watch {
        let watch_indexer = indexer.clone();
        let watch_root = vault.clone();
        let watcher = VaultWatcher::spawn(
            &vault,
            Duration::from_millis(args.debounce_ms),
            move |path| {
                let indexer = watch_indexer.clone();
                let vault = watch_root.clone();
                async move {
                    let shown = path
                        .strip_prefix(&vault)
                        .unwrap_or(&path)
                        .display()
                        .to_string();
                    match indexer.index_file(&path).await {
                        Ok(IndexOutcome::Indexed { chunks }) => {
                            log::info!("re-indexed {shown} ({chunks} chunks)");
                        }
                        Ok(IndexOutcome::Unchanged) => log::debug!("{shown}: unchanged"),
                        Ok(IndexOutcome::Empty) => log::debug!("{shown}: no embeddable chunks"),
                        Err(e) => log::warn!("re-indexing {shown} failed: {e}"),
                    }
                }
            },
        )?;

        log::info!(
            "watching {} for changes (ctrl-c to stop)",
            args.vault.display()
        );
        tokio::signal::ctrl_c().await?;
        watcher.shutdown().await;
        log::info!("watcher stopped");
    }

    Ok(())
}

/// Rebuild the vector index from the database and stamp fresh metadata.
pub fn rebuild(args: RebuildArgs) -> Result<()> {
    let store = Arc::new(Mutex::new(Store::open(&args.db, args.dim)?));
    let ann = Arc::new(RwLock::new(VectorIndex::new(args.dim)));
    let vectors = rebuild_and_stamp(&store, &ann, args.dim, &args.model)?;
    println!("rebuild complete: {vectors} vectors");
    Ok(())
}

/// Run the search HTTP server until ctrl-c, then drain for a bounded window.
pub async fn serve(args: ServeArgs) -> Result<()> {
    let store = Store::open(&args.db, 0)?;
    let Some(dim) = store.index_meta_usize(META_DIM)?.filter(|&d| d > 0) else {
        bail!(
            "no indexed data found in {}; run `notedex index` first",
            args.db.display()
        );
    };
    let stored_model = store.index_meta(META_MODEL)?.unwrap_or_default();
    log::info!("index metadata: dim={dim} model={stored_model}");

    let embedder = OllamaEmbedder::new(&args.embed_endpoint, &args.model);
    embedder.ping().await.with_context(|| {
        format!(
            "cannot reach embedding service at {}",
            args.embed_endpoint
        )
    })?;

    let store = Arc::new(Mutex::new(store));
    let ann = Arc::new(RwLock::new(VectorIndex::new(dim)));
    let vectors = replay_active_embeddings(&store, &ann)?;
    log::info!("loaded {vectors} vectors into the index");

    let state = Arc::new(AppState {
        engine: QueryEngine::new(store, ann, Arc::new(embedder)),
        db_path: args.db.display().to_string(),
    });
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    log::info!("recall server listening on http://{addr}");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(DRAIN_WINDOW, server).await {
        Ok(joined) => joined.context("server task")?.context("server error")?,
        Err(_) => log::warn!("drain window elapsed; exiting with connections open"),
    }

    Ok(())
}

/// Query a running recall server.
pub async fn recall_query(args: RecallArgs) -> Result<()> {
    let query = args.query.join(" ");
    recall::run(
        &query,
        &RecallOptions {
            server: args.server,
            top_n: args.top,
            candidate_k: args.candidates,
            json: args.json,
        },
    )
    .await
}

/// Show, dump or initialise the weight configuration.
pub fn weights(args: WeightsArgs) -> Result<()> {
    if args.defaults {
        println!("{}", serde_json::to_string_pretty(&WeightConfig::default())?);
        return Ok(());
    }

    if args.init {
        if args.config.exists() {
            bail!(
                "config file already exists: {} (remove it to reinitialise)",
                args.config.display()
            );
        }
        WeightConfig::default().save(&args.config)?;
        println!("created weight configuration: {}", args.config.display());
        return Ok(());
    }

    if !args.config.exists() {
        println!(
            "# using default weights (no config file at {}; run with --init to create it)",
            args.config.display()
        );
    }
    let config = WeightConfig::load(&args.config)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
