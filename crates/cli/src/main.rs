use clap::{Parser, Subcommand};
use notedex_cli::commands::{self, IndexArgs, RebuildArgs, RecallArgs, ServeArgs, WeightsArgs};

#[derive(Parser)]
#[command(name = "notedex")]
#[command(about = "Semantic search over a Markdown note vault", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a vault into the durable store, optionally watching for changes
    Index(IndexArgs),

    /// Rebuild the vector index from the database and restamp its metadata
    Rebuild(RebuildArgs),

    /// Serve semantic search over HTTP
    Server(ServeArgs),

    /// Query a running search server
    Recall(RecallArgs),

    /// Show or initialise the retrieval weight configuration
    Weights(WeightsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    match cli.command {
        Commands::Index(args) => commands::index(args).await,
        Commands::Rebuild(args) => commands::rebuild(args),
        Commands::Server(args) => commands::serve(args).await,
        Commands::Recall(args) => commands::recall_query(args).await,
        Commands::Weights(args) => commands::weights(args),
    }
}
