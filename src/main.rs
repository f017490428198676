use std::path::PathBuf;

use clap::{Parser, Subcommand};
use csv_semsearch::Result;
use csv_semsearch::commands::{configure, ingest, search, shell, show_status};
use csv_semsearch::config::{Config, get_config_dir};

#[derive(Parser)]
#[command(name = "csv-semsearch")]
#[command(about = "Load CSV records into a local vector database and query them semantically")]
#[command(version)]
struct Cli {
    /// Directory holding the configuration and vector database (defaults to
    /// the platform config dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the Ollama connection and ingestion settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load a CSV file into a collection
    Ingest {
        /// Path to the CSV file (UTF-8, header row required)
        csv: PathBuf,
        /// Target collection (defaults to the configured default)
        #[arg(long)]
        collection: Option<String>,
        /// Column schema profile to resolve headers against
        #[arg(long, default_value = "qa")]
        profile: String,
        /// Source tag stored on every record (defaults to the file stem)
        #[arg(long)]
        source: Option<String>,
    },
    /// Run one semantic query and print the ranked results
    Search {
        /// Free-text query
        query: String,
        /// Number of results to return
        #[arg(short, long, default_value_t = 3)]
        k: usize,
        /// Collection to query (defaults to the configured default)
        #[arg(long)]
        collection: Option<String>,
        /// Only return records ingested with this source tag
        #[arg(long)]
        source: Option<String>,
    },
    /// Interactive query loop (blank line, exit, or quit to leave)
    Shell {
        /// Number of results per query
        #[arg(short, long, default_value_t = 1)]
        k: usize,
        /// Collection to query (defaults to the configured default)
        #[arg(long)]
        collection: Option<String>,
        /// Only return records ingested with this source tag
        #[arg(long)]
        source: Option<String>,
    },
    /// Show status of the configuration, embedding model, and vector store
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.data_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| csv_semsearch::CsvSearchError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Config { show } => {
            configure(&config_dir, show)?;
        }
        Commands::Ingest {
            csv,
            collection,
            profile,
            source,
        } => {
            let config = Config::load_from(&config_dir)?;
            ingest(&config, csv, collection, &profile, source).await?;
        }
        Commands::Search {
            query,
            k,
            collection,
            source,
        } => {
            let config = Config::load_from(&config_dir)?;
            search(&config, &query, k, collection, source).await?;
        }
        Commands::Shell {
            k,
            collection,
            source,
        } => {
            let config = Config::load_from(&config_dir)?;
            shell(&config, k, collection, source).await?;
        }
        Commands::Status => {
            let config = Config::load_from(&config_dir)?;
            show_status(&config).await?;
        }
    }

    Ok(())
}
