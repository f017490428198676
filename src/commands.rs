use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{error, info};

use crate::config::Config;
use crate::database::lancedb::vector_store::VectorStore;
use crate::embeddings::OllamaClient;
use crate::ingest::{IngestOptions, run_ingestion};
use crate::schema::SchemaProfile;
use crate::search::{SearchService, render_hits, run_shell};

/// Load a CSV file into a vector store collection
#[inline]
pub async fn ingest(
    config: &Config,
    csv_path: PathBuf,
    collection: Option<String>,
    profile_name: &str,
    source: Option<String>,
) -> Result<()> {
    let profile = SchemaProfile::by_name(profile_name).ok_or_else(|| {
        anyhow!(
            "Unknown schema profile '{}'; available: {}",
            profile_name,
            SchemaProfile::names().join(", ")
        )
    })?;

    let collection = collection.unwrap_or_else(|| config.ingest.default_collection.clone());

    // The source tag defaults to the file stem, e.g. people.csv -> "people".
    let source = source.unwrap_or_else(|| {
        csv_path
            .file_stem()
            .map_or_else(|| "csv".to_string(), |s| s.to_string_lossy().into_owned())
    });

    info!(
        "Ingesting {} into collection '{}' with profile '{}'",
        csv_path.display(),
        collection,
        profile.name
    );

    let client = OllamaClient::new(config).context("Failed to create Ollama client")?;
    client.health_check().with_context(|| {
        format!(
            "Ollama is not reachable at {}:{}; run 'csv-semsearch config' to update the connection",
            config.ollama.host, config.ollama.port
        )
    })?;

    let options = IngestOptions {
        csv_path,
        collection,
        profile,
        source,
    };

    let report = run_ingestion(config, &options, &client).await?;

    println!(
        "Ingested {} records from {} into '{}'.",
        report.records_upserted,
        options.csv_path.display(),
        report.collection
    );
    println!(
        "  Skipped rows: {}  Batches: {}  Source tag: {}",
        report.rows_skipped, report.batches, report.source
    );
    println!("  Columns: {}", report.schema_summary);

    Ok(())
}

/// Run a single semantic query and print the ranked results
#[inline]
pub async fn search(
    config: &Config,
    query: &str,
    k: usize,
    collection: Option<String>,
    source: Option<String>,
) -> Result<()> {
    let service = build_search_service(config, collection).await?;

    let hits = service.search(query, k, source.as_deref()).await?;
    render_hits(&hits);

    Ok(())
}

/// Start the interactive query shell
#[inline]
pub async fn shell(
    config: &Config,
    k: usize,
    collection: Option<String>,
    source: Option<String>,
) -> Result<()> {
    let service = build_search_service(config, collection).await?;
    run_shell(&service, k, source.as_deref()).await?;
    Ok(())
}

async fn build_search_service(
    config: &Config,
    collection: Option<String>,
) -> Result<SearchService<OllamaClient>> {
    let collection = collection.unwrap_or_else(|| config.ingest.default_collection.clone());

    let store = VectorStore::new(config, &collection)
        .await
        .context("Failed to initialize vector store")?;

    let client = OllamaClient::new(config).context("Failed to create Ollama client")?;

    Ok(SearchService::new(store, client))
}

/// Show status of the configuration, embedding model, and vector store
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 csv-semsearch Status");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
                println!("   🔢 Batch Size: {}", config.ollama.batch_size);
            }
            Err(e) => {
                println!("   ⚠️  Ollama: Connected but unhealthy - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Failed to connect - {}", e);
        }
    }

    println!();
    println!("🔍 Vector Database Status:");
    match VectorStore::list_collections(config).await {
        Ok(collections) if collections.is_empty() => {
            println!("   📭 No collections yet");
            println!("   Use 'csv-semsearch ingest <file.csv>' to load one.");
        }
        Ok(collections) => {
            println!("   ✅ LanceDB: Connected ({} collections)", collections.len());
            for name in collections {
                match VectorStore::new(config, &name).await {
                    Ok(store) => match store.count_records().await {
                        Ok(count) => println!("   📚 {}: {} records", name, count),
                        Err(e) => println!("   📚 {}: count failed - {}", name, e),
                    },
                    Err(e) => {
                        error!("Failed to open collection {}: {}", name, e);
                        println!("   📚 {}: unavailable - {}", name, e);
                    }
                }
            }
        }
        Err(e) => {
            println!("   ❌ LanceDB: Failed to connect - {}", e);
        }
    }

    println!();
    println!("⚙️  Configuration:");
    println!("   📁 Data directory: {}", config.get_base_dir().display());
    println!(
        "   📦 Default collection: {}",
        config.ingest.default_collection
    );
    println!(
        "   🔢 Upsert batch size: {}",
        config.ingest.upsert_batch_size
    );

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'csv-semsearch ingest <file.csv>' to load records");
    println!("   • Use 'csv-semsearch search <query>' for a one-shot lookup");
    println!("   • Use 'csv-semsearch shell' for an interactive session");

    Ok(())
}

/// Run the interactive configuration flow, or print the current settings
#[inline]
pub fn configure(config_dir: &Path, show: bool) -> Result<()> {
    if show {
        crate::config::show_config(config_dir)
    } else {
        crate::config::run_interactive_config(config_dir)
    }
}
