// Query service module
// Embeds free-text queries and retrieves nearest records from the store


use std::io::{BufRead, Write};

use console::style;
use tracing::debug;

use crate::database::lancedb::vector_store::VectorStore;
use crate::database::lancedb::{SOURCE_ID_KEY, SearchHit};
use crate::embeddings::Embedder;
use crate::{CsvSearchError, Result};

/// Nearest-neighbor lookup over one collection, using the same embedder the
/// collection was ingested with.
pub struct SearchService<E> {
    store: VectorStore,
    embedder: E,
}

impl<E: Embedder> SearchService<E> {
    #[inline]
    pub fn new(store: VectorStore, embedder: E) -> Self {
        Self { store, embedder }
    }

    /// Top-`k` records nearest to `query`, optionally restricted to one
    /// ingestion source. Ranked ascending by distance; an empty store or a
    /// query matching nothing yields an empty vec, not an error.
    #[inline]
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        source: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        debug!("Searching top {} for query (length {})", k, query.len());

        let query_texts = [query.to_string()];
        let vectors = self.embedder.embed(&query_texts)?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            CsvSearchError::Embedding("Model returned no vector for the query".to_string())
        })?;

        self.store.search(&vector, k, source).await
    }
}

/// True when a shell input line terminates the loop: blank input or a
/// case-insensitive `exit`/`quit`.
#[inline]
pub fn is_shell_terminator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit")
}

/// Print one ranked hit the way the shell and the one-shot command share.
#[inline]
pub fn render_hit(rank: usize, hit: &SearchHit) {
    let source_id = hit
        .metadata
        .get(SOURCE_ID_KEY)
        .map_or("n/a", String::as_str);

    println!("{}", style(format!("#{rank}")).bold().cyan());
    println!("  Record: {}", style(source_id).cyan());
    println!("  Source: {}", hit.source);
    for line in hit.document.lines() {
        println!("  {}", line);
    }
    println!("  Distance: {}", style(format!("{:.4}", hit.distance)).dim());
}

#[inline]
pub fn render_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No matching records.");
        return;
    }

    for (index, hit) in hits.iter().enumerate() {
        render_hit(index + 1, hit);
    }
}

/// Interactive query loop: prompt, read a line, search, render. Blank input
/// or `exit`/`quit` ends the loop. A failed query is reported and the loop
/// continues to the next prompt; it never takes the process down.
#[inline]
pub async fn run_shell<E: Embedder + Sync>(
    service: &SearchService<E>,
    k: usize,
    source: Option<&str>,
) -> Result<()> {
    println!(
        "Type a question and press enter ({} to leave).",
        style("blank, exit, or quit").dim()
    );

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("{} ", style("query>").bold().green());
        stdout.flush()?;

        let mut line = String::new();
        let bytes_read = stdin.lock().read_line(&mut line)?;
        if bytes_read == 0 {
            // EOF behaves like an explicit exit.
            break;
        }

        if is_shell_terminator(&line) {
            break;
        }

        match service.search(line.trim(), k, source).await {
            Ok(hits) => render_hits(&hits),
            Err(e) => {
                eprintln!("{} {}", style("Search failed:").red(), e);
            }
        }
    }

    println!("Bye.");
    Ok(())
}
