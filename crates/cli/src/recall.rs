//! Client side of the recall loop: POST the query to a running search server
//! and print the results.

use crate::api::{ResultItem, SearchRequest, SearchResponse};
use anyhow::{bail, Context, Result};
use std::time::Duration;

pub struct RecallOptions {
    pub server: String,
    pub top_n: usize,
    pub candidate_k: usize,
    pub json: bool,
}

pub async fn run(query: &str, options: &RecallOptions) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .context("build http client")?;

    let url = format!("{}/search", options.server.trim_end_matches('/'));
    let response = client
        .post(&url)
        .json(&SearchRequest {
            query: query.to_string(),
            top_n: options.top_n,
            candidate_k: options.candidate_k,
        })
        .send()
        .await
        .with_context(|| format!("connect to recall server at {}", options.server))?;

    let body: SearchResponse = response
        .json()
        .await
        .context("parse server response")?;

    if let Some(error) = body.error {
        bail!("server error: {error}");
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&body.results)?);
    } else {
        print_results(query, &body);
    }
    Ok(())
}

fn print_results(query: &str, body: &SearchResponse) {
    let t = &body.timing;
    println!("query: {query:?}");
    println!(
        "total {}ms (embed:{}ms, search:{}ms, fetch:{}ms, rerank:{}ms)",
        t.total_ms, t.embed_ms, t.search_ms, t.fetch_ms, t.rerank_ms
    );
    println!("\nfound {} results:\n", body.results.len());

    for (i, item) in body.results.iter().enumerate() {
        println!("─────────────────────────────────────────────");
        println!("[{}] score: {:.4}", i + 1, item.score);
        println!("path: {}", item.path);
        if !item.heading_path.is_empty() {
            println!("section: {}", item.heading_path);
        }
        if !item.scope.is_empty() {
            println!("scope: {}", item.scope);
        }
        if !item.status.is_empty() && item.status != "active" {
            println!("status: {}", item.status);
        }
        println!("lines: {}-{}", item.start_line, item.end_line);
        println!("\n{}\n", excerpt(item, 300));
    }
    println!("─────────────────────────────────────────────");
}

fn excerpt(item: &ResultItem, max_chars: usize) -> String {
    let content = item.content.as_str();
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars).collect();
    format!("{truncated}...")
}
