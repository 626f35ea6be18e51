//! JSON wire types shared by the search server and the recall client.

use notedex_query::{SearchHit, Timing};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub top_n: usize,
    #[serde(default)]
    pub candidate_k: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ResultItem>,
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultItem {
    pub score: f32,
    pub path: String,
    pub heading_path: String,
    pub status: String,
    pub scope: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub category_weight: f32,
    pub tags: Vec<String>,
}

impl From<SearchHit> for ResultItem {
    fn from(hit: SearchHit) -> Self {
        let chunk = hit.chunk;
        Self {
            score: hit.score,
            path: chunk.path,
            heading_path: chunk.heading_path,
            status: chunk.status,
            scope: chunk.scope,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            content: chunk.content,
            category_weight: chunk.category_weight,
            tags: chunk.tags,
        }
    }
}
