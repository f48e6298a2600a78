//! Core data models used throughout vecdex.
//!
//! These types represent the chunks that flow through the ingestion
//! pipeline into the vector index, and the hits returned from queries.

use serde::{Deserialize, Serialize};

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Local,
    Remote,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Local => write!(f, "local"),
            SourceType::Remote => write!(f, "remote"),
        }
    }
}

/// Provenance metadata attached to every chunk.
///
/// `chunk_id` is zero-based and contiguous within one source document,
/// in the order the chunks were produced from that document's text.
/// The remote fields are present only for `SourceType::Remote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Origin identifier: file path or object key.
    pub source: String,
    /// Display name, the last path/key segment of `source`.
    pub file_name: String,
    /// Zero-based position within the source document.
    pub chunk_id: i64,
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_container: Option<String>,
}

/// A bounded span of a document's text plus its provenance metadata.
/// Immutable once produced by the tagger; consumed exactly once by
/// [`crate::index::VectorIndex::add`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A single ranked result from a similarity query.
///
/// `score` is a cosine distance: lower means more similar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHit {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}
