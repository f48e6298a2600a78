//! Provenance tagging.
//!
//! Turns the raw text pieces produced by the chunker into [`DocChunk`]s
//! carrying a uniform metadata record regardless of origin. Pure: no I/O,
//! deterministic given identical inputs.

use crate::models::{ChunkMetadata, DocChunk, SourceType};

/// Where a document was enumerated from, with the remote coordinates
/// needed for traceability back to object storage.
#[derive(Debug, Clone)]
pub enum Origin {
    Local,
    Remote { container: String, key: String },
}

impl Origin {
    pub fn source_type(&self) -> SourceType {
        match self {
            Origin::Local => SourceType::Local,
            Origin::Remote { .. } => SourceType::Remote,
        }
    }
}

/// Attach provenance metadata to a document's chunks.
///
/// `chunk_id` is the zero-based index within `pieces`, so ids for one
/// source are contiguous and reflect production order. `file_name` is
/// the last path/key segment of `source_identity`.
pub fn tag_chunks(pieces: Vec<String>, source_identity: &str, origin: &Origin) -> Vec<DocChunk> {
    let file_name = file_name_of(source_identity);

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let (remote_key, remote_container) = match origin {
                Origin::Local => (None, None),
                Origin::Remote { container, key } => {
                    (Some(key.clone()), Some(container.clone()))
                }
            };
            DocChunk {
                text,
                metadata: ChunkMetadata {
                    source: source_identity.to_string(),
                    file_name: file_name.clone(),
                    chunk_id: i as i64,
                    source_type: origin.source_type(),
                    remote_key,
                    remote_container,
                },
            }
        })
        .collect()
}

fn file_name_of(source_identity: &str) -> String {
    source_identity
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_identity)
        .to_string()
}
