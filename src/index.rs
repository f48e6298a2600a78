//! Persistent vector index.
//!
//! An index is two co-located files under the index directory:
//!
//! - `<name>.vec` — bincode: a header recording the format version and
//!   the embedding identity (model name + dimensionality), followed by
//!   the embedding vectors.
//! - `<name>.docstore` — JSON array of the chunks, parallel to the
//!   vectors by position.
//!
//! Both files must be present and mutually consistent to load; anything
//! else is treated as no index. Saves go through a temp file and an
//! atomic rename so a crash mid-write never corrupts an existing index.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::embedding::cosine_similarity;
use crate::models::{DocChunk, QueryHit};

const FORMAT_VERSION: u32 = 1;
const VECTORS_EXT: &str = "vec";
const DOCSTORE_EXT: &str = "docstore";

#[derive(Serialize, Deserialize)]
struct VectorsFile {
    format_version: u32,
    model: String,
    dims: usize,
    vectors: Vec<Vec<f32>>,
}

/// An in-memory index bound to its on-disk location. Vectors and chunks
/// are parallel arrays; position i of one corresponds to position i of
/// the other.
#[derive(Debug)]
pub struct VectorIndex {
    dir: PathBuf,
    name: String,
    model: String,
    dims: usize,
    dedup_sources: bool,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<DocChunk>,
}

impl VectorIndex {
    /// Load the index at `dir`/`name` if both files exist, otherwise
    /// start a fresh empty index there. A loaded index must carry the
    /// same embedding identity as the one requested.
    pub fn open_or_create(
        dir: &Path,
        name: &str,
        model: &str,
        dims: usize,
        dedup_sources: bool,
    ) -> Result<VectorIndex> {
        let vec_path = index_file(dir, name, VECTORS_EXT);
        let doc_path = index_file(dir, name, DOCSTORE_EXT);

        if vec_path.exists() && doc_path.exists() {
            let mut index = Self::load(dir, name, model, dims)?;
            index.dedup_sources = dedup_sources;
            println!(
                "Loaded existing index '{}' ({} vectors)",
                name,
                index.len()
            );
            return Ok(index);
        }

        if vec_path.exists() || doc_path.exists() {
            println!(
                "Index '{}' is incomplete on disk (one of two files present); starting fresh",
                name
            );
        }

        Ok(VectorIndex {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            model: model.to_string(),
            dims,
            dedup_sources,
            vectors: Vec::new(),
            chunks: Vec::new(),
        })
    }

    /// Load an existing index, failing if either file is missing, the
    /// files disagree with each other, or the stored embedding identity
    /// does not match `model`/`dims`.
    pub fn load(dir: &Path, name: &str, model: &str, dims: usize) -> Result<VectorIndex> {
        let vec_path = index_file(dir, name, VECTORS_EXT);
        let doc_path = index_file(dir, name, DOCSTORE_EXT);

        if !vec_path.exists() || !doc_path.exists() {
            bail!(
                "Index '{}' not found at {} (need both .{} and .{} files)",
                name,
                dir.display(),
                VECTORS_EXT,
                DOCSTORE_EXT
            );
        }

        let vec_bytes = std::fs::read(&vec_path)
            .with_context(|| format!("Failed to read {}", vec_path.display()))?;
        let vectors_file: VectorsFile = bincode::deserialize(&vec_bytes)
            .with_context(|| format!("Failed to decode {}", vec_path.display()))?;

        if vectors_file.format_version != FORMAT_VERSION {
            bail!(
                "Index '{}' has format version {} but this build reads version {}",
                name,
                vectors_file.format_version,
                FORMAT_VERSION
            );
        }
        if vectors_file.model != model || vectors_file.dims != dims {
            bail!(
                "Index '{}' was built with embedding {}/{} dims but the configured embedding is {}/{} dims",
                name,
                vectors_file.model,
                vectors_file.dims,
                model,
                dims
            );
        }

        let doc_bytes = std::fs::read(&doc_path)
            .with_context(|| format!("Failed to read {}", doc_path.display()))?;
        let chunks: Vec<DocChunk> = serde_json::from_slice(&doc_bytes)
            .with_context(|| format!("Failed to parse {}", doc_path.display()))?;

        if chunks.len() != vectors_file.vectors.len() {
            bail!(
                "Index '{}' is inconsistent: {} vectors but {} chunks",
                name,
                vectors_file.vectors.len(),
                chunks.len()
            );
        }

        Ok(VectorIndex {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            model: vectors_file.model,
            dims: vectors_file.dims,
            dedup_sources: false,
            vectors: vectors_file.vectors,
            chunks,
        })
    }

    /// Append `chunks` with their `vectors` to the index. The two slices
    /// must be parallel and every vector must match the index
    /// dimensionality; on any error nothing is added.
    pub fn add(&mut self, chunks: Vec<DocChunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if chunks.is_empty() {
            bail!("No chunks to add");
        }
        if chunks.len() != vectors.len() {
            bail!(
                "Chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }
        for v in &vectors {
            if v.len() != self.dims {
                bail!(
                    "Vector has {} dims but index expects {}",
                    v.len(),
                    self.dims
                );
            }
        }

        if self.dedup_sources {
            let existing: HashSet<String> = self
                .chunks
                .iter()
                .map(|c| c.metadata.source.clone())
                .collect();
            let mut skipped = 0usize;
            for (chunk, vector) in chunks.into_iter().zip(vectors) {
                if existing.contains(chunk.metadata.source.as_str()) {
                    skipped += 1;
                    continue;
                }
                self.chunks.push(chunk);
                self.vectors.push(vector);
            }
            if skipped > 0 {
                println!("Skipped {} chunk(s) from already-indexed sources", skipped);
            }
        } else {
            self.chunks.extend(chunks);
            self.vectors.extend(vectors);
        }

        Ok(())
    }

    /// Persist both files. Each is written to a sibling temp file and
    /// renamed into place, so a reader never sees a torn file. The two
    /// renames themselves are not atomic together: a crash between them
    /// can publish a new `.vec` with the old `.docstore`. `load` rejects
    /// such a pair through the count-parity check whenever the vector
    /// and chunk counts differ.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create index dir {}", self.dir.display()))?;

        let vectors_file = VectorsFile {
            format_version: FORMAT_VERSION,
            model: self.model.clone(),
            dims: self.dims,
            vectors: self.vectors.clone(),
        };
        let vec_bytes = bincode::serialize(&vectors_file).context("Failed to encode vectors")?;
        write_atomic(&index_file(&self.dir, &self.name, VECTORS_EXT), &vec_bytes)?;

        let doc_bytes = serde_json::to_vec(&self.chunks).context("Failed to encode docstore")?;
        write_atomic(&index_file(&self.dir, &self.name, DOCSTORE_EXT), &doc_bytes)?;

        Ok(())
    }

    /// Return the `k` nearest chunks to `query_vector` by cosine
    /// distance (1 − cosine similarity), ascending. Fewer than `k`
    /// results when the index is smaller than `k`.
    pub fn search(&self, query_vector: &[f32], k: usize) -> Vec<QueryHit> {
        let mut scored: Vec<QueryHit> = self
            .vectors
            .iter()
            .zip(&self.chunks)
            .map(|(vector, chunk)| QueryHit {
                content: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                score: 1.0 - cosine_similarity(query_vector, vector),
            })
            .collect();

        scored.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}

fn index_file(dir: &Path, name: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, ext))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to publish {}", path.display()))?;
    Ok(())
}
