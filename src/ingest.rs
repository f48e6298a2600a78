//! Ingestion pipeline: enumerate documents from the configured sources,
//! extract their text, split it into chunks, and tag each chunk with
//! provenance metadata.
//!
//! Failures are isolated per document: a file that cannot be read or
//! parsed is recorded in the report and the pipeline moves on. A source
//! class that cannot be reached at all (for example bad remote
//! credentials) is recorded as a single failure and the other class
//! continues unaffected.

use anyhow::Result;
use std::fs;

use crate::chunker::split_text;
use crate::config::Config;
use crate::embedding;
use crate::extract::{extract_text, DocFormat};
use crate::index::VectorIndex;
use crate::models::DocChunk;
use crate::source_fs::scan_local;
use crate::source_s3::RemoteSource;
use crate::tagger::{tag_chunks, Origin};

/// One document that could not be ingested, and why.
#[derive(Debug, Clone)]
pub struct IngestFailure {
    pub source: String,
    pub reason: String,
}

/// Outcome of a full ingestion run over all sources.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub chunks: Vec<DocChunk>,
    pub failures: Vec<IngestFailure>,
    pub docs_processed: usize,
    pub docs_skipped_empty: usize,
}

impl IngestReport {
    fn record_failure(&mut self, source: &str, reason: String) {
        eprintln!("  ✗ {}: {}", source, reason);
        self.failures.push(IngestFailure {
            source: source.to_string(),
            reason,
        });
    }

    fn ingest_document(
        &mut self,
        bytes: &[u8],
        format: DocFormat,
        source_identity: &str,
        origin: &Origin,
        chunk_size: usize,
        chunk_overlap: usize,
    ) {
        let text = match extract_text(bytes, format) {
            Ok(t) => t,
            Err(e) => {
                self.record_failure(source_identity, e.to_string());
                return;
            }
        };

        if text.trim().is_empty() {
            println!("  - {} (no extractable text, skipped)", source_identity);
            self.docs_skipped_empty += 1;
            return;
        }

        let pieces = split_text(&text, chunk_size, chunk_overlap);
        let tagged = tag_chunks(pieces, source_identity, origin);
        println!("  ✓ {} ({} chunks)", source_identity, tagged.len());
        self.chunks.extend(tagged);
        self.docs_processed += 1;
    }
}

/// Run the full collection phase: local filesystem walk, then the remote
/// bucket when one is configured. Returns every chunk produced plus the
/// per-document failures. Embedding and indexing happen afterwards.
pub async fn collect_chunks(config: &Config) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    let chunk_size = config.chunking.chunk_size;
    let chunk_overlap = config.chunking.chunk_overlap;

    // A failed local enumeration is a source-class failure: it is
    // recorded and the remote source still runs.
    match scan_local(&config.ingest.root, config.ingest.max_items) {
        Ok(scan) => {
            for (path, reason) in scan.errors {
                report.record_failure(&path.display().to_string(), reason);
            }
            println!(
                "Found {} local document(s) under {}",
                scan.candidates.len(),
                config.ingest.root.display()
            );

            for candidate in scan.candidates {
                let identity = candidate.path.display().to_string();
                match fs::read(&candidate.path) {
                    Ok(bytes) => report.ingest_document(
                        &bytes,
                        candidate.format,
                        &identity,
                        &Origin::Local,
                        chunk_size,
                        chunk_overlap,
                    ),
                    Err(e) => report.record_failure(&identity, format!("read failed: {}", e)),
                }
            }
        }
        Err(e) => report.record_failure("local", e.to_string()),
    }

    collect_remote(config, &mut report).await;

    Ok(report)
}

async fn collect_remote(config: &Config, report: &mut IngestReport) {
    let source = match RemoteSource::from_env(config.remote.as_ref()) {
        Ok(Some(source)) => source,
        Ok(None) => {
            println!("S3_BUCKET_NAME not set; skipping remote source");
            return;
        }
        Err(e) => {
            report.record_failure("remote", e.to_string());
            return;
        }
    };

    let objects = match source.list().await {
        Ok(objects) => objects,
        Err(e) => {
            report.record_failure(&format!("s3://{}", source.bucket()), e.to_string());
            return;
        }
    };
    println!(
        "Found {} remote document(s) in s3://{}",
        objects.len(),
        source.bucket()
    );

    let chunk_size = config.chunking.chunk_size;
    let chunk_overlap = config.chunking.chunk_overlap;

    for object in objects {
        let identity = format!("s3://{}/{}", source.bucket(), object.key);
        let origin = Origin::Remote {
            container: source.bucket().to_string(),
            key: object.key.clone(),
        };
        match source.fetch(&object.key).await {
            Ok(bytes) => report.ingest_document(
                &bytes,
                object.format,
                &identity,
                &origin,
                chunk_size,
                chunk_overlap,
            ),
            Err(e) => report.record_failure(&identity, e.to_string()),
        }
    }
}

/// Embed `chunks` in batches and append them to the index. All batches
/// must succeed before anything is added: on any embedding failure the
/// index is left exactly as it was.
pub async fn embed_and_add(
    index: &mut VectorIndex,
    config: &Config,
    chunks: Vec<DocChunk>,
) -> Result<()> {
    if chunks.is_empty() {
        anyhow::bail!("No chunks to add");
    }

    let batch_size = config.embedding.batch_size.max(1);
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = embedding::embed_texts(&config.embedding, &texts).await?;
        vectors.extend(embedded);
    }

    index.add(chunks, vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("word/document.xml", options).unwrap();
            let body: String = paragraphs
                .iter()
                .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
                .collect();
            write!(
                writer,
                r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
                body
            )
            .unwrap();
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn valid_document_produces_tagged_chunks() {
        let mut report = IngestReport::default();
        let bytes = docx_bytes(&["Hello ingestion world."]);
        report.ingest_document(
            &bytes,
            DocFormat::Docx,
            "/tmp/hello.docx",
            &Origin::Local,
            1000,
            200,
        );

        assert_eq!(report.docs_processed, 1);
        assert!(report.failures.is_empty());
        assert!(!report.chunks.is_empty());
        assert_eq!(report.chunks[0].metadata.source, "/tmp/hello.docx");
        assert_eq!(report.chunks[0].metadata.chunk_id, 0);
    }

    #[test]
    fn corrupt_document_is_recorded_not_fatal() {
        let mut report = IngestReport::default();
        report.ingest_document(
            b"not a real docx",
            DocFormat::Docx,
            "/tmp/broken.docx",
            &Origin::Local,
            1000,
            200,
        );
        // A good document after the broken one still goes through.
        let bytes = docx_bytes(&["Still standing."]);
        report.ingest_document(
            &bytes,
            DocFormat::Docx,
            "/tmp/fine.docx",
            &Origin::Local,
            1000,
            200,
        );

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source, "/tmp/broken.docx");
        assert_eq!(report.docs_processed, 1);
        assert_eq!(report.chunks.len(), 1);
    }

    #[test]
    fn empty_document_is_skipped_without_failure() {
        let mut report = IngestReport::default();
        let bytes = docx_bytes(&["   "]);
        report.ingest_document(
            &bytes,
            DocFormat::Docx,
            "/tmp/blank.docx",
            &Origin::Local,
            1000,
            200,
        );

        assert_eq!(report.docs_skipped_empty, 1);
        assert_eq!(report.docs_processed, 0);
        assert!(report.failures.is_empty());
        assert!(report.chunks.is_empty());
    }

    #[tokio::test]
    async fn missing_root_degrades_instead_of_aborting() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = crate::config::Config::default_for_tests(tmp.path());
        config.ingest.root = tmp.path().join("does-not-exist");

        // The run completes: the local source class is recorded as failed
        // and the (unconfigured) remote source is still reached.
        let report = collect_chunks(&config).await.unwrap();
        assert!(report.chunks.is_empty());
        assert!(report
            .failures
            .iter()
            .any(|f| f.source == "local" && f.reason.contains("does not exist")));
    }
}
