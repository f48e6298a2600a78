//! # Vecdex
//!
//! A document ingestion and vector search service.
//!
//! Vecdex walks a local directory (and optionally an S3 bucket) for PDF
//! and DOCX documents, extracts their text, splits it into overlapping
//! chunks, embeds the chunks, and maintains a persistent vector index
//! that can be rebuilt incrementally. Queries are served over a small
//! JSON HTTP API once an index is explicitly loaded.
//!
//! ## Quick Start
//!
//! ```bash
//! vdx ingest                    # walk sources, chunk, embed, index
//! vdx search "refund policy"    # one-off query from the CLI
//! vdx serve                     # start the HTTP query service
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types (chunks, metadata, query hits) |
//! | [`source_fs`] | Local filesystem document enumeration |
//! | [`source_s3`] | S3 document listing and download (SigV4) |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`chunker`] | Recursive overlapping text splitting |
//! | [`tagger`] | Provenance metadata tagging |
//! | [`ingest`] | The end-to-end ingestion pipeline |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persistent vector index |
//! | [`server`] | HTTP query service |

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod models;
pub mod server;
pub mod source_fs;
pub mod source_s3;
pub mod tagger;
