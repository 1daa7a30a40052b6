//! # jobpost-rag
//!
//! Retrieval-augmented job posting generation.
//!
//! A grounding document (company facts such as pay ranges and benefits) is
//! chunked, embedded and stored. A recruiter's query is then embedded, the
//! closest chunks are retrieved and placed into a prompt, a chat model writes
//! the posting, and the result is recorded.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────┐   ┌────────────┐
//! │  Source  │──▶│ Chunker │──▶│ Embedder │──▶│ ChunkStore │
//! └──────────┘   └─────────┘   └──────────┘   └─────┬──────┘
//!                                                   │ nearest-k
//! ┌──────────┐   ┌───────────┐   ┌────────┐   ┌─────▼─────┐
//! │ Recorder │◀──│ Generator │◀──│ Prompt │◀──│ Retriever │◀── query
//! └──────────┘   └───────────┘   └────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! jobpost init                                  # create database
//! jobpost ingest                                # chunk + embed the source document
//! jobpost create "Senior backend engineer, Berlin"
//! jobpost serve                                 # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`source`] | Grounding document loading (text, PDF) |
//! | [`chunk`] | Separator-aware chunking with overlap |
//! | [`embedding`] | Embedding providers and vector utilities |
//! | [`store`] | Chunk and record storage (SQLite, in-memory) |
//! | [`retriever`] | Query embedding + nearest-k |
//! | [`prompt`] | Prompt assembly |
//! | [`generation`] | Chat completion providers |
//! | [`recorder`] | Job posting persistence |
//! | [`service`] | The exposed operations |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod recorder;
pub mod retriever;
pub mod server;
pub mod service;
pub mod source;
pub mod store;
pub mod timeout;
