//! Shared types, error model, and configuration for sourcemill.
//!
//! This crate is the foundation depended on by all other sourcemill crates.
//! It provides:
//! - [`SourcemillError`] — the unified error type
//! - Domain types ([`IngestionRequest`], [`IngestionJob`], [`KnowledgeItem`],
//!   [`IngestionResult`], [`SourceError`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlSection, PipelineConfig, PipelineSection, ServerSection,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SourcemillError};
pub use types::{
    CancelFlag, IngestionJob, IngestionRequest, IngestionResult, JobSpec, KnowledgeItem,
    MAX_PAGE_BUDGET, MIN_PAGE_BUDGET, RequestId, SourceError, SourceErrorKind, UploadedFile,
};
