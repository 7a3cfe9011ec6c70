//! Shared types, error model, and configuration for Newsroom.
//!
//! This crate is the foundation depended on by all other Newsroom crates.
//! It provides:
//! - [`NewsroomError`]: the unified error type
//! - Domain types ([`Assignment`], [`EvidenceCollection`], [`Draft`], [`FinalArtifact`], ...)
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GenerationSettings, ImageConfig, ImageSettings, ModelConfig,
    ModelSelection, PipelineConfig, ResearchConfig, ResearchPoliciesConfig, SearchConfig,
    config_dir, config_file_path, expand_home, init_config, load_config, load_config_from,
    read_api_key, validate_api_keys,
};
pub use error::{NewsroomError, Result};
pub use types::{
    ApprovalDecision, ArtifactKind, Assignment, Category, DEFAULT_PEOPLE_POLICY, Draft,
    EVIDENCE_MERGE_SEPARATOR, EvidenceCollection, EvidenceItem, EvidenceKind, FinalArtifact,
    HeroImage, ImageQuality, LengthClass, ModelTier, NEUTRAL_SCORE, ReviewFinding, ReviewPass,
    RunId, ScoreDimension, is_actionable_note, score_label,
};
