//! Error types for Newsroom.
//!
//! Library crates use [`NewsroomError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Newsroom operations.
#[derive(Debug, thiserror::Error)]
pub enum NewsroomError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to a collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// Generative output missing, unparseable, or not matching its contract.
    #[error("generation error ({contract}): {message}")]
    Generation { contract: String, message: String },

    /// A search provider failed a query (transport, auth, bad payload).
    #[error("search error ({provider}): {message}")]
    Search { provider: String, message: String },

    /// A single URL could not be extracted.
    #[error("extraction error for {url}: {message}")]
    Extraction { url: String, message: String },

    /// Image generation failed.
    #[error("image generation error: {0}")]
    ImageGeneration(String),

    /// A stage invoked standalone could not find the artifact it depends on.
    #[error(
        "no {kind} artifact found for '{identifier}' (run the stage that produces it first, e.g. `newsroom {hint} ...`)"
    )]
    NotFound {
        kind: String,
        identifier: String,
        hint: String,
    },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invariant violated, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A pipeline stage failed; wraps the underlying cause.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<NewsroomError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NewsroomError>;

impl NewsroomError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a generation error for the named output contract.
    pub fn generation(contract: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Generation {
            contract: contract.into(),
            message: msg.into(),
        }
    }

    /// Create a search error for the named provider.
    pub fn search(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Search {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create an extraction error for one URL.
    pub fn extraction(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Missing upstream artifact. `hint` names the CLI command that produces it.
    pub fn not_found(
        kind: impl Into<String>,
        identifier: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            identifier: identifier.into(),
            hint: hint.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attribute this error to a pipeline stage. Already-wrapped errors are kept as-is.
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        match self {
            err @ Self::Stage { .. } => err,
            other => Self::Stage {
                stage: stage.into(),
                source: Box::new(other),
            },
        }
    }

    /// True for errors that the research loop and image stage recover from locally.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Search { .. } | Self::Extraction { .. } | Self::ImageGeneration(_)
        )
    }
}
