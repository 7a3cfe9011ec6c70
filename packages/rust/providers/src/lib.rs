//! External collaborators of the newsroom pipeline.
//!
//! Each capability is a trait so stages can be driven by scripted doubles in
//! tests:
//! - [`Generator`]: structured text generation (OpenAI chat completions)
//! - [`SearchProvider`]: web search (Tavily) and encyclopedia search (Wikipedia)
//! - [`Extractor`]: full-text extraction (Tavily extract, or direct fetch)
//! - [`ImageGenerator`]: hero image rendering

pub mod extraction;
pub mod generation;
mod http;
pub mod imaging;
pub mod search;

pub use extraction::{ExtractedDocument, Extractor, HttpExtractor, TavilyExtractor};
pub use generation::{GenerationRequest, Generator, Message, OpenAiGenerator, OutputSchema, Role};
pub use imaging::{ImageGenerator, OpenAiImageGenerator};
pub use search::{SearchHit, SearchProvider, TavilySearch, WikipediaSearch};
