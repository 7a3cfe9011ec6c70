//! Scripted collaborators for stage and pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use newsroom_providers::{
    ExtractedDocument, Extractor, GenerationRequest, Generator, ImageGenerator, SearchHit,
    SearchProvider,
};
use newsroom_shared::{
    Assignment, Category, GenerationSettings, ImageQuality, ImageSettings, LengthClass,
    NewsroomError, PipelineConfig, ResearchConfig, Result, DEFAULT_PEOPLE_POLICY,
};

pub fn settings() -> GenerationSettings {
    GenerationSettings {
        reasoning_model: "reasoning-model".into(),
        smart_model: "smart-model".into(),
        mini_model: "mini-model".into(),
        reasoning_effort: "medium".into(),
        light_effort: "minimal".into(),
        validation_retries: 1,
    }
}

pub fn research_config(max_turns: u32) -> ResearchConfig {
    ResearchConfig {
        max_turns,
        queries_per_turn: 3,
        max_curated: 3,
        context_turns: 3,
        max_extract_chars: 12_000,
        call_timeout: Duration::from_secs(5),
    }
}

pub fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        output_dir: None,
        max_redrafts: 2,
        research: research_config(3),
        generation: settings(),
        image: ImageSettings {
            enabled: true,
            model: "image-model".into(),
            quality: ImageQuality::Medium,
            size: "1536x1024".into(),
        },
    }
}

pub fn assignment(length_class: LengthClass) -> Assignment {
    Assignment {
        topic: "Hydrothermal vents".into(),
        angle: "Life without sunlight".into(),
        category: Category::Science,
        length_class,
        key_questions: vec![
            "What lives there?".into(),
            "How do they eat?".into(),
            "Why does it matter?".into(),
        ],
        slug: "hydrothermal_vents".into(),
        image_people_policy: DEFAULT_PEOPLE_POLICY.into(),
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

enum Scripted {
    Value(Value),
    Fail(String),
}

/// Replays queued outputs per contract name. The last entry for a contract
/// repeats once the queue is down to one.
#[derive(Default)]
pub struct ScriptedGenerator {
    queues: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    network_failure: Option<String>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, contract: &str, value: Value) -> Self {
        self.push(contract, Scripted::Value(value))
    }

    /// Queue an unusable output for `contract`.
    pub fn with_failure(self, contract: &str, message: &str) -> Self {
        self.push(contract, Scripted::Fail(message.into()))
    }

    /// Fail every call as a transport error.
    pub fn failing_network(mut self, message: &str) -> Self {
        self.network_failure = Some(message.into());
        self
    }

    fn push(self, contract: &str, entry: Scripted) -> Self {
        self.queues
            .lock()
            .expect("lock")
            .entry(contract.to_string())
            .or_default()
            .push_back(entry);
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn requests_for(&self, contract: &str) -> Vec<GenerationRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.output.name == contract)
            .collect()
    }

    pub fn calls(&self, contract: &str) -> usize {
        self.requests_for(contract).len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn invoke(&self, request: &GenerationRequest) -> Result<Value> {
        self.requests.lock().expect("lock").push(request.clone());
        if let Some(msg) = &self.network_failure {
            return Err(NewsroomError::Network(msg.clone()));
        }

        let contract = request.output.name.as_str();
        let mut queues = self.queues.lock().expect("lock");
        let queue = queues
            .get_mut(contract)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| NewsroomError::generation(contract, "nothing scripted"))?;

        let entry = if queue.len() > 1 {
            queue.pop_front().expect("non-empty")
        } else {
            match queue.front().expect("non-empty") {
                Scripted::Value(v) => Scripted::Value(v.clone()),
                Scripted::Fail(m) => Scripted::Fail(m.clone()),
            }
        };

        match entry {
            Scripted::Value(v) => Ok(v),
            Scripted::Fail(m) => Err(NewsroomError::generation(contract, m)),
        }
    }
}

// ---------------------------------------------------------------------------
// Search, extraction, images
// ---------------------------------------------------------------------------

/// Returns the same hits for every query, or fails every query.
pub struct StubSearch {
    pub hits: Vec<SearchHit>,
    pub fail: bool,
    pub queries: Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn with_hits(urls: &[&str]) -> Self {
        Self {
            hits: urls
                .iter()
                .map(|u| SearchHit {
                    url: (*u).to_string(),
                    title: format!("Title of {u}"),
                    snippet: format!("Snippet of {u}"),
                })
                .collect(),
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            hits: Vec::new(),
            fail: true,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().expect("lock").len()
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.queries.lock().expect("lock").push(query.to_string());
        if self.fail {
            return Err(NewsroomError::search("stub", "service unavailable"));
        }
        Ok(self.hits.clone())
    }
}

/// Search provider that never answers.
pub struct HangingSearch;

#[async_trait]
impl SearchProvider for HangingSearch {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>> {
        std::future::pending::<()>().await;
        Ok(Vec::new())
    }
}

/// Extracts `"Full text of <url>"` unless the URL is in `failing`. URLs in
/// `hanging` never answer.
#[derive(Default)]
pub struct StubExtractor {
    pub failing: Vec<String>,
    pub hanging: Vec<String>,
    pub requested: Mutex<Vec<String>>,
}

impl StubExtractor {
    pub fn failing_all() -> Self {
        Self {
            failing: vec!["*".into()],
            ..Self::default()
        }
    }

    pub fn hanging_on(url: &str) -> Self {
        Self {
            hanging: vec![url.to_string()],
            ..Self::default()
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(&self, urls: &[String]) -> Vec<Result<ExtractedDocument>> {
        self.requested.lock().expect("lock").extend(urls.iter().cloned());
        if urls.iter().any(|u| self.hanging.contains(u)) {
            std::future::pending::<()>().await;
        }
        urls.iter()
            .map(|u| {
                if self.failing.iter().any(|f| f == "*" || f == u) {
                    Err(NewsroomError::extraction(u, "blocked"))
                } else {
                    Ok(ExtractedDocument {
                        url: u.clone(),
                        text: format!("Full text of {u}"),
                    })
                }
            })
            .collect()
    }
}

/// Returns fixed bytes, or fails every call.
pub struct StubImage {
    pub fail: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl StubImage {
    pub fn ok() -> Self {
        Self {
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock").clone()
    }
}

pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nstub";

#[async_trait]
impl ImageGenerator for StubImage {
    async fn generate(&self, prompt: &str, _settings: &ImageSettings) -> Result<Vec<u8>> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        if self.fail {
            return Err(NewsroomError::ImageGeneration("quota exceeded".into()));
        }
        Ok(FAKE_PNG.to_vec())
    }
}
