//! Core domain types for Newsroom articles.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{NewsroomError, Result};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Model and image options
// ---------------------------------------------------------------------------

/// Cost/capability tier a stage asks for. Resolved to a concrete model by config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    Reasoning,
    Smart,
    Mini,
}

/// Image rendering quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for ImageQuality {
    type Err = NewsroomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(NewsroomError::validation(format!(
                "unknown image quality '{other}' (expected low, medium or high)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// Editorial section an article belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Science,
    History,
    #[serde(rename = "Planet Earth")]
    PlanetEarth,
    Mystery,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Science => "Science",
            Self::History => "History",
            Self::PlanetEarth => "Planet Earth",
            Self::Mystery => "Mystery",
        })
    }
}

/// Short-form vs. long-form content. Drives word target and evidence depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthClass {
    #[serde(alias = "Web Daily")]
    ShortForm,
    #[serde(alias = "Standard Feature", alias = "Full Feature")]
    LongForm,
}

impl LengthClass {
    /// Inclusive body word-count target.
    pub fn word_range(&self) -> (usize, usize) {
        match self {
            Self::ShortForm => (400, 700),
            Self::LongForm => (1500, 2000),
        }
    }

    /// Desk label used in briefs and rendered artifacts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ShortForm => "Web Daily",
            Self::LongForm => "Standard Feature",
        }
    }
}

/// Default hero-image people policy.
pub const DEFAULT_PEOPLE_POLICY: &str = "Do not include any people in the hero image.";

fn default_people_policy() -> String {
    DEFAULT_PEOPLE_POLICY.into()
}

/// The editorial brief. Created once by planning, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub topic: String,
    pub angle: String,
    pub category: Category,
    pub length_class: LengthClass,
    pub key_questions: Vec<String>,
    pub slug: String,
    #[serde(default = "default_people_policy")]
    pub image_people_policy: String,
}

impl Assignment {
    pub const MIN_KEY_QUESTIONS: usize = 3;
    pub const MAX_KEY_QUESTIONS: usize = 5;

    /// Check the brief's invariants.
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(NewsroomError::validation("assignment topic is empty"));
        }
        let n = self.key_questions.len();
        if !(Self::MIN_KEY_QUESTIONS..=Self::MAX_KEY_QUESTIONS).contains(&n) {
            return Err(NewsroomError::validation(format!(
                "assignment needs {}-{} key questions, got {n}",
                Self::MIN_KEY_QUESTIONS,
                Self::MAX_KEY_QUESTIONS
            )));
        }
        if self.key_questions.iter().any(|q| q.trim().is_empty()) {
            return Err(NewsroomError::validation("assignment has a blank key question"));
        }
        if self.slug.is_empty()
            || !self
                .slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(NewsroomError::validation(format!(
                "invalid slug '{}' (expected [a-z0-9_]+)",
                self.slug
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// What narrative need an evidence item fills.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    #[default]
    Fact,
    Context,
    Color,
    Perspective,
    Quote,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Context => "context",
            Self::Color => "color",
            Self::Perspective => "perspective",
            Self::Quote => "quote",
        }
    }
}

/// One attributable finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// URL or title the content came from.
    pub source: String,
    pub content: String,
    pub relevance: String,
    #[serde(default)]
    pub kind: EvidenceKind,
}

/// Separator placed between merged contents of the same source.
pub const EVIDENCE_MERGE_SEPARATOR: &str = "\n\n";

/// Evidence gathered by the research loop, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceCollection {
    pub items: Vec<EvidenceItem>,
}

impl EvidenceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: EvidenceItem) {
        self.items.push(item);
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = EvidenceItem>) {
        self.items.extend(items);
    }

    /// Number of distinct source identifiers.
    pub fn distinct_sources(&self) -> usize {
        let mut seen: Vec<&str> = self.items.iter().map(|i| i.source.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    pub fn has_kind(&self, kind: EvidenceKind) -> bool {
        self.items.iter().any(|i| i.kind == kind)
    }

    /// Merge items that share a source.
    ///
    /// The merged item sits at the first occurrence's position, keeps its
    /// relevance note and kind, and carries every content in original order.
    pub fn finalize(self) -> Self {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut items: Vec<EvidenceItem> = Vec::with_capacity(self.items.len());

        for item in self.items {
            match index.get(&item.source) {
                Some(&pos) => {
                    let merged = &mut items[pos];
                    merged.content.push_str(EVIDENCE_MERGE_SEPARATOR);
                    merged.content.push_str(&item.content);
                }
                None => {
                    index.insert(item.source.clone(), items.len());
                    items.push(item);
                }
            }
        }

        Self { items }
    }
}

// ---------------------------------------------------------------------------
// Draft and reviews
// ---------------------------------------------------------------------------

/// Working draft. Revisions replace `body` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub body: String,
    pub sources: Vec<String>,
    pub source_narrative: String,
}

/// Rubric dimensions scored by the review passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDimension {
    Accuracy,
    Attribution,
    Completeness,
    Compliance,
    Structure,
    Voice,
}

impl ScoreDimension {
    pub const ALL: [ScoreDimension; 6] = [
        Self::Accuracy,
        Self::Attribution,
        Self::Completeness,
        Self::Compliance,
        Self::Structure,
        Self::Voice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Attribution => "attribution",
            Self::Completeness => "completeness",
            Self::Compliance => "compliance",
            Self::Structure => "structure",
            Self::Voice => "voice",
        }
    }
}

/// Score given to dimensions a pass does not focus on.
pub const NEUTRAL_SCORE: u8 = 3;

/// Label for a 1-4 rubric score.
pub fn score_label(score: u8) -> &'static str {
    match score {
        1 => "POOR",
        2 => "FAIR",
        3 => "GOOD",
        4 => "EXCELLENT",
        _ => "INVALID",
    }
}

/// Which review pass produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPass {
    Fact,
    Style,
}

impl ReviewPass {
    /// Dimensions this pass is responsible for scoring.
    pub fn focus(&self) -> &'static [ScoreDimension] {
        match self {
            Self::Fact => &[
                ScoreDimension::Accuracy,
                ScoreDimension::Attribution,
                ScoreDimension::Completeness,
            ],
            Self::Style => &[
                ScoreDimension::Compliance,
                ScoreDimension::Structure,
                ScoreDimension::Voice,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Style => "style",
        }
    }
}

/// Output of one review pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewFinding {
    /// Ordered issues; empty means the pass found nothing to fix.
    pub issues: Vec<String>,
    pub scores: BTreeMap<ScoreDimension, u8>,
}

impl ReviewFinding {
    /// A finding with no issues and every dimension at the neutral score.
    pub fn clean() -> Self {
        Self {
            issues: Vec::new(),
            scores: ScoreDimension::ALL
                .iter()
                .map(|d| (*d, NEUTRAL_SCORE))
                .collect(),
        }
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Fill unscored dimensions with the neutral score.
    pub fn with_neutral_defaults(mut self) -> Self {
        for d in ScoreDimension::ALL {
            self.scores.entry(d).or_insert(NEUTRAL_SCORE);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (dim, score) in &self.scores {
            if !(1..=4).contains(score) {
                return Err(NewsroomError::validation(format!(
                    "score for {} must be 1-4, got {score}",
                    dim.as_str()
                )));
            }
        }
        if self.issues.iter().any(|i| i.trim().is_empty()) {
            return Err(NewsroomError::validation("review finding has a blank issue"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Final artifact, image, approval
// ---------------------------------------------------------------------------

/// The polished, publication-ready article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalArtifact {
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheading: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<NaiveDate>,
}

/// Hero image prompt and, when generation succeeded, where the PNG was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroImage {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Phrases too vague to act on as rejection notes.
const VAGUE_NOTES: &[&str] = &[
    "needs work",
    "needs more work",
    "not good enough",
    "fix it",
    "rewrite",
    "rewrite it",
    "try again",
    "bad",
    "improve it",
    "make it better",
];

/// Whether a rejection note names something specific enough to fix.
pub fn is_actionable_note(note: &str) -> bool {
    let normalized = note
        .trim()
        .trim_end_matches(['.', '!'])
        .to_ascii_lowercase();
    if VAGUE_NOTES.contains(&normalized.as_str()) {
        return false;
    }
    normalized.split_whitespace().count() >= 3
}

/// Terminal editorial decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ApprovalDecision {
    /// A rejection must carry at least one actionable note.
    pub fn validate(&self) -> Result<()> {
        if self.approved {
            return Ok(());
        }
        if !self.notes.iter().any(|n| is_actionable_note(n)) {
            return Err(NewsroomError::validation(
                "a rejection must include at least one specific, actionable note",
            ));
        }
        Ok(())
    }

    /// Feedback instruction handed to the next drafting attempt.
    pub fn feedback(&self) -> String {
        let mut text =
            String::from("The article was rejected. Please address the following issues:\n");
        for note in &self.notes {
            text.push_str("- ");
            text.push_str(note);
            text.push('\n');
        }
        text
    }
}

// ---------------------------------------------------------------------------
// Artifact kinds
// ---------------------------------------------------------------------------

/// Kind tag under which a value is persisted for a slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Assignment,
    Evidence,
    DraftInitial,
    FactReview,
    DraftAfterFact,
    StyleReview,
    DraftAfterStyle,
    Draft,
    FinalArtifact,
    ImagePrompt,
    Approval,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 11] = [
        Self::Assignment,
        Self::Evidence,
        Self::DraftInitial,
        Self::FactReview,
        Self::DraftAfterFact,
        Self::StyleReview,
        Self::DraftAfterStyle,
        Self::Draft,
        Self::FinalArtifact,
        Self::ImagePrompt,
        Self::Approval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assignment => "assignment",
            Self::Evidence => "evidence",
            Self::DraftInitial => "draft_initial",
            Self::FactReview => "fact_review",
            Self::DraftAfterFact => "draft_after_fact",
            Self::StyleReview => "style_review",
            Self::DraftAfterStyle => "draft_after_style",
            Self::Draft => "draft",
            Self::FinalArtifact => "final_artifact",
            Self::ImagePrompt => "image_prompt",
            Self::Approval => "approval",
        }
    }

    /// CLI command that produces this artifact.
    pub fn producer(&self) -> &'static str {
        match self {
            Self::Assignment => "assign",
            Self::Evidence => "research",
            Self::DraftInitial
            | Self::FactReview
            | Self::DraftAfterFact
            | Self::StyleReview
            | Self::DraftAfterStyle
            | Self::Draft => "draft",
            Self::FinalArtifact => "polish",
            Self::ImagePrompt => "illustrate",
            Self::Approval => "approve",
        }
    }

    /// Error for a missing artifact of this kind.
    pub fn not_found(&self, slug: &str) -> NewsroomError {
        NewsroomError::not_found(self.as_str(), slug, self.producer())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = NewsroomError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| NewsroomError::validation(format!("unknown artifact kind '{s}'")))
    }
}
