//! Structured output contracts.
//!
//! Every generative call names one contract. The contract carries the JSON
//! Schema sent to the model and checked on the way back, and a `check()` for
//! rules a schema cannot express.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use newsroom_shared::{
    ApprovalDecision, Category, Draft, EvidenceItem, LengthClass, NewsroomError, Result,
    ReviewFinding, ReviewPass, ScoreDimension,
};

/// A typed generative output with its schema.
pub trait OutputContract: DeserializeOwned + Send {
    /// Contract name sent with the request, `[a-z_]+`.
    const NAME: &'static str;
    /// JSON Schema document.
    const SCHEMA: &'static str;

    /// Domain rules beyond the schema.
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(NewsroomError::validation(format!("{field} is empty")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// The assignment editor's brief, before the slug is derived.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentPlan {
    pub topic: String,
    pub angle: String,
    pub category: Category,
    pub length_class: LengthClass,
    pub key_questions: Vec<String>,
    pub image_people_policy: Option<String>,
}

impl OutputContract for AssignmentPlan {
    const NAME: &'static str = "assignment";
    const SCHEMA: &'static str = include_str!("../schemas/assignment.schema.json");

    fn check(&self) -> Result<()> {
        require_text("topic", &self.topic)?;
        if self.key_questions.iter().any(|q| q.trim().is_empty()) {
            return Err(NewsroomError::validation("key_questions contains a blank question"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

/// Search queries for one research turn.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryBatch {
    pub queries: Vec<String>,
}

impl OutputContract for QueryBatch {
    const NAME: &'static str = "query_batch";
    const SCHEMA: &'static str = include_str!("../schemas/query_batch.schema.json");

    fn check(&self) -> Result<()> {
        if self.queries.iter().all(|q| q.trim().is_empty()) {
            return Err(NewsroomError::validation("no non-blank queries"));
        }
        Ok(())
    }
}

/// Candidate URLs worth deep extraction.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlSelection {
    pub urls: Vec<String>,
    pub reasoning: String,
}

impl OutputContract for UrlSelection {
    const NAME: &'static str = "url_selection";
    const SCHEMA: &'static str = include_str!("../schemas/url_selection.schema.json");
}

/// Attributable findings pulled from one turn's material.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnEvaluation {
    pub new_items: Vec<EvidenceItem>,
    pub summary: String,
}

impl OutputContract for TurnEvaluation {
    const NAME: &'static str = "turn_evaluation";
    const SCHEMA: &'static str = include_str!("../schemas/turn_evaluation.schema.json");

    fn check(&self) -> Result<()> {
        for (i, item) in self.new_items.iter().enumerate() {
            if item.source.trim().is_empty() {
                return Err(NewsroomError::validation(format!(
                    "new_items[{i}] has no source; every finding must keep its source"
                )));
            }
            require_text(&format!("new_items[{i}].content"), &item.content)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Drafting
// ---------------------------------------------------------------------------

impl OutputContract for Draft {
    const NAME: &'static str = "draft";
    const SCHEMA: &'static str = include_str!("../schemas/draft.schema.json");

    fn check(&self) -> Result<()> {
        require_text("body", &self.body)
    }
}

/// One rubric score as the model reports it.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DimensionScore {
    pub dimension: ScoreDimension,
    pub score: u8,
}

/// Raw review output, before it is narrowed to one pass.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewOutput {
    pub issues: Vec<String>,
    pub scores: Vec<DimensionScore>,
}

impl ReviewOutput {
    /// Keep the pass's in-focus scores, set the rest to neutral, drop blank issues.
    pub fn into_finding(self, pass: ReviewPass) -> ReviewFinding {
        let focus = pass.focus();
        ReviewFinding {
            issues: self
                .issues
                .into_iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect(),
            scores: self
                .scores
                .into_iter()
                .filter(|s| focus.contains(&s.dimension))
                .map(|s| (s.dimension, s.score))
                .collect(),
        }
        .with_neutral_defaults()
    }
}

impl OutputContract for ReviewOutput {
    const NAME: &'static str = "review_finding";
    const SCHEMA: &'static str = include_str!("../schemas/review_finding.schema.json");

    fn check(&self) -> Result<()> {
        if let Some(bad) = self.scores.iter().find(|s| !(1..=4).contains(&s.score)) {
            return Err(NewsroomError::validation(format!(
                "score for {} must be 1-4, got {}",
                bad.dimension.as_str(),
                bad.score
            )));
        }
        Ok(())
    }
}

/// A revised article body.
#[derive(Debug, Clone, Deserialize)]
pub struct RevisedBody {
    pub body: String,
}

impl OutputContract for RevisedBody {
    const NAME: &'static str = "revised_body";
    const SCHEMA: &'static str = include_str!("../schemas/revised_body.schema.json");

    fn check(&self) -> Result<()> {
        require_text("body", &self.body)
    }
}

// ---------------------------------------------------------------------------
// Polishing, illustration, approval
// ---------------------------------------------------------------------------

/// Copy-edited article without the publish date.
#[derive(Debug, Clone, Deserialize)]
pub struct PolishedArticle {
    pub headline: String,
    pub subheading: Option<String>,
    pub body: String,
}

impl OutputContract for PolishedArticle {
    const NAME: &'static str = "polished_article";
    const SCHEMA: &'static str = include_str!("../schemas/polished_article.schema.json");

    fn check(&self) -> Result<()> {
        require_text("headline", &self.headline)?;
        require_text("body", &self.body)
    }
}

/// Hero image description.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagePrompt {
    pub prompt: String,
}

impl OutputContract for ImagePrompt {
    const NAME: &'static str = "image_prompt";
    const SCHEMA: &'static str = include_str!("../schemas/image_prompt.schema.json");

    fn check(&self) -> Result<()> {
        require_text("prompt", &self.prompt)
    }
}

impl OutputContract for ApprovalDecision {
    const NAME: &'static str = "approval_decision";
    const SCHEMA: &'static str = include_str!("../schemas/approval_decision.schema.json");

    fn check(&self) -> Result<()> {
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn schema_of<T: OutputContract>() -> Value {
        serde_json::from_str(T::SCHEMA).expect("schema is valid JSON")
    }

    fn assert_strict(schema: &Value, path: &str) {
        if schema["type"] == "object" {
            assert_eq!(schema["additionalProperties"], false, "{path} must be closed");
            let props = schema["properties"].as_object().expect("properties");
            let required: Vec<&str> = schema["required"]
                .as_array()
                .expect("required")
                .iter()
                .filter_map(|v| v.as_str())
                .collect();
            for (name, sub) in props {
                assert!(required.contains(&name.as_str()), "{path}.{name} not required");
                assert_strict(sub, &format!("{path}.{name}"));
            }
        }
        if let Some(items) = schema.get("items") {
            assert_strict(items, &format!("{path}[]"));
        }
    }

    #[test]
    fn every_schema_is_strict() {
        for (name, schema) in [
            (AssignmentPlan::NAME, schema_of::<AssignmentPlan>()),
            (QueryBatch::NAME, schema_of::<QueryBatch>()),
            (UrlSelection::NAME, schema_of::<UrlSelection>()),
            (TurnEvaluation::NAME, schema_of::<TurnEvaluation>()),
            (Draft::NAME, schema_of::<Draft>()),
            (ReviewOutput::NAME, schema_of::<ReviewOutput>()),
            (RevisedBody::NAME, schema_of::<RevisedBody>()),
            (PolishedArticle::NAME, schema_of::<PolishedArticle>()),
            (ImagePrompt::NAME, schema_of::<ImagePrompt>()),
            (ApprovalDecision::NAME, schema_of::<ApprovalDecision>()),
        ] {
            assert!(jsonschema::validator_for(&schema).is_ok(), "{name} does not compile");
            assert_strict(&schema, name);
        }
    }

    #[test]
    fn review_output_narrows_to_focus() {
        let out: ReviewOutput = serde_json::from_value(json!({
            "issues": ["  ", "unsupported figure in paragraph 3"],
            "scores": [
                {"dimension": "accuracy", "score": 2},
                {"dimension": "voice", "score": 1}
            ]
        }))
        .expect("parse");
        let finding = out.into_finding(ReviewPass::Fact);
        assert_eq!(finding.issues, vec!["unsupported figure in paragraph 3"]);
        assert_eq!(finding.scores[&ScoreDimension::Accuracy], 2);
        assert_eq!(finding.scores[&ScoreDimension::Voice], 3);
        assert_eq!(finding.scores.len(), 6);
    }

    #[test]
    fn turn_evaluation_requires_sources() {
        let eval: TurnEvaluation = serde_json::from_value(json!({
            "new_items": [{"source": "", "content": "\"We saw it,\" he said.", "relevance": "r", "kind": "quote"}],
            "summary": "s"
        }))
        .expect("parse");
        assert!(eval.check().is_err());
    }

    #[test]
    fn approval_contract_reuses_rejection_rule() {
        let vague = ApprovalDecision {
            approved: false,
            notes: vec!["needs work".into()],
        };
        assert!(OutputContract::check(&vague).is_err());
    }
}
