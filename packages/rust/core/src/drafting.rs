//! Draft refinement loop: initial draft, then a fact pass and a style pass.
//!
//! Each pass reviews the current draft and revises it only when the review
//! found issues. A revision may change the body only, and must keep the `## `
//! heading outline; a revision that breaks the outline twice is discarded.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use newsroom_markdown::{count_words, heading_outline, long_dash_paragraphs, same_outline};
use newsroom_providers::{Generator, Message};
use newsroom_shared::{
    Assignment, Draft, EvidenceCollection, GenerationSettings, ModelTier, Result, ReviewFinding,
    ReviewPass,
};

use crate::contracts::{ReviewOutput, RevisedBody};
use crate::progress::ProgressReporter;
use crate::prompts;
use crate::stage::{Stage, StageKind, generate};

/// Input to one drafting attempt.
#[derive(Debug, Clone)]
pub struct DraftingInput {
    pub assignment: Assignment,
    pub evidence: EvidenceCollection,
    /// Rejection feedback from a previous approval round.
    pub feedback: Option<String>,
}

/// Every snapshot the refinement loop produced.
#[derive(Debug, Clone)]
pub struct DraftOutcome {
    pub initial: Draft,
    pub fact_review: ReviewFinding,
    pub after_fact: Draft,
    pub style_review: ReviewFinding,
    pub after_style: Draft,
}

impl DraftOutcome {
    /// The finished draft.
    pub fn draft(&self) -> &Draft {
        &self.after_style
    }
}

pub struct Drafter<'a> {
    pub generator: &'a dyn Generator,
    pub settings: &'a GenerationSettings,
    pub progress: &'a dyn ProgressReporter,
}

#[async_trait]
impl Stage for Drafter<'_> {
    const KIND: StageKind = StageKind::Drafting;
    type Input = DraftingInput;
    type Output = DraftOutcome;

    async fn run(&self, input: DraftingInput) -> Result<DraftOutcome> {
        let DraftingInput {
            assignment,
            evidence,
            feedback,
        } = input;

        self.progress.drafting_step("writing initial draft");
        let initial = self
            .write_initial(&assignment, &evidence, feedback.as_deref())
            .await?;

        let fact_review = self
            .review(ReviewPass::Fact, &assignment, &evidence, &initial)
            .await?;
        let after_fact = self.revise(ReviewPass::Fact, &initial, &fact_review).await?;

        let style_review = self
            .review(ReviewPass::Style, &assignment, &evidence, &after_fact)
            .await?;
        let after_style = self
            .revise(ReviewPass::Style, &after_fact, &style_review)
            .await?;

        info!(
            words = count_words(&after_style.body),
            sections = heading_outline(&after_style.body).len(),
            fact_issues = fact_review.issues.len(),
            style_issues = style_review.issues.len(),
            "draft complete"
        );

        Ok(DraftOutcome {
            initial,
            fact_review,
            after_fact,
            style_review,
            after_style,
        })
    }
}

impl Drafter<'_> {
    async fn write_initial(
        &self,
        assignment: &Assignment,
        evidence: &EvidenceCollection,
        feedback: Option<&str>,
    ) -> Result<Draft> {
        let mut context = vec![
            Message::user(prompts::assignment_block(assignment)),
            Message::user(prompts::evidence_block(evidence)),
        ];
        if let Some(feedback) = feedback {
            debug!("drafting with rejection feedback");
            context.push(Message::user(feedback));
        }

        generate(
            self.generator,
            self.settings,
            ModelTier::Reasoning,
            &prompts::drafting(assignment),
            context,
        )
        .await
    }

    /// Run one review pass over `draft`.
    pub async fn review(
        &self,
        pass: ReviewPass,
        assignment: &Assignment,
        evidence: &EvidenceCollection,
        draft: &Draft,
    ) -> Result<ReviewFinding> {
        self.progress.drafting_step(match pass {
            ReviewPass::Fact => "fact review",
            ReviewPass::Style => "style review",
        });

        let mut context = vec![Message::user(prompts::assignment_block(assignment))];
        match pass {
            ReviewPass::Fact => context.push(Message::user(prompts::evidence_block(evidence))),
            ReviewPass::Style => {
                let (min, max) = assignment.length_class.word_range();
                context.push(Message::user(format!(
                    "Body word count: {} (target {min}-{max}).",
                    count_words(&draft.body)
                )));
            }
        }
        context.push(Message::user(prompts::draft_block(draft)));

        let output: ReviewOutput = generate(
            self.generator,
            self.settings,
            ModelTier::Smart,
            &prompts::review(pass),
            context,
        )
        .await?;

        let mut finding = output.into_finding(pass);
        if pass == ReviewPass::Style {
            lint_long_dashes(&mut finding, &draft.body);
        }
        debug!(pass = pass.as_str(), issues = finding.issues.len(), "review complete");
        Ok(finding)
    }

    /// Revise `draft` against `finding`.
    ///
    /// Without issues the draft is returned unchanged and no call is made.
    pub async fn revise(
        &self,
        pass: ReviewPass,
        draft: &Draft,
        finding: &ReviewFinding,
    ) -> Result<Draft> {
        if !finding.has_issues() {
            debug!(pass = pass.as_str(), "no issues, revision skipped");
            return Ok(draft.clone());
        }

        self.progress.drafting_step(match pass {
            ReviewPass::Fact => "fact revision",
            ReviewPass::Style => "style revision",
        });

        let instructions = prompts::revision(pass);
        let mut context = vec![
            Message::user(prompts::draft_block(draft)),
            Message::user(prompts::issues_block(finding)),
        ];

        let first: RevisedBody = generate(
            self.generator,
            self.settings,
            ModelTier::Reasoning,
            &instructions,
            context.clone(),
        )
        .await?;
        if same_outline(&draft.body, &first.body) {
            return Ok(with_body(draft, first.body));
        }

        let outline = heading_outline(&draft.body);
        warn!(
            pass = pass.as_str(),
            expected = outline.len(),
            got = heading_outline(&first.body).len(),
            "revision changed the section outline, retrying"
        );
        context.push(Message::assistant(first.body));
        context.push(Message::user(prompts::outline_correction(&outline)));

        let second: RevisedBody = generate(
            self.generator,
            self.settings,
            ModelTier::Reasoning,
            &instructions,
            context,
        )
        .await?;
        if same_outline(&draft.body, &second.body) {
            return Ok(with_body(draft, second.body));
        }

        warn!(
            pass = pass.as_str(),
            "revision still changed the section outline, keeping the previous body"
        );
        Ok(draft.clone())
    }
}

fn with_body(draft: &Draft, body: String) -> Draft {
    Draft {
        body,
        sources: draft.sources.clone(),
        source_narrative: draft.source_narrative.clone(),
    }
}

/// Add one issue per long-dash paragraph unless the review already flagged dashes.
pub fn lint_long_dashes(finding: &mut ReviewFinding, body: &str) {
    let paragraphs = long_dash_paragraphs(body);
    if paragraphs.is_empty() {
        return;
    }
    if finding
        .issues
        .iter()
        .any(|i| i.to_lowercase().contains("dash"))
    {
        return;
    }
    for p in paragraphs {
        finding.issues.push(format!(
            "Paragraph {p} uses a long dash; rewrite it with a comma, colon or separate sentence."
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::test_support::{ScriptedGenerator, assignment, settings};
    use newsroom_markdown::LONG_DASHES;
    use newsroom_shared::LengthClass;
    use serde_json::{Value, json};

    const BODY: &str = "Vents host life \u{2014} lots of it.\n\n## The Discovery\n\nAlvin found them in 1977.\n\n## Why It Matters\n\nChemosynthesis rewrote biology.";
    const CLEAN_BODY: &str = "Vents host life, lots of it.\n\n## The Discovery\n\nAlvin found them in 1977.\n\n## Why It Matters\n\nChemosynthesis rewrote biology.";

    fn draft_json(body: &str) -> Value {
        json!({
            "body": body,
            "sources": ["https://a.test"],
            "source_narrative": "Reporting drew on a NOAA expedition log."
        })
    }

    fn review_json(issues: &[&str]) -> Value {
        json!({
            "issues": issues,
            "scores": [
                {"dimension": "accuracy", "score": 4},
                {"dimension": "compliance", "score": 2}
            ]
        })
    }

    fn draft(body: &str) -> Draft {
        Draft {
            body: body.into(),
            sources: vec!["https://a.test".into()],
            source_narrative: "n".into(),
        }
    }

    fn input(feedback: Option<&str>) -> DraftingInput {
        DraftingInput {
            assignment: assignment(LengthClass::ShortForm),
            evidence: EvidenceCollection::new(),
            feedback: feedback.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn revision_without_issues_is_a_no_op() {
        let generator = ScriptedGenerator::new();
        let settings = settings();
        let drafter = Drafter {
            generator: &generator,
            settings: &settings,
            progress: &SilentProgress,
        };
        let d = draft(BODY);
        let revised = drafter
            .revise(ReviewPass::Fact, &d, &ReviewFinding::clean())
            .await
            .expect("revise");
        assert_eq!(revised, d);
        assert!(generator.requests().is_empty());
    }

    #[tokio::test]
    async fn style_issue_gets_exactly_one_revision() {
        let generator = ScriptedGenerator::new()
            .with("draft", draft_json(BODY))
            .with("review_finding", review_json(&[]))
            .with("review_finding", review_json(&["uses an em dash in paragraph 1"]))
            .with("revised_body", json!({"body": CLEAN_BODY}));
        let settings = settings();
        let drafter = Drafter {
            generator: &generator,
            settings: &settings,
            progress: &SilentProgress,
        };

        let outcome = drafter.run(input(None)).await.expect("draft");
        let body = &outcome.draft().body;

        assert_eq!(generator.calls("revised_body"), 1);
        assert!(!body.contains(LONG_DASHES));
        assert_eq!(heading_outline(body).len(), heading_outline(BODY).len());
        assert_eq!(outcome.after_fact, outcome.initial);
        assert_eq!(outcome.style_review.issues, vec!["uses an em dash in paragraph 1"]);
        assert_eq!(outcome.draft().sources, vec!["https://a.test"]);
    }

    #[tokio::test]
    async fn lint_catches_dashes_the_reviewer_missed() {
        let generator = ScriptedGenerator::new()
            .with("draft", draft_json(BODY))
            .with("review_finding", review_json(&[]))
            .with("revised_body", json!({"body": CLEAN_BODY}));
        let settings = settings();
        let drafter = Drafter {
            generator: &generator,
            settings: &settings,
            progress: &SilentProgress,
        };

        let outcome = drafter.run(input(None)).await.expect("draft");
        assert_eq!(outcome.style_review.issues.len(), 1);
        assert!(outcome.style_review.issues[0].starts_with("Paragraph 1 uses a long dash"));
        assert_eq!(outcome.draft().body, CLEAN_BODY);
    }

    #[tokio::test]
    async fn outline_change_is_retried_then_discarded() {
        let broken = "Vents host life.\n\n## Discovery Story\n\nAlvin found them.";
        let generator = ScriptedGenerator::new().with("revised_body", json!({"body": broken}));
        let settings = settings();
        let drafter = Drafter {
            generator: &generator,
            settings: &settings,
            progress: &SilentProgress,
        };
        let finding = ReviewFinding {
            issues: vec!["paragraph 2 misdates the dive".into()],
            ..ReviewFinding::clean()
        };

        let d = draft(CLEAN_BODY);
        let revised = drafter
            .revise(ReviewPass::Fact, &d, &finding)
            .await
            .expect("revise");
        assert_eq!(revised, d);

        let requests = generator.requests_for("revised_body");
        assert_eq!(requests.len(), 2);
        let correction = &requests[1].context.last().expect("correction").content;
        assert!(correction.contains("## The Discovery"));
        assert!(correction.contains("## Why It Matters"));
    }

    #[tokio::test]
    async fn corrected_outline_is_accepted() {
        let broken = "Intro.\n\n## Discovery Story\n\nText.";
        let fixed = "Intro fixed.\n\n## The Discovery\n\nAlvin found them in 1979.\n\n## Why It Matters\n\nText.";
        let generator = ScriptedGenerator::new()
            .with("revised_body", json!({"body": broken}))
            .with("revised_body", json!({"body": fixed}));
        let settings = settings();
        let drafter = Drafter {
            generator: &generator,
            settings: &settings,
            progress: &SilentProgress,
        };
        let finding = ReviewFinding {
            issues: vec!["paragraph 2 misdates the dive".into()],
            ..ReviewFinding::clean()
        };

        let revised = drafter
            .revise(ReviewPass::Fact, &draft(CLEAN_BODY), &finding)
            .await
            .expect("revise");
        assert_eq!(revised.body, fixed);
    }

    #[tokio::test]
    async fn feedback_reaches_the_drafting_request() {
        let note = "missing attribution in paragraph 2";
        let generator = ScriptedGenerator::new()
            .with("draft", draft_json(CLEAN_BODY))
            .with("review_finding", review_json(&[]));
        let settings = settings();
        let drafter = Drafter {
            generator: &generator,
            settings: &settings,
            progress: &SilentProgress,
        };
        let feedback = newsroom_shared::ApprovalDecision {
            approved: false,
            notes: vec![note.into()],
        }
        .feedback();

        drafter.run(input(Some(&feedback))).await.expect("draft");
        let request = &generator.requests_for("draft")[0];
        assert!(request.context.iter().any(|m| m.content.contains(note)));
        assert_eq!(request.model.model, "reasoning-model");
        assert_eq!(request.model.reasoning_effort.as_deref(), Some("medium"));
    }

    #[test]
    fn lint_respects_reviewer_mentions() {
        let mut finding = ReviewFinding {
            issues: vec!["Em dash in the lead".into()],
            ..ReviewFinding::clean()
        };
        lint_long_dashes(&mut finding, BODY);
        assert_eq!(finding.issues.len(), 1);

        let mut clean = ReviewFinding::clean();
        lint_long_dashes(&mut clean, CLEAN_BODY);
        assert!(clean.issues.is_empty());
    }
}
