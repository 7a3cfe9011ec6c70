//! Pipeline sequencer: idea → assignment → evidence → draft → article → image
//! → decision, with a bounded reject-to-redraft cycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use newsroom_artifacts::{
    render_approval, render_assignment, render_draft, render_evidence, render_final,
    render_review,
};
use newsroom_providers::{Extractor, Generator, ImageGenerator, SearchProvider};
use newsroom_shared::{
    ApprovalDecision, ArtifactKind, Assignment, Draft, EvidenceCollection, FinalArtifact,
    HeroImage, NewsroomError, PipelineConfig, Result, ReviewPass,
};
use newsroom_storage::RunRecord;

use crate::approval::{ApprovalInput, Approver};
use crate::drafting::{DraftOutcome, Drafter, DraftingInput};
use crate::illustration::{IllustrationInput, Illustrator};
use crate::planning::Planner;
use crate::polishing::{Polisher, PolishingInput};
use crate::progress::ProgressReporter;
use crate::recorder::{ArtifactRecorder, HERO_IMAGE_FILE};
use crate::research::{ResearchOutcome, Researcher};
use crate::stage::run_stage;

/// External services the stages call.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub search: Vec<Arc<dyn SearchProvider>>,
    pub extractor: Arc<dyn Extractor>,
    pub images: Arc<dyn ImageGenerator>,
}

/// How an end-to-end run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Approved {
        slug: String,
        article: FinalArtifact,
        hero: HeroImage,
        /// Drafting attempts, including the first.
        attempts: u32,
    },
    /// Redrafts exhausted. Never published.
    Rejected {
        slug: String,
        notes: Vec<String>,
        attempts: u32,
    },
}

impl RunOutcome {
    pub fn slug(&self) -> &str {
        match self {
            Self::Approved { slug, .. } | Self::Rejected { slug, .. } => slug,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Approved { attempts, .. } | Self::Rejected { attempts, .. } => *attempts,
        }
    }
}

/// The pipeline, built once per invocation.
pub struct Newsroom {
    config: PipelineConfig,
    collab: Collaborators,
    recorder: ArtifactRecorder,
    progress: Arc<dyn ProgressReporter>,
}

impl Newsroom {
    pub fn new(
        config: PipelineConfig,
        collab: Collaborators,
        recorder: ArtifactRecorder,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            config,
            collab,
            recorder,
            progress,
        }
    }

    pub fn recorder(&self) -> &ArtifactRecorder {
        &self.recorder
    }

    // -----------------------------------------------------------------------
    // End-to-end run
    // -----------------------------------------------------------------------

    /// Run every stage for `idea`. Rejections re-enter drafting with the
    /// reviewer's notes until `max_redrafts` is spent.
    #[instrument(skip_all, fields(idea = %idea))]
    pub async fn run(&self, idea: &str) -> Result<RunOutcome> {
        let start = Instant::now();
        let mut record = RunRecord::start(idea);
        self.record_run(&record).await;

        let result = self.run_inner(idea, &mut record).await;

        match &result {
            Ok(RunOutcome::Approved { attempts, .. }) => {
                record.finish("approved", *attempts, Vec::new());
            }
            Ok(RunOutcome::Rejected {
                notes, attempts, ..
            }) => {
                record.finish("rejected", *attempts, notes.clone());
            }
            Err(e) => {
                let attempts = record.attempts;
                record.finish("failed", attempts, vec![e.to_string()]);
            }
        }
        self.record_run(&record).await;

        info!(
            outcome = %record.outcome,
            attempts = record.attempts,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run finished"
        );
        result
    }

    async fn run_inner(&self, idea: &str, record: &mut RunRecord) -> Result<RunOutcome> {
        let assignment = self.plan(idea).await?;
        record.slug = Some(assignment.slug.clone());
        self.record_run(record).await;

        let research = self.gather(&assignment).await?;
        let evidence = research.evidence;

        let mut feedback: Option<String> = None;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            record.attempts = attempts;

            let drafted = self
                .write(&assignment, &evidence, feedback.take())
                .await?;
            let article = self.copy_edit(&assignment, drafted.draft().clone()).await?;
            let hero = self.illustrate_article(&assignment, &article).await?;
            let decision = self.decide(&assignment, &article).await?;

            if decision.approved {
                return Ok(RunOutcome::Approved {
                    slug: assignment.slug.clone(),
                    article,
                    hero,
                    attempts,
                });
            }

            if attempts > self.config.max_redrafts {
                warn!(
                    attempts,
                    max_redrafts = self.config.max_redrafts,
                    "redrafts exhausted, article rejected"
                );
                return Ok(RunOutcome::Rejected {
                    slug: assignment.slug.clone(),
                    notes: decision.notes,
                    attempts,
                });
            }

            info!(attempt = attempts, notes = decision.notes.len(), "article rejected, redrafting");
            self.progress.redraft(attempts, self.config.max_redrafts);
            feedback = Some(decision.feedback());
        }
    }

    // -----------------------------------------------------------------------
    // Standalone stages
    // -----------------------------------------------------------------------

    /// Plan an assignment from a raw idea.
    pub async fn assign(&self, idea: &str) -> Result<Assignment> {
        self.plan(idea).await
    }

    /// Research a planned assignment.
    pub async fn research(&self, slug: &str) -> Result<ResearchOutcome> {
        let assignment: Assignment = self.recorder.load(ArtifactKind::Assignment, slug).await?;
        self.gather(&assignment).await
    }

    /// Draft from stored research, optionally with editorial feedback.
    pub async fn draft(&self, slug: &str, feedback: Option<String>) -> Result<DraftOutcome> {
        let assignment: Assignment = self.recorder.load(ArtifactKind::Assignment, slug).await?;
        let evidence: EvidenceCollection = self.recorder.load(ArtifactKind::Evidence, slug).await?;
        self.write(&assignment, &evidence, feedback).await
    }

    /// Redraft using the notes of the stored rejection.
    pub async fn draft_from_rejection(&self, slug: &str) -> Result<DraftOutcome> {
        let decision: ApprovalDecision = self.recorder.load(ArtifactKind::Approval, slug).await?;
        if decision.approved {
            return Err(NewsroomError::validation(format!(
                "the stored decision for '{slug}' is an approval; nothing to redraft"
            )));
        }
        self.draft(slug, Some(decision.feedback())).await
    }

    /// Copy-edit the stored draft.
    pub async fn polish(&self, slug: &str) -> Result<FinalArtifact> {
        let assignment: Assignment = self.recorder.load(ArtifactKind::Assignment, slug).await?;
        let draft: Draft = self.recorder.load(ArtifactKind::Draft, slug).await?;
        self.copy_edit(&assignment, draft).await
    }

    /// Generate the hero image for the stored article.
    pub async fn illustrate(&self, slug: &str) -> Result<HeroImage> {
        let assignment: Assignment = self.recorder.load(ArtifactKind::Assignment, slug).await?;
        let article: FinalArtifact = self.recorder.load(ArtifactKind::FinalArtifact, slug).await?;
        self.illustrate_article(&assignment, &article).await
    }

    /// Run the approval gate over the stored article.
    pub async fn approve(&self, slug: &str) -> Result<ApprovalDecision> {
        let assignment: Assignment = self.recorder.load(ArtifactKind::Assignment, slug).await?;
        let article: FinalArtifact = self.recorder.load(ArtifactKind::FinalArtifact, slug).await?;
        self.decide(&assignment, &article).await
    }

    // -----------------------------------------------------------------------
    // Stage runners: run, then record
    // -----------------------------------------------------------------------

    async fn plan(&self, idea: &str) -> Result<Assignment> {
        let planner = Planner {
            generator: self.collab.generator.as_ref(),
            settings: &self.config.generation,
        };
        let assignment = run_stage(&planner, idea.to_string(), self.progress.as_ref()).await?;
        self.recorder
            .record(
                &assignment.slug,
                ArtifactKind::Assignment,
                &assignment,
                &render_assignment(&assignment),
            )
            .await?;
        Ok(assignment)
    }

    async fn gather(&self, assignment: &Assignment) -> Result<ResearchOutcome> {
        let researcher = Researcher {
            generator: self.collab.generator.as_ref(),
            settings: &self.config.generation,
            config: &self.config.research,
            search: &self.collab.search,
            extractor: self.collab.extractor.as_ref(),
            progress: self.progress.as_ref(),
        };
        let outcome = run_stage(&researcher, assignment.clone(), self.progress.as_ref()).await?;
        self.recorder
            .record(
                &assignment.slug,
                ArtifactKind::Evidence,
                &outcome.evidence,
                &render_evidence(&outcome.evidence),
            )
            .await?;
        Ok(outcome)
    }

    async fn write(
        &self,
        assignment: &Assignment,
        evidence: &EvidenceCollection,
        feedback: Option<String>,
    ) -> Result<DraftOutcome> {
        let drafter = Drafter {
            generator: self.collab.generator.as_ref(),
            settings: &self.config.generation,
            progress: self.progress.as_ref(),
        };
        let input = DraftingInput {
            assignment: assignment.clone(),
            evidence: evidence.clone(),
            feedback,
        };
        let outcome = run_stage(&drafter, input, self.progress.as_ref()).await?;

        let slug = assignment.slug.as_str();
        let drafts = [
            (ArtifactKind::DraftInitial, "Initial draft", &outcome.initial),
            (ArtifactKind::DraftAfterFact, "After fact revision", &outcome.after_fact),
            (ArtifactKind::DraftAfterStyle, "After style revision", &outcome.after_style),
            (ArtifactKind::Draft, "Draft", outcome.draft()),
        ];
        for (kind, title, draft) in drafts {
            self.recorder
                .record(slug, kind, draft, &render_draft(title, draft))
                .await?;
        }
        self.recorder
            .record(
                slug,
                ArtifactKind::FactReview,
                &outcome.fact_review,
                &render_review(ReviewPass::Fact, &outcome.fact_review),
            )
            .await?;
        self.recorder
            .record(
                slug,
                ArtifactKind::StyleReview,
                &outcome.style_review,
                &render_review(ReviewPass::Style, &outcome.style_review),
            )
            .await?;
        Ok(outcome)
    }

    async fn copy_edit(&self, assignment: &Assignment, draft: Draft) -> Result<FinalArtifact> {
        let polisher = Polisher {
            generator: self.collab.generator.as_ref(),
            settings: &self.config.generation,
        };
        let input = PolishingInput {
            assignment: assignment.clone(),
            draft,
        };
        let article = run_stage(&polisher, input, self.progress.as_ref()).await?;
        self.recorder
            .record(
                &assignment.slug,
                ArtifactKind::FinalArtifact,
                &article,
                &render_final(&article),
            )
            .await?;
        Ok(article)
    }

    async fn illustrate_article(
        &self,
        assignment: &Assignment,
        article: &FinalArtifact,
    ) -> Result<HeroImage> {
        let illustrator = Illustrator {
            generator: self.collab.generator.as_ref(),
            settings: &self.config.generation,
            images: self.collab.images.as_ref(),
            image: &self.config.image,
        };
        let input = IllustrationInput {
            assignment: assignment.clone(),
            article: article.clone(),
        };
        let illustration = run_stage(&illustrator, input, self.progress.as_ref()).await?;

        let slug = assignment.slug.as_str();
        let path: Option<PathBuf> = match &illustration.png {
            Some(png) => self.recorder.write_file(slug, HERO_IMAGE_FILE, png)?,
            None => None,
        };
        let hero = HeroImage {
            prompt: illustration.prompt,
            path: path.map(|p| p.display().to_string()),
        };
        self.recorder
            .record(
                slug,
                ArtifactKind::ImagePrompt,
                &hero,
                &format!("{}\n", hero.prompt),
            )
            .await?;
        Ok(hero)
    }

    async fn decide(
        &self,
        assignment: &Assignment,
        article: &FinalArtifact,
    ) -> Result<ApprovalDecision> {
        let approver = Approver {
            generator: self.collab.generator.as_ref(),
            settings: &self.config.generation,
        };
        let input = ApprovalInput {
            assignment: assignment.clone(),
            article: article.clone(),
        };
        let decision = run_stage(&approver, input, self.progress.as_ref()).await?;
        self.recorder
            .record(
                &assignment.slug,
                ArtifactKind::Approval,
                &decision,
                &render_approval(&decision),
            )
            .await?;
        Ok(decision)
    }

    /// Run history is best-effort; a failing write never fails the run.
    async fn record_run(&self, record: &RunRecord) {
        if let Err(e) = self.recorder.store().record_run(record).await {
            warn!(error = %e, "could not record run history");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::test_support::{
        FAKE_PNG, ScriptedGenerator, StubExtractor, StubImage, StubSearch, pipeline_config,
    };
    use newsroom_storage::{ArtifactStore, MemoryStore};
    use serde_json::{Value, json};

    const BODY: &str = "Vents host life.\n\n## The Discovery\n\nAlvin found them in 1977.";
    const NOTE: &str = "missing attribution in paragraph 2";

    /// Scripted through drafting.
    fn scripted_until_polish() -> ScriptedGenerator {
        ScriptedGenerator::new()
            .with(
                "assignment",
                json!({
                    "topic": "Hydrothermal vents",
                    "angle": "Life without sunlight",
                    "category": "Science",
                    "length_class": "short_form",
                    "key_questions": ["What lives there?", "How do they eat?", "Why does it matter?"],
                    "image_people_policy": null
                }),
            )
            .with("query_batch", json!({"queries": ["hydrothermal vents life"]}))
            .with(
                "url_selection",
                json!({"urls": ["https://a.test/1", "https://b.test/2"], "reasoning": "primary"}),
            )
            .with(
                "turn_evaluation",
                json!({
                    "new_items": [
                        {"source": "https://a.test/1", "content": "Vents were found in 1977.", "relevance": "history", "kind": "fact"},
                        {"source": "https://b.test/2", "content": "Tube worms host bacteria.", "relevance": "biology", "kind": "fact"}
                    ],
                    "summary": "Discovery and biology covered."
                }),
            )
            .with(
                "draft",
                json!({"body": BODY, "sources": ["https://a.test/1"], "source_narrative": "Expedition logs."}),
            )
            .with("review_finding", json!({"issues": [], "scores": []}))
    }

    /// Scripted for every stage except approval.
    fn scripted() -> ScriptedGenerator {
        scripted_until_polish()
            .with(
                "polished_article",
                json!({"headline": "Life Without Sun", "subheading": null, "body": BODY}),
            )
            .with("image_prompt", json!({"prompt": "A black smoker on the sea floor"}))
    }

    fn approve() -> Value {
        json!({"approved": true, "notes": []})
    }

    fn reject() -> Value {
        json!({"approved": false, "notes": [NOTE]})
    }

    fn newsroom(
        generator: ScriptedGenerator,
        store: Arc<MemoryStore>,
        output_dir: Option<PathBuf>,
    ) -> (Newsroom, Arc<ScriptedGenerator>) {
        let generator = Arc::new(generator);
        let collab = Collaborators {
            generator: generator.clone(),
            search: vec![Arc::new(StubSearch::with_hits(&[
                "https://a.test/1",
                "https://b.test/2",
            ]))],
            extractor: Arc::new(StubExtractor::default()),
            images: Arc::new(StubImage::ok()),
        };
        let mut config = pipeline_config();
        config.output_dir = output_dir.clone();
        let recorder = ArtifactRecorder::new(store, output_dir);
        (
            Newsroom::new(config, collab, recorder, Arc::new(SilentProgress)),
            generator,
        )
    }

    #[tokio::test]
    async fn end_to_end_run_is_approved_and_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (room, generator) = newsroom(
            scripted().with("approval_decision", approve()),
            store.clone(),
            Some(tmp.path().to_path_buf()),
        );

        let outcome = room.run("life at deep sea vents").await.unwrap();
        let RunOutcome::Approved {
            slug,
            article,
            hero,
            attempts,
        } = outcome
        else {
            panic!("expected approval");
        };
        assert_eq!(slug, "hydrothermal_vents");
        assert_eq!(attempts, 1);
        assert_eq!(article.headline, "Life Without Sun");
        assert!(hero.path.is_some());

        // Clean reviews make no revision calls.
        assert_eq!(generator.calls("revised_body"), 0);
        assert_eq!(store.kinds(&slug).await.unwrap().len(), ArtifactKind::ALL.len());

        let dir = tmp.path().join(&slug);
        assert_eq!(std::fs::read(dir.join(HERO_IMAGE_FILE)).unwrap(), FAKE_PNG);
        assert!(dir.join("final_article.md").exists());
        assert!(dir.join("manifest.json").exists());

        let runs = store.list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].outcome, "approved");
        assert_eq!(runs[0].slug.as_deref(), Some("hydrothermal_vents"));
    }

    #[tokio::test]
    async fn rejection_notes_reach_the_next_draft() {
        let store = Arc::new(MemoryStore::new());
        let (room, generator) = newsroom(
            scripted()
                .with("approval_decision", reject())
                .with("approval_decision", approve()),
            store,
            None,
        );

        let outcome = room.run("life at deep sea vents").await.unwrap();
        assert!(matches!(outcome, RunOutcome::Approved { attempts: 2, .. }));

        let drafts = generator.requests_for("draft");
        assert_eq!(drafts.len(), 2);
        assert!(!drafts[0].context.iter().any(|m| m.content.contains(NOTE)));
        assert!(drafts[1].context.iter().any(|m| m.content.contains(NOTE)));
        // Research ran once; the redraft reused its evidence.
        assert_eq!(generator.calls("query_batch"), 1);
    }

    #[tokio::test]
    async fn exhausted_redrafts_end_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (room, generator) = newsroom(
            scripted().with("approval_decision", reject()),
            store.clone(),
            None,
        );

        let outcome = room.run("life at deep sea vents").await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Rejected {
                slug: "hydrothermal_vents".into(),
                notes: vec![NOTE.into()],
                attempts: 3,
            }
        );
        assert_eq!(generator.calls("draft"), 3);

        let runs = store.list_runs(10).await.unwrap();
        assert_eq!(runs[0].outcome, "rejected");
        assert_eq!(runs[0].notes, vec![NOTE.to_string()]);
    }

    #[tokio::test]
    async fn stage_failure_does_not_redraft() {
        let store = Arc::new(MemoryStore::new());
        let (room, generator) = newsroom(
            scripted_until_polish()
                .with_failure("polished_article", "refused")
                .with("approval_decision", approve()),
            store.clone(),
            None,
        );

        let err = room.run("life at deep sea vents").await.unwrap_err();
        assert!(matches!(err, NewsroomError::Stage { .. }));
        assert_eq!(generator.calls("draft"), 1);
        assert_eq!(generator.calls("approval_decision"), 0);

        let runs = store.list_runs(10).await.unwrap();
        assert_eq!(runs[0].outcome, "failed");
    }

    #[tokio::test]
    async fn standalone_stage_reports_missing_upstream() {
        let store = Arc::new(MemoryStore::new());
        let (room, _) = newsroom(scripted(), store, None);

        let err = room.polish("nothing_here").await.unwrap_err();
        assert!(matches!(err, NewsroomError::NotFound { .. }));
        assert!(err.to_string().contains("assign"));
    }

    #[tokio::test]
    async fn standalone_stages_chain_through_the_store() {
        let store = Arc::new(MemoryStore::new());
        let (room, generator) = newsroom(
            scripted()
                .with("approval_decision", reject())
                .with("approval_decision", approve()),
            store,
            None,
        );

        let a = room.assign("life at deep sea vents").await.unwrap();
        room.research(&a.slug).await.unwrap();
        room.draft(&a.slug, None).await.unwrap();
        room.polish(&a.slug).await.unwrap();
        room.illustrate(&a.slug).await.unwrap();
        let decision = room.approve(&a.slug).await.unwrap();
        assert!(!decision.approved);

        room.draft_from_rejection(&a.slug).await.unwrap();
        let drafts = generator.requests_for("draft");
        assert!(drafts[1].context.iter().any(|m| m.content.contains(NOTE)));

        room.polish(&a.slug).await.unwrap();
        assert!(room.approve(&a.slug).await.unwrap().approved);
        assert!(room.draft_from_rejection(&a.slug).await.is_err());
    }
}
