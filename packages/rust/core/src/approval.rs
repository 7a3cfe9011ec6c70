//! Approval gate: terminal accept/reject decision.

use async_trait::async_trait;
use tracing::info;

use newsroom_providers::{Generator, Message};
use newsroom_shared::{
    ApprovalDecision, Assignment, FinalArtifact, GenerationSettings, ModelTier, Result,
    is_actionable_note,
};

use crate::prompts;
use crate::stage::{Stage, StageKind, generate};

#[derive(Debug, Clone)]
pub struct ApprovalInput {
    pub assignment: Assignment,
    pub article: FinalArtifact,
}

pub struct Approver<'a> {
    pub generator: &'a dyn Generator,
    pub settings: &'a GenerationSettings,
}

#[async_trait]
impl Stage for Approver<'_> {
    const KIND: StageKind = StageKind::Approval;
    type Input = ApprovalInput;
    type Output = ApprovalDecision;

    async fn run(&self, input: ApprovalInput) -> Result<ApprovalDecision> {
        let mut decision: ApprovalDecision = generate(
            self.generator,
            self.settings,
            ModelTier::Reasoning,
            &prompts::approval(),
            vec![
                Message::user(prompts::assignment_block(&input.assignment)),
                Message::user(prompts::article_block(&input.article)),
            ],
        )
        .await?;

        if !decision.approved {
            // Vague notes are not useful feedback for the next draft.
            decision.notes.retain(|n| is_actionable_note(n));
        }
        info!(
            approved = decision.approved,
            notes = decision.notes.len(),
            "approval decision"
        );
        Ok(decision)
    }
}
