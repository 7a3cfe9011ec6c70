//! Polishing: Draft → FinalArtifact.

use async_trait::async_trait;
use chrono::Local;
use tracing::{info, warn};

use newsroom_markdown::{heading_outline, same_outline};
use newsroom_providers::{Generator, Message};
use newsroom_shared::{Assignment, Draft, FinalArtifact, GenerationSettings, ModelTier, Result};

use crate::contracts::PolishedArticle;
use crate::prompts;
use crate::stage::{Stage, StageKind, generate};

#[derive(Debug, Clone)]
pub struct PolishingInput {
    pub assignment: Assignment,
    pub draft: Draft,
}

pub struct Polisher<'a> {
    pub generator: &'a dyn Generator,
    pub settings: &'a GenerationSettings,
}

#[async_trait]
impl Stage for Polisher<'_> {
    const KIND: StageKind = StageKind::Polishing;
    type Input = PolishingInput;
    type Output = FinalArtifact;

    async fn run(&self, input: PolishingInput) -> Result<FinalArtifact> {
        let polished: PolishedArticle = generate(
            self.generator,
            self.settings,
            ModelTier::Smart,
            &prompts::polishing(),
            vec![
                Message::user(prompts::assignment_block(&input.assignment)),
                Message::user(prompts::draft_block(&input.draft)),
            ],
        )
        .await?;

        if !same_outline(&input.draft.body, &polished.body) {
            warn!(
                before = heading_outline(&input.draft.body).len(),
                after = heading_outline(&polished.body).len(),
                "copy edit changed the section outline"
            );
        }

        let article = FinalArtifact {
            headline: polished.headline.trim().to_string(),
            subheading: polished
                .subheading
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            body: polished.body,
            publish_date: Some(Local::now().date_naive()),
        };
        info!(headline = %article.headline, "article polished");
        Ok(article)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedGenerator, assignment, settings};
    use newsroom_shared::LengthClass;
    use serde_json::json;

    #[tokio::test]
    async fn stamps_local_date_and_drops_blank_subheading() {
        let generator = ScriptedGenerator::new().with(
            "polished_article",
            json!({"headline": " Life Without Sun ", "subheading": "  ", "body": "## One\n\nText."}),
        );
        let settings = settings();
        let polisher = Polisher {
            generator: &generator,
            settings: &settings,
        };
        let article = polisher
            .run(PolishingInput {
                assignment: assignment(LengthClass::ShortForm),
                draft: Draft {
                    body: "## One\n\nText!".into(),
                    sources: vec![],
                    source_narrative: String::new(),
                },
            })
            .await
            .expect("polish");

        assert_eq!(article.headline, "Life Without Sun");
        assert_eq!(article.subheading, None);
        assert_eq!(article.publish_date, Some(Local::now().date_naive()));
    }
}
