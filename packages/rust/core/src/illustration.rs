//! Hero image: prompt generation, then rendering. Rendering failures are not fatal.

use async_trait::async_trait;
use tracing::{info, warn};

use newsroom_providers::{Generator, ImageGenerator, Message};
use newsroom_shared::{
    Assignment, FinalArtifact, GenerationSettings, ImageSettings, ModelTier, Result,
};

use crate::contracts::ImagePrompt;
use crate::prompts;
use crate::stage::{Stage, StageKind, generate};

/// Photographic style appended to every image prompt.
pub const STYLE_SUFFIX: &str =
    ", 4k, professional photography, cinematic lighting. --ar 16:9";

#[derive(Debug, Clone)]
pub struct IllustrationInput {
    pub assignment: Assignment,
    pub article: FinalArtifact,
}

/// The full prompt sent for rendering and the PNG, when rendering succeeded.
#[derive(Debug, Clone)]
pub struct Illustration {
    pub prompt: String,
    pub png: Option<Vec<u8>>,
}

pub struct Illustrator<'a> {
    pub generator: &'a dyn Generator,
    pub settings: &'a GenerationSettings,
    pub images: &'a dyn ImageGenerator,
    pub image: &'a ImageSettings,
}

#[async_trait]
impl Stage for Illustrator<'_> {
    const KIND: StageKind = StageKind::Illustration;
    type Input = IllustrationInput;
    type Output = Illustration;

    async fn run(&self, input: IllustrationInput) -> Result<Illustration> {
        let described: ImagePrompt = generate(
            self.generator,
            self.settings,
            ModelTier::Mini,
            &prompts::image_prompt(),
            vec![
                Message::user(prompts::assignment_block(&input.assignment)),
                Message::user(prompts::article_block(&input.article)),
            ],
        )
        .await?;

        let prompt = full_prompt(&described.prompt, &input.assignment.image_people_policy);

        if !self.image.enabled {
            info!("image rendering disabled, keeping prompt only");
            return Ok(Illustration { prompt, png: None });
        }

        let png = match self.images.generate(&prompt, self.image).await {
            Ok(bytes) => {
                info!(bytes = bytes.len(), "hero image rendered");
                Some(bytes)
            }
            Err(e) => {
                warn!(error = %e, "image generation failed, continuing without an image");
                None
            }
        };
        Ok(Illustration { prompt, png })
    }
}

/// Description + people policy + style suffix.
pub fn full_prompt(description: &str, people_policy: &str) -> String {
    let description = description.trim().trim_end_matches('.');
    let policy = people_policy.trim();
    if policy.is_empty() {
        format!("{description}{STYLE_SUFFIX}")
    } else {
        format!("{description}. {policy}{STYLE_SUFFIX}")
    }
}
