//! Planning: idea → Assignment.

use async_trait::async_trait;
use tracing::info;

use newsroom_markdown::slugify;
use newsroom_providers::{Generator, Message};
use newsroom_shared::{
    Assignment, DEFAULT_PEOPLE_POLICY, GenerationSettings, ModelTier, NewsroomError, Result,
};

use crate::contracts::AssignmentPlan;
use crate::prompts;
use crate::stage::{Stage, StageKind, generate};

/// Words of the topic kept in the slug.
pub const SLUG_WORDS: usize = 5;

pub struct Planner<'a> {
    pub generator: &'a dyn Generator,
    pub settings: &'a GenerationSettings,
}

#[async_trait]
impl Stage for Planner<'_> {
    const KIND: StageKind = StageKind::Planning;
    type Input = String;
    type Output = Assignment;

    async fn run(&self, idea: String) -> Result<Assignment> {
        if idea.trim().is_empty() {
            return Err(NewsroomError::validation("the idea is empty"));
        }

        let plan: AssignmentPlan = generate(
            self.generator,
            self.settings,
            ModelTier::Smart,
            &prompts::planning(),
            vec![Message::user(format!("Idea: {}", idea.trim()))],
        )
        .await?;

        let assignment = into_assignment(plan)?;
        info!(slug = %assignment.slug, category = %assignment.category, "assignment planned");
        Ok(assignment)
    }
}

/// Derive the slug and apply the default people policy.
fn into_assignment(plan: AssignmentPlan) -> Result<Assignment> {
    let slug = slugify(&plan.topic, SLUG_WORDS);
    if slug.is_empty() {
        return Err(NewsroomError::validation(format!(
            "topic '{}' yields an empty slug",
            plan.topic
        )));
    }

    let assignment = Assignment {
        topic: plan.topic.trim().to_string(),
        angle: plan.angle.trim().to_string(),
        category: plan.category,
        length_class: plan.length_class,
        key_questions: plan
            .key_questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .collect(),
        slug,
        image_people_policy: plan
            .image_people_policy
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PEOPLE_POLICY.to_string()),
    };
    assignment.validate()?;
    Ok(assignment)
}
