//! Stage contract and the validated generation helper.

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};

use newsroom_providers::{GenerationRequest, Generator, Message, OutputSchema};
use newsroom_shared::{GenerationSettings, ModelTier, NewsroomError, Result};

use crate::contracts::OutputContract;
use crate::progress::ProgressReporter;

// ---------------------------------------------------------------------------
// Stage contract
// ---------------------------------------------------------------------------

/// Pipeline stages, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Planning,
    Research,
    Drafting,
    Polishing,
    Illustration,
    Approval,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Research => "research",
            Self::Drafting => "drafting",
            Self::Polishing => "polishing",
            Self::Illustration => "illustration",
            Self::Approval => "approval",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transformation step: structured input in, structured output out.
///
/// Stages hold only borrowed collaborators and configuration; everything that
/// changes between runs is passed in `Input`.
#[async_trait]
pub trait Stage: Send + Sync {
    const KIND: StageKind;
    type Input: Send;
    type Output: Send;

    async fn run(&self, input: Self::Input) -> Result<Self::Output>;
}

/// Run a stage inside its tracing span, reporting progress and tagging errors
/// with the stage name.
pub async fn run_stage<S: Stage>(
    stage: &S,
    input: S::Input,
    progress: &dyn ProgressReporter,
) -> Result<S::Output> {
    let kind = S::KIND;
    let span = info_span!("stage", stage = kind.as_str());
    let start = Instant::now();

    progress.stage_started(kind);
    let result = stage.run(input).instrument(span).await;

    match result {
        Ok(output) => {
            info!(stage = %kind, elapsed_ms = start.elapsed().as_millis() as u64, "stage complete");
            progress.stage_finished(kind);
            Ok(output)
        }
        Err(e) => Err(e.in_stage(kind.as_str())),
    }
}

// ---------------------------------------------------------------------------
// Validated generation
// ---------------------------------------------------------------------------

/// Invoke the generator for contract `T`, validate the output and parse it.
///
/// Schema, parse and `check()` failures are retried up to
/// `settings.validation_retries` times with the failure appended to the
/// context. Transport failures are returned at once.
pub async fn generate<T: OutputContract>(
    generator: &dyn Generator,
    settings: &GenerationSettings,
    tier: ModelTier,
    instructions: &str,
    context: Vec<Message>,
) -> Result<T> {
    let schema: Value = serde_json::from_str(T::SCHEMA)
        .map_err(|e| NewsroomError::generation(T::NAME, format!("contract schema is invalid: {e}")))?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| NewsroomError::generation(T::NAME, format!("contract schema is invalid: {e}")))?;

    let mut request = GenerationRequest {
        instructions: instructions.to_string(),
        context,
        output: OutputSchema {
            name: T::NAME.to_string(),
            schema,
        },
        model: settings.select(tier),
    };

    let attempts = settings.validation_retries + 1;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        let raw = match generator.invoke(&request).await {
            Ok(value) => value,
            Err(NewsroomError::Generation { message, .. }) => {
                warn!(contract = T::NAME, attempt, error = %message, "unusable generation output");
                last_error = message;
                request.context.push(Message::user(retry_note(&last_error)));
                continue;
            }
            Err(other) => return Err(other),
        };

        match parse::<T>(&validator, &raw) {
            Ok(parsed) => {
                debug!(contract = T::NAME, attempt, "generation validated");
                return Ok(parsed);
            }
            Err(message) => {
                warn!(contract = T::NAME, attempt, error = %message, "generation failed validation");
                request.context.push(Message::assistant(raw.to_string()));
                request.context.push(Message::user(retry_note(&message)));
                last_error = message;
            }
        }
    }

    Err(NewsroomError::generation(
        T::NAME,
        format!("no valid output after {attempts} attempt(s): {last_error}"),
    ))
}

fn parse<T: OutputContract>(
    validator: &jsonschema::Validator,
    raw: &Value,
) -> std::result::Result<T, String> {
    if !validator.is_valid(raw) {
        let errors: Vec<String> = validator.iter_errors(raw).map(|e| e.to_string()).collect();
        return Err(format!("schema violations: {}", errors.join("; ")));
    }
    let parsed: T = serde_json::from_value(raw.clone()).map_err(|e| format!("parse failed: {e}"))?;
    parsed.check().map_err(|e| e.to_string())?;
    Ok(parsed)
}

fn retry_note(problem: &str) -> String {
    format!(
        "Your previous output was rejected: {problem}\nReturn output that satisfies the schema and these rules."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::QueryBatch;
    use crate::progress::SilentProgress;
    use crate::test_support::{ScriptedGenerator, settings};
    use serde_json::json;

    #[tokio::test]
    async fn valid_output_parses_first_time() {
        let generator =
            ScriptedGenerator::new().with("query_batch", json!({"queries": ["deep sea vents"]}));
        let batch: QueryBatch = generate(
            &generator,
            &settings(),
            ModelTier::Mini,
            "brief",
            vec![Message::user("topic")],
        )
        .await
        .expect("generate");
        assert_eq!(batch.queries, vec!["deep sea vents"]);
        assert_eq!(generator.calls("query_batch"), 1);
        assert_eq!(generator.requests()[0].model.model, "mini-model");
    }

    #[tokio::test]
    async fn schema_violation_is_retried_once_with_the_reason() {
        let generator = ScriptedGenerator::new()
            .with("query_batch", json!({"queries": []}))
            .with("query_batch", json!({"queries": ["vents"]}));
        let batch: QueryBatch =
            generate(&generator, &settings(), ModelTier::Mini, "brief", vec![])
                .await
                .expect("second attempt valid");
        assert_eq!(batch.queries, vec!["vents"]);

        let requests = generator.requests();
        assert_eq!(requests.len(), 2);
        let retry = &requests[1].context;
        assert!(retry.last().expect("note").content.contains("previous output was rejected"));
    }

    #[tokio::test]
    async fn exhausted_retries_are_generation_errors() {
        let generator = ScriptedGenerator::new().with("query_batch", json!({"wrong": true}));
        let err = generate::<QueryBatch>(&generator, &settings(), ModelTier::Mini, "b", vec![])
            .await
            .expect_err("invalid twice");
        assert!(matches!(err, NewsroomError::Generation { ref contract, .. } if contract == "query_batch"));
        assert_eq!(generator.calls("query_batch"), 2);
    }

    #[tokio::test]
    async fn transport_errors_are_not_retried() {
        let generator = ScriptedGenerator::new().failing_network("down");
        let err = generate::<QueryBatch>(&generator, &settings(), ModelTier::Mini, "b", vec![])
            .await
            .expect_err("network");
        assert!(matches!(err, NewsroomError::Network(_)));
        assert_eq!(generator.requests().len(), 1);
    }

    struct Failing;

    #[async_trait]
    impl Stage for Failing {
        const KIND: StageKind = StageKind::Polishing;
        type Input = ();
        type Output = ();

        async fn run(&self, _input: ()) -> Result<()> {
            Err(NewsroomError::validation("boom"))
        }
    }

    #[tokio::test]
    async fn run_stage_tags_errors() {
        let err = run_stage(&Failing, (), &SilentProgress).await.expect_err("fails");
        match err {
            NewsroomError::Stage { stage, .. } => assert_eq!(stage, "polishing"),
            other => panic!("expected stage error, got {other:?}"),
        }
    }
}
