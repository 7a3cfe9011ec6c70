//! Turn-bounded research loop.
//!
//! Each turn: generate queries → search every provider → curate → extract →
//! evaluate. The loop continues only while the evidence is insufficient and
//! turns remain. Search and extraction failures are logged and skipped;
//! generation failures abort the stage.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use newsroom_markdown::truncate_chars;
use newsroom_providers::{Extractor, Generator, Message, SearchHit, SearchProvider};
use newsroom_shared::{
    Assignment, EvidenceCollection, GenerationSettings, ModelTier, ResearchConfig, Result,
};

use crate::contracts::{QueryBatch, TurnEvaluation, UrlSelection};
use crate::curation;
use crate::progress::ProgressReporter;
use crate::prompts;
use crate::stage::{Stage, StageKind, generate};
use crate::sufficiency::{gaps, is_sufficient};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStop {
    Sufficient,
    TurnBudget,
}

/// Result of the research stage.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    /// Finalized (deduplicated) evidence.
    pub evidence: EvidenceCollection,
    pub turns: u32,
    pub stop: LoopStop,
    /// One summary per completed turn.
    pub summaries: Vec<String>,
}

pub struct Researcher<'a> {
    pub generator: &'a dyn Generator,
    pub settings: &'a GenerationSettings,
    pub config: &'a ResearchConfig,
    pub search: &'a [Arc<dyn SearchProvider>],
    pub extractor: &'a dyn Extractor,
    pub progress: &'a dyn ProgressReporter,
}

/// State carried between turns.
#[derive(Default)]
struct LoopState {
    evidence: EvidenceCollection,
    /// Last `context_turns` turn summaries.
    context: VecDeque<String>,
    extracted: HashSet<String>,
    past_queries: Vec<String>,
    summaries: Vec<String>,
}

#[async_trait]
impl Stage for Researcher<'_> {
    const KIND: StageKind = StageKind::Research;
    type Input = Assignment;
    type Output = ResearchOutcome;

    async fn run(&self, assignment: Assignment) -> Result<ResearchOutcome> {
        let mut state = LoopState::default();
        let mut turn: u32 = 0;
        let mut sufficient = false;

        while !sufficient && turn < self.config.max_turns {
            turn += 1;
            self.progress
                .research_turn(turn, self.config.max_turns, state.evidence.len());
            sufficient = self.run_turn(turn, &assignment, &mut state).await?;
        }

        let stop = if sufficient {
            LoopStop::Sufficient
        } else {
            LoopStop::TurnBudget
        };
        let evidence = state.evidence.finalize();
        info!(
            turns = turn,
            items = evidence.len(),
            sources = evidence.distinct_sources(),
            ?stop,
            "research complete"
        );

        Ok(ResearchOutcome {
            evidence,
            turns: turn,
            stop,
            summaries: state.summaries,
        })
    }
}

impl Researcher<'_> {
    /// One full turn. Returns the turn's sufficiency verdict.
    #[instrument(skip_all, fields(turn = turn))]
    async fn run_turn(
        &self,
        turn: u32,
        assignment: &Assignment,
        state: &mut LoopState,
    ) -> Result<bool> {
        let queries = self.generate_queries(assignment, state).await?;
        state.past_queries.extend(queries.iter().cloned());

        let hits = self.search_all(&queries).await;
        let candidates = curation::prefilter(hits, &state.extracted);
        debug!(candidates = candidates.len(), "candidates after prefilter");

        let summary = if candidates.is_empty() {
            warn!(turn, "no usable search candidates this turn");
            "No usable search results.".to_string()
        } else {
            let curated = self.curate(assignment, &candidates).await?;
            state
                .extracted
                .extend(curated.iter().map(|h| h.url.clone()));

            let material = self.gather_material(&curated).await;
            if material.is_empty() {
                warn!(turn, "no extractable material this turn");
                "Curated sources yielded no readable material.".to_string()
            } else {
                let eval = self.evaluate(assignment, &material).await?;
                debug!(new_items = eval.new_items.len(), "turn evaluated");
                let cited = cited_sources(&curated, &material);
                state.evidence.extend(eval.new_items.into_iter().filter_map(|mut item| {
                    let Some(url) = cited.get(item.source.trim()) else {
                        warn!(source = %item.source, "evidence cites unread source, dropping");
                        return None;
                    };
                    item.source = (*url).to_string();
                    Some(item)
                }));
                eval.summary
            }
        };

        let sufficient = is_sufficient(assignment.length_class, &state.evidence);
        info!(
            turn,
            items = state.evidence.len(),
            sources = state.evidence.distinct_sources(),
            sufficient,
            "research turn complete"
        );

        let line = format!("Turn {turn}: {}", summary.trim());
        state.summaries.push(line.clone());
        state.context.push_back(line);
        while state.context.len() > self.config.context_turns {
            state.context.pop_front();
        }

        Ok(sufficient)
    }

    async fn generate_queries(
        &self,
        assignment: &Assignment,
        state: &LoopState,
    ) -> Result<Vec<String>> {
        let mut status = format!(
            "Research so far: {} items from {} distinct sources.",
            state.evidence.len(),
            state.evidence.distinct_sources()
        );
        let missing = gaps(assignment.length_class, &state.evidence);
        if !missing.is_empty() {
            let _ = write!(status, "\nStill missing: {}.", missing.join(", "));
        }

        let mut context = vec![
            Message::user(prompts::assignment_block(assignment)),
            Message::user(status),
        ];
        if !state.context.is_empty() {
            let earlier: Vec<&str> = state.context.iter().map(String::as_str).collect();
            context.push(Message::user(format!("Earlier turns:\n{}", earlier.join("\n"))));
        }
        if !state.past_queries.is_empty() {
            context.push(Message::user(format!(
                "Queries already run:\n- {}",
                state.past_queries.join("\n- ")
            )));
        }

        let batch: QueryBatch = generate(
            self.generator,
            self.settings,
            ModelTier::Mini,
            &prompts::query_generation(self.config.queries_per_turn),
            context,
        )
        .await?;

        let mut queries: Vec<String> = Vec::new();
        for q in batch.queries {
            let q = q.trim().to_string();
            if !q.is_empty() && !queries.contains(&q) {
                queries.push(q);
            }
        }
        queries.truncate(self.config.queries_per_turn);
        debug!(?queries, "queries generated");
        Ok(queries)
    }

    /// Every query against every provider, concurrently. Failures are skipped.
    async fn search_all(&self, queries: &[String]) -> Vec<SearchHit> {
        let calls = queries.iter().flat_map(|q| {
            self.search.iter().map(move |provider| async move {
                let result = timeout(self.config.call_timeout, provider.search(q)).await;
                (provider.name().to_string(), q.as_str(), result)
            })
        });

        let mut hits = Vec::new();
        for (provider, query, result) in join_all(calls).await {
            match result {
                Ok(Ok(found)) => {
                    debug!(%provider, query, hits = found.len(), "search ok");
                    hits.extend(found);
                }
                Ok(Err(e)) => warn!(%provider, query, error = %e, "search failed, skipping"),
                Err(_) => warn!(%provider, query, "search timed out, skipping"),
            }
        }
        hits
    }

    async fn curate(
        &self,
        assignment: &Assignment,
        candidates: &[SearchHit],
    ) -> Result<Vec<SearchHit>> {
        let mut list = String::from("Candidates:\n");
        for (i, c) in candidates.iter().enumerate() {
            let _ = write!(list, "\n{}. {}\n   {}\n   {}\n", i + 1, c.url, c.title, c.snippet);
        }

        let selection: UrlSelection = generate(
            self.generator,
            self.settings,
            ModelTier::Mini,
            &prompts::curation(self.config.max_curated),
            vec![
                Message::user(prompts::assignment_block(assignment)),
                Message::user(list),
            ],
        )
        .await?;
        debug!(reasoning = %selection.reasoning, "curation reasoning");

        Ok(curation::apply_selection(
            &selection,
            candidates,
            self.config.max_curated,
        ))
    }

    /// Extracted text per curated URL, or the search snippets when nothing
    /// could be extracted. Each URL gets its own `call_timeout`.
    async fn gather_material(&self, curated: &[SearchHit]) -> Vec<(String, String)> {
        let calls = curated.iter().map(|hit| async move {
            let urls = std::slice::from_ref(&hit.url);
            match timeout(self.config.call_timeout, self.extractor.extract(urls)).await {
                Ok(results) => results,
                Err(_) => {
                    warn!(url = %hit.url, "extraction timed out, skipping");
                    Vec::new()
                }
            }
        });
        let results = join_all(calls).await.into_iter().flatten();

        let mut material = Vec::new();
        for result in results {
            match result {
                Ok(doc) if !doc.text.trim().is_empty() => {
                    let text = truncate_chars(&doc.text, self.config.max_extract_chars);
                    material.push((doc.url, text.to_string()));
                }
                Ok(doc) => warn!(url = %doc.url, "extraction returned no text, skipping"),
                Err(e) => warn!(error = %e, "extraction failed, skipping"),
            }
        }

        if material.is_empty() {
            material = curated
                .iter()
                .filter(|h| !h.snippet.trim().is_empty())
                .map(|h| (h.url.clone(), format!("{}\n{}", h.title, h.snippet)))
                .collect();
            if !material.is_empty() {
                info!(snippets = material.len(), "falling back to search snippets");
            }
        }
        material
    }

    async fn evaluate(
        &self,
        assignment: &Assignment,
        material: &[(String, String)],
    ) -> Result<TurnEvaluation> {
        let mut text = String::from("Material:\n");
        for (url, body) in material {
            let _ = write!(text, "\n### Source: {url}\n\n{}\n", body.trim_end());
        }

        generate(
            self.generator,
            self.settings,
            ModelTier::Smart,
            &prompts::turn_evaluation(assignment.length_class),
            vec![
                Message::user(prompts::assignment_block(assignment)),
                Message::user(text),
            ],
        )
        .await
    }
}

/// Sources an evaluation may cite, keyed to the material URL they stand for:
/// each URL read this turn, plus its hit title.
fn cited_sources<'a>(
    curated: &'a [SearchHit],
    material: &'a [(String, String)],
) -> HashMap<&'a str, &'a str> {
    let mut cited: HashMap<&str, &str> = material
        .iter()
        .map(|(url, _)| (url.as_str(), url.as_str()))
        .collect();
    for hit in curated {
        let title = hit.title.trim();
        if !title.is_empty() && cited.contains_key(hit.url.as_str()) {
            cited.entry(title).or_insert(hit.url.as_str());
        }
    }
    cited
}
