//! Human-readable Markdown renderings of pipeline artifacts.
//!
//! The JSON in the artifact store is the source of truth; these renderings are
//! what editors read in `<output>/<slug>/` and what `newsroom show` prints.

use std::fmt::Write;

use newsroom_markdown::count_words;
use newsroom_shared::{
    ApprovalDecision, Assignment, Draft, EvidenceCollection, FinalArtifact, ReviewFinding,
    ReviewPass, ScoreDimension, score_label,
};

/// The story brief.
pub fn render_assignment(a: &Assignment) -> String {
    let (min, max) = a.length_class.word_range();
    let mut md = String::from("# Story Brief\n\n");
    let _ = writeln!(md, "**Topic:** {}  ", a.topic);
    let _ = writeln!(md, "**Angle:** {}  ", a.angle);
    let _ = writeln!(md, "**Category:** {}  ", a.category);
    let _ = writeln!(
        md,
        "**Article type:** {} ({min}-{max} words)  ",
        a.length_class.label()
    );
    let _ = writeln!(md, "**Slug:** `{}`", a.slug);

    md.push_str("\n## Key Questions\n\n");
    for (i, q) in a.key_questions.iter().enumerate() {
        let _ = writeln!(md, "{}. {q}", i + 1);
    }

    md.push_str("\n## Hero Image\n\n");
    md.push_str(&a.image_people_policy);
    md.push('\n');
    md
}

/// The research package, one section per source.
pub fn render_evidence(evidence: &EvidenceCollection) -> String {
    let mut md = String::from("# Research Package\n\n");
    let _ = writeln!(
        md,
        "{} items from {} distinct sources.",
        evidence.len(),
        evidence.distinct_sources()
    );

    for (i, item) in evidence.items.iter().enumerate() {
        let _ = write!(md, "\n## {}. {}\n\n", i + 1, item.source);
        let _ = writeln!(md, "*{}*: {}\n", item.kind.as_str(), item.relevance);
        md.push_str(item.content.trim_end());
        md.push('\n');
    }
    md
}

/// A draft snapshot with its sources appended.
pub fn render_draft(title: &str, draft: &Draft) -> String {
    let mut md = format!("# {title}\n\n");
    let _ = writeln!(md, "*{} words*\n", count_words(&draft.body));
    md.push_str(draft.body.trim_end());
    md.push_str("\n\n---\n\n## Sources\n\n");
    for s in &draft.sources {
        let _ = writeln!(md, "- {s}");
    }
    if !draft.source_narrative.trim().is_empty() {
        md.push('\n');
        md.push_str(draft.source_narrative.trim_end());
        md.push('\n');
    }
    md
}

/// A review pass: issues then the rubric table.
pub fn render_review(pass: ReviewPass, finding: &ReviewFinding) -> String {
    let heading = match pass {
        ReviewPass::Fact => "Fact Review",
        ReviewPass::Style => "Style Review",
    };
    let mut md = format!("# {heading}\n\n## Issues\n\n");
    if finding.issues.is_empty() {
        md.push_str("No issues found.\n");
    } else {
        for (i, issue) in finding.issues.iter().enumerate() {
            let _ = writeln!(md, "{}. {issue}", i + 1);
        }
    }

    md.push_str("\n## Rubric\n\n| Dimension | Score |\n|-----------|-------|\n");
    for dim in ScoreDimension::ALL {
        if let Some(score) = finding.scores.get(&dim) {
            let _ = writeln!(md, "| {} | {} ({score}) |", dim.as_str(), score_label(*score));
        }
    }
    md
}

/// The published article.
pub fn render_final(article: &FinalArtifact) -> String {
    let mut md = format!("# {}\n\n", article.headline);
    if let Some(sub) = &article.subheading {
        let _ = writeln!(md, "*{sub}*\n");
    }
    if let Some(date) = article.publish_date {
        let _ = writeln!(md, "Published {}\n", date.format("%Y-%m-%d"));
    }
    md.push_str(article.body.trim_end());
    md.push('\n');
    md
}

/// The editor-in-chief decision.
pub fn render_approval(decision: &ApprovalDecision) -> String {
    let status = if decision.approved {
        "APPROVED"
    } else {
        "REJECTED"
    };
    let mut md = format!("# Publication Decision\n\n**Status:** {status}\n");
    if !decision.notes.is_empty() {
        md.push_str("\n## Notes\n\n");
        for note in &decision.notes {
            let _ = writeln!(md, "- {note}");
        }
    }
    md
}
