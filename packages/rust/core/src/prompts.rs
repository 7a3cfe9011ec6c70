//! Role briefs and context formatting for each generative step.
//!
//! Briefs state the role, the output rules and the house style. They are
//! deliberately short; the output contract carries the structure.

use std::fmt::Write;

use newsroom_shared::{
    Assignment, Draft, EvidenceCollection, FinalArtifact, LengthClass, ReviewFinding, ReviewPass,
};

const HOUSE_STYLE: &str = "House style: plain, vivid, precise English. Never use em dashes or \
other long dashes; use commas, colons or separate sentences instead. Never invent quotes, \
numbers or sources. Attribute claims to their sources in the prose.";

pub fn planning() -> String {
    "You are the assignment editor of a popular-science magazine. Turn the idea into a \
story brief: a concrete topic, a fresh angle, one category (Science, History, Planet Earth \
or Mystery), a length class (short_form for a focused news item, long_form for a feature), \
and 3 to 5 key questions the article must answer. State an image people policy only when \
the idea demands people in the hero image; otherwise return null."
        .to_string()
}

pub fn query_generation(queries_per_turn: usize) -> String {
    format!(
        "You are a research assistant. Write up to {queries_per_turn} web search queries that \
fill the gaps in the research so far. Target the key questions that are still unanswered. \
Do not repeat earlier queries."
    )
}

pub fn curation(max_curated: usize) -> String {
    format!(
        "You are a research editor. From the candidate list, choose at most {max_curated} URLs \
worth reading in full. Prefer primary sources, reputable outlets and pages likely to contain \
quotes and concrete detail. Only choose URLs that appear in the list."
    )
}

pub fn turn_evaluation(length_class: LengthClass) -> String {
    let depth = match length_class {
        LengthClass::ShortForm => "A short item needs solid facts from at least two sources.",
        LengthClass::LongForm => {
            "A feature needs facts, context, color, differing perspectives and at least one \
verbatim quote, from at least four sources."
        }
    };
    format!(
        "You are a fact gatherer. Extract attributable findings from the material. Each item \
keeps the exact `### Source:` URL it came from as its source; items citing anything else \
are discarded. Classify each as fact, context, color, perspective \
or quote. Quotes must be verbatim from the material. {depth} Summarize in two sentences what \
this turn added and what is still missing."
    )
}

pub fn drafting(assignment: &Assignment) -> String {
    let (min, max) = assignment.length_class.word_range();
    format!(
        "You are a staff reporter. Write the article described by the brief using only the \
research provided. Target {min}-{max} words. Organize the body into sections with `## ` \
headings. List every source you used and describe them in a short source narrative. \
{HOUSE_STYLE}"
    )
}

pub fn review(pass: ReviewPass) -> String {
    match pass {
        ReviewPass::Fact => format!(
            "You are a fact checker. Compare the draft against the research and the key \
questions. List each unsupported, misattributed or inaccurate claim and each unanswered key \
question as a specific issue naming its paragraph. Score accuracy, attribution and \
completeness from 1 (poor) to 4 (excellent). Return no issues if there is nothing to fix. \
{HOUSE_STYLE}"
        ),
        ReviewPass::Style => format!(
            "You are a style editor. Check compliance with the house style and the word target, \
section structure and voice. List each problem as a specific issue naming its paragraph. \
Score compliance, structure and voice from 1 (poor) to 4 (excellent). Return no issues if \
there is nothing to fix. {HOUSE_STYLE}"
        ),
    }
}

pub fn revision(pass: ReviewPass) -> String {
    let focus = match pass {
        ReviewPass::Fact => "factual",
        ReviewPass::Style => "style",
    };
    format!(
        "You are the reporter revising after {focus} review. Fix every listed issue and \
change nothing else. Keep every `## ` section heading exactly as it is, in the same order. \
Return the full revised body. {HOUSE_STYLE}"
    )
}

pub fn outline_correction(outline: &[String]) -> String {
    let mut text = String::from(
        "Your revision changed the section headings. Return the revision again with exactly \
these `## ` headings, in this order:\n",
    );
    for heading in outline {
        let _ = writeln!(text, "## {heading}");
    }
    text
}

pub fn polishing() -> String {
    format!(
        "You are the copy desk. Write a headline and an optional subheading, and copy-edit the \
body for grammar, rhythm and clarity. Keep every `## ` section heading and every sourced \
claim. {HOUSE_STYLE}"
    )
}

pub fn image_prompt() -> String {
    "You are the photo editor. Describe one striking, realistic hero photograph for the \
article in a single paragraph: subject, setting, composition and light. No text, logos or \
captions in the image."
        .to_string()
}

pub fn approval() -> String {
    "You are the editor-in-chief. Decide whether the article can be published. Reject it if \
it contains discriminatory content, presents fringe or pseudoscientific claims without \
explicit factual framing, or states uncertain findings as established fact. A rejection must \
list specific, actionable notes naming what to fix and where."
        .to_string()
}

// ---------------------------------------------------------------------------
// Context blocks
// ---------------------------------------------------------------------------

pub fn assignment_block(a: &Assignment) -> String {
    let (min, max) = a.length_class.word_range();
    let mut text = format!(
        "Story brief\nTopic: {}\nAngle: {}\nCategory: {}\nArticle type: {} ({min}-{max} words)\nKey questions:\n",
        a.topic,
        a.angle,
        a.category,
        a.length_class.label()
    );
    for q in &a.key_questions {
        let _ = writeln!(text, "- {q}");
    }
    text
}

pub fn evidence_block(evidence: &EvidenceCollection) -> String {
    if evidence.is_empty() {
        return "Research: none gathered.".to_string();
    }
    let mut text = String::from("Research\n");
    for (i, item) in evidence.items.iter().enumerate() {
        let _ = write!(
            text,
            "\n[{}] ({}) source: {}\nrelevance: {}\n{}\n",
            i + 1,
            item.kind.as_str(),
            item.source,
            item.relevance,
            item.content.trim_end()
        );
    }
    text
}

pub fn draft_block(draft: &Draft) -> String {
    let mut text = format!("Draft body\n\n{}\n\nSources:\n", draft.body.trim_end());
    for s in &draft.sources {
        let _ = writeln!(text, "- {s}");
    }
    text
}

pub fn issues_block(finding: &ReviewFinding) -> String {
    let mut text = String::from("Issues to fix:\n");
    for (i, issue) in finding.issues.iter().enumerate() {
        let _ = writeln!(text, "{}. {issue}", i + 1);
    }
    text
}

pub fn article_block(article: &FinalArtifact) -> String {
    let mut text = format!("Headline: {}\n", article.headline);
    if let Some(sub) = &article.subheading {
        let _ = writeln!(text, "Subheading: {sub}");
    }
    let _ = write!(text, "\n{}\n", article.body.trim_end());
    text
}
