//! Evidence sufficiency predicate.
//!
//! A pure function of the collection: adding items can only turn `false`
//! into `true`, never the reverse.

use newsroom_shared::{EvidenceCollection, EvidenceKind, LengthClass};

/// Distinct sources a short item needs.
pub const SHORT_FORM_MIN_SOURCES: usize = 2;
/// Distinct sources a feature needs.
pub const LONG_FORM_MIN_SOURCES: usize = 4;

/// Kinds a feature must cover, besides at least one quote.
const LONG_FORM_KINDS: [EvidenceKind; 4] = [
    EvidenceKind::Fact,
    EvidenceKind::Context,
    EvidenceKind::Color,
    EvidenceKind::Perspective,
];

/// Whether the evidence is adequate for the length class.
pub fn is_sufficient(length_class: LengthClass, evidence: &EvidenceCollection) -> bool {
    match length_class {
        LengthClass::ShortForm => {
            evidence.has_kind(EvidenceKind::Fact)
                && evidence.distinct_sources() >= SHORT_FORM_MIN_SOURCES
        }
        LengthClass::LongForm => {
            evidence.distinct_sources() >= LONG_FORM_MIN_SOURCES
                && LONG_FORM_KINDS.iter().all(|k| evidence.has_kind(*k))
                && evidence.has_kind(EvidenceKind::Quote)
        }
    }
}

/// What the collection still lacks, for the next turn's query context.
pub fn gaps(length_class: LengthClass, evidence: &EvidenceCollection) -> Vec<String> {
    let mut missing = Vec::new();
    let (min_sources, kinds): (usize, &[EvidenceKind]) = match length_class {
        LengthClass::ShortForm => (SHORT_FORM_MIN_SOURCES, &[EvidenceKind::Fact]),
        LengthClass::LongForm => (
            LONG_FORM_MIN_SOURCES,
            &[
                EvidenceKind::Fact,
                EvidenceKind::Context,
                EvidenceKind::Color,
                EvidenceKind::Perspective,
                EvidenceKind::Quote,
            ],
        ),
    };

    let have = evidence.distinct_sources();
    if have < min_sources {
        missing.push(format!("{} more distinct source(s)", min_sources - have));
    }
    for kind in kinds {
        if !evidence.has_kind(*kind) {
            missing.push(format!("{} material", kind.as_str()));
        }
    }
    missing
}
