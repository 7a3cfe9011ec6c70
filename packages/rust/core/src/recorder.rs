//! Artifact recording.
//!
//! Every stage output goes to the [`ArtifactStore`] as JSON. When an output
//! directory is configured, a human-readable rendering is also written under
//! `<output_dir>/<slug>/`, alongside a `manifest.json` listing each file with
//! its checksum:
//!
//! ```text
//! <output_dir>/<slug>/
//! ├── manifest.json
//! ├── story_brief.md
//! ├── research_package.md
//! ├── reporter/
//! │   ├── 1_initial_draft.md
//! │   ├── 2_fact_review.md
//! │   └── ...
//! ├── draft.md
//! ├── final_article.md
//! ├── graphics/
//! │   ├── hero_prompt.txt
//! │   └── hero_image.png
//! └── approval.md
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use newsroom_artifacts::{
    render_approval, render_assignment, render_draft, render_evidence, render_final,
    render_review,
};
use newsroom_shared::{
    ApprovalDecision, ArtifactKind, Assignment, Draft, EvidenceCollection, FinalArtifact,
    HeroImage, NewsroomError, Result, ReviewFinding, ReviewPass,
};
use newsroom_storage::{ArtifactStore, load_value, save_value};

/// Relative path of the PNG written next to the hero prompt.
pub const HERO_IMAGE_FILE: &str = "graphics/hero_image.png";

const MANIFEST_FILE: &str = "manifest.json";

/// File written for each artifact kind, relative to the slug directory.
pub fn file_name(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Assignment => "story_brief.md",
        ArtifactKind::Evidence => "research_package.md",
        ArtifactKind::DraftInitial => "reporter/1_initial_draft.md",
        ArtifactKind::FactReview => "reporter/2_fact_review.md",
        ArtifactKind::DraftAfterFact => "reporter/3_after_fact_revision.md",
        ArtifactKind::StyleReview => "reporter/4_style_review.md",
        ArtifactKind::DraftAfterStyle => "reporter/5_after_style_revision.md",
        ArtifactKind::Draft => "draft.md",
        ArtifactKind::FinalArtifact => "final_article.md",
        ArtifactKind::ImagePrompt => "graphics/hero_prompt.txt",
        ArtifactKind::Approval => "approval.md",
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Checksum entry for one written file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    pub path: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// `manifest.json` contents for a slug directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputManifest {
    pub slug: String,
    pub updated_at: DateTime<Utc>,
    pub files: Vec<FileMeta>,
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Saves stage outputs to the store and mirrors them to disk.
#[derive(Clone)]
pub struct ArtifactRecorder {
    store: Arc<dyn ArtifactStore>,
    output_dir: Option<PathBuf>,
}

impl ArtifactRecorder {
    pub fn new(store: Arc<dyn ArtifactStore>, output_dir: Option<PathBuf>) -> Self {
        Self { store, output_dir }
    }

    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    /// Directory holding rendered files for `slug`, if file output is enabled.
    pub fn slug_dir(&self, slug: &str) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|d| d.join(slug))
    }

    /// Save a value under `kind` and write its rendering.
    #[instrument(skip_all, fields(slug = %slug, kind = %kind))]
    pub async fn record<T: Serialize + Sync>(
        &self,
        slug: &str,
        kind: ArtifactKind,
        value: &T,
        rendered: &str,
    ) -> Result<()> {
        save_value(self.store.as_ref(), slug, kind, value).await?;
        self.write_file(slug, file_name(kind), rendered.as_bytes())?;
        debug!("artifact recorded");
        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, kind: ArtifactKind, slug: &str) -> Result<T> {
        load_value(self.store.as_ref(), kind, slug).await
    }

    /// Write `bytes` to `<output_dir>/<slug>/<rel>` atomically and update the
    /// manifest. Returns the written path, or `None` when file output is off.
    pub fn write_file(&self, slug: &str, rel: &str, bytes: &[u8]) -> Result<Option<PathBuf>> {
        let Some(dir) = self.slug_dir(slug) else {
            return Ok(None);
        };
        let target = dir.join(rel);
        write_atomic(&target, bytes)?;

        let meta = FileMeta {
            path: rel.to_string(),
            sha256: sha256_hex(bytes),
            size_bytes: bytes.len(),
        };
        update_manifest(&dir, slug, meta)?;
        debug!(path = %target.display(), size = bytes.len(), "wrote file");
        Ok(Some(target))
    }
}

/// Render a stored JSON value the way it is written to disk.
pub fn render_stored(kind: ArtifactKind, json: &str) -> Result<String> {
    fn parse<T: DeserializeOwned>(kind: ArtifactKind, json: &str) -> Result<T> {
        serde_json::from_str(json)
            .map_err(|e| NewsroomError::Storage(format!("stored {kind} is corrupt: {e}")))
    }

    let text = match kind {
        ArtifactKind::Assignment => render_assignment(&parse::<Assignment>(kind, json)?),
        ArtifactKind::Evidence => render_evidence(&parse::<EvidenceCollection>(kind, json)?),
        ArtifactKind::DraftInitial => render_draft("Initial draft", &parse::<Draft>(kind, json)?),
        ArtifactKind::DraftAfterFact => {
            render_draft("After fact revision", &parse::<Draft>(kind, json)?)
        }
        ArtifactKind::DraftAfterStyle => {
            render_draft("After style revision", &parse::<Draft>(kind, json)?)
        }
        ArtifactKind::Draft => render_draft("Draft", &parse::<Draft>(kind, json)?),
        ArtifactKind::FactReview => {
            render_review(ReviewPass::Fact, &parse::<ReviewFinding>(kind, json)?)
        }
        ArtifactKind::StyleReview => {
            render_review(ReviewPass::Style, &parse::<ReviewFinding>(kind, json)?)
        }
        ArtifactKind::FinalArtifact => render_final(&parse::<FinalArtifact>(kind, json)?),
        ArtifactKind::ImagePrompt => {
            let hero = parse::<HeroImage>(kind, json)?;
            format!("{}\n", hero.prompt)
        }
        ArtifactKind::Approval => render_approval(&parse::<ApprovalDecision>(kind, json)?),
    };
    Ok(text)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| NewsroomError::validation(format!("no parent for {}", target.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| NewsroomError::io(parent, e))?;

    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{name}.tmp"));

    std::fs::write(&temp, bytes).map_err(|e| NewsroomError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| NewsroomError::io(target, e))?;
    Ok(())
}

fn update_manifest(dir: &Path, slug: &str, meta: FileMeta) -> Result<()> {
    let path = dir.join(MANIFEST_FILE);

    let mut manifest = if path.exists() {
        let content = std::fs::read_to_string(&path).map_err(|e| NewsroomError::io(&path, e))?;
        serde_json::from_str::<OutputManifest>(&content)
            .map_err(|e| NewsroomError::validation(format!("invalid manifest.json: {e}")))?
    } else {
        OutputManifest {
            slug: slug.to_string(),
            updated_at: Utc::now(),
            files: Vec::new(),
        }
    };

    match manifest.files.iter_mut().find(|f| f.path == meta.path) {
        Some(existing) => *existing = meta,
        None => manifest.files.push(meta),
    }
    manifest.files.sort_by(|a, b| a.path.cmp(&b.path));
    manifest.updated_at = Utc::now();

    let json = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| NewsroomError::validation(format!("JSON serialization failed: {e}")))?;
    write_atomic(&path, &json)?;
    info!(files = manifest.files.len(), "manifest updated");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::assignment;
    use newsroom_shared::LengthClass;
    use newsroom_storage::MemoryStore;

    fn recorder(dir: Option<&Path>) -> ArtifactRecorder {
        ArtifactRecorder::new(Arc::new(MemoryStore::new()), dir.map(Path::to_path_buf))
    }

    fn read_manifest(dir: &Path) -> OutputManifest {
        let content = std::fs::read_to_string(dir.join(MANIFEST_FILE)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[tokio::test]
    async fn record_saves_and_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let rec = recorder(Some(tmp.path()));
        let a = assignment(LengthClass::ShortForm);
        let rendered = render_assignment(&a);

        rec.record(&a.slug, ArtifactKind::Assignment, &a, &rendered)
            .await
            .unwrap();

        let loaded: Assignment = rec.load(ArtifactKind::Assignment, &a.slug).await.unwrap();
        assert_eq!(loaded, a);

        let file = tmp.path().join(&a.slug).join("story_brief.md");
        assert_eq!(std::fs::read_to_string(file).unwrap(), rendered);

        let manifest = read_manifest(&tmp.path().join(&a.slug));
        assert_eq!(manifest.slug, a.slug);
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].sha256, sha256_hex(rendered.as_bytes()));
    }

    #[tokio::test]
    async fn rewriting_a_file_replaces_its_manifest_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let rec = recorder(Some(tmp.path()));

        rec.write_file("s", "draft.md", b"one").unwrap();
        rec.write_file("s", HERO_IMAGE_FILE, b"\x89PNG").unwrap();
        rec.write_file("s", "draft.md", b"two!").unwrap();

        let manifest = read_manifest(&tmp.path().join("s"));
        assert_eq!(manifest.files.len(), 2);
        let draft = manifest.files.iter().find(|f| f.path == "draft.md").unwrap();
        assert_eq!(draft.size_bytes, 4);
        assert_eq!(draft.sha256, sha256_hex(b"two!"));

        // No temp files left behind.
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path().join("s"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn without_output_dir_only_the_store_is_written() {
        let rec = recorder(None);
        let a = assignment(LengthClass::ShortForm);
        rec.record(&a.slug, ArtifactKind::Assignment, &a, "x")
            .await
            .unwrap();
        assert!(rec.write_file(&a.slug, "draft.md", b"x").unwrap().is_none());
        assert_eq!(
            rec.store().kinds(&a.slug).await.unwrap(),
            vec![ArtifactKind::Assignment]
        );
    }

    #[test]
    fn render_stored_matches_written_form() {
        let hero = HeroImage {
            prompt: "A black smoker".into(),
            path: None,
        };
        let json = serde_json::to_string(&hero).unwrap();
        assert_eq!(
            render_stored(ArtifactKind::ImagePrompt, &json).unwrap(),
            "A black smoker\n"
        );
        assert!(render_stored(ArtifactKind::Draft, "{not json").is_err());
    }

    #[test]
    fn every_kind_has_a_distinct_file() {
        let mut names: Vec<_> = ArtifactKind::ALL.iter().map(|k| file_name(*k)).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ArtifactKind::ALL.len());
    }
}
