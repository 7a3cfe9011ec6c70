//! Provider and store construction from the loaded config.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, eyre};
use tracing::debug;

use newsroom_core::Collaborators;
use newsroom_providers::{
    Extractor, HttpExtractor, OpenAiGenerator, OpenAiImageGenerator, SearchProvider,
    TavilyExtractor, TavilySearch, WikipediaSearch,
};
use newsroom_shared::{AppConfig, expand_home, read_api_key, validate_api_keys};
use newsroom_storage::Storage;

/// Wikipedia results per query; background material only.
const WIKIPEDIA_LIMIT: usize = 2;

/// Build every external collaborator. Fails early on missing API keys.
pub(crate) fn collaborators(config: &AppConfig) -> Result<Collaborators> {
    validate_api_keys(config)?;
    let model_key = read_api_key(&config.model.api_key_env, "Model")?;
    let request_timeout = Duration::from_secs(config.model.request_timeout_secs.max(1));
    let call_timeout = Duration::from_secs(config.research.call_timeout_secs.max(1));

    let generator = Arc::new(OpenAiGenerator::new(
        model_key.clone(),
        config.model.base_url.clone(),
        request_timeout,
    )?);
    let images = Arc::new(OpenAiImageGenerator::new(
        model_key,
        config.model.base_url.clone(),
        request_timeout,
    )?);

    let tavily_key = read_api_key(&config.search.tavily_api_key_env, "Tavily")?;
    let mut search: Vec<Arc<dyn SearchProvider>> = vec![Arc::new(TavilySearch::new(
        tavily_key.clone(),
        config.search.tavily_base_url.clone(),
        config.search.max_results,
        call_timeout,
    )?)];
    if config.search.wikipedia {
        search.push(Arc::new(WikipediaSearch::new(
            &config.search.wikipedia_url,
            WIKIPEDIA_LIMIT,
            call_timeout,
        )?));
    }

    let extractor = extractor(config, tavily_key, call_timeout)?;
    debug!(
        providers = search.len(),
        extraction = %config.search.extraction,
        "collaborators ready"
    );

    Ok(Collaborators {
        generator,
        search,
        extractor,
        images,
    })
}

fn extractor(config: &AppConfig, tavily_key: String, timeout: Duration) -> Result<Arc<dyn Extractor>> {
    match config.search.extraction.as_str() {
        "tavily" => Ok(Arc::new(TavilyExtractor::new(
            tavily_key,
            config.search.tavily_base_url.clone(),
            timeout,
        )?)),
        "http" => Ok(Arc::new(HttpExtractor::new(timeout)?)),
        other => Err(eyre!(
            "unknown extraction backend '{other}': expected 'tavily' or 'http'"
        )),
    }
}

/// Database path: flag, then config.
pub(crate) fn database_path(config: &AppConfig, flag: Option<&PathBuf>) -> PathBuf {
    flag.cloned()
        .unwrap_or_else(|| expand_home(&config.defaults.database))
}

pub(crate) async fn open_store(path: &Path) -> Result<Arc<Storage>> {
    debug!(path = %path.display(), "opening artifact database");
    Ok(Arc::new(Storage::open(path).await?))
}

/// For `show` and `list`: never creates or migrates the database.
pub(crate) async fn open_store_readonly(path: &Path) -> Result<Storage> {
    Ok(Storage::open_readonly(path).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extraction_backend_is_rejected() {
        let mut config = AppConfig::default();
        config.search.extraction = "scrapy".into();
        let err = extractor(&config, "k".into(), Duration::from_secs(1))
            .err()
            .expect("unknown backend");
        assert!(err.to_string().contains("scrapy"));
    }

    #[test]
    fn both_extraction_backends_build() {
        let mut config = AppConfig::default();
        for backend in ["tavily", "http"] {
            config.search.extraction = backend.into();
            assert!(extractor(&config, "k".into(), Duration::from_secs(1)).is_ok());
        }
    }

    #[test]
    fn database_flag_overrides_config() {
        let config = AppConfig::default();
        let flag = PathBuf::from("/tmp/x.db");
        assert_eq!(database_path(&config, Some(&flag)), flag);
        assert!(database_path(&config, None).ends_with("newsroom.db"));
    }
}
