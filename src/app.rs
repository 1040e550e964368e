//! Composition root: wires configuration into the store, engines and runners.

use crate::actions::ActionRunner;
use crate::config::{Config, SummarizeConfig};
use crate::defaults;
use crate::engine::{LibreTranslateClient, OllamaSummarizer, WhisperConfig, WhisperProvider};
use crate::error::Result;
use crate::pipeline::{Orchestrator, TextTranslation};
use crate::store::{SqliteStore, Store};
use crate::summarize::{SummaryProfile, Summarizer};
use std::sync::Arc;
use std::time::Duration;

/// Open (creating if needed) the configured record database.
pub fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    Ok(Arc::new(SqliteStore::open(&config.store.path)?))
}

/// Summarizer with the general profile plus the multilingual profile for
/// the configured languages.
pub fn build_summarizer(config: &SummarizeConfig) -> Result<Summarizer> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let general = OllamaSummarizer::new(&config.url, &config.model, timeout)?;
    let multilingual = OllamaSummarizer::new(&config.url, &config.multilingual_model, timeout)?;

    let mut summarizer = Summarizer::new(
        SummaryProfile::new(
            defaults::GENERAL_PROFILE,
            &config.model,
            config.general_max_input_words,
        ),
        Arc::new(general),
    )
    .with_profile(
        SummaryProfile::new(
            defaults::MULTILINGUAL_PROFILE,
            &config.multilingual_model,
            config.multilingual_max_input_words,
        ),
        Arc::new(multilingual),
    );

    for language in &config.multilingual_languages {
        summarizer = summarizer.route_language(language, defaults::MULTILINGUAL_PROFILE);
    }

    Ok(summarizer)
}

pub fn build_orchestrator(config: &Config, store: Arc<dyn Store>) -> Result<Orchestrator> {
    let provider = WhisperProvider::new(WhisperConfig {
        models_dir: config.engine.models_dir.clone(),
        threads: config.engine.threads,
    });
    Ok(
        Orchestrator::new(store, config.engine.registry(), Arc::new(provider))
            .with_config(config.engine.pipeline_config()?),
    )
}

pub fn build_text_translation(config: &Config, store: Arc<dyn Store>) -> Result<TextTranslation> {
    let client = LibreTranslateClient::new(
        &config.translate.url,
        config.translate.api_key.clone(),
        Duration::from_secs(config.translate.timeout_secs),
    )?;
    Ok(TextTranslation::new(store, Arc::new(client)))
}

/// Everything the operator-facing actions need, built from `config`.
pub fn build_runner(config: &Config, store: Arc<dyn Store>) -> Result<ActionRunner> {
    config.validate()?;
    let orchestrator = build_orchestrator(config, store.clone())?;
    let text_translation = build_text_translation(config, store.clone())?;
    let summarizer = build_summarizer(&config.summarize)?;

    Ok(
        ActionRunner::new(store, orchestrator, text_translation, summarizer)
            .with_summary_options(config.summarize.options()),
    )
}
