//! Whisper-based speech recognition and speech translation.
//!
//! This module provides a Whisper implementation of the SpeechEngine trait using whisper-rs.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be installed.
//! Without it, engines still construct (so configuration can be validated) but
//! every run fails with an explanatory error.

use crate::engine::registry::{EngineProfile, SpeechEngineProvider};
use crate::engine::speech::{SpeechEngine, SpeechOutput, SpeechRequest};
use crate::error::{Result, SmartsumError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[cfg(feature = "whisper")]
use crate::engine::speech::{EngineSegment, RunInfo, SegmentSender, Task, segment_channel};
#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, SegmentCallbackData, WhisperContext, WhisperContextParameters,
    install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for Whisper engines.
#[derive(Debug, Clone, Default)]
pub struct WhisperConfig {
    /// Directory holding `ggml-<model>.bin` files
    pub models_dir: PathBuf,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
}

impl WhisperConfig {
    /// Path of the weights file for `model`.
    pub fn model_path(&self, model: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{}.bin", model))
    }
}

/// Whisper-based speech engine.
///
/// The WhisperContext is shared with the inference thread of each run and
/// locked for the duration of that run.
#[cfg(feature = "whisper")]
pub struct WhisperEngine {
    context: Arc<Mutex<WhisperContext>>,
    threads: Option<usize>,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("model_name", &self.model_name)
            .field("threads", &self.threads)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper-based engine placeholder (without whisper feature).
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine {
    model_name: String,
}

fn model_name_from_path(model_path: &Path) -> String {
    model_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem.trim_start_matches("ggml-"))
        .unwrap_or("unknown")
        .to_string()
}

fn ensure_model_exists(model_path: &Path) -> Result<()> {
    if model_path.exists() {
        Ok(())
    } else {
        Err(SmartsumError::EngineModelNotFound {
            path: model_path.to_string_lossy().to_string(),
        })
    }
}

#[cfg(feature = "whisper")]
impl WhisperEngine {
    /// Load a Whisper model.
    ///
    /// # Errors
    /// Returns `SmartsumError::EngineModelNotFound` if the model file doesn't exist
    /// Returns `SmartsumError::Engine` if model loading fails
    pub fn new(model_path: &Path, threads: Option<usize>) -> Result<Self> {
        // Install logging hooks to route whisper.cpp output through `log` (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        ensure_model_exists(model_path)?;
        let model_name = model_name_from_path(model_path);

        let engine_error = |message: String| SmartsumError::Engine {
            engine: model_name.clone(),
            message,
        };

        let mut context_params = WhisperContextParameters::default();
        context_params.flash_attn(true);
        let context = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| engine_error("Invalid UTF-8 in model path".to_string()))?,
            context_params,
        )
        .map_err(|e| engine_error(format!("Failed to load Whisper model: {}", e)))?;

        log::info!("Loaded Whisper model {}", model_path.display());

        Ok(Self {
            context: Arc::new(Mutex::new(context)),
            threads,
            model_name,
        })
    }
}

/// Decoding settings for one run, owned by the inference thread.
#[cfg(feature = "whisper")]
struct Decode {
    language: Option<String>,
    translate: bool,
    beam_size: i32,
    threads: Option<usize>,
}

/// Run inference, emitting each segment through `sender` as whisper.cpp
/// finalizes it.
#[cfg(feature = "whisper")]
fn infer(
    context: &Mutex<WhisperContext>,
    audio: &[f32],
    decode: &Decode,
    sender: &SegmentSender,
) -> std::result::Result<(), String> {
    let context = context
        .lock()
        .map_err(|e| format!("Failed to acquire context lock: {}", e))?;

    let mut state = context
        .create_state()
        .map_err(|e| format!("Failed to create Whisper state: {}", e))?;

    let mut params = FullParams::new(SamplingStrategy::BeamSearch {
        beam_size: decode.beam_size,
        patience: -1.0,
    });
    params.set_language(decode.language.as_deref());
    params.set_translate(decode.translate);

    if let Some(threads) = decode.threads {
        params.set_n_threads(threads as i32);
    }

    // Disable printing to stdout/stderr
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    let segment_sender = sender.clone();
    params.set_segment_callback_safe(move |data: SegmentCallbackData| {
        // Timestamps are reported in centiseconds
        let segment = EngineSegment::new(
            data.start_timestamp as f64 / 100.0,
            data.end_timestamp as f64 / 100.0,
            data.text.trim(),
        );
        if !segment_sender.segment(segment) {
            log::trace!("Run abandoned, dropping segment {}", data.segment);
        }
    });

    state
        .full(params, audio)
        .map_err(|e| format!("Whisper inference failed: {}", e))?;
    Ok(())
}

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    /// Create a Whisper engine (stub implementation).
    ///
    /// Validates the model path; runs fail because the whisper feature is not enabled.
    pub fn new(model_path: &Path, _threads: Option<usize>) -> Result<Self> {
        ensure_model_exists(model_path)?;
        Ok(Self {
            model_name: model_name_from_path(model_path),
        })
    }
}

#[cfg(feature = "whisper")]
impl SpeechEngine for WhisperEngine {
    /// Decode the media, then start inference on a dedicated thread.
    ///
    /// Returns as soon as inference has started; segments arrive on the
    /// stream while whisper.cpp is still working through the audio.
    fn run(&self, request: &SpeechRequest) -> Result<SpeechOutput> {
        let audio = crate::audio::decode_file(&request.media_path)?;
        log::info!(
            "Running {} on {} ({:.1}s of audio, task={}, language={})",
            self.model_name,
            request.media_path.display(),
            crate::audio::duration_secs(&audio),
            request.task,
            request.language.as_deref().unwrap_or("auto")
        );

        let decode = Decode {
            language: request.language.clone(),
            translate: request.task == Task::Translate,
            beam_size: i32::try_from(request.beam_size).unwrap_or(i32::MAX),
            threads: self.threads,
        };
        let (sender, segments) = segment_channel(&self.model_name);
        let context = Arc::clone(&self.context);
        let model_name = self.model_name.clone();

        std::thread::Builder::new()
            .name(format!("whisper-{}", self.model_name))
            .spawn(move || match infer(&context, &audio, &decode, &sender) {
                Ok(()) => sender.finish(),
                Err(message) => sender.fail(SmartsumError::Engine {
                    engine: model_name,
                    message,
                }),
            })?;

        Ok(SpeechOutput {
            info: RunInfo {
                language: request.language.clone(),
                model: self.model_name.clone(),
            },
            segments,
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(not(feature = "whisper"))]
impl SpeechEngine for WhisperEngine {
    fn run(&self, _request: &SpeechRequest) -> Result<SpeechOutput> {
        Err(SmartsumError::Engine {
            engine: self.model_name.clone(),
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)\n",
                "If build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Loads Whisper engines on demand and keeps them for reuse.
#[derive(Default)]
pub struct WhisperProvider {
    config: WhisperConfig,
    loaded: Mutex<HashMap<String, Arc<dyn SpeechEngine>>>,
}

impl WhisperProvider {
    pub fn new(config: WhisperConfig) -> Self {
        Self {
            config,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

impl std::fmt::Debug for WhisperProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SpeechEngineProvider for WhisperProvider {
    fn engine(&self, profile: &EngineProfile) -> Result<Arc<dyn SpeechEngine>> {
        let mut loaded = self.loaded.lock().map_err(|e| SmartsumError::Engine {
            engine: profile.model.clone(),
            message: format!("Engine cache poisoned: {}", e),
        })?;

        if let Some(engine) = loaded.get(&profile.model) {
            return Ok(Arc::clone(engine));
        }

        log::debug!("Loading engine profile {} ({})", profile.name, profile.model);
        let path = self.config.model_path(&profile.model);
        let engine: Arc<dyn SpeechEngine> = Arc::new(WhisperEngine::new(&path, self.config.threads)?);
        loaded.insert(profile.model.clone(), Arc::clone(&engine));
        Ok(engine)
    }
}
