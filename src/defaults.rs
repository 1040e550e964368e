//! Default configuration constants for smartsum.
//!
//! Shared between configuration types, the engine registry and the CLI so the
//! same model names and limits are used everywhere.

/// General-purpose whisper model used for every language without a dedicated one.
pub const DEFAULT_MODEL: &str = "large-v3";

/// Hebrew fine-tuned whisper model used for Hebrew transcription.
pub const HEBREW_MODEL: &str = "ivrit-ai-whisper-v2-d4";

/// Hebrew language code.
pub const HEBREW_LANGUAGE: &str = "he";

/// English language code.
pub const ENGLISH_LANGUAGE: &str = "en";

/// Farsi language code.
pub const FARSI_LANGUAGE: &str = "fa";

/// Languages a media item may be tagged with.
pub const LANGUAGES: &[(&str, &str)] = &[
    (ENGLISH_LANGUAGE, "English"),
    (HEBREW_LANGUAGE, "Hebrew"),
    (FARSI_LANGUAGE, "Farsi"),
];

/// Beam width passed to the speech engine.
pub const BEAM_SIZE: u32 = 5;

/// Sample rate the whisper engine expects, in Hz.
pub const SAMPLE_RATE: u32 = 16000;

/// Number of engine segments buffered between the engine thread and the store.
pub const SEGMENT_BUFFER: usize = 64;

/// Default upper bound for a single engine run.
///
/// Long recordings on CPU can take a while; this only guards against hung runs.
pub const ENGINE_TIMEOUT_SECS: u64 = 60 * 60;

/// Characters shown in list-view snippets.
pub const SNIPPET_CHARS: usize = 500;

/// Default maximum summary length in words.
pub const SUMMARY_MAX_WORDS: usize = 150;

/// Default minimum summary length in words.
pub const SUMMARY_MIN_WORDS: usize = 30;

/// Summarization profile for languages the general model handles poorly.
pub const MULTILINGUAL_PROFILE: &str = "multilingual";

/// Summarization profile for everything else.
pub const GENERAL_PROFILE: &str = "general";

/// Maximum input words per chunk for the general summarization model.
pub const GENERAL_MAX_INPUT_WORDS: usize = 700;

/// Maximum input words per chunk for the multilingual summarization model.
///
/// Hebrew and Farsi tokenize into more tokens per word, so the budget is smaller.
pub const MULTILINGUAL_MAX_INPUT_WORDS: usize = 400;

/// Default Ollama model for summaries.
pub const OLLAMA_MODEL: &str = "llama3.2";

/// Default Ollama model for multilingual summaries.
pub const OLLAMA_MULTILINGUAL_MODEL: &str = "aya-expanse";

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Default LibreTranslate endpoint (serves the installed Argos language packs).
pub const TRANSLATE_URL: &str = "http://localhost:5000";

/// Target language of the text translation action.
pub const TEXT_TRANSLATION_TARGET: &str = ENGLISH_LANGUAGE;

/// Argos Translate package index.
pub const ARGOS_INDEX_URL: &str =
    "https://raw.githubusercontent.com/argosopentech/argospm-index/main/index.json";

/// Language pairs fetched by `fetch-langs`, in download order.
///
/// Farsi to Hebrew is not published as a direct package and stays disabled.
pub const LANGUAGE_PAIRS: &[(&str, &str)] = &[
    (HEBREW_LANGUAGE, ENGLISH_LANGUAGE),
    (FARSI_LANGUAGE, ENGLISH_LANGUAGE),
    (ENGLISH_LANGUAGE, FARSI_LANGUAGE),
];

/// Report the GPU backend compiled into this build.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS (AMD)"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}

/// Display name for a language code, or the code itself when unknown.
pub fn language_name(code: &str) -> &str {
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}
