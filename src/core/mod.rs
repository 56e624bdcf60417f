pub mod backend;
pub mod catalog;
pub mod classifier;
pub mod format;
pub mod language;
pub mod registry;
pub mod resolver;
pub mod router;

// Re-export commonly used types for convenience
pub use backend::{
    Backend, BackendBuilder, BackendLoadError, BackendLoadResult, BackendSpec, Device,
    RenderRequest, SpeakerSet, SynthesisEngine, SynthesisError, SynthesisResult,
    WorkerBackendBuilder, WorkerClassifier, WorkerEngine,
};

pub use catalog::{CatalogError, CatalogResult, CustomModelCatalog, CustomModelEntry};

pub use classifier::{
    ClassificationError, ClassificationResult, Detection, LanguageClassifier, ScriptClassifier,
};

pub use format::AudioFormat;

pub use language::{DEFAULT_EN_VOICE, DEFAULT_MODEL, LanguageCode};

pub use registry::{BackendRegistry, DefaultBackend, RegistryStats};

pub use resolver::{ResolutionPlan, ResolvedVoice, VoiceHint, VoiceResolver, fallback_voice};

pub use router::{
    Route, RouterError, RouterResult, SpeechRouter, SynthesisOutput, SynthesisRequest,
};
