//! Shared application state for the Axum server (`spec.md` §6).

use std::sync::Arc;

use lingua_cache::PredictionCache;
use lingua_cognitive_load::CognitiveLoadCore;
use lingua_data::{DataReader, DataWriter};
use lingua_erasure::ErasureCoordinator;
use lingua_router::RouterCore;
use lingua_story::StoryWordSelector;
use lingua_tracer::KnowledgeTracer;

/// Shared-secret header value gating every route. If empty, auth is
/// bypassed — development mode (`spec.md` §6).
pub const API_KEY_HEADER: &str = "x-api-key";

/// All service cores wired against one data-access backend, passed to
/// every route handler via Axum `State` (`spec.md` §2 diagram).
pub struct AppState {
    pub api_key: String,
    pub tracer: Arc<KnowledgeTracer>,
    pub cognitive_load: CognitiveLoadCore,
    pub router: Arc<RouterCore>,
    pub story: Arc<StoryWordSelector>,
    pub erasure: Arc<ErasureCoordinator>,
    pub cache: Arc<PredictionCache>,
    pub data: Arc<dyn DataReader>,
    pub writer: Arc<dyn DataWriter>,
}

impl AppState {
    pub fn new(
        data: Arc<dyn DataReader>,
        writer: Arc<dyn DataWriter>,
        cache: Arc<PredictionCache>,
        api_key: String,
    ) -> Arc<Self> {
        let tracer = Arc::new(KnowledgeTracer::new(data.clone()));
        let cognitive_load = CognitiveLoadCore::new(data.clone());
        let router = Arc::new(RouterCore::new(data.clone(), writer.clone(), tracer.clone()));
        let story = Arc::new(StoryWordSelector::new(data.clone(), writer.clone()).with_tracer(tracer.clone()));
        let erasure = Arc::new(ErasureCoordinator::new(writer.clone(), cache.clone()));

        Arc::new(Self {
            api_key,
            tracer,
            cognitive_load,
            router,
            story,
            erasure,
            cache,
            data,
            writer,
        })
    }
}
