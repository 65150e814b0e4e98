// Biblioteca do bot de pré-apontamento
// Expõe módulos para uso em testes e no binário

pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use services::{InboundGuard, MessageSender, PreApontamentoPipeline, StagingStore, StructuredExtractor};

// AppState é definido aqui para ser compartilhado
#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub guard: InboundGuard,
    pub store: Arc<dyn StagingStore>,
    pub sender: Arc<dyn MessageSender>,
    pub extractor: Arc<dyn StructuredExtractor>,
    pub pipeline: PreApontamentoPipeline,
    /// Transcrição de áudio (ausente sem OPENAI_API_KEY)
    pub ia_service: Option<Arc<ia_service::IaService>>,
}

impl AppState {
    pub fn new(
        settings: config::Settings,
        store: Arc<dyn StagingStore>,
        sender: Arc<dyn MessageSender>,
        extractor: Arc<dyn StructuredExtractor>,
        ia_service: Option<Arc<ia_service::IaService>>,
    ) -> Self {
        let guard = InboundGuard::from_settings(&settings.guard);
        let pipeline = PreApontamentoPipeline::new(store.clone(), sender.clone(), extractor.clone());
        Self {
            settings,
            guard,
            store,
            sender,
            extractor,
            pipeline,
            ia_service,
        }
    }
}
