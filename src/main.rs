/// Bot de pré-apontamento via WhatsApp (Z-API)
///
/// Fluxo:
/// - Webhook Z-API recebe a mensagem e responde 200 imediatamente
/// - Processamento em background: guarda → comando de aprovação → detector
/// - Pré-apontamento: RAW → extração OpenAI → rateio → BOLETIM/PREMIO
/// - Coordenador do projeto recebe o resumo e aprova com SIM/NAO/CORRIGIR <id>

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use apontamento_bot::config::Settings;
use apontamento_bot::services::{
    DisabledExtractor, MemoryStagingStore, MessageSender, OpenAiExtractor, PgStagingStore,
    RecordingSender, StagingStore, StructuredExtractor,
};
use apontamento_bot::utils::{logging::*, AppError};
use apontamento_bot::AppState;

mod handlers;

use handlers::{handle_zapi_webhook, health_check, ready_check, status_check};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 🔧 Carregar variáveis de ambiente do arquivo .env (se existir)
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    // Inicializar tracing (RUST_LOG, padrão info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if dotenv_loaded {
        tracing::info!("✅ Arquivo .env carregado com sucesso");
    } else {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    // Carregar configurações
    let settings = Settings::new()
        .map_err(|e| AppError::ConfigError(format!("Failed to load settings: {}", e)))?;

    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    // Staging: Postgres quando configurado, memória em desenvolvimento
    let store: Arc<dyn StagingStore> = match settings.database.url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let store = PgStagingStore::connect(url, settings.database.max_connections)
                .await
                .map_err(AppError::from)?;
            store.ensure_schema().await.map_err(AppError::from)?;
            log_info("✅ Staging Postgres conectada");
            Arc::new(store)
        }
        _ => {
            log_warning("⚠️ DATABASE_URL não configurada. Staging em memória (dados não persistem).");
            Arc::new(MemoryStagingStore::new())
        }
    };

    // Envio de mensagens: Z-API quando configurado, gravação em log caso contrário
    let sender: Arc<dyn MessageSender> = if settings.zapi_configured() {
        let zapi_settings = &settings.zapi;
        let mut client = zapi::ZApiClient::new(
            zapi_settings.instance_id.clone().unwrap_or_default(),
            zapi_settings.token.clone().unwrap_or_default(),
            zapi_settings.client_token.clone().unwrap_or_default(),
        )
        .map_err(|e| AppError::ConfigError(format!("Failed to create Z-API client: {}", e)))?;
        if let Some(base_url) = zapi_settings.base_url.as_deref() {
            client = client.with_base_url(base_url);
        }
        log_info("✅ Cliente Z-API configurado");
        Arc::new(client)
    } else {
        log_warning("⚠️ Credenciais Z-API incompletas. Respostas serão apenas registradas em log.");
        Arc::new(RecordingSender::new())
    };

    // Inicializar IA Service (OpenAI)
    let ia_service = match settings.openai.api_key.as_deref() {
        Some(api_key) if !api_key.trim().is_empty() => {
            let config = ia_service::IaServiceConfig::new(api_key.to_string())
                .with_chat_model(settings.openai.model.clone())
                .with_temperature(settings.openai.temperature)
                .with_max_tokens(settings.openai.max_tokens)
                .with_request_timeout(settings.openai.timeout_seconds);

            match ia_service::IaService::new(config) {
                Ok(service) => {
                    log_info(&format!("✅ IaService inicializado com OpenAI ({})", settings.openai.model));
                    Some(Arc::new(service))
                }
                Err(e) => {
                    log_warning(&format!("⚠️ Falha ao inicializar IaService: {}. Extração desabilitada.", e));
                    None
                }
            }
        }
        _ => {
            log_warning("⚠️ OPENAI_API_KEY não configurada. Extração desabilitada.");
            None
        }
    };

    let extractor: Arc<dyn StructuredExtractor> = match &ia_service {
        Some(ia) => Arc::new(OpenAiExtractor::new(Arc::clone(ia))),
        None => Arc::new(DisabledExtractor),
    };

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(settings.server.port);
    let host = settings.server.host.clone();

    let app_state = Arc::new(AppState::new(settings, store, sender, extractor, ia_service));

    let app = Router::new()
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/status", get(status_check))

        // Callback de mensagens recebidas do Z-API
        .route("/webhooks/zapi", post(handle_zapi_webhook))

        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let listener = TcpListener::bind(format!("{}:{}", host, port)).await?;

    log_server_startup(port);
    log_server_ready(port);

    // Graceful shutdown com signal handling
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_info("🛑 Server shut down gracefully");
    Ok(())
}

/// Signal handler para graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log_error(&format!("❌ Falha ao instalar handler de Ctrl+C: {}", e));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log_error(&format!("❌ Falha ao instalar handler de SIGTERM: {}", e));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log_info("🛑 Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            log_info("🛑 Received SIGTERM, shutting down gracefully...");
        }
    }
}
