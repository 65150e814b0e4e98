use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use apontamento_bot::utils::logging::*;
use apontamento_bot::AppState;

pub async fn health_check() -> Json<Value> {
    log_health_check();

    Json(json!({
        "status": "healthy",
        "service": "apontamento-bot",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn ready_check(State(state): State<Arc<AppState>>) -> Result<Json<Value>, StatusCode> {
    log_integration_status_check();

    // Testa a conexão com a staging
    let staging_status = match state.store.ping().await {
        Ok(_) => "connected",
        Err(e) => {
            log_warning(&format!("⚠️ Staging indisponível: {}", e));
            "disconnected"
        }
    };

    let overall_ready = staging_status == "connected";

    let response = json!({
        "ready": overall_ready,
        "service": "apontamento-bot",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "dependencies": {
            "staging": {
                "status": staging_status,
                "backend": state.store.backend()
            },
            "zapi": {
                "configured": state.settings.zapi_configured()
            }
        }
    });

    if overall_ready {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

pub async fn status_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    log_integration_status_check();

    let guard_stats = state.guard.stats().await;

    Json(json!({
        "service": "apontamento-bot",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()),
        "extractor_enabled": state.extractor.is_enabled(),
        "audio_transcription_enabled": state.ia_service.is_some(),
        "staging_backend": state.store.backend(),
        "guard": {
            "cooldown_seconds": state.settings.guard.cooldown_seconds,
            "dedup_ttl_seconds": state.settings.guard.dedup_ttl_seconds,
            "tracked_senders": guard_stats.tracked_senders,
            "tracked_fingerprints": guard_stats.tracked_fingerprints
        },
        "integrations": {
            "zapi": {
                "configured": state.settings.zapi_configured(),
                "instance_id": state.settings.zapi.instance_id.clone().unwrap_or_else(|| "not_configured".to_string())
            },
            "openai": {
                "model": state.settings.openai.model,
                "timeout_seconds": state.settings.openai.timeout_seconds
            }
        }
    }))
}
