use axum::{
    body::Body,
    extract::{Request, State},
    response::Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;

use apontamento_bot::models::ZApiWebhookPayload;
use apontamento_bot::services::{dispatch, DispatchOutcome};
use apontamento_bot::utils::logging::*;
use apontamento_bot::utils::AppError;
use apontamento_bot::AppState;

/// Callback de mensagem recebida do Z-API
///
/// Responde 200 imediatamente; o resultado chega ao remetente via Z-API.
pub async fn handle_zapi_webhook(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Result<Json<Value>, AppError> {
    let start_time = Instant::now();
    log_request_received("/webhooks/zapi", "POST");

    let body_bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to read request body: {}", e)))?;

    // Z-API reenvia callbacks que não recebem 200; payload inválido não melhora na reentrega
    let payload: ZApiWebhookPayload = match serde_json::from_slice(&body_bytes) {
        Ok(payload) => payload,
        Err(e) => {
            log_validation_error("payload", &format!("Invalid JSON: {}", e));
            return Ok(Json(json!({ "status": "invalid" })));
        }
    };

    if payload.is_ignorable() {
        tracing::debug!(
            "Mensagem ignorada (fromMe: {}, isGroup: {})",
            payload.from_me,
            payload.is_group
        );
        return Ok(Json(json!({ "status": "ignored" })));
    }

    let inbound = payload.into_inbound();
    let received_at = std::time::Instant::now();

    // Processar em background (não bloqueia a resposta)
    let state_clone = Arc::clone(&state);
    tokio::spawn(async move {
        let phone = inbound.phone.clone();
        match dispatch(&state_clone, inbound, received_at).await {
            DispatchOutcome::Report(outcome) => log_info(&format!(
                "📋 Pré-apontamento de ...{} processado: {:?} (raw_id: {:?})",
                phone_tail(&phone),
                outcome.kind,
                outcome.raw_id
            )),
            DispatchOutcome::Approval(outcome) => log_info(&format!("🗳️ Comando processado: {:?}", outcome)),
            other => tracing::debug!("Mensagem de ...{} sem ação: {:?}", phone_tail(&phone), other),
        }
    });

    let processing_time = start_time.elapsed().as_millis() as u64;
    log_request_processed("/webhooks/zapi", 200, processing_time);

    Ok(Json(json!({ "status": "received" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apontamento_bot::config::Settings;
    use apontamento_bot::services::{DisabledExtractor, MemoryStagingStore, RecordingSender};

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Settings::default(),
            Arc::new(MemoryStagingStore::new()),
            Arc::new(RecordingSender::new()),
            Arc::new(DisabledExtractor),
            None,
        ))
    }

    async fn post(body: &str) -> Value {
        let request = Request::new(Body::from(body.to_string()));
        match handle_zapi_webhook(State(state()), request).await {
            Ok(Json(value)) => value,
            Err(e) => panic!("webhook should always answer 200, got {}", e),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_answers_200_invalid() {
        assert_eq!(post("not json").await["status"], "invalid");
    }

    #[tokio::test]
    async fn test_own_and_group_messages_are_ignored() {
        let own = r#"{"phone": "5511988887777", "fromMe": true, "text": {"message": "oi"}}"#;
        assert_eq!(post(own).await["status"], "ignored");

        let group = r#"{"phone": "5511988887777", "isGroup": true, "text": {"message": "oi"}}"#;
        assert_eq!(post(group).await["status"], "ignored");
    }

    #[tokio::test]
    async fn test_text_message_is_received() {
        let body = r#"{"phone": "5511988887777", "text": {"message": "bom dia"}}"#;
        assert_eq!(post(body).await["status"], "received");
    }
}
