use tracing::{debug, error, info, warn};

pub fn log_request_received(endpoint: &str, method: &str) {
    info!("Request received: {} {}", method, endpoint);
}

pub fn log_request_processed(endpoint: &str, status: u16, duration_ms: u64) {
    info!("Request processed: {} - Status: {} - Duration: {}ms",
          endpoint, status, duration_ms);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_server_startup(port: u16) {
    info!("🚀 Bot de pré-apontamento starting on port {}", port);
}

pub fn log_server_ready(port: u16) {
    info!("✅ Server ready and listening on http://0.0.0.0:{}", port);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_integration_status_check() {
    debug!("Integration status check requested");
}

pub fn log_validation_error(field: &str, message: &str) {
    warn!("Validation error: {} - {}", field, message);
}

/// Mensagem descartada pelo InboundGuard (spam ou reentrega do webhook)
pub fn log_message_suppressed(phone: &str, reason: &str) {
    debug!("🚫 Mensagem de ...{} descartada: {}", phone_tail(phone), reason);
}

pub fn log_raw_saved(raw_id: i64, phone: &str) {
    info!("💾 RAW #{} salvo (remetente ...{})", raw_id, phone_tail(phone));
}

pub fn log_staging_error(step: &str, raw_id: Option<i64>, error: &str) {
    error!("❌ Staging ({}) falhou - raw_id: {:?} - {}", step, raw_id, error);
}

pub fn log_approval_transition(raw_id: i64, status: &str, coordinator: &str) {
    info!("🗳️ RAW #{} → {} (coordenador ...{})", raw_id, status, phone_tail(coordinator));
}

pub fn log_send_error(phone: &str, error: &str) {
    error!("📵 Falha ao enviar mensagem para ...{}: {}", phone_tail(phone), error);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}

/// Últimos 4 caracteres do telefone, para não vazar o número completo no log
pub fn phone_tail(phone: &str) -> &str {
    let mut start = phone.len().saturating_sub(4);
    while start > 0 && !phone.is_char_boundary(start) {
        start -= 1;
    }
    &phone[start..]
}
