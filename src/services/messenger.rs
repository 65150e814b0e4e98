//! Envio de mensagens de texto ao WhatsApp

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use zapi::ZApiClient;

use crate::utils::logging::{log_send_error, phone_tail};
use crate::utils::{AppError, AppResult};

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, phone: &str, message: &str) -> AppResult<()>;
}

#[async_trait]
impl MessageSender for ZApiClient {
    async fn send_text(&self, phone: &str, message: &str) -> AppResult<()> {
        match ZApiClient::send_text(self, phone, message).await {
            Ok(response) => {
                tracing::debug!(
                    "📤 Mensagem enviada para ...{} (id: {})",
                    phone_tail(phone),
                    response.best_id().unwrap_or("-")
                );
                Ok(())
            }
            Err(e) => {
                log_send_error(phone, &e.to_string());
                Err(AppError::from(e))
            }
        }
    }
}

/// Mensagem guardada pelo `RecordingSender`
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub phone: String,
    pub text: String,
}

/// Sender sem rede: registra e loga as mensagens
///
/// Usado quando o Z-API não está configurado (desenvolvimento) e nos testes.
#[derive(Debug, Clone, Default)]
pub struct RecordingSender {
    sent: Arc<RwLock<Vec<SentMessage>>>,
    /// Telefones (só dígitos) para os quais o envio falha
    failing: Arc<RwLock<Vec<String>>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_for(&self, phone: &str) {
        self.failing
            .write()
            .await
            .push(crate::utils::normalize_phone(phone));
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, phone: &str) -> Vec<String> {
        let phone = crate::utils::normalize_phone(phone);
        self.sent
            .read()
            .await
            .iter()
            .filter(|m| m.phone == phone)
            .map(|m| m.text.clone())
            .collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, phone: &str, message: &str) -> AppResult<()> {
        let phone = crate::utils::normalize_phone(phone);

        if self.failing.read().await.contains(&phone) {
            log_send_error(&phone, "envio simulado falhou");
            return Err(AppError::Messaging(format!("delivery to ...{} failed", phone_tail(&phone))));
        }

        tracing::info!("📝 [sem Z-API] para ...{}:\n{}", phone_tail(&phone), message);
        self.sent.write().await.push(SentMessage {
            phone,
            text: message.to_string(),
        });
        Ok(())
    }
}
