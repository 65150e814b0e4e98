//! Cliente HTTP para a API Z-API

use crate::error::{Result, ZApiError};
use crate::messages::{SendTextRequest, SendTextResponse};
use reqwest::{Client as HttpClient, Response};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.z-api.io";

/// Cliente para enviar mensagens via Z-API
///
/// As URLs seguem o formato `{base}/instances/{instance_id}/token/{token}/{acao}`
/// e toda requisição leva o header `Client-Token`.
#[derive(Clone)]
pub struct ZApiClient {
    http_client: HttpClient,
    instance_id: String,
    token: String,
    client_token: String,
    base_url: String,
}

impl ZApiClient {
    /// Cria um novo cliente Z-API
    ///
    /// # Timeouts
    ///
    /// - Total: 30s
    /// - Connect: 5s
    pub fn new(
        instance_id: impl Into<String>,
        token: impl Into<String>,
        client_token: impl Into<String>,
    ) -> Result<Self> {
        Self::with_timeouts(instance_id, token, client_token, 30, 5)
    }

    /// Cria um novo cliente com timeouts customizados
    pub fn with_timeouts(
        instance_id: impl Into<String>,
        token: impl Into<String>,
        client_token: impl Into<String>,
        total_timeout_secs: u64,
        connect_timeout_secs: u64,
    ) -> Result<Self> {
        let instance_id = instance_id.into();
        let token = token.into();

        if instance_id.trim().is_empty() || token.trim().is_empty() {
            return Err(ZApiError::ConfigError(
                "INSTANCE_ID e TOKEN são obrigatórios".to_string(),
            ));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(total_timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .build()
            .map_err(|e| ZApiError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            instance_id,
            token,
            client_token: client_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Troca a URL base (usado em testes e em proxies internos)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/instances/{}/token/{}/{}",
            self.base_url, self.instance_id, self.token, action
        )
    }

    /// Envia uma mensagem de texto simples
    ///
    /// O telefone é reduzido a dígitos antes do envio.
    pub async fn send_text(&self, phone: &str, message: &str) -> Result<SendTextResponse> {
        let phone: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if phone.is_empty() {
            return Err(ZApiError::ValidationError("telefone vazio".to_string()));
        }

        let body = SendTextRequest {
            phone: phone.clone(),
            message: message.to_string(),
        };

        tracing::debug!("POST send-text para ...{} ({} chars)", tail(&phone, 4), message.len());

        let response = self
            .http_client
            .post(self.endpoint("send-text"))
            .header("Client-Token", &self.client_token)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let response = self.handle_response(response).await?;
        let text = response.text().await?;

        if text.trim().is_empty() {
            return Ok(SendTextResponse::default());
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Processa a resposta HTTP e trata erros
    async fn handle_response(&self, response: Response) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        tracing::error!("Z-API error ({}): {}", status_code, error_body);

        let message = match serde_json::from_str::<Value>(&error_body) {
            Ok(json) => json
                .get("error")
                .or_else(|| json.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or(&error_body)
                .to_string(),
            Err(_) => error_body,
        };

        Err(ZApiError::ApiError {
            status: status_code,
            message,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

fn tail(s: &str, n: usize) -> &str {
    let start = s.len().saturating_sub(n);
    &s[start..]
}
