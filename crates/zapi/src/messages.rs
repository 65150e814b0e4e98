//! Corpos de requisição/resposta do endpoint `send-text`

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct SendTextRequest {
    pub phone: String,
    pub message: String,
}

/// Resposta do Z-API. Os campos variam entre versões da API,
/// por isso todos são opcionais.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextResponse {
    #[serde(default)]
    pub zaap_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl SendTextResponse {
    /// Identificador mais específico disponível na resposta
    pub fn best_id(&self) -> Option<&str> {
        self.message_id
            .as_deref()
            .or(self.zaap_id.as_deref())
            .or(self.id.as_deref())
    }
}
