use serde::{Deserialize, Serialize};

use crate::utils::normalize_phone;

/// Callback "on-message-received" do Z-API
///
/// O Z-API manda um objeto por mensagem; apenas um dos blocos
/// `text`/`audio`/`buttonsResponseMessage` vem preenchido.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZApiWebhookPayload {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub text: Option<TextContent>,
    #[serde(default)]
    pub audio: Option<AudioContent>,
    #[serde(default)]
    pub buttons_response_message: Option<ButtonResponse>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TextContent {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AudioContent {
    #[serde(default)]
    pub audio_url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub seconds: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ButtonResponse {
    #[serde(default)]
    pub button_id: String,
    #[serde(default)]
    pub message: String,
}

/// Mensagem recebida, já reduzida ao que o bot precisa
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Telefone do remetente, só dígitos
    pub phone: String,
    pub kind: InboundKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundKind {
    Text(String),
    Audio { url: String },
    ButtonReply { button_id: String, text: String },
    Other,
}

impl InboundKind {
    /// Rótulo usado na impressão digital do InboundGuard
    pub fn label(&self) -> &'static str {
        match self {
            InboundKind::Text(_) => "TEXT",
            InboundKind::Audio { .. } => "AUDIO",
            InboundKind::ButtonReply { .. } => "BUTTON",
            InboundKind::Other => "OTHER",
        }
    }

    /// Conteúdo (texto, URL do áudio ou id do botão) usado na impressão digital
    pub fn content_key(&self) -> &str {
        match self {
            InboundKind::Text(text) => text,
            InboundKind::Audio { url } => url,
            InboundKind::ButtonReply { button_id, .. } => button_id,
            InboundKind::Other => "",
        }
    }
}

impl ZApiWebhookPayload {
    /// Mensagens próprias e de grupo não são processadas
    pub fn is_ignorable(&self) -> bool {
        self.from_me || self.is_group || normalize_phone(&self.phone).is_empty()
    }

    pub fn into_inbound(self) -> InboundMessage {
        let phone = normalize_phone(&self.phone);

        let kind = if let Some(button) = self.buttons_response_message.filter(|b| !b.button_id.is_empty()) {
            InboundKind::ButtonReply {
                button_id: button.button_id,
                text: button.message,
            }
        } else if let Some(audio) = self.audio.filter(|a| !a.audio_url.is_empty()) {
            InboundKind::Audio { url: audio.audio_url }
        } else if let Some(text) = self.text.filter(|t| !t.message.trim().is_empty()) {
            InboundKind::Text(text.message.trim().to_string())
        } else {
            InboundKind::Other
        };

        InboundMessage { phone, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_payload() {
        let json = r#"{
            "phone": "5511999998888",
            "fromMe": false,
            "isGroup": false,
            "messageId": "ABC",
            "type": "ReceivedCallback",
            "text": {"message": "  SIM 48  "}
        }"#;
        let payload: ZApiWebhookPayload = serde_json::from_str(json).unwrap();
        assert!(!payload.is_ignorable());

        let inbound = payload.into_inbound();
        assert_eq!(inbound.phone, "5511999998888");
        assert_eq!(inbound.kind, InboundKind::Text("SIM 48".to_string()));
    }

    #[test]
    fn test_audio_payload() {
        let json = r#"{"phone": "+55 11 99999-8888", "audio": {"audioUrl": "https://x/a.ogg"}}"#;
        let inbound = serde_json::from_str::<ZApiWebhookPayload>(json).unwrap().into_inbound();
        assert_eq!(inbound.phone, "5511999998888");
        assert_eq!(inbound.kind, InboundKind::Audio { url: "https://x/a.ogg".to_string() });
        assert_eq!(inbound.kind.label(), "AUDIO");
    }

    #[test]
    fn test_button_takes_precedence_over_text() {
        let json = r#"{
            "phone": "5511",
            "text": {"message": "APROVAR"},
            "buttonsResponseMessage": {"buttonId": "aprovar_12", "message": "✅ APROVAR"}
        }"#;
        let inbound = serde_json::from_str::<ZApiWebhookPayload>(json).unwrap().into_inbound();
        assert_eq!(inbound.kind.content_key(), "aprovar_12");
    }

    #[test]
    fn test_ignorable_payloads() {
        let own: ZApiWebhookPayload = serde_json::from_str(r#"{"phone": "5511", "fromMe": true}"#).unwrap();
        assert!(own.is_ignorable());

        let group: ZApiWebhookPayload = serde_json::from_str(r#"{"phone": "5511", "isGroup": true}"#).unwrap();
        assert!(group.is_ignorable());

        let empty: ZApiWebhookPayload = serde_json::from_str(r#"{}"#).unwrap();
        assert!(empty.is_ignorable());
        assert_eq!(empty.into_inbound().kind, InboundKind::Other);
    }
}
