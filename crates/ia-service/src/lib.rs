//! Serviço de IA usando async-openai
//!
//! Este crate fornece a interface com a OpenAI usada pelo bot de pré-apontamento:
//! - Extração estruturada em JSON (GPT-4o-mini, `response_format = json_object`)
//! - Transcrição de áudio (Whisper) para mensagens de voz
//!
//! O crate não conhece o formato do boletim: recebe prompt pronto e devolve o
//! conteúdo bruto. Quem interpreta o JSON é o extrator no crate principal.

use async_openai::{
    config::OpenAIConfig,
    types::{
        AudioInput, AudioResponseFormat, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateTranscriptionRequestArgs, ResponseFormat,
    },
    Client,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Erros do serviço de IA
#[derive(Debug)]
pub enum IaServiceError {
    OpenAIError(String),
    Timeout(u64),
    DownloadError(String),
    ParseError(String),
    ConfigError(String),
}

impl fmt::Display for IaServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IaServiceError::OpenAIError(msg) => write!(f, "OpenAI error: {}", msg),
            IaServiceError::Timeout(secs) => write!(f, "OpenAI timeout after {}s", secs),
            IaServiceError::DownloadError(msg) => write!(f, "Download error: {}", msg),
            IaServiceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            IaServiceError::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl Error for IaServiceError {}

pub type IaResult<T> = Result<T, IaServiceError>;

/// Configuração do serviço de IA
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IaServiceConfig {
    /// API key da OpenAI
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Modelo para extração (padrão: gpt-4o-mini)
    pub chat_model: String,
    /// Modelo de transcrição (padrão: whisper-1)
    pub transcription_model: String,
    /// Temperatura baixa: extração, não criatividade (padrão: 0.1)
    pub temperature: f32,
    /// Max tokens para respostas (padrão: 1000)
    pub max_tokens: u32,
    /// Timeout da chamada de chat em segundos (padrão: 30)
    pub request_timeout_secs: u64,
    /// Timeout para downloads de mídia em segundos (padrão: 10)
    pub download_timeout_secs: u64,
}

impl IaServiceConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            chat_model: "gpt-4o-mini".to_string(),
            transcription_model: "whisper-1".to_string(),
            temperature: 0.1,
            max_tokens: 1000,
            request_timeout_secs: 30,
            download_timeout_secs: 10,
        }
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }
}

/// Serviço principal de IA
#[derive(Clone)]
pub struct IaService {
    client: Client<OpenAIConfig>,
    config: IaServiceConfig,
    http_client: reqwest::Client,
}

impl IaService {
    /// Cria novo serviço de IA
    pub fn new(config: IaServiceConfig) -> IaResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(IaServiceError::ConfigError("OPENAI_API_KEY vazia".to_string()));
        }

        let openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        let client = Client::with_config(openai_config);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .connect_timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| IaServiceError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("✅ IaService inicializado com modelo: {}", config.chat_model);

        Ok(Self {
            client,
            config,
            http_client,
        })
    }

    /// Executa um chat completion em modo JSON e devolve o conteúdo bruto
    ///
    /// A chamada é limitada por `request_timeout_secs`; estourar o tempo vira
    /// `IaServiceError::Timeout`.
    pub async fn complete_json(&self, system: &str, prompt: &str) -> IaResult<String> {
        tracing::info!("🔍 Iniciando extração estruturada ({} chars)", prompt.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(|e| IaServiceError::OpenAIError(format!("Failed to build message: {}", e)))?;

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| IaServiceError::OpenAIError(format!("Failed to build message: {}", e)))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.chat_model)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| IaServiceError::OpenAIError(format!("Failed to build request: {}", e)))?;

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let response = tokio::time::timeout(timeout, self.client.chat().create(request))
            .await
            .map_err(|_| IaServiceError::Timeout(self.config.request_timeout_secs))?
            .map_err(|e| IaServiceError::OpenAIError(format!("API call failed: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or_else(|| IaServiceError::ParseError("No content in response".to_string()))?
            .trim()
            .to_string();

        tracing::debug!("📋 Response JSON: {}", content);
        tracing::info!("✅ Resposta recebida: {} chars", content.len());

        Ok(content)
    }

    /// Transcreve áudio usando Whisper
    ///
    /// # Argumentos
    /// * `audio_bytes` - Bytes do arquivo de áudio
    /// * `filename` - Nome do arquivo com extensão (ex: "audio.ogg")
    pub async fn transcribe_audio(&self, audio_bytes: &[u8], filename: &str) -> IaResult<String> {
        tracing::info!("🎤 Transcrevendo áudio com Whisper: {}", filename);

        let audio_input = AudioInput::from_vec_u8(filename.to_string(), audio_bytes.to_vec());

        let request = CreateTranscriptionRequestArgs::default()
            .file(audio_input)
            .model(&self.config.transcription_model)
            .language("pt")
            .response_format(AudioResponseFormat::Json)
            .build()
            .map_err(|e| IaServiceError::OpenAIError(format!("Failed to build transcription request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .map_err(|e| IaServiceError::OpenAIError(format!("Transcription failed: {}", e)))?;

        tracing::info!("✅ Transcrição completada: {} chars", response.text.len());

        Ok(response.text)
    }

    /// Baixa áudio de uma URL
    pub async fn download_audio(&self, url: &str) -> IaResult<Vec<u8>> {
        tracing::info!("⬇️ Baixando áudio de: {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| IaServiceError::DownloadError(format!("Download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(IaServiceError::DownloadError(format!(
                "HTTP {} while downloading audio",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IaServiceError::DownloadError(format!("Failed to read bytes: {}", e)))?
            .to_vec();

        tracing::info!("✅ Áudio baixado: {} bytes", bytes.len());

        Ok(bytes)
    }

    /// Baixa e transcreve um áudio referenciado por URL
    pub async fn transcribe_url(&self, audio_url: &str) -> IaResult<String> {
        let audio_bytes = self.download_audio(audio_url).await?;
        let filename = format!("audio.{}", audio_extension(audio_url));
        self.transcribe_audio(&audio_bytes, &filename).await
    }
}

/// Extensão do arquivo a partir da URL, ignorando query string (padrão: ogg)
fn audio_extension(url: &str) -> &str {
    let path = url.split('?').next().unwrap_or(url);
    let last_segment = path.rsplit('/').next().unwrap_or(path);

    match last_segment.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.len() <= 4 => ext,
        _ => "ogg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = IaServiceConfig::new("test-key".to_string())
            .with_chat_model("gpt-4o")
            .with_temperature(0.5)
            .with_max_tokens(2000)
            .with_request_timeout(12);

        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.request_timeout_secs, 12);
        assert_eq!(config.api_key, "test-key");
    }

    #[test]
    fn test_config_defaults_match_extraction_needs() {
        let config = IaServiceConfig::new("k".to_string());
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert!(matches!(
            IaService::new(IaServiceConfig::new("  ".to_string())),
            Err(IaServiceError::ConfigError(_))
        ));
    }

    #[test]
    fn test_audio_extension() {
        assert_eq!(audio_extension("https://cdn.z-api.io/a/b/voice.mp3?x=1"), "mp3");
        assert_eq!(audio_extension("https://cdn.z-api.io/a/b/voice"), "ogg");
        assert_eq!(audio_extension("https://host/file.opus"), "opus");
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = IaServiceConfig::new("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
