use serde::{Deserialize, Serialize};
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub zapi: ZApiSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub guard: GuardSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ZApiSettings {
    pub instance_id: Option<String>,
    pub token: Option<String>,
    pub client_token: Option<String>,
    pub base_url: Option<String>,  // Sobrescreve https://api.z-api.io (proxy/testes)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,  // Sem URL: staging em memória (apenas desenvolvimento)
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OpenAiSettings {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 1000,
            timeout_seconds: 30,
        }
    }
}

/// Janelas do InboundGuard
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GuardSettings {
    pub cooldown_seconds: u64,
    pub dedup_ttl_seconds: u64,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            cooldown_seconds: 15,
            dedup_ttl_seconds: 300,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // APONTAMENTO__ZAPI__TOKEN, APONTAMENTO__GUARD__COOLDOWN_SECONDS, ...
            .add_source(Environment::with_prefix("APONTAMENTO").separator("__"));

        // Nomes legados do deploy original (têm prioridade)
        let legacy = [
            ("INSTANCE_ID", "zapi.instance_id"),
            ("TOKEN", "zapi.token"),
            ("CLIENT_TOKEN", "zapi.client_token"),
            ("OPENAI_API_KEY", "openai.api_key"),
            ("DATABASE_URL", "database.url"),
        ];
        for (var, key) in legacy {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    builder = builder.set_override(key, value)?;
                }
            }
        }

        let s = builder.build()?;

        s.try_deserialize()
    }

    /// Credenciais Z-API completas?
    pub fn zapi_configured(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
        filled(&self.zapi.instance_id) && filled(&self.zapi.token) && filled(&self.zapi.client_token)
    }
}
