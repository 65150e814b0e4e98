//! Tipos de erro para o crate zapi

use thiserror::Error;

/// Erros do cliente Z-API
#[derive(Debug, Error)]
pub enum ZApiError {
    /// Erro de requisição HTTP (conexão, timeout, TLS)
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Erro da API Z-API (status code não-2xx)
    #[error("Z-API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Erro de parsing JSON
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Credenciais ausentes ou cliente mal configurado
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Telefone vazio depois da normalização
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Tipo Result padrão para o crate
pub type Result<T> = std::result::Result<T, ZApiError>;
