//! Cliente da API Z-API (WhatsApp)
//!
//! Só cobre o que o bot de pré-apontamento usa: envio de texto simples.
//! Todas as notificações (remetente e coordenador) são texto puro, então
//! não dependemos de botões ou listas interativas.
//!
//! # Exemplo
//!
//! ```rust,ignore
//! use zapi::ZApiClient;
//!
//! #[tokio::main]
//! async fn main() -> zapi::Result<()> {
//!     let client = ZApiClient::new(
//!         std::env::var("INSTANCE_ID").unwrap_or_default(),
//!         std::env::var("TOKEN").unwrap_or_default(),
//!         std::env::var("CLIENT_TOKEN").unwrap_or_default(),
//!     )?;
//!
//!     client.send_text("5511999998888", "Olá!").await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod messages;

pub use client::ZApiClient;
pub use error::{Result, ZApiError};
pub use messages::{SendTextRequest, SendTextResponse};
