//! Supressão de spam e de reentregas do webhook
//!
//! Duas regras, avaliadas nesta ordem:
//! - cooldown por remetente: depois de uma mensagem admitida, o mesmo
//!   telefone fica em silêncio por `cooldown` (15s por padrão);
//! - impressão digital `(tipo, remetente, conteúdo)`, sem timestamp, para que
//!   a reentrega idêntica do Z-API seja reconhecida; expira em `dedup_ttl`.
//!
//! Estado apenas em memória. Reiniciar o processo zera tudo.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::settings::GuardSettings;
use crate::models::InboundMessage;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    Admitted,
    /// Remetente ainda dentro da janela de cooldown
    Cooldown { remaining: Duration },
    /// Mesmo payload já admitido dentro do horizonte de expiração
    Duplicate,
}

impl GuardDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GuardDecision::Admitted)
    }
}

#[derive(Debug, Default)]
struct GuardState {
    /// telefone -> instante da última mensagem admitida
    last_admitted: HashMap<String, Instant>,
    /// impressão digital -> primeira vez vista
    fingerprints: HashMap<String, Instant>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStats {
    pub tracked_senders: usize,
    pub tracked_fingerprints: usize,
}

#[derive(Debug, Clone)]
pub struct InboundGuard {
    cooldown: Duration,
    dedup_ttl: Duration,
    state: Arc<RwLock<GuardState>>,
}

impl InboundGuard {
    pub fn new(cooldown: Duration, dedup_ttl: Duration) -> Self {
        Self {
            cooldown,
            dedup_ttl,
            state: Arc::new(RwLock::new(GuardState::default())),
        }
    }

    pub fn from_settings(settings: &GuardSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.cooldown_seconds),
            Duration::from_secs(settings.dedup_ttl_seconds),
        )
    }

    /// Impressão digital do payload (sem timestamp)
    pub fn fingerprint(message: &InboundMessage) -> String {
        let mut hasher = Sha256::new();
        hasher.update(message.kind.label().as_bytes());
        hasher.update(b"|");
        hasher.update(message.phone.as_bytes());
        hasher.update(b"|");
        hasher.update(message.kind.content_key().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Decide se a mensagem entra no processamento
    ///
    /// Só a admissão altera o estado; rejeições não renovam nenhuma janela.
    /// Verificação e atualização acontecem sob o mesmo lock de escrita.
    pub async fn admit(&self, message: &InboundMessage, now: Instant) -> GuardDecision {
        let fingerprint = Self::fingerprint(message);
        let mut state = self.state.write().await;

        // Varredura oportunista das entradas expiradas
        let dedup_ttl = self.dedup_ttl;
        state
            .fingerprints
            .retain(|_, seen| now.saturating_duration_since(*seen) < dedup_ttl);
        let cooldown = self.cooldown;
        state
            .last_admitted
            .retain(|_, at| now.saturating_duration_since(*at) < cooldown);

        if let Some(last) = state.last_admitted.get(&message.phone) {
            let elapsed = now.saturating_duration_since(*last);
            return GuardDecision::Cooldown {
                remaining: self.cooldown.saturating_sub(elapsed),
            };
        }

        if state.fingerprints.contains_key(&fingerprint) {
            return GuardDecision::Duplicate;
        }

        state.last_admitted.insert(message.phone.clone(), now);
        state.fingerprints.insert(fingerprint, now);
        GuardDecision::Admitted
    }

    pub async fn stats(&self) -> GuardStats {
        let state = self.state.read().await;
        GuardStats {
            tracked_senders: state.last_admitted.len(),
            tracked_fingerprints: state.fingerprints.len(),
        }
    }
}
