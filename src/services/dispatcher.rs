//! Roteamento de uma mensagem recebida
//!
//! Ordem: guarda (spam/duplicado) → botão vira comando → comando de
//! aprovação → detector → pipeline. Comando sem permissão segue para o
//! detector como texto comum. Texto que não é comando nem pré-apontamento
//! é ignorado.

use chrono::Utc;
use std::time::Instant;

use crate::models::{InboundKind, InboundMessage};
use crate::services::approval::{self, ApprovalOutcome};
use crate::services::approval_command::{self, Interpretation};
use crate::services::detector;
use crate::services::inbound_guard::GuardDecision;
use crate::services::pipeline::PipelineOutcome;
use crate::utils::logging::{log_error, log_message_suppressed, log_warning, phone_tail};
use crate::AppState;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Suppressed(GuardDecision),
    Ignored(&'static str),
    Unauthorized,
    Approval(ApprovalOutcome),
    Report(PipelineOutcome),
}

/// Texto a ser interpretado; áudio passa pela transcrição
async fn resolve_text(state: &AppState, message: &InboundMessage) -> Result<String, &'static str> {
    match &message.kind {
        InboundKind::Text(text) => Ok(text.clone()),
        InboundKind::ButtonReply { button_id, text } => Ok(approval_command::command_from_button(button_id)
            .unwrap_or_else(|| text.clone())),
        InboundKind::Audio { url } => {
            let Some(ia) = state.ia_service.as_ref() else {
                return Err("audio_without_transcription");
            };
            match ia.transcribe_url(url).await {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::info!("🎤 Áudio de ...{} transcrito ({} chars)", phone_tail(&message.phone), text.len());
                    Ok(text)
                }
                Ok(_) => Err("audio_empty_transcription"),
                Err(e) => {
                    log_warning(&format!("⚠️ Falha na transcrição de áudio: {}", e));
                    Err("audio_transcription_failed")
                }
            }
        }
        InboundKind::Other => Err("unsupported_message_kind"),
    }
}

pub async fn dispatch(state: &AppState, message: InboundMessage, now: Instant) -> DispatchOutcome {
    let decision = state.guard.admit(&message, now).await;
    if !decision.is_admitted() {
        let reason = match decision {
            GuardDecision::Duplicate => "duplicado",
            _ => "cooldown",
        };
        log_message_suppressed(&message.phone, reason);
        return DispatchOutcome::Suppressed(decision);
    }

    let text = match resolve_text(state, &message).await {
        Ok(text) => text,
        Err(reason) => return DispatchOutcome::Ignored(reason),
    };

    match approval_command::interpret(state.store.as_ref(), &text, &message.phone).await {
        Ok(Interpretation::Command { action, raw_id }) => {
            return match approval::apply(
                state.store.as_ref(),
                state.sender.as_ref(),
                action,
                raw_id,
                &message.phone,
            )
            .await
            {
                Ok(outcome) => DispatchOutcome::Approval(outcome),
                Err(e) => {
                    log_error(&format!("❌ Falha ao aplicar {} #{}: {}", action.keyword(), raw_id, e));
                    DispatchOutcome::Ignored("approval_failed")
                }
            };
        }
        Ok(Interpretation::Unauthorized) => {
            // Sem permissão vale como "não é comando": o texto ainda pode ser um pré-apontamento
            if !detector::detect(&text) {
                log_warning(&format!(
                    "🔒 Comando de aprovação de ...{} sem permissão, ignorado",
                    phone_tail(&message.phone)
                ));
                return DispatchOutcome::Unauthorized;
            }
        }
        Ok(Interpretation::NotACommand) => {}
        Err(e) => {
            log_error(&format!("❌ Falha ao verificar comando de aprovação: {}", e));
            return DispatchOutcome::Ignored("approval_lookup_failed");
        }
    }

    if !detector::detect(&text) {
        return DispatchOutcome::Ignored("not_a_report");
    }

    DispatchOutcome::Report(state.pipeline.run(&message.phone, &text, Utc::now()).await)
}
