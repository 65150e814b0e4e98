//! Máquina de estados da aprovação
//!
//! PENDENTE → APROVADO | REJEITADO | CORRECAO_SOLICITADA, uma única vez.
//! A transição é um UPDATE condicionado a `status = 'PENDENTE'`; se nenhuma
//! linha muda, o RAW já foi decidido e o coordenador recebe "já processado".
//! As duas notificações (remetente e coordenador) são independentes.

use crate::models::{ApprovalAction, RawStatus};
use crate::services::messenger::MessageSender;
use crate::services::staging::{StagingError, StagingStore};
use crate::utils::logging::{log_approval_transition, log_warning};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Applied {
        raw_id: i64,
        status: RawStatus,
        submitter_notified: bool,
        coordinator_notified: bool,
    },
    AlreadyProcessed {
        raw_id: i64,
        status: RawStatus,
    },
    NotFound {
        raw_id: i64,
    },
}

fn status_label(status: RawStatus) -> &'static str {
    match status {
        RawStatus::Pending => "PENDENTE",
        RawStatus::Approved => "APROVADO",
        RawStatus::Rejected => "REJEITADO",
        RawStatus::CorrectionRequested => "CORREÇÃO SOLICITADA",
    }
}

pub fn submitter_message(action: ApprovalAction, raw_id: i64) -> String {
    match action {
        ApprovalAction::Approve => format!(
            "✅ *PRÉ-APONTAMENTO #{} APROVADO*\n\nSeu pré-apontamento foi aprovado pelo coordenador e será lançado no sistema.",
            raw_id
        ),
        ApprovalAction::Reject => format!(
            "❌ *PRÉ-APONTAMENTO #{} REJEITADO*\n\nO coordenador rejeitou este pré-apontamento. Revise os dados e envie um novo pré-apontamento.",
            raw_id
        ),
        ApprovalAction::RequestCorrection => format!(
            "✏️ *CORREÇÃO SOLICITADA - PRÉ-APONTAMENTO #{}*\n\nO coordenador pediu correções. Envie um novo pré-apontamento com os dados corrigidos.",
            raw_id
        ),
    }
}

pub fn coordinator_confirmation(action: ApprovalAction, raw_id: i64, submitter_notified: bool) -> String {
    let follow_up = if submitter_notified {
        "O remetente foi notificado."
    } else {
        "⚠️ Não foi possível notificar o remetente."
    };
    format!(
        "✅ Ação registrada: pré-apontamento #{} → *{}*.\n{}",
        raw_id,
        status_label(action.target_status()),
        follow_up
    )
}

pub fn already_processed_message(raw_id: i64, status: RawStatus) -> String {
    format!(
        "ℹ️ Pré-apontamento #{} já processado (status atual: {}). Nenhuma alteração feita.",
        raw_id,
        status_label(status)
    )
}

/// Aplica a decisão do coordenador sobre o RAW
pub async fn apply(
    store: &dyn StagingStore,
    sender: &dyn MessageSender,
    action: ApprovalAction,
    raw_id: i64,
    coordinator_phone: &str,
) -> Result<ApprovalOutcome, StagingError> {
    let Some(context) = store.approval_context(raw_id).await? else {
        return Ok(ApprovalOutcome::NotFound { raw_id });
    };

    let target = action.target_status();
    let changed = store.transition_status(raw_id, target).await?;

    if !changed {
        // Outro comando chegou antes; relê o status efetivo
        let status = store.raw_status(raw_id).await?.unwrap_or(context.status);
        if let Err(e) = sender
            .send_text(coordinator_phone, &already_processed_message(raw_id, status))
            .await
        {
            log_warning(&format!("⚠️ Aviso de 'já processado' não entregue: {}", e));
        }
        return Ok(ApprovalOutcome::AlreadyProcessed { raw_id, status });
    }

    log_approval_transition(raw_id, target.as_db_str(), coordinator_phone);

    let submitter_notified = match sender
        .send_text(&context.submitter_phone, &submitter_message(action, raw_id))
        .await
    {
        Ok(()) => true,
        Err(e) => {
            log_warning(&format!("⚠️ Remetente do RAW #{} não notificado: {}", raw_id, e));
            false
        }
    };

    let coordinator_notified = match sender
        .send_text(
            coordinator_phone,
            &coordinator_confirmation(action, raw_id, submitter_notified),
        )
        .await
    {
        Ok(()) => true,
        Err(e) => {
            log_warning(&format!("⚠️ Confirmação ao coordenador do RAW #{} falhou: {}", raw_id, e));
            false
        }
    };

    Ok(ApprovalOutcome::Applied {
        raw_id,
        status: target,
        submitter_notified,
        coordinator_notified,
    })
}
