//! Fluxo do pré-apontamento detectado
//!
//! RAW → extração → rateio → BOLETIM → PRÊMIOS → coordenador → resposta.
//! O RAW é gravado antes de qualquer chamada à IA. Cada caminho termina em
//! exatamente uma resposta ao remetente.

use chrono::{DateTime, Local, Utc};
use std::sync::Arc;

use crate::models::{ExtractionResult, FieldReport};
use crate::services::coordinator;
use crate::services::extractor::StructuredExtractor;
use crate::services::messenger::MessageSender;
use crate::services::rateio::{self, Reconciliation};
use crate::services::staging::{content_hash, StagingStore};
use crate::utils::logging::{log_info, log_raw_saved, log_staging_error, log_warning};
use crate::utils::normalization::format_number;

pub const REPLY_RETRY: &str = "❌ Erro ao salvar pré-apontamento. Tente novamente.";
pub const REPLY_EXTRACTION_FAILED: &str = "⚠️ Falha na análise do texto. Dados salvos para revisão manual.";
pub const REPLY_REPORT_FAILED: &str =
    "⚠️ Pré-apontamento recebido, mas houve erro ao estruturar os dados. Será verificado manualmente.";
pub const REPLY_SHARES_FAILED: &str =
    "⚠️ Dados principais salvos, mas houve erro nos prêmios. Será verificado manualmente.";
pub const ATTENTION_MARKER: &str = "REQUER ATENÇÃO";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    SuccessWithAlerts,
    ManualReview,
    RetryRequested,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub kind: OutcomeKind,
    pub raw_id: Option<i64>,
    pub reply: String,
    pub alerts: Vec<String>,
    pub coordinator_notified: bool,
}

impl PipelineOutcome {
    fn early(kind: OutcomeKind, raw_id: Option<i64>, reply: String) -> Self {
        Self {
            kind,
            raw_id,
            reply,
            alerts: Vec::new(),
            coordinator_notified: false,
        }
    }
}

fn manual_review_reply(base: &str, raw_id: i64) -> String {
    format!("{}\n📋 *ID:* {}", base, raw_id)
}

pub fn render_success_reply(report: &FieldReport, raw_id: i64, reconciliation: &Reconciliation) -> String {
    let or_na = |s: &str| if s.trim().is_empty() { "N/A".to_string() } else { s.to_string() };

    let mut reply = format!(
        "✅ *PRÉ-APONTAMENTO RECEBIDO*\n\
         \n\
         📊 *PROJETO:* {}\n\
         🏭 *EMPRESA:* {}\n\
         🔧 *SERVIÇO:* {}\n\
         🌾 *FAZENDA:* {}\n\
         📍 *TALHÃO:* {}\n\
         📅 *DATA:* {}\n\
         \n\
         📏 *ÁREA REALIZADA:* {}\n\
         📐 *ÁREA TOTAL:* {}\n\
         \n\
         🔄 *STATUS:* Enviado para aprovação\n\
         📋 *ID:* {}",
        or_na(&report.project),
        or_na(&report.company),
        or_na(&report.service),
        or_na(&report.farm),
        or_na(&report.plot),
        report.execution_date.format("%d/%m/%Y"),
        format_number(report.area_completed),
        format_number(report.area_total),
        raw_id,
    );

    if !reconciliation.alerts.is_empty() {
        reply.push_str("\n\n🎯 *ANÁLISE DE RATEIO:*");
        for alert in &reconciliation.alerts {
            reply.push('\n');
            reply.push_str(&alert.to_string());
        }
    }

    if reconciliation.requires_attention() {
        reply.push_str(&format!("\n\n⚠️ *{}* - Verifique os alertas acima", ATTENTION_MARKER));
    } else {
        reply.push_str("\n\n✅ Coordenador será notificado para aprovação.");
    }

    reply
}

#[derive(Clone)]
pub struct PreApontamentoPipeline {
    store: Arc<dyn StagingStore>,
    sender: Arc<dyn MessageSender>,
    extractor: Arc<dyn StructuredExtractor>,
}

impl PreApontamentoPipeline {
    pub fn new(
        store: Arc<dyn StagingStore>,
        sender: Arc<dyn MessageSender>,
        extractor: Arc<dyn StructuredExtractor>,
    ) -> Self {
        Self {
            store,
            sender,
            extractor,
        }
    }

    /// Processa e responde ao remetente
    pub async fn run(&self, phone: &str, text: &str, now: DateTime<Utc>) -> PipelineOutcome {
        let outcome = self.process(phone, text, now).await;
        if let Err(e) = self.sender.send_text(phone, &outcome.reply).await {
            log_warning(&format!("⚠️ Resposta ao remetente não entregue: {}", e));
        }
        outcome
    }

    /// Processa sem enviar a resposta ao remetente
    pub async fn process(&self, phone: &str, text: &str, now: DateTime<Utc>) -> PipelineOutcome {
        let today = now.with_timezone(&Local).date_naive();

        // 1. RAW antes de tudo
        let hash = content_hash(phone, text, now);
        let raw_id = match self.store.insert_raw(phone, text, &hash).await {
            Ok(id) => id,
            Err(e) => {
                log_staging_error(e.step(), None, &e.to_string());
                return PipelineOutcome::early(OutcomeKind::RetryRequested, None, REPLY_RETRY.to_string());
            }
        };
        log_raw_saved(raw_id, phone);

        // 2. Extração
        let (report, shares) = match self.extractor.extract(text, today).await {
            ExtractionResult::Success { report, shares } => (report, shares),
            ExtractionResult::Failure { reason } => {
                log_warning(&format!("⚠️ RAW #{} vai para revisão manual: {}", raw_id, reason));
                return PipelineOutcome::early(
                    OutcomeKind::ManualReview,
                    Some(raw_id),
                    manual_review_reply(REPLY_EXTRACTION_FAILED, raw_id),
                );
            }
        };

        // 3. Rateio
        let reconciliation = rateio::reconcile(&report, &shares, text);
        log_info(&format!(
            "🎯 RAW #{}: {} alertas de rateio (atenção: {})",
            raw_id,
            reconciliation.alerts.len(),
            reconciliation.requires_attention()
        ));

        // 4. BOLETIM
        if let Err(e) = self.store.insert_report(raw_id, &report).await {
            log_staging_error(e.step(), Some(raw_id), &e.to_string());
            return PipelineOutcome::early(
                OutcomeKind::ManualReview,
                Some(raw_id),
                manual_review_reply(REPLY_REPORT_FAILED, raw_id),
            );
        }

        // 5. PRÊMIOS
        if !reconciliation.shares.is_empty() {
            if let Err(e) = self.store.insert_shares(raw_id, &reconciliation.shares).await {
                log_staging_error(e.step(), Some(raw_id), &e.to_string());
                return PipelineOutcome::early(
                    OutcomeKind::ManualReview,
                    Some(raw_id),
                    manual_review_reply(REPLY_SHARES_FAILED, raw_id),
                );
            }
        }

        // 6. Coordenador
        let coordinator_notified = coordinator::resolve_and_notify(
            self.store.as_ref(),
            self.sender.as_ref(),
            &report,
            raw_id,
            phone,
        )
        .await;

        // 7. Resposta
        let kind = if reconciliation.requires_attention() {
            OutcomeKind::SuccessWithAlerts
        } else {
            OutcomeKind::Success
        };

        PipelineOutcome {
            kind,
            raw_id: Some(raw_id),
            reply: render_success_reply(&report, raw_id, &reconciliation),
            alerts: reconciliation.render_alerts(),
            coordinator_notified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionFailure, ProductionShare};
    use crate::services::extractor::DisabledExtractor;
    use crate::services::messenger::RecordingSender;
    use crate::services::staging::MemoryStagingStore;
    use chrono::NaiveDate;

    fn report() -> FieldReport {
        let mut report = FieldReport::new("830", NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        report.area_total = 50.0;
        report.area_completed = 10.0;
        report
    }

    #[test]
    fn test_success_reply_without_attention() {
        let reconciliation = rateio::reconcile(&report(), &[ProductionShare::manual("A", None)], "");
        let reply = render_success_reply(&report(), 5, &reconciliation);

        assert!(reply.starts_with("✅ *PRÉ-APONTAMENTO RECEBIDO*"));
        assert!(reply.contains("📋 *ID:* 5"));
        assert!(reply.contains("ANÁLISE DE RATEIO"));
        assert!(reply.contains("*EMPRESA:* N/A"));
        assert!(!reply.contains(ATTENTION_MARKER));
    }

    #[test]
    fn test_success_reply_with_attention() {
        let shares = vec![ProductionShare::manual("A", Some(3.0)), ProductionShare::manual("B", None)];
        let reconciliation = rateio::reconcile(&report(), &shares, "");
        let reply = render_success_reply(&report(), 5, &reconciliation);
        assert!(reply.contains("⚠️ *REQUER ATENÇÃO*"));
    }

    #[tokio::test]
    async fn test_disabled_extractor_keeps_raw_for_review() {
        let store = Arc::new(MemoryStagingStore::new());
        let sender = Arc::new(RecordingSender::new());
        let pipeline = PreApontamentoPipeline::new(store.clone(), sender.clone(), Arc::new(DisabledExtractor));

        let outcome = pipeline.run("5511977776666", "DATA: HOJE\nPROJETO: 830\nEMPRESA: X", Utc::now()).await;

        assert_eq!(outcome.kind, OutcomeKind::ManualReview);
        let raw_id = outcome.raw_id.unwrap();
        assert!(store.raw(raw_id).await.is_some());
        assert!(store.report(raw_id).await.is_none());

        let replies = sender.sent_to("5511977776666").await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("revisão manual"));
        assert!(replies[0].contains(&raw_id.to_string()));
        assert_eq!(
            ExtractionFailure::Disabled.to_string(),
            "extraction service not configured"
        );
    }
}
