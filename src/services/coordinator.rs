//! Localiza o coordenador do projeto e pede a aprovação
//!
//! Falta de coordenador ou falha de envio não derrubam o fluxo: o RAW continua
//! PENDENTE e pode ser aprovado depois.

use crate::models::FieldReport;
use crate::services::messenger::MessageSender;
use crate::services::staging::StagingStore;
use crate::utils::logging::{log_info, log_warning, phone_tail};
use crate::utils::normalization::{format_brl, format_number};

const DEFAULT_SENDER_NAME: &str = "Usuário";

fn money_or_na(value: Option<f64>) -> String {
    value.map(format_brl).unwrap_or_else(|| "N/A".to_string())
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Bloco de instruções com os três comandos aceitos
pub fn command_instructions(raw_id: i64) -> String {
    format!(
        "*Para responder, envie:*\n\
         ✅ *SIM {id}* - aprovar\n\
         ❌ *NAO {id}* - rejeitar\n\
         ✏️ *CORRIGIR {id}* - solicitar correção",
        id = raw_id
    )
}

pub fn render_notification(report: &FieldReport, raw_id: i64, sender_name: &str, submitter_phone: &str) -> String {
    let notes = report
        .notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("Sem observações");

    format!(
        "📋 *NOVO PRÉ-APONTAMENTO #{raw_id}*\n\
         👤 *Enviado por:* {sender_name} (...{tail})\n\
         🏗️ *Projeto:* {project} - {company}\n\
         📅 *Data:* {date}\n\
         🌱 *Serviço:* {service}\n\
         📍 *Fazenda:* {farm} - Talhão {plot}\n\
         📐 *Área:* {done}/{total} ha\n\
         💰 *Valor ganho:* {earned}\n\
         👷 *Diária colaborador:* {daily}\n\
         \n\
         *OBS:* {notes}\n\
         \n\
         {instructions}",
        raw_id = raw_id,
        sender_name = sender_name,
        tail = phone_tail(submitter_phone),
        project = or_na(&report.project),
        company = or_na(&report.company),
        date = report.execution_date.format("%d/%m/%Y"),
        service = or_na(&report.service),
        farm = or_na(&report.farm),
        plot = or_na(&report.plot),
        done = format_number(report.area_completed),
        total = format_number(report.area_total),
        earned = money_or_na(report.value_earned),
        daily = money_or_na(report.worker_daily_rate),
        notes = notes,
        instructions = command_instructions(raw_id),
    )
}

/// Notifica os coordenadores do projeto. `true` se ao menos um recebeu.
pub async fn resolve_and_notify(
    store: &dyn StagingStore,
    sender: &dyn MessageSender,
    report: &FieldReport,
    raw_id: i64,
    submitter_phone: &str,
) -> bool {
    if report.project.trim().is_empty() {
        log_warning(&format!("⚠️ RAW #{} sem projeto, coordenador não notificado", raw_id));
        return false;
    }

    let coordinators = match store.coordinator_phones(&report.project).await {
        Ok(phones) => phones,
        Err(e) => {
            log_warning(&format!("⚠️ Falha ao buscar coordenador do projeto {}: {}", report.project, e));
            return false;
        }
    };

    if coordinators.is_empty() {
        log_warning(&format!(
            "⚠️ Coordenador não encontrado para projeto {} (RAW #{} segue PENDENTE)",
            report.project, raw_id
        ));
        return false;
    }

    let sender_name = match store.user_name(submitter_phone).await {
        Ok(Some(name)) => name,
        Ok(None) => DEFAULT_SENDER_NAME.to_string(),
        Err(e) => {
            tracing::debug!("Nome do remetente indisponível: {}", e);
            DEFAULT_SENDER_NAME.to_string()
        }
    };

    let message = render_notification(report, raw_id, &sender_name, submitter_phone);

    let mut delivered = false;
    for phone in &coordinators {
        match sender.send_text(phone, &message).await {
            Ok(()) => {
                log_info(&format!(
                    "📨 Coordenador ...{} notificado sobre RAW #{}",
                    phone_tail(phone),
                    raw_id
                ));
                delivered = true;
            }
            Err(e) => log_warning(&format!(
                "⚠️ Falha ao notificar coordenador ...{} sobre RAW #{}: {}",
                phone_tail(phone),
                raw_id,
                e
            )),
        }
    }

    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::messenger::RecordingSender;
    use crate::services::staging::{MemoryStagingStore, UserRecord};
    use chrono::NaiveDate;

    fn report() -> FieldReport {
        let mut report = FieldReport::new("830", NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        report.company = "LARSIL".into();
        report.service = "COMBATE FORMIGA".into();
        report.farm = "SÃO JOÃO".into();
        report.plot = "001".into();
        report.area_total = 50.0;
        report.area_completed = 10.0;
        report.value_earned = Some(18004.43);
        report
    }

    #[test]
    fn test_render_notification() {
        let text = render_notification(&report(), 48, "Joana", "5511977776666");

        assert!(text.contains("NOVO PRÉ-APONTAMENTO #48"));
        assert!(text.contains("Joana (...6666)"));
        assert!(text.contains("*Data:* 10/03/2025"));
        assert!(text.contains("Talhão 001"));
        assert!(text.contains("*Área:* 10/50 ha"));
        assert!(text.contains("R$ 18.004,43"));
        assert!(text.contains("*Diária colaborador:* N/A"));
        assert!(text.contains("Sem observações"));
        assert!(text.contains("SIM 48"));
        assert!(text.contains("NAO 48"));
        assert!(text.contains("CORRIGIR 48"));
    }

    #[tokio::test]
    async fn test_notifies_every_coordinator() {
        let store = MemoryStagingStore::with_users(vec![
            UserRecord::coordinator("+55 11 9999-8888", "Marcos", "830"),
            UserRecord::coordinator("5511955554444", "Rita", "830"),
            UserRecord::field_worker("5511977776666", "Joana", "830"),
        ]);
        let sender = RecordingSender::new();

        assert!(resolve_and_notify(&store, &sender, &report(), 7, "5511977776666").await);

        let to_marcos = sender.sent_to("551199998888").await;
        assert_eq!(to_marcos.len(), 1);
        assert!(to_marcos[0].contains("Joana"));
        assert_eq!(sender.sent_to("5511955554444").await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_coordinator_is_not_fatal() {
        let store = MemoryStagingStore::new();
        let sender = RecordingSender::new();

        assert!(!resolve_and_notify(&store, &sender, &report(), 7, "5511").await);
        assert!(sender.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_returns_false() {
        let store = MemoryStagingStore::with_users(vec![UserRecord::coordinator("5511999998888", "Marcos", "830")]);
        let sender = RecordingSender::new();
        sender.fail_for("5511999998888").await;

        assert!(!resolve_and_notify(&store, &sender, &report(), 7, "5511").await);
    }
}
