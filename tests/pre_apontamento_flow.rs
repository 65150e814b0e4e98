// Fluxo completo: webhook já convertido em InboundMessage → dispatch → staging + mensagens

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::{Duration, Instant};

use apontamento_bot::config::Settings;
use apontamento_bot::models::{
    ApprovalAction, ApprovalContext, ExtractionResult, FieldReport, InboundKind, InboundMessage, ProductionShare,
    RawStatus,
};
use apontamento_bot::services::pipeline::{
    OutcomeKind, ATTENTION_MARKER, REPLY_REPORT_FAILED, REPLY_RETRY, REPLY_SHARES_FAILED,
};
use apontamento_bot::services::{
    dispatch, ApprovalOutcome, DispatchOutcome, GuardDecision, MemoryStagingStore, RecordingSender, StagingError,
    StagingStore, StructuredExtractor, UserRecord,
};
use apontamento_bot::AppState;

const SUBMITTER: &str = "5511988887777";
const COORDINATOR_STORED: &str = "+55 11 99999-8888";
const COORDINATOR_INCOMING: &str = "5511999998888";
const OUTSIDER: &str = "5521977776666";

const REPORT_TEXT: &str = "DATA: 10/03/2025\n\
PROJETO: 830\n\
EMPRESA: LARSIL\n\
SERVIÇO: COMBATE FORMIGA\n\
FAZENDA: SÃO JOÃO\n\
TALHÃO: 001\n\
-------------\n\
RATEIO MANUAL\n\
-------------";

/// Extrator com resposta fixa
struct CannedExtractor {
    report: FieldReport,
    shares: Vec<ProductionShare>,
}

#[async_trait]
impl StructuredExtractor for CannedExtractor {
    async fn extract(&self, _raw_text: &str, _today: NaiveDate) -> ExtractionResult {
        ExtractionResult::Success {
            report: self.report.clone(),
            shares: self.shares.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FailAt {
    Raw,
    Report,
    Shares,
}

/// Staging em memória que falha em um passo escolhido
struct FailingStore {
    inner: MemoryStagingStore,
    fail_at: FailAt,
}

#[async_trait]
impl StagingStore for FailingStore {
    async fn insert_raw(&self, phone: &str, text: &str, content_hash: &str) -> Result<i64, StagingError> {
        if self.fail_at == FailAt::Raw {
            return Err(StagingError::Raw("connection reset".to_string()));
        }
        self.inner.insert_raw(phone, text, content_hash).await
    }

    async fn insert_report(&self, raw_id: i64, report: &FieldReport) -> Result<(), StagingError> {
        if self.fail_at == FailAt::Report {
            return Err(StagingError::Report {
                raw_id,
                message: "column overflow".to_string(),
            });
        }
        self.inner.insert_report(raw_id, report).await
    }

    async fn insert_shares(&self, raw_id: i64, shares: &[ProductionShare]) -> Result<(), StagingError> {
        if self.fail_at == FailAt::Shares {
            return Err(StagingError::Shares {
                raw_id,
                message: "foreign key violation".to_string(),
            });
        }
        self.inner.insert_shares(raw_id, shares).await
    }

    async fn approval_context(&self, raw_id: i64) -> Result<Option<ApprovalContext>, StagingError> {
        self.inner.approval_context(raw_id).await
    }

    async fn coordinator_phones(&self, project: &str) -> Result<Vec<String>, StagingError> {
        self.inner.coordinator_phones(project).await
    }

    async fn user_name(&self, phone: &str) -> Result<Option<String>, StagingError> {
        self.inner.user_name(phone).await
    }

    async fn transition_status(&self, raw_id: i64, target: RawStatus) -> Result<bool, StagingError> {
        self.inner.transition_status(raw_id, target).await
    }

    async fn raw_status(&self, raw_id: i64) -> Result<Option<RawStatus>, StagingError> {
        self.inner.raw_status(raw_id).await
    }

    async fn ping(&self) -> Result<(), StagingError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

fn users() -> Vec<UserRecord> {
    vec![
        UserRecord::coordinator(COORDINATOR_STORED, "Carlos", "830"),
        UserRecord::field_worker(SUBMITTER, "Joana", "830"),
        UserRecord::coordinator(OUTSIDER, "Paula", "900"),
    ]
}

fn report(completed: f64) -> FieldReport {
    let mut report = FieldReport::new("830", NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
    report.company = "LARSIL".to_string();
    report.service = "COMBATE FORMIGA".to_string();
    report.farm = "SÃO JOÃO".to_string();
    report.plot = "001".to_string();
    report.area_total = 50.0;
    report.area_completed = completed;
    report.area_remaining = 50.0 - completed;
    report.field_status = "PARCIAL".to_string();
    report
}

fn state_with(
    store: Arc<dyn StagingStore>,
    sender: Arc<RecordingSender>,
    report: FieldReport,
    shares: Vec<ProductionShare>,
) -> AppState {
    AppState::new(
        Settings::default(),
        store,
        sender,
        Arc::new(CannedExtractor { report, shares }),
        None,
    )
}

fn text(phone: &str, body: &str) -> InboundMessage {
    InboundMessage {
        phone: phone.to_string(),
        kind: InboundKind::Text(body.to_string()),
    }
}

fn expect_report(outcome: DispatchOutcome) -> apontamento_bot::services::PipelineOutcome {
    match outcome {
        DispatchOutcome::Report(outcome) => outcome,
        other => panic!("expected a report outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_blank_manual_split_is_auto_distributed_and_coordinator_notified() {
    let store = Arc::new(MemoryStagingStore::with_users(users()));
    let sender = Arc::new(RecordingSender::new());
    let shares = ["A", "B", "C", "D", "E"]
        .iter()
        .map(|id| ProductionShare::manual(*id, None))
        .collect();
    let state = state_with(store.clone(), sender.clone(), report(10.0), shares);

    let outcome = expect_report(dispatch(&state, text(SUBMITTER, REPORT_TEXT), Instant::now()).await);

    assert_eq!(outcome.kind, OutcomeKind::Success);
    let raw_id = outcome.raw_id.expect("raw persisted");
    assert!(outcome.coordinator_notified);
    assert!(outcome.alerts.iter().any(|a| a.contains("RATEIO AUTOMÁTICO")));

    let raw = store.raw(raw_id).await.expect("raw stored");
    assert_eq!(raw.status, RawStatus::Pending);
    assert_eq!(raw.raw_text, REPORT_TEXT);
    assert!(store.report(raw_id).await.is_some());

    let stored_shares = store.shares(raw_id).await;
    assert_eq!(stored_shares.len(), 5);
    assert!(stored_shares.iter().all(|s| s.quantity == Some(2.0)));

    let to_coordinator = sender.sent_to(COORDINATOR_INCOMING).await;
    assert_eq!(to_coordinator.len(), 1);
    assert!(to_coordinator[0].contains(&format!("#{}", raw_id)));
    assert!(to_coordinator[0].contains(&format!("SIM {}", raw_id)));
    assert!(to_coordinator[0].contains("Joana"));

    let to_submitter = sender.sent_to(SUBMITTER).await;
    assert_eq!(to_submitter.len(), 1);
    assert!(to_submitter[0].contains("✅"));
    assert!(!to_submitter[0].contains(ATTENTION_MARKER));
}

#[tokio::test]
async fn test_partial_manual_split_requires_attention_and_names_missing_workers() {
    let store = Arc::new(MemoryStagingStore::with_users(users()));
    let sender = Arc::new(RecordingSender::new());
    let shares = vec![
        ProductionShare::manual("A", Some(8.0)),
        ProductionShare::manual("B", Some(7.0)),
        ProductionShare::manual("C", Some(5.0)),
        ProductionShare::manual("D", None),
        ProductionShare::manual("E", None),
    ];
    let state = state_with(store.clone(), sender.clone(), report(30.0), shares);

    let outcome = expect_report(dispatch(&state, text(SUBMITTER, REPORT_TEXT), Instant::now()).await);
    assert_eq!(outcome.kind, OutcomeKind::SuccessWithAlerts);

    let to_submitter = sender.sent_to(SUBMITTER).await;
    assert_eq!(to_submitter.len(), 1);
    let reply = &to_submitter[0];
    assert!(reply.contains(ATTENTION_MARKER));
    assert!(reply.contains("Colaboradores pendentes: D, E"));
    assert!(!reply.contains("pendentes: A"));

    // Nada é preenchido automaticamente
    let stored = store.shares(outcome.raw_id.unwrap()).await;
    assert_eq!(stored.iter().filter(|s| s.quantity.is_none()).count(), 2);
}

#[tokio::test]
async fn test_coordinator_requests_correction() {
    let store = Arc::new(MemoryStagingStore::with_users(users()));
    let sender = Arc::new(RecordingSender::new());
    let state = state_with(store.clone(), sender.clone(), report(10.0), Vec::new());

    store.set_next_id(12).await;
    let raw_id = store.insert_raw(SUBMITTER, REPORT_TEXT, "hash").await.unwrap();
    assert_eq!(raw_id, 12);
    store.insert_report(raw_id, &report(10.0)).await.unwrap();

    let outcome = dispatch(&state, text(COORDINATOR_INCOMING, "CORRIGIR 12"), Instant::now()).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Approval(ApprovalOutcome::Applied {
            raw_id: 12,
            status: RawStatus::CorrectionRequested,
            submitter_notified: true,
            coordinator_notified: true,
        })
    );
    assert_eq!(store.raw(12).await.unwrap().status, RawStatus::CorrectionRequested);

    let to_submitter = sender.sent_to(SUBMITTER).await;
    assert_eq!(to_submitter.len(), 1);
    assert!(to_submitter[0].contains("CORREÇÃO SOLICITADA"));
    assert!(to_submitter[0].contains("#12"));

    let to_coordinator = sender.sent_to(COORDINATOR_INCOMING).await;
    assert_eq!(to_coordinator.len(), 1);
    assert!(to_coordinator[0].contains("#12"));
}

#[tokio::test]
async fn test_approved_report_never_moves_back() {
    let store = Arc::new(MemoryStagingStore::with_users(users()));
    let sender = Arc::new(RecordingSender::new());
    let state = state_with(
        store.clone(),
        sender.clone(),
        report(10.0),
        vec![ProductionShare::manual("A", Some(10.0))],
    );
    let t0 = Instant::now();

    let raw_id = expect_report(dispatch(&state, text(SUBMITTER, REPORT_TEXT), t0).await)
        .raw_id
        .unwrap();

    let approve = dispatch(&state, text(COORDINATOR_INCOMING, &format!("sim {}", raw_id)), t0).await;
    assert!(matches!(
        approve,
        DispatchOutcome::Approval(ApprovalOutcome::Applied { status: RawStatus::Approved, .. })
    ));

    let later = t0 + Duration::from_secs(16);
    let reject = dispatch(&state, text(COORDINATOR_INCOMING, &format!("NAO {}", raw_id)), later).await;
    assert_eq!(
        reject,
        DispatchOutcome::Approval(ApprovalOutcome::AlreadyProcessed {
            raw_id,
            status: RawStatus::Approved,
        })
    );

    let again = t0 + Duration::from_secs(32);
    let approve_again = dispatch(&state, text(COORDINATOR_INCOMING, &format!("SIM{}", raw_id)), again).await;
    assert!(matches!(
        approve_again,
        DispatchOutcome::Approval(ApprovalOutcome::AlreadyProcessed { .. })
    ));

    assert_eq!(store.raw(raw_id).await.unwrap().status, RawStatus::Approved);
    // Remetente notificado só uma vez (recebimento + aprovação)
    assert_eq!(sender.sent_to(SUBMITTER).await.len(), 2);
    assert!(sender
        .sent_to(COORDINATOR_INCOMING)
        .await
        .iter()
        .any(|m| m.contains("já processado")));
}

#[tokio::test]
async fn test_command_from_other_project_coordinator_is_unauthorized() {
    let store = Arc::new(MemoryStagingStore::with_users(users()));
    let sender = Arc::new(RecordingSender::new());
    let state = state_with(store.clone(), sender.clone(), report(10.0), Vec::new());

    let raw_id = store.insert_raw(SUBMITTER, REPORT_TEXT, "hash").await.unwrap();
    store.insert_report(raw_id, &report(10.0)).await.unwrap();

    let outcome = dispatch(&state, text(OUTSIDER, &format!("SIM {}", raw_id)), Instant::now()).await;

    assert_eq!(outcome, DispatchOutcome::Unauthorized);
    assert_eq!(store.raw(raw_id).await.unwrap().status, RawStatus::Pending);
    assert!(sender.sent().await.is_empty());
}

#[tokio::test]
async fn test_button_reply_is_treated_as_command() {
    let store = Arc::new(MemoryStagingStore::with_users(users()));
    let sender = Arc::new(RecordingSender::new());
    let state = state_with(store.clone(), sender.clone(), report(10.0), Vec::new());

    let raw_id = store.insert_raw(SUBMITTER, REPORT_TEXT, "hash").await.unwrap();
    store.insert_report(raw_id, &report(10.0)).await.unwrap();

    let message = InboundMessage {
        phone: COORDINATOR_INCOMING.to_string(),
        kind: InboundKind::ButtonReply {
            button_id: format!("rejeitar_{}", raw_id),
            text: "Rejeitar".to_string(),
        },
    };
    let outcome = dispatch(&state, message, Instant::now()).await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Approval(ApprovalOutcome::Applied { status: RawStatus::Rejected, .. })
    ));
    assert_eq!(
        store.raw(raw_id).await.unwrap().status,
        ApprovalAction::Reject.target_status()
    );
}

#[tokio::test]
async fn test_guard_suppresses_spam_and_duplicates() {
    let store = Arc::new(MemoryStagingStore::with_users(users()));
    let sender = Arc::new(RecordingSender::new());
    let state = state_with(
        store.clone(),
        sender.clone(),
        report(10.0),
        vec![ProductionShare::manual("A", Some(10.0))],
    );
    let t0 = Instant::now();

    assert!(matches!(
        dispatch(&state, text(SUBMITTER, REPORT_TEXT), t0).await,
        DispatchOutcome::Report(_)
    ));

    let within_cooldown = dispatch(&state, text(SUBMITTER, REPORT_TEXT), t0 + Duration::from_secs(5)).await;
    assert!(matches!(
        within_cooldown,
        DispatchOutcome::Suppressed(GuardDecision::Cooldown { .. })
    ));

    let same_payload = dispatch(&state, text(SUBMITTER, REPORT_TEXT), t0 + Duration::from_secs(20)).await;
    assert_eq!(same_payload, DispatchOutcome::Suppressed(GuardDecision::Duplicate));

    assert_eq!(store.raw_count().await, 1);
}

#[tokio::test]
async fn test_chatter_is_ignored() {
    let store = Arc::new(MemoryStagingStore::with_users(users()));
    let sender = Arc::new(RecordingSender::new());
    let state = state_with(store.clone(), sender.clone(), report(10.0), Vec::new());

    let outcome = dispatch(&state, text(SUBMITTER, "bom dia, talvez 48 hectares amanhã"), Instant::now()).await;

    assert_eq!(outcome, DispatchOutcome::Ignored("not_a_report"));
    assert_eq!(store.raw_count().await, 0);
    assert!(sender.sent().await.is_empty());
}

#[tokio::test]
async fn test_staging_failures_produce_step_specific_replies() {
    let cases = [
        (FailAt::Raw, OutcomeKind::RetryRequested, REPLY_RETRY),
        (FailAt::Report, OutcomeKind::ManualReview, REPLY_REPORT_FAILED),
        (FailAt::Shares, OutcomeKind::ManualReview, REPLY_SHARES_FAILED),
    ];

    for (fail_at, expected_kind, expected_reply) in cases {
        let inner = MemoryStagingStore::with_users(users());
        let store = Arc::new(FailingStore {
            inner: inner.clone(),
            fail_at,
        });
        let sender = Arc::new(RecordingSender::new());
        let state = state_with(
            store,
            sender.clone(),
            report(10.0),
            vec![ProductionShare::manual("A", Some(10.0))],
        );

        let outcome = expect_report(dispatch(&state, text(SUBMITTER, REPORT_TEXT), Instant::now()).await);

        assert_eq!(outcome.kind, expected_kind, "{:?}", fail_at);
        assert!(outcome.reply.starts_with(expected_reply), "{:?}", fail_at);
        assert!(!outcome.coordinator_notified);

        // RAW preservado quando a falha é posterior
        match fail_at {
            FailAt::Raw => assert_eq!(inner.raw_count().await, 0),
            _ => {
                assert_eq!(inner.raw_count().await, 1);
                assert!(outcome.reply.contains(&format!("*ID:* {}", outcome.raw_id.unwrap())));
            }
        }

        assert!(sender.sent_to(COORDINATOR_INCOMING).await.is_empty());
        assert_eq!(sender.sent_to(SUBMITTER).await.len(), 1);
    }
}

#[tokio::test]
async fn test_report_starting_with_command_word_still_reaches_pipeline() {
    let store = Arc::new(MemoryStagingStore::with_users(users()));
    let sender = Arc::new(RecordingSender::new());
    let state = state_with(
        store.clone(),
        sender.clone(),
        report(10.0),
        vec![ProductionShare::manual("A", Some(10.0))],
    );

    let raw_id = store.insert_raw(SUBMITTER, REPORT_TEXT, "hash").await.unwrap();
    store.insert_report(raw_id, &report(10.0)).await.unwrap();

    // Apontador não coordena o projeto: o texto segue como pré-apontamento
    let body = format!("SIM {} talhões hoje\n{}", raw_id, REPORT_TEXT);
    let outcome = expect_report(dispatch(&state, text(SUBMITTER, &body), Instant::now()).await);

    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert_ne!(outcome.raw_id, Some(raw_id));
    assert_eq!(store.raw_count().await, 2);
    assert_eq!(store.raw(raw_id).await.unwrap().status, RawStatus::Pending);
}
