//! Persistência em staging
//!
//! Três escritas, sempre nesta ordem e sob o mesmo `raw_id`:
//! RAW (antes da extração) → BOLETIM → PRÊMIOS. Cada passo falha com sua
//! própria variante de `StagingError` porque a resposta ao remetente muda.
//! Nenhum passo é repetido automaticamente.
//!
//! `PgStagingStore` é o backend de produção. `MemoryStagingStore` atende
//! desenvolvimento local (sem DATABASE_URL) e testes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{ApprovalContext, FieldReport, ProductionShare, RawMessage, RawStatus};
use crate::utils::normalization::{normalize_phone, same_phone};
use crate::utils::AppError;

pub const COORDINATOR_PROFILE: &str = "COORDENADOR";

const SCHEMA: &str = include_str!("../../migrations/001_pre_apontamento_staging.sql");

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("failed to store raw message: {0}")]
    Raw(String),

    #[error("failed to store field report for raw {raw_id}: {message}")]
    Report { raw_id: i64, message: String },

    #[error("failed to store production shares for raw {raw_id}: {message}")]
    Shares { raw_id: i64, message: String },

    #[error("failed to update status of raw {raw_id}: {message}")]
    Status { raw_id: i64, message: String },

    #[error("staging lookup failed: {0}")]
    Lookup(String),
}

impl StagingError {
    /// Nome curto do passo, para log
    pub fn step(&self) -> &'static str {
        match self {
            StagingError::Raw(_) => "raw",
            StagingError::Report { .. } => "boletim",
            StagingError::Shares { .. } => "premios",
            StagingError::Status { .. } => "status",
            StagingError::Lookup(_) => "lookup",
        }
    }
}

impl From<StagingError> for AppError {
    fn from(err: StagingError) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Registro da tabela `usuarios`
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub phone: String,
    pub name: String,
    pub project: Option<String>,
    pub profile: String,
}

impl UserRecord {
    pub fn coordinator(phone: impl Into<String>, name: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            name: name.into(),
            project: Some(project.into()),
            profile: COORDINATOR_PROFILE.to_string(),
        }
    }

    pub fn field_worker(phone: impl Into<String>, name: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            name: name.into(),
            project: Some(project.into()),
            profile: "APONTADOR".to_string(),
        }
    }
}

/// Hash de auditoria do RAW: telefone, texto e hora cheia
pub fn content_hash(phone: &str, text: &str, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phone.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    hasher.update(b"|");
    hasher.update(at.format("%Y%m%d%H").to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Grava o RAW como PENDENTE e devolve o id gerado
    async fn insert_raw(&self, phone: &str, text: &str, content_hash: &str) -> Result<i64, StagingError>;

    async fn insert_report(&self, raw_id: i64, report: &FieldReport) -> Result<(), StagingError>;

    async fn insert_shares(&self, raw_id: i64, shares: &[ProductionShare]) -> Result<(), StagingError>;

    async fn approval_context(&self, raw_id: i64) -> Result<Option<ApprovalContext>, StagingError>;

    /// Telefones (como cadastrados) dos coordenadores do projeto
    async fn coordinator_phones(&self, project: &str) -> Result<Vec<String>, StagingError>;

    async fn user_name(&self, phone: &str) -> Result<Option<String>, StagingError>;

    /// PENDENTE → `target`. Devolve `false` se o RAW não estava mais pendente.
    async fn transition_status(&self, raw_id: i64, target: RawStatus) -> Result<bool, StagingError>;

    async fn raw_status(&self, raw_id: i64) -> Result<Option<RawStatus>, StagingError>;

    async fn ping(&self) -> Result<(), StagingError>;

    fn backend(&self) -> &'static str;
}

// ============================================================================
// Postgres
// ============================================================================

#[derive(Clone)]
pub struct PgStagingStore {
    pool: PgPool,
}

impl PgStagingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StagingError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(|e| StagingError::Lookup(format!("connect: {}", e)))?;
        Ok(Self::new(pool))
    }

    /// Cria as tabelas de staging se ainda não existirem
    pub async fn ensure_schema(&self) -> Result<(), StagingError> {
        (&self.pool)
            .execute(SCHEMA)
            .await
            .map_err(|e| StagingError::Lookup(format!("schema: {}", e)))?;
        tracing::info!("✅ Schema de staging verificado");
        Ok(())
    }
}

#[async_trait]
impl StagingStore for PgStagingStore {
    async fn insert_raw(&self, phone: &str, text: &str, content_hash: &str) -> Result<i64, StagingError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO pre_apontamento_raw (phone, conteudo_bruto, hash, status)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(phone)
        .bind(text)
        .bind(content_hash)
        .bind(RawStatus::Pending.as_db_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StagingError::Raw(e.to_string()))
    }

    async fn insert_report(&self, raw_id: i64, report: &FieldReport) -> Result<(), StagingError> {
        let lot = |i: usize| report.input(i).and_then(|l| l.lot.clone());
        let input = |i: usize| report.input(i).and_then(|l| l.input.clone());
        let quantity = |i: usize| report.input(i).and_then(|l| l.quantity);

        sqlx::query(
            "INSERT INTO boletim_staging (
                raw_id, data_execucao, projeto, empresa, servico, fazenda, talhao,
                area_total, area_realizada, area_restante, status_campo, valor_ganho,
                diaria_colaborador, lote1, insumo1, quantidade1, lote2, insumo2,
                quantidade2, lote3, insumo3, quantidade3, divisao_premio_igual, observacoes
             ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
             )",
        )
        .bind(raw_id)
        .bind(report.execution_date)
        .bind(&report.project)
        .bind(&report.company)
        .bind(&report.service)
        .bind(&report.farm)
        .bind(&report.plot)
        .bind(report.area_total)
        .bind(report.area_completed)
        .bind(report.area_remaining)
        .bind(&report.field_status)
        .bind(report.value_earned)
        .bind(report.worker_daily_rate)
        .bind(lot(0))
        .bind(input(0))
        .bind(quantity(0))
        .bind(lot(1))
        .bind(input(1))
        .bind(quantity(1))
        .bind(lot(2))
        .bind(input(2))
        .bind(quantity(2))
        .bind(report.equal_split)
        .bind(&report.notes)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|e| StagingError::Report {
            raw_id,
            message: e.to_string(),
        })
    }

    async fn insert_shares(&self, raw_id: i64, shares: &[ProductionShare]) -> Result<(), StagingError> {
        let to_err = |e: sqlx::Error| StagingError::Shares {
            raw_id,
            message: e.to_string(),
        };

        let mut tx = self.pool.begin().await.map_err(to_err)?;
        for share in shares {
            sqlx::query(
                "INSERT INTO premio_staging (
                    raw_id, categoria, colaborador_id, equipamento, producao,
                    funcao, recebe_premio, valor_fixo
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(raw_id)
            .bind(share.category.as_tag())
            .bind(&share.worker_id)
            .bind(&share.equipment_id)
            .bind(share.quantity)
            .bind(&share.role)
            .bind(share.receives_bonus)
            .bind(share.fixed_bonus)
            .execute(&mut *tx)
            .await
            .map_err(to_err)?;
        }
        tx.commit().await.map_err(to_err)
    }

    async fn approval_context(&self, raw_id: i64) -> Result<Option<ApprovalContext>, StagingError> {
        let row = sqlx::query_as::<_, (String, Option<String>, String)>(
            "SELECT r.phone, b.projeto, r.status
             FROM pre_apontamento_raw r
             LEFT JOIN boletim_staging b ON b.raw_id = r.id
             WHERE r.id = $1",
        )
        .bind(raw_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StagingError::Lookup(e.to_string()))?;

        let Some((phone, project, status)) = row else {
            return Ok(None);
        };

        let status = RawStatus::from_db_str(&status)
            .ok_or_else(|| StagingError::Lookup(format!("unknown status '{}' for raw {}", status, raw_id)))?;

        Ok(Some(ApprovalContext {
            raw_id,
            submitter_phone: phone,
            project,
            status,
        }))
    }

    async fn coordinator_phones(&self, project: &str) -> Result<Vec<String>, StagingError> {
        sqlx::query_scalar::<_, String>(
            "SELECT telefone FROM usuarios WHERE projeto = $1 AND perfil = $2 ORDER BY id",
        )
        .bind(project)
        .bind(COORDINATOR_PROFILE)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StagingError::Lookup(e.to_string()))
    }

    async fn user_name(&self, phone: &str) -> Result<Option<String>, StagingError> {
        // Telefones cadastrados à mão: compara só os dígitos
        sqlx::query_scalar::<_, String>(
            "SELECT usuario FROM usuarios
             WHERE regexp_replace(telefone, '\\D', '', 'g') = $1
             LIMIT 1",
        )
        .bind(normalize_phone(phone))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StagingError::Lookup(e.to_string()))
    }

    async fn transition_status(&self, raw_id: i64, target: RawStatus) -> Result<bool, StagingError> {
        let result = sqlx::query(
            "UPDATE pre_apontamento_raw
             SET status = $1, updated_at = NOW()
             WHERE id = $2 AND status = $3",
        )
        .bind(target.as_db_str())
        .bind(raw_id)
        .bind(RawStatus::Pending.as_db_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StagingError::Status {
            raw_id,
            message: e.to_string(),
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn raw_status(&self, raw_id: i64) -> Result<Option<RawStatus>, StagingError> {
        let status = sqlx::query_scalar::<_, String>("SELECT status FROM pre_apontamento_raw WHERE id = $1")
            .bind(raw_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StagingError::Lookup(e.to_string()))?;

        Ok(status.as_deref().and_then(RawStatus::from_db_str))
    }

    async fn ping(&self) -> Result<(), StagingError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StagingError::Lookup(e.to_string()))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

// ============================================================================
// Memória
// ============================================================================

#[derive(Debug, Default)]
struct MemoryTables {
    next_id: i64,
    raws: BTreeMap<i64, RawMessage>,
    reports: HashMap<i64, FieldReport>,
    shares: HashMap<i64, Vec<ProductionShare>>,
    users: Vec<UserRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStagingStore {
    tables: Arc<RwLock<MemoryTables>>,
}

impl MemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<UserRecord>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(MemoryTables {
                users,
                ..MemoryTables::default()
            })),
        }
    }

    /// Próximo id gerado passa a ser `next_id`
    pub async fn set_next_id(&self, next_id: i64) {
        self.tables.write().await.next_id = next_id.saturating_sub(1);
    }

    pub async fn raw(&self, raw_id: i64) -> Option<RawMessage> {
        self.tables.read().await.raws.get(&raw_id).cloned()
    }

    pub async fn report(&self, raw_id: i64) -> Option<FieldReport> {
        self.tables.read().await.reports.get(&raw_id).cloned()
    }

    pub async fn shares(&self, raw_id: i64) -> Vec<ProductionShare> {
        self.tables
            .read()
            .await
            .shares
            .get(&raw_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn raw_count(&self) -> usize {
        self.tables.read().await.raws.len()
    }
}

#[async_trait]
impl StagingStore for MemoryStagingStore {
    async fn insert_raw(&self, phone: &str, text: &str, content_hash: &str) -> Result<i64, StagingError> {
        let mut tables = self.tables.write().await;
        tables.next_id += 1;
        let id = tables.next_id;
        tables.raws.insert(
            id,
            RawMessage {
                id,
                sender_phone: phone.to_string(),
                raw_text: text.to_string(),
                content_hash: content_hash.to_string(),
                status: RawStatus::Pending,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn insert_report(&self, raw_id: i64, report: &FieldReport) -> Result<(), StagingError> {
        let mut tables = self.tables.write().await;
        if !tables.raws.contains_key(&raw_id) {
            return Err(StagingError::Report {
                raw_id,
                message: "raw message not found".to_string(),
            });
        }
        if tables.reports.contains_key(&raw_id) {
            return Err(StagingError::Report {
                raw_id,
                message: "field report already stored".to_string(),
            });
        }
        tables.reports.insert(raw_id, report.clone());
        Ok(())
    }

    async fn insert_shares(&self, raw_id: i64, shares: &[ProductionShare]) -> Result<(), StagingError> {
        let mut tables = self.tables.write().await;
        if !tables.raws.contains_key(&raw_id) {
            return Err(StagingError::Shares {
                raw_id,
                message: "raw message not found".to_string(),
            });
        }
        tables
            .shares
            .entry(raw_id)
            .or_default()
            .extend(shares.iter().cloned());
        Ok(())
    }

    async fn approval_context(&self, raw_id: i64) -> Result<Option<ApprovalContext>, StagingError> {
        let tables = self.tables.read().await;
        Ok(tables.raws.get(&raw_id).map(|raw| ApprovalContext {
            raw_id,
            submitter_phone: raw.sender_phone.clone(),
            project: tables.reports.get(&raw_id).map(|r| r.project.clone()),
            status: raw.status,
        }))
    }

    async fn coordinator_phones(&self, project: &str) -> Result<Vec<String>, StagingError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| u.profile == COORDINATOR_PROFILE && u.project.as_deref() == Some(project))
            .map(|u| u.phone.clone())
            .collect())
    }

    async fn user_name(&self, phone: &str) -> Result<Option<String>, StagingError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| same_phone(&u.phone, phone))
            .map(|u| u.name.clone()))
    }

    async fn transition_status(&self, raw_id: i64, target: RawStatus) -> Result<bool, StagingError> {
        let mut tables = self.tables.write().await;
        match tables.raws.get_mut(&raw_id) {
            Some(raw) if raw.status == RawStatus::Pending => {
                raw.status = target;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn raw_status(&self, raw_id: i64) -> Result<Option<RawStatus>, StagingError> {
        Ok(self.tables.read().await.raws.get(&raw_id).map(|r| r.status))
    }

    async fn ping(&self) -> Result<(), StagingError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
