//! Modelos do fluxo de pré-apontamento
//!
//! `RawMessage` é a raiz: o boletim (`FieldReport`) e os prêmios
//! (`ProductionShare`) são gravados sob o mesmo `raw_id`, e é esse id que o
//! coordenador digita nos comandos `SIM`/`NAO`/`CORRIGIR`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status do RAW na staging
///
/// Sai de `Pending` exatamente uma vez; os outros três são terminais.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawStatus {
    Pending,
    Approved,
    Rejected,
    CorrectionRequested,
}

impl RawStatus {
    /// Valor gravado na coluna STATUS
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RawStatus::Pending => "PENDENTE",
            RawStatus::Approved => "APROVADO",
            RawStatus::Rejected => "REJEITADO",
            RawStatus::CorrectionRequested => "CORRECAO_SOLICITADA",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "PENDENTE" => Some(RawStatus::Pending),
            "APROVADO" => Some(RawStatus::Approved),
            "REJEITADO" => Some(RawStatus::Rejected),
            "CORRECAO_SOLICITADA" => Some(RawStatus::CorrectionRequested),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RawStatus::Pending)
    }
}

impl fmt::Display for RawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Mensagem bruta como recebida (tabela pre_apontamento_raw)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: i64,
    pub sender_phone: String,
    pub raw_text: String,
    pub content_hash: String,
    pub status: RawStatus,
    pub created_at: DateTime<Utc>,
}

/// Trio lote/insumo/quantidade do boletim (até 3 por boletim)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputLot {
    pub lot: Option<String>,
    pub input: Option<String>,
    pub quantity: Option<f64>,
}

impl InputLot {
    pub fn is_empty(&self) -> bool {
        self.lot.is_none() && self.input.is_none() && self.quantity.is_none()
    }
}

pub const MAX_INPUT_LOTS: usize = 3;

/// Boletim estruturado extraído do texto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub project: String,
    pub company: String,
    pub service: String,
    pub farm: String,
    pub plot: String,
    pub execution_date: NaiveDate,
    pub area_completed: f64,
    pub area_total: f64,
    pub area_remaining: f64,
    /// PARCIAL, CONCLUÍDO ou INICIADO
    pub field_status: String,
    pub value_earned: Option<f64>,
    pub worker_daily_rate: Option<f64>,
    pub inputs: Vec<InputLot>,
    pub equal_split: Option<bool>,
    pub notes: Option<String>,
}

impl FieldReport {
    /// Boletim mínimo, usado como base pelos testes e pelo extrator
    pub fn new(project: impl Into<String>, execution_date: NaiveDate) -> Self {
        Self {
            project: project.into(),
            company: String::new(),
            service: String::new(),
            farm: String::new(),
            plot: String::new(),
            execution_date,
            area_completed: 0.0,
            area_total: 0.0,
            area_remaining: 0.0,
            field_status: "INICIADO".to_string(),
            value_earned: None,
            worker_daily_rate: None,
            inputs: Vec::new(),
            equal_split: None,
            notes: None,
        }
    }

    pub fn input(&self, index: usize) -> Option<&InputLot> {
        self.inputs.get(index)
    }
}

/// Categoria do prêmio, pela seção do texto em que o colaborador aparece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareCategory {
    /// "RATEIO PRODUÇÃO MANUAL"
    ManualSplit,
    /// "RATEIO PRODUÇÃO MECANIZADA"
    MechanizedSplit,
    /// "EQUIPE APOIO ENVOLVIDA"
    Support,
    /// "ESTRUTURA APOIO ENVOLVIDA"
    Structure,
}

impl ShareCategory {
    pub fn as_tag(&self) -> &'static str {
        match self {
            ShareCategory::ManualSplit => "RATEIO_MANUAL",
            ShareCategory::MechanizedSplit => "RATEIO_MEC",
            ShareCategory::Support => "APOIO",
            ShareCategory::Structure => "ESTRUTURA",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "RATEIO_MANUAL" => Some(ShareCategory::ManualSplit),
            "RATEIO_MEC" | "RATEIO_MECANIZADO" => Some(ShareCategory::MechanizedSplit),
            "APOIO" => Some(ShareCategory::Support),
            "ESTRUTURA" => Some(ShareCategory::Structure),
            _ => None,
        }
    }
}

/// Prêmio / linha de rateio ligada ao boletim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionShare {
    pub category: ShareCategory,
    pub worker_id: Option<String>,
    pub equipment_id: Option<String>,
    /// Ausente quando o colaborador não informou produção
    pub quantity: Option<f64>,
    pub role: Option<String>,
    pub receives_bonus: bool,
    pub fixed_bonus: Option<f64>,
}

impl ProductionShare {
    pub fn new(category: ShareCategory) -> Self {
        Self {
            category,
            worker_id: None,
            equipment_id: None,
            quantity: None,
            role: None,
            receives_bonus: false,
            fixed_bonus: None,
        }
    }

    /// Linha de rateio manual de um colaborador
    pub fn manual(worker_id: impl Into<String>, quantity: Option<f64>) -> Self {
        Self {
            worker_id: Some(worker_id.into()),
            quantity,
            role: Some("CAMPO".to_string()),
            receives_bonus: true,
            ..Self::new(ShareCategory::ManualSplit)
        }
    }

    /// Produção informada e positiva
    pub fn assigned_quantity(&self) -> Option<f64> {
        self.quantity.filter(|q| *q > 0.0)
    }

    /// Identificação usada nos alertas: colaborador, senão equipamento
    pub fn label(&self) -> &str {
        self.worker_id
            .as_deref()
            .or(self.equipment_id.as_deref())
            .unwrap_or("?")
    }
}

/// Motivo de falha do extrator
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionFailure {
    /// Sem chave da OpenAI configurada
    Disabled,
    Unreachable(String),
    Timeout(u64),
    Malformed(String),
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionFailure::Disabled => write!(f, "extraction service not configured"),
            ExtractionFailure::Unreachable(msg) => write!(f, "extraction service unreachable: {}", msg),
            ExtractionFailure::Timeout(secs) => write!(f, "extraction timed out after {}s", secs),
            ExtractionFailure::Malformed(msg) => write!(f, "malformed extraction output: {}", msg),
        }
    }
}

/// Saída do extrator: nunca um dicionário solto
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Success {
        report: FieldReport,
        shares: Vec<ProductionShare>,
    },
    Failure {
        reason: ExtractionFailure,
    },
}

/// Ação do coordenador sobre um RAW pendente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalAction {
    Approve,
    Reject,
    RequestCorrection,
}

impl ApprovalAction {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "SIM" => Some(ApprovalAction::Approve),
            "NAO" => Some(ApprovalAction::Reject),
            "CORRIGIR" => Some(ApprovalAction::RequestCorrection),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            ApprovalAction::Approve => "SIM",
            ApprovalAction::Reject => "NAO",
            ApprovalAction::RequestCorrection => "CORRIGIR",
        }
    }

    pub fn target_status(&self) -> RawStatus {
        match self {
            ApprovalAction::Approve => RawStatus::Approved,
            ApprovalAction::Reject => RawStatus::Rejected,
            ApprovalAction::RequestCorrection => RawStatus::CorrectionRequested,
        }
    }
}

/// Visão de aprovação de um RAW: quem enviou, de qual projeto, em que status
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalContext {
    pub raw_id: i64,
    pub submitter_phone: String,
    /// Ausente quando o boletim não chegou a ser gravado
    pub project: Option<String>,
    pub status: RawStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_strings() {
        for status in [
            RawStatus::Pending,
            RawStatus::Approved,
            RawStatus::Rejected,
            RawStatus::CorrectionRequested,
        ] {
            assert_eq!(RawStatus::from_db_str(status.as_db_str()), Some(status));
        }
        assert_eq!(RawStatus::from_db_str("pendente"), Some(RawStatus::Pending));
        assert_eq!(RawStatus::from_db_str("ARQUIVADO"), None);
        assert!(!RawStatus::Pending.is_terminal());
        assert!(RawStatus::CorrectionRequested.is_terminal());
    }

    #[test]
    fn test_share_category_tags() {
        assert_eq!(ShareCategory::from_tag("rateio_manual"), Some(ShareCategory::ManualSplit));
        assert_eq!(ShareCategory::from_tag("RATEIO_MEC"), Some(ShareCategory::MechanizedSplit));
        assert_eq!(ShareCategory::from_tag("BONUS"), None);
        assert_eq!(ShareCategory::Structure.as_tag(), "ESTRUTURA");
    }

    #[test]
    fn test_assigned_quantity_ignores_zero() {
        assert_eq!(ProductionShare::manual("2508", Some(0.0)).assigned_quantity(), None);
        assert_eq!(ProductionShare::manual("2508", None).assigned_quantity(), None);
        assert_eq!(ProductionShare::manual("2508", Some(4.5)).assigned_quantity(), Some(4.5));
    }

    #[test]
    fn test_action_mapping() {
        assert_eq!(ApprovalAction::from_keyword("SIM"), Some(ApprovalAction::Approve));
        assert_eq!(ApprovalAction::from_keyword("TALVEZ"), None);
        assert_eq!(
            ApprovalAction::RequestCorrection.target_status(),
            RawStatus::CorrectionRequested
        );
    }
}
