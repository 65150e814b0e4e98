//! Conferência de rateio de produção
//!
//! Olha apenas as linhas `RATEIO_MANUAL` e decide entre três casos pela
//! quantidade de colaboradores com produção informada (> 0):
//!
//! | preenchidos | ação                                                   |
//! |-------------|--------------------------------------------------------|
//! | nenhum      | divide `area_realizada` igualmente (2 casas decimais)  |
//! | alguns      | não preenche nada; aponta restante e quem falta        |
//! | todos       | confere a soma contra `area_realizada` (tolerância 0.1)|
//!
//! Independente disso, se o texto declarar `PRODUÇÃO MECANIZADA TOTAL:`,
//! a soma das linhas `RATEIO_MEC` é comparada ao total declarado.
//!
//! `reconcile` é pura: mesma entrada, mesma saída.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::models::{FieldReport, ProductionShare, ShareCategory};
use crate::utils::normalization::{format_number, parse_decimal_br, round2};

pub const TOLERANCE: f64 = 0.1;

static MECHANIZED_TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"PRODUÇÃO MECANIZADA TOTAL:\s*(\d[\d.,]*)")
        .expect("regex de total mecanizado é válida")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    Info,
    Warning,
    Inconsistency,
    ActionRequired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RateioAlert {
    AutoSplit { per_worker: f64, workers: usize },
    Incomplete { assigned: usize, total: usize },
    PartialSplit { assigned_sum: f64, remaining: f64 },
    MissingProduction { workers: Vec<String> },
    FullyDistributed,
    Conferred,
    Divergence { distributed: f64, completed: f64, difference: f64 },
    MechanizedShortfall { declared: f64, distributed: f64, missing: f64 },
}

impl RateioAlert {
    pub fn level(&self) -> AlertLevel {
        match self {
            RateioAlert::AutoSplit { .. }
            | RateioAlert::PartialSplit { .. }
            | RateioAlert::FullyDistributed
            | RateioAlert::Conferred => AlertLevel::Info,
            RateioAlert::MechanizedShortfall { .. } => AlertLevel::Warning,
            RateioAlert::Incomplete { .. } | RateioAlert::Divergence { .. } => AlertLevel::Inconsistency,
            RateioAlert::MissingProduction { .. } => AlertLevel::ActionRequired,
        }
    }

    pub fn requires_attention(&self) -> bool {
        matches!(self.level(), AlertLevel::Inconsistency | AlertLevel::ActionRequired)
    }
}

impl fmt::Display for RateioAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateioAlert::AutoSplit { per_worker, .. } => write!(
                f,
                "✅ RATEIO AUTOMÁTICO aplicado: {} por colaborador",
                format_number(*per_worker)
            ),
            RateioAlert::Incomplete { assigned, total } => write!(
                f,
                "⚠️ RATEIO INCOMPLETO: {} de {} colaboradores preenchidos",
                assigned, total
            ),
            RateioAlert::PartialSplit { assigned_sum, remaining } => write!(
                f,
                "📊 Área preenchida: {}, Área restante: {}",
                format_number(*assigned_sum),
                format_number(*remaining)
            ),
            RateioAlert::MissingProduction { workers } => write!(
                f,
                "🔧 AÇÃO NECESSÁRIA: Defina produção para os {} colaboradores restantes\n👥 Colaboradores pendentes: {}",
                workers.len(),
                workers.join(", ")
            ),
            RateioAlert::FullyDistributed => write!(f, "✅ Área totalmente distribuída"),
            RateioAlert::Conferred => write!(f, "✅ Rateio manual conferido - Valores corretos"),
            RateioAlert::Divergence { distributed, completed, difference } => write!(
                f,
                "⚠️ DIVERGÊNCIA: Total rateio ({}) ≠ Área realizada ({})\n🔧 Diferença de {} - Verifique os valores",
                format_number(*distributed),
                format_number(*completed),
                format_number(*difference)
            ),
            RateioAlert::MechanizedShortfall { declared, missing, .. } => write!(
                f,
                "⚠️ RATEIO MECANIZADO: Faltam {} para atingir total de {}",
                format_number(*missing),
                format_number(*declared)
            ),
        }
    }
}

/// Resultado da conferência: prêmios (possivelmente com rateio automático) e alertas
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub shares: Vec<ProductionShare>,
    pub alerts: Vec<RateioAlert>,
}

impl Reconciliation {
    pub fn requires_attention(&self) -> bool {
        self.alerts.iter().any(RateioAlert::requires_attention)
    }

    pub fn render_alerts(&self) -> Vec<String> {
        self.alerts.iter().map(ToString::to_string).collect()
    }
}

/// Total mecanizado declarado no texto, se houver
pub fn declared_mechanized_total(source_text: &str) -> Option<f64> {
    MECHANIZED_TOTAL
        .captures(source_text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_decimal_br(m.as_str()))
}

pub fn reconcile(report: &FieldReport, shares: &[ProductionShare], source_text: &str) -> Reconciliation {
    let mut adjusted = shares.to_vec();
    let mut alerts = Vec::new();
    let completed = report.area_completed;

    let manual: Vec<&ProductionShare> = shares
        .iter()
        .filter(|s| s.category == ShareCategory::ManualSplit)
        .collect();

    if !manual.is_empty() {
        let total = manual.len();
        let assigned: Vec<f64> = manual.iter().filter_map(|s| s.assigned_quantity()).collect();

        if assigned.is_empty() {
            let per_worker = round2(completed / total as f64);
            for share in adjusted
                .iter_mut()
                .filter(|s| s.category == ShareCategory::ManualSplit)
            {
                share.quantity = Some(per_worker);
            }
            alerts.push(RateioAlert::AutoSplit { per_worker, workers: total });
        } else if assigned.len() < total {
            let assigned_sum = round2(assigned.iter().sum());
            let remaining = round2(completed - assigned_sum);

            alerts.push(RateioAlert::Incomplete {
                assigned: assigned.len(),
                total,
            });
            alerts.push(RateioAlert::PartialSplit { assigned_sum, remaining });

            if remaining > 0.0 {
                let workers = manual
                    .iter()
                    .filter(|s| s.assigned_quantity().is_none())
                    .map(|s| s.label().to_string())
                    .collect();
                alerts.push(RateioAlert::MissingProduction { workers });
            } else {
                alerts.push(RateioAlert::FullyDistributed);
            }
        } else {
            let distributed = round2(assigned.iter().sum());
            let difference = round2((distributed - completed).abs());

            if (distributed - completed).abs() > TOLERANCE {
                alerts.push(RateioAlert::Divergence {
                    distributed,
                    completed,
                    difference,
                });
            } else {
                alerts.push(RateioAlert::Conferred);
            }
        }
    }

    let mechanized: Vec<&ProductionShare> = shares
        .iter()
        .filter(|s| s.category == ShareCategory::MechanizedSplit)
        .collect();

    if !mechanized.is_empty() {
        if let Some(declared) = declared_mechanized_total(source_text) {
            let distributed = round2(mechanized.iter().filter_map(|s| s.quantity).sum());
            if (declared - distributed).abs() > TOLERANCE {
                alerts.push(RateioAlert::MechanizedShortfall {
                    declared,
                    distributed,
                    missing: round2(declared - distributed),
                });
            }
        }
    }

    Reconciliation {
        shares: adjusted,
        alerts,
    }
}
