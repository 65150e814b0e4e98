//! Extração estruturada do pré-apontamento via OpenAI
//!
//! O modelo devolve `{"boletim": {...}, "premios": [...]}`. Tudo que vem dele é
//! tratado como entrada não confiável: números podem vir como texto com
//! vírgula, datas como "HOJE", categorias com grafias diferentes. A
//! normalização acontece aqui, de forma determinística, antes do rateio.

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use ia_service::{IaService, IaServiceError};

use crate::models::{
    ExtractionFailure, ExtractionResult, FieldReport, InputLot, ProductionShare, ShareCategory,
    MAX_INPUT_LOTS,
};
use crate::utils::normalization::{fold_upper, parse_decimal_br, round2};

/// Contrato do extrator: texto livre → boletim + prêmios, ou falha
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, raw_text: &str, today: NaiveDate) -> ExtractionResult;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Usado quando não há chave da OpenAI: todo pré-apontamento vai para revisão manual
pub struct DisabledExtractor;

#[async_trait]
impl StructuredExtractor for DisabledExtractor {
    async fn extract(&self, _raw_text: &str, _today: NaiveDate) -> ExtractionResult {
        ExtractionResult::Failure {
            reason: ExtractionFailure::Disabled,
        }
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

const SYSTEM_PROMPT: &str =
    "Você é um assistente especializado em extração de dados agrícolas. Responda APENAS com JSON válido.";

pub struct OpenAiExtractor {
    ia: Arc<IaService>,
}

impl OpenAiExtractor {
    pub fn new(ia: Arc<IaService>) -> Self {
        Self { ia }
    }

    fn build_prompt(raw_text: &str, today: NaiveDate) -> String {
        let today = today.format("%Y-%m-%d");
        format!(
            r#"Extraia os dados do pré-apontamento agrícola abaixo.

REGRAS:
1. Extraia TODOS os campos encontrados; campos em branco ficam como "".
2. Se a data for "HOJE" ou similar, use "{today}".
3. Números com vírgula decimal devem virar números JSON (15,5 → 15.5).
4. Prêmios por seção:
   - "RATEIO PRODUÇÃO MANUAL" → categoria "RATEIO_MANUAL"
   - "RATEIO PRODUÇÃO MECANIZADA" → categoria "RATEIO_MEC"
   - "EQUIPE APOIO ENVOLVIDA" → categoria "APOIO"
   - "ESTRUTURA APOIO ENVOLVIDA" → categoria "ESTRUTURA"
5. Para cada colaborador: código (ex: 2508, TP001), produção (número após o hífen,
   null se ausente), função (texto após PREMIO), recebe_premio 1 se tem "PREMIO".
6. Mantenha os códigos de colaborador e equipamento exatamente como no texto.

TEXTO:
{raw_text}

Formato da resposta:
{{
  "boletim": {{
    "data_execucao": "{today}",
    "projeto": "", "empresa": "", "servico": "", "fazenda": "", "talhao": "",
    "area_total": 0, "area_realizada": 0, "area_restante": null, "status_campo": "",
    "valor_ganho": 0, "diaria_colaborador": 0,
    "lote1": "", "insumo1": "", "quantidade1": null,
    "lote2": "", "insumo2": "", "quantidade2": null,
    "lote3": "", "insumo3": "", "quantidade3": null,
    "divisao_premio_igual": "SIM ou NAO",
    "observacoes": ""
  }},
  "premios": [
    {{"categoria": "RATEIO_MANUAL", "colaborador_id": "", "equipamento": null,
      "producao": null, "funcao": "CAMPO", "recebe_premio": 1, "valor_fixo": null}}
  ]
}}"#
        )
    }
}

#[async_trait]
impl StructuredExtractor for OpenAiExtractor {
    async fn extract(&self, raw_text: &str, today: NaiveDate) -> ExtractionResult {
        let prompt = Self::build_prompt(raw_text, today);

        let content = match self.ia.complete_json(SYSTEM_PROMPT, &prompt).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("⚠️ Extração falhou: {}", e);
                let reason = match e {
                    IaServiceError::Timeout(secs) => ExtractionFailure::Timeout(secs),
                    IaServiceError::ParseError(msg) => ExtractionFailure::Malformed(msg),
                    other => ExtractionFailure::Unreachable(other.to_string()),
                };
                return ExtractionResult::Failure { reason };
            }
        };

        match parse_extraction(&content, raw_text, today) {
            Ok((report, shares)) => {
                tracing::info!(
                    "✅ Extração concluída: projeto {}, {} prêmios",
                    report.project,
                    shares.len()
                );
                ExtractionResult::Success { report, shares }
            }
            Err(reason) => {
                tracing::warn!("⚠️ Resposta da IA não pôde ser interpretada: {}", reason);
                ExtractionResult::Failure { reason }
            }
        }
    }
}

// ============================================================================
// Formato devolvido pelo modelo
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireExtraction {
    boletim: Option<WireBoletim>,
    #[serde(default)]
    premios: Vec<WirePremio>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WireBoletim {
    data_execucao: Value,
    projeto: Value,
    empresa: Value,
    servico: Value,
    fazenda: Value,
    talhao: Value,
    area_total: Value,
    area_realizada: Value,
    area_restante: Value,
    status_campo: Value,
    valor_ganho: Value,
    diaria_colaborador: Value,
    lote1: Value,
    insumo1: Value,
    quantidade1: Value,
    lote2: Value,
    insumo2: Value,
    quantidade2: Value,
    lote3: Value,
    insumo3: Value,
    quantidade3: Value,
    divisao_premio_igual: Value,
    observacoes: Value,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WirePremio {
    categoria: Value,
    colaborador_id: Value,
    equipamento: Value,
    producao: Value,
    funcao: Value,
    recebe_premio: Value,
    valor_fixo: Value,
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal_br(s),
        _ => None,
    }
}

fn flag_of(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match fold_upper(s.trim()).as_str() {
            "SIM" | "S" | "1" | "TRUE" => Some(true),
            "NAO" | "N" | "0" | "FALSE" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// ============================================================================
// Normalização
// ============================================================================

/// Correções ortográficas conhecidas, chave sem acento
static SPELLING_FIXES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("LARZIL", "LARSIL"),
        ("FURMIGA", "FORMIGA"),
        ("TALAO", "TALHÃO"),
    ])
});

/// Maiúsculas + tabela de correções, palavra a palavra
pub fn normalize_categorical(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let key = fold_upper(word);
            match SPELLING_FIXES.get(key.as_str()) {
                Some(fixed) => (*fixed).to_string(),
                None => word.to_uppercase(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a data do boletim; sentinelas e lixo viram a data de processamento
pub fn resolve_execution_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return today;
    };

    match raw.to_uppercase().as_str() {
        "HOJE" | "TODAY" | "YYYY-MM-DD" => return today,
        _ => {}
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .unwrap_or_else(|_| {
            tracing::warn!("⚠️ Data '{}' não reconhecida, usando data de processamento", raw);
            today
        })
}

/// PARCIAL / CONCLUÍDO quando há área total, INICIADO caso contrário
pub fn infer_field_status(area_total: f64, area_remaining: f64) -> &'static str {
    if area_total <= 0.0 {
        "INICIADO"
    } else if area_remaining > 0.0 {
        "PARCIAL"
    } else {
        "CONCLUÍDO"
    }
}

static INPUT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(LOTE|INSUMO|QUANTIDADE)\s*([1-3])\s*:[ \t]*(.*?)\s*$")
        .expect("regex de insumos é válida")
});

/// Lê `LOTE1:`/`INSUMO1:`/`QUANTIDADE1:` (até 3) direto do texto
pub fn inputs_from_text(raw_text: &str) -> Vec<InputLot> {
    let mut lots = vec![InputLot::default(); MAX_INPUT_LOTS];

    for caps in INPUT_LINE.captures_iter(raw_text) {
        let index = caps[2].parse::<usize>().unwrap_or(1).saturating_sub(1);
        let value = caps[3].trim();
        if value.is_empty() || index >= MAX_INPUT_LOTS {
            continue;
        }
        let slot = &mut lots[index];
        match caps[1].to_uppercase().as_str() {
            "LOTE" => slot.lot = Some(value.to_uppercase()),
            "INSUMO" => slot.input = Some(value.to_uppercase()),
            _ => slot.quantity = parse_decimal_br(value),
        }
    }

    trim_trailing_empty(lots)
}

fn trim_trailing_empty(mut lots: Vec<InputLot>) -> Vec<InputLot> {
    while lots.last().map(InputLot::is_empty).unwrap_or(false) {
        lots.pop();
    }
    lots
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn parse_wire(content: &str) -> Result<WireExtraction, ExtractionFailure> {
    let body = strip_code_fences(content);

    match serde_json::from_str::<WireExtraction>(body) {
        Ok(wire) => Ok(wire),
        Err(first_err) => {
            // Texto em volta do JSON: tenta o maior trecho {...}
            let span = body
                .find('{')
                .zip(body.rfind('}'))
                .filter(|(start, end)| start < end)
                .map(|(start, end)| &body[start..=end]);

            match span {
                Some(span) => serde_json::from_str::<WireExtraction>(span)
                    .map_err(|e| ExtractionFailure::Malformed(e.to_string())),
                None => Err(ExtractionFailure::Malformed(first_err.to_string())),
            }
        }
    }
}

fn report_from_wire(wire: &WireBoletim, raw_text: &str, today: NaiveDate) -> FieldReport {
    let date_text = text_of(&wire.data_execucao);
    let mut report = FieldReport::new(
        text_of(&wire.projeto).map(|p| p.to_uppercase()).unwrap_or_default(),
        resolve_execution_date(date_text.as_deref(), today),
    );

    report.company = text_of(&wire.empresa).map(|s| normalize_categorical(&s)).unwrap_or_default();
    report.service = text_of(&wire.servico).map(|s| normalize_categorical(&s)).unwrap_or_default();
    report.farm = text_of(&wire.fazenda).map(|s| normalize_categorical(&s)).unwrap_or_default();
    report.plot = text_of(&wire.talhao).map(|s| s.to_uppercase()).unwrap_or_default();

    report.area_total = number_of(&wire.area_total).unwrap_or(0.0);
    report.area_completed = number_of(&wire.area_realizada).unwrap_or(0.0);
    report.area_remaining = number_of(&wire.area_restante)
        .unwrap_or_else(|| round2(report.area_total - report.area_completed));
    report.field_status = text_of(&wire.status_campo)
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| infer_field_status(report.area_total, report.area_remaining).to_string());

    report.value_earned = number_of(&wire.valor_ganho).filter(|v| *v > 0.0);
    report.worker_daily_rate = number_of(&wire.diaria_colaborador).filter(|v| *v > 0.0);

    let wire_lots = [
        (&wire.lote1, &wire.insumo1, &wire.quantidade1),
        (&wire.lote2, &wire.insumo2, &wire.quantidade2),
        (&wire.lote3, &wire.insumo3, &wire.quantidade3),
    ];
    let lots: Vec<InputLot> = wire_lots
        .iter()
        .map(|(lot, input, quantity)| InputLot {
            lot: text_of(lot).map(|s| s.to_uppercase()),
            input: text_of(input).map(|s| s.to_uppercase()),
            quantity: number_of(quantity),
        })
        .collect();

    report.inputs = if lots[0].is_empty() {
        inputs_from_text(raw_text)
    } else {
        trim_trailing_empty(lots)
    };

    report.equal_split = flag_of(&wire.divisao_premio_igual);
    report.notes = text_of(&wire.observacoes);
    report
}

fn share_from_wire(wire: &WirePremio) -> Option<ProductionShare> {
    let tag = text_of(&wire.categoria).unwrap_or_default();
    let Some(category) = ShareCategory::from_tag(&tag) else {
        tracing::warn!("⚠️ Categoria de prêmio desconhecida '{}', linha descartada", tag);
        return None;
    };

    Some(ProductionShare {
        category,
        worker_id: text_of(&wire.colaborador_id),
        equipment_id: text_of(&wire.equipamento),
        quantity: number_of(&wire.producao),
        role: text_of(&wire.funcao).map(|s| s.to_uppercase()),
        receives_bonus: flag_of(&wire.recebe_premio).unwrap_or(false),
        fixed_bonus: number_of(&wire.valor_fixo),
    })
}

/// Interpreta a resposta do modelo e aplica a normalização
pub fn parse_extraction(
    content: &str,
    raw_text: &str,
    today: NaiveDate,
) -> Result<(FieldReport, Vec<ProductionShare>), ExtractionFailure> {
    let wire = parse_wire(content)?;
    let boletim = wire
        .boletim
        .ok_or_else(|| ExtractionFailure::Malformed("missing 'boletim' object".to_string()))?;

    let report = report_from_wire(&boletim, raw_text, today);
    let shares = wire.premios.iter().filter_map(share_from_wire).collect();
    Ok((report, shares))
}
