//! Interpretação dos comandos de aprovação enviados pelo coordenador
//!
//! Formato aceito: `SIM <id>`, `NAO <id>`, `CORRIGIR <id>` (sem diferenciar
//! maiúsculas). O id pode vir colado à palavra (`SIM48`) ou dentro de outro
//! token (`#48`). Botões do Z-API (`aprovar_48`, ...) são convertidos para o
//! mesmo texto antes de chegar aqui.

use crate::models::ApprovalAction;
use crate::services::staging::{StagingError, StagingStore};
use crate::utils::normalization::{fold_upper, same_phone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand {
    pub action: ApprovalAction,
    pub raw_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpretation {
    Command { action: ApprovalAction, raw_id: i64 },
    NotACommand,
    /// Comando bem formado vindo de quem não coordena o projeto do RAW
    Unauthorized,
}

const KEYWORDS: [&str; 3] = ["SIM", "NAO", "CORRIGIR"];

/// Separa "SIM48" em ("SIM", "48")
fn split_glued_keyword(token: &str) -> Option<(&'static str, &str)> {
    KEYWORDS.iter().find_map(|kw| {
        token
            .strip_prefix(kw)
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            .map(|rest| (*kw, rest))
    })
}

fn first_digit_run(token: &str) -> Option<&str> {
    let start = token.find(|c: char| c.is_ascii_digit())?;
    let rest = &token[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn find_raw_id(tokens: &[&str]) -> Option<i64> {
    let pure = tokens
        .iter()
        .find(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
        .copied();

    pure.or_else(|| tokens.iter().find_map(|t| first_digit_run(t)))
        .and_then(|digits| digits.parse::<i64>().ok())
}

/// Reconhece a forma do comando, sem checar permissão
pub fn parse_command(text: &str) -> Option<ParsedCommand> {
    let normalized = fold_upper(text);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let (first, rest) = tokens.split_first()?;

    let (keyword, remaining): (&str, Vec<&str>) = if KEYWORDS.contains(first) {
        if rest.is_empty() {
            return None;
        }
        (*first, rest.to_vec())
    } else {
        let (keyword, glued) = split_glued_keyword(first)?;
        let mut remaining = vec![glued];
        remaining.extend_from_slice(rest);
        (keyword, remaining)
    };

    let action = ApprovalAction::from_keyword(keyword)?;
    let raw_id = find_raw_id(&remaining)?;
    Some(ParsedCommand { action, raw_id })
}

/// Converte o id do botão (`aprovar_12`) no comando em texto (`SIM 12`)
pub fn command_from_button(button_id: &str) -> Option<String> {
    let (prefix, id) = button_id.trim().split_once('_')?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let keyword = match prefix.to_lowercase().as_str() {
        "aprovar" => ApprovalAction::Approve.keyword(),
        "rejeitar" => ApprovalAction::Reject.keyword(),
        "corrigir" => ApprovalAction::RequestCorrection.keyword(),
        _ => return None,
    };
    Some(format!("{} {}", keyword, id))
}

/// Interpreta a resposta e confere se o telefone coordena o projeto do RAW
///
/// RAW inexistente ou sem boletim também resulta em `Unauthorized`, para não
/// revelar se o id existe.
pub async fn interpret(
    store: &dyn StagingStore,
    reply_text: &str,
    replying_phone: &str,
) -> Result<Interpretation, StagingError> {
    let Some(command) = parse_command(reply_text) else {
        return Ok(Interpretation::NotACommand);
    };

    let project = match store.approval_context(command.raw_id).await? {
        Some(ctx) => ctx.project,
        None => None,
    };
    let Some(project) = project else {
        return Ok(Interpretation::Unauthorized);
    };

    let coordinators = store.coordinator_phones(&project).await?;
    if coordinators.iter().any(|c| same_phone(c, replying_phone)) {
        Ok(Interpretation::Command {
            action: command.action,
            raw_id: command.raw_id,
        })
    } else {
        Ok(Interpretation::Unauthorized)
    }
}
