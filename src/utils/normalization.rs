//! Funções de normalização de telefones, textos e números
//!
//! Telefones chegam do Z-API só com dígitos, mas a tabela de usuários tem
//! números digitados à mão ("+55 11 9999-8888"). Toda comparação de telefone
//! passa por `normalize_phone` dos dois lados.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Mantém apenas os dígitos do telefone
///
/// # Exemplos
/// ```
/// use apontamento_bot::utils::normalization::normalize_phone;
///
/// assert_eq!(normalize_phone("+55 11 9999-8888"), "551199998888");
/// assert_eq!(normalize_phone("(11) 98888-7777"), "11988887777");
/// ```
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Compara dois telefones após normalização
///
/// Telefones vazios nunca são considerados iguais.
pub fn same_phone(a: &str, b: &str) -> bool {
    let a = normalize_phone(a);
    !a.is_empty() && a == normalize_phone(b)
}

/// Remove acentos (NFKD) e converte para maiúsculas
///
/// Usado como chave da tabela de correções ortográficas, para que
/// "talão", "TALAO" e "Talão" caiam na mesma entrada.
///
/// # Exemplos
/// ```
/// use apontamento_bot::utils::normalization::fold_upper;
///
/// assert_eq!(fold_upper("Talão"), "TALAO");
/// assert_eq!(fold_upper("são joão"), "SAO JOAO");
/// ```
pub fn fold_upper(input: &str) -> String {
    input
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_uppercase()
}

/// Converte números no formato brasileiro para `f64`
///
/// Aceita "R$ 18.004,43", "15,59", "10.5", "50 ha". Quando há vírgula ela é o
/// separador decimal e pontos são milhares; sem vírgula, um único ponto é decimal.
///
/// # Exemplos
/// ```
/// use apontamento_bot::utils::normalization::parse_decimal_br;
///
/// assert_eq!(parse_decimal_br("R$ 18.004,43"), Some(18004.43));
/// assert_eq!(parse_decimal_br("15,59"), Some(15.59));
/// assert_eq!(parse_decimal_br("abc"), None);
/// ```
pub fn parse_decimal_br(input: &str) -> Option<f64> {
    let cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let canonical = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if cleaned.matches('.').count() > 1 {
        cleaned.replace('.', "")
    } else {
        cleaned
    };

    canonical.parse::<f64>().ok()
}

/// Arredonda para 2 casas decimais
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Formata valor em reais: 18004.43 → "R$ 18.004,43"
pub fn format_brl(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let int_part = (cents / 100).to_string();
    let frac_part = cents % 100;

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, frac_part)
}

/// Formata número sem zeros à direita desnecessários: 2.0 → "2", 2.5 → "2.5"
pub fn format_number(value: f64) -> String {
    let rounded = round2(value);
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        let s = format!("{:.2}", rounded);
        s.trim_end_matches('0').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+55 11 9999-8888"), "551199998888");
        assert_eq!(normalize_phone("5511999988888"), "5511999988888");
        assert_eq!(normalize_phone(""), "");
        assert_eq!(normalize_phone("sem número"), "");
    }

    #[test]
    fn test_same_phone_ignores_punctuation() {
        assert!(same_phone("+55 (11) 99999-8888", "5511999998888"));
        assert!(!same_phone("+55 11 9999-8888", "5511999988888"));
        assert!(!same_phone("", ""));
    }

    #[test]
    fn test_fold_upper() {
        assert_eq!(fold_upper("furmiga"), "FURMIGA");
        assert_eq!(fold_upper("Talão"), "TALAO");
        assert_eq!(fold_upper("SERVIÇO"), "SERVICO");
    }

    #[test]
    fn test_parse_decimal_br() {
        assert_eq!(parse_decimal_br("R$ 18.004,43"), Some(18004.43));
        assert_eq!(parse_decimal_br("15,59"), Some(15.59));
        assert_eq!(parse_decimal_br("10.5"), Some(10.5));
        assert_eq!(parse_decimal_br("50 ha"), Some(50.0));
        assert_eq!(parse_decimal_br("1.234.567"), Some(1234567.0));
        assert_eq!(parse_decimal_br(""), None);
        assert_eq!(parse_decimal_br("R$"), None);
    }

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(18004.43), "R$ 18.004,43");
        assert_eq!(format_brl(150.0), "R$ 150,00");
        assert_eq!(format_brl(1234567.891), "R$ 1.234.567,89");
        assert_eq!(format_brl(0.5), "R$ 0,50");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(3.333333), "3.33");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(30.0), "30");
    }
}
