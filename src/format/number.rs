//! Numeric Notation Parser
//!
//! 表記法が不明な数値文字列（`1.234,56` / `1,234.56` / `R$ 1.234,56` など）を
//! 正規化済みの小数に変換します。

/// 値なしを表すプレースホルダー（大文字小文字は区別しない）
const PLACEHOLDERS: &[&str] = &["", "nan", "-", "n/a", "na", "none", "null", "nat"];

/// 値なしを表すプレースホルダーかどうかを判定
///
/// 空文字列、`nan`、`-`、`N/A`などが該当します。
pub(crate) fn is_placeholder(raw: &str) -> bool {
    let trimmed = raw.trim();
    PLACEHOLDERS
        .iter()
        .any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
}

/// 表記法が不明な数値文字列を小数に変換する
///
/// 通貨記号、どちらの慣習の桁区切り、`.`または`,`の小数点、空白を含んでいてもよく、
/// 空文字列やプレースホルダー（`nan`、`-`、`N/A`）でも構いません。
///
/// # アルゴリズム
///
/// 1. 数字、`.`、`,`、先頭のマイナス記号以外をすべて取り除く
/// 2. 最後の`.`と最後の`,`の位置を求める
/// 3. `,`が後ろにあれば`,`が小数点: `.`をすべて削除し、`,`を`.`に置き換える
/// 4. `.`が後ろにあれば`.`が小数点: `,`をすべて削除する
/// 5. 片方だけの場合はそれを小数点として扱い、どちらもなければ整数として扱う
/// 6. 解析に失敗した場合（空、小数点が複数、数値でない）は`0.0`を返す
///
/// 単一のトークンから`1.234,56`（pt-BR）と`1,234.56`（en-US）を区別できる情報は
/// 最後の区切り文字の位置だけです。桁区切りに1種類の区切り文字しか使わない限り、
/// この規則は一貫した結果になります。
///
/// # 使用例
///
/// ```rust
/// use darfbatch::parse_number;
///
/// assert_eq!(parse_number("R$ 1.234,56"), 1234.56);
/// assert_eq!(parse_number("1,234.56"), 1234.56);
/// assert_eq!(parse_number("N/A"), 0.0);
/// ```
pub fn parse_number(raw: &str) -> f64 {
    if is_placeholder(raw) {
        return 0.0;
    }

    let cleaned = strip_non_numeric(raw);
    let normalized = normalize_separators(&cleaned);

    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// 整数コード（例: 収入コード）として数値を解釈する
///
/// `parse_number`の結果の整数部分を区切りなしで返します。
/// 解析できない値は`"0"`になります。
pub fn parse_integer_code(raw: &str) -> String {
    let value = parse_number(raw).trunc();
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value as i64)
}

/// 数字、`.`、`,`、および先頭のマイナス記号だけを残す
fn strip_non_numeric(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '0'..='9' | '.' | ',' => cleaned.push(c),
            // 数字や区切りより前に現れた場合のみ符号とみなす
            '-' if cleaned.is_empty() => cleaned.push(c),
            _ => {}
        }
    }
    cleaned
}

/// 最後に現れた区切り文字を小数点とみなして、`.`区切りの表記に揃える
fn normalize_separators(cleaned: &str) -> String {
    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_locale_variants() {
        for raw in ["1.234,56", "1,234.56", "1234.56", "1234,56", "R$ 1.234,56"] {
            assert_eq!(parse_number(raw), 1234.56, "input: {}", raw);
        }
    }

    #[test]
    fn test_parse_number_placeholders() {
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("nan"), 0.0);
        assert_eq!(parse_number("NaN"), 0.0);
        assert_eq!(parse_number("-"), 0.0);
        assert_eq!(parse_number("N/A"), 0.0);
        assert_eq!(parse_number("abc"), 0.0);
        assert_eq!(parse_number("   "), 0.0);
    }

    #[test]
    fn test_parse_number_large_values() {
        assert_eq!(parse_number("2.500.000,00"), 2_500_000.0);
        assert_eq!(parse_number("2,500,000.00"), 2_500_000.0);
        assert_eq!(parse_number("600.822.115,84"), 600_822_115.84);
    }

    #[test]
    fn test_parse_number_single_separator_is_decimal() {
        assert_eq!(parse_number("12,3"), 12.3);
        assert_eq!(parse_number("12.3"), 12.3);
        assert_eq!(parse_number("1500"), 1500.0);
    }

    #[test]
    fn test_parse_number_repeated_single_separator_degrades_to_zero() {
        // 片方の区切りだけが複数回現れると小数点が複数になり、解析できない
        assert_eq!(parse_number("1,234,567"), 0.0);
        assert_eq!(parse_number("2.500.000"), 0.0);
    }

    #[test]
    fn test_parse_number_sign() {
        assert_eq!(parse_number("-1.234,56"), -1234.56);
        assert_eq!(parse_number("R$ -10,00"), -10.0);
        // 数字の後ろのマイナスは符号ではない
        assert_eq!(parse_number("10-"), 10.0);
    }

    #[test]
    fn test_parse_number_currency_and_spaces() {
        assert_eq!(parse_number(" R$\u{a0}1.000,00 "), 1000.0);
        assert_eq!(parse_number("USD 1,000.50"), 1000.5);
    }

    #[test]
    fn test_parse_integer_code() {
        assert_eq!(parse_integer_code("5952"), "5952");
        assert_eq!(parse_integer_code("5952.0"), "5952");
        assert_eq!(parse_integer_code("0561"), "561");
        assert_eq!(parse_integer_code(""), "0");
        assert_eq!(parse_integer_code("abc"), "0");
    }

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder(" N/A "));
        assert!(is_placeholder("None"));
        assert!(!is_placeholder("0"));
        assert!(!is_placeholder("Fulano"));
    }
}
