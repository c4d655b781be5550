//! Formatter Module
//!
//! 正規化済みの値を、テンプレートに書き込む表示文字列へ整形するモジュール。
//! 金額（pt-BR形式）、納税者番号（CPF/CNPJ）、日付（`DD/MM/YYYY`）を扱います。

use crate::api::NumericPolicy;
use crate::format::parse_flexible_date;
use crate::template::FillValue;
use crate::types::FieldValue;

/// 金額をpt-BR形式で整形する
///
/// 桁区切りは`.`、小数点は`,`、小数部は常に2桁です。整数部は大きさや符号に
/// 関係なく右から3桁ごとに区切ります。有限でない値は`0,00`になります。
///
/// # 使用例
///
/// ```rust
/// use darfbatch::format_amount;
///
/// assert_eq!(format_amount(2_500_000.0), "2.500.000,00");
/// assert_eq!(format_amount(12.3), "12,30");
/// assert_eq!(format_amount(-1234.5), "-1.234,50");
/// ```
pub fn format_amount(value: f64) -> String {
    let (negative, integer, fraction) = round_to_cents(value);

    let mut formatted = String::with_capacity(integer.len() + integer.len() / 3 + 4);
    if negative {
        formatted.push('-');
    }
    formatted.push_str(&group_thousands(&integer));
    formatted.push(',');
    formatted.push_str(&fraction);
    formatted
}

/// 金額を正規化済みの小数表記で整形する（例: `1234.56`）
///
/// テンプレートの書式スクリプトに表示を任せる`NumericPolicy::RawDecimal`で使用します。
pub fn format_raw_decimal(value: f64) -> String {
    let (negative, integer, fraction) = round_to_cents(value);
    format!("{}{}.{}", if negative { "-" } else { "" }, integer, fraction)
}

/// 値を小数2桁に丸め、符号・整数部・小数部に分ける
///
/// 丸めは値の最短の10進表記に対して行い、ちょうど半分は0から遠い方へ丸めます
/// （`0.125` → `0.13`）。有限でない値は0として扱い、丸めた結果が0なら符号は付きません。
fn round_to_cents(value: f64) -> (bool, String, String) {
    let value = if value.is_finite() { value } else { 0.0 };
    // f64のDisplayは指数表記を使わない最短の表記
    let repr = value.abs().to_string();
    let (integer, fraction) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

    let mut digits: Vec<u8> = integer
        .bytes()
        .chain(fraction.bytes().chain(std::iter::repeat(b'0')).take(2))
        .map(|b| b - b'0')
        .collect();

    if fraction.as_bytes().get(2).is_some_and(|&d| d >= b'5') {
        let mut carry = true;
        for digit in digits.iter_mut().rev() {
            if *digit == 9 {
                *digit = 0;
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, 1);
        }
    }

    let split = digits.len() - 2;
    let render = |slice: &[u8]| slice.iter().map(|d| char::from(b'0' + d)).collect::<String>();
    let integer = render(&digits[..split]);
    let fraction = render(&digits[split..]);
    let negative = value < 0.0 && digits.iter().any(|&d| d != 0);
    (negative, integer, fraction)
}

/// 納税者番号を整形する
///
/// 数字以外を除いた結果が11桁ならCPF（`###.###.###-##`）、14桁ならCNPJ
/// （`##.###.###/####-##`）として整形します。それ以外の桁数では入力をそのまま返します。
///
/// # 使用例
///
/// ```rust
/// use darfbatch::format_identifier;
///
/// assert_eq!(format_identifier("12345678901"), "123.456.789-01");
/// assert_eq!(format_identifier("12.345.678/0001-99"), "12.345.678/0001-99");
/// assert_eq!(format_identifier("123"), "123");
/// ```
pub fn format_identifier(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        11 => format!(
            "{}.{}.{}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..11]
        ),
        14 => format!(
            "{}.{}.{}/{}-{}",
            &digits[0..2],
            &digits[2..5],
            &digits[5..8],
            &digits[8..12],
            &digits[12..14]
        ),
        _ => raw.to_string(),
    }
}

/// 日付を`DD/MM/YYYY`で整形する
///
/// 入力が空・`None`・解析不能の場合は空文字列を返します。エラーにはなりません。
///
/// # 使用例
///
/// ```rust
/// use darfbatch::format_date;
///
/// assert_eq!(format_date(Some("2024-01-31")), "31/01/2024");
/// assert_eq!(format_date(Some("garbage")), "");
/// assert_eq!(format_date(None), "");
/// ```
pub fn format_date(raw: Option<&str>) -> String {
    raw.and_then(parse_flexible_date)
        .map(|date| date.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

/// 整数部の数字列を右から3桁ごとに`.`で区切る
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    grouped
}

/// フィールド値フォーマッター
///
/// 正規化済みの`FieldValue`を、テンプレートに書き込む`FillValue`へ変換する
/// ファサードです。金額の表示方針はフィールドごとに呼び出し側が選択します。
#[derive(Debug, Default)]
pub(crate) struct ValueFormatter;

impl ValueFormatter {
    /// 新しいValueFormatterインスタンスを生成
    pub fn new() -> Self {
        Self
    }

    /// フィールド値を書き込み用の値に変換
    ///
    /// # 引数
    ///
    /// * `value` - 正規化済みのフィールド値
    /// * `policy` - 金額の表示方針（`Decimal`以外では無視される）
    pub fn render(&self, value: &FieldValue, policy: NumericPolicy) -> FillValue {
        match value {
            FieldValue::Text(text) | FieldValue::Identifier(text) => FillValue::Display(text.clone()),
            FieldValue::Decimal(number) => match policy {
                NumericPolicy::Formatted => FillValue::Display(format_amount(*number)),
                NumericPolicy::RawDecimal => FillValue::RawDecimal(*number),
            },
            FieldValue::Date(date) => FillValue::Display(
                date.map(|d| d.format("%d/%m/%Y").to_string())
                    .unwrap_or_default(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_amount_examples() {
        assert_eq!(format_amount(2_500_000.00), "2.500.000,00");
        assert_eq!(format_amount(0.0), "0,00");
        assert_eq!(format_amount(12.3), "12,30");
        assert_eq!(format_amount(1234.56), "1.234,56");
        assert_eq!(format_amount(999.999), "1.000,00");
        assert_eq!(format_amount(100.0), "100,00");
    }

    #[test]
    fn test_format_amount_sign_and_magnitude() {
        assert_eq!(format_amount(-1234.5), "-1.234,50");
        assert_eq!(format_amount(-0.001), "0,00");
        assert_eq!(format_amount(1_234_567_890.12), "1.234.567.890,12");
        assert_eq!(format_amount(f64::NAN), "0,00");
        assert_eq!(format_amount(f64::INFINITY), "0,00");
    }

    #[test]
    fn test_format_amount_rounds_half_away_from_zero() {
        assert_eq!(format_amount(0.125), "0,13");
        assert_eq!(format_amount(1234.625), "1.234,63");
        assert_eq!(format_amount(-1234.625), "-1.234,63");
        assert_eq!(format_amount(2.675), "2,68");
        assert_eq!(format_amount(0.124), "0,12");
        assert_eq!(format_amount(-0.005), "-0,01");
        assert_eq!(format_amount(999_999.995), "1.000.000,00");
    }

    #[test]
    fn test_format_raw_decimal() {
        assert_eq!(format_raw_decimal(1234.5), "1234.50");
        assert_eq!(format_raw_decimal(-0.001), "0.00");
        assert_eq!(format_raw_decimal(0.125), "0.13");
        assert_eq!(format_raw_decimal(-1234.625), "-1234.63");
        assert_eq!(format_raw_decimal(f64::NAN), "0.00");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("123"), "123");
        assert_eq!(group_thousands("1234"), "1.234");
        assert_eq!(group_thousands("123456"), "123.456");
        assert_eq!(group_thousands("1234567"), "1.234.567");
    }

    #[test]
    fn test_format_identifier() {
        assert_eq!(format_identifier("12345678901"), "123.456.789-01");
        assert_eq!(format_identifier("12345678000199"), "12.345.678/0001-99");
        assert_eq!(format_identifier("123"), "123");
        assert_eq!(format_identifier("123.456.789-01"), "123.456.789-01");
        assert_eq!(format_identifier(""), "");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(Some("")), "");
        assert_eq!(format_date(None), "");
        assert_eq!(format_date(Some("2024-03-20")), "20/03/2024");
        assert_eq!(format_date(Some("20/03/2024")), "20/03/2024");
        assert_eq!(format_date(Some("31/31/2024")), "");
    }

    #[test]
    fn test_value_formatter_policies() {
        let formatter = ValueFormatter::new();
        assert_eq!(
            formatter.render(&FieldValue::Decimal(1234.56), NumericPolicy::Formatted),
            FillValue::Display("1.234,56".to_string())
        );
        assert_eq!(
            formatter.render(&FieldValue::Decimal(1234.56), NumericPolicy::RawDecimal),
            FillValue::RawDecimal(1234.56)
        );
        // 金額以外には方針が影響しない
        assert_eq!(
            formatter.render(&FieldValue::Text("abc".to_string()), NumericPolicy::RawDecimal),
            FillValue::Display("abc".to_string())
        );
    }

    #[test]
    fn test_value_formatter_dates() {
        let formatter = ValueFormatter::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5);
        assert_eq!(
            formatter.render(&FieldValue::Date(date), NumericPolicy::Formatted),
            FillValue::Display("05/01/2024".to_string())
        );
        assert_eq!(
            formatter.render(&FieldValue::Date(None), NumericPolicy::Formatted),
            FillValue::Display(String::new())
        );
    }
}
