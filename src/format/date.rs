//! Flexible Date Parser
//!
//! スプレッドシートのセルに書かれた、書式の揃っていない日付文字列を
//! `NaiveDate`に変換するベストエフォートのパーサー。
//!
//! 対応する表記:
//!
//! - ISO形式 `YYYY-MM-DD`（`T`または空白に続く時刻部分は無視）、`YYYY/MM/DD`
//! - 日付先行 `DD/MM/YYYY`、`DD-MM-YYYY`、`DD.MM.YYYY`、2桁年 `DD/MM/YY`
//! - 月単位の期間 `MM/YYYY`、`YYYY-MM`（月初日として扱う）
//! - 月名（ポルトガル語・英語）: `jan/2024`、`março de 2024`、`15 de março de 2024`
//! - 8桁の `YYYYMMDD`、4桁の年のみ、スプレッドシートのシリアル値（1900年システム）

use chrono::{Duration, NaiveDate};

use super::number::is_placeholder;

/// スプレッドシートのシリアル値の上限（9999-12-31）
const MAX_SERIAL: f64 = 2_958_465.0;

/// 日付文字列を解析する
///
/// 解析できない場合は`None`を返します（エラーにはなりません）。
/// 区切りが`/`の曖昧な日付は日付先行（pt-BRの慣習）として読み、
/// 日付として成立しない場合のみ月先行で再試行します。
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    if is_placeholder(raw) {
        return None;
    }
    let date_part = strip_time(raw.trim());

    if date_part.chars().all(|c| c.is_ascii_digit() || c == '.')
        && date_part.matches('.').count() <= 1
    {
        return parse_numeric_only(date_part);
    }

    let tokens: Vec<&str> = date_part
        .split(|c: char| matches!(c, '/' | '-' | '.' | ' ' | ','))
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.iter().any(|t| t.chars().any(char::is_alphabetic)) {
        return parse_with_month_name(&tokens);
    }

    if !tokens.iter().all(|t| t.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    match tokens.as_slice() {
        [a, b, c] => parse_three_parts(a, b, c),
        [a, b] => parse_month_period(a, b),
        _ => None,
    }
}

/// スプレッドシートのシリアル値を日付に変換する（1900年システム）
///
/// シリアル値1 = 1900-01-01。1900年を閏年とみなすスプレッドシートの不具合のため、
/// 61以上のシリアル値は1899-12-30を起点に数えます。
pub(crate) fn from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial.floor() as i64;
    let epoch = if days < 61 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    epoch.checked_add_signed(Duration::days(days))
}

/// `2024-01-15T00:00:00`や`15/01/2024 10:30`の時刻部分を取り除く
fn strip_time(s: &str) -> &str {
    match s.find(['T', ' ']) {
        Some(pos) if s[pos + 1..].contains(':') => s[..pos].trim(),
        _ => s,
    }
}

/// 数字（と小数点）だけの文字列: `YYYYMMDD`、年のみ、またはシリアル値
fn parse_numeric_only(s: &str) -> Option<NaiveDate> {
    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        let year = s[0..4].parse().ok()?;
        let month = s[4..6].parse().ok()?;
        let day = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = s.parse().ok()?;
        if (1900..=2100).contains(&year) {
            return NaiveDate::from_ymd_opt(year, 1, 1);
        }
    }
    from_excel_serial(s.parse().ok()?)
}

/// 数値3要素の日付（`YYYY-MM-DD`または`DD/MM/YYYY`）
fn parse_three_parts(a: &str, b: &str, c: &str) -> Option<NaiveDate> {
    if a.len() == 4 {
        return NaiveDate::from_ymd_opt(a.parse().ok()?, b.parse().ok()?, c.parse().ok()?);
    }
    let year = expand_year(c)?;
    let first: u32 = a.parse().ok()?;
    let second: u32 = b.parse().ok()?;
    NaiveDate::from_ymd_opt(year, second, first)
        .or_else(|| NaiveDate::from_ymd_opt(year, first, second))
}

/// 数値2要素の期間（`MM/YYYY`または`YYYY-MM`）
fn parse_month_period(a: &str, b: &str) -> Option<NaiveDate> {
    let (month, year) = if a.len() == 4 { (b, a) } else { (a, b) };
    if year.len() != 4 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// 月名を含む日付（`15 de março de 2024`、`mar/2024`、`March 15, 2024`）
fn parse_with_month_name(tokens: &[&str]) -> Option<NaiveDate> {
    let mut month = None;
    let mut numbers: Vec<&str> = Vec::new();

    for token in tokens {
        if token.chars().all(|c| c.is_ascii_digit()) {
            numbers.push(token);
        } else if let Some(m) = month_from_name(token) {
            if month.replace(m).is_some() {
                return None;
            }
        } else if !token.eq_ignore_ascii_case("de") && !token.eq_ignore_ascii_case("of") {
            return None;
        }
    }

    let month = month?;
    match numbers.as_slice() {
        [year] => NaiveDate::from_ymd_opt(expand_year(year)?, month, 1),
        [first, second] => {
            // 4桁の方を年とみなす
            let (day, year) = if second.len() == 4 || first.len() <= 2 {
                (first, second)
            } else {
                (second, first)
            };
            NaiveDate::from_ymd_opt(expand_year(year)?, month, day.parse().ok()?)
        }
        _ => None,
    }
}

/// 月名（ポルトガル語・英語、略称可）を月番号に変換
fn month_from_name(token: &str) -> Option<u32> {
    let lower = token.to_lowercase();
    let prefix: String = lower.chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "fev" | "feb" => 2,
        "mar" => 3,
        "abr" | "apr" => 4,
        "mai" | "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "ago" | "aug" => 8,
        "set" | "sep" => 9,
        "out" | "oct" => 10,
        "nov" => 11,
        "dez" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// 2桁の年を4桁に展開する（00-69 → 2000年代、70-99 → 1900年代）
fn expand_year(token: &str) -> Option<i32> {
    let year: i32 = token.parse().ok()?;
    match token.len() {
        4 => Some(year),
        1 | 2 if year < 70 => Some(2000 + year),
        1 | 2 => Some(1900 + year),
        _ => None,
    }
}
