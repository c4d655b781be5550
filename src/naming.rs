//! Output Naming Module
//!
//! 出力ファイル名を決定的かつファイルシステム上で安全な形に組み立てるモジュール。

use std::sync::OnceLock;

use regex::Regex;

use crate::error::DarfError;
use crate::formatter::format_date;
use crate::types::RawRow;

/// 出力名に含める名前部分の最大バイト数
///
/// 多くのファイルシステムはファイル名を255バイトに制限しています。
pub const MAX_NAME_BYTES: usize = 100;

/// 出力ファイル名の組み立て方
///
/// 出力名は`<prefix>_<行番号>_<名前>_<期間>.<拡張子>`です。
///
/// * 行番号は1始まり
/// * 名前は`name_column`の値で、単語文字以外の連続を1つの`_`に置き換え、
///   UTF-8で[`MAX_NAME_BYTES`]バイトまでに切り詰める（値が空なら`fallback_name`）
/// * 期間は`period_column`を`DD/MM/YYYY`に整形し、`/`を`-`に置き換えたもの
///   （解析できなければ空）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    /// ファイル名の接頭辞（デフォルト: `DARF`）
    pub prefix: String,
    /// 名前に使う列（デフォルト: `Nome/Telefone`）
    pub name_column: String,
    /// 期間に使う列（デフォルト: `Período de Apuração`）
    pub period_column: String,
    /// 名前が空の場合に使う値（デフォルト: `Contribuinte`）
    pub fallback_name: String,
    /// 拡張子（デフォルト: `pdf`）
    pub extension: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            prefix: "DARF".to_string(),
            name_column: "Nome/Telefone".to_string(),
            period_column: "Período de Apuração".to_string(),
            fallback_name: "Contribuinte".to_string(),
            extension: "pdf".to_string(),
        }
    }
}

impl NamingPolicy {
    /// 1行分の出力ファイル名を組み立てる
    ///
    /// # 引数
    ///
    /// * `row_index` - 0始まりの行インデックス
    /// * `row` - 入力行
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use darfbatch::{Dataset, NamingPolicy};
    ///
    /// let dataset = Dataset::from_records(
    ///     vec!["Nome/Telefone".to_string(), "Período de Apuração".to_string()],
    ///     vec![vec!["José da Silva / (11) 9999".to_string(), "2024-01-31".to_string()]],
    /// );
    /// let name = NamingPolicy::default().output_name(0, &dataset.rows()[0]);
    /// assert_eq!(name, "DARF_1_José_da_Silva_11_9999_31-01-2024.pdf");
    /// ```
    pub fn output_name(&self, row_index: usize, row: &RawRow) -> String {
        let raw_name = row.get(&self.name_column).as_str().trim();
        let name = if raw_name.is_empty() {
            sanitize(&self.fallback_name)
        } else {
            sanitize(raw_name)
        };
        let name = truncate_to_bytes(&name, MAX_NAME_BYTES);
        let period = format_date(Some(row.get(&self.period_column).as_str())).replace('/', "-");

        format!(
            "{}_{}_{}_{}.{}",
            self.prefix,
            row_index + 1,
            name,
            period,
            self.extension
        )
    }

    /// 設定を検証する
    pub(crate) fn validate(&self) -> Result<(), DarfError> {
        if self.prefix.is_empty() {
            return Err(DarfError::Config("File prefix must not be empty".to_string()));
        }
        for (label, value) in [
            ("prefix", &self.prefix),
            ("fallback name", &self.fallback_name),
            ("extension", &self.extension),
        ] {
            if value.contains(['/', '\\']) || value.contains("..") {
                return Err(DarfError::Config(format!(
                    "Invalid {} '{}': path components are not allowed",
                    label, value
                )));
            }
        }
        if self.extension.is_empty() {
            return Err(DarfError::Config("File extension must not be empty".to_string()));
        }
        Ok(())
    }
}

/// 単語文字（Unicode）以外の連続を1つの`_`に置き換える
pub(crate) fn sanitize(raw: &str) -> String {
    let raw = raw.trim();
    match non_word() {
        Some(re) => re.replace_all(raw, "_").into_owned(),
        None => raw.to_string(),
    }
}

/// 文字の境界を保ったまま`max_bytes`バイト以下に切り詰める
fn truncate_to_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let end = text
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= max_bytes)
        .last()
        .unwrap_or(0);
    &text[..end]
}

fn non_word() -> Option<&'static Regex> {
    static NON_WORD: OnceLock<Option<Regex>> = OnceLock::new();
    NON_WORD.get_or_init(|| Regex::new(r"\W+").ok()).as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dataset;

    fn row(name: &str, period: &str) -> RawRow {
        let dataset = Dataset::from_records(
            vec![
                "Nome/Telefone".to_string(),
                "Período de Apuração".to_string(),
                "Outro".to_string(),
            ],
            vec![vec![name.to_string(), period.to_string(), "x".to_string()]],
        );
        dataset.rows()[0].clone()
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Fulano de Tal / 11 99999-0000"), "Fulano_de_Tal_11_99999_0000");
        assert_eq!(sanitize("  Ação   Ltda.  "), "Ação_Ltda_");
        assert_eq!(sanitize("../../etc/passwd"), "_etc_passwd");
        assert_eq!(sanitize("***"), "_");
    }

    #[test]
    fn test_output_name() {
        let policy = NamingPolicy::default();
        assert_eq!(
            policy.output_name(0, &row("Fulano", "2024-01-31")),
            "DARF_1_Fulano_31-01-2024.pdf"
        );
        assert_eq!(
            policy.output_name(9, &row("Fulano", "31/01/2024")),
            "DARF_10_Fulano_31-01-2024.pdf"
        );
        // 前後の空白は区切りとして残さない
        assert_eq!(
            policy.output_name(0, &row("  Fulano  ", "2024-01-31")),
            "DARF_1_Fulano_31-01-2024.pdf"
        );
    }

    #[test]
    fn test_output_name_fallbacks() {
        let policy = NamingPolicy::default();
        // 名前が空なら既定の名前、期間が解析できなければ空
        assert_eq!(
            policy.output_name(1, &row("", "sem data")),
            "DARF_2_Contribuinte_.pdf"
        );
        assert_eq!(policy.output_name(2, &row("--", "")), "DARF_3___.pdf");
    }

    #[test]
    fn test_long_names_are_truncated() {
        let policy = NamingPolicy::default();

        let name = policy.output_name(1, &row(&"A".repeat(300), "2024-01-31"));
        assert_eq!(name, format!("DARF_2_{}_31-01-2024.pdf", "A".repeat(MAX_NAME_BYTES)));

        // 2バイト文字の途中では切らない
        let name = policy.output_name(0, &row(&"ç".repeat(300), ""));
        let part = name.trim_start_matches("DARF_1_").trim_end_matches("_.pdf");
        assert_eq!(part, "ç".repeat(MAX_NAME_BYTES / 2));
        assert!(name.len() < 255);
    }

    #[test]
    fn test_truncate_to_bytes() {
        assert_eq!(truncate_to_bytes("abc", 10), "abc");
        assert_eq!(truncate_to_bytes("abc", 2), "ab");
        assert_eq!(truncate_to_bytes("ção", 3), "ç");
        assert_eq!(truncate_to_bytes("ção", 1), "");
    }

    #[test]
    fn test_validate() {
        assert!(NamingPolicy::default().validate().is_ok());

        let empty = NamingPolicy {
            prefix: String::new(),
            ..NamingPolicy::default()
        };
        assert!(matches!(empty.validate(), Err(DarfError::Config(_))));

        let traversal = NamingPolicy {
            prefix: "../DARF".to_string(),
            ..NamingPolicy::default()
        };
        assert!(traversal.validate().is_err());
    }
}
