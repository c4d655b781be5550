//! Field Schema Module
//!
//! スプレッドシートの列名とテンプレートのフィールド名の対応（フィールドスキーマ）を
//! 定義するモジュール。スキーマはバッチ全体で不変で、文書のフォーム契約によって
//! 決まります。JSONからの読み込みにも対応しています。

use std::collections::BTreeSet;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::DarfError;

/// フィールドの種類（正規化の方法を決める）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// トリム済みテキストをそのまま渡す
    Text,
    /// 日付として解析し、`DD/MM/YYYY`で表示する
    Date,
    /// CPF（11桁）/CNPJ（14桁）として整形する
    Identifier,
    /// 数値の整数部分（例: 収入コード）
    Code,
    /// 金額
    Amount,
}

fn default_required() -> bool {
    true
}

/// 列名とフィールド名の対応1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// スプレッドシートの列名（照合時にトリムされる）
    pub source_column: String,
    /// テンプレートのフィールド名
    pub target_field: String,
    /// フィールドの種類
    pub kind: FieldKind,
    /// 列が必須かどうか（デフォルト: `true`）
    #[serde(default = "default_required")]
    pub required: bool,
}

impl FieldMapping {
    /// 必須の対応を生成
    pub fn new(source_column: &str, target_field: &str, kind: FieldKind) -> Self {
        Self {
            source_column: source_column.to_string(),
            target_field: target_field.to_string(),
            kind,
            required: true,
        }
    }

    /// 任意列として設定する（列がなくても空の値で処理を続ける）
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// フィールドスキーマ（対応の順序付きリスト）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema {
    mappings: Vec<FieldMapping>,
}

impl FieldSchema {
    /// 対応のリストからスキーマを生成
    pub fn new(mappings: Vec<FieldMapping>) -> Self {
        Self { mappings }
    }

    /// DARFの標準スキーマ
    ///
    /// | 列名 | フィールド | 種類 |
    /// | --- | --- | --- |
    /// | `Nome/Telefone` | `Nome` | Text |
    /// | `Período de Apuração` | `Apuração` | Date |
    /// | `CNPJ` | `NI` | Identifier |
    /// | `Código da Receita` | `Receita` | Code |
    /// | `Data de vencimento` | `Vencimento` | Date |
    /// | `Valor do principal` | `Principal` | Amount |
    /// | `Valor dos juros` | `Juros` | Amount |
    /// | `Valor Total` | `Total` | Amount |
    pub fn darf() -> Self {
        Self::new(vec![
            FieldMapping::new("Nome/Telefone", "Nome", FieldKind::Text),
            FieldMapping::new("Período de Apuração", "Apuração", FieldKind::Date),
            FieldMapping::new("CNPJ", "NI", FieldKind::Identifier),
            FieldMapping::new("Código da Receita", "Receita", FieldKind::Code),
            FieldMapping::new("Data de vencimento", "Vencimento", FieldKind::Date),
            FieldMapping::new("Valor do principal", "Principal", FieldKind::Amount),
            FieldMapping::new("Valor dos juros", "Juros", FieldKind::Amount),
            FieldMapping::new("Valor Total", "Total", FieldKind::Amount),
        ])
    }

    /// JSON配列からスキーマを読み込む
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use darfbatch::{FieldKind, FieldSchema};
    ///
    /// let json = r#"[
    ///     {"source_column": "Contribuinte", "target_field": "Nome", "kind": "text"},
    ///     {"source_column": "Total", "target_field": "Total", "kind": "amount", "required": false}
    /// ]"#;
    /// let schema = FieldSchema::from_json_reader(json.as_bytes()).unwrap();
    /// assert_eq!(schema.mappings()[1].kind, FieldKind::Amount);
    /// assert!(!schema.mappings()[1].required);
    /// ```
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, DarfError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// 対応のリスト
    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    /// 必須列名（トリム済み、スキーマ順）
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.mappings
            .iter()
            .filter(|m| m.required)
            .map(|m| m.source_column.trim())
    }

    /// スキーマの整合性を検証する
    ///
    /// * 対応が1件以上あること
    /// * 列名・フィールド名が空でないこと
    /// * フィールド名が重複しないこと
    pub(crate) fn validate(&self) -> Result<(), DarfError> {
        if self.mappings.is_empty() {
            return Err(DarfError::Config("Field schema is empty".to_string()));
        }

        let mut targets = BTreeSet::new();
        for mapping in &self.mappings {
            if mapping.source_column.trim().is_empty() {
                return Err(DarfError::Config(format!(
                    "Empty source column for field '{}'",
                    mapping.target_field
                )));
            }
            if mapping.target_field.is_empty() {
                return Err(DarfError::Config(format!(
                    "Empty target field for column '{}'",
                    mapping.source_column
                )));
            }
            if !targets.insert(mapping.target_field.as_str()) {
                return Err(DarfError::Config(format!(
                    "Duplicated target field: '{}'",
                    mapping.target_field
                )));
            }
        }
        Ok(())
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::darf()
    }
}
