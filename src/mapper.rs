//! Row Mapper Module
//!
//! スプレッドシートの1行をフィールドスキーマに照らして正規化済みレコードに変換し、
//! さらにテンプレートへ書き込む値の対応表を組み立てるモジュール。

use std::collections::{BTreeMap, BTreeSet};

use crate::api::NumericPolicy;
use crate::error::DarfError;
use crate::format::{parse_flexible_date, parse_integer_code, parse_number};
use crate::formatter::{format_identifier, ValueFormatter};
use crate::schema::{FieldKind, FieldSchema};
use crate::template::FieldValues;
use crate::types::{FieldValue, NormalizedRecord, RawRow};

/// 行マッパー
pub(crate) struct RowMapper<'a> {
    schema: &'a FieldSchema,
    formatter: ValueFormatter,
}

impl<'a> RowMapper<'a> {
    pub fn new(schema: &'a FieldSchema) -> Self {
        Self {
            schema,
            formatter: ValueFormatter::new(),
        }
    }

    /// 必須列がすべて揃っているか検証する
    ///
    /// 行の処理を始める前に1回だけ呼び出します。ヘッダーは照合前にトリムされます。
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - すべての必須列が存在する場合
    /// * `Err(DarfError::MissingColumns)` - 欠けている列名をスキーマ順にすべて含む
    pub fn validate_columns(&self, headers: &[String]) -> Result<(), DarfError> {
        let available: BTreeSet<&str> = headers.iter().map(|h| h.trim()).collect();

        let mut missing: Vec<String> = Vec::new();
        for column in self.schema.required_columns() {
            if !available.contains(column) && !missing.iter().any(|m| m == column) {
                missing.push(column.to_string());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DarfError::MissingColumns { columns: missing })
        }
    }

    /// 1行を正規化済みレコードに変換する
    ///
    /// セル値の解析失敗はエラーにならず、金額は0、日付は`None`になります。
    pub fn map_row(&self, row: &RawRow) -> NormalizedRecord {
        let mut record = NormalizedRecord::default();

        for mapping in self.schema.mappings() {
            let raw = row.get(&mapping.source_column).as_str().trim();
            let value = match mapping.kind {
                FieldKind::Text => FieldValue::Text(raw.to_string()),
                FieldKind::Amount => FieldValue::Decimal(parse_number(raw)),
                FieldKind::Code => FieldValue::Text(parse_integer_code(raw)),
                FieldKind::Date => FieldValue::Date(parse_flexible_date(raw)),
                FieldKind::Identifier => FieldValue::Identifier(format_identifier(raw)),
            };
            tracing::trace!(field = %mapping.target_field, ?value, "mapped field");
            record.insert(&mapping.target_field, value);
        }

        record
    }

    /// 正規化済みレコードをテンプレートへ書き込む値に変換する
    ///
    /// # 引数
    ///
    /// * `record` - 正規化済みレコード
    /// * `default_policy` - 金額フィールドの既定の表示方針
    /// * `overrides` - フィールド名ごとの表示方針
    pub fn field_values(
        &self,
        record: &NormalizedRecord,
        default_policy: NumericPolicy,
        overrides: &BTreeMap<String, NumericPolicy>,
    ) -> FieldValues {
        record
            .iter()
            .map(|(field, value)| {
                let policy = overrides.get(field).copied().unwrap_or(default_policy);
                (field.to_string(), self.formatter.render(value, policy))
            })
            .collect()
    }
}
