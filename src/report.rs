//! Batch Report Module
//!
//! バッチ実行の結果（生成した出力、失敗した行、キャンセルの有無）を集計する。

use serde::Serialize;

/// 失敗した行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1始まりの行番号
    pub row_number: usize,
    /// エラーメッセージ
    pub message: String,
}

/// バッチ実行の結果
///
/// JSONとして書き出せます。
///
/// ```rust
/// use darfbatch::BatchReport;
///
/// let report = BatchReport::new(3);
/// let json = serde_json::to_string(&report).unwrap();
/// assert!(json.contains("\"total_rows\":3"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// 入力の行数
    pub total_rows: usize,
    /// 生成した出力名（行の順序）
    pub generated: Vec<String>,
    /// 失敗した行
    pub failed: Vec<RowFailure>,
    /// キャンセルされたか
    pub cancelled: bool,
}

impl BatchReport {
    pub fn new(total_rows: usize) -> Self {
        Self {
            total_rows,
            ..Self::default()
        }
    }

    /// すべての行が出力されたか
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed.is_empty() && self.generated.len() == self.total_rows
    }

    pub(crate) fn record_success(&mut self, name: String) {
        self.generated.push(name);
    }

    pub(crate) fn record_failure(&mut self, row_number: usize, message: String) {
        tracing::warn!(row = row_number, error = %message, "row failed");
        self.failed.push(RowFailure {
            row_number,
            message,
        });
    }
}
