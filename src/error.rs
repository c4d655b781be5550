//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。
//!
//! セルの値の解析失敗（数値・日付）はエラーにならず、各フォーマッターの内部で
//! ゼロまたは空文字列に置き換えられます。ここに定義されるのは、バッチ全体を
//! 止める致命的エラーと、1行だけに影響する行エラー（`Row`）です。

use std::path::PathBuf;

use thiserror::Error;

/// darfbatchクレート全体で使用するエラー型
///
/// # エラーの種類
///
/// - `MissingColumns`: 必須列がスプレッドシートに存在しない（バッチ全体が致命的）
/// - `TemplateNotFound` / `TemplateParse`: テンプレートPDFが読めない（バッチ全体が致命的）
/// - `Row`: 1行の処理に失敗した（失敗ポリシーに従って処理される）
/// - その他: I/O、スプレッドシート、CSV、PDF、ZIP、設定、セキュリティ制限
///
/// # 使用例
///
/// ```rust,no_run
/// use darfbatch::{DarfError, TemplateDocument};
///
/// match TemplateDocument::open("darf.pdf") {
///     Err(DarfError::TemplateNotFound { path }) => {
///         eprintln!("テンプレートが見つかりません: {}", path.display());
///     }
///     Err(e) => eprintln!("{}", e),
///     Ok(template) => println!("{} fields", template.fields().len()),
/// }
/// ```
#[derive(Error, Debug)]
pub enum DarfError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// スプレッドシートの解析中に発生したエラー（calamine由来）
    #[error("Failed to parse spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// CSVの解析中に発生したエラー
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// PDFの読み書き中に発生したエラー（lopdf由来）
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// JSON（フィールドスキーマ、レポート）の読み書きエラー
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZIPアーカイブの書き込みエラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// 必須列が見つからないエラー
    ///
    /// 行の処理を開始する前に検出され、出力は1件も生成されません。
    /// 実運用で最も多い失敗はヘッダー名の不一致なので、欠けている列名を
    /// すべてメッセージに含めます。
    ///
    /// # 例
    ///
    /// ```rust
    /// use darfbatch::DarfError;
    ///
    /// let error = DarfError::MissingColumns {
    ///     columns: vec!["Valor Total".to_string()],
    /// };
    /// assert_eq!(
    ///     error.to_string(),
    ///     "Missing required columns: 'Valor Total'"
    /// );
    /// ```
    #[error("Missing required columns: {}", quote_list(.columns))]
    MissingColumns {
        /// 見つからなかった列名（スキーマの順序）
        columns: Vec<String>,
    },

    /// テンプレートファイルが存在しない
    #[error("Template document not found: {}", .path.display())]
    TemplateNotFound {
        /// 指定されたパス
        path: PathBuf,
    },

    /// テンプレートがPDFとして解析できない、またはフォームを持たない
    #[error("Failed to parse template document: {0}")]
    TemplateParse(String),

    /// 1行分の処理に失敗したエラー
    ///
    /// `FailurePolicy::AbortBatch`の場合にのみ呼び出し側へ返されます。
    /// `FailurePolicy::SkipRow`の場合は`BatchReport`に記録されます。
    #[error("Row {row} failed: {message}")]
    Row {
        /// 1始まりの行番号
        row: usize,
        /// エラーの詳細
        message: String,
    },

    /// 設定の検証に失敗したエラー
    ///
    /// `BatchBuilder::build()`時に設定を検証し、無効な設定が検出された場合に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// 入力ファイルのサイズ上限超過や、出力名のパストラバーサルなど。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

fn quote_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("'{}'", c))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<zip::result::ZipError> for DarfError {
    fn from(err: zip::result::ZipError) -> Self {
        DarfError::Zip(err.to_string())
    }
}

impl DarfError {
    /// バッチ全体を中断すべきエラーかどうか
    ///
    /// `Row`以外はすべてバッチ全体に対して致命的です。
    pub fn is_batch_fatal(&self) -> bool {
        !matches!(self, DarfError::Row { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: DarfError = io_err.into();

        match error {
            DarfError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
                assert_eq!(e.to_string(), "File not found");
            }
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_spreadsheet_error_display() {
        let error: DarfError = calamine::Error::Msg("Corrupted file").into();
        let error_msg = error.to_string();
        assert!(error_msg.contains("Failed to parse spreadsheet"));
        assert!(error_msg.contains("Corrupted file"));
    }

    #[test]
    fn test_missing_columns_lists_every_column() {
        let error = DarfError::MissingColumns {
            columns: vec!["CNPJ".to_string(), "Valor Total".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Missing required columns: 'CNPJ', 'Valor Total'"
        );
    }

    #[test]
    fn test_template_not_found_names_path() {
        let error = DarfError::TemplateNotFound {
            path: PathBuf::from("modelos/darf.pdf"),
        };
        assert!(error.to_string().contains("modelos/darf.pdf"));
    }

    #[test]
    fn test_row_error_display() {
        let error = DarfError::Row {
            row: 3,
            message: "broken widget".to_string(),
        };
        assert_eq!(error.to_string(), "Row 3 failed: broken widget");
        assert!(!error.is_batch_fatal());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(DarfError::Config("x".to_string()).is_batch_fatal());
        assert!(DarfError::MissingColumns { columns: vec![] }.is_batch_fatal());
        assert!(DarfError::TemplateParse("bad".to_string()).is_batch_fatal());
    }

    #[test]
    fn test_error_conversion_with_question_mark() {
        fn io_operation() -> Result<(), DarfError> {
            let _file = std::fs::File::open("nonexistent_template.pdf")?;
            Ok(())
        }

        match io_operation() {
            Err(DarfError::Io(_)) => {}
            _ => panic!("Expected Io error from ? operator"),
        }
    }

    #[test]
    fn test_zip_error_conversion() {
        let error: DarfError = zip::result::ZipError::FileNotFound.into();
        assert!(matches!(error, DarfError::Zip(_)));
        assert!(error.to_string().starts_with("ZIP archive error"));
    }
}
