//! Parser Module
//!
//! スプレッドシート（calamine）と区切り文字形式のテキスト（csv）から
//! `Dataset`を読み込むモジュール。

mod delimited;
mod workbook;

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::api::SheetSelector;
use crate::error::DarfError;
use crate::security::{read_limited, SecurityConfig};
use crate::types::Dataset;

pub(crate) use workbook::WorkbookParser;

/// 入力データの形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// スプレッドシート（XLSX/XLSM/XLSB/XLS/ODS、内容から自動判別）
    Spreadsheet,
    /// 区切り文字形式のテキスト（CSV）
    Delimited,
}

impl InputFormat {
    /// ファイルの拡張子から形式を推定する（不明な拡張子はスプレッドシート）
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") | Some("txt") | Some("tsv") => InputFormat::Delimited,
            _ => InputFormat::Spreadsheet,
        }
    }
}

/// データ読み込みオプション
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// 読み込むシート（スプレッドシートのみ、デフォルト: 最初のシート）
    pub sheet: SheetSelector,
    /// 区切り文字（区切り文字形式のみ、`None`ならヘッダー行から判別）
    pub delimiter: Option<u8>,
    /// セキュリティ設定
    pub security: SecurityConfig,
}

impl Dataset {
    /// ファイルからデータを読み込む（デフォルトのオプション）
    ///
    /// 形式は拡張子から判別します（`.csv` / `.txt` / `.tsv`は区切り文字形式、
    /// それ以外はスプレッドシート）。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use darfbatch::Dataset;
    ///
    /// let dataset = Dataset::open("planilha_darf.xlsx")?;
    /// println!("{} rows, columns: {:?}", dataset.len(), dataset.headers());
    /// # Ok::<(), darfbatch::DarfError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DarfError> {
        Self::open_with(path, &LoadOptions::default())
    }

    /// オプションを指定してファイルからデータを読み込む
    pub fn open_with<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self, DarfError> {
        let path = path.as_ref();
        let format = InputFormat::from_path(path);
        tracing::debug!(path = %path.display(), ?format, "opening dataset");
        Self::from_reader(File::open(path)?, format, options)
    }

    /// 任意のリーダーからデータを読み込む
    ///
    /// # 引数
    ///
    /// * `reader` - 入力データ
    /// * `format` - 入力データの形式
    /// * `options` - シート、区切り文字、セキュリティ設定
    ///
    /// # 戻り値
    ///
    /// * `Ok(Dataset)` - ヘッダーをトリムし、重複列と空行を除いたデータ
    /// * `Err(DarfError::SecurityViolation)` - サイズまたは行数が上限を超えた場合
    /// * `Err(DarfError::Spreadsheet)` / `Err(DarfError::Csv)` - 解析に失敗した場合
    /// * `Err(DarfError::Config)` - 指定したシートが存在しない場合
    pub fn from_reader<R: Read>(
        reader: R,
        format: InputFormat,
        options: &LoadOptions,
    ) -> Result<Self, DarfError> {
        let bytes = read_limited(reader, options.security.max_input_file_size)?;

        let (headers, rows) = match format {
            InputFormat::Spreadsheet => {
                let mut parser = WorkbookParser::open(Cursor::new(bytes))?;
                let sheet_name = parser.select_sheet(&options.sheet)?;
                parser.read_sheet(&sheet_name)?
            }
            InputFormat::Delimited => delimited::read_delimited(bytes, options.delimiter)?,
        };
        options.security.check_rows(rows.len())?;

        let dataset = Dataset::new(headers, rows);
        tracing::info!(
            rows = dataset.len(),
            columns = dataset.headers().len(),
            "dataset loaded"
        );
        Ok(dataset)
    }
}
