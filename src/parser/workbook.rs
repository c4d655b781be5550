//! Workbook Parser
//!
//! calamineを使用したスプレッドシート（XLSX/XLS/ODS）の読み込み。
//! すべてのセル値は読み込み時点でテキストに変換されます。

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};
use std::io::{Read, Seek};

use crate::api::SheetSelector;
use crate::error::DarfError;
use crate::format::from_excel_serial;
use crate::types::CellValue;

/// 1日の秒数
const SECONDS_PER_DAY: f64 = 86_400.0;

/// ワークブックパーサー
///
/// calamineのラッパーとして、シートの選択とセル値のテキスト化を提供します。
pub(crate) struct WorkbookParser<R: Read + Seek> {
    workbook: Sheets<R>,
}

impl<R: Read + Seek + Clone> WorkbookParser<R> {
    /// ワークブックを開く
    ///
    /// 形式（XLSX/XLSM/XLSB/XLS/ODS）は内容から自動判別されます。
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookParser)` - ワークブックの読み込みに成功した場合
    /// * `Err(DarfError::Spreadsheet)` - ワークブックとして解析できない場合
    pub fn open(reader: R) -> Result<Self, DarfError> {
        let workbook = open_workbook_auto_from_rs(reader)?;
        Ok(Self { workbook })
    }
}

impl<R: Read + Seek> WorkbookParser<R> {
    /// すべてのシート名を取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    /// シート選択方式に基づいてシート名を解決
    ///
    /// # 戻り値
    ///
    /// * `Ok(String)` - 選択されたシート名
    /// * `Err(DarfError::Config)` - シートが見つからない、またはインデックスが範囲外の場合
    pub fn select_sheet(&self, selector: &SheetSelector) -> Result<String, DarfError> {
        let all_sheet_names = self.sheet_names();

        match selector {
            SheetSelector::Index(index) => {
                all_sheet_names.get(*index).cloned().ok_or_else(|| {
                    DarfError::Config(format!(
                        "Sheet index {} is out of range (total: {})",
                        index,
                        all_sheet_names.len()
                    ))
                })
            }

            SheetSelector::Name(name) => {
                if !all_sheet_names.contains(name) {
                    return Err(DarfError::Config(format!("Sheet '{}' not found", name)));
                }
                Ok(name.clone())
            }
        }
    }

    /// シートを読み込み、ヘッダー行とデータ行に分ける
    ///
    /// 使用範囲の最初の行をヘッダーとして扱います。
    ///
    /// # 戻り値
    ///
    /// * `Ok((headers, rows))` - ヘッダー名とテキスト化済みのセル値
    /// * `Err(DarfError::Spreadsheet)` - シートの読み込みに失敗した場合
    pub fn read_sheet(
        &mut self,
        sheet_name: &str,
    ) -> Result<(Vec<String>, Vec<Vec<CellValue>>), DarfError> {
        let range = self.workbook.worksheet_range(sheet_name)?;

        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|row| {
                row.iter()
                    .map(|cell| cell_to_text(cell).as_str().to_string())
                    .collect()
            })
            .unwrap_or_default();
        let rows: Vec<Vec<CellValue>> = rows
            .map(|row| row.iter().map(cell_to_text).collect())
            .collect();

        tracing::debug!(sheet = sheet_name, rows = rows.len(), "read worksheet");
        Ok((headers, rows))
    }
}

/// calamineのセル値をテキストに変換
///
/// * 整数・小数: 最短の往復可能な10進表記（`1234`、`1234.5`）
/// * 真偽値: `TRUE` / `FALSE`
/// * 日付: `YYYY-MM-DD`（時刻があれば`YYYY-MM-DDTHH:MM:SS`）
/// * エラー: 空セル
pub(crate) fn cell_to_text(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Text(i.to_string()),
        Data::Float(f) => CellValue::Text(f.to_string()),
        Data::String(s) => CellValue::from_text(s.clone()),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => serial_to_iso(dt.as_f64())
            .map(CellValue::Text)
            .unwrap_or(CellValue::Empty),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from_text(s.clone()),
        Data::Error(e) => {
            tracing::debug!(error = ?e, "error cell treated as empty");
            CellValue::Empty
        }
        _ => CellValue::Empty,
    }
}

/// シリアル値をISO形式の日付（時刻）文字列に変換
fn serial_to_iso(serial: f64) -> Option<String> {
    let date = from_excel_serial(serial.trunc())?;
    let seconds = (serial.fract() * SECONDS_PER_DAY).round() as u32;
    if seconds == 0 || seconds >= 86_400 {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    Some(format!(
        "{}T{:02}:{:02}:{:02}",
        date.format("%Y-%m-%d"),
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    ))
}
