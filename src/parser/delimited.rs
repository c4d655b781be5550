//! Delimited Text Parser
//!
//! CSVなどの区切り文字形式のデータを`csv`クレートで読み込む。

use csv::ReaderBuilder;

use crate::error::DarfError;
use crate::types::CellValue;

/// 既定の区切り文字（pt-BRのExcelが出力するCSV）
pub(crate) const DEFAULT_DELIMITER: u8 = b';';
/// ヘッダー行に`;`がない場合の区切り文字
const FALLBACK_DELIMITER: u8 = b',';

/// 区切り文字形式のバイト列を読み込み、ヘッダー行とデータ行に分ける
///
/// # 引数
///
/// * `bytes` - 入力データ（UTF-8、BOM付きUTF-8、またはLatin-1）
/// * `delimiter` - 区切り文字。`None`の場合はヘッダー行から判別する
///
/// # 戻り値
///
/// * `Ok((headers, rows))` - ヘッダー名とセル値
/// * `Err(DarfError::Csv)` - CSVとして解析できない場合
pub(crate) fn read_delimited(
    bytes: Vec<u8>,
    delimiter: Option<u8>,
) -> Result<(Vec<String>, Vec<Vec<CellValue>>), DarfError> {
    let text = decode(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(text));

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(CellValue::from_text).collect());
    }

    tracing::debug!(delimiter = %(delimiter as char), rows = rows.len(), "read delimited text");
    Ok((headers, rows))
}

/// ヘッダー行から区切り文字を判別する
fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    if header.contains(DEFAULT_DELIMITER as char) {
        DEFAULT_DELIMITER
    } else {
        FALLBACK_DELIMITER
    }
}

/// UTF-8として解釈できなければLatin-1として復号する
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicolon_is_default() {
        let data = "Nome/Telefone;Valor Total \nFulano;1.234,56\n";
        let (headers, rows) = read_delimited(data.as_bytes().to_vec(), None).unwrap();
        assert_eq!(headers, ["Nome/Telefone", "Valor Total "]);
        assert_eq!(rows[0][1], CellValue::Text("1.234,56".to_string()));
    }

    #[test]
    fn test_comma_fallback() {
        let data = "Nome,Total\nFulano,\"1,234.56\"\n";
        let (headers, rows) = read_delimited(data.as_bytes().to_vec(), None).unwrap();
        assert_eq!(headers, ["Nome", "Total"]);
        assert_eq!(rows[0][1], CellValue::Text("1,234.56".to_string()));
    }

    #[test]
    fn test_explicit_delimiter_and_short_rows() {
        let data = "A\tB\tC\nx\n";
        let (headers, rows) = read_delimited(data.as_bytes().to_vec(), Some(b'\t')).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(rows[0], vec![CellValue::Text("x".to_string())]);
    }

    #[test]
    fn test_bom_and_latin1() {
        let mut data = vec![0xEF, 0xBB, 0xBF];
        data.extend_from_slice("Período;x\n1;2\n".as_bytes());
        let (headers, _) = read_delimited(data, None).unwrap();
        assert_eq!(headers[0], "Período");

        let latin1: Vec<u8> = "Período;x\n1;2\n".chars().map(|c| c as u8).collect();
        let (headers, _) = read_delimited(latin1, None).unwrap();
        assert_eq!(headers[0], "Período");
    }
}
