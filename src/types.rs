//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use std::collections::BTreeMap;

use chrono::NaiveDate;

/// セルの値
///
/// スプレッドシート側での暗黙の数値変換を避けるため、すべての値は
/// 読み込み時点でテキストとして保持されます。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CellValue {
    /// テキスト
    Text(String),

    /// 空セル
    #[default]
    Empty,
}

impl CellValue {
    /// 空白のみのテキストも空セルとして扱って生成する
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text)
        }
    }

    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// 値を文字列として取得（空セルは空文字列）
    pub fn as_str(&self) -> &str {
        match self {
            CellValue::Text(s) => s,
            CellValue::Empty => "",
        }
    }
}

/// スプレッドシートの1行
///
/// 列名はトリム済みで、重複列は`Dataset`構築時に先頭の値だけが残されています。
/// 列名による取得は常に単一の値に解決されます。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRow {
    cells: Vec<(String, CellValue)>,
}

impl RawRow {
    /// 列名で値を取得する（存在しない列は空セル）
    ///
    /// 引数の列名もトリムしてから照合します。
    pub fn get(&self, column: &str) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        let column = column.trim();
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .unwrap_or(&EMPTY)
    }

    /// 列名と値のペアを列順に返す
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// すべてのセルが空かどうか
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, value)| value.is_empty())
    }
}

/// 読み込み済みの表データ
///
/// ヘッダー行（トリム・重複除去済み）とデータ行からなります。
/// すべてのセルが空の行は読み込み時に除外されます。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<RawRow>,
}

impl Dataset {
    /// ヘッダーとセル値の行から`Dataset`を構築する
    ///
    /// # 処理内容
    ///
    /// 1. ヘッダー名の前後の空白を除去する（`"Valor Total "` → `"Valor Total"`）
    /// 2. 空のヘッダーの列は無視する
    /// 3. トリム後に重複する列名は、最初の列だけを採用する
    /// 4. すべてのセルが空の行を除外する
    ///
    /// 行の長さがヘッダーより短い場合、不足分は空セルとして扱います。
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        // (列インデックス, トリム済み列名) のうち採用する列
        let mut columns: Vec<(usize, String)> = Vec::with_capacity(headers.len());
        for (index, header) in headers.iter().enumerate() {
            let name = header.trim();
            if name.is_empty() {
                continue;
            }
            if columns.iter().any(|(_, existing)| existing == name) {
                tracing::debug!(column = name, index, "ignoring duplicated column");
                continue;
            }
            columns.push((index, name.to_string()));
        }

        let rows = rows
            .into_iter()
            .map(|mut values| {
                let cells = columns
                    .iter()
                    .map(|(index, name)| {
                        let value = values
                            .get_mut(*index)
                            .map(std::mem::take)
                            .unwrap_or_default();
                        (name.clone(), value)
                    })
                    .collect();
                RawRow { cells }
            })
            .filter(|row| !row.is_blank())
            .collect();

        Self {
            headers: columns.into_iter().map(|(_, name)| name).collect(),
            rows,
        }
    }

    /// 文字列のレコードから構築する（空白のみのセルは空セルになる）
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use darfbatch::Dataset;
    ///
    /// let dataset = Dataset::from_records(
    ///     vec!["Nome/Telefone".to_string(), "Valor Total ".to_string()],
    ///     vec![vec!["Fulano".to_string(), "1.234,56".to_string()]],
    /// );
    /// assert_eq!(dataset.headers(), ["Nome/Telefone", "Valor Total"]);
    /// assert_eq!(dataset.rows()[0].get("Valor Total").as_str(), "1.234,56");
    /// ```
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let rows = records
            .into_iter()
            .map(|record| record.into_iter().map(CellValue::from_text).collect())
            .collect();
        Self::new(headers, rows)
    }

    /// トリム・重複除去済みのヘッダー
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// データ行
    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    /// データ行数
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// データ行が1つもないか
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 正規化済みのフィールド値
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// トリム済みテキスト
    Text(String),

    /// 正規化済み小数（ロケール非依存）
    Decimal(f64),

    /// 日付（解析できなかった場合は`None`）
    Date(Option<NaiveDate>),

    /// 整形済みの納税者番号（CPF/CNPJ）
    Identifier(String),
}

/// 1行分の正規化済みレコード
///
/// スキーマのすべてのテンプレートフィールド名に値が存在します
/// （値が得られない場合も空文字列・0・`Date(None)`が入ります）。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedRecord {
    values: BTreeMap<String, FieldValue>,
}

impl NormalizedRecord {
    pub(crate) fn insert(&mut self, target_field: &str, value: FieldValue) {
        self.values.insert(target_field.to_string(), value);
    }

    /// テンプレートフィールド名で値を取得
    pub fn get(&self, target_field: &str) -> Option<&FieldValue> {
        self.values.get(target_field)
    }

    /// フィールド名と値のペア（フィールド名順）
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// フィールド数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// フィールドが1つもないか
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 1行から生成された出力ドキュメント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    /// 1始まりの行番号
    pub row_number: usize,
    /// 出力ファイル名
    pub name: String,
    /// PDFのバイト列
    pub bytes: Vec<u8>,
}
