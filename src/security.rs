//! Security Module
//!
//! 入力ファイルのサイズ制限と、出力名のパストラバーサル対策を提供するモジュール。

use std::io::Read;

use crate::error::DarfError;

/// セキュリティ設定
///
/// 入力処理時のセキュリティ制限を定義します。
///
/// # 使用例
///
/// ```rust
/// use darfbatch::SecurityConfig;
///
/// let security = SecurityConfig {
///     max_input_file_size: 10 * 1024 * 1024,
///     ..SecurityConfig::default()
/// };
/// assert_eq!(security.max_rows, 1_000_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// 入力ファイル（スプレッドシート、テンプレート）の最大サイズ（バイト）
    /// デフォルト: 256MB (268_435_456 bytes)
    pub max_input_file_size: u64,
    /// 読み込むデータ行の最大数
    /// デフォルト: 1000000
    pub max_rows: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_input_file_size: 268_435_456, // 256MB
            max_rows: 1_000_000,
        }
    }
}

impl SecurityConfig {
    /// デフォルトのセキュリティ設定を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 行数が上限以内か検証する
    pub(crate) fn check_rows(&self, rows: usize) -> Result<(), DarfError> {
        if rows > self.max_rows {
            return Err(DarfError::SecurityViolation(format!(
                "Row count {} exceeds the limit of {}",
                rows, self.max_rows
            )));
        }
        Ok(())
    }
}

/// サイズ上限付きでリーダーを最後まで読み込む
///
/// # 戻り値
///
/// * `Ok(Vec<u8>)` - 読み込んだバイト列
/// * `Err(DarfError::SecurityViolation)` - 上限を超えた場合
pub(crate) fn read_limited<R: Read>(reader: R, limit: u64) -> Result<Vec<u8>, DarfError> {
    let mut buffer = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut buffer)?;
    if buffer.len() as u64 > limit {
        return Err(DarfError::SecurityViolation(format!(
            "Input exceeds the size limit of {} bytes",
            limit
        )));
    }
    Ok(buffer)
}

/// 出力エントリ名の検証
///
/// 出力名がディレクトリやアーカイブの外を指さないよう、エントリ名を検証します。
///
/// # 引数
///
/// * `name` - 検証するエントリ名
///
/// # 戻り値
///
/// * `Ok(())` - 名前が安全な場合
/// * `Err(DarfError::SecurityViolation)` - 名前が危険な場合（`..`、絶対パス、区切り文字を含む）
pub(crate) fn validate_entry_name(name: &str) -> Result<(), DarfError> {
    // 空の名前は拒否
    if name.is_empty() {
        return Err(DarfError::SecurityViolation(
            "Empty entry name is not allowed".to_string(),
        ));
    }

    // 絶対パスを拒否（Windows形式の`C:`やUnix形式の`/`で始まるパス）
    let bytes = name.as_bytes();
    if name.starts_with('/') || (bytes.len() >= 2 && bytes[1] == b':') {
        return Err(DarfError::SecurityViolation(format!(
            "Absolute path is not allowed: {}",
            name
        )));
    }

    // `..`を含む名前を拒否（ディレクトリトラバーサル攻撃）
    if name.contains("..") {
        return Err(DarfError::SecurityViolation(format!(
            "Path traversal detected: {}",
            name
        )));
    }

    // 出力は常に平坦な名前なので、区切り文字自体を拒否する
    if name.contains('/') || name.contains('\\') {
        return Err(DarfError::SecurityViolation(format!(
            "Path separator in entry name is not allowed: {}",
            name
        )));
    }

    Ok(())
}
