//! Output Sink Module
//!
//! 生成したドキュメントの出力先を抽象化するモジュール。
//! バッチは出力先を直接知らず、呼び出し側が渡した`OutputSink`へ順番に書き込みます。

mod sinks;

use crate::error::DarfError;

pub use sinks::*;

/// 出力先（Strategy Pattern）
///
/// `write`は入力行の順序どおりに呼び出され、最後に`finalize`が1回呼び出されます。
pub trait OutputSink {
    /// 名前付きのドキュメントを1件書き込む
    ///
    /// # 引数
    ///
    /// * `name` - 出力名（パス区切りを含まない平坦な名前）
    /// * `bytes` - ドキュメントのバイト列
    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), DarfError>;

    /// すべての書き込みが終わった後に呼び出される
    fn finalize(&mut self) -> Result<(), DarfError> {
        Ok(())
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), DarfError> {
        (**self).write(name, bytes)
    }

    fn finalize(&mut self) -> Result<(), DarfError> {
        (**self).finalize()
    }
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), DarfError> {
        (**self).write(name, bytes)
    }

    fn finalize(&mut self) -> Result<(), DarfError> {
        (**self).finalize()
    }
}
