//! Format Module
//!
//! スプレッドシートのセル文字列を正規化済みの値へ解析するモジュール。
//! 数値の表記法の判別と、柔軟な日付解析を提供します。

mod date;
mod number;

pub(crate) use date::from_excel_serial;
pub use date::parse_flexible_date;
pub use number::{parse_integer_code, parse_number};
