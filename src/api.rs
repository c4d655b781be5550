//! Public API Types
//!
//! 公開APIで使用する列挙型と小さな値型を定義するモジュール。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// テンプレートへの書き込みモード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum FillMode {
    /// フォームフィールドの値を書き込み、フィールドを編集可能なまま残す（デフォルト）
    ///
    /// 各ウィジェットに外観ストリームを生成し、`force_recompute`が有効な場合は
    /// AcroFormの`/NeedAppearances`フラグを立てて、ビューアに表示の再計算を促します。
    #[default]
    Live,

    /// 値をページ内容へ焼き込み、フォームフィールドを削除する
    ///
    /// 2段階で処理します。
    ///
    /// 1. 作業用コピーに`Live`と同じ方法で値と外観を書き込む
    /// 2. 未変更のテンプレートを背景として、作業用コピーの外観をページ上に合成し、
    ///    ウィジェット注釈とAcroFormを削除する
    ///
    /// フォーム描画の対応状況に関係なく、どのビューアでも同じ表示になりますが、
    /// 出力は以後編集できません。
    FlattenMerge,
}

/// 数値フィールドの表示方針
///
/// 金額フィールドに、整形済みの表示文字列を書き込むか、
/// テンプレート側の書式スクリプトに任せる正規化済み小数を書き込むかを選択します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum NumericPolicy {
    /// pt-BR形式の表示文字列（例: `2.500.000,00`）（デフォルト）
    ///
    /// ビューア側のスクリプトが実行されないため、`FlattenMerge`ではこの方針のみ有効です。
    #[default]
    Formatted,

    /// 正規化済みの小数（例: `2500000.00`）
    ///
    /// テンプレートのフィールド書式スクリプトが表示を整形することを前提とします。
    /// `FillMode::Live`でのみ有効です。
    RawDecimal,
}

/// フィールド内のテキスト配置（PDFの`/Q`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlignment {
    /// 左寄せ
    Left,
    /// 中央揃え
    Center,
    /// 右寄せ
    Right,
}

impl TextAlignment {
    /// PDFの`/Q`値（0: 左, 1: 中央, 2: 右）
    pub fn quadding(self) -> i64 {
        match self {
            TextAlignment::Left => 0,
            TextAlignment::Center => 1,
            TextAlignment::Right => 2,
        }
    }

    /// `/Q`値から配置を復元する（範囲外は左寄せ）
    pub fn from_quadding(q: i64) -> Self {
        match q {
            1 => TextAlignment::Center,
            2 => TextAlignment::Right,
            _ => TextAlignment::Left,
        }
    }
}

/// 1行の処理に失敗した場合の方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum FailurePolicy {
    /// 失敗した行をスキップしてレポートに記録し、次の行へ進む（デフォルト）
    #[default]
    SkipRow,

    /// 最初の失敗でバッチ全体を中断する
    AbortBatch,
}

/// シート選択方式
///
/// スプレッドシートのどのシートを読み込むかを指定します。
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SheetSelector {
    /// インデックス指定（0始まり）
    ///
    /// 例: `SheetSelector::Index(0)` は最初のシートを選択（デフォルト）
    Index(usize),

    /// シート名指定
    ///
    /// 例: `SheetSelector::Name("Planilha1".to_string())`
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

/// 協調的キャンセルのためのトークン
///
/// クローンはすべて同じフラグを共有します。バッチは各行の処理を開始する前に
/// フラグを確認し、処理中の行は最後まで完了させます。
///
/// # 使用例
///
/// ```rust
/// use darfbatch::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// 未キャンセル状態のトークンを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// キャンセルを要求する
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// キャンセルが要求されているか
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
