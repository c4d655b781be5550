//! Template Filler Module
//!
//! PDFフォームテンプレートの読み込み、フィールドへの書き込み、
//! およびページ内容への焼き込み（flatten）を提供するモジュール。

mod appearance;
mod document;
mod filler;
mod flatten;

pub use document::{FieldType, FormField, TemplateDocument, Widget};
pub use filler::{FieldValues, FillOptions, FillValue, FilledDocument};

use crate::api::FillMode;
use crate::error::DarfError;

/// テンプレートに値を書き込む
///
/// テンプレート自体は変更せず、毎回新しい作業用コピーに書き込みます。
///
/// # 引数
///
/// * `template` - 読み込み済みのテンプレート
/// * `values` - フィールド名と書き込む値の対応表（テンプレートにない名前は無視される）
/// * `options` - 書き込みモード、外観の再計算、テキスト配置
///
/// # 戻り値
///
/// * `Ok(FilledDocument)` - 書き込み済みのPDF
/// * `Err(DarfError::Config)` - `FlattenMerge`で正規化済み小数を書き込もうとした場合
/// * `Err(DarfError::Pdf)` / `Err(DarfError::TemplateParse)` - PDFの処理に失敗した場合
///
/// # 使用例
///
/// ```rust,no_run
/// use darfbatch::{fill, FieldValues, FillMode, FillOptions, FillValue, TemplateDocument};
///
/// let template = TemplateDocument::open("modelos/darf.pdf")?;
/// let mut values = FieldValues::new();
/// values.insert("Total".to_string(), FillValue::Display("2.500.000,00".to_string()));
///
/// let filled = fill(&template, &values, &FillOptions::new(FillMode::FlattenMerge))?;
/// std::fs::write("DARF_1.pdf", &filled.bytes)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn fill(
    template: &TemplateDocument,
    values: &FieldValues,
    options: &FillOptions,
) -> Result<FilledDocument, DarfError> {
    let bytes = match options.mode {
        FillMode::Live => {
            let mut doc = template.load()?;
            filler::fill_live(&mut doc, template, values, options)?;
            filler::save(doc)?
        }
        FillMode::FlattenMerge => {
            if let Some((name, _)) = values
                .iter()
                .find(|(_, value)| matches!(value, FillValue::RawDecimal(_)))
            {
                return Err(DarfError::Config(format!(
                    "Field '{}' holds a raw decimal, which cannot be flattened",
                    name
                )));
            }
            flatten::flatten_merge(template, values, options)?
        }
    };

    Ok(FilledDocument {
        mode: options.mode,
        bytes,
    })
}

#[cfg(test)]
pub(crate) mod fixtures;
