//! Live Fill Module
//!
//! 作業用コピーのフォームフィールドに値を書き込み、外観ストリームを生成するモジュール。

use std::collections::BTreeMap;

use lopdf::{dictionary, Dictionary, Document, Object, StringFormat};

use crate::api::{FillMode, TextAlignment};
use crate::error::DarfError;
use crate::formatter::format_raw_decimal;
use crate::template::appearance::{fallback_font, text_appearance, DefaultAppearance};
use crate::template::document::{catalog_id, encode_text, FieldType, FormField, TemplateDocument};

/// テンプレートに書き込む値
#[derive(Debug, Clone, PartialEq)]
pub enum FillValue {
    /// 整形済みの表示文字列
    Display(String),
    /// 正規化済み小数（テンプレートの書式スクリプトが表示を整形する）
    RawDecimal(f64),
}

impl FillValue {
    /// フィールドの`/V`に書き込む文字列
    pub fn to_field_text(&self) -> String {
        match self {
            FillValue::Display(text) => text.clone(),
            FillValue::RawDecimal(value) => format_raw_decimal(*value),
        }
    }
}

/// フィールド名から書き込む値への対応表
pub type FieldValues = BTreeMap<String, FillValue>;

/// 書き込みオプション
///
/// # 使用例
///
/// ```rust
/// use darfbatch::{FillMode, FillOptions, TextAlignment};
///
/// let mut options = FillOptions::new(FillMode::FlattenMerge);
/// options.field_alignment.insert("Total".to_string(), TextAlignment::Right);
/// assert!(options.force_recompute);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FillOptions {
    /// 書き込みモード
    pub mode: FillMode,
    /// ビューアに外観の再計算を求める（AcroFormの`/NeedAppearances`）
    pub force_recompute: bool,
    /// フィールドごとのテキスト配置（指定がなければテンプレートの`/Q`）
    pub field_alignment: BTreeMap<String, TextAlignment>,
}

impl FillOptions {
    /// 指定したモードのデフォルトオプションを生成
    pub fn new(mode: FillMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            mode: FillMode::Live,
            force_recompute: true,
            field_alignment: BTreeMap::new(),
        }
    }
}

/// 書き込み済みのドキュメント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilledDocument {
    /// 書き込みモード
    pub mode: FillMode,
    /// PDFのバイト列
    pub bytes: Vec<u8>,
}

/// 作業用コピーに値と外観を書き込む
///
/// テンプレートに存在しないフィールド名は無視します。
///
/// # 戻り値
///
/// 値を書き込んだフィールドの数
pub(crate) fn fill_live(
    doc: &mut Document,
    template: &TemplateDocument,
    values: &FieldValues,
    options: &FillOptions,
) -> Result<usize, DarfError> {
    let mut filled = 0;

    for (name, value) in values {
        let Some(field) = template.field(name) else {
            tracing::debug!(field = %name, "field not present in template, skipping");
            continue;
        };

        match field.field_type {
            FieldType::Text | FieldType::Unknown => {
                let alignment = options.field_alignment.get(name).copied();
                fill_text_field(doc, template, field, &value.to_field_text(), alignment)?;
            }
            FieldType::Choice => {
                set_value(doc, field, &value.to_field_text())?;
            }
            FieldType::Button | FieldType::Signature => {
                tracing::debug!(field = %name, kind = ?field.field_type, "unsupported field type, skipping");
                continue;
            }
        }
        filled += 1;
    }

    if options.force_recompute {
        acroform_mut(doc)?.set("NeedAppearances", Object::Boolean(true));
    }

    Ok(filled)
}

fn fill_text_field(
    doc: &mut Document,
    template: &TemplateDocument,
    field: &FormField,
    text: &str,
    alignment: Option<TextAlignment>,
) -> Result<(), DarfError> {
    set_value(doc, field, text)?;

    if let Some(alignment) = alignment {
        doc.get_object_mut(field.id)?
            .as_dict_mut()?
            .set("Q", Object::Integer(alignment.quadding()));
    }
    let alignment = alignment
        .or_else(|| field.quadding.map(TextAlignment::from_quadding))
        .unwrap_or(TextAlignment::Left);

    let da = DefaultAppearance::resolve(&[
        field.default_appearance.as_deref(),
        template.acroform_da(),
    ]);
    let font = template
        .resource_font(&da.font_name)
        .cloned()
        .unwrap_or_else(fallback_font);

    for widget in field.widgets() {
        let stream = text_appearance(
            text,
            widget.width(),
            widget.height(),
            alignment,
            &da,
            font.clone(),
        )?;
        let appearance_id = doc.add_object(stream);

        let widget_dict = doc.get_object_mut(widget.id)?.as_dict_mut()?;
        widget_dict.set("AP", dictionary! { "N" => appearance_id });
        widget_dict.remove(b"AS");
    }

    Ok(())
}

fn set_value(doc: &mut Document, field: &FormField, text: &str) -> Result<(), DarfError> {
    let encoded = encode_text(text);
    // UTF-16はエスケープが不要な16進形式で書く
    let format = if encoded.starts_with(&[0xFE, 0xFF]) {
        StringFormat::Hexadecimal
    } else {
        StringFormat::Literal
    };
    doc.get_object_mut(field.id)?
        .as_dict_mut()?
        .set("V", Object::String(encoded, format));
    Ok(())
}

/// 作業用コピーのAcroForm辞書を可変で取得する
fn acroform_mut(doc: &mut Document) -> Result<&mut Dictionary, DarfError> {
    let catalog_id = catalog_id(doc)?;
    let indirect = doc
        .get_object(catalog_id)?
        .as_dict()?
        .get(b"AcroForm")?
        .as_reference()
        .ok();

    match indirect {
        Some(id) => Ok(doc.get_object_mut(id)?.as_dict_mut()?),
        None => Ok(doc
            .get_object_mut(catalog_id)?
            .as_dict_mut()?
            .get_mut(b"AcroForm")?
            .as_dict_mut()?),
    }
}

/// 作業用コピーを保存する
pub(crate) fn save(mut doc: Document) -> Result<Vec<u8>, DarfError> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::document::{acroform, decode_text};
    use crate::template::{fill, fixtures};

    fn values(pairs: &[(&str, &str)]) -> FieldValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FillValue::Display(v.to_string())))
            .collect()
    }

    fn field_value(doc: &Document, template: &TemplateDocument, name: &str) -> Option<String> {
        let field = template.field(name)?;
        let dict = doc.get_object(field.id).ok()?.as_dict().ok()?;
        dict.get(b"V").ok()?.as_str().ok().map(decode_text)
    }

    #[test]
    fn test_fill_live_writes_values_and_appearances() {
        let template = TemplateDocument::from_bytes(fixtures::darf_template()).unwrap();
        let filled = fill(
            &template,
            &values(&[("Nome", "Fulano de Tal"), ("Total", "1.234,56")]),
            &FillOptions::default(),
        )
        .unwrap();
        assert_eq!(filled.mode, FillMode::Live);

        let doc = Document::load_mem(&filled.bytes).unwrap();
        assert_eq!(field_value(&doc, &template, "Nome").as_deref(), Some("Fulano de Tal"));
        assert_eq!(field_value(&doc, &template, "Total").as_deref(), Some("1.234,56"));
        assert_eq!(field_value(&doc, &template, "Juros"), None);

        let form = acroform(&doc).unwrap();
        assert!(form.get(b"NeedAppearances").unwrap().as_bool().unwrap());

        let total = template.field("Total").unwrap();
        let widget = doc.get_object(total.widgets()[0].id).unwrap().as_dict().unwrap();
        let ap = widget.get(b"AP").unwrap().as_dict().unwrap();
        let stream_id = ap.get(b"N").unwrap().as_reference().unwrap();
        let stream = doc.get_object(stream_id).unwrap().as_stream().unwrap();
        assert!(String::from_utf8_lossy(&stream.content).contains("(1.234,56) Tj"));
    }

    #[test]
    fn test_force_recompute_disabled() {
        let template = TemplateDocument::from_bytes(fixtures::darf_template()).unwrap();
        let options = FillOptions {
            force_recompute: false,
            ..FillOptions::default()
        };
        let filled = fill(&template, &values(&[("Nome", "x")]), &options).unwrap();
        let doc = Document::load_mem(&filled.bytes).unwrap();
        assert!(!acroform(&doc).unwrap().has(b"NeedAppearances"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let template = TemplateDocument::from_bytes(fixtures::darf_template()).unwrap();
        let mut doc = template.load().unwrap();
        let count = fill_live(
            &mut doc,
            &template,
            &values(&[("Inexistente", "x"), ("NI", "123.456.789-01")]),
            &FillOptions::default(),
        )
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_alignment_override_sets_quadding() {
        let template = TemplateDocument::from_bytes(fixtures::darf_template()).unwrap();
        let mut options = FillOptions::default();
        options
            .field_alignment
            .insert("Total".to_string(), TextAlignment::Right);

        let filled = fill(&template, &values(&[("Total", "10,00")]), &options).unwrap();
        let doc = Document::load_mem(&filled.bytes).unwrap();
        let total = template.field("Total").unwrap();
        let dict = doc.get_object(total.id).unwrap().as_dict().unwrap();
        assert_eq!(dict.get(b"Q").unwrap().as_i64().unwrap(), 2);
    }

    #[test]
    fn test_unicode_value_uses_utf16() {
        let template = TemplateDocument::from_bytes(fixtures::darf_template()).unwrap();
        let filled = fill(&template, &values(&[("Nome", "Łukasz")]), &FillOptions::default())
            .unwrap();
        let doc = Document::load_mem(&filled.bytes).unwrap();
        assert_eq!(field_value(&doc, &template, "Nome").as_deref(), Some("Łukasz"));
    }

    #[test]
    fn test_raw_decimal_text() {
        assert_eq!(FillValue::RawDecimal(2_500_000.0).to_field_text(), "2500000.00");
        assert_eq!(FillValue::Display("x".to_string()).to_field_text(), "x");
    }
}
