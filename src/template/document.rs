//! Template Document Module
//!
//! AcroFormを持つPDFテンプレートを読み込み、フィールドカタログを抽出するモジュール。
//! テンプレートのバイト列は不変で、書き込みのたびに新しい作業用コピーへ再解析されます。

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::DarfError;
use crate::security::{read_limited, SecurityConfig};

/// フィールドの入れ子の最大深さ（循環参照の防止）
const MAX_FIELD_DEPTH: usize = 32;

/// フォームフィールドの種類（PDFの`/FT`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// テキストフィールド（`/Tx`）
    Text,
    /// ボタン（`/Btn`）: チェックボックス、ラジオボタン、プッシュボタン
    Button,
    /// 選択フィールド（`/Ch`）: リスト、コンボボックス
    Choice,
    /// 署名フィールド（`/Sig`）
    Signature,
    /// 種類が指定されていないフィールド
    Unknown,
}

impl FieldType {
    fn from_name(name: &[u8]) -> Self {
        match name {
            b"Tx" => FieldType::Text,
            b"Btn" => FieldType::Button,
            b"Ch" => FieldType::Choice,
            b"Sig" => FieldType::Signature,
            _ => FieldType::Unknown,
        }
    }
}

/// フィールドのウィジェット注釈
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub(crate) id: ObjectId,
    pub(crate) page: Option<ObjectId>,
    /// 正規化済みの矩形 `[llx, lly, urx, ury]`
    pub rect: [f64; 4],
}

impl Widget {
    /// 矩形の幅
    pub fn width(&self) -> f64 {
        self.rect[2] - self.rect[0]
    }

    /// 矩形の高さ
    pub fn height(&self) -> f64 {
        self.rect[3] - self.rect[1]
    }
}

/// フィールドカタログの1項目（終端フィールド）
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub(crate) id: ObjectId,
    /// 完全修飾名（例: `contribuinte.Nome`）
    pub full_name: String,
    /// 末端の部分名（例: `Nome`）
    pub partial_name: String,
    /// フィールドの種類（親から継承される）
    pub field_type: FieldType,
    /// 既定の外観文字列（`/DA`、親から継承される）
    pub default_appearance: Option<String>,
    /// テキスト配置（`/Q`、親から継承される）
    pub quadding: Option<i64>,
    /// フィールドフラグ（`/Ff`、親から継承される）
    pub flags: i64,
    pub(crate) widgets: Vec<Widget>,
}

impl FormField {
    /// ウィジェットの一覧
    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }
}

/// 読み込み済みのテンプレートPDF
///
/// 元のバイト列と、読み込み時に1回だけ抽出したフィールドカタログを保持します。
/// テンプレート自体は変更されないため、`&TemplateDocument`を複数スレッドで
/// 共有できます。
///
/// # 使用例
///
/// ```rust,no_run
/// use darfbatch::TemplateDocument;
///
/// let template = TemplateDocument::open("modelos/darf.pdf")?;
/// for field in template.fields() {
///     println!("{} ({:?})", field.full_name, field.field_type);
/// }
/// # Ok::<(), darfbatch::DarfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    bytes: Vec<u8>,
    fields: Vec<FormField>,
    acroform_da: Option<String>,
    resource_fonts: BTreeMap<String, Object>,
    max_id: u32,
    page_count: usize,
}

impl TemplateDocument {
    /// ファイルからテンプレートを読み込む（デフォルトのセキュリティ設定）
    ///
    /// # 戻り値
    ///
    /// * `Err(DarfError::TemplateNotFound)` - ファイルが存在しない場合
    /// * `Err(DarfError::TemplateParse)` - PDFとして解析できない、またはフォームがない場合
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DarfError> {
        Self::open_with_security(path, &SecurityConfig::default())
    }

    /// セキュリティ設定を指定してファイルからテンプレートを読み込む
    pub fn open_with_security<P: AsRef<Path>>(
        path: P,
        security: &SecurityConfig,
    ) -> Result<Self, DarfError> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DarfError::TemplateNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = read_limited(file, security.max_input_file_size)?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "loaded template");
        Self::from_bytes(bytes)
    }

    /// セキュリティ設定を指定して任意のリーダーから読み込む
    pub fn from_reader<R: Read>(reader: R, security: &SecurityConfig) -> Result<Self, DarfError> {
        let bytes = read_limited(reader, security.max_input_file_size)?;
        Self::from_bytes(bytes)
    }

    /// バイト列からテンプレートを読み込む
    ///
    /// PDFを解析してフィールドカタログを抽出します。AcroFormを持たない、
    /// またはフィールドが1つもないPDFは`DarfError::TemplateParse`になります。
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DarfError> {
        let doc = parse(&bytes)?;

        let acroform = acroform(&doc)
            .ok_or_else(|| DarfError::TemplateParse("Document has no AcroForm".to_string()))?;

        let acroform_da = acroform
            .get(b"DA")
            .ok()
            .and_then(|o| o.as_str().ok())
            .map(decode_text);
        let resource_fonts = resource_fonts(&doc, acroform);

        let roots = acroform
            .get(b"Fields")
            .ok()
            .and_then(|o| resolve(&doc, o))
            .and_then(|o| o.as_array().ok())
            .cloned()
            .unwrap_or_default();

        let annot_pages = annotation_pages(&doc);
        let mut walker = FieldWalker {
            doc: &doc,
            annot_pages: &annot_pages,
            visited: BTreeSet::new(),
            fields: Vec::new(),
        };
        walker.walk(&roots, &Inherited::default(), "", 0);
        let fields = walker.fields;

        if fields.is_empty() {
            return Err(DarfError::TemplateParse(
                "AcroForm has no fields".to_string(),
            ));
        }

        let page_count = doc.get_pages().len();
        tracing::debug!(fields = fields.len(), pages = page_count, "parsed template form");

        Ok(Self {
            max_id: doc.max_id,
            bytes,
            fields,
            acroform_da,
            resource_fonts,
            page_count,
        })
    }

    /// フィールドカタログ
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// 名前でフィールドを検索する
    ///
    /// 完全修飾名で一致するフィールドを優先し、なければ部分名で検索します。
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields
            .iter()
            .find(|f| f.full_name == name)
            .or_else(|| self.fields.iter().find(|f| f.partial_name == name))
    }

    /// テンプレートの元のバイト列
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// ページ数
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub(crate) fn acroform_da(&self) -> Option<&str> {
        self.acroform_da.as_deref()
    }

    /// AcroFormの`/DR /Font`に登録されたフォント
    pub(crate) fn resource_font(&self, name: &str) -> Option<&Object> {
        self.resource_fonts.get(name)
    }

    /// テンプレートに存在するオブジェクト番号の最大値
    pub(crate) fn max_id(&self) -> u32 {
        self.max_id
    }

    /// 新しい作業用コピーを解析する
    pub(crate) fn load(&self) -> Result<Document, DarfError> {
        parse(&self.bytes)
    }
}

fn parse(bytes: &[u8]) -> Result<Document, DarfError> {
    Document::load_mem(bytes).map_err(|e| DarfError::TemplateParse(e.to_string()))
}

/// 親から継承される属性
#[derive(Debug, Clone, Default)]
struct Inherited {
    field_type: Option<FieldType>,
    default_appearance: Option<String>,
    quadding: Option<i64>,
    flags: Option<i64>,
}

impl Inherited {
    fn merge(&self, dict: &Dictionary) -> Self {
        Self {
            field_type: dict
                .get(b"FT")
                .and_then(Object::as_name)
                .map(FieldType::from_name)
                .ok()
                .or(self.field_type),
            default_appearance: dict
                .get(b"DA")
                .and_then(Object::as_str)
                .map(decode_text)
                .ok()
                .or_else(|| self.default_appearance.clone()),
            quadding: dict.get(b"Q").and_then(Object::as_i64).ok().or(self.quadding),
            flags: dict.get(b"Ff").and_then(Object::as_i64).ok().or(self.flags),
        }
    }
}

struct FieldWalker<'a> {
    doc: &'a Document,
    annot_pages: &'a BTreeMap<ObjectId, ObjectId>,
    visited: BTreeSet<ObjectId>,
    fields: Vec<FormField>,
}

impl<'a> FieldWalker<'a> {
    fn walk(&mut self, refs: &[Object], parent: &Inherited, prefix: &str, depth: usize) {
        if depth > MAX_FIELD_DEPTH {
            tracing::warn!(prefix, "form field tree is too deep");
            return;
        }
        let doc = self.doc;

        for object in refs {
            let Ok(id) = object.as_reference() else {
                continue;
            };
            if !self.visited.insert(id) {
                continue;
            }
            let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
                continue;
            };

            let partial_name = dict
                .get(b"T")
                .and_then(Object::as_str)
                .map(decode_text)
                .unwrap_or_default();
            let full_name = match (prefix.is_empty(), partial_name.is_empty()) {
                (true, _) => partial_name.clone(),
                (false, true) => prefix.to_string(),
                (false, false) => format!("{}.{}", prefix, partial_name),
            };
            let inherited = parent.merge(dict);

            let kids = dict
                .get(b"Kids")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .cloned()
                .unwrap_or_default();

            // /Tを持つ子はフィールド、持たない子はウィジェット
            let mut child_fields = Vec::new();
            let mut widgets = Vec::new();
            for kid in &kids {
                let Ok(kid_id) = kid.as_reference() else {
                    continue;
                };
                let Ok(kid_dict) = doc.get_object(kid_id).and_then(Object::as_dict) else {
                    continue;
                };
                if kid_dict.has(b"T") {
                    child_fields.push(kid.clone());
                } else {
                    widgets.push(self.widget(kid_id, kid_dict));
                }
            }
            if kids.is_empty() {
                widgets.push(self.widget(id, dict));
            }

            if !widgets.is_empty() && !full_name.is_empty() {
                self.fields.push(FormField {
                    id,
                    full_name: full_name.clone(),
                    partial_name,
                    field_type: inherited.field_type.unwrap_or(FieldType::Unknown),
                    default_appearance: inherited.default_appearance.clone(),
                    quadding: inherited.quadding,
                    flags: inherited.flags.unwrap_or(0),
                    widgets,
                });
            }

            if !child_fields.is_empty() {
                self.walk(&child_fields, &inherited, &full_name, depth + 1);
            }
        }
    }

    fn widget(&self, id: ObjectId, dict: &Dictionary) -> Widget {
        let page = dict
            .get(b"P")
            .and_then(Object::as_reference)
            .ok()
            .or_else(|| self.annot_pages.get(&id).copied());
        let rect = dict
            .get(b"Rect")
            .ok()
            .and_then(|o| resolve(self.doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|values| normalize_rect(values))
            .unwrap_or([0.0; 4]);
        Widget { id, page, rect }
    }
}

/// 注釈のオブジェクト番号からページへの対応表
fn annotation_pages(doc: &Document) -> BTreeMap<ObjectId, ObjectId> {
    let mut pages = BTreeMap::new();
    for page_id in doc.get_pages().into_values() {
        let annots = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .and_then(|page| page.get(b"Annots"))
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok());
        for annot in annots.into_iter().flatten() {
            if let Ok(annot_id) = annot.as_reference() {
                pages.insert(annot_id, page_id);
            }
        }
    }
    pages
}

/// AcroFormの`/DR /Font`をフォント名ごとに取り出す
fn resource_fonts(doc: &Document, acroform: &Dictionary) -> BTreeMap<String, Object> {
    acroform
        .get(b"DR")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .and_then(|dr| dr.get(b"Font").ok())
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .map(|fonts| {
            fonts
                .iter()
                .map(|(name, font)| (String::from_utf8_lossy(name).into_owned(), font.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// カタログ（`/Root`）のオブジェクト番号
pub(crate) fn catalog_id(doc: &Document) -> Result<ObjectId, DarfError> {
    Ok(doc.trailer.get(b"Root")?.as_reference()?)
}

/// カタログのAcroForm辞書（直接・間接どちらの形式も解決する）
pub(crate) fn acroform(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc
        .get_object(catalog_id(doc).ok()?)
        .and_then(Object::as_dict)
        .ok()?;
    let acroform = resolve(doc, catalog.get(b"AcroForm").ok()?)?;
    acroform.as_dict().ok()
}

/// 間接参照を解決する
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// 数値オブジェクトを`f64`として取得する
pub(crate) fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// `[x1 y1 x2 y2]`を左下・右上の順に正規化する
pub(crate) fn normalize_rect(values: &[Object]) -> [f64; 4] {
    let n: Vec<f64> = values.iter().filter_map(number).collect();
    if n.len() < 4 {
        return [0.0; 4];
    }
    [
        n[0].min(n[2]),
        n[1].min(n[3]),
        n[0].max(n[2]),
        n[1].max(n[3]),
    ]
}

/// PDFのテキスト文字列を復号する（BOM付きUTF-16BE、それ以外はLatin-1）
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// PDFのテキスト文字列へ符号化する
///
/// すべての文字がPDFDocEncodingとLatin-1で同じ位置にあればそのまま1バイトずつ、
/// そうでなければBOM付きUTF-16BEで符号化します。
pub(crate) fn encode_text(text: &str) -> Vec<u8> {
    if text.chars().all(is_pdf_doc_compatible) {
        text.chars().map(|c| c as u8).collect()
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        bytes
    }
}

/// Latin-1とPDFDocEncodingで同じ文字を表すか
///
/// 0x18-0x1F、0x7F-0x9F、0xADはPDFDocEncodingでは別の文字か未定義です。
fn is_pdf_doc_compatible(c: char) -> bool {
    matches!(c as u32, 0x00..=0x17 | 0x20..=0x7E | 0xA0..=0xAC | 0xAE..=0xFF)
}
