//! テスト用のテンプレートPDF
//!
//! 単体テスト・結合テスト・ベンチマークで共有します。lopdf以外には依存しません。

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// DARFテンプレートのフィールド名（フォーム上の順序）
pub const DARF_FIELDS: [&str; 8] = [
    "Nome",
    "Apuração",
    "NI",
    "Receita",
    "Vencimento",
    "Principal",
    "Juros",
    "Total",
];

fn latin1(text: &str) -> Object {
    Object::string_literal(text.chars().map(|c| c as u8).collect::<Vec<u8>>())
}

/// 背景付きの1ページ文書とフォントを作る
fn base_document() -> (Document, ObjectId, ObjectId, ObjectId) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["Helv".into(), 14.into()]),
            Operation::new("Td", vec![50.into(), 800.into()]),
            Operation::new("Tj", vec![Object::string_literal("DARF")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.new_object_id();
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "Helv" => font_id } },
        }),
    );
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    (doc, pages_id, page_id, font_id)
}

fn finish(
    mut doc: Document,
    pages_id: ObjectId,
    page_id: ObjectId,
    font_id: ObjectId,
    fields: Vec<ObjectId>,
    widgets: Vec<ObjectId>,
) -> Vec<u8> {
    if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
        page.set(
            "Annots",
            widgets.into_iter().map(Object::Reference).collect::<Vec<_>>(),
        );
    }
    let acroform_id = doc.add_object(dictionary! {
        "Fields" => fields.into_iter().map(Object::Reference).collect::<Vec<_>>(),
        "DR" => dictionary! { "Font" => dictionary! { "Helv" => font_id } },
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// 8つのテキストフィールドを持つDARFテンプレート
pub fn darf_template() -> Vec<u8> {
    let (mut doc, pages_id, page_id, font_id) = base_document();
    let mut ids = Vec::new();
    for (i, name) in DARF_FIELDS.iter().enumerate() {
        let y = 700 - 40 * i as i64;
        ids.push(doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => latin1(name),
            "Rect" => vec![100.into(), y.into(), 300.into(), (y + 20).into()],
            "DA" => Object::string_literal("/Helv 10 Tf 0 g"),
            "F" => 4,
            "P" => page_id,
        }));
    }
    finish(doc, pages_id, page_id, font_id, ids.clone(), ids)
}

/// 親フィールド`contribuinte`の下に`Nome`と`NI`を持つテンプレート
pub fn hierarchical_template() -> Vec<u8> {
    let (mut doc, pages_id, page_id, font_id) = base_document();
    let parent_id = doc.new_object_id();
    let mut kids = Vec::new();
    let mut widgets = Vec::new();
    for (i, name) in ["Nome", "NI"].iter().enumerate() {
        let y = 600 - 40 * i as i64;
        let field_id = doc.add_object(dictionary! {
            "T" => latin1(name),
            "Parent" => parent_id,
        });
        let widget_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Parent" => field_id,
            "Rect" => vec![100.into(), y.into(), 300.into(), (y + 20).into()],
        });
        if let Ok(field) = doc.get_object_mut(field_id).and_then(Object::as_dict_mut) {
            field.set("Kids", vec![Object::Reference(widget_id)]);
        }
        kids.push(Object::Reference(field_id));
        widgets.push(widget_id);
    }
    doc.objects.insert(
        parent_id,
        Object::Dictionary(dictionary! {
            "T" => Object::string_literal("contribuinte"),
            "FT" => "Tx",
            "Q" => 1,
            "DA" => Object::string_literal("/Helv 9 Tf 0 g"),
            "Kids" => kids,
        }),
    );
    finish(doc, pages_id, page_id, font_id, vec![parent_id], widgets)
}

/// フォームを持たない1ページの文書
pub fn plain_document() -> Vec<u8> {
    let (mut doc, pages_id, _, _) = base_document();
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
