//! Shared fixtures for the integration tests
//!
//! テンプレートPDFは単体テストと同じlopdfの組み立て処理を使い、入力データはCSV文字列で組み立てる。

#![allow(dead_code)]

use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Document, Object};

#[path = "../../src/template/fixtures.rs"]
mod fixtures;

pub use fixtures::{darf_template, DARF_FIELDS};

/// DARFスプレッドシートの列名
pub const DARF_COLUMNS: [&str; 8] = [
    "Nome/Telefone",
    "Período de Apuração",
    "CNPJ",
    "Código da Receita",
    "Data de vencimento",
    "Valor do principal",
    "Valor dos juros",
    "Valor Total",
];

/// DARFの列を持つセミコロン区切りのCSVを組み立てる
pub fn darf_csv(rows: &[[&str; 8]]) -> String {
    let mut csv = DARF_COLUMNS.join(";");
    csv.push('\n');
    for row in rows {
        csv.push_str(&row.join(";"));
        csv.push('\n');
    }
    csv
}

/// PDF文字列を復号する（UTF-16BEのBOM付き、またはLatin-1）
fn decode(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|pair| pair.len() == 2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn acroform(doc: &Document) -> Option<&lopdf::Dictionary> {
    let root = doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
    let catalog = doc.get_object(root).ok()?.as_dict().ok()?;
    match catalog.get(b"AcroForm").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// 出力PDFのフィールド名と`/V`の対応（値のないフィールドは含まない）
pub fn field_values(bytes: &[u8]) -> BTreeMap<String, String> {
    let doc = Document::load_mem(bytes).unwrap();
    let mut values = BTreeMap::new();
    let Some(form) = acroform(&doc) else {
        return values;
    };
    let fields = form.get(b"Fields").unwrap().as_array().unwrap();
    for field in fields {
        let id = field.as_reference().unwrap();
        let dict = doc.get_object(id).unwrap().as_dict().unwrap();
        let name = decode(dict.get(b"T").unwrap().as_str().unwrap());
        if let Ok(value) = dict.get(b"V").and_then(Object::as_str) {
            values.insert(name, decode(value));
        }
    }
    values
}

/// 出力PDFがAcroFormを持つか
pub fn has_acroform(bytes: &[u8]) -> bool {
    let doc = Document::load_mem(bytes).unwrap();
    acroform(&doc).is_some()
}

/// `/NeedAppearances`が立っているか
pub fn needs_appearances(bytes: &[u8]) -> bool {
    let doc = Document::load_mem(bytes).unwrap();
    acroform(&doc)
        .and_then(|form| form.get(b"NeedAppearances").ok())
        .and_then(|flag| flag.as_bool().ok())
        .unwrap_or(false)
}

/// 最初のページのウィジェット注釈の数
pub fn widget_count(bytes: &[u8]) -> usize {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let Ok(annots) = page.get(b"Annots") else {
        return 0;
    };
    let annots = match annots {
        Object::Reference(id) => doc.get_object(*id).unwrap().as_array().unwrap(),
        other => other.as_array().unwrap(),
    };
    annots
        .iter()
        .filter(|annot| {
            let dict = match annot {
                Object::Reference(id) => doc.get_object(*id).unwrap().as_dict().unwrap(),
                other => other.as_dict().unwrap(),
            };
            dict.get(b"Subtype")
                .and_then(Object::as_name)
                .map(|name| name == b"Widget")
                .unwrap_or(false)
        })
        .count()
}

/// 最初のページの内容に含まれる`Do`演算子の数
pub fn xobject_draw_count(bytes: &[u8]) -> usize {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let content = doc.get_page_content(page_id).unwrap();
    Content::decode(&content)
        .unwrap()
        .operations
        .iter()
        .filter(|op| op.operator == "Do")
        .count()
}
