//! Flatten Merge Module
//!
//! 書き込み済みの外観をページ内容へ焼き込み、フォームを取り除くモジュール。
//!
//! 1. 作業用コピーに通常の書き込みを行い、各ウィジェットの外観を得る
//! 2. 未変更のテンプレートを背景として読み込み、外観をForm XObjectとして
//!    ウィジェットの矩形上に描画する
//! 3. ウィジェット注釈とAcroFormを削除し、参照されなくなったオブジェクトを除去する

use std::collections::{BTreeMap, BTreeSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::DarfError;
use crate::template::document::{catalog_id, normalize_rect, number, resolve, TemplateDocument};
use crate::template::filler::{fill_live, save, FieldValues, FillOptions};

/// 注釈フラグ: Hidden
const FLAG_HIDDEN: i64 = 1 << 1;
/// 注釈フラグ: NoView
const FLAG_NO_VIEW: i64 = 1 << 5;

/// ページ上に配置する外観
struct Placement {
    xobject: ObjectId,
    matrix: [f64; 6],
}

pub(crate) fn flatten_merge(
    template: &TemplateDocument,
    values: &FieldValues,
    options: &FillOptions,
) -> Result<Vec<u8>, DarfError> {
    let mut working = template.load()?;
    fill_live(&mut working, template, values, options)?;

    let mut output = template.load()?;
    let mut placements: BTreeMap<ObjectId, Vec<Placement>> = BTreeMap::new();
    let mut widget_ids = BTreeSet::new();

    for field in template.fields() {
        for widget in field.widgets() {
            widget_ids.insert(widget.id);

            let Some(page) = widget.page else {
                tracing::debug!(field = %field.full_name, "widget without page, skipping");
                continue;
            };
            if is_hidden(&output, widget.id) {
                continue;
            }
            let Some(appearance_id) = normal_appearance(&working, widget.id) else {
                continue;
            };
            let appearance = working.get_object(appearance_id)?.as_stream()?;

            // テンプレート由来の外観はそのまま参照し、新しい外観は背景側へ複製する
            let xobject = if appearance_id.0 <= template.max_id() {
                appearance_id
            } else {
                output.add_object(appearance.clone())
            };

            let matrix = placement_matrix(&appearance.dict, widget.rect);
            placements
                .entry(page)
                .or_default()
                .push(Placement { xobject, matrix });
        }
    }

    for page_id in output.get_pages().into_values() {
        let page_placements = placements.remove(&page_id).unwrap_or_default();
        if !page_placements.is_empty() {
            stamp_page(&mut output, page_id, &page_placements)?;
        }
        remove_widgets(&mut output, page_id, &widget_ids)?;
    }

    let catalog_id = catalog_id(&output)?;
    output
        .get_object_mut(catalog_id)?
        .as_dict_mut()?
        .remove(b"AcroForm");
    output.prune_objects();

    save(output)
}

/// ウィジェットが非表示かどうか（`/F`のHiddenまたはNoView）
fn is_hidden(doc: &Document, widget_id: ObjectId) -> bool {
    doc.get_object(widget_id)
        .and_then(Object::as_dict)
        .and_then(|dict| dict.get(b"F"))
        .and_then(Object::as_i64)
        .map(|flags| flags & (FLAG_HIDDEN | FLAG_NO_VIEW) != 0)
        .unwrap_or(false)
}

/// ウィジェットの通常外観（`/AP /N`）のストリームを解決する
///
/// `/N`が状態ごとの辞書の場合は`/AS`で選ばれた状態を使います。
fn normal_appearance(doc: &Document, widget_id: ObjectId) -> Option<ObjectId> {
    let widget = doc.get_object(widget_id).ok()?.as_dict().ok()?;
    let ap = resolve(doc, widget.get(b"AP").ok()?)?.as_dict().ok()?;
    let normal = ap.get(b"N").ok()?;

    let id = match normal {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(_) => *id,
            Object::Dictionary(states) => select_state(widget, states)?,
            _ => return None,
        },
        Object::Dictionary(states) => select_state(widget, states)?,
        _ => return None,
    };

    doc.get_object(id).ok()?.as_stream().ok().map(|_| id)
}

fn select_state(widget: &Dictionary, states: &Dictionary) -> Option<ObjectId> {
    let state = widget.get(b"AS").ok()?.as_name().ok()?;
    states.get(state).ok()?.as_reference().ok()
}

/// 外観の`/BBox`を`/Matrix`で変換した矩形をウィジェットの矩形へ写す行列
fn placement_matrix(appearance: &Dictionary, rect: [f64; 4]) -> [f64; 6] {
    let bbox = appearance
        .get(b"BBox")
        .ok()
        .and_then(|o| o.as_array().ok())
        .map(|values| normalize_rect(values))
        .unwrap_or([0.0, 0.0, rect[2] - rect[0], rect[3] - rect[1]]);
    let form_matrix = appearance
        .get(b"Matrix")
        .ok()
        .and_then(|o| o.as_array().ok())
        .map(|values| values.iter().filter_map(number).collect::<Vec<_>>())
        .filter(|m| m.len() == 6)
        .map(|m| [m[0], m[1], m[2], m[3], m[4], m[5]])
        .unwrap_or([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    let corners = [
        (bbox[0], bbox[1]),
        (bbox[2], bbox[1]),
        (bbox[0], bbox[3]),
        (bbox[2], bbox[3]),
    ]
    .map(|(x, y)| transform(&form_matrix, x, y));
    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    let scale = |target: f64, source: f64| {
        if source.abs() > f64::EPSILON {
            target / source
        } else {
            1.0
        }
    };
    let sx = scale(rect[2] - rect[0], max_x - min_x);
    let sy = scale(rect[3] - rect[1], max_y - min_y);

    [sx, 0.0, 0.0, sy, rect[0] - min_x * sx, rect[1] - min_y * sy]
}

fn transform(m: &[f64; 6], x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// ページ内容の末尾に外観を描画する
fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    placements: &[Placement],
) -> Result<(), DarfError> {
    let mut resources = page_resources(doc, page_id);
    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut operations = Vec::with_capacity(placements.len() * 4);
    let mut counter = 0usize;
    for placement in placements {
        let name = loop {
            counter += 1;
            let candidate = format!("DarfFld{}", counter);
            if !xobjects.has(candidate.as_bytes()) {
                break candidate;
            }
        };
        xobjects.set(name.as_bytes().to_vec(), Object::Reference(placement.xobject));

        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new(
            "cm",
            placement.matrix.iter().map(|v| Object::Real(*v as _)).collect(),
        ));
        operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        operations.push(Operation::new("Q", vec![]));
    }
    resources.set("XObject", Object::Dictionary(xobjects));

    // 既存の内容はグラフィックス状態を閉じてから外観を重ねる
    let mut content = b"q\n".to_vec();
    content.extend(doc.get_page_content(page_id)?);
    content.extend_from_slice(b"\nQ\n");
    content.extend(Content { operations }.encode()?);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));
    Ok(())
}

/// ページのリソース辞書を、ページツリーから継承されたものも含めて複製する
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = Some(page_id);
    let mut visited = BTreeSet::new();
    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        let Ok(node) = doc.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        if let Some(resources) = node
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
        {
            return resources.clone();
        }
        current = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Dictionary::new()
}

/// ページの`/Annots`からウィジェット注釈を取り除く
fn remove_widgets(
    doc: &mut Document,
    page_id: ObjectId,
    widget_ids: &BTreeSet<ObjectId>,
) -> Result<(), DarfError> {
    let annots = {
        let page = doc.get_object(page_id)?.as_dict()?;
        let Some(annots) = page
            .get(b"Annots")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
        else {
            return Ok(());
        };

        annots
            .iter()
            .filter(|annot| !is_widget(doc, annot, widget_ids))
            .cloned()
            .collect::<Vec<_>>()
    };

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    if annots.is_empty() {
        page.remove(b"Annots");
    } else {
        page.set("Annots", Object::Array(annots));
    }
    Ok(())
}

fn is_widget(doc: &Document, annot: &Object, widget_ids: &BTreeSet<ObjectId>) -> bool {
    if let Ok(id) = annot.as_reference() {
        if widget_ids.contains(&id) {
            return true;
        }
    }
    resolve(doc, annot)
        .and_then(|o| o.as_dict().ok())
        .and_then(|dict| dict.get(b"Subtype").ok())
        .and_then(|o| o.as_name().ok())
        .map(|subtype| subtype == b"Widget")
        .unwrap_or(false)
}
