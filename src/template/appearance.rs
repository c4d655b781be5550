//! Appearance Stream Module
//!
//! テキストフィールドのウィジェットに表示する外観ストリーム（Form XObject）を
//! 生成するモジュール。フィールドの既定外観（`/DA`）からフォントと色を取り出し、
//! ウィジェットの矩形に収まるように文字を配置します。

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, Stream, StringFormat};

use crate::api::TextAlignment;
use crate::error::DarfError;
use crate::template::document::number;

/// 既定外観が解析できない場合の値
pub(crate) const FALLBACK_DA: &str = "/Helv 0 Tf 0 g";

/// 自動サイズ（`0 Tf`）の上限
const MAX_AUTO_FONT_SIZE: f64 = 12.0;
/// 縮小時の下限
const MIN_FONT_SIZE: f64 = 4.0;
/// 矩形の内側の余白
const PADDING: f64 = 2.0;

/// Helveticaの字幅（1/1000 em、ASCII 32..=126）
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// 解析済みの既定外観
#[derive(Debug, Clone)]
pub(crate) struct DefaultAppearance {
    /// フォントリソース名（`/Helv`の`Helv`）
    pub font_name: String,
    /// フォントサイズ（0は自動）
    pub font_size: f64,
    /// 色などフォント以外の演算子
    pub operations: Vec<Operation>,
}

impl DefaultAppearance {
    /// `/DA`文字列を解析する
    ///
    /// `Tf`演算子からフォント名とサイズを取り出し、それ以外の演算子（`g`、`rg`、`k`）は
    /// そのまま保持します。解析できない場合は`None`を返します。
    pub fn parse(da: &str) -> Option<Self> {
        let content = Content::decode(da.as_bytes()).ok()?;

        let mut font = None;
        let mut operations = Vec::new();
        for operation in content.operations {
            if operation.operator == "Tf" {
                let name = operation.operands.first().and_then(|o| o.as_name().ok());
                let size = operation.operands.get(1).and_then(number);
                if let (Some(name), Some(size)) = (name, size) {
                    font = Some((String::from_utf8_lossy(name).into_owned(), size));
                }
            } else {
                operations.push(operation);
            }
        }

        let (font_name, font_size) = font?;
        Some(Self {
            font_name,
            font_size,
            operations,
        })
    }

    /// 候補を順に試して最初に解析できたものを返す
    pub fn resolve(candidates: &[Option<&str>]) -> Self {
        candidates
            .iter()
            .flatten()
            .find_map(|da| Self::parse(da))
            .or_else(|| Self::parse(FALLBACK_DA))
            .unwrap_or_else(|| Self {
                font_name: "Helv".to_string(),
                font_size: 0.0,
                operations: Vec::new(),
            })
    }
}

/// テキストの外観ストリームを生成する
///
/// # 引数
///
/// * `text` - 表示する文字列
/// * `width` / `height` - ウィジェットの矩形の大きさ
/// * `alignment` - テキスト配置
/// * `da` - 既定外観
/// * `font` - フォントリソース（AcroFormの`/DR`から解決したもの）
///
/// # 戻り値
///
/// `/BBox [0 0 width height]`のForm XObject
pub(crate) fn text_appearance(
    text: &str,
    width: f64,
    height: f64,
    alignment: TextAlignment,
    da: &DefaultAppearance,
    font: Object,
) -> Result<Stream, DarfError> {
    let encoded = encode_win_ansi(text);
    let font_size = fit_font_size(&encoded, da.font_size, width, height);
    let text_width = text_width(&encoded, font_size);

    let x = match alignment {
        TextAlignment::Left => PADDING,
        TextAlignment::Center => (width - text_width) / 2.0,
        TextAlignment::Right => width - PADDING - text_width,
    }
    .max(PADDING);
    // ベースラインを縦方向の中央付近に置く
    let y = ((height - font_size) / 2.0 + font_size * 0.22).max(0.0);

    let mut operations = vec![
        Operation::new("BMC", vec![Object::Name(b"Tx".to_vec())]),
        Operation::new("q", vec![]),
        Operation::new(
            "re",
            vec![
                real(1.0),
                real(1.0),
                real((width - 2.0).max(0.0)),
                real((height - 2.0).max(0.0)),
            ],
        ),
        Operation::new("W", vec![]),
        Operation::new("n", vec![]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(da.font_name.as_bytes().to_vec()), real(font_size)],
        ),
    ];
    if da.operations.is_empty() {
        operations.push(Operation::new("g", vec![Object::Integer(0)]));
    } else {
        operations.extend(da.operations.iter().cloned());
    }
    operations.extend([
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
        Operation::new("EMC", vec![]),
    ]);

    let content = Content { operations }.encode()?;

    let mut fonts = Dictionary::new();
    fonts.set(da.font_name.as_bytes().to_vec(), font);
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => vec![real(0.0), real(0.0), real(width), real(height)],
        "Resources" => dictionary! { "Font" => fonts },
    };
    Ok(Stream::new(dict, content))
}

/// `/DR`にフォントがない場合に使う標準14フォントの辞書
pub(crate) fn fallback_font() -> Object {
    Object::Dictionary(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    })
}

/// フォントサイズを決める
///
/// 自動サイズ（0）は矩形の高さから求め、文字列が幅に収まらなければ縮小します。
/// 明示的なサイズはそのまま使います。
fn fit_font_size(encoded: &[u8], requested: f64, width: f64, height: f64) -> f64 {
    if requested > 0.0 {
        return requested;
    }

    let mut size = (height * 0.7).clamp(MIN_FONT_SIZE, MAX_AUTO_FONT_SIZE);
    let available = width - 2.0 * PADDING;
    let unit_width = text_width(encoded, 1.0);
    if unit_width > 0.0 && unit_width * size > available {
        size = (available / unit_width).max(MIN_FONT_SIZE);
    }
    size
}

/// 指定サイズでの文字列の幅
fn text_width(encoded: &[u8], font_size: f64) -> f64 {
    let units: u32 = encoded
        .iter()
        .map(|&b| match b {
            32..=126 => u32::from(HELVETICA_WIDTHS[usize::from(b - 32)]),
            _ => 556,
        })
        .sum();
    f64::from(units) * font_size / 1000.0
}

/// WinAnsiEncodingで符号化する（表現できない文字は`?`）
///
/// 0xA0以降はLatin-1と一致します。
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            _ => b'?',
        })
        .collect()
}

fn real(value: f64) -> Object {
    Object::Real(value as _)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_appearance() {
        let da = DefaultAppearance::parse("/Helv 10 Tf 0 g").unwrap();
        assert_eq!(da.font_name, "Helv");
        assert_eq!(da.font_size, 10.0);
        assert_eq!(da.operations.len(), 1);
        assert_eq!(da.operations[0].operator, "g");
    }

    #[test]
    fn test_parse_default_appearance_without_font() {
        assert!(DefaultAppearance::parse("0 g").is_none());
        assert!(DefaultAppearance::parse("").is_none());
    }

    #[test]
    fn test_resolve_falls_back() {
        let da = DefaultAppearance::resolve(&[None, Some("0 0 1 rg"), Some("/Cour 9 Tf")]);
        assert_eq!(da.font_name, "Cour");

        let da = DefaultAppearance::resolve(&[None]);
        assert_eq!(da.font_name, "Helv");
        assert_eq!(da.font_size, 0.0);
    }

    #[test]
    fn test_auto_font_size_fits_widget() {
        let short = encode_win_ansi("1,00");
        assert_eq!(fit_font_size(&short, 0.0, 200.0, 20.0), 12.0);
        assert!((fit_font_size(&short, 0.0, 200.0, 10.0) - 7.0).abs() < 1e-9);

        let long = encode_win_ansi("Fulano de Tal da Silva Pereira / 11 99999-0000");
        let size = fit_font_size(&long, 0.0, 100.0, 20.0);
        assert!(size < 12.0);
        assert!(text_width(&long, size) <= 100.0 - 2.0 * PADDING + 1e-6 || size == MIN_FONT_SIZE);

        // 明示的なサイズは変更しない
        assert_eq!(fit_font_size(&long, 10.0, 100.0, 20.0), 10.0);
    }

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("Apuração"), b"Apura\xe7\xe3o".to_vec());
        assert_eq!(encode_win_ansi("€1"), b"?1".to_vec());
    }

    #[test]
    fn test_text_appearance_stream() {
        let da = DefaultAppearance::parse("/Helv 10 Tf 0 g").unwrap();
        let stream =
            text_appearance("1.234,56", 200.0, 20.0, TextAlignment::Right, &da, fallback_font())
                .unwrap();

        assert_eq!(stream.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Form");
        let content = String::from_utf8_lossy(&stream.content);
        assert!(content.contains("/Tx BMC"));
        assert!(content.contains("(1.234,56) Tj"));

        let decoded = Content::decode(&stream.content).unwrap();
        let tf = decoded
            .operations
            .iter()
            .find(|op| op.operator == "Tf")
            .unwrap();
        assert_eq!(tf.operands[0].as_name().unwrap(), b"Helv");
        assert_eq!(number(&tf.operands[1]), Some(10.0));

        let td = decoded
            .operations
            .iter()
            .find(|op| op.operator == "Td")
            .unwrap();
        let x = number(&td.operands[0]).unwrap();
        // 右寄せ: 右端の余白から文字幅を引いた位置
        let expected = 200.0 - PADDING - text_width(b"1.234,56", 10.0);
        assert!((x - expected).abs() < 0.01);
    }
}
