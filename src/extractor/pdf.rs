//! PDF 블록 추출 모듈
//!
//! lopdf로 페이지 콘텐츠 스트림을 해석하여 위치가 있는 텍스트 블록을 만듭니다.
//! 텍스트 상태(`Tm`, `Td`, `TL`, `Tf` ...)와 CTM을 추적하고, 기준선 간격이
//! 글꼴 크기의 1.5배를 넘거나 위로 되돌아가면 새 블록을 시작합니다.

use std::path::Path;

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

use super::{DocumentInfo, DocumentReader, RawDocument, ReaderError};
use crate::layout::{RawPage, TextBlock};

/// MediaBox가 없을 때 사용하는 US Letter
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];
/// 같은 블록으로 묶는 최대 줄 간격 (글꼴 크기 배수)
const BLOCK_LINE_GAP: f64 = 1.5;
/// 같은 줄로 보는 기준선 차이 (글꼴 크기 배수)
const SAME_LINE_TOLERANCE: f64 = 0.5;
/// 글리프 폭을 모를 때 쓰는 평균 폭 (글꼴 크기 배수)
const AVG_GLYPH_WIDTH: f64 = 0.5;
/// 상속된 속성을 찾을 때 따라갈 최대 Parent 깊이
const MAX_PARENT_DEPTH: usize = 16;

// ============================================================================
// PdfReader
// ============================================================================

/// PDF 리더
#[derive(Debug, Default, Clone)]
pub struct PdfReader;

impl PdfReader {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentReader for PdfReader {
    fn file_type(&self) -> &'static str {
        "pdf"
    }

    fn read_document(&self, path: &Path) -> Result<RawDocument, ReaderError> {
        let bytes = std::fs::read(path).map_err(|source| ReaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc = Document::load_mem(&bytes).map_err(|source| ReaderError::Pdf {
            path: path.to_path_buf(),
            source,
        })?;

        let document = read_loaded_document(&doc);
        tracing::debug!(
            "Read {} pages from {:?} ({} blocks)",
            document.pages.len(),
            path,
            document.pages.iter().map(|p| p.blocks.len()).sum::<usize>()
        );
        Ok(document)
    }
}

/// 이미 파싱된 문서에서 페이지 블록과 메타데이터 추출
pub fn read_loaded_document(doc: &Document) -> RawDocument {
    let page_ids = doc.get_pages();
    let mut pages = Vec::with_capacity(page_ids.len());

    for (&number, &page_id) in page_ids.iter() {
        let [llx, lly, urx, ury] = page_box(doc, page_id);
        let height = (ury - lly).abs();
        let width = (urx - llx).abs();

        let blocks = match page_operations(doc, page_id) {
            Ok(ops) => {
                let mut builder = BlockBuilder::new(ury.max(lly));
                builder.run(&ops);
                builder.finish()
            }
            Err(e) => {
                tracing::warn!("Failed to decode content of page {}: {}", number, e);
                Vec::new()
            }
        };

        pages.push(RawPage {
            number,
            width,
            height,
            blocks,
        });
    }

    RawDocument {
        info: DocumentInfo {
            title: info_string(doc, b"Title"),
            author: info_string(doc, b"Author"),
            page_count: pages.len(),
        },
        pages,
    }
}

fn page_operations(doc: &Document, page_id: ObjectId) -> Result<Vec<lopdf::content::Operation>, lopdf::Error> {
    let content = doc.get_page_content(page_id)?;
    Ok(Content::decode(&content)?.operations)
}

// ============================================================================
// Page Geometry
// ============================================================================

/// 페이지 MediaBox `[llx, lly, urx, ury]` (Parent에서 상속 포함)
pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let mut current = doc.get_dictionary(page_id).ok();

    for _ in 0..MAX_PARENT_DEPTH {
        let Some(dict) = current else { break };

        if let Ok(obj) = dict.get(b"MediaBox") {
            if let Some(rect) = rect_from(doc, obj) {
                return rect;
            }
        }

        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok();
    }

    DEFAULT_MEDIA_BOX
}

fn rect_from(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let arr = resolve(doc, obj).as_array().ok()?;
    if arr.len() < 4 {
        return None;
    }
    Some([
        number(resolve(doc, &arr[0]))?,
        number(resolve(doc, &arr[1]))?,
        number(resolve(doc, &arr[2]))?,
        number(resolve(doc, &arr[3]))?,
    ])
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

// ============================================================================
// Metadata
// ============================================================================

fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let dict = resolve(doc, info).as_dict().ok()?;
    match resolve(doc, dict.get(key).ok()?) {
        Object::String(bytes, _) => {
            let text = decode_pdf_string(bytes);
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}

/// PDF 문자열 디코딩 (UTF-16BE BOM → UTF-8 → Latin-1 순)
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

// ============================================================================
// Text State Machine
// ============================================================================

/// 2D 아핀 행렬 `[a b c d e f]` (PDF 행벡터 규약)
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f64, ty: f64) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`
    fn mul(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn origin(&self) -> (f64, f64) {
        (self.0[4], self.0[5])
    }

    fn vertical_scale(&self) -> f64 {
        self.0[2].hypot(self.0[3])
    }

}

/// 한 줄 안에 쌓이는 텍스트
#[derive(Debug)]
struct Line {
    text: String,
    baseline: f64,
    x0: f64,
    x_end: f64,
    size: f64,
}

/// 진행 중인 블록
#[derive(Debug)]
struct OpenBlock {
    lines: Vec<Line>,
}

impl OpenBlock {
    fn into_text_block(self) -> Option<TextBlock> {
        let first = self.lines.first()?;
        let last = self.lines.last()?;
        let top = first.baseline - first.size;
        let bottom = last.baseline + last.size * 0.25;
        let x0 = self.lines.iter().map(|l| l.x0).fold(f64::INFINITY, f64::min);
        let x1 = self.lines.iter().map(|l| l.x_end).fold(f64::NEG_INFINITY, f64::max);

        let text = self
            .lines
            .iter()
            .map(|l| l.text.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return None;
        }

        Some(TextBlock::new(x0, top, x1, bottom, text))
    }
}

/// 콘텐츠 스트림 연산자를 따라가며 블록을 만드는 상태 기계
struct BlockBuilder {
    /// MediaBox 상단 y (좌표 뒤집기 기준)
    page_top: f64,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font_size: f64,
    leading: f64,
    current: Option<OpenBlock>,
    blocks: Vec<TextBlock>,
}

impl BlockBuilder {
    fn new(page_top: f64) -> Self {
        Self {
            page_top,
            ctm: Matrix::IDENTITY,
            ctm_stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font_size: 12.0,
            leading: 0.0,
            current: None,
            blocks: Vec::new(),
        }
    }

    fn run(&mut self, ops: &[lopdf::content::Operation]) {
        for op in ops {
            let nums: Vec<f64> = op.operands.iter().filter_map(number).collect();

            match op.operator.as_str() {
                "q" => self.ctm_stack.push(self.ctm),
                "Q" => {
                    if let Some(m) = self.ctm_stack.pop() {
                        self.ctm = m;
                    }
                }
                "cm" if nums.len() == 6 => {
                    let m = Matrix([nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]]);
                    self.ctm = m.mul(&self.ctm);
                }
                "BT" => {
                    self.tm = Matrix::IDENTITY;
                    self.tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(&size) = nums.last() {
                        self.font_size = size;
                    }
                }
                "TL" if !nums.is_empty() => self.leading = nums[0],
                "Td" if nums.len() == 2 => self.move_line(nums[0], nums[1]),
                "TD" if nums.len() == 2 => {
                    self.leading = -nums[1];
                    self.move_line(nums[0], nums[1]);
                }
                "Tm" if nums.len() == 6 => {
                    self.tlm = Matrix([nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]]);
                    self.tm = self.tlm;
                }
                "T*" => self.next_line(),
                "Tj" | "TJ" => self.show(&op.operands),
                "'" => {
                    self.next_line();
                    self.show(&op.operands);
                }
                "\"" => {
                    self.next_line();
                    self.show(op.operands.get(2..).unwrap_or_default());
                }
                _ => {}
            }
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translate(tx, ty).mul(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn show(&mut self, operands: &[Object]) {
        let text: String = operands.iter().map(operand_text).collect();
        if text.is_empty() {
            return;
        }

        let device = self.tm.mul(&self.ctm);
        let (x, y) = device.origin();
        let size = (self.font_size * device.vertical_scale()).abs().max(1.0);
        let baseline = self.page_top - y;

        // 진행 폭은 텍스트 공간 단위이므로 Tm 배율까지 거쳐 장치 좌표로 변환
        let advance = text.chars().count() as f64 * self.font_size * AVG_GLYPH_WIDTH;
        self.tm = Matrix::translate(advance, 0.0).mul(&self.tm);
        let (x_end, _) = self.tm.mul(&self.ctm).origin();

        self.place(text, x, x_end, baseline, size);
    }

    fn place(&mut self, text: String, x: f64, x_end: f64, baseline: f64, size: f64) {
        if let Some(block) = self.current.as_mut() {
            if let Some(line) = block.lines.last_mut() {
                let delta = baseline - line.baseline;
                let reference = line.size.max(size);

                if delta.abs() <= reference * SAME_LINE_TOLERANCE {
                    if x > line.x_end + reference * 0.25 && !line.text.ends_with(' ') {
                        line.text.push(' ');
                    }
                    line.text.push_str(&text);
                    line.x_end = line.x_end.max(x_end);
                    return;
                }

                if delta > 0.0 && delta <= reference * BLOCK_LINE_GAP {
                    block.lines.push(Line {
                        text,
                        baseline,
                        x0: x,
                        x_end,
                        size,
                    });
                    return;
                }
            }
        }

        if text.trim().is_empty() {
            return;
        }

        self.close_block();
        self.current = Some(OpenBlock {
            lines: vec![Line {
                text,
                baseline,
                x0: x,
                x_end,
                size,
            }],
        });
    }

    fn close_block(&mut self) {
        if let Some(block) = self.current.take().and_then(OpenBlock::into_text_block) {
            self.blocks.push(block);
        }
    }

    fn finish(mut self) -> Vec<TextBlock> {
        self.close_block();
        self.blocks
    }
}

/// 텍스트 표시 연산자의 피연산자 → 문자열
fn operand_text(operand: &Object) -> String {
    match operand {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        Object::Array(items) => items
            .iter()
            .map(|item| match item {
                Object::String(bytes, _) => decode_pdf_string(bytes),
                // 큰 음수 자간 조정은 보통 단어 사이 공백
                other => match number(other) {
                    Some(n) if n < -100.0 => " ".to_string(),
                    _ => String::new(),
                },
            })
            .collect(),
        _ => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::test_pdf::build_pdf;

    #[test]
    fn test_blocks_follow_page_geometry() {
        let doc = build_pdf(&[&[(760.0, "Running Header"), (500.0, "Body text"), (30.0, "Page 1")]]);
        let raw = read_loaded_document(&doc);

        assert_eq!(raw.pages.len(), 1);
        let page = &raw.pages[0];
        assert_eq!(page.number, 1);
        assert_eq!(page.height, 792.0);

        let mut blocks = page.blocks.clone();
        blocks.sort_by(|a, b| a.top.total_cmp(&b.top));
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Running Header", "Body text", "Page 1"]);

        // 기준선 792 - 500 = 292, 글꼴 12
        assert!((blocks[1].top - 280.0).abs() < 1e-6);
    }

    #[test]
    fn test_adjacent_lines_form_one_block() {
        let doc = build_pdf(&[&[(500.0, "first line"), (486.0, "second line")]]);
        let raw = read_loaded_document(&doc);

        assert_eq!(raw.pages[0].blocks.len(), 1);
        assert_eq!(raw.pages[0].blocks[0].text, "first line\nsecond line");
    }

    #[test]
    fn test_metadata_from_info_dictionary() {
        let mut doc = build_pdf(&[&[(500.0, "x")]]);
        let mut info = lopdf::Dictionary::new();
        info.set("Title", Object::string_literal("Meditations"));
        let info_id = doc.add_object(Object::Dictionary(info));
        doc.trailer.set("Info", Object::Reference(info_id));

        let raw = read_loaded_document(&doc);
        assert_eq!(raw.info.title.as_deref(), Some("Meditations"));
        assert_eq!(raw.info.author, None);
        assert_eq!(raw.info.page_count, 1);
    }

    #[test]
    fn test_read_document_from_disk() {
        let mut doc = build_pdf(&[&[(500.0, "one")], &[(400.0, "two")]]);
        let file = tempfile::NamedTempFile::new().unwrap();
        doc.save(file.path()).unwrap();

        let raw = PdfReader::new().read_document(file.path()).unwrap();
        assert_eq!(raw.pages.len(), 2);
        assert_eq!(raw.pages[1].blocks[0].text, "two");
    }

    #[test]
    fn test_corrupt_file_is_reader_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a pdf").unwrap();

        let err = PdfReader::new().read_document(file.path()).unwrap_err();
        assert!(matches!(err, ReaderError::Pdf { .. }));
    }

    #[test]
    fn test_text_matrix_scale_keeps_runs_joined() {
        use lopdf::content::Operation;

        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 1.into()]),
            Operation::new(
                "Tm",
                vec![12.into(), 0.into(), 0.into(), 12.into(), 50.into(), 500.into()],
            ),
            Operation::new("Tj", vec![Object::string_literal("Hel")]),
            Operation::new("Tj", vec![Object::string_literal("lo")]),
            Operation::new("ET", vec![]),
        ];

        let mut builder = BlockBuilder::new(792.0);
        builder.run(&ops);
        let blocks = builder.finish();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Hello");
        // 기준선 792 - 500 = 292, 실제 글꼴 크기 1 × 12
        assert!((blocks[0].top - 280.0).abs() < 1e-6);
        // "Hello" 5글자 × 0.5 × 12
        assert!((blocks[0].x1 - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_tj_array_kerning_becomes_space() {
        let arr = Object::Array(vec![
            Object::string_literal("Hello"),
            Object::Integer(-250),
            Object::string_literal("World"),
        ]);
        assert_eq!(operand_text(&arr), "Hello World");
    }

    #[test]
    fn test_decode_utf16_string() {
        let bytes = [0xFE, 0xFF, 0x00, 0x41, 0xAC, 0x00];
        assert_eq!(decode_pdf_string(&bytes), "A가");
    }

    #[test]
    fn test_matrix_translate() {
        let m = Matrix::translate(10.0, 20.0).mul(&Matrix([2.0, 0.0, 0.0, 2.0, 5.0, 5.0]));
        assert_eq!(m.origin(), (25.0, 45.0));
    }
}
