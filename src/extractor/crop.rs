//! 본문 영역만 남긴 PDF 저장
//!
//! 각 페이지의 CropBox를 본문 영역으로 설정하고, 목록에 없는 페이지는 삭제합니다.

use std::path::Path;

use lopdf::{Document, Object};

use super::pdf::page_box;
use super::ReaderError;
use crate::layout::BodyBounds;

/// 한 페이지의 잘라낼 영역 (페이지 좌상단 기준 좌표)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCrop {
    pub page: u32,
    pub bounds: BodyBounds,
}

/// 잘라낸 PDF 저장
///
/// `crops`에 없는 페이지는 결과 문서에서 빠집니다.
pub fn write_cropped_pdf(src: &Path, dst: &Path, crops: &[PageCrop]) -> Result<(), ReaderError> {
    let mut doc = Document::load(src).map_err(|source| ReaderError::Pdf {
        path: src.to_path_buf(),
        source,
    })?;

    apply_crops(&mut doc, crops);

    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ReaderError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    doc.save(dst).map_err(|e| ReaderError::Write {
        path: dst.to_path_buf(),
        message: e.to_string(),
    })?;

    tracing::info!("Cropped PDF written to {:?} ({} pages)", dst, crops.len());
    Ok(())
}

/// 메모리상의 문서에 CropBox 적용 + 제외 페이지 삭제
pub fn apply_crops(doc: &mut Document, crops: &[PageCrop]) {
    let pages = doc.get_pages();
    let mut removed = Vec::new();

    for (&number, &page_id) in pages.iter() {
        let Some(crop) = crops.iter().find(|c| c.page == number) else {
            removed.push(number);
            continue;
        };

        let [llx, lly, urx, ury] = page_box(doc, page_id);
        let top = ury.max(lly);
        let rect = vec![
            Object::Real(llx as f32),
            Object::Real((top - crop.bounds.bottom) as f32),
            Object::Real(urx as f32),
            Object::Real((top - crop.bounds.top) as f32),
        ];

        match doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            Ok(dict) => {
                dict.set("CropBox", Object::Array(rect));
            }
            Err(e) => tracing::warn!("Cannot set CropBox on page {}: {}", number, e),
        }
    }

    if !removed.is_empty() {
        doc.delete_pages(&removed);
    }
}
