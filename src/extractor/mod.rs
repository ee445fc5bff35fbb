//! 문서 리더 모듈
//!
//! 파일 형식별 리더가 페이지마다 위치가 있는 텍스트 블록과 메타데이터를 돌려줍니다.
//! 핵심 파이프라인은 형식을 모르며, 확장자 → 리더 매핑(`ReaderRegistry`)을
//! 설정 값으로 받아 사용합니다.
//! - PDF 파일: lopdf 콘텐츠 스트림 해석

pub mod crop;
pub mod pdf;

#[cfg(test)]
pub(crate) mod test_pdf;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use pdf::PdfReader;

use crate::layout::RawPage;

// ============================================================================
// Errors
// ============================================================================

/// 문서 읽기 실패
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse PDF {path:?}: {source}")]
    Pdf {
        path: PathBuf,
        source: lopdf::Error,
    },

    #[error("failed to write {path:?}: {message}")]
    Write { path: PathBuf, message: String },
}

// ============================================================================
// Raw Document
// ============================================================================

/// 문서 수준 메타데이터 (리더가 채움)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    /// 전체 페이지 수 (본문이 빈 페이지 포함)
    pub page_count: usize,
}

/// 리더 출력: 페이지별 블록 + 메타데이터
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDocument {
    pub pages: Vec<RawPage>,
    pub info: DocumentInfo,
}

// ============================================================================
// DocumentReader Trait
// ============================================================================

/// 파일 형식별 리더 트레이트
pub trait DocumentReader: Send + Sync {
    /// 출력 메타데이터의 `file_type` 태그
    fn file_type(&self) -> &'static str;

    /// 파일을 열어 페이지 블록과 메타데이터 추출
    fn read_document(&self, path: &Path) -> Result<RawDocument, ReaderError>;
}

// ============================================================================
// Reader Registry
// ============================================================================

/// 확장자 → 리더 매핑
#[derive(Clone, Default)]
pub struct ReaderRegistry {
    readers: BTreeMap<String, Arc<dyn DocumentReader>>,
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderRegistry")
            .field("extensions", &self.readers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ReaderRegistry {
    /// 빈 레지스트리
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 지원 형식 (PDF)
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("pdf", Arc::new(PdfReader::new()));
        registry
    }

    /// 확장자에 리더 등록 (앞의 점과 대소문자 무시)
    pub fn register(&mut self, extension: &str, reader: Arc<dyn DocumentReader>) {
        self.readers.insert(normalize_extension(extension), reader);
    }

    /// 경로의 확장자에 맞는 리더
    pub fn reader_for(&self, path: &Path) -> Option<Arc<dyn DocumentReader>> {
        let ext = path.extension()?.to_str()?;
        self.readers.get(&normalize_extension(ext)).cloned()
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.reader_for(path).is_some()
    }

    /// 등록된 확장자 (정렬됨)
    pub fn extensions(&self) -> Vec<String> {
        self.readers.keys().cloned().collect()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct StubReader;

    impl DocumentReader for StubReader {
        fn file_type(&self) -> &'static str {
            "txt"
        }

        fn read_document(&self, _path: &Path) -> Result<RawDocument, ReaderError> {
            Ok(RawDocument::default())
        }
    }

    #[test]
    fn test_registry_dispatch_by_extension() {
        let registry = ReaderRegistry::with_defaults();

        let reader = registry.reader_for(Path::new("report.PDF")).unwrap();
        assert_eq!(reader.file_type(), "pdf");
        assert!(registry.reader_for(Path::new("notes.docx")).is_none());
        assert!(registry.reader_for(Path::new("no_extension")).is_none());
    }

    #[test]
    fn test_register_additional_format() {
        let mut registry = ReaderRegistry::with_defaults();
        registry.register(".TXT", Arc::new(StubReader));

        assert!(registry.supports(Path::new("a.txt")));
        assert_eq!(registry.extensions(), vec!["pdf".to_string(), "txt".to_string()]);
    }
}
