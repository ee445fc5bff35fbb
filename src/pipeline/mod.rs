//! 문서 처리 파이프라인
//!
//! 리더 → 본문 추출 → 오프셋 인덱스 → 재귀 청킹 → 페이지 매핑 → 메타데이터 순으로
//! 실행합니다. 핵심 단계는 순수 함수이며, 실패할 수 있는 작업(파일 열기, 파싱)은
//! 리더 쪽에만 있습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let handler = DocumentHandler::new(Arc::new(ReaderRegistry::with_defaults()), options)?;
//! let doc = handler.process_file(Path::new("book.pdf"))?;
//! println!("{}", serde_json::to_string_pretty(&doc)?);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::chunking::{attribute_pages, index_pages, ChunkConfig, Chunker, RecursiveChunker};
use crate::config::{ConfigError, PageSet, Settings};
use crate::extractor::crop::PageCrop;
use crate::extractor::{RawDocument, ReaderError, ReaderRegistry};
use crate::layout::{body_bounds, classify, extract_page_bodies, RawPage, ThresholdConfig};

// ============================================================================
// Output Types
// ============================================================================

/// 페이지 번호가 붙은 청크
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 출력 순서 (0부터 시작)
    pub index: usize,
    /// 청크가 처음 겹치는 페이지 (1부터 시작)
    pub page: u32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// 문서 메타데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub num_pages: usize,
    pub num_chunks: usize,
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// 단일 문서 처리 결과
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    pub metadata: DocumentMetadata,
    pub chunks: Vec<Chunk>,
}

/// 배치에서 건너뛴 파일
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// 배치 처리 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutput {
    pub documents: Vec<DocumentMetadata>,
    pub chunks: Vec<Chunk>,
    pub skipped: Vec<SkippedFile>,
}

// ============================================================================
// Errors
// ============================================================================

/// 문서 처리 오류
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unsupported file format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error("no content extracted from {0}")]
    NoContent(String),

    #[error("No files were successfully processed")]
    EmptyBatch,

    #[error("processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// ============================================================================
// Process Options
// ============================================================================

/// 문서 하나를 처리할 때의 설정
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub thresholds: ThresholdConfig,
    pub chunking: ChunkConfig,
    /// 분류 전에 건너뛸 페이지
    pub excluded_pages: PageSet,
}

impl From<&Settings> for ProcessOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            thresholds: settings.thresholds,
            chunking: settings.chunking.clone(),
            excluded_pages: PageSet::default(),
        }
    }
}

// ============================================================================
// Core Pipeline
// ============================================================================

/// 페이지 블록 → 페이지 번호가 붙은 청크
///
/// 본문 추출, 오프셋 인덱스, 청킹, 페이지 매핑을 순서대로 실행합니다.
pub fn chunk_pages(
    pages: &[RawPage],
    thresholds: &ThresholdConfig,
    excluded: &PageSet,
    chunker: &RecursiveChunker,
) -> Vec<Chunk> {
    let bodies = extract_page_bodies(pages, thresholds, excluded);
    let indexed = index_pages(&bodies);
    let pieces = chunker.chunk(&indexed.text);

    attribute_pages(pieces, &indexed.text, &indexed.ranges)
        .into_iter()
        .filter_map(|(text, page)| match page {
            Some(page) => Some((text, page)),
            None => {
                tracing::warn!("Dropping chunk without page attribution");
                None
            }
        })
        .enumerate()
        .map(|(index, (text, page))| Chunk {
            index,
            page,
            text,
            filename: None,
        })
        .collect()
}

// ============================================================================
// Document Handler
// ============================================================================

/// 리더 선택 + 파이프라인 실행
#[derive(Debug, Clone)]
pub struct DocumentHandler {
    registry: Arc<ReaderRegistry>,
    options: ProcessOptions,
    chunker: RecursiveChunker,
}

impl DocumentHandler {
    /// 설정을 검증하고 핸들러 생성
    pub fn new(registry: Arc<ReaderRegistry>, options: ProcessOptions) -> Result<Self, ConfigError> {
        options.thresholds.validate()?;
        let chunker = RecursiveChunker::new(options.chunking.clone())?;

        Ok(Self {
            registry,
            options,
            chunker,
        })
    }

    /// 단일 파일 처리
    ///
    /// 형식 미지원, 읽기 실패, 청크 0개 모두 오류입니다.
    pub fn process_file(&self, path: &Path) -> Result<ProcessedDocument, ProcessError> {
        let (raw, file_type) = self.read(path)?;
        self.process_read(&raw, file_type, path)
    }

    /// 확장자에 맞는 리더로 파일 읽기
    pub fn read(&self, path: &Path) -> Result<(RawDocument, &'static str), ProcessError> {
        let reader = self
            .registry
            .reader_for(path)
            .ok_or_else(|| ProcessError::UnsupportedFormat(path.to_path_buf()))?;

        tracing::info!("Processing {:?} as {}", path, reader.file_type());
        let raw = reader.read_document(path)?;
        Ok((raw, reader.file_type()))
    }

    /// 읽은 문서를 단일 파일 규칙으로 처리 (청크 0개는 오류)
    pub fn process_read(
        &self,
        raw: &RawDocument,
        file_type: &str,
        path: &Path,
    ) -> Result<ProcessedDocument, ProcessError> {
        let name = file_name(path);
        let doc = self.process_raw(raw, file_type, Some(name.clone()));
        if doc.chunks.is_empty() {
            return Err(ProcessError::NoContent(name));
        }
        Ok(doc)
    }

    /// 배치용: 청크 0개도 정상 결과
    fn process_path(&self, path: &Path) -> Result<ProcessedDocument, ProcessError> {
        let (raw, file_type) = self.read(path)?;
        Ok(self.process_raw(&raw, file_type, Some(file_name(path))))
    }

    /// 이미 읽은 문서 처리
    pub fn process_raw(
        &self,
        raw: &RawDocument,
        file_type: &str,
        filename: Option<String>,
    ) -> ProcessedDocument {
        let mut chunks = chunk_pages(
            &raw.pages,
            &self.options.thresholds,
            &self.options.excluded_pages,
            &self.chunker,
        );

        if let Some(name) = &filename {
            for chunk in &mut chunks {
                chunk.filename = Some(name.clone());
            }
        }

        let metadata = DocumentMetadata {
            title: or_unknown(raw.info.title.as_deref()),
            author: or_unknown(raw.info.author.as_deref()),
            num_pages: raw.info.page_count,
            num_chunks: chunks.len(),
            file_type: file_type.to_string(),
            filename,
        };

        tracing::debug!(
            "{} pages -> {} chunks ({:?})",
            metadata.num_pages,
            metadata.num_chunks,
            metadata.filename
        );

        ProcessedDocument { metadata, chunks }
    }

    /// 제외되지 않은 페이지별 본문 영역
    pub fn page_crops(&self, raw: &RawDocument) -> Vec<PageCrop> {
        let mut pages: Vec<&RawPage> = raw
            .pages
            .iter()
            .filter(|p| !self.options.excluded_pages.contains(p.number))
            .collect();
        pages.sort_by_key(|p| p.number);

        pages
            .into_iter()
            .map(|page| {
                let body = classify(&page.blocks, page.height, &self.options.thresholds);
                PageCrop {
                    page: page.number,
                    bounds: body_bounds(&body, page.height, &self.options.thresholds),
                }
            })
            .collect()
    }

    /// 여러 파일 처리
    ///
    /// 파일은 블로킹 풀에서 최대 `jobs`개씩 동시에 읽고, 결과는 입력 순서를 유지합니다.
    /// 실패한 파일은 건너뛰며, 전체 청크가 0개일 때만 오류입니다.
    pub async fn process_batch(
        &self,
        paths: &[PathBuf],
        jobs: usize,
    ) -> Result<BatchOutput, ProcessError> {
        let results: Vec<(PathBuf, Result<ProcessedDocument, ProcessError>)> =
            stream::iter(paths.iter().cloned())
                .map(|path| {
                    let handler = self.clone();
                    async move {
                        let task_path = path.clone();
                        let result =
                            tokio::task::spawn_blocking(move || handler.process_path(&task_path))
                                .await
                                .unwrap_or_else(|e| Err(e.into()));
                        (path, result)
                    }
                })
                .buffered(jobs.max(1))
                .collect()
                .await;

        let mut output = BatchOutput::default();

        for (path, result) in results {
            match result {
                Ok(doc) => {
                    output.documents.push(doc.metadata);
                    output.chunks.extend(doc.chunks);
                }
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {}", path, e);
                    output.skipped.push(SkippedFile {
                        file: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Batch finished: {} documents, {} chunks, {} skipped",
            output.documents.len(),
            output.chunks.len(),
            output.skipped.len()
        );

        if output.chunks.is_empty() {
            return Err(ProcessError::EmptyBatch);
        }
        Ok(output)
    }
}

fn or_unknown(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{DocumentInfo, DocumentReader, PdfReader};
    use crate::layout::TextBlock;

    /// 확장자 `.stub`에 고정된 페이지를 돌려주는 리더
    struct StubReader {
        pages: Vec<RawPage>,
    }

    impl DocumentReader for StubReader {
        fn file_type(&self) -> &'static str {
            "stub"
        }

        fn read_document(&self, _path: &Path) -> Result<RawDocument, ReaderError> {
            Ok(RawDocument {
                pages: self.pages.clone(),
                info: DocumentInfo {
                    title: Some("Stub".to_string()),
                    author: None,
                    page_count: self.pages.len(),
                },
            })
        }
    }

    fn page(number: u32, blocks: &[(f64, &str)]) -> RawPage {
        RawPage {
            number,
            width: 600.0,
            height: 1000.0,
            blocks: blocks
                .iter()
                .map(|&(top, text)| TextBlock::new(0.0, top, 600.0, top + 10.0, text))
                .collect(),
        }
    }

    fn handler(pages: Vec<RawPage>, options: ProcessOptions) -> DocumentHandler {
        let mut registry = ReaderRegistry::with_defaults();
        registry.register("stub", Arc::new(StubReader { pages }));
        DocumentHandler::new(Arc::new(registry), options).unwrap()
    }

    fn small_chunks() -> ProcessOptions {
        ProcessOptions {
            chunking: ChunkConfig::with_size(6, 0),
            ..Default::default()
        }
    }

    #[test]
    fn test_chunks_split_at_page_boundary() {
        let h = handler(
            vec![page(1, &[(500.0, "ABCDE")]), page(2, &[(500.0, "FGHIJ")])],
            small_chunks(),
        );
        let doc = h.process_file(Path::new("two_pages.stub")).unwrap();

        let summary: Vec<(usize, u32, &str)> = doc
            .chunks
            .iter()
            .map(|c| (c.index, c.page, c.text.as_str()))
            .collect();
        assert_eq!(summary, vec![(0, 1, "ABCDEF"), (1, 2, "GHIJ")]);
        assert!(doc
            .chunks
            .iter()
            .all(|c| c.filename.as_deref() == Some("two_pages.stub")));
    }

    #[test]
    fn test_metadata_defaults_and_counts() {
        let h = handler(
            vec![page(1, &[(500.0, "body")]), page(2, &[(20.0, "header only")])],
            ProcessOptions::default(),
        );
        let doc = h.process_file(Path::new("doc.stub")).unwrap();

        assert_eq!(doc.metadata.title, "Stub");
        assert_eq!(doc.metadata.author, "Unknown");
        assert_eq!(doc.metadata.num_pages, 2);
        assert_eq!(doc.metadata.num_chunks, 1);
        assert_eq!(doc.metadata.file_type, "stub");
        assert_eq!(doc.chunks[0].page, 1);
    }

    #[test]
    fn test_all_pages_filtered_is_no_content() {
        let h = handler(
            vec![page(1, &[(20.0, "header")]), page(2, &[(980.0, "footer")])],
            ProcessOptions::default(),
        );
        let err = h.process_file(Path::new("empty.stub")).unwrap_err();
        assert!(matches!(err, ProcessError::NoContent(name) if name == "empty.stub"));
    }

    #[test]
    fn test_unsupported_format_is_hard_failure() {
        let h = handler(vec![], ProcessOptions::default());
        let err = h.process_file(Path::new("notes.docx")).unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_invalid_options_rejected_before_processing() {
        let options = ProcessOptions {
            chunking: ChunkConfig::with_size(200, 300),
            ..Default::default()
        };
        let err = DocumentHandler::new(Arc::new(ReaderRegistry::with_defaults()), options);
        assert!(matches!(err, Err(ConfigError::OverlapTooLarge { .. })));
    }

    #[test]
    fn test_excluded_pages_and_crops() {
        let options = ProcessOptions {
            excluded_pages: PageSet::parse("1").unwrap(),
            ..Default::default()
        };
        let h = handler(vec![], options);
        let raw = RawDocument {
            pages: vec![page(1, &[(500.0, "skip me")]), page(2, &[(300.0, "keep")])],
            info: DocumentInfo::default(),
        };

        let doc = h.process_raw(&raw, "stub", None);
        assert_eq!(doc.chunks.len(), 1);
        assert_eq!(doc.chunks[0].page, 2);
        assert_eq!(doc.chunks[0].filename, None);

        let crops = h.page_crops(&raw);
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].page, 2);
        assert_eq!(crops[0].bounds.top, 300.0);
        assert_eq!(crops[0].bounds.bottom, 310.0);
    }

    #[test]
    fn test_pdf_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.pdf");
        crate::extractor::test_pdf::build_pdf(&[
            &[(760.0, "Journal of Things"), (500.0, "Actual content."), (30.0, "Page 1")],
            &[(760.0, "Journal of Things"), (30.0, "Page 2")],
        ])
        .save(&path)
        .unwrap();

        let mut registry = ReaderRegistry::new();
        registry.register("pdf", Arc::new(PdfReader::new()));
        let h = DocumentHandler::new(Arc::new(registry), ProcessOptions::default()).unwrap();

        let doc = h.process_file(&path).unwrap();
        assert_eq!(doc.metadata.num_pages, 2);
        assert_eq!(doc.metadata.file_type, "pdf");
        assert_eq!(doc.chunks.len(), 1);
        assert_eq!(doc.chunks[0].text, "Actual content.");
        assert_eq!(doc.chunks[0].page, 1);
    }

    #[test]
    fn test_json_shape() {
        let h = handler(vec![page(1, &[(500.0, "hello")])], ProcessOptions::default());
        let doc = h.process_file(Path::new("a.stub")).unwrap();
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["metadata"]["num_chunks"], 1);
        assert_eq!(json["chunks"][0]["index"], 0);
        assert_eq!(json["chunks"][0]["page"], 1);
        assert_eq!(json["chunks"][0]["text"], "hello");
        assert_eq!(json["chunks"][0]["filename"], "a.stub");
    }

    #[tokio::test]
    async fn test_batch_skips_failures() {
        let h = handler(vec![page(1, &[(500.0, "batch body")])], ProcessOptions::default());
        let paths = vec![
            PathBuf::from("first.stub"),
            PathBuf::from("ignored.docx"),
            PathBuf::from("second.stub"),
        ];

        let out = h.process_batch(&paths, 2).await.unwrap();
        assert_eq!(out.documents.len(), 2);
        assert_eq!(out.chunks.len(), 2);
        assert_eq!(out.chunks[0].filename.as_deref(), Some("first.stub"));
        assert_eq!(out.chunks[1].filename.as_deref(), Some("second.stub"));
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].file, "ignored.docx");
    }

    #[tokio::test]
    async fn test_batch_without_chunks_fails() {
        let h = handler(vec![page(1, &[(10.0, "header")])], ProcessOptions::default());
        let paths = vec![PathBuf::from("a.stub"), PathBuf::from("missing.pdf")];

        let err = h.process_batch(&paths, 4).await.unwrap_err();
        assert!(matches!(err, ProcessError::EmptyBatch));
    }
}
