//! docugenie - PDF 머리글/바닥글 제거 + 페이지 인식 청킹
//!
//! 페이지 위치 기준으로 머리글과 바닥글 블록을 걸러낸 뒤, 본문을 재귀 분할 청킹하고
//! 각 청크에 원본 페이지 번호를 붙입니다.

pub mod chunking;
pub mod cli;
pub mod collector;
pub mod config;
pub mod extractor;
pub mod layout;
pub mod pipeline;

// Re-exports
pub use chunking::{
    attribute_pages, index_pages, ChunkConfig, Chunker, IndexedText, OffsetRange,
    RecursiveChunker,
};
pub use config::{get_data_dir, ConfigError, PageSet, Settings};
pub use extractor::{DocumentInfo, DocumentReader, PdfReader, RawDocument, ReaderError, ReaderRegistry};
pub use layout::{classify, extract_page_bodies, partition, PageBody, RawPage, TextBlock, ThresholdConfig};
pub use pipeline::{
    chunk_pages, BatchOutput, Chunk, DocumentHandler, DocumentMetadata, ProcessError,
    ProcessOptions, ProcessedDocument,
};
