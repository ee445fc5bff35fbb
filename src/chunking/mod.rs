//! Chunking 모듈 - 페이지 추적 청킹
//!
//! - Offsets: 페이지 본문 연결 + 페이지별 문자 범위
//! - Splitter: 구분자 우선순위 재귀 분할 (오버랩 포함)
//! - Attribution: 청크를 원래 페이지로 매핑

mod attribution;
mod offsets;
mod splitter;

// Re-exports
pub use attribution::attribute_pages;
pub use offsets::{index_pages, IndexedText, OffsetRange};
pub use splitter::{ChunkConfig, Chunker, RecursiveChunker, DEFAULT_SEPARATORS};

/// 문자(char) 단위 길이
#[inline]
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}
