//! Recursive Text Splitter
//!
//! 구분자 우선순위에 따라 텍스트를 재귀적으로 나누고, 조각을 청크 크기까지
//! 탐욕적으로 채운 뒤 오버랩만큼 되돌아가며 다음 청크를 만듭니다.
//!
//! 길이는 모두 문자(char) 단위입니다.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::char_len;
use crate::config::ConfigError;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 기본 구분자 우선순위 (문단 → 줄 → 문장부호 → 공백 → 문자)
pub const DEFAULT_SEPARATORS: [&str; 7] = ["\n\n", "\n", ".", "?", "!", " ", ""];

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 오버랩 크기 (문자 수)
    pub chunk_overlap: usize,
    /// 구분자 우선순위 (빈 문자열은 문자 단위 절단)
    pub separators: Vec<String>,
    /// 청크 앞뒤 공백 제거
    pub strip_whitespace: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 300,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            strip_whitespace: true,
        }
    }
}

impl ChunkConfig {
    /// 크기/오버랩만 지정
    pub fn with_size(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }

    /// 청킹 전에 설정 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.chunk_overlap,
                size: self.chunk_size,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 구분자 우선순위 기반 재귀 청커
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    /// 설정으로 생성 (잘못된 설정은 거부)
    pub fn new(config: ChunkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 기본 설정으로 생성 (800 / 300)
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
        }
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();

        // 텍스트에 나타나는 첫 구분자 선택, 나머지는 재귀용
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut good: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                chunks.extend(self.merge_splits(&good));
                good.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge_splits(&good));
        }

        chunks
    }

    /// 작은 조각을 청크 크기까지 채우고, 오버랩을 남기며 다음 창으로 이동
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > size && !window.is_empty() {
                if total > size {
                    tracing::warn!("Created a chunk of size {}, longer than {}", total, size);
                }
                if let Some(doc) = self.join(&window) {
                    docs.push(doc);
                }

                // 오버랩 이하가 되고 다음 조각이 들어갈 때까지 앞에서 제거
                while total > overlap || (total + len > size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        if let Some(doc) = self.join(&window) {
            docs.push(doc);
        }

        docs
    }

    fn join(&self, window: &VecDeque<(&str, usize)>) -> Option<String> {
        let joined: String = window.iter().map(|(piece, _)| *piece).collect();
        let text = if self.config.strip_whitespace {
            joined.trim().to_string()
        } else {
            joined
        };

        (!text.is_empty()).then_some(text)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return vec![];
        }
        self.split_recursive(text, &self.config.separators)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 구분자를 뒤 조각의 앞에 붙인 채로 분할 (빈 조각 제거)
///
/// 빈 구분자는 문자 단위로 나눕니다. 조각을 그대로 이어 붙이면 원문이 됩니다.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;

    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

// ============================================================================
// Tests
// ============================================================================
