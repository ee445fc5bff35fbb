//! 페이지 오프셋 인덱스
//!
//! 페이지 본문을 구분자 없이 이어 붙이고, 각 페이지가 차지하는 문자 범위를 기록합니다.

use serde::{Deserialize, Serialize};

use super::char_len;
use crate::layout::PageBody;

/// 연결된 텍스트 안에서 한 페이지가 차지하는 반열린 문자 범위 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
    pub page: u32,
}

impl OffsetRange {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 연결된 본문 + 페이지 범위
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedText {
    pub text: String,
    pub ranges: Vec<OffsetRange>,
}

impl IndexedText {
    /// 문자 단위 길이
    pub fn char_len(&self) -> usize {
        self.ranges.last().map(|r| r.end).unwrap_or(0)
    }
}

/// 페이지 본문 연결
///
/// 범위는 `[0, 문자 수)`를 입력 순서대로 빈틈·겹침 없이 나눕니다.
pub fn index_pages(bodies: &[PageBody]) -> IndexedText {
    let capacity = bodies.iter().map(|b| b.text.len()).sum();
    let mut text = String::with_capacity(capacity);
    let mut ranges = Vec::with_capacity(bodies.len());
    let mut offset = 0;

    for body in bodies {
        let len = char_len(&body.text);
        text.push_str(&body.text);
        ranges.push(OffsetRange {
            start: offset,
            end: offset + len,
            page: body.page,
        });
        offset += len;
    }

    IndexedText { text, ranges }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(text: &str, page: u32) -> PageBody {
        PageBody {
            text: text.to_string(),
            page,
        }
    }

    #[test]
    fn test_two_pages() {
        let indexed = index_pages(&[body("ABCDE", 1), body("FGHIJ", 2)]);

        assert_eq!(indexed.text, "ABCDEFGHIJ");
        assert_eq!(
            indexed.ranges,
            vec![
                OffsetRange { start: 0, end: 5, page: 1 },
                OffsetRange { start: 5, end: 10, page: 2 },
            ]
        );
    }

    #[test]
    fn test_ranges_partition_text() {
        let bodies = vec![body("첫 페이지", 1), body("second\npage", 3), body("x", 7)];
        let indexed = index_pages(&bodies);

        let mut expected_start = 0;
        for (range, body) in indexed.ranges.iter().zip(&bodies) {
            assert_eq!(range.start, expected_start);
            assert_eq!(range.page, body.page);
            let slice: String = indexed
                .text
                .chars()
                .skip(range.start)
                .take(range.len())
                .collect();
            assert_eq!(slice, body.text);
            expected_start = range.end;
        }
        assert_eq!(expected_start, indexed.text.chars().count());
        assert_eq!(indexed.char_len(), expected_start);
    }

    #[test]
    fn test_empty_input() {
        let indexed = index_pages(&[]);
        assert!(indexed.text.is_empty());
        assert!(indexed.ranges.is_empty());
    }
}
