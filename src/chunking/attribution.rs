//! 청크 → 페이지 매핑
//!
//! 각 청크의 시작 위치를 연결된 텍스트에서 처음 나타나는 위치로 찾고,
//! 그 범위와 겹치는 첫 페이지를 선택합니다.
//!
//! 첫 등장 위치 검색이므로, 문서 앞부분과 글자 그대로 같은 청크는
//! 실제 위치와 관계없이 앞쪽 페이지로 매핑됩니다.

use super::char_len;
use super::offsets::OffsetRange;

/// 청크별 페이지 번호 결정
///
/// 범위가 하나도 없으면 페이지는 `None`입니다. 범위가 있는데 일치하는 것이 없으면
/// 청크 시작 위치에서 가장 가까운 범위(동률이면 앞 페이지)를 사용합니다.
pub fn attribute_pages(
    chunks: Vec<String>,
    full_text: &str,
    ranges: &[OffsetRange],
) -> Vec<(String, Option<u32>)> {
    chunks
        .into_iter()
        .map(|chunk| {
            let page = page_for_chunk(&chunk, full_text, ranges);
            (chunk, page)
        })
        .collect()
}

fn page_for_chunk(chunk: &str, full_text: &str, ranges: &[OffsetRange]) -> Option<u32> {
    let Some(start) = find_char_offset(full_text, chunk) else {
        tracing::warn!("Chunk not found in source text, using nearest page");
        return nearest_range(ranges, 0).map(|r| r.page);
    };
    let end = start + char_len(chunk);

    let matched = ranges.iter().find(|r| {
        (r.start <= start && start < r.end) || (r.start < end && end <= r.end)
    });

    match matched {
        Some(range) => Some(range.page),
        None => {
            let fallback = nearest_range(ranges, start);
            if let Some(range) = fallback {
                tracing::warn!(
                    "No page range contains chunk at offset {}, using page {}",
                    start,
                    range.page
                );
            }
            fallback.map(|r| r.page)
        }
    }
}

/// 첫 등장 위치 (문자 단위)
fn find_char_offset(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte_idx| haystack[..byte_idx].chars().count())
}

fn nearest_range(ranges: &[OffsetRange], offset: usize) -> Option<&OffsetRange> {
    ranges.iter().min_by_key(|r| {
        if offset < r.start {
            r.start - offset
        } else if offset >= r.end {
            offset - r.end + 1
        } else {
            0
        }
    })
}
