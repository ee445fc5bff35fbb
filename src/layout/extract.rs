//! 페이지 본문 추출
//!
//! 문서의 모든 페이지에 블록 분류를 적용하여 (본문 텍스트, 페이지 번호) 목록을 만듭니다.

use serde::{Deserialize, Serialize};

use super::{classify, TextBlock, ThresholdConfig};
use crate::config::PageSet;

/// 리더가 돌려주는 한 페이지의 원시 블록 데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    /// 페이지 번호 (1부터 시작)
    pub number: u32,
    pub width: f64,
    pub height: f64,
    pub blocks: Vec<TextBlock>,
}

/// 머리글/바닥글이 제거된 페이지 본문
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBody {
    pub text: String,
    /// 페이지 번호 (1부터 시작)
    pub page: u32,
}

/// 페이지별 본문 추출
///
/// 페이지 번호 오름차순으로 처리하며, 본문이 비는 페이지와 `excluded`에 포함된
/// 페이지는 결과에 나타나지 않습니다 (빈 문자열 자리표시자도 만들지 않음).
pub fn extract_page_bodies(
    pages: &[RawPage],
    config: &ThresholdConfig,
    excluded: &PageSet,
) -> Vec<PageBody> {
    let mut ordered: Vec<&RawPage> = pages.iter().collect();
    ordered.sort_by_key(|p| p.number);

    let mut bodies = Vec::with_capacity(ordered.len());

    for page in ordered {
        if excluded.contains(page.number) {
            tracing::debug!("Page {} excluded by page filter", page.number);
            continue;
        }

        let body = classify(&page.blocks, page.height, config);
        if body.iter().all(|b| b.text.is_empty()) {
            tracing::debug!("Page {} has no body text after filtering", page.number);
            continue;
        }

        let text = body
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        bodies.push(PageBody {
            text,
            page: page.number,
        });
    }

    bodies
}
