//! 페이지 레이아웃 모듈
//!
//! 페이지 높이 대비 위치로 텍스트 블록을 머리글 / 본문 / 바닥글로 분류합니다.
//! - 블록 분류: `classify`, `partition`
//! - 본문 영역 계산: `body_bounds`
//! - 페이지 본문 추출: `extract_page_bodies`

mod extract;

pub use extract::{extract_page_bodies, PageBody, RawPage};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

// ============================================================================
// Text Block
// ============================================================================

/// 페이지 위의 사각형 텍스트 단위
///
/// 좌표는 페이지 좌상단 기준입니다 (y는 아래로 증가).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// 왼쪽 x
    pub x0: f64,
    /// 위쪽 y
    pub top: f64,
    /// 오른쪽 x
    pub x1: f64,
    /// 아래쪽 y
    pub bottom: f64,
    /// 원본 텍스트
    pub text: String,
}

impl TextBlock {
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64, text: impl Into<String>) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
            text: text.into(),
        }
    }
}

// ============================================================================
// Threshold Configuration
// ============================================================================

/// 머리글/바닥글 임계값 설정
///
/// `header_fraction < footer_fraction`을 기대하지만 강제하지 않습니다.
/// 뒤집힌 값을 주면 모든 페이지의 본문이 비게 됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// 머리글 영역 비율 (페이지 상단부터)
    pub header_fraction: f64,
    /// 바닥글 시작 비율 (페이지 상단부터)
    pub footer_fraction: f64,
    /// 머리글 제외 여부
    pub exclude_headers: bool,
    /// 바닥글 제외 여부
    pub exclude_footers: bool,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            header_fraction: 0.1,
            footer_fraction: 0.9,
            exclude_headers: true,
            exclude_footers: true,
        }
    }
}

impl ThresholdConfig {
    /// 모든 블록을 본문으로 유지하는 설정
    pub fn keep_all() -> Self {
        Self {
            exclude_headers: false,
            exclude_footers: false,
            ..Self::default()
        }
    }

    /// 비율이 [0, 1] 범위인지 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fraction("header_fraction", self.header_fraction)?;
        check_fraction("footer_fraction", self.footer_fraction)?;
        Ok(())
    }

    /// 페이지 높이에 대한 실제 임계값 계산
    pub fn thresholds(&self, page_height: f64) -> PageThresholds {
        PageThresholds {
            header: if self.exclude_headers {
                page_height * self.header_fraction
            } else {
                0.0
            },
            footer: if self.exclude_footers {
                page_height * self.footer_fraction
            } else {
                page_height
            },
        }
    }
}

fn check_fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::FractionOutOfRange { name, value })
    }
}

/// 한 페이지에 적용되는 절대 임계값 (페이지 좌표)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageThresholds {
    pub header: f64,
    pub footer: f64,
}

impl PageThresholds {
    /// 본문 판정: `header <= top <= footer` (양 끝 포함)
    #[inline]
    pub fn is_body(&self, top: f64) -> bool {
        self.header <= top && top <= self.footer
    }
}

// ============================================================================
// Classification
// ============================================================================

/// 분류 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub header: Vec<TextBlock>,
    pub body: Vec<TextBlock>,
    pub footer: Vec<TextBlock>,
}

/// 블록을 머리글 / 본문 / 바닥글로 분할
///
/// 블록은 내부에서 `top` 오름차순으로 (안정) 정렬됩니다.
/// 본문이 아닌 블록 중 머리글 임계값 위에 있는 것은 머리글, 나머지는 바닥글입니다.
pub fn partition(blocks: &[TextBlock], page_height: f64, config: &ThresholdConfig) -> PageLayout {
    let thresholds = config.thresholds(page_height);
    let mut layout = PageLayout::default();

    for block in sorted_by_top(blocks) {
        if thresholds.is_body(block.top) {
            layout.body.push(block);
        } else if block.top < thresholds.header {
            layout.header.push(block);
        } else {
            layout.footer.push(block);
        }
    }

    layout
}

/// 본문 블록만 반환 (`top` 오름차순)
pub fn classify(blocks: &[TextBlock], page_height: f64, config: &ThresholdConfig) -> Vec<TextBlock> {
    let thresholds = config.thresholds(page_height);
    sorted_by_top(blocks)
        .into_iter()
        .filter(|b| thresholds.is_body(b.top))
        .collect()
}

fn sorted_by_top(blocks: &[TextBlock]) -> Vec<TextBlock> {
    let mut sorted = blocks.to_vec();
    sorted.sort_by(|a, b| a.top.total_cmp(&b.top));
    sorted
}

// ============================================================================
// Body Bounds
// ============================================================================

/// 본문 블록을 감싸는 세로 범위 (페이지 좌표)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyBounds {
    pub top: f64,
    pub bottom: f64,
}

/// 본문 영역 계산
///
/// 본문 블록이 없으면 임계값 사이 영역을 그대로 사용합니다.
pub fn body_bounds(body: &[TextBlock], page_height: f64, config: &ThresholdConfig) -> BodyBounds {
    if body.is_empty() {
        let t = config.thresholds(page_height);
        return BodyBounds {
            top: t.header,
            bottom: t.footer,
        };
    }

    BodyBounds {
        top: body.iter().map(|b| b.top).fold(f64::INFINITY, f64::min),
        bottom: body.iter().map(|b| b.bottom).fold(f64::NEG_INFINITY, f64::max),
    }
}

// ============================================================================
// Tests
// ============================================================================
