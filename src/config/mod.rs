//! 설정 모듈
//!
//! 프로세스 시작 시 한 번 만들어 참조로 전달하는 설정 값입니다.
//! 환경변수로 기본값을 덮어쓸 수 있고, CLI 플래그가 최종 우선순위를 갖습니다.
//!
//! | 환경변수 | 기본값 |
//! |----------|--------|
//! | `DOCUGENIE_HEADER_THRESHOLD` | 0.1 |
//! | `DOCUGENIE_FOOTER_THRESHOLD` | 0.9 |
//! | `DOCUGENIE_EXCLUDE_HEADERS` | true |
//! | `DOCUGENIE_EXCLUDE_FOOTERS` | true |
//! | `DOCUGENIE_CHUNK_SIZE` | 800 |
//! | `DOCUGENIE_CHUNK_OVERLAP` | 300 |

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::chunking::ChunkConfig;
use crate::layout::ThresholdConfig;

// ============================================================================
// Errors
// ============================================================================

/// 설정 오류 (처리 시작 전에 거부)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    FractionOutOfRange { name: &'static str, value: f64 },

    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },

    #[error("invalid page range {0:?} (expected e.g. \"1,2,3-5\")")]
    InvalidPageRange(String),

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.local/share/docugenie 등)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docugenie")
}

// ============================================================================
// Settings
// ============================================================================

/// 프로세스 전역 기본 설정
#[derive(Debug, Clone)]
pub struct Settings {
    pub thresholds: ThresholdConfig,
    pub chunking: ChunkConfig,
    /// 잘라낸 PDF 등 산출물 기본 위치
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            chunking: ChunkConfig::default(),
            data_dir: get_data_dir(),
        }
    }
}

impl Settings {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정 구성 (테스트에서 환경변수 대신 사용)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let t = &mut settings.thresholds;

        if let Some(v) = parse_var(&lookup, "DOCUGENIE_HEADER_THRESHOLD")? {
            t.header_fraction = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCUGENIE_FOOTER_THRESHOLD")? {
            t.footer_fraction = v;
        }
        if let Some(v) = parse_bool_var(&lookup, "DOCUGENIE_EXCLUDE_HEADERS")? {
            t.exclude_headers = v;
        }
        if let Some(v) = parse_bool_var(&lookup, "DOCUGENIE_EXCLUDE_FOOTERS")? {
            t.exclude_footers = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCUGENIE_CHUNK_SIZE")? {
            settings.chunking.chunk_size = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCUGENIE_CHUNK_OVERLAP")? {
            settings.chunking.chunk_overlap = v;
        }

        settings.thresholds.validate()?;
        settings.chunking.validate()?;
        Ok(settings)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
    }
}

fn parse_bool_var<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnv { key, value: raw }),
        },
    }
}

// ============================================================================
// Page Set
// ============================================================================

static RANGE_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*(?:-\s*(\d+)\s*)?$").expect("Invalid regex"));

/// 1부터 시작하는 페이지 번호 집합
///
/// `"1,2,3-5"` 형식의 범위 표현식에서 만듭니다.
/// 범위는 정렬 후 겹치거나 맞닿은 것끼리 합쳐 저장하므로, 범위 크기와 무관하게
/// 표현식 길이만큼의 메모리만 사용합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSet(Vec<RangeInclusive<u32>>);

impl PageSet {
    /// 범위 표현식 파싱 (빈 문자열은 빈 집합)
    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        if expr.trim().is_empty() {
            return Ok(Self::default());
        }

        let invalid = || ConfigError::InvalidPageRange(expr.to_string());
        let mut ranges = Vec::new();

        for part in expr.split(',') {
            let caps = RANGE_PART.captures(part).ok_or_else(invalid)?;
            let start: u32 = caps[1].parse().map_err(|_| invalid())?;
            let end: u32 = match caps.get(2) {
                Some(m) => m.as_str().parse().map_err(|_| invalid())?,
                None => start,
            };

            if start == 0 || end < start {
                return Err(invalid());
            }
            ranges.push(start..=end);
        }

        Ok(Self(merge_ranges(ranges)))
    }

    pub fn contains(&self, page: u32) -> bool {
        self.0.iter().any(|r| r.contains(&page))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 합쳐진 범위 (오름차순)
    pub fn ranges(&self) -> &[RangeInclusive<u32>] {
        &self.0
    }

    /// 포함된 페이지 번호 (오름차순, 지연 생성)
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().flat_map(|r| r.clone())
    }
}

fn merge_ranges(mut ranges: Vec<RangeInclusive<u32>>) -> Vec<RangeInclusive<u32>> {
    ranges.sort_by_key(|r| *r.start());

    let mut merged: Vec<RangeInclusive<u32>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if *range.start() <= last.end().saturating_add(1) => {
                let end = (*last.end()).max(*range.end());
                *last = *last.start()..=end;
            }
            _ => merged.push(range),
        }
    }
    merged
}

impl FromStr for PageSet {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.thresholds, ThresholdConfig::default());
        assert_eq!(settings.chunking.chunk_size, 800);
        assert_eq!(settings.chunking.chunk_overlap, 300);
    }

    #[test]
    fn test_settings_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("DOCUGENIE_HEADER_THRESHOLD", "0.05"),
            ("DOCUGENIE_EXCLUDE_FOOTERS", "false"),
            ("DOCUGENIE_CHUNK_SIZE", "400"),
            ("DOCUGENIE_CHUNK_OVERLAP", "50"),
        ]))
        .unwrap();

        assert_eq!(settings.thresholds.header_fraction, 0.05);
        assert!(!settings.thresholds.exclude_footers);
        assert_eq!(settings.chunking.chunk_size, 400);
        assert_eq!(settings.chunking.chunk_overlap, 50);
    }

    #[test]
    fn test_settings_rejects_bad_values() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[("DOCUGENIE_EXCLUDE_HEADERS", "maybe")])),
            Err(ConfigError::InvalidEnv { .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("DOCUGENIE_FOOTER_THRESHOLD", "2.0")])),
            Err(ConfigError::FractionOutOfRange { .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("DOCUGENIE_CHUNK_SIZE", "200")])),
            Err(ConfigError::OverlapTooLarge { .. })
        ));
    }

    #[test]
    fn test_page_set_parse() {
        let set = PageSet::parse("1-3,5").unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 2, 3, 5]);

        let spaced = PageSet::parse(" 2 , 4 - 6 ").unwrap();
        assert_eq!(spaced.iter().collect::<Vec<_>>(), vec![2, 4, 5, 6]);

        assert!(PageSet::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_page_set_wide_range_stays_compact() {
        let set = PageSet::parse("1-4294967295").unwrap();

        assert!(set.contains(1));
        assert!(set.contains(2_000_000_000));
        assert!(set.contains(u32::MAX));
        assert!(!set.contains(0));
        assert_eq!(set.ranges(), &[1..=u32::MAX]);
    }

    #[test]
    fn test_page_set_merges_overlapping_ranges() {
        let set = PageSet::parse("7,3-5,1-2,4-6,10").unwrap();
        assert_eq!(set.ranges(), &[1..=7, 10..=10]);
        assert_eq!(set, PageSet::parse("1-7,10").unwrap());
        assert!(!set.contains(8));
    }

    #[test]
    fn test_page_set_rejects_malformed() {
        for bad in ["a", "1-", "0", "5-3", "1,,2", "1-2-3"] {
            assert!(PageSet::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
