//! CLI 모듈
//!
//! docugenie CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;

use crate::collector::{CollectionStats, CollectorConfig, FileCollector};
use crate::config::{PageSet, Settings};
use crate::extractor::crop::write_cropped_pdf;
use crate::extractor::ReaderRegistry;
use crate::layout::{body_bounds, partition, TextBlock, ThresholdConfig};
use crate::pipeline::{DocumentHandler, ProcessOptions, ProcessedDocument};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "docugenie")]
#[command(version, about = "PDF 머리글/바닥글 제거 + 페이지 인식 청킹", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서를 페이지 번호가 붙은 청크 JSON으로 변환
    Process(ProcessArgs),

    /// 페이지별 머리글/본문/바닥글 분류 결과 확인
    Inspect(InspectArgs),
}

/// 분류 임계값 옵션 (환경 변수 설정을 덮어씀)
#[derive(Args, Debug, Clone, Default)]
pub struct ThresholdArgs {
    /// 머리글 임계값 (페이지 높이 비율, 0~1)
    #[arg(long, value_name = "F")]
    pub header_threshold: Option<f64>,

    /// 바닥글 임계값 (페이지 높이 비율, 0~1)
    #[arg(long, value_name = "F")]
    pub footer_threshold: Option<f64>,

    /// 머리글 제거 여부
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub exclude_headers: Option<bool>,

    /// 바닥글 제거 여부
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub exclude_footers: Option<bool>,
}

impl ThresholdArgs {
    /// 지정된 값만 덮어쓰기
    pub fn apply(&self, base: ThresholdConfig) -> ThresholdConfig {
        ThresholdConfig {
            header_fraction: self.header_threshold.unwrap_or(base.header_fraction),
            footer_fraction: self.footer_threshold.unwrap_or(base.footer_fraction),
            exclude_headers: self.exclude_headers.unwrap_or(base.exclude_headers),
            exclude_footers: self.exclude_footers.unwrap_or(base.exclude_footers),
        }
    }
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// 처리할 파일 경로
    pub files: Vec<PathBuf>,

    /// 처리할 폴더 경로 (재귀)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,

    /// 최대 청크 크기 (문자 수)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// 청크 오버랩 (문자 수)
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// 건너뛸 페이지 (예: "1-3,7")
    #[arg(long, value_name = "RANGES")]
    pub exclude_pages: Option<String>,

    /// JSON 출력 파일 (없으면 stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 본문만 남긴 PDF 저장 (경로 생략 시 데이터 디렉토리)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub crop_output: Option<Option<PathBuf>>,

    /// 동시에 처리할 파일 수
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// 확인할 파일 경로
    pub file: PathBuf,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,

    /// 블록 미리보기 글자 수
    #[arg(long, default_value = "60")]
    pub preview: usize,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Process(args) => cmd_process(args).await,
        Commands::Inspect(args) => cmd_inspect(args).await,
    }
}

/// 처리 명령어
async fn cmd_process(args: ProcessArgs) -> Result<()> {
    let settings = Settings::from_env().context("환경 변수 설정 오류")?;
    let options = build_options(&settings, &args)?;

    let registry = Arc::new(ReaderRegistry::with_defaults());
    let handler = DocumentHandler::new(registry.clone(), options).context("잘못된 설정")?;

    let single = args.files.len() == 1 && args.dir.is_none();
    let inputs = collect_inputs(&args, &registry, single)?;

    if inputs.is_empty() {
        bail!("처리할 파일이 없습니다 (파일 경로 또는 --dir를 지정하세요)");
    }

    if !single && args.crop_output.is_some() {
        bail!("--crop-output은 입력 파일이 하나일 때만 사용할 수 있습니다");
    }

    if single {
        let path = inputs[0].clone();
        let crop_dst = args
            .crop_output
            .clone()
            .map(|dst| dst.unwrap_or_else(|| default_crop_path(&settings.data_dir, &path)));

        let doc = process_single(handler, path, crop_dst.clone()).await?;
        emit(&doc, args.output.as_deref())?;

        if let Some(output) = &args.output {
            println!(
                "[OK] {}: {} 페이지, 청크 {} 개",
                doc.metadata.filename.as_deref().unwrap_or("unknown"),
                doc.metadata.num_pages,
                doc.metadata.num_chunks
            );
            println!("     JSON: {}", output.display());
        }
        if let Some(dst) = crop_dst {
            eprintln!("[OK] 잘라낸 PDF: {}", dst.display());
        }
        return Ok(());
    }

    let batch = handler
        .process_batch(&inputs, args.jobs)
        .await
        .context("배치 처리 실패")?;

    for skipped in &batch.skipped {
        eprintln!("[!] 건너뜀: {} ({})", skipped.file, skipped.reason);
    }

    emit(&batch, args.output.as_deref())?;

    if let Some(output) = &args.output {
        println!(
            "[OK] 완료: 문서 {}, 청크 {}, 건너뜀 {}",
            batch.documents.len(),
            batch.chunks.len(),
            batch.skipped.len()
        );
        println!("     JSON: {}", output.display());
    }

    Ok(())
}

/// 단일 파일: 읽기 한 번으로 청킹과 잘라낸 PDF 저장을 모두 처리
async fn process_single(
    handler: DocumentHandler,
    path: PathBuf,
    crop_dst: Option<PathBuf>,
) -> Result<ProcessedDocument> {
    let display = path.display().to_string();

    tokio::task::spawn_blocking(move || -> Result<ProcessedDocument> {
        let (raw, file_type) = handler.read(&path)?;
        let doc = handler.process_read(&raw, file_type, &path)?;

        if let Some(dst) = crop_dst {
            write_cropped_pdf(&path, &dst, &handler.page_crops(&raw))?;
        }

        Ok(doc)
    })
    .await
    .context("처리 작업 실패")?
    .with_context(|| format!("처리 실패: {}", display))
}

/// 환경 변수 설정 위에 CLI 옵션 적용
fn build_options(settings: &Settings, args: &ProcessArgs) -> Result<ProcessOptions> {
    let mut options = ProcessOptions::from(settings);
    options.thresholds = args.thresholds.apply(options.thresholds);

    if let Some(size) = args.chunk_size {
        options.chunking.chunk_size = size;
    }
    if let Some(overlap) = args.chunk_overlap {
        options.chunking.chunk_overlap = overlap;
    }
    if let Some(expr) = &args.exclude_pages {
        options.excluded_pages =
            PageSet::parse(expr).with_context(|| format!("잘못된 페이지 범위: {}", expr))?;
    }

    Ok(options)
}

/// 파일 인자와 --dir 폴더에서 입력 목록 구성
///
/// 배치에서는 찾을 수 없는 파일도 목록에 남겨 건너뜀 사유로 보고합니다.
fn collect_inputs(
    args: &ProcessArgs,
    registry: &ReaderRegistry,
    single: bool,
) -> Result<Vec<PathBuf>> {
    let collector = FileCollector::new(CollectorConfig::for_extensions(registry.extensions()));
    let mut inputs = Vec::new();

    for file in &args.files {
        match collector.collect_file(file) {
            Ok(path) => inputs.push(path),
            Err(e) if !single => {
                tracing::warn!("{}", e);
                inputs.push(file.clone());
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(dir) = &args.dir {
        let files = collector.collect_directory(dir)?;
        let stats = CollectionStats::from_files(&files);
        tracing::info!(
            "수집 대상: {} 파일, 총 크기 {}",
            stats.total_files,
            format_bytes(stats.total_size as usize)
        );
        inputs.extend(files.into_iter().map(|f| f.path));
    }

    Ok(inputs)
}

/// `<data_dir>/cropped/<stem>_cropped.pdf`
fn default_crop_path(data_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    data_dir.join("cropped").join(format!("{}_cropped.pdf", stem))
}

/// JSON 출력 (파일 또는 stdout)
fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("JSON 직렬화 실패")?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("디렉토리 생성 실패: {:?}", parent))?;
            }
            std::fs::write(path, json).with_context(|| format!("파일 쓰기 실패: {:?}", path))?;
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// 분류 확인 명령어
async fn cmd_inspect(args: InspectArgs) -> Result<()> {
    let settings = Settings::from_env().context("환경 변수 설정 오류")?;
    let thresholds = args.thresholds.apply(settings.thresholds);
    thresholds.validate().context("잘못된 임계값")?;

    let registry = ReaderRegistry::with_defaults();
    let reader = registry
        .reader_for(&args.file)
        .with_context(|| format!("지원하지 않는 파일 형식: {:?}", args.file))?;

    let path = args.file.clone();
    let raw = tokio::task::spawn_blocking(move || reader.read_document(&path))
        .await
        .context("읽기 작업 실패")??;

    println!("[*] {} ({} 페이지)", args.file.display(), raw.info.page_count);
    println!(
        "    제목: {}, 저자: {}",
        raw.info.title.as_deref().unwrap_or("Unknown"),
        raw.info.author.as_deref().unwrap_or("Unknown")
    );
    println!();

    for page in &raw.pages {
        let layout = partition(&page.blocks, page.height, &thresholds);
        let limits = thresholds.thresholds(page.height);
        let bounds = body_bounds(&layout.body, page.height, &thresholds);

        println!(
            "  p{:<4} 머리글 {:>3} | 본문 {:>3} | 바닥글 {:>3}",
            page.number,
            layout.header.len(),
            layout.body.len(),
            layout.footer.len()
        );
        println!(
            "        임계값 {:.1} ~ {:.1}, 본문 영역 {:.1} ~ {:.1} (높이 {:.1})",
            limits.header, limits.footer, bounds.top, bounds.bottom, page.height
        );

        print_blocks("H", &layout.header, args.preview);
        print_blocks("B", &layout.body, args.preview);
        print_blocks("F", &layout.footer, args.preview);
        println!();
    }

    Ok(())
}

fn print_blocks(tag: &str, blocks: &[TextBlock], preview: usize) {
    if preview == 0 {
        return;
    }
    for block in blocks {
        println!(
            "        [{}] {:>7.1}  {}",
            tag,
            block.top,
            truncate_text(&block.text, preview)
        );
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
