use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{error, info, warn};

use crate::assemble::{Assembler, Assembly};
use crate::core::model::ArticleImages;
use crate::core::transform::{CoordinateTransformer, DEFAULT_PADDING, DEFAULT_SCALE_PERCENT};
use crate::export::json_export::{IMAGES_PER_ARTICLE_FILE, TITLES_FILE};
use crate::export::{
    CompositeExporter, CropExporter, CropStats, JsonExporter, OutputLayout, SegmentExporter, SideLogs,
};
use crate::layout::{discover_issues, Issue};
use crate::ocr::{recognize_titles, TesseractBridge};
use crate::raster::{DecodedCache, Jp2Decoder, RasterDecoder, SourceDecoder};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub workers: usize,
    pub padding: u32,
    pub scale_percent: u32,
    pub detect_margins: bool,
    pub titles: bool,
    pub jp2_program: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        let workers = thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1);
        Self {
            input,
            output,
            workers,
            padding: DEFAULT_PADDING,
            scale_percent: DEFAULT_SCALE_PERCENT,
            detect_margins: false,
            titles: false,
            jp2_program: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_scale_percent(mut self, scale_percent: u32) -> Self {
        self.scale_percent = scale_percent;
        self
    }

    pub fn with_detect_margins(mut self, enabled: bool) -> Self {
        self.detect_margins = enabled;
        self
    }

    pub fn with_titles(mut self, enabled: bool) -> Self {
        self.titles = enabled;
        self
    }

    pub fn with_jp2_program(mut self, program: PathBuf) -> Self {
        self.jp2_program = Some(program);
        self
    }

    fn transformer(&self) -> CoordinateTransformer {
        CoordinateTransformer::new()
            .with_padding(self.padding)
            .with_scale_percent(self.scale_percent)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub issues: usize,
    pub rects: usize,
    pub articles: usize,
    pub unresolved: usize,
    pub crops: CropStats,
    pub composites: usize,
}

/// Runs every phase over all issues under `config.input`.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let layout = OutputLayout::new(config.output.clone());
    let logs = SideLogs::new(config.output.clone());
    layout.clear_outputs()?;
    logs.clear()?;

    let issues = discover_issues(&config.input)?;
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .context("failed to build worker pool")?;
    info!(issues = issues.len(), workers = config.workers, "starting run");

    let mut jp2 = Jp2Decoder::new(layout.decoded_dir());
    if let Some(program) = &config.jp2_program {
        jp2 = jp2.with_program(program.clone());
    }
    let cache = DecodedCache::new(layout.decoded_dir(), SourceDecoder::new(jp2));

    let decoded: usize = partitioned(&pool, config.workers, &issues, |issue| warm_cache(&cache, issue))
        .into_iter()
        .sum();
    info!(pages = decoded, "decoded pages");

    let assembly = assemble_and_export(&issues, config, &logs)?;

    let cropper = CropExporter::new(&layout, &cache, &logs, config.transformer())
        .with_margin_correction(config.detect_margins);
    let crops = partitioned(&pool, config.workers, &issues, |issue| {
        cropper.export_issue(&assembly, issue).unwrap_or_else(|err| {
            error!(issue = %issue.name, error = %format!("{err:#}"), "crop phase failed for issue");
            CropStats::default()
        })
    })
    .into_iter()
    .fold(CropStats::default(), |total, stats| CropStats {
        written: total.written + stats.written,
        skipped: total.skipped + stats.skipped,
    });

    let segmenter = SegmentExporter::new(&layout, &logs);
    let mut grouped: Vec<ArticleImages> = partitioned(&pool, config.workers, &issues, |issue| {
        segmenter.export_issue(&assembly, &issue.name).unwrap_or_else(|err| {
            error!(issue = %issue.name, error = %format!("{err:#}"), "regrouping failed for issue");
            Vec::new()
        })
    })
    .into_iter()
    .flatten()
    .collect();
    grouped.sort_by(|a, b| a.key.cmp(&b.key));

    let json = JsonExporter::new(config.output.clone());
    json.write(IMAGES_PER_ARTICLE_FILE, &grouped)?;

    if config.titles {
        let titles = recognize_titles(&TesseractBridge::new(), &grouped);
        json.write(TITLES_FILE, &titles)?;
    }

    let compositor = CompositeExporter::new(&layout);
    let composites = pool.install(|| {
        grouped
            .par_iter()
            .filter(|article| match compositor.export_article(article) {
                Ok(written) => written,
                Err(err) => {
                    error!(article = %article.key, error = %format!("{err:#}"), "composite failed");
                    false
                }
            })
            .count()
    });
    info!(composites, "built composites");

    let summary = RunSummary {
        issues: issues.len(),
        rects: assembly.records().len(),
        articles: assembly.articles().len(),
        unresolved: assembly.unresolved().len(),
        crops,
        composites,
    };
    info!(?summary, "run finished");
    Ok(summary)
}

/// Runs only the assembly phase and writes its JSON artefacts.
pub fn assemble(config: &PipelineConfig) -> Result<Assembly> {
    let logs = SideLogs::new(config.output.clone());
    logs.clear()?;
    let issues = discover_issues(&config.input)?;
    assemble_and_export(&issues, config, &logs)
}

fn assemble_and_export(issues: &[Issue], config: &PipelineConfig, logs: &SideLogs) -> Result<Assembly> {
    let assembly = Assembler::new().assemble_all(issues)?;
    assembly.validate().context("assembled tables disagree")?;
    for unresolved in assembly.unresolved() {
        logs.missing_page(&unresolved.issue, &unresolved.inpage);
    }
    JsonExporter::new(config.output.clone())
        .export_assembly(&assembly)
        .context("failed to write assembly")?;
    Ok(assembly)
}

/// Decodes every page of `issue` into the cache and returns how many pages
/// were readable.
fn warm_cache<D: RasterDecoder>(cache: &DecodedCache<D>, issue: &Issue) -> usize {
    let mut decoded = 0;
    for file in &issue.page_files {
        match cache.load(&issue.name, file, &issue.page_path(file)) {
            Ok(_) => decoded += 1,
            Err(err) => warn!(issue = %issue.name, page = %file, error = %err, "page not decodable"),
        }
    }
    decoded
}

/// Runs `work` on every issue inside `pool`. Worker `w` handles the issues
/// whose index is congruent to `w` modulo `workers`; results come back in
/// worker order.
fn partitioned<T, F>(pool: &ThreadPool, workers: usize, issues: &[Issue], work: F) -> Vec<T>
where
    T: Send,
    F: Fn(&Issue) -> T + Sync,
{
    let workers = workers.max(1);
    pool.install(|| {
        (0..workers)
            .into_par_iter()
            .flat_map_iter(|worker| {
                issues
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| index % workers == worker)
                    .map(|(_, issue)| work(issue))
                    .collect::<Vec<_>>()
            })
            .collect()
    })
}
