//! Foreground bulk download of a chapter range
//!
//! [`BulkDownloader`] loads a selection of a work's chapters through the same
//! cache pipeline as the background fetch loop and hands the contents back in
//! chapter-list order. It does not touch the orchestrator's active slot or
//! queue.
//!
//! ```no_run
//! # use novel_dl::bulk::{BulkDownloader, ChapterRange};
//! # use novel_dl::*;
//! # async fn example(orchestrator: DownloadOrchestrator, work: Work) -> Result<()> {
//! let range: ChapterRange = "1-10,15".parse()?;
//! let downloader = orchestrator.bulk_downloader(&config::BulkConfig::default());
//! for chapter in downloader.download(&work, &range).await {
//!     match chapter.content() {
//!         Some(text) => println!("{}: {} bytes", chapter.chapter.title, text.len()),
//!         None => println!("{}: unavailable", chapter.chapter.title),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::BulkConfig;
use crate::error::{Error, Result};
use crate::pipeline::{ChapterPipeline, Collaborators};
use crate::types::{CachedChapterRecord, ChapterRef, ChapterSource, Work};
use futures::future::join_all;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static RANGE_PART: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(?:(\d+)|(\d*)\s*-\s*(\d*))$"));

/// One comma-separated piece of a [`ChapterRange`] (1-based, inclusive)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangePart {
    /// A single chapter number
    Single(usize),
    /// `A-B`, `A-` or `-B`
    Span {
        /// First chapter (None = from the first)
        start: Option<usize>,
        /// Last chapter (None = to the last)
        end: Option<usize>,
    },
}

/// Selection of chapters by 1-based position
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChapterRange {
    /// Every chapter
    All,
    /// Union of the listed parts, in list order
    Parts(Vec<RangePart>),
}

impl ChapterRange {
    /// Parse `"all"`, `"N"`, `"A-B"`, `"A-"`, `"-B"` and comma lists of those
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] for empty input, chapter 0, a reversed span or
    /// anything that is not a number or span.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        if trimmed.is_empty() {
            return Err(Error::InvalidRange(input.to_string()));
        }

        let pattern = RANGE_PART
            .as_ref()
            .map_err(|e| Error::Other(format!("range pattern failed to compile: {e}")))?;

        let parts = trimmed
            .split(',')
            .map(|raw| {
                parse_part(pattern, raw.trim())
                    .ok_or_else(|| Error::InvalidRange(input.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::Parts(parts))
    }

    /// Zero-based indices selected out of `total` chapters
    ///
    /// Deduplicated, in the order the parts list them. Positions past the end
    /// of the work are skipped.
    pub fn indices(&self, total: usize) -> Vec<usize> {
        let parts = match self {
            Self::All => return (0..total).collect(),
            Self::Parts(parts) => parts,
        };

        let mut seen = HashSet::new();
        let mut indices = Vec::new();
        for part in parts {
            let (start, end) = match *part {
                RangePart::Single(n) => (n, n),
                RangePart::Span { start, end } => (start.unwrap_or(1), end.unwrap_or(total)),
            };
            for number in start..=end.min(total) {
                let index = number - 1;
                if seen.insert(index) {
                    indices.push(index);
                }
            }
        }
        indices
    }
}

fn parse_part(pattern: &Regex, raw: &str) -> Option<RangePart> {
    let captures = pattern.captures(raw)?;
    let number = |i: usize| -> Option<Option<usize>> {
        match captures.get(i).map(|m| m.as_str()).filter(|s| !s.is_empty()) {
            None => Some(None),
            Some(digits) => digits.parse().ok().filter(|n| *n > 0).map(Some),
        }
    };

    if captures.get(1).is_some() {
        return number(1)?.map(RangePart::Single);
    }

    let start = number(2)?;
    let end = number(3)?;
    match (start, end) {
        (None, None) => None,
        (Some(a), Some(b)) if a > b => None,
        _ => Some(RangePart::Span { start, end }),
    }
}

impl FromStr for ChapterRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ChapterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = match self {
            Self::All => return f.write_str("all"),
            Self::Parts(parts) => parts,
        };
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match part {
                RangePart::Single(n) => write!(f, "{n}")?,
                RangePart::Span { start, end } => {
                    if let Some(start) = start {
                        write!(f, "{start}")?;
                    }
                    f.write_str("-")?;
                    if let Some(end) = end {
                        write!(f, "{end}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Outcome of one chapter of a bulk download
#[derive(Debug)]
pub struct BulkChapter {
    /// 1-based position in the work's chapter list
    pub number: usize,
    /// Chapter reference
    pub chapter: ChapterRef,
    /// Where the content came from, and the content, or why it failed
    pub result: Result<(ChapterSource, CachedChapterRecord)>,
}

impl BulkChapter {
    /// Chapter text, if it was loaded
    pub fn content(&self) -> Option<&str> {
        self.result
            .as_ref()
            .ok()
            .map(|(_, record)| record.content.as_str())
    }

    /// Whether the chapter was loaded
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Cache-first downloader for a chapter range
#[derive(Clone)]
pub struct BulkDownloader {
    pipeline: ChapterPipeline,
    batch_size: usize,
}

impl BulkDownloader {
    /// Downloader over its own pipeline
    pub fn new(config: &BulkConfig, collaborators: Collaborators) -> Self {
        Self::with_pipeline(config, ChapterPipeline::new(collaborators, None))
    }

    /// Downloader sharing an existing pipeline
    pub fn with_pipeline(config: &BulkConfig, pipeline: ChapterPipeline) -> Self {
        Self {
            pipeline,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Load every chapter `range` selects, in chunks of `batch_size`
    ///
    /// Per-chapter failures are returned in place; they never stop the
    /// download. Results follow the order `range` lists the chapters in.
    pub async fn download(&self, work: &Work, range: &ChapterRange) -> Vec<BulkChapter> {
        let selected: Vec<(usize, &ChapterRef)> = range
            .indices(work.chapters.len())
            .into_iter()
            .filter_map(|index| work.chapters.get(index).map(|chapter| (index + 1, chapter)))
            .collect();

        tracing::info!(
            work_id = %work.id,
            range = %range,
            selected = selected.len(),
            total = work.chapters.len(),
            "Starting bulk download"
        );

        let mut chapters = Vec::with_capacity(selected.len());
        for chunk in selected.chunks(self.batch_size) {
            let results = join_all(
                chunk
                    .iter()
                    .map(|(_, chapter)| self.pipeline.load(work, chapter)),
            )
            .await;

            for ((number, chapter), result) in chunk.iter().zip(results) {
                if let Err(e) = &result {
                    tracing::warn!(
                        work_id = %work.id,
                        chapter_id = %chapter.id,
                        error = %e,
                        "Bulk chapter download failed"
                    );
                }
                chapters.push(BulkChapter {
                    number: *number,
                    chapter: (*chapter).clone(),
                    result,
                });
            }
            tracing::debug!(work_id = %work.id, done = chapters.len(), "Bulk chunk settled");
        }

        let failed = chapters.iter().filter(|chapter| !chapter.is_ok()).count();
        tracing::info!(
            work_id = %work.id,
            downloaded = chapters.len() - failed,
            failed,
            "Bulk download finished"
        );
        chapters
    }
}
