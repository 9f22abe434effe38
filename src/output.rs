//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Scale
//!
//! ```text
//! photos/cat.jpg → thumbs/cat.jpg (200x200, 14.2 KB)
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001 photos/cat.jpg 200x200 → 001-cat-200x200.jpg (14.2 KB)
//! 002 photos/cat.jpg 64x64 → 002-cat-64x64.jpg (2.1 KB)
//! 003 https://img.test/missing.png 100x100
//!     Error: source acquisition failed: HTTP error: GET https://img.test/missing.png returned 404 Not Found
//!
//! Cache: 1 cached, 0 shared, 2 decoded (3 total)
//! 2 written, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::cache::CacheStats;
use crate::imaging::ImageFormat;
use crate::source::Source;
use serde::Serialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count.
fn format_size(bytes: usize) -> String {
    match bytes {
        b if b < 1024 => format!("{b} B"),
        b if b < 1024 * 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
    }
}

/// Filename-safe stem for a source: the file or URL basename without its
/// extension, with anything outside `[A-Za-z0-9_-]` replaced by `-`.
fn source_stem(source: &Source) -> String {
    let raw = match source {
        Source::File(path) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Source::Url(url) => {
            let path = url.split(['?', '#']).next().unwrap_or_default();
            let last = path.rsplit('/').next().unwrap_or_default();
            Path::new(last)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        }
        Source::Encoded(_) => "encoded".to_string(),
        Source::Pixels(_) => "pixels".to_string(),
    };
    let stem: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "image".to_string()
    } else {
        stem.to_string()
    }
}

/// Output filename for the `index`-th (1-based) batch request:
/// `NNN-<stem>-<w>x<h>.<ext>`.
pub fn output_filename(
    index: usize,
    source: &Source,
    width: u32,
    height: u32,
    format: ImageFormat,
) -> String {
    format!(
        "{}-{}-{}x{}.{}",
        format_index(index),
        source_stem(source),
        width,
        height,
        format.extension()
    )
}

// ============================================================================
// Scale output
// ============================================================================

pub fn format_scale_output(
    source: &str,
    dest: &Path,
    width: u32,
    height: u32,
    bytes: usize,
) -> String {
    format!(
        "{} \u{2192} {} ({}x{}, {})",
        source,
        dest.display(),
        width,
        height,
        format_size(bytes)
    )
}

// ============================================================================
// Batch output
// ============================================================================

/// One line of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    /// 1-based line position among the batch requests.
    pub index: usize,
    /// The request as written in the batch file.
    pub request: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchOutcome {
    Written { path: PathBuf, bytes: usize },
    Failed { error: String },
}

impl BatchEntry {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Failed { .. })
    }
}

/// Format the batch report: one entry per request, then cache statistics
/// and totals.
pub fn format_batch_report(entries: &[BatchEntry], stats: &CacheStats) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in entries {
        let header = format!("{} {}", format_index(entry.index), entry.request);
        match &entry.outcome {
            BatchOutcome::Written { path, bytes } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                lines.push(format!(
                    "{} \u{2192} {} ({})",
                    header,
                    name,
                    format_size(*bytes)
                ));
            }
            BatchOutcome::Failed { error } => {
                lines.push(header);
                lines.push(format!("    Error: {}", error));
            }
        }
    }

    let failed = entries.iter().filter(|e| e.is_failure()).count();
    lines.push(String::new());
    lines.push(format!("Cache: {}", stats));
    lines.push(format!(
        "{} written, {} failed",
        entries.len() - failed,
        failed
    ));
    lines
}

pub fn print_batch_report(entries: &[BatchEntry], stats: &CacheStats) {
    for line in format_batch_report(entries, stats) {
        println!("{}", line);
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    entries: &'a [BatchEntry],
    cache: JsonCacheStats,
}

#[derive(Serialize)]
struct JsonCacheStats {
    hits: u32,
    waits: u32,
    misses: u32,
    evictions: u32,
}

/// Machine-readable batch report.
pub fn format_batch_json(
    entries: &[BatchEntry],
    stats: &CacheStats,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport {
        entries,
        cache: JsonCacheStats {
            hits: stats.hits,
            waits: stats.waits,
            misses: stats.misses,
            evictions: stats.evictions,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::PixelBuffer;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn source_stem_from_path_and_url() {
        assert_eq!(source_stem(&Source::File("photos/cat.jpg".into())), "cat");
        assert_eq!(
            source_stem(&Source::Url("https://img.test/a/dog.png?w=1#x".into())),
            "dog"
        );
        assert_eq!(
            source_stem(&Source::File("my photo (1).jpg".into())),
            "my-photo--1"
        );
    }

    #[test]
    fn source_stem_falls_back_to_image() {
        assert_eq!(source_stem(&Source::Url("https://img.test/".into())), "image");
        assert_eq!(source_stem(&Source::File("...".into())), "image");
    }

    #[test]
    fn source_stem_for_in_memory_sources() {
        assert_eq!(source_stem(&Source::from(vec![1u8, 2, 3])), "encoded");
        let px = PixelBuffer::filled(1, 1, [0; 4]).unwrap();
        assert_eq!(source_stem(&Source::from(px)), "pixels");
    }

    #[test]
    fn output_filename_layout() {
        assert_eq!(
            output_filename(
                7,
                &Source::File("cat.jpg".into()),
                200,
                100,
                ImageFormat::Png
            ),
            "007-cat-200x100.png"
        );
    }

    // =========================================================================
    // Scale output tests
    // =========================================================================

    #[test]
    fn scale_output_line() {
        assert_eq!(
            format_scale_output("cat.jpg", Path::new("out/cat.jpg"), 64, 64, 1536),
            "cat.jpg \u{2192} out/cat.jpg (64x64, 1.5 KB)"
        );
    }

    // =========================================================================
    // Batch output tests
    // =========================================================================

    fn sample_entries() -> Vec<BatchEntry> {
        vec![
            BatchEntry {
                index: 1,
                request: "cat.jpg 200 200".into(),
                outcome: BatchOutcome::Written {
                    path: PathBuf::from("out/001-cat-200x200.jpg"),
                    bytes: 2048,
                },
            },
            BatchEntry {
                index: 2,
                request: "gone.png 10 10".into(),
                outcome: BatchOutcome::Failed {
                    error: "source acquisition failed: IO error: not found".into(),
                },
            },
        ]
    }

    #[test]
    fn batch_report_lists_entries_and_totals() {
        let stats = CacheStats {
            hits: 1,
            misses: 2,
            ..CacheStats::default()
        };
        let lines = format_batch_report(&sample_entries(), &stats);
        assert_eq!(
            lines,
            vec![
                "001 cat.jpg 200 200 \u{2192} 001-cat-200x200.jpg (2.0 KB)".to_string(),
                "002 gone.png 10 10".to_string(),
                "    Error: source acquisition failed: IO error: not found".to_string(),
                String::new(),
                "Cache: 1 cached, 0 shared, 2 decoded (3 total)".to_string(),
                "1 written, 1 failed".to_string(),
            ]
        );
    }

    #[test]
    fn batch_report_empty() {
        let lines = format_batch_report(&[], &CacheStats::default());
        assert_eq!(lines.last().unwrap(), "0 written, 0 failed");
    }

    #[test]
    fn batch_json_tags_status() {
        let json = format_batch_json(&sample_entries(), &CacheStats::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["entries"][0]["status"], "written");
        assert_eq!(value["entries"][0]["bytes"], 2048);
        assert_eq!(value["entries"][1]["status"], "failed");
        assert_eq!(value["cache"]["misses"], 0);
    }
}
