//! Per-request phase timing for `debug` requests.
//!
//! A [`Timing`] records the time since the previous mark under a numbered
//! phase name. When the request finishes, the table is logged at `info`:
//!
//! ```text
//! source: photos/cat.jpg
//! target: 200x200
//! 01. ACQUIRE          41.02 ms
//! 02. DOWNSCALE         3.87 ms
//! 03. PRODUCE RESULT    9.10 ms
//! 04. TOTAL            54.01 ms
//! ```
//!
//! A disabled timing records nothing and costs one branch per mark. Tables
//! are logged under [`LOG_TARGET`], which [`default_log_filter`] keeps at
//! `info` so a `debug=true` request is visible under the default `warn` level.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

/// Log target of the timing table.
pub const LOG_TARGET: &str = module_path!();

/// `EnvFilter` directives used when `RUST_LOG` is unset.
pub fn default_log_filter(verbose: bool) -> String {
    let level = if verbose { "info" } else { "warn" };
    format!("{level},{LOG_TARGET}=info")
}

pub struct Timing {
    enabled: bool,
    source: String,
    dest: (u32, u32),
    start: Instant,
    prev: Instant,
    phases: Vec<(String, Duration)>,
}

impl Timing {
    pub fn new(enabled: bool, source: impl Into<String>, dest_width: u32, dest_height: u32) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            source: source.into(),
            dest: (dest_width, dest_height),
            start: now,
            prev: now,
            phases: Vec::new(),
        }
    }

    /// Close the current phase under `name`.
    pub fn mark(&mut self, name: &str) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        self.phases.push((name.to_string(), now - self.prev));
        self.prev = now;
    }

    /// Log the table and return it. `None` when disabled.
    pub fn finish(self) -> Option<TimingReport> {
        if !self.enabled {
            return None;
        }
        let report = TimingReport {
            total: self.start.elapsed(),
            source: self.source,
            dest: self.dest,
            phases: self.phases,
        };
        info!(target: LOG_TARGET, "downscale timing\n{report}");
        Some(report)
    }
}

#[derive(Debug, Clone)]
pub struct TimingReport {
    pub source: String,
    pub dest: (u32, u32),
    pub phases: Vec<(String, Duration)>,
    pub total: Duration,
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "source: {}", self.source)?;
        writeln!(f, "target: {}x{}", self.dest.0, self.dest.1)?;
        let rows = self
            .phases
            .iter()
            .map(|(name, d)| (name.as_str(), *d))
            .chain(std::iter::once(("TOTAL", self.total)));
        for (i, (name, duration)) in rows.enumerate() {
            let label = format!("{:02}. {}", i + 1, name);
            let ms = duration.as_secs_f64() * 1000.0;
            writeln!(f, "{label:<18}{ms:>8.2} ms")?;
        }
        Ok(())
    }
}
