//! Runtime counters reported by `/stats`.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-wide counters. All fields are updated lock-free.
#[derive(Debug)]
pub struct BotStats {
    started: Instant,
    documents_received: AtomicU64,
    conversions_ok: AtomicU64,
    conversions_failed: AtomicU64,
    pages_rendered: AtomicU64,
    bytes_sent: AtomicU64,
    active_jobs: AtomicUsize,
}

/// A point-in-time copy of [`BotStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub documents_received: u64,
    pub conversions_ok: u64,
    pub conversions_failed: u64,
    pub pages_rendered: u64,
    pub bytes_sent: u64,
    pub active_jobs: usize,
}

impl Default for BotStats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            documents_received: AtomicU64::new(0),
            conversions_ok: AtomicU64::new(0),
            conversions_failed: AtomicU64::new(0),
            pages_rendered: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            active_jobs: AtomicUsize::new(0),
        }
    }
}

impl BotStats {
    pub fn document_received(&self) {
        self.documents_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn page_sent(&self, bytes: usize) {
        self.pages_rendered.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn conversion_finished(&self, ok: bool) {
        let counter = if ok {
            &self.conversions_ok
        } else {
            &self.conversions_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a job as running until the returned guard is dropped.
    pub fn job_started(&self) -> ActiveJob<'_> {
        self.active_jobs.fetch_add(1, Ordering::Relaxed);
        ActiveJob(&self.active_jobs)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started.elapsed(),
            documents_received: self.documents_received.load(Ordering::Relaxed),
            conversions_ok: self.conversions_ok.load(Ordering::Relaxed),
            conversions_failed: self.conversions_failed.load(Ordering::Relaxed),
            pages_rendered: self.pages_rendered.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            active_jobs: self.active_jobs.load(Ordering::Relaxed),
        }
    }
}

/// Decrements the active-job counter on drop.
#[must_use]
pub struct ActiveJob<'a>(&'a AtomicUsize);

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl StatsSnapshot {
    /// Chat-friendly multi-line report.
    pub fn render(&self) -> String {
        let mut out = String::from("📊 Bot statistics\n");
        let _ = writeln!(out, "Uptime: {}", format_duration(self.uptime));
        let _ = writeln!(out, "Documents received: {}", self.documents_received);
        let _ = writeln!(
            out,
            "Conversions: {} ok, {} failed",
            self.conversions_ok, self.conversions_failed
        );
        let _ = writeln!(out, "Pages rendered: {}", self.pages_rendered);
        let _ = writeln!(out, "Data sent: {}", format_bytes(self.bytes_sent));
        let _ = write!(out, "Active jobs: {}", self.active_jobs);
        out
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (days, hours, mins) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60);
    if days > 0 {
        format!("{days}d {hours}h {mins}m")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m {}s", secs % 60)
    }
}

fn format_bytes(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MB {
        format!("{:.1} MB", bytes as f64 / MB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}
