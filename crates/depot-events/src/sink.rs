use std::{
    fmt::Write,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::Duration,
};

use crate::IndexEvent;

/// Trait for consuming events.
///
/// The engine only ever calls into a sink; it never reads back from one.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: IndexEvent);
}

/// No-op event sink for tests or headless operation.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: IndexEvent) {}
}

/// Collector sink that stores all events for inspection.
///
/// Useful in tests to verify that expected events were emitted.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<IndexEvent>>,
}

impl CollectorSink {
    pub fn events(&self) -> Vec<IndexEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: IndexEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Upper bounds, in seconds, of the latency histogram buckets.
const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Fixed-bucket latency histogram. Bucket counts are stored per bucket and
/// made cumulative when rendered.
#[derive(Default)]
struct DurationStat {
    count: AtomicU64,
    sum_micros: AtomicU64,
    buckets: [AtomicU64; DURATION_BUCKETS.len()],
}

impl DurationStat {
    fn observe(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);

        let seconds = duration.as_secs_f64();
        if let Some(index) = DURATION_BUCKETS.iter().position(|le| seconds <= *le) {
            self.buckets[index].fetch_add(1, Ordering::Relaxed);
        }
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn sum_seconds(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    fn render(&self, out: &mut String, name: &str) {
        let mut cumulative = 0;
        for (le, bucket) in DURATION_BUCKETS.iter().zip(&self.buckets) {
            cumulative += bucket.load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}_bucket{{le=\"{le}\"}} {cumulative}");
        }
        let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {}", self.count());
        let _ = writeln!(out, "{name}_sum {}", self.sum_seconds());
        let _ = writeln!(out, "{name}_count {}", self.count());
    }
}

/// Aggregating sink backing the `/metrics` endpoint.
///
/// Keeps refresh counters, the indexed package gauge and latency histograms. All
/// updates are lock-free.
#[derive(Default)]
pub struct StatsSink {
    refresh_success: AtomicU64,
    refresh_skipped: AtomicU64,
    refresh_errors: AtomicU64,
    indexed_packages: AtomicU64,
    refresh_duration: DurationStat,
    query_duration: DurationStat,
}

impl StatsSink {
    pub fn refresh_success_total(&self) -> u64 {
        self.refresh_success.load(Ordering::Relaxed)
    }

    pub fn refresh_skipped_total(&self) -> u64 {
        self.refresh_skipped.load(Ordering::Relaxed)
    }

    pub fn refresh_errors_total(&self) -> u64 {
        self.refresh_errors.load(Ordering::Relaxed)
    }

    pub fn indexed_packages(&self) -> u64 {
        self.indexed_packages.load(Ordering::Relaxed)
    }

    pub fn query_count(&self) -> u64 {
        self.query_duration.count()
    }

    /// Renders all values in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let counters = [
            (
                "depot_storage_indexer_update_index_success_total",
                "counter",
                "Number of successful index updates",
                self.refresh_success_total(),
            ),
            (
                "depot_storage_indexer_update_index_skipped_total",
                "counter",
                "Number of update cycles skipped because the cursor was unchanged",
                self.refresh_skipped_total(),
            ),
            (
                "depot_storage_indexer_update_index_errors_total",
                "counter",
                "Number of failed index updates",
                self.refresh_errors_total(),
            ),
            (
                "depot_number_indexed_packages",
                "gauge",
                "Number of packages in the published catalog",
                self.indexed_packages(),
            ),
        ];
        for (name, kind, help, value) in counters {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} {kind}");
            let _ = writeln!(out, "{name} {value}");
        }

        let histograms = [
            (
                "depot_storage_indexer_update_index_duration_seconds",
                "Duration of index update cycles",
                &self.refresh_duration,
            ),
            (
                "depot_indexer_get_duration_seconds",
                "Duration of catalog queries",
                &self.query_duration,
            ),
        ];
        for (name, help, stat) in histograms {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} histogram");
            stat.render(&mut out, name);
        }
        out
    }
}

impl EventSink for StatsSink {
    fn emit(&self, event: IndexEvent) {
        match event {
            IndexEvent::RefreshSucceeded {
                package_count,
                ..
            } => {
                self.refresh_success.fetch_add(1, Ordering::Relaxed);
                self.indexed_packages
                    .store(package_count as u64, Ordering::Relaxed);
            }
            IndexEvent::RefreshSkipped {
                ..
            } => {
                self.refresh_skipped.fetch_add(1, Ordering::Relaxed);
            }
            IndexEvent::RefreshFailed {
                ..
            } => {
                self.refresh_errors.fetch_add(1, Ordering::Relaxed);
            }
            IndexEvent::RefreshDuration(duration) => self.refresh_duration.observe(duration),
            IndexEvent::QueryDuration(duration) => self.query_duration.observe(duration),
        }
    }
}
