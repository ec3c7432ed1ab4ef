//! In-process counters with Prometheus text rendering.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

/// Monotonic counter partitioned by a fixed set of labels.
#[derive(Debug)]
pub struct CounterVec {
    name: String,
    help: String,
    label_names: Vec<String>,
    values: DashMap<Vec<String>, AtomicU64>,
}

impl CounterVec {
    pub fn new(name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            values: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inc(&self, labels: &[&str]) {
        self.add(labels, 1);
    }

    /// Add `delta` to the series for `labels`. A label count that does not
    /// match the registration is logged and ignored.
    pub fn add(&self, labels: &[&str], delta: u64) {
        if labels.len() != self.label_names.len() {
            warn!(
                metric = %self.name,
                expected = self.label_names.len(),
                got = labels.len(),
                "label count mismatch, sample dropped"
            );
            return;
        }

        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        self.values
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[&str]) -> u64 {
        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        self.values
            .get(&key)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render_into(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} counter", self.name);

        let mut series: Vec<(Vec<String>, u64)> = self
            .values
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        series.sort();

        for (labels, value) in series {
            let pairs: Vec<String> = self
                .label_names
                .iter()
                .zip(&labels)
                .map(|(name, value)| format!("{name}=\"{}\"", escape_label(value)))
                .collect();
            if pairs.is_empty() {
                let _ = writeln!(out, "{} {}", self.name, value);
            } else {
                let _ = writeln!(out, "{}{{{}}} {}", self.name, pairs.join(","), value);
            }
        }
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Named set of counters shared across a process.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Arc<CounterVec>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the counter called `name`, registering it on first use. Later
    /// calls return the existing counter regardless of `help` and labels.
    pub fn counter_vec(&self, name: &str, help: &str, label_names: &[&str]) -> Arc<CounterVec> {
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CounterVec::new(name, help, label_names)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CounterVec>> {
        self.counters.get(name).map(|c| Arc::clone(c.value()))
    }

    /// Prometheus text exposition of every counter, sorted by name.
    pub fn render(&self) -> String {
        let mut counters: Vec<Arc<CounterVec>> =
            self.counters.iter().map(|e| Arc::clone(e.value())).collect();
        counters.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = String::new();
        for counter in counters {
            counter.render_into(&mut out);
        }
        out
    }
}
