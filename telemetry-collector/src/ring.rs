//! Bounded per-GPU ring index and host reverse index.
//!
//! Reads never block writes for longer than a single insertion: the whole
//! structure sits behind one `parking_lot::RwLock`, matching the broker's
//! single-lock discipline for the same reason — the ring and the host
//! index must never observe each other in an inconsistent intermediate
//! state.

// Layer 1: Standard library imports
use std::collections::{HashMap, HashSet};

// Layer 2: Third-party crate imports
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::telemetry::Telemetry;

/// Aggregate counters returned by [`RingIndex::stats`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RingStats {
    /// Total entries retained across every GPU.
    pub total_entries: usize,
    /// Number of distinct GPUs with at least one retained entry.
    pub total_gpus: usize,
    /// Configured per-GPU retention cap.
    pub max_entries_per_gpu: usize,
    /// Retained entry count per GPU.
    pub gpu_entry_counts: HashMap<String, usize>,
}

struct Inner {
    by_gpu: HashMap<String, Vec<Telemetry>>,
    /// host -> gpu_ids observed for that host. Never shrinks: see module docs
    /// on the accepted conservatism around eviction (spec design notes ยง9).
    by_host: HashMap<String, HashSet<String>>,
}

/// Bounded per-GPU in-memory index of recent telemetry.
pub struct RingIndex {
    max_entries_per_gpu: usize,
    inner: RwLock<Inner>,
}

impl RingIndex {
    /// Create an index that retains at most `max_entries_per_gpu` records
    /// per GPU, evicting the oldest on overflow.
    pub fn new(max_entries_per_gpu: usize) -> Self {
        Self {
            max_entries_per_gpu,
            inner: RwLock::new(Inner {
                by_gpu: HashMap::new(),
                by_host: HashMap::new(),
            }),
        }
    }

    /// Store a telemetry record, evicting the oldest entry for its GPU if
    /// the ring is at capacity.
    pub fn store(&self, telemetry: Telemetry) {
        let mut inner = self.inner.write();

        if !telemetry.hostname.is_empty() {
            inner
                .by_host
                .entry(telemetry.hostname.clone())
                .or_default()
                .insert(telemetry.gpu_id.clone());
        }

        let entries = inner.by_gpu.entry(telemetry.gpu_id.clone()).or_default();
        entries.push(telemetry);
        if entries.len() > self.max_entries_per_gpu {
            let overflow = entries.len() - self.max_entries_per_gpu;
            entries.drain(0..overflow);
        }
    }

    /// Return up to `limit` of the most recently retained entries for `gpu_id`,
    /// oldest first within the window. Empty if the GPU has no entries.
    pub fn telemetry(&self, gpu_id: &str, limit: usize) -> Vec<Telemetry> {
        let inner = self.inner.read();
        match inner.by_gpu.get(gpu_id) {
            Some(entries) => {
                let start = entries.len().saturating_sub(limit);
                entries[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Every hostname observed so far.
    pub fn hosts(&self) -> Vec<String> {
        self.inner.read().by_host.keys().cloned().collect()
    }

    /// GPUs observed for `hostname`, or empty if the host is unknown.
    pub fn gpus_for_host(&self, hostname: &str) -> Vec<String> {
        self.inner
            .read()
            .by_host
            .get(hostname)
            .map(|gpus| gpus.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Aggregate counters across every GPU.
    pub fn stats(&self) -> RingStats {
        let inner = self.inner.read();
        let gpu_entry_counts: HashMap<String, usize> = inner
            .by_gpu
            .iter()
            .map(|(gpu, entries)| (gpu.clone(), entries.len()))
            .collect();
        let total_entries = gpu_entry_counts.values().sum();

        RingStats {
            total_entries,
            total_gpus: gpu_entry_counts.len(),
            max_entries_per_gpu: self.max_entries_per_gpu,
            gpu_entry_counts,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn telemetry(gpu_id: &str, hostname: &str, value: f64) -> Telemetry {
        Telemetry {
            gpu_id: gpu_id.to_string(),
            hostname: hostname.to_string(),
            metrics: HashMap::from([("value".to_string(), value)]),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn s6_ring_eviction_keeps_most_recent() {
        let ring = RingIndex::new(3);
        for i in 1..=5 {
            ring.store(telemetry("gpu-0", "host-a", i as f64));
        }

        let entries = ring.telemetry("gpu-0", 100);
        let values: Vec<f64> = entries.iter().map(|t| t.metrics["value"]).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn missing_gpu_returns_empty() {
        let ring = RingIndex::new(10);
        assert!(ring.telemetry("missing", 10).is_empty());
    }

    #[test]
    fn host_reverse_index_is_sound() {
        let ring = RingIndex::new(10);
        ring.store(telemetry("gpu-0", "host-a", 1.0));
        ring.store(telemetry("gpu-1", "host-a", 1.0));
        ring.store(telemetry("gpu-2", "host-b", 1.0));

        let mut hosts = ring.hosts();
        hosts.sort();
        assert_eq!(hosts, vec!["host-a", "host-b"]);

        let mut gpus_a = ring.gpus_for_host("host-a");
        gpus_a.sort();
        assert_eq!(gpus_a, vec!["gpu-0", "gpu-1"]);
    }

    #[test]
    fn stats_are_additive() {
        let ring = RingIndex::new(2);
        ring.store(telemetry("gpu-0", "host-a", 1.0));
        ring.store(telemetry("gpu-0", "host-a", 2.0));
        ring.store(telemetry("gpu-1", "host-a", 1.0));

        let stats = ring.stats();
        assert_eq!(stats.total_gpus, 2);
        assert_eq!(
            stats.total_entries,
            stats.gpu_entry_counts.values().sum::<usize>()
        );
        assert_eq!(stats.gpu_entry_counts["gpu-0"], 2);
        assert_eq!(stats.gpu_entry_counts["gpu-1"], 1);
    }

    #[test]
    fn limit_smaller_than_retained_returns_most_recent_subset() {
        let ring = RingIndex::new(10);
        for i in 1..=5 {
            ring.store(telemetry("gpu-0", "host-a", i as f64));
        }
        let entries = ring.telemetry("gpu-0", 2);
        let values: Vec<f64> = entries.iter().map(|t| t.metrics["value"]).collect();
        assert_eq!(values, vec![4.0, 5.0]);
    }
}
