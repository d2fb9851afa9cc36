/// Latest sampled metric values shared between samplers and viewers
///
/// The snapshot is always replaced as a whole under the write lock, so a
/// reader sees either the previous or the new snapshot, never a mix.

use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// One value per tracked series, in series order
    pub values: Vec<f64>,
    /// Wall-clock time of the sample, already formatted
    pub time: String,
    /// Number of completed writes, 0 until the first sample lands
    pub sequence: u64,
}

impl MetricsSnapshot {
    /// Empty snapshot with `series` zero values and no timestamp
    pub fn zeroed(series: usize) -> Self {
        Self {
            values: vec![0.0; series],
            time: String::new(),
            sequence: 0,
        }
    }

    pub fn is_sampled(&self) -> bool {
        self.sequence > 0
    }
}

/// Cloneable handle to one snapshot
#[derive(Debug, Clone)]
pub struct SharedSnapshot {
    inner: Arc<RwLock<MetricsSnapshot>>,
}

impl SharedSnapshot {
    pub fn new(series: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsSnapshot::zeroed(series))),
        }
    }

    /// Copy of the most recently completed write
    pub async fn load(&self) -> MetricsSnapshot {
        self.inner.read().await.clone()
    }

    /// Replace the snapshot with new values; returns the new sequence number
    pub async fn store(&self, values: Vec<f64>, time: String) -> u64 {
        let mut guard = self.inner.write().await;
        let sequence = guard.sequence + 1;
        *guard = MetricsSnapshot {
            values,
            time,
            sequence,
        };
        sequence
    }
}
