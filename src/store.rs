//! Sample store abstraction and the in-memory implementation

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::models::{Sample, TimeRange};

/// Persistent table of timestamped samples.
///
/// Range bounds follow [`TimeRange`]: inclusive start, exclusive end.
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Append one sample
    async fn insert(&self, sample: &Sample) -> Result<()>;

    /// All samples inside `range`, in no particular order
    async fn find_range(&self, range: TimeRange) -> Result<Vec<Sample>>;

    /// Delete all samples inside `range`, returning how many were removed
    async fn delete_range(&self, range: TimeRange) -> Result<u64>;

    /// Swap every sample in `range` for `replacement`.
    ///
    /// The default is a plain delete followed by insert; stores with
    /// transactions should override it.
    async fn replace_range(&self, range: TimeRange, replacement: &Sample) -> Result<u64> {
        let deleted = self.delete_range(range).await?;
        self.insert(replacement).await?;
        Ok(deleted)
    }

    /// Most recent samples first, up to `limit`, optionally bounded by `range`
    async fn recent(&self, range: Option<TimeRange>, limit: usize) -> Result<Vec<Sample>>;

    /// Cheap connectivity probe for readiness checks
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Store backed by a `Vec` behind a lock. Used when no database is configured.
#[derive(Default)]
pub struct InMemorySampleStore {
    samples: RwLock<Vec<Sample>>,
}

impl InMemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pre-populated table
    pub fn with_samples(samples: Vec<Sample>) -> Self {
        Self {
            samples: RwLock::new(samples),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    /// Copy of everything currently stored
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.read().clone()
    }
}

#[async_trait]
impl SampleStore for InMemorySampleStore {
    async fn insert(&self, sample: &Sample) -> Result<()> {
        self.samples.write().push(*sample);
        Ok(())
    }

    async fn find_range(&self, range: TimeRange) -> Result<Vec<Sample>> {
        Ok(self
            .samples
            .read()
            .iter()
            .filter(|s| range.contains(s.timestamp))
            .copied()
            .collect())
    }

    async fn delete_range(&self, range: TimeRange) -> Result<u64> {
        let mut samples = self.samples.write();
        let before = samples.len();
        samples.retain(|s| !range.contains(s.timestamp));
        Ok((before - samples.len()) as u64)
    }

    async fn replace_range(&self, range: TimeRange, replacement: &Sample) -> Result<u64> {
        // Delete and insert under one write guard.
        let mut samples = self.samples.write();
        let before = samples.len();
        samples.retain(|s| !range.contains(s.timestamp));
        let deleted = (before - samples.len()) as u64;
        samples.push(*replacement);
        Ok(deleted)
    }

    async fn recent(&self, range: Option<TimeRange>, limit: usize) -> Result<Vec<Sample>> {
        let mut matched: Vec<Sample> = self
            .samples
            .read()
            .iter()
            .filter(|s| range.map_or(true, |r| r.contains(s.timestamp)))
            .copied()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(limit);
        Ok(matched)
    }
}
