//! Durable store capability consumed by [`PrecomputeCache::flush`]
//!
//! [`PrecomputeCache::flush`]: crate::PrecomputeCache::flush

use precomputedb::{Hash256, PrecomputeDb};

/// Anything that can durably persist one witness entry
pub trait WitnessWriter<V> {
    /// Error returned when a write fails
    type Error;

    /// Persist `value` under `key`
    fn write(&mut self, key: &Hash256, value: &V) -> Result<(), Self::Error>;

    /// Make every preceding write durable; called once at the end of a
    /// successful flush
    fn sync(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<V> WitnessWriter<V> for PrecomputeDb
where
    V: AsRef<[u8]>,
{
    type Error = precomputedb::Error;

    fn write(&mut self, key: &Hash256, value: &V) -> Result<(), Self::Error> {
        PrecomputeDb::write(self, key, value.as_ref())
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        PrecomputeDb::sync(self)
    }
}

/// Number of writes issued by one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Entries drained from the dirty tier
    pub dirty_written: usize,
    /// Hot-tier entries written (and kept cached)
    pub hot_written: usize,
}

impl FlushSummary {
    /// Total number of writes
    pub fn total(&self) -> usize {
        self.dirty_written + self.hot_written
    }
}
