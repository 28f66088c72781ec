//! Subcommand implementations

use std::fmt;

use anyhow::{Context, Result};
use precomputedb::{Hash256, PrecomputeDb};
use tracing::info;
use witnesscache::{FlushSummary, PrecomputeCache};

/// Store summary printed by `info`
pub struct StoreInfo {
    pub path: String,
    pub records: usize,
    pub bytes: u64,
}

impl fmt::Display for StoreInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "path:    {}", self.path)?;
        writeln!(f, "records: {}", self.records)?;
        write!(f, "bytes:   {}", self.bytes)
    }
}

/// Outcome of loading a store through the cache
pub struct WarmReport {
    pub loaded: usize,
    pub hot: usize,
    pub dirty: usize,
    pub evictions: u64,
    pub promotions: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub flush: Option<FlushSummary>,
}

impl fmt::Display for WarmReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "loaded:     {}", self.loaded)?;
        writeln!(f, "hot:        {}", self.hot)?;
        writeln!(f, "dirty:      {}", self.dirty)?;
        writeln!(f, "evictions:  {}", self.evictions)?;
        writeln!(f, "promotions: {}", self.promotions)?;
        writeln!(f, "hits:       {}", self.hits)?;
        writeln!(f, "misses:     {}", self.misses)?;
        write!(f, "hit ratio:  {:.3}", self.hit_ratio)?;
        if let Some(summary) = &self.flush {
            write!(
                f,
                "\nflushed:    {} dirty, {} hot",
                summary.dirty_written, summary.hot_written
            )?;
        }
        Ok(())
    }
}

pub fn info(db: &PrecomputeDb) -> StoreInfo {
    StoreInfo {
        path: db.path().display().to_string(),
        records: db.len(),
        bytes: db.file_size(),
    }
}

pub fn get(db: &PrecomputeDb, key: &str) -> Result<Option<Vec<u8>>> {
    let key = Hash256::from_hex(key)?;
    db.read(&key)
        .with_context(|| format!("Failed to read witness {}", key))
}

pub fn put(db: &PrecomputeDb, key: &str, value_hex: &str) -> Result<()> {
    let key = Hash256::from_hex(key)?;
    let value = hex::decode(value_hex).context("Value is not valid hex")?;
    db.write(&key, &value)
        .with_context(|| format!("Failed to write witness {}", key))?;
    db.sync()?;
    info!(key = %key, bytes = value.len(), "Stored witness");
    Ok(())
}

/// Replay every record through a cache of `capacity` entries, then read
/// each key back through it. Optionally flushes the cache into the store.
pub fn warm(db: &mut PrecomputeDb, capacity: usize, flush: bool) -> Result<WarmReport> {
    anyhow::ensure!(capacity > 0, "Capacity must be greater than 0");

    let mut cache: PrecomputeCache<Vec<u8>> = PrecomputeCache::with_capacity(capacity);
    let keys = db.keys();
    let mut loaded = 0;

    for key in &keys {
        if let Some(value) = db.read(key)? {
            cache.put(*key, value);
            loaded += 1;
        }
    }

    let hot = cache.size();
    let dirty = cache.dirty_size();

    for key in &keys {
        cache.get(key);
    }

    let stats = cache.stats();
    let (evictions, promotions) = (stats.evictions(), stats.promotions());
    let (hits, misses, hit_ratio) = (stats.hits(), stats.misses(), stats.hit_ratio());

    let flush = if flush {
        Some(cache.flush(db).context("Failed to flush cache to store")?)
    } else {
        None
    };

    Ok(WarmReport {
        loaded,
        hot,
        dirty,
        evictions,
        promotions,
        hits,
        misses,
        hit_ratio,
        flush,
    })
}
