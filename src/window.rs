//! Shared, lockable window (grain envelope) tables and a named window table registry.

use std::{
    f32::consts::PI,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock, RwLockReadGuard, TryLockError,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Sample content of a [`WindowTable`]: interleaved amplitude frames.
#[derive(Debug, Clone, Default)]
pub struct WindowData {
    samples: Vec<f32>,
    channel_count: usize,
}

impl WindowData {
    fn new(samples: Vec<f32>, channel_count: usize) -> Result<Self, Error> {
        if channel_count == 0 || samples.len() % channel_count != 0 {
            return Err(Error::ParameterError(format!(
                "Window table sample count ({}) must be a multiple of its channel count ({})",
                samples.len(),
                channel_count
            )));
        }
        Ok(Self {
            samples,
            channel_count,
        })
    }

    /// Number of channels in the table.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Number of frames in the table.
    pub fn frame_count(&self) -> usize {
        if self.channel_count > 0 {
            self.samples.len() / self.channel_count
        } else {
            0
        }
    }

    /// True when there are no frames to read from.
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Returns the first channel's sample at the given frame index.
    /// Multi-channel tables are always addressed as single-channel tables.
    #[inline]
    pub fn frame(&self, index: usize) -> f32 {
        self.samples[index * self.channel_count]
    }
}

// -------------------------------------------------------------------------------------------------

/// A named, lockable window table, shared between the real-time engine and a non real-time
/// thread which may replace its content.
///
/// The real-time thread only ever *tries* to acquire a read lock. Content replacements and
/// explicit modification notifications bump the table's generation counter, which engines use
/// to detect stale grain geometry.
#[derive(Debug)]
pub struct WindowTable {
    name: String,
    data: RwLock<WindowData>,
    generation: AtomicU64,
}

impl WindowTable {
    /// Create a new window table from interleaved samples with the given channel layout.
    pub fn new(name: &str, samples: Vec<f32>, channel_count: usize) -> Result<Self, Error> {
        Ok(Self {
            name: name.to_string(),
            data: RwLock::new(WindowData::new(samples, channel_count)?),
            generation: AtomicU64::new(0),
        })
    }

    /// Create a new single-channel window table.
    pub fn mono(name: &str, samples: Vec<f32>) -> Self {
        Self {
            name: name.to_string(),
            data: RwLock::new(WindowData {
                samples,
                channel_count: 1,
            }),
            generation: AtomicU64::new(0),
        }
    }

    /// Create a new single-channel Hann window with the given number of frames.
    pub fn hann(name: &str, frame_count: usize) -> Self {
        let samples = (0..frame_count)
            .map(|i| {
                let phase = i as f32 / frame_count as f32;
                0.5 * (1.0 - (2.0 * PI * phase).cos())
            })
            .collect();
        Self::mono(name, samples)
    }

    /// Create a new single-channel triangle window with the given number of frames.
    pub fn triangle(name: &str, frame_count: usize) -> Self {
        let samples = (0..frame_count)
            .map(|i| {
                let phase = i as f32 / frame_count as f32;
                if phase < 0.5 {
                    2.0 * phase
                } else {
                    2.0 * (1.0 - phase)
                }
            })
            .collect();
        Self::mono(name, samples)
    }

    /// The table's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current modification generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Number of channels in the table. Blocks while the table gets replaced.
    pub fn channel_count(&self) -> usize {
        self.read().channel_count()
    }

    /// Number of frames in the table. Blocks while the table gets replaced.
    pub fn frame_count(&self) -> usize {
        self.read().frame_count()
    }

    /// Replace the table's content. Must not be called from the real-time thread: this waits
    /// until running audio blocks released their read locks.
    pub fn replace(&self, samples: Vec<f32>, channel_count: usize) -> Result<(), Error> {
        let new_data = WindowData::new(samples, channel_count)?;
        let old_data = {
            let mut data = self.data.write().unwrap_or_else(|err| err.into_inner());
            self.generation.fetch_add(1, Ordering::AcqRel);
            std::mem::replace(&mut *data, new_data)
        };
        log::debug!(
            "Replaced window table '{}' ({} frames)",
            self.name,
            self.frame_count()
        );
        // old content is released here, outside of the lock
        drop(old_data);
        Ok(())
    }

    /// Release the table's content, making it unavailable to engines.
    pub fn clear(&self) {
        // NB: replacing with an empty single channel table never fails
        let _ = self.replace(Vec::new(), 1);
    }

    /// Signal that the table got modified externally.
    pub fn notify_modified(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Try acquiring a read lock without blocking. Returns `None` when the table is currently
    /// being written to.
    pub(crate) fn try_lock(&self) -> Option<RwLockReadGuard<'_, WindowData>> {
        match self.data.try_read() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(err)) => Some(err.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, WindowData> {
        self.data.write().unwrap_or_else(|err| err.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, WindowData> {
        self.data.read().unwrap_or_else(|err| err.into_inner())
    }
}

// -------------------------------------------------------------------------------------------------

/// Thread-safe registry of named [`WindowTable`]s, which engines resolve window names from.
///
/// Cloned registries share the same tables.
#[derive(Debug, Clone, Default)]
pub struct WindowTableRegistry {
    tables: Arc<DashMap<String, Arc<WindowTable>>>,
}

impl WindowTableRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a window table by its name.
    ///
    /// When a table with the same name already exists, the existing table's content gets
    /// replaced instead, so engines which reference it notice the modification.
    pub fn insert(&self, table: WindowTable) -> Result<Arc<WindowTable>, Error> {
        // lookup and insertion must happen under the same shard lock
        let existing = match self.tables.entry(table.name().to_string()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let table = Arc::new(table);
                entry.insert(Arc::clone(&table));
                return Ok(table);
            }
        };
        let data = table.data.into_inner().unwrap_or_else(|err| err.into_inner());
        existing.replace(data.samples, data.channel_count)?;
        Ok(existing)
    }

    /// Look up a table by name.
    pub fn get(&self, name: &str) -> Option<Arc<WindowTable>> {
        self.tables.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a table from the registry. The table's content gets released, so engines which
    /// still reference it render silence until they get a new table assigned.
    pub fn remove(&self, name: &str) -> Option<Arc<WindowTable>> {
        let (_, table) = self.tables.remove(name)?;
        table.clear();
        Some(table)
    }

    /// Names of all registered tables, sorted alphabetically.
    pub fn names(&self) -> Vec<String> {
        let mut names = self
            .tables
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    /// True when no tables are registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_data_layout() -> Result<(), Box<Error>> {
        let table = WindowTable::new("stereo", vec![0.0, 9.0, 0.5, 9.0, 1.0, 9.0], 2)?;
        assert_eq!(table.channel_count(), 2);
        assert_eq!(table.frame_count(), 3);
        let data = table.try_lock().unwrap();
        assert_eq!(data.frame(1), 0.5);
        assert_eq!(data.frame(2), 1.0);

        assert!(WindowTable::new("broken", vec![0.0; 3], 2).is_err());
        assert!(WindowTable::new("broken", vec![0.0; 3], 0).is_err());
        Ok(())
    }

    #[test]
    fn generators() {
        let hann = WindowTable::hann("hann", 512);
        let data = hann.try_lock().unwrap();
        assert_eq!(data.frame_count(), 512);
        assert_eq!(data.frame(0), 0.0);
        assert!((data.frame(256) - 1.0).abs() < 1e-6);

        let triangle = WindowTable::triangle("triangle", 4);
        let data = triangle.try_lock().unwrap();
        assert_eq!(
            (0..4).map(|i| data.frame(i)).collect::<Vec<_>>(),
            vec![0.0, 0.5, 1.0, 0.5]
        );
    }

    #[test]
    fn replace_bumps_generation() -> Result<(), Box<Error>> {
        let table = WindowTable::hann("hann", 16);
        assert_eq!(table.generation(), 0);
        table.replace(vec![1.0; 8], 1)?;
        assert_eq!(table.generation(), 1);
        assert_eq!(table.frame_count(), 8);
        table.notify_modified();
        assert_eq!(table.generation(), 2);
        assert!(table.replace(vec![1.0; 3], 2).is_err());
        assert_eq!(table.generation(), 2);
        Ok(())
    }

    #[test]
    fn try_lock_does_not_block() {
        let table = WindowTable::hann("hann", 16);
        let _writer = table.write_lock();
        assert!(table.try_lock().is_none());
    }

    #[test]
    fn registry() -> Result<(), Box<Error>> {
        let registry = WindowTableRegistry::new();
        assert!(registry.is_empty());
        let hann = registry.insert(WindowTable::hann("hann", 64))?;
        registry.insert(WindowTable::triangle("triangle", 64))?;
        assert_eq!(registry.names(), vec!["hann", "triangle"]);
        assert!(registry.get("missing").is_none());

        // re-inserting replaces the content of the existing table
        let replaced = registry.insert(WindowTable::mono("hann", vec![1.0; 32]))?;
        assert!(Arc::ptr_eq(&hann, &replaced));
        assert_eq!(hann.frame_count(), 32);
        assert_eq!(hann.generation(), 1);

        // removing releases the content
        let removed = registry.remove("hann").unwrap();
        assert!(removed.try_lock().unwrap().is_empty());
        assert!(registry.get("hann").is_none());
        Ok(())
    }

    #[test]
    fn concurrent_inserts_share_one_table() {
        let registry = WindowTableRegistry::new();
        for round in 0..200 {
            let name = format!("window{round}");
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let threads = (0..2)
                .map(|_| {
                    let registry = registry.clone();
                    let barrier = Arc::clone(&barrier);
                    let name = name.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        registry.insert(WindowTable::hann(&name, 8)).unwrap()
                    })
                })
                .collect::<Vec<_>>();
            let tables = threads
                .into_iter()
                .map(|thread| thread.join().unwrap())
                .collect::<Vec<_>>();
            let registered = registry.get(&name).unwrap();
            for table in &tables {
                assert!(Arc::ptr_eq(table, &registered));
            }
            // the second insert replaced the content of the first one
            assert_eq!(registered.generation(), 1);
        }
    }
}
