//! Process-wide store of generated coordinate arrays.
//!
//! Generating coordinates touches every pixel (four corners per pixel when
//! splitting), so caches built for the same detector share the arrays
//! through a [`CoordinateRegistry`]. The registry is a bounded LRU keyed by
//! value: two geometries that compare equal share entries even when they are
//! distinct objects. A miss, including one caused by eviction, just
//! regenerates.
#![allow(clippy::module_name_repetitions)]

use std::sync::{Arc, LazyLock};

use hashbrown::HashMap;
use log::debug;
use parking_lot::Mutex;
use pixint_core::{CoordinateKind, PixelCoordinates};
use pixint_geometry::{GeometryKey, Snapshot, SurfaceComponent};

/// Entries kept by [`CoordinateRegistry::global`].
pub const DEFAULT_CAPACITY: usize = 16;

/// What produced a coordinate array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CoordinateSource {
    /// Radial or azimuthal detector coordinate.
    Detector(CoordinateKind),
    /// Surface component for the orientation with the given snapshot.
    Surface {
        /// Parallel or perpendicular.
        component: SurfaceComponent,
        /// Orientation snapshot.
        orientation: Snapshot,
    },
}

/// Registry key: geometry identity plus everything generation depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoordinateKey {
    /// Detector and environment snapshots.
    pub geometry: GeometryKey,
    /// Coordinate kind.
    pub source: CoordinateSource,
    /// Envelope (`true`) or centre values.
    pub split: bool,
    /// Centre sampling flag.
    pub centre: bool,
}

impl CoordinateKey {
    /// Key for a detector coordinate.
    #[must_use]
    pub fn detector(geometry: GeometryKey, kind: CoordinateKind, split: bool, centre: bool) -> Self {
        Self {
            geometry,
            source: CoordinateSource::Detector(kind),
            split,
            // Envelopes are built from pixel corners and do not depend on it.
            centre: centre && !split,
        }
    }

    /// Key for a surface coordinate.
    #[must_use]
    pub fn surface(
        geometry: GeometryKey,
        component: SurfaceComponent,
        orientation: Snapshot,
        split: bool,
        centre: bool,
    ) -> Self {
        Self {
            geometry,
            source: CoordinateSource::Surface {
                component,
                orientation,
            },
            split,
            centre: centre && !split,
        }
    }
}

/// Lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Lookups answered from the registry.
    pub hits: u64,
    /// Lookups that had to generate.
    pub misses: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
}

struct Entry {
    coords: Arc<PixelCoordinates>,
    last_used: u64,
}

#[derive(Default)]
struct State {
    entries: HashMap<CoordinateKey, Entry>,
    clock: u64,
    stats: RegistryStats,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Bounded least-recently-used map from [`CoordinateKey`] to shared arrays.
pub struct CoordinateRegistry {
    capacity: usize,
    state: Mutex<State>,
}

impl Default for CoordinateRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for CoordinateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateRegistry")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

static GLOBAL: LazyLock<Arc<CoordinateRegistry>> =
    LazyLock::new(|| Arc::new(CoordinateRegistry::new(DEFAULT_CAPACITY)));

impl CoordinateRegistry {
    /// Registry holding at most `capacity` arrays. Zero disables storage.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(State::default()),
        }
    }

    /// The registry shared by every cache that was not given its own.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the lookup counters.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.state.lock().stats
    }

    /// True if `key` is currently stored.
    #[must_use]
    pub fn contains(&self, key: &CoordinateKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Drops every entry; counters are kept.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Returns the array stored under `key`, generating and storing it on a miss.
    ///
    /// Generation runs without holding the lock. If another thread stored
    /// the same key meanwhile, its array wins so all callers share one copy.
    pub fn get_or_insert_with<F>(&self, key: &CoordinateKey, generate: F) -> Arc<PixelCoordinates>
    where
        F: FnOnce() -> PixelCoordinates,
    {
        {
            let mut state = self.state.lock();
            let now = state.tick();
            if let Some(entry) = state.entries.get_mut(key) {
                entry.last_used = now;
                let coords = Arc::clone(&entry.coords);
                state.stats.hits += 1;
                debug!("coordinate registry hit for {:?}", key.source);
                return coords;
            }
            state.stats.misses += 1;
        }

        debug!("coordinate registry miss for {:?}, generating", key.source);
        let coords = Arc::new(generate());
        if self.capacity == 0 {
            return coords;
        }

        let mut state = self.state.lock();
        let now = state.tick();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.last_used = now;
            return Arc::clone(&entry.coords);
        }
        while state.entries.len() >= self.capacity {
            let Some(oldest) = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            state.entries.remove(&oldest);
            state.stats.evictions += 1;
        }
        state.entries.insert(
            key.clone(),
            Entry {
                coords: Arc::clone(&coords),
                last_used: now,
            },
        );
        coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use pixint_core::RadialAxisType;

    fn key(n: f64) -> CoordinateKey {
        CoordinateKey::detector(
            GeometryKey {
                detector: Snapshot::from_values(&[n]),
                environment: Snapshot::default(),
            },
            CoordinateKind::Radial(RadialAxisType::Q),
            false,
            true,
        )
    }

    fn coords(v: f64) -> PixelCoordinates {
        PixelCoordinates::Centre(Array2::from_elem((1, 1), v))
    }

    #[test]
    fn test_hit_returns_shared_array() {
        let registry = CoordinateRegistry::new(4);
        let a = registry.get_or_insert_with(&key(1.0), || coords(1.0));
        let b = registry.get_or_insert_with(&key(1.0), || coords(2.0));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(
            registry.stats(),
            RegistryStats {
                hits: 1,
                misses: 1,
                evictions: 0
            }
        );
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let registry = CoordinateRegistry::new(2);
        registry.get_or_insert_with(&key(1.0), || coords(1.0));
        registry.get_or_insert_with(&key(2.0), || coords(2.0));
        // Touch 1 so that 2 is the oldest.
        registry.get_or_insert_with(&key(1.0), || coords(1.0));
        registry.get_or_insert_with(&key(3.0), || coords(3.0));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&key(1.0)));
        assert!(!registry.contains(&key(2.0)));
        assert!(registry.contains(&key(3.0)));
        assert_eq!(registry.stats().evictions, 1);
    }

    #[test]
    fn test_zero_capacity_never_stores() {
        let registry = CoordinateRegistry::new(0);
        let a = registry.get_or_insert_with(&key(1.0), || coords(1.0));
        let b = registry.get_or_insert_with(&key(1.0), || coords(1.0));
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(registry.is_empty());
        assert_eq!(registry.stats().misses, 2);
    }

    #[test]
    fn test_split_keys_ignore_centre_flag() {
        let geometry = GeometryKey::default();
        let kind = CoordinateKind::Azimuthal;
        assert_eq!(
            CoordinateKey::detector(geometry.clone(), kind, true, true),
            CoordinateKey::detector(geometry.clone(), kind, true, false)
        );
        assert_ne!(
            CoordinateKey::detector(geometry.clone(), kind, false, true),
            CoordinateKey::detector(geometry, kind, false, false)
        );
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&CoordinateRegistry::global(), &CoordinateRegistry::global()));
    }
}
