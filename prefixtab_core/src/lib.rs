//! Fixed-capacity IPv4 prefix table with longest-prefix-match lookup.
//!
//! Lookups are lock-free: they scan an immutable snapshot of the entry set
//! protected by `crossbeam-epoch`. Mutations serialise on a writer mutex,
//! publish a fresh snapshot and retire the old one.

pub mod constants;
pub mod errors;
pub mod helpers;
pub mod telemetry;
pub mod types;

#[cfg(feature = "legacy_abi")]
pub mod legacy_abi;

use constants::*;
use crossbeam_epoch::{self as epoch, Atomic, Owned};
use errors::Error;
use helpers::{validate_base, validate_len};
use log::{debug, info, trace, warn};
use metrics::{counter, gauge};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::{atomic::Ordering, Mutex};
use types::*;

pub use errors::ErrorCode;
pub use types::{Prefix, PrefixTable, TableConfig};

impl PrefixTable {
    // ---- logging bootstraper -------------------------------------------------
    fn ensure_logging() {
        static INIT: OnceCell<()> = OnceCell::new();
        INIT.get_or_init(|| {
            // Fallback: simple env_logger with RFC‑3339 ts off.
            let _ = env_logger::builder()
                .format_timestamp(None)
                .is_test(std::env::var("RUST_TEST_THREADS").is_ok())
                .try_init();
        });
    }

    /// Empty table holding up to 64 prefixes.
    pub fn new() -> Self {
        Self::ensure_logging();
        Self::empty(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        Self::with_config(TableConfig { capacity })
    }

    pub fn with_config(config: TableConfig) -> Result<Self, Error> {
        Self::ensure_logging();
        if config.capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        if config.capacity > MAX_CAPACITY {
            return Err(Error::CapacityExceeded);
        }
        debug!("[OPEN] capacity={}", config.capacity);
        Ok(Self::empty(config.capacity))
    }

    fn empty(capacity: usize) -> Self {
        Self {
            snapshot: Atomic::new(Vec::with_capacity(capacity)),
            writer: Mutex::new(()),
            capacity,
        }
    }

    /// Run `f` over the current snapshot without taking the writer lock.
    fn read<R>(&self, f: impl FnOnce(&[Prefix]) -> R) -> R {
        let guard = epoch::pin();
        let shared = self.snapshot.load(Ordering::Acquire, &guard);
        // SAFETY: the pointer is never null and the snapshot it names is
        // only destroyed after every guard pinned before the swap is gone.
        let entries = unsafe { shared.deref() };
        f(entries)
    }

    /// Apply `f` to a private copy of the entry set and publish it only
    /// if `f` succeeds. Readers see the old set or the new one.
    fn mutate<R>(&self, f: impl FnOnce(&mut Snapshot) -> Result<R, Error>) -> Result<R, Error> {
        let _write_guard = self
            .writer
            .lock()
            .map_err(|e| Error::Lock(format!("writer lock poisoned: {e}")))?;
        let guard = epoch::pin();
        let current = self.snapshot.load(Ordering::Acquire, &guard);
        // SAFETY: see `read`; the writer lock also keeps other writers out.
        let mut next: Snapshot = unsafe { current.deref() }.clone();

        let out = f(&mut next)?;

        let len = next.len();
        let old = self.snapshot.swap(Owned::new(next), Ordering::AcqRel, &guard);
        // SAFETY: `old` is unreachable from the table now.
        unsafe { guard.defer_destroy(old) };
        gauge!("prefixtab_entries").set(len as f64);
        trace!("[MUTATE] published snapshot with {} entries", len);
        Ok(out)
    }

    // `*_total` counters count applied changes; failures only bump
    // `prefixtab_rejected_total`.
    fn reject(op: &'static str, e: Error) -> Error {
        warn!("[{}] rejected: {}", op, e);
        counter!("prefixtab_rejected_total", "op" => op).increment(1);
        e
    }

    /// Insert `base/prefix_len`. Host bits of `base` are masked off first.
    pub fn add(&self, base: u32, prefix_len: u8) -> Result<(), Error> {
        info!("[ADD] base={:#010x}, prefix_len={}", base, prefix_len);
        let prefix = Prefix::new(base, prefix_len).map_err(|e| Self::reject("ADD", e))?;
        let capacity = self.capacity;
        self.mutate(|entries| insert_sorted(entries, prefix, capacity))
            .map_err(|e| Self::reject("ADD", e))?;
        counter!("prefixtab_adds_total").increment(1);
        Ok(())
    }

    /// Remove exactly `base/prefix_len`.
    pub fn delete(&self, base: u32, prefix_len: u8) -> Result<(), Error> {
        info!("[DELETE] base={:#010x}, prefix_len={}", base, prefix_len);
        let prefix = Prefix::new(base, prefix_len).map_err(|e| Self::reject("DELETE", e))?;
        self.mutate(|entries| {
            match entries.binary_search_by_key(&prefix.sort_key(), Prefix::sort_key) {
                Ok(idx) => {
                    entries.remove(idx);
                    Ok(())
                }
                Err(_) => Err(Error::NotFound),
            }
        })
        .map_err(|e| Self::reject("DELETE", e))?;
        counter!("prefixtab_deletes_total").increment(1);
        Ok(())
    }

    /// Mask length of the most specific prefix covering `addr`.
    pub fn check(&self, addr: u32) -> Option<u8> {
        self.longest_match(addr).map(|p| p.prefix_len())
    }

    /// The most specific stored prefix covering `addr`.
    pub fn longest_match(&self, addr: u32) -> Option<Prefix> {
        counter!("prefixtab_checks_total").increment(1);
        // entries are ordered most specific first, so the first hit wins
        let hit = self.read(|entries| entries.iter().copied().find(|p| p.contains(addr)));
        trace!("[CHECK] addr={:#010x} -> {:?}", addr, hit);
        hit
    }

    /// [`add`](Self::add) for callers holding unvalidated integers.
    pub fn add_raw(&self, base: i64, prefix_len: i64) -> Result<(), Error> {
        let (base, plen) = validate_raw(base, prefix_len).map_err(|e| Self::reject("ADD", e))?;
        self.add(base, plen)
    }

    pub fn delete_raw(&self, base: i64, prefix_len: i64) -> Result<(), Error> {
        let (base, plen) = validate_raw(base, prefix_len).map_err(|e| Self::reject("DELETE", e))?;
        self.delete(base, plen)
    }

    pub fn check_raw(&self, addr: i64) -> Result<Option<u8>, Error> {
        let addr = validate_base(addr).map_err(|e| Self::reject("CHECK", e))?;
        Ok(self.check(addr))
    }

    /// Insert every item or none of them.
    pub fn bulk_add(&self, items: &[(u32, u8)]) -> Result<(), Error> {
        info!("[BULK_ADD] {} items", items.len());
        let prefixes = items
            .iter()
            .map(|&(base, plen)| Prefix::new(base, plen))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Self::reject("BULK_ADD", e))?;
        let capacity = self.capacity;
        self.mutate(|entries| {
            for p in prefixes {
                insert_sorted(entries, p, capacity)?;
            }
            Ok(())
        })
        .map_err(|e| Self::reject("BULK_ADD", e))?;
        counter!("prefixtab_adds_total").increment(items.len() as u64);
        Ok(())
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, Error> {
        info!("[CLEAR] Clearing table.");
        self.mutate(|entries| {
            let n = entries.len();
            entries.clear();
            Ok(n)
        })
    }

    /// Exact (canonicalised) presence test.
    pub fn contains(&self, base: u32, prefix_len: u8) -> bool {
        match Prefix::new(base, prefix_len) {
            Ok(p) => self.read(|entries| {
                entries
                    .binary_search_by_key(&p.sort_key(), Prefix::sort_key)
                    .is_ok()
            }),
            Err(_) => false,
        }
    }

    /// Copy of the entry set, most specific first.
    pub fn entries(&self) -> Vec<Prefix> {
        self.read(|entries| entries.to_vec())
    }

    pub fn len(&self) -> usize {
        self.read(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of free slots (capacity - used).
    pub fn available_capacity(&self) -> usize {
        self.capacity - self.len()
    }
} // end impl PrefixTable

fn validate_raw(base: i64, prefix_len: i64) -> Result<(u32, u8), Error> {
    let plen = validate_len(prefix_len)?;
    let base = validate_base(base)?;
    Ok((base, plen))
}

fn insert_sorted(entries: &mut Snapshot, prefix: Prefix, capacity: usize) -> Result<(), Error> {
    if entries.len() >= capacity {
        return Err(Error::CapacityExceeded);
    }
    match entries.binary_search_by_key(&prefix.sort_key(), Prefix::sort_key) {
        Ok(_) => Err(Error::DuplicatePrefix),
        Err(idx) => {
            entries.insert(idx, prefix);
            Ok(())
        }
    }
}

impl Default for PrefixTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PrefixTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixTable")
            .field("capacity", &self.capacity)
            .field("entries", &self.entries())
            .finish()
    }
}

impl Drop for PrefixTable {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no reader holds a reference into the
        // current snapshot; earlier snapshots are already deferred.
        unsafe {
            let guard = epoch::unprotected();
            let shared = self.snapshot.swap(epoch::Shared::null(), Ordering::Relaxed, guard);
            if !shared.is_null() {
                drop(shared.into_owned());
            }
        }
    }
}

// Public module for C API functions
pub mod public_api;

// Re-export all public API functions at the crate root
pub use public_api::*;

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
    use std::sync::Arc;

    #[test]
    fn entries_stay_ordered_most_specific_first() {
        let t = PrefixTable::new();
        t.add(0x0A00_0000, 8).unwrap();
        t.add(0x0A14_0000, 16).unwrap();
        t.add(0, 0).unwrap();
        t.add(0x0A14_0100, 24).unwrap();
        t.add(0x0900_0000, 8).unwrap();
        let lens: Vec<u8> = t.entries().iter().map(Prefix::prefix_len).collect();
        assert_eq!(lens, vec![24, 16, 8, 8, 0]);
        assert_eq!(t.entries()[2].base(), 0x0900_0000);
    }

    #[test]
    fn failed_mutation_publishes_nothing() {
        let t = PrefixTable::with_capacity(2).unwrap();
        t.add(1 << 24, 8).unwrap();
        let err = t.bulk_add(&[(2 << 24, 8), (3 << 24, 8)]).unwrap_err();
        assert_eq!(err, Error::CapacityExceeded);
        assert_eq!(t.entries(), vec![Prefix::new(1 << 24, 8).unwrap()]);
    }

    #[derive(Default)]
    struct AddCounter {
        adds: Arc<AtomicU64>,
        rejected: Arc<AtomicU64>,
    }

    impl Recorder for AddCounter {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            match key.name() {
                "prefixtab_adds_total" => Counter::from_arc(Arc::clone(&self.adds)),
                "prefixtab_rejected_total" => Counter::from_arc(Arc::clone(&self.rejected)),
                _ => Counter::noop(),
            }
        }
        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }
        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn adds_total_counts_only_applied_inserts() {
        let rec = AddCounter::default();
        let t = PrefixTable::with_capacity(3).unwrap();
        metrics::with_local_recorder(&rec, || {
            t.add(0x0A00_0000, 8).unwrap();
            t.add(0x0A00_0000, 8).unwrap_err();
            t.add(0x0A00_0000, 40).unwrap_err();
            t.add_raw(-1, 8).unwrap_err();
            t.bulk_add(&[(0x0B00_0000, 8), (0x0C00_0000, 8)]).unwrap();
            t.bulk_add(&[(0x0D00_0000, 8)]).unwrap_err();
        });
        assert_eq!(rec.adds.load(AtomicOrdering::SeqCst), 3);
        assert_eq!(rec.rejected.load(AtomicOrdering::SeqCst), 4);
    }

    #[test]
    fn capacity_bounds() {
        assert_eq!(PrefixTable::with_capacity(0).unwrap_err(), Error::ZeroCapacity);
        assert_eq!(
            PrefixTable::with_capacity(MAX_CAPACITY + 1).unwrap_err(),
            Error::CapacityExceeded
        );
        assert_eq!(PrefixTable::default().capacity(), 64);
    }
}
