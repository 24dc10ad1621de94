//! Generic fixed-capacity slot registry with name-addressed reference counting
//!
//! All five resource systems (texture, material, geometry, shader, camera)
//! are backed by the same registry discipline: a fixed-size slot arena plus
//! a name index carrying per-name reference bookkeeping. Capacity is set at
//! initialization and never grows; running out of slots is a fatal
//! configuration condition and the caller is expected to enlarge the
//! configured capacity.
//!
//! Handles pair a slot index with the slot's generation so that references
//! held across a destroy-and-reuse cycle resolve to `None` instead of
//! silently aliasing the new occupant. The name index is keyed by the full
//! name string; two distinct names can never collide onto one slot.

use std::collections::HashMap;
use thiserror::Error;

/// Errors produced by registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Every slot is occupied; the configured capacity must be raised
    #[error("{kind} registry is full ({capacity} slots); increase the configured capacity")]
    CapacityExhausted {
        /// Resource kind the registry holds, for diagnostics
        kind: &'static str,
        /// Configured slot count
        capacity: usize,
    },
}

/// Lightweight reference to a registry slot
///
/// Pairs the slot index with the generation observed at bind time. A handle
/// outlives the resource it names; `SlotRegistry::get` detects staleness by
/// generation mismatch and returns `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Reserved handle addressing a system's default resource
    ///
    /// Default resources live outside the registry; systems intercept this
    /// sentinel before any slot lookup.
    pub const DEFAULT: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Whether this handle is the reserved default-resource sentinel
    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }

    /// Slot index this handle refers to
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Per-name reference bookkeeping stored in the name index
///
/// Distinct from the slot itself: the reference tracks how many acquirers
/// hold the name and whether the first acquirer requested automatic
/// destruction at refcount zero; the slot holds the actual payload.
#[derive(Debug)]
struct RegistryReference {
    ref_count: usize,
    handle: Option<Handle>,
    auto_release: bool,
}

/// A bound slot: the resource payload plus the name that owns it
#[derive(Debug)]
struct Slot<T> {
    name: String,
    resource: T,
}

/// Outcome of a release operation
#[derive(Debug, PartialEq, Eq)]
pub enum Release {
    /// The name was never acquired (logged as a warning by the registry)
    NotAcquired,
    /// The reference count dropped but the resource stays alive
    Retained,
    /// The count reached zero with auto-release set; the caller must now
    /// finish with [`SlotRegistry::destroy`] (or defer it)
    ShouldDestroy(Handle),
}

/// Fixed-capacity, name-indexed slot arena
pub struct SlotRegistry<T> {
    kind: &'static str,
    slots: Vec<Option<Slot<T>>>,
    /// Per-index generation counters; survive slot destruction so stale
    /// handles from a previous occupant never match a reused index.
    generations: Vec<u32>,
    references: HashMap<String, RegistryReference>,
}

impl<T> SlotRegistry<T> {
    /// Create a registry with a fixed slot capacity
    ///
    /// # Arguments
    /// * `kind` - Resource kind name used in log messages
    /// * `capacity` - Number of slots; never grows after creation
    pub fn new(kind: &'static str, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            kind,
            slots,
            generations: vec![0; capacity],
            references: HashMap::new(),
        }
    }

    /// Acquire a reference to `name`, creating the resource if needed
    ///
    /// The first acquisition of a name fixes its `auto_release` policy;
    /// later acquisitions cannot alter it. The reference count increments
    /// unconditionally. When the name has no bound slot the first free slot
    /// is claimed and `create` is invoked with the handle the resource will
    /// be bound to; a full registry is a fatal error.
    pub fn acquire_with<E>(
        &mut self,
        name: &str,
        auto_release: bool,
        create: impl FnOnce(Handle) -> Result<T, E>,
    ) -> Result<Handle, E>
    where
        E: From<RegistryError>,
    {
        let reference = self
            .references
            .entry(name.to_string())
            .or_insert(RegistryReference {
                ref_count: 0,
                handle: None,
                auto_release,
            });

        if let Some(handle) = reference.handle {
            reference.ref_count += 1;
            log::trace!(
                "{} '{}' acquired, ref_count={}",
                self.kind,
                name,
                reference.ref_count
            );
            return Ok(handle);
        }

        // New reference: find a free slot before committing anything.
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            let capacity = self.slots.len();
            if self.references[name].ref_count == 0 {
                self.references.remove(name);
            }
            log::error!(
                "{} registry exhausted: no free slot for '{}' ({} slots configured)",
                self.kind,
                name,
                capacity
            );
            return Err(RegistryError::CapacityExhausted {
                kind: self.kind,
                capacity,
            }
            .into());
        };

        self.generations[index] += 1;
        let handle = Handle {
            index: index as u32,
            generation: self.generations[index],
        };

        let resource = match create(handle) {
            Ok(resource) => resource,
            Err(e) => {
                // Roll back: the bind never happened.
                self.generations[index] -= 1;
                if let Some(r) = self.references.get(name) {
                    if r.ref_count == 0 {
                        self.references.remove(name);
                    }
                }
                return Err(e);
            }
        };

        self.slots[index] = Some(Slot {
            name: name.to_string(),
            resource,
        });
        if let Some(reference) = self.references.get_mut(name) {
            reference.handle = Some(handle);
            reference.ref_count += 1;
        }
        log::debug!(
            "{} '{}' bound to slot {} (generation {})",
            self.kind,
            name,
            index,
            handle.generation
        );
        Ok(handle)
    }

    /// Decrement the reference count for `name`
    ///
    /// Returns [`Release::ShouldDestroy`] when the count reaches zero and
    /// the name was acquired with auto-release; the caller then finishes
    /// with [`destroy`](Self::destroy) or defers it (e.g. while an async
    /// load is still in flight). Releasing a name that was never acquired
    /// is a non-fatal warning.
    pub fn release(&mut self, name: &str) -> Release {
        let Some(reference) = self.references.get_mut(name) else {
            log::warn!(
                "release of {} '{}' which was never acquired",
                self.kind,
                name
            );
            return Release::NotAcquired;
        };
        if reference.ref_count == 0 {
            log::warn!("release of {} '{}' with ref_count already 0", self.kind, name);
            return Release::Retained;
        }

        reference.ref_count -= 1;
        log::trace!(
            "{} '{}' released, ref_count={}",
            self.kind,
            name,
            reference.ref_count
        );
        if reference.ref_count == 0 && reference.auto_release {
            if let Some(handle) = reference.handle {
                return Release::ShouldDestroy(handle);
            }
        }
        Release::Retained
    }

    /// Remove `name` from the registry and take its payload for teardown
    ///
    /// Clears the slot (it becomes reusable) and drops the name-index
    /// entry. Returns `None` if the name has no bound slot.
    pub fn destroy(&mut self, name: &str) -> Option<T> {
        let reference = self.references.remove(name)?;
        let handle = reference.handle?;
        let slot = self.slots[handle.index as usize].take()?;
        log::debug!("{} '{}' destroyed, slot {} freed", self.kind, name, handle.index);
        Some(slot.resource)
    }

    /// Resolve a handle to its payload, failing on stale generations
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let index = handle.index as usize;
        if index >= self.slots.len() || self.generations[index] != handle.generation {
            return None;
        }
        self.slots[index].as_ref().map(|s| &s.resource)
    }

    /// Mutable variant of [`get`](Self::get)
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let index = handle.index as usize;
        if index >= self.slots.len() || self.generations[index] != handle.generation {
            return None;
        }
        self.slots[index].as_mut().map(|s| &mut s.resource)
    }

    /// Handle currently bound to `name`, if any
    pub fn handle_of(&self, name: &str) -> Option<Handle> {
        self.references.get(name).and_then(|r| r.handle)
    }

    /// Current reference count for `name` (0 if unknown)
    pub fn ref_count(&self, name: &str) -> usize {
        self.references.get(name).map_or(0, |r| r.ref_count)
    }

    /// Whether `name` was first acquired with auto-release
    pub fn auto_release(&self, name: &str) -> Option<bool> {
        self.references.get(name).map(|r| r.auto_release)
    }

    /// Number of live (bound) slots
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Configured slot capacity
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Tear down every live slot, returning `(name, payload)` pairs
    ///
    /// Used at shutdown so systems can return backend resources for slots
    /// that were retained at refcount zero or still held at exit.
    pub fn drain_all(&mut self) -> Vec<(String, T)> {
        self.references.clear();
        self.slots
            .iter_mut()
            .filter_map(Option::take)
            .map(|slot| (slot.name, slot.resource))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(capacity: usize) -> SlotRegistry<u32> {
        SlotRegistry::new("test", capacity)
    }

    fn acquire(r: &mut SlotRegistry<u32>, name: &str, auto_release: bool, value: u32) -> Handle {
        r.acquire_with(name, auto_release, |_| Ok::<_, RegistryError>(value))
            .unwrap()
    }

    #[test]
    fn test_same_name_shares_slot_and_counts_refs() {
        let mut r = registry(4);
        let a = acquire(&mut r, "brick", true, 7);
        let b = acquire(&mut r, "brick", true, 99);
        assert_eq!(a, b);
        assert_eq!(r.ref_count("brick"), 2);
        assert_eq!(r.live_count(), 1);
        // Second acquire must not have re-run creation
        assert_eq!(r.get(a), Some(&7));
    }

    #[test]
    fn test_auto_release_destroys_exactly_after_last_release() {
        let mut r = registry(4);
        let h = acquire(&mut r, "brick", true, 7);
        acquire(&mut r, "brick", true, 7);
        acquire(&mut r, "brick", true, 7);

        assert_eq!(r.release("brick"), Release::Retained);
        assert_eq!(r.release("brick"), Release::Retained);
        assert_eq!(r.release("brick"), Release::ShouldDestroy(h));
        assert_eq!(r.destroy("brick"), Some(7));
        assert_eq!(r.live_count(), 0);
        assert!(r.get(h).is_none());
    }

    #[test]
    fn test_no_auto_release_retains_at_zero() {
        let mut r = registry(4);
        let h = acquire(&mut r, "font_atlas", false, 1);
        assert_eq!(r.release("font_atlas"), Release::Retained);
        assert_eq!(r.ref_count("font_atlas"), 0);
        assert_eq!(r.get(h), Some(&1));
    }

    #[test]
    fn test_auto_release_fixed_by_first_acquirer() {
        let mut r = registry(4);
        acquire(&mut r, "brick", false, 1);
        // A later acquirer asking for auto-release must not flip the policy
        acquire(&mut r, "brick", true, 1);
        assert_eq!(r.release("brick"), Release::Retained);
        assert_eq!(r.release("brick"), Release::Retained);
        assert_eq!(r.ref_count("brick"), 0);
        assert_eq!(r.live_count(), 1);
    }

    #[test]
    fn test_capacity_exhaustion_is_fatal_and_freed_slot_is_reused() {
        let mut r = registry(2);
        acquire(&mut r, "a", true, 1);
        acquire(&mut r, "b", true, 2);

        let overflow = r.acquire_with("c", true, |_| Ok::<_, RegistryError>(3));
        assert!(matches!(
            overflow,
            Err(RegistryError::CapacityExhausted { capacity: 2, .. })
        ));
        // The failed acquisition must leave no dangling reference entry
        assert_eq!(r.ref_count("c"), 0);

        // Releasing one resource frees its slot for the new name
        assert!(matches!(r.release("a"), Release::ShouldDestroy(_)));
        r.destroy("a");
        let h = acquire(&mut r, "c", true, 3);
        assert_eq!(r.get(h), Some(&3));
        assert_eq!(r.live_count(), 2);
    }

    #[test]
    fn test_release_of_unknown_name_is_nonfatal() {
        let mut r = registry(2);
        assert_eq!(r.release("never_acquired"), Release::NotAcquired);
    }

    #[test]
    fn test_stale_handle_does_not_resolve_after_reuse() {
        let mut r = registry(1);
        let old = acquire(&mut r, "a", true, 1);
        r.release("a");
        r.destroy("a");

        let new = acquire(&mut r, "b", true, 2);
        assert_eq!(old.index(), new.index());
        assert!(r.get(old).is_none());
        assert_eq!(r.get(new), Some(&2));
    }

    #[test]
    fn test_failed_creation_rolls_back() {
        let mut r = registry(2);
        let result = r.acquire_with("bad", true, |_| {
            Err::<u32, _>(RegistryError::CapacityExhausted {
                kind: "test",
                capacity: 0,
            })
        });
        assert!(result.is_err());
        assert_eq!(r.ref_count("bad"), 0);
        assert_eq!(r.live_count(), 0);
        // The slot is still usable afterwards
        let h = acquire(&mut r, "good", true, 5);
        assert_eq!(r.get(h), Some(&5));
    }

    #[test]
    fn test_drain_all_returns_every_live_payload() {
        let mut r = registry(4);
        acquire(&mut r, "a", true, 1);
        acquire(&mut r, "b", false, 2);
        let mut drained = r.drain_all();
        drained.sort();
        assert_eq!(
            drained,
            vec![("a".to_string(), 1), ("b".to_string(), 2)]
        );
        assert_eq!(r.live_count(), 0);
    }
}
