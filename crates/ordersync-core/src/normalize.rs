// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cycle-safe normalization of capability-typed references into canonical entities.
//!
//! Every entity ships as a contract trait (`CustomerContract`, ...) and one
//! canonical struct (`Customer`, ...). Code holding an `Arc<dyn CustomerContract>`
//! calls [`normalize`] to obtain an `Arc<Customer>`:
//!
//! - an already-canonical source comes back as the *same* `Arc`;
//! - anything else is deep-copied into a new canonical instance, related
//!   references normalized recursively;
//! - `None` stays `None`.
//!
//! # Cycles
//!
//! Customer/address graphs are mutually referential. Normalization threads
//! one [`IdentityMap`] through the whole recursive conversion. Construction
//! is two-phase: a target *shell* (scalars only) is registered under its
//! source pointer before any relation is followed, then [`Canonical::link`]
//! fills the relation slots. A reference back to a source that is still being
//! linked therefore resolves to the in-progress target instead of recursing.
//!
//! ```text
//!   normalize(C)
//!     shell C'  ── map[C] = C'
//!     link C'.default_address
//!        normalize(A)
//!          shell A' ── map[A] = A'
//!          link A'.customer ── map[C] hit ──► Weak(C')
//!     C'.default_address = A'
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Result, SyncError};

/// Deepest relation chain a single normalization may follow.
pub const MAX_DEPTH: usize = 256;

/// Type-erasure hook every contract trait inherits, used to detect canonical
/// sources and to retain visited sources in the identity map.
pub trait AsAnyArc: Send + Sync {
    /// Erase the concrete type, keeping the allocation.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A canonical entity type and the contract it normalizes from.
pub trait Canonical: Any + Send + Sync + Sized {
    /// The capability trait object this type is the canonical form of.
    type Contract: ?Sized + AsAnyArc;

    /// Entity name used in diagnostics.
    const ENTITY: &'static str;

    /// Copy every scalar field of `source`. Relation slots stay pending.
    fn shell(source: &Self::Contract) -> Self;

    /// Fill the relation slots of `target`, normalizing each related
    /// reference through `map`.
    fn link(target: &Arc<Self>, source: &Self::Contract, map: &mut IdentityMap) -> Result<()>;

    /// Reject a non-canonical `source` that cannot be the root of a
    /// normalization on its own.
    fn admit_root(_source: &Self::Contract) -> Result<()> {
        Ok(())
    }
}

struct Entry {
    target: Arc<dyn Any + Send + Sync>,
    // Keeps the source allocation alive so its address cannot be reused by
    // another source during the same call.
    _source: Arc<dyn Any + Send + Sync>,
}

/// Per-invocation map from source pointer to normalized target.
#[derive(Default)]
pub struct IdentityMap {
    entries: HashMap<usize, Entry>,
    depth: usize,
}

impl fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMap")
            .field("entries", &self.entries.len())
            .field("depth", &self.depth)
            .finish()
    }
}

impl IdentityMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct sources visited.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been visited yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup<T: Canonical>(&self, key: usize) -> Result<Option<Arc<T>>> {
        let Some(entry) = self.entries.get(&key) else {
            return Ok(None);
        };
        Arc::clone(&entry.target)
            .downcast::<T>()
            .map(Some)
            .map_err(|_| {
                SyncError::Invariant(format!(
                    "source {:#x} was normalized to a type other than {}",
                    key,
                    T::ENTITY
                ))
            })
    }

    fn remember(
        &mut self,
        key: usize,
        source: Arc<dyn Any + Send + Sync>,
        target: Arc<dyn Any + Send + Sync>,
    ) {
        self.entries.insert(
            key,
            Entry {
                target,
                _source: source,
            },
        );
    }

    fn descend(&mut self, entity: &'static str) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(SyncError::Invariant(format!(
                "normalization of {} exceeded depth {}",
                entity, MAX_DEPTH
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

fn source_key<C: ?Sized>(source: &Arc<C>) -> usize {
    Arc::as_ptr(source) as *const () as usize
}

/// Normalize one reference with a fresh identity map.
pub fn normalize<T: Canonical>(source: Option<&Arc<T::Contract>>) -> Result<Option<Arc<T>>> {
    if let Some(source) = source {
        admit_root::<T>(source)?;
    }
    let mut map = IdentityMap::new();
    normalize_with(source, &mut map)
}

/// Normalize a list of references sharing one identity map, so sources that
/// appear more than once (or reference each other) map to one target each.
pub fn normalize_many<T: Canonical>(
    sources: Option<&[Arc<T::Contract>]>,
) -> Result<Option<Vec<Arc<T>>>> {
    for source in sources.unwrap_or_default() {
        admit_root::<T>(source)?;
    }
    let mut map = IdentityMap::new();
    normalize_all(sources, &mut map)
}

fn admit_root<T: Canonical>(source: &Arc<T::Contract>) -> Result<()> {
    let erased = <T::Contract as AsAnyArc>::into_any_arc(Arc::clone(source));
    if erased.is::<T>() {
        return Ok(());
    }
    T::admit_root(source)
}

/// Normalize one reference through an existing map. Used by
/// [`Canonical::link`] implementations for related references.
pub fn normalize_with<T: Canonical>(
    source: Option<&Arc<T::Contract>>,
    map: &mut IdentityMap,
) -> Result<Option<Arc<T>>> {
    let Some(source) = source else {
        return Ok(None);
    };

    let key = source_key(source);
    if let Some(seen) = map.lookup::<T>(key)? {
        return Ok(Some(seen));
    }

    let erased = <T::Contract as AsAnyArc>::into_any_arc(Arc::clone(source));
    if let Ok(canonical) = Arc::clone(&erased).downcast::<T>() {
        map.remember(key, erased, canonical.clone());
        return Ok(Some(canonical));
    }

    map.descend(T::ENTITY)?;
    let target = Arc::new(T::shell(source));
    map.remember(key, erased, target.clone());
    let linked = T::link(&target, source, map);
    map.ascend();
    linked?;

    Ok(Some(target))
}

/// Normalize a related collection element-wise, preserving order. `None`
/// stays `None`; an empty list stays empty.
pub fn normalize_all<T: Canonical>(
    sources: Option<&[Arc<T::Contract>]>,
    map: &mut IdentityMap,
) -> Result<Option<Vec<Arc<T>>>> {
    let Some(sources) = sources else {
        return Ok(None);
    };

    let mut out = Vec::with_capacity(sources.len());
    for source in sources {
        let target = normalize_with::<T>(Some(source), map)?.ok_or_else(|| {
            SyncError::Invariant(format!("{} element normalized to nothing", T::ENTITY))
        })?;
        out.push(target);
    }
    Ok(Some(out))
}

/// A relation slot written exactly once, either at construction or while
/// linking a normalized shell. Reading a slot that was never filled yields
/// `None`.
pub struct Slot<T>(OnceLock<T>);

impl<T> Slot<T> {
    /// A filled slot.
    pub fn ready(value: T) -> Self {
        Self(OnceLock::from(value))
    }

    /// An empty slot awaiting [`Slot::fill`].
    pub fn pending() -> Self {
        Self(OnceLock::new())
    }

    /// Fill the slot. A second fill is an invariant violation.
    pub fn fill(&self, value: T) -> Result<()> {
        self.0
            .set(value)
            .map_err(|_| SyncError::Invariant("relation slot filled twice".to_string()))
    }

    /// Current value.
    pub fn get(&self) -> Option<&T> {
        self.0.get()
    }
}

impl<T: Clone> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            Some(value) => value.fmt(f),
            None => f.write_str("<pending>"),
        }
    }
}
