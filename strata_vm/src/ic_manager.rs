//! Inline cache registry.
//!
//! The [`IcManager`] owns every cache site of a realm's code, keyed by
//! [`IcSiteId`], and aggregates their statistics. Sites are created on first
//! use and shared as `Arc`s, so an execution engine can hold a site directly
//! after the first lookup.
//!
//! # Classification
//!
//! ```text
//!   Uninitialized ── first miss ──▶ Monomorphic (1 entry)
//!                                        │
//!                                        ▼
//!                                   Bimorphic (2 entries)
//!                                        │
//!                                        ▼
//!                                   Polymorphic (3..=limit)
//!                                        │ limit + 1
//!                                        ▼
//!                                   Megamorphic
//! ```

use crate::element::{ReadElementCache, WriteElementCache};
use crate::property::{CacheState, CacheStats, PropertyGetCache, PropertyHasCache, PropertySetCache};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use strata_core::RuntimeConfig;
use strata_runtime::{AbsentPolicy, PropertyKey};
use tracing::debug;

// =============================================================================
// Site Identifier
// =============================================================================

/// Identity of a code unit (function body, script).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeId(pub u32);

/// Unique identifier of one cache site: the code unit and the offset of the
/// access within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IcSiteId {
    pub code_id: CodeId,
    pub offset: u32,
}

impl IcSiteId {
    #[inline]
    pub const fn new(code_id: CodeId, offset: u32) -> Self {
        Self { code_id, offset }
    }
}

// =============================================================================
// Sites
// =============================================================================

/// A registered cache site.
#[derive(Debug, Clone)]
pub enum IcSite {
    Get(Arc<PropertyGetCache>),
    Set(Arc<PropertySetCache>),
    Has(Arc<PropertyHasCache>),
    ReadElement(Arc<ReadElementCache>),
    WriteElement(Arc<WriteElementCache>),
}

impl IcSite {
    fn state(&self) -> CacheState {
        match self {
            IcSite::Get(c) => c.state(),
            IcSite::Set(c) => c.state(),
            IcSite::Has(c) => c.state(),
            IcSite::ReadElement(c) => c.state(),
            IcSite::WriteElement(c) => c.state(),
        }
    }

    fn entry_count(&self) -> usize {
        match self {
            IcSite::Get(c) => c.entries().len(),
            IcSite::Set(c) => c.entries().len(),
            IcSite::Has(c) => c.entries().len(),
            IcSite::ReadElement(c) => c.entries().len(),
            IcSite::WriteElement(c) => c.entries().len(),
        }
    }

    /// Hit/miss counters of the site's chain.
    pub fn stats(&self) -> CacheStats {
        match self {
            IcSite::Get(c) => c.stats(),
            IcSite::Set(c) => c.stats(),
            IcSite::Has(c) => c.stats(),
            IcSite::ReadElement(c) => c.stats(),
            IcSite::WriteElement(c) => c.stats(),
        }
    }

    /// Classification for diagnostics and tiering decisions.
    pub fn classification(&self) -> IcClassification {
        match self.state() {
            CacheState::Uninitialized => IcClassification::Uninitialized,
            CacheState::Megamorphic => IcClassification::Megamorphic,
            CacheState::Monomorphic => IcClassification::Monomorphic,
            CacheState::Polymorphic if self.entry_count() == 2 => IcClassification::Bimorphic,
            CacheState::Polymorphic => IcClassification::Polymorphic,
        }
    }

    /// Force the site into the megamorphic state.
    pub fn make_megamorphic(&self) {
        match self {
            IcSite::Get(c) => c.make_megamorphic(),
            IcSite::Set(c) => c.make_megamorphic(),
            IcSite::Has(c) => c.make_megamorphic(),
            IcSite::ReadElement(c) => c.make_megamorphic(),
            IcSite::WriteElement(c) => c.make_megamorphic(),
        }
    }
}

/// Classification of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcClassification {
    /// Never missed.
    Uninitialized,
    /// One receiver class.
    Monomorphic,
    /// Two receiver classes.
    Bimorphic,
    /// Three or more, up to the cache limit.
    Polymorphic,
    /// Generic lookup.
    Megamorphic,
}

// =============================================================================
// IC Manager
// =============================================================================

/// Registry of all cache sites.
#[derive(Debug)]
pub struct IcManager {
    sites: RwLock<FxHashMap<IcSiteId, IcSite>>,
    config: RuntimeConfig,
}

impl IcManager {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            sites: RwLock::new(FxHashMap::default()),
            config: config.clone(),
        }
    }

    /// Create with room for `capacity` sites.
    pub fn with_capacity(config: &RuntimeConfig, capacity: usize) -> Self {
        Self {
            sites: RwLock::new(FxHashMap::with_capacity_and_hasher(capacity, Default::default())),
            config: config.clone(),
        }
    }

    // =========================================================================
    // Site Lookup
    // =========================================================================

    /// The get site at `site` reading `key` with `policy`.
    ///
    /// Key, policy and strictness of a site are fixed by its first lookup.
    pub fn get_site(&self, site: IcSiteId, key: &PropertyKey, policy: AbsentPolicy) -> Arc<PropertyGetCache> {
        self.site_or_insert(
            site,
            |s| match s {
                IcSite::Get(c) => Some(c),
                _ => None,
            },
            IcSite::Get,
            |config| PropertyGetCache::with_policy(key.clone(), policy, config),
        )
    }

    /// The set site at `site` assigning `key`.
    pub fn set_site(&self, site: IcSiteId, key: &PropertyKey, strict: bool) -> Arc<PropertySetCache> {
        self.site_or_insert(
            site,
            |s| match s {
                IcSite::Set(c) => Some(c),
                _ => None,
            },
            IcSite::Set,
            |config| PropertySetCache::new(key.clone(), strict, config),
        )
    }

    /// The `in` site at `site` testing `key`.
    pub fn has_site(&self, site: IcSiteId, key: &PropertyKey) -> Arc<PropertyHasCache> {
        self.site_or_insert(
            site,
            |s| match s {
                IcSite::Has(c) => Some(c),
                _ => None,
            },
            IcSite::Has,
            |config| PropertyHasCache::new(key.clone(), config),
        )
    }

    /// The element read site at `site`.
    pub fn read_element_site(&self, site: IcSiteId) -> Arc<ReadElementCache> {
        self.site_or_insert(
            site,
            |s| match s {
                IcSite::ReadElement(c) => Some(c),
                _ => None,
            },
            IcSite::ReadElement,
            ReadElementCache::new,
        )
    }

    /// The element write site at `site`.
    pub fn write_element_site(&self, site: IcSiteId, strict: bool) -> Arc<WriteElementCache> {
        self.site_or_insert(
            site,
            |s| match s {
                IcSite::WriteElement(c) => Some(c),
                _ => None,
            },
            IcSite::WriteElement,
            |config| WriteElementCache::new(strict, config),
        )
    }

    /// Look up `site`, creating it when missing. A site registered for a
    /// different operation is replaced.
    fn site_or_insert<C>(
        &self,
        site: IcSiteId,
        extract: impl Fn(&IcSite) -> Option<&Arc<C>>,
        wrap: impl FnOnce(Arc<C>) -> IcSite,
        create: impl FnOnce(&RuntimeConfig) -> C,
    ) -> Arc<C> {
        if let Some(cache) = self.sites.read().get(&site).and_then(&extract) {
            return Arc::clone(cache);
        }
        let mut sites = self.sites.write();
        if let Some(cache) = sites.get(&site).and_then(&extract) {
            return Arc::clone(cache);
        }
        let cache = Arc::new(create(&self.config));
        if sites.insert(site, wrap(Arc::clone(&cache))).is_some() {
            debug!(?site, "cache site replaced with a different operation");
        }
        cache
    }

    /// The registered site, if any.
    pub fn site(&self, site: IcSiteId) -> Option<IcSite> {
        self.sites.read().get(&site).cloned()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Classification of a site; unknown sites are uninitialized.
    pub fn classification(&self, site: IcSiteId) -> IcClassification {
        self.sites
            .read()
            .get(&site)
            .map_or(IcClassification::Uninitialized, IcSite::classification)
    }

    /// Force every site into the megamorphic state.
    pub fn make_all_megamorphic(&self) {
        for site in self.sites.read().values() {
            site.make_megamorphic();
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Number of registered sites.
    pub fn site_count(&self) -> usize {
        self.sites.read().len()
    }

    /// Hit rate across all sites, as a percentage (0.0-100.0).
    pub fn global_hit_rate(&self) -> f32 {
        let (hits, total) = self.sites.read().values().fold((0u64, 0u64), |(hits, total), site| {
            let stats = site.stats();
            (hits + stats.hits, total + stats.hits + stats.misses)
        });
        if total == 0 {
            0.0
        } else {
            (hits as f32 / total as f32) * 100.0
        }
    }

    /// Breakdown of site classifications.
    pub fn classification_breakdown(&self) -> IcStats {
        let mut stats = IcStats::default();
        for site in self.sites.read().values() {
            match site.classification() {
                IcClassification::Uninitialized => stats.uninitialized += 1,
                IcClassification::Monomorphic => stats.monomorphic += 1,
                IcClassification::Bimorphic => stats.bimorphic += 1,
                IcClassification::Polymorphic => stats.polymorphic += 1,
                IcClassification::Megamorphic => stats.megamorphic += 1,
            }
        }
        stats
    }

    /// Drop every site.
    pub fn clear(&self) {
        self.sites.write().clear();
    }
}

// =============================================================================
// IC Statistics
// =============================================================================

/// Counts of sites per classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IcStats {
    pub uninitialized: usize,
    pub monomorphic: usize,
    pub bimorphic: usize,
    pub polymorphic: usize,
    pub megamorphic: usize,
}

impl IcStats {
    /// Total sites.
    pub fn total(&self) -> usize {
        self.uninitialized + self.monomorphic + self.bimorphic + self.polymorphic + self.megamorphic
    }

    /// Percentage of monomorphic sites.
    pub fn monomorphic_percentage(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.monomorphic as f32 / total as f32) * 100.0
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
