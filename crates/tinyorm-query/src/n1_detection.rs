//! N+1 query detection for lazily loaded relations.
//!
//! Lazy loading a relation on every model of a page costs one query per
//! model. [`N1QueryTracker`] counts lazy loads per `(model, relation)` pair,
//! keeps the call sites that triggered them and logs a warning when a pair
//! reaches the threshold.
//!
//! # Example
//!
//! ```ignore
//! // One query per torrent; warns on the `n1_threshold`-th load.
//! for torrent in &mut torrents {
//!     torrent.get_relation_value_one::<TorrentPeer>(&db, "torrentPeer")?;
//! }
//!
//! // One extra query for the whole page.
//! let torrents = Torrent::with(&db, ["torrentPeer"]).get(&["*"])?;
//! ```

use std::collections::BTreeMap;
use std::panic::Location;

/// Source location of one lazy load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub model: &'static str,
    pub relation: &'static str,
    pub file: &'static str,
    pub line: u32,
}

/// Lazy load statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct N1Stats {
    pub total_loads: usize,
    /// Distinct `(model, relation)` pairs.
    pub relations_loaded: usize,
    /// Pairs at or above the threshold.
    pub potential_n1: usize,
}

type Pair = (&'static str, &'static str);

/// Counts lazy relation loads per `(model, relation)`.
#[derive(Debug)]
pub struct N1QueryTracker {
    loads: BTreeMap<Pair, usize>,
    call_sites: Vec<CallSite>,
    threshold: usize,
    enabled: bool,
}

impl Default for N1QueryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl N1QueryTracker {
    pub const DEFAULT_THRESHOLD: usize = 3;
    /// Call sites kept per `(model, relation)` pair.
    pub const MAX_CALL_SITES: usize = 5;

    #[must_use]
    pub fn new() -> Self {
        Self {
            loads: BTreeMap::new(),
            call_sites: Vec::new(),
            threshold: Self::DEFAULT_THRESHOLD,
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Count one lazy load of `relation` on `model` at the caller's location.
    #[track_caller]
    pub fn record_load(&mut self, model: &'static str, relation: &'static str) {
        if !self.enabled {
            return;
        }

        if self.sites_for(model, relation).count() < Self::MAX_CALL_SITES {
            let location = Location::caller();
            self.call_sites.push(CallSite {
                model,
                relation,
                file: location.file(),
                line: location.line(),
            });
        }

        let loads = self.loads.entry((model, relation)).or_default();
        *loads += 1;
        if *loads == self.threshold {
            self.warn((model, relation));
        }
    }

    fn warn(&self, (model, relation): Pair) {
        let sites: Vec<String> = self
            .sites_for(model, relation)
            .map(|site| format!("{}:{}", site.file, site.line))
            .collect();
        tracing::warn!(
            target: "tinyorm::n1",
            model,
            relation,
            threshold = self.threshold,
            call_sites = ?sites,
            "Relation lazy loaded in a loop, eager load it with with()"
        );
    }

    pub fn reset(&mut self) {
        self.loads.clear();
        self.call_sites.clear();
    }

    #[must_use]
    pub fn count_for(&self, model: &str, relation: &str) -> usize {
        self.loads
            .iter()
            .find_map(|(&(m, r), &n)| (m == model && r == relation).then_some(n))
            .unwrap_or(0)
    }

    /// Call sites recorded for one pair, oldest first.
    pub fn sites_for<'a>(
        &'a self,
        model: &'a str,
        relation: &'a str,
    ) -> impl Iterator<Item = &'a CallSite> + 'a {
        self.call_sites
            .iter()
            .filter(move |site| site.model == model && site.relation == relation)
    }

    #[must_use]
    pub fn call_sites(&self) -> &[CallSite] {
        &self.call_sites
    }

    #[must_use]
    pub fn stats(&self) -> N1Stats {
        N1Stats {
            total_loads: self.loads.values().sum(),
            relations_loaded: self.loads.len(),
            potential_n1: self.loads.values().filter(|&&n| n >= self.threshold).count(),
        }
    }
}
