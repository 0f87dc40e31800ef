//! Cross-link closure over the whole codebase.
//!
//! ## Closure Pass
//!
//! Every registry is walked in processing order. For each code, duplicate
//! outbound links are dropped first, then each remaining link is checked:
//!
//! 1. Target registry unknown: warn, keep the link.
//! 2. Link value blank: warn, keep the link.
//! 3. Target code missing: remove the link (dangling).
//! 4. Target code present: make sure it links back.
//!
//! Reciprocal links are collected while a registry is walked and applied
//! once that registry is done, so a registry is never borrowed twice. The
//! closure never creates or deletes codes, which makes the value index built
//! up front valid for the whole pass and a second pass a no-op.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::codebase::Codebase;
use crate::types::{LinkTo, RegistryType};

/// Link counters for one source registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Links checked against their target.
    pub examined: usize,
    /// Reciprocal links added to target codes.
    pub made: usize,
    /// Duplicate and dangling links removed.
    pub removed: usize,
}

impl LinkStats {
    fn absorb(&mut self, other: LinkStats) {
        self.examined += other.examined;
        self.made += other.made;
        self.removed += other.removed;
    }
}

/// Counters for one registry in a closure report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryLinkStats {
    /// Source registry.
    pub registry: RegistryType,
    /// Its counters.
    #[serde(flatten)]
    pub stats: LinkStats,
}

/// Result of a closure pass, one entry per registry in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrossLinkReport {
    /// Per-registry counters.
    pub registries: Vec<RegistryLinkStats>,
}

impl CrossLinkReport {
    /// Counters for one registry.
    pub fn stats(&self, registry_type: RegistryType) -> LinkStats {
        self.registries
            .iter()
            .find(|r| r.registry == registry_type)
            .map(|r| r.stats)
            .unwrap_or_default()
    }

    /// Counters summed over every registry.
    pub fn totals(&self) -> LinkStats {
        let mut total = LinkStats::default();
        for entry in &self.registries {
            total.absorb(entry.stats);
        }
        total
    }

    /// True when the pass changed nothing.
    pub fn is_fixed_point(&self) -> bool {
        let totals = self.totals();
        totals.made == 0 && totals.removed == 0
    }
}

/// Case-folded value -> stored value, per registry.
type ValueIndex = Vec<BTreeMap<String, String>>;

fn build_value_index(codebase: &Codebase) -> ValueIndex {
    RegistryType::ALL
        .iter()
        .map(|&t| {
            let mut values = BTreeMap::new();
            for code in codebase.registry(t).codes() {
                values
                    .entry(code.value.to_ascii_lowercase())
                    .or_insert_with(|| code.value.clone());
            }
            values
        })
        .collect()
}

/// A reciprocal link owed by a target code.
struct Reciprocal {
    target: RegistryType,
    target_value: String,
    source_value: String,
}

/// Drop repeated `(codeset, value)` pairs, keeping the first. Returns the
/// number removed.
pub fn dedupe_links(links: &mut Vec<LinkTo>) -> usize {
    let before = links.len();
    let mut seen = BTreeSet::new();
    links.retain(|link| {
        let fresh = seen.insert(link.key());
        if !fresh {
            warn!(link = %link, "link is already mentioned, removing");
        }
        fresh
    });
    before - links.len()
}

/// Make every link in the codebase symmetric and remove dangling and
/// duplicate links. Registries touched are marked dirty.
pub fn close_cross_links(codebase: &mut Codebase) -> CrossLinkReport {
    let index = build_value_index(codebase);
    let mut report = CrossLinkReport::default();

    for source in RegistryType::ALL {
        debug!(registry = %source, "linking out");
        let mut stats = LinkStats::default();
        let mut owed = Vec::new();
        let mut source_changed = false;

        for code in codebase.registry_mut(source).codes_mut() {
            let duplicates = dedupe_links(code.links_mut());
            if duplicates > 0 {
                stats.removed += duplicates;
                source_changed = true;
            }

            let source_value = code.value.clone();
            let mut dangling = 0;
            code.links_mut().retain(|link| {
                stats.examined += 1;
                let Some(target) = link.target() else {
                    warn!(registry = %source, code = %source_value, codeset = %link.codeset, "unable to find linked registry");
                    return true;
                };
                if link.value.trim().is_empty() {
                    warn!(registry = %source, code = %source_value, target = %target, "link has no value");
                    return true;
                }
                match index[target.index()].get(&link.value.to_ascii_lowercase()) {
                    Some(target_value) => {
                        owed.push(Reciprocal {
                            target,
                            target_value: target_value.clone(),
                            source_value: source_value.clone(),
                        });
                        true
                    }
                    None => {
                        warn!(
                            registry = %source,
                            code = %source_value,
                            target = %target,
                            value = %link.value,
                            "dangling link, removing"
                        );
                        dangling += 1;
                        false
                    }
                }
            });
            if dangling > 0 {
                stats.removed += dangling;
                source_changed = true;
            }
        }
        codebase.note_change(source, source_changed);

        for reciprocal in owed {
            let added = codebase
                .registry_mut(reciprocal.target)
                .find_mut(&reciprocal.target_value)
                .map(|target_code| target_code.ensure_link(source, &reciprocal.source_value))
                .unwrap_or(false);
            if added {
                stats.made += 1;
                codebase.mark_dirty(reciprocal.target);
            }
        }

        info!(
            registry = %source,
            examined = stats.examined,
            made = stats.made,
            removed = stats.removed,
            "cross-linked registry"
        );
        report.registries.push(RegistryLinkStats {
            registry: source,
            stats,
        });
    }

    let totals = report.totals();
    info!(
        examined = totals.examined,
        made = totals.made,
        removed = totals.removed,
        "cross-link closure complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codebase_with(entries: &[(RegistryType, &str)]) -> Codebase {
        let mut codebase = Codebase::empty();
        for &(t, v) in entries {
            codebase.registry_mut(t).get_or_create(v);
        }
        codebase
    }

    fn link(codebase: &mut Codebase, from: (RegistryType, &str), to: (RegistryType, &str)) {
        codebase
            .registry_mut(from.0)
            .find_mut(from.1)
            .unwrap()
            .links_mut()
            .push(LinkTo::new(to.0, to.1));
    }

    #[test]
    fn test_reciprocal_link_is_added() {
        let mut codebase = codebase_with(&[(RegistryType::Cpt, "90707"), (RegistryType::Cvx, "03")]);
        link(&mut codebase, (RegistryType::Cpt, "90707"), (RegistryType::Cvx, "03"));

        let report = close_cross_links(&mut codebase);

        let cvx = codebase.registry(RegistryType::Cvx).find("03").unwrap();
        assert!(cvx.has_link(RegistryType::Cpt, "90707"));
        assert_eq!(report.stats(RegistryType::Cpt).made, 1);
        assert!(codebase.is_dirty(RegistryType::Cvx));
        assert!(!codebase.is_dirty(RegistryType::Cpt));
    }

    #[test]
    fn test_duplicate_links_are_removed_and_counted() {
        let mut codebase = codebase_with(&[(RegistryType::TradeName, "COMIRNATY"), (RegistryType::Cvx, "208")]);
        link(&mut codebase, (RegistryType::TradeName, "COMIRNATY"), (RegistryType::Cvx, "208"));
        link(&mut codebase, (RegistryType::TradeName, "COMIRNATY"), (RegistryType::Cvx, "208"));

        let report = close_cross_links(&mut codebase);

        let trade = codebase.registry(RegistryType::TradeName).find("COMIRNATY").unwrap();
        assert_eq!(trade.links(), &[LinkTo::new(RegistryType::Cvx, "208")]);
        assert_eq!(report.stats(RegistryType::TradeName).removed, 1);
        assert_eq!(report.totals().removed, 1);
        assert!(codebase.is_dirty(RegistryType::TradeName));
    }

    #[test]
    fn test_dangling_link_is_removed() {
        let mut codebase = codebase_with(&[(RegistryType::Cpt, "90707")]);
        link(&mut codebase, (RegistryType::Cpt, "90707"), (RegistryType::Cvx, "999"));

        let report = close_cross_links(&mut codebase);

        assert!(codebase.registry(RegistryType::Cpt).find("90707").unwrap().links().is_empty());
        assert_eq!(report.stats(RegistryType::Cpt).removed, 1);
        assert!(codebase.is_dirty(RegistryType::Cpt));
    }

    #[test]
    fn test_unknown_registry_and_blank_value_are_kept() {
        let mut codebase = codebase_with(&[(RegistryType::Mvx, "PFR")]);
        {
            let code = codebase.registry_mut(RegistryType::Mvx).find_mut("PFR").unwrap();
            code.links_mut().push(LinkTo {
                codeset: "LEGACY_REGISTRY".to_string(),
                value: "1".to_string(),
            });
            code.links_mut().push(LinkTo::new(RegistryType::Cvx, ""));
        }

        let report = close_cross_links(&mut codebase);

        assert_eq!(codebase.registry(RegistryType::Mvx).find("PFR").unwrap().links().len(), 2);
        assert_eq!(report.stats(RegistryType::Mvx).examined, 2);
        assert!(report.is_fixed_point());
        assert_eq!(codebase.dirty().count(), 0);
    }

    #[test]
    fn test_target_lookup_ignores_case_and_uses_stored_value() {
        let mut codebase = codebase_with(&[(RegistryType::TradeName, "Comirnaty"), (RegistryType::Mvx, "PFR")]);
        link(&mut codebase, (RegistryType::TradeName, "Comirnaty"), (RegistryType::Mvx, "pfr"));

        close_cross_links(&mut codebase);

        let mvx = codebase.registry(RegistryType::Mvx).find("PFR").unwrap();
        assert_eq!(mvx.links(), &[LinkTo::new(RegistryType::TradeName, "Comirnaty")]);
    }

    #[test]
    fn test_second_pass_is_fixed_point() {
        let mut codebase = codebase_with(&[
            (RegistryType::Cvx, "208"),
            (RegistryType::VaccineGroup, "COVID-19"),
            (RegistryType::Mvx, "PFR"),
        ]);
        link(&mut codebase, (RegistryType::Cvx, "208"), (RegistryType::VaccineGroup, "COVID-19"));
        link(&mut codebase, (RegistryType::Mvx, "PFR"), (RegistryType::Cvx, "208"));
        link(&mut codebase, (RegistryType::Mvx, "PFR"), (RegistryType::Cpt, "nope"));

        let first = close_cross_links(&mut codebase);
        assert!(!first.is_fixed_point());
        let snapshot = codebase.clone();

        let second = close_cross_links(&mut codebase);
        assert!(second.is_fixed_point());
        for t in RegistryType::ALL {
            assert_eq!(codebase.registry(t).codes(), snapshot.registry(t).codes());
        }
    }

    #[test]
    fn test_self_registry_link() {
        let mut codebase = codebase_with(&[(RegistryType::NdcUnitOfSale, "a"), (RegistryType::NdcUnitOfSale, "b")]);
        link(&mut codebase, (RegistryType::NdcUnitOfSale, "a"), (RegistryType::NdcUnitOfSale, "b"));

        close_cross_links(&mut codebase);

        let b = codebase.registry(RegistryType::NdcUnitOfSale).find("b").unwrap();
        assert!(b.has_link(RegistryType::NdcUnitOfSale, "a"));
    }

    #[test]
    fn test_dedupe_links_ignores_value_case() {
        let mut links = vec![
            LinkTo::new(RegistryType::Mvx, "PFR"),
            LinkTo::new(RegistryType::Mvx, "pfr"),
            LinkTo::new(RegistryType::Cvx, "PFR"),
        ];
        assert_eq!(dedupe_links(&mut links), 1);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].value, "PFR");
    }
}
