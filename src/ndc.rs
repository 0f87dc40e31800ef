//! NDC identity reconciliation.
//!
//! Two product tables describe the same drugs at two packaging levels: the
//! unit of sale (outer package) and the unit of use (inner package). Each
//! table is folded into its registry keyed by the dashed 11-digit NDC, and a
//! linker table of `(outer id, inner id, mvx)` triples then ties the levels
//! together and attaches the manufacturer.
//!
//! Products that were active in a registry but are missing from a refreshed
//! table are given an expiry window rather than removed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info, warn};

use crate::codebase::Codebase;
use crate::lifecycle::{
    deprecate_alias, fill_not_after, fill_not_before, mark_expiring, parse_timestamp, ExpiryWindow,
};
use crate::merge::MergeTally;
use crate::types::{fill_if_empty, Registry, RegistryType, STATUS_VALID};

/// Length of a dashed 11-digit NDC (`nnnnn-nnnn-nn`).
pub const NDC_LENGTH: usize = 13;

/// Alias shorter than this is never synthesized.
const MIN_ALIAS_LENGTH: usize = 4;

/// Reason recorded on the 10-digit alias.
pub const REASON_TEN_DIGIT: &str = "Use full 11-digit format instead of 10-digit format";
/// Reason recorded on the undashed alias.
pub const REASON_UNDASHED: &str = "Use 11-digit format with dashes";

/// Error type for NDC reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NdcError {
    /// A product's canonical NDC is not 13 characters long, which means the
    /// table columns are not where they are expected.
    #[error("NDC is not the expected length, found \"{ndc}\" for {level} id {source_id} but it does not look like an NDC")]
    MalformedNdc {
        /// Offending value.
        ndc: String,
        /// Row id in the source table.
        source_id: String,
        /// Table the row came from.
        level: PackageLevel,
    },
}

/// Packaging level of an NDC product table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackageLevel {
    /// Outer package.
    UnitOfSale,
    /// Inner package.
    UnitOfUse,
}

impl PackageLevel {
    /// Registry holding products of this level.
    pub fn registry_type(self) -> RegistryType {
        match self {
            Self::UnitOfSale => RegistryType::NdcUnitOfSale,
            Self::UnitOfUse => RegistryType::NdcUnitOfUse,
        }
    }
}

impl fmt::Display for PackageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnitOfSale => write!(f, "unit-of-sale"),
            Self::UnitOfUse => write!(f, "unit-of-use"),
        }
    }
}

/// One row of the linker table.
///
/// Ordered by (outer id, inner id, mvx) so links are applied in a stable
/// order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NdcLink {
    /// Unit-of-sale row id.
    pub outer_id: String,
    /// Unit-of-use row id.
    pub inner_id: String,
    /// Manufacturer code, possibly blank.
    pub mvx: String,
}

impl NdcLink {
    /// Create a link triple.
    pub fn new(outer_id: impl Into<String>, inner_id: impl Into<String>, mvx: impl Into<String>) -> Self {
        Self {
            outer_id: outer_id.into(),
            inner_id: inner_id.into(),
            mvx: mvx.into(),
        }
    }
}

/// Outer/inner correlation triples, deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkerTable {
    links: BTreeSet<NdcLink>,
}

impl LinkerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple. Returns `false` if it was already present.
    pub fn insert(&mut self, link: NdcLink) -> bool {
        self.links.insert(link)
    }

    /// All triples in order.
    pub fn links(&self) -> impl Iterator<Item = &NdcLink> {
        self.links.iter()
    }

    /// Number of triples.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl FromIterator<NdcLink> for LinkerTable {
    fn from_iter<I: IntoIterator<Item = NdcLink>>(iter: I) -> Self {
        Self {
            links: iter.into_iter().collect(),
        }
    }
}

/// One product row of a unit-of-sale or unit-of-use table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdcProduct {
    /// Row id (outer id or inner id).
    pub source_id: String,
    /// Labeler segment of the 10-digit form.
    pub labeler: String,
    /// Product segment of the 10-digit form.
    pub product: String,
    /// Package segment of the 10-digit form.
    pub package: String,
    /// Proprietary (brand) name.
    pub proprietary_name: String,
    /// Generic name.
    pub generic_name: String,
    /// Labeler company name.
    pub labeler_name: String,
    /// Marketing start date, `yyyyMMdd` when present.
    pub start_date: String,
    /// Marketing end date, `yyyyMMdd` when present.
    pub end_date: String,
    /// Row timestamp, `yyyy-MM-dd HH:mm:ss`.
    pub last_updated: String,
    /// CVX code of the product, possibly blank.
    pub cvx: String,
    /// Dashed 11-digit NDC.
    pub ndc11: String,
}

impl NdcProduct {
    /// `labeler - generic` description.
    pub fn description(&self) -> String {
        format!("{} - {}", self.labeler_name, self.generic_name)
    }

    /// Historical 10-digit dashed form.
    pub fn ten_digit_form(&self) -> String {
        format!("{}-{}-{}", self.labeler, self.product, self.package)
    }

    /// 11-digit form without dashes.
    pub fn undashed_form(&self) -> String {
        self.ndc11.replace('-', "")
    }

    /// Fail unless `ndc11` has the dashed 11-digit length.
    pub fn check(&self, level: PackageLevel) -> Result<(), NdcError> {
        if self.ndc11.chars().count() == NDC_LENGTH {
            Ok(())
        } else {
            Err(NdcError::MalformedNdc {
                ndc: self.ndc11.clone(),
                source_id: self.source_id.clone(),
                level,
            })
        }
    }
}

/// Row id -> canonical NDC value, for the rows folded into a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductIndex {
    by_source_id: BTreeMap<String, String>,
}

impl ProductIndex {
    /// Canonical value of a row id.
    pub fn get(&self, source_id: &str) -> Option<&str> {
        self.by_source_id.get(source_id).map(String::as_str)
    }

    /// Number of row ids.
    pub fn len(&self) -> usize {
        self.by_source_id.len()
    }

    /// True when no rows were folded.
    pub fn is_empty(&self) -> bool {
        self.by_source_id.is_empty()
    }
}

/// Values of codes that are currently in use: no `notAfter`, not deprecated.
/// Keys are case-folded.
fn active_values(registry: &Registry) -> BTreeMap<String, String> {
    registry
        .codes()
        .iter()
        .filter(|c| c.is_active())
        .map(|c| (c.value.to_ascii_lowercase(), c.value.clone()))
        .collect()
}

/// Add a deprecated alias for `product` unless the alias is trivial, equal to
/// the canonical form, or already present.
fn add_alias(registry: &mut Registry, product: &NdcProduct, alias: &str, reason: &str) -> bool {
    if alias.chars().count() < MIN_ALIAS_LENGTH || alias == product.ndc11 {
        return false;
    }
    let (code, created) = registry.get_or_create(alias);
    if !created {
        return false;
    }
    fill_if_empty(&mut code.label, &product.proprietary_name);
    fill_if_empty(&mut code.description, &product.description());
    let effective = parse_timestamp(&product.last_updated);
    if effective.is_none() {
        warn!(ndc = %product.ndc11, last_updated = %product.last_updated, "unparseable last-updated timestamp");
    }
    deprecate_alias(code, &product.ndc11, effective, reason);
    debug!(alias, canonical = %product.ndc11, "added deprecated alias");
    true
}

/// Fold one product table into the registry for `level`.
///
/// Every row's NDC is checked before anything is written; a bad row aborts
/// the whole table. Rows repeating an earlier row id are ignored. Active
/// codes missing from the table are given `window`.
pub fn reconcile_products(
    registry: &mut Registry,
    level: PackageLevel,
    products: &[NdcProduct],
    window: ExpiryWindow,
) -> Result<(ProductIndex, MergeTally), NdcError> {
    let mut seen = BTreeSet::new();
    let rows: Vec<&NdcProduct> = products
        .iter()
        .filter(|p| seen.insert(p.source_id.as_str()))
        .collect();
    for product in &rows {
        product.check(level)?;
    }

    let mut index = ProductIndex::default();
    let mut tally = MergeTally::default();
    let mut still_active = active_values(registry);

    for product in rows {
        let (code, created) = registry.get_or_create(&product.ndc11);
        let mut changed = created;
        changed |= fill_if_empty(&mut code.label, &product.proprietary_name);
        changed |= fill_if_empty(&mut code.description, &product.description());
        changed |= fill_if_empty(&mut code.code_status.status, STATUS_VALID);
        changed |= code.ensure_link(RegistryType::Cvx, &product.cvx);
        changed |= fill_not_before(code, &product.start_date);
        changed |= fill_not_after(code, &product.end_date);

        let value = code.value.clone();
        still_active.remove(&value.to_ascii_lowercase());
        index.by_source_id.insert(product.source_id.clone(), value);
        tally.record_change(created, changed);

        if created {
            for (alias, reason) in [
                (product.ten_digit_form(), REASON_TEN_DIGIT),
                (product.undashed_form(), REASON_UNDASHED),
            ] {
                if add_alias(registry, product, &alias, reason) {
                    tally.added += 1;
                }
            }
        }
    }

    for value in still_active.values() {
        if let Some(code) = registry.find_mut(value) {
            if mark_expiring(code, window) {
                warn!(level = %level, ndc = %value, "NDC was dropped from source list, setting to expire");
                tally.expired += 1;
            }
        }
    }

    tally.total = registry.len();
    info!(
        level = %level,
        added = tally.added,
        updated = tally.updated,
        expired = tally.expired,
        total = tally.total,
        "reconciled NDC products"
    );
    Ok((index, tally))
}

/// Link counters from [`link_units`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct UnitLinkStats {
    /// Package-level links added (both directions counted).
    pub unit_links: usize,
    /// Manufacturer links added.
    pub mvx_links: usize,
}

/// Tie unit-of-sale and unit-of-use products together through `linker`.
///
/// A resolved side always receives the triple's MVX link; when both sides
/// resolve each receives a link to the other. Changed registries are marked
/// dirty.
pub fn link_units(
    codebase: &mut Codebase,
    linker: &LinkerTable,
    sale_index: &ProductIndex,
    use_index: &ProductIndex,
) -> UnitLinkStats {
    let mut stats = UnitLinkStats::default();
    let (mut sale_changed, mut use_changed) = (false, false);
    let (sale, usage) = codebase.pair_mut(RegistryType::NdcUnitOfSale, RegistryType::NdcUnitOfUse);

    for link in linker.links() {
        let outer = sale_index.get(&link.outer_id);
        let inner = use_index.get(&link.inner_id);

        if let Some(code) = outer.and_then(|v| sale.find_mut(v)) {
            if code.ensure_link(RegistryType::Mvx, &link.mvx) {
                stats.mvx_links += 1;
                sale_changed = true;
            }
            if let Some(inner_value) = inner {
                if code.ensure_link(RegistryType::NdcUnitOfUse, inner_value) {
                    stats.unit_links += 1;
                    sale_changed = true;
                }
            }
        }
        if let Some(code) = inner.and_then(|v| usage.find_mut(v)) {
            if code.ensure_link(RegistryType::Mvx, &link.mvx) {
                stats.mvx_links += 1;
                use_changed = true;
            }
            if let Some(outer_value) = outer {
                if code.ensure_link(RegistryType::NdcUnitOfSale, outer_value) {
                    stats.unit_links += 1;
                    use_changed = true;
                }
            }
        }
    }

    codebase.note_change(RegistryType::NdcUnitOfSale, sale_changed);
    codebase.note_change(RegistryType::NdcUnitOfUse, use_changed);
    info!(unit_links = stats.unit_links, mvx_links = stats.mvx_links, "linked NDC package levels");
    stats
}
