//! The update run: fold every source feed into the codebase.
//!
//! ## Pipeline
//!
//! ```text
//! NDC (sale, use, link) → vaccine group → CVX → CPT → VIS → MVX
//!     → trade name → lot number patterns → cross-link closure
//! ```
//!
//! Each step reports into an [`UpdateReport`] and marks the registries it
//! changed as dirty. Nothing is persisted here; the caller decides whether
//! to write the dirty registries back. A fatal error in any step leaves the
//! store untouched.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::codebase::Codebase;
use crate::crosslink::{close_cross_links, CrossLinkReport};
use crate::lifecycle::{apply_status_date, format_date, ExpiryWindow};
use crate::merge::{merge_fact, FactAttributes, MergeError, MergeOutcome, MergeTally};
use crate::ndc::{link_units, reconcile_products, NdcError, PackageLevel, UnitLinkStats};
use crate::sources::{SourceError, SourceFeeds};
use crate::types::{fill_if_empty, Registry, RegistryType, STATUS_VALID};

/// Error type for an update run.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// NDC table failed structural checks.
    #[error(transparent)]
    Ndc(#[from] NdcError),
    /// A fact could not be merged.
    #[error(transparent)]
    Merge(#[from] MergeError),
    /// A source feed could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// Loading or saving registries failed.
    #[error("Registry store error: {0}")]
    Store(String),
}

impl UpdateError {
    /// Wrap any store error.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::Store(e.to_string())
    }
}

/// Lot number pattern verification result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternReport {
    /// Patterns that compiled.
    pub verified: usize,
    /// Patterns checked.
    pub total: usize,
    /// Patterns that did not compile.
    pub invalid: Vec<String>,
}

/// Everything an update run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Processing date used for derived dates.
    pub as_of: Option<NaiveDate>,
    /// Per-registry merge counters.
    pub registries: BTreeMap<String, MergeTally>,
    /// NDC package-level linking.
    pub unit_links: UnitLinkStats,
    /// Lot number pattern check.
    pub lot_number_patterns: PatternReport,
    /// Cross-link closure.
    pub cross_links: CrossLinkReport,
    /// Registries changed by the run, in processing order.
    pub changed: Vec<RegistryType>,
}

impl UpdateReport {
    /// Merge counters for a registry.
    pub fn tally(&self, registry_type: RegistryType) -> MergeTally {
        self.registries
            .get(registry_type.tag())
            .copied()
            .unwrap_or_default()
    }

    fn record(&mut self, registry_type: RegistryType, tally: MergeTally) {
        info!(
            registry = %registry_type,
            added = tally.added,
            updated = tally.updated,
            expired = tally.expired,
            total = tally.total,
            "updated registry"
        );
        self.registries.insert(registry_type.tag().to_string(), tally);
    }
}

/// One update run at a fixed processing date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRun {
    as_of: NaiveDate,
}

impl UpdateRun {
    /// A run that dates derived bounds `as_of`.
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    /// Processing date.
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Fold `feeds` into `codebase` and close the link graph.
    pub fn execute(&self, codebase: &mut Codebase, feeds: &SourceFeeds) -> Result<UpdateReport, UpdateError> {
        info!(as_of = %format_date(self.as_of), "starting update run");
        let mut report = UpdateReport {
            as_of: Some(self.as_of),
            ..UpdateReport::default()
        };

        self.update_ndc(codebase, feeds, &mut report)?;
        let groups_by_cvx = update_vaccine_groups(codebase, feeds, &mut report)?;
        update_cvx(codebase, feeds, &groups_by_cvx, &mut report)?;
        update_cpt(codebase, feeds, &mut report)?;
        update_vis(codebase, feeds, &mut report);
        update_mvx(codebase, feeds, &mut report)?;
        update_trade_names(codebase, feeds, &mut report)?;
        report.lot_number_patterns = verify_lot_number_patterns(codebase.registry(RegistryType::LotNumberPattern));
        report.cross_links = close_cross_links(codebase);
        report.changed = codebase.dirty().collect();

        info!(changed = report.changed.len(), "update run complete");
        Ok(report)
    }

    fn update_ndc(&self, codebase: &mut Codebase, feeds: &SourceFeeds, report: &mut UpdateReport) -> Result<(), UpdateError> {
        let window = ExpiryWindow::from_processing_date(self.as_of);
        let mut indexes = Vec::with_capacity(2);
        for (level, products) in [
            (PackageLevel::UnitOfSale, &feeds.unit_of_sale),
            (PackageLevel::UnitOfUse, &feeds.unit_of_use),
        ] {
            let registry_type = level.registry_type();
            let (index, tally) = reconcile_products(codebase.registry_mut(registry_type), level, products, window)?;
            codebase.note_change(registry_type, tally.changed());
            report.record(registry_type, tally);
            indexes.push(index);
        }
        report.unit_links = link_units(codebase, &feeds.linker, &indexes[0], &indexes[1]);
        Ok(())
    }
}

// CVX, MVX and trade names carry a status that dates the code.
fn dated(registry: &mut Registry, value: &str, status: &str, date: Option<NaiveDate>) -> bool {
    registry
        .find_mut(value)
        .map(|code| apply_status_date(code, status, date))
        .unwrap_or(false)
}

fn record_outcome(tally: &mut MergeTally, outcome: &MergeOutcome, extra_change: bool) {
    tally.record_change(outcome.created, outcome.changed || extra_change);
}

fn finish(codebase: &mut Codebase, registry_type: RegistryType, mut tally: MergeTally, report: &mut UpdateReport) {
    tally.total = codebase.registry(registry_type).len();
    codebase.note_change(registry_type, tally.changed());
    report.record(registry_type, tally);
}

fn link(registry: &mut Registry, value: &str, target: RegistryType, target_value: &str) -> bool {
    registry
        .find_mut(value)
        .map(|code| code.ensure_link(target, target_value))
        .unwrap_or(false)
}

/// Vaccine groups. Returns CVX code -> group values for the CVX step.
fn update_vaccine_groups(
    codebase: &mut Codebase,
    feeds: &SourceFeeds,
    report: &mut UpdateReport,
) -> Result<BTreeMap<String, Vec<String>>, UpdateError> {
    let registry_type = RegistryType::VaccineGroup;
    let registry = codebase.registry_mut(registry_type);
    let mut tally = MergeTally::default();
    let mut groups_by_cvx: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for fact in &feeds.vaccine_groups {
        if fact.vaccine_group_name.is_empty() {
            warn!(cvx = %fact.cvx_code, "vaccine group row without a group name, skipping");
            continue;
        }
        let outcome = merge_fact(
            registry,
            &fact.vaccine_group_name,
            &FactAttributes::labelled(fact.short_description.as_str()),
        )?;
        let linked = link(registry, &outcome.value, RegistryType::Cvx, &fact.cvx_for_vaccine_group);
        record_outcome(&mut tally, &outcome, linked);

        if !fact.cvx_code.is_empty() {
            let groups = groups_by_cvx.entry(fact.cvx_code.clone()).or_default();
            if !groups.contains(&outcome.value) {
                groups.push(outcome.value);
            }
        }
    }
    finish(codebase, registry_type, tally, report);
    Ok(groups_by_cvx)
}

fn update_cvx(
    codebase: &mut Codebase,
    feeds: &SourceFeeds,
    groups_by_cvx: &BTreeMap<String, Vec<String>>,
    report: &mut UpdateReport,
) -> Result<(), UpdateError> {
    let registry_type = RegistryType::Cvx;
    let registry = codebase.registry_mut(registry_type);
    let mut tally = MergeTally::default();

    for fact in feeds.cvx.iter().filter(|f| !f.cvx_code.is_empty()) {
        let attributes = FactAttributes::labelled(fact.short_description.as_str())
            .description(fact.full_name.as_str())
            .notes(fact.notes.as_str())
            .concept_type(fact.concept_type())
            .status(STATUS_VALID);
        let outcome = merge_fact(registry, &fact.cvx_code, &attributes)?;

        let mut extra = false;
        for group in groups_by_cvx.get(&fact.cvx_code).into_iter().flatten() {
            extra |= link(registry, &outcome.value, RegistryType::VaccineGroup, group);
        }
        extra |= dated(registry, &outcome.value, &fact.status, fact.last_updated);
        record_outcome(&mut tally, &outcome, extra);
    }
    finish(codebase, registry_type, tally, report);
    Ok(())
}

fn update_cpt(codebase: &mut Codebase, feeds: &SourceFeeds, report: &mut UpdateReport) -> Result<(), UpdateError> {
    let registry_type = RegistryType::Cpt;
    let registry = codebase.registry_mut(registry_type);
    let mut tally = MergeTally::default();

    for fact in feeds.cpt.iter().filter(|f| !f.cpt_code.is_empty()) {
        let attributes = FactAttributes::labelled(fact.description.as_str())
            .description(fact.comments.as_str())
            .status(STATUS_VALID);
        let outcome = merge_fact(registry, &fact.cpt_code, &attributes)?;
        let linked = link(registry, &outcome.value, RegistryType::Cvx, &fact.cvx_code);
        record_outcome(&mut tally, &outcome, linked);
    }
    finish(codebase, registry_type, tally, report);
    Ok(())
}

/// VIS feed: one document record and one vaccine record per row.
fn update_vis(codebase: &mut Codebase, feeds: &SourceFeeds, report: &mut UpdateReport) {
    let mut doc_tally = MergeTally::default();
    let mut vac_tally = MergeTally::default();
    {
        let (docs, vaccines) = codebase.pair_mut(RegistryType::VisDocType, RegistryType::VisVaccines);
        let edition = |date: Option<NaiveDate>| date.map(format_date).unwrap_or_default();

        for fact in &feeds.vis {
            let not_before = edition(fact.edition_date);
            for (registry, value, label, target, target_value, tally) in [
                (
                    &mut *docs,
                    &fact.fully_encoded,
                    &fact.document_name,
                    RegistryType::VisVaccines,
                    &fact.cvx_code,
                    &mut doc_tally,
                ),
                (
                    &mut *vaccines,
                    &fact.cvx_code,
                    &fact.document_name,
                    RegistryType::VisDocType,
                    &fact.fully_encoded,
                    &mut vac_tally,
                ),
            ] {
                if value.is_empty() {
                    continue;
                }
                let (code, created) = registry.get_or_create(value);
                let mut changed = created;
                changed |= fill_if_empty(&mut code.label, label);
                changed |= fill_if_empty(&mut code.code_status.status, STATUS_VALID);
                changed |= code.ensure_link(target, target_value);
                changed |= fill_if_empty(&mut code.use_date.not_before, &not_before);
                tally.record_change(created, changed);
            }
        }
    }
    finish(codebase, RegistryType::VisDocType, doc_tally, report);
    finish(codebase, RegistryType::VisVaccines, vac_tally, report);
}

fn update_mvx(codebase: &mut Codebase, feeds: &SourceFeeds, report: &mut UpdateReport) -> Result<(), UpdateError> {
    let registry_type = RegistryType::Mvx;
    let registry = codebase.registry_mut(registry_type);
    let mut tally = MergeTally::default();

    for fact in feeds.mvx.iter().filter(|f| !f.mvx_code.is_empty()) {
        let attributes = FactAttributes::labelled(fact.manufacturer_name.as_str())
            .description(fact.notes.as_str())
            .status(STATUS_VALID);
        let outcome = merge_fact(registry, &fact.mvx_code, &attributes)?;
        let dated_changed = dated(registry, &outcome.value, &fact.status, fact.last_updated);
        record_outcome(&mut tally, &outcome, dated_changed);
    }
    finish(codebase, registry_type, tally, report);
    Ok(())
}

fn update_trade_names(codebase: &mut Codebase, feeds: &SourceFeeds, report: &mut UpdateReport) -> Result<(), UpdateError> {
    let registry_type = RegistryType::TradeName;
    let registry = codebase.registry_mut(registry_type);
    let mut tally = MergeTally::default();

    for fact in feeds.trade_names.iter().filter(|f| !f.product_name.is_empty()) {
        let attributes = FactAttributes::labelled(fact.short_description.as_str()).status(STATUS_VALID);
        let outcome = merge_fact(registry, &fact.product_name, &attributes)?;
        let mut extra = link(registry, &outcome.value, RegistryType::Cvx, &fact.cvx_code);
        extra |= link(registry, &outcome.value, RegistryType::Mvx, &fact.mvx_code);
        extra |= dated(registry, &outcome.value, &fact.status, fact.last_updated);
        record_outcome(&mut tally, &outcome, extra);
    }
    finish(codebase, registry_type, tally, report);
    Ok(())
}

/// Check that every lot number pattern compiles as a regular expression.
///
/// Bad patterns are logged and counted; they are never fatal.
pub fn verify_lot_number_patterns(registry: &Registry) -> PatternReport {
    let mut report = PatternReport {
        total: registry.len(),
        ..PatternReport::default()
    };
    for code in registry.codes() {
        match regex_lite::Regex::new(&code.value) {
            Ok(_) => report.verified += 1,
            Err(e) => {
                warn!(pattern = %code.value, error = %e, "lot number regular expression was not recognized");
                report.invalid.push(code.value.clone());
            }
        }
    }
    info!(verified = report.verified, total = report.total, "checked lot number patterns");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{CptFact, MvxFact, TradeNameFact, VaccineGroupFact, VisFact};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn feeds() -> SourceFeeds {
        SourceFeeds {
            vaccine_groups: vec![VaccineGroupFact {
                vaccine_group_name: "COVID-19".to_string(),
                short_description: "COVID-19 mRNA".to_string(),
                cvx_code: "208".to_string(),
                cvx_for_vaccine_group: "213".to_string(),
            }],
            cpt: vec![CptFact {
                cpt_code: "91300".to_string(),
                description: "Pfizer SARS-CoV-2 vaccine".to_string(),
                comments: String::new(),
                cvx_code: "208".to_string(),
            }],
            vis: vec![VisFact {
                cvx_code: "208".to_string(),
                fully_encoded: "253088698300028411230301".to_string(),
                document_name: "COVID-19 Vaccine VIS".to_string(),
                edition_date: Some(day(2023, 3, 1)),
            }],
            mvx: vec![MvxFact {
                mvx_code: "PFR".to_string(),
                manufacturer_name: "Pfizer, Inc".to_string(),
                status: "Active".to_string(),
                last_updated: Some(day(2020, 5, 20)),
                ..MvxFact::default()
            }],
            trade_names: vec![TradeNameFact {
                product_name: "COMIRNATY".to_string(),
                short_description: "COVID-19 mRNA".to_string(),
                cvx_code: "208".to_string(),
                mvx_code: "PFR".to_string(),
                status: "Inactive".to_string(),
                last_updated: Some(day(2023, 9, 11)),
            }],
            ..SourceFeeds::default()
        }
    }

    #[test]
    fn test_vis_row_feeds_both_registries() {
        let mut codebase = Codebase::empty();
        UpdateRun::new(day(2024, 1, 15)).execute(&mut codebase, &feeds()).unwrap();

        let doc = codebase
            .registry(RegistryType::VisDocType)
            .find("253088698300028411230301")
            .unwrap();
        assert_eq!(doc.label.as_deref(), Some("COVID-19 Vaccine VIS"));
        assert_eq!(doc.use_date.not_before.as_deref(), Some("20230301"));
        assert!(doc.has_link(RegistryType::VisVaccines, "208"));

        let vaccine = codebase.registry(RegistryType::VisVaccines).find("208").unwrap();
        assert!(vaccine.has_link(RegistryType::VisDocType, "253088698300028411230301"));
    }

    #[test]
    fn test_links_to_unknown_codes_do_not_survive() {
        let mut codebase = Codebase::empty();
        let report = UpdateRun::new(day(2024, 1, 15)).execute(&mut codebase, &feeds()).unwrap();

        // no CVX feed, so every CVX link dangles
        let cpt = codebase.registry(RegistryType::Cpt).find("91300").unwrap();
        assert!(cpt.links().is_empty());
        let trade = codebase.registry(RegistryType::TradeName).find("COMIRNATY").unwrap();
        assert_eq!(trade.links(), &[crate::types::LinkTo::new(RegistryType::Mvx, "PFR")]);
        assert_eq!(trade.use_date.not_after.as_deref(), Some("20230911"));
        assert_eq!(report.cross_links.totals().removed, 3);

        let mvx = codebase.registry(RegistryType::Mvx).find("PFR").unwrap();
        assert!(mvx.has_link(RegistryType::TradeName, "COMIRNATY"));
        assert_eq!(mvx.use_date.not_before.as_deref(), Some("20200520"));
    }

    #[test]
    fn test_report_counts_and_changed_set() {
        let mut codebase = Codebase::empty();
        let report = UpdateRun::new(day(2024, 1, 15)).execute(&mut codebase, &feeds()).unwrap();

        assert_eq!(report.as_of, Some(day(2024, 1, 15)));
        assert_eq!(report.tally(RegistryType::Mvx).added, 1);
        assert_eq!(report.tally(RegistryType::VisDocType).total, 1);
        assert_eq!(report.tally(RegistryType::Cvx), MergeTally::default());
        assert!(report.changed.contains(&RegistryType::TradeName));
        assert!(!report.changed.contains(&RegistryType::Cvx));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["registries"]["VACCINATION_MANUFACTURER_CODE"]["added"], 1);
    }

    #[test]
    fn test_verify_lot_number_patterns() {
        let mut registry = Registry::new(RegistryType::LotNumberPattern);
        registry.get_or_create(r"^EL\d{4}$");
        registry.get_or_create("(unclosed");

        let report = verify_lot_number_patterns(&registry);

        assert_eq!(report.total, 2);
        assert_eq!(report.verified, 1);
        assert_eq!(report.invalid, vec!["(unclosed".to_string()]);
    }
}
