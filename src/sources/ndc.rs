//! Pipe-delimited NDC tables.
//!
//! Each line is split on `|`. Trailing columns that are exactly empty are
//! dropped before the column count is checked, then every column is
//! trimmed. A row ending in `||` is short; a row ending in `| ` keeps its
//! last column as a blank value.

use tracing::debug;

use crate::ndc::{LinkerTable, NdcLink, NdcProduct};

/// Column layout of a product table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductColumns {
    /// Row id.
    pub source_id: usize,
    /// 10-digit labeler segment.
    pub labeler: usize,
    /// 10-digit product segment.
    pub product: usize,
    /// 10-digit package segment.
    pub package: usize,
    /// Proprietary name.
    pub proprietary_name: usize,
    /// Generic name.
    pub generic_name: usize,
    /// Labeler name.
    pub labeler_name: usize,
    /// Start date.
    pub start_date: usize,
    /// End date.
    pub end_date: usize,
    /// Last-updated timestamp.
    pub last_updated: usize,
    /// CVX code.
    pub cvx: usize,
    /// Dashed 11-digit NDC.
    pub ndc11: usize,
}

/// Unit-of-sale layout.
pub const UNIT_OF_SALE_COLUMNS: ProductColumns = ProductColumns {
    source_id: 0,
    labeler: 1,
    product: 2,
    package: 3,
    proprietary_name: 4,
    generic_name: 5,
    labeler_name: 6,
    start_date: 7,
    end_date: 8,
    last_updated: 11,
    cvx: 12,
    ndc11: 14,
};

/// Unit-of-use layout.
pub const UNIT_OF_USE_COLUMNS: ProductColumns = ProductColumns {
    source_id: 0,
    labeler: 1,
    product: 2,
    package: 3,
    proprietary_name: 4,
    generic_name: 5,
    labeler_name: 6,
    start_date: 7,
    end_date: 8,
    last_updated: 15,
    cvx: 11,
    ndc11: 14,
};

const LINKER_OUTER_ID: usize = 1;
const LINKER_INNER_ID: usize = 2;
const LINKER_MVX: usize = 3;

fn split_columns(line: &str) -> Vec<&str> {
    let mut columns: Vec<&str> = line.split('|').collect();
    while columns.last().is_some_and(|c| c.is_empty()) {
        columns.pop();
    }
    columns.into_iter().map(str::trim).collect()
}

/// Read a unit-of-sale or unit-of-use table.
///
/// Lines too short to reach the NDC column are skipped.
pub fn read_products(text: &str, layout: ProductColumns) -> Vec<NdcProduct> {
    let mut products = Vec::new();
    let mut skipped = 0usize;
    for line in text.lines() {
        if line.chars().count() <= layout.ndc11 {
            skipped += 1;
            continue;
        }
        let columns = split_columns(line);
        if columns.len() <= layout.ndc11 {
            skipped += 1;
            continue;
        }
        let col = |i: usize| columns.get(i).copied().unwrap_or("").to_string();
        products.push(NdcProduct {
            source_id: col(layout.source_id),
            labeler: col(layout.labeler),
            product: col(layout.product),
            package: col(layout.package),
            proprietary_name: col(layout.proprietary_name),
            generic_name: col(layout.generic_name),
            labeler_name: col(layout.labeler_name),
            start_date: col(layout.start_date),
            end_date: col(layout.end_date),
            last_updated: col(layout.last_updated),
            cvx: col(layout.cvx),
            ndc11: col(layout.ndc11),
        });
    }
    debug!(rows = products.len(), skipped, "read NDC product table");
    products
}

/// Read the outer/inner/mvx linker table.
pub fn read_linker(text: &str) -> LinkerTable {
    let mut table = LinkerTable::new();
    for line in text.lines() {
        if line.chars().count() <= 3 {
            continue;
        }
        let columns = split_columns(line);
        if columns.len() <= LINKER_MVX {
            continue;
        }
        let (outer, inner) = (columns[LINKER_OUTER_ID], columns[LINKER_INNER_ID]);
        if outer.is_empty() || inner.is_empty() {
            continue;
        }
        table.insert(NdcLink::new(outer, inner, columns[LINKER_MVX]));
    }
    debug!(links = table.len(), "read NDC linker table");
    table
}
