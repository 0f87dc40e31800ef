//! Source feed adapters.
//!
//! Every run reads the same nine files from the source directory. All are
//! required; parsing turns them into plain fact values so the update
//! pipeline never touches raw text.
//!
//! | File | Contents |
//! |------|----------|
//! | `NDC_Linker.txt` | outer/inner/mvx triples |
//! | `NDC_Unit_sale.txt` | unit-of-sale products |
//! | `NDC_Unit_use.txt` | unit-of-use products |
//! | `cvx.xml` | CVX codes |
//! | `vac2vg.xml` | vaccine group membership |
//! | `cpt.xml` | CPT to CVX mapping |
//! | `cvxvis.xml` | VIS documents |
//! | `mvx.xml` | manufacturers |
//! | `tradename.xml` | trade names |

pub mod cdc;
pub mod ndc;
pub mod xml;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

pub use cdc::{CptFact, CvxFact, MvxFact, TradeNameFact, VaccineGroupFact, VisFact};
pub use xml::{read_rows, Row, RowError};

use crate::ndc::{LinkerTable, NdcProduct};

/// Error type for reading source feeds.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A feed file could not be read.
    #[error("Can't read source file {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A feed file is not well-formed XML.
    #[error("Can't parse source file {path}: {source}")]
    Xml {
        /// File involved.
        path: PathBuf,
        /// Row reader error.
        #[source]
        source: RowError,
    },
}

/// Locations of every source feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    /// `NDC_Linker.txt`
    pub linker: PathBuf,
    /// `NDC_Unit_sale.txt`
    pub unit_of_sale: PathBuf,
    /// `NDC_Unit_use.txt`
    pub unit_of_use: PathBuf,
    /// `cvx.xml`
    pub cvx: PathBuf,
    /// `vac2vg.xml`
    pub vaccine_groups: PathBuf,
    /// `cpt.xml`
    pub cpt: PathBuf,
    /// `cvxvis.xml`
    pub vis: PathBuf,
    /// `mvx.xml`
    pub mvx: PathBuf,
    /// `tradename.xml`
    pub trade_names: PathBuf,
}

impl SourcePaths {
    /// Standard file names under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            linker: dir.join("NDC_Linker.txt"),
            unit_of_sale: dir.join("NDC_Unit_sale.txt"),
            unit_of_use: dir.join("NDC_Unit_use.txt"),
            cvx: dir.join("cvx.xml"),
            vaccine_groups: dir.join("vac2vg.xml"),
            cpt: dir.join("cpt.xml"),
            vis: dir.join("cvxvis.xml"),
            mvx: dir.join("mvx.xml"),
            trade_names: dir.join("tradename.xml"),
        }
    }

    /// Every path, in reading order.
    pub fn all(&self) -> [&Path; 9] {
        [
            &self.linker,
            &self.unit_of_sale,
            &self.unit_of_use,
            &self.cvx,
            &self.vaccine_groups,
            &self.cpt,
            &self.vis,
            &self.mvx,
            &self.trade_names,
        ]
    }

    /// First path that does not exist.
    pub fn first_missing(&self) -> Option<&Path> {
        self.all().into_iter().find(|p| !p.exists())
    }
}

/// Every source feed, parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFeeds {
    /// NDC linker triples.
    pub linker: LinkerTable,
    /// Unit-of-sale products.
    pub unit_of_sale: Vec<NdcProduct>,
    /// Unit-of-use products.
    pub unit_of_use: Vec<NdcProduct>,
    /// Vaccine group membership.
    pub vaccine_groups: Vec<VaccineGroupFact>,
    /// CVX codes.
    pub cvx: Vec<CvxFact>,
    /// CPT codes.
    pub cpt: Vec<CptFact>,
    /// VIS documents.
    pub vis: Vec<VisFact>,
    /// Manufacturers.
    pub mvx: Vec<MvxFact>,
    /// Trade names.
    pub trade_names: Vec<TradeNameFact>,
}

fn read_text(path: &Path) -> Result<String, SourceError> {
    fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_facts<T>(path: &Path, row_tag: &str, from_row: fn(&Row) -> T) -> Result<Vec<T>, SourceError> {
    let xml = read_text(path)?;
    let rows = read_rows(&xml, row_tag).map_err(|source| SourceError::Xml {
        path: path.to_path_buf(),
        source,
    })?;
    info!(file = %path.display(), rows = rows.len(), "read source feed");
    Ok(rows.iter().map(from_row).collect())
}

impl SourceFeeds {
    /// Read and parse every feed.
    pub fn read(paths: &SourcePaths) -> Result<Self, SourceError> {
        let linker = ndc::read_linker(&read_text(&paths.linker)?);
        info!(links = linker.len(), "read NDC linker table");
        Ok(Self {
            linker,
            unit_of_sale: ndc::read_products(&read_text(&paths.unit_of_sale)?, ndc::UNIT_OF_SALE_COLUMNS),
            unit_of_use: ndc::read_products(&read_text(&paths.unit_of_use)?, ndc::UNIT_OF_USE_COLUMNS),
            vaccine_groups: read_facts(&paths.vaccine_groups, cdc::VACCINE_GROUP_ROW, VaccineGroupFact::from_row)?,
            cvx: read_facts(&paths.cvx, cdc::CVX_ROW, CvxFact::from_row)?,
            cpt: read_facts(&paths.cpt, cdc::CPT_ROW, CptFact::from_row)?,
            vis: read_facts(&paths.vis, cdc::VIS_ROW, VisFact::from_row)?,
            mvx: read_facts(&paths.mvx, cdc::MVX_ROW, MvxFact::from_row)?,
            trade_names: read_facts(&paths.trade_names, cdc::TRADE_NAME_ROW, TradeNameFact::from_row)?,
        })
    }
}
