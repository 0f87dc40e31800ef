//! Facts read from the CDC XML feeds.

use chrono::NaiveDate;
use tracing::warn;

use super::xml::Row;
use crate::lifecycle::parse_feed_date;

/// Row element of the CVX feed.
pub const CVX_ROW: &str = "CVXInfo";
/// Row element of the MVX feed.
pub const MVX_ROW: &str = "MVXInfo";
/// Row element of the vaccine group feed.
pub const VACCINE_GROUP_ROW: &str = "CVXVGInfo";
/// Row element of the CPT feed.
pub const CPT_ROW: &str = "CPTInfo";
/// Row element of the VIS feed.
pub const VIS_ROW: &str = "CVXVISMapping";
/// Row element of the trade name feed.
pub const TRADE_NAME_ROW: &str = "prodInfo";

fn feed_date(feed: &str, text: &str) -> Option<NaiveDate> {
    if text.trim().is_empty() {
        return None;
    }
    let date = parse_feed_date(text);
    if date.is_none() {
        warn!(feed, value = text, "unparseable date in source feed");
    }
    date
}

/// A CVX vaccine code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CvxFact {
    /// CVX code.
    pub cvx_code: String,
    /// Short description, used as label.
    pub short_description: String,
    /// Full vaccine name.
    pub full_name: String,
    /// Free-text notes.
    pub notes: String,
    /// Source status ("Active", "Inactive", ...).
    pub status: String,
    /// Last-updated date.
    pub last_updated: Option<NaiveDate>,
}

impl CvxFact {
    /// Read the fact from a feed row.
    pub fn from_row(row: &Row) -> Self {
        Self {
            cvx_code: row.text("CVXCode").to_string(),
            short_description: row.text("ShortDescription").to_string(),
            full_name: row.text("FullVaccinename").to_string(),
            notes: row.text("Notes").to_string(),
            status: row.text("Status").to_string(),
            last_updated: feed_date("cvx", row.text("LastUpdated")),
        }
    }

    /// Concept type implied by the source status.
    pub fn concept_type(&self) -> &'static str {
        match self.status.as_str() {
            "Never Active" => "never active",
            "Pending" => "pending",
            "Non-US" => "foreign vaccine",
            _ => "vaccine",
        }
    }
}

/// An MVX manufacturer code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MvxFact {
    /// MVX code.
    pub mvx_code: String,
    /// Manufacturer name.
    pub manufacturer_name: String,
    /// Free-text notes.
    pub notes: String,
    /// Source status ("Active", "Inactive", ...).
    pub status: String,
    /// Last-updated date.
    pub last_updated: Option<NaiveDate>,
}

impl MvxFact {
    /// Read the fact from a feed row.
    pub fn from_row(row: &Row) -> Self {
        Self {
            mvx_code: row.text("MVX_CODE").to_string(),
            manufacturer_name: row.text("ManufacturerName").to_string(),
            notes: row.text("Notes").to_string(),
            status: row.text("Status").to_string(),
            last_updated: feed_date("mvx", row.text("LastUpdated")),
        }
    }
}

/// Membership of a CVX code in a vaccine group. Read from name/value rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaccineGroupFact {
    /// Group name; identifies the group.
    pub vaccine_group_name: String,
    /// Short description, used as label.
    pub short_description: String,
    /// CVX code.
    pub cvx_code: String,
    /// CVX code standing for the whole group.
    pub cvx_for_vaccine_group: String,
}

impl VaccineGroupFact {
    /// Read the fact from a feed row.
    pub fn from_row(row: &Row) -> Self {
        let map = row.name_value_map();
        let get = |name: &str| map.get(name).cloned().unwrap_or_default();
        Self {
            vaccine_group_name: get("Vaccine Group Name"),
            short_description: get("ShortDescription"),
            cvx_code: get("CVXCode"),
            cvx_for_vaccine_group: get("CVX for Vaccine Group"),
        }
    }
}

/// A CPT procedure code and the CVX it maps to. Read from name/value rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CptFact {
    /// CPT code.
    pub cpt_code: String,
    /// CPT description.
    pub description: String,
    /// CPT comments.
    pub comments: String,
    /// CVX code.
    pub cvx_code: String,
}

impl CptFact {
    /// Read the fact from a feed row.
    pub fn from_row(row: &Row) -> Self {
        let map = row.name_value_map();
        let get = |name: &str| map.get(name).cloned().unwrap_or_default();
        Self {
            cpt_code: get("CPT Code"),
            description: get("CPT Desc"),
            comments: get("Comments"),
            cvx_code: get("CVX Code"),
        }
    }
}

/// A VIS document and the CVX code it covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisFact {
    /// CVX code.
    pub cvx_code: String,
    /// Fully-encoded VIS string; identifies the document.
    pub fully_encoded: String,
    /// VIS document name.
    pub document_name: String,
    /// VIS edition date.
    pub edition_date: Option<NaiveDate>,
}

impl VisFact {
    /// Read the fact from a feed row.
    pub fn from_row(row: &Row) -> Self {
        Self {
            cvx_code: row.text("CVXCode").to_string(),
            fully_encoded: row.text("Fully-encodedString").to_string(),
            document_name: row.text("VISDocumentName").to_string(),
            edition_date: feed_date("vis", row.text("VISEditionDate")),
        }
    }
}

/// A CDC product (trade) name. Read from name/value rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeNameFact {
    /// CDC product name; identifies the trade name.
    pub product_name: String,
    /// Short description, used as label.
    pub short_description: String,
    /// CVX code.
    pub cvx_code: String,
    /// MVX code.
    pub mvx_code: String,
    /// Source status ("Active", "Inactive", ...).
    pub status: String,
    /// Last-updated date.
    pub last_updated: Option<NaiveDate>,
}

impl TradeNameFact {
    /// Read the fact from a feed row.
    pub fn from_row(row: &Row) -> Self {
        let map = row.name_value_map();
        let get = |name: &str| map.get(name).cloned().unwrap_or_default();
        Self {
            product_name: get("CDC Product Name"),
            short_description: get("Short Description"),
            cvx_code: get("CVXCode"),
            mvx_code: get("MVX Code"),
            status: get("Product name Status"),
            last_updated: feed_date("tradename", &get("Last Updated")),
        }
    }
}
