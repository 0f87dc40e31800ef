//! Registry type identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the code registries that make up the codebase.
///
/// The set is closed: every registry the update run loads, links into, or
/// persists is a variant here. Declaration order is the fixed processing
/// order used for cross-link diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryType {
    /// VIS document types (fully-encoded VIS strings).
    #[serde(rename = "VACCINATION_VIS_DOC_TYPE")]
    VisDocType,
    /// CVX codes that have a VIS document.
    #[serde(rename = "VACCINATION_VIS_VACCINES")]
    VisVaccines,
    /// CPT procedure codes.
    #[serde(rename = "VACCINATION_CPT_CODE")]
    Cpt,
    /// CDC product (trade) names.
    #[serde(rename = "VACCINATION_TRADE_NAME")]
    TradeName,
    /// Vaccine groups.
    VaccineGroup,
    /// CVX vaccine codes.
    #[serde(rename = "VACCINATION_CVX_CODE")]
    Cvx,
    /// MVX manufacturer codes.
    #[serde(rename = "VACCINATION_MANUFACTURER_CODE")]
    Mvx,
    /// NDC unit-of-use product codes.
    #[serde(rename = "VACCINATION_NDC_CODE_UNIT_OF_USE")]
    NdcUnitOfUse,
    /// NDC unit-of-sale product codes.
    #[serde(rename = "VACCINATION_NDC_CODE_UNIT_OF_SALE")]
    NdcUnitOfSale,
    /// Injection amounts.
    InjectionAmount,
    /// Injection guidance.
    InjectionGuidance,
    /// Injection guidance sites.
    InjectionGuidanceSite,
    /// Body routes.
    BodyRoute,
    /// Body sites.
    BodySite,
    /// Lot number regular expressions.
    #[serde(rename = "VACCINATION_LOT_NUMBER_PATTERN")]
    LotNumberPattern,
}

impl RegistryType {
    /// Every registry, in processing order.
    pub const ALL: [RegistryType; 15] = [
        Self::VisDocType,
        Self::VisVaccines,
        Self::Cpt,
        Self::TradeName,
        Self::VaccineGroup,
        Self::Cvx,
        Self::Mvx,
        Self::NdcUnitOfUse,
        Self::NdcUnitOfSale,
        Self::InjectionAmount,
        Self::InjectionGuidance,
        Self::InjectionGuidanceSite,
        Self::BodyRoute,
        Self::BodySite,
        Self::LotNumberPattern,
    ];

    /// Position of this registry in [`RegistryType::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable tag written into registry documents and link targets.
    pub fn tag(self) -> &'static str {
        match self {
            Self::VisDocType => "VACCINATION_VIS_DOC_TYPE",
            Self::VisVaccines => "VACCINATION_VIS_VACCINES",
            Self::Cpt => "VACCINATION_CPT_CODE",
            Self::TradeName => "VACCINATION_TRADE_NAME",
            Self::VaccineGroup => "VACCINE_GROUP",
            Self::Cvx => "VACCINATION_CVX_CODE",
            Self::Mvx => "VACCINATION_MANUFACTURER_CODE",
            Self::NdcUnitOfUse => "VACCINATION_NDC_CODE_UNIT_OF_USE",
            Self::NdcUnitOfSale => "VACCINATION_NDC_CODE_UNIT_OF_SALE",
            Self::InjectionAmount => "INJECTION_AMOUNT",
            Self::InjectionGuidance => "INJECTION_GUIDANCE",
            Self::InjectionGuidanceSite => "INJECTION_GUIDANCE_SITE",
            Self::BodyRoute => "BODY_ROUTE",
            Self::BodySite => "BODY_SITE",
            Self::LotNumberPattern => "VACCINATION_LOT_NUMBER_PATTERN",
        }
    }

    /// Parse a registry tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }

    /// Display label used when a registry is created from scratch.
    pub fn label(self) -> &'static str {
        match self {
            Self::VisDocType => "Vaccination VIS Doc Type",
            Self::VisVaccines => "Vaccination VIS Vaccines",
            Self::Cpt => "Vaccination CPT Code",
            Self::TradeName => "Vaccination Trade Name",
            Self::VaccineGroup => "Vaccine Group",
            Self::Cvx => "Vaccination CVX Code",
            Self::Mvx => "Vaccination Manufacturer Code",
            Self::NdcUnitOfUse => "Vaccination NDC for Unit-of-Use",
            Self::NdcUnitOfSale => "Vaccination NDC for Unit-of-Sale",
            Self::InjectionAmount => "Injection Amount",
            Self::InjectionGuidance => "Injection Guidance",
            Self::InjectionGuidanceSite => "Injection Guidance Site",
            Self::BodyRoute => "Body Route",
            Self::BodySite => "Body Site",
            Self::LotNumberPattern => "Vaccination Lot Number Pattern",
        }
    }

    /// File name of the persisted registry document.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::VisDocType => "Vaccination VIS Doc Type.xml",
            Self::VisVaccines => "Vaccination VIS Vaccines.xml",
            Self::Cpt => "Vaccination CPT Code.xml",
            Self::TradeName => "Vaccination Trade Name.xml",
            Self::VaccineGroup => "Vaccine Group.xml",
            Self::Cvx => "Vaccination CVX Code.xml",
            Self::Mvx => "Vaccination Manufacturer Code.xml",
            Self::NdcUnitOfUse => "Vaccination NDC Code Unit-of-Use.xml",
            Self::NdcUnitOfSale => "Vaccination NDC Code Unit-of-Sale.xml",
            Self::InjectionAmount => "Injection Amount.xml",
            Self::InjectionGuidance => "Injection Guidance.xml",
            Self::InjectionGuidanceSite => "Injection Guidance Site.xml",
            Self::BodyRoute => "Body Route.xml",
            Self::BodySite => "Body Site.xml",
            Self::LotNumberPattern => "Vaccination Lot Number Pattern.xml",
        }
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
