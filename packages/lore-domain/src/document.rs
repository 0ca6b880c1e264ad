use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, owner::sanitize};

/// The fixed set of typed documents the synthesis stage produces per run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
	IdentityProfile,
	Catalog,
	MarketReport,
	CustomerAnalysis,
	AssetInventory,
}
impl DocumentType {
	pub const ALL: [Self; 5] = [
		Self::IdentityProfile,
		Self::Catalog,
		Self::MarketReport,
		Self::CustomerAnalysis,
		Self::AssetInventory,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::IdentityProfile => "identity-profile",
			Self::Catalog => "catalog",
			Self::MarketReport => "market-report",
			Self::CustomerAnalysis => "customer-analysis",
			Self::AssetInventory => "asset-inventory",
		}
	}
}
impl FromStr for DocumentType {
	type Err = Error;

	/// Lenient on the casing and separators the generator tends to return
	/// ("Identity Profile", "identity_profile", ...).
	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match sanitize(value).as_str() {
			"identity-profile" | "brand-identity" | "identity" => Ok(Self::IdentityProfile),
			"catalog" | "product-catalog" | "service-catalog" => Ok(Self::Catalog),
			"market-report" | "market-analysis" => Ok(Self::MarketReport),
			"customer-analysis" | "audience-analysis" => Ok(Self::CustomerAnalysis),
			"asset-inventory" | "assets" => Ok(Self::AssetInventory),
			_ => Err(Error::UnknownDocumentType(value.to_string())),
		}
	}
}
