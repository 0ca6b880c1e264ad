use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DocumentType, Error};

/// Which side of the market a knowledge record belongs to. Brand and
/// competitor knowledge live in separate vector collections and separate
/// owner tables; the kind is selected once at the start of an ingestion run
/// and threaded through everything that touches storage.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
	Brand,
	Competitor,
}
impl OwnerKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Brand => "brand",
			Self::Competitor => "competitor",
		}
	}

	/// Short prefix used in blob storage keys.
	pub fn doc_prefix(self) -> &'static str {
		match self {
			Self::Brand => "brand",
			Self::Competitor => "comp",
		}
	}
}
impl FromStr for OwnerKind {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"brand" => Ok(Self::Brand),
			"competitor" => Ok(Self::Competitor),
			other => Err(Error::UnknownOwnerKind(other.to_string())),
		}
	}
}

/// Coarse category tag on a knowledge record, usable as a search filter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeKind {
	Feature,
	Document,
}
impl KnowledgeKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Feature => "feature",
			Self::Document => "document",
		}
	}
}
impl FromStr for KnowledgeKind {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"feature" => Ok(Self::Feature),
			"document" => Ok(Self::Document),
			other => Err(Error::UnknownKnowledgeKind(other.to_string())),
		}
	}
}

/// Deterministic blob storage key for one synthesized document.
///
/// `index` is zero-based; the key carries it one-based so the rendered file
/// names read naturally in a bucket listing.
pub fn storage_key(owner_id: Uuid, kind: OwnerKind, index: usize, doc_type: DocumentType) -> String {
	format!("{owner_id}/{}-doc-{}-{}.md", kind.doc_prefix(), index + 1, sanitize(doc_type.as_str()))
}

/// Lowercases and collapses every non-alphanumeric run into a single hyphen.
pub fn sanitize(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	let mut pending_hyphen = false;

	for ch in value.chars() {
		if ch.is_ascii_alphanumeric() {
			if pending_hyphen && !out.is_empty() {
				out.push('-');
			}

			pending_hyphen = false;

			out.push(ch.to_ascii_lowercase());
		} else {
			pending_hyphen = true;
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sanitize_collapses_separator_runs() {
		assert_eq!(sanitize("Market  Report / 2025"), "market-report-2025");
		assert_eq!(sanitize("--identity--"), "identity");
	}

	#[test]
	fn storage_key_is_deterministic_and_one_based() {
		let owner = Uuid::nil();
		let key = storage_key(owner, OwnerKind::Competitor, 0, DocumentType::MarketReport);

		assert_eq!(
			key,
			"00000000-0000-0000-0000-000000000000/comp-doc-1-market-report.md"
		);
		assert_eq!(
			key,
			storage_key(owner, OwnerKind::Competitor, 0, DocumentType::MarketReport)
		);
	}

	#[test]
	fn owner_kind_round_trips() {
		for kind in [OwnerKind::Brand, OwnerKind::Competitor] {
			assert_eq!(kind.as_str().parse::<OwnerKind>().unwrap(), kind);
		}
	}
}
