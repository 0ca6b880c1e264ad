use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Per-owner ingestion progress, persisted on the owner row and republished
/// to live observers. Transitions are strictly forward within a single run;
/// a fresh run restarts a terminal owner at `Analyzing`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
	Pending,
	Analyzing,
	Chunking,
	Completed,
	Failed,
}
impl IngestionStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Analyzing => "analyzing",
			Self::Chunking => "chunking",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}

	/// Whether `next` is a legal successor of `self`.
	///
	/// Any state may fail. Terminal states only restart at `Analyzing`.
	pub fn can_transition(self, next: Self) -> bool {
		if next == Self::Failed {
			return !self.is_terminal();
		}

		match self {
			Self::Pending => next == Self::Analyzing,
			Self::Analyzing => next == Self::Chunking,
			Self::Chunking => next == Self::Completed,
			Self::Completed | Self::Failed => next == Self::Analyzing,
		}
	}
}
impl FromStr for IngestionStatus {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"pending" => Ok(Self::Pending),
			"analyzing" => Ok(Self::Analyzing),
			"chunking" => Ok(Self::Chunking),
			"completed" => Ok(Self::Completed),
			"failed" => Ok(Self::Failed),
			other => Err(Error::UnknownStatus(other.to_string())),
		}
	}
}
