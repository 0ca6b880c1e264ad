use std::str::FromStr;

use serde_json::Value;
use uuid::Uuid;

use lore_domain::DocumentType;

use crate::{LoreService, ServiceError, ServiceResult};

/// One typed markdown document coming out of the synthesis stage.
#[derive(Clone, Debug)]
pub struct GeneratedDocument {
	pub doc_type: DocumentType,
	pub title: String,
	pub content: String,
}

impl LoreService {
	/// Turns raw crawl output into one long-form analysis document.
	pub(crate) async fn synthesize_analysis(
		&self,
		owner_id: Uuid,
		crawled: &str,
	) -> ServiceResult<String> {
		let messages = analysis_messages(crawled);
		let (content, usage) =
			self.providers.generator.complete(&self.cfg.providers.generator, &messages).await?;

		self.emit_billing(owner_id, "analysis", usage);

		if content.trim().is_empty() {
			return Err(ServiceError::Provider {
				message: "Generator returned an empty analysis.".to_string(),
			});
		}

		Ok(content)
	}

	/// Splits the analysis into exactly `document_count` typed documents.
	///
	/// The generator must return the full set; fewer or more documents fails
	/// the run rather than silently truncating or padding.
	pub(crate) async fn generate_documents(
		&self,
		owner_id: Uuid,
		analysis: &str,
	) -> ServiceResult<Vec<GeneratedDocument>> {
		let expected = self.cfg.ingestion.document_count as usize;
		let messages = document_messages(analysis, expected);
		let (raw, usage) =
			self.providers.generator.complete(&self.cfg.providers.generator, &messages).await?;

		self.emit_billing(owner_id, "documents", usage);

		parse_documents(&raw, expected)
	}
}

fn analysis_messages(crawled: &str) -> Vec<Value> {
	vec![
		serde_json::json!({
			"role": "system",
			"content": "You are a brand analyst. From the crawled website \
				content, write one exhaustive markdown analysis covering \
				identity, offerings, market position, customers, and brand \
				assets. Markdown only.",
		}),
		serde_json::json!({ "role": "user", "content": crawled }),
	]
}

fn document_messages(analysis: &str, expected: usize) -> Vec<Value> {
	let types = DocumentType::ALL.map(DocumentType::as_str).join(", ");

	vec![
		serde_json::json!({
			"role": "system",
			"content": format!(
				"Split the analysis into exactly {expected} markdown \
				 documents, one per type: {types}. Respond with a JSON array \
				 of objects {{\"type\", \"title\", \"content\"}} and nothing \
				 else."
			),
		}),
		serde_json::json!({ "role": "user", "content": analysis }),
	]
}

/// Strict parse of the generator's document payload.
///
/// Accepts a bare array or a `{"documents": [...]}` wrapper, with or without
/// a markdown code fence around the JSON. Count, document types, and
/// non-empty content are all enforced.
pub(crate) fn parse_documents(raw: &str, expected: usize) -> ServiceResult<Vec<GeneratedDocument>> {
	let stripped = strip_code_fence(raw);
	let parsed: Value = serde_json::from_str(stripped).map_err(|err| ServiceError::Validation {
		message: format!("Generator returned invalid JSON: {err}."),
	})?;
	let items = match &parsed {
		Value::Array(items) => items.as_slice(),
		Value::Object(map) => map
			.get("documents")
			.and_then(Value::as_array)
			.map(Vec::as_slice)
			.ok_or_else(|| ServiceError::Validation {
				message: "Generator response has no documents array.".to_string(),
			})?,
		_ => {
			return Err(ServiceError::Validation {
				message: "Generator response is neither an array nor an object.".to_string(),
			});
		},
	};

	if items.len() != expected {
		return Err(ServiceError::Validation {
			message: format!("Expected {expected} documents, got {}.", items.len()),
		});
	}

	let mut documents = Vec::with_capacity(items.len());

	for (index, item) in items.iter().enumerate() {
		let doc_type = item
			.get("type")
			.and_then(Value::as_str)
			.ok_or_else(|| ServiceError::Validation {
				message: format!("Document {index} is missing its type."),
			})
			.and_then(|raw_type| {
				DocumentType::from_str(raw_type).map_err(|_| ServiceError::Validation {
					message: format!("Document {index} has unknown type {raw_type:?}."),
				})
			})?;
		let title = item
			.get("title")
			.and_then(Value::as_str)
			.unwrap_or(doc_type.as_str())
			.trim()
			.to_string();
		let content = item
			.get("content")
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|content| !content.is_empty())
			.ok_or_else(|| ServiceError::Validation {
				message: format!("Document {index} ({}) has empty content.", doc_type.as_str()),
			})?
			.to_string();

		documents.push(GeneratedDocument { doc_type, title, content });
	}

	Ok(documents)
}

fn strip_code_fence(raw: &str) -> &str {
	let trimmed = raw.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let rest = rest.strip_prefix("json").unwrap_or(rest);
	let rest = rest.strip_suffix("```").unwrap_or(rest);

	rest.trim()
}
