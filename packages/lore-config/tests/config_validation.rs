use toml::Value;

use lore_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_config() -> Value {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.")
}

fn parse(value: Value) -> Config {
	value.try_into().expect("Failed to deserialize config.")
}

fn table<'a>(value: &'a mut Value, path: &[&str]) -> &'a mut toml::map::Map<String, Value> {
	let mut current = value;

	for segment in path {
		current = current
			.as_table_mut()
			.and_then(|table| table.get_mut(*segment))
			.expect("Missing config section.");
	}

	current.as_table_mut().expect("Config section must be a table.")
}

#[test]
fn sample_config_validates() {
	let cfg = parse(sample_config());

	lore_config::validate(&cfg).expect("Sample config must validate.");
}

#[test]
fn rejects_dimension_mismatch() {
	let mut value = sample_config();

	table(&mut value, &["providers", "embedding"])
		.insert("dimensions".to_string(), Value::Integer(768));

	let cfg = parse(value);
	let err = lore_config::validate(&cfg).expect_err("Dimension mismatch must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn rejects_overlap_not_below_max() {
	let mut value = sample_config();

	table(&mut value, &["chunking"]).insert("overlap_words".to_string(), Value::Integer(256));

	let cfg = parse(value);

	assert!(lore_config::validate(&cfg).is_err());
}

#[test]
fn rejects_zero_document_count() {
	let mut value = sample_config();

	table(&mut value, &["ingestion"]).insert("document_count".to_string(), Value::Integer(0));

	let cfg = parse(value);

	assert!(lore_config::validate(&cfg).is_err());
}

#[test]
fn rejects_threshold_out_of_range() {
	let mut value = sample_config();

	table(&mut value, &["retrieval"])
		.insert("brand_similarity_threshold".to_string(), Value::Float(1.5));

	let cfg = parse(value);

	assert!(lore_config::validate(&cfg).is_err());
}

#[test]
fn rejects_identical_collections() {
	let mut value = sample_config();

	table(&mut value, &["storage", "qdrant"])
		.insert("competitor_collection".to_string(), Value::String("brand_knowledge".to_string()));

	let cfg = parse(value);

	assert!(lore_config::validate(&cfg).is_err());
}

#[test]
fn rejects_empty_api_key() {
	let mut value = sample_config();

	table(&mut value, &["providers", "crawler"])
		.insert("api_key".to_string(), Value::String("  ".to_string()));

	let cfg = parse(value);

	assert!(lore_config::validate(&cfg).is_err());
}
