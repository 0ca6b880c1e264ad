//! Markdown-aware chunking.
//!
//! A document is first cut into structural blocks (headings, paragraphs,
//! fenced code blocks), blocks pack into chunks up to a word budget, and a
//! tail of the previous chunk carries over into the next one so cross-chunk
//! context survives retrieval. The tail spends the same budget, so no chunk
//! ever exceeds the configured maximum. Oversized blocks fall back to sentence
//! bounds, oversized sentences to word windows. The whole process is
//! deterministic for a given input and configuration.

use unicode_segmentation::UnicodeSegmentation;

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub max_words: u32,
	pub overlap_words: u32,
}

#[derive(Clone, Debug)]
pub struct Chunk {
	pub chunk_index: i32,
	pub text: String,
}

pub fn split_markdown(text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
	let max_words = (cfg.max_words as usize).max(1);
	let units = blocks(text)
		.into_iter()
		.flat_map(|block| split_oversized(block, max_words))
		.collect::<Vec<_>>();

	let mut chunks = Vec::new();
	let mut current = String::new();
	let mut current_words = 0_usize;
	let mut chunk_index = 0_i32;

	for unit in units {
		let unit_words = word_count(&unit);

		if current_words + unit_words > max_words && !current.is_empty() {
			// The carried tail counts against the budget too, so it shrinks
			// when the next unit leaves less room than the configured overlap.
			let overlap_budget =
				(cfg.overlap_words as usize).min(max_words.saturating_sub(unit_words));
			let overlap = overlap_tail(&current, overlap_budget);

			chunks.push(Chunk { chunk_index, text: std::mem::take(&mut current) });

			chunk_index += 1;
			current_words = word_count(&overlap);
			current = overlap;
		}
		if !current.is_empty() {
			current.push_str("\n\n");
		}

		current.push_str(&unit);

		current_words += unit_words;
	}

	if !current.is_empty() {
		chunks.push(Chunk { chunk_index, text: current });
	}

	chunks
}

/// Structural blocks: a heading line, a fenced code block, or a paragraph
/// delimited by blank lines.
fn blocks(text: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut paragraph = String::new();
	let mut fence: Option<String> = None;

	let flush = |paragraph: &mut String, out: &mut Vec<String>| {
		let trimmed = paragraph.trim();

		if !trimmed.is_empty() {
			out.push(trimmed.to_string());
		}

		paragraph.clear();
	};

	for line in text.lines() {
		let trimmed = line.trim_start();

		if let Some(open) = fence.as_deref() {
			paragraph.push_str(line);
			paragraph.push('\n');

			if trimmed.starts_with(open) {
				fence = None;

				flush(&mut paragraph, &mut out);
			}

			continue;
		}
		if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
			flush(&mut paragraph, &mut out);

			fence = Some(trimmed[..3].to_string());

			paragraph.push_str(line);
			paragraph.push('\n');

			continue;
		}
		if trimmed.starts_with('#') {
			flush(&mut paragraph, &mut out);
			out.push(line.trim().to_string());

			continue;
		}
		if trimmed.is_empty() {
			flush(&mut paragraph, &mut out);

			continue;
		}

		paragraph.push_str(line);
		paragraph.push('\n');
	}

	if fence.is_some() {
		tracing::warn!("Unterminated code fence in document; keeping remainder as one block.");
	}

	flush(&mut paragraph, &mut out);

	out
}

/// Splits a block that exceeds the word budget at sentence bounds, and any
/// sentence that still exceeds it at word bounds.
fn split_oversized(block: String, max_words: usize) -> Vec<String> {
	if word_count(&block) <= max_words {
		return vec![block];
	}

	let mut out = Vec::new();
	let mut current = String::new();
	let mut current_words = 0_usize;

	for sentence in block.split_sentence_bounds() {
		let sentence_words = word_count(sentence);

		if current_words + sentence_words > max_words && !current.is_empty() {
			out.push(current.trim_end().to_string());

			current = String::new();
			current_words = 0;
		}
		if sentence_words > max_words {
			out.extend(split_words(sentence, max_words));

			continue;
		}

		current.push_str(sentence);

		current_words += sentence_words;
	}

	if !current.trim().is_empty() {
		out.push(current.trim_end().to_string());
	}

	out
}

fn split_words(text: &str, max_words: usize) -> Vec<String> {
	let bounds: Vec<(usize, &str)> = text.unicode_word_indices().collect();
	let mut out = Vec::new();
	let mut start = 0_usize;
	let mut count = 0_usize;

	for (offset, _) in &bounds {
		if count == max_words {
			out.push(text[start..*offset].trim_end().to_string());

			start = *offset;
			count = 0;
		}

		count += 1;
	}

	let tail = text[start..].trim_end();

	if !tail.is_empty() {
		out.push(tail.to_string());
	}

	out
}

/// The last `overlap_words` words of `text`, preserving the original
/// spelling and spacing from the first carried word onward.
fn overlap_tail(text: &str, overlap_words: usize) -> String {
	if overlap_words == 0 {
		return String::new();
	}

	let bounds: Vec<usize> = text.unicode_word_indices().map(|(offset, _)| offset).collect();

	if bounds.is_empty() {
		return String::new();
	}

	let start = bounds[bounds.len().saturating_sub(overlap_words)];

	text[start..].to_string()
}

fn word_count(text: &str) -> usize {
	text.unicode_words().count()
}
