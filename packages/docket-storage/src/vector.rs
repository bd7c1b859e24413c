//! pgvector text round-trip helpers. Vectors are written as `$n::text::vector`
//! and read back with `vec::text`.

use crate::{Error, Result};

pub fn format_vector_text(vec: &[f32]) -> String {
	let mut out = String::from("[");

	for (idx, value) in vec.iter().enumerate() {
		if idx > 0 {
			out.push(',');
		}
		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub fn parse_pg_vector(raw: &str) -> Result<Vec<f32>> {
	let trimmed = raw.trim();
	let inner = trimmed
		.strip_prefix('[')
		.and_then(|rest| rest.strip_suffix(']'))
		.ok_or_else(|| Error::InvalidArgument(format!("Malformed pgvector text: {trimmed:?}.")))?;

	if inner.trim().is_empty() {
		return Ok(Vec::new());
	}

	inner
		.split(',')
		.map(|part| {
			part.trim().parse::<f32>().map_err(|_| {
				Error::InvalidArgument(format!("Invalid pgvector component: {part:?}."))
			})
		})
		.collect()
}

pub fn validate_vector_dim(vec: &[f32], expected_dim: u32) -> Result<()> {
	if vec.len() != expected_dim as usize {
		return Err(Error::InvalidArgument(format!(
			"Embedding dimension {} does not match configured vector_dim {}.",
			vec.len(),
			expected_dim
		)));
	}

	Ok(())
}
