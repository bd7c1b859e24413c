pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_embedding_records.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_embedding_records.sql")),
				"tables/002_saved_items.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_saved_items.sql")),
				"tables/003_cases.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_cases.sql")),
				"tables/004_evidence.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_evidence.sql")),
				"tables/005_statutes.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_statutes.sql")),
				"tables/006_knowledge_base.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_knowledge_base.sql")),
				"tables/007_user_search_preferences.sql" => out
					.push_str(include_str!("../../../sql/tables/007_user_search_preferences.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_vector_dim_into_schema() {
		let sql = render_schema(1536);

		assert!(sql.contains("vector(1536)"));
		assert!(!sql.contains("<VECTOR_DIM>"));
		assert!(!sql.contains("\\ir"));
	}

	#[test]
	fn includes_every_table() {
		let sql = render_schema(8);

		for table in [
			"embedding_records",
			"saved_items",
			"cases",
			"evidence",
			"statutes",
			"knowledge_base",
			"user_search_preferences",
		] {
			assert!(sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")), "{table}");
		}
	}
}
