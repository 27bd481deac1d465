use std::io::Read;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::models::{BaseIngredient, RawIngredient};
use crate::normalize::normalize;

/// Columns every ingredient CSV must have, in the documented order.
pub const REQUIRED_COLUMNS: [&str; 6] = ["name", "grams", "calories", "protein", "carbs", "fat"];

/// Parsed ingredients plus counts of what was kept and what was skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub failed: usize,
    #[serde(skip)]
    pub ingredients: Vec<BaseIngredient>,
}

impl ImportSummary {
    fn keep(&mut self, ingredient: BaseIngredient) {
        self.imported += 1;
        self.ingredients.push(ingredient);
    }
}

/// Parse an ingredient CSV from any reader.
///
/// Expected header: `name,grams,calories,protein,carbs,fat` with an optional
/// `unit` column, matched case-insensitively in any order. Rows with fewer
/// than six fields or a blank name are skipped and counted as failed. Cells
/// are passed through the normalizer, so bad numbers become 0.
pub fn parse_ingredient_csv<R: Read>(reader: R) -> Result<ImportSummary> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    for name in &REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            bail!("Missing required column: {name}");
        }
    }

    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };
    let idx_unit = col("unit");

    let mut summary = ImportSummary::default();

    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(line, error = %e, "skipping unreadable CSV row");
                summary.failed += 1;
                continue;
            }
        };

        if record.len() < REQUIRED_COLUMNS.len() {
            warn!(line, fields = record.len(), "skipping short CSV row");
            summary.failed += 1;
            continue;
        }

        let cell = |name: &str| -> Option<Value> {
            col(name)
                .and_then(|i| record.get(i))
                .filter(|v| !v.is_empty())
                .map(|v| Value::String(v.to_string()))
        };

        let Some(name) = cell("name") else {
            warn!(line, "skipping CSV row without a name");
            summary.failed += 1;
            continue;
        };

        let raw = RawIngredient {
            name: Some(name),
            unit: idx_unit
                .and_then(|i| record.get(i))
                .map(|v| Value::String(v.to_string())),
            grams: cell("grams"),
            calories: cell("calories"),
            protein: cell("protein"),
            carbs: cell("carbs"),
            fat: cell("fat"),
            ..RawIngredient::default()
        };
        summary.keep(normalize(&raw));
    }

    Ok(summary)
}

/// Parse a JSON array of partial ingredients (a single object is accepted
/// too). Entries without a name are skipped and counted as failed.
pub fn parse_ingredient_json(text: &str) -> Result<ImportSummary> {
    let value: Value = serde_json::from_str(text).context("Invalid ingredient JSON")?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => bail!("Expected a JSON array of ingredients"),
    };

    let mut summary = ImportSummary::default();
    for (i, item) in items.into_iter().enumerate() {
        let has_name = item
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| !n.trim().is_empty());
        if !has_name {
            warn!(index = i, "skipping ingredient without a name");
            summary.failed += 1;
            continue;
        }
        let mut raw = RawIngredient::from_json(item);
        // ids come from the destination library
        raw.id = None;
        summary.keep(normalize(&raw));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Unit;

    #[test]
    fn test_parse_csv_basic() {
        let csv_data = "\
name,grams,calories,protein,carbs,fat
Oats,40,150,5,27,2.5
Egg,50,72,6.3,0.4,4.8,unit
";
        let summary = parse_ingredient_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.failed, 0);
        let oats = &summary.ingredients[0];
        assert_eq!(oats.name, "Oats");
        assert!((oats.grams_per_unit - 40.0).abs() < 0.01);
        assert!((oats.calories - 150.0).abs() < 0.01);
        assert!((oats.fat - 2.5).abs() < 0.01);
        assert_eq!(oats.unit, Unit::Grams);
    }

    #[test]
    fn test_parse_csv_with_unit_column() {
        let csv_data = "\
Name,Unit,Grams,Calories,Protein,Carbs,Fat
Egg,unit,50,72,6.3,0.4,4.8
Milk,g,100,42,3.4,5,1
";
        let summary = parse_ingredient_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.ingredients[0].unit, Unit::Count);
        assert_eq!(summary.ingredients[1].unit, Unit::Grams);
        assert!((summary.ingredients[0].protein - 6.3).abs() < 0.01);
    }

    #[test]
    fn test_parse_csv_missing_required_column() {
        let csv_data = "name,grams,calories\nOats,40,150\n";
        let err = parse_ingredient_csv(csv_data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("protein"));
    }

    #[test]
    fn test_parse_csv_skips_and_counts_bad_rows() {
        let csv_data = "\
name,grams,calories,protein,carbs,fat
Oats,40,150,5,27,2.5
Short,40,150
,100,10,1,1,1
Rice,abc,365,,80,0.7
";
        let summary = parse_ingredient_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.failed, 2);
        let rice = &summary.ingredients[1];
        assert_eq!(rice.name, "Rice");
        assert!((rice.grams_per_unit - 100.0).abs() < 0.01);
        assert!(rice.protein.abs() < 0.01);
    }

    #[test]
    fn test_parse_json_array() {
        let json = r#"[
            {"id": 5, "name": "Tofu", "calories": "76", "protein": 8, "fat": -3},
            {"name": ""},
            {"calories": 100},
            {"name": "Kefir", "unit": "unit", "gramsPerUnit": 250, "calories": 150}
        ]"#;
        let summary = parse_ingredient_json(json).unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.failed, 2);
        let tofu = &summary.ingredients[0];
        assert_eq!(tofu.id, 0);
        assert!((tofu.calories - 76.0).abs() < 0.01);
        assert!(tofu.fat.abs() < 0.01);
        assert_eq!(summary.ingredients[1].unit, Unit::Count);
    }

    #[test]
    fn test_parse_json_single_object() {
        let summary = parse_ingredient_json(r#"{"name": "Apple", "calories": 52}"#).unwrap();
        assert_eq!(summary.imported, 1);
    }

    #[test]
    fn test_parse_json_invalid() {
        assert!(parse_ingredient_json("not json").is_err());
        assert!(parse_ingredient_json("42").is_err());
    }
}
