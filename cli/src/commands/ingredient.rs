use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::path::Path;
use std::process;

use mealprep_core::csv_import::ImportSummary;
use mealprep_core::models::{BaseIngredient, RawIngredient};
use mealprep_core::service::PlannerService;

use super::helpers::{json_error, print_ingredient_table};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_ingredient_add(
    svc: &PlannerService,
    name: &str,
    unit: &str,
    grams: Option<f64>,
    calories: f64,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    json: bool,
) -> Result<()> {
    let raw = RawIngredient::from_json(json!({
        "name": name,
        "unit": unit,
        "gramsPerUnit": grams,
        "calories": calories,
        "protein": protein,
        "carbs": carbs,
        "fat": fat,
    }));
    let ingredient = svc.add_ingredient(&raw)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        let name = &ingredient.name;
        let id = ingredient.id;
        println!("Added ingredient: {name} (id: {id})");
    }

    Ok(())
}

pub(crate) fn cmd_ingredient_list(
    svc: &PlannerService,
    search: Option<&str>,
    custom_only: bool,
    json: bool,
) -> Result<()> {
    let library = svc.library();
    let items: Vec<&BaseIngredient> = match search {
        Some(q) => library.search(q),
        None => library.iter().collect(),
    }
    .into_iter()
    .filter(|i| !custom_only || i.is_custom())
    .collect();

    if items.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No ingredients found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        print_ingredient_table(&items, &svc.favorite_ingredients());
    }

    Ok(())
}

pub(crate) fn cmd_ingredient_show(svc: &PlannerService, id: i64, json: bool) -> Result<()> {
    let library = svc.library();
    let Some(ingredient) = library.get(id) else {
        if json {
            println!("{}", json_error(&format!("Ingredient {id} not found")));
        } else {
            eprintln!("Ingredient {id} not found");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(ingredient)?);
        return Ok(());
    }

    print_ingredient_table(&[ingredient], &svc.favorite_ingredients());
    println!("Serving sizes:");
    for s in &ingredient.serving_sizes {
        let marker = if s.is_default { " (default)" } else { "" };
        println!("  {}: {:.0}g{marker}", s.name, s.grams);
    }

    Ok(())
}

pub(crate) fn cmd_ingredient_remove(svc: &PlannerService, id: i64, json: bool) -> Result<()> {
    let remaining = svc.remove_ingredient(id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"removed": id, "remaining": remaining.len()}))?
        );
    } else {
        println!("Removed ingredient {id}");
    }

    Ok(())
}

fn print_import_summary(source: &Path, summary: &ImportSummary, json: bool) -> Result<()> {
    if json {
        let mut value = serde_json::to_value(summary)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "ingredients".to_string(),
                serde_json::to_value(&summary.ingredients)?,
            );
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let imported = summary.imported;
        let failed = summary.failed;
        println!(
            "Imported {imported} ingredient(s) from {} ({failed} skipped)",
            source.display()
        );
        for i in &summary.ingredients {
            println!("  [{}] {}", i.id, i.name);
        }
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_import_csv(
    svc: &PlannerService,
    file: &Path,
    json: bool,
) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let summary = svc.import_csv(&data)?;
    print_import_summary(file, &summary, json)
}

pub(crate) fn cmd_ingredient_import_json(
    svc: &PlannerService,
    file: &Path,
    json: bool,
) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let summary = svc.import_json(&data)?;
    print_import_summary(file, &summary, json)
}

pub(crate) fn cmd_ingredient_dedupe(svc: &PlannerService, json: bool) -> Result<()> {
    let removed = svc.cleanup_duplicate_ingredients()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"removed": removed}))?
        );
    } else if removed == 0 {
        println!("No duplicate ingredients");
    } else {
        println!("Removed {removed} duplicate ingredient(s)");
    }

    Ok(())
}

pub(crate) fn cmd_ingredient_favorite(svc: &PlannerService, id: i64, json: bool) -> Result<()> {
    let favorite = svc.toggle_favorite(id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"id": id, "favorite": favorite}))?
        );
    } else if favorite {
        println!("Ingredient {id} added to favorites");
    } else {
        println!("Ingredient {id} removed from favorites");
    }

    Ok(())
}

pub(crate) fn cmd_ingredient_recent(svc: &PlannerService, json: bool) -> Result<()> {
    let library = svc.library();
    let items: Vec<&BaseIngredient> = svc
        .recent_ingredients()
        .into_iter()
        .filter_map(|id| library.get(id))
        .collect();

    if items.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recently used ingredients");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        print_ingredient_table(&items, &svc.favorite_ingredients());
    }

    Ok(())
}
