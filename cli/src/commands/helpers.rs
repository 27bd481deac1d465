use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use mealprep_core::models::{
    BaseIngredient, LookupCandidate, Nutrition, Plan, PlanSummary, Unit,
};

pub(crate) fn prompt_choice(count: usize) -> Result<usize> {
    eprint!("\nSelect a match (1-{count}): ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let n: usize = line.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

pub(crate) fn format_amount(unit: Unit, quantity: f64, grams: f64) -> String {
    let grams = no_neg_zero(grams);
    match unit {
        Unit::Grams => format!("{grams:.0}g"),
        Unit::Count => {
            let quantity = no_neg_zero(quantity);
            if quantity.fract() == 0.0 {
                format!("{quantity:.0} unit ({grams:.0}g)")
            } else {
                format!("{quantity:.1} unit ({grams:.0}g)")
            }
        }
    }
}

fn format_macros(n: &Nutrition) -> String {
    let p = no_neg_zero(n.protein);
    let c = no_neg_zero(n.carbs);
    let f = no_neg_zero(n.fat);
    format!("P:{p:.1}g C:{c:.1}g F:{f:.1}g")
}

pub(crate) fn print_ingredient_table(items: &[&BaseIngredient], favorites: &[i64]) {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "")]
        favorite: &'static str,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Per")]
        per: String,
        #[tabled(rename = "Cal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
    }

    let rows: Vec<IngredientRow> = items
        .iter()
        .map(|i| IngredientRow {
            id: i.id,
            favorite: if favorites.contains(&i.id) { "*" } else { "" },
            name: truncate(&i.name, 35),
            per: match i.unit {
                Unit::Grams => format!("{:.0}g", i.grams_per_unit),
                Unit::Count => format!("1 unit ({:.0}g)", i.grams_per_unit),
            },
            calories: format!("{:.0}", i.calories),
            protein: format!("{:.1}", i.protein),
            carbs: format!("{:.1}", i.carbs),
            fat: format!("{:.1}", i.fat),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_candidate_table(candidates: &[LookupCandidate]) {
    #[derive(Tabled)]
    struct CandidateRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Brand")]
        brand: String,
    }

    let rows: Vec<CandidateRow> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| CandidateRow {
            idx: i + 1,
            name: truncate(&c.name, 40),
            brand: c
                .brand
                .as_deref()
                .map(|b| truncate(b, 25))
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_plan_table(plans: &[Plan]) {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Target")]
        target: String,
        #[tabled(rename = "P/F/C %")]
        split: String,
        #[tabled(rename = "Match dinner")]
        match_dinner: &'static str,
        #[tabled(rename = "Updated")]
        updated: String,
    }

    let rows: Vec<PlanRow> = plans
        .iter()
        .map(|p| {
            let pct = p.target_percentages;
            PlanRow {
                id: p.id.clone(),
                name: truncate(&p.name, 30),
                target: format!("{} kcal", p.calorie_target),
                split: format!("{}/{}/{}", pct.protein, pct.fat, pct.carbs),
                match_dinner: if p.match_dinner { "yes" } else { "no" },
                updated: p
                    .updated_at
                    .as_deref()
                    .map(|t| truncate(t, 19))
                    .unwrap_or_default(),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_summary(title: &str, summary: &PlanSummary) {
    println!("=== {title} ===\n");

    for group in &summary.meals {
        let label = group.meal.as_str().to_uppercase();
        let sub_cal = no_neg_zero(group.subtotal.calories);
        println!("  {label} ({sub_cal:.0} kcal)");
        if group.lines.is_empty() {
            println!("    (empty)");
        }
        for line in &group.lines {
            let id = line.id;
            let name = &line.name;
            let amount = format_amount(line.unit, line.quantity, line.grams);
            let cal = no_neg_zero(line.nutrition.calories);
            let macros = format_macros(&line.nutrition);
            println!("    [{id}] {name}: {amount}, {cal:.0} kcal | {macros}");
        }
        println!();
    }

    let total_cal = no_neg_zero(summary.total.calories);
    let macros = format_macros(&summary.total);
    println!("  TOTAL: {total_cal:.0} kcal | {macros}");

    if let Some(target) = &summary.target {
        let tcal = target.calories;
        let (pg, cg, fg) = (target.protein_g, target.carbs_g, target.fat_g);
        println!("  TARGET: {tcal} kcal | P:{pg:.0}g C:{cg:.0}g F:{fg:.0}g");
        #[allow(clippy::cast_precision_loss)]
        let rcal = tcal as f64 - summary.total.calories;
        let rp = pg - summary.total.protein;
        let rc = cg - summary.total.carbs;
        let rf = fg - summary.total.fat;
        println!("  REMAINING: {rcal:.0} kcal | P:{rp:.0}g C:{rc:.0}g F:{rf:.0}g");
    }

    if let Some(validation) = &summary.validation {
        println!("\n  CHECK: {}", validation.summary());
        for check in validation.issues() {
            let level = check.severity.as_str().to_uppercase();
            if let Some(message) = &check.message {
                println!("    {level}: {message}");
            }
            if let Some(recommendation) = &check.recommendation {
                println!("      -> {recommendation}");
            }
        }
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Unit::Grams, 1.5, 150.0), "150g");
        assert_eq!(format_amount(Unit::Count, 2.0, 100.0), "2 unit (100g)");
        assert_eq!(format_amount(Unit::Count, 1.5, 75.0), "1.5 unit (75g)");
    }

    #[test]
    fn test_json_error() {
        let s = json_error("Plan \"x\" not found");
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["error"], "Plan \"x\" not found");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert!((no_neg_zero(5.0) - 5.0).abs() < f64::EPSILON);
    }
}
