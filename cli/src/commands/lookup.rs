use anyhow::Result;
use std::process;

use mealprep_core::service::{NutritionLookup, PlannerService};

use super::helpers::{json_error, print_candidate_table, prompt_choice};

/// Search the nutrition provider by name. With `add`, the chosen match is
/// stored as a custom ingredient with the nutrition it was listed with.
pub(crate) fn cmd_lookup(
    svc: &PlannerService,
    provider: &dyn NutritionLookup,
    text: &str,
    add: bool,
    json: bool,
) -> Result<()> {
    let candidates = provider.search_by_name(text)?;

    if candidates.is_empty() {
        if json {
            println!("{}", json_error(&format!("No matches for '{text}'")));
        } else {
            eprintln!("No matches for '{text}'");
        }
        process::exit(2);
    }

    if !add {
        if json {
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        } else {
            print_candidate_table(&candidates);
        }
        return Ok(());
    }

    let chosen = if candidates.len() == 1 || json {
        &candidates[0]
    } else {
        print_candidate_table(&candidates);
        &candidates[prompt_choice(candidates.len())?]
    };

    let Some(ingredient) = svc.add_candidate(chosen)? else {
        if json {
            println!(
                "{}",
                json_error(&format!("No nutrition data for '{}'", chosen.name))
            );
        } else {
            eprintln!("No nutrition data for '{}'", chosen.name);
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        let name = &ingredient.name;
        let id = ingredient.id;
        let cal = ingredient.calories;
        println!("Added ingredient: {name} (id: {id}, {cal:.0} kcal per 100g)");
    }

    Ok(())
}
