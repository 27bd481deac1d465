use anyhow::{Result, bail};
use serde_json::json;

use mealprep_core::models::{CalculatorProfile, UserPreferences};
use mealprep_core::service::PlannerService;

pub(crate) fn cmd_prefs_show(svc: &PlannerService, json: bool) -> Result<()> {
    let prefs = svc.preferences()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prefs)?);
    } else {
        let recent = if prefs.show_recent_ingredients { "on" } else { "off" };
        println!("Show recent ingredients: {recent}");
    }

    Ok(())
}

pub(crate) fn cmd_prefs_set(svc: &PlannerService, show_recent: Option<bool>) -> Result<()> {
    let Some(show_recent) = show_recent else {
        bail!("Nothing to change. Pass --show-recent on|off");
    };
    svc.set_preferences(&UserPreferences {
        show_recent_ingredients: show_recent,
    })?;
    println!("Preferences saved");
    Ok(())
}

fn parse_units(units: &str) -> Result<&'static str> {
    match units.trim().to_lowercase().as_str() {
        "metric" | "kg" => Ok("metric"),
        "imperial" | "lb" | "lbs" => Ok("imperial"),
        other => bail!("Invalid units '{other}'. Use 'metric' or 'imperial'"),
    }
}

pub(crate) fn cmd_profile_show(svc: &PlannerService, json: bool) -> Result<()> {
    let profile = svc.calculator_profile();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "profile": profile,
                "bodyweightLbs": profile.as_ref().and_then(CalculatorProfile::bodyweight_lbs),
            }))?
        );
        return Ok(());
    }

    match profile.as_ref().and_then(CalculatorProfile::bodyweight_lbs) {
        Some(lbs) => println!("Bodyweight: {lbs:.1} lb (used for macro checks)"),
        None => println!("No bodyweight saved; protein and fat are not checked against it"),
    }
    Ok(())
}

pub(crate) fn cmd_profile_set(svc: &PlannerService, weight: f64, units: &str) -> Result<()> {
    if !weight.is_finite() || weight <= 0.0 {
        bail!("Weight must be a positive number");
    }
    let units = parse_units(units)?;
    svc.save_calculator_profile(&CalculatorProfile {
        weight: Some(weight),
        units: Some(units.to_string()),
        saved_at: None,
    })?;
    println!("Saved bodyweight {weight} ({units})");
    Ok(())
}
