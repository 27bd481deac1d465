use anyhow::Result;
use serde_json::json;
use std::process;

use mealprep_core::persistence::PersistenceError;
use mealprep_core::service::PlannerService;

use super::helpers::{json_error, print_plan_table, print_summary};

/// Exit 2 for a plan that does not exist or is not ours, mirroring the
/// not-found handling of the other read commands.
fn exit_if_missing<T>(result: Result<T>, json: bool) -> Result<T> {
    match result {
        Err(e) if e.downcast_ref::<PersistenceError>().is_some() => {
            if json {
                println!("{}", json_error(&e.to_string()));
            } else {
                eprintln!("{e}");
            }
            process::exit(2);
        }
        other => other,
    }
}

pub(crate) fn cmd_plan_list(svc: &PlannerService, json: bool) -> Result<()> {
    let plans = svc.list_plans()?;

    if plans.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No saved plans");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
    } else {
        print_plan_table(&plans);
    }

    Ok(())
}

pub(crate) fn cmd_plan_show(svc: &PlannerService, id: &str, json: bool) -> Result<()> {
    let plan = exit_if_missing(svc.get_plan(id), json)?;
    let editor = svc.open_plan(id)?;
    let summary = editor.summary();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"plan": plan, "summary": summary}))?
        );
    } else {
        let name = &plan.name;
        print_summary(name, &summary);
        if plan.match_dinner {
            println!("\n  Dinner mirrors lunch.");
        }
    }

    Ok(())
}

pub(crate) fn cmd_plan_delete(svc: &PlannerService, id: &str, json: bool) -> Result<()> {
    let remaining = exit_if_missing(svc.delete_plan(id), json)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"deleted": id, "remaining": remaining.len()}))?
        );
    } else {
        println!("Deleted plan {id}");
    }

    Ok(())
}

pub(crate) fn cmd_baseline_show(svc: &PlannerService, json: bool) -> Result<()> {
    let Some(baseline) = svc.load_baseline()? else {
        if json {
            println!("null");
        } else {
            eprintln!("No baseline saved. Use `mealprep edit` and `save-baseline` to create one.");
        }
        process::exit(2);
    };
    let summary = svc.new_editor()?.summary();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"baseline": baseline, "summary": summary}))?
        );
    } else {
        print_summary("Baseline", &summary);
    }

    Ok(())
}
