use anyhow::Result;
use serde_json::json;

use mealprep_core::models::Identity;
use mealprep_core::service::PlannerService;

pub(crate) fn cmd_signin(svc: &mut PlannerService, identity: &str, json: bool) -> Result<()> {
    let identity = Identity::new(identity)?;
    let summary = svc.sign_in(identity.clone())?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"identity": identity, "migration": summary}))?
        );
        return Ok(());
    }

    println!("Signed in as {identity}");
    if summary.migrated_anything() {
        let plans = summary.migrated_plans;
        let total = summary.total_guest_plans;
        let ingredients = summary.migrated_ingredients;
        println!(
            "Moved {plans} of {total} guest plan(s) and {ingredients} custom ingredient(s) \
             to your account"
        );
        if summary.migrated_baseline {
            println!("Moved your guest baseline");
        }
        if summary.migrated_preferences {
            println!("Moved your preferences");
        }
        if summary.failed_plans > 0 {
            let failed = summary.failed_plans;
            eprintln!("{failed} plan(s) could not be moved and stay on this device");
        }
        if summary.had_conflicts {
            println!("Your account already had plans; guest plans were added alongside them");
        }
    }

    Ok(())
}

pub(crate) fn cmd_signout(svc: &mut PlannerService, json: bool) -> Result<()> {
    let previous = svc.identity().cloned();
    let signed_out = svc.sign_out()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"signedOut": signed_out, "identity": previous}))?
        );
    } else if let Some(identity) = previous {
        println!("Signed out {identity}. Working as guest.");
    } else {
        println!("Not signed in");
    }

    Ok(())
}

pub(crate) fn cmd_whoami(svc: &PlannerService, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"identity": svc.identity()}))?
        );
    } else {
        match svc.identity() {
            Some(identity) => println!("Signed in as {identity}"),
            None => println!("Guest"),
        }
    }
    Ok(())
}
