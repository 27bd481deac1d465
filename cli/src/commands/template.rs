use anyhow::Result;
use serde_json::json;
use tabled::{Table, Tabled, settings::Style};

use mealprep_core::models::Meal;
use mealprep_core::service::PlannerService;
use mealprep_core::templates::MealTemplate;

use super::helpers::{json_error, truncate};

fn print_template_table(templates: &[MealTemplate]) {
    #[derive(Tabled)]
    struct TemplateRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Meal")]
        meal: Meal,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Items")]
        items: String,
    }

    let rows: Vec<TemplateRow> = templates
        .iter()
        .map(|t| TemplateRow {
            id: t.id.clone(),
            meal: t.meal,
            name: truncate(&t.name, 30),
            items: truncate(
                &t.items
                    .iter()
                    .map(|i| i.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                50,
            ),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn cmd_template_list(
    svc: &PlannerService,
    meal: Option<Meal>,
    custom_only: bool,
    json: bool,
) -> Result<()> {
    let templates: Vec<MealTemplate> = svc
        .templates(meal)
        .into_iter()
        .filter(|t| !custom_only || t.is_custom)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
    } else if templates.is_empty() {
        eprintln!("No templates found");
    } else {
        print_template_table(&templates);
    }

    Ok(())
}

pub(crate) fn cmd_template_delete(svc: &PlannerService, id: &str, json: bool) -> Result<()> {
    let deleted = svc.delete_template(id)?;

    if json {
        if deleted {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({"deleted": id}))?
            );
        } else {
            println!("{}", json_error(&format!("No custom template '{id}'")));
        }
    } else if deleted {
        println!("Deleted template {id}");
    } else {
        eprintln!("No custom template '{id}'");
    }

    if deleted {
        Ok(())
    } else {
        std::process::exit(2);
    }
}
