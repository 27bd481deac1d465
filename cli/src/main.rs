mod commands;
mod config;
mod openfoodfacts;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{
    cmd_baseline_show, cmd_edit, cmd_ingredient_add, cmd_ingredient_dedupe,
    cmd_ingredient_favorite, cmd_ingredient_import_csv, cmd_ingredient_import_json,
    cmd_ingredient_list, cmd_ingredient_recent, cmd_ingredient_remove, cmd_ingredient_show,
    cmd_lookup, cmd_plan_delete, cmd_plan_list, cmd_plan_show, cmd_prefs_set, cmd_prefs_show,
    cmd_profile_set, cmd_profile_show, cmd_signin, cmd_signout, cmd_template_delete,
    cmd_template_list, cmd_whoami,
};
use crate::config::Config;
use crate::openfoodfacts::OpenFoodFactsClient;
use mealprep_core::models::{Meal, validate_meal};
use mealprep_core::service::PlannerService;

#[derive(Parser)]
#[command(
    name = "mealprep",
    version,
    about = "A local-first meal prep planner",
    long_about = "Plan a day of meals from a library of ingredients, track calories and \
                  macros against a target, and keep plans on this device or in your account."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the ingredient library
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Search `OpenFoodFacts` for an ingredient
    Lookup {
        /// Food name to search for
        text: String,
        /// Store the chosen match as a custom ingredient
        #[arg(long)]
        add: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage saved plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Inspect the baseline new plans start from
    Baseline {
        #[command(subcommand)]
        command: BaselineCommands,
    },
    /// Browse and manage meal templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Show or change display preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },
    /// Bodyweight used to check protein and fat targets
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Open an interactive editing session (new plan if no ID is given)
    Edit {
        /// Plan ID to edit
        plan_id: Option<String>,
    },
    /// Sign in, moving guest data into the account
    Signin {
        /// Account identity
        identity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign out and continue as guest
    Signout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show who is signed in
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add a custom ingredient
    Add {
        /// Ingredient name
        name: String,
        /// Calories per reference amount
        #[arg(long)]
        calories: f64,
        /// Protein per reference amount
        #[arg(long)]
        protein: Option<f64>,
        /// Carbs per reference amount
        #[arg(long)]
        carbs: Option<f64>,
        /// Fat per reference amount
        #[arg(long)]
        fat: Option<f64>,
        /// Reference amount in grams (default 100, or the weight of one unit)
        #[arg(long)]
        grams: Option<f64>,
        /// Measure by weight ("g") or by count ("unit")
        #[arg(long, default_value = "g")]
        unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List or search the library
    List {
        /// Search query to filter ingredients
        #[arg(short, long)]
        search: Option<String>,
        /// Only custom ingredients
        #[arg(long)]
        custom: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one ingredient with its serving sizes
    Show {
        /// Ingredient ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a custom ingredient
    Remove {
        /// Ingredient ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import ingredients from a CSV file (name,grams,calories,protein,carbs,fat[,unit])
    ImportCsv {
        /// Path to the CSV file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import ingredients from a JSON array
    ImportJson {
        /// Path to the JSON file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle an ingredient as favorite
    Favorite {
        /// Ingredient ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recently used ingredients
    Recent {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove custom ingredients whose name repeats an earlier one
    Dedupe {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List predefined and saved templates
    List {
        /// Only templates for this meal
        #[arg(long, value_parser = parse_meal_arg)]
        meal: Option<Meal>,
        /// Only templates saved on this device
        #[arg(long)]
        custom: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a saved template
    Delete {
        /// Template ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PrefsCommands {
    /// Show current preferences
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change preferences
    Set {
        /// List recently used ingredients when an edit session starts
        #[arg(long, value_parser = parse_on_off)]
        show_recent: Option<bool>,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the saved bodyweight
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a bodyweight
    Set {
        /// Bodyweight
        weight: f64,
        /// "metric" (kg) or "imperial" (lb)
        #[arg(long, default_value = "metric")]
        units: String,
    },
}

fn parse_meal_arg(s: &str) -> Result<Meal, String> {
    validate_meal(s).map_err(|e| e.to_string())
}

fn parse_on_off(s: &str) -> Result<bool, String> {
    match s {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => Err(format!("expected 'on' or 'off', got '{other}'")),
    }
}

#[derive(Subcommand)]
enum PlanCommands {
    /// List saved plans
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a plan with per-meal nutrition
    Show {
        /// Plan ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a plan
    Delete {
        /// Plan ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum BaselineCommands {
    /// Show the saved baseline
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    // stderr keeps --json output on stdout machine-readable
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mealprep=warn,mealprep_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut svc = PlannerService::new(&config.local_db_path, &config.remote_db_path)?
        .with_max_history(config.max_history);

    match cli.command {
        Commands::Ingredient { command } => match command {
            IngredientCommands::Add {
                name,
                calories,
                protein,
                carbs,
                fat,
                grams,
                unit,
                json,
            } => cmd_ingredient_add(
                &svc, &name, &unit, grams, calories, protein, carbs, fat, json,
            ),
            IngredientCommands::List {
                search,
                custom,
                json,
            } => cmd_ingredient_list(&svc, search.as_deref(), custom, json),
            IngredientCommands::Show { id, json } => cmd_ingredient_show(&svc, id, json),
            IngredientCommands::Remove { id, json } => cmd_ingredient_remove(&svc, id, json),
            IngredientCommands::ImportCsv { file, json } => {
                cmd_ingredient_import_csv(&svc, &file, json)
            }
            IngredientCommands::ImportJson { file, json } => {
                cmd_ingredient_import_json(&svc, &file, json)
            }
            IngredientCommands::Favorite { id, json } => cmd_ingredient_favorite(&svc, id, json),
            IngredientCommands::Recent { json } => cmd_ingredient_recent(&svc, json),
            IngredientCommands::Dedupe { json } => cmd_ingredient_dedupe(&svc, json),
        },
        Commands::Lookup { text, add, json } => {
            let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            let off = OpenFoodFactsClient::new(rt.handle().clone())?;
            cmd_lookup(&svc, &off, &text, add, json)
        }
        Commands::Plan { command } => match command {
            PlanCommands::List { json } => cmd_plan_list(&svc, json),
            PlanCommands::Show { id, json } => cmd_plan_show(&svc, &id, json),
            PlanCommands::Delete { id, json } => cmd_plan_delete(&svc, &id, json),
        },
        Commands::Baseline { command } => match command {
            BaselineCommands::Show { json } => cmd_baseline_show(&svc, json),
        },
        Commands::Template { command } => match command {
            TemplateCommands::List { meal, custom, json } => {
                cmd_template_list(&svc, meal, custom, json)
            }
            TemplateCommands::Delete { id, json } => cmd_template_delete(&svc, &id, json),
        },
        Commands::Prefs { command } => match command {
            PrefsCommands::Show { json } => cmd_prefs_show(&svc, json),
            PrefsCommands::Set { show_recent } => cmd_prefs_set(&svc, show_recent),
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(&svc, json),
            ProfileCommands::Set { weight, units } => cmd_profile_set(&svc, weight, &units),
        },
        Commands::Edit { plan_id } => cmd_edit(&svc, plan_id.as_deref()),
        Commands::Signin { identity, json } => cmd_signin(&mut svc, &identity, json),
        Commands::Signout { json } => cmd_signout(&mut svc, json),
        Commands::Whoami { json } => cmd_whoami(&svc, json),
    }
}
