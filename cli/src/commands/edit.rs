use anyhow::{Context, Result, bail};
use std::io::{self, BufRead, Write};

use mealprep_core::editor::PlanEditor;
use mealprep_core::models::{BaseIngredient, Meal, validate_meal};
use mealprep_core::service::PlannerService;

use super::helpers::{print_ingredient_table, print_summary};

const HELP: &str = "\
Commands:
  add <meal> <id>                 add an ingredient (again to add one more)
  amount <meal> <id> <amount>     grams, or units for count-based items
  serving <meal> <id> <name>      switch to a named serving size
  remove <meal> <id>              remove an ingredient
  match-dinner on|off             keep dinner identical to lunch
  name <text>                     rename the plan
  target <kcal>                   daily calorie target
  macros <protein%> <fat%>        macro split, carbs take the rest
  find [text]                     search the ingredient library
  template <meal> <template-id>   add a meal template's ingredients
  save-template <meal> <name>     keep a meal as a custom template
  undo | redo                     step through edit history
  show                            print the plan
  save | save-baseline            write the plan or the baseline
  quit                            leave the session";

#[derive(Debug, Clone, PartialEq)]
enum EditCommand {
    Add { meal: Meal, id: i64 },
    Amount { meal: Meal, id: i64, amount: f64 },
    Serving { meal: Meal, id: i64, serving: String },
    Remove { meal: Meal, id: i64 },
    MatchDinner(bool),
    Name(String),
    Target(i64),
    Macros { protein: i64, fat: i64 },
    Find(Option<String>),
    Template { meal: Meal, id: String },
    SaveTemplate { meal: Meal, name: String },
    Undo,
    Redo,
    Show,
    Save,
    SaveBaseline,
    Help,
    Quit,
}

fn parse_id(s: Option<&str>) -> Result<i64> {
    let s = s.context("Missing ingredient id")?;
    s.parse()
        .with_context(|| format!("Invalid ingredient id: '{s}'"))
}

fn parse_meal(s: Option<&str>) -> Result<Meal> {
    validate_meal(s.context("Missing meal")?)
}

fn parse_int(s: Option<&str>, what: &str) -> Result<i64> {
    let s = s.with_context(|| format!("Missing {what}"))?;
    s.trim_end_matches('%')
        .parse()
        .with_context(|| format!("Invalid {what}: '{s}'"))
}

fn rest(words: &[&str]) -> Option<String> {
    let joined = words.join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn parse_command(line: &str) -> Result<EditCommand> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        bail!("Empty command");
    };
    let arg = |i: usize| args.get(i).copied();

    let cmd = match verb.to_lowercase().as_str() {
        "add" => EditCommand::Add {
            meal: parse_meal(arg(0))?,
            id: parse_id(arg(1))?,
        },
        "amount" => {
            let raw = arg(2).context("Missing amount")?;
            let amount: f64 = raw
                .trim_end_matches('g')
                .parse()
                .with_context(|| format!("Invalid amount: '{raw}'"))?;
            EditCommand::Amount {
                meal: parse_meal(arg(0))?,
                id: parse_id(arg(1))?,
                amount,
            }
        }
        "serving" => EditCommand::Serving {
            meal: parse_meal(arg(0))?,
            id: parse_id(arg(1))?,
            serving: rest(args.get(2..).unwrap_or_default()).context("Missing serving name")?,
        },
        "remove" | "rm" => EditCommand::Remove {
            meal: parse_meal(arg(0))?,
            id: parse_id(arg(1))?,
        },
        "match-dinner" => match arg(0) {
            Some("on") => EditCommand::MatchDinner(true),
            Some("off") => EditCommand::MatchDinner(false),
            _ => bail!("Use 'match-dinner on' or 'match-dinner off'"),
        },
        "name" => EditCommand::Name(rest(args).context("Missing plan name")?),
        "target" => EditCommand::Target(parse_int(arg(0), "calorie target")?),
        "macros" => EditCommand::Macros {
            protein: parse_int(arg(0), "protein percentage")?,
            fat: parse_int(arg(1), "fat percentage")?,
        },
        "find" => EditCommand::Find(rest(args)),
        "template" => EditCommand::Template {
            meal: parse_meal(arg(0))?,
            id: arg(1).context("Missing template id")?.to_string(),
        },
        "save-template" => EditCommand::SaveTemplate {
            meal: parse_meal(arg(0))?,
            name: rest(args.get(1..).unwrap_or_default()).context("Missing template name")?,
        },
        "undo" => EditCommand::Undo,
        "redo" => EditCommand::Redo,
        "show" => EditCommand::Show,
        "save" => EditCommand::Save,
        "save-baseline" => EditCommand::SaveBaseline,
        "help" | "?" => EditCommand::Help,
        "quit" | "exit" | "q" => EditCommand::Quit,
        other => bail!("Unknown command '{other}'. Type 'help' for a list."),
    };
    Ok(cmd)
}

fn show(editor: &PlanEditor) {
    let mut title = editor.name().to_string();
    if editor.is_dirty() {
        title.push_str(" (unsaved)");
    }
    print_summary(&title, &editor.summary());
    let pct = editor.percentages();
    println!(
        "  SPLIT: P {}% / F {}% / C {}%{}",
        pct.protein,
        pct.fat,
        pct.carbs,
        if editor.match_dinner() {
            " | dinner mirrors lunch"
        } else {
            ""
        }
    );
}

enum Flow {
    Continue,
    Quit,
}

fn apply(svc: &PlannerService, editor: &mut PlanEditor, cmd: EditCommand) -> Result<Flow> {
    match cmd {
        EditCommand::Add { meal, id } => {
            editor.add_ingredient(meal, id)?;
            svc.note_recent(id)?;
            if editor.match_dinner() && meal == Meal::Lunch {
                println!("Added {id} to lunch and dinner");
            } else {
                println!("Added {id} to {meal}");
            }
        }
        EditCommand::Amount { meal, id, amount } => {
            editor.update_amount(meal, id, amount)?;
            println!("Updated {id} in {meal}");
        }
        EditCommand::Serving { meal, id, serving } => {
            editor.update_serving(meal, id, &serving)?;
            println!("Set {id} in {meal} to {serving}");
        }
        EditCommand::Remove { meal, id } => {
            editor.remove_ingredient(meal, id)?;
            println!("Removed {id} from {meal}");
        }
        EditCommand::MatchDinner(on) => {
            editor.set_match_dinner(on);
            println!("Match dinner {}", if on { "on" } else { "off" });
        }
        EditCommand::Name(name) => {
            editor.set_name(&name);
            println!("Renamed to {}", editor.name());
        }
        EditCommand::Target(kcal) => {
            editor.set_calorie_target(kcal)?;
            println!("Calorie target set to {kcal}");
        }
        EditCommand::Macros { protein, fat } => {
            editor.set_macro_split(protein, fat)?;
            let pct = editor.percentages();
            println!(
                "Macro split set to P {}% / F {}% / C {}%",
                pct.protein, pct.fat, pct.carbs
            );
        }
        EditCommand::Find(query) => {
            let library = editor.library();
            let items: Vec<&BaseIngredient> = match query.as_deref() {
                Some(q) => library.search(q),
                None => library.iter().collect(),
            };
            if items.is_empty() {
                println!("No ingredients found");
            } else {
                print_ingredient_table(&items, &svc.favorite_ingredients());
            }
        }
        EditCommand::Template { meal, id } => {
            let template = svc.find_template(&id)?;
            let missing = editor.apply_template(meal, &template)?;
            println!("Added {} to {meal}", template.name);
            if !missing.is_empty() {
                eprintln!("Not in your library: {}", missing.join(", "));
            }
        }
        EditCommand::SaveTemplate { meal, name } => {
            let template = svc.save_template(editor, meal, &name, "")?;
            println!("Saved template {} ({})", template.name, template.id);
        }
        EditCommand::Undo => {
            if !editor.undo() {
                println!("Nothing to undo");
            }
        }
        EditCommand::Redo => {
            if !editor.redo() {
                println!("Nothing to redo");
            }
        }
        EditCommand::Show => show(editor),
        EditCommand::Save => {
            let plan = svc.save_editor(editor)?;
            println!("Saved plan {} ({})", plan.name, plan.id);
        }
        EditCommand::SaveBaseline => {
            svc.save_baseline(editor)?;
            println!("Saved baseline");
        }
        EditCommand::Help => println!("{HELP}"),
        EditCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// Drive an editing session from `input` until `quit` or end of input.
/// Errors are reported and the session continues. Quitting with unsaved
/// changes needs a second `quit`.
fn run_session<R: BufRead>(svc: &PlannerService, editor: &mut PlanEditor, input: R) -> Result<()> {
    let mut confirm_quit = false;
    let mut lines = input.lines();

    loop {
        eprint!("{}> ", if editor.is_dirty() { "*" } else { "" });
        io::stderr().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }

        let flow = parse_command(&line).and_then(|cmd| {
            let quitting = cmd == EditCommand::Quit;
            if quitting && editor.is_dirty() && !confirm_quit {
                confirm_quit = true;
                eprintln!("Unsaved changes. Type 'save' or 'quit' again to discard them.");
                return Ok(Flow::Continue);
            }
            confirm_quit = false;
            apply(svc, editor, cmd)
        });
        match flow {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("Error: {e:#}"),
        }
    }

    if editor.is_dirty() {
        eprintln!("Discarded unsaved changes");
    }
    Ok(())
}

pub(crate) fn cmd_edit(svc: &PlannerService, plan_id: Option<&str>) -> Result<()> {
    let mut editor = match plan_id {
        Some(id) => svc.open_plan(id)?,
        None => svc.new_editor()?,
    };

    let who = svc
        .identity()
        .map_or_else(|| "guest".to_string(), ToString::to_string);
    eprintln!(
        "Editing '{}' as {who}. Type 'help' for commands.",
        editor.name()
    );
    show(&editor);
    if svc.preferences()?.show_recent_ingredients {
        let library = svc.library();
        let recent: Vec<String> = svc
            .recent_ingredients()
            .into_iter()
            .filter_map(|id| library.get(id))
            .map(|i| format!("[{}] {}", i.id, i.name))
            .collect();
        if !recent.is_empty() {
            eprintln!("Recent: {}", recent.join(", "));
        }
    }

    let stdin = io::stdin();
    run_session(svc, &mut editor, stdin.lock())
}
