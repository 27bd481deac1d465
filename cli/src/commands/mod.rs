mod account;
mod edit;
mod helpers;
mod ingredient;
mod lookup;
mod plan;
mod settings;
mod template;

pub(crate) use account::{cmd_signin, cmd_signout, cmd_whoami};
pub(crate) use edit::cmd_edit;
pub(crate) use ingredient::{
    cmd_ingredient_add, cmd_ingredient_dedupe, cmd_ingredient_favorite, cmd_ingredient_import_csv,
    cmd_ingredient_import_json, cmd_ingredient_list, cmd_ingredient_recent, cmd_ingredient_remove,
    cmd_ingredient_show,
};
pub(crate) use lookup::cmd_lookup;
pub(crate) use plan::{cmd_baseline_show, cmd_plan_delete, cmd_plan_list, cmd_plan_show};
pub(crate) use settings::{cmd_prefs_set, cmd_prefs_show, cmd_profile_set, cmd_profile_show};
pub(crate) use template::{cmd_template_delete, cmd_template_list};
