use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::models::{BaseIngredient, Baseline, Identity, Plan, PlanPatch, UserPreferences};

/// The authoritative per-user store. Ownership is not checked here; callers
/// go through [`PlanPersistence`](crate::persistence::PlanPersistence).
pub trait RemoteStore {
    fn load_plans(&self, identity: &Identity) -> Result<Vec<Plan>>;
    /// Fetch a plan regardless of owner.
    fn get_plan(&self, id: &str) -> Result<Option<Plan>>;
    fn add_plan(&self, identity: &Identity, plan: &Plan) -> Result<Vec<Plan>>;
    fn update_plan(&self, identity: &Identity, id: &str, patch: &PlanPatch) -> Result<Vec<Plan>>;
    fn remove_plan(&self, identity: &Identity, id: &str) -> Result<Vec<Plan>>;
    fn load_baseline(&self, identity: &Identity) -> Result<Option<Baseline>>;
    fn save_baseline(&self, identity: &Identity, baseline: &Baseline) -> Result<()>;
    fn load_custom_ingredients(&self, identity: &Identity) -> Result<Vec<BaseIngredient>>;
    fn save_custom_ingredients(&self, identity: &Identity, items: &[BaseIngredient]) -> Result<()>;
    /// `None` if the user never saved preferences.
    fn load_preferences(&self, identity: &Identity) -> Result<Option<UserPreferences>>;
    fn save_preferences(&self, identity: &Identity, preferences: &UserPreferences) -> Result<()>;
}

/// Drop every `null` object field, recursively.
#[must_use]
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// Serialize `value` for the remote store with nulls removed.
pub fn to_payload<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value).context("Failed to encode payload")?;
    Ok(strip_nulls(json).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_nulls_nested() {
        let v = json!({
            "a": 1,
            "b": null,
            "c": {"d": null, "e": [ {"f": null, "g": 2}, null ]}
        });
        assert_eq!(
            strip_nulls(v),
            json!({"a": 1, "c": {"e": [ {"g": 2}, null ]}})
        );
    }

    #[test]
    fn test_to_payload() {
        #[derive(Serialize)]
        struct Thing {
            name: &'static str,
            note: Option<String>,
        }
        let payload = to_payload(&Thing {
            name: "x",
            note: None,
        })
        .unwrap();
        assert_eq!(payload, r#"{"name":"x"}"#);
    }
}
