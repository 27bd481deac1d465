//! Routes plan, baseline, preference and custom-ingredient operations to local storage
//! for guests and to the remote store for signed-in users. Every remote
//! update or removal is preceded by an ownership check.

use anyhow::{Result, bail};
use thiserror::Error;
use tracing::warn;

use crate::library::next_custom_id;
use crate::models::{
    BaseIngredient, Baseline, CUSTOM_ID_START, Identity, Plan, PlanPatch, UserPreferences,
    validate_ingredient,
};
use crate::remote::RemoteStore;
use crate::storage::LocalStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Plan {id} not found")]
    PlanNotFound { id: String },
    #[error("Plan {id} belongs to another user")]
    NotOwner { id: String },
    #[error("Ingredient {id} is a standard ingredient and cannot be changed")]
    StandardIngredient { id: i64 },
}

pub struct PlanPersistence<'a> {
    local: &'a LocalStore,
    remote: &'a dyn RemoteStore,
}

impl<'a> PlanPersistence<'a> {
    pub fn new(local: &'a LocalStore, remote: &'a dyn RemoteStore) -> Self {
        Self { local, remote }
    }

    fn ensure_owner(&self, identity: &Identity, id: &str) -> Result<Plan> {
        let Some(plan) = self.remote.get_plan(id)? else {
            return Err(PersistenceError::PlanNotFound { id: id.to_string() }.into());
        };
        if plan.owner.as_deref() != Some(identity.as_str()) {
            warn!(
                plan_id = id,
                identity = %identity,
                "rejected access to plan owned by another user"
            );
            return Err(PersistenceError::NotOwner { id: id.to_string() }.into());
        }
        Ok(plan)
    }

    // --- Plans ---

    pub fn load_plans(&self, identity: Option<&Identity>) -> Result<Vec<Plan>> {
        match identity {
            Some(identity) => self.remote.load_plans(identity),
            None => Ok(self.local.guest_plans()),
        }
    }

    /// A single plan, which for signed-in users must be their own.
    pub fn get_plan(&self, identity: Option<&Identity>, id: &str) -> Result<Plan> {
        match identity {
            Some(identity) => self.ensure_owner(identity, id),
            None => self
                .local
                .guest_plan(id)
                .ok_or_else(|| PersistenceError::PlanNotFound { id: id.to_string() }.into()),
        }
    }

    pub fn add_plan(&self, identity: Option<&Identity>, plan: &Plan) -> Result<Vec<Plan>> {
        match identity {
            Some(identity) => self.remote.add_plan(identity, plan),
            None => self.local.add_guest_plan(plan),
        }
    }

    pub fn update_plan(
        &self,
        identity: Option<&Identity>,
        id: &str,
        patch: &PlanPatch,
    ) -> Result<Vec<Plan>> {
        match identity {
            Some(identity) => {
                self.ensure_owner(identity, id)?;
                self.remote.update_plan(identity, id, patch)
            }
            None => self
                .local
                .update_guest_plan(id, patch)?
                .ok_or_else(|| PersistenceError::PlanNotFound { id: id.to_string() }.into()),
        }
    }

    pub fn remove_plan(&self, identity: Option<&Identity>, id: &str) -> Result<Vec<Plan>> {
        match identity {
            Some(identity) => {
                self.ensure_owner(identity, id)?;
                self.remote.remove_plan(identity, id)
            }
            None => self
                .local
                .remove_guest_plan(id)?
                .ok_or_else(|| PersistenceError::PlanNotFound { id: id.to_string() }.into()),
        }
    }

    // --- Baseline ---

    pub fn load_baseline(&self, identity: Option<&Identity>) -> Result<Option<Baseline>> {
        match identity {
            Some(identity) => self.remote.load_baseline(identity),
            None => Ok(self.local.guest_baseline()),
        }
    }

    pub fn save_baseline(&self, identity: Option<&Identity>, baseline: &Baseline) -> Result<()> {
        let baseline = Baseline {
            target_percentages: baseline.target_percentages.canonical(),
            ..baseline.clone()
        };
        match identity {
            Some(identity) => self.remote.save_baseline(identity, &baseline),
            None => self.local.save_guest_baseline(&baseline),
        }
    }

    // --- Preferences ---

    /// Stored preferences, or the defaults if none were saved.
    pub fn load_preferences(&self, identity: Option<&Identity>) -> Result<UserPreferences> {
        let stored = match identity {
            Some(identity) => self.remote.load_preferences(identity)?,
            None => self.local.guest_preferences(),
        };
        Ok(stored.unwrap_or_default())
    }

    pub fn save_preferences(
        &self,
        identity: Option<&Identity>,
        preferences: &UserPreferences,
    ) -> Result<()> {
        match identity {
            Some(identity) => self.remote.save_preferences(identity, preferences),
            None => self.local.save_guest_preferences(preferences),
        }
    }

    // --- Custom ingredients ---

    /// The device copy is the working list. Signing in merges the remote
    /// list into it.
    #[must_use]
    pub fn load_custom_ingredients(&self) -> Vec<BaseIngredient> {
        self.local.custom_ingredients()
    }

    /// Write the list to the device and, when signed in, to the remote store.
    pub fn save_custom_ingredients(
        &self,
        identity: Option<&Identity>,
        items: &[BaseIngredient],
    ) -> Result<()> {
        self.local.save_custom_ingredients(items)?;
        if let Some(identity) = identity {
            self.remote.save_custom_ingredients(identity, items)?;
        }
        Ok(())
    }

    /// Add a new custom ingredient under a fresh id. Returns the stored item.
    pub fn add_custom_ingredient(
        &self,
        identity: Option<&Identity>,
        ingredient: &BaseIngredient,
    ) -> Result<BaseIngredient> {
        validate_ingredient(ingredient)?;
        let mut items = self.load_custom_ingredients();
        let stored = BaseIngredient {
            id: next_custom_id(&items),
            ..ingredient.clone()
        };
        items.push(stored.clone());
        self.save_custom_ingredients(identity, &items)?;
        Ok(stored)
    }

    /// Add several ingredients in one write, each under its own fresh id.
    /// Invalid items are skipped and logged.
    pub fn add_custom_ingredients(
        &self,
        identity: Option<&Identity>,
        ingredients: &[BaseIngredient],
    ) -> Result<Vec<BaseIngredient>> {
        let mut items = self.load_custom_ingredients();
        let mut stored = Vec::with_capacity(ingredients.len());
        for ingredient in ingredients {
            if let Err(e) = validate_ingredient(ingredient) {
                warn!(name = %ingredient.name, error = %e, "skipping invalid ingredient");
                continue;
            }
            let item = BaseIngredient {
                id: next_custom_id(&items),
                ..ingredient.clone()
            };
            items.push(item.clone());
            stored.push(item);
        }
        if !stored.is_empty() {
            self.save_custom_ingredients(identity, &items)?;
        }
        Ok(stored)
    }

    /// Replace the custom ingredient with the same id, or append it.
    pub fn upsert_custom_ingredient(
        &self,
        identity: Option<&Identity>,
        ingredient: &BaseIngredient,
    ) -> Result<Vec<BaseIngredient>> {
        if ingredient.id < CUSTOM_ID_START {
            return Err(PersistenceError::StandardIngredient { id: ingredient.id }.into());
        }
        validate_ingredient(ingredient)?;
        let mut items = self.load_custom_ingredients();
        match items.iter_mut().find(|i| i.id == ingredient.id) {
            Some(existing) => *existing = ingredient.clone(),
            None => items.push(ingredient.clone()),
        }
        self.save_custom_ingredients(identity, &items)?;
        Ok(items)
    }

    pub fn remove_custom_ingredient(
        &self,
        identity: Option<&Identity>,
        id: i64,
    ) -> Result<Vec<BaseIngredient>> {
        if id < CUSTOM_ID_START {
            return Err(PersistenceError::StandardIngredient { id }.into());
        }
        let mut items = self.load_custom_ingredients();
        let before = items.len();
        items.retain(|i| i.id != id);
        if items.len() == before {
            bail!("Custom ingredient {id} not found");
        }
        self.save_custom_ingredients(identity, &items)?;
        Ok(items)
    }
}
