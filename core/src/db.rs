use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Local;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{BaseIngredient, Baseline, Identity, Plan, PlanPatch, UserPreferences};
use crate::normalize::normalize_json;
use crate::remote::{RemoteStore, to_payload};
use crate::storage::{KeyValueStore, StorageError};

/// SQLite-backed storage. One file serves as the device's key-value store,
/// another as the remote plan store; both use this type.
pub struct Database {
    conn: Connection,
}

struct PlanRow {
    id: String,
    owner: String,
    body: String,
    created_at: String,
    updated_at: String,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS plans (
                    id TEXT PRIMARY KEY,
                    owner TEXT NOT NULL,
                    name TEXT NOT NULL,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_plans_owner ON plans(owner);

                CREATE TABLE IF NOT EXISTS baselines (
                    owner TEXT PRIMARY KEY,
                    body TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS custom_ingredients (
                    owner TEXT PRIMARY KEY,
                    body TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 2;",
            )?;
        }

        if version < 3 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS preferences (
                    owner TEXT PRIMARY KEY,
                    body TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 3;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    // Expects columns: 0: id, 1: owner, 2: body, 3: created_at, 4: updated_at
    fn plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<PlanRow> {
        Ok(PlanRow {
            id: row.get(0)?,
            owner: row.get(1)?,
            body: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn decode_plan(row: PlanRow) -> Result<Plan> {
        let mut plan: Plan = serde_json::from_str(&row.body)
            .with_context(|| format!("Corrupt plan {}", row.id))?;
        plan.id = row.id;
        plan.owner = Some(row.owner);
        plan.created_at = Some(row.created_at);
        plan.updated_at = Some(row.updated_at);
        Ok(plan)
    }

    fn write_plan_body(&self, id: &str, plan: &Plan) -> Result<()> {
        let stored = Plan {
            target_percentages: plan.target_percentages.canonical(),
            ..plan.without_guest_fields()
        };
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE plans SET name = ?1, body = ?2, updated_at = ?3 WHERE id = ?4",
            params![stored.name, to_payload(&stored)?, now, id],
        )?;
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read {key}"))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let result = self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::DiskFull => {
                Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                }
                .into())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to write {key}")),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl RemoteStore for Database {
    fn load_plans(&self, identity: &Identity) -> Result<Vec<Plan>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner, body, created_at, updated_at FROM plans
             WHERE owner = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![identity.as_str()], Self::plan_from_row)?;
        let mut plans = Vec::new();
        for row in rows {
            plans.push(Self::decode_plan(row?)?);
        }
        Ok(plans)
    }

    fn get_plan(&self, id: &str) -> Result<Option<Plan>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, owner, body, created_at, updated_at FROM plans WHERE id = ?1",
                params![id],
                Self::plan_from_row,
            )
            .optional()?;
        row.map(Self::decode_plan).transpose()
    }

    fn add_plan(&self, identity: &Identity, plan: &Plan) -> Result<Vec<Plan>> {
        let id = Uuid::new_v4().to_string();
        let now = Local::now().to_rfc3339();
        let stored = Plan {
            target_percentages: plan.target_percentages.canonical(),
            ..plan.without_guest_fields()
        };
        self.conn.execute(
            "INSERT INTO plans (id, owner, name, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                identity.as_str(),
                stored.name,
                to_payload(&stored)?,
                now,
                now
            ],
        )?;
        self.load_plans(identity)
    }

    fn update_plan(&self, identity: &Identity, id: &str, patch: &PlanPatch) -> Result<Vec<Plan>> {
        let Some(mut plan) = self.get_plan(id)? else {
            bail!("Plan {id} not found");
        };
        patch.apply(&mut plan);
        self.write_plan_body(id, &plan)?;
        self.load_plans(identity)
    }

    fn remove_plan(&self, identity: &Identity, id: &str) -> Result<Vec<Plan>> {
        self.conn
            .execute("DELETE FROM plans WHERE id = ?1", params![id])?;
        self.load_plans(identity)
    }

    fn load_baseline(&self, identity: &Identity) -> Result<Option<Baseline>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM baselines WHERE owner = ?1",
                params![identity.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).context("Corrupt baseline"))
            .transpose()
    }

    fn save_baseline(&self, identity: &Identity, baseline: &Baseline) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO baselines (owner, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![identity.as_str(), to_payload(baseline)?, now],
        )?;
        Ok(())
    }

    fn load_custom_ingredients(&self, identity: &Identity) -> Result<Vec<BaseIngredient>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM custom_ingredients WHERE owner = ?1",
                params![identity.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(body) = body else {
            return Ok(Vec::new());
        };
        let items: Vec<Value> =
            serde_json::from_str(&body).context("Corrupt custom ingredient list")?;
        Ok(items.into_iter().map(normalize_json).collect())
    }

    fn save_custom_ingredients(&self, identity: &Identity, items: &[BaseIngredient]) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO custom_ingredients (owner, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![identity.as_str(), to_payload(items)?, now],
        )?;
        Ok(())
    }

    fn load_preferences(&self, identity: &Identity) -> Result<Option<UserPreferences>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM preferences WHERE owner = ?1",
                params![identity.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).context("Corrupt preferences"))
            .transpose()
    }

    fn save_preferences(&self, identity: &Identity, preferences: &UserPreferences) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO preferences (owner, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![identity.as_str(), to_payload(preferences)?, now],
        )?;
        Ok(())
    }
}
