//! SQLite persistence layer for the model endpoint registry.
//!
//! Provides CRUD operations for endpoint records, the studio default flag,
//! and seeding from the endpoint catalog on first run.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use modelwatch_config::ModelCatalog;
use modelwatch_core::{ModelEndpoint, ModelEndpointId, ModelType};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};

use crate::services::model::validate;

const SELECT_COLUMNS: &str =
    "SELECT model_id, model_name, model_type, provider_model, api_base, api_key, is_default FROM models";

/// Initializes the database, creating tables if needed.
pub fn init_db(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent).context("failed to create db directory")?;
    }
    let conn = Connection::open(path).context("failed to open database")?;
    create_tables(&conn)?;
    info!("Database initialized at {}", path);
    Ok(conn)
}

/// Opens a private in-memory registry.
#[cfg(test)]
pub fn init_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    create_tables(&conn)?;
    Ok(conn)
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS models (
            model_id TEXT PRIMARY KEY,
            model_name TEXT NOT NULL,
            model_type TEXT NOT NULL,
            provider_model TEXT NOT NULL DEFAULT '',
            api_base TEXT,
            api_key TEXT NOT NULL DEFAULT '',
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );"
    ).context("failed to create table")?;
    Ok(())
}

fn row_to_model(row: &Row<'_>) -> rusqlite::Result<ModelEndpoint> {
    let model_type: String = row.get(2)?;
    let model_type: ModelType = model_type
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(ModelEndpoint {
        model_id: ModelEndpointId::new(row.get::<_, String>(0)?),
        model_name: row.get(1)?,
        model_type,
        provider_model: row.get(3)?,
        api_base: row.get(4)?,
        api_key: row.get(5)?,
        is_studio_default: row.get(6)?,
    })
}

/// Lists all registered models in registration order.
pub fn list_models(conn: &Connection) -> Result<Vec<ModelEndpoint>> {
    let mut stmt = conn
        .prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at, rowid"))
        .context("failed to prepare list query")?;
    let rows = stmt
        .query_map([], row_to_model)
        .context("failed to query models")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to read model row")
}

/// Gets a model by ID.
pub fn get_model(conn: &Connection, id: &ModelEndpointId) -> Result<Option<ModelEndpoint>> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE model_id = ?1"),
        params![id.as_str()],
        row_to_model,
    )
    .optional()
    .context("failed to load model")
}

/// Gets the studio default model, if one is set.
pub fn get_default_model(conn: &Connection) -> Result<Option<ModelEndpoint>> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE is_default = 1 LIMIT 1"),
        [],
        row_to_model,
    )
    .optional()
    .context("failed to load default model")
}

pub fn count_models(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM models", [], |r| r.get(0))
        .context("failed to count models")
}

/// Inserts a new model record. The default flag is applied separately.
pub fn insert_model(conn: &Connection, model: &ModelEndpoint) -> Result<()> {
    conn.execute(
        "INSERT INTO models (model_id, model_name, model_type, provider_model, api_base, api_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            model.model_id.as_str(),
            model.model_name,
            model.model_type.as_str(),
            model.provider_model,
            model.api_base,
            model.api_key,
        ],
    ).context("failed to insert model")?;
    info!("Registered model: {} ({})", model.model_name, model.model_id);
    Ok(())
}

/// Overwrites the editable fields of an existing model.
pub fn update_model(conn: &Connection, model: &ModelEndpoint) -> Result<()> {
    conn.execute(
        "UPDATE models
         SET model_name = ?2, provider_model = ?3, api_base = ?4, api_key = ?5, updated_at = datetime('now')
         WHERE model_id = ?1",
        params![
            model.model_id.as_str(),
            model.model_name,
            model.provider_model,
            model.api_base,
            model.api_key,
        ],
    ).context("failed to update model")?;
    info!("Updated model: {} ({})", model.model_name, model.model_id);
    Ok(())
}

/// Deletes a model by ID. Returns false if it did not exist.
pub fn delete_model(conn: &Connection, id: &ModelEndpointId) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM models WHERE model_id = ?1", params![id.as_str()])
        .context("failed to delete model")?;
    if deleted > 0 {
        info!("Deleted model: {}", id);
    }
    Ok(deleted > 0)
}

/// Makes `id` the only default model. Returns false if it does not exist.
pub fn set_default_model(conn: &Connection, id: &ModelEndpointId) -> Result<bool> {
    let tx = conn.unchecked_transaction().context("failed to begin transaction")?;
    let exists = tx
        .query_row("SELECT 1 FROM models WHERE model_id = ?1", params![id.as_str()], |_| Ok(()))
        .optional()
        .context("failed to look up model")?
        .is_some();
    if !exists {
        return Ok(false);
    }
    tx.execute("UPDATE models SET is_default = (model_id = ?1)", params![id.as_str()])
        .context("failed to set default model")?;
    tx.commit().context("failed to commit default model")?;
    info!("Default model set to {}", id);
    Ok(true)
}

/// Seeds the registry from the catalog if it is empty.
///
/// Seeds missing required fields are skipped. The first valid seed flagged
/// `is_studio_default` (or the first valid seed, if none is) becomes the
/// default. Returns how many models were inserted.
pub fn seed_models(conn: &Connection, catalog: &ModelCatalog) -> Result<usize> {
    let count = count_models(conn)?;
    if count > 0 {
        info!("Registry already has {} models, skipping seed", count);
        return Ok(0);
    }

    let mut seeds = Vec::new();
    for model in catalog.list() {
        if let Err(e) = validate(model) {
            warn!("Skipping invalid seed {}: {:?}", model.model_id, e);
            continue;
        }
        insert_model(conn, model)?;
        seeds.push(model);
    }

    let default = seeds
        .iter()
        .find(|m| m.is_studio_default)
        .or_else(|| seeds.first());
    if let Some(model) = default {
        set_default_model(conn, &model.model_id)?;
    }

    info!("Seeded {} models", seeds.len());
    Ok(seeds.len())
}
