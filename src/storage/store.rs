//! Local persistence for providers, price groups, offers, and probe results.
//!
//! The pipeline core never opens connections itself; CLI commands hand it
//! already-materialized snapshots read from here and pass records back for
//! storage. Offer upserts are keyed by model name and preserve id and
//! creation time; test results are append-only.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use rust_decimal::Decimal;

use crate::core::models::{
    ModelOffer, NormalizedOffer, PriceGroup, PriceSchema, ProbeStatus, TestResult,
    UpstreamProvider,
};
use crate::error::{ChansyncError, Result};
use crate::storage::schema::run_migrations;

/// Database access layer.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Create or open a database at the given path.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created, the
    /// database cannot be opened, or schema migrations fail.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        run_migrations(&mut conn)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Insert a provider.
    ///
    /// # Errors
    /// Returns an error if the name already exists or the insert fails.
    pub fn add_provider(
        &self,
        name: &str,
        base_url: &str,
        ratio: f64,
        schema: PriceSchema,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO providers (name, base_url, ratio, schema, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                base_url,
                ratio,
                schema.cli_name(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Look up a provider by name.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn provider_by_name(&self, name: &str) -> Result<Option<UpstreamProvider>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, name, base_url, ratio, schema, created_at FROM providers WHERE name = ?1",
        )?;
        let mut rows = stmt.query_map([name], provider_from_row)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// All providers in insertion order.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn list_providers(&self) -> Result<Vec<UpstreamProvider>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, name, base_url, ratio, schema, created_at FROM providers ORDER BY id",
        )?;
        let rows = stmt.query_map([], provider_from_row)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    /// Providers keyed by id for reference resolution.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn providers_by_id(&self) -> Result<HashMap<i64, UpstreamProvider>> {
        Ok(self
            .list_providers()?
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }

    /// Delete a provider and (via cascade) its price groups.
    ///
    /// Offers referencing the provider are intentionally left in place; the
    /// consolidator excludes offers with unresolvable references.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn remove_provider(&self, name: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM providers WHERE name = ?1", [name])?;
        Ok(deleted > 0)
    }

    // =========================================================================
    // Price Groups
    // =========================================================================

    /// Insert a price group under a provider.
    ///
    /// # Errors
    /// Returns an error if (provider, name) already exists or the insert fails.
    pub fn add_group(
        &self,
        provider_id: i64,
        name: &str,
        ratio: f64,
        access_key: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO price_groups (provider_id, name, ratio, access_key, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![provider_id, name, ratio, access_key, Utc::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Look up a group by provider and name.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn group_by_name(&self, provider_id: i64, name: &str) -> Result<Option<PriceGroup>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, provider_id, name, ratio, access_key, created_at \
             FROM price_groups WHERE provider_id = ?1 AND name = ?2",
        )?;
        let mut rows = stmt.query_map(params![provider_id, name], group_from_row)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Groups belonging to one provider.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn groups_for_provider(&self, provider_id: i64) -> Result<Vec<PriceGroup>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, provider_id, name, ratio, access_key, created_at \
             FROM price_groups WHERE provider_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([provider_id], group_from_row)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    /// All groups in insertion order.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn list_groups(&self) -> Result<Vec<PriceGroup>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, provider_id, name, ratio, access_key, created_at \
             FROM price_groups ORDER BY id",
        )?;
        let rows = stmt.query_map([], group_from_row)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    /// Groups keyed by id for reference resolution.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn groups_by_id(&self) -> Result<HashMap<i64, PriceGroup>> {
        Ok(self.list_groups()?.into_iter().map(|g| (g.id, g)).collect())
    }

    /// Delete a group.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn remove_group(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM price_groups WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    // =========================================================================
    // Model Offers
    // =========================================================================

    /// Insert or update an offer keyed by model name.
    ///
    /// An existing row keeps its id and creation time; all other fields are
    /// overwritten. Returns the row id.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn upsert_offer(&self, offer: &NormalizedOffer) -> Result<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM model_offers WHERE name = ?1",
                [&offer.name],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        if let Some(id) = existing {
            self.conn.execute(
                "UPDATE model_offers SET ratio = ?1, price = ?2, completion_ratio = ?3, \
                 quota_kind = ?4, provider_id = ?5, group_id = ?6 WHERE id = ?7",
                params![
                    offer.ratio,
                    offer.price.to_string(),
                    offer.completion_ratio,
                    offer.quota_kind.code(),
                    offer.provider_id,
                    offer.group_id,
                    id
                ],
            )?;
            Ok(id)
        } else {
            self.conn.execute(
                "INSERT INTO model_offers \
                 (name, ratio, price, completion_ratio, quota_kind, provider_id, group_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    offer.name,
                    offer.ratio,
                    offer.price.to_string(),
                    offer.completion_ratio,
                    offer.quota_kind.code(),
                    offer.provider_id,
                    offer.group_id,
                    Utc::now().to_rfc3339()
                ],
            )?;
            Ok(self.conn.last_insert_rowid())
        }
    }

    /// All offers in insertion order.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn list_offers(&self) -> Result<Vec<ModelOffer>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, name, ratio, price, completion_ratio, quota_kind, \
             provider_id, group_id, created_at FROM model_offers ORDER BY id",
        )?;
        let rows = stmt.query_map([], offer_from_row)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    // =========================================================================
    // Test Results
    // =========================================================================

    /// Append one probe result for an offer.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn append_test_result(
        &self,
        offer_id: i64,
        status: ProbeStatus,
        error: Option<&str>,
        probe_kind: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO test_results (offer_id, tested_at, status, error, probe_kind) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                offer_id,
                Utc::now().to_rfc3339(),
                status.code(),
                error,
                probe_kind
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Latest probe result for an offer (max timestamp, then max id).
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn latest_test_result(&self, offer_id: i64) -> Result<Option<TestResult>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, offer_id, tested_at, status, error, probe_kind FROM test_results \
             WHERE offer_id = ?1 ORDER BY tested_at DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map([offer_id], test_result_from_row)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Latest probe status per offer, for the consolidator's filter.
    ///
    /// Offers with no recorded probe are absent from the map (treated as
    /// untested by callers).
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn latest_statuses(&self) -> Result<HashMap<i64, ProbeStatus>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT t.offer_id, t.status FROM test_results t \
             WHERE t.id = (\
                 SELECT t2.id FROM test_results t2 WHERE t2.offer_id = t.offer_id \
                 ORDER BY t2.tested_at DESC, t2.id DESC LIMIT 1\
             )",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, ProbeStatus::from_code(row.get(1)?)))
        })?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }
}

// =============================================================================
// Row Mappers
// =============================================================================

fn provider_from_row(row: &Row<'_>) -> rusqlite::Result<UpstreamProvider> {
    let schema_name: String = row.get(4)?;
    let schema = PriceSchema::from_cli_name(&schema_name)
        .map_err(|e| conversion_error(4, e.to_string()))?;
    Ok(UpstreamProvider {
        id: row.get(0)?,
        name: row.get(1)?,
        base_url: row.get(2)?,
        ratio: row.get(3)?,
        schema,
        created_at: parse_datetime(&row.get::<_, String>(5)?, 5)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<PriceGroup> {
    Ok(PriceGroup {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        name: row.get(2)?,
        ratio: row.get(3)?,
        access_key: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?, 5)?,
    })
}

fn offer_from_row(row: &Row<'_>) -> rusqlite::Result<ModelOffer> {
    let price_text: String = row.get(3)?;
    let price = Decimal::from_str(&price_text)
        .map_err(|e| conversion_error(3, e.to_string()))?;
    Ok(ModelOffer {
        id: row.get(0)?,
        name: row.get(1)?,
        ratio: row.get(2)?,
        price,
        completion_ratio: row.get(4)?,
        quota_kind: crate::core::models::QuotaKind::from_code(row.get(5)?),
        provider_id: row.get(6)?,
        group_id: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?, 8)?,
    })
}

fn test_result_from_row(row: &Row<'_>) -> rusqlite::Result<TestResult> {
    Ok(TestResult {
        id: row.get(0)?,
        offer_id: row.get(1)?,
        tested_at: parse_datetime(&row.get::<_, String>(2)?, 2)?,
        status: ProbeStatus::from_code(row.get(3)?),
        error: row.get(4)?,
        probe_kind: row.get(5)?,
    })
}

fn parse_datetime(text: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e.to_string()))
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        ChansyncError::Database(message).into(),
    )
}
