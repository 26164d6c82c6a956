use crate::error::{LakeError, Result};
use crate::types::{
    Frequency, Period, RevisionType, VintageObservation,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Builder, Connection, Database};
use std::env;
use tracing::info;

/// Turso/libSQL-backed fact store. Acquired once per ingestion run and
/// released on exit; each `upsert_batch` call is one transaction.
pub struct LakeDb {
    db: Database,
}

impl LakeDb {
    /// Create a new store handle with connection to Turso
    pub async fn new() -> Result<Self> {
        let url = env::var("LIBSQL_URL").map_err(|_| LakeError::Persistence {
            message: "LIBSQL_URL environment variable not set".to_string(),
        })?;

        let auth_token = env::var("LIBSQL_AUTH_TOKEN").map_err(|_| LakeError::Persistence {
            message: "LIBSQL_AUTH_TOKEN environment variable not set".to_string(),
        })?;

        info!("Connecting to Turso database at {}", url);

        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| LakeError::Persistence {
                message: format!("Failed to connect to database: {e}"),
            })?;

        Ok(Self { db })
    }

    /// Get a connection to the database
    pub async fn get_connection(&self) -> Result<Connection> {
        self.db.connect().map_err(|e| LakeError::Persistence {
            message: format!("Failed to get database connection: {e}"),
        })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_connection().await?;
        let migration_sql = include_str!("../migrations/001_create_fact_tables.sql");

        conn.execute_batch(migration_sql)
            .await
            .map_err(|e| LakeError::Persistence {
                message: format!("Failed to run migrations: {e}"),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

// Table names come from the catalog, not user input, but interpolating them
// into SQL still warrants a strict identifier check.
fn checked_table(table: &str) -> Result<&str> {
    if !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(table)
    } else {
        Err(LakeError::Persistence {
            message: format!("invalid table name: {table}"),
        })
    }
}

fn parse_date(raw: &str, column: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| LakeError::Persistence {
        message: format!("bad {column} in stored row: {e}"),
    })
}

#[async_trait]
impl crate::storage::FactStore for LakeDb {
    async fn query_watermark(&self, table: &str, series_id: &str) -> Result<Option<NaiveDate>> {
        let table = checked_table(table)?;
        let conn = self.get_connection().await?;

        let mut rows = conn
            .query(
                &format!("SELECT MAX(period_start) FROM {table} WHERE series_id = ?"),
                libsql::params![series_id],
            )
            .await
            .map_err(|e| LakeError::Persistence {
                message: format!("Failed to query watermark: {e}"),
            })?;

        let row = rows.next().await.map_err(|e| LakeError::Persistence {
            message: format!("Failed to read watermark row: {e}"),
        })?;

        match row {
            Some(row) => {
                let raw: Option<String> = row.get(0).ok();
                match raw {
                    Some(s) => Ok(Some(parse_date(&s, "period_start")?)),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    async fn upsert_batch(&self, table: &str, rows: &[VintageObservation]) -> Result<usize> {
        let table = checked_table(table)?;
        let conn = self.get_connection().await?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| LakeError::Persistence {
                message: format!("Failed to open transaction: {e}"),
            })?;

        // OR REPLACE against the unique (series_id, period_start, vintage_date)
        // index: re-emitted vintages overwrite the rows of earlier runs.
        let sql = format!(
            "INSERT OR REPLACE INTO {table} (series_id, indicator, unit, category, subcategory, \
             period_label, period_start, period_end, frequency, value, vintage_date, \
             vintage_end, is_revised, revision_type, is_current, source, loaded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        for obs in rows {
            tx.execute(
                &sql,
                libsql::params![
                    obs.series_id.as_str(),
                    obs.indicator.as_str(),
                    obs.unit.as_str(),
                    obs.category.as_str(),
                    obs.subcategory.as_deref(),
                    obs.period.period_label.as_str(),
                    obs.period.period_start.to_string(),
                    obs.period.period_end.to_string(),
                    obs.frequency.as_str(),
                    obs.value,
                    obs.vintage_date.to_string(),
                    obs.vintage_end.to_string(),
                    obs.is_revised as i64,
                    obs.revision_type.as_str(),
                    obs.is_current as i64,
                    obs.source.as_str(),
                    obs.loaded_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| LakeError::Persistence {
                message: format!("Failed to insert row: {e}"),
            })?;
        }

        tx.commit().await.map_err(|e| LakeError::Persistence {
            message: format!("Failed to commit batch: {e}"),
        })?;

        Ok(rows.len())
    }

    async fn read_all(&self, table: &str, series_id: Option<&str>) -> Result<Vec<VintageObservation>> {
        let table = checked_table(table)?;
        let conn = self.get_connection().await?;

        let base = format!(
            "SELECT series_id, indicator, unit, category, subcategory, period_label, \
             period_start, period_end, frequency, value, vintage_date, vintage_end, \
             is_revised, revision_type, is_current, source, loaded_at FROM {table}"
        );

        let mut rows = match series_id {
            Some(id) => conn
                .query(&format!("{base} WHERE series_id = ?"), libsql::params![id])
                .await,
            None => conn.query(&base, libsql::params![]).await,
        }
        .map_err(|e| LakeError::Persistence {
            message: format!("Failed to query rows: {e}"),
        })?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| LakeError::Persistence {
            message: format!("Failed to read row: {e}"),
        })? {
            let get_text = |idx: i32| -> Result<String> {
                row.get::<String>(idx).map_err(|e| LakeError::Persistence {
                    message: format!("Failed to get column {idx}: {e}"),
                })
            };

            let frequency = Frequency::from_catalog(&get_text(8)?);
            let revision_type = match get_text(13)?.as_str() {
                "PRELIMINARY" => RevisionType::Preliminary,
                "REVISED" => RevisionType::Revised,
                _ => RevisionType::Final,
            };
            let loaded_at = DateTime::parse_from_rfc3339(&get_text(16)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());

            results.push(VintageObservation {
                series_id: get_text(0)?,
                indicator: get_text(1)?,
                unit: get_text(2)?,
                category: get_text(3)?,
                subcategory: row.get::<String>(4).ok(),
                period: Period {
                    period_label: get_text(5)?,
                    period_start: parse_date(&get_text(6)?, "period_start")?,
                    period_end: parse_date(&get_text(7)?, "period_end")?,
                },
                frequency,
                value: row.get::<f64>(9).map_err(|e| LakeError::Persistence {
                    message: format!("Failed to get value: {e}"),
                })?,
                vintage_date: parse_date(&get_text(10)?, "vintage_date")?,
                vintage_end: parse_date(&get_text(11)?, "vintage_end")?,
                is_revised: row.get::<i64>(12).unwrap_or(0) != 0,
                revision_type,
                is_current: row.get::<i64>(14).unwrap_or(0) != 0,
                source: get_text(15)?,
                loaded_at,
            });
        }

        Ok(results)
    }
}
