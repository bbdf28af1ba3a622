//! SQLite-backed energy database via libsql. Implements EnergyStorePort and ModelRegistryPort.
//!
//! Raw EIA tables use natural primary keys (date, datetime, (date, commodity)); saves are
//! upserts. Processed tables are dropped and recreated on every pipeline run.
//! All tables live in one database file (DATABASE_PATH, default data/database.db).

use crate::domain::{
    ColumnInfo, Commodity, CrudeOilPrice, DomainError, NaturalGasPrice, Observation, PowerDemand,
    ProcessedRecord, RegisteredModel, RollingStats, StorageLevel, TableInfo,
};
use crate::ports::{EnergyStorePort, ModelRegistryPort};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use libsql::{Connection, Database, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS natural_gas_prices (
    date DATE PRIMARY KEY,
    price REAL,
    volume REAL,
    source TEXT
)"#,
    r#"
CREATE TABLE IF NOT EXISTS crude_oil_prices (
    date DATE PRIMARY KEY,
    wti_price REAL,
    brent_price REAL,
    volume REAL,
    source TEXT
)"#,
    r#"
CREATE TABLE IF NOT EXISTS power_demand (
    datetime TIMESTAMP PRIMARY KEY,
    region TEXT,
    demand_mw REAL,
    source TEXT
)"#,
    r#"
CREATE TABLE IF NOT EXISTS storage_levels (
    date DATE,
    commodity TEXT,
    storage_level REAL,
    unit TEXT,
    PRIMARY KEY (date, commodity)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS model_registry (
    model_id TEXT PRIMARY KEY,
    model_name TEXT,
    model_type TEXT,
    commodity TEXT,
    created_date TIMESTAMP,
    last_updated TIMESTAMP,
    performance_metrics TEXT,
    model_path TEXT,
    is_active BOOLEAN
)"#,
];

/// Lag and rolling features, stored as one JSON column of the processed tables.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FeatureBlob {
    lags: BTreeMap<u32, Option<f64>>,
    rolling: BTreeMap<u32, RollingStats>,
}

fn store_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Store(e.to_string())
}

/// Table names are interpolated into SQL; only `[a-z0-9_]` (not leading digit) is accepted.
pub fn checked_identifier(name: &str) -> Result<&str, DomainError> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(DomainError::InvalidInput(format!(
            "invalid table name '{}'",
            name
        )))
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT)
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), DATE_FMT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// SQLite store. One database file; safe to share via Arc.
pub struct SqliteStore {
    db: Database,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub async fn connect(db_path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(store_err)?;
            }
        }
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(store_err)?;
        let conn = db.connect().map_err(store_err)?;

        // PRAGMA returns a row; consume it (execute fails when rows are returned).
        let mut wal_rows = conn
            .query("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| DomainError::Store(format!("WAL pragma failed: {}", e)))?;
        while wal_rows.next().await.map_err(store_err)?.is_some() {}

        for ddl in SCHEMA {
            conn.execute(ddl, ()).await.map_err(store_err)?;
        }
        info!(path = %db_path.display(), "energy database ready");
        Ok(Self { db, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<Connection, DomainError> {
        self.db.connect().map_err(store_err)
    }

    async fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>, DomainError> {
        let table = checked_identifier(table)?;
        let mut rows = conn
            .query(&format!("PRAGMA table_info({})", table), ())
            .await
            .map_err(store_err)?;
        let mut names = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            names.push(row.get::<String>(1).map_err(store_err)?);
        }
        Ok(names)
    }

    /// (time column, value column) of the commodity's raw table.
    fn raw_columns(commodity: &Commodity, available: &[String]) -> Option<(String, String)> {
        let pick = |candidates: &[&str]| {
            candidates
                .iter()
                .find(|c| available.iter().any(|a| a == *c))
                .map(|c| c.to_string())
        };
        match commodity {
            Commodity::NaturalGas => Some(("date".into(), "price".into())),
            Commodity::CrudeOil => Some(("date".into(), "wti_price".into())),
            Commodity::Electricity => Some(("datetime".into(), "demand_mw".into())),
            Commodity::Other(_) => Some((
                pick(&["date", "datetime"])?,
                pick(&["price", "value", "storage_level", "demand_mw"])?,
            )),
        }
    }
}

#[async_trait::async_trait]
impl EnergyStorePort for SqliteStore {
    async fn save_natural_gas(&self, rows: &[NaturalGasPrice]) -> Result<usize, DomainError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(store_err)?;
        for r in rows {
            tx.execute(
                r#"
                INSERT INTO natural_gas_prices (date, price, volume, source)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (date) DO UPDATE SET
                    price = excluded.price,
                    volume = excluded.volume,
                    source = excluded.source
                "#,
                params![
                    r.date.format(DATE_FMT).to_string(),
                    r.price,
                    r.volume,
                    r.source.as_str()
                ],
            )
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(rows.len())
    }

    async fn save_crude_oil(&self, rows: &[CrudeOilPrice]) -> Result<usize, DomainError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(store_err)?;
        for r in rows {
            tx.execute(
                r#"
                INSERT INTO crude_oil_prices (date, wti_price, brent_price, volume, source)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (date) DO UPDATE SET
                    wti_price = excluded.wti_price,
                    brent_price = excluded.brent_price,
                    volume = excluded.volume,
                    source = excluded.source
                "#,
                params![
                    r.date.format(DATE_FMT).to_string(),
                    r.wti_price,
                    r.brent_price,
                    r.volume,
                    r.source.as_str()
                ],
            )
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(rows.len())
    }

    async fn save_power_demand(&self, rows: &[PowerDemand]) -> Result<usize, DomainError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(store_err)?;
        for r in rows {
            tx.execute(
                r#"
                INSERT INTO power_demand (datetime, region, demand_mw, source)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (datetime) DO UPDATE SET
                    region = excluded.region,
                    demand_mw = excluded.demand_mw,
                    source = excluded.source
                "#,
                params![
                    r.datetime.format(DATETIME_FMT).to_string(),
                    r.region.as_str(),
                    r.demand_mw,
                    r.source.as_str()
                ],
            )
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(rows.len())
    }

    async fn save_storage(&self, rows: &[StorageLevel]) -> Result<usize, DomainError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(store_err)?;
        for r in rows {
            tx.execute(
                r#"
                INSERT INTO storage_levels (date, commodity, storage_level, unit)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (date, commodity) DO UPDATE SET
                    storage_level = excluded.storage_level,
                    unit = excluded.unit
                "#,
                params![
                    r.date.format(DATE_FMT).to_string(),
                    r.commodity.as_str(),
                    r.storage_level,
                    r.unit.as_str()
                ],
            )
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(rows.len())
    }

    async fn load_observations(
        &self,
        commodity: &Commodity,
    ) -> Result<Vec<Observation>, DomainError> {
        let table = commodity.raw_table();
        let table = checked_identifier(&table)?;
        let conn = self.conn()?;
        let columns = Self::column_names(&conn, table).await?;
        if columns.is_empty() {
            return Ok(Vec::new());
        }
        let Some((time_col, value_col)) = Self::raw_columns(commodity, &columns) else {
            return Err(DomainError::Store(format!(
                "{} has no recognizable date/value columns",
                table
            )));
        };
        let volume_col = if columns.iter().any(|c| c == "volume") {
            "volume"
        } else {
            "NULL"
        };
        let region_col = if columns.iter().any(|c| c == "region") {
            "region"
        } else {
            "NULL"
        };
        let sql = format!(
            "SELECT {t}, {v}, {vol}, {reg} FROM {table} ORDER BY {t}",
            t = time_col,
            v = value_col,
            vol = volume_col,
            reg = region_col,
            table = table
        );
        let mut rows = conn.query(&sql, ()).await.map_err(store_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            let raw_time: String = row.get(0).map_err(store_err)?;
            let Some(at) = parse_timestamp(&raw_time) else {
                continue;
            };
            out.push(Observation {
                at,
                value: row.get::<f64>(1).ok(),
                volume: row.get::<f64>(2).ok(),
                region: row.get::<String>(3).ok(),
            });
        }
        Ok(out)
    }

    async fn replace_processed(
        &self,
        commodity: &Commodity,
        records: &[ProcessedRecord],
    ) -> Result<(), DomainError> {
        let table = commodity.processed_table();
        let table = checked_identifier(&table)?;
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(store_err)?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", table), ())
            .await
            .map_err(store_err)?;
        tx.execute(
            &format!(
                r#"
                CREATE TABLE {} (
                    at TEXT NOT NULL,
                    region TEXT,
                    value REAL,
                    volume REAL,
                    daily_return REAL,
                    log_return REAL,
                    ma_7 REAL,
                    ma_30 REAL,
                    ma_90 REAL,
                    volatility_30 REAL,
                    rsi REAL,
                    year INTEGER,
                    month INTEGER,
                    day_of_year INTEGER,
                    week_of_year INTEGER,
                    day_of_week INTEGER,
                    is_summer INTEGER,
                    is_winter INTEGER,
                    is_shoulder INTEGER,
                    features_json TEXT
                )"#,
                table
            ),
            (),
        )
        .await
        .map_err(store_err)?;

        let insert = format!(
            "INSERT INTO {} VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            table
        );
        for r in records {
            let features = serde_json::to_string(&FeatureBlob {
                lags: r.lags.clone(),
                rolling: r.rolling.clone(),
            })
            .map_err(store_err)?;
            tx.execute(
                &insert,
                params![
                    r.at.format(DATETIME_FMT).to_string(),
                    r.region.clone(),
                    r.value,
                    r.volume,
                    r.daily_return,
                    r.log_return,
                    r.ma_7,
                    r.ma_30,
                    r.ma_90,
                    r.volatility_30,
                    r.rsi,
                    r.year as i64,
                    r.month as i64,
                    r.day_of_year as i64,
                    r.week_of_year as i64,
                    r.day_of_week as i64,
                    r.is_summer as i64,
                    r.is_winter as i64,
                    r.is_shoulder as i64,
                    features
                ],
            )
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        info!(table, rows = records.len(), "processed data saved");
        Ok(())
    }

    async fn load_processed(
        &self,
        commodity: &Commodity,
    ) -> Result<Vec<ProcessedRecord>, DomainError> {
        let table = commodity.processed_table();
        let table = checked_identifier(&table)?;
        let conn = self.conn()?;
        if Self::column_names(&conn, table).await?.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = conn
            .query(&format!("SELECT * FROM {} ORDER BY region, at", table), ())
            .await
            .map_err(store_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            let raw_time: String = row.get(0).map_err(store_err)?;
            let Some(at) = parse_timestamp(&raw_time) else {
                continue;
            };
            let int = |i: i32| row.get::<i64>(i).unwrap_or(0);
            let features: FeatureBlob = row
                .get::<String>(19)
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default();
            out.push(ProcessedRecord {
                at,
                region: row.get::<String>(1).ok(),
                value: row.get::<f64>(2).ok(),
                volume: row.get::<f64>(3).ok(),
                daily_return: row.get::<f64>(4).ok(),
                log_return: row.get::<f64>(5).ok(),
                ma_7: row.get::<f64>(6).ok(),
                ma_30: row.get::<f64>(7).ok(),
                ma_90: row.get::<f64>(8).ok(),
                volatility_30: row.get::<f64>(9).ok(),
                rsi: row.get::<f64>(10).ok(),
                year: int(11) as i32,
                month: int(12) as u32,
                day_of_year: int(13) as u32,
                week_of_year: int(14) as u32,
                day_of_week: int(15) as u32,
                is_summer: int(16) != 0,
                is_winter: int(17) != 0,
                is_shoulder: int(18) != 0,
                lags: features.lags,
                rolling: features.rolling,
            });
        }
        Ok(out)
    }

    async fn table_info(&self, table: &str) -> Result<TableInfo, DomainError> {
        let table = checked_identifier(table)?;
        let conn = self.conn()?;
        let mut rows = conn
            .query(&format!("PRAGMA table_info({})", table), ())
            .await
            .map_err(store_err)?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            columns.push(ColumnInfo {
                name: row.get::<String>(1).map_err(store_err)?,
                column_type: row.get::<String>(2).unwrap_or_default(),
            });
        }
        if columns.is_empty() {
            return Ok(TableInfo::missing());
        }
        let mut count_rows = conn
            .query(&format!("SELECT COUNT(*) FROM {}", table), ())
            .await
            .map_err(store_err)?;
        let row_count = match count_rows.next().await.map_err(store_err)? {
            Some(row) => row.get::<i64>(0).map_err(store_err)? as u64,
            None => 0,
        };
        Ok(TableInfo {
            exists: true,
            columns,
            row_count,
        })
    }
}

#[async_trait::async_trait]
impl ModelRegistryPort for SqliteStore {
    async fn register(&self, model: &RegisteredModel) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let metrics = serde_json::to_string(&model.performance_metrics).map_err(store_err)?;
        conn.execute(
            r#"
            INSERT INTO model_registry (model_id, model_name, model_type, commodity, created_date,
                                        last_updated, performance_metrics, model_path, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (model_id) DO UPDATE SET
                last_updated = excluded.last_updated,
                performance_metrics = excluded.performance_metrics,
                model_path = excluded.model_path,
                is_active = excluded.is_active
            "#,
            params![
                model.model_id.as_str(),
                model.model_name.as_str(),
                model.model_type.as_str(),
                model.commodity.clone(),
                model.created_date.to_rfc3339(),
                model.last_updated.to_rfc3339(),
                metrics,
                model.model_path.clone(),
                model.is_active as i64
            ],
        )
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get(&self, model_id: &str) -> Result<Option<RegisteredModel>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT * FROM model_registry WHERE model_id = ?1",
                params![model_id],
            )
            .await
            .map_err(store_err)?;
        match rows.next().await.map_err(store_err)? {
            Some(row) => Ok(Some(registry_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<RegisteredModel>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT * FROM model_registry ORDER BY created_date DESC, model_id DESC",
                (),
            )
            .await
            .map_err(store_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            let model = registry_row(&row)?;
            if prefix.is_none_or(|p| model.model_name.starts_with(p)) {
                out.push(model);
            }
        }
        Ok(out)
    }
}

fn registry_row(row: &libsql::Row) -> Result<RegisteredModel, DomainError> {
    let ts = |i: i32| -> Result<DateTime<Utc>, DomainError> {
        let s: String = row.get(i).map_err(store_err)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(store_err)
    };
    let metrics: BTreeMap<String, f64> = row
        .get::<String>(6)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    Ok(RegisteredModel {
        model_id: row.get(0).map_err(store_err)?,
        model_name: row.get::<String>(1).unwrap_or_default(),
        model_type: row.get::<String>(2).unwrap_or_default(),
        commodity: row.get::<String>(3).ok(),
        created_date: ts(4)?,
        last_updated: ts(5)?,
        performance_metrics: metrics,
        model_path: row.get::<String>(7).ok(),
        is_active: row.get::<i64>(8).unwrap_or(0) != 0,
    })
}
