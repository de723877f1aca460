//! PostgreSQL-backed series repository.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use hydro_common::{
    DataValue, HydroError, HydroResult, OverwritePolicy, Series, Site, Theme, Variable,
};

use crate::policy::{fill_values, normalize_values};
use crate::repository::{SavedSeries, SeriesRepository};

/// PostgreSQL connection pool and repository operations.
pub struct PgSeriesRepository {
    pool: PgPool,
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> HydroError {
    move |e| HydroError::persistence(context, e)
}

impl PgSeriesRepository {
    /// Create a new repository from a database URL.
    pub async fn connect(database_url: &str) -> HydroResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(db_err("connection failed"))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run schema migrations. Idempotent.
    pub async fn migrate(&self) -> HydroResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(db_err("migration failed"))?;
            }
        }
        Ok(())
    }
}

/// Insert-if-absent, then read back the identity. Safe to repeat.
async fn ensure_site(conn: &mut PgConnection, site: &Site) -> HydroResult<i64> {
    sqlx::query(
        "INSERT INTO sites (code, name, network, latitude, longitude, elevation_m) \
         VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (code) DO NOTHING",
    )
    .bind(&site.code)
    .bind(&site.name)
    .bind(&site.network)
    .bind(site.latitude)
    .bind(site.longitude)
    .bind(site.elevation_m)
    .execute(&mut *conn)
    .await
    .map_err(db_err("site insert failed"))?;

    sqlx::query_scalar("SELECT id FROM sites WHERE code = $1")
        .bind(&site.code)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err("site lookup failed"))
}

async fn ensure_variable(conn: &mut PgConnection, variable: &Variable) -> HydroResult<i64> {
    sqlx::query(
        "INSERT INTO variables (code, name, units, data_type, time_support, time_units) \
         VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (code) DO NOTHING",
    )
    .bind(&variable.code)
    .bind(&variable.name)
    .bind(&variable.units)
    .bind(&variable.data_type)
    .bind(variable.time_support)
    .bind(&variable.time_units)
    .execute(&mut *conn)
    .await
    .map_err(db_err("variable insert failed"))?;

    sqlx::query_scalar("SELECT id FROM variables WHERE code = $1")
        .bind(&variable.code)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err("variable lookup failed"))
}

async fn insert_series_row(conn: &mut PgConnection, series: &Series) -> HydroResult<i64> {
    let site_id = ensure_site(conn, &series.site).await?;
    let variable_id = ensure_variable(conn, &series.variable).await?;

    sqlx::query_scalar(
        "INSERT INTO series (site_id, variable_id, method, source) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(site_id)
    .bind(variable_id)
    .bind(&series.method)
    .bind(&series.source)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err("series insert failed"))
}

async fn insert_values(
    conn: &mut PgConnection,
    series_id: i64,
    values: &[DataValue],
) -> HydroResult<()> {
    for value in values {
        sqlx::query(
            "INSERT INTO data_values (series_id, local_date_time, data_value, qualifier) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(series_id)
        .bind(value.timestamp)
        .bind(value.value)
        .bind(&value.qualifier)
        .execute(&mut *conn)
        .await
        .map_err(db_err("value insert failed"))?;
    }
    Ok(())
}

/// Refresh the denormalized bounds on the series row.
async fn update_series_bounds(conn: &mut PgConnection, series_id: i64) -> HydroResult<()> {
    sqlx::query(
        "UPDATE series SET \
           value_count = (SELECT COUNT(*) FROM data_values WHERE series_id = $1), \
           begin_date_time = (SELECT MIN(local_date_time) FROM data_values WHERE series_id = $1), \
           end_date_time = (SELECT MAX(local_date_time) FROM data_values WHERE series_id = $1) \
         WHERE id = $1",
    )
    .bind(series_id)
    .execute(&mut *conn)
    .await
    .map_err(db_err("series bounds update failed"))?;
    Ok(())
}

async fn attach_theme(conn: &mut PgConnection, series_id: i64, theme: &Theme) -> HydroResult<()> {
    sqlx::query("INSERT INTO themes (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
        .bind(&theme.name)
        .bind(&theme.description)
        .execute(&mut *conn)
        .await
        .map_err(db_err("theme insert failed"))?;

    let theme_id: i64 = sqlx::query_scalar("SELECT id FROM themes WHERE name = $1")
        .bind(&theme.name)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err("theme lookup failed"))?;

    sqlx::query(
        "INSERT INTO series_themes (series_id, theme_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(series_id)
    .bind(theme_id)
    .execute(&mut *conn)
    .await
    .map_err(db_err("theme link failed"))?;

    Ok(())
}

#[async_trait]
impl SeriesRepository for PgSeriesRepository {
    async fn site_exists(&self, code: &str) -> HydroResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM sites WHERE code = $1)")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("site existence check failed"))
    }

    async fn add_site(&self, site: &Site) -> HydroResult<i64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_err("connection acquire failed"))?;
        ensure_site(&mut *conn, site).await
    }

    async fn variable_exists(&self, code: &str) -> HydroResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM variables WHERE code = $1)")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("variable existence check failed"))
    }

    async fn insert_variable(&self, variable: &Variable) -> HydroResult<i64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_err("connection acquire failed"))?;
        ensure_variable(&mut *conn, variable).await
    }

    async fn series_exists(&self, site_code: &str, variable_code: &str) -> HydroResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
               SELECT 1 FROM series s \
               JOIN sites st ON st.id = s.site_id \
               JOIN variables v ON v.id = s.variable_id \
               WHERE st.code = $1 AND v.code = $2)",
        )
        .bind(site_code)
        .bind(variable_code)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("series existence check failed"))
    }

    async fn save_series(
        &self,
        series: &Series,
        theme: &Theme,
        policy: OverwritePolicy,
    ) -> HydroResult<SavedSeries> {
        if series.values.is_empty() {
            return Ok(SavedSeries::skipped());
        }

        let incoming = normalize_values(&series.values);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("transaction begin failed"))?;

        let site_id = ensure_site(&mut *tx, &series.site).await?;
        let variable_id = ensure_variable(&mut *tx, &series.variable).await?;

        // Serialize writers for the same (site, variable) pair, including
        // two first-time saves racing to create the pair's primary row.
        // The lock is held until commit or rollback; other pairs proceed.
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(site_id as i32)
            .bind(variable_id as i32)
            .execute(&mut *tx)
            .await
            .map_err(db_err("pair lock failed"))?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM series WHERE site_id = $1 AND variable_id = $2 \
             ORDER BY id LIMIT 1",
        )
        .bind(site_id)
        .bind(variable_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err("series lookup failed"))?;

        let saved = match (existing, policy) {
            (Some(_), OverwritePolicy::Skip) => SavedSeries::skipped(),
            (Some(series_id), OverwritePolicy::Fill) => {
                let known: Vec<NaiveDateTime> =
                    sqlx::query_scalar("SELECT local_date_time FROM data_values WHERE series_id = $1")
                        .bind(series_id)
                        .fetch_all(&mut *tx)
                        .await
                        .map_err(db_err("timestamp query failed"))?;
                let known: HashSet<NaiveDateTime> = known.into_iter().collect();
                let additions = fill_values(&known, &incoming);

                insert_values(&mut *tx, series_id, &additions).await?;
                update_series_bounds(&mut *tx, series_id).await?;
                attach_theme(&mut *tx, series_id, theme).await?;
                SavedSeries {
                    series_id: Some(series_id),
                    values_saved: additions.len(),
                }
            }
            (Some(series_id), OverwritePolicy::Overwrite) => {
                sqlx::query("DELETE FROM data_values WHERE series_id = $1")
                    .bind(series_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err("value delete failed"))?;

                insert_values(&mut *tx, series_id, &incoming).await?;
                update_series_bounds(&mut *tx, series_id).await?;
                attach_theme(&mut *tx, series_id, theme).await?;
                SavedSeries {
                    series_id: Some(series_id),
                    values_saved: incoming.len(),
                }
            }
            // No collision, or an explicit independent copy.
            (None, _) | (Some(_), OverwritePolicy::Copy) => {
                let series_id = insert_series_row(&mut *tx, series).await?;
                insert_values(&mut *tx, series_id, &incoming).await?;
                update_series_bounds(&mut *tx, series_id).await?;
                attach_theme(&mut *tx, series_id, theme).await?;
                SavedSeries {
                    series_id: Some(series_id),
                    values_saved: incoming.len(),
                }
            }
        };

        tx.commit().await.map_err(db_err("commit failed"))?;

        debug!(
            site = %series.site.code,
            variable = %series.variable.code,
            policy = %policy,
            saved = saved.values_saved,
            "Saved series"
        );

        Ok(saved)
    }
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sites (
    id BIGSERIAL PRIMARY KEY,
    code VARCHAR(100) NOT NULL UNIQUE,
    name TEXT NOT NULL,
    network VARCHAR(100) NOT NULL DEFAULT '',
    latitude DOUBLE PRECISION NOT NULL,
    longitude DOUBLE PRECISION NOT NULL,
    elevation_m DOUBLE PRECISION
);

CREATE TABLE IF NOT EXISTS variables (
    id BIGSERIAL PRIMARY KEY,
    code VARCHAR(100) NOT NULL UNIQUE,
    name TEXT NOT NULL,
    units VARCHAR(100) NOT NULL DEFAULT '',
    data_type VARCHAR(100) NOT NULL DEFAULT '',
    time_support DOUBLE PRECISION,
    time_units VARCHAR(100)
);

CREATE TABLE IF NOT EXISTS series (
    id BIGSERIAL PRIMARY KEY,
    site_id BIGINT NOT NULL REFERENCES sites(id),
    variable_id BIGINT NOT NULL REFERENCES variables(id),
    method TEXT,
    source TEXT,
    begin_date_time TIMESTAMP,
    end_date_time TIMESTAMP,
    value_count INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_series_pair ON series(site_id, variable_id);

CREATE TABLE IF NOT EXISTS data_values (
    id BIGSERIAL PRIMARY KEY,
    series_id BIGINT NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    local_date_time TIMESTAMP NOT NULL,
    data_value DOUBLE PRECISION NOT NULL,
    qualifier VARCHAR(50)
);

CREATE INDEX IF NOT EXISTS idx_data_values_series_time
    ON data_values(series_id, local_date_time);

CREATE TABLE IF NOT EXISTS themes (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(200) NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS series_themes (
    series_id BIGINT NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    theme_id BIGINT NOT NULL REFERENCES themes(id) ON DELETE CASCADE,
    PRIMARY KEY (series_id, theme_id)
);
"#;
