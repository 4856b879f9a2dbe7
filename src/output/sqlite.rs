use super::OutputHandler;
use crate::error::{Error, Result};
use crate::record::MovieRecord;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::path::PathBuf;

/// One table per record set; rows are replaced by id so reruns do not duplicate.
pub struct SqliteOutput {
    pool: SqlitePool,
    table_name: String,
    initialized: bool,
}

impl SqliteOutput {
    pub async fn new(path: PathBuf, table_name: String) -> Result<Self> {
        if !is_identifier(&table_name) {
            return Err(Error::Config(format!("invalid table name '{}'", table_name)));
        }
        let conn_str = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&conn_str).await?;

        Ok(Self {
            pool,
            table_name,
            initialized: false,
        })
    }

    async fn ensure_table(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let query = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                id INTEGER UNIQUE,
                title TEXT NOT NULL,
                release_date TEXT NOT NULL,
                rating REAL,
                overview TEXT NOT NULL,
                genres TEXT NOT NULL,
                poster_url TEXT NOT NULL,
                source_url TEXT NOT NULL,
                method TEXT NOT NULL
            )",
            self.table_name
        );
        sqlx::query(&query).execute(&self.pool).await?;

        self.initialized = true;
        Ok(())
    }
}

#[async_trait]
impl OutputHandler for SqliteOutput {
    async fn write(&mut self, record: &MovieRecord) -> Result<()> {
        self.ensure_table().await?;

        let query = format!(
            "INSERT OR REPLACE INTO {} \
             (id, title, release_date, rating, overview, genres, poster_url, source_url, method) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            self.table_name
        );

        sqlx::query(&query)
            .bind(record.id)
            .bind(&record.title)
            .bind(&record.release_date)
            .bind(record.rating.score())
            .bind(&record.overview)
            .bind(&record.genres)
            .bind(&record.poster_url)
            .bind(&record.source_url)
            .bind(&record.method)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.ensure_table().await?;
        self.pool.close().await;
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample;
    use sqlx::Row;

    #[tokio::test]
    async fn rows_land_in_named_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.db");
        let mut out = SqliteOutput::new(path.clone(), "movies_api".into()).await.unwrap();
        out.write(&sample(1, "API")).await.unwrap();
        out.write(&sample(2, "API")).await.unwrap();
        out.write(&sample(1, "API")).await.unwrap();
        out.close().await.unwrap();

        let pool = SqlitePool::connect(&format!("sqlite:{}", path.display()))
            .await
            .unwrap();
        let rows = sqlx::query("SELECT id, rating, genres FROM movies_api ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get::<i64, _>("id"), 1);
        assert_eq!(rows[0].get::<f64, _>("rating"), 7.3);
        assert_eq!(rows[1].get::<String, _>("genres"), "Drama | Crime");
    }

    #[tokio::test]
    async fn rejects_unsafe_table_names() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteOutput::new(dir.path().join("x.db"), "movies; DROP".into()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
