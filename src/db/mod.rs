use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

pub mod crud;
pub mod model;

pub use model::*;

pub type Database = SqlitePool;

/// 打开元数据数据库，不存在时创建，并执行迁移
///
/// 上传在事务中写入，并发请求会等待写锁而不是立即失败。
pub async fn init_db(filename: impl AsRef<Path>) -> Result<Database> {
    let filename = filename.as_ref();
    if let Some(parent) = filename.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(filename)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(10));

    let db = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", filename.display()))?;

    sqlx::migrate!().run(&db).await.context("failed to migrate the metadata database")?;

    let (version,): (String,) = sqlx::query_as("SELECT sqlite_version()").fetch_one(&db).await?;
    info!("database {} ready (sqlite {version})", filename.display());

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_directories() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/data/catalog.db");

        let db = init_db(&path).await?;
        assert!(path.exists());
        assert_eq!(crud::count(&db).await?, 0);
        db.close().await;

        // reopening runs the migrations again without error
        let db = init_db(&path).await?;
        assert_eq!(crud::count(&db).await?, 0);
        Ok(())
    }
}
