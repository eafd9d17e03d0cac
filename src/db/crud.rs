use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::{NewObject, ObjectRecord};

const SELECT_OBJECT: &str = r#"
    SELECT id, filename, category, upload_date, hash, thumbnail, characteristics
    FROM object
"#;

/// Inserts a record, replacing the one with the same file name
pub async fn upsert_object<'c, E>(executor: E, object: &NewObject<'_>) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO object (filename, category, hash, thumbnail, characteristics)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (filename) DO UPDATE SET
            category = excluded.category,
            upload_date = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
            hash = excluded.hash,
            thumbnail = COALESCE(excluded.thumbnail, object.thumbnail),
            characteristics = excluded.characteristics
        RETURNING id
        "#,
    )
    .bind(object.filename)
    .bind(object.category)
    .bind(object.hash)
    .bind(object.thumbnail)
    .bind(object.characteristics)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Thumbnail recorded for a file, if any
pub async fn find_thumbnail<'c, E>(executor: E, filename: &str) -> Result<Option<String>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT thumbnail FROM object WHERE filename = ?")
            .bind(filename)
            .fetch_optional(executor)
            .await?;
    Ok(row.and_then(|(thumbnail,)| thumbnail))
}

/// Number of records using a thumbnail
pub async fn count_thumbnail_references(executor: &SqlitePool, thumbnail: &str) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM object WHERE thumbnail = ?")
        .bind(thumbnail)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

pub async fn find_all(executor: &SqlitePool) -> Result<Vec<ObjectRecord>> {
    sqlx::query_as(&format!("{SELECT_OBJECT} ORDER BY id ASC")).fetch_all(executor).await
}

pub async fn find_by_filename(executor: &SqlitePool, filename: &str) -> Result<Vec<ObjectRecord>> {
    sqlx::query_as(&format!("{SELECT_OBJECT} WHERE filename = ? ORDER BY id ASC"))
        .bind(filename)
        .fetch_all(executor)
        .await
}

pub async fn find_by_category(executor: &SqlitePool, category: &str) -> Result<Vec<ObjectRecord>> {
    sqlx::query_as(&format!("{SELECT_OBJECT} WHERE category = ? ORDER BY id ASC"))
        .bind(category)
        .fetch_all(executor)
        .await
}

/// Deletes the record of a file, returns the number of deleted rows
pub async fn delete_by_filename(executor: &SqlitePool, filename: &str) -> Result<u64> {
    let result =
        sqlx::query("DELETE FROM object WHERE filename = ?").bind(filename).execute(executor).await?;
    Ok(result.rows_affected())
}

pub async fn delete_all(executor: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM object").execute(executor).await?;
    Ok(result.rows_affected())
}

pub async fn count(executor: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM object").fetch_one(executor).await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn object<'a>(filename: &'a str, category: Option<&'a str>) -> NewObject<'a> {
        NewObject {
            filename,
            category,
            hash: b"hash",
            thumbnail: None,
            characteristics: r#"{"error":"Empty file"}"#,
        }
    }

    #[tokio::test]
    async fn upsert_and_query() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = init_db(dir.path().join("test.db")).await?;

        upsert_object(&db, &object("chair.obj", Some("furniture"))).await?;
        upsert_object(&db, &object("table.obj", Some("furniture"))).await?;
        upsert_object(&db, &object("car.obj", None)).await?;
        assert_eq!(count(&db).await?, 3);

        let furniture = find_by_category(&db, "furniture").await?;
        assert_eq!(
            furniture.iter().map(|r| r.filename.as_str()).collect::<Vec<_>>(),
            vec!["chair.obj", "table.obj"]
        );

        let chair = find_by_filename(&db, "chair.obj").await?;
        assert_eq!(chair.len(), 1);
        assert!(chair[0].upload_date.ends_with('Z'));
        Ok(())
    }

    #[tokio::test]
    async fn upsert_replaces_by_filename() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = init_db(dir.path().join("test.db")).await?;

        let thumbnail = NewObject { thumbnail: Some("chair.png"), ..object("chair.obj", None) };
        let first = upsert_object(&db, &thumbnail).await?;
        let second = upsert_object(&db, &object("chair.obj", Some("seats"))).await?;

        assert_eq!(first, second);
        let records = find_all(&db).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category.as_deref(), Some("seats"));
        assert_eq!(records[0].thumbnail.as_deref(), Some("chair.png"));
        Ok(())
    }

    #[tokio::test]
    async fn thumbnail_references() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = init_db(dir.path().join("test.db")).await?;

        let chair = NewObject { thumbnail: Some("chair.png"), ..object("chair.obj", None) };
        let stl = NewObject { thumbnail: Some("chair.png"), ..object("chair.stl", None) };
        upsert_object(&db, &chair).await?;
        upsert_object(&db, &stl).await?;
        upsert_object(&db, &object("table.obj", None)).await?;

        assert_eq!(find_thumbnail(&db, "chair.obj").await?.as_deref(), Some("chair.png"));
        assert_eq!(find_thumbnail(&db, "table.obj").await?, None);
        assert_eq!(find_thumbnail(&db, "lamp.obj").await?, None);
        assert_eq!(count_thumbnail_references(&db, "chair.png").await?, 2);

        delete_by_filename(&db, "chair.obj").await?;
        assert_eq!(count_thumbnail_references(&db, "chair.png").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn delete_records() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = init_db(dir.path().join("test.db")).await?;

        upsert_object(&db, &object("a.obj", None)).await?;
        upsert_object(&db, &object("b.obj", None)).await?;

        assert_eq!(delete_by_filename(&db, "a.obj").await?, 1);
        assert_eq!(delete_by_filename(&db, "a.obj").await?, 0);
        assert_eq!(delete_all(&db).await?, 1);
        assert!(find_all(&db).await?.is_empty());
        Ok(())
    }
}
