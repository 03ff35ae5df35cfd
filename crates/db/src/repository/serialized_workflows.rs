//! Snapshot operations on the `serialized_workflows` table.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    models::{SerializedWorkflowRow, WriteOutcome},
    DbError, DbPool,
};

/// Insert or replace the snapshot for `workflow_id`.
///
/// Last write wins by timestamp: when the stored row is newer than `as_of`
/// the call is a no-op returning [`WriteOutcome::Superseded`]. When the stored
/// data equals `data` nothing is written either.
pub async fn upsert_serialized_workflow(
    pool: &DbPool,
    workflow_id: &str,
    data: &str,
    as_of: DateTime<Utc>,
) -> Result<WriteOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, SerializedWorkflowRow>(
        r#"
        SELECT workflow_id, data, last_updated
        FROM serialized_workflows
        WHERE workflow_id = ?
        "#,
    )
    .bind(workflow_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(ref row) = existing {
        if row.last_updated > as_of {
            debug!(workflow_id, "stored snapshot is newer, skipping write");
            tx.rollback().await?;
            return Ok(WriteOutcome::Superseded);
        }
        if row.data == data {
            debug!(workflow_id, "snapshot unchanged, skipping write");
            tx.rollback().await?;
            return Ok(WriteOutcome::Unchanged);
        }
    }

    sqlx::query(
        r#"
        INSERT INTO serialized_workflows (workflow_id, data, last_updated)
        VALUES (?, ?, ?)
        ON CONFLICT (workflow_id) DO UPDATE
        SET data = excluded.data, last_updated = excluded.last_updated
        "#,
    )
    .bind(workflow_id)
    .bind(data)
    .bind(as_of)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(WriteOutcome::Written)
}

/// Fetch the snapshot for `workflow_id`, if any.
pub async fn get_serialized_workflow(
    pool: &DbPool,
    workflow_id: &str,
) -> Result<Option<SerializedWorkflowRow>, DbError> {
    let row = sqlx::query_as::<_, SerializedWorkflowRow>(
        r#"
        SELECT workflow_id, data, last_updated
        FROM serialized_workflows
        WHERE workflow_id = ?
        "#,
    )
    .bind(workflow_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Return the last-updated timestamp without loading the data column.
pub async fn get_last_updated(
    pool: &DbPool,
    workflow_id: &str,
) -> Result<Option<DateTime<Utc>>, DbError> {
    let last_updated = sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"SELECT last_updated FROM serialized_workflows WHERE workflow_id = ?"#,
    )
    .bind(workflow_id)
    .fetch_optional(pool)
    .await?;

    Ok(last_updated)
}

/// Return all stored workflow ids in ascending order.
pub async fn list_workflow_ids(pool: &DbPool) -> Result<Vec<String>, DbError> {
    let ids = sqlx::query_scalar::<_, String>(
        r#"SELECT workflow_id FROM serialized_workflows ORDER BY workflow_id ASC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Permanently delete a snapshot.
///
/// Returns `DbError::NotFound` if no row was deleted.
pub async fn delete_serialized_workflow(pool: &DbPool, workflow_id: &str) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM serialized_workflows WHERE workflow_id = ?")
        .bind(workflow_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::create_memory_pool;
    use chrono::{Duration, TimeZone};

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 6, 15, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn upsert_then_get_returns_row() {
        let pool = create_memory_pool().await.expect("memory pool");

        let outcome = upsert_serialized_workflow(&pool, "test_dag", "{\"a\":1}", ts(1))
            .await
            .expect("insert");
        assert_eq!(outcome, WriteOutcome::Written);

        let row = get_serialized_workflow(&pool, "test_dag")
            .await
            .expect("query")
            .expect("row exists");
        assert_eq!(row.data, "{\"a\":1}");
        assert_eq!(row.last_updated, ts(1));
    }

    #[tokio::test]
    async fn missing_row_is_none() {
        let pool = create_memory_pool().await.expect("memory pool");
        assert!(get_serialized_workflow(&pool, "ghost").await.unwrap().is_none());
        assert!(get_last_updated(&pool, "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn newer_write_replaces_older_one() {
        let pool = create_memory_pool().await.expect("memory pool");
        upsert_serialized_workflow(&pool, "wf", "v1", ts(1)).await.unwrap();

        let outcome = upsert_serialized_workflow(&pool, "wf", "v2", ts(2)).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Written);

        let row = get_serialized_workflow(&pool, "wf").await.unwrap().unwrap();
        assert_eq!(row.data, "v2");
        assert_eq!(get_last_updated(&pool, "wf").await.unwrap(), Some(ts(2)));
    }

    #[tokio::test]
    async fn older_write_is_superseded() {
        let pool = create_memory_pool().await.expect("memory pool");
        upsert_serialized_workflow(&pool, "wf", "v2", ts(2)).await.unwrap();

        let outcome = upsert_serialized_workflow(&pool, "wf", "v1", ts(2) - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Superseded);

        let row = get_serialized_workflow(&pool, "wf").await.unwrap().unwrap();
        assert_eq!(row.data, "v2");
    }

    #[tokio::test]
    async fn identical_data_is_not_rewritten() {
        let pool = create_memory_pool().await.expect("memory pool");
        upsert_serialized_workflow(&pool, "wf", "same", ts(1)).await.unwrap();

        let outcome = upsert_serialized_workflow(&pool, "wf", "same", ts(3)).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert_eq!(get_last_updated(&pool, "wf").await.unwrap(), Some(ts(1)));
    }

    #[tokio::test]
    async fn list_and_delete() {
        let pool = create_memory_pool().await.expect("memory pool");
        upsert_serialized_workflow(&pool, "b_dag", "{}", ts(1)).await.unwrap();
        upsert_serialized_workflow(&pool, "a_dag", "{}", ts(1)).await.unwrap();

        assert_eq!(list_workflow_ids(&pool).await.unwrap(), vec!["a_dag", "b_dag"]);

        delete_serialized_workflow(&pool, "a_dag").await.unwrap();
        assert_eq!(list_workflow_ids(&pool).await.unwrap(), vec!["b_dag"]);

        assert!(matches!(
            delete_serialized_workflow(&pool, "a_dag").await,
            Err(DbError::NotFound)
        ));
    }
}
