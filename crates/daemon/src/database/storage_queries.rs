use async_trait::async_trait;
use sqlx::SqliteExecutor;

use common::access::Owner;
use common::quota::{QuotaError, QuotaLedger, Usage};

use crate::database::Database;

fn to_u64(value: i64) -> u64 {
    value.max(0) as u64
}

/// Create the owner's quota record if it does not exist yet.
///  An existing record is left untouched.
pub(super) async fn ensure_quota<'e, E>(
    executor: E,
    owner: &Owner,
    quota_bytes: u64,
) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO storage_quotas (owner_id, owner_kind, used_bytes, quota_bytes)
        VALUES (?1, ?2, 0, ?3)
        ON CONFLICT (owner_id, owner_kind) DO NOTHING
        "#,
    )
    .bind(&owner.id)
    .bind(owner.kind.as_str())
    .bind(i64::try_from(quota_bytes).unwrap_or(i64::MAX))
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl QuotaLedger for Database {
    type Error = sqlx::Error;

    async fn usage(&self, owner: &Owner) -> Result<Usage, QuotaError<Self::Error>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT used_bytes, quota_bytes FROM storage_quotas WHERE owner_id = ?1 AND owner_kind = ?2",
        )
        .bind(&owner.id)
        .bind(owner.kind.as_str())
        .fetch_optional(&**self)
        .await?;

        let (used, quota) = row.ok_or_else(|| QuotaError::OwnerNotFound(owner.clone()))?;
        Ok(Usage::new(to_u64(used), to_u64(quota)))
    }

    async fn adjust_usage(
        &self,
        owner: &Owner,
        delta_bytes: i64,
    ) -> Result<(), QuotaError<Self::Error>> {
        let result = sqlx::query(
            r#"
            UPDATE storage_quotas
            SET used_bytes = MAX(0, used_bytes + ?1)
            WHERE owner_id = ?2 AND owner_kind = ?3
            "#,
        )
        .bind(delta_bytes)
        .bind(&owner.id)
        .bind(owner.kind.as_str())
        .execute(&**self)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QuotaError::OwnerNotFound(owner.clone()));
        }
        Ok(())
    }
}
