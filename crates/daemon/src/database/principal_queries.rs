use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::FromRow;

use common::access::{AgentDirectory, OwnerKind, Principal};

use crate::database::storage_queries::ensure_quota;
use crate::database::types::DTimestamp;
use crate::database::Database;

/// API keys are never stored, only their SHA-256 hex digest
fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// A fresh random API key, 32 bytes hex-encoded
fn generate_api_key() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: String,
    kind: String,
    claiming_human_id: Option<String>,
}

impl PrincipalRow {
    fn into_principal(self) -> Result<Principal, sqlx::Error> {
        let kind: OwnerKind = self
            .kind
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Principal {
            id: self.id,
            kind,
            claiming_human_id: self.claiming_human_id,
        })
    }
}

impl Database {
    /// Register a principal with a newly generated API key and an
    ///  empty quota record. Returns the raw key; only its hash is kept.
    pub async fn create_principal(
        &self,
        principal: &Principal,
        quota_bytes: u64,
    ) -> Result<String, sqlx::Error> {
        let api_key = generate_api_key();
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO principals (id, kind, claiming_human_id, api_key_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&principal.id)
        .bind(principal.kind.as_str())
        .bind(&principal.claiming_human_id)
        .bind(hash_api_key(&api_key))
        .bind(DTimestamp::now())
        .execute(&mut *tx)
        .await?;

        ensure_quota(&mut *tx, &principal.owner(), quota_bytes).await?;

        tx.commit().await?;
        Ok(api_key)
    }

    pub async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Principal>, sqlx::Error> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, kind, claiming_human_id FROM principals WHERE api_key_hash = ?1",
        )
        .bind(hash_api_key(api_key))
        .fetch_optional(&**self)
        .await?;

        row.map(PrincipalRow::into_principal).transpose()
    }
}

#[async_trait]
impl AgentDirectory for Database {
    type Error = sqlx::Error;

    async fn find_agent(&self, id: &str) -> Result<Option<Principal>, Self::Error> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, kind, claiming_human_id FROM principals WHERE id = ?1 AND kind = 'agent'",
        )
        .bind(id)
        .fetch_optional(&**self)
        .await?;

        row.map(PrincipalRow::into_principal).transpose()
    }
}
