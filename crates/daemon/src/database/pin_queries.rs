use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use time::OffsetDateTime;
use uuid::Uuid;

use common::access::{Owner, OwnerKind};
use common::pins::{NewPin, Pin, PinListOptions, PinStatus, PinStore, PinStoreError, TextMatch};

use crate::database::types::{DJson, DPinStatus, DTimestamp, DUuid};
use crate::database::Database;

const PIN_COLUMNS: &str = "id, cid, status, name, origins, meta, delegates, owner_id, \
     owner_kind, size_bytes, created_at, updated_at, pinned_at";

#[derive(Debug, FromRow)]
struct PinRow {
    id: DUuid,
    cid: String,
    status: DPinStatus,
    name: String,
    origins: DJson<Vec<String>>,
    meta: DJson<BTreeMap<String, String>>,
    delegates: DJson<Vec<String>>,
    owner_id: String,
    owner_kind: String,
    size_bytes: Option<i64>,
    created_at: DTimestamp,
    updated_at: DTimestamp,
    pinned_at: Option<DTimestamp>,
}

impl PinRow {
    fn into_pin(self) -> Result<Pin, sqlx::Error> {
        let kind: OwnerKind = self
            .owner_kind
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Pin {
            id: self.id.into(),
            cid: self.cid,
            status: self.status.into(),
            name: self.name,
            origins: self.origins.into_inner(),
            meta: self.meta.into_inner(),
            delegates: self.delegates.into_inner(),
            owner: Owner::new(self.owner_id, kind),
            size_bytes: self.size_bytes.map(|s| s.max(0) as u64),
            created_at: self.created_at.into(),
            updated_at: self.updated_at.into(),
            pinned_at: self.pinned_at.map(Into::into),
        })
    }
}

/// Append the WHERE clause shared by the listing and its count
fn push_list_filters(qb: &mut QueryBuilder<'_, Sqlite>, owner: &Owner, options: &PinListOptions) {
    qb.push(" WHERE owner_id = ")
        .push_bind(owner.id.clone())
        .push(" AND owner_kind = ")
        .push_bind(owner.kind.as_str());

    if !options.cids.is_empty() {
        qb.push(" AND cid IN (");
        let mut cids = qb.separated(", ");
        for cid in &options.cids {
            cids.push_bind(cid.clone());
        }
        cids.push_unseparated(")");
    }

    if let Some(name) = &options.name {
        let clause = match options.name_match {
            TextMatch::Exact => " AND name = ",
            TextMatch::IExact => " AND lower(name) = lower(",
            TextMatch::Partial => " AND instr(name, ",
            TextMatch::IPartial => " AND instr(lower(name), lower(",
        };
        qb.push(clause).push_bind(name.clone());
        qb.push(match options.name_match {
            TextMatch::Exact => "",
            TextMatch::IExact => ")",
            TextMatch::Partial => ") > 0",
            TextMatch::IPartial => ")) > 0",
        });
    }

    if !options.statuses.is_empty() {
        qb.push(" AND status IN (");
        let mut statuses = qb.separated(", ");
        for status in &options.statuses {
            statuses.push_bind(DPinStatus::from(*status));
        }
        statuses.push_unseparated(")");
    }

    for (key, value) in &options.meta {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(pins.meta) WHERE json_each.key = ")
            .push_bind(key.clone())
            .push(" AND json_each.value = ")
            .push_bind(value.clone())
            .push(")");
    }

    if let Some(before) = options.before {
        qb.push(" AND created_at < ")
            .push_bind(DTimestamp::from(before));
    }
    if let Some(after) = options.after {
        qb.push(" AND created_at > ").push_bind(DTimestamp::from(after));
    }
}

impl Database {
    async fn current_status(&self, id: Uuid) -> Result<Option<PinStatus>, sqlx::Error> {
        let status: Option<DPinStatus> =
            sqlx::query_scalar("SELECT status FROM pins WHERE id = ?1")
                .bind(DUuid::from(id))
                .fetch_optional(&**self)
                .await?;
        Ok(status.map(Into::into))
    }

    /// Resolve why a conditional update touched no rows
    async fn transition_error(
        &self,
        id: Uuid,
        to: PinStatus,
    ) -> PinStoreError<sqlx::Error> {
        match self.current_status(id).await {
            Ok(Some(from)) => PinStoreError::InvalidTransition { from, to },
            Ok(None) => PinStoreError::NotFound,
            Err(e) => PinStoreError::Provider(e),
        }
    }

    async fn transition(
        &self,
        id: Uuid,
        status: PinStatus,
        size_bytes: Option<u64>,
    ) -> Result<(), PinStoreError<sqlx::Error>> {
        let Some(from) = status.predecessor() else {
            return Err(self.transition_error(id, status).await);
        };

        let now = DTimestamp::now();
        let pinned_at = (status == PinStatus::Pinned).then_some(now);
        let size_bytes = size_bytes.map(|s| i64::try_from(s).unwrap_or(i64::MAX));

        let result = sqlx::query(
            r#"
            UPDATE pins
            SET status = ?1,
                updated_at = ?2,
                size_bytes = COALESCE(?3, size_bytes),
                pinned_at = COALESCE(?4, pinned_at)
            WHERE id = ?5 AND status = ?6
            "#,
        )
        .bind(DPinStatus::from(status))
        .bind(now)
        .bind(size_bytes)
        .bind(pinned_at)
        .bind(DUuid::from(id))
        .bind(DPinStatus::from(from))
        .execute(&**self)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(id, status).await);
        }
        Ok(())
    }
}

#[async_trait]
impl PinStore for Database {
    type Error = sqlx::Error;

    async fn create(&self, pin: NewPin) -> Result<Pin, PinStoreError<Self::Error>> {
        let id = DUuid::new();
        let now = DTimestamp::now();

        let result = sqlx::query(
            r#"
            INSERT INTO pins (
                id, cid, status, name, origins, meta, delegates,
                owner_id, owner_kind, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(id)
        .bind(&pin.cid)
        .bind(DPinStatus::from(PinStatus::Queued))
        .bind(&pin.name)
        .bind(DJson(pin.origins.clone()))
        .bind(DJson(pin.meta.clone()))
        .bind(DJson(Vec::<String>::new()))
        .bind(&pin.owner.id)
        .bind(pin.owner.kind.as_str())
        .bind(now)
        .execute(&**self)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(PinStoreError::DuplicatePin);
            }
            Err(e) => return Err(PinStoreError::Provider(e)),
        }

        self.get_by_id(*id).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Pin, PinStoreError<Self::Error>> {
        let row = sqlx::query_as::<_, PinRow>(&format!(
            "SELECT {} FROM pins WHERE id = ?1",
            PIN_COLUMNS
        ))
        .bind(DUuid::from(id))
        .fetch_optional(&**self)
        .await?;

        row.ok_or(PinStoreError::NotFound)?
            .into_pin()
            .map_err(PinStoreError::Provider)
    }

    async fn get_by_cid(
        &self,
        cid: &str,
        owner_id: &str,
    ) -> Result<Pin, PinStoreError<Self::Error>> {
        let row = sqlx::query_as::<_, PinRow>(&format!(
            "SELECT {} FROM pins WHERE cid = ?1 AND owner_id = ?2",
            PIN_COLUMNS
        ))
        .bind(cid)
        .bind(owner_id)
        .fetch_optional(&**self)
        .await?;

        row.ok_or(PinStoreError::NotFound)?
            .into_pin()
            .map_err(PinStoreError::Provider)
    }

    async fn list_by_owner(
        &self,
        owner: &Owner,
        options: &PinListOptions,
    ) -> Result<(Vec<Pin>, u64), PinStoreError<Self::Error>> {
        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM pins");
        push_list_filters(&mut count_query, owner, options);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&**self)
            .await?;

        let mut list_query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM pins", PIN_COLUMNS));
        push_list_filters(&mut list_query, owner, options);
        list_query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(options.limit));
        let rows: Vec<PinRow> = list_query.build_query_as().fetch_all(&**self).await?;

        let pins = rows
            .into_iter()
            .map(PinRow::into_pin)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((pins, total.max(0) as u64))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PinStatus,
    ) -> Result<(), PinStoreError<Self::Error>> {
        self.transition(id, status, None).await
    }

    async fn update_status_and_size(
        &self,
        id: Uuid,
        status: PinStatus,
        size_bytes: u64,
    ) -> Result<(), PinStoreError<Self::Error>> {
        self.transition(id, status, Some(size_bytes)).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), PinStoreError<Self::Error>> {
        let result = sqlx::query("DELETE FROM pins WHERE id = ?1")
            .bind(DUuid::from(id))
            .execute(&**self)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PinStoreError::NotFound);
        }
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: PinStatus,
        updated_before: OffsetDateTime,
    ) -> Result<Vec<Pin>, PinStoreError<Self::Error>> {
        let rows = sqlx::query_as::<_, PinRow>(&format!(
            "SELECT {} FROM pins WHERE status = ?1 AND updated_at < ?2 \
             ORDER BY updated_at ASC, rowid ASC",
            PIN_COLUMNS
        ))
        .bind(DPinStatus::from(status))
        .bind(DTimestamp::from(updated_before))
        .fetch_all(&**self)
        .await?;

        Ok(rows
            .into_iter()
            .map(PinRow::into_pin)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
