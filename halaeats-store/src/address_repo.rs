use async_trait::async_trait;
use halaeats_core::{Address, AddressDraft, AddressService, CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::storage_err;

pub struct PgAddressService {
    pool: PgPool,
}

impl PgAddressService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert(&self, address: &Address) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND id <> $2")
                .bind(&address.user_id)
                .bind(address.id)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
        }

        sqlx::query(
            r#"
            INSERT INTO addresses (id, user_id, label, line1, line2, city, state, postal_code, instructions, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                label = EXCLUDED.label,
                line1 = EXCLUDED.line1,
                line2 = EXCLUDED.line2,
                city = EXCLUDED.city,
                state = EXCLUDED.state,
                postal_code = EXCLUDED.postal_code,
                instructions = EXCLUDED.instructions,
                is_default = EXCLUDED.is_default
            "#,
        )
        .bind(address.id)
        .bind(&address.user_id)
        .bind(&address.label)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.instructions)
        .bind(address.is_default)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    user_id: String,
    label: Option<String>,
    line1: String,
    line2: Option<String>,
    city: String,
    state: Option<String>,
    postal_code: String,
    instructions: Option<String>,
    is_default: bool,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Address {
            id: row.id,
            user_id: row.user_id,
            label: row.label,
            line1: row.line1,
            line2: row.line2,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            instructions: row.instructions,
            is_default: row.is_default,
        }
    }
}

#[async_trait]
impl AddressService for PgAddressService {
    async fn get_user_addresses(&self, user_id: &str) -> CoreResult<Vec<Address>> {
        let rows: Vec<AddressRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, label, line1, line2, city, state, postal_code, instructions, is_default
            FROM addresses
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn save_address(&self, user_id: &str, draft: AddressDraft) -> CoreResult<Address> {
        draft.validate()?;
        let mut address = Address::from_draft(user_id, draft);
        address.id = Uuid::new_v4();
        self.upsert(&address).await?;
        Ok(address)
    }

    async fn update_address(&self, address: Address) -> CoreResult<Address> {
        let owner: Option<(String,)> = sqlx::query_as("SELECT user_id FROM addresses WHERE id = $1")
            .bind(address.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match owner {
            Some((user_id,)) if user_id == address.user_id => {
                self.upsert(&address).await?;
                Ok(address)
            }
            _ => Err(CoreError::NotFound(format!("address {}", address.id))),
        }
    }
}
