use blogpipe_common::config::PublisherConfig;
use blogpipe_common::types::{Publisher, PublisherStatus};
use blogpipe_common::{BlogPipeError, PublisherId};
use rand::Rng;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;

use crate::reservation::SlotReservation;

#[derive(Debug, Error)]
pub enum PublisherStoreError {
    #[error("publisher not found")]
    NotFound,
    #[error("domain already registered: {0}")]
    DomainTaken(String),
    #[error("no remaining blog slots for this publisher")]
    SlotsExhausted,
    #[error("api key does not match publisher")]
    ApiKeyMismatch,
    #[error("config merge error: {0}")]
    ConfigMerge(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl From<PublisherStoreError> for BlogPipeError {
    fn from(e: PublisherStoreError) -> Self {
        match e {
            PublisherStoreError::NotFound => BlogPipeError::NotFound("publisher".into()),
            PublisherStoreError::DomainTaken(domain) => BlogPipeError::DomainTaken(domain),
            PublisherStoreError::SlotsExhausted => BlogPipeError::UsageLimitExceeded,
            PublisherStoreError::ApiKeyMismatch => BlogPipeError::Auth("api key mismatch".into()),
            PublisherStoreError::ConfigMerge(msg) => BlogPipeError::Internal(msg),
            PublisherStoreError::Db(e) => BlogPipeError::Postgres(e.to_string()),
            PublisherStoreError::Serde(e) => BlogPipeError::Serialization(e),
        }
    }
}

/// PublisherStore: source of truth for publisher identity,
/// config, status, and quota counters. `PgPool` is an `Arc` internally, so
/// cloning `PublisherStore` is cheap and safe to hand to background tasks
/// (the [`SlotReservation`] drop guard does exactly this).
#[derive(Clone)]
pub struct PublisherStore {
    pool: PgPool,
}

impl PublisherStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, PublisherStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn health_check(&self) -> Result<(), PublisherStoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn migrate(&self) -> Result<(), PublisherStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PublisherStoreError::Db(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Creates a publisher with a fresh high-entropy API key. The key is
    /// returned here exactly once; callers must persist it themselves
    ///.
    pub async fn create(
        &self,
        name: &str,
        domain: &str,
        email: &str,
        config: PublisherConfig,
    ) -> Result<(Publisher, String), PublisherStoreError> {
        let domain = normalize_domain(domain);
        let api_key = generate_api_key();
        let config_json = serde_json::to_value(&config)?;

        let row = sqlx::query(
            r#"
            INSERT INTO publishers (id, name, domain, email, api_key, status, config, total_blogs_processed, blog_slots_reserved, created_at, updated_at)
            VALUES (gen_random_uuid(), $1, $2, $3, $4, 'trial', $5, 0, 0, now(), now())
            RETURNING id, name, domain, email, status, config, total_blogs_processed, blog_slots_reserved, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(&domain)
        .bind(email)
        .bind(&api_key)
        .bind(&config_json)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PublisherStoreError::DomainTaken(domain.clone())
            }
            _ => PublisherStoreError::Db(e),
        })?;

        Ok((row_to_publisher(&row)?, api_key))
    }

    pub async fn by_api_key(&self, api_key: &str) -> Result<Publisher, PublisherStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, domain, email, status, config, total_blogs_processed, blog_slots_reserved, created_at, updated_at
            FROM publishers WHERE api_key = $1
            "#,
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PublisherStoreError::NotFound)?;

        row_to_publisher(&row)
    }

    /// Looks up a publisher by request host. When `allow_subdomain` is true,
    /// a host that is a subdomain of `publishers.domain` also matches.
    pub async fn by_domain(
        &self,
        domain: &str,
        allow_subdomain: bool,
    ) -> Result<Publisher, PublisherStoreError> {
        let domain = normalize_domain(domain);

        let row = if allow_subdomain {
            sqlx::query(
                r#"
                SELECT id, name, domain, email, status, config, total_blogs_processed, blog_slots_reserved, created_at, updated_at
                FROM publishers
                WHERE domain = $1 OR $1 LIKE '%.' || domain
                "#,
            )
            .bind(&domain)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT id, name, domain, email, status, config, total_blogs_processed, blog_slots_reserved, created_at, updated_at
                FROM publishers WHERE domain = $1
                "#,
            )
            .bind(&domain)
            .fetch_optional(&self.pool)
            .await?
        };

        row_to_publisher(&row.ok_or(PublisherStoreError::NotFound)?)
    }

    pub async fn by_id(&self, publisher_id: PublisherId) -> Result<Publisher, PublisherStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, domain, email, status, config, total_blogs_processed, blog_slots_reserved, created_at, updated_at
            FROM publishers WHERE id = $1
            "#,
        )
        .bind(publisher_id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PublisherStoreError::NotFound)?;

        row_to_publisher(&row)
    }

    /// Atomically reserves one blog slot against `max_total_blogs`. Takes a row-level exclusive lock with `SELECT ... FOR UPDATE`
    /// before comparing `blog_slots_reserved + total_blogs_processed`
    /// against the cap, so two concurrent reservations against the same
    /// publisher can never both succeed past the limit.
    ///
    /// `max_total_blogs = None` means unlimited; the slot is still tracked
    /// so later tightening of the cap has an accurate count to work from.
    pub async fn reserve_slot(
        &self,
        publisher_id: PublisherId,
    ) -> Result<SlotReservation, PublisherStoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT config, total_blogs_processed, blog_slots_reserved
            FROM publishers WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(publisher_id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(PublisherStoreError::NotFound)?;

        let config_json: serde_json::Value = row.try_get("config")?;
        let config: PublisherConfig = serde_json::from_value(config_json)?;
        let processed: i64 = row.try_get("total_blogs_processed")?;
        let reserved: i64 = row.try_get("blog_slots_reserved")?;

        if let Some(max) = config.max_total_blogs {
            if (processed + reserved) as u64 >= max {
                return Err(PublisherStoreError::SlotsExhausted);
            }
        }

        sqlx::query("UPDATE publishers SET blog_slots_reserved = blog_slots_reserved + 1, updated_at = now() WHERE id = $1")
            .bind(publisher_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(SlotReservation::new(self.clone(), publisher_id))
    }

    /// Releases a previously reserved slot. When `processed` is true the
    /// slot graduates into `total_blogs_processed` (job completed
    /// successfully); otherwise it is simply freed (job failed permanently,
    /// was cancelled, or the reservation was abandoned).
    pub async fn release_slot(
        &self,
        publisher_id: PublisherId,
        processed: bool,
    ) -> Result<(), PublisherStoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT 1 FROM publishers WHERE id = $1 FOR UPDATE")
            .bind(publisher_id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(PublisherStoreError::NotFound)?;

        if processed {
            sqlx::query(
                r#"
                UPDATE publishers
                SET blog_slots_reserved = GREATEST(blog_slots_reserved - 1, 0),
                    total_blogs_processed = total_blogs_processed + 1,
                    updated_at = now()
                WHERE id = $1
                "#,
            )
        } else {
            sqlx::query(
                r#"
                UPDATE publishers
                SET blog_slots_reserved = GREATEST(blog_slots_reserved - 1, 0),
                    updated_at = now()
                WHERE id = $1
                "#,
            )
        }
        .bind(publisher_id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Applies a partial config patch,
    /// requiring the caller's API key to match the publisher being updated.
    pub async fn update_config(
        &self,
        publisher_id: PublisherId,
        api_key: &str,
        patch: &serde_json::Value,
    ) -> Result<Publisher, PublisherStoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT api_key, config FROM publishers WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(publisher_id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(PublisherStoreError::NotFound)?;

        let stored_key: String = row.try_get("api_key")?;
        if stored_key != api_key {
            return Err(PublisherStoreError::ApiKeyMismatch);
        }

        let config_json: serde_json::Value = row.try_get("config")?;
        let current: PublisherConfig = serde_json::from_value(config_json)?;
        let merged = current
            .merge_patch(patch)
            .map_err(|e| PublisherStoreError::ConfigMerge(e.to_string()))?;
        let merged_json = serde_json::to_value(&merged)?;

        let row = sqlx::query(
            r#"
            UPDATE publishers SET config = $2, updated_at = now() WHERE id = $1
            RETURNING id, name, domain, email, status, config, total_blogs_processed, blog_slots_reserved, created_at, updated_at
            "#,
        )
        .bind(publisher_id.0)
        .bind(&merged_json)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row_to_publisher(&row)
    }

    /// Returns `(publisher_id, blog_slots_reserved)` for every publisher —
    /// feeds the opt-in slot-reconciliation sweep.
    pub async fn all_reserved_counts(&self) -> Result<Vec<(PublisherId, i64)>, PublisherStoreError> {
        let rows = sqlx::query("SELECT id, blog_slots_reserved FROM publishers")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let id: uuid::Uuid = row.try_get("id")?;
                let reserved: i64 = row.try_get("blog_slots_reserved")?;
                Ok((PublisherId::from_uuid(id), reserved))
            })
            .collect()
    }

    pub async fn set_status(
        &self,
        publisher_id: PublisherId,
        status: PublisherStatus,
    ) -> Result<(), PublisherStoreError> {
        let result = sqlx::query("UPDATE publishers SET status = $2, updated_at = now() WHERE id = $1")
            .bind(publisher_id.0)
            .bind(status.as_db_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PublisherStoreError::NotFound);
        }
        Ok(())
    }
}

fn row_to_publisher(row: &sqlx::postgres::PgRow) -> Result<Publisher, PublisherStoreError> {
    let config_json: serde_json::Value = row.try_get("config")?;
    let config: PublisherConfig = serde_json::from_value(config_json)?;
    let status: String = row.try_get("status")?;

    Ok(Publisher {
        id: PublisherId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        domain: row.try_get("domain")?,
        email: row.try_get("email")?,
        status: PublisherStatus::from_db_str(&status),
        config,
        total_blogs_processed: row.try_get("total_blogs_processed")?,
        blog_slots_reserved: row.try_get("blog_slots_reserved")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    lower.strip_prefix("www.").unwrap_or(&lower).to_string()
}

fn generate_api_key() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let body: String = (0..40)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("bp_{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_domain_strips_www_and_lowercases() {
        assert_eq!(normalize_domain("WWW.Example.com"), "example.com");
        assert_eq!(normalize_domain("example.com"), "example.com");
    }

    #[test]
    fn generate_api_key_has_expected_shape() {
        let key = generate_api_key();
        assert!(key.starts_with("bp_"));
        assert_eq!(key.len(), 43);
    }
}
