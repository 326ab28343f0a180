//! Database primitives: settings, connection and the SeaORM-backed vendor store.

use async_trait::async_trait;
use chrono::Utc;
use entity::{
    users,
    vendors::{self, VendorTier},
};
use platform_authz::{Role, StoreError, Tier, VendorRecord, VendorStore};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set, Statement,
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (env {0})")]
    MissingUrl(String),
    #[error("vendor {0} not found")]
    VendorNotFound(Uuid),
    #[error(transparent)]
    Orm(#[from] sea_orm::DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Where to find the database URL.
#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    env_key: String,
    url: Option<String>,
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self::new(default_url_key())
    }
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            url: None,
        }
    }

    pub fn from_env() -> Self {
        Self::default()
    }

    /// Use a fixed URL instead of reading the environment.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn database_url(&self) -> DbResult<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl(self.env_key.clone()))
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url()?;
    let pool = Database::connect(&url).await?;
    debug!(backend = ?pool.get_database_backend(), "database connected");
    Ok(pool)
}

pub fn tier_from_entity(tier: VendorTier) -> Tier {
    match tier {
        VendorTier::Free => Tier::Free,
        VendorTier::Tier1 => Tier::Tier1,
        VendorTier::Tier2 => Tier::Tier2,
    }
}

pub fn tier_to_entity(tier: Tier) -> VendorTier {
    match tier {
        Tier::Free => VendorTier::Free,
        Tier::Tier1 => VendorTier::Tier1,
        Tier::Tier2 => VendorTier::Tier2,
    }
}

/// [`VendorStore`] over the `vendors` table.
#[derive(Debug)]
pub struct VendorDirectory {
    pool: DbPool,
}

impl VendorDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn into_inner(self) -> DbPool {
        self.pool
    }
}

#[async_trait]
impl VendorStore for VendorDirectory {
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<VendorRecord>, StoreError> {
        // Only UUIDs can own a vendor row.
        let Ok(owner) = Uuid::parse_str(user_id) else {
            debug!(user_id, "actor id is not a uuid; no vendor lookup");
            return Ok(Vec::new());
        };
        let rows = vendors::Entity::find()
            .filter(vendors::Column::UserId.eq(owner))
            .all(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(VendorRecord {
                    id: row.id.to_string(),
                    user: row.user_id?.to_string(),
                    tier: tier_from_entity(row.tier),
                })
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let backend = self.pool.get_database_backend();
        self.pool
            .execute(Statement::from_string(backend, "SELECT 1".to_string()))
            .await
            .map(|_| ())
            .map_err(StoreError::backend)
    }
}

/// Insert a user unless one with `email` already exists.
pub async fn upsert_user(pool: &DbPool, email: &str, role: &Role) -> DbResult<users::Model> {
    if let Some(existing) = users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(pool)
        .await?
    {
        return Ok(existing);
    }
    let model = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        role: Set(role.as_str().to_string()),
        created_at: Set(Utc::now().into()),
    };
    Ok(model.insert(pool).await?)
}

pub async fn create_vendor(
    pool: &DbPool,
    owner: Option<Uuid>,
    company_name: &str,
    tier: Tier,
) -> DbResult<vendors::Model> {
    let model = vendors::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(owner),
        company_name: Set(company_name.to_string()),
        tier: Set(tier_to_entity(tier)),
        created_at: Set(Utc::now().into()),
    };
    Ok(model.insert(pool).await?)
}

/// Tier changes normally come from the admin approval workflow.
pub async fn set_vendor_tier(pool: &DbPool, vendor_id: Uuid, tier: Tier) -> DbResult<vendors::Model> {
    let vendor = vendors::Entity::find_by_id(vendor_id)
        .one(pool)
        .await?
        .ok_or(DbError::VendorNotFound(vendor_id))?;
    let mut active: vendors::ActiveModel = vendor.into();
    active.tier = Set(tier_to_entity(tier));
    Ok(active.update(pool).await?)
}

#[derive(Clone, Debug)]
pub struct SeededUser {
    pub user: users::Model,
    pub vendor: Option<vendors::Model>,
}

/// Demo fixtures: one admin plus one vendor per tier.
pub async fn seed_fixtures(pool: &DbPool) -> DbResult<Vec<SeededUser>> {
    let mut seeded = Vec::new();
    let admin = upsert_user(pool, "admin@example.com", &Role::Admin).await?;
    seeded.push(SeededUser {
        user: admin,
        vendor: None,
    });
    for tier in Tier::ORDER {
        let email = format!("{tier}@vendors.example.com");
        let user = upsert_user(pool, &email, &Role::Vendor).await?;
        let vendor = match vendors::Entity::find()
            .filter(vendors::Column::UserId.eq(user.id))
            .one(pool)
            .await?
        {
            Some(existing) => existing,
            None => {
                let company = format!("{} Marine Systems", tier.display_name());
                create_vendor(pool, Some(user.id), &company, tier).await?
            }
        };
        seeded.push(SeededUser {
            user,
            vendor: Some(vendor),
        });
    }
    info!(count = seeded.len(), "fixtures seeded");
    Ok(seeded)
}
