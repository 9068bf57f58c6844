//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ProfileRepository` port from the `core` crate. It stores health profiles
//! of signed-in users in PostgreSQL using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medscan_core::domain::HealthProfile;
use medscan_core::ports::{PortError, PortResult, ProfileRepository};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ProfileRepository` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    full_name: String,
    age_group: String,
    gender: String,
    conditions: Vec<String>,
    allergies: String,
    medications: String,
    emergency_contact_name: String,
    emergency_contact_phone: String,
    blood_group: String,
    preferred_language: String,
    updated_at: Option<DateTime<Utc>>,
}

impl ProfileRecord {
    fn to_domain(self) -> HealthProfile {
        HealthProfile {
            full_name: self.full_name,
            age_group: self.age_group,
            gender: self.gender,
            conditions: self.conditions,
            allergies: self.allergies,
            medications: self.medications,
            emergency_contact_name: self.emergency_contact_name,
            emergency_contact_phone: self.emergency_contact_phone,
            blood_group: self.blood_group,
            preferred_language: self.preferred_language,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// `ProfileRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileRepository for DbAdapter {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<HealthProfile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT full_name, age_group, gender, conditions, allergies, medications, \
             emergency_contact_name, emergency_contact_phone, blood_group, preferred_language, updated_at \
             FROM user_health_profile WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(ProfileRecord::to_domain))
    }

    async fn upsert_profile(&self, user_id: Uuid, profile: &HealthProfile) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_health_profile (user_id, full_name, age_group, gender, conditions, \
             allergies, medications, emergency_contact_name, emergency_contact_phone, blood_group, \
             preferred_language, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (user_id) DO UPDATE SET \
             full_name = EXCLUDED.full_name, age_group = EXCLUDED.age_group, gender = EXCLUDED.gender, \
             conditions = EXCLUDED.conditions, allergies = EXCLUDED.allergies, \
             medications = EXCLUDED.medications, emergency_contact_name = EXCLUDED.emergency_contact_name, \
             emergency_contact_phone = EXCLUDED.emergency_contact_phone, blood_group = EXCLUDED.blood_group, \
             preferred_language = EXCLUDED.preferred_language, updated_at = EXCLUDED.updated_at",
        )
        .bind(user_id)
        .bind(&profile.full_name)
        .bind(&profile.age_group)
        .bind(&profile.gender)
        .bind(&profile.conditions)
        .bind(&profile.allergies)
        .bind(&profile.medications)
        .bind(&profile.emergency_contact_name)
        .bind(&profile.emergency_contact_phone)
        .bind(&profile.blood_group)
        .bind(&profile.preferred_language)
        .bind(profile.updated_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
