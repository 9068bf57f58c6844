//! services/api/src/profile.rs
//!
//! Health profiles for guests (local key-value storage) and signed-in users
//! (hosted database, with local storage as the fallback when it is unavailable).

use chrono::Utc;
use medscan_core::domain::HealthProfile;
use medscan_core::ports::{KeyValueStore, PortError, PortResult, ProfileRepository};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

pub const GUEST_PROFILE_KEY: &str = "medscan_guest_profile";

/// Who is making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Guest,
    User(Uuid),
}

impl Identity {
    /// The owner that session and contact storage is scoped to. Guests share
    /// the unscoped, device-local keys.
    pub fn storage_owner(self) -> Option<String> {
        match self {
            Identity::Guest => None,
            Identity::User(user_id) => Some(format!("user_{}", user_id)),
        }
    }
}

fn local_profile_key(identity: Identity) -> String {
    match identity {
        Identity::Guest => GUEST_PROFILE_KEY.to_string(),
        Identity::User(user_id) => format!("medscan_auth_profile_{}", user_id),
    }
}

pub struct ProfileService {
    kv: Arc<dyn KeyValueStore>,
    repository: Option<Arc<dyn ProfileRepository>>,
}

impl ProfileService {
    pub fn new(kv: Arc<dyn KeyValueStore>, repository: Option<Arc<dyn ProfileRepository>>) -> Self {
        Self { kv, repository }
    }

    /// Stamps `updated_at` and stores the profile. A failing database write
    /// is absorbed by the local fallback.
    pub async fn save(&self, identity: Identity, mut profile: HealthProfile) -> PortResult<HealthProfile> {
        profile.updated_at = Some(Utc::now());

        if let (Identity::User(user_id), Some(repository)) = (identity, &self.repository) {
            match repository.upsert_profile(user_id, &profile).await {
                Ok(()) => return Ok(profile),
                Err(e) => warn!(
                    "Profile upsert for user {} failed, keeping it locally: {}",
                    user_id, e
                ),
            }
        }

        let raw = serde_json::to_string(&profile).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.kv.set(&local_profile_key(identity), &raw)?;
        Ok(profile)
    }

    /// Loads the profile. Every failure reads as "no profile".
    pub async fn load(&self, identity: Identity) -> Option<HealthProfile> {
        if let (Identity::User(user_id), Some(repository)) = (identity, &self.repository) {
            match repository.get_profile(user_id).await {
                Ok(Some(profile)) => return Some(profile),
                Ok(None) => {}
                Err(e) => error!("Failed to load profile for user {}: {}", user_id, e),
            }
        }

        let raw = self.kv.get(&local_profile_key(identity)).ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Discarding unreadable stored profile: {}", e);
                None
            }
        }
    }

    /// The prompt block for the caller's profile, if one exists.
    pub async fn context_block(&self, identity: Identity) -> Option<String> {
        self.load(identity).await.map(|profile| render_context_block(&profile))
    }
}

fn or_none(value: &str) -> &str {
    if value.trim().is_empty() {
        "None"
    } else {
        value.trim()
    }
}

/// Renders background health information as an instruction block for the model.
pub fn render_context_block(profile: &HealthProfile) -> String {
    let conditions = profile.conditions.join(", ");
    format!(
        "\n--- USER HEALTH PROFILE CONTEXT ---\n\
         Use this background info to personalize the response.\n\
         - Name: {}\n\
         - Age Group: {}\n\
         - Gender: {}\n\
         - Known Conditions: {}\n\
         - Allergies: {}\n\
         - Current Medications: {}\n\
         - Preferred Language: {}\n\
         \n\
         SAFETY INSTRUCTIONS:\n\
         1. Check for contraindications with known conditions/meds if suggesting treatments.\n\
         2. If Age Group is \"Under 12\" or \"60+\", use simpler language and extra caution.\n\
         3. If allergies are listed, explicitly warn against those substances if relevant.\n\
         -----------------------------------\n",
        profile.full_name,
        profile.age_group,
        profile.gender,
        or_none(&conditions),
        or_none(&profile.allergies),
        or_none(&profile.medications),
        profile.preferred_language,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medscan_core::store::InMemoryStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryRepository {
        rows: Mutex<HashMap<Uuid, HealthProfile>>,
    }

    #[async_trait]
    impl ProfileRepository for MemoryRepository {
        async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<HealthProfile>> {
            Ok(self.rows.lock().unwrap().get(&user_id).cloned())
        }

        async fn upsert_profile(&self, user_id: Uuid, profile: &HealthProfile) -> PortResult<()> {
            self.rows.lock().unwrap().insert(user_id, profile.clone());
            Ok(())
        }
    }

    struct BrokenRepository;

    #[async_trait]
    impl ProfileRepository for BrokenRepository {
        async fn get_profile(&self, _user_id: Uuid) -> PortResult<Option<HealthProfile>> {
            Err(PortError::Unexpected("relation does not exist".to_string()))
        }

        async fn upsert_profile(&self, _user_id: Uuid, _profile: &HealthProfile) -> PortResult<()> {
            Err(PortError::Unexpected("relation does not exist".to_string()))
        }
    }

    fn profile() -> HealthProfile {
        HealthProfile {
            full_name: "Sunita Rao".to_string(),
            age_group: "60+".to_string(),
            conditions: vec!["Diabetes".to_string(), "Asthma".to_string()],
            allergies: "Penicillin".to_string(),
            preferred_language: "Marathi".to_string(),
            ..HealthProfile::default()
        }
    }

    #[tokio::test]
    async fn guest_profile_lives_in_local_storage() {
        let kv = Arc::new(InMemoryStore::new());
        let repository: Arc<dyn ProfileRepository> = Arc::new(MemoryRepository::default());
        let service = ProfileService::new(kv.clone(), Some(repository));

        let saved = service.save(Identity::Guest, profile()).await.unwrap();

        assert!(saved.updated_at.is_some());
        assert!(kv.get(GUEST_PROFILE_KEY).unwrap().is_some());
        assert_eq!(service.load(Identity::Guest).await, Some(saved));
    }

    #[tokio::test]
    async fn signed_in_profile_goes_to_the_repository() {
        let kv = Arc::new(InMemoryStore::new());
        let repository = Arc::new(MemoryRepository::default());
        let service = ProfileService::new(kv.clone(), Some(repository.clone() as Arc<dyn ProfileRepository>));
        let user = Uuid::new_v4();

        service.save(Identity::User(user), profile()).await.unwrap();

        assert!(repository.rows.lock().unwrap().contains_key(&user));
        assert!(kv.get(&format!("medscan_auth_profile_{}", user)).unwrap().is_none());
        assert!(service.load(Identity::Guest).await.is_none());
    }

    #[tokio::test]
    async fn repository_failure_falls_back_to_local_storage() {
        let kv = Arc::new(InMemoryStore::new());
        let repository: Arc<dyn ProfileRepository> = Arc::new(BrokenRepository);
        let service = ProfileService::new(kv, Some(repository));
        let user = Uuid::new_v4();

        let saved = service.save(Identity::User(user), profile()).await.unwrap();

        assert_eq!(service.load(Identity::User(user)).await, Some(saved));
    }

    #[test]
    fn context_block_lists_conditions_and_defaults() {
        let block = render_context_block(&profile());
        assert!(block.contains("Known Conditions: Diabetes, Asthma"));
        assert!(block.contains("Allergies: Penicillin"));
        assert!(block.contains("Current Medications: None"));
    }
}
