use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use halador_core::auth::AuthContext;
use halador_core::profile::{ContactUpdate, Profile, Role};
use halador_core::repository::ProfileRepository;
use halador_core::{CoreError, CoreResult};

/// Profile lifecycle: creation at signup, the explicit repair step at
/// session initialization, and owner edits of contact/vehicle fields.
pub struct AccountService {
    profiles: Arc<dyn ProfileRepository>,
}

impl AccountService {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { profiles }
    }

    /// Create the profile that backs a fresh identity. The role chosen here
    /// is permanent; there is no later write path for it. Admin profiles
    /// are provisioned out of band, never through signup.
    pub async fn register_profile(
        &self,
        user_id: Uuid,
        full_name: &str,
        role: Role,
        phone: Option<String>,
    ) -> CoreResult<Profile> {
        if full_name.trim().is_empty() {
            return Err(CoreError::ValidationError("full name is required".into()));
        }
        if role == Role::Admin {
            return Err(CoreError::ValidationError(
                "admin accounts cannot be self-registered".into(),
            ));
        }

        let mut profile = Profile::new(user_id, full_name.trim(), role);
        profile.phone = phone;
        self.profiles.insert(&profile).await?;
        info!(user = %user_id, role = role.as_str(), "profile created");
        Ok(profile)
    }

    /// Named repair operation for the create-if-missing behavior: called by
    /// the login path, never hidden inside a read. A missing row (backend
    /// reset, partial signup) is recreated with passenger defaults so the
    /// session can proceed.
    pub async fn repair_profile(&self, user_id: Uuid, fallback_name: &str) -> CoreResult<Profile> {
        if let Some(profile) = self.profiles.get(user_id).await? {
            return Ok(profile);
        }

        warn!(user = %user_id, "profile row missing, recreating with passenger defaults");
        let name = if fallback_name.trim().is_empty() {
            "Usuario"
        } else {
            fallback_name.trim()
        };
        let profile = Profile::new(user_id, name, Role::Passenger);
        self.profiles.insert(&profile).await?;
        Ok(profile)
    }

    pub async fn get(&self, user_id: Uuid) -> CoreResult<Profile> {
        self.profiles
            .get(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("profile {}", user_id)))
    }

    /// Owner edit of phone and vehicle fields.
    pub async fn update_contact(
        &self,
        auth: &AuthContext,
        update: &ContactUpdate,
    ) -> CoreResult<Profile> {
        if let Some(plate) = &update.car_plate {
            if plate.trim().is_empty() {
                return Err(CoreError::ValidationError("plate cannot be blank".into()));
            }
        }
        self.profiles.update_contact(auth.user_id, update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halador_core::memory::MemoryStore;

    fn service() -> (Arc<MemoryStore>, AccountService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), AccountService::new(store))
    }

    #[tokio::test]
    async fn repair_recreates_missing_profile_as_passenger() {
        let (_store, service) = service();
        let user_id = Uuid::new_v4();

        let profile = service.repair_profile(user_id, "Rosa Flores").await.unwrap();
        assert_eq!(profile.role, Role::Passenger);
        assert_eq!(profile.full_name, "Rosa Flores");
        assert_eq!(profile.trips_completed, 0);
    }

    #[tokio::test]
    async fn repair_leaves_existing_profile_untouched() {
        let (_store, service) = service();
        let user_id = Uuid::new_v4();
        service
            .register_profile(user_id, "Diego", Role::Driver, None)
            .await
            .unwrap();

        // The fallback name must not clobber the real one.
        let profile = service.repair_profile(user_id, "Usuario").await.unwrap();
        assert_eq!(profile.full_name, "Diego");
        assert_eq!(profile.role, Role::Driver);
    }

    #[tokio::test]
    async fn signup_cannot_mint_admins() {
        let (_store, service) = service();
        let err = service
            .register_profile(Uuid::new_v4(), "Eve", Role::Admin, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn update_contact_edits_vehicle_fields() {
        let (_store, service) = service();
        let user_id = Uuid::new_v4();
        service
            .register_profile(user_id, "Diego", Role::Driver, None)
            .await
            .unwrap();

        let auth = AuthContext::new(user_id, Role::Driver);
        let update = ContactUpdate {
            phone: Some("+51 987 654 321".into()),
            car_brand: Some("Toyota".into()),
            car_model: Some("Yaris".into()),
            car_plate: Some("ABC-123".into()),
            ..Default::default()
        };
        let profile = service.update_contact(&auth, &update).await.unwrap();
        assert_eq!(profile.phone.as_deref(), Some("+51 987 654 321"));
        assert_eq!(profile.car_brand.as_deref(), Some("Toyota"));
        // Untouched field stays untouched.
        assert!(profile.car_color.is_none());
    }
}
