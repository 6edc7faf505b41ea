//! User-profile collaborator.
//!
//! The pipeline only needs the subscription tier and a contact address; the
//! accounts system behind this interface is out of scope.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTier {
    FreeUser,
    PremiumUser,
}

impl std::fmt::Display for UserTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserTier::FreeUser => write!(f, "free_user"),
            UserTier::PremiumUser => write!(f, "premium_user"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub tier: UserTier,
}

#[derive(Debug, Default)]
pub struct UserProfiles {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl UserProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, profile: UserProfile) {
        let mut profiles = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        profiles.insert(profile.user_id.clone(), profile);
    }

    pub fn get_profile(&self, user_id: &str) -> Result<UserProfile> {
        let profiles = self.profiles.read().unwrap_or_else(|e| e.into_inner());
        profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| PipelineError::ProfileNotFound(user_id.to_string()))
    }

    pub fn set_tier(&self, user_id: &str, tier: UserTier) -> Result<()> {
        let mut profiles = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| PipelineError::ProfileNotFound(user_id.to_string()))?;
        profile.tier = tier;
        Ok(())
    }
}
