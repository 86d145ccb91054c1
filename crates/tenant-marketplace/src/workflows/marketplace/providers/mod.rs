mod import;

pub use import::{ProviderImportError, ProviderRosterImporter};

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::comparison::ProviderSnapshot;
use super::domain::{ProviderId, ServiceCategory};

/// Marketplace profile of a service provider as published by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: ProviderId,
    pub company_name: String,
    pub average_rating: Option<Decimal>,
    pub total_reviews: u32,
    pub is_verified: bool,
    pub service_categories: Vec<ServiceCategory>,
}

impl ProviderProfile {
    pub fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            id: self.id.clone(),
            company_name: self.company_name.clone(),
            average_rating: self.average_rating,
            is_verified: self.is_verified,
        }
    }

    pub fn offers(&self, category: ServiceCategory) -> bool {
        self.service_categories.contains(&category)
    }
}

/// Lookup seam for provider names, ratings, and verification flags.
pub trait ProviderDirectory: Send + Sync {
    fn find(&self, id: &ProviderId) -> Result<Option<ProviderProfile>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("provider directory unavailable: {0}")]
    Unavailable(String),
}

/// Directory held in memory, typically loaded through [`ProviderRosterImporter`].
#[derive(Debug, Clone, Default)]
pub struct ProviderRoster {
    providers: BTreeMap<ProviderId, ProviderProfile>,
}

impl ProviderRoster {
    pub fn from_profiles(profiles: impl IntoIterator<Item = ProviderProfile>) -> Self {
        let providers = profiles
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &ProviderProfile> {
        self.providers.values()
    }

    /// Providers offering `category`, best rated first; unrated providers trail.
    pub fn offering(&self, category: ServiceCategory) -> Vec<&ProviderProfile> {
        let mut matches: Vec<&ProviderProfile> = self
            .providers
            .values()
            .filter(|profile| profile.offers(category))
            .collect();
        matches.sort_by(|left, right| {
            right
                .average_rating
                .cmp(&left.average_rating)
                .then_with(|| left.id.cmp(&right.id))
        });
        matches
    }
}

impl ProviderDirectory for ProviderRoster {
    fn find(&self, id: &ProviderId) -> Result<Option<ProviderProfile>, DirectoryError> {
        Ok(self.providers.get(id).cloned())
    }
}
