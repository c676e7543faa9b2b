//! Run configuration assembled from CLI flags and the environment.

use crate::auth::Credentials;
use crate::entity::EntityKind;
use crate::{DEFAULT_MAX_PAGES, DEFAULT_PER_PAGE, SyncError, SyncResult};
use itertools::Itertools;
use log::debug;
use std::collections::HashMap;

pub const ENV_PREFIX: &str = "VOTESYNC";

/// Load a `.env` file from the working directory or its parents, if any.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => eprintln!("Warning: could not read .env file: {e}"),
    }
}

/// Logical store collections. Each may be renamed through the environment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Collection {
    Parties,
    Provinces,
    Areas,
    Candidates,
    Partylist,
    PartylistResults,
    Referendum,
    National,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Parties,
        Collection::Provinces,
        Collection::Areas,
        Collection::Candidates,
        Collection::Partylist,
        Collection::PartylistResults,
        Collection::Referendum,
        Collection::National,
    ];

    #[must_use]
    pub fn default_name(self) -> &'static str {
        match self {
            Collection::Parties => "parties",
            Collection::Provinces => "provinces",
            Collection::Areas => "areas",
            Collection::Candidates => "candidates",
            Collection::Partylist => "partylist",
            Collection::PartylistResults => "partylistResults",
            Collection::Referendum => "referendum",
            Collection::National => "national",
        }
    }

    fn env_suffix(self) -> &'static str {
        match self {
            Collection::Parties => "PARTIES",
            Collection::Provinces => "PROVINCES",
            Collection::Areas => "AREAS",
            Collection::Candidates => "CANDIDATES",
            Collection::Partylist => "PARTYLIST",
            Collection::PartylistResults => "PARTYLIST_RESULTS",
            Collection::Referendum => "REFERENDUM",
            Collection::National => "NATIONAL",
        }
    }

    #[must_use]
    pub fn env_var(self) -> String {
        format!("{ENV_PREFIX}_COLLECTION_{}", self.env_suffix())
    }
}

/// Actual collection names, defaults unless overridden.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collections {
    overrides: HashMap<Collection, String>,
}

impl Collections {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides = Collection::ALL
            .into_iter()
            .filter_map(|c| {
                lookup(&c.env_var())
                    .filter(|name| !name.trim().is_empty())
                    .map(|name| (c, name.trim().to_string()))
            })
            .collect();
        Self { overrides }
    }

    #[must_use]
    pub fn name(&self, collection: Collection) -> &str {
        self.overrides
            .get(&collection)
            .map_or_else(|| collection.default_name(), String::as_str)
    }
}

#[must_use]
pub fn source_url_var(entity: EntityKind) -> String {
    format!(
        "{ENV_PREFIX}_SOURCE_{}_URL",
        entity.name().to_uppercase().replace('-', "_")
    )
}

/// Values the CLI collected, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub store_url: Option<String>,
    pub store_identity: Option<String>,
    pub store_password: Option<String>,
    pub source_token: Option<String>,
    pub per_page: Option<u32>,
    pub max_pages: Option<u32>,
}

/// Validated settings for one invocation.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub store_url: String,
    pub credentials: Credentials,
    pub source_token: String,
    pub source_urls: HashMap<EntityKind, String>,
    pub collections: Collections,
    pub per_page: u32,
    pub max_pages: u32,
}

impl SyncConfig {
    /// Validate everything the selected entities need, reporting every
    /// missing value at once.
    ///
    /// # Errors
    /// Returns [`SyncError::Config`] naming each missing variable.
    pub fn build<F>(raw: RawConfig, entities: &[EntityKind], lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut require = |value: Option<String>, name: String| -> String {
            match value.filter(|v| !v.trim().is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let store_url = require(raw.store_url, format!("{ENV_PREFIX}_STORE_URL"));
        let identity = require(raw.store_identity, format!("{ENV_PREFIX}_STORE_IDENTITY"));
        let password = require(raw.store_password, format!("{ENV_PREFIX}_STORE_PASSWORD"));
        let source_token = require(raw.source_token, format!("{ENV_PREFIX}_SOURCE_TOKEN"));

        let source_urls = entities
            .iter()
            .map(|&entity| {
                let var = source_url_var(entity);
                (entity, require(lookup(&var), var))
            })
            .collect();

        if !missing.is_empty() {
            return Err(SyncError::Config(format!(
                "missing required settings: {}",
                missing.iter().join(", ")
            )));
        }

        let per_page = raw.per_page.unwrap_or(DEFAULT_PER_PAGE);
        let max_pages = raw.max_pages.unwrap_or(DEFAULT_MAX_PAGES);
        if per_page == 0 || max_pages == 0 {
            return Err(SyncError::Config(
                "per-page and max-pages must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            store_url,
            credentials: Credentials { identity, password },
            source_token,
            source_urls,
            collections: Collections::from_lookup(lookup),
            per_page,
            max_pages,
        })
    }

    #[must_use]
    pub fn source_url(&self, entity: EntityKind) -> Option<&str> {
        self.source_urls.get(&entity).map(String::as_str)
    }
}
