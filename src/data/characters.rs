//! Characters API client with caching and fallback
//!
//! Character detail lookups follow the same resilience flow as events but
//! with a shorter retry budget, since they back an interactive detail view.
//! A 404 means the character genuinely does not exist and is surfaced as
//! `None`; any other failure falls back to the static character catalog.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{derive_key, CacheCategory, TtlCache};
use crate::data::{Character, CharacterRelationship};
use crate::health::EndpointHealth;
use crate::retry::{execute_with_retry, RetryConfig};
use crate::transport::fetch_json;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Deadline for a single character request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Characters warmed alongside the hot dataset: Odysseus, Athena, Poseidon,
/// Polyphemus
const PRELOAD_CHARACTER_IDS: [u64; 4] = [1, 4, 5, 6];

/// Identifying parameters for a character cache key
#[derive(Serialize)]
struct CharacterKeyParams {
    id: u64,
}

/// Client for fetching character details from the Epic Timeline backend
pub struct CharactersClient {
    http: Client,
    base_url: String,
    cache: Arc<TtlCache>,
    health: Arc<EndpointHealth>,
    retry_config: RetryConfig,
}

impl CharactersClient {
    /// Creates a client against the default backend URL
    pub fn new(cache: Arc<TtlCache>, health: Arc<EndpointHealth>) -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            cache,
            health,
            retry_config: RetryConfig {
                max_retries: 2,
                base_delay: Duration::from_millis(1000),
                max_delay: Duration::from_millis(4000),
                ..RetryConfig::default()
            },
        }
    }

    /// Overrides the backend base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the retry policy, mainly to shorten delays in tests
    #[allow(dead_code)]
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Fetches details for one character.
    ///
    /// Returns `None` when the backend answers 404 or when the character is
    /// unknown to both the backend and the fallback catalog.
    pub async fn get_character(&self, id: u64) -> Option<Character> {
        let key = derive_key("character", Some(&CharacterKeyParams { id }));
        let endpoint = format!("{}/api/characters/{}", self.base_url, id);
        if !self.health.is_healthy(&endpoint) {
            warn!(%endpoint, "endpoint unhealthy, using fallback character data");
            return self.fallback_lookup(id, &key);
        }

        if let Some(cached) = self.cache.get::<Character>(&key) {
            debug!(id, "using cached character");
            return Some(cached);
        }

        let result = execute_with_retry(
            || fetch_json::<Character>(&self.http, &endpoint, REQUEST_TIMEOUT),
            &self.retry_config,
            "get_character",
        )
        .await;

        match result {
            Ok(outcome) => {
                self.health.reset_failures(&endpoint);
                let character = outcome.value;
                self.cache.set(&key, &character, CacheCategory::Character);
                debug!(id, name = %character.name, "fetched character from API");
                Some(character)
            }
            Err(err) if err.http_status == Some(404) => {
                // The endpoint is fine; the character just does not exist.
                self.health.reset_failures(&endpoint);
                debug!(id, "character not found");
                None
            }
            Err(err) => {
                self.health.record_failure(&endpoint);
                warn!(%endpoint, %err, "character fetch failed, using fallback data");
                self.fallback_lookup(id, &key)
            }
        }
    }

    /// Warms the cache with the characters shown on the hot screens
    pub async fn preload_key_characters(&self) {
        for id in PRELOAD_CHARACTER_IDS {
            self.get_character(id).await;
        }
    }

    fn fallback_lookup(&self, id: u64, key: &str) -> Option<Character> {
        let character = fallback_characters().into_iter().find(|c| c.id == id)?;
        // Fallback data is cached too so repeated lookups stay cheap
        self.cache.set(key, &character, CacheCategory::Character);
        Some(character)
    }
}

fn catalog_character(
    id: u64,
    name: &str,
    character_type: &str,
    protagonist: bool,
    description: &str,
    aliases: &[&str],
    powers: &[&str],
) -> Character {
    Character {
        id,
        name: name.to_string(),
        description: Some(description.to_string()),
        character_type: Some(character_type.to_string()),
        is_protagonist: Some(protagonist),
        aliases: Some(aliases.iter().map(|a| a.to_string()).collect()),
        powers: Some(powers.iter().map(|p| p.to_string()).collect()),
        relationships: None,
    }
}

fn relationship(
    character_id: u64,
    character_name: &str,
    relationship_type: &str,
    description: &str,
) -> CharacterRelationship {
    CharacterRelationship {
        character_id,
        character_name: character_name.to_string(),
        relationship_type: relationship_type.to_string(),
        description: Some(description.to_string()),
    }
}

/// Static character catalog served when the backend is unreachable
pub fn fallback_characters() -> Vec<Character> {
    let mut odysseus = catalog_character(
        1,
        "Odysseus",
        "King",
        true,
        "King of Ithaca, cursed to wander the seas for twenty years after the Trojan War. \
         Known for his wit, determination, and the lengths he will go to protect his family.",
        &["The King of Ithaca", "Captain", "Nobody"],
        &["Strategic Genius", "Silver Tongue", "Archery Master", "Naval Command"],
    );
    odysseus.relationships = Some(vec![
        relationship(2, "Penelope", "spouse", "Beloved wife, Queen of Ithaca"),
        relationship(3, "Telemachus", "family", "Son, Prince of Ithaca"),
        relationship(4, "Athena", "patron", "Divine mentor and guide"),
        relationship(5, "Poseidon", "enemy", "God who curses his journey home"),
    ]);

    let mut penelope = catalog_character(
        2,
        "Penelope",
        "Queen",
        true,
        "Queen of Ithaca and Odysseus' faithful wife, fending off suitors for twenty years.",
        &["Queen of Ithaca", "Faithful Penelope"],
        &["Tactical Weaving", "Political Cunning", "Unwavering Loyalty"],
    );
    penelope.relationships = Some(vec![relationship(
        1,
        "Odysseus",
        "spouse",
        "Beloved husband, King of Ithaca",
    )]);

    vec![
        odysseus,
        penelope,
        catalog_character(
            3,
            "Telemachus",
            "Prince",
            false,
            "Prince of Ithaca, grown up without his father and eager to prove himself.",
            &["Prince of Ithaca", "Young Prince"],
            &["Royal Heritage", "Growing Wisdom", "Archery Potential"],
        ),
        catalog_character(
            4,
            "Athena",
            "Goddess",
            false,
            "Goddess of wisdom and warfare, divine patron of Odysseus throughout his journey.",
            &["Pallas Athena", "Goddess of Wisdom", "Warrior of the Mind"],
            &["Divine Wisdom", "Strategic Warfare", "Shape-shifting", "Prophetic Sight"],
        ),
        catalog_character(
            5,
            "Poseidon",
            "God",
            false,
            "God of the seas, Odysseus' greatest divine enemy after the blinding of Polyphemus.",
            &["Earth-Shaker", "Lord of the Seas"],
            &["Ocean Control", "Storm Creation", "Divine Wrath"],
        ),
        catalog_character(
            6,
            "Polyphemus",
            "Cyclops",
            false,
            "The cyclops son of Poseidon, whose blinding brings a curse on the crew's journey.",
            &["The Cyclops", "Son of Poseidon"],
            &["Immense Strength", "Stone Throwing"],
        ),
        catalog_character(
            7,
            "Circe",
            "Sorceress",
            false,
            "The enchantress of Aeaea, first a threat to the crew and later an ally.",
            &["Witch of Aeaea", "The Enchantress"],
            &["Transformation Magic", "Potion Brewing", "Prophecy"],
        ),
        catalog_character(
            8,
            "Eurylochus",
            "Sailor",
            false,
            "Odysseus' second-in-command and brother-in-law, a loyal but questioning voice.",
            &["Second-in-Command", "Brother-in-Law"],
            &["Military Leadership", "Crew Loyalty", "Combat Skills"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_retry_config() -> RetryConfig {
        RetryConfig {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            jitter: false,
            ..RetryConfig::default()
        }
    }

    fn offline_client(cache: Arc<TtlCache>, health: Arc<EndpointHealth>) -> CharactersClient {
        CharactersClient::new(cache, health)
            .with_base_url("http://127.0.0.1:1")
            .with_retry_config(no_retry_config())
    }

    #[test]
    fn test_fallback_catalog_contains_key_characters() {
        let catalog = fallback_characters();
        for id in PRELOAD_CHARACTER_IDS {
            assert!(catalog.iter().any(|c| c.id == id), "catalog missing id {}", id);
        }
    }

    #[tokio::test]
    async fn test_offline_lookup_uses_fallback_catalog() {
        let cache = Arc::new(TtlCache::new());
        let health = Arc::new(EndpointHealth::new());
        let client = offline_client(Arc::clone(&cache), Arc::clone(&health));

        let character = client.get_character(1).await.expect("Odysseus is in the catalog");
        assert_eq!(character.name, "Odysseus");
        assert_eq!(character.is_protagonist, Some(true));
    }

    #[tokio::test]
    async fn test_offline_lookup_of_unknown_character_is_none() {
        let cache = Arc::new(TtlCache::new());
        let health = Arc::new(EndpointHealth::new());
        let client = offline_client(cache, health);

        assert!(client.get_character(999).await.is_none());
    }

    #[tokio::test]
    async fn test_fallback_result_is_cached() {
        let cache = Arc::new(TtlCache::new());
        let health = Arc::new(EndpointHealth::new());
        let client = offline_client(Arc::clone(&cache), Arc::clone(&health));

        client.get_character(4).await.expect("Athena is in the catalog");

        let key = derive_key("character", Some(&CharacterKeyParams { id: 4 }));
        let cached: Option<Character> = cache.get(&key);
        assert_eq!(cached.map(|c| c.name), Some("Athena".to_string()));
    }

    #[tokio::test]
    async fn test_cached_character_avoids_network() {
        let cache = Arc::new(TtlCache::new());
        let health = Arc::new(EndpointHealth::new());

        let key = derive_key("character", Some(&CharacterKeyParams { id: 2 }));
        let penelope = fallback_characters().remove(1);
        cache.set(&key, &penelope, CacheCategory::Character);

        let client = offline_client(Arc::clone(&cache), Arc::clone(&health));
        let character = client.get_character(2).await.expect("should come from cache");

        assert_eq!(character.name, "Penelope");
        assert_eq!(health.failure_count(&format!("{}/api/characters/2", "http://127.0.0.1:1")), 0);
    }

    #[tokio::test]
    async fn test_preload_key_characters_populates_cache() {
        let cache = Arc::new(TtlCache::new());
        let health = Arc::new(EndpointHealth::new());
        let client = offline_client(Arc::clone(&cache), Arc::clone(&health));

        client.preload_key_characters().await;

        for id in PRELOAD_CHARACTER_IDS {
            let key = derive_key("character", Some(&CharacterKeyParams { id }));
            assert!(cache.get::<Character>(&key).is_some(), "character {} not cached", id);
        }
    }
}
