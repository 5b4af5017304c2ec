//! Presenter-side facade over the pet engine: command audit, favorites
//! wiring, image sources, and the HTTP control surface.

mod favorites;
mod provider;
mod server;

use std::path::Path;

use contracts::{
    CommandKind, CommandRecord, EngineConfig, EngineError, EngineSnapshot, FeedingStarted,
    ImageResult, Pet, TickOutcome,
};
use pet_core::PetStateEngine;

pub use favorites::{FavoritesError, FavoritesStore};
pub use provider::{HttpImageProvider, ImageSource, ProviderError, DEFAULT_IMAGE_ENDPOINT};
pub use server::{serve, ServerError};

/// Owns one engine plus the favorites list and serializes every command
/// applied to them, appending an audit record per user intent.
///
/// The fetch/deduct discipline lives here: callers fetch a candidate first
/// and only then invoke `acquire_pet`, so a failed fetch never costs a coin.
#[derive(Debug)]
pub struct PresenterApi {
    engine: PetStateEngine,
    favorites: FavoritesStore,
    command_audit: Vec<CommandRecord>,
    next_sequence: u64,
}

impl PresenterApi {
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            engine: PetStateEngine::new(config),
            favorites: FavoritesStore::new(),
            command_audit: Vec::new(),
            next_sequence: 0,
        }
    }

    pub fn attach_sqlite_store(&mut self, path: impl AsRef<Path>) -> Result<(), FavoritesError> {
        self.favorites.attach_sqlite(path)
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.engine.snapshot()
    }

    pub fn acquire_pet(&mut self, candidate: &ImageResult) -> Result<Pet, EngineError> {
        let result = self.engine.acquire_pet(candidate);
        self.record(CommandKind::AcquirePet, result.as_ref().err().map(|e| e.to_string()));
        result
    }

    pub fn feed(&mut self) -> Result<FeedingStarted, EngineError> {
        let result = self.engine.feed();
        self.record(CommandKind::Feed, result.as_ref().err().map(|e| e.to_string()));
        result
    }

    pub fn end_feeding(&mut self, generation: u64) -> bool {
        let applied = self.engine.end_feeding(generation);
        let error = (!applied).then(|| "stale feeding generation".to_string());
        self.record(CommandKind::EndFeeding, error);
        applied
    }

    /// Hunger ticks are driver traffic, not user intents, so they bypass the
    /// audit log.
    pub fn tick(&mut self) -> TickOutcome {
        self.engine.on_tick()
    }

    pub fn save_favorite(&mut self) -> Result<Pet, FavoritesError> {
        let Some(pet) = self.engine.active_pet().cloned() else {
            self.record(
                CommandKind::SaveFavorite,
                Some(FavoritesError::NoActivePet.to_string()),
            );
            return Err(FavoritesError::NoActivePet);
        };

        let result = self.favorites.add(pet.clone()).map(|()| pet);
        self.record(
            CommandKind::SaveFavorite,
            result.as_ref().err().map(|e| e.to_string()),
        );
        result
    }

    pub fn remove_favorite(&mut self, image_url: &str) -> Result<bool, FavoritesError> {
        let result = self.favorites.remove(image_url);
        let error = match &result {
            Ok(true) => None,
            Ok(false) => Some("favorite not found".to_string()),
            Err(err) => Some(err.to_string()),
        };
        self.record(CommandKind::RemoveFavorite, error);
        result
    }

    /// Revisit a saved pet by URL. Returns the loaded session's pet, which is
    /// never special regardless of the stored flag.
    pub fn load_favorite(&mut self, image_url: &str) -> Option<Pet> {
        let Some(saved) = self.favorites.find(image_url).cloned() else {
            self.record(CommandKind::LoadFavorite, Some("favorite not found".to_string()));
            return None;
        };

        self.engine.load_favorite(saved);
        self.record(CommandKind::LoadFavorite, None);
        self.engine.active_pet().cloned()
    }

    pub fn favorites(&self) -> &[Pet] {
        self.favorites.list()
    }

    pub fn command_audit(&self) -> &[CommandRecord] {
        &self.command_audit
    }

    fn record(&mut self, kind: CommandKind, error: Option<String>) {
        self.next_sequence += 1;
        let session = self.engine.session();
        let record = match error {
            None => CommandRecord::accepted(self.next_sequence, kind, session),
            Some(message) => {
                CommandRecord::rejected(self.next_sequence, kind, session, message)
            }
        };
        self.command_audit.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str) -> ImageResult {
        ImageResult {
            id: id.to_string(),
            url: format!("https://x/{id}.jpg"),
        }
    }

    fn api_with_pet() -> PresenterApi {
        let mut api = PresenterApi::from_config(EngineConfig::default());
        api.acquire_pet(&candidate("c1")).expect("acquire");
        api
    }

    #[test]
    fn acquisition_updates_snapshot_and_audit() {
        let mut api = PresenterApi::from_config(EngineConfig::default());
        api.acquire_pet(&candidate("c1")).expect("acquire");

        let snap = api.snapshot();
        assert_eq!(snap.coins, 9);
        assert_eq!(snap.hunger, 1.0);

        let audit = api.command_audit();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].kind, CommandKind::AcquirePet);
        assert!(audit[0].accepted);
    }

    #[test]
    fn rejected_commands_land_in_the_audit_with_errors() {
        let mut config = EngineConfig::default();
        config.starting_coins = 0;
        let mut api = PresenterApi::from_config(config);

        assert_eq!(
            api.acquire_pet(&candidate("c1")),
            Err(EngineError::InsufficientFunds)
        );

        let audit = api.command_audit();
        assert_eq!(audit.len(), 1);
        assert!(!audit[0].accepted);
        assert!(audit[0].error.as_deref().unwrap_or_default().contains("coins"));
    }

    #[test]
    fn ticks_do_not_grow_the_audit() {
        let mut api = api_with_pet();
        let audited = api.command_audit().len();
        for _ in 0..30 {
            api.tick();
        }
        assert_eq!(api.command_audit().len(), audited);
    }

    #[test]
    fn save_load_remove_favorite_round_trip() {
        let mut api = api_with_pet();
        let saved = api.save_favorite().expect("save");

        // Saving the same URL again is a duplicate.
        assert!(matches!(
            api.save_favorite(),
            Err(FavoritesError::DuplicateUrl(_))
        ));

        // Load starts a fresh non-special session for the saved pet.
        let loaded = api.load_favorite(&saved.image_url).expect("load");
        assert_eq!(loaded.image_url, saved.image_url);
        assert!(!loaded.is_special);
        assert_eq!(api.snapshot().hunger, 1.0);

        assert!(api.remove_favorite(&saved.image_url).expect("remove"));
        assert!(api.favorites().is_empty());
        assert!(api.load_favorite(&saved.image_url).is_none());
    }

    #[test]
    fn save_favorite_without_a_pet_is_rejected() {
        let mut api = PresenterApi::from_config(EngineConfig::default());
        assert!(matches!(
            api.save_favorite(),
            Err(FavoritesError::NoActivePet)
        ));
    }

    #[test]
    fn stale_cooldown_after_pet_switch_is_ignored() {
        let mut api = api_with_pet();
        let stale = api.feed().expect("feed");

        api.acquire_pet(&candidate("c2")).expect("acquire");
        assert!(!api.end_feeding(stale.generation));
        assert!(!api.snapshot().is_feeding);

        let fresh = api.feed().expect("feed");
        assert!(!api.end_feeding(stale.generation));
        assert!(api.snapshot().is_feeding);
        assert!(api.end_feeding(fresh.generation));
        assert!(!api.snapshot().is_feeding);
    }

    #[test]
    fn audit_sequences_are_monotonic() {
        let mut api = api_with_pet();
        let _ = api.feed();
        let _ = api.save_favorite();
        let _ = api.remove_favorite("https://x/unknown.jpg");

        let sequences: Vec<u64> = api.command_audit().iter().map(|r| r.sequence).collect();
        for window in sequences.windows(2) {
            assert!(window[1] > window[0]);
        }
    }

    #[test]
    fn favorites_persist_across_facade_instances() {
        let path = std::env::temp_dir().join(format!(
            "frenzy_api_store_{}.sqlite",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be monotonic")
                .as_nanos()
        ));

        {
            let mut api = PresenterApi::from_config(EngineConfig::default());
            api.attach_sqlite_store(&path).expect("attach");
            api.acquire_pet(&candidate("c1")).expect("acquire");
            api.save_favorite().expect("save");
        }

        let mut reopened = PresenterApi::from_config(EngineConfig::default());
        reopened.attach_sqlite_store(&path).expect("reattach");
        assert_eq!(reopened.favorites().len(), 1);
        assert!(reopened.load_favorite("https://x/c1.jpg").is_some());

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("sqlite-wal"));
        let _ = std::fs::remove_file(path.with_extension("sqlite-shm"));
    }
}
