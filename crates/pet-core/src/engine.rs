//! Single owner of the pet session state.
//!
//! `PetStateEngine` is mutated only through named commands and observed via
//! immutable snapshots. It performs no I/O and holds no timers: the caller
//! issues `on_tick` once per second while a pet is active and schedules the
//! feeding-cooldown completion itself. Hunger decay is tick-count-pure, so a
//! given command/tick sequence always produces the same state.

use contracts::{
    EngineConfig, EngineError, EngineSnapshot, FeedingStarted, ImageResult, Pet, TickOutcome,
    SCHEMA_VERSION_V1,
};

use crate::rng::SplitMix64;

/// Fixed pool of pet names; acquisition draws uniformly, repeats allowed.
const PET_NAMES: [&str; 30] = [
    "Whiskers", "Luna", "Oliver", "Bella", "Simba", "Milo", "Cleo", "Leo", "Lily", "Charlie",
    "Nala", "Max", "Daisy", "Oscar", "Lucy", "Jasper", "Mia", "Tiger", "Sophie", "Jack", "Loki",
    "Chloe", "Felix", "Ruby", "Shadow", "Mittens", "Ginger", "Smokey", "Pepper", "Coco",
];

#[derive(Debug, Clone)]
pub struct PetStateEngine {
    config: EngineConfig,
    rng: SplitMix64,
    active_pet: Option<Pet>,
    hunger: f32,
    coins: u32,
    is_feeding: bool,
    has_warned_hungry: bool,
    /// Bumped on every pet switch; identifies the active session in snapshots.
    session: u64,
    session_ticks: u64,
    /// Bumped on every successful feed and every pet switch. A cooldown
    /// completion carrying an older generation is stale and ignored.
    feed_generation: u64,
}

impl PetStateEngine {
    pub fn new(config: EngineConfig) -> Self {
        let rng = SplitMix64::new(config.seed);
        Self::with_rng(config, rng)
    }

    /// Build with an explicit random stream, e.g. a test-controlled one.
    pub fn with_rng(config: EngineConfig, rng: SplitMix64) -> Self {
        Self {
            coins: config.starting_coins,
            config,
            rng,
            active_pet: None,
            hunger: 1.0,
            is_feeding: false,
            has_warned_hungry: false,
            session: 0,
            session_ticks: 0,
            feed_generation: 0,
        }
    }

    /// Spend one coin and adopt the candidate as the active pet.
    ///
    /// The name draw and the special roll are two independent draws from the
    /// seeded stream; specialness is never derived from the candidate.
    pub fn acquire_pet(&mut self, candidate: &ImageResult) -> Result<Pet, EngineError> {
        if self.coins == 0 {
            return Err(EngineError::InsufficientFunds);
        }
        self.coins -= 1;

        let name = PET_NAMES[self.rng.pick_index(PET_NAMES.len())];
        let is_special = self.rng.chance(self.config.special_chance);
        let pet = Pet {
            image_id: candidate.id.clone(),
            image_url: candidate.url.clone(),
            name: name.to_string(),
            is_special,
        };

        self.active_pet = Some(pet.clone());
        self.begin_session();
        Ok(pet)
    }

    /// Revisit a saved pet. Always succeeds; the revisit is a fresh session
    /// and never special, whatever flag the stored entry carries.
    pub fn load_favorite(&mut self, pet: Pet) {
        self.active_pet = Some(Pet {
            is_special: false,
            ..pet
        });
        self.begin_session();
    }

    pub fn feed(&mut self) -> Result<FeedingStarted, EngineError> {
        if self.active_pet.is_none() {
            return Err(EngineError::NoPetActive);
        }
        if self.is_feeding {
            return Err(EngineError::FeedingInProgress);
        }

        self.feed_generation += 1;
        self.is_feeding = true;
        self.hunger = 1.0;
        self.has_warned_hungry = false;
        Ok(FeedingStarted {
            generation: self.feed_generation,
            cooldown_ms: self.config.feeding_cooldown_ms,
        })
    }

    /// Cooldown completion. Returns whether it applied; completions for a
    /// superseded generation (newer feed or pet switch) are no-ops.
    pub fn end_feeding(&mut self, generation: u64) -> bool {
        if !self.is_feeding || generation != self.feed_generation {
            return false;
        }
        self.is_feeding = false;
        true
    }

    /// One discrete hunger step. A no-op returning `Normal` with no pet.
    pub fn on_tick(&mut self) -> TickOutcome {
        if self.active_pet.is_none() {
            return TickOutcome::Normal;
        }

        self.session_ticks += 1;
        self.hunger = (self.hunger - self.config.hunger_decay_per_tick).max(0.0);

        if self.hunger >= self.config.hungry_threshold {
            self.has_warned_hungry = false;
            TickOutcome::Normal
        } else if !self.has_warned_hungry {
            self.has_warned_hungry = true;
            TickOutcome::BecameHungry
        } else {
            TickOutcome::Normal
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session: self.session,
            session_ticks: self.session_ticks,
            active_pet: self.active_pet.clone(),
            hunger: self.hunger,
            coins: self.coins,
            is_feeding: self.is_feeding,
            has_warned_hungry: self.has_warned_hungry,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn coins(&self) -> u32 {
        self.coins
    }

    pub fn active_pet(&self) -> Option<&Pet> {
        self.active_pet.as_ref()
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    fn begin_session(&mut self) {
        self.session += 1;
        self.feed_generation += 1;
        self.session_ticks = 0;
        self.hunger = 1.0;
        self.has_warned_hungry = false;
        self.is_feeding = false;
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

    fn engine_with_pet() -> PetStateEngine {
        let mut engine = PetStateEngine::new(EngineConfig::default());
        engine.acquire_pet(&candidate("c1")).expect("acquire");
        engine
    }

    #[test]
    fn fresh_acquisition_spends_one_coin_and_fills_meter() {
        let mut engine = PetStateEngine::new(EngineConfig::default());
        let pet = engine.acquire_pet(&candidate("c1")).expect("acquire");

        let snap = engine.snapshot();
        assert_eq!(snap.coins, 9);
        assert_eq!(snap.hunger, 1.0);
        assert_eq!(pet.image_url, "https://x/c1.jpg");
        assert_eq!(snap.active_pet.as_ref().map(|p| p.image_url.as_str()), Some("https://x/c1.jpg"));
        assert!(PET_NAMES.contains(&pet.name.as_str()));
    }

    #[test]
    fn acquisition_with_no_coins_is_refused_without_mutation() {
        let mut config = EngineConfig::default();
        config.starting_coins = 0;
        let mut engine = PetStateEngine::new(config);
        let before = engine.snapshot();

        let result = engine.acquire_pet(&candidate("c1"));
        assert_eq!(result, Err(EngineError::InsufficientFunds));
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn every_acquisition_costs_exactly_one_coin() {
        let mut engine = PetStateEngine::new(EngineConfig::default());
        for spent in 1..=10u32 {
            engine.acquire_pet(&candidate("c")).expect("acquire");
            assert_eq!(engine.coins(), 10 - spent);
            assert_eq!(engine.snapshot().hunger, 1.0);
        }
        assert_eq!(
            engine.acquire_pet(&candidate("c")),
            Err(EngineError::InsufficientFunds)
        );
    }

    #[test]
    fn hunger_warning_fires_on_tick_42() {
        let mut engine = engine_with_pet();
        for tick in 1..=41u32 {
            assert_eq!(engine.on_tick(), TickOutcome::Normal, "tick {tick}");
        }
        assert_eq!(engine.on_tick(), TickOutcome::BecameHungry);

        let hunger = engine.snapshot().hunger;
        assert!(hunger < 0.3);
        assert!((hunger - 0.2986).abs() < 1e-3);
    }

    #[test]
    fn warning_fires_once_per_hungry_interval() {
        let mut engine = engine_with_pet();
        let mut warnings = 0;
        for _ in 0..60 {
            if engine.on_tick() == TickOutcome::BecameHungry {
                warnings += 1;
            }
        }
        assert_eq!(warnings, 1);

        engine.feed().expect("feed");
        assert!(!engine.snapshot().has_warned_hungry);

        let mut warnings_after_feed = 0;
        for _ in 0..60 {
            if engine.on_tick() == TickOutcome::BecameHungry {
                warnings_after_feed += 1;
            }
        }
        assert_eq!(warnings_after_feed, 1);
    }

    #[test]
    fn hunger_floors_at_zero_and_stays_there() {
        let mut engine = engine_with_pet();
        for _ in 0..60 {
            engine.on_tick();
        }
        assert_eq!(engine.snapshot().hunger, 0.0);

        for _ in 0..20 {
            assert_eq!(engine.on_tick(), TickOutcome::Normal);
            assert_eq!(engine.snapshot().hunger, 0.0);
        }
    }

    #[test]
    fn tick_is_a_no_op_without_a_pet() {
        let mut engine = PetStateEngine::new(EngineConfig::default());
        let before = engine.snapshot();
        for _ in 0..10 {
            assert_eq!(engine.on_tick(), TickOutcome::Normal);
        }
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn feeding_fills_meter_and_blocks_refeeding() {
        let mut engine = engine_with_pet();
        for _ in 0..30 {
            engine.on_tick();
        }

        let started = engine.feed().expect("feed");
        let snap = engine.snapshot();
        assert!(snap.is_feeding);
        assert_eq!(snap.hunger, 1.0);
        assert!(!snap.has_warned_hungry);
        assert_eq!(started.cooldown_ms, 2000);

        assert_eq!(engine.feed(), Err(EngineError::FeedingInProgress));

        assert!(engine.end_feeding(started.generation));
        assert!(!engine.snapshot().is_feeding);
        assert!(!engine.end_feeding(started.generation));
    }

    #[test]
    fn feeding_requires_an_active_pet() {
        let mut engine = PetStateEngine::new(EngineConfig::default());
        assert_eq!(engine.feed(), Err(EngineError::NoPetActive));
    }

    #[test]
    fn pet_switch_invalidates_pending_cooldown() {
        let mut engine = engine_with_pet();
        let stale = engine.feed().expect("feed");

        engine.acquire_pet(&candidate("c2")).expect("acquire");
        assert!(!engine.snapshot().is_feeding);

        assert!(!engine.end_feeding(stale.generation));
        assert!(!engine.snapshot().is_feeding);

        // A feed in the new session must survive the stale completion.
        let fresh = engine.feed().expect("feed");
        assert!(!engine.end_feeding(stale.generation));
        assert!(engine.snapshot().is_feeding);
        assert!(engine.end_feeding(fresh.generation));
    }

    #[test]
    fn loading_a_favorite_starts_a_fresh_non_special_session() {
        let mut engine = engine_with_pet();
        for _ in 0..50 {
            engine.on_tick();
        }
        let session_before = engine.session();

        engine.load_favorite(Pet {
            image_id: "f1".to_string(),
            image_url: "https://x/f1.jpg".to_string(),
            name: "Luna".to_string(),
            is_special: true,
        });

        let snap = engine.snapshot();
        let pet = snap.active_pet.expect("pet loaded");
        assert!(!pet.is_special);
        assert_eq!(snap.hunger, 1.0);
        assert_eq!(snap.session_ticks, 0);
        assert!(!snap.is_feeding);
        assert!(!snap.has_warned_hungry);
        assert!(snap.session > session_before);
    }

    #[test]
    fn identical_seeds_replay_identical_draws() {
        let mut first = PetStateEngine::new(EngineConfig::default());
        let mut second = PetStateEngine::new(EngineConfig::default());

        for round in 0..10 {
            let image = candidate(&format!("c{round}"));
            let lhs = first.acquire_pet(&image).expect("acquire");
            let rhs = second.acquire_pet(&image).expect("acquire");
            assert_eq!(lhs.name, rhs.name);
            assert_eq!(lhs.is_special, rhs.is_special);
        }
    }

    #[test]
    fn draws_vary_across_a_long_run() {
        let mut config = EngineConfig::default();
        config.starting_coins = 300;
        let mut engine = PetStateEngine::new(config);

        let mut names = std::collections::BTreeSet::new();
        let mut specials = 0u32;
        for round in 0..300 {
            let pet = engine
                .acquire_pet(&candidate(&format!("c{round}")))
                .expect("acquire");
            names.insert(pet.name.clone());
            if pet.is_special {
                specials += 1;
            }
        }

        assert!(names.len() > 1, "name draw degenerated to one value");
        assert!(specials > 0, "special roll never fired over 300 draws");
        assert!(specials < 100, "special roll fired far above its odds");
    }
}
