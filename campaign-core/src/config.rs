//! Engine configuration.
//!
//! Defaults suit an interactive session against a hosted model. Every knob
//! has a `with_*` builder and most can be set from `CAMPAIGN_*` environment
//! variables through `EngineConfig::from_env`.

use crate::roadmap::DifficultyTable;
use std::str::FromStr;
use std::time::Duration;
use textgen::GenerationOptions;

/// What to do when the narrator asks to advance while the current scene
/// still has unmet objectives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdvancePolicy {
    /// The narrator decides; objectives are advisory.
    #[default]
    NarratorDiscretion,
    /// Advance requests are dropped until every objective is complete.
    RequireObjectives,
}

impl FromStr for AdvancePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discretion" | "narrator" | "narrator_discretion" => Ok(Self::NarratorDiscretion),
            "objectives" | "require_objectives" | "strict" => Ok(Self::RequireObjectives),
            other => Err(format!("unknown advance policy '{other}'")),
        }
    }
}

/// Configuration for the narrative engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum conversation entries kept before the oldest are evicted.
    pub history_limit: usize,

    /// Conversation entries included in each narration prompt.
    pub prompt_turns: usize,

    /// Upper bound on any single generation call made by the engine.
    pub generation_timeout: Duration,

    /// Settings for turn narration.
    pub narration: GenerationOptions,

    /// Settings for the opening scene.
    pub opening: GenerationOptions,

    /// Settings for roadmap generation.
    pub roadmap: GenerationOptions,

    /// Settings for adaptation analysis.
    pub adaptation: GenerationOptions,

    /// Run adaptation after every action; when false only on `[ROADMAP_UPDATE]`.
    pub adapt_every_turn: bool,

    pub advance_policy: AdvancePolicy,

    /// Ask the backend for a structured signal block alongside the prose.
    pub structured_signals: bool,

    pub difficulty: DifficultyTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: 20,
            prompt_turns: 5,
            generation_timeout: Duration::from_secs(30),
            narration: GenerationOptions::new()
                .with_temperature(0.8)
                .with_max_tokens(800),
            opening: GenerationOptions::new()
                .with_temperature(0.9)
                .with_max_tokens(600),
            roadmap: GenerationOptions::new()
                .with_temperature(0.7)
                .with_max_tokens(3000),
            adaptation: GenerationOptions::new()
                .with_temperature(0.3)
                .with_max_tokens(600),
            adapt_every_turn: true,
            advance_policy: AdvancePolicy::default(),
            structured_signals: true,
            difficulty: DifficultyTable::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `CAMPAIGN_*` environment variables over the defaults.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(limit) = env_parse::<usize>("CAMPAIGN_HISTORY_LIMIT") {
            config.history_limit = limit.max(1);
        }
        if let Some(turns) = env_parse::<usize>("CAMPAIGN_PROMPT_TURNS") {
            config.prompt_turns = turns;
        }
        if let Some(secs) = env_parse::<u64>("CAMPAIGN_TIMEOUT_SECS") {
            config.generation_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(policy) = env_parse::<AdvancePolicy>("CAMPAIGN_ADVANCE_POLICY") {
            config.advance_policy = policy;
        }
        if let Some(structured) = env_parse::<bool>("CAMPAIGN_STRUCTURED_SIGNALS") {
            config.structured_signals = structured;
        }
        if let Some(every_turn) = env_parse::<bool>("CAMPAIGN_ADAPT_EVERY_TURN") {
            config.adapt_every_turn = every_turn;
        }

        config
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn with_prompt_turns(mut self, turns: usize) -> Self {
        self.prompt_turns = turns;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_advance_policy(mut self, policy: AdvancePolicy) -> Self {
        self.advance_policy = policy;
        self
    }

    pub fn with_structured_signals(mut self, enabled: bool) -> Self {
        self.structured_signals = enabled;
        self
    }

    pub fn with_adapt_every_turn(mut self, enabled: bool) -> Self {
        self.adapt_every_turn = enabled;
        self
    }

    pub fn with_difficulty(mut self, table: DifficultyTable) -> Self {
        self.difficulty = table;
        self
    }

    pub fn with_narration_options(mut self, options: GenerationOptions) -> Self {
        self.narration = options;
        self
    }
}

fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "Ignoring unparsable config value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.prompt_turns, 5);
        assert_eq!(config.generation_timeout, Duration::from_secs(30));
        assert_eq!(config.advance_policy, AdvancePolicy::NarratorDiscretion);
        assert!(config.structured_signals);
        assert!(config.adapt_every_turn);
        assert_eq!(config.adaptation.temperature, Some(0.3));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_history_limit(0)
            .with_prompt_turns(3)
            .with_advance_policy(AdvancePolicy::RequireObjectives)
            .with_structured_signals(false);

        assert_eq!(config.history_limit, 1);
        assert_eq!(config.prompt_turns, 3);
        assert_eq!(config.advance_policy, AdvancePolicy::RequireObjectives);
        assert!(!config.structured_signals);
    }

    #[test]
    fn test_advance_policy_parse() {
        assert_eq!(
            "objectives".parse::<AdvancePolicy>(),
            Ok(AdvancePolicy::RequireObjectives)
        );
        assert_eq!(
            " Discretion ".parse::<AdvancePolicy>(),
            Ok(AdvancePolicy::NarratorDiscretion)
        );
        assert!("sometimes".parse::<AdvancePolicy>().is_err());
    }
}
