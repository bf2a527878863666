// Engine configuration
//
// EngineConfig is environment-driven in binaries and constructed directly
// in tests. Every HTTP call the engine makes carries one of these deadlines.

use std::time::Duration;

/// Recognized configuration for the execution engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Event granularity, 0-3
    pub verbosity: u8,
    /// Concurrent targets dispatched per query
    pub max_concurrent_targets: usize,
    /// Name of the fallback Memory resource in each namespace
    pub memory_default_name: String,
    /// Model call deadline and retry policy
    pub model_call: ModelCallConfig,
    /// Tool call deadline
    pub tool_call_timeout: Duration,
    /// Memory service call deadline
    pub memory_call_timeout: Duration,
    /// Evaluator service call deadline
    pub evaluator_call_timeout: Duration,
    /// Execution engine call deadline
    pub engine_call_timeout: Duration,
    /// Model/tool iterations per agent turn
    pub agent_step_limit: usize,
    /// Member invocations per team run when the team does not set its own
    pub team_max_turns: u32,
    /// Outer deadline for a whole query; none by default
    pub query_deadline: Option<Duration>,
    /// Whether a selector target expanding to zero references is accepted
    /// (empty responses) or rejected (SelectorEmpty)
    pub allow_empty_target_selector: bool,
    /// Consecutive schema violations per tool before the agent turn fails
    pub tool_schema_violation_limit: u32,
    /// Default model name used when an agent omits modelRef
    pub model_default_name: String,
}

/// Deadline and retry policy for model calls
#[derive(Debug, Clone)]
pub struct ModelCallConfig {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for ModelCallConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retries: 3,
            backoff_initial: Duration::from_millis(500),
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbosity: 1,
            max_concurrent_targets: 8,
            memory_default_name: "default".to_string(),
            model_call: ModelCallConfig::default(),
            tool_call_timeout: Duration::from_secs(30),
            memory_call_timeout: Duration::from_secs(10),
            evaluator_call_timeout: Duration::from_secs(60),
            engine_call_timeout: Duration::from_secs(120),
            agent_step_limit: 16,
            team_max_turns: 16,
            query_deadline: None,
            allow_empty_target_selector: false,
            tool_schema_violation_limit: 3,
            model_default_name: "default".to_string(),
        }
    }
}

impl EngineConfig {
    /// Build configuration from `MAESTRO_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse::<u8>("MAESTRO_VERBOSITY") {
            config.verbosity = v.min(3);
        }
        if let Some(v) = env_parse::<usize>("MAESTRO_MAX_CONCURRENT_TARGETS") {
            config.max_concurrent_targets = v.max(1);
        }
        if let Ok(v) = std::env::var("MAESTRO_MEMORY_DEFAULT_NAME") {
            if !v.is_empty() {
                config.memory_default_name = v;
            }
        }
        if let Some(v) = env_parse::<u64>("MAESTRO_MODEL_CALL_TIMEOUT_SECS") {
            config.model_call.timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u32>("MAESTRO_MODEL_CALL_RETRIES") {
            config.model_call.retries = v;
        }
        if let Some(v) = env_parse::<u64>("MAESTRO_MODEL_CALL_BACKOFF_INITIAL_MS") {
            config.model_call.backoff_initial = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<u64>("MAESTRO_MODEL_CALL_BACKOFF_MAX_MS") {
            config.model_call.backoff_max = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<u64>("MAESTRO_TOOL_CALL_TIMEOUT_SECS") {
            config.tool_call_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<usize>("MAESTRO_AGENT_STEP_LIMIT") {
            config.agent_step_limit = v.max(1);
        }
        if let Some(v) = env_parse::<u32>("MAESTRO_TEAM_MAX_TURNS") {
            config.team_max_turns = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("MAESTRO_QUERY_DEADLINE_SECS") {
            config.query_deadline = Some(Duration::from_secs(v));
        }
        if let Ok(v) = std::env::var("MAESTRO_ALLOW_EMPTY_TARGET_SELECTOR") {
            config.allow_empty_target_selector = v == "1" || v.eq_ignore_ascii_case("true");
        }

        config
    }

    /// True when events at `level` should be emitted
    pub fn level_enabled(&self, level: u8) -> bool {
        level <= self.verbosity
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
