use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for GitMaster
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitMasterConfig {
    /// Merge target settings
    pub merge: MergeConfig,
    /// Conflict classification settings
    pub classifier: ClassifierConfig,
    /// Resolution planning settings
    pub planner: PlannerConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MergeConfig {
    /// Branch all agent branches are merged into
    pub target_branch: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// Combined line count below which a parallel conflict is assisted
    /// rather than manual
    pub parallel_auto_threshold: usize,
}

/// What to do when the analysis collaborator fails or times out during
/// assisted planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssistedFallback {
    /// Give up after one failed attempt and queue the conflict for review
    DegradeToManual,
    /// Re-issue the (idempotent) request up to `max_retry_attempts` times,
    /// then degrade
    Retry,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    /// Fallback policy for assisted planning failures
    pub assisted_fallback: AssistedFallback,
    /// Attempt cap when `assisted_fallback` is `Retry`
    pub max_retry_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level for the tracing subscriber
    pub log_level: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            target_branch: "main".to_string(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            parallel_auto_threshold: crate::conflict::DEFAULT_PARALLEL_AUTO_THRESHOLD,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            assisted_fallback: AssistedFallback::DegradeToManual,
            max_retry_attempts: 3,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for GitMasterConfig {
    fn default() -> Self {
        Self {
            merge: MergeConfig::default(),
            classifier: ClassifierConfig::default(),
            planner: PlannerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GitMasterConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Configuration file (gitmaster.toml)
    /// 3. Environment variables (prefixed with GITMASTER__)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("merge.target_branch", "main")?
            .set_default(
                "classifier.parallel_auto_threshold",
                crate::conflict::DEFAULT_PARALLEL_AUTO_THRESHOLD as i64,
            )?
            .set_default("planner.assisted_fallback", "degrade-to-manual")?
            .set_default("planner.max_retry_attempts", 3)?
            .set_default("observability.log_level", "info")?;

        if Path::new("gitmaster.toml").exists() {
            builder = builder.add_source(File::with_name("gitmaster"));
        }

        builder = builder.add_source(
            Environment::with_prefix("GITMASTER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<GitMasterConfig, anyhow::Error>> =
    std::sync::LazyLock::new(GitMasterConfig::load);

/// Get the global configuration
pub fn config() -> Result<&'static GitMasterConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = GitMasterConfig::default();
        assert_eq!(config.merge.target_branch, "main");
        assert_eq!(config.classifier.parallel_auto_threshold, 50);
        assert_eq!(
            config.planner.assisted_fallback,
            AssistedFallback::DegradeToManual
        );
    }

    #[test]
    fn round_trips_through_toml() {
        let config = GitMasterConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitmaster.toml");
        config.save_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: GitMasterConfig = toml::from_str(&text).unwrap();
        assert_eq!(loaded.merge.target_branch, config.merge.target_branch);
        assert_eq!(
            loaded.planner.max_retry_attempts,
            config.planner.max_retry_attempts
        );
    }
}
