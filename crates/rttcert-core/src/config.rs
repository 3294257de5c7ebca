//! Engine configuration loaded from `rttcert.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::distribution::TierProfile;
use crate::engine::EngineConfig;
use crate::history::CooldownPolicy;
use crate::model::{Category, CertificationTier};
use crate::selector::ExclusionPolicy;

/// Difficulty weights (and optional category weights) for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
    pub expert: u32,
    /// Category slug to weight. Empty means equal weights.
    #[serde(default)]
    pub categories: BTreeMap<String, u32>,
}

impl ProfileConfig {
    pub fn to_profile(&self) -> Result<TierProfile> {
        let mut profile = TierProfile::new(self.easy, self.medium, self.hard, self.expert);
        for (name, weight) in &self.categories {
            let category: Category = name
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("invalid category weight in profile")?;
            profile = profile.with_category_weight(category, *weight);
        }
        Ok(profile)
    }
}

/// Top-level rttcert configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamConfig {
    /// Default question bank file or directory.
    #[serde(default)]
    pub bank_path: Option<PathBuf>,
    #[serde(default = "default_questions_per_exam")]
    pub questions_per_exam: usize,
    /// How many of a candidate's recent attempts are excluded from a new draw.
    #[serde(default = "default_cooldown_attempts")]
    pub cooldown_attempts: usize,
    /// Attempts older than this many days are not excluded.
    #[serde(default = "default_cooldown_days")]
    pub cooldown_days: u32,
    #[serde(default = "default_true")]
    pub exclude_cohort_questions: bool,
    #[serde(default)]
    pub exclusion_policy: ExclusionPolicy,
    /// Max concurrent issues when starting a cohort.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Cells with fewer questions than this are reported by `validate`.
    #[serde(default = "default_min_cell_size")]
    pub min_cell_size: usize,
    /// Per-tier distribution overrides, keyed by tier name.
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

fn default_questions_per_exam() -> usize {
    100
}
fn default_cooldown_attempts() -> usize {
    3
}
fn default_cooldown_days() -> u32 {
    180
}
fn default_true() -> bool {
    true
}
fn default_parallelism() -> usize {
    4
}
fn default_min_cell_size() -> usize {
    2
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            bank_path: None,
            questions_per_exam: default_questions_per_exam(),
            cooldown_attempts: default_cooldown_attempts(),
            cooldown_days: default_cooldown_days(),
            exclude_cohort_questions: true,
            exclusion_policy: ExclusionPolicy::default(),
            parallelism: default_parallelism(),
            min_cell_size: default_min_cell_size(),
            profiles: BTreeMap::new(),
        }
    }
}

impl ExamConfig {
    /// The distribution for `tier`: the configured override, else the default.
    pub fn profile_for(&self, tier: CertificationTier) -> Result<TierProfile> {
        match self.profiles.get(&tier.to_string()) {
            Some(p) => p
                .to_profile()
                .with_context(|| format!("invalid profile for tier '{tier}'")),
            None => Ok(TierProfile::default_for(tier)),
        }
    }

    pub fn cooldown(&self) -> CooldownPolicy {
        CooldownPolicy {
            attempts: self.cooldown_attempts,
            window: chrono::Duration::days(i64::from(self.cooldown_days)),
            include_cohort: self.exclude_cohort_questions,
        }
    }

    /// Engine settings, with every configured profile validated.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        for name in self.profiles.keys() {
            name.parse::<CertificationTier>()
                .map_err(|e| anyhow::anyhow!(e))
                .context("unknown tier in [profiles]")?;
        }
        let mut profiles = BTreeMap::new();
        for tier in CertificationTier::ALL {
            if self.profiles.contains_key(&tier.to_string()) {
                profiles.insert(tier, self.profile_for(tier)?);
            }
        }
        Ok(EngineConfig {
            questions_per_exam: self.questions_per_exam,
            policy: self.exclusion_policy,
            cooldown: self.cooldown(),
            parallelism: self.parallelism,
            profiles,
        })
    }

    /// Render as TOML (used by `rttcert init`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Unset variables become empty. Substituted values are not expanded again.
pub fn resolve_env_vars(s: &str) -> String {
    expand_vars(s, |name| std::env::var(name).ok())
}

fn expand_vars(s: &str, var: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        result.push_str(&var(&rest[start + 2..start + 2 + len]).unwrap_or_default());
        rest = &rest[start + 2 + len + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `rttcert.toml` in the current directory
/// 2. `~/.config/rttcert/config.toml`
///
/// Environment variable overrides: `RTTCERT_BANK`, `RTTCERT_QUESTIONS_PER_EXAM`.
pub fn load_config() -> Result<ExamConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("rttcert.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            parse_config_str(
                &std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?,
            )
            .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Parse a config document and resolve `${VAR}` references in paths.
pub fn parse_config_str(content: &str) -> Result<ExamConfig> {
    let mut config: ExamConfig = toml::from_str(content)?;
    config.bank_path = config
        .bank_path
        .map(|p| PathBuf::from(resolve_env_vars(&p.to_string_lossy())));
    Ok(config)
}

fn apply_env_overrides(config: &mut ExamConfig, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(bank) = var("RTTCERT_BANK") {
        config.bank_path = Some(PathBuf::from(bank));
    }
    if let Some(count) = var("RTTCERT_QUESTIONS_PER_EXAM") {
        config.questions_per_exam = count
            .trim()
            .parse()
            .with_context(|| format!("RTTCERT_QUESTIONS_PER_EXAM is not a number: {count:?}"))?;
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("rttcert"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_RTTCERT_TEST_VAR", "banks");
        assert_eq!(resolve_env_vars("${_RTTCERT_TEST_VAR}"), "banks");
        assert_eq!(
            resolve_env_vars("/srv/${_RTTCERT_TEST_VAR}/core.toml"),
            "/srv/banks/core.toml"
        );
        std::env::remove_var("_RTTCERT_TEST_VAR");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let var = |name: &str| match name {
            "SELF" => Some("${SELF}".to_string()),
            "DIR" => Some("banks".to_string()),
            _ => None,
        };
        assert_eq!(expand_vars("${SELF}/x", var), "${SELF}/x");
        assert_eq!(expand_vars("${DIR}/${SELF}", var), "banks/${SELF}");
        assert_eq!(expand_vars("${MISSING}core.toml", var), "core.toml");
        assert_eq!(expand_vars("open ${DIR", var), "open ${DIR");
    }

    #[test]
    fn default_config() {
        let config = ExamConfig::default();
        assert_eq!(config.questions_per_exam, 100);
        assert_eq!(config.cooldown_attempts, 3);
        assert_eq!(config.cooldown_days, 180);
        assert!(config.exclude_cohort_questions);
        assert_eq!(config.exclusion_policy, ExclusionPolicy::BestEffort);
        assert_eq!(config.parallelism, 4);
    }

    #[test]
    fn parse_full_config() {
        let config = parse_config_str(
            r#"
bank_path = "banks/rtt-core.toml"
questions_per_exam = 50
exclusion_policy = "strict"
exclude_cohort_questions = false

[profiles.expert]
easy = 0
medium = 10
hard = 50
expert = 40

[profiles.expert.categories]
cancer-pathways = 2
clock-stops = 1
"#,
        )
        .unwrap();
        assert_eq!(config.questions_per_exam, 50);
        assert_eq!(config.exclusion_policy, ExclusionPolicy::Strict);
        assert_eq!(config.bank_path.as_deref(), Some(Path::new("banks/rtt-core.toml")));

        let expert = config.profile_for(CertificationTier::Expert).unwrap();
        assert_eq!(expert.difficulty_weight(Difficulty::Hard), 50);
        assert_eq!(expert.category_weights.len(), 2);
        assert_eq!(
            config.profile_for(CertificationTier::Foundation).unwrap(),
            TierProfile::default_for(CertificationTier::Foundation)
        );

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.policy, ExclusionPolicy::Strict);
        assert!(!engine.cooldown.include_cohort);
        assert!(engine.profiles.contains_key(&CertificationTier::Expert));
        assert!(!engine.profiles.contains_key(&CertificationTier::Foundation));
    }

    #[test]
    fn unknown_tier_or_category_in_profiles_is_rejected() {
        let config = parse_config_str("[profiles.gold]\neasy = 1\nmedium = 1\nhard = 1\nexpert = 1\n").unwrap();
        assert!(config.engine_config().is_err());

        let config = parse_config_str(
            "[profiles.expert]\neasy = 1\nmedium = 1\nhard = 1\nexpert = 1\n[profiles.expert.categories]\nwaiting-lists = 1\n",
        )
        .unwrap();
        let err = config.profile_for(CertificationTier::Expert).unwrap_err();
        assert!(format!("{err:#}").contains("unknown category"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = ExamConfig::default();
        apply_env_overrides(&mut config, |name| match name {
            "RTTCERT_BANK" => Some("/data/bank.toml".into()),
            "RTTCERT_QUESTIONS_PER_EXAM" => Some("60".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.bank_path, Some(PathBuf::from("/data/bank.toml")));
        assert_eq!(config.questions_per_exam, 60);

        let bad = apply_env_overrides(&mut config, |name| {
            (name == "RTTCERT_QUESTIONS_PER_EXAM").then(|| "many".to_string())
        });
        assert!(bad.is_err());
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rttcert.toml");
        std::fs::write(&path, "questions_per_exam = 30\ncooldown_days = 90\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.cooldown_days, 90);
        assert_eq!(config.cooldown().window, chrono::Duration::days(90));

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn default_config_roundtrips_through_toml() {
        let text = ExamConfig::default().to_toml().unwrap();
        let parsed = parse_config_str(&text).unwrap();
        assert_eq!(parsed.questions_per_exam, 100);
    }
}
