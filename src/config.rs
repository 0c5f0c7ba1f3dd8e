use std::path::PathBuf;

use anyhow::Context;

use crate::classify::Classifier;
use crate::models::MarketSegment;
use crate::rules::RuleTable;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// JSON rule table replacing the built-in one.
    pub rules_path: Option<PathBuf>,
    /// Primary segment for respondents no rule matches.
    pub fallback_segment: MarketSegment,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let max_connections = match lookup("SEGMENTATION_MAX_CONNECTIONS") {
            Some(value) => value
                .parse::<u32>()
                .with_context(|| format!("invalid SEGMENTATION_MAX_CONNECTIONS: {value}"))?,
            None => 5,
        };

        let fallback_segment = match lookup("SEGMENTATION_FALLBACK_SEGMENT") {
            Some(value) => value.parse::<MarketSegment>()?,
            None => MarketSegment::UrbanProfessionals,
        };

        Ok(Self {
            database_url,
            max_connections,
            rules_path: lookup("SEGMENTATION_RULES").map(PathBuf::from),
            fallback_segment,
        })
    }

    pub fn classifier(&self) -> anyhow::Result<Classifier> {
        let rules = match &self.rules_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading rule table");
                RuleTable::load(path)
                    .with_context(|| format!("failed to load rules from {}", path.display()))?
            }
            None => RuleTable::standard(),
        };
        Ok(Classifier::new(rules, self.fallback_segment))
    }
}
