use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tally_finance::CategorizerConfig;
use tally_ingest::DetectionMode;

use crate::state::ensure_tally_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorSection,
    pub categorizer: CategorizerSection,
    pub classifier: ClassifierSection,
    pub display: DisplaySection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSection {
    /// "lenient" (keyword or known sender) or "strict" (keyword and currency)
    pub mode: DetectionMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizerSection {
    pub promote_threshold: f64,
    pub review_threshold: f64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// "openai" or "none"
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    pub timezone: String,
}

impl Default for CategorizerSection {
    fn default() -> Self {
        let d = CategorizerConfig::default();
        Self {
            promote_threshold: d.promote_threshold,
            review_threshold: d.review_threshold,
            timeout_secs: d.external_timeout.as_secs(),
        }
    }
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: tally_finance::openai::OPENAI_BASE_URL.to_string(),
            temperature: 0.3,
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            timezone: "Asia/Kolkata".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let c = &self.categorizer;
        for (name, v) in [("promote_threshold", c.promote_threshold), ("review_threshold", c.review_threshold)] {
            if !(0.0..=1.0).contains(&v) {
                bail!("categorizer.{name} must be within [0, 1], got {v}");
            }
        }
        if c.review_threshold > c.promote_threshold {
            bail!(
                "categorizer.review_threshold ({}) must not exceed promote_threshold ({})",
                c.review_threshold,
                c.promote_threshold
            );
        }
        if c.timeout_secs == 0 {
            bail!("categorizer.timeout_secs must be at least 1");
        }
        match self.classifier.provider.as_str() {
            "openai" | "none" => {}
            other => bail!("unknown classifier provider '{other}' (expected \"openai\" or \"none\")"),
        }
        self.timezone()?;
        Ok(())
    }

    pub fn categorizer_config(&self) -> CategorizerConfig {
        CategorizerConfig {
            promote_threshold: self.categorizer.promote_threshold,
            review_threshold: self.categorizer.review_threshold,
            external_timeout: Duration::from_secs(self.categorizer.timeout_secs),
        }
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.display
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("display.timezone '{}': {e}", self.display.timezone))
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    let cfg: Config = toml::from_str(&s).context("parse config.toml")?;
    cfg.validate().with_context(|| format!("invalid {}", p.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
