use anyhow::{Context, Result, bail};
use chrono::Utc;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tally_core::Category;
use tally_finance::{
    Categorizer, ExpensePipeline, InMemoryReviewQueue, InMemoryRuleCache, MerchantRuleCache, OpenAiClassifier,
    PipelineOutcome, ReviewQueue,
};
use tally_ingest::{RawMessage, UNKNOWN_MERCHANT, parse_inbox_csv};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod auth;
mod config;
mod state;

use config::Config;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TALLY_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "tally", version, long_version = LONG_VERSION, about = "Expense SMS categorizer")]
struct Cli {
    /// User whose rules and review entries are read and written
    #[arg(long, global = true, default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one message through detection, extraction, and categorization
    Process {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        body: String,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process an exported inbox CSV (sender,body,received_at)
    Scan {
        /// Defaults to ./sms_inbox.csv if present
        #[arg(long)]
        csv: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Learned merchant rules
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// Low-confidence categorizations awaiting confirmation
    Review {
        #[command(subcommand)]
        command: ReviewCommand,
    },

    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    List,
}

#[derive(Subcommand, Debug)]
enum ReviewCommand {
    List,

    /// Confirm an entry with the right category and learn a rule from it
    Resolve {
        id: Uuid,

        #[arg(long)]
        category: String,
    },

    Dismiss { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write ~/.tally/config.toml with defaults
    Init,
    /// Print the effective configuration
    Show,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Store an OpenAI API key in ~/.tally/auth.json
    PasteOpenaiApiKey,
}

/// Stores loaded from the JSON snapshots, written back after each command.
struct Stores {
    rules: Arc<InMemoryRuleCache>,
    review: Arc<InMemoryReviewQueue>,
}

impl Stores {
    fn load() -> Result<Self> {
        Ok(Self {
            rules: Arc::new(InMemoryRuleCache::from_rules(state::load_rules()?)),
            review: Arc::new(InMemoryReviewQueue::from_entries(state::load_review()?)),
        })
    }

    async fn save(&self) -> Result<()> {
        state::save_rules(&self.rules.snapshot().await)?;
        state::save_review(&self.review.snapshot().await)?;
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Process { sender, body, json } => {
            let cfg = config::load_config()?;
            let stores = Stores::load()?;
            let pipeline = build_pipeline(&cfg, &stores)?;

            let msg = RawMessage::new(sender, body, Utc::now());
            let outcome = pipeline.process(&cli.user, &msg).await;
            print_outcomes(&[(msg, outcome)], json, cfg.timezone()?)?;
            stores.save().await?;
        }

        Command::Scan { csv, json } => {
            let csv_path = csv.unwrap_or_else(|| PathBuf::from("sms_inbox.csv"));
            if !csv_path.exists() {
                bail!("CSV not found: {} (pass --csv <path>)", csv_path.display());
            }
            let messages = parse_inbox_csv(&csv_path).with_context(|| format!("parsing {}", csv_path.display()))?;

            let cfg = config::load_config()?;
            let stores = Stores::load()?;
            let pipeline = build_pipeline(&cfg, &stores)?;

            let outcomes = pipeline.process_all(&cli.user, &messages).await;
            let rows: Vec<_> = messages.into_iter().zip(outcomes).collect();
            print_outcomes(&rows, json, cfg.timezone()?)?;

            if !json {
                let found = rows.iter().filter(|(_, o)| o.is_transaction()).count();
                println!(
                    "\nScanned {} messages from {} ({} transactions, detector: {})",
                    rows.len(),
                    csv_path.display(),
                    found,
                    pipeline.detector_name()
                );
            }
            stores.save().await?;
        }

        Command::Rules { command } => match command {
            RulesCommand::List => {
                let tz = config::load_config()?.timezone()?;
                let stores = Stores::load()?;
                let rules = stores.rules.rules(&cli.user).await?;
                if rules.is_empty() {
                    println!("No learned rules for {}", cli.user);
                }
                for r in rules {
                    println!(
                        "{:<28} {:<16} conf={:.2} used={:<4} last={}",
                        r.merchant_pattern,
                        r.category.label(),
                        r.confidence,
                        r.times_used,
                        r.last_used_at.with_timezone(&tz).format("%Y-%m-%d %H:%M")
                    );
                }
            }
        },

        Command::Review { command } => {
            let stores = Stores::load()?;
            match command {
                ReviewCommand::List => {
                    let pending = stores.review.pending(&cli.user).await?;
                    if pending.is_empty() {
                        println!("Nothing to review");
                    }
                    for e in pending {
                        println!(
                            "{}  {}  ₹{}  suggested={} ({:.2})",
                            e.id,
                            e.notification_body(),
                            e.expense.amount,
                            e.suggested_category.label(),
                            e.confidence
                        );
                    }
                }
                ReviewCommand::Resolve { id, category } => {
                    let category = parse_category(&category)?;
                    let entry = stores.review.resolve(id, category).await?;
                    println!("Confirmed {} as {}", entry.expense.merchant, category);

                    if entry.expense.merchant != UNKNOWN_MERCHANT {
                        let rule = stores
                            .rules
                            .promote(&entry.user_id, &entry.expense.merchant, category, 1.0)
                            .await?;
                        info!(pattern = %rule.merchant_pattern, category = %rule.category, "learned rule from review");
                    }
                    stores.save().await?;
                }
                ReviewCommand::Dismiss { id } => {
                    let entry = stores.review.dismiss(id).await?;
                    println!("Dismissed {}", entry.expense.merchant);
                    stores.save().await?;
                }
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                println!("# {}", config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },

        Command::Auth { command } => match command {
            AuthCommand::PasteOpenaiApiKey => auth::openai_paste_api_key()?,
        },
    }

    Ok(())
}

fn build_pipeline(cfg: &Config, stores: &Stores) -> Result<ExpensePipeline> {
    let mut categorizer = Categorizer::new(stores.rules.clone(), stores.review.clone())
        .with_config(cfg.categorizer_config());

    if cfg.classifier.provider == "openai" {
        let classifier = OpenAiClassifier::new(auth::openai_api_key()?, cfg.classifier.model.clone())
            .with_base_url(cfg.classifier.base_url.clone())
            .with_temperature(cfg.classifier.temperature)
            .with_request_timeout(Duration::from_secs(cfg.categorizer.timeout_secs))?;
        if classifier.is_configured() {
            categorizer = categorizer.with_external(Arc::new(classifier));
        } else {
            warn!("no OpenAI API key (set OPENAI_API_KEY or run `tally auth paste-openai-api-key`); using keyword rules");
        }
    }

    ExpensePipeline::with_mode(cfg.detector.mode, categorizer)
}

fn parse_category(label: &str) -> Result<Category> {
    Category::from_label(label).with_context(|| {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.label()).collect();
        format!("unknown category '{label}' (expected one of: {})", known.join(", "))
    })
}

fn print_outcomes(rows: &[(RawMessage, PipelineOutcome)], json: bool, tz: Tz) -> Result<()> {
    if json {
        let summaries: Vec<_> = rows.iter().map(|(m, o)| o.summary(&m.sender)).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    for (msg, outcome) in rows {
        let when = msg.received_at.with_timezone(&tz).format("%Y-%m-%d %H:%M");
        let s = outcome.summary(&msg.sender);
        match outcome {
            PipelineOutcome::NotATransaction => {
                println!("{when} {:<14} -- not a transaction", msg.sender);
            }
            _ => {
                println!(
                    "{when} {:<14} ₹{:<10} {:<24} {:<16} {:.2} {}{}",
                    msg.sender,
                    s.amount.unwrap_or_default().to_string(),
                    s.merchant.as_deref().unwrap_or(UNKNOWN_MERCHANT),
                    s.category.map(|c| c.label()).unwrap_or("-"),
                    s.confidence.unwrap_or_default(),
                    s.method.map(|m| m.to_string()).unwrap_or_else(|| s.status.to_string()),
                    s.note.as_deref().map(|n| format!("  [{n}]")).unwrap_or_default(),
                );
            }
        }
    }
    Ok(())
}
