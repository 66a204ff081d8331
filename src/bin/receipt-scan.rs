//! CLI binary for receipt-scanner.
//!
//! A thin shim over the library crate: `scan` maps flags to
//! `ExtractionConfig` and runs the pipeline, the other subcommands work on
//! the JSON transaction file and the stored API key.

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use receipt_scanner::keystore::mask_key;
use receipt_scanner::ledger::{self, ManualEntry};
use receipt_scanner::model::{self, Items};
use receipt_scanner::{
    format_amount, ApiKeyStore, ExtractionConfig, ExtractionOutcome, ExtractionProgressCallback,
    ExtractionStage, FileKeyStore, JsonFileStore, ProgressCallback, ReceiptCandidate, ReceiptExtractor,
    Transaction, TransactionKind, TransactionStore,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders the pipeline's progress fraction as a percentage bar.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_progress(&self, stage: ExtractionStage, fraction: f32) {
        let msg = match stage {
            ExtractionStage::Idle => "",
            ExtractionStage::Preprocessing => "compressing image…",
            ExtractionStage::KeySelected | ExtractionStage::RequestBuilt => "preparing request…",
            ExtractionStage::AwaitingResponse => "waiting for model…",
            ExtractionStage::ResponseReceived => "reading answer…",
            ExtractionStage::Parsed => "done",
        };
        self.bar.set_position((fraction * 100.0).round() as u64);
        self.bar.set_message(msg);
        if stage == ExtractionStage::Parsed {
            self.bar.finish_and_clear();
        }
    }

    fn on_failure(&self, _message: &str) {
        self.bar.abandon_with_message(red("failed"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Store a key once (sk-ant… → Anthropic, anything else → OpenAI)
  receipt-scan set-key sk-ant-api03-...

  # Scan a receipt and save it
  receipt-scan scan photo.jpg --save

  # Machine-readable output
  receipt-scan scan photo.jpg --json

  # Browse and search
  receipt-scan list --search coffee
  receipt-scan summary

  # Manual entries
  receipt-scan add --description "Lunch" --amount 12.50 --address "1 Main St" --phone +15551234 --item Soup=5.5
  receipt-scan add --income --description "Salary" --amount 2500

ENVIRONMENT VARIABLES:
  RECEIPT_SCANNER_API_KEY     API key, overrides the stored one
  RECEIPT_SCANNER_DATA        Transaction file (JSON)
  RECEIPT_SCANNER_KEY_FILE    API-key file
  RECEIPT_SCANNER_CURRENCY    Currency symbol for display (default $)
  RUST_LOG                    tracing filter, e.g. receipt_scanner=debug
"#;

/// Scan receipts with a vision LLM and keep a small ledger.
#[derive(Parser, Debug)]
#[command(
    name = "receipt-scan",
    version,
    about = "Scan receipts with a vision LLM and keep a small income/expense ledger",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Transaction file.
    #[arg(long, global = true, env = "RECEIPT_SCANNER_DATA")]
    data_file: Option<PathBuf>,

    /// API-key file.
    #[arg(long, global = true, env = "RECEIPT_SCANNER_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Currency symbol used when printing amounts.
    #[arg(long, global = true, env = "RECEIPT_SCANNER_CURRENCY", default_value = "$")]
    currency: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RECEIPT_SCANNER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, global = true, env = "RECEIPT_SCANNER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a receipt from a photo.
    Scan(ScanArgs),
    /// List transactions, newest first.
    List {
        /// Only show transactions containing this text.
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Add a transaction by hand.
    Add(EntryArgs),
    /// Replace the fields of a transaction, keeping its id.
    Edit {
        id: String,
        #[command(flatten)]
        entry: EntryArgs,
    },
    /// Delete a transaction.
    Delete { id: String },
    /// Replace all transactions with the sample data.
    Reset,
    /// Delete all transactions.
    Clear,
    /// Show the net totals for the last 7 days and the current month.
    Summary,
    /// Store the API key.
    SetKey { key: String },
    /// Show the stored API key, masked.
    ShowKey,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Receipt photo (JPEG or PNG).
    image: PathBuf,

    /// Append the extracted receipt to the transaction file.
    #[arg(long)]
    save: bool,

    /// Print the extracted receipt as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "RECEIPT_SCANNER_NO_PROGRESS")]
    no_progress: bool,

    /// API key; the stored key is used when absent.
    #[arg(long, env = "RECEIPT_SCANNER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Longest side of the uploaded image, in pixels.
    #[arg(long, env = "RECEIPT_SCANNER_MAX_DIMENSION", default_value_t = 1024)]
    max_dimension: u32,

    /// JPEG quality (1–100).
    #[arg(long, env = "RECEIPT_SCANNER_JPEG_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Never enlarge images smaller than --max-dimension.
    #[arg(long, env = "RECEIPT_SCANNER_NO_UPSCALE")]
    no_upscale: bool,

    /// Max output tokens requested from the model.
    #[arg(long, env = "RECEIPT_SCANNER_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: u32,

    /// Whole-request timeout in seconds.
    #[arg(long, env = "RECEIPT_SCANNER_TIMEOUT")]
    timeout: Option<u64>,

    /// Model used with Anthropic keys.
    #[arg(long, env = "RECEIPT_SCANNER_ANTHROPIC_MODEL")]
    anthropic_model: Option<String>,

    /// Model used with OpenAI keys.
    #[arg(long, env = "RECEIPT_SCANNER_OPENAI_MODEL")]
    openai_model: Option<String>,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "RECEIPT_SCANNER_PROMPT")]
    prompt_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EntryArgs {
    /// Record income instead of a spend.
    #[arg(long, conflicts_with = "spend")]
    income: bool,

    /// Record a spend (default for `add`; switches an income when editing).
    #[arg(long)]
    spend: bool,

    #[arg(long)]
    description: Option<String>,

    /// Amount, digits with an optional decimal point.
    #[arg(long)]
    amount: Option<String>,

    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    /// Line item as NAME=PRICE; repeatable.
    #[arg(long = "item", value_parser = parse_item)]
    items: Vec<(String, f64)>,

    /// Timestamp as "YYYY-MM-DD HH:MM"; defaults to now (or the stored time when editing).
    #[arg(long, value_parser = parse_timestamp)]
    at: Option<NaiveDateTime>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let data_path = cli.data_file.clone().unwrap_or_else(JsonFileStore::default_path);
    let key_path = cli.key_file.clone().unwrap_or_else(FileKeyStore::default_path);
    let store = JsonFileStore::new(&data_path);
    let keys = FileKeyStore::new(key_path);

    match &cli.command {
        Command::Scan(args) => scan(&cli, args, &store, &keys).await,
        Command::List { search } => {
            seed_if_new(&store)?;
            let mut all = store.list_all().context("Failed to load transactions")?;
            ledger::sort_newest_first(&mut all);
            let shown = ledger::search(&all, search.as_deref().unwrap_or(""));
            if shown.is_empty() && !cli.quiet {
                eprintln!("{}", dim("No transactions."));
            }
            for t in shown {
                print_transaction(t, &cli.currency);
            }
            Ok(())
        }
        Command::Add(entry) => {
            let manual = entry.to_manual(None)?;
            let t = manual
                .into_transaction(entry.at.unwrap_or_else(model::now))
                .context("Invalid entry")?;
            let id = t.id.clone();
            store.append(t).context("Failed to save transaction")?;
            if !cli.quiet {
                eprintln!("{} Added {}", green("✔"), bold(&id));
            }
            Ok(())
        }
        Command::Edit { id, entry } => {
            let existing = store
                .list_all()
                .context("Failed to load transactions")?
                .into_iter()
                .find(|t| &t.id == id)
                .with_context(|| format!("Transaction '{id}' not found"))?;
            let timestamp = entry.at.unwrap_or(existing.timestamp);
            let manual = entry.to_manual(Some(&existing))?;
            let replacement = manual.into_transaction(timestamp).context("Invalid entry")?;
            let stored = store.replace(id, replacement).context("Failed to update transaction")?;
            if !cli.quiet {
                eprintln!("{} Updated", green("✔"));
            }
            print_transaction(&stored, &cli.currency);
            Ok(())
        }
        Command::Delete { id } => {
            store.remove(id).context("Failed to delete transaction")?;
            if !cli.quiet {
                eprintln!("{} Deleted {}", green("✔"), id);
            }
            Ok(())
        }
        Command::Reset => {
            store.reset_to_samples().context("Failed to reset transactions")?;
            if !cli.quiet {
                eprintln!("{} Loaded sample transactions", green("✔"));
            }
            Ok(())
        }
        Command::Clear => {
            store.clear().context("Failed to clear transactions")?;
            if !cli.quiet {
                eprintln!("{} All transactions deleted", green("✔"));
            }
            Ok(())
        }
        Command::Summary => {
            seed_if_new(&store)?;
            let all = store.list_all().context("Failed to load transactions")?;
            let totals = ledger::totals(&all, model::now());
            println!("Last 7 days:  {}", signed(totals.week, &cli.currency));
            println!("This month:   {}", signed(totals.month, &cli.currency));
            Ok(())
        }
        Command::SetKey { key } => {
            if key.trim().is_empty() {
                bail!("API key must not be empty");
            }
            keys.set(key).context("Failed to store API key")?;
            if !cli.quiet {
                eprintln!("{} API key saved to {}", green("✔"), keys.path().display());
            }
            Ok(())
        }
        Command::ShowKey => {
            let key = keys.get().context("Failed to read API key")?;
            if key.is_empty() {
                println!("{}", dim("(not set)"));
            } else {
                println!("{}", mask_key(&key));
            }
            Ok(())
        }
    }
}

async fn scan(cli: &Cli, args: &ScanArgs, store: &JsonFileStore, keys: &FileKeyStore) -> Result<()> {
    let show_progress = !cli.quiet && !args.no_progress && !args.json;
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress).await?;

    let api_key = match args.api_key {
        Some(ref k) => k.clone(),
        None => keys.get().context("Failed to read API key")?,
    };

    let extractor = ReceiptExtractor::new(config).context("Failed to create HTTP client")?;
    let candidate = match extractor.extract(args.image.as_path(), &api_key).await {
        ExtractionOutcome::Success(c) => c,
        ExtractionOutcome::NoReceiptDetected { message } => bail!("{message}"),
        ExtractionOutcome::Failed { message, .. } => bail!("{message}"),
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&candidate).context("Failed to serialise receipt")?
        );
    } else {
        print_candidate(&candidate, &cli.currency);
    }

    if args.save {
        let t = candidate.into_transaction();
        let id = t.id.clone();
        store.append(t).context("Failed to save transaction")?;
        if !cli.quiet {
            eprintln!("{} Saved as {}", green("✔"), bold(&id));
        }
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(args: &ScanArgs, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_dimension(args.max_dimension)
        .jpeg_quality(args.jpeg_quality)
        .allow_upscale(!args.no_upscale)
        .max_tokens(args.max_tokens);

    if let Some(secs) = args.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(ref m) = args.anthropic_model {
        builder = builder.anthropic_model(m);
    }
    if let Some(ref m) = args.openai_model {
        builder = builder.openai_model(m);
    }
    if let Some(ref path) = args.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt.trim());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

impl EntryArgs {
    /// Merge the flags over `existing` (if editing) into a form entry.
    fn to_manual(&self, existing: Option<&Transaction>) -> Result<ManualEntry> {
        let (was_spend, old_address, old_phone, old_items) = match existing.map(|t| &t.kind) {
            Some(TransactionKind::Spend {
                address_location,
                phone_number_of_merchant,
                items,
            }) => (true, address_location.clone(), phone_number_of_merchant.clone(), items.clone()),
            Some(TransactionKind::Income) => (false, String::new(), String::new(), Items::new()),
            None => (true, String::new(), String::new(), Items::new()),
        };
        let is_spend = if self.income {
            false
        } else if self.spend {
            true
        } else {
            was_spend
        };

        let items = if self.items.is_empty() {
            old_items
        } else {
            self.items.iter().cloned().collect()
        };

        Ok(ManualEntry {
            is_spend,
            description: self
                .description
                .clone()
                .or_else(|| existing.map(|t| t.description.clone()))
                .unwrap_or_default(),
            amount: self
                .amount
                .clone()
                .or_else(|| existing.map(|t| t.total_amount.to_string()))
                .unwrap_or_default(),
            address_location: self.address.clone().unwrap_or(old_address),
            phone_number_of_merchant: self.phone.clone().unwrap_or(old_phone),
            items,
        })
    }
}

fn parse_item(s: &str) -> Result<(String, f64), String> {
    let (name, price) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=PRICE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("item name is empty in '{s}'"));
    }
    let price = price
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid price in '{s}'"))?;
    Ok((name.to_string(), price))
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| format!("expected \"YYYY-MM-DD HH:MM\", got '{s}'"))
}

/// Seed a brand-new transaction file with the sample data.
fn seed_if_new(store: &JsonFileStore) -> Result<()> {
    if !store.path().exists() {
        store
            .initialize_with_samples()
            .context("Failed to initialise transactions")?;
    }
    Ok(())
}

fn signed(amount: f64, currency: &str) -> String {
    let text = format_amount(amount, currency);
    if amount < 0.0 {
        red(&text)
    } else {
        green(&text)
    }
}

fn print_transaction(t: &Transaction, currency: &str) {
    println!(
        "{}  {:>14}  {}  {}",
        dim(&t.timestamp.format("%d %b %Y %H:%M").to_string()),
        signed(t.signed_amount(), currency),
        bold(&t.description),
        dim(&t.id),
    );
    if let TransactionKind::Spend {
        address_location,
        phone_number_of_merchant,
        items,
    } = &t.kind
    {
        if !address_location.is_empty() || !phone_number_of_merchant.is_empty() {
            println!("    {}  {}", address_location, phone_number_of_merchant);
        }
        for (name, price) in items {
            println!("    · {:<24} {}", name, format_amount(*price, currency));
        }
    }
}

fn print_candidate(c: &ReceiptCandidate, currency: &str) {
    println!("{}  {}", bold(&c.description), format_amount(c.total_amount, currency));
    let when = c.timestamp.format("%d %b %Y %H:%M").to_string();
    if c.timestamp_parsed {
        println!("  Date:     {when}");
    } else {
        println!("  Date:     {when} {}", dim("(not on receipt, using now)"));
    }
    if !c.address_location.is_empty() {
        println!("  Address:  {}", c.address_location);
    }
    if !c.phone_number_of_merchant.is_empty() {
        println!("  Phone:    {}", c.phone_number_of_merchant);
    }
    for (name, price) in &c.items {
        println!("  · {:<24} {}", name, format_amount(*price, currency));
    }
    for a in &c.anomalies {
        eprintln!("  {} {}", yellow("⚠"), a);
    }
}
