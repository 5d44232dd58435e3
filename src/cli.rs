use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use payment_receipts::config::{AppConfig, DEFAULT_CONFIG_FILE};
use payment_receipts::integrity::{verify_receipt_id, verify_sidecar};
use payment_receipts::pipeline::ReceiptGenerator;
use payment_receipts::record::{RecipientArgs, RecipientRecord};
use payment_receipts::sync::{HttpSheetSource, run_sync};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "payment-receipts",
    about = "Tamper-evident payment receipts and recipient sheet sync"
)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, env = "PAYMENT_RECEIPTS_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate one receipt from flags, or one per spreadsheet row without them
    Generate(GenerateArgs),

    /// Refresh the local recipient spreadsheet from the remote sheet
    Sync,

    /// Check a receipt's sidecar against its integrity hash
    Verify {
        /// Receipt id, looked up under the output directory
        #[arg(long, required_unless_present = "file", conflicts_with = "file")]
        id: Option<String>,

        /// Path to a sidecar JSON file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Recipient name
    #[arg(long)]
    pub name: Option<String>,

    /// Billed amount
    #[arg(long)]
    pub amount: Option<String>,

    /// Amount still due
    #[arg(long)]
    pub due: Option<String>,

    /// Payment date
    #[arg(long)]
    pub date: Option<String>,

    /// What the payment was for
    #[arg(long)]
    pub desc: Option<String>,

    /// Receipt number (derived from the clock when omitted or AUTO)
    #[arg(long)]
    pub receipt: Option<String>,
}

impl GenerateArgs {
    /// The single recipient described by the flags, or `None` for batch mode.
    fn recipient(&self) -> Result<Option<RecipientArgs>> {
        let required = [
            ("--name", &self.name),
            ("--amount", &self.amount),
            ("--date", &self.date),
            ("--desc", &self.desc),
        ];
        let any_given = required.iter().any(|(_, value)| value.is_some())
            || self.due.is_some()
            || self.receipt.is_some();
        if !any_given {
            return Ok(None);
        }

        match (&self.name, &self.amount, &self.date, &self.desc) {
            (Some(name), Some(amount), Some(date), Some(description)) => Ok(Some(RecipientArgs {
                name: name.clone(),
                amount: amount.clone(),
                due: self.due.clone(),
                date: date.clone(),
                description: description.clone(),
                receipt_no: self.receipt.clone(),
            })),
            _ => {
                let missing: Vec<&str> = required
                    .iter()
                    .filter(|(_, value)| value.is_none())
                    .map(|(flag, _)| *flag)
                    .collect();
                anyhow::bail!(
                    "Missing flags for a single receipt: {} (omit all recipient flags to use the spreadsheet)",
                    missing.join(", ")
                )
            }
        }
    }
}

/// Configuration for `command`; `init-config` never reads an existing file.
pub fn load_config(command: &Commands, path: &Path) -> Result<AppConfig> {
    if matches!(command, Commands::InitConfig { .. }) {
        return Ok(AppConfig::default());
    }
    AppConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

pub fn run_command(command: Commands, config: AppConfig, config_path: &Path) -> Result<ExitCode> {
    match command {
        Commands::Generate(args) => handle_generate(&args, config),
        Commands::Sync => handle_sync(&config),
        Commands::Verify { id, file } => handle_verify(id, file, &config),
        Commands::InitConfig { force } => handle_init_config(&config, config_path, force),
    }
}

fn handle_generate(args: &GenerateArgs, config: AppConfig) -> Result<ExitCode> {
    let generator = ReceiptGenerator::new(config.receipts);

    if let Some(recipient) = args.recipient()? {
        let receipt = generator
            .generate(&RecipientRecord::from_args(recipient))
            .context("Failed to generate receipt")?;
        println!(
            "Receipt {} generated: {} ({}, paid {})",
            receipt.receipt_id,
            receipt.document_path.display(),
            receipt.status,
            receipt.paid_display
        );
        return Ok(ExitCode::SUCCESS);
    }

    let (source, records) = generator.load_recipients()?;
    if records.is_empty() {
        println!("No recipients found in {}", source.display());
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "Generating {} receipts from {}...",
        records.len(),
        source.display()
    );
    let report = generator.generate_batch(&records)?;
    println!("{}", report.summary());
    Ok(ExitCode::SUCCESS)
}

fn handle_sync(config: &AppConfig) -> Result<ExitCode> {
    let settings = &config.sync;
    let source = HttpSheetSource::new(
        settings.endpoint.clone(),
        Duration::from_secs(settings.timeout_secs),
    )?;
    let outcome = run_sync(&source, settings).context("Sync failed")?;
    println!("{}", outcome.summary());
    Ok(ExitCode::SUCCESS)
}

fn handle_verify(id: Option<String>, file: Option<PathBuf>, config: &AppConfig) -> Result<ExitCode> {
    let result = match (id, file) {
        (_, Some(file)) => verify_sidecar(&file)?,
        (Some(id), None) => verify_receipt_id(&config.receipts.output_dir, &id)?,
        (None, None) => anyhow::bail!("Either --id or --file is required"),
    };

    println!("{}", result.format_cli());
    Ok(if result.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn handle_init_config(config: &AppConfig, path: &Path, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists, use --force to overwrite",
            path.display()
        );
    }
    config.save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(ExitCode::SUCCESS)
}
