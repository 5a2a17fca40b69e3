//! Adsmith CLI - ad creative campaigns from a product shot and a logo

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use adsmith_core::archive::{
    CAPTIONS_FILE, build_archive, captions_text, variation_file_name, write_archive,
};
use adsmith_core::background::ImageClient;
use adsmith_core::campaign::{Campaign, CampaignOutput, CampaignRequest};
use adsmith_core::composite::{create_composite, decode_image, encode_png};
use adsmith_core::config::{Config, IMAGE_API_KEY_ENV, TEXT_API_KEY_ENV};
use adsmith_core::ideation::SceneWriter;
use adsmith_core::llm::LlmClient;
use adsmith_core::Error;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "adsmith")]
#[command(
    author,
    version,
    about = "Generate ad creative campaigns from a product shot and a logo",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a campaign of ad variations
    Generate {
        /// Product image (PNG with transparency works best)
        #[arg(short, long)]
        product: PathBuf,
        /// Brand logo image
        #[arg(short, long)]
        logo: PathBuf,
        /// Short product description (at least 10 characters)
        #[arg(short, long)]
        description: String,
        /// Number of variations (5-10, defaults to campaign.default_variations)
        #[arg(short = 'n', long)]
        variations: Option<usize>,
        /// Archive path (defaults to campaign.archive_name)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the individual images and captions to a directory
        #[arg(long, num_args = 0..=1, value_name = "DIR")]
        save_dir: Option<Option<PathBuf>>,
        /// Only write scene ideas and captions, no image generation
        #[arg(long)]
        dry_run: bool,
        /// Base seed for reproducible backgrounds
        #[arg(long)]
        seed: Option<u32>,
    },

    /// Composite a product and logo onto an existing background
    Composite {
        #[arg(short, long)]
        background: PathBuf,
        #[arg(short, long)]
        product: PathBuf,
        #[arg(short, long)]
        logo: PathBuf,
        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor {
        /// Also list the language models available to the API key
        #[arg(long)]
        models: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
    /// Reset to defaults
    Reset,
    /// Show config file path
    Path,
}

struct GenerateArgs {
    product: PathBuf,
    logo: PathBuf,
    description: String,
    variations: Option<usize>,
    output: Option<PathBuf>,
    save_dir: Option<Option<PathBuf>>,
    dry_run: bool,
    seed: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let directive = if cli.quiet { "adsmith=warn" } else { "adsmith=info" };
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match directive.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Generate {
            product,
            logo,
            description,
            variations,
            output,
            save_dir,
            dry_run,
            seed,
        } => {
            let args = GenerateArgs {
                product,
                logo,
                description,
                variations,
                output,
                save_dir,
                dry_run,
                seed,
            };
            cmd_generate(args, cli.format, cli.quiet).await
        }

        Commands::Composite {
            background,
            product,
            logo,
            output,
        } => cmd_composite(&background, &product, &logo, &output, cli.format, cli.quiet),

        Commands::Config { action } => cmd_config(action, cli.quiet),

        Commands::Doctor { models } => cmd_doctor(models, cli.format, cli.quiet).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_error(error: &anyhow::Error) {
    match error.downcast_ref::<Error>() {
        Some(core) => {
            eprintln!("Error [{}]: {}", core.code(), core);
            if let Some(hint) = core.suggestion() {
                eprintln!("  Try: {}", hint);
            }
        }
        None => eprintln!("Error: {:#}", error),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn read_image_file(path: &Path, what: &str) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}: {}", what, path.display()))
}

async fn cmd_generate(
    args: GenerateArgs,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let variations = args
        .variations
        .unwrap_or(config.campaign.default_variations);

    let product = read_image_file(&args.product, "product image")?;
    let logo = read_image_file(&args.logo, "logo")?;
    let request = CampaignRequest::from_bytes(&product, &logo, &args.description, variations)?;
    request.validate()?;

    let text_key = config
        .llm
        .resolved_api_key()?
        .ok_or(Error::TextApiKeyMissing)?;
    let llm = LlmClient::new(config.llm.clone(), text_key)?;

    if args.dry_run {
        return dry_run(llm, &request, format, quiet).await;
    }

    let image_key = config
        .image
        .resolved_api_key()?
        .ok_or(Error::ImageApiKeyMissing)?;
    let images = ImageClient::new(config.image.clone(), image_key)?;

    info!(
        model = %llm.model(),
        engine = %images.engine(),
        variations,
        "Starting campaign"
    );

    let show_progress = format == OutputFormat::Text && !quiet;
    let campaign = Campaign::new(llm, images, &config).with_seed(args.seed);
    let output = campaign
        .run(&request, |progress| {
            if show_progress {
                println!("[{:>3}%] {}", progress.percent(), progress);
            }
        })
        .await?;

    let archive_path = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.campaign.archive_name));
    let bytes = build_archive(&output)?;
    write_archive(&archive_path, &bytes)?;

    let save_dir = args.save_dir.map(|dir| dir.unwrap_or_else(default_save_dir));
    if let Some(dir) = &save_dir {
        save_assets(dir, &output)?;
    }

    match format {
        OutputFormat::Json => {
            let summary = campaign_summary(&output, &archive_path, save_dir.as_deref());
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text if !quiet => {
            println!();
            println!(
                "Saved {} of {} ad variations to {}",
                output.assets.len(),
                output.variations(),
                archive_path.display()
            );
            if let Some(dir) = &save_dir {
                println!("Images and captions written to {}", dir.display());
            }
            for failure in &output.failed {
                println!(
                    "  [!!] Variation {} failed ({}): {}",
                    failure.variation, failure.code, failure.error
                );
            }
            println!();
            println!("{}", captions_text(&output));
        }
        OutputFormat::Text => println!("{}", archive_path.display()),
    }

    Ok(())
}

async fn dry_run(
    llm: LlmClient,
    request: &CampaignRequest,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let writer = SceneWriter::new(llm);
    let scenes = writer
        .scene_ideas(&request.description, request.variations)
        .await;
    let captions = writer
        .captions(&request.description, request.variations)
        .await;

    match format {
        OutputFormat::Json => {
            let variations: Vec<_> = scenes
                .iter()
                .zip(&captions)
                .enumerate()
                .map(|(i, (scene, caption))| {
                    json!({ "variation": i + 1, "scene": scene.as_str(), "caption": caption })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "dry_run": true, "variations": variations }))?
            );
        }
        OutputFormat::Text => {
            if !quiet {
                println!("Dry run: no images generated");
                println!();
            }
            for (i, (scene, caption)) in scenes.iter().zip(&captions).enumerate() {
                println!("Variation {}:", i + 1);
                println!("  Scene:   {}", scene);
                println!("  Caption: {}", caption);
            }
        }
    }
    Ok(())
}

fn default_save_dir() -> PathBuf {
    PathBuf::from(format!(
        "campaign_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

fn save_assets(dir: &Path, output: &CampaignOutput) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    for asset in &output.assets {
        let path = dir.join(variation_file_name(asset.variation));
        fs::write(&path, encode_png(&asset.image)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let captions = dir.join(CAPTIONS_FILE);
    fs::write(&captions, captions_text(output))
        .with_context(|| format!("Failed to write {}", captions.display()))?;
    Ok(())
}

fn campaign_summary(
    output: &CampaignOutput,
    archive: &Path,
    save_dir: Option<&Path>,
) -> serde_json::Value {
    let variations: Vec<_> = output
        .assets
        .iter()
        .map(|asset| {
            json!({
                "variation": asset.variation,
                "file": variation_file_name(asset.variation),
                "scene": asset.scene.as_str(),
                "caption": asset.caption,
            })
        })
        .collect();
    let failed: Vec<_> = output
        .failed
        .iter()
        .map(|f| {
            json!({
                "variation": f.variation,
                "scene": f.scene.as_str(),
                "code": f.code,
                "error": f.error,
            })
        })
        .collect();

    json!({
        "archive": archive.display().to_string(),
        "save_dir": save_dir.map(|d| d.display().to_string()),
        "requested": output.variations(),
        "generated": output.assets.len(),
        "variations": variations,
        "failed": failed,
    })
}

fn cmd_composite(
    background: &Path,
    product: &Path,
    logo: &Path,
    output: &Path,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;

    let background = decode_image(&read_image_file(background, "background")?)?;
    let product = decode_image(&read_image_file(product, "product image")?)?;
    let logo = decode_image(&read_image_file(logo, "logo")?)?;

    let composite = create_composite(&background, &product, &logo, &config.composite);
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output, encode_png(&composite)?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "output": output.display().to_string(),
                "width": composite.width(),
                "height": composite.height(),
            })
        ),
        OutputFormat::Text if !quiet => println!(
            "Wrote {}x{} composite to {}",
            composite.width(),
            composite.height(),
            output.display()
        ),
        OutputFormat::Text => {}
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_file()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CheckStatus {
    Ok,
    Info,
    Attention,
}

impl CheckStatus {
    fn marker(self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Info => "[--]",
            Self::Attention => "[!!]",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Info => "info",
            Self::Attention => "attention",
        }
    }
}

/// One line of the health check
struct Check {
    status: CheckStatus,
    name: &'static str,
    detail: String,
    hint: Option<String>,
}

impl Check {
    fn new(status: CheckStatus, name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            name,
            detail: detail.into(),
            hint: None,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn key_check(name: &'static str, env_name: &str, key: anyhow::Result<Option<String>>) -> Check {
    match key {
        Ok(Some(redacted)) => Check::new(
            CheckStatus::Ok,
            name,
            format!("Configured ({})", redacted),
        ),
        Ok(None) => {
            warn!(env = env_name, "API key not configured");
            Check::new(CheckStatus::Attention, name, "Not configured")
                .with_hint(format!("Set the {} environment variable", env_name))
        }
        Err(e) => Check::new(CheckStatus::Attention, name, format!("Error - {}", e)),
    }
}

async fn cmd_doctor(list_models: bool, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let mut checks = Vec::new();
    let mut llm_client = None;

    match Config::load() {
        Ok(config) => {
            checks.push(Check::new(CheckStatus::Ok, "Configuration", "Valid"));
            checks.push(Check::new(
                CheckStatus::Info,
                "Language model",
                config.llm.model.clone(),
            ));
            checks.push(Check::new(
                CheckStatus::Info,
                "Image engine",
                config.image.engine.clone(),
            ));
            checks.push(key_check(
                "Gemini key",
                TEXT_API_KEY_ENV,
                config.llm.redacted_api_key(),
            ));
            checks.push(key_check(
                "Stability AI key",
                IMAGE_API_KEY_ENV,
                config.image.redacted_api_key(),
            ));

            if let Ok(Some(key)) = config.llm.resolved_api_key() {
                llm_client = LlmClient::new(config.llm.clone(), key).ok();
            }
        }
        Err(e) => checks.push(Check::new(
            CheckStatus::Attention,
            "Configuration",
            format!("Error - {:#}", e),
        )),
    }

    checks.push(match Config::config_path() {
        Ok(path) if path.exists() => {
            Check::new(CheckStatus::Ok, "Config file", path.display().to_string())
        }
        Ok(path) => Check::new(
            CheckStatus::Info,
            "Config file",
            format!("{} (using defaults)", path.display()),
        ),
        Err(e) => Check::new(CheckStatus::Attention, "Config file", e.to_string()),
    });

    let mut models = Vec::new();
    if list_models {
        match &llm_client {
            Some(client) => match client.list_models().await {
                Ok(listed) => {
                    models = listed
                        .iter()
                        .filter(|m| m.supports_generate_content())
                        .map(|m| m.id().to_string())
                        .collect();
                }
                Err(e) => checks.push(Check::new(
                    CheckStatus::Attention,
                    "Model listing",
                    format!("failed: {}", e),
                )),
            },
            None => checks.push(Check::new(
                CheckStatus::Attention,
                "Model listing",
                "skipped: no usable Gemini key",
            )),
        }
    }

    let all_ok = checks.iter().all(|c| c.status != CheckStatus::Attention);

    match format {
        OutputFormat::Json => {
            let checks: Vec<_> = checks
                .iter()
                .map(|c| {
                    json!({
                        "name": c.name,
                        "status": c.status.as_str(),
                        "detail": c.detail,
                        "hint": c.hint,
                    })
                })
                .collect();
            let mut report = json!({ "ok": all_ok, "checks": checks });
            if list_models {
                report["models"] = json!(models);
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if !quiet {
                println!("Adsmith Health Check");
                println!("====================");
                println!();
                for check in &checks {
                    println!("{} {}: {}", check.status.marker(), check.name, check.detail);
                    if let Some(hint) = &check.hint {
                        println!("     {}", hint);
                    }
                }
                if !models.is_empty() {
                    println!();
                    println!("Available models:");
                }
            }
            for model in &models {
                println!("  {}", model);
            }
            if !quiet {
                println!();
                if all_ok {
                    println!("All checks passed.");
                } else {
                    println!("Some checks need attention.");
                }
            }
        }
    }

    Ok(())
}
