use clap::{Parser, Subcommand};
use picname::batch::{self, BatchHandles};
use picname::config::{self, CONFIG_FILE_NAME, RenameConfig};
use picname::counter::SafeCounter;
use picname::output::{self, ProgressSink, RenameEvent};
use picname::report::{self, CsvReport};
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

/// Flags that override `picname.toml` for a single invocation.
#[derive(clap::Args, Clone, Default)]
struct OverrideArgs {
    /// Folder whose images get renamed
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// API key for the completion endpoint
    #[arg(long, env = "PICNAME_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API root; /v1/chat/completions is appended
    #[arg(long)]
    base_url: Option<String>,

    /// Vision-capable chat model
    #[arg(short, long)]
    model: Option<String>,

    /// Naming instruction sent with every image
    #[arg(long)]
    prompt: Option<String>,

    /// JPEG quality of the uploaded preview (1-95)
    #[arg(short, long)]
    quality: Option<u32>,

    /// Images processed at the same time (1-100)
    #[arg(short, long)]
    workers: Option<u32>,

    /// Where renamed files go
    #[arg(long, value_parser = ["finish_subfolder", "in_place", "custom"])]
    output_mode: Option<String>,

    /// Target folder for --output-mode custom
    #[arg(long)]
    custom_folder: Option<PathBuf>,

    /// Do not write the CSV report
    #[arg(long)]
    no_report: bool,
}

impl OverrideArgs {
    /// The flags that were given, as a TOML overlay in config-file shape.
    fn to_overlay(&self) -> toml::Table {
        let mut table = toml::Table::new();
        let mut set = |key: &str, value: toml::Value| {
            table.insert(key.to_string(), value);
        };

        if let Some(source) = &self.source {
            set("source_folder", path_value(source));
        }
        if let Some(key) = &self.api_key {
            set("api_key", toml::Value::String(key.clone()));
        }
        if let Some(url) = &self.base_url {
            set("base_url", toml::Value::String(url.clone()));
        }
        if let Some(model) = &self.model {
            set("model", toml::Value::String(model.clone()));
        }
        if let Some(prompt) = &self.prompt {
            set("prompt", toml::Value::String(prompt.clone()));
        }
        if let Some(quality) = self.quality {
            set("image_quality_percent", toml::Value::Integer(quality.into()));
        }
        if let Some(workers) = self.workers {
            set("max_workers", toml::Value::Integer(workers.into()));
        }
        if let Some(mode) = &self.output_mode {
            set("output_mode", toml::Value::String(mode.clone()));
        }
        if let Some(folder) = &self.custom_folder {
            set("custom_output_folder", path_value(folder));
        }
        if self.no_report {
            let mut report = toml::Table::new();
            report.insert("enabled".into(), toml::Value::Boolean(false));
            set("report", toml::Value::Table(report));
        }
        table
    }
}

fn path_value(path: &Path) -> toml::Value {
    toml::Value::String(path.to_string_lossy().into_owned())
}

#[derive(Parser)]
#[command(name = "picname")]
#[command(version, about = "Rename photos with names suggested by a vision model")]
#[command(long_about = "\
Rename photos with names suggested by a vision model

Every supported image in the source folder is downscaled, sent to an
OpenAI-compatible chat-completions endpoint together with a naming prompt,
and renamed after the answer. Sub-folders are not scanned.

Output modes:
  finish_subfolder   copy renamed files into <source>/Finish/ (default)
  in_place           rename the originals
  custom             copy renamed files into --custom-folder

Settings are read from picname.toml (see 'picname gen-config'); flags
override the file. Press Ctrl-C to stop: images already being processed
finish, the rest are skipped.")]
struct Cli {
    /// Config file
    #[arg(long, default_value = CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rename every image in the source folder
    Run(OverrideArgs),
    /// Validate the configuration and list the images a run would touch
    Check(OverrideArgs),
    /// Print a stock picname.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => {
            let config = config::load_config(&cli.config, args.to_overlay())?;
            run(config)?;
        }
        Command::Check(args) => {
            let config = config::load_config(&cli.config, args.to_overlay())?;
            check(&config)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `RUST_LOG` wins when set; otherwise `-v` picks the level.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(config: RenameConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.api_key.trim().is_empty() {
        return Err(format!(
            "no API key: set api_key in {CONFIG_FILE_NAME} or export PICNAME_API_KEY"
        )
        .into());
    }

    let handles = BatchHandles::new();
    let cancel = handles.cancel.clone();
    ctrlc::set_handler(move || cancel.cancel())?;

    let (tx, rx) = mpsc::channel::<RenameEvent>();
    let printer = thread::spawn(move || {
        for event in rx {
            output::print_event(&event);
        }
    });
    let sink: Arc<dyn ProgressSink> = Arc::new(tx);

    let summary = batch::run_with_defaults(config.clone(), Arc::clone(&sink), &handles)?;
    wait_until_idle(&handles.active);
    let report_result = report::write_report(&config, &summary, &CsvReport, sink.as_ref());

    drop(sink);
    printer.join().map_err(|_| "progress printer panicked")?;
    report_result?;

    for line in output::format_summary(&summary) {
        println!("{}", line);
    }
    if handles.cancel.is_cancelled() {
        println!("Stopped by user.");
    }
    Ok(())
}

/// Block until no job is executing.
fn wait_until_idle(active: &SafeCounter) {
    while active.get() > 0 {
        thread::sleep(Duration::from_millis(50));
    }
}

fn check(config: &RenameConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Endpoint: {}", config.endpoint());
    println!("Model: {}", config.model);
    println!(
        "API key: {}",
        if config.api_key.trim().is_empty() {
            "not set"
        } else {
            "set"
        }
    );
    println!("Output mode: {}", config.output_mode.describe());

    let folder = &config.source_folder;
    if !folder.is_dir() {
        return Err(format!("source folder '{}' is missing or not a folder", folder.display()).into());
    }
    let images = batch::discover_images(folder)?;
    println!("{} images in {}", images.len(), folder.display());
    for image in &images {
        if let Some(name) = image.file_name() {
            println!("  {}", name.to_string_lossy());
        }
    }
    println!("==> Config is valid");
    Ok(())
}
