use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kubeposture::config::{Config, CONFIG_FILE_NAME};
use kubeposture::controls::framework::framework_controls;
use kubeposture::controls::ControlRegistry;
use kubeposture::error::ScanError;
use kubeposture::pipeline::{LocalStages, PipelineOrchestrator};
use kubeposture::request::{RequestBuilder, DEFAULT_OUTPUT_FORMAT, SUPPORTED_FRAMEWORKS};

#[derive(Parser)]
#[command(
    name = "kubeposture",
    about = "Security posture scanner for Kubernetes manifests",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan resources against a rule framework
    Scan {
        #[command(subcommand)]
        target: ScanTarget,
    },

    /// List the built-in controls
    ListControls {
        /// Only controls of this framework (nsa, mitre)
        #[arg(long)]
        framework: Option<String>,

        /// Output format (table, json)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Generate a starter .kubeposture.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ScanTarget {
    /// The framework you wish to use. Supported frameworks: nsa, mitre
    Framework {
        /// Framework name followed by manifest files, directories or globs
        #[arg(value_name = "NAME [PATTERN]")]
        args: Vec<String>,

        /// Namespaces to exclude from check (comma-separated)
        #[arg(long, short = 'e', default_value = "")]
        exclude_namespaces: String,

        /// Output format. Supported formats: 'pretty-printer'/'json'/'junit'
        #[arg(long, short = 'o', default_value = DEFAULT_OUTPUT_FORMAT)]
        output: String,

        /// Silent progress output
        #[arg(long, short = 's')]
        silent: bool,

        /// Minimum severity to fail (info, low, medium, high, critical)
        #[arg(long)]
        fail_on: Option<String>,

        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            target:
                ScanTarget::Framework {
                    args,
                    exclude_namespaces,
                    output,
                    silent,
                    fail_on,
                    config,
                },
        } => cmd_scan(args, exclude_namespaces, output, silent, fail_on, config).await,
        Commands::ListControls { framework, format } => cmd_list_controls(framework, format),
        Commands::Init { force } => cmd_init(force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

async fn cmd_scan(
    args: Vec<String>,
    exclude_namespaces: String,
    output: String,
    silent: bool,
    fail_on: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<i32, ScanError> {
    let request = RequestBuilder::new()
        .exclude_namespaces(exclude_namespaces)
        .output_format(output)
        .silent(silent)
        .build_framework(&args)?;

    let config_path = config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let mut config = Config::load(&config_path)?;
    if let Some(fail_on) = fail_on {
        config.override_fail_on(&fail_on);
    }

    if !request.silent {
        eprintln!("Scanning {} ...", request.policy_identifier);
    }

    let orchestrator = PipelineOrchestrator::new(Arc::new(LocalStages::new(config)));
    let shutdown = orchestrator.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let summary = orchestrator.run(&request).await?;

    // Exit code: 0 = completed, 1 = failed control at or above fail_on
    Ok(if summary.verdict.pass { 0 } else { 1 })
}

fn cmd_list_controls(framework: Option<String>, format_str: String) -> Result<i32, ScanError> {
    let registry = ControlRegistry::new();
    let mut controls = registry.list_controls();

    if let Some(name) = framework {
        let ids = framework_controls(&name).ok_or_else(|| {
            ScanError::InvalidArgument(format!(
                "supported frameworks: {}",
                SUPPORTED_FRAMEWORKS.join(", ")
            ))
        })?;
        controls.retain(|c| ids.contains(&c.id.as_str()));
    }

    match format_str.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&controls)?;
            println!("{}", json);
        }
        _ => {
            println!("{:<8} {:<48} {:<10} FRAMEWORKS", "ID", "NAME", "SEVERITY");
            println!("{}", "-".repeat(80));
            for control in &controls {
                let frameworks: Vec<&str> = SUPPORTED_FRAMEWORKS
                    .iter()
                    .copied()
                    .filter(|f| {
                        framework_controls(f).is_some_and(|ids| ids.contains(&control.id.as_str()))
                    })
                    .collect();
                println!(
                    "{:<8} {:<48} {:<10} {}",
                    control.id,
                    control.name,
                    control.severity.to_string(),
                    frameworks.join(", "),
                );
            }
        }
    }

    Ok(0)
}

fn cmd_init(force: bool) -> Result<i32, ScanError> {
    let path = PathBuf::from(CONFIG_FILE_NAME);

    if path.exists() && !force {
        eprintln!("{} already exists. Use --force to overwrite.", CONFIG_FILE_NAME);
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created {}", CONFIG_FILE_NAME);

    Ok(0)
}
