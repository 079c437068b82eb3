use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use intune_infra::{declare, render, InvokerAccess, StackConfig, StackOverrides, Variant};

#[derive(Debug, Parser)]
#[command(
    name = "intune-infra",
    about = "InTuneAI deployment renderer",
    long_about = "Render the Cloud Run deployment of the agent service as a Pulumi YAML program.",
    after_help = "Examples:\n  intune-infra render --variant basic --public\n  \
                  intune-infra render --variant storage --project p1 --invoker user:ops@example.com"
)]
struct Cli {
    #[arg(long, global = true, default_value = "warn", help = "Log level for stderr diagnostics")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Print the rendered program for a deployment variant")]
    Render(RenderArgs),
}

#[derive(Debug, Args)]
struct RenderArgs {
    #[arg(long, value_enum, default_value_t = Variant::Basic)]
    variant: Variant,
    #[arg(long, help = "Project id (falls back to GOOGLE_CLOUD_PROJECT)")]
    project: Option<String>,
    #[arg(long, help = "Region (falls back to GOOGLE_CLOUD_LOCATION, then us-central1)")]
    region: Option<String>,
    #[arg(long, help = "Container image (falls back to INTUNE_IMAGE)")]
    image: Option<String>,
    #[arg(long, help = "Runtime GOOGLE_GENAI_USE_VERTEXAI value for scaled variants")]
    use_vertexai: Option<bool>,
    #[arg(long, conflicts_with = "invoker", help = "Allow unauthenticated invocation")]
    public: bool,
    #[arg(long, help = "IAM member allowed to invoke the service (repeatable)")]
    invoker: Vec<String>,
    #[arg(long, short, help = "Write the program to a file instead of stdout")]
    output: Option<PathBuf>,
}

impl RenderArgs {
    fn overrides(&self) -> StackOverrides {
        let invokers = if self.public {
            Some(InvokerAccess::Public)
        } else if self.invoker.is_empty() {
            None
        } else {
            Some(InvokerAccess::Members(self.invoker.clone()))
        };
        StackOverrides {
            project: self.project.clone(),
            region: self.region.clone(),
            image: self.image.clone(),
            use_vertexai: self.use_vertexai,
            invokers,
        }
    }
}

fn init_logging(level: &str) {
    use tracing::Level;

    let level = level.parse::<Level>().unwrap_or(Level::WARN);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level)
        .compact()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(event_name = "infra.render.failed", error = %error, "render failed");
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Render(args) => {
            let config = StackConfig::resolve(args.overrides())?;
            let stack = declare(args.variant, &config)?;
            let program = render(&stack)?;

            match &args.output {
                Some(path) => {
                    std::fs::write(path, &program)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!(
                        event_name = "infra.render.written",
                        variant = args.variant.as_str(),
                        path = %path.display(),
                        "program written"
                    );
                }
                None => print!("{program}"),
            }
            Ok(())
        }
    }
}
