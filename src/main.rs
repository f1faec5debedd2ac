use std::{fs, path::{Path, PathBuf}, sync::Arc};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use flow_resource::{
    apps::App,
    config::{AppConfig, ManagerSettings},
    decode::zip_and_encode,
    definition::{DefinitionRep, FlowDefinition},
    flow::{Materializer, Origin},
    logger::{init_tracing, log_file_prefix},
};
use serde_json::json;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "flowres",
    about = "Resolve, validate and pack flow definitions",
    version
)]
struct Cli {
    /// Log level override (e.g. error, warn, info, debug, trace); defaults to FLOW_LOG_LEVEL
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// `.env` file to load before reading FLOW_* settings
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a flow URI (res://, file:// or http(s)://) and print a summary
    Get {
        uri: String,
        /// App descriptor whose resources are preloaded first
        #[arg(long)]
        app: Option<PathBuf>,
    },
    /// Check that a local definition file parses and materializes
    Validate { file: PathBuf },
    /// Print base64(gzip(file)), the form used for compressed resources
    Pack { file: PathBuf },
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut settings, env_file) = ManagerSettings::load(Some(&cli.env_file));
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    init_tracing(&settings.log_level, settings.log_dir.as_deref())?;
    env_file.log();
    if let Some(dir) = &settings.log_dir {
        info!("Writing logs to {}.*", log_file_prefix(dir).display());
    }

    match cli.command {
        Commands::Get { uri, app } => get(&settings, &uri, app).await,
        Commands::Validate { file } => {
            let def = validate(&file)?;
            println!(
                "✅ Flow `{}` is valid ({} tasks, {} links).",
                def.name(),
                def.task_count(),
                def.links().len()
            );
            Ok(())
        }
        Commands::Pack { file } => {
            let bytes = fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("{}", zip_and_encode(&bytes)?);
            Ok(())
        }
    }
}

async fn get(settings: &ManagerSettings, uri: &str, app: Option<PathBuf>) -> anyhow::Result<()> {
    let app_config = app.as_deref().map(AppConfig::load).transpose()?;
    let app = App::bootstrap(settings, app_config.as_ref(), None)?;

    let Some(def) = app.flow_manager().get_flow(uri).await? else {
        error!("No preloaded resource for {}", uri);
        bail!("flow `{}` not found", uri);
    };

    let summary = json!({
        "uri": uri,
        "name": def.name(),
        "model": def.model_id(),
        "explicitReply": def.explicit_reply(),
        "rootTask": def.root_task().id(),
        "errorHandlerTask": def.error_handler_task().map(|t| t.id()),
        "tasks": def.task_count(),
        "links": def.links().len(),
        "attributes": def.attributes().len(),
        "materialized": def.is_materialized(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn validate(file: &Path) -> anyhow::Result<Arc<FlowDefinition>> {
    let contents = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let rep: DefinitionRep = serde_json::from_slice(&contents)
        .with_context(|| format!("Invalid flow JSON in {}", file.display()))?;
    let def = Materializer::new().materialize(rep, Origin::Uri(file.display().to_string()))?;
    Ok(def)
}
