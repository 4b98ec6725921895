use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;
use sitegen::client::ApiClient;
use sitegen::preview::compose_preview;
use sitegen::workspace::{LogKind, Workspace};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sitegen-client", about = "Drive a sitegen server from the terminal")]
struct Cli {
    /// Base URL of the sitegen server.
    #[arg(long, env = "SITEGEN_URL", default_value = "http://localhost:3001")]
    url: String,

    /// Storage root name used in listed paths.
    #[arg(long, default_value = "server")]
    root_name: String,

    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the generated file tree.
    Files,
    /// Ask the agent to build or change a site.
    Generate {
        prompt: String,
        /// Continue an existing session.
        #[arg(long)]
        session: Option<String>,
        /// Write the composed preview page here.
        #[arg(long)]
        preview: Option<PathBuf>,
    },
    /// Deploy a site folder. Defaults to the folder of the first page found.
    Publish { folder: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.url, Duration::from_secs(cli.timeout_secs))?;
    let mut workspace = Workspace::new(cli.root_name.as_str());

    match cli.command {
        Commands::Files => {
            let files = client.list_files().await?;
            workspace.apply_listing(&files);
            print!("{}", workspace.render_tree());
        }
        Commands::Generate { prompt, session, preview } => {
            workspace.apply_listing(&client.list_files().await?);
            let response = client.generate(&prompt, session.as_deref()).await?;
            info!("Session {}", response.session_id);
            workspace.apply_generation(&prompt, &response.data);

            for entry in workspace.log() {
                let label = match entry.kind {
                    LogKind::User => "you",
                    LogKind::Ai => "ai",
                    LogKind::Command => "$",
                    LogKind::Result => "=>",
                };
                println!("[{}] {} {}", entry.timestamp.format("%H:%M:%S"), label, entry.content);
            }
            println!();
            print!("{}", workspace.render_tree());
            println!("session: {}", response.session_id);

            if let Some(out) = preview {
                let document = compose_preview(workspace.tree(), workspace.selected())
                    .ok_or_else(|| anyhow!("no HTML page to preview"))?;
                tokio::fs::write(&out, document).await?;
                println!("preview written to {}", out.display());
            }
        }
        Commands::Publish { folder } => {
            let folder = match folder {
                Some(folder) => folder,
                None => {
                    workspace.apply_listing(&client.list_files().await?);
                    let page = workspace
                        .tree()
                        .files_with_extension(".html")
                        .first()
                        .map(|node| node.path().to_string())
                        .ok_or_else(|| anyhow!("no site to publish"))?;
                    workspace.select(&page);
                    workspace
                        .publish_folder()
                        .ok_or_else(|| anyhow!("could not determine the site folder"))?
                }
            };
            let response = client.publish(&folder).await?;
            match response.deployed_url {
                Some(url) if response.success => println!("deployed {} to {}", folder, url),
                _ => {
                    return Err(anyhow!(
                        "publishing {} failed: {}",
                        folder,
                        response.message.unwrap_or_default()
                    ))
                }
            }
        }
    }
    Ok(())
}
