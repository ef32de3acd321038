use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::io::AsyncReadExt;

use anytype_extension::tools::TOOL_NAMES;
use anytype_extension::Extension;

#[derive(Parser, Debug)]
#[command(name = "anytype-tool")]
#[command(about = "Run Anytype extension tools against the local API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a tool; the JSON input is read from stdin
    Run { name: String },
    /// List available tools
    List,
    /// Check the stored key and API version
    Check,
    /// Pair with the app and store a new API key
    Pair {
        #[arg(long, default_value = "anytype-tool")]
        app_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Commands::List = cli.command {
        for name in TOOL_NAMES {
            println!("{name}");
        }
        return Ok(());
    }

    let extension = Extension::from_env()
        .await
        .context("failed to initialize extension")?;

    match cli.command {
        Commands::Run { name } => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            let input: Value = if raw.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&raw).context("tool input is not valid JSON")?
            };
            let output = extension.run_tool(&name, input).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Check => {
            if !extension.auth().check_token_validity().await {
                return Err(anyhow!("stored API key was rejected; run `pair` again"));
            }
            println!("ok");
        }
        Commands::Pair { app_name } => {
            let challenge = extension.auth().start_challenge(&app_name).await?;
            print!("Enter the 4-digit code shown in Anytype: ");
            io::stdout().flush()?;
            let mut code = String::new();
            io::stdin().lock().read_line(&mut code)?;
            extension.auth().solve_challenge(&challenge, &code).await?;
            println!("paired");
        }
        Commands::List => {}
    }
    Ok(())
}
