//! MCP Desk CLI - drive the admin console core from a terminal
//!
//! Logs in against the marketplace backend, inspects the MCP service and tests
//! event-stream endpoints using the same session file as every other command.

use anyhow::Context;
use clap::{Parser, Subcommand};
use mcpdesk_client::api::ToolLoadRequest;
use mcpdesk_client::navigation::Navigator;
use mcpdesk_client::{DeskClient, Notice, NoticeLevel, Notifier};
use mcpdesk_core::{init_logging, DeskConfig, DeskError, LoggingConfig, SessionCredential};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "mcpdesk")]
#[command(about = "Admin client for the MCP marketplace")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        username: String,

        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// End the session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Change the password of the logged-in user
    Passwd {
        #[arg(long)]
        old: String,

        #[arg(long)]
        new: String,
    },

    /// Show the MCP service status
    Status,

    /// List enabled tools
    Tools,

    /// Load a tool into the MCP service
    LoadTool {
        module_path: String,
        function_name: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Remove a tool from the MCP service
    UnloadTool { name: String },

    /// List hosted services
    Services {
        #[arg(long)]
        module_id: Option<i64>,
    },

    /// Restart the MCP service
    Restart,

    /// Test that an event-stream URL accepts a connection
    Probe {
        url: String,

        /// Bearer to use instead of the stored session
        #[arg(long)]
        token: Option<String>,
    },

    /// Show where the navigation guard sends a path for the stored session
    CheckRoute { path: String },

    /// List views and their access requirements
    Routes,

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

/// Prints notices for the operator on stderr
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        let marker = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{}] {}: {}", marker, notice.title, notice.message);
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        if let Some(desk_error) = e.downcast_ref::<DeskError>() {
            for suggestion in desk_error.suggestions() {
                eprintln!("  hint: {}", suggestion);
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_ref())?;

    let logging = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        config.logging.clone()
    };
    init_logging(&logging)?;
    debug!(version = env!("CARGO_PKG_VERSION"), "Starting mcpdesk");

    if let Commands::Config {
        show,
        init,
        validate,
    } = cli.command
    {
        return handle_config(&config, cli.config, show, init, validate);
    }

    let desk = DeskClient::builder(config)
        .notifier(Arc::new(ConsoleNotifier))
        .build()?;

    match cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };
            let login = desk.auth().login(&username, &password).await?;
            println!(
                "Logged in as {} ({})",
                login.username,
                if login.is_admin { "admin" } else { "user" }
            );
        }
        Commands::Logout => {
            desk.auth().logout().await?;
            println!("Logged out");
        }
        Commands::Whoami => {
            let user = desk.auth().current_user().await?;
            print_json(&user)?;
        }
        Commands::Passwd { old, new } => {
            desk.auth().change_password(&old, &new).await?;
            println!("Password changed");
        }
        Commands::Status => {
            let status = desk.services().status().await?;
            print_json(&status)?;
        }
        Commands::Tools => {
            for tool in desk.services().enabled_tools().await? {
                println!("{}", tool);
            }
        }
        Commands::LoadTool {
            module_path,
            function_name,
            name,
            description,
        } => {
            let request = ToolLoadRequest {
                module_path,
                function_name,
                tool_name: name,
                description,
            };
            desk.services().load_tool(&request).await?;
            println!("Tool loaded");
        }
        Commands::UnloadTool { name } => {
            desk.services().unload_tool(&name).await?;
            println!("Tool {} unloaded", name);
        }
        Commands::Services { module_id } => {
            let services = desk.services().list_services(module_id).await?;
            print_json(&services)?;
        }
        Commands::Restart => {
            desk.services().restart().await?;
            println!("Restart requested");
        }
        Commands::Probe { url, token } => {
            let result = match token {
                Some(token) => {
                    let credential = SessionCredential::new("cli", token, false);
                    desk.transport_probe().test(&url, Some(&credential)).await
                }
                None => desk.probe(&url).await,
            };
            println!("{}", result.message);
            if !result.success {
                anyhow::bail!("Connection test failed for {}", url);
            }
        }
        Commands::CheckRoute { path } => {
            let decision = desk.router().check(&path)?;
            let outcome = desk.router().push(&path)?;
            println!(
                "{} -> {} ({})",
                path,
                outcome.landed,
                serde_json::to_string(&decision)?.trim_matches('"')
            );
        }
        Commands::Routes => {
            for route in desk.router().table().routes() {
                let access = if route.meta.public {
                    "public"
                } else if route.meta.admin_only {
                    "admin"
                } else {
                    "session"
                };
                println!(
                    "{:<28} {:<8} {}",
                    route.path,
                    access,
                    route.title.as_deref().unwrap_or("-")
                );
            }
        }
        // answered before the client is built
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn load_config(config_path: Option<&PathBuf>) -> anyhow::Result<DeskConfig> {
    let path = config_path.cloned().unwrap_or_else(DeskConfig::default_path);
    let mut config = if path.exists() {
        DeskConfig::from_file(&path)?
    } else if config_path.is_some() {
        anyhow::bail!("Configuration file {:?} does not exist", path);
    } else {
        DeskConfig::default()
    };
    config.apply_env()?;
    Ok(config)
}

fn handle_config(
    config: &DeskConfig,
    config_path: Option<PathBuf>,
    show: bool,
    init: bool,
    validate: bool,
) -> anyhow::Result<()> {
    if init {
        let path = config_path.unwrap_or_else(DeskConfig::default_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        DeskConfig::default().save_to_file(&path)?;
        info!(path = ?path, "Configuration initialized");
        println!("Configuration initialized at {:?}", path);
    }

    if show {
        print_json(config)?;
    }

    if validate {
        config.validate()?;
        println!("Configuration is valid");
    }

    Ok(())
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush().ok();

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
