use clap::Parser;
use nexusrag::cli::handle_ask;
use nexusrag::cli::handle_chat;
use nexusrag::cli::handle_config_command;
use nexusrag::cli::handle_docs_command;
use nexusrag::cli::handle_index_command;
use nexusrag::cli::print_error;
use nexusrag::cli::Cli;
use nexusrag::cli::Commands;
use nexusrag::config::AppConfig;
use nexusrag::NexusError;
use nexusrag::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    nexusrag::logging::init_logging_with_config(&config, cli.verbose)?;
    info!("Configuration loaded successfully");

    // Execute the requested command
    let outcome = match cli.command {
        Commands::Ask {
            question,
            department,
            method,
            details,
        } => handle_ask(&config, question, department, method.map(Into::into), details).await,
        Commands::Chat { department, method } => {
            handle_chat(&config, department, method.map(Into::into)).await
        }
        Commands::Index { force } => handle_index_command(&config, force).await,
        Commands::Docs { department } => handle_docs_command(&config, department),
        Commands::Config => handle_config_command(&config),
    };

    if let Err(NexusError::MissingCredential) = &outcome {
        print_error("No API key configured. Set llm.api_key in config.toml or NEXUS_API_KEY / GEMINI_API_KEY.");
    }

    outcome
}
