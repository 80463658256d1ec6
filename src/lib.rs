pub mod agent;
pub mod calendar;
pub mod cli;
pub mod error;
pub mod functions;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;

#[cfg(test)]
mod mocks;
#[cfg(test)]
mod tests;

use agent::CalendarAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("API Key Required: {}", args.server_api_key.as_deref().is_some_and(|k| !k.is_empty()));
    info!("Rate Limit (req/s): {}", args.rate_limit_per_second);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Function Call Rounds: {}", args.function_call_rounds);
    info!("Cal.com API URL: {}", args.calcom_api_url);
    info!("Cal.com Username: {}", args.calcom_username);
    info!("History Store Type: {}", args.history_type);
    match args.history_type.to_lowercase().as_str() {
        "file" => info!("History Directory: {}", args.history_dir),
        "redis" => info!("History Store Host: {}", args.history_host),
        _ => {}
    }
    info!("-------------------------");

    let agent = CalendarAgent::new(args.clone()).await?;
    let addr = args.server_addr.clone();
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
