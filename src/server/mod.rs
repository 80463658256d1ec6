pub mod api;

use crate::agent::CalendarAgent;
use crate::cli::Args;
use self::api::{ router, AppState };
use axum_server::tls_rustls::RustlsConfig;
use log::info;
use std::error::Error;
use std::net::SocketAddr;

pub struct Server {
    addr: String,
    agent: CalendarAgent,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: CalendarAgent, args: Args) -> Self {
        Self { addr, agent, args }
    }

    /// Serves until the listener fails.
    pub async fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid server address '{}': {}", self.addr, e))?;
        let state = AppState::new(
            self.agent,
            self.args.server_api_key.clone(),
            self.args.rate_limit_per_second
        );
        let app = router(state);

        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert), Some(key)) => (cert, key),
                _ => {
                    return Err("ENABLE_TLS requires both TLS_CERT_PATH and TLS_KEY_PATH".into());
                }
            };
            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path).await.map_err(|e|
                format!("Failed to load TLS certificate/key: {}", e)
            )?;

            info!("Starting HTTPS API server on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
        } else {
            let listener = tokio::net::TcpListener
                ::bind(addr).await
                .map_err(|e| format!("Failed to bind HTTP server to {}: {}", addr, e))?;
            info!("Starting HTTP API server on: http://{}", addr);
            axum::serve(listener, app.into_make_service()).await?;
        }

        Ok(())
    }
}
