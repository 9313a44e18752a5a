use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qms_display_client::{
    ClientError, CloseReason, DisplaySession, PairedDisplay, PairingClient, SessionConfig,
};
use qms_shared_config::{get_env_or_default, DisplayTimingConfig};

/// Register and wait until staff confirm the code, retrying expired codes
async fn pair(client: &PairingClient, cancel: &CancellationToken) -> Result<PairedDisplay, ClientError> {
    loop {
        let ticket = client.register().await?;
        println!("Pairing code: {} (expires {})", ticket.code, ticket.expires_at);

        match client.wait_for_pairing(&ticket, cancel).await {
            Err(ClientError::PairingExpired(code)) => {
                tracing::info!(code = %code, "Requesting a new pairing code");
            }
            other => return other,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qms_display_client=info,qms_display=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let server_url = get_env_or_default("QMS_SERVER_URL", "http://localhost:8080");
    let timing = DisplayTimingConfig::from_env()?;
    let pairing_client = PairingClient::new(&server_url)?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        });
    }

    let mut binding = match (
        std::env::var("QMS_STATION_ID").ok(),
        std::env::var("QMS_CLIENT_TOKEN").ok(),
    ) {
        (Some(station_id), Some(client_token)) => Some(PairedDisplay {
            station_id,
            station_name: None,
            client_token,
        }),
        _ => None,
    };

    tracing::info!(server = %server_url, "Starting display client");

    loop {
        let paired = match binding.take() {
            Some(paired) => paired,
            None => match pair(&pairing_client, &shutdown).await {
                Ok(paired) => paired,
                Err(ClientError::Closed(CloseReason::Requested)) => break,
                Err(e) => return Err(e.into()),
            },
        };

        let config = SessionConfig::new(
            &server_url,
            paired.station_id.clone(),
            paired.client_token.clone(),
            timing,
        )?;
        let session = DisplaySession::spawn(config)?;
        let mut view = session.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    session.close();
                    break;
                }
                changed = view.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let lines = view.borrow_and_update().render_lines();
                    println!("----- {} -----", paired.station_name.as_deref().unwrap_or(&paired.station_id));
                    for line in lines {
                        println!("{}", line);
                    }
                    if session.is_finished() {
                        break;
                    }
                }
            }
        }

        match session.closed().await {
            reason if reason.requires_pairing() => {
                tracing::warn!(reason = %reason, "Display lost its pairing, pairing again");
            }
            _ => break,
        }
    }

    tracing::info!("Display client stopped");
    Ok(())
}
