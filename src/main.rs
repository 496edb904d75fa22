//! Server entrypoint.
//!
//! ## Environment Setup
//! Configuration comes from the environment, optionally via a `.env` file:
//! ```bash
//! JWT_ACCESS_SECRET=... JWT_REFRESH_SECRET=... DATABASE_URL=postgres://... cargo run
//! ```
//!
//! The server listens on `http://0.0.0.0:3000` by default:
//! ```bash
//! curl http://localhost:3000/ping
//! ```

use rentacar_server::{config::CONFIG, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rentacar_server=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false) // Don't show module targets for cleaner output
                .compact(),
        )
        .init();

    tracing::info!("🏁 Starting Rentacar Server...");
    tracing::info!("📦 Package: {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    tracing::info!("🏗️  Build profile: {}", if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    });

    server::start(&CONFIG).await
}
