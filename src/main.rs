use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use local_llm_chat::api;
use local_llm_chat::config::Args;
use local_llm_chat::device::{device_label, get_device};
use local_llm_chat::loader::{self, LoadOptions};
use local_llm_chat::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "local_llm_chat=info,tower_http=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let device = get_device(args.cpu)?;
    let device_name = device_label(&device);
    info!("using device: {device_name}");

    let state = Arc::new(AppState::new(args.model.clone(), device));

    // The model load can take minutes on a cold cache; serve immediately
    // and let /chat answer 503 until the loader publishes the engine.
    tokio::spawn(loader::run(state.clone(), LoadOptions::from_args(&args)));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::new(args.host.parse()?, args.port);

    println!(
        r#"
🤖 Local chat server
   ├─ Address: http://{}
   ├─ Model:   {} (loading in background)
   ├─ Device:  {}
   └─ Endpoints:
      ├─ GET  /            - Chat page
      ├─ POST /chat        - Chat with the model
      ├─ GET  /status      - Load status
      └─ GET  /debug       - Process diagnostics
"#,
        addr, args.model, device_name,
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
