use std::time::{Duration, Instant};
use actix_web::{web, App, HttpResponse, HttpServer};
use server_timing::actix::{RequestTiming, ServerTimingMiddleware};
use server_timing::clock::AsServerTimingDuration;
use server_timing::ServerTimingOptions;

const DEFAULT_BIND: &str = "127.0.0.1:8080";

fn main() -> anyhow::Result<()>{
    match dotenvy::dotenv() {
        Ok(_) => {},
        Err(err) => {
            eprintln!("Could not read .env: {err}");
        }
    }
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        use tracing_subscriber::Layer;
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
            )
            .init();
        tracing::info!("Initialized logging");
    }

    actix_web::rt::System::new().block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let options = ServerTimingOptions::from_env()?;
    let bind = std::env::var("SERVER_TIMING_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_owned());
    tracing::info!("Listening on {bind} with {options:?}");

    HttpServer::new(move || {
        App::new()
            .wrap(ServerTimingMiddleware::new(options.clone()))
            .route("/", web::get().to(index))
            .route("/entries", web::get().to(entries))
    })
        .bind(bind.as_str())?
        .run()
        .await?;
    Ok(())
}

async fn index(timing: RequestTiming) -> HttpResponse {
    let checksum = timing.time("checksum", || {
        (0..100_000u64).fold(0u64, |acc, v| acc.wrapping_mul(31).wrapping_add(v))
    }, Some("Hash a synthetic payload"));

    let start = Instant::now();
    let greeting = format!("checksum {checksum:x}");
    timing.add("format", start.as_server_timing_duration(), Some("Format the response body"));

    timing.time_async("upstream", || tokio::time::sleep(Duration::from_millis(25)), Some("Simulated upstream call")).await;

    // left pending on purpose, only shows up with SERVER_TIMING_AUTO_END=true
    timing.start("respond", None);
    HttpResponse::Ok().body(greeting)
}

async fn entries(timing: RequestTiming) -> HttpResponse {
    timing.time_async("upstream", || tokio::time::sleep(Duration::from_millis(5)), Some("Simulated upstream call")).await;
    let body = serde_json::to_string(timing.borrow_mut().entries());
    match body {
        Ok(body) => HttpResponse::Ok().content_type("application/json").body(body),
        Err(err) => {
            tracing::error!("Failed serializing timing entries: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
