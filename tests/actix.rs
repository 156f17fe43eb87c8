#![cfg(feature = "actix")]

use std::time::Duration;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{test, web, App, HttpResponse};
use server_timing::actix::{RequestTiming, ServerTimingMiddleware};
use server_timing::ServerTimingOptions;

async fn handler(timing: RequestTiming) -> HttpResponse {
    timing.add("db", 12.5, Some("query"));
    let size = timing.time("render", || {
        timing.add("layout", 0.5, None);
        "rendered".len()
    }, None);
    timing.time_async("upstream", || tokio::time::sleep(Duration::from_millis(1)), None).await;
    HttpResponse::Ok().body(size.to_string())
}

async fn unfinished(timing: RequestTiming) -> HttpResponse {
    timing.start("respond", None);
    HttpResponse::Ok().finish()
}

fn header<B>(res: &ServiceResponse<B>, name: &str) -> Option<String> {
    res.headers().get(name).map(|v| v.to_str().unwrap().to_owned())
}

#[actix_web::test]
async fn middleware_attaches_server_timing() {
    let app = test::init_service(
        App::new()
            .wrap(ServerTimingMiddleware::new(ServerTimingOptions::default().with_precision(1)))
            .route("/", web::get().to(handler))
    ).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let value = header(&res, "server-timing").unwrap();
    assert!(value.starts_with(r#"db;dur=12.5;desc="query", layout;dur=0.5, render;dur="#), "{value}");
    assert!(value.contains(", upstream;dur="), "{value}");
    assert_eq!(header(&res, "timing-allow-origin"), None);
    assert_eq!(test::read_body(res).await, "8");
}

#[actix_web::test]
async fn every_request_gets_a_fresh_recorder() {
    let app = test::init_service(
        App::new()
            .wrap(ServerTimingMiddleware::default())
            .route("/", web::get().to(handler))
    ).await;

    for _ in 0..2 {
        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let value = header(&res, "server-timing").unwrap();
        assert_eq!(value.matches("db;dur=").count(), 1, "{value}");
    }
}

#[actix_web::test]
async fn middleware_honors_options() {
    let options = ServerTimingOptions::default()
        .with_auto_end(true)
        .with_allow_origin("https://example.com");
    let app = test::init_service(
        App::new()
            .wrap(ServerTimingMiddleware::new(options))
            .route("/", web::get().to(unfinished))
    ).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert!(header(&res, "server-timing").unwrap().starts_with("respond;dur="));
    assert_eq!(header(&res, "timing-allow-origin").as_deref(), Some("https://example.com"));
}

#[actix_web::test]
async fn pending_intervals_are_not_reported_without_auto_end() {
    let app = test::init_service(
        App::new()
            .wrap(ServerTimingMiddleware::default())
            .route("/", web::get().to(unfinished))
    ).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(header(&res, "server-timing").as_deref(), Some(""));
}

#[actix_web::test]
async fn extractor_requires_the_middleware() {
    let app = test::init_service(App::new().route("/", web::get().to(handler))).await;
    let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(header(&res, "server-timing"), None);
}
