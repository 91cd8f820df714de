//! Operational HTTP endpoints: `/health` and `/metrics`

use crate::kafka::ConsumerState;
use crate::metrics;
use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer};
use serde_json::json;
use tokio::sync::watch;
use tracing::{error, info};

pub type StateReceiver = watch::Receiver<ConsumerState>;

/// 200 while the consumer is running or stopped, 503 once it has faulted
async fn health(state: web::Data<StateReceiver>) -> HttpResponse {
    let current = *state.borrow();
    let body = json!({
        "status": if current.is_healthy() { "ok" } else { "degraded" },
        "consumer": current.as_str(),
    });

    if current.is_healthy() {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

async fn metrics_endpoint() -> HttpResponse {
    match metrics::render() {
        Ok((content_type, body)) => HttpResponse::Ok().content_type(content_type).body(body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_endpoint));
}

/// Bind the operational server; the returned future must be driven by the caller
pub fn serve(port: u16, state: StateReceiver) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure)
    })
    .workers(1)
    .bind(("0.0.0.0", port))?
    .run();

    info!(port, "HTTP server listening");
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;

    async fn status_for(state: ConsumerState) -> (StatusCode, serde_json::Value) {
        let (_tx, rx) = watch::channel(state);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(rx))
                .configure(configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        let status = resp.status();
        let body: serde_json::Value = test::read_body_json(resp).await;
        (status, body)
    }

    #[actix_web::test]
    async fn test_health_reports_consumer_state() {
        let (status, body) = status_for(ConsumerState::Running).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["consumer"], "running");

        let (status, _) = status_for(ConsumerState::Stopped).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = status_for(ConsumerState::Faulted).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
    }

    #[actix_web::test]
    async fn test_metrics_exposition() {
        metrics::set_consumer_state(ConsumerState::Running.code());
        let app = test::init_service(App::new().configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("inventory_consumer_state"));
    }
}
