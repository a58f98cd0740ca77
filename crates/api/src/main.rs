use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use valuation_core::analytics::{AnalyticsPipeline, PipelineConfig};
use valuation_core::domain::series::AdjustedRecord;
use valuation_core::ingest::TushareClient;
use valuation_core::protocol::{CommandProtocol, ProtocolConfig, WebhookReply};

const INVALID_SIGNATURE: &str = "Invalid signature";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = valuation_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pipeline = match TushareClient::from_settings(&settings) {
        Ok(client) => Some(AnalyticsPipeline::new(
            Arc::new(client),
            PipelineConfig::from_settings(&settings),
        )),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "market data client unavailable; starting API in degraded mode");
            None
        }
    };

    let protocol = match (&pipeline, ProtocolConfig::from_settings(&settings)) {
        (Some(pipeline), Ok(config)) => Some(Arc::new(CommandProtocol::new(config, pipeline.clone()))),
        (None, _) => None,
        (Some(_), Err(e)) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "webhook secret missing; /wechat disabled");
            None
        }
    };

    tracing::info!(
        default_ts_code = %settings.default_ts_code,
        lookback_years = settings.lookback_years,
        rolling_window = settings.rolling_window,
        debug_mode = settings.debug_mode,
        "api configured"
    );

    let state = AppState {
        pipeline: pipeline.map(Arc::new),
        protocol,
        default_ts_code: settings.default_ts_code.clone(),
    };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/pe_data", get(get_pe_data))
        .route("/wechat", get(wechat_verify).post(wechat_message))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    pipeline: Option<Arc<AnalyticsPipeline>>,
    protocol: Option<Arc<CommandProtocol>>,
    default_ts_code: String,
}

/// Body of `/api/pe_data`; failures are reported in `code`, not the HTTP status.
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    code: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            code: 0,
            data: Some(data),
            message: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            code: 1,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PeDataQuery {
    ts_code: Option<String>,
}

async fn get_pe_data(
    State(state): State<AppState>,
    Query(query): Query<PeDataQuery>,
) -> Json<ApiResponse<Vec<AdjustedRecord>>> {
    let Some(pipeline) = &state.pipeline else {
        return Json(ApiResponse::failure("market data source is not configured"));
    };

    let ts_code = query
        .ts_code
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.default_ts_code.clone());

    match pipeline.run(&ts_code).await {
        Ok(result) => Json(ApiResponse::success(result.into_records())),
        Err(failure) => Json(ApiResponse::failure(format!(
            "Failed to fetch data for {ts_code}; check the stock code or retry later ({})",
            failure.cause
        ))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct WechatQuery {
    #[serde(default)]
    signature: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    nonce: String,
    #[serde(default)]
    echostr: String,
}

async fn wechat_verify(
    State(state): State<AppState>,
    Query(query): Query<WechatQuery>,
) -> Response {
    let Some(protocol) = &state.protocol else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    if protocol.verify(&query.signature, &query.timestamp, &query.nonce) {
        query.echostr.into_response()
    } else {
        INVALID_SIGNATURE.into_response()
    }
}

async fn wechat_message(
    State(state): State<AppState>,
    Query(query): Query<WechatQuery>,
    body: String,
) -> Response {
    let Some(protocol) = &state.protocol else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    if !protocol.verify(&query.signature, &query.timestamp, &query.nonce) {
        return INVALID_SIGNATURE.into_response();
    }

    match protocol.handle_payload(&body).await {
        WebhookReply::Outbound(msg) => match msg.to_xml() {
            Ok(xml) => ([(header::CONTENT_TYPE, "application/xml")], xml).into_response(),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "failed to serialize webhook reply");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        WebhookReply::Malformed(text) => (StatusCode::BAD_REQUEST, text).into_response(),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &valuation_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use valuation_core::ingest::FixtureDataSource;

    // sha1("123abcxyz"): timestamp 123, secret abc, nonce xyz.
    const SIGNATURE: &str = "94ffbd20c84766e871799062cb1bc3e3f40c5e13";

    fn webhook_state() -> AppState {
        let pipeline = AnalyticsPipeline::new(
            Arc::new(FixtureDataSource::default()),
            PipelineConfig {
                lookback_years: 5,
                rolling_window: 252,
            },
        );
        let config = ProtocolConfig {
            shared_secret: "abc".to_string(),
            bypass_signature: false,
        };
        AppState {
            pipeline: Some(Arc::new(pipeline.clone())),
            protocol: Some(Arc::new(CommandProtocol::new(config, pipeline))),
            default_ts_code: "300604.SZ".to_string(),
        }
    }

    fn signed(signature: &str) -> WechatQuery {
        WechatQuery {
            signature: signature.to_string(),
            timestamp: "123".to_string(),
            nonce: "xyz".to_string(),
            echostr: "echo-42".to_string(),
        }
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn success_envelope_omits_message() {
        let body = ApiResponse::success(vec![1, 2]);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"code": 0, "data": [1, 2]})
        );
    }

    #[test]
    fn failure_envelope_omits_data() {
        let body: ApiResponse<Vec<u8>> = ApiResponse::failure("boom");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"code": 1, "message": "boom"})
        );
    }

    #[tokio::test]
    async fn degraded_state_reports_failure_in_body() {
        let state = AppState {
            pipeline: None,
            protocol: None,
            default_ts_code: "300604.SZ".to_string(),
        };
        let Json(body) = get_pe_data(State(state), Query(PeDataQuery { ts_code: None })).await;
        assert_eq!(body.code, 1);
        assert!(body.data.is_none());
    }

    #[tokio::test]
    async fn verify_echoes_only_for_a_valid_signature() {
        let resp = wechat_verify(State(webhook_state()), Query(signed(SIGNATURE))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "echo-42");

        let resp = wechat_verify(State(webhook_state()), Query(signed("deadbeef"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, INVALID_SIGNATURE);
    }

    #[tokio::test]
    async fn message_with_bad_signature_is_not_answered() {
        let raw = "<xml><ToUserName>gh_1</ToUserName><FromUserName>o_user</FromUserName>\
                   <CreateTime>1</CreateTime><MsgType>text</MsgType><Content>help</Content></xml>";
        let resp = wechat_message(
            State(webhook_state()),
            Query(signed("deadbeef")),
            raw.to_string(),
        )
        .await;
        assert_eq!(body_text(resp).await, INVALID_SIGNATURE);
    }

    #[tokio::test]
    async fn help_message_gets_an_xml_reply() {
        let raw = "<xml><ToUserName><![CDATA[gh_1]]></ToUserName>\
                   <FromUserName><![CDATA[o_user]]></FromUserName>\
                   <CreateTime>1767600000</CreateTime><MsgType><![CDATA[text]]></MsgType>\
                   <Content><![CDATA[help]]></Content></xml>";
        let resp = wechat_message(State(webhook_state()), Query(signed(SIGNATURE)), raw.to_string()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/xml");

        let xml = body_text(resp).await;
        assert!(xml.contains("<ToUserName><![CDATA[o_user]]></ToUserName>"));
        assert!(xml.contains("<FromUserName><![CDATA[gh_1]]></FromUserName>"));
        assert!(xml.contains("STOCK <code>"));
    }

    #[tokio::test]
    async fn malformed_payload_is_a_bad_request() {
        let resp = wechat_message(
            State(webhook_state()),
            Query(signed(SIGNATURE)),
            "not xml at all".to_string(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(resp).await.contains("could not be understood"));
    }

    #[tokio::test]
    async fn webhook_without_protocol_is_unavailable() {
        let state = AppState {
            pipeline: None,
            protocol: None,
            default_ts_code: "300604.SZ".to_string(),
        };
        let resp = wechat_verify(State(state.clone()), Query(signed(SIGNATURE))).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = wechat_message(State(state), Query(signed(SIGNATURE)), String::new()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
