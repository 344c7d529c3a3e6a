//! HTTP surface: JSON-RPC over POST with permissive CORS, an OPTIONS
//! preflight short-circuit, and the `?version=` client-version parameter.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use axum::routing::post;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::envelope::{JsonRpcRequest, JsonRpcResponse, RpcError, RpcErrorCode};
use crate::error::GatewayError;
use crate::pipeline::{PipelineOutcome, RequestPipeline};

/// Clients that do not declare a version get the lowest one.
pub const DEFAULT_CLIENT_VERSION: &str = "0.0.0";

#[derive(Clone)]
pub struct GatewayState {
    pub pipeline: Arc<RequestPipeline>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    #[serde(default)]
    pub version: Option<String>,
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api", post(handle_rpc).options(handle_preflight))
        .with_state(state)
}

/// Preflight requests get an empty body and CORS headers, nothing else runs.
pub async fn handle_preflight() -> Response {
    respond(Body::empty(), false)
}

pub async fn handle_rpc(
    State(state): State<GatewayState>,
    Query(query): Query<VersionQuery>,
    body: Bytes,
) -> Response {
    let version = query
        .version
        .unwrap_or_else(|| DEFAULT_CLIENT_VERSION.to_string());

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return error_response(RpcError::new(RpcErrorCode::ParseError, "Parse error"));
        }
    };
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(_) => {
            return error_response(RpcError::new(RpcErrorCode::InvalidRequest, "Invalid request"));
        }
    };

    let outcome = state.pipeline.handle(request, &version).await;
    outcome_response(outcome)
}

fn outcome_response(outcome: PipelineOutcome) -> Response {
    match outcome.response {
        Some(envelope) => respond(
            Body::from(serde_json::to_vec(&envelope).unwrap_or_default()),
            outcome.close_connection,
        ),
        // An absent result still yields a well-formed (empty) body.
        None => respond(Body::empty(), outcome.close_connection),
    }
}

fn error_response(error: RpcError) -> Response {
    let envelope = JsonRpcResponse::failure(error, Value::Null);
    respond(
        Body::from(serde_json::to_vec(&envelope).unwrap_or_default()),
        false,
    )
}

fn respond(body: Body, close_connection: bool) -> Response {
    let mut builder = axum::http::Response::builder()
        .status(StatusCode::OK)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "accept, content-type")
        .header(header::CONTENT_TYPE, "application/json");
    if close_connection {
        builder = builder.header(header::CONNECTION, "close");
    }
    builder.body(body).unwrap_or_else(|_| {
        let mut fallback = Response::new(Body::empty());
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

pub async fn start_server(
    bind_addr: SocketAddr,
    state: GatewayState,
) -> Result<(), GatewayError> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(GatewayError::Bind)?;
    info!(addr = %bind_addr, "rpc gateway listening");
    axum::serve(listener, build_router(state))
        .await
        .map_err(GatewayError::Serve)
}

#[cfg(test)]
mod tests {
    use account_domain::{Account, AccountState, RegistrationSource};
    use account_store::{AccountRepository, InMemoryAccountRepository};
    use api_version::ApiVersion;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use serde_json::json;
    use session_store::{InMemorySessionRepository, SessionStore};

    use super::*;
    use crate::registry::{CallContext, HandlerError, MethodRegistry, RpcHandler};

    struct Pong;

    #[async_trait]
    impl RpcHandler for Pong {
        async fn call(&self, _ctx: CallContext) -> Result<Value, HandlerError> {
            Ok(json!({"pong": true}))
        }
    }

    struct Fixture {
        state: GatewayState,
        accounts: Arc<InMemoryAccountRepository>,
        sessions: SessionStore,
    }

    fn fixture() -> Fixture {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let sessions = SessionStore::new(
            Arc::new(InMemorySessionRepository::new()),
            accounts.clone(),
        );
        let mut registry = MethodRegistry::new();
        registry
            .register("user.ping", &[], Arc::new(Pong))
            .expect("register");
        let pipeline = RequestPipeline::new(
            sessions.clone(),
            accounts.clone(),
            Arc::new(ApiVersion::from_entries(Vec::new()).expect("versions")),
            Arc::new(registry),
            3600,
        );
        Fixture {
            state: GatewayState {
                pipeline: Arc::new(pipeline),
            },
            accounts,
            sessions,
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn post(fixture: &Fixture, version: Option<&str>, body: Value) -> (GatewayState, VersionQuery, Bytes) {
        (
            fixture.state.clone(),
            VersionQuery {
                version: version.map(ToString::to_string),
            },
            Bytes::from(serde_json::to_vec(&body).expect("encode")),
        )
    }

    #[tokio::test]
    async fn preflight_returns_empty_body_with_cors_headers() {
        let response = handle_preflight().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .expect("cors"),
            "*"
        );
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect")
            .to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn valid_call_round_trips_the_result_envelope() {
        let fixture = fixture();
        let (state, query, body) = post(
            &fixture,
            Some("1.0.0"),
            json!({"jsonrpc": "2.0", "method": "user.ping", "token": "visitor", "id": 5}),
        );
        let response = handle_rpc(State(state), Query(query), body).await;
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).expect("ct"),
            "application/json"
        );
        assert!(response.headers().get(header::CONNECTION).is_none());
        let body = body_json(response).await;
        assert_eq!(body, json!({"jsonrpc": "2.0", "result": {"pong": true}, "id": 5}));
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let fixture = fixture();
        let response = handle_rpc(
            State(fixture.state.clone()),
            Query(VersionQuery::default()),
            Bytes::from_static(b"{not json"),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], json!(-32700));
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn non_conforming_envelope_is_an_invalid_request() {
        let fixture = fixture();
        let (state, query, body) = post(&fixture, None, json!({"method": "user.ping"}));
        let response = handle_rpc(State(state), Query(query), body).await;
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], json!(-32600));
    }

    #[tokio::test]
    async fn notification_returns_an_empty_body() {
        let fixture = fixture();
        let (state, query, body) = post(
            &fixture,
            None,
            json!({"jsonrpc": "2.0", "method": "user.ping", "token": "visitor"}),
        );
        let response = handle_rpc(State(state), Query(query), body).await;
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_HEADERS).expect("cors"),
            "accept, content-type"
        );
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect")
            .to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn expired_account_response_closes_the_connection() {
        let fixture = fixture();
        let mut account = Account::new(
            "stale@example.com".to_string(),
            RegistrationSource::App,
            Utc::now(),
        );
        account.state = AccountState::WaitingForActivation;
        account.activation_email_sent = Some(Utc::now() - Duration::seconds(7200));
        fixture.accounts.insert(account.clone()).await.expect("seed");
        let token = fixture.sessions.issue(account.id).await.expect("issue");

        let (state, query, body) = post(
            &fixture,
            Some("1.0.0"),
            json!({"jsonrpc": "2.0", "method": "user.ping", "token": token, "id": 1}),
        );
        let response = handle_rpc(State(state), Query(query), body).await;
        assert_eq!(
            response.headers().get(header::CONNECTION).expect("close"),
            "close"
        );
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], json!(-32011));
        assert_eq!(body["error"]["data"]["email"], json!("stale@example.com"));
    }
}
