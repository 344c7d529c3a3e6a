//! The per-request interceptor chain.
//!
//! Each request walks a fixed sequence of stages over one mutable
//! [`RequestContext`]: token check, account-activity check, version
//! override, dispatch. The first stage that fails short-circuits the rest.
//! The chain is explicit and sequential; every stage depends on state the
//! previous one established.

use std::sync::Arc;

use account_domain::{Account, AccountState, AccountUpdate, TraceId};
use account_store::AccountRepository;
use api_version::{ApiVersion, VersionError};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use session_store::SessionStore;
use tracing::{debug, warn};

use crate::envelope::{
    JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, MethodName, RpcError, RpcErrorCode,
};
use crate::registry::{CallContext, MethodRegistry};

/// Methods callable without any token.
pub const TOKEN_EXEMPT_METHODS: &[&str] = &[
    "user.login",
    "user.signup",
    "user.resetpassword",
    "user.getemailby",
];

/// Methods exempt from the account-expiration check.
pub const EXPIRATION_EXEMPT_METHODS: &[&str] = &["user.signup"];

/// Sentinel token for unauthenticated pass-through callers.
pub const VISITOR_TOKEN: &str = "visitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    TokenChecked,
    ActivityChecked,
    VersionChecked,
    Dispatched,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: TraceId,
    pub method: MethodName,
    pub params: Value,
    pub token: Option<String>,
    pub id: Option<Value>,
    pub client_version: String,
    pub identity: Option<Account>,
    pub visitor: bool,
    pub stage: PipelineStage,
}

impl RequestContext {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

struct StageFailure {
    error: RpcError,
    /// The account-expired path terminates the whole exchange.
    terminate_connection: bool,
}

impl StageFailure {
    fn new(error: RpcError) -> Self {
        Self {
            error,
            terminate_connection: false,
        }
    }

    fn terminal(error: RpcError) -> Self {
        Self {
            error,
            terminate_connection: true,
        }
    }
}

impl From<RpcError> for StageFailure {
    fn from(error: RpcError) -> Self {
        Self::new(error)
    }
}

/// Outcome of one request. `response` is `None` when the wire body must be
/// empty (notifications); the envelope is otherwise always well-formed.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub response: Option<JsonRpcResponse>,
    pub close_connection: bool,
    pub stage: PipelineStage,
}

pub struct RequestPipeline {
    sessions: SessionStore,
    accounts: Arc<dyn AccountRepository>,
    versions: Arc<ApiVersion>,
    registry: Arc<MethodRegistry>,
    activation_window: Duration,
}

impl RequestPipeline {
    #[must_use]
    pub fn new(
        sessions: SessionStore,
        accounts: Arc<dyn AccountRepository>,
        versions: Arc<ApiVersion>,
        registry: Arc<MethodRegistry>,
        activation_expiration_seconds: u64,
    ) -> Self {
        Self {
            sessions,
            accounts,
            versions,
            registry,
            activation_window: Duration::seconds(
                i64::try_from(activation_expiration_seconds).unwrap_or(i64::MAX),
            ),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Run one request through the full chain.
    pub async fn handle(&self, request: JsonRpcRequest, client_version: &str) -> PipelineOutcome {
        let id = request.id.clone();
        if request.jsonrpc != JSONRPC_VERSION {
            return failed_outcome(
                RpcError::new(RpcErrorCode::InvalidRequest, "Unsupported jsonrpc version"),
                id,
                false,
            );
        }
        let Some(method) = MethodName::parse(&request.method) else {
            return failed_outcome(
                RpcError::new(
                    RpcErrorCode::InvalidRequest,
                    format!("Method '{}' is not of the form \"Model.method\"", request.method),
                ),
                id,
                false,
            );
        };

        let mut ctx = RequestContext {
            trace_id: TraceId::new(),
            method,
            params: request.params,
            token: request.token,
            id: request.id,
            client_version: client_version.to_string(),
            identity: None,
            visitor: false,
            stage: PipelineStage::Received,
        };

        if let Err(failure) = self.check_token(&mut ctx).await {
            return fail(&mut ctx, failure);
        }
        ctx.stage = PipelineStage::TokenChecked;

        if let Err(failure) = self.verify_account_activity(&mut ctx).await {
            return fail(&mut ctx, failure);
        }
        ctx.stage = PipelineStage::ActivityChecked;

        if let Err(failure) = self.apply_version_override(&mut ctx) {
            return fail(&mut ctx, failure);
        }
        ctx.stage = PipelineStage::VersionChecked;

        let call = CallContext {
            params: ctx.params.clone(),
            identity: ctx.identity.clone(),
            visitor: ctx.visitor,
            trace_id: ctx.trace_id,
        };
        let result = match self.registry.dispatch(&ctx.method.full(), call).await {
            Ok(value) => value,
            Err(error) => return fail(&mut ctx, StageFailure::new(error)),
        };
        ctx.stage = PipelineStage::Dispatched;

        let response = ctx
            .id
            .clone()
            .map(|id| JsonRpcResponse::success(result, id));
        ctx.stage = PipelineStage::Completed;
        PipelineOutcome {
            response,
            close_connection: false,
            stage: ctx.stage,
        }
    }

    /// Stage 1: bearer-token authentication.
    async fn check_token(&self, ctx: &mut RequestContext) -> Result<(), StageFailure> {
        let full = ctx.method.full();
        if TOKEN_EXEMPT_METHODS.contains(&full.as_str()) {
            return Ok(());
        }

        let Some(token) = ctx.token.clone() else {
            return Err(RpcError::new(RpcErrorCode::MissingToken, "Token is required").into());
        };

        if token == VISITOR_TOKEN {
            ctx.visitor = true;
            return Ok(());
        }

        let account = match self.sessions.resolve(&token).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                return Err(RpcError::new(RpcErrorCode::InvalidToken, "Token not valid").into());
            }
            Err(err) => {
                warn!(error = %err, "session resolution failed");
                return Err(
                    RpcError::new(RpcErrorCode::InternalError, "Internal error").into(),
                );
            }
        };

        // Activity stamp is best-effort; the call proceeds even if it fails.
        let update = AccountUpdate {
            last_seen: Some(Utc::now()),
            ..AccountUpdate::default()
        };
        if let Err(err) = self.accounts.update(account.id, &update).await {
            warn!(account_id = %account.id, error = %err, "last_seen update failed");
        }

        ctx.identity = Some(account);
        Ok(())
    }

    /// Stage 2: block expired WAITING_FOR_ACTIVATION accounts.
    async fn verify_account_activity(&self, ctx: &mut RequestContext) -> Result<(), StageFailure> {
        let full = ctx.method.full();
        if EXPIRATION_EXEMPT_METHODS.contains(&full.as_str()) {
            return Ok(());
        }

        let account = match &ctx.identity {
            Some(identity) => identity.clone(),
            None => {
                let email_param = ctx
                    .params
                    .get("email")
                    .and_then(Value::as_str)
                    .or_else(|| ctx.params.get("user").and_then(Value::as_str));
                match email_param {
                    Some(email) => {
                        // Unauthenticated account-state probe; kept so that
                        // token-exempt calls by expired accounts still hit
                        // the expiration policy.
                        debug!(method = %full, "resolving activity identity from email parameter");
                        match self.accounts.get_by_email(email).await {
                            Ok(Some(account)) => account,
                            Ok(None) => {
                                return Err(RpcError::new(
                                    RpcErrorCode::IdentityNotFound,
                                    "User not found by supplied email",
                                )
                                .into());
                            }
                            Err(err) => {
                                warn!(error = %err, "account lookup failed");
                                return Err(RpcError::new(
                                    RpcErrorCode::InternalError,
                                    "Internal error",
                                )
                                .into());
                            }
                        }
                    }
                    None if ctx.visitor => return Ok(()),
                    None => {
                        return Err(RpcError::new(
                            RpcErrorCode::IdentityNotFound,
                            "User not found by supplied email",
                        )
                        .into());
                    }
                }
            }
        };

        if account.state != AccountState::WaitingForActivation {
            return Ok(());
        }
        let Some(sent_at) = account.activation_email_sent else {
            warn!(account_id = %account.id, "waiting account has no activation timestamp");
            return Ok(());
        };
        let valid_until = sent_at + self.activation_window;
        if Utc::now() > valid_until {
            return Err(StageFailure::terminal(RpcError::with_data(
                RpcErrorCode::AccountExpired,
                "User account validity expired",
                json!({"email": account.email}),
            )));
        }
        Ok(())
    }

    /// Stage 3: deprecation gate and method rerouting for old clients.
    fn apply_version_override(&self, ctx: &mut RequestContext) -> Result<(), StageFailure> {
        let decision = match self.versions.resolve(&ctx.client_version) {
            Ok(decision) => decision,
            Err(VersionError::Malformed(version)) => {
                return Err(RpcError::new(
                    RpcErrorCode::InvalidParamsFormat,
                    format!("Incompatible version identifier '{version}'"),
                )
                .into());
            }
            Err(err) => {
                warn!(error = %err, "version resolution failed");
                return Err(
                    RpcError::new(RpcErrorCode::InternalError, "Internal error").into(),
                );
            }
        };
        let Some(decision) = decision else {
            return Ok(());
        };

        if decision.is_deprecated(Utc::now()) {
            return Err(RpcError::new(
                RpcErrorCode::AppVersionDeprecated,
                "Application version deprecated",
            )
            .into());
        }

        if let Some(rewritten) = decision.rewrite(&ctx.method.model, &ctx.method.method)
            && let Some(parsed) = MethodName::parse(&rewritten)
        {
            debug!(from = %ctx.method, to = %parsed, "version override reroute");
            ctx.method = parsed;
        }
        Ok(())
    }
}

fn fail(ctx: &mut RequestContext, failure: StageFailure) -> PipelineOutcome {
    ctx.stage = PipelineStage::Failed;
    failed_outcome(
        failure.error,
        ctx.id.clone(),
        failure.terminate_connection,
    )
}

fn failed_outcome(
    error: RpcError,
    id: Option<Value>,
    close_connection: bool,
) -> PipelineOutcome {
    PipelineOutcome {
        response: Some(JsonRpcResponse::failure(
            error,
            id.unwrap_or(Value::Null),
        )),
        close_connection,
        stage: PipelineStage::Failed,
    }
}
