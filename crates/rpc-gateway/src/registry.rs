//! Explicit method dispatch: a startup-built map from `"Model.method"`
//! names to typed handlers, replacing reflection over model objects.

use std::collections::HashMap;
use std::sync::Arc;

use account_domain::{Account, TraceId};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::error;

use crate::envelope::{MethodName, RpcError, RpcErrorCode};
use crate::error::GatewayError;

/// Per-call view handed to a handler: normalized named params plus the
/// caller identity resolved by the pipeline.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub params: Value,
    pub identity: Option<Account>,
    pub visitor: bool,
    pub trace_id: TraceId,
}

impl CallContext {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Handler failure. `Rpc` is an intentional, client-facing error; anything
/// `Internal` is logged server-side and reaches the client as a generic
/// internal error without its detail.
#[derive(Debug)]
pub enum HandlerError {
    Rpc(RpcError),
    Internal(String),
}

impl From<RpcError> for HandlerError {
    fn from(error: RpcError) -> Self {
        Self::Rpc(error)
    }
}

#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn call(&self, ctx: CallContext) -> Result<Value, HandlerError>;
}

struct RegisteredMethod {
    param_names: &'static [&'static str],
    handler: Arc<dyn RpcHandler>,
}

#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, RegisteredMethod>,
}

impl MethodRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its full method name, declaring the
    /// positional parameter order the original API accepted.
    pub fn register(
        &mut self,
        name: &str,
        param_names: &'static [&'static str],
        handler: Arc<dyn RpcHandler>,
    ) -> Result<(), GatewayError> {
        if MethodName::parse(name).is_none() {
            return Err(GatewayError::InvalidMethodName(name.to_string()));
        }
        if self.methods.contains_key(name) {
            return Err(GatewayError::DuplicateMethod(name.to_string()));
        }
        self.methods.insert(
            name.to_string(),
            RegisteredMethod {
                param_names,
                handler,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Startup check: every method on an exempt list must be a real
    /// registration, so policy lists cannot drift from the actual API.
    pub fn verify_exempt_methods(&self, exempt: &[&str]) -> Result<(), GatewayError> {
        for name in exempt {
            if !self.contains(name) {
                return Err(GatewayError::UnregisteredExemptMethod((*name).to_string()));
            }
        }
        Ok(())
    }

    /// Run the named handler. Params are normalized to object form first;
    /// positional params map onto the handler's declared names.
    pub async fn dispatch(&self, name: &str, mut ctx: CallContext) -> Result<Value, RpcError> {
        let Some(registered) = self.methods.get(name) else {
            return Err(RpcError::new(
                RpcErrorCode::MethodNotFound,
                format!("Method '{name}' not found"),
            ));
        };
        ctx.params = normalize_params(ctx.params, registered.param_names)?;
        match registered.handler.call(ctx).await {
            Ok(value) => Ok(value),
            Err(HandlerError::Rpc(error)) => Err(error),
            Err(HandlerError::Internal(detail)) => {
                error!(method = name, error = %detail, "rpc handler failed");
                Err(RpcError::new(RpcErrorCode::InternalError, "Internal error"))
            }
        }
    }
}

fn normalize_params(params: Value, names: &[&str]) -> Result<Value, RpcError> {
    match params {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(map) => Ok(Value::Object(map)),
        Value::Array(values) => {
            if values.len() > names.len() {
                return Err(RpcError::new(
                    RpcErrorCode::InvalidParams,
                    format!(
                        "Too many positional params: got {}, expected at most {}",
                        values.len(),
                        names.len()
                    ),
                ));
            }
            let mut map = Map::with_capacity(values.len());
            for (name, value) in names.iter().zip(values) {
                map.insert((*name).to_string(), value);
            }
            Ok(Value::Object(map))
        }
        _ => Err(RpcError::new(
            RpcErrorCode::InvalidParams,
            "Params must be an array or an object",
        )),
    }
}
