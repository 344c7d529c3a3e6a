//! Wiring of the `user.*` handlers into the gateway's method registry,
//! with the positional parameter order each method historically accepted.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use rpc_gateway::{
    CallContext, GatewayError, HandlerError, MethodRegistry, RpcError, RpcErrorCode, RpcHandler,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::user_api::UserApi;

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> RpcHandler for FnHandler<F>
where
    F: Fn(CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    async fn call(&self, ctx: CallContext) -> Result<Value, HandlerError> {
        (self.0)(ctx).await
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, HandlerError> {
    serde_json::from_value(params).map_err(|err| {
        HandlerError::Rpc(RpcError::new(
            RpcErrorCode::InvalidParams,
            format!("Invalid params: {err}"),
        ))
    })
}

fn encode<T: Serialize>(value: T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(|err| HandlerError::Internal(err.to_string()))
}

pub fn register_methods(
    registry: &mut MethodRegistry,
    api: Arc<UserApi>,
) -> Result<(), GatewayError> {
    {
        let api = api.clone();
        registry.register(
            "user.login",
            &["user", "password", "facebook_id"],
            Arc::new(FnHandler(move |ctx: CallContext| {
                let api = api.clone();
                async move {
                    let request = parse(ctx.params)?;
                    encode(api.login(request).await.map_err(HandlerError::from)?)
                }
            })),
        )?;
    }
    {
        let api = api.clone();
        registry.register(
            "user.signup",
            &["email", "password", "facebook_id", "referral", "device"],
            Arc::new(FnHandler(move |ctx: CallContext| {
                let api = api.clone();
                async move {
                    let request = parse(ctx.params)?;
                    encode(api.signup(request).await.map_err(HandlerError::from)?)
                }
            })),
        )?;
    }
    {
        let api = api.clone();
        registry.register(
            "user.logout",
            &[],
            Arc::new(FnHandler(move |ctx: CallContext| {
                let api = api.clone();
                async move {
                    encode(
                        api.logout(ctx.identity.as_ref())
                            .await
                            .map_err(HandlerError::from)?,
                    )
                }
            })),
        )?;
    }
    {
        let api = api.clone();
        registry.register(
            "user.resetpassword",
            &["email"],
            Arc::new(FnHandler(move |ctx: CallContext| {
                let api = api.clone();
                async move {
                    let request = parse(ctx.params)?;
                    encode(api.resetpassword(request).await.map_err(HandlerError::from)?)
                }
            })),
        )?;
    }
    {
        let api = api.clone();
        registry.register(
            "user.getemailby",
            &["facebook_id"],
            Arc::new(FnHandler(move |ctx: CallContext| {
                let api = api.clone();
                async move {
                    let request = parse(ctx.params)?;
                    encode(api.getemailby(request).await.map_err(HandlerError::from)?)
                }
            })),
        )?;
    }
    {
        let api = api.clone();
        registry.register(
            "user.updateprofile",
            &[
                "name",
                "date_of_birth",
                "gender",
                "hometown",
                "avatar",
                "facebook_connected",
                "facebook_id",
                "email",
            ],
            Arc::new(FnHandler(move |ctx: CallContext| {
                let api = api.clone();
                async move {
                    let request = parse(ctx.params)?;
                    encode(
                        api.updateprofile(ctx.identity.as_ref(), request)
                            .await
                            .map_err(HandlerError::from)?,
                    )
                }
            })),
        )?;
    }
    {
        let api = api.clone();
        registry.register(
            "user.findprofile",
            &["device_hash"],
            Arc::new(FnHandler(move |ctx: CallContext| {
                let api = api.clone();
                async move {
                    let request = parse(ctx.params)?;
                    encode(
                        api.findprofile(ctx.identity.as_ref(), request)
                            .await
                            .map_err(HandlerError::from)?,
                    )
                }
            })),
        )?;
    }
    {
        let api = api.clone();
        registry.register(
            "user.updatedevice",
            &["hash", "active", "platform"],
            Arc::new(FnHandler(move |ctx: CallContext| {
                let api = api.clone();
                async move {
                    let request = parse(ctx.params)?;
                    encode(
                        api.updatedevice(ctx.identity.as_ref(), request)
                            .await
                            .map_err(HandlerError::from)?,
                    )
                }
            })),
        )?;
    }
    {
        let api = api.clone();
        registry.register(
            "user.setreferralcode",
            &["referral"],
            Arc::new(FnHandler(move |ctx: CallContext| {
                let api = api.clone();
                async move {
                    let request = parse(ctx.params)?;
                    encode(
                        api.setreferralcode(ctx.identity.as_ref(), request)
                            .await
                            .map_err(HandlerError::from)?,
                    )
                }
            })),
        )?;
    }
    Ok(())
}
