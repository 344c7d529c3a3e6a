//! JSON-RPC gateway core: wire envelope, explicit method registry, the
//! per-request interceptor pipeline and the HTTP surface.

pub mod envelope;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod registry;

pub use envelope::{
    JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, MethodName, RpcError, RpcErrorCode,
};
pub use error::GatewayError;
pub use http::{DEFAULT_CLIENT_VERSION, GatewayState, build_router, start_server};
pub use pipeline::{
    EXPIRATION_EXEMPT_METHODS, PipelineOutcome, PipelineStage, RequestContext, RequestPipeline,
    TOKEN_EXEMPT_METHODS, VISITOR_TOKEN,
};
pub use registry::{CallContext, HandlerError, MethodRegistry, RpcHandler};
