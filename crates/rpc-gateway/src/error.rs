use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("method name '{0}' is not of the form \"Model.method\"")]
    InvalidMethodName(String),
    #[error("method '{0}' registered twice")]
    DuplicateMethod(String),
    #[error("exempt method '{0}' has no registration")]
    UnregisteredExemptMethod(String),
    #[error("failed to bind rpc listener: {0}")]
    Bind(std::io::Error),
    #[error("rpc server terminated: {0}")]
    Serve(std::io::Error),
}
