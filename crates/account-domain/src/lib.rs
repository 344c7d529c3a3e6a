pub mod account;
pub mod errors;
pub mod ids;

pub use account::{Account, AccountState, AccountUpdate, RegistrationSource};
pub use errors::DomainError;
pub use ids::{AccountId, TraceId};
