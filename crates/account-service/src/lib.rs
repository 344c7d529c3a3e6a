//! Account API: the `user.*` handlers and their collaborators.

pub mod auth;
pub mod devices;
pub mod error;
pub mod outbox;
pub mod register;
pub mod user_api;
pub mod validator;

pub use auth::{Authenticator, hash_password};
pub use devices::{DeviceRecord, DeviceRepository, InMemoryDeviceRepository};
pub use error::ApiError;
pub use outbox::{EmailMessage, EmailOutbox, InMemoryEmailOutbox};
pub use register::register_methods;
pub use user_api::{
    FindProfileRequest, GetEmailByRequest, GetEmailByResponse, LoginRequest, LoginResponse,
    MessageResponse, ProfileResponse, ResetPasswordRequest, SetReferralCodeRequest,
    SignupRequest, UpdateDeviceRequest, UpdateProfileRequest, UserApi,
};
pub use validator::{PASSWORD_MIN_LENGTH, Validator};
