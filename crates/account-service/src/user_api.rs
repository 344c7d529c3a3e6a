//! The `user.*` RPC handlers.
//!
//! Every public method here is callable through the gateway registry; the
//! caller identity (when any) is the one the pipeline bound from the
//! bearer token.

use std::sync::Arc;

use account_domain::{Account, AccountUpdate, RegistrationSource};
use account_store::{AccountFilter, AccountRepository};
use chrono::{Duration, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use session_store::SessionStore;
use tracing::info;

use crate::auth::{Authenticator, hash_password};
use crate::devices::{DeviceRecord, DeviceRepository};
use crate::error::ApiError;
use crate::outbox::{EmailMessage, EmailOutbox};
use crate::validator::Validator;

/// Week-long validity for password recovery requests.
pub const PASSWORD_RECOVERY_EXPIRATION_SECONDS: i64 = 604_800;

const REFERRAL_CODE_LENGTH: usize = 7;
// Unambiguous alphabet: no B/8, G/6, I/1/l, O/0/Q, D, S/5, Z/2.
const REFERRAL_ALPHABET: &[u8] = b"ACEFHJKLMNPRTU3479VWXY";

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub facebook_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub facebook_id: Option<String>,
    #[serde(default)]
    pub referral: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetEmailByRequest {
    #[serde(default)]
    pub facebook_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetEmailByResponse {
    pub facebook_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub hometown: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub facebook_connected: Option<bool>,
    #[serde(default)]
    pub facebook_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindProfileRequest {
    #[serde(default)]
    pub device_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub name: Option<String>,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub hometown: Option<String>,
    pub avatar_url: Option<String>,
    pub facebook_connected: bool,
    pub referral_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Option<bool>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDeviceRequest {
    pub hash: String,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetReferralCodeRequest {
    pub referral: String,
}

pub struct UserApi {
    accounts: Arc<dyn AccountRepository>,
    sessions: SessionStore,
    devices: Arc<dyn DeviceRepository>,
    outbox: Arc<dyn EmailOutbox>,
    validator: Validator,
    authenticator: Authenticator,
}

impl UserApi {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        sessions: SessionStore,
        devices: Arc<dyn DeviceRepository>,
        outbox: Arc<dyn EmailOutbox>,
    ) -> Self {
        Self {
            validator: Validator::new(accounts.clone()),
            authenticator: Authenticator::new(accounts.clone()),
            accounts,
            sessions,
            devices,
            outbox,
        }
    }

    /// Password or facebook login; issues a fresh session token.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ApiError> {
        check_credentials_input(request.password.as_ref(), request.facebook_id.as_ref())?;
        let account = match &request.facebook_id {
            None => {
                self.authenticator
                    .authenticate(&request.user, request.password.as_deref().unwrap_or_default())
                    .await?
            }
            Some(facebook_id) => {
                self.authenticator
                    .authenticate_facebook(&request.user, facebook_id)
                    .await?
            }
        };
        let token = self.sessions.issue(account.id).await?;
        Ok(LoginResponse {
            token,
            user: request.user,
        })
    }

    /// Validate, create the account and log it straight in.
    pub async fn signup(&self, request: SignupRequest) -> Result<LoginResponse, ApiError> {
        check_credentials_input(request.password.as_ref(), request.facebook_id.as_ref())?;
        // Facebook-only signups get a random long password.
        let password = request
            .password
            .clone()
            .unwrap_or_else(|| random_token(32));

        self.validator.validate_signup_email(&request.email).await?;
        Validator::validate_password(&password, &request.email)?;

        let mut account = Account::new(
            request.email.clone(),
            RegistrationSource::App,
            Utc::now(),
        );
        account.password_hash = Some(hash_password(&password)?);
        account.facebook_id = request.facebook_id.clone();
        account.facebook_connected = request.facebook_id.is_some();
        account.referral_code = Some(generate_referral_code());
        if let Some(referral) = &request.referral {
            let code = referral.to_uppercase();
            if let Some(referrer) = self
                .accounts
                .get_one_filtered(&AccountFilter::ReferralCode(code))
                .await?
            {
                account.inviter_account_id = Some(referrer.id);
            }
        }
        let account_id = account.id;
        self.accounts.insert(account).await?;
        info!(account_id = %account_id, "account created");

        self.login(LoginRequest {
            user: request.email,
            password: Some(password),
            facebook_id: request.facebook_id,
        })
        .await
    }

    /// Destroy every session of the caller.
    pub async fn logout(&self, identity: Option<&Account>) -> Result<MessageResponse, ApiError> {
        match identity {
            Some(account) => {
                self.sessions.destroy_all(account.id).await?;
                Ok(MessageResponse {
                    message: "Goodbye".to_string(),
                })
            }
            None => Ok(MessageResponse {
                message: "Not logged in".to_string(),
            }),
        }
    }

    /// Create a password recovery request and queue the recovery email.
    pub async fn resetpassword(
        &self,
        request: ResetPasswordRequest,
    ) -> Result<MessageResponse, ApiError> {
        let account = self
            .accounts
            .get_by_email(&request.email)
            .await?
            .ok_or(ApiError::IdentityNotFound)?;

        let recovery_hash = random_token(64);
        let expires_at = Utc::now() + Duration::seconds(PASSWORD_RECOVERY_EXPIRATION_SECONDS);
        self.accounts
            .update(
                account.id,
                &AccountUpdate {
                    recovery_hash: Some(Some(recovery_hash.clone())),
                    recovery_expires_at: Some(Some(expires_at)),
                    ..AccountUpdate::default()
                },
            )
            .await?;

        self.outbox
            .enqueue(EmailMessage {
                recipient_email: account.email.clone(),
                subject: format!("Password recovery request for: {}", account.email),
                body: format!(
                    "Use recovery code {recovery_hash} to set a new password."
                ),
                sender_name: "Password recovery system".to_string(),
                sender_email: "no-reply@password-recovery.com".to_string(),
                purpose: "recovery".to_string(),
                account_id: account.id,
                created: Utc::now(),
            })
            .await
            .map_err(ApiError::Internal)?;

        Ok(MessageResponse {
            message: "Email with new password has been sent".to_string(),
        })
    }

    /// Look an email up by a unique identifier, currently the facebook id.
    pub async fn getemailby(
        &self,
        request: GetEmailByRequest,
    ) -> Result<GetEmailByResponse, ApiError> {
        let Some(facebook_id) = request.facebook_id else {
            return Err(ApiError::EmptyParamValue(
                "At least one filter param has to be supplied".to_string(),
            ));
        };
        let account = self
            .accounts
            .get_one_filtered(&AccountFilter::FacebookId(facebook_id.clone()))
            .await?;
        Ok(GetEmailByResponse {
            facebook_id,
            email: account.map(|account| account.email),
        })
    }

    /// Apply the supplied profile fields to the caller's account.
    pub async fn updateprofile(
        &self,
        identity: Option<&Account>,
        request: UpdateProfileRequest,
    ) -> Result<bool, ApiError> {
        let account = identity.ok_or_else(|| {
            ApiError::NotAllowedForVisitors("Profile updates not allowed for visitors".to_string())
        })?;

        // Email first: its validation can fail the whole call.
        if let Some(email) = &request.email {
            self.validator
                .validate_email_change(email, account.id)
                .await?;
            self.accounts
                .update(
                    account.id,
                    &AccountUpdate {
                        email: Some(email.clone()),
                        ..AccountUpdate::default()
                    },
                )
                .await?;
        }

        if request.facebook_connected == Some(true) && request.facebook_id.is_none() {
            return Err(ApiError::InvalidParamsFormat(
                "When connecting to facebook, FB id has to be supplied".to_string(),
            ));
        }

        let avatar_url = match &request.avatar {
            None => None,
            Some(avatar) if avatar.starts_with("http") => Some(avatar.clone()),
            Some(_) => {
                return Err(ApiError::InvalidParamsFormat(
                    "Avatar has to be a valid URL".to_string(),
                ));
            }
        };

        self.accounts
            .update(
                account.id,
                &AccountUpdate {
                    name: request.name,
                    date_of_birth: request.date_of_birth,
                    gender: request.gender,
                    hometown: request.hometown,
                    avatar_url,
                    facebook_connected: request.facebook_connected,
                    facebook_id: request.facebook_id,
                    ..AccountUpdate::default()
                },
            )
            .await?;
        Ok(true)
    }

    /// The caller's profile, optionally with the notification flag of one
    /// registered device.
    pub async fn findprofile(
        &self,
        identity: Option<&Account>,
        request: FindProfileRequest,
    ) -> Result<ProfileResponse, ApiError> {
        let bound = identity.ok_or_else(|| {
            ApiError::NotAllowedForVisitors("Profile info not allowed for visitors".to_string())
        })?;
        let account = self
            .accounts
            .get_by_id(bound.id)
            .await?
            .ok_or(ApiError::IdentityNotFound)?;

        let notifications = match &request.device_hash {
            None => None,
            Some(hash) => {
                let device = self
                    .devices
                    .get_by_hash(hash)
                    .await
                    .map_err(ApiError::Internal)?;
                Some(device.map(|device| device.active))
            }
        };

        Ok(ProfileResponse {
            name: account.name,
            email: account.email,
            date_of_birth: account.date_of_birth,
            gender: account.gender,
            hometown: account.hometown,
            avatar_url: account.avatar_url,
            facebook_connected: account.facebook_connected,
            referral_code: account.referral_code,
            notifications,
        })
    }

    /// Register or refresh a push-notification device handle.
    pub async fn updatedevice(
        &self,
        identity: Option<&Account>,
        request: UpdateDeviceRequest,
    ) -> Result<bool, ApiError> {
        let account = identity.ok_or_else(|| {
            ApiError::NotAllowedForVisitors("Notifications not allowed for visitors".to_string())
        })?;
        let is_apple = match request.platform.as_deref() {
            Some("ios") => Some(true),
            Some("android") => Some(false),
            _ => None,
        };
        self.devices
            .upsert(DeviceRecord {
                hash: request.hash,
                account_id: account.id,
                active: request.active.unwrap_or(true),
                is_apple,
            })
            .await
            .map_err(ApiError::Internal)?;
        Ok(true)
    }

    /// Bind the caller to the inviter owning the supplied referral code.
    pub async fn setreferralcode(
        &self,
        identity: Option<&Account>,
        request: SetReferralCodeRequest,
    ) -> Result<bool, ApiError> {
        let account = identity.ok_or_else(|| {
            ApiError::NotAllowedForVisitors(
                "Setting referral code not allowed for visitors".to_string(),
            )
        })?;
        let code = request.referral.to_uppercase();
        let referrer = self
            .accounts
            .get_one_filtered(&AccountFilter::ReferralCode(code))
            .await?
            .ok_or_else(|| ApiError::ItemNotFound("Referrer account not found".to_string()))?;
        if referrer.id == account.id {
            return Err(ApiError::InvalidParamsFormat(
                "An account can not invite self".to_string(),
            ));
        }
        self.accounts
            .update(
                account.id,
                &AccountUpdate {
                    inviter_account_id: Some(referrer.id),
                    ..AccountUpdate::default()
                },
            )
            .await?;
        Ok(true)
    }
}

fn check_credentials_input(
    password: Option<&String>,
    facebook_id: Option<&String>,
) -> Result<(), ApiError> {
    if password.is_none() && facebook_id.is_none() {
        return Err(ApiError::EmptyParamValue(
            "Either facebook id or password has to be supplied".to_string(),
        ));
    }
    Ok(())
}

fn random_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LENGTH)
        .map(|_| {
            let index = rng.gen_range(0..REFERRAL_ALPHABET.len());
            char::from(REFERRAL_ALPHABET[index])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use account_domain::AccountState;
    use account_store::InMemoryAccountRepository;
    use session_store::InMemorySessionRepository;

    use super::*;
    use crate::devices::InMemoryDeviceRepository;
    use crate::outbox::InMemoryEmailOutbox;

    struct Fixture {
        api: UserApi,
        accounts: Arc<InMemoryAccountRepository>,
        sessions: SessionStore,
        devices: Arc<InMemoryDeviceRepository>,
        outbox: Arc<InMemoryEmailOutbox>,
    }

    fn fixture() -> Fixture {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let sessions = SessionStore::new(
            Arc::new(InMemorySessionRepository::new()),
            accounts.clone(),
        );
        let devices = Arc::new(InMemoryDeviceRepository::new());
        let outbox = Arc::new(InMemoryEmailOutbox::new());
        Fixture {
            api: UserApi::new(
                accounts.clone(),
                sessions.clone(),
                devices.clone(),
                outbox.clone(),
            ),
            accounts,
            sessions,
            devices,
            outbox,
        }
    }

    fn signup_request(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: Some(password.to_string()),
            facebook_id: None,
            referral: None,
        }
    }

    async fn signed_up(fixture: &Fixture, email: &str, password: &str) -> Account {
        fixture
            .api
            .signup(signup_request(email, password))
            .await
            .expect("signup");
        fixture
            .accounts
            .get_by_email(email)
            .await
            .expect("get")
            .expect("account")
    }

    #[tokio::test]
    async fn signup_creates_a_new_account_and_logs_it_in() {
        let fixture = fixture();
        let response = fixture
            .api
            .signup(signup_request("a@example.com", "secret1"))
            .await
            .expect("signup");
        assert_eq!(response.user, "a@example.com");

        let resolved = fixture
            .sessions
            .resolve(&response.token)
            .await
            .expect("resolve")
            .expect("identity");
        assert_eq!(resolved.email, "a@example.com");
        assert_eq!(resolved.state, AccountState::New);
        assert!(resolved.password_hash.is_some());
        assert_eq!(
            resolved.referral_code.expect("code").len(),
            REFERRAL_CODE_LENGTH
        );
    }

    #[tokio::test]
    async fn signup_rejects_taken_email_short_password_and_login_equality() {
        let fixture = fixture();
        signed_up(&fixture, "a@example.com", "secret1").await;

        let err = fixture
            .api
            .signup(signup_request("a@example.com", "secret2"))
            .await
            .expect_err("taken");
        assert!(matches!(err, ApiError::UsernameTaken));

        let err = fixture
            .api
            .signup(signup_request("b@example.com", "short"))
            .await
            .expect_err("short");
        assert!(matches!(err, ApiError::InvalidPassword(_)));

        let err = fixture
            .api
            .signup(signup_request("c@example.com", "c@example.com"))
            .await
            .expect_err("same as login");
        assert!(matches!(err, ApiError::InvalidPassword(_)));

        let err = fixture
            .api
            .signup(SignupRequest {
                email: "d@example.com".to_string(),
                password: None,
                facebook_id: None,
                referral: None,
            })
            .await
            .expect_err("no credentials");
        assert!(matches!(err, ApiError::EmptyParamValue(_)));
    }

    #[tokio::test]
    async fn facebook_only_signup_gets_a_random_password_and_fb_login_works() {
        let fixture = fixture();
        let response = fixture
            .api
            .signup(SignupRequest {
                email: "fb@example.com".to_string(),
                password: None,
                facebook_id: Some("fb-77".to_string()),
                referral: None,
            })
            .await
            .expect("signup");
        assert!(!response.token.is_empty());

        let login = fixture
            .api
            .login(LoginRequest {
                user: "fb@example.com".to_string(),
                password: None,
                facebook_id: Some("fb-77".to_string()),
            })
            .await
            .expect("fb login");
        assert!(!login.token.is_empty());
    }

    #[tokio::test]
    async fn signup_resolves_referral_codes_into_inviter() {
        let fixture = fixture();
        let inviter = signed_up(&fixture, "inviter@example.com", "secret1").await;
        let code = inviter.referral_code.clone().expect("code");

        fixture
            .api
            .signup(SignupRequest {
                email: "invited@example.com".to_string(),
                password: Some("secret1".to_string()),
                facebook_id: None,
                referral: Some(code.to_lowercase()),
            })
            .await
            .expect("signup");
        let invited = fixture
            .accounts
            .get_by_email("invited@example.com")
            .await
            .expect("get")
            .expect("account");
        assert_eq!(invited.inviter_account_id, Some(inviter.id));
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails_and_issues_no_session() {
        let fixture = fixture();
        signed_up(&fixture, "a@example.com", "secret1").await;
        let err = fixture
            .api
            .login(LoginRequest {
                user: "a@example.com".to_string(),
                password: Some("wrong-password".to_string()),
                facebook_id: None,
            })
            .await
            .expect_err("wrong password");
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn logout_destroys_every_session_of_the_account() {
        let fixture = fixture();
        let account = signed_up(&fixture, "a@example.com", "secret1").await;
        let second = fixture.sessions.issue(account.id).await.expect("issue");

        let response = fixture
            .api
            .logout(Some(&account))
            .await
            .expect("logout");
        assert_eq!(response.message, "Goodbye");
        assert!(fixture
            .sessions
            .resolve(&second)
            .await
            .expect("resolve")
            .is_none());

        let response = fixture.api.logout(None).await.expect("visitor logout");
        assert_eq!(response.message, "Not logged in");
    }

    #[tokio::test]
    async fn resetpassword_sets_recovery_state_and_queues_the_email() {
        let fixture = fixture();
        let account = signed_up(&fixture, "a@example.com", "secret1").await;

        fixture
            .api
            .resetpassword(ResetPasswordRequest {
                email: "a@example.com".to_string(),
            })
            .await
            .expect("reset");

        let stored = fixture
            .accounts
            .get_by_id(account.id)
            .await
            .expect("get")
            .expect("account");
        let hash = stored.recovery_hash.expect("recovery hash");
        assert_eq!(hash.len(), 64);
        assert!(stored.recovery_expires_at.expect("expiry") > Utc::now());

        let messages = fixture.outbox.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].recipient_email, "a@example.com");
        assert_eq!(messages[0].purpose, "recovery");
        assert!(messages[0].body.contains(&hash));

        let err = fixture
            .api
            .resetpassword(ResetPasswordRequest {
                email: "nobody@example.com".to_string(),
            })
            .await
            .expect_err("unknown");
        assert!(matches!(err, ApiError::IdentityNotFound));
    }

    #[tokio::test]
    async fn getemailby_requires_a_filter_and_reports_missing_matches_as_null() {
        let fixture = fixture();
        let err = fixture
            .api
            .getemailby(GetEmailByRequest { facebook_id: None })
            .await
            .expect_err("no filter");
        assert!(matches!(err, ApiError::EmptyParamValue(_)));

        let response = fixture
            .api
            .getemailby(GetEmailByRequest {
                facebook_id: Some("fb-1".to_string()),
            })
            .await
            .expect("lookup");
        assert_eq!(response.email, None);

        let account = signed_up(&fixture, "a@example.com", "secret1").await;
        fixture
            .accounts
            .update(
                account.id,
                &AccountUpdate {
                    facebook_id: Some("fb-1".to_string()),
                    ..AccountUpdate::default()
                },
            )
            .await
            .expect("bind fb id");
        let response = fixture
            .api
            .getemailby(GetEmailByRequest {
                facebook_id: Some("fb-1".to_string()),
            })
            .await
            .expect("lookup");
        assert_eq!(response.email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn updateprofile_rejects_visitors_and_inconsistent_facebook_fields() {
        let fixture = fixture();
        let err = fixture
            .api
            .updateprofile(None, UpdateProfileRequest::default())
            .await
            .expect_err("visitor");
        assert!(matches!(err, ApiError::NotAllowedForVisitors(_)));

        let account = signed_up(&fixture, "a@example.com", "secret1").await;
        let err = fixture
            .api
            .updateprofile(
                Some(&account),
                UpdateProfileRequest {
                    facebook_connected: Some(true),
                    ..UpdateProfileRequest::default()
                },
            )
            .await
            .expect_err("fb id missing");
        assert!(matches!(err, ApiError::InvalidParamsFormat(_)));
    }

    #[tokio::test]
    async fn updateprofile_applies_fields_and_validates_email_change() {
        let fixture = fixture();
        let account = signed_up(&fixture, "a@example.com", "secret1").await;
        signed_up(&fixture, "taken@example.com", "secret1").await;

        let err = fixture
            .api
            .updateprofile(
                Some(&account),
                UpdateProfileRequest {
                    email: Some("taken@example.com".to_string()),
                    ..UpdateProfileRequest::default()
                },
            )
            .await
            .expect_err("taken email");
        assert!(matches!(err, ApiError::UsernameTaken));

        fixture
            .api
            .updateprofile(
                Some(&account),
                UpdateProfileRequest {
                    name: Some("Alice".to_string()),
                    hometown: Some("Brno".to_string()),
                    date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1),
                    avatar: Some("https://cdn.example.com/a.png".to_string()),
                    email: Some("new@example.com".to_string()),
                    ..UpdateProfileRequest::default()
                },
            )
            .await
            .expect("update");

        let stored = fixture
            .accounts
            .get_by_id(account.id)
            .await
            .expect("get")
            .expect("account");
        assert_eq!(stored.email, "new@example.com");
        assert_eq!(stored.name.as_deref(), Some("Alice"));
        assert_eq!(stored.hometown.as_deref(), Some("Brno"));
        assert_eq!(
            stored.avatar_url.as_deref(),
            Some("https://cdn.example.com/a.png")
        );

        let err = fixture
            .api
            .updateprofile(
                Some(&account),
                UpdateProfileRequest {
                    avatar: Some("not-a-url".to_string()),
                    ..UpdateProfileRequest::default()
                },
            )
            .await
            .expect_err("bad avatar");
        assert!(matches!(err, ApiError::InvalidParamsFormat(_)));
    }

    #[tokio::test]
    async fn findprofile_returns_fields_and_device_notification_flag() {
        let fixture = fixture();
        let err = fixture
            .api
            .findprofile(None, FindProfileRequest::default())
            .await
            .expect_err("visitor");
        assert!(matches!(err, ApiError::NotAllowedForVisitors(_)));

        let account = signed_up(&fixture, "a@example.com", "secret1").await;
        fixture
            .api
            .updatedevice(
                Some(&account),
                UpdateDeviceRequest {
                    hash: "device-1".to_string(),
                    active: Some(false),
                    platform: Some("ios".to_string()),
                },
            )
            .await
            .expect("register device");

        let profile = fixture
            .api
            .findprofile(
                Some(&account),
                FindProfileRequest {
                    device_hash: Some("device-1".to_string()),
                },
            )
            .await
            .expect("profile");
        assert_eq!(profile.email, "a@example.com");
        assert_eq!(profile.notifications, Some(Some(false)));

        let profile = fixture
            .api
            .findprofile(
                Some(&account),
                FindProfileRequest {
                    device_hash: Some("unknown-device".to_string()),
                },
            )
            .await
            .expect("profile");
        assert_eq!(profile.notifications, Some(None));

        let profile = fixture
            .api
            .findprofile(Some(&account), FindProfileRequest::default())
            .await
            .expect("profile");
        assert_eq!(profile.notifications, None);
    }

    #[tokio::test]
    async fn updatedevice_upserts_a_single_record_per_hash() {
        let fixture = fixture();
        let account = signed_up(&fixture, "a@example.com", "secret1").await;

        fixture
            .api
            .updatedevice(
                Some(&account),
                UpdateDeviceRequest {
                    hash: "device-1".to_string(),
                    active: None,
                    platform: Some("android".to_string()),
                },
            )
            .await
            .expect("insert");
        fixture
            .api
            .updatedevice(
                Some(&account),
                UpdateDeviceRequest {
                    hash: "device-1".to_string(),
                    active: Some(false),
                    platform: Some("ios".to_string()),
                },
            )
            .await
            .expect("update");

        assert_eq!(fixture.devices.len(), 1);
        let device = fixture
            .devices
            .get_by_hash("device-1")
            .await
            .expect("get")
            .expect("device");
        assert!(!device.active);
        assert_eq!(device.is_apple, Some(true));
    }

    #[tokio::test]
    async fn setreferralcode_binds_the_inviter_and_rejects_self_invites() {
        let fixture = fixture();
        let inviter = signed_up(&fixture, "inviter@example.com", "secret1").await;
        let invited = signed_up(&fixture, "invited@example.com", "secret1").await;
        let code = inviter.referral_code.clone().expect("code");

        let err = fixture
            .api
            .setreferralcode(
                Some(&invited),
                SetReferralCodeRequest {
                    referral: "ZZZZZZZ".to_string(),
                },
            )
            .await
            .expect_err("unknown code");
        assert!(matches!(err, ApiError::ItemNotFound(_)));

        let err = fixture
            .api
            .setreferralcode(
                Some(&inviter),
                SetReferralCodeRequest {
                    referral: code.clone(),
                },
            )
            .await
            .expect_err("self invite");
        assert!(matches!(err, ApiError::InvalidParamsFormat(_)));

        fixture
            .api
            .setreferralcode(
                Some(&invited),
                SetReferralCodeRequest {
                    referral: code.to_lowercase(),
                },
            )
            .await
            .expect("bind inviter");
        let stored = fixture
            .accounts
            .get_by_id(invited.id)
            .await
            .expect("get")
            .expect("account");
        assert_eq!(stored.inviter_account_id, Some(inviter.id));
    }
}
