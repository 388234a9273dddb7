use crate::{
    config::IdentityConfig,
    error::*,
    models::*,
    otp::{OtpChallenge, OtpRejection},
    password::{hash_password, verify_password},
    repository::UserRepository,
    token::{TokenClaims, TokenService},
};
use chrono::{Duration, Utc};
use email_service::CodeSender;
use logger_redacted::mask_email;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    sender: Arc<dyn CodeSender>,
    tokens: TokenService,
    config: IdentityConfig,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sender: Arc<dyn CodeSender>,
        config: IdentityConfig,
    ) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl_hours);
        Self {
            users,
            sender,
            tokens,
            config,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a user, or refresh a pending unverified registration.
    /// The account stays inactive until the emailed code is verified.
    ///
    /// # Errors
    ///
    /// `Validation` for missing fields or a self-assigned admin role,
    /// `UserAlreadyExists` when a verified account owns the email.
    #[instrument(skip(self, request), fields(email = %mask_email(&request.email)))]
    pub async fn register(&self, request: RegisterRequest) -> Result<Uuid> {
        let name = request.name.trim();
        let email = request.email.trim().to_lowercase();
        if name.is_empty() || email.is_empty() || request.password.is_empty() {
            return Err(IdentityError::Validation(
                "Please provide name, email and password".into(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(IdentityError::Validation("Invalid email format".into()));
        }
        self.validate_password(&request.password)?;

        let role = request.role.unwrap_or(Role::Patient);
        if role == Role::Admin {
            return Err(IdentityError::Validation(
                "Admin accounts cannot be self-registered".into(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();
        let (challenge, code) = OtpChallenge::issue(OtpPurpose::Registration, self.otp_ttl(), now);

        let user = match self.users.find_by_email(&email).await? {
            Some(existing) if existing.is_verified => {
                return Err(IdentityError::UserAlreadyExists);
            }
            Some(mut pending) => {
                pending.name = name.to_string();
                pending.phone = request.phone;
                pending.password_hash = password_hash;
                pending.role = role;
                pending.otp = Some(challenge);
                pending.updated_at = now;
                self.users.update_user(&pending).await?
            }
            None => {
                let user = User {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    email,
                    phone: request.phone,
                    password_hash,
                    role,
                    is_active: false,
                    is_verified: false,
                    otp: Some(challenge),
                    created_at: now,
                    updated_at: now,
                };
                self.users.create_user(&user).await?
            }
        };

        self.deliver_code(&user.email, &code, OtpPurpose::Registration).await;
        info!(user_id = %user.id, role = %user.role, "Registration pending verification");
        Ok(user.id)
    }

    /// Activate an account with its registration code and sign it in
    ///
    /// # Errors
    ///
    /// `UserNotFound`, `OtpPurposeMismatch` or `InvalidOtp`.
    #[instrument(skip(self, code))]
    pub async fn verify_registration_otp(&self, user_id: Uuid, code: &str) -> Result<AuthSession> {
        if code.trim().is_empty() {
            return Err(IdentityError::Validation("User ID and OTP are required".into()));
        }
        let mut user = self.require_user(user_id).await?;
        Self::check_otp(&user, code, OtpPurpose::Registration)?;

        user.is_active = true;
        user.is_verified = true;
        user.otp = None;
        user.updated_at = Utc::now();
        let user = self.users.update_user(&user).await?;

        info!(user_id = %user.id, "Account verified");
        self.session_for(&user)
    }

    /// Issue a password reset code to a verified account
    ///
    /// # Errors
    ///
    /// `UserNotFound` when no verified account owns the email.
    #[instrument(skip(self, email), fields(email = %mask_email(email)))]
    pub async fn forgot_password(&self, email: &str) -> Result<Uuid> {
        if email.trim().is_empty() {
            return Err(IdentityError::Validation("Email is required".into()));
        }
        let mut user = match self.users.find_by_email(email).await? {
            Some(user) if user.is_verified => user,
            _ => return Err(IdentityError::UserNotFound),
        };

        let (challenge, code) =
            OtpChallenge::issue(OtpPurpose::PasswordReset, self.otp_ttl(), Utc::now());
        user.otp = Some(challenge);
        user.updated_at = Utc::now();
        let user = self.users.update_user(&user).await?;

        self.deliver_code(&user.email, &code, OtpPurpose::PasswordReset).await;
        Ok(user.id)
    }

    /// Replace the password using a reset code
    ///
    /// # Errors
    ///
    /// `Validation` for a weak password, `UserNotFound`, `OtpPurposeMismatch`
    /// or `InvalidOtp`.
    #[instrument(skip(self, code, new_password))]
    pub async fn reset_password(&self, user_id: Uuid, code: &str, new_password: &str) -> Result<()> {
        if code.trim().is_empty() || new_password.is_empty() {
            return Err(IdentityError::Validation(
                "User ID, OTP and new password are required".into(),
            ));
        }
        self.validate_password(new_password)?;

        let mut user = self.require_user(user_id).await?;
        Self::check_otp(&user, code, OtpPurpose::PasswordReset)?;

        user.password_hash = hash_password(new_password)?;
        user.otp = None;
        user.updated_at = Utc::now();
        self.users.update_user(&user).await?;

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// # Errors
    ///
    /// `Validation` for missing fields, `AccountNotVerified` for unknown or
    /// inactive accounts, `InvalidCredentials` for a wrong password.
    #[instrument(skip(self, request), fields(email = %mask_email(&request.email)))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(IdentityError::Validation(
                "Please provide email and password".into(),
            ));
        }

        let user = match self.users.find_by_email(&request.email).await? {
            Some(user) if user.is_active => user,
            _ => return Err(IdentityError::AccountNotVerified),
        };

        if let Err(err) = verify_password(&request.password, &user.password_hash) {
            warn!(user_id = %user.id, "Login rejected");
            return Err(err);
        }

        info!(user_id = %user.id, role = %user.role, "User logged in");
        self.session_for(&user)
    }

    /// # Errors
    ///
    /// `UserNotFound` if the account no longer exists.
    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile> {
        Ok(self.require_user(user_id).await?.profile())
    }

    /// Validate a bearer token and return its claims
    ///
    /// # Errors
    ///
    /// `InvalidToken` for malformed, forged or expired tokens.
    pub fn authenticate(&self, token: &str) -> Result<TokenClaims> {
        self.tokens.validate(token)
    }

    /// Create the configured admin account when it does not exist yet
    ///
    /// # Errors
    ///
    /// Propagates storage and hashing errors.
    pub async fn ensure_admin(&self, name: &str, email: &str, password: &str) -> Result<Uuid> {
        if let Some(existing) = self.users.find_by_email(email).await? {
            return Ok(existing.id);
        }
        let now = Utc::now();
        let admin = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.trim().to_lowercase(),
            phone: None,
            password_hash: hash_password(password)?,
            role: Role::Admin,
            is_active: true,
            is_verified: true,
            otp: None,
            created_at: now,
            updated_at: now,
        };
        let admin = self.users.create_user(&admin).await?;
        info!(user_id = %admin.id, "Bootstrap admin created");
        Ok(admin.id)
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(IdentityError::UserNotFound)
    }

    fn check_otp(user: &User, code: &str, purpose: OtpPurpose) -> Result<()> {
        let challenge = user.otp.as_ref().ok_or(IdentityError::InvalidOtp)?;
        challenge
            .verify(code, purpose, Utc::now())
            .map_err(|rejection| match rejection {
                OtpRejection::WrongPurpose => IdentityError::OtpPurposeMismatch,
                OtpRejection::Mismatch | OtpRejection::Expired => IdentityError::InvalidOtp,
            })
    }

    fn session_for(&self, user: &User) -> Result<AuthSession> {
        let (token, expires_at) = self.tokens.issue(user.id, user.role)?;
        Ok(AuthSession {
            token,
            expires_at,
            user: user.profile(),
        })
    }

    /// Delivery failures are logged; the code stays valid and can be re-requested.
    async fn deliver_code(&self, email: &str, code: &str, purpose: OtpPurpose) {
        if let Err(err) = self.sender.send_code(email, code, purpose.into()).await {
            warn!(
                recipient = %mask_email(email),
                purpose = purpose.as_str(),
                error = %err,
                "Failed to deliver verification code"
            );
        }
    }

    fn otp_ttl(&self) -> Duration {
        Duration::minutes(self.config.otp_ttl_minutes)
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.config.password_min_length {
            return Err(IdentityError::Validation(format!(
                "Password must be at least {} characters",
                self.config.password_min_length
            )));
        }
        Ok(())
    }
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}
