//! Authentication and session management.
//!
//! Sessions are HS256 JWTs. Three shapes exist: registered users (subject
//! is their user id, role claim from the stored profile), guests (all-zero
//! subject, `guest` claim, no database row), and no session at all. Role
//! is always read from the profile row at login time, never asserted by
//! the client; an admin access code is additionally required to obtain an
//! Admin session.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{profile, user};
use crate::entities::profile::Role;
use crate::errors::ServiceError;

/// Sentinel identity shared by all guest sessions. Guest orders carry this
/// id plus an explicit `is_guest` marker, so nothing ever treats it as a
/// real foreign key.
pub const GUEST_USER_ID: Uuid = Uuid::nil();

const RESET_TOKEN_LEN: usize = 48;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,            // Subject (user ID, or the guest sentinel)
    pub name: Option<String>,   // Display name
    pub email: Option<String>,  // User's email
    pub role: Option<Role>,     // Role from the profile; absent for guests
    pub guest: bool,            // Guest session marker
    pub jti: String,            // JWT ID (unique identifier for this token)
    pub iat: i64,               // Issued at time
    pub exp: i64,               // Expiration time
    pub iss: String,            // Issuer
    pub aud: String,            // Audience
}

/// Authenticated session data extracted from a validated token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_guest: bool,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    /// Admin predicate; guests and role-less sessions are never admins.
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication errors surfaced by token validation and the middleware
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token revoked")]
    RevokedToken,
    #[error("Guest sessions cannot perform this action")]
    GuestNotAllowed,
    #[error("Insufficient role")]
    InsufficientRole,
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "AUTH_MISSING"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "AUTH_INVALID_TOKEN"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN_EXPIRED"),
            AuthError::RevokedToken => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN_REVOKED"),
            AuthError::GuestNotAllowed => (StatusCode::FORBIDDEN, "AUTH_GUEST_NOT_ALLOWED"),
            AuthError::InsufficientRole => (StatusCode::FORBIDDEN, "AUTH_INSUFFICIENT_ROLE"),
            AuthError::TokenCreation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_INTERNAL_ERROR")
            }
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::GuestNotAllowed | AuthError::InsufficientRole => {
                ServiceError::Forbidden(err.to_string())
            }
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::AuthError(other.to_string()),
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_expiration: Duration,
    pub admin_access_code: String,
    pub require_email_confirmation: bool,
    pub reset_token_minutes: i64,
}

impl AuthConfig {
    pub fn from_app_config(cfg: &crate::config::AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            issuer: cfg.auth_issuer.clone(),
            audience: cfg.auth_audience.clone(),
            token_expiration: Duration::from_secs(cfg.jwt_expiration),
            admin_access_code: cfg.admin_access_code.clone(),
            require_email_confirmation: cfg.require_email_confirmation,
            reset_token_minutes: cfg.reset_token_minutes,
        }
    }
}

/// Token blacklist entry
#[derive(Clone, Debug)]
struct BlacklistedToken {
    jti: String,
    expiry: chrono::DateTime<Utc>,
}

/// Issued token bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Registration payload
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(equal = 10, message = "Phone number must be 10 digits"))]
    pub phone: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Role,
    pub roll_number: Option<String>,
    /// Required when registering with the Admin role
    pub admin_code: Option<String>,
}

/// Login payload; `identifier` is an email address or a roll number
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Identifier is required"))]
    pub identifier: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub admin_code: Option<String>,
}

/// Registered identity as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub roll_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterOutcome {
    pub user_id: Uuid,
    pub needs_email_confirmation: bool,
    pub user: Option<SessionUser>,
    pub token: Option<TokenResponse>,
}

#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    pub user: SessionUser,
    pub token: TokenResponse,
}

/// Authentication service that handles credentials and token lifecycle
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    db: Arc<DatabaseConnection>,
    blacklisted_tokens: Arc<RwLock<Vec<BlacklistedToken>>>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self {
            config,
            db,
            blacklisted_tokens: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Registers a new identity and its profile in one transaction.
    ///
    /// When email confirmation is required the account is created
    /// unconfirmed and no token is issued; the caller learns this through
    /// `needs_email_confirmation`.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterOutcome, ServiceError> {
        request.validate()?;

        if request.role == Role::Admin
            && request.admin_code.as_deref() != Some(self.config.admin_access_code.as_str())
        {
            return Err(ServiceError::AuthError("Invalid admin code".to_string()));
        }

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(request.email.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let confirmed_at = if self.config.require_email_confirmation {
            None
        } else {
            Some(now)
        };

        let txn = self.db.begin().await?;

        let user_row = user::ActiveModel {
            id: Set(user_id),
            email: Set(request.email.clone()),
            password_hash: Set(self.hash_password(&request.password)?),
            active: Set(true),
            email_confirmed_at: Set(confirmed_at),
            created_at: Set(now),
            updated_at: Set(now),
        };
        user_row.insert(&txn).await?;

        let profile_row = profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            full_name: Set(request.full_name.clone()),
            phone: Set(request.phone.clone()),
            role: Set(request.role),
            roll_number: Set(request.roll_number.clone()),
            photo_url: Set(None),
            date_of_birth: Set(None),
            year_of_study: Set(None),
            branch: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let profile_model = profile_row.insert(&txn).await?;

        txn.commit().await?;

        info!("Registered user {} ({})", user_id, request.email);

        let session_user = SessionUser {
            id: user_id,
            full_name: profile_model.full_name,
            email: request.email,
            phone: profile_model.phone,
            role: profile_model.role,
            roll_number: profile_model.roll_number,
        };

        if self.config.require_email_confirmation {
            Ok(RegisterOutcome {
                user_id,
                needs_email_confirmation: true,
                user: None,
                token: None,
            })
        } else {
            let token = self.issue_token(&session_user)?;
            Ok(RegisterOutcome {
                user_id,
                needs_email_confirmation: false,
                user: Some(session_user),
                token: Some(token),
            })
        }
    }

    /// Authenticates a registered identity.
    ///
    /// The role comes from the stored profile. When an admin code is
    /// supplied, both the code and the Admin role must check out or the
    /// attempt fails outright without issuing a token.
    #[instrument(skip(self, request), fields(identifier = %request.identifier))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, ServiceError> {
        request.validate()?;

        let user_model = self.find_user_by_identifier(&request.identifier).await?;
        let user_model =
            user_model.ok_or_else(|| ServiceError::AuthError("Invalid credentials".to_string()))?;

        if !self.verify_password(&request.password, &user_model.password_hash) {
            return Err(ServiceError::AuthError("Invalid credentials".to_string()));
        }

        if !user_model.active {
            return Err(ServiceError::AuthError("Account is disabled".to_string()));
        }

        if self.config.require_email_confirmation && user_model.email_confirmed_at.is_none() {
            return Err(ServiceError::AuthError(
                "Email address has not been confirmed".to_string(),
            ));
        }

        let profile_model = profile::Entity::find()
            .filter(profile::Column::UserId.eq(user_model.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("Profile missing for user {}", user_model.id))
            })?;

        if let Some(code) = request.admin_code.as_deref() {
            if code != self.config.admin_access_code || profile_model.role != Role::Admin {
                warn!(
                    "Admin login rejected for user {}: bad code or role",
                    user_model.id
                );
                return Err(ServiceError::AuthError(
                    "Invalid admin credentials".to_string(),
                ));
            }
        }

        let session_user = SessionUser {
            id: user_model.id,
            full_name: profile_model.full_name,
            email: user_model.email,
            phone: profile_model.phone,
            role: profile_model.role,
            roll_number: profile_model.roll_number,
        };
        let token = self.issue_token(&session_user)?;

        info!("User {} logged in", session_user.id);
        Ok(LoginOutcome {
            user: session_user,
            token,
        })
    }

    /// Issues a guest session token. No database access.
    pub fn login_as_guest(&self) -> Result<TokenResponse, ServiceError> {
        let claims = self.base_claims(GUEST_USER_ID.to_string(), Some("Guest".to_string()), None);
        let claims = Claims {
            guest: true,
            ..claims
        };
        self.encode_claims(&claims)
    }

    /// Revokes the presented token by blacklisting its `jti`.
    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        let claims = self.validate_token(token).await?;

        let expiry = Utc::now() + ChronoDuration::seconds(claims.exp - Utc::now().timestamp());
        let mut blacklist = self.blacklisted_tokens.write().await;
        blacklist.push(BlacklistedToken {
            jti: claims.jti,
            expiry,
        });

        let now = Utc::now();
        blacklist.retain(|t| t.expiry > now);
        Ok(())
    }

    /// Validate a JWT token and extract the claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_token_blacklisted(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Starts a password reset. Always reports success so callers cannot
    /// probe which emails have accounts; the token itself goes to the
    /// delivery channel (logged here, mailed by an external notifier).
    #[instrument(skip(self))]
    pub async fn reset_password(&self, email: &str) -> Result<(), ServiceError> {
        let user_model = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?;

        let Some(user_model) = user_model else {
            info!("Password reset requested for unknown email");
            return Ok(());
        };

        let token: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RESET_TOKEN_LEN)
            .map(char::from)
            .collect();
        let now = Utc::now();

        let row = crate::entities::password_reset_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_model.id),
            token: Set(token.clone()),
            expires_at: Set(now + ChronoDuration::minutes(self.config.reset_token_minutes)),
            used: Set(false),
            created_at: Set(now),
        };
        row.insert(&*self.db).await?;

        info!(
            "Password reset token issued for user {}: {}",
            user_model.id, token
        );
        Ok(())
    }

    /// Completes a password reset with a previously issued token.
    #[instrument(skip(self, token, new_password))]
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        if new_password.len() < 6 {
            return Err(ServiceError::ValidationError(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        use crate::entities::password_reset_token as reset;

        let txn = self.db.begin().await?;

        let row = reset::Entity::find()
            .filter(reset::Column::Token.eq(token))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::AuthError("Invalid reset token".to_string()))?;

        if row.used || row.expires_at < Utc::now() {
            return Err(ServiceError::AuthError(
                "Reset token is expired or already used".to_string(),
            ));
        }

        let user_model = user::Entity::find_by_id(row.user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", row.user_id)))?;

        let mut user_active: user::ActiveModel = user_model.into();
        user_active.password_hash = Set(self.hash_password(new_password)?);
        user_active.updated_at = Set(Utc::now());
        user_active.update(&txn).await?;

        let mut token_active: reset::ActiveModel = row.into();
        token_active.used = Set(true);
        token_active.update(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Turn validated claims into the request-scoped session identity
    pub fn auth_user_from_claims(&self, claims: Claims) -> Result<AuthUser, AuthError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthUser {
            user_id,
            name: claims.name,
            email: claims.email,
            role: claims.role,
            is_guest: claims.guest,
            token_id: claims.jti,
        })
    }

    fn issue_token(&self, user: &SessionUser) -> Result<TokenResponse, ServiceError> {
        let claims = self.base_claims(
            user.id.to_string(),
            Some(user.full_name.clone()),
            Some(user.email.clone()),
        );
        let claims = Claims {
            role: Some(user.role),
            ..claims
        };
        self.encode_claims(&claims)
    }

    fn base_claims(&self, sub: String, name: Option<String>, email: Option<String>) -> Claims {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::seconds(self.config.token_expiration.as_secs().min(i64::MAX as u64)
                as i64);
        Claims {
            sub,
            name,
            email,
            role: None,
            guest: false,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        }
    }

    fn encode_claims(&self, claims: &Claims) -> Result<TokenResponse, ServiceError> {
        let access_token = encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::from(AuthError::TokenCreation(e.to_string())))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_expiration.as_secs() as i64,
        })
    }

    async fn find_user_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<user::Model>, ServiceError> {
        let by_email = user::Entity::find()
            .filter(user::Column::Email.eq(identifier))
            .one(&*self.db)
            .await?;
        if by_email.is_some() {
            return Ok(by_email);
        }

        // Roll numbers double as login identifiers for students
        let by_roll = profile::Entity::find()
            .filter(profile::Column::RollNumber.eq(identifier))
            .one(&*self.db)
            .await?;
        match by_roll {
            Some(p) => Ok(user::Entity::find_by_id(p.user_id).one(&*self.db).await?),
            None => Ok(None),
        }
    }

    async fn is_token_blacklisted(&self, token_id: &str) -> bool {
        let blacklist = self.blacklisted_tokens.read().await;
        blacklist.iter().any(|t| t.jti == token_id)
    }

    fn hash_password(&self, password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::HashError(e.to_string()))
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

/// Authentication middleware that validates the bearer token and stores
/// the resulting AuthUser in the request extensions
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let headers = request.headers().clone();

    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    match extract_auth_from_headers(&headers, &auth_service).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Rejects guest sessions; the route needs a registered identity
pub async fn registered_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AuthError::MissingAuth)?;

    if user.is_guest {
        return Err(AuthError::GuestNotAllowed);
    }

    Ok(next.run(request).await)
}

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<Role>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_role(required_role) {
        return Err(AuthError::InsufficientRole);
    }

    Ok(next.run(request).await)
}

async fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_value) = auth_header.to_str() {
            if auth_value.starts_with("Bearer ") {
                let token = auth_value.trim_start_matches("Bearer ").trim();
                let claims = auth_service.validate_token(token).await?;
                return auth_service.auth_user_from_claims(claims);
            }
        }
    }

    Err(AuthError::MissingAuth)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    /// Any valid session, guest included
    fn with_auth(self) -> Self;
    /// Registered identities only
    fn with_user(self) -> Self;
    /// Registered identities holding the given role
    fn with_role(self, role: Role) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_user(self) -> Self {
        self.layer(axum::middleware::from_fn(registered_middleware))
            .with_auth()
    }

    fn with_role(self, role: Role) -> Self {
        self.layer(axum::middleware::from_fn_with_state(role, role_middleware))
            .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> AuthService {
        let config = AuthConfig {
            jwt_secret: "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            issuer: "canteen-api".to_string(),
            audience: "canteen-clients".to_string(),
            token_expiration: Duration::from_secs(3600),
            admin_access_code: "ADMIN123".to_string(),
            require_email_confirmation: false,
            reset_token_minutes: 30,
        };
        // The connection is only touched by database-backed flows; token
        // tests never reach it.
        let db = Arc::new(DatabaseConnection::Disconnected);
        AuthService::new(config, db)
    }

    fn session_user(role: Role) -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            full_name: "Jane Teacher".to_string(),
            email: "teacher@college.edu".to_string(),
            phone: "9876543211".to_string(),
            role,
            roll_number: None,
        }
    }

    #[tokio::test]
    async fn issued_token_round_trips() {
        let service = test_service();
        let user = session_user(Role::Teacher);
        let token = service.issue_token(&user).expect("token issued");

        let claims = service
            .validate_token(&token.access_token)
            .await
            .expect("token validates");
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, Some(Role::Teacher));
        assert!(!claims.guest);

        let auth_user = service.auth_user_from_claims(claims).expect("claims map");
        assert!(!auth_user.is_admin());
        assert!(auth_user.has_role(Role::Teacher));
    }

    #[tokio::test]
    async fn guest_token_has_sentinel_and_no_role() {
        let service = test_service();
        let token = service.login_as_guest().expect("guest token issued");

        let claims = service
            .validate_token(&token.access_token)
            .await
            .expect("token validates");
        assert!(claims.guest);
        assert_eq!(claims.sub, GUEST_USER_ID.to_string());

        let auth_user = service.auth_user_from_claims(claims).expect("claims map");
        assert!(auth_user.is_guest);
        assert_eq!(auth_user.user_id, GUEST_USER_ID);
        assert!(!auth_user.is_admin());
    }

    #[tokio::test]
    async fn admin_predicate_follows_role() {
        let service = test_service();
        let admin = session_user(Role::Admin);
        let token = service.issue_token(&admin).expect("token issued");
        let claims = service
            .validate_token(&token.access_token)
            .await
            .expect("token validates");
        let auth_user = service.auth_user_from_claims(claims).expect("claims map");
        assert!(auth_user.is_admin());
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let service = test_service();
        let user = session_user(Role::Student);
        let token = service.issue_token(&user).expect("token issued");

        service
            .logout(&token.access_token)
            .await
            .expect("logout succeeds");

        let err = service
            .validate_token(&token.access_token)
            .await
            .expect_err("revoked token must fail");
        assert!(matches!(err, AuthError::RevokedToken));
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let service = test_service();
        let err = service
            .validate_token("not-a-token")
            .await
            .expect_err("must fail");
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn password_hash_round_trip() {
        let service = test_service();
        let hash = service.hash_password("secret123").expect("hashing works");
        assert!(service.verify_password("secret123", &hash));
        assert!(!service.verify_password("wrong", &hash));
    }

    #[test]
    fn register_request_validation() {
        let bad = RegisterRequest {
            full_name: "".to_string(),
            email: "not-an-email".to_string(),
            phone: "123".to_string(),
            password: "short".to_string(),
            role: Role::Student,
            roll_number: None,
            admin_code: None,
        };
        assert!(bad.validate().is_err());

        let good = RegisterRequest {
            full_name: "John Student".to_string(),
            email: "student@college.edu".to_string(),
            phone: "9876543210".to_string(),
            password: "student123".to_string(),
            role: Role::Student,
            roll_number: Some("CS-2021-042".to_string()),
            admin_code: None,
        };
        assert!(good.validate().is_ok());
    }
}
