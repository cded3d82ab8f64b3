use crate::{
    auth::{self, AuthService},
    config::AppConfig,
    entities::{
        address,
        user::{self, Role},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::notifications::EmailSender,
};
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Identity service: OTP-gated registration, login, profile and saved
/// addresses, plus the startup admin seed.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    auth: AuthService,
    mailer: Arc<dyn EmailSender>,
    otp_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpInput {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, max = 6, message = "OTP must be 6 digits"))]
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResendOtpInput {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginInput {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address line is required"))]
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Pincode is required"))]
    pub pincode: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Public view of a user account
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserProfile {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            phone: user.phone,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Bearer token plus the profile it belongs to
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

fn generate_otp() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        auth: AuthService,
        mailer: Arc<dyn EmailSender>,
        otp_expiry_minutes: i64,
    ) -> Self {
        Self {
            db,
            event_sender,
            auth,
            mailer,
            otp_expiry_minutes,
        }
    }

    /// Registers a new account: hash the password, stash a 6-digit OTP and
    /// email it. The account stays unverified until the OTP is confirmed.
    #[instrument(skip(self, input))]
    pub async fn register(&self, input: RegisterInput) -> Result<UserProfile, ServiceError> {
        input.validate()?;
        if input.password != input.confirm_password {
            return Err(ServiceError::ValidationError(
                "Passwords do not match".to_string(),
            ));
        }

        let email = input.email.trim().to_lowercase();

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::ValidationError(
                "Email already registered".to_string(),
            ));
        }

        let otp = generate_otp();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            email: Set(email.clone()),
            password_hash: Set(auth::hash_password(&input.password)?),
            role: Set(Role::Customer),
            phone: Set(None),
            is_verified: Set(false),
            otp_code: Set(Some(otp.clone())),
            otp_expires_at: Set(Some(Utc::now() + Duration::minutes(self.otp_expiry_minutes))),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let user = user.insert(&*self.db).await?;

        self.send_otp_email(&user, &otp).await;

        self.event_sender
            .send_or_log(Event::UserRegistered(user.id))
            .await;

        info!("Registered user {} ({})", user.id, user.email);
        Ok(user.into())
    }

    /// Confirms the emailed OTP. Success marks the account verified,
    /// clears the OTP and returns a bearer token.
    #[instrument(skip(self, input))]
    pub async fn verify_otp(&self, input: VerifyOtpInput) -> Result<AuthResponse, ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".to_string()))?;

        if user.is_verified {
            return Err(ServiceError::ValidationError(
                "Account is already verified".to_string(),
            ));
        }

        let stored = user
            .otp_code
            .as_deref()
            .ok_or_else(|| ServiceError::ValidationError("No OTP pending".to_string()))?;

        let expired = user
            .otp_expires_at
            .map(|at| at < Utc::now())
            .unwrap_or(true);

        if expired {
            return Err(ServiceError::ValidationError(
                "OTP has expired, request a new one".to_string(),
            ));
        }
        if stored != input.otp.trim() {
            return Err(ServiceError::ValidationError("Invalid OTP".to_string()));
        }

        let user_id = user.id;
        let mut active: user::ActiveModel = user.into();
        active.is_verified = Set(true);
        active.otp_code = Set(None);
        active.otp_expires_at = Set(None);
        active.updated_at = Set(Utc::now());
        let user = active.update(&*self.db).await?;

        let welcome = format!(
            "<p>Hi {},</p><p>Welcome to StepOut! Your account is ready.</p>",
            user.name
        );
        if let Err(e) = self
            .mailer
            .send(&user.email, &user.name, "Welcome to StepOut", &welcome)
            .await
        {
            warn!("Welcome email failed for {}: {}", user.email, e);
        }

        self.event_sender
            .send_or_log(Event::UserVerified(user_id))
            .await;

        let token = self.auth.generate_token(&user)?;
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    /// Regenerates the OTP for an unverified account and emails it again.
    #[instrument(skip(self, input))]
    pub async fn resend_otp(&self, input: ResendOtpInput) -> Result<(), ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".to_string()))?;

        if user.is_verified {
            return Err(ServiceError::ValidationError(
                "Account is already verified".to_string(),
            ));
        }

        let otp = generate_otp();
        let mut active: user::ActiveModel = user.clone().into();
        active.otp_code = Set(Some(otp.clone()));
        active.otp_expires_at = Set(Some(Utc::now() + Duration::minutes(self.otp_expiry_minutes)));
        active.updated_at = Set(Utc::now());
        let user = active.update(&*self.db).await?;

        self.send_otp_email(&user, &otp).await;
        Ok(())
    }

    /// Password login. Unverified accounts are refused with 401.
    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthResponse, ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid email or password".to_string()))?;

        if !auth::verify_password(&input.password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }

        if !user.is_verified {
            return Err(ServiceError::Unauthorized(
                "Email not verified, complete OTP verification first".to_string(),
            ));
        }

        let token = self.auth.generate_token(&user)?;
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    /// Current profile.
    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, ServiceError> {
        let user = self.find_by_id(user_id).await?;
        Ok(user.into())
    }

    /// Updates name and/or phone.
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<UserProfile, ServiceError> {
        let user = self.find_by_id(user_id).await?;

        let mut active: user::ActiveModel = user.into();
        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "Name cannot be empty".to_string(),
                ));
            }
            active.name = Set(name.trim().to_string());
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        active.updated_at = Set(Utc::now());
        let user = active.update(&*self.db).await?;
        Ok(user.into())
    }

    /// Saves a new address for the user.
    #[instrument(skip(self, input))]
    pub async fn add_address(
        &self,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<address::Model, ServiceError> {
        input.validate()?;

        let addr = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            full_name: Set(input.full_name),
            phone: Set(input.phone),
            address_line_1: Set(input.address_line_1),
            address_line_2: Set(input.address_line_2),
            city: Set(input.city),
            state: Set(input.state),
            pincode: Set(input.pincode),
            is_default: Set(input.is_default),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        Ok(addr.insert(&*self.db).await?)
    }

    /// The user's saved addresses, newest first.
    #[instrument(skip(self))]
    pub async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<address::Model>, ServiceError> {
        Ok(address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Replaces an address owned by the user.
    #[instrument(skip(self, input))]
    pub async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        input: AddressInput,
    ) -> Result<address::Model, ServiceError> {
        input.validate()?;

        let addr = self.find_address(user_id, address_id).await?;

        let mut active: address::ActiveModel = addr.into();
        active.full_name = Set(input.full_name);
        active.phone = Set(input.phone);
        active.address_line_1 = Set(input.address_line_1);
        active.address_line_2 = Set(input.address_line_2);
        active.city = Set(input.city);
        active.state = Set(input.state);
        active.pincode = Set(input.pincode);
        active.is_default = Set(input.is_default);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Deletes exactly the address row with the given id, provided it
    /// belongs to the user.
    #[instrument(skip(self))]
    pub async fn delete_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        let addr = self.find_address(user_id, address_id).await?;
        addr.delete(&*self.db).await?;
        Ok(())
    }

    /// Admin listing of all accounts, newest first.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<UserProfile>, ServiceError> {
        Ok(user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(UserProfile::from)
            .collect())
    }

    /// Startup seed: when no admin account exists, create one from
    /// configuration. Without a configured password a random one is
    /// generated and logged once at warn level.
    #[instrument(skip(self, config))]
    pub async fn ensure_admin_account(&self, config: &AppConfig) -> Result<(), ServiceError> {
        let existing = user::Entity::find()
            .filter(user::Column::Role.eq(Role::Admin))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let email = config.admin_email.trim().to_lowercase();
        let password = match &config.admin_password {
            Some(p) => p.clone(),
            None => {
                let generated: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(16)
                    .map(char::from)
                    .collect();
                warn!(
                    "No admin password configured; seeded admin {} with generated password: {}",
                    email, generated
                );
                generated
            }
        };

        let admin = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Administrator".to_string()),
            email: Set(email.clone()),
            password_hash: Set(auth::hash_password(&password)?),
            role: Set(Role::Admin),
            phone: Set(None),
            is_verified: Set(true),
            otp_code: Set(None),
            otp_expires_at: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        admin.insert(&*self.db).await?;

        info!("Seeded admin account {}", email);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?)
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".to_string()))
    }

    async fn find_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<address::Model, ServiceError> {
        address::Entity::find_by_id(address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))
    }

    async fn send_otp_email(&self, user: &user::Model, otp: &str) {
        let body = format!(
            "<p>Hi {},</p><p>Your StepOut verification code is <b>{}</b>. \
             It expires in {} minutes.</p>",
            user.name, otp, self.otp_expiry_minutes
        );
        if let Err(e) = self
            .mailer
            .send(&user.email, &user.name, "Verify your StepOut account", &body)
            .await
        {
            warn!("OTP email failed for {}: {}", user.email, e);
        }
    }
}
