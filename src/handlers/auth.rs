use crate::handlers::common::{created_response, message_response, success_response, validate_input};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::users::{
        AddressInput, LoginInput, RegisterInput, ResendOtpInput, UpdateProfileInput,
        VerifyOtpInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use uuid::Uuid;

/// Creates the router for registration, login, profile and addresses
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/login", post(login))
        .route("/me", get(profile))
        .route("/me", put(update_profile))
        .route("/addresses", post(add_address))
        .route("/addresses", get(list_addresses))
        .route("/addresses/:id", put(update_address))
        .route("/addresses/:id", delete(delete_address))
        .route("/users", get(list_users))
}

/// Register a new account; an OTP is emailed for verification
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Account created, OTP sent"),
        (status = 400, description = "Duplicate email or invalid fields")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let profile = state.services.users.register(payload).await?;
    Ok(created_response(profile))
}

/// Confirm the emailed OTP; returns a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-otp",
    request_body = VerifyOtpInput,
    responses(
        (status = 200, description = "Account verified, token issued"),
        (status = 400, description = "Wrong or expired OTP")
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let auth = state.services.users.verify_otp(payload).await?;
    Ok(success_response(auth))
}

/// Re-send the OTP for an unverified account
async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<ResendOtpInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;
    state.services.users.resend_otp(payload).await?;
    Ok(message_response("OTP sent"))
}

/// Email + password login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Bad credentials or unverified account")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let auth = state.services.users.login(payload).await?;
    Ok(success_response(auth))
}

/// Current profile
async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let profile = state.services.users.profile(user.user_id).await?;
    Ok(success_response(profile))
}

/// Update name and/or phone
async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let profile = state
        .services
        .users
        .update_profile(user.user_id, payload)
        .await?;
    Ok(success_response(profile))
}

/// Save a new address
async fn add_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddressInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let address = state
        .services
        .users
        .add_address(user.user_id, payload)
        .await?;
    Ok(created_response(address))
}

/// The caller's saved addresses
async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let addresses = state.services.users.list_addresses(user.user_id).await?;
    Ok(success_response(addresses))
}

/// Replace an owned address
async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddressInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let address = state
        .services
        .users
        .update_address(user.user_id, id, payload)
        .await?;
    Ok(success_response(address))
}

/// Delete exactly the address row with the given id
#[utoipa::path(
    delete,
    path = "/api/v1/auth/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address id")),
    responses(
        (status = 200, description = "Address removed"),
        (status = 404, description = "No such address for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    state.services.users.delete_address(user.user_id, id).await?;
    Ok(message_response("Address removed"))
}

/// Admin: list every account
async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    user.ensure_admin()?;
    let users = state.services.users.list_users().await?;
    Ok(success_response(users))
}
