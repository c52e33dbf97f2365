//! Phone-number onboarding: request a code, verify it, then sign up or log in.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::extract::ApiJson;
use super::AppContext;
use crate::domain::user::{hash_password, User, UserFilter, UserType, UserView};
use crate::error::ApiError;

const INVALID_OTP: &str = "Invalid or expired OTP. Please request a new OTP.";

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/request-otp", post(request_otp))
        .route("/api/auth/verify-otp", post(verify_otp))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/check-phone/:phone_number", get(check_phone))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OtpPurpose {
    #[default]
    Signup,
    Login,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OtpRequest {
    phone_number: String,
    #[serde(default)]
    purpose: OtpPurpose,
}

#[derive(Debug, Serialize)]
pub(crate) struct OtpIssued {
    message: &'static str,
    phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    otp: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct OtpCheck {
    phone_number: String,
    #[validate(length(min = 4, max = 6))]
    otp: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OtpVerified {
    verified: bool,
    message: &'static str,
    token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SignupRequest {
    phone_number: String,
    #[validate(length(min = 2))]
    full_name: String,
    #[serde(default)]
    is_real_estate_agent: bool,
    terms_accepted: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignupResponse {
    message: &'static str,
    user_id: String,
    phone_number: String,
    full_name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    message: &'static str,
    user: UserView,
}

#[derive(Debug, Serialize)]
pub(crate) struct PhoneCheck {
    exists: bool,
    phone_number: String,
}

/// Numbers must carry a country code, e.g. `+918881675561`.
fn normalize_phone(raw: &str) -> Result<String, ApiError> {
    let phone = raw.trim();
    if !phone.starts_with('+') || phone.len() < 10 {
        return Err(ApiError::bad_request(
            "Invalid phone number format. Please include country code (e.g., +918881675561)",
        ));
    }
    Ok(phone.to_string())
}

async fn find_by_phone(context: &AppContext, phone: &str) -> Result<Option<User>, ApiError> {
    Ok(context
        .stores
        .users
        .find_one(&UserFilter::by_phone(phone))
        .await?)
}

pub(crate) async fn request_otp(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<OtpRequest>,
) -> Result<ApiJson<OtpIssued>, ApiError> {
    let phone = normalize_phone(&payload.phone_number)?;
    let registered = find_by_phone(&context, &phone).await?.is_some();
    match payload.purpose {
        OtpPurpose::Signup if registered => {
            return Err(ApiError::bad_request(
                "User with this phone number already exists",
            ))
        }
        OtpPurpose::Login if !registered => return Err(ApiError::not_found("User not found")),
        _ => {}
    }

    let code = context.otp.request(&phone).await?;
    Ok(ApiJson(OtpIssued {
        message: "OTP sent successfully",
        phone_number: phone,
        otp: context.expose_otp.then_some(code),
    }))
}

pub(crate) async fn verify_otp(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<OtpCheck>,
) -> Result<ApiJson<OtpVerified>, ApiError> {
    payload.validate()?;
    let phone = payload.phone_number.trim();
    if !context.otp.verify(phone, payload.otp.trim()).await? {
        return Err(ApiError::bad_request(INVALID_OTP));
    }
    Ok(ApiJson(OtpVerified {
        verified: true,
        message: "OTP verified successfully. You can now complete your signup.",
        token: None,
    }))
}

pub(crate) async fn signup(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<(StatusCode, ApiJson<SignupResponse>), ApiError> {
    payload.validate()?;
    let phone = payload.phone_number.trim().to_string();

    if !context.otp.is_verified(&phone).await? {
        return Err(ApiError::bad_request(
            "Phone number not verified. Please verify OTP first.",
        ));
    }
    if find_by_phone(&context, &phone).await?.is_some() {
        return Err(ApiError::bad_request(
            "User with this phone number already exists",
        ));
    }
    if !payload.terms_accepted {
        return Err(ApiError::bad_request(
            "You must accept the Terms & Conditions and Privacy Policy to continue",
        ));
    }

    let user = User {
        id: ObjectId::new(),
        name: payload.full_name.clone(),
        email: format!("{phone}@temp.huntproperty.com"),
        phone: phone.clone(),
        user_type: if payload.is_real_estate_agent {
            UserType::Agent
        } else {
            UserType::Buyer
        },
        // Placeholder credential until the user sets a password.
        password: hash_password(&phone),
        subscription_plan_id: None,
        created_at: Utc::now(),
    };
    let user = context.stores.users.insert(user).await?;
    context.otp.clear(&phone).await?;
    info!(user_id = %user.id, "account created via otp signup");

    Ok((
        StatusCode::CREATED,
        ApiJson(SignupResponse {
            message: "Account created successfully",
            user_id: user.id.to_hex(),
            phone_number: phone,
            full_name: payload.full_name,
        }),
    ))
}

pub(crate) async fn login(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<OtpCheck>,
) -> Result<ApiJson<LoginResponse>, ApiError> {
    payload.validate()?;
    let phone = payload.phone_number.trim();
    let user = find_by_phone(&context, phone)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let verified = context.otp.is_verified(phone).await?
        || context.otp.verify(phone, payload.otp.trim()).await?;
    if !verified {
        return Err(ApiError::bad_request(INVALID_OTP));
    }
    context.otp.clear(phone).await?;
    info!(user_id = %user.id, "user logged in");

    Ok(ApiJson(LoginResponse {
        message: "Login successful",
        user: user.view(),
    }))
}

pub(crate) async fn check_phone(
    State(context): State<AppContext>,
    Path(phone_number): Path<String>,
) -> Result<ApiJson<PhoneCheck>, ApiError> {
    let exists = find_by_phone(&context, phone_number.trim()).await?.is_some();
    Ok(ApiJson(PhoneCheck {
        exists,
        phone_number,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers_need_country_code() {
        assert!(normalize_phone("9876543210").is_err());
        assert!(normalize_phone("+91123").is_err());
        assert_eq!(
            normalize_phone("  +919876543210 ").expect("valid"),
            "+919876543210"
        );
    }
}
