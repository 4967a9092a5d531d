use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::serde::json::Json;
use rocket::{Route, State, post, routes};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::flow::{self, SignupRequest};
use crate::auth::{SessionUser, User};
use crate::clients::MailService;
use crate::env::AppConfig;
use crate::validation::JsonValidateExt;

use super::ApiResult;
use super::response::ApiResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[serde(default)]
    #[validate(email(message = "must be a valid email address"))]
    email: String,
}

#[derive(Serialize)]
pub struct SendOtpData {
    #[serde(skip_serializing_if = "Option::is_none")]
    otp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    token: String,
    expires_at: i64,
    user: User,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    old_password: String,
    #[serde(default)]
    new_password: String,
    #[serde(default)]
    confirm_new_password: String,
}

#[post("/auth/sendotp", data = "<request>")]
pub async fn send_otp(
    request: Json<SendOtpRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    mailer: &State<MailService>,
) -> ApiResult<SendOtpData> {
    let request = request.validate_custom()?;
    let email = request.email.trim();

    let otp = flow::request_otp(db.inner(), config.inner(), mailer.inner().as_ref(), email).await?;

    let data = SendOtpData {
        otp: config.expose_otp.then_some(otp.code),
    };

    Ok(ApiResponse::ok("OTP sent successfully", data))
}

#[post("/auth/signup", data = "<request>")]
pub async fn signup(
    request: Json<SignupRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<User> {
    let user = flow::signup(db.inner(), config.inner(), &request).await?;
    Ok(ApiResponse::ok("User registered successfully", user))
}

#[post("/auth/login", data = "<request>")]
pub async fn login(
    request: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<LoginData> {
    let (user, issued) = flow::login(db.inner(), config.inner(), &request.email, &request.password).await?;

    let cookie = Cookie::build(("token", issued.token.clone()))
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(rocket::time::Duration::hours(config.token_ttl_hours));
    cookies.add(cookie);

    Ok(ApiResponse::ok(
        "User logged in successfully",
        LoginData {
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        },
    ))
}

#[post("/auth/changepassword", data = "<request>")]
pub async fn change_password(
    user: SessionUser,
    request: Json<ChangePasswordRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    mailer: &State<MailService>,
) -> ApiResult<()> {
    flow::change_password(
        db.inner(),
        config.inner(),
        mailer.inner().as_ref(),
        &user.id,
        &request.old_password,
        &request.new_password,
        &request.confirm_new_password,
    )
    .await?;

    Ok(ApiResponse::message("Password changed successfully"))
}

pub fn routes() -> Vec<Route> {
    routes![send_otp, signup, login, change_password]
}
