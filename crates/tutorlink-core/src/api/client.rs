//! API client for the tutoring marketplace REST API.
//!
//! `ApiClient` wraps a `Gateway` with typed calls for the `/auth/...`
//! endpoints and keeps the credential store in step with them. Other
//! endpoints are reached through the generic JSON helpers.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};

use super::gateway::{Gateway, GatewayOptions, RefreshError, SessionEvent};
use super::request::ApiRequest;
use super::ApiError;
use crate::auth::CredentialStore;
use crate::models::{
    AuthResponse, LoginRequest, LogoutRequest, RegisterRequest, ResendVerificationRequest,
    StudentProfile, TeacherProfile, User, VerifyEmailResponse,
};

// ============================================================================
// Endpoints
// ============================================================================

const LOGIN_PATH: &str = "/auth/login/";
const REGISTER_PATH: &str = "/auth/register/";
const LOGOUT_PATH: &str = "/auth/logout/";
const RESEND_VERIFICATION_PATH: &str = "/auth/resend-verification/";
const PROFILE_PATH: &str = "/auth/profile/";
const STUDENT_PROFILE_PATH: &str = "/auth/profile/student/";
const TEACHER_PROFILE_PATH: &str = "/auth/profile/teacher/";

/// API client for the marketplace backend.
/// Clone is cheap - the gateway shares its connection pool and store.
#[derive(Clone)]
pub struct ApiClient {
    gateway: Gateway,
}

impl ApiClient {
    pub fn new(options: GatewayOptions, store: Arc<CredentialStore>) -> Result<Self, ApiError> {
        Ok(Self::from_gateway(Gateway::new(options, store)?))
    }

    pub fn from_gateway(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        self.gateway.store()
    }

    // ===== Session =====

    /// Sign in with email and password and install the returned session.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ApiError::InvalidRequest("Email and password required".to_string()));
        }

        let request = ApiRequest::post(LOGIN_PATH).json(&LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        })?;
        let auth: AuthResponse = self.gateway.send_public_json(&request).await?;
        self.install(auth)
    }

    /// Create an account. The backend signs the new user in immediately.
    pub async fn register(&self, registration: &RegisterRequest) -> Result<User, ApiError> {
        let request = ApiRequest::post(REGISTER_PATH).json(registration)?;
        let auth: AuthResponse = self.gateway.send_public_json(&request).await?;
        self.install(auth)
    }

    /// Confirm an email address from the link sent at registration.
    ///
    /// Returns the user when the backend also issued a session.
    pub async fn verify_email(&self, uidb64: &str, token: &str) -> Result<Option<User>, ApiError> {
        let path = format!("/auth/verify-email/{}/{}/", uidb64, token);
        let response: VerifyEmailResponse = self.gateway.send_public_json(&ApiRequest::get(path)).await?;

        match (response.user, response.tokens) {
            (Some(user), Some(tokens)) => {
                self.store()
                    .set_auth(user.clone(), tokens)
                    .map_err(ApiError::Storage)?;
                info!(user_id = user.id, role = %user.role, "Email verified, signed in");
                self.gateway.notify(SessionEvent::LoggedIn);
                Ok(Some(user))
            }
            _ => Ok(None),
        }
    }

    pub async fn resend_verification(&self, email: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(RESEND_VERIFICATION_PATH).json(&ResendVerificationRequest {
            email: email.trim().to_string(),
        })?;
        self.gateway.send_public(&request).await?;
        Ok(())
    }

    /// Renew the access token now. Failure leaves the session in place.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        self.gateway.refresh().await.map(|_| ())
    }

    /// Revoke the refresh token server-side and clear the local session.
    ///
    /// The local session is cleared even if the server call fails; that
    /// failure is only logged.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Some(refresh) = self.store().refresh_token() {
            let request = ApiRequest::post(LOGOUT_PATH).json(&LogoutRequest {
                refresh_token: &refresh,
            })?;
            if let Err(e) = self.gateway.send(&request).await {
                warn!(error = %e, "Server-side logout failed, clearing local session anyway");
            }
        }

        self.store().logout().map_err(ApiError::Storage)?;
        info!("Signed out");
        self.gateway.notify(SessionEvent::LoggedOut);
        Ok(())
    }

    fn install(&self, auth: AuthResponse) -> Result<User, ApiError> {
        let user = auth.user;
        self.store()
            .set_auth(user.clone(), auth.tokens)
            .map_err(ApiError::Storage)?;
        info!(user_id = user.id, role = %user.role, "Signed in");
        self.gateway.notify(SessionEvent::LoggedIn);
        Ok(user)
    }

    // ===== Profile =====

    /// Fetch the current user's profile and refresh the stored snapshot.
    pub async fn profile(&self) -> Result<User, ApiError> {
        let user: User = self.get(PROFILE_PATH).await?;
        self.store()
            .set_user(user.clone())
            .map_err(ApiError::Storage)?;
        Ok(user)
    }

    /// Apply a partial update, then re-read the full profile.
    pub async fn update_profile(&self, changes: &serde_json::Value) -> Result<User, ApiError> {
        let _: serde_json::Value = self.patch(PROFILE_PATH, changes).await?;
        self.profile().await
    }

    pub async fn student_profile(&self) -> Result<StudentProfile, ApiError> {
        self.get(STUDENT_PROFILE_PATH).await
    }

    pub async fn update_student_profile(&self, changes: &serde_json::Value) -> Result<StudentProfile, ApiError> {
        self.patch(STUDENT_PROFILE_PATH, changes).await
    }

    pub async fn teacher_profile(&self) -> Result<TeacherProfile, ApiError> {
        self.get(TEACHER_PROFILE_PATH).await
    }

    pub async fn update_teacher_profile(&self, changes: &serde_json::Value) -> Result<TeacherProfile, ApiError> {
        self.patch(TEACHER_PROFILE_PATH, changes).await
    }

    // ===== Generic authenticated calls =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.gateway.send_json(&ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.gateway.send_json(&ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.gateway.send_json(&ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.gateway.send_json(&ApiRequest::patch(path).json(body)?).await
    }

    /// DELETE ignores any response body.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.gateway.send(&ApiRequest::delete(path)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthTokens, Role};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_json() -> serde_json::Value {
        serde_json::json!({
            "id": 1,
            "email": "a@b.com",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "full_name": "Ada Lovelace",
            "role": "STUDENT",
            "is_email_verified": true
        })
    }

    fn client(server: &MockServer) -> ApiClient {
        let options = GatewayOptions {
            base_url: server.uri(),
            ..GatewayOptions::default()
        };
        ApiClient::new(options, Arc::new(CredentialStore::in_memory())).expect("client")
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(body_json(serde_json::json!({"email": "a@b.com", "password": "x"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Login successful",
                "user": user_json(),
                "tokens": {"access": "A1", "refresh": "R1"}
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_login_installs_session() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        let api = client(&server);
        let mut events = api.gateway().subscribe();
        let user = api.login("a@b.com", "x").await.expect("login");

        assert_eq!(user.id, 1);
        assert_eq!(user.role, Role::Student);
        assert!(api.store().is_authenticated());
        assert_eq!(api.store().access_token().as_deref(), Some("A1"));
        assert!(!api.store().is_loading());
        assert_eq!(events.try_recv().expect("event"), SessionEvent::LoggedIn);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_login_rejects_empty_input() {
        let server = MockServer::start().await;
        let api = client(&server);
        let err = api.login("  ", "x").await.expect_err("empty email");
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert!(server.received_requests().await.expect("recording").is_empty());
    }

    #[tokio::test]
    async fn test_bad_credentials_do_not_touch_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"non_field_errors":["Invalid credentials"]}"#))
            .mount(&server)
            .await;

        let api = client(&server);
        let err = api.login("a@b.com", "wrong").await.expect_err("bad credentials");
        assert!(matches!(err, ApiError::BadRequest(ref body) if body.contains("Invalid credentials")));
        assert!(!api.store().is_authenticated());
    }

    #[tokio::test]
    async fn test_register_installs_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REGISTER_PATH))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "message": "User registered successfully",
                "user": user_json(),
                "tokens": {"access": "A1", "refresh": "R1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        let registration = RegisterRequest {
            email: "a@b.com".to_string(),
            password: "pw".to_string(),
            password_confirm: "pw".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role: Role::Student,
            phone_number: None,
            date_of_birth: None,
        };
        api.register(&registration).await.expect("register");

        assert_eq!(api.store().tokens(), Some(AuthTokens::new("A1", "R1")));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_verify_email_signs_in_when_tokens_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/verify-email/MQ/abc-123/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Email verified",
                "user": user_json(),
                "tokens": {"access": "A1", "refresh": "R1"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/verify-email/Mg/stale/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Email already verified"
            })))
            .mount(&server)
            .await;

        let api = client(&server);
        assert!(api.verify_email("Mg", "stale").await.expect("verify").is_none());
        assert!(!api.store().is_authenticated());

        let user = api.verify_email("MQ", "abc-123").await.expect("verify");
        assert_eq!(user.map(|u| u.id), Some(1));
        assert!(api.store().is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_revokes_and_clears() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path(LOGOUT_PATH))
            .and(header("authorization", "Bearer A1"))
            .and(body_json(serde_json::json!({"refresh_token": "R1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "Logout successful"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        api.login("a@b.com", "x").await.expect("login");
        api.logout().await.expect("logout");

        let snapshot = api.store().snapshot();
        assert!(!snapshot.is_authenticated());
        assert!(snapshot.user.is_none());
        assert!(snapshot.tokens.is_none());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path(LOGOUT_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "Token is blacklisted"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        api.login("a@b.com", "x").await.expect("login");
        api.logout().await.expect("logout");
        assert!(!api.store().is_authenticated());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_login_then_refresh_scenario() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/courses/sessions/"))
            .and(header("authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .and(body_json(serde_json::json!({"refresh": "R1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "A2"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/courses/sessions/"))
            .and(header("authorization", "Bearer A2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 7}])))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        api.login("a@b.com", "x").await.expect("login");
        let sessions: Vec<serde_json::Value> = api.get("/courses/sessions/").await.expect("sessions");

        assert_eq!(sessions[0]["id"], 7);
        let tokens = api.store().tokens().expect("tokens");
        assert_eq!(tokens.access, "A2");
        assert_eq!(tokens.refresh, "R1");
        server.verify().await;
    }

    #[tokio::test]
    async fn test_profile_updates_snapshot() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        let mut updated = user_json();
        updated["bio"] = serde_json::json!("Loves algebra");
        Mock::given(method("PATCH"))
            .and(path(PROFILE_PATH))
            .and(body_json(serde_json::json!({"bio": "Loves algebra"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"bio": "Loves algebra"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(updated))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        api.login("a@b.com", "x").await.expect("login");
        let user = api
            .update_profile(&serde_json::json!({"bio": "Loves algebra"}))
            .await
            .expect("update");

        assert_eq!(user.bio.as_deref(), Some("Loves algebra"));
        assert_eq!(api.store().user().and_then(|u| u.bio), Some("Loves algebra".to_string()));
        // Tokens untouched by a profile update
        assert_eq!(api.store().access_token().as_deref(), Some("A1"));
        server.verify().await;
    }
}
