//! Sign-in endpoints.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use shopfront_core::{Email, LoginRequest, LoginResponse, User};
use tracing::{info, instrument};

use super::{ApiClient, AuthMode};
use crate::error::ApiError;

impl ApiClient {
    /// Sign in with email and password.
    ///
    /// On success the returned token is stored in the session, which
    /// broadcasts `LoggedIn`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Api` with the server's message on bad credentials,
    /// or an error if the request fails or the token cannot be stored.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<User, ApiError> {
        let body = LoginRequest {
            email,
            password: password.expose_secret(),
        };
        let builder = self
            .request(Method::POST, "auth/login", &[], AuthMode::Anonymous)?
            .json(&body);
        let response: LoginResponse = self.send(builder, AuthMode::Anonymous).await?;

        self.inner
            .session
            .sign_in(SecretString::from(response.token))?;
        info!(user_id = %response.user.id, "Login succeeded");
        Ok(response.user)
    }

    /// Sign out locally. Returns `false` if no one was signed in.
    pub fn logout(&self) -> bool {
        self.inner.session.sign_out()
    }

    /// Fetch the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` if signed out, or
    /// `ApiError::Unauthorized` if the backend no longer accepts the token.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.authed(Method::GET, "auth/me").await
    }
}
