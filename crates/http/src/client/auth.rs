//! Auth service client methods

use super::{ApiClient, ClientError, Method};
use crate::types::{Credentials, LogoutRequest, RefreshRequest, TokenResponse, VerifyResponse};

impl ApiClient {
    /// Exchange email and password for a token pair
    ///
    /// Any non-2xx answer becomes [`ClientError::LoginFailed`]; transport
    /// failures stay [`ClientError::Network`].
    pub async fn password_grant(
        &self,
        credentials: &Credentials,
    ) -> Result<TokenResponse, ClientError> {
        let request = self
            .request(Method::POST, "/token")
            .query(&[("grant_type", "password")])
            .json(credentials);

        self.execute(request).await.map_err(|err| match err {
            ClientError::AuthenticationFailed(message) | ClientError::Http { message, .. } => {
                ClientError::LoginFailed(message)
            }
            other => other,
        })
    }

    /// Mint a new token pair from a refresh token
    pub async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse, ClientError> {
        let request = self
            .request(Method::POST, "/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            });

        self.execute(request).await.map_err(|err| match err {
            ClientError::AuthenticationFailed(message) | ClientError::Http { message, .. } => {
                ClientError::RefreshFailed(message)
            }
            other => other,
        })
    }

    /// Ask the auth service whether an access token is still accepted
    pub async fn verify(&self, access_token: &str) -> Result<bool, ClientError> {
        let request = self.authorized(Method::GET, "/verify", Some(access_token));
        match self.execute::<VerifyResponse>(request).await {
            Ok(response) => Ok(response.valid),
            Err(ClientError::AuthenticationFailed(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Invalidate a refresh token server side
    ///
    /// The response body is ignored; only transport failures are reported.
    pub async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .authorized(Method::POST, "/logout", access_token)
            .json(&LogoutRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            debug!("Logout answered with status {}", response.status());
        }
        Ok(())
    }
}
