//! Request gateway: authorized API calls that survive one token expiry

use crate::session::SessionClient;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use upsell_http::ClientError;
use upsell_http::client::Method;

/// A backend call that can be rebuilt for the retry
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Wraps every outbound API call with the session's bearer token
///
/// A 401 triggers one shared refresh and exactly one retry. Other failures
/// are mapped and returned untouched.
#[derive(Clone, Debug)]
pub struct RequestGateway {
    session: SessionClient,
}

impl RequestGateway {
    pub fn new(session: SessionClient) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionClient {
        &self.session
    }

    /// Send a request and parse the response as `T`
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let sent_with = self.session.access_token();

        let message = match self.execute(&request, sent_with.as_deref()).await {
            Err(ClientError::AuthenticationFailed(message)) => message,
            other => return other,
        };

        if !self.session.has_refresh_token() {
            debug!(path = %request.path, "401 without a stored refresh token");
            return Err(ClientError::AuthenticationFailed(message));
        }

        // A sibling request may already have rotated the token we sent
        let current = self.session.access_token();
        let fresh = match current {
            Some(current) if sent_with.as_ref() != Some(&current) => {
                debug!(path = %request.path, "Token rotated since request was sent, retrying");
                current
            }
            _ => match self.session.refresh_shared().await {
                Ok(token) => token,
                Err(err) => {
                    warn!(path = %request.path, "Session expired: {err}");
                    return Err(ClientError::SessionExpired);
                }
            },
        };

        match self.execute(&request, Some(&fresh)).await {
            Err(ClientError::AuthenticationFailed(message)) => {
                warn!(path = %request.path, "Request rejected again after refresh");
                Err(ClientError::AuthenticationFailed(message))
            }
            other => other,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiRequest::delete(path)).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<T, ClientError> {
        let api = self.session.api();
        let mut builder = api.authorized(request.method.clone(), &request.path, token);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let result = api.execute(builder).await;
        if let Err(err) = &result {
            match err {
                ClientError::AuthenticationFailed(_) => {
                    debug!(method = %request.method, path = %request.path, "Unauthorized");
                }
                _ => warn!(method = %request.method, path = %request.path, "Request failed: {err}"),
            }
        }
        result
    }
}
