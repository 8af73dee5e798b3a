//! Stateless HTTP request builder and response parser for the todo API.
//!
//! # Design
//! `ApiClient` holds only a `base_url` and carries no mutable state between
//! calls. Each remote operation is split into a `build_*` method that produces
//! an `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! The session token is passed in explicitly to every authenticated build.

use serde::Serialize;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::session::AuthToken;
use crate::types::{Credentials, LoginResponse, NewTodo, Todo, TodoId, UpdateTodo};

/// Synchronous, stateless client for the todo API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_register(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/register", None, credentials)
    }

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/login", None, credentials)
    }

    pub fn build_list_todos(&self, token: &AuthToken) -> HttpRequest {
        self.bare_request(HttpMethod::Get, "/todos", token)
    }

    pub fn build_create_todo(&self, token: &AuthToken, input: &NewTodo) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/todos", Some(token), input)
    }

    pub fn build_update_todo(
        &self,
        token: &AuthToken,
        id: &TodoId,
        input: &UpdateTodo,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, &format!("/todos/{id}"), Some(token), input)
    }

    pub fn build_delete_todo(&self, token: &AuthToken, id: &TodoId) -> HttpRequest {
        self.bare_request(HttpMethod::Delete, &format!("/todos/{id}"), token)
    }

    pub fn parse_register(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, 201)
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<AuthToken, ApiError> {
        check_status(&response, 200)?;
        let login: LoginResponse =
            serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))?;
        AuthToken::new(login.token)
            .ok_or_else(|| ApiError::DeserializationError("login response carried an empty token".to_string()))
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        check_status(&response, 200)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }

    /// Any 2xx counts; the created item in the body is not used.
    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_success(&response)
    }

    pub fn parse_update_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_success(&response)
    }

    /// Only 204 No Content is a successful delete.
    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, 204)
    }

    /// The delete issued while completing an item accepts any 2xx.
    pub fn parse_completion_delete(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_success(&response)
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    fn bare_request(&self, method: HttpMethod, route: &str, token: &AuthToken) -> HttpRequest {
        HttpRequest {
            method,
            path: self.url(route),
            headers: vec![("authorization".to_string(), token.bearer())],
            body: None,
        }
    }

    fn json_request<B: Serialize>(
        &self,
        method: HttpMethod,
        route: &str,
        token: Option<&AuthToken>,
        input: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(token) = token {
            headers.push(("authorization".to_string(), token.bearer()));
        }
        Ok(HttpRequest {
            method,
            path: self.url(route),
            headers,
            body: Some(body),
        })
    }
}

/// Map anything but `expected` to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    Err(status_error(response))
}

fn check_success(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(status_error(response))
}

fn status_error(response: &HttpResponse) -> ApiError {
    match response.status {
        401 => ApiError::Unauthorized {
            body: response.body.clone(),
        },
        404 => ApiError::NotFound,
        status => ApiError::HttpError {
            status,
            body: response.body.clone(),
        },
    }
}
