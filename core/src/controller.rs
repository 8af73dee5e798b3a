//! The session/todo controller: one object that owns the token, issues every
//! remote call, and keeps the `View` in step with the server.
//!
//! # Design
//! Operations take `&self` and are `async`. They run on a single logical
//! thread, so state lives in `RefCell`s and no borrow is held across an
//! `.await`. Two user actions can still interleave at network boundaries,
//! which is what the in-flight registry guards against: a second call of an
//! operation that is already awaiting a response is rejected locally.
//!
//! Completing an item is two remote calls (mark complete, then delete). The
//! ledger records items whose delete failed so that phase can be retried on
//! its own with `retry_removal`.
//!
//! Each call remembers the token it was sent with. Once logout or a new login
//! replaces that token, the call's result no longer touches the list or the
//! ledger.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};

use crate::client::ApiClient;
use crate::error::{ApiError, ClientError};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::session::{AuthToken, Session};
use crate::types::{Credentials, NewTodo, TodoId, UpdateTodo};
use crate::view::{EditForm, Field, Screen, View};

const NOT_AUTHENTICATED: &str = "You are not authenticated. Please log in again.";
const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";

/// User-triggered operations, keyed for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    Login,
    ListTodos,
    CreateTodo,
    UpdateTodo(TodoId),
    CompleteTodo(TodoId),
    RetryRemoval(TodoId),
    DeleteTodo(TodoId),
}

/// Which submit button was pressed on the auth form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Register,
    Login,
}

/// Progress of the two-phase "complete" action for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    /// The mark-complete update is in flight.
    Completing,
    /// Marked complete and removed from the server.
    Deleted,
    /// Marked complete, but the delete failed. Retryable.
    CompletedNotDeleted,
}

#[derive(Debug, Default)]
struct InFlight {
    active: RefCell<HashSet<Operation>>,
}

impl InFlight {
    fn try_begin(&self, op: Operation) -> Option<InFlightGuard<'_>> {
        if self.active.borrow_mut().insert(op.clone()) {
            Some(InFlightGuard { registry: self, op })
        } else {
            None
        }
    }

    fn contains(&self, op: &Operation) -> bool {
        self.active.borrow().contains(op)
    }
}

/// Releases its operation key when dropped.
struct InFlightGuard<'a> {
    registry: &'a InFlight,
    op: Operation,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.active.borrow_mut().remove(&self.op);
    }
}

pub struct TodoController<T> {
    client: ApiClient,
    transport: T,
    session: RefCell<Session>,
    view: RefCell<View>,
    in_flight: InFlight,
    completions: RefCell<HashMap<TodoId, CompletionState>>,
}

impl<T: Transport> TodoController<T> {
    pub fn new(client: ApiClient, transport: T) -> Self {
        Self::with_session(client, transport, Session::new())
    }

    /// Starts on the todo screen when `session` already holds a token.
    pub fn with_session(client: ApiClient, transport: T, session: Session) -> Self {
        let screen = if session.is_authenticated() {
            Screen::Todos
        } else {
            Screen::Auth
        };
        Self {
            client,
            transport,
            session: RefCell::new(session),
            view: RefCell::new(View::new(screen)),
            in_flight: InFlight::default(),
            completions: RefCell::new(HashMap::new()),
        }
    }

    pub fn view(&self) -> Ref<'_, View> {
        self.view.borrow()
    }

    /// For the host to fill in form fields. Do not hold across an operation.
    pub fn view_mut(&self) -> RefMut<'_, View> {
        self.view.borrow_mut()
    }

    pub fn session(&self) -> Ref<'_, Session> {
        self.session.borrow()
    }

    pub fn completion_state(&self, id: &TodoId) -> Option<CompletionState> {
        self.completions.borrow().get(id).copied()
    }

    pub fn is_in_flight(&self, op: &Operation) -> bool {
        self.in_flight.contains(op)
    }

    /// Validates the auth form and dispatches to `register` or `login`.
    pub async fn submit_auth(&self, action: AuthAction) -> Result<(), ClientError> {
        let credentials = {
            let view = self.view.borrow();
            Credentials::new(view.auth_form.username.clone(), view.auth_form.password.clone())
        };
        if !credentials.is_complete() {
            return Err(self.invalid("Please enter both username and password."));
        }
        match action {
            AuthAction::Register => self.register(&credentials).await,
            AuthAction::Login => self.login(&credentials).await,
        }
    }

    /// Creates an account. Does not log in.
    pub async fn register(&self, credentials: &Credentials) -> Result<(), ClientError> {
        let _guard = self.begin(Operation::Register)?;
        let result = self
            .call(self.client.build_register(credentials), ApiClient::parse_register)
            .await;
        match result {
            Ok(()) => {
                tracing::info!(username = %credentials.username, "registered");
                let mut view = self.view.borrow_mut();
                view.info("Registration successful! Now please log in.");
                view.auth_form.clear();
                view.focus = Some(Field::Username);
                Ok(())
            }
            Err(err) => {
                let message = match err.server_message() {
                    Some(message) => format!("Error: {message}"),
                    None => "An error occurred while registering. Please try again.".to_string(),
                };
                Err(self.fail(err, message))
            }
        }
    }

    /// Stores the issued token, switches to the todo screen and loads the
    /// list. A failed initial load does not undo the login.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ClientError> {
        let _guard = self.begin(Operation::Login)?;
        let result = self
            .call(self.client.build_login(credentials), ApiClient::parse_login)
            .await;
        let token = match result {
            Ok(token) => token,
            Err(err) => {
                let reason = err
                    .server_message()
                    .unwrap_or_else(|| "an error occurred while logging in".to_string());
                return Err(self.fail(err, format!("Login failed: {reason}")));
            }
        };

        tracing::info!(username = %credentials.username, "logged in");
        self.session.borrow_mut().store(token.clone());
        self.completions.borrow_mut().clear();
        {
            let mut view = self.view.borrow_mut();
            view.show_todos();
            view.focus = None;
        }
        self.refresh_after(&token).await;
        Ok(())
    }

    /// Fetches the whole collection and re-renders it.
    pub async fn list_todos(&self) -> Result<(), ClientError> {
        let token = self.require_token("You must be logged in!")?;
        let _guard = self.begin(Operation::ListTodos)?;
        self.refresh(&token).await
    }

    /// Creates an item from the todo form.
    pub async fn submit_todo_form(&self) -> Result<(), ClientError> {
        let (title, description) = {
            let view = self.view.borrow();
            (view.todo_form.title.clone(), view.todo_form.description.clone())
        };
        self.create_todo(&title, &description).await
    }

    pub async fn create_todo(&self, title: &str, description: &str) -> Result<(), ClientError> {
        let token = self.require_token(NOT_AUTHENTICATED)?;
        let (title, description) = (title.trim(), description.trim());
        if title.is_empty() || description.is_empty() {
            return Err(self.invalid("Please enter a title and description."));
        }
        let _guard = self.begin(Operation::CreateTodo)?;

        let input = NewTodo {
            title: title.to_string(),
            description: description.to_string(),
        };
        let result = self
            .call(self.client.build_create_todo(&token, &input), ApiClient::parse_create_todo)
            .await;
        match result {
            Ok(()) => {
                {
                    let mut view = self.view.borrow_mut();
                    view.info("Todo added successfully!");
                    view.todo_form.clear();
                }
                self.refresh_after(&token).await;
                Ok(())
            }
            Err(err) => {
                let message = match &err {
                    ApiError::Transport(_) => "An error occurred while adding the todo.".to_string(),
                    _ => format!(
                        "Failed to add todo: {}",
                        err.server_message().unwrap_or_else(|| "Unknown error".to_string())
                    ),
                };
                Err(self.fail_authenticated(&token, err, message))
            }
        }
    }

    /// Marks the item complete, then deletes it.
    ///
    /// A failed first phase skips the delete and returns an error. A failed
    /// delete leaves the item completed on the server and returns
    /// `CompletedNotDeleted`; `retry_removal` reruns only the delete.
    pub async fn complete_todo(&self, id: &TodoId) -> Result<CompletionState, ClientError> {
        let token = self.require_token(NOT_AUTHENTICATED)?;
        let _guard = self.begin(Operation::CompleteTodo(id.clone()))?;

        tracing::debug!(%id, "marking todo complete");
        self.completions
            .borrow_mut()
            .insert(id.clone(), CompletionState::Completing);
        let marked = self
            .call(
                self.client
                    .build_update_todo(&token, id, &UpdateTodo::Complete { completed: true }),
                ApiClient::parse_update_todo,
            )
            .await;
        if let Err(err) = marked {
            self.completions.borrow_mut().remove(id);
            let message = match &err {
                ApiError::Transport(_) => "An error occurred.",
                _ => "Failed to update task.",
            };
            return Err(self.fail_authenticated(&token, err, message.to_string()));
        }

        self.view.borrow_mut().info("Task marked as complete!");
        Ok(self.remove_completed(&token, id).await)
    }

    /// Retries the delete phase for an item left `CompletedNotDeleted`.
    pub async fn retry_removal(&self, id: &TodoId) -> Result<CompletionState, ClientError> {
        let token = self.require_token(NOT_AUTHENTICATED)?;
        if self.completion_state(id) != Some(CompletionState::CompletedNotDeleted) {
            return Err(self.invalid("There is no pending removal for this task."));
        }
        let _guard = self.begin(Operation::RetryRemoval(id.clone()))?;
        Ok(self.remove_completed(&token, id).await)
    }

    /// Opens the edit form for an item currently on screen.
    pub fn begin_edit(&self, id: &TodoId) -> Result<(), ClientError> {
        let form = self.view.borrow().find(id).map(|todo| EditForm {
            id: todo.id.clone(),
            title: todo.title.clone(),
            description: todo.description.clone(),
        });
        let Some(form) = form else {
            return Err(self.invalid("Task not found."));
        };
        self.view.borrow_mut().edit = Some(form);
        Ok(())
    }

    pub fn cancel_edit(&self) {
        self.view.borrow_mut().edit = None;
    }

    /// Closes the edit form and sends it. Both fields are required; an empty
    /// one abandons the edit without a request.
    pub async fn submit_edit(&self) -> Result<(), ClientError> {
        let form = self.view.borrow_mut().edit.take();
        let Some(form) = form else {
            return Err(ClientError::Validation("no edit in progress".to_string()));
        };
        let (title, description) = (form.title.trim(), form.description.trim());
        if title.is_empty() || description.is_empty() {
            return Err(self.invalid("Both title and description are required!"));
        }
        self.update_todo(&form.id, title, description).await
    }

    /// Replaces title and description. Never touches `completed`.
    pub async fn update_todo(&self, id: &TodoId, title: &str, description: &str) -> Result<(), ClientError> {
        let token = self.require_token(NOT_AUTHENTICATED)?;
        let _guard = self.begin(Operation::UpdateTodo(id.clone()))?;

        let input = UpdateTodo::Edit {
            title: title.to_string(),
            description: description.to_string(),
        };
        let result = self
            .call(self.client.build_update_todo(&token, id, &input), ApiClient::parse_update_todo)
            .await;
        match result {
            Ok(()) => {
                self.view.borrow_mut().info("Task updated successfully!");
                self.refresh_after(&token).await;
                Ok(())
            }
            Err(err) => Err(self.fail_authenticated(&token, err, "Failed to update todo.".to_string())),
        }
    }

    /// Deletes an item. Only 204 counts as success.
    pub async fn delete_todo(&self, id: &TodoId) -> Result<(), ClientError> {
        let token = self.require_token(NOT_AUTHENTICATED)?;
        let _guard = self.begin(Operation::DeleteTodo(id.clone()))?;

        let result = self
            .call(Ok(self.client.build_delete_todo(&token, id)), ApiClient::parse_delete_todo)
            .await;
        match result {
            Ok(()) => {
                tracing::debug!(%id, "todo deleted");
                if self.is_current(&token) {
                    self.completions.borrow_mut().remove(id);
                }
                self.refresh_after(&token).await;
                Ok(())
            }
            Err(err) => Err(self.fail_authenticated(&token, err, "Failed to delete todo.".to_string())),
        }
    }

    /// Drops the token and returns to the auth form. No server call.
    pub fn logout(&self) {
        self.session.borrow_mut().clear();
        self.completions.borrow_mut().clear();
        let mut view = self.view.borrow_mut();
        view.show_auth();
        view.auth_form.clear();
        tracing::info!("logged out");
    }

    async fn remove_completed(&self, token: &AuthToken, id: &TodoId) -> CompletionState {
        let removed = self
            .call(Ok(self.client.build_delete_todo(token, id)), ApiClient::parse_completion_delete)
            .await;
        match removed {
            Ok(()) => {
                tracing::debug!(%id, "completed todo deleted");
                if self.is_current(token) {
                    self.completions.borrow_mut().remove(id);
                }
                self.refresh_after(token).await;
                CompletionState::Deleted
            }
            Err(err) => {
                if self.is_current(token) {
                    self.completions
                        .borrow_mut()
                        .insert(id.clone(), CompletionState::CompletedNotDeleted);
                }
                self.fail_authenticated(token, err, "Task completed, but failed to delete.".to_string());
                CompletionState::CompletedNotDeleted
            }
        }
    }

    async fn refresh(&self, token: &AuthToken) -> Result<(), ClientError> {
        let result = self
            .call(Ok(self.client.build_list_todos(token)), ApiClient::parse_list_todos)
            .await;
        match result {
            Ok(_) if !self.is_current(token) => {
                tracing::debug!("dropping todo list fetched for a previous session");
                Ok(())
            }
            Ok(todos) => {
                tracing::debug!(count = todos.len(), "rendering todos");
                self.view.borrow_mut().render_todos(todos);
                Ok(())
            }
            Err(err) => Err(self.fail_authenticated(token, err, "Failed to load todos.".to_string())),
        }
    }

    /// Refresh following a successful mutation; failures are already
    /// reported as notices.
    async fn refresh_after(&self, token: &AuthToken) {
        if !self.is_current(token) {
            tracing::debug!("session changed, skipping refresh");
            return;
        }
        if let Err(err) = self.refresh(token).await {
            tracing::debug!(error = %err, "refresh after mutation failed");
        }
    }

    async fn call<R>(
        &self,
        request: Result<HttpRequest, ApiError>,
        parse: fn(&ApiClient, HttpResponse) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let request = request?;
        tracing::debug!(method = request.method.as_str(), path = %request.path, "sending request");
        let response = self.transport.execute(request).await?;
        tracing::debug!(status = response.status, "received response");
        parse(&self.client, response)
    }

    fn begin(&self, op: Operation) -> Result<InFlightGuard<'_>, ClientError> {
        match self.in_flight.try_begin(op.clone()) {
            Some(guard) => Ok(guard),
            None => {
                tracing::debug!(?op, "ignoring duplicate request");
                Err(ClientError::InFlight(op))
            }
        }
    }

    fn require_token(&self, message: &str) -> Result<AuthToken, ClientError> {
        let token = self.session.borrow().token().cloned();
        token.ok_or_else(|| {
            tracing::warn!("{message}");
            self.view.borrow_mut().error(message);
            ClientError::NotAuthenticated
        })
    }

    fn invalid(&self, message: &str) -> ClientError {
        tracing::warn!("{message}");
        self.view.borrow_mut().error(message);
        ClientError::Validation(message.to_string())
    }

    fn fail(&self, err: ApiError, message: String) -> ClientError {
        tracing::error!(error = %err, "{message}");
        self.view.borrow_mut().error(message);
        ClientError::Remote(err)
    }

    /// Whether `token` is still the session's token. Results of calls made
    /// with any other token are not applied.
    fn is_current(&self, token: &AuthToken) -> bool {
        self.session.borrow().token() == Some(token)
    }

    /// Like `fail`, but a 401 for the token still in use ends the session.
    fn fail_authenticated(&self, token: &AuthToken, err: ApiError, message: String) -> ClientError {
        if !(err.is_unauthorized() && self.is_current(token)) {
            return self.fail(err, message);
        }
        tracing::warn!(error = %err, "session rejected by server");
        self.session.borrow_mut().clear();
        self.completions.borrow_mut().clear();
        let mut view = self.view.borrow_mut();
        view.show_auth();
        view.error(SESSION_EXPIRED);
        ClientError::Remote(err)
    }
}
