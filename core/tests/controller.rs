//! Controller behaviour against a scripted in-memory transport.
//!
//! # Design
//! `ScriptedTransport` answers requests from a queue and records what was
//! sent, so each test can assert both the requests issued and the resulting
//! session/view state. A response is taken from the queue when its request is
//! sent and yields before resolving, which lets `tokio::join!` interleave two
//! operations the way two clicks would. `reply_late` holds its response back
//! for several turns so another operation can finish first.

use std::cell::RefCell;
use std::collections::VecDeque;

use todo_client_core::view::Field;
use todo_client_core::{
    ApiClient, AuthAction, AuthToken, ClientError, CompletionState, Credentials, HttpMethod, HttpRequest,
    HttpResponse, NoticeLevel, Operation, Screen, Session, TodoController, TodoId, Transport,
    TransportError,
};

const BASE_URL: &str = "http://localhost:3000";
const LATE_YIELDS: usize = 8;
const ONE_TODO: &str = r#"[{"id":1,"title":"Buy milk","description":"2 litres","completed":false}]"#;

type Scripted = (usize, Result<HttpResponse, TransportError>);

#[derive(Default)]
struct ScriptedTransport {
    responses: RefCell<VecDeque<Scripted>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn reply(&self, status: u16, body: &str) -> &Self {
        self.responses
            .borrow_mut()
            .push_back((1, Ok(HttpResponse::new(status, body))));
        self
    }

    fn reply_late(&self, status: u16, body: &str) -> &Self {
        self.responses
            .borrow_mut()
            .push_back((LATE_YIELDS, Ok(HttpResponse::new(status, body))));
        self
    }

    fn fail(&self, reason: &str) -> &Self {
        self.responses
            .borrow_mut()
            .push_back((1, Err(TransportError(reason.to_string()))));
        self
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    fn sent(&self) -> Vec<(HttpMethod, String)> {
        self.requests
            .borrow()
            .iter()
            .map(|r| (r.method, r.path.trim_start_matches(BASE_URL).to_string()))
            .collect()
    }
}

impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (yields, response) = self
            .responses
            .borrow_mut()
            .pop_front()
            .expect("no scripted response left");
        self.requests.borrow_mut().push(request);
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }
        response
    }
}

fn anonymous(transport: &ScriptedTransport) -> TodoController<&ScriptedTransport> {
    TodoController::new(ApiClient::new(BASE_URL), transport)
}

fn signed_in(transport: &ScriptedTransport) -> TodoController<&ScriptedTransport> {
    let session = Session::with_token(AuthToken::new("abc123").unwrap());
    TodoController::with_session(ApiClient::new(BASE_URL), transport, session)
}

fn last_notice<T: Transport>(controller: &TodoController<T>) -> (NoticeLevel, String) {
    let view = controller.view();
    let notice = view.notices().last().expect("expected a notice");
    (notice.level, notice.message.clone())
}

fn fill_auth_form<T: Transport>(controller: &TodoController<T>, username: &str, password: &str) {
    let mut view = controller.view_mut();
    view.auth_form.username = username.to_string();
    view.auth_form.password = password.to_string();
}

// --- auth form ---

#[tokio::test]
async fn empty_auth_field_never_sends() {
    let transport = ScriptedTransport::default();
    let controller = anonymous(&transport);

    fill_auth_form(&controller, "alice", "");
    let err = controller.submit_auth(AuthAction::Login).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    fill_auth_form(&controller, "", "pw");
    let err = controller.submit_auth(AuthAction::Register).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    assert!(transport.requests().is_empty());
    assert_eq!(
        last_notice(&controller),
        (NoticeLevel::Error, "Please enter both username and password.".to_string())
    );
}

#[tokio::test]
async fn register_clears_form_and_stays_logged_out() {
    let transport = ScriptedTransport::default();
    transport.reply(201, r#"{"message":"User registered successfully"}"#);
    let controller = anonymous(&transport);

    fill_auth_form(&controller, "alice", "pw");
    controller.submit_auth(AuthAction::Register).await.unwrap();

    assert_eq!(transport.sent(), vec![(HttpMethod::Post, "/register".to_string())]);
    assert!(!controller.session().is_authenticated());
    let view = controller.view();
    assert_eq!(view.screen, Screen::Auth);
    assert!(view.auth_form.username.is_empty());
    assert!(view.auth_form.password.is_empty());
    assert_eq!(view.focus, Some(Field::Username));
}

#[tokio::test]
async fn register_failure_shows_server_message() {
    let transport = ScriptedTransport::default();
    transport.reply(409, r#"{"message":"Username already exists"}"#);
    let controller = anonymous(&transport);

    fill_auth_form(&controller, "alice", "pw");
    let err = controller.submit_auth(AuthAction::Register).await.unwrap_err();

    assert!(matches!(err, ClientError::Remote(_)));
    assert_eq!(
        last_notice(&controller),
        (NoticeLevel::Error, "Error: Username already exists".to_string())
    );
    assert_eq!(controller.view().auth_form.username, "alice");
}

#[tokio::test]
async fn register_transport_failure_is_generic() {
    let transport = ScriptedTransport::default();
    transport.fail("connection refused");
    let controller = anonymous(&transport);

    fill_auth_form(&controller, "alice", "pw");
    controller.submit_auth(AuthAction::Register).await.unwrap_err();

    assert_eq!(
        last_notice(&controller).1,
        "An error occurred while registering. Please try again."
    );
}

// --- login / logout ---

#[tokio::test]
async fn login_stores_token_and_loads_list() {
    let transport = ScriptedTransport::default();
    transport.reply(200, r#"{"token":"abc123"}"#).reply(200, ONE_TODO);
    let controller = anonymous(&transport);

    fill_auth_form(&controller, "alice", "pw");
    controller.submit_auth(AuthAction::Login).await.unwrap();

    assert_eq!(
        controller.session().set_cookie().as_deref(),
        Some("authToken=abc123; Path=/; Secure")
    );
    assert_eq!(controller.view().screen, Screen::Todos);
    assert_eq!(controller.view().todos().len(), 1);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, HttpMethod::Get);
    assert_eq!(requests[1].path, "http://localhost:3000/todos");
    assert_eq!(requests[1].header("authorization"), Some("Bearer abc123"));
}

#[tokio::test]
async fn login_failure_stores_nothing() {
    let transport = ScriptedTransport::default();
    transport.reply(401, r#"{"message":"Invalid credentials"}"#);
    let controller = anonymous(&transport);

    fill_auth_form(&controller, "alice", "nope");
    controller.submit_auth(AuthAction::Login).await.unwrap_err();

    assert!(!controller.session().is_authenticated());
    assert_eq!(controller.view().screen, Screen::Auth);
    assert_eq!(
        last_notice(&controller),
        (NoticeLevel::Error, "Login failed: Invalid credentials".to_string())
    );
}

#[tokio::test]
async fn login_survives_failed_initial_load() {
    let transport = ScriptedTransport::default();
    transport.reply(200, r#"{"token":"abc123"}"#).fail("reset");
    let controller = anonymous(&transport);

    fill_auth_form(&controller, "alice", "pw");
    controller.submit_auth(AuthAction::Login).await.unwrap();

    assert!(controller.session().is_authenticated());
    assert_eq!(controller.view().screen, Screen::Todos);
    assert_eq!(last_notice(&controller).1, "Failed to load todos.");
}

#[tokio::test]
async fn logout_makes_list_abort_locally() {
    let transport = ScriptedTransport::default();
    transport.reply(200, ONE_TODO);
    let controller = signed_in(&transport);
    controller.list_todos().await.unwrap();

    fill_auth_form(&controller, "alice", "pw");
    controller.logout();

    assert!(!controller.session().is_authenticated());
    assert_eq!(controller.view().screen, Screen::Auth);
    assert!(controller.view().auth_form.username.is_empty());
    assert!(controller.view().todos().is_empty());

    let err = controller.list_todos().await.unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(last_notice(&controller).1, "You must be logged in!");
}

#[tokio::test]
async fn expired_token_returns_to_login() {
    let transport = ScriptedTransport::default();
    transport.reply(401, r#"{"message":"Unauthorized"}"#);
    let controller = signed_in(&transport);

    controller.list_todos().await.unwrap_err();

    assert!(!controller.session().is_authenticated());
    assert_eq!(controller.view().screen, Screen::Auth);
    assert_eq!(
        last_notice(&controller).1,
        "Your session has expired. Please log in again."
    );
}

#[tokio::test]
async fn list_arriving_after_logout_is_not_rendered() {
    let transport = ScriptedTransport::default();
    transport.reply(200, ONE_TODO);
    let controller = signed_in(&transport);

    let (listed, ()) = tokio::join!(controller.list_todos(), async { controller.logout() });

    listed.unwrap();
    assert_eq!(controller.view().screen, Screen::Auth);
    assert!(controller.view().todos().is_empty());
    assert!(!controller.session().is_authenticated());
}

#[tokio::test]
async fn failed_removal_after_logout_leaves_no_ledger_entry() {
    let transport = ScriptedTransport::default();
    transport
        .reply(200, r#"{"id":1,"completed":true}"#)
        .reply(500, r#"{"message":"boom"}"#);
    let controller = signed_in(&transport);
    let id = TodoId::Number(1);

    let (outcome, ()) = tokio::join!(controller.complete_todo(&id), async { controller.logout() });

    assert_eq!(outcome.unwrap(), CompletionState::CompletedNotDeleted);
    assert_eq!(controller.completion_state(&id), None);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn late_rejection_of_old_token_keeps_new_session() {
    let transport = ScriptedTransport::default();
    transport
        .reply_late(401, r#"{"message":"Unauthorized"}"#)
        .reply(200, r#"{"token":"second"}"#)
        .reply(200, ONE_TODO);
    let controller = signed_in(&transport);

    let (deleted, logged_in) = tokio::join!(controller.delete_todo(&TodoId::Number(1)), async {
        controller.logout();
        controller.login(&Credentials::new("bob", "pw")).await
    });

    logged_in.unwrap();
    assert!(matches!(deleted, Err(ClientError::Remote(_))));
    assert_eq!(controller.session().token().unwrap().as_str(), "second");
    assert_eq!(controller.view().screen, Screen::Todos);
    assert_eq!(controller.view().todos().len(), 1);
    assert!(controller
        .view()
        .notices()
        .iter()
        .all(|notice| notice.message != "Your session has expired. Please log in again."));
}

// --- create / edit ---

#[tokio::test]
async fn create_requires_both_fields() {
    let transport = ScriptedTransport::default();
    let controller = signed_in(&transport);

    let err = controller.create_todo("  ", "desc").await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn create_without_session_never_sends() {
    let transport = ScriptedTransport::default();
    let controller = anonymous(&transport);

    let err = controller.create_todo("t", "d").await.unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn create_clears_form_and_refreshes() {
    let transport = ScriptedTransport::default();
    transport
        .reply(201, r#"{"id":1,"title":"Buy milk","description":"2 litres","completed":false}"#)
        .reply(200, ONE_TODO);
    let controller = signed_in(&transport);
    {
        let mut view = controller.view_mut();
        view.todo_form.title = " Buy milk ".to_string();
        view.todo_form.description = "2 litres".to_string();
    }

    controller.submit_todo_form().await.unwrap();

    let requests = transport.requests();
    let body: serde_json::Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({ "title": "Buy milk", "description": "2 litres" }));
    assert_eq!(requests[1].method, HttpMethod::Get);
    assert!(controller.view().todo_form.title.is_empty());
    assert_eq!(controller.view().todos().len(), 1);
}

#[tokio::test]
async fn create_failure_reports_server_message() {
    let transport = ScriptedTransport::default();
    transport.reply(400, r#"{"message":"Title is required"}"#);
    let controller = signed_in(&transport);

    controller.create_todo("t", "d").await.unwrap_err();
    assert_eq!(last_notice(&controller).1, "Failed to add todo: Title is required");

    transport.reply(500, "oops");
    controller.create_todo("t", "d").await.unwrap_err();
    assert_eq!(last_notice(&controller).1, "Failed to add todo: Unknown error");
}

#[tokio::test]
async fn edit_with_empty_field_is_abandoned() {
    let transport = ScriptedTransport::default();
    transport.reply(200, ONE_TODO);
    let controller = signed_in(&transport);
    controller.list_todos().await.unwrap();

    controller.begin_edit(&TodoId::Number(1)).unwrap();
    {
        let mut view = controller.view_mut();
        let form = view.edit.as_mut().unwrap();
        assert_eq!(form.title, "Buy milk");
        assert_eq!(form.description, "2 litres");
        form.description.clear();
    }

    let err = controller.submit_edit().await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(controller.view().edit.is_none());
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(last_notice(&controller).1, "Both title and description are required!");
}

#[tokio::test]
async fn edit_sends_text_fields_only() {
    let transport = ScriptedTransport::default();
    transport.reply(200, ONE_TODO).reply(200, "{}").reply(200, ONE_TODO);
    let controller = signed_in(&transport);
    controller.list_todos().await.unwrap();

    controller.begin_edit(&TodoId::Number(1)).unwrap();
    controller.view_mut().edit.as_mut().unwrap().title = "Buy oat milk".to_string();
    controller.submit_edit().await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[1].method, HttpMethod::Put);
    assert_eq!(requests[1].path, "http://localhost:3000/todos/1");
    let body: serde_json::Value = serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({ "title": "Buy oat milk", "description": "2 litres" }));
    assert_eq!(requests[2].method, HttpMethod::Get);
    assert_eq!(last_notice(&controller).1, "Task updated successfully!");
}

#[tokio::test]
async fn begin_edit_unknown_item_fails() {
    let transport = ScriptedTransport::default();
    let controller = signed_in(&transport);
    assert!(controller.begin_edit(&TodoId::Number(9)).is_err());
    assert!(controller.view().edit.is_none());
}

// --- complete ---

#[tokio::test]
async fn complete_then_delete_removes_item() {
    let transport = ScriptedTransport::default();
    transport.reply(200, "{}").reply(204, "").reply(200, "[]");
    let controller = signed_in(&transport);

    let state = controller.complete_todo(&TodoId::Number(1)).await.unwrap();

    assert_eq!(state, CompletionState::Deleted);
    assert_eq!(
        transport.sent(),
        vec![
            (HttpMethod::Put, "/todos/1".to_string()),
            (HttpMethod::Delete, "/todos/1".to_string()),
            (HttpMethod::Get, "/todos".to_string()),
        ]
    );
    assert_eq!(transport.requests()[0].body.as_deref(), Some(r#"{"completed":true}"#));
    assert!(controller.view().todos().is_empty());
    assert_eq!(controller.completion_state(&TodoId::Number(1)), None);
}

#[tokio::test]
async fn failed_delete_leaves_completed_item_for_retry() {
    let completed = r#"[{"id":1,"title":"Buy milk","description":"2 litres","completed":true}]"#;
    let transport = ScriptedTransport::default();
    transport
        .reply(200, "{}")
        .reply(500, "")
        .reply(200, completed);
    let controller = signed_in(&transport);
    let id = TodoId::Number(1);

    let state = controller.complete_todo(&id).await.unwrap();
    assert_eq!(state, CompletionState::CompletedNotDeleted);
    assert_eq!(transport.requests().len(), 2, "no refresh after a failed delete");
    assert_eq!(
        last_notice(&controller),
        (NoticeLevel::Error, "Task completed, but failed to delete.".to_string())
    );
    assert_eq!(controller.completion_state(&id), Some(CompletionState::CompletedNotDeleted));

    controller.list_todos().await.unwrap();
    let todos = controller.view().todos().to_vec();
    assert_eq!(todos.len(), 1);
    assert!(todos[0].completed);

    transport.reply(204, "").reply(200, "[]");
    let state = controller.retry_removal(&id).await.unwrap();
    assert_eq!(state, CompletionState::Deleted);
    assert_eq!(controller.completion_state(&id), None);
    assert!(controller.view().todos().is_empty());
    assert_eq!(transport.sent()[3], (HttpMethod::Delete, "/todos/1".to_string()));
}

#[tokio::test]
async fn failed_update_skips_delete() {
    let transport = ScriptedTransport::default();
    transport.reply(500, "");
    let controller = signed_in(&transport);

    let err = controller.complete_todo(&TodoId::Number(1)).await.unwrap_err();

    assert!(matches!(err, ClientError::Remote(_)));
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(controller.completion_state(&TodoId::Number(1)), None);
    assert_eq!(last_notice(&controller).1, "Failed to update task.");
}

#[tokio::test]
async fn retry_without_pending_removal_is_rejected() {
    let transport = ScriptedTransport::default();
    let controller = signed_in(&transport);

    let err = controller.retry_removal(&TodoId::Number(1)).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(transport.requests().is_empty());
}

// --- delete ---

#[tokio::test]
async fn delete_refreshes_only_on_204() {
    let transport = ScriptedTransport::default();
    transport.reply(200, r#"{"message":"deleted"}"#);
    let controller = signed_in(&transport);

    controller.delete_todo(&TodoId::Number(1)).await.unwrap_err();
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(last_notice(&controller).1, "Failed to delete todo.");

    transport.reply(204, "").reply(200, "[]");
    controller.delete_todo(&TodoId::Number(1)).await.unwrap();
    assert_eq!(transport.sent()[2], (HttpMethod::Get, "/todos".to_string()));
}

#[tokio::test]
async fn delete_without_session_never_sends() {
    let transport = ScriptedTransport::default();
    let controller = anonymous(&transport);

    let err = controller.delete_todo(&TodoId::Number(1)).await.unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
    assert!(transport.requests().is_empty());
}

// --- duplicate actions ---

#[tokio::test]
async fn duplicate_in_flight_request_is_rejected() {
    let transport = ScriptedTransport::default();
    transport.reply(200, ONE_TODO);
    let controller = signed_in(&transport);

    let (first, second) = tokio::join!(controller.list_todos(), controller.list_todos());

    assert!(first.is_ok());
    assert!(matches!(second, Err(ClientError::InFlight(Operation::ListTodos))));
    assert_eq!(transport.requests().len(), 1);
    assert!(!controller.is_in_flight(&Operation::ListTodos));
}

#[tokio::test]
async fn different_items_may_be_deleted_concurrently() {
    let transport = ScriptedTransport::default();
    transport
        .reply(204, "")
        .reply(204, "")
        .reply(200, "[]")
        .reply(200, "[]");
    let controller = signed_in(&transport);

    let (first, second) = tokio::join!(
        controller.delete_todo(&TodoId::Number(1)),
        controller.delete_todo(&TodoId::Number(2))
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(transport.requests().len(), 4);
}
