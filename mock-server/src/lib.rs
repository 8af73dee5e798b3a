use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenBody {
    pub token: String,
}

#[derive(Default)]
pub struct Store {
    users: HashMap<String, String>,
    sessions: HashMap<String, String>,
    todos: BTreeMap<u64, (String, Todo)>,
    next_id: u64,
}

pub type Db = Arc<RwLock<Store>>;

type Rejection = (StatusCode, Json<Message>);

fn reject(status: StatusCode, message: &str) -> Rejection {
    (
        status,
        Json(Message {
            message: message.to_string(),
        }),
    )
}

/// Extractor failures answer with the same `{message}` body as handler errors.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Rejection> {
    body.map(|Json(input)| input)
        .map_err(|rejection| reject(rejection.status(), &rejection.body_text()))
}

fn todo_id(id: Result<Path<u64>, PathRejection>) -> Result<u64, Rejection> {
    id.map(|Path(id)| id)
        .map_err(|rejection| reject(rejection.status(), "Invalid todo id"))
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/todos", post(create_todo).get(list_todos))
        .route("/todos/{id}", put(update_todo).delete(delete_todo))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Username behind the request's bearer token.
fn authenticate(store: &Store, headers: &HeaderMap) -> Result<String, Rejection> {
    bearer(headers)
        .and_then(|token| store.sessions.get(token))
        .cloned()
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Unauthorized"))
}

async fn register(
    State(db): State<Db>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), Rejection> {
    let input = json_body(body)?;
    if input.username.is_empty() || input.password.is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "Username and password are required"));
    }
    let mut store = db.write().await;
    if store.users.contains_key(&input.username) {
        return Err(reject(StatusCode::CONFLICT, "Username already exists"));
    }
    tracing::info!(username = %input.username, "user registered");
    store.users.insert(input.username, input.password);
    Ok((
        StatusCode::CREATED,
        Json(Message {
            message: "User registered successfully".to_string(),
        }),
    ))
}

async fn login(
    State(db): State<Db>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenBody>, Rejection> {
    let input = json_body(body)?;
    let mut store = db.write().await;
    if store.users.get(&input.username) != Some(&input.password) {
        tracing::debug!(username = %input.username, "rejected login");
        return Err(reject(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }
    let token = Uuid::new_v4().to_string();
    store.sessions.insert(token.clone(), input.username);
    Ok(Json(TokenBody { token }))
}

async fn list_todos(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<Vec<Todo>>, Rejection> {
    let store = db.read().await;
    let user = authenticate(&store, &headers)?;
    let todos = store
        .todos
        .values()
        .filter(|(owner, _)| *owner == user)
        .map(|(_, todo)| todo.clone())
        .collect();
    Ok(Json(todos))
}

async fn create_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    body: Result<Json<CreateTodo>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), Rejection> {
    let mut store = db.write().await;
    let user = authenticate(&store, &headers)?;
    let input = json_body(body)?;
    if input.title.is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "Title is required"));
    }
    store.next_id += 1;
    let todo = Todo {
        id: store.next_id,
        title: input.title,
        description: input.description,
        completed: false,
    };
    store.todos.insert(todo.id, (user, todo.clone()));
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn update_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    id: Result<Path<u64>, PathRejection>,
    body: Result<Json<UpdateTodo>, JsonRejection>,
) -> Result<Json<Todo>, Rejection> {
    let mut store = db.write().await;
    let user = authenticate(&store, &headers)?;
    let id = todo_id(id)?;
    let input = json_body(body)?;
    let todo = match store.todos.get_mut(&id) {
        Some((owner, todo)) if *owner == user => todo,
        _ => return Err(reject(StatusCode::NOT_FOUND, "Todo not found")),
    };
    if let Some(title) = input.title {
        todo.title = title;
    }
    if let Some(description) = input.description {
        todo.description = description;
    }
    if let Some(completed) = input.completed {
        todo.completed = completed;
    }
    Ok(Json(todo.clone()))
}

async fn delete_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    id: Result<Path<u64>, PathRejection>,
) -> Result<StatusCode, Rejection> {
    let mut store = db.write().await;
    let user = authenticate(&store, &headers)?;
    let id = todo_id(id)?;
    match store.todos.get(&id) {
        Some((owner, _)) if *owner == user => {
            store.todos.remove(&id);
            Ok(StatusCode::NO_CONTENT)
        }
        _ => Err(reject(StatusCode::NOT_FOUND, "Todo not found")),
    }
}
