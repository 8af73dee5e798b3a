//! What the user sees: the current screen, form inputs, the rendered list and
//! pending notices.
//!
//! The controller is the only writer apart from form input, which the host
//! fills in before submitting.

use crate::types::{Todo, TodoId};

/// The two UI states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Auth form visible, todo view hidden.
    Auth,
    /// Todo view visible, auth form hidden.
    Todos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    Password,
    Title,
    Description,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthForm {
    pub username: String,
    pub password: String,
}

impl AuthForm {
    pub fn clear(&mut self) {
        self.username.clear();
        self.password.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoForm {
    pub title: String,
    pub description: String,
}

impl TodoForm {
    pub fn clear(&mut self) {
        self.title.clear();
        self.description.clear();
    }
}

/// An open edit of one item, pre-filled with its current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    pub id: TodoId,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message for the user, the equivalent of a modal alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct View {
    pub screen: Screen,
    pub auth_form: AuthForm,
    pub todo_form: TodoForm,
    pub edit: Option<EditForm>,
    pub focus: Option<Field>,
    todos: Vec<Todo>,
    notices: Vec<Notice>,
}

impl View {
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            auth_form: AuthForm::default(),
            todo_form: TodoForm::default(),
            edit: None,
            focus: None,
            todos: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Items from the most recent successful list response.
    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn find(&self, id: &TodoId) -> Option<&Todo> {
        self.todos.iter().find(|todo| &todo.id == id)
    }

    /// Full replace; no merging with what was shown before.
    pub(crate) fn render_todos(&mut self, todos: Vec<Todo>) {
        self.todos = todos;
    }

    pub(crate) fn show_auth(&mut self) {
        self.screen = Screen::Auth;
        self.todos.clear();
        self.edit = None;
    }

    pub(crate) fn show_todos(&mut self) {
        self.screen = Screen::Todos;
    }

    pub(crate) fn info(&mut self, message: impl Into<String>) {
        self.notices.push(Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        });
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.notices.push(Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        });
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Drains queued notices in the order they were raised.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new(Screen::Auth)
    }
}
