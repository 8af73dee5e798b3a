//! Line-oriented front end for `TodoController`.
//!
//! Each command fills the relevant form in the controller's view, submits
//! it, then prints queued notices and the current screen.

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use thiserror::Error;
use todo_client_core::view::NoticeLevel;
use todo_client_core::{AuthAction, ClientError, Screen, TodoController, TodoId, Transport};

use crate::cookie_jar::{CookieJar, JarError};

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Jar(#[from] JarError),
}

#[derive(Parser, Debug)]
#[command(multicall = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    /// Create an account (prompts for username and password)
    Register,
    /// Log in (prompts for username and password)
    Login,
    /// Reload the todo list from the server
    List,
    /// Add a todo (prompts for title and description)
    Add,
    /// Mark a todo complete and remove it
    Complete { id: TodoId },
    /// Retry removing a todo that was completed but not deleted
    RetryDelete { id: TodoId },
    /// Change a todo's title and description
    Edit { id: TodoId },
    /// Delete a todo
    Delete { id: TodoId },
    /// Forget the session and return to the login screen
    Logout,
    /// Print the current screen again
    Show,
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

pub struct Shell<T, R, W> {
    controller: TodoController<T>,
    input: R,
    output: W,
    jar: Option<CookieJar>,
}

impl<T: Transport, R: BufRead, W: Write> Shell<T, R, W> {
    pub fn new(controller: TodoController<T>, input: R, output: W, jar: Option<CookieJar>) -> Self {
        Self {
            controller,
            input,
            output,
            jar,
        }
    }

    pub fn controller(&self) -> &TodoController<T> {
        &self.controller
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Reads commands until `quit` or end of input.
    pub async fn run(&mut self) -> Result<(), ShellError> {
        if self.controller.session().is_authenticated() {
            report(self.controller.list_todos().await);
        }
        self.render()?;

        loop {
            write!(self.output, "> ")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match ShellLine::try_parse_from(line.split_whitespace()) {
                Ok(parsed) => parsed.command,
                Err(err) => {
                    writeln!(self.output, "{}", err.render())?;
                    continue;
                }
            };
            if matches!(command, ShellCommand::Quit) {
                break;
            }

            self.dispatch(command).await?;
            if let Some(jar) = &self.jar {
                jar.save(&self.controller.session())?;
            }
            self.render()?;
        }
        Ok(())
    }

    async fn dispatch(&mut self, command: ShellCommand) -> Result<(), ShellError> {
        tracing::debug!(?command, "dispatching");
        match command {
            ShellCommand::Register => {
                self.fill_auth_form()?;
                report(self.controller.submit_auth(AuthAction::Register).await);
            }
            ShellCommand::Login => {
                self.fill_auth_form()?;
                report(self.controller.submit_auth(AuthAction::Login).await);
            }
            ShellCommand::List => {
                report(self.controller.list_todos().await);
            }
            ShellCommand::Add => {
                let title = self.ask("title")?;
                let description = self.ask("description")?;
                {
                    let mut view = self.controller.view_mut();
                    view.todo_form.title = title;
                    view.todo_form.description = description;
                }
                report(self.controller.submit_todo_form().await);
            }
            ShellCommand::Complete { id } => {
                report(self.controller.complete_todo(&id).await.map(|_| ()));
            }
            ShellCommand::RetryDelete { id } => {
                report(self.controller.retry_removal(&id).await.map(|_| ()));
            }
            ShellCommand::Edit { id } => {
                if self.controller.begin_edit(&id).is_err() {
                    return Ok(());
                }
                let current = self.controller.view().edit.clone();
                let Some(current) = current else {
                    return Ok(());
                };
                let title = self.ask(&format!("title [{}] (enter keeps, - clears)", current.title))?;
                let description = self.ask(&format!(
                    "description [{}] (enter keeps, - clears)",
                    current.description
                ))?;
                if let Some(form) = self.controller.view_mut().edit.as_mut() {
                    form.title = edited(title, &current.title);
                    form.description = edited(description, &current.description);
                }
                report(self.controller.submit_edit().await);
            }
            ShellCommand::Delete { id } => {
                report(self.controller.delete_todo(&id).await);
            }
            ShellCommand::Logout => self.controller.logout(),
            ShellCommand::Show | ShellCommand::Quit => {}
        }
        Ok(())
    }

    fn fill_auth_form(&mut self) -> Result<(), ShellError> {
        let username = self.ask("username")?;
        let password = self.ask("password")?;
        let mut view = self.controller.view_mut();
        view.auth_form.username = username;
        view.auth_form.password = password;
        Ok(())
    }

    /// Prompts for one line. End of input reads as an empty answer.
    fn ask(&mut self, label: &str) -> Result<String, ShellError> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;
        Ok(self.read_line()?.unwrap_or_default())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn render(&mut self) -> io::Result<()> {
        let notices = self.controller.view_mut().take_notices();
        for notice in notices {
            let tag = match notice.level {
                NoticeLevel::Info => "ok",
                NoticeLevel::Error => "error",
            };
            writeln!(self.output, "[{tag}] {}", notice.message)?;
        }

        let view = self.controller.view();
        match view.screen {
            Screen::Auth => writeln!(self.output, "Not logged in. Use `register` or `login`.")?,
            Screen::Todos if view.todos().is_empty() => writeln!(self.output, "No todos.")?,
            Screen::Todos => {
                for todo in view.todos() {
                    let mark = if todo.completed { "x" } else { " " };
                    writeln!(self.output, "{:>4} [{mark}] {}: {}", todo.id.to_string(), todo.title, todo.description)?;
                }
            }
        }
        Ok(())
    }
}

/// An empty answer keeps the pre-filled value; `-` clears it.
fn edited(answer: String, current: &str) -> String {
    match answer.trim() {
        "" => current.to_string(),
        "-" => String::new(),
        _ => answer,
    }
}

/// Failures are already queued as notices.
fn report(result: Result<(), ClientError>) {
    if let Err(err) = result {
        tracing::debug!(error = %err, "command failed");
    }
}
