//! Operator prompts
//!
//! The orchestrator asks the operator for three things: a secret (password
//! or MFA pass-code), a choice among enrolled factors, and a yes/no
//! confirmation. [`TerminalPrompter`] reads them from the controlling
//! terminal on a blocking thread; [`ScriptedPrompter`] replays canned
//! answers in tests.
//!
//! All terminal input goes through rustyline in raw mode, so Ctrl+C while
//! a prompt is open comes back as [`AuthError::Cancelled`] and the
//! terminal is restored before the read returns.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rustyline::completion::Completer;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{ColorMode, DefaultEditor, Editor, Helper};

use crate::error::{AuthError, AuthResult};

/// Source of operator input.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Reads a secret without echoing it.
    async fn secret(&self, label: &str) -> AuthResult<String>;

    /// Asks the operator to pick one of `items`; returns its index.
    async fn choice(&self, label: &str, items: &[String]) -> AuthResult<usize>;

    /// Asks a yes/no question.
    async fn confirm(&self, label: &str) -> AuthResult<bool>;
}

/// Interactive [`Prompter`] on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// Creates a terminal prompter.
    pub fn new() -> Self {
        Self
    }
}

async fn blocking<T, F>(f: F) -> AuthResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AuthResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Prompt(format!("prompt task failed: {e}")))?
}

fn readline_result(result: Result<String, ReadlineError>) -> AuthResult<String> {
    match result {
        Ok(line) => Ok(line),
        Err(ReadlineError::Interrupted) => Err(AuthError::Cancelled),
        Err(ReadlineError::Eof) => Err(AuthError::Prompt("end of input".to_string())),
        Err(e) => Err(AuthError::Prompt(e.to_string())),
    }
}

fn read_line(prompt: &str) -> AuthResult<String> {
    let mut rl = DefaultEditor::new().map_err(|e| AuthError::Prompt(e.to_string()))?;
    readline_result(rl.readline(prompt)).map(|line| line.trim().to_string())
}

/// Renders every typed character as `*`.
struct Masked;

impl Highlighter for Masked {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Owned("*".repeat(line.chars().count()))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Completer for Masked {
    type Candidate = String;
}

impl Hinter for Masked {
    type Hint = String;
}

impl Validator for Masked {}

impl Helper for Masked {}

fn read_secret(prompt: &str) -> AuthResult<String> {
    let mut rl: Editor<Masked, DefaultHistory> =
        Editor::new().map_err(|e| AuthError::Prompt(e.to_string()))?;
    rl.set_helper(Some(Masked));
    rl.set_color_mode(ColorMode::Forced);
    rl.set_auto_add_history(false);
    readline_result(rl.readline(prompt))
}

/// Parses a 1-based menu answer into a 0-based index.
fn parse_choice(answer: &str, len: usize) -> Option<usize> {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => None,
    }
}

fn parse_confirm(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn secret(&self, label: &str) -> AuthResult<String> {
        let prompt = format!("{label}: ");
        blocking(move || read_secret(&prompt)).await
    }

    async fn choice(&self, label: &str, items: &[String]) -> AuthResult<usize> {
        if items.is_empty() {
            return Err(AuthError::Prompt(format!("nothing to choose for {label}")));
        }
        let label = label.to_string();
        let items = items.to_vec();
        blocking(move || {
            println!("{label}");
            for (i, item) in items.iter().enumerate() {
                println!("  {}) {item}", i + 1);
            }
            loop {
                let answer = read_line(&format!("Choice [1-{}]: ", items.len()))?;
                if let Some(index) = parse_choice(&answer, items.len()) {
                    return Ok(index);
                }
                println!("Please enter a number between 1 and {}", items.len());
            }
        })
        .await
    }

    async fn confirm(&self, label: &str) -> AuthResult<bool> {
        let prompt = format!("{label} [y/N]: ");
        blocking(move || read_line(&prompt).map(|a| parse_confirm(&a))).await
    }
}

/// One prompt the [`ScriptedPrompter`] was asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asked {
    /// Secret prompt with its label
    Secret(String),
    /// Choice prompt with its label and options
    Choice(String, Vec<String>),
    /// Confirmation prompt with its label
    Confirm(String),
}

#[derive(Default)]
struct Answers {
    secrets: VecDeque<String>,
    choices: VecDeque<usize>,
    confirms: VecDeque<bool>,
    asked: Vec<Asked>,
}

/// [`Prompter`] replaying queued answers.
///
/// An exhausted queue fails with [`AuthError::Prompt`].
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<Answers>,
}

impl ScriptedPrompter {
    /// Creates a prompter with no answers.
    pub fn new() -> Self {
        Self::default()
    }

    fn answers(&self) -> MutexGuard<'_, Answers> {
        self.answers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues an answer to a secret prompt.
    pub fn with_secret(self, answer: &str) -> Self {
        self.answers().secrets.push_back(answer.to_string());
        self
    }

    /// Queues an answer to a choice prompt.
    pub fn with_choice(self, index: usize) -> Self {
        self.answers().choices.push_back(index);
        self
    }

    /// Queues an answer to a confirmation prompt.
    pub fn with_confirm(self, answer: bool) -> Self {
        self.answers().confirms.push_back(answer);
        self
    }

    /// Prompts received so far, in order.
    pub fn asked(&self) -> Vec<Asked> {
        self.answers().asked.clone()
    }
}

fn no_answer(kind: &str, label: &str) -> AuthError {
    AuthError::Prompt(format!("no scripted {kind} answer for '{label}'"))
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn secret(&self, label: &str) -> AuthResult<String> {
        let mut answers = self.answers();
        answers.asked.push(Asked::Secret(label.to_string()));
        answers
            .secrets
            .pop_front()
            .ok_or_else(|| no_answer("secret", label))
    }

    async fn choice(&self, label: &str, items: &[String]) -> AuthResult<usize> {
        let mut answers = self.answers();
        answers
            .asked
            .push(Asked::Choice(label.to_string(), items.to_vec()));
        let index = answers
            .choices
            .pop_front()
            .ok_or_else(|| no_answer("choice", label))?;
        if index >= items.len() {
            return Err(AuthError::Prompt(format!(
                "choice {index} out of range for {} items",
                items.len()
            )));
        }
        Ok(index)
    }

    async fn confirm(&self, label: &str) -> AuthResult<bool> {
        let mut answers = self.answers();
        answers.asked.push(Asked::Confirm(label.to_string()));
        answers
            .confirms
            .pop_front()
            .ok_or_else(|| no_answer("confirm", label))
    }
}
