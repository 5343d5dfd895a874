use crate::error::FormError;
use crate::models::{EntityId, Task, TaskStatus, User};
use crate::store::{TaskDraft, UserDraft};
use regex::Regex;
use std::sync::OnceLock;

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static pattern"))
}

/// Trim and collapse runs of whitespace into single spaces.
pub fn normalize(input: &str) -> String {
    whitespace_re().replace_all(input, " ").trim().to_string()
}

fn required(label: &'static str, value: &str) -> Result<String, FormError> {
    let value = normalize(value);
    if value.is_empty() {
        Err(FormError::Required(label))
    } else {
        Ok(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveInput {
    Username,
    Password,
}

#[derive(Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub active_input: ActiveInput,
    /// Shown until the next key press.
    pub alert: Option<String>,
}

impl Default for LoginForm {
    fn default() -> Self {
        LoginForm {
            username: String::new(),
            password: String::new(),
            active_input: ActiveInput::Username,
            alert: None,
        }
    }
}

impl LoginForm {
    pub fn switch_input(&mut self) {
        self.active_input = match self.active_input {
            ActiveInput::Username => ActiveInput::Password,
            ActiveInput::Password => ActiveInput::Username,
        };
    }

    pub fn push(&mut self, c: char) {
        match self.active_input {
            ActiveInput::Username => self.username.push(c),
            ActiveInput::Password => self.password.push(c),
        }
    }

    pub fn pop(&mut self) {
        match self.active_input {
            ActiveInput::Username => {
                self.username.pop();
            }
            ActiveInput::Password => {
                self.password.pop();
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextField {
    pub label: &'static str,
    pub value: String,
}

impl TextField {
    fn new(label: &'static str, value: &str) -> TextField {
        TextField {
            label,
            value: value.to_string(),
        }
    }
}

pub const USER_FIELDS: [&str; 5] = ["Name", "Email", "Username", "Phone", "Website"];

#[derive(Clone, Debug, PartialEq)]
pub struct UserForm {
    /// Id of the user being edited, `None` when creating.
    pub editing: Option<EntityId>,
    pub fields: Vec<TextField>,
    pub active: usize,
    pub error: Option<String>,
}

impl UserForm {
    pub fn new() -> UserForm {
        UserForm {
            editing: None,
            fields: USER_FIELDS.into_iter().map(|label| TextField::new(label, "")).collect(),
            active: 0,
            error: None,
        }
    }

    pub fn for_user(user: &User) -> UserForm {
        let values = [
            &user.name,
            &user.email,
            &user.username,
            &user.phone,
            &user.website,
        ];
        UserForm {
            editing: Some(user.id),
            fields: USER_FIELDS
                .into_iter()
                .zip(values)
                .map(|(label, value)| TextField::new(label, value))
                .collect(),
            active: 0,
            error: None,
        }
    }

    pub fn title(&self) -> &'static str {
        if self.editing.is_some() {
            "Edit User"
        } else {
            "Create User"
        }
    }

    pub fn next_field(&mut self) {
        self.active = (self.active + 1) % self.fields.len();
    }

    pub fn previous_field(&mut self) {
        self.active = (self.active + self.fields.len() - 1) % self.fields.len();
    }

    pub fn push(&mut self, c: char) {
        self.fields[self.active].value.push(c);
    }

    pub fn pop(&mut self) {
        self.fields[self.active].value.pop();
    }

    fn value(&self, index: usize) -> &str {
        &self.fields[index].value
    }

    pub fn submit(&self) -> Result<UserDraft, FormError> {
        let name = required("Name", self.value(0))?;
        let email = required("Email", self.value(1))?;
        if !email_re().is_match(&email) {
            return Err(FormError::InvalidEmail(email));
        }
        Ok(UserDraft {
            name,
            email,
            username: required("Username", self.value(2))?,
            phone: required("Phone", self.value(3))?,
            website: required("Website", self.value(4))?,
        })
    }
}

impl Default for UserForm {
    fn default() -> Self {
        UserForm::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskField {
    Title,
    Status,
    Completed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaskForm {
    pub user_id: EntityId,
    /// Id of the task being edited, `None` when creating.
    pub editing: Option<EntityId>,
    pub title: String,
    pub status: TaskStatus,
    pub completed: bool,
    pub active: TaskField,
    pub error: Option<String>,
}

impl TaskForm {
    pub fn new(user_id: EntityId) -> TaskForm {
        TaskForm {
            user_id,
            editing: None,
            title: String::new(),
            status: TaskStatus::ToDo,
            completed: false,
            active: TaskField::Title,
            error: None,
        }
    }

    pub fn for_task(user_id: EntityId, task: &Task) -> TaskForm {
        TaskForm {
            user_id,
            editing: Some(task.id),
            title: task.title.clone(),
            status: task.status,
            completed: task.completed,
            active: TaskField::Title,
            error: None,
        }
    }

    pub fn title_text(&self) -> &'static str {
        if self.editing.is_some() {
            "Edit Task"
        } else {
            "Create Task"
        }
    }

    pub fn next_field(&mut self) {
        self.active = match self.active {
            TaskField::Title => TaskField::Status,
            TaskField::Status => TaskField::Completed,
            TaskField::Completed => TaskField::Title,
        };
    }

    pub fn previous_field(&mut self) {
        self.active = match self.active {
            TaskField::Title => TaskField::Completed,
            TaskField::Status => TaskField::Title,
            TaskField::Completed => TaskField::Status,
        };
    }

    /// Typing goes to the title; space on the selectors changes them.
    pub fn push(&mut self, c: char) {
        match self.active {
            TaskField::Title => self.title.push(c),
            TaskField::Status if c == ' ' => self.status = self.status.next(),
            TaskField::Completed if c == ' ' => self.completed = !self.completed,
            _ => {}
        }
    }

    pub fn pop(&mut self) {
        if self.active == TaskField::Title {
            self.title.pop();
        }
    }

    pub fn cycle_status(&mut self, forward: bool) {
        if self.active == TaskField::Status {
            self.status = if forward {
                self.status.next()
            } else {
                self.status.previous()
            };
        }
    }

    pub fn submit(&self) -> Result<TaskDraft, FormError> {
        Ok(TaskDraft {
            title: required("Title", &self.title)?,
            status: self.status,
            completed: self.completed,
        })
    }
}
