use serde::{Deserialize, Serialize};
use std::fmt;

pub type EntityId = u64;

// User struct, tasks only ever exist locally
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

// Task struct
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Task {
    pub id: EntityId,
    pub title: String,
    pub status: TaskStatus,
    pub completed: bool,
    #[serde(rename = "userId")]
    pub user_id: EntityId,
}

/// Workflow column of a task. Kept independent from `Task::completed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
}

impl TaskStatus {
    pub fn next(self) -> TaskStatus {
        match self {
            TaskStatus::ToDo => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::ToDo,
        }
    }

    pub fn previous(self) -> TaskStatus {
        match self {
            TaskStatus::ToDo => TaskStatus::Done,
            TaskStatus::InProgress => TaskStatus::ToDo,
            TaskStatus::Done => TaskStatus::InProgress,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        };
        f.write_str(label)
    }
}

// Product struct, read-only
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Product {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub image: String,
    pub category: Option<String>,
}

/// Sidebar destinations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Page {
    #[default]
    Home,
    Users,
    Products,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Home, Page::Users, Page::Products];

    pub fn title(self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::Users => "Users",
            Page::Products => "Products",
        }
    }
}

/// What the store currently holds. A users page never renders products.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Collection {
    #[default]
    Empty,
    Users(Vec<User>),
    Products(Vec<Product>),
}

impl Collection {
    pub fn len(&self) -> usize {
        match self {
            Collection::Empty => 0,
            Collection::Users(users) => users.len(),
            Collection::Products(products) => products.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this collection is the one `page` displays.
    pub fn belongs_to(&self, page: Page) -> bool {
        matches!(
            (self, page),
            (Collection::Users(_), Page::Users) | (Collection::Products(_), Page::Products)
        )
    }
}
