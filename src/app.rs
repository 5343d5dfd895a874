use crate::api::{FetchRequest, FetchResponse};
use crate::config::Config;
use crate::forms::{LoginForm, TaskForm, UserForm};
use crate::models::{Collection, Page, Product, Task, User};
use crate::session::Session;
use crate::store::{visible, IdGenerator, Mutation, Store};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::ListState;
use std::time::{Duration, Instant};

const ROWS_STEP: usize = 5;

pub enum InputMode {
    Normal,
    Search,
    Editing,
}

/// Which list on the users page receives j/k and the CRUD keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pane {
    Entities,
    Tasks,
}

#[derive(Debug)]
pub enum Modal {
    User(UserForm),
    Task(TaskForm),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug)]
pub struct Toast {
    pub message: &'static str,
    pub severity: Severity,
    pub shown_at: Instant,
}

/// What the event loop should do after a key press.
#[derive(Debug, PartialEq)]
pub enum Action {
    None,
    Quit,
    Fetch(FetchRequest),
}

pub struct App {
    pub session: Session,
    pub login: LoginForm,
    pub page: Page,
    pub sidebar_visible: bool,
    pub store: Store,
    pub state: ListState,
    pub task_state: ListState,
    pub pane: Pane,
    pub input_mode: InputMode,
    pub search_query: String,
    pub search_input: String,
    pub modal: Option<Modal>,
    pub toast: Option<Toast>,
    pub rows_per_page: usize,
    pub loading: bool,
    toast_duration: Duration,
    generation: u64,
    ids: IdGenerator,
}

impl App {
    pub fn new(config: &Config) -> App {
        App {
            session: Session::default(),
            login: LoginForm::default(),
            page: Page::Home,
            sidebar_visible: true,
            store: Store::default(),
            state: ListState::default(),
            task_state: ListState::default(),
            pane: Pane::Entities,
            input_mode: InputMode::Normal,
            search_query: String::new(),
            search_input: String::new(),
            modal: None,
            toast: None,
            rows_per_page: config.rows_per_page,
            loading: false,
            toast_duration: config.toast_duration,
            generation: 0,
            ids: IdGenerator::default(),
        }
    }

    /// Users of the current window, empty unless the users page is loaded.
    pub fn visible_users(&self) -> &[User] {
        match self.store.users() {
            Some(users) if self.page == Page::Users => visible(users, self.rows_per_page),
            _ => &[],
        }
    }

    pub fn visible_products(&self) -> &[Product] {
        match self.store.products() {
            Some(products) if self.page == Page::Products => {
                visible(products, self.rows_per_page)
            }
            _ => &[],
        }
    }

    fn visible_len(&self) -> usize {
        match self.page {
            Page::Users => self.visible_users().len(),
            Page::Products => self.visible_products().len(),
            Page::Home => 0,
        }
    }

    pub fn selected_user(&self) -> Option<&User> {
        self.state
            .selected()
            .and_then(|i| self.visible_users().get(i))
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let user = self.selected_user()?;
        self.task_state.selected().and_then(|i| user.tasks.get(i))
    }

    pub fn selected_product(&self) -> Option<&Product> {
        self.state
            .selected()
            .and_then(|i| self.visible_products().get(i))
    }

    /// Start a fetch for the current page. Any response to an earlier
    /// request is discarded once this one is issued.
    fn request_fetch(&mut self) -> Action {
        if self.page == Page::Home {
            return Action::None;
        }
        self.generation += 1;
        self.loading = true;
        let query = Some(self.search_query.clone()).filter(|q| !q.trim().is_empty());
        tracing::info!(
            "fetching {} (generation {}, query {:?})",
            self.page.title(),
            self.generation,
            query
        );
        Action::Fetch(FetchRequest {
            generation: self.generation,
            page: self.page,
            query,
        })
    }

    pub fn apply_fetch(&mut self, response: FetchResponse) {
        if response.generation != self.generation {
            tracing::debug!(
                "discarding stale {} response (generation {}, current {})",
                response.page.title(),
                response.generation,
                self.generation
            );
            return;
        }
        self.loading = false;
        match response.result {
            Ok(collection) => {
                if collection.is_empty() {
                    tracing::warn!("{} came back empty", response.page.title());
                } else {
                    tracing::info!("loaded {} {}", collection.len(), response.page.title());
                }
                self.store = Store::new(collection);
                self.reset_selection();
            }
            Err(err) => {
                tracing::warn!("failed to load {}: {}", response.page.title(), err);
            }
        }
    }

    pub fn navigate(&mut self, page: Page) -> Action {
        self.page = page;
        self.pane = Pane::Entities;
        self.reset_selection();
        self.request_fetch()
    }

    fn reset_selection(&mut self) {
        self.state
            .select(if self.visible_len() > 0 { Some(0) } else { None });
        self.reset_task_selection();
    }

    fn reset_task_selection(&mut self) {
        let has_tasks = self
            .selected_user()
            .map_or(false, |user| !user.tasks.is_empty());
        self.task_state.select(if has_tasks { Some(0) } else { None });
    }

    // Keep both cursors inside their lists after a mutation
    fn clamp_selection(&mut self) {
        let len = self.visible_len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            _ => {}
        }
        let tasks = self.selected_user().map_or(0, |user| user.tasks.len());
        match self.task_state.selected() {
            _ if tasks == 0 => self.task_state.select(None),
            Some(i) if i >= tasks => self.task_state.select(Some(tasks - 1)),
            None => self.task_state.select(Some(0)),
            _ => {}
        }
    }

    pub fn next(&mut self) {
        if self.pane == Pane::Tasks {
            let len = self.selected_user().map_or(0, |user| user.tasks.len());
            step(&mut self.task_state, len, true);
        } else {
            let len = self.visible_len();
            step(&mut self.state, len, true);
            self.reset_task_selection();
        }
    }

    pub fn previous(&mut self) {
        if self.pane == Pane::Tasks {
            let len = self.selected_user().map_or(0, |user| user.tasks.len());
            step(&mut self.task_state, len, false);
        } else {
            let len = self.visible_len();
            step(&mut self.state, len, false);
            self.reset_task_selection();
        }
    }

    pub fn grow_window(&mut self) {
        self.rows_per_page = self.rows_per_page.saturating_add(ROWS_STEP);
        self.clamp_selection();
    }

    pub fn shrink_window(&mut self) {
        self.rows_per_page = self.rows_per_page.saturating_sub(ROWS_STEP).max(1);
        self.clamp_selection();
    }

    /// Run a mutator against the store and announce it with a toast.
    pub fn mutate(&mut self, mutation: Mutation) {
        // Users can be created before (or without) a successful load.
        if self.page == Page::Users && self.store.users().is_none() {
            self.store = Store::new(Collection::Users(Vec::new()));
        }
        if self.store.users().is_none() {
            tracing::warn!("ignoring {:?} without a users collection", mutation);
            return;
        }

        let (message, severity) = toast_for(&mutation);
        tracing::debug!("applying {:?}", mutation);
        let (next, created) = self.store.apply(mutation, &mut self.ids);
        if let Some(id) = created {
            tracing::info!("created entity {}", id);
        }
        self.store = next;
        self.clamp_selection();
        self.toast = Some(Toast {
            message,
            severity,
            shown_at: Instant::now(),
        });
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(toast) = &self.toast {
            if now.duration_since(toast.shown_at) >= self.toast_duration {
                self.toast = None;
            }
        }
    }

    pub fn handle_input(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }
        if !self.session.is_authenticated() {
            return self.handle_login(key);
        }
        match self.input_mode {
            InputMode::Normal => self.handle_normal(key),
            InputMode::Search => self.handle_search(key),
            InputMode::Editing => {
                self.handle_modal(key);
                Action::None
            }
        }
    }

    fn handle_login(&mut self, key: KeyEvent) -> Action {
        // The alert blocks until dismissed
        if self.login.alert.take().is_some() {
            return Action::None;
        }
        match key.code {
            KeyCode::Esc => return Action::Quit,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.login.switch_input()
            }
            KeyCode::Char(c) => self.login.push(c),
            KeyCode::Backspace => self.login.pop(),
            KeyCode::Enter => {
                match self
                    .session
                    .login(&self.login.username, &self.login.password)
                {
                    Ok(()) => {
                        tracing::info!("login accepted for {}", self.login.username);
                        self.login = LoginForm::default();
                    }
                    Err(err) => {
                        tracing::warn!("login rejected for {:?}", self.login.username);
                        self.login.alert = Some(err.to_string());
                    }
                }
            }
            _ => {}
        }
        Action::None
    }

    fn handle_normal(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('q') => return Action::Quit,
            KeyCode::Char('b') => self.sidebar_visible = !self.sidebar_visible,
            KeyCode::Char('1') => return self.navigate(Page::Home),
            KeyCode::Char('2') => return self.navigate(Page::Users),
            KeyCode::Char('3') => return self.navigate(Page::Products),
            KeyCode::Char('r') => return self.request_fetch(),
            KeyCode::Char('j') | KeyCode::Down => self.next(),
            KeyCode::Char('k') | KeyCode::Up => self.previous(),
            KeyCode::Char('+') => self.grow_window(),
            KeyCode::Char('-') => self.shrink_window(),
            KeyCode::Char('/') => {
                self.search_input = self.search_query.clone();
                self.input_mode = InputMode::Search;
            }
            KeyCode::Tab if self.page == Page::Users => {
                self.pane = match self.pane {
                    Pane::Entities if self.selected_user().is_some() => Pane::Tasks,
                    _ => Pane::Entities,
                };
            }
            _ if self.page == Page::Users => self.handle_users_key(key),
            _ => {}
        }
        Action::None
    }

    fn handle_users_key(&mut self, key: KeyEvent) {
        let user_id = self.selected_user().map(|user| user.id);
        match (self.pane, key.code) {
            (Pane::Entities, KeyCode::Char('a')) => self.open(Modal::User(UserForm::new())),
            (Pane::Entities, KeyCode::Char('e')) => {
                if let Some(user) = self.selected_user() {
                    let form = UserForm::for_user(user);
                    self.open(Modal::User(form));
                }
            }
            (Pane::Entities, KeyCode::Char('d')) => {
                if let Some(id) = user_id {
                    self.mutate(Mutation::DeleteUser(id));
                }
            }
            (_, KeyCode::Char('t')) | (Pane::Tasks, KeyCode::Char('a')) => {
                if let Some(id) = user_id {
                    self.open(Modal::Task(TaskForm::new(id)));
                }
            }
            (Pane::Tasks, KeyCode::Char('e')) => {
                if let (Some(id), Some(task)) = (user_id, self.selected_task()) {
                    let form = TaskForm::for_task(id, task);
                    self.open(Modal::Task(form));
                }
            }
            (Pane::Tasks, KeyCode::Char('d')) => {
                if let (Some(user_id), Some(task)) = (user_id, self.selected_task()) {
                    let task_id = task.id;
                    self.mutate(Mutation::DeleteTask { user_id, task_id });
                }
            }
            (Pane::Tasks, KeyCode::Char(' ')) | (Pane::Tasks, KeyCode::Char('x')) => {
                if let (Some(user_id), Some(task)) = (user_id, self.selected_task()) {
                    let task_id = task.id;
                    self.mutate(Mutation::ToggleTask { user_id, task_id });
                }
            }
            _ => {}
        }
    }

    fn open(&mut self, modal: Modal) {
        self.modal = Some(modal);
        self.input_mode = InputMode::Editing;
    }

    fn close_modal(&mut self) {
        self.modal = None;
        self.input_mode = InputMode::Normal;
    }

    fn handle_search(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char(c) => self.search_input.push(c),
            KeyCode::Backspace => {
                self.search_input.pop();
            }
            KeyCode::Enter => {
                self.search_query = self.search_input.trim().to_string();
                self.input_mode = InputMode::Normal;
                return self.request_fetch();
            }
            KeyCode::Esc => self.input_mode = InputMode::Normal,
            _ => {}
        }
        Action::None
    }

    fn handle_modal(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => return self.close_modal(),
            KeyCode::Enter => return self.submit_modal(),
            _ => {}
        }
        match self.modal.as_mut() {
            Some(Modal::User(form)) => match key.code {
                KeyCode::Tab | KeyCode::Down => form.next_field(),
                KeyCode::BackTab | KeyCode::Up => form.previous_field(),
                KeyCode::Char(c) => form.push(c),
                KeyCode::Backspace => form.pop(),
                _ => {}
            },
            Some(Modal::Task(form)) => match key.code {
                KeyCode::Tab | KeyCode::Down => form.next_field(),
                KeyCode::BackTab | KeyCode::Up => form.previous_field(),
                KeyCode::Left => form.cycle_status(false),
                KeyCode::Right => form.cycle_status(true),
                KeyCode::Char(c) => form.push(c),
                KeyCode::Backspace => form.pop(),
                _ => {}
            },
            None => self.input_mode = InputMode::Normal,
        }
    }

    fn submit_modal(&mut self) {
        let mutation = match self.modal.as_mut() {
            Some(Modal::User(form)) => match form.submit() {
                Ok(draft) => match form.editing {
                    Some(id) => Mutation::UpdateUser { id, draft },
                    None => Mutation::CreateUser(draft),
                },
                Err(err) => {
                    form.error = Some(err.to_string());
                    return;
                }
            },
            Some(Modal::Task(form)) => match form.submit() {
                Ok(draft) => match form.editing {
                    Some(task_id) => Mutation::UpdateTask {
                        user_id: form.user_id,
                        task_id,
                        draft,
                    },
                    None => Mutation::CreateTask {
                        user_id: form.user_id,
                        draft,
                    },
                },
                Err(err) => {
                    form.error = Some(err.to_string());
                    return;
                }
            },
            None => return,
        };
        self.close_modal();
        self.mutate(mutation);
    }
}

fn step(state: &mut ListState, len: usize, forward: bool) {
    if len == 0 {
        state.select(None);
        return;
    }
    let i = match state.selected() {
        Some(i) if forward => {
            if i >= len - 1 {
                0
            } else {
                i + 1
            }
        }
        Some(i) => {
            if i == 0 {
                len - 1
            } else {
                i - 1
            }
        }
        None => 0,
    };
    state.select(Some(i));
}

fn toast_for(mutation: &Mutation) -> (&'static str, Severity) {
    match mutation {
        Mutation::CreateUser(_) => ("User created successfully", Severity::Success),
        Mutation::UpdateUser { .. } => ("User updated successfully", Severity::Success),
        Mutation::DeleteUser(_) => ("User deleted successfully", Severity::Error),
        Mutation::CreateTask { .. } => ("Task created successfully", Severity::Success),
        Mutation::UpdateTask { .. } => ("Task updated successfully", Severity::Success),
        Mutation::DeleteTask { .. } => ("Task deleted successfully", Severity::Error),
        Mutation::ToggleTask { .. } => ("Task status updated successfully", Severity::Success),
    }
}
