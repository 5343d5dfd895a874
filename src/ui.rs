use crate::api::{run_fetch, FetchResponse};
use crate::app::{Action, App, InputMode, Modal, Pane, Severity};
use crate::config::Endpoints;
use crate::forms::{ActiveInput, TaskField, TaskForm, UserForm};
use crate::models::Page;
use ansi_parser::{AnsiParser, Output};
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use reqwest::Client;
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const SIDEBAR_WIDTH: u16 = 20;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

/// 60% of the frame, at least 30 columns, never wider than the frame.
fn popup_width(width: u16) -> u16 {
    let scaled = (u32::from(width) * 60 / 100) as u16;
    scaled.max(30).min(width)
}

pub fn ansi_to_text(ansi_str: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for ansi_line in ansi_str.lines() {
        let mut spans = Vec::new();
        let parsed = ansi_line.ansi_parse();
        for item in parsed {
            match item {
                Output::TextBlock(text) => {
                    spans.push(Span::raw(text.to_string()));
                }
                Output::Escape(_escape) => {}
            }
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn key_hint(key: &'static str, label: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(format!(" {} ", key), Style::default().fg(Color::Red)),
        Span::raw(format!(": {} ", label)),
    ]
}

fn get_legend(app: &App) -> Text<'static> {
    let hints: Vec<(&'static str, &'static str)> = if !app.session.is_authenticated() {
        vec![("Tab", "Switch Field"), ("Enter", "Login"), ("Esc", "Quit")]
    } else {
        match app.input_mode {
            InputMode::Normal => {
                let mut hints = vec![
                    ("q", "Quit"),
                    ("b", "Sidebar"),
                    ("1-3", "Page"),
                    ("j/k", "Move"),
                    ("/", "Search"),
                    ("r", "Reload"),
                    ("+/-", "Rows"),
                ];
                if app.page == Page::Users {
                    match app.pane {
                        Pane::Entities => hints.extend([
                            ("Tab", "Tasks"),
                            ("a", "Add User"),
                            ("e", "Edit"),
                            ("d", "Delete"),
                            ("t", "Add Task"),
                        ]),
                        Pane::Tasks => hints.extend([
                            ("Tab", "Users"),
                            ("a", "Add Task"),
                            ("e", "Edit"),
                            ("d", "Delete"),
                            ("Space", "Toggle Done"),
                        ]),
                    }
                }
                hints
            }
            InputMode::Search => vec![("Enter", "Search"), ("Esc", "Cancel")],
            InputMode::Editing => vec![
                ("Tab", "Next Field"),
                ("Space", "Toggle"),
                ("Enter", "Submit"),
                ("Esc", "Close"),
            ],
        }
    };
    let spans: Vec<Span<'static>> = hints
        .into_iter()
        .flat_map(|(key, label)| key_hint(key, label))
        .collect();
    Text::from(Line::from(spans))
}

fn field_style(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    }
}

fn labelled(label: &str, value: String, active: bool) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{}: ", label),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(value, field_style(active)),
    ])
}

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([Constraint::Min(0), Constraint::Length(2)].as_ref())
        .split(size);

    let body_chunk = chunks[0];
    let footer_chunk = chunks[1];

    if app.session.is_authenticated() {
        draw_dashboard(f, app, body_chunk);
    } else {
        draw_login(f, app, body_chunk);
    }

    let legend = Paragraph::new(get_legend(app))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(legend, footer_chunk);
}

fn draw_login(f: &mut Frame, app: &App, area: Rect) {
    let form = &app.login;
    let masked = "*".repeat(form.password.chars().count());
    let lines = vec![
        Line::from(""),
        labelled(
            "Username",
            form.username.clone(),
            form.active_input == ActiveInput::Username,
        ),
        Line::from(""),
        labelled(
            "Password",
            masked,
            form.active_input == ActiveInput::Password,
        ),
    ];
    let popup_area = centered_rect_absolute(50, 7, area);
    let login = Paragraph::new(lines).block(
        Block::default()
            .title("Login")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Green)),
    );
    f.render_widget(Clear, popup_area);
    f.render_widget(login, popup_area);

    if let Some(alert) = &form.alert {
        let alert_area = centered_rect_absolute(40, 3, area);
        let alert = Paragraph::new(alert.clone())
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Red))
            .block(Block::default().title("Alert").borders(Borders::ALL));
        f.render_widget(Clear, alert_area);
        f.render_widget(alert, alert_area);
    }
}

fn draw_dashboard(f: &mut Frame, app: &mut App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    draw_header(f, app, rows[0]);

    let content = if app.sidebar_visible {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)].as_ref())
            .split(rows[1]);
        draw_sidebar(f, app, columns[0]);
        columns[1]
    } else {
        rows[1]
    };

    match app.page {
        Page::Home => draw_home(f, content),
        Page::Users if app.store.collection().belongs_to(Page::Users) => {
            draw_users(f, app, content)
        }
        Page::Products if app.store.collection().belongs_to(Page::Products) => {
            draw_products(f, app, content)
        }
        _ => {
            let message = if app.loading {
                "Loading..."
            } else {
                "Nothing loaded, press r to reload"
            };
            let paragraph = Paragraph::new(message)
                .block(Block::default().borders(Borders::ALL).title(app.page.title()));
            f.render_widget(paragraph, content);
        }
    }

    match &app.modal {
        Some(Modal::User(form)) => draw_user_form(f, form, area),
        Some(Modal::Task(form)) => draw_task_form(f, form, area),
        None => {}
    }

    if let Some(toast) = &app.toast {
        let color = match toast.severity {
            Severity::Success => Color::Green,
            Severity::Error => Color::Red,
        };
        let width = (toast.message.len() as u16 + 4).min(area.width);
        let toast_area = Rect {
            x: area.x,
            y: area.bottom().saturating_sub(3),
            width,
            height: 3.min(area.height),
        };
        let widget = Paragraph::new(toast.message)
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(Clear, toast_area);
        f.render_widget(widget, toast_area);
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled("Dashboard", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  |  {}", app.page.title())),
    ];
    match app.input_mode {
        InputMode::Search => spans.push(Span::styled(
            format!("  |  Search: {}_", app.search_input),
            Style::default().fg(Color::Yellow),
        )),
        _ if !app.search_query.is_empty() => {
            spans.push(Span::raw(format!("  |  Search: {}", app.search_query)))
        }
        _ => {}
    }
    if app.loading {
        spans.push(Span::styled("  loading", Style::default().fg(Color::Yellow)));
    }
    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = Page::ALL
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let style = if *page == app.page {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(
                format!("{} {}", i + 1, page.title()),
                style,
            )))
        })
        .collect();
    let sidebar = List::new(items).block(Block::default().borders(Borders::ALL).title("Menu"));
    f.render_widget(sidebar, area);
}

fn draw_home(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Welcome to the Dashboard",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Press 2 for users or 3 for products."),
    ];
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Home"));
    f.render_widget(paragraph, area);
}

fn list_highlight(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    }
}

fn draw_users(f: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)].as_ref())
        .split(area);

    let total = app.store.collection().len();
    let title = format!("Users ({} of {})", app.visible_users().len(), total);

    let users_widget = if !app.visible_users().is_empty() {
        let users: Vec<ListItem> = app
            .visible_users()
            .iter()
            .map(|user| {
                ListItem::new(Line::from(vec![
                    Span::raw(user.name.clone()),
                    Span::styled(
                        format!(" @{}", user.username),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();

        List::new(users)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(list_highlight(app.pane == Pane::Entities))
            .highlight_symbol(">> ")
    } else {
        List::new(vec![ListItem::new("No users available")])
            .block(Block::default().borders(Borders::ALL).title(title))
    };

    f.render_stateful_widget(users_widget, chunks[0], &mut app.state);

    let detail = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)].as_ref())
        .split(chunks[1]);

    let detail_block = Block::default().borders(Borders::ALL).title("User Details");
    let Some(user) = app.selected_user() else {
        let paragraph = Paragraph::new("Select a user with j/k").block(detail_block);
        f.render_widget(paragraph, chunks[1]);
        return;
    };

    let lines = vec![
        labelled("Email", user.email.clone(), false),
        labelled("Username", user.username.clone(), false),
        labelled("Phone", user.phone.clone(), false),
        labelled("Website", user.website.clone(), false),
    ];
    let paragraph = Paragraph::new(lines)
        .block(detail_block.title(user.name.clone()))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, detail[0]);

    let tasks: Vec<ListItem> = user
        .tasks
        .iter()
        .map(|task| {
            let check = if task.completed { "[x] " } else { "[ ] " };
            ListItem::new(Line::from(vec![
                Span::styled(check, Style::default().fg(Color::Green)),
                Span::raw(task.title.clone()),
                Span::styled(
                    format!("  {}", task.status),
                    Style::default().fg(Color::Yellow),
                ),
            ]))
        })
        .collect();
    let tasks_block = Block::default().borders(Borders::ALL).title("Tasks");
    if tasks.is_empty() {
        let paragraph = Paragraph::new("No tasks, press t to add one").block(tasks_block);
        f.render_widget(paragraph, detail[1]);
    } else {
        let tasks_widget = List::new(tasks)
            .block(tasks_block)
            .highlight_style(list_highlight(app.pane == Pane::Tasks))
            .highlight_symbol(">> ");
        f.render_stateful_widget(tasks_widget, detail[1], &mut app.task_state);
    }
}

fn draw_products(f: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(area);

    let total = app.store.collection().len();
    let title = format!("Products ({} of {})", app.visible_products().len(), total);

    let products_widget = if !app.visible_products().is_empty() {
        let products: Vec<ListItem> = app
            .visible_products()
            .iter()
            .map(|product| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("${:.2} ", product.price),
                        Style::default().fg(Color::Green),
                    ),
                    Span::raw(product.title.clone()),
                ]))
            })
            .collect();

        List::new(products)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(list_highlight(true))
            .highlight_symbol(">> ")
    } else {
        List::new(vec![ListItem::new("No products available")])
            .block(Block::default().borders(Borders::ALL).title(title))
    };

    f.render_stateful_widget(products_widget, chunks[0], &mut app.state);

    let detail_block = Block::default()
        .borders(Borders::ALL)
        .title("Product Details");

    let Some(product) = app.selected_product() else {
        let paragraph = Paragraph::new("Select a product with j/k").block(detail_block);
        f.render_widget(paragraph, chunks[1]);
        return;
    };

    let mut lines: Vec<Line<'static>> = vec![
        Line::from(Span::styled(
            product.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        labelled("Price", format!("${:.2}", product.price), false),
    ];
    if let Some(category) = &product.category {
        lines.push(labelled("Category", category.clone(), false));
    }
    if !product.image.is_empty() {
        lines.push(labelled("Image", product.image.clone(), false));
    }
    lines.push(Line::from(Span::styled(
        "Description: ",
        Style::default().add_modifier(Modifier::BOLD),
    )));

    if product.description.trim().is_empty() {
        lines.push(Line::from(Span::raw("No description".to_string())));
    } else {
        // Remote text may carry markup
        let width = chunks[1].width.saturating_sub(2).max(1) as usize;
        let ansi_text = html2text::from_read(product.description.as_bytes(), width);
        let mut desc_lines = ansi_to_text(&ansi_text);
        lines.append(&mut desc_lines);
    }

    let paragraph = Paragraph::new(lines)
        .block(detail_block)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, chunks[1]);
}

fn draw_form(
    f: &mut Frame,
    title: &str,
    mut lines: Vec<Line<'static>>,
    error: Option<&str>,
    area: Rect,
) {
    if let Some(error) = error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )));
    }

    let width = popup_width(area.width);
    let popup_height = (lines.len() as u16 + 2).min(area.height);
    let popup_area = centered_rect_absolute(width, popup_height, area);

    let popup_block = Block::default()
        .title(format!("{} (Press Enter to Submit)", title))
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));

    let form = Paragraph::new(lines)
        .block(popup_block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(form, popup_area);
}

fn draw_user_form(f: &mut Frame, form: &UserForm, area: Rect) {
    let lines = form
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let active = i == form.active;
            let cursor = if active { "_" } else { "" };
            labelled(field.label, format!("{}{}", field.value, cursor), active)
        })
        .collect();
    draw_form(f, form.title(), lines, form.error.as_deref(), area);
}

fn draw_task_form(f: &mut Frame, form: &TaskForm, area: Rect) {
    let title_active = form.active == TaskField::Title;
    let cursor = if title_active { "_" } else { "" };
    let check = if form.completed { "[x]" } else { "[ ]" };
    let lines = vec![
        labelled("Title", format!("{}{}", form.title, cursor), title_active),
        labelled(
            "Status",
            format!("< {} >", form.status),
            form.active == TaskField::Status,
        ),
        labelled(
            "Completed",
            check.to_string(),
            form.active == TaskField::Completed,
        ),
    ];
    draw_form(f, form.title_text(), lines, form.error.as_deref(), area);
}

pub async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    client: Client,
    endpoints: Endpoints,
) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<FetchResponse>();

    loop {
        app.tick(Instant::now());
        terminal.draw(|f| draw(f, &mut app))?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match app.handle_input(key) {
                        Action::Quit => return Ok(()),
                        Action::Fetch(request) => {
                            let tx = tx.clone();
                            let client = client.clone();
                            let endpoints = endpoints.clone();
                            tokio::spawn(async move {
                                let response = run_fetch(client, endpoints, request).await;
                                // The receiver is gone only when the app has quit
                                let _ = tx.send(response);
                            });
                        }
                        Action::None => {}
                    }
                }
            }
        }

        while let Ok(response) = rx.try_recv() {
            app.apply_fetch(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Collection, Product, Task, TaskStatus, User};
    use crate::store::Store;
    use ratatui::backend::TestBackend;

    fn render(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn logged_in() -> App {
        let mut app = App::new(&Config::default());
        app.session.login("admin", "password").unwrap();
        app
    }

    #[test]
    fn test_login_screen_masks_password() {
        let mut app = App::new(&Config::default());
        app.login.username = "admin".to_string();
        app.login.password = "secret".to_string();
        let screen = render(&mut app);
        assert!(screen.contains("Login"));
        assert!(screen.contains("admin"));
        assert!(screen.contains("******"));
        assert!(!screen.contains("secret"));
    }

    #[test]
    fn test_login_alert_is_shown() {
        let mut app = App::new(&Config::default());
        app.login.alert = Some("Invalid credentials".to_string());
        assert!(render(&mut app).contains("Invalid credentials"));
    }

    #[test]
    fn test_home_page_and_sidebar() {
        let mut app = logged_in();
        let screen = render(&mut app);
        assert!(screen.contains("Welcome to the Dashboard"));
        assert!(screen.contains("2 Users"));

        app.sidebar_visible = false;
        assert!(!render(&mut app).contains("2 Users"));
    }

    #[test]
    fn test_users_page_shows_window_and_tasks() {
        let mut app = logged_in();
        app.page = Page::Users;
        let users: Vec<User> = (1..=7)
            .map(|id| User {
                id,
                name: format!("Person {}", id),
                email: format!("p{}@example.com", id),
                username: format!("p{}", id),
                phone: "555".to_string(),
                website: "example.com".to_string(),
                tasks: if id == 1 {
                    vec![Task {
                        id: 100,
                        title: "Water plants".to_string(),
                        status: TaskStatus::Done,
                        completed: false,
                        user_id: 1,
                    }]
                } else {
                    Vec::new()
                },
            })
            .collect();
        app.store = Store::new(Collection::Users(users));
        app.state.select(Some(0));

        let screen = render(&mut app);
        assert!(screen.contains("Users (5 of 7)"));
        assert!(screen.contains("Person 5"));
        assert!(!screen.contains("Person 6"));
        assert!(screen.contains("[ ] Water plants  Done"));
    }

    #[test]
    fn test_products_page_renders_price_and_description() {
        let mut app = logged_in();
        app.page = Page::Products;
        app.store = Store::new(Collection::Products(vec![Product {
            id: 1,
            title: "Backpack".to_string(),
            description: "Fits a laptop".to_string(),
            price: 109.95,
            image: String::new(),
            category: Some("bags".to_string()),
        }]));
        app.state.select(Some(0));

        let screen = render(&mut app);
        assert!(screen.contains("$109.95"));
        assert!(screen.contains("Fits a laptop"));
        assert!(screen.contains("Category: bags"));
    }

    #[test]
    fn test_mismatched_collection_is_not_rendered() {
        let mut app = logged_in();
        app.page = Page::Products;
        app.loading = true;
        app.store = Store::new(Collection::Users(Vec::new()));
        let screen = render(&mut app);
        assert!(screen.contains("Loading..."));
        assert!(!screen.contains("Users ("));
    }

    #[test]
    fn test_modal_shows_validation_error() {
        let mut app = logged_in();
        let mut form = UserForm::new();
        form.error = Some("Email is required".to_string());
        app.modal = Some(Modal::User(form));
        app.input_mode = InputMode::Editing;
        let screen = render(&mut app);
        assert!(screen.contains("Create User"));
        assert!(screen.contains("Email is required"));
    }

    #[test]
    fn test_popup_width_on_wide_frames() {
        assert_eq!(popup_width(100), 60);
        assert_eq!(popup_width(20), 20);
        assert_eq!(popup_width(u16::MAX), 39321);
    }

    #[test]
    fn test_modal_renders_on_a_very_wide_terminal() {
        let mut app = logged_in();
        app.modal = Some(Modal::User(UserForm::new()));
        app.input_mode = InputMode::Editing;
        let mut terminal = Terminal::new(TestBackend::new(1200, 30)).unwrap();
        terminal.draw(|f| draw(f, &mut app)).unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("Create User"));
    }

    #[test]
    fn test_ansi_to_text_strips_escapes() {
        let lines = ansi_to_text("\x1b[1mBold\x1b[0m text\nsecond");
        assert_eq!(lines.len(), 2);
        let first: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(first, "Bold text");
    }
}
