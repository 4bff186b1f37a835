use ratatui::{
    Frame,
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, List, ListItem, ListState, Paragraph},
};

use crate::account::Account;
use crate::app::App;
use crate::scheduler::Phase;

const PRIMARY: Color = Color::Rgb(0x6f, 0x8f, 0x92);
const CODE_WIDTH: usize = 16;
const DURATION_WIDTH: usize = 4;
// cursor marker, borders and separating spaces
const EXTRA_WIDTH: usize = 6;
const HINTS: &str = " ↑/k ↓/j move · c/enter copy · q quit ";

pub fn render(frame: &mut Frame, app: &App, now_unix: i64) {
    let area = frame.area();

    let footer = match app.last_error() {
        Some(err) => Line::from(Span::styled(format!(" {err} "), Style::new().fg(Color::Red))),
        None => Line::from(HINTS),
    };
    let mut title = vec![Span::raw(" otpdash ")];
    if app.scheduler().phase() == Phase::Polling {
        title.push(Span::raw("· refreshing "));
    }
    if app.touches_pending() > 0 {
        title.push(Span::styled("· touch your key ", Style::new().add_modifier(Modifier::BOLD)));
    }
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::new().fg(PRIMARY))
        .title(Line::from(title))
        .title_bottom(footer);

    if app.accounts().is_empty() {
        let text = if app.loaded() {
            "No accounts on this key"
        } else {
            "Reading key..."
        };
        let placeholder = Paragraph::new(text)
            .style(Style::new().fg(PRIMARY))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let label_width = (area.width as usize).saturating_sub(CODE_WIDTH + DURATION_WIDTH + EXTRA_WIDTH);
    let items: Vec<ListItem> = app
        .accounts()
        .iter()
        .enumerate()
        .map(|(i, account)| {
            let selected = i == app.cursor();
            ListItem::new(row(account, app.message(&account.identity), selected, label_width, now_unix))
        })
        .collect();

    let list = List::new(items).style(Style::new().fg(PRIMARY)).block(block);
    let mut state = ListState::default().with_selected(Some(app.cursor()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn row<'a>(
    account: &'a Account,
    message: Option<&'a str>,
    selected: bool,
    label_width: usize,
    now_unix: i64,
) -> Line<'a> {
    let marker = if selected { "> " } else { "  " };
    let label = truncate(&display_name(account), label_width);
    let shown = message.unwrap_or(&account.code);

    let label_style = if selected {
        Style::new().add_modifier(Modifier::BOLD)
    } else {
        Style::new()
    };

    Line::from(vec![
        Span::raw(marker),
        Span::styled(format!("{label:<label_width$}"), label_style),
        Span::raw(" "),
        Span::raw(format!("{shown:>CODE_WIDTH$}")),
        Span::raw(" "),
        Span::raw(format!("{:>DURATION_WIDTH$}", account.duration_label(now_unix))),
    ])
}

fn display_name(account: &Account) -> String {
    if account.label.is_empty() {
        account.issuer.clone()
    } else {
        format!("{} ({})", account.issuer, account.label)
    }
}

fn truncate(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width || width <= 3 {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width - 3).collect();
    out.push_str("...");
    out
}
