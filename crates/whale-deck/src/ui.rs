use crate::state::{App, Page};
use crate::theme::{self, icons};
use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};
use whale_core::{ContainerRecord, ImageRecord, ResourceKind, VolumeRecord};

const CONTAINER_KEYS: &[(&str, &str)] = &[
    ("u", "start"),
    ("s", "stop"),
    ("r", "restart"),
    ("p", "pause"),
    ("P", "unpause"),
    ("K", "kill"),
    ("X", "remove"),
];
const NAME_WIDTH: usize = 32;
const DETAIL_MIN_WIDTH: u16 = 100;

pub fn render(f: &mut Frame, app: &App) {
    let area = f.size();
    let log_height = if app.logs.is_empty() {
        0
    } else {
        (app.logs.lines().count() as u16 + 2).min(app.height / 3).max(3)
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(log_height),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    render_tabs(f, app, chunks[0]);
    if app.page == Page::Help {
        render_help(f, chunks[1]);
    } else if app.width < DETAIL_MIN_WIDTH {
        render_list(f, app, chunks[1]);
    } else {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[1]);
        render_list(f, app, body[0]);
        render_details(f, app, body[1]);
    }
    if log_height > 0 {
        render_log(f, app, chunks[2]);
    }
    render_status(f, app, chunks[3]);
    render_hints(f, app, chunks[4]);
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();
    for (idx, page) in Page::RESOURCE_PAGES.iter().enumerate() {
        let count = page.kind().map(|k| app.inventory.len_of(k)).unwrap_or(0);
        let label = format!(" {} {} ({count}) ", idx + 1, page.title());
        let style = if *page == app.page {
            theme::CURSOR_STYLE
        } else {
            theme::HINT_STYLE
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }
    if app.page == Page::Help {
        spans.push(Span::styled(" ? Controls ", theme::CURSOR_STYLE));
    }
    if !app.ledger.is_empty() {
        spans.push(Span::styled(
            format!("  {} pending", app.ledger.len()),
            theme::LOG_STYLE,
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_list(f: &mut Frame, app: &App, area: Rect) {
    let Some(kind) = app.page.kind() else {
        return;
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(app.page.title())
        .border_style(Style::default().fg(Color::Cyan));

    if app.inventory.len_of(kind) == 0 {
        let text = Paragraph::new(Line::from(Span::styled(
            format!("No {} found", kind.plural()),
            theme::HINT_STYLE,
        )))
        .block(block);
        f.render_widget(text, area);
        return;
    }

    let (header, widths, rows) = match kind {
        ResourceKind::Container => container_rows(app),
        ResourceKind::Image => image_rows(app),
        ResourceKind::Volume => volume_rows(app),
    };

    let table = Table::new(rows, widths)
        .header(header.style(theme::HEADER_STYLE))
        .block(block)
        .highlight_style(theme::CURSOR_STYLE);

    let mut state = TableState::default().with_selected(app.cursor);
    f.render_stateful_widget(table, area, &mut state);
}

fn marker_cells(app: &App, idx: usize) -> [Cell<'static>; 2] {
    let cursor = if app.cursor == Some(idx) {
        icons::CURSOR
    } else {
        " "
    };
    let check = if app.is_selected(idx) {
        icons::CHECK
    } else {
        " "
    };
    [
        Cell::from(cursor),
        Cell::from(Span::styled(check, theme::CHECK_STYLE)),
    ]
}

fn container_rows(app: &App) -> (Row<'static>, Vec<Constraint>, Vec<Row<'static>>) {
    let rows = app
        .inventory
        .containers
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let transitioning = app.is_transitioning(ResourceKind::Container, &c.id);
            let [cursor, check] = marker_cells(app, idx);
            Row::new(vec![
                cursor,
                check,
                Cell::from(Span::styled(
                    icons::STATE,
                    theme::state_glyph_style(c.state, transitioning, app.blink),
                )),
                Cell::from(truncate(&c.name, NAME_WIDTH)),
                Cell::from(c.image.clone()),
                Cell::from(c.status.clone()),
            ])
            .style(theme::zebra_row_style(idx))
        })
        .collect();
    let widths = vec![
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Percentage(35),
        Constraint::Percentage(35),
        Constraint::Min(10),
    ];
    let header = Row::new(vec!["", "", "", "Name", "Image", "Status"]);
    (header, widths, rows)
}

fn image_rows(app: &App) -> (Row<'static>, Vec<Constraint>, Vec<Row<'static>>) {
    let rows = app
        .inventory
        .images
        .iter()
        .enumerate()
        .map(|(idx, image)| {
            let transitioning = app.is_transitioning(ResourceKind::Image, &image.id);
            let in_use = !app.inventory.active_dependents(&image.id).is_empty();
            let [cursor, check] = marker_cells(app, idx);
            Row::new(vec![
                cursor,
                check,
                idle_glyph(in_use, transitioning, app.blink),
                Cell::from(image_label(image)),
                Cell::from(short_id(&image.id).to_string()),
                Cell::from(format_size(image.size)),
                Cell::from(format_age(image.created)),
            ])
            .style(theme::zebra_row_style(idx))
        })
        .collect();
    let widths = vec![
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Percentage(45),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Min(10),
    ];
    let header = Row::new(vec!["", "", "", "Tag", "ID", "Size", "Created"]);
    (header, widths, rows)
}

fn volume_rows(app: &App) -> (Row<'static>, Vec<Constraint>, Vec<Row<'static>>) {
    let rows = app
        .inventory
        .volumes
        .iter()
        .enumerate()
        .map(|(idx, volume)| {
            let transitioning = app.is_transitioning(ResourceKind::Volume, &volume.name);
            let in_use = !app.inventory.volume_users(&volume.name).is_empty();
            let [cursor, check] = marker_cells(app, idx);
            Row::new(vec![
                cursor,
                check,
                idle_glyph(in_use, transitioning, app.blink),
                Cell::from(volume.name.clone()),
                Cell::from(volume.driver.clone()),
                Cell::from(format_age(volume.created)),
            ])
            .style(theme::zebra_row_style(idx))
        })
        .collect();
    let widths = vec![
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Percentage(50),
        Constraint::Length(10),
        Constraint::Min(10),
    ];
    let header = Row::new(vec!["", "", "", "Name", "Driver", "Created"]);
    (header, widths, rows)
}

/// Images and volumes have no lifecycle; while a removal is pending the marker blinks anyway.
fn idle_glyph(in_use: bool, transitioning: bool, blink: bool) -> Cell<'static> {
    let (glyph, style) = match (transitioning, in_use) {
        (true, _) if blink => (icons::STATE, Style::new().fg(theme::BLINK_COLOR)),
        (true, _) => (icons::STATE, theme::LOG_STYLE),
        (false, true) => (icons::IN_USE, theme::CHECK_STYLE),
        (false, false) => (" ", Style::new()),
    };
    Cell::from(Span::styled(glyph, style))
}

fn render_details(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Details");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(cursor) = app.cursor else {
        return;
    };
    let lines = match app.page {
        Page::Containers => app
            .inventory
            .containers
            .get(cursor)
            .map(|c| container_details(app, c)),
        Page::Images => app.inventory.images.get(cursor).map(|i| image_details(app, i)),
        Page::Volumes => app
            .inventory
            .volumes
            .get(cursor)
            .map(|v| volume_details(app, v)),
        Page::Help => None,
    };
    if let Some(lines) = lines {
        f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    }
}

fn field(label: &str, value: impl Into<String>) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(Color::DarkGray)),
        Span::raw(value.into()),
    ])
}

fn container_details(app: &App, c: &ContainerRecord) -> Vec<Line<'static>> {
    let mut lines = vec![
        field("Name", c.name.clone()),
        field("ID", short_id(&c.id)),
        Line::from(vec![
            Span::styled("State: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                c.state.as_str(),
                Style::default().fg(theme::state_color(c.state)),
            ),
        ]),
        field("Status", c.status.clone()),
        field("Image", c.image.clone()),
    ];
    if !c.command.is_empty() {
        lines.push(field("Cmd", c.command.clone()));
    }
    if !c.ip_addresses.is_empty() {
        lines.push(field("IP", c.ip_addresses.join(", ")));
    }
    if !c.ports.is_empty() {
        let ports: Vec<String> = c
            .ports
            .iter()
            .map(|p| match p.public_port {
                Some(public) => format!("{public}->{}/{}", p.private_port, p.protocol),
                None => format!("{}/{}", p.private_port, p.protocol),
            })
            .collect();
        lines.push(field("Ports", ports.join(", ")));
    }
    if !c.volumes.is_empty() {
        lines.push(field("Volumes", c.volumes.join(", ")));
    }
    if let Some(desired) = app.ledger.desired(ResourceKind::Container, &c.id) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("waiting for {desired}"),
            theme::LOG_STYLE,
        )));
    }
    lines
}

fn image_details(app: &App, image: &ImageRecord) -> Vec<Line<'static>> {
    let mut lines = vec![
        field("ID", short_id(&image.id)),
        field("Tags", image.tags.join(", ")),
        field("Size", format_size(image.size)),
        field("Created", format_time(image.created)),
    ];
    let users = app.inventory.active_dependents(&image.id);
    if !users.is_empty() {
        let names: Vec<&str> = users.iter().map(|c| c.name.as_str()).collect();
        lines.push(field("Used by", names.join(", ")));
    }
    lines
}

fn volume_details(app: &App, volume: &VolumeRecord) -> Vec<Line<'static>> {
    let mut lines = vec![
        field("Name", volume.name.clone()),
        field("Driver", volume.driver.clone()),
        field("Mountpoint", volume.mount_point.clone()),
        field("Created", format_time(volume.created)),
    ];
    let users = app.inventory.volume_users(&volume.name);
    if !users.is_empty() {
        let names: Vec<&str> = users.iter().map(|c| c.name.as_str()).collect();
        lines.push(field("Mounted by", names.join(", ")));
    }
    lines
}

fn render_log(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .logs
        .lines()
        .map(|line| Line::from(Span::styled(line.to_string(), theme::LOG_STYLE)))
        .collect();
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Last action"))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let stale = app
        .page
        .kind()
        .and_then(|kind| app.poll_errors.get(&kind).map(|err| (kind, err)));
    let line = match stale {
        Some((kind, err)) => Line::from(Span::styled(
            format!("{} may be stale: {err}", kind.plural()),
            theme::STALE_STYLE,
        )),
        None if !app.selected.is_empty() => Line::from(Span::styled(
            format!("{} selected", app.selected.len()),
            theme::CHECK_STYLE,
        )),
        None => Line::from(""),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn render_hints(f: &mut Frame, app: &App, area: Rect) {
    let mut keys: Vec<(&str, &str)> = match app.page {
        Page::Containers => CONTAINER_KEYS.to_vec(),
        Page::Images | Page::Volumes => vec![("X", "remove")],
        Page::Help => vec![("Esc", "back")],
    };
    keys.extend([("space", "select"), ("A", "all"), ("tab", "page"), ("?", "help"), ("q", "quit")]);

    let mut spans = Vec::new();
    for (key, action) in keys {
        spans.push(Span::styled(key, theme::KEY_STYLE));
        spans.push(Span::styled(format!(" {action}  "), theme::HINT_STYLE));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Controls")
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let sections: [(&str, &[(&str, &str)]); 3] = [
        (
            "Navigation",
            &[
                ("k / Up", "Cursor up (wraps)"),
                ("j / Down", "Cursor down (wraps)"),
                ("1 2 3", "Containers, images, volumes"),
                ("Tab / S-Tab", "Next / previous page"),
                ("?", "Toggle this page"),
                ("q / Ctrl+C", "Quit"),
            ],
        ),
        (
            "Selection",
            &[
                ("Space / Enter", "Toggle row under cursor"),
                ("A / Ctrl+A", "Select all, again to clear"),
                ("Esc", "Clear selection and log"),
            ],
        ),
        (
            "Actions (selection, else cursor row)",
            &[
                ("u", "Start exited or created containers"),
                ("s", "Stop running or restarting containers"),
                ("r", "Restart running containers"),
                ("p / P", "Pause / unpause"),
                ("K", "Kill running containers"),
                ("X", "Remove container, image or volume"),
            ],
        ),
    ];

    let mut lines = Vec::new();
    for (title, entries) in sections {
        lines.push(Line::from(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for (key, what) in entries {
            lines.push(Line::from(vec![
                Span::styled(format!("  {key:<14}"), theme::KEY_STYLE),
                Span::raw(*what),
            ]));
        }
        lines.push(Line::from(""));
    }
    f.render_widget(Paragraph::new(lines), inner);
}

fn image_label(image: &ImageRecord) -> String {
    match image.tags.as_slice() {
        [] => short_id(&image.id).to_string(),
        [only] => only.clone(),
        [first, rest @ ..] => format!("{first} (+{})", rest.len()),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

pub fn short_id(id: &str) -> &str {
    let bare = id.strip_prefix("sha256:").unwrap_or(id);
    bare.get(..12).unwrap_or(bare)
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_time(created: Option<DateTime<Utc>>) -> String {
    created
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_age(created: Option<DateTime<Utc>>) -> String {
    let Some(at) = created else {
        return "-".to_string();
    };
    let age = Utc::now().signed_duration_since(at);
    if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else {
        format!("{}m ago", age.num_minutes().max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_use_decimal_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1_500), "1.5 kB");
        assert_eq!(format_size(187_000_000), "187.0 MB");
    }

    #[test]
    fn short_id_strips_digest_prefix() {
        assert_eq!(short_id("sha256:0123456789abcdef"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn long_names_are_cut_to_width() {
        assert_eq!(truncate("web", 5), "web");
        assert_eq!(truncate("very-long-name", 5), "very~");
    }

    #[test]
    fn image_label_counts_extra_tags() {
        let image = ImageRecord {
            id: "sha256:ff".to_string(),
            tags: vec!["app:1".to_string(), "app:latest".to_string()],
            size: 0,
            created: None,
        };
        assert_eq!(image_label(&image), "app:1 (+1)");
    }
}
