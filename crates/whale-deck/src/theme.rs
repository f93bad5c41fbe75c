use ratatui::style::{Color, Modifier, Style};
use whale_core::ContainerState;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const CURSOR_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const CHECK_STYLE: Style = Style::new().fg(Color::Rgb(115, 245, 159));
pub const HINT_STYLE: Style = Style::new().fg(Color::Rgb(160, 160, 160));
pub const LOG_STYLE: Style = Style::new().fg(Color::Rgb(250, 189, 47));
pub const STALE_STYLE: Style = Style::new().fg(Color::Rgb(254, 90, 95));
pub const KEY_STYLE: Style = Style::new().fg(Color::Cyan);

/// Colour the state glyph takes on the "off" beat while an action is pending.
pub const BLINK_COLOR: Color = Color::Rgb(28, 28, 28);

pub mod icons {
    pub const CURSOR: &str = ">";
    pub const CHECK: &str = "x";
    pub const STATE: &str = "*";
    pub const IN_USE: &str = "+";
}

pub fn zebra_row_style(index: usize) -> Style {
    let bg = if index % 2 == 0 {
        Color::Rgb(18, 20, 26)
    } else {
        Color::Rgb(24, 27, 34)
    };
    Style::new().bg(bg)
}

pub fn state_color(state: ContainerState) -> Color {
    match state {
        ContainerState::Created => Color::Rgb(197, 159, 201),
        ContainerState::Running => Color::Rgb(184, 187, 38),
        ContainerState::Paused => Color::Rgb(228, 179, 99),
        ContainerState::Restarting => Color::Rgb(239, 200, 139),
        ContainerState::Removing => Color::Rgb(214, 93, 14),
        ContainerState::Exited => Color::Rgb(239, 100, 97),
        ContainerState::Dead => Color::Rgb(60, 60, 60),
        ContainerState::Unknown => Color::Rgb(146, 131, 116),
    }
}

/// Style for a resource's state glyph, dimmed on alternate ticks while it is transitioning.
pub fn state_glyph_style(state: ContainerState, transitioning: bool, blink: bool) -> Style {
    if transitioning && blink {
        Style::new().fg(BLINK_COLOR)
    } else {
        Style::new().fg(state_color(state))
    }
}
