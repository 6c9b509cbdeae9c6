//! Small TUI pieces: a single-line input popup, the history picker, and
//! single-key prompts.

use crate::history::HistoryEntry;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::Stylize,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use std::io::{self, Stdout, Write};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

type Term = Terminal<CrosstermBackend<Stdout>>;

/// Result of the input popup.
#[derive(Debug, PartialEq)]
pub enum InputResult {
    /// User submitted text.
    Submitted(String),
    /// User cancelled (Escape, Ctrl+C, or empty input).
    Cancelled,
}

/// Next step chosen after an interactive enhancement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Refine,
    Style,
    Copy,
    Quit,
    Invalid,
}

impl Action {
    fn from_key(key: &KeyEvent) -> Self {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }
        match key.code {
            KeyCode::Char('r') | KeyCode::Char('R') => Action::Refine,
            KeyCode::Char('s') | KeyCode::Char('S') => Action::Style,
            KeyCode::Char('c') | KeyCode::Char('C') => Action::Copy,
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Action::Quit,
            _ => Action::Invalid,
        }
    }
}

/// Enter the alternate screen, run `f`, and always restore the terminal.
fn with_terminal<T>(f: impl FnOnce(&mut Term) -> Result<T>) -> Result<T> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = f(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Next key press, ignoring releases and repeats.
fn next_key_press() -> Result<KeyEvent> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(key);
            }
        }
    }
}

/// Ask for a line of text in a centered popup.
pub fn prompt_input(title: &str, initial: Option<String>) -> Result<InputResult> {
    with_terminal(|terminal| run_input_loop(terminal, title, initial))
}

fn run_input_loop(terminal: &mut Term, title: &str, initial: Option<String>) -> Result<InputResult> {
    let mut input = Input::default();
    if let Some(value) = initial {
        input = input.with_value(value);
    }

    loop {
        terminal.draw(|frame| draw_input(frame, title, &input))?;

        let key = next_key_press()?;
        match key.code {
            KeyCode::Enter => {
                let value = input.value().trim().to_string();
                if value.is_empty() {
                    return Ok(InputResult::Cancelled);
                }
                return Ok(InputResult::Submitted(value));
            }
            KeyCode::Esc => return Ok(InputResult::Cancelled),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(InputResult::Cancelled);
            }
            _ => {
                input.handle_event(&Event::Key(key));
            }
        }
    }
}

fn draw_input(frame: &mut Frame, title: &str, input: &Input) {
    let size = frame.area();

    let popup_width = size.width.saturating_sub(4).min(100);
    let popup_area = centered_rect(popup_width, 3, size);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(format!(" {} ", title))
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner_area = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let input_width = inner_area.width as usize;
    let cursor_pos = input.visual_cursor();
    let scroll = input_scroll(cursor_pos, input_width);
    let visible_value: String = input.value().chars().skip(scroll).take(input_width).collect();

    let paragraph = Paragraph::new(Line::from(vec![Span::styled(
        visible_value,
        Style::default().fg(Color::White),
    )]));
    frame.render_widget(paragraph, inner_area);

    let cursor_x = inner_area.x + (cursor_pos - scroll) as u16;
    frame.set_cursor_position((cursor_x, inner_area.y));
}

/// Horizontal scroll that keeps the cursor visible. Never exceeds
/// `cursor_pos`, even when the field has no width at all.
fn input_scroll(cursor_pos: usize, width: usize) -> usize {
    let width = width.max(1);
    if cursor_pos >= width {
        cursor_pos - width + 1
    } else {
        0
    }
}

/// Let the user pick a history entry. Newest entries are listed first.
/// Returns the index into `entries`.
pub fn pick_history(entries: &[HistoryEntry]) -> Result<Option<usize>> {
    if entries.is_empty() {
        return Ok(None);
    }
    with_terminal(|terminal| run_picker_loop(terminal, entries))
}

fn run_picker_loop(terminal: &mut Term, entries: &[HistoryEntry]) -> Result<Option<usize>> {
    let labels: Vec<String> = entries
        .iter()
        .rev()
        .map(|e| format!("{}  {}", e.timestamp.format("%Y-%m-%d %H:%M"), e.label(50)))
        .collect();
    let mut state = ListState::default();
    state.select(Some(0));

    loop {
        terminal.draw(|frame| draw_picker(frame, &labels, &mut state))?;

        let key = next_key_press()?;
        let selected = state.selected().unwrap_or(0);
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                state.select(Some(next_index(selected, labels.len())));
            }
            KeyCode::Up | KeyCode::Char('k') => {
                state.select(Some(prev_index(selected, labels.len())));
            }
            KeyCode::Enter => return Ok(Some(entries.len() - 1 - selected)),
            KeyCode::Esc | KeyCode::Char('q') => return Ok(None),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(None);
            }
            _ => {}
        }
    }
}

fn next_index(current: usize, len: usize) -> usize {
    if current + 1 >= len {
        0
    } else {
        current + 1
    }
}

fn prev_index(current: usize, len: usize) -> usize {
    if current == 0 {
        len.saturating_sub(1)
    } else {
        current - 1
    }
}

fn draw_picker(frame: &mut Frame, labels: &[String], state: &mut ListState) {
    let size = frame.area();
    let width = size.width.saturating_sub(4).min(120);
    let height = (labels.len() as u16 + 2).min(size.height.saturating_sub(2)).max(3);
    let area = centered_rect(width, height, size);
    frame.render_widget(Clear, area);

    let items: Vec<ListItem> = labels.iter().map(|l| ListItem::new(l.as_str())).collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(" Select a history entry (Enter to view, Esc to cancel) ")
                .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, state);
}

/// Print a question and wait for a single key.
fn ask_key(question: &str) -> Result<KeyEvent> {
    print!("{} ", question);
    io::stdout().flush()?;
    enable_raw_mode()?;
    let key = next_key_press();
    disable_raw_mode()?;
    println!();
    key
}

/// Ask which step to take after an interactive enhancement.
pub fn read_action() -> Result<Action> {
    let question = format!(
        "{} {}efine, {}tyle, {}opy, {}uit:",
        "Choose action:".blue().bold(),
        "(r)".bold(),
        "(s)".bold(),
        "(c)".bold(),
        "(q)".bold()
    );
    Ok(Action::from_key(&ask_key(&question)?))
}

/// Yes/no question; anything but `y` is no.
pub fn confirm(question: &str) -> Result<bool> {
    let key = ask_key(&format!("{} [y/N]", question))?;
    Ok(matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')))
}

/// Create a centered rectangle.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height.saturating_sub(height)) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length((area.width.saturating_sub(width)) / 2),
            Constraint::Length(width),
            Constraint::Min(0),
        ])
        .split(vertical[1]);

    horizontal[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 100, 50);
        let centered = centered_rect(40, 10, area);
        assert_eq!(centered.width, 40);
        assert_eq!(centered.height, 10);
        assert_eq!(centered.x, 30);
        assert_eq!(centered.y, 20);
    }

    #[test]
    fn test_input_scroll() {
        assert_eq!(input_scroll(5, 20), 0);
        assert_eq!(input_scroll(20, 20), 1);
        assert_eq!(input_scroll(25, 10), 16);
        assert_eq!(input_scroll(0, 0), 0);
        assert_eq!(input_scroll(7, 0), 7);
    }

    #[test]
    fn test_picker_wraps_around() {
        assert_eq!(next_index(2, 3), 0);
        assert_eq!(next_index(0, 3), 1);
        assert_eq!(prev_index(0, 3), 2);
        assert_eq!(prev_index(2, 3), 1);
    }

    #[test]
    fn test_action_keys() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(Action::from_key(&key(KeyCode::Char('r'))), Action::Refine);
        assert_eq!(Action::from_key(&key(KeyCode::Char('S'))), Action::Style);
        assert_eq!(Action::from_key(&key(KeyCode::Char('c'))), Action::Copy);
        assert_eq!(Action::from_key(&key(KeyCode::Esc)), Action::Quit);
        assert_eq!(Action::from_key(&key(KeyCode::Char('x'))), Action::Invalid);
        assert_eq!(
            Action::from_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        );
    }
}
