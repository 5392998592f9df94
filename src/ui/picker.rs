// src/ui/picker.rs

use std::io::{self, IsTerminal};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Terminal, TerminalOptions, Viewport,
};
use unicode_width::UnicodeWidthChar;

const VISIBLE_ROWS: u16 = 10;

const GREEN: Color = Color::Rgb(0, 220, 140);
const DIM: Color = Color::Rgb(140, 140, 140);

#[derive(Debug, Clone)]
pub struct Choice<T> {
    pub title: String,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T> {
    Chosen(T),
    Cancelled,
}

pub type Filter<'a> = &'a dyn Fn(&str, &str) -> bool;

/// Something that lets the user pick one value out of a labelled list.
pub trait Selector {
    fn select<T: Clone>(
        &mut self,
        prompt: &str,
        choices: &[Choice<T>],
        filter: Filter<'_>,
    ) -> io::Result<Selection<T>>;
}

/// Non-interactive: always the first choice.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstChoice;

impl Selector for FirstChoice {
    fn select<T: Clone>(
        &mut self,
        _prompt: &str,
        choices: &[Choice<T>],
        _filter: Filter<'_>,
    ) -> io::Result<Selection<T>> {
        Ok(choices
            .first()
            .map(|c| Selection::Chosen(c.value.clone()))
            .unwrap_or(Selection::Cancelled))
    }
}

/* ============================================================
   Picker state (terminal independent)
   ============================================================ */

#[derive(Debug)]
pub struct PickerState {
    pub input: String,
    pub selected: usize,
    visible: Vec<usize>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Chosen(usize),
    Cancelled,
}

impl PickerState {
    pub fn new<T>(choices: &[Choice<T>]) -> Self {
        Self {
            input: String::new(),
            selected: 0,
            visible: (0..choices.len()).collect(),
        }
    }

    /// Indices into the original choice list that pass the filter.
    pub fn visible(&self) -> &[usize] {
        &self.visible
    }

    fn refilter<T>(&mut self, choices: &[Choice<T>], filter: Filter<'_>) {
        self.visible = choices
            .iter()
            .enumerate()
            .filter(|(_, c)| self.input.is_empty() || filter(&c.title, &self.input))
            .map(|(i, _)| i)
            .collect();
        self.selected = self.selected.min(self.visible.len().saturating_sub(1));
    }

    pub fn handle_key<T>(&mut self, key: KeyEvent, choices: &[Choice<T>], filter: Filter<'_>) -> KeyOutcome {
        if key.kind != KeyEventKind::Press {
            return KeyOutcome::Continue;
        }

        match key.code {
            KeyCode::Esc => KeyOutcome::Cancelled,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyOutcome::Cancelled,
            KeyCode::Enter => match self.visible.get(self.selected) {
                Some(&idx) => KeyOutcome::Chosen(idx),
                None => KeyOutcome::Continue,
            },
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                KeyOutcome::Continue
            }
            KeyCode::Down | KeyCode::Tab => {
                if self.selected + 1 < self.visible.len() {
                    self.selected += 1;
                }
                KeyOutcome::Continue
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.refilter(choices, filter);
                KeyOutcome::Continue
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.push(c);
                self.selected = 0;
                self.refilter(choices, filter);
                KeyOutcome::Continue
            }
            _ => KeyOutcome::Continue,
        }
    }
}

/* ============================================================
   Terminal picker
   ============================================================ */

/// Inline list on stderr: type to narrow, arrows to move, Enter to run.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPicker;

impl TerminalPicker {
    pub fn available() -> bool {
        io::stdin().is_terminal() && io::stderr().is_terminal()
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

impl Selector for TerminalPicker {
    fn select<T: Clone>(
        &mut self,
        prompt: &str,
        choices: &[Choice<T>],
        filter: Filter<'_>,
    ) -> io::Result<Selection<T>> {
        if choices.is_empty() {
            return Ok(Selection::Cancelled);
        }

        let _raw = RawMode::enable()?;
        let mut terminal = Terminal::with_options(
            CrosstermBackend::new(io::stderr()),
            TerminalOptions {
                viewport: Viewport::Inline(VISIBLE_ROWS + 1),
            },
        )?;

        let mut state = PickerState::new(choices);
        let outcome = loop {
            draw(&mut terminal, prompt, choices, &state)?;

            if let Event::Key(key) = event::read()? {
                match state.handle_key(key, choices, filter) {
                    KeyOutcome::Continue => {}
                    KeyOutcome::Chosen(idx) => break Selection::Chosen(choices[idx].value.clone()),
                    KeyOutcome::Cancelled => break Selection::Cancelled,
                }
            }
        };

        terminal.clear()?;
        terminal.show_cursor()?;
        Ok(outcome)
    }
}

fn draw<T>(
    terminal: &mut Terminal<CrosstermBackend<io::Stderr>>,
    prompt: &str,
    choices: &[Choice<T>],
    state: &PickerState,
) -> io::Result<()> {
    terminal.draw(|f| {
        let area = f.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1)])
            .split(area);

        let header = Line::from(vec![
            Span::styled("? ", Style::default().fg(GREEN).add_modifier(Modifier::BOLD)),
            Span::styled(prompt, Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(" › ", Style::default().fg(DIM)),
            Span::raw(state.input.as_str()),
        ]);
        f.render_widget(Paragraph::new(header), chunks[0]);

        let width = chunks[1].width.saturating_sub(2) as usize;
        let items: Vec<ListItem> = state
            .visible()
            .iter()
            .map(|&i| ListItem::new(fit(&choices[i].title, width)))
            .collect();

        let list = List::new(items)
            .highlight_style(Style::default().fg(GREEN).add_modifier(Modifier::BOLD))
            .highlight_symbol("❯ ");

        let mut list_state = ListState::default();
        if !state.visible().is_empty() {
            list_state.select(Some(state.selected));
        }
        f.render_stateful_widget(list, chunks[1], &mut list_state);
    })?;
    Ok(())
}

/// Truncates to `width` display columns, marking the cut with `…`.
pub fn fit(text: &str, width: usize) -> String {
    let total: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= width {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::title_filter;

    fn choices() -> Vec<Choice<u32>> {
        ["login works", "user login", "logout works"]
            .iter()
            .zip(1..)
            .map(|(t, v)| Choice {
                title: t.to_string(),
                value: v,
            })
            .collect()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_narrows_with_the_callers_filter() {
        let cs = choices();
        let mut st = PickerState::new(&cs);
        for c in "LOGIN".chars() {
            st.handle_key(key(KeyCode::Char(c)), &cs, &title_filter);
        }
        assert_eq!(st.visible(), &[0, 1]);

        st.handle_key(key(KeyCode::Down), &cs, &title_filter);
        assert_eq!(st.handle_key(key(KeyCode::Enter), &cs, &title_filter), KeyOutcome::Chosen(1));
    }

    #[test]
    fn escape_and_ctrl_c_cancel() {
        let cs = choices();
        let mut st = PickerState::new(&cs);
        assert_eq!(st.handle_key(key(KeyCode::Esc), &cs, &title_filter), KeyOutcome::Cancelled);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(st.handle_key(ctrl_c, &cs, &title_filter), KeyOutcome::Cancelled);
    }

    #[test]
    fn enter_with_nothing_visible_does_nothing() {
        let cs = choices();
        let mut st = PickerState::new(&cs);
        for c in "zzz".chars() {
            st.handle_key(key(KeyCode::Char(c)), &cs, &title_filter);
        }
        assert!(st.visible().is_empty());
        assert_eq!(st.handle_key(key(KeyCode::Enter), &cs, &title_filter), KeyOutcome::Continue);

        st.handle_key(key(KeyCode::Backspace), &cs, &title_filter);
        st.handle_key(key(KeyCode::Backspace), &cs, &title_filter);
        st.handle_key(key(KeyCode::Backspace), &cs, &title_filter);
        assert_eq!(st.visible().len(), 3);
    }

    #[test]
    fn first_choice_selector() {
        let cs = choices();
        assert_eq!(FirstChoice.select("x", &cs, &title_filter).unwrap(), Selection::Chosen(1));
        let none: Vec<Choice<u32>> = Vec::new();
        assert_eq!(FirstChoice.select("x", &none, &title_filter).unwrap(), Selection::Cancelled);
    }

    #[test]
    fn fit_respects_display_width() {
        assert_eq!(fit("short", 10), "short");
        assert_eq!(fit("abcdefghij", 5), "abcd…");
        assert_eq!(fit("日本語テスト", 5), "日本…");
    }
}
