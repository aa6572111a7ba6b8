//! Full-screen terminal wizard backend
//!
//! The event-driven counterpart to the console backend. `page()` and the
//! prompt calls only register content; nothing is evaluated or shown until
//! `run()` enters the event loop. Input fields keep live bindings: every
//! keystroke commits the normalized value into the site model and navigation
//! enablement is recomputed from the current page's fields. Provisioning
//! steps execute when their page is shown, one per redraw, so the user sees
//! pending → running → done as it happens; the cancel key is simply never
//! processed while a step runs because steps run to completion on the UI
//! thread.
//!
//! All navigation and step logic lives on plain methods so tests can drive
//! the wizard with synthetic key events, without a terminal.

use std::io::stdout;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tracing::{debug, warn};

use crate::error::{Result, SiteError};
use crate::ui::flow::PageFlow;
use crate::ui::{Choice, InputSpec, NormalizeFn, OnShowFn, PageId, PageOptions, StepFn, StoreFn,
    UiToolkit, VisibleFn};

/// Lifecycle of one provisioning step as rendered on its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
    /// Never ran because an earlier step failed.
    Skipped,
}

enum Widget {
    Text(String),
    Link(String),
    List {
        title: String,
        items: Vec<String>,
    },
    Input {
        prompt: String,
        value: String,
        masked: bool,
        normalize: Option<NormalizeFn>,
        store: StoreFn,
    },
    Choice {
        prompt: String,
        choices: Vec<Choice>,
        selected: usize,
        store: StoreFn,
    },
    Step {
        label: String,
        status: StepStatus,
        action: StepFn,
    },
}

impl Widget {
    fn is_interactive(&self) -> bool {
        matches!(self, Self::Input { .. } | Self::Choice { .. })
    }
}

struct TuiPage {
    title: String,
    allow_back: bool,
    visible: Option<VisibleFn>,
    on_show: Vec<OnShowFn>,
    widgets: Vec<Widget>,
}

/// The full-screen wizard backend.
pub struct TuiWizard {
    pages: Vec<TuiPage>,
    flow: PageFlow,
    started: bool,
    /// Focused widget index on the current page.
    focus: usize,
    /// Modal error dialog; dismissing it ends the wizard.
    dialog: Option<String>,
    /// First step failure, which aborts the remaining pipeline.
    pipeline_failed: Option<String>,
    quit: bool,
}

impl TuiWizard {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            flow: PageFlow::default(),
            started: false,
            focus: 0,
            dialog: None,
            pipeline_failed: None,
            quit: false,
        }
    }

    /// Begin navigation: show the first visible page.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.flow = PageFlow::new(self.pages.len());
        self.advance_page();
    }

    /// Title of the page currently shown.
    pub fn current_title(&self) -> Option<&str> {
        self.flow
            .current()
            .and_then(|index| self.pages.get(index))
            .map(|page| page.title.as_str())
    }

    /// Step labels and statuses on the current page.
    pub fn step_states(&self) -> Vec<(String, StepStatus)> {
        let Some(current) = self.flow.current() else {
            return Vec::new();
        };

        self.pages[current]
            .widgets
            .iter()
            .filter_map(|widget| match widget {
                Widget::Step { label, status, .. } => Some((label.clone(), *status)),
                _ => None,
            })
            .collect()
    }

    /// Move forward to the next visible page, firing its on-show callbacks
    /// and committing its input defaults through their bindings.
    pub fn advance_page(&mut self) -> bool {
        let Self { pages, flow, .. } = self;
        let pages_ref: &[TuiPage] = pages;
        let next = flow.advance(|index| page_visible(pages_ref, index));

        match next {
            Some(index) => {
                self.show_page(index);
                true
            }
            None => false,
        }
    }

    /// Pop back to the previously shown page. No-op when the current page
    /// forbids it.
    pub fn retreat_page(&mut self) -> bool {
        let Self { pages, flow, .. } = self;
        let pages_ref: &[TuiPage] = pages;
        let previous = flow.retreat(|index| pages_ref[index].allow_back);

        match previous {
            Some(_) => {
                self.focus = self.first_interactive().unwrap_or(0);
                true
            }
            None => false,
        }
    }

    /// Whether the current page's fields allow moving forward.
    pub fn allow_next(&self) -> bool {
        let Some(current) = self.flow.current() else {
            return false;
        };

        self.pages[current]
            .widgets
            .iter()
            .all(|widget| match widget {
                Widget::Input { value, .. } => !value.is_empty(),
                _ => true,
            })
    }

    /// Whether any later page is visible right now.
    pub fn has_next(&self) -> bool {
        self.flow.has_next(|index| page_visible(&self.pages, index))
    }

    fn can_go_back(&self) -> bool {
        self.flow.can_retreat(|index| self.pages[index].allow_back)
    }

    fn show_page(&mut self, index: usize) {
        debug!(page = %self.pages[index].title, "showing wizard page");

        // Registration order: the page's own callbacks first, then each
        // input commits its current (default) value through its binding.
        let mut callbacks = std::mem::take(&mut self.pages[index].on_show);
        for callback in &mut callbacks {
            callback();
        }
        self.pages[index].on_show = callbacks;

        for widget in &mut self.pages[index].widgets {
            if let Widget::Input {
                value,
                normalize,
                store,
                ..
            } = widget
            {
                commit_input(value, normalize.as_ref(), store);
            }
        }

        self.focus = self.first_interactive().unwrap_or(0);
    }

    fn first_interactive(&self) -> Option<usize> {
        let current = self.flow.current()?;
        self.pages[current]
            .widgets
            .iter()
            .position(Widget::is_interactive)
    }

    fn move_focus(&mut self, forward: bool) {
        let Some(current) = self.flow.current() else {
            return;
        };

        let interactive: Vec<usize> = self.pages[current]
            .widgets
            .iter()
            .enumerate()
            .filter(|(_, widget)| widget.is_interactive())
            .map(|(index, _)| index)
            .collect();

        if interactive.is_empty() {
            return;
        }

        let position = interactive
            .iter()
            .position(|&index| index == self.focus)
            .unwrap_or(0);

        let next = if forward {
            (position + 1) % interactive.len()
        } else {
            (position + interactive.len() - 1) % interactive.len()
        };

        self.focus = interactive[next];
    }

    /// Change the selection of the focused choice. Disabled candidates are
    /// skipped over; selection commits through the binding immediately.
    fn move_choice(&mut self, forward: bool) -> bool {
        let Some(current) = self.flow.current() else {
            return false;
        };

        let Some(Widget::Choice {
            choices,
            selected,
            store,
            ..
        }) = self.pages[current].widgets.get_mut(self.focus)
        else {
            return false;
        };

        let count = choices.len();
        let mut candidate = *selected;

        for _ in 0..count {
            candidate = if forward {
                (candidate + 1) % count
            } else {
                (candidate + count - 1) % count
            };

            if choices[candidate].enabled {
                *selected = candidate;
                store(&choices[candidate].label);
                return true;
            }
        }

        false
    }

    fn edit_input(&mut self, key: KeyCode) {
        let Some(current) = self.flow.current() else {
            return;
        };

        let Some(Widget::Input {
            value,
            normalize,
            store,
            ..
        }) = self.pages[current].widgets.get_mut(self.focus)
        else {
            return;
        };

        match key {
            KeyCode::Char(c) => value.push(c),
            KeyCode::Backspace => {
                value.pop();
            }
            _ => return,
        }

        // Live binding: the model tracks every edit.
        commit_input(value, normalize.as_ref(), store);
    }

    fn next_pending_step(&self) -> Option<usize> {
        if self.pipeline_failed.is_some() {
            return None;
        }

        let current = self.flow.current()?;
        self.pages[current]
            .widgets
            .iter()
            .position(|widget| matches!(widget, Widget::Step { status, .. } if *status == StepStatus::Pending))
    }

    fn mark_step_running(&mut self, widget_index: usize) {
        if let Some(current) = self.flow.current() {
            if let Some(Widget::Step { status, .. }) =
                self.pages[current].widgets.get_mut(widget_index)
            {
                *status = StepStatus::Running;
            }
        }
    }

    fn execute_step(&mut self, widget_index: usize) {
        let Some(current) = self.flow.current() else {
            return;
        };

        let outcome = {
            let Some(Widget::Step { label, action, .. }) =
                self.pages[current].widgets.get_mut(widget_index)
            else {
                return;
            };
            let label = label.clone();
            (label, action())
        };

        let (label, result) = outcome;

        match result {
            Ok(()) => {
                if let Some(Widget::Step { status, .. }) =
                    self.pages[current].widgets.get_mut(widget_index)
                {
                    *status = StepStatus::Done;
                }
            }
            Err(err) => {
                warn!(step = %label, error = %err, "installation step failed");

                for widget in &mut self.pages[current].widgets[widget_index..] {
                    if let Widget::Step { status, .. } = widget {
                        *status = if *status == StepStatus::Running {
                            StepStatus::Failed
                        } else {
                            StepStatus::Skipped
                        };
                    }
                }

                let message = format!("{label}: {err}");
                self.pipeline_failed = Some(message.clone());
                self.dialog = Some(message);
            }
        }
    }

    /// Run any steps due on the current page, in order, stopping at the
    /// first failure. The event loop instead runs them one per redraw; this
    /// exists for tests.
    pub fn run_due_steps(&mut self) {
        while let Some(index) = self.next_pending_step() {
            self.mark_step_running(index);
            self.execute_step(index);
        }
    }

    /// Apply one key event. Returns true when the wizard should close.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.dialog.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.dialog = None;
                // Error dialogs are fatal: dismissing one closes the wizard.
                self.quit = true;
            }
            return self.quit;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
        {
            self.quit = true;
            return true;
        }

        match key.code {
            KeyCode::Enter => {
                if self.allow_next() {
                    if self.has_next() {
                        self.advance_page();
                    } else {
                        self.quit = true;
                    }
                }
            }
            KeyCode::Esc => {
                self.retreat_page();
            }
            KeyCode::Tab => self.move_focus(true),
            KeyCode::BackTab => self.move_focus(false),
            KeyCode::Down => {
                if !self.move_choice(true) {
                    self.move_focus(true);
                }
            }
            KeyCode::Up => {
                if !self.move_choice(false) {
                    self.move_focus(false);
                }
            }
            KeyCode::Char(_) | KeyCode::Backspace => self.edit_input(key.code),
            _ => {}
        }

        self.quit
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ) -> Result<()> {
        loop {
            terminal.draw(|frame| self.render(frame))?;

            if self.dialog.is_none() {
                if let Some(index) = self.next_pending_step() {
                    self.mark_step_running(index);
                    // Redraw so the running marker is visible while the
                    // action blocks the UI thread.
                    terminal.draw(|frame| self.render(frame))?;
                    self.execute_step(index);
                    continue;
                }
            }

            if !event::poll(Duration::from_millis(50))? {
                continue;
            }

            if let Event::Key(key) = event::read()? {
                if self.handle_key(key) {
                    break;
                }
            }
        }

        Ok(())
    }

    fn result(&mut self) -> Result<()> {
        match self.pipeline_failed.take() {
            Some(message) => Err(SiteError::step(message)),
            None => Ok(()),
        }
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let Some(current) = self.flow.current() else {
            self.render_dialog(frame, area);
            return;
        };

        let page = &self.pages[current];
        let title = format!(
            " {} - Step {}/{} ",
            page.title,
            current + 1,
            self.pages.len()
        );

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let chunks =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(inner);

        let mut lines: Vec<Line> = Vec::new();
        for (index, widget) in page.widgets.iter().enumerate() {
            self.render_widget_lines(widget, index == self.focus, &mut lines);
        }

        let body = Paragraph::new(lines).wrap(Wrap { trim: false });
        frame.render_widget(body, chunks[0]);

        frame.render_widget(self.footer(), chunks[1]);

        self.render_dialog(frame, area);
    }

    fn render_widget_lines(&self, widget: &Widget, focused: bool, lines: &mut Vec<Line>) {
        let focus_style = if focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        match widget {
            Widget::Text(text) => {
                lines.push(Line::from(""));
                lines.push(Line::from(text.clone()));
            }
            Widget::Link(url) => {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    url.clone(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::UNDERLINED),
                )));
            }
            Widget::List { title, items } => {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    format!("{title}:"),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                for item in items {
                    lines.push(Line::from(format!("  • {item}")));
                }
            }
            Widget::Input {
                prompt,
                value,
                masked,
                ..
            } => {
                let shown = if *masked {
                    "•".repeat(value.chars().count())
                } else {
                    value.clone()
                };
                let cursor = if focused { "█" } else { "" };

                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("{prompt}: "),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!("▸ {shown}{cursor}"), focus_style),
                ]));
            }
            Widget::Choice {
                prompt,
                choices,
                selected,
                ..
            } => {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    format!("{prompt}:"),
                    Style::default().add_modifier(Modifier::BOLD),
                )));

                for (index, choice) in choices.iter().enumerate() {
                    let marker = if index == *selected { "● " } else { "○ " };
                    let style = if !choice.enabled {
                        Style::default().fg(Color::DarkGray)
                    } else if index == *selected {
                        focus_style
                    } else {
                        Style::default()
                    };
                    let suffix = if choice.enabled { "" } else { " (unavailable)" };

                    lines.push(Line::from(Span::styled(
                        format!("  {marker}{}{suffix}", choice.label),
                        style,
                    )));
                }
            }
            Widget::Step { label, status, .. } => {
                let (marker, style) = match status {
                    StepStatus::Pending => ("○", Style::default().fg(Color::DarkGray)),
                    StepStatus::Running => ("➤", Style::default().fg(Color::Yellow)),
                    StepStatus::Done => ("✓", Style::default().fg(Color::Green)),
                    StepStatus::Failed => ("✗", Style::default().fg(Color::Red)),
                    StepStatus::Skipped => ("-", Style::default().fg(Color::DarkGray)),
                };
                lines.push(Line::from(Span::styled(format!("  {marker} {label}"), style)));
            }
        }
    }

    fn footer(&self) -> Paragraph<'_> {
        let running = self
            .flow
            .current()
            .map(|current| {
                self.pages[current]
                    .widgets
                    .iter()
                    .any(|w| matches!(w, Widget::Step { status, .. } if *status == StepStatus::Running))
            })
            .unwrap_or(false);

        let text = if running {
            "working…".to_string()
        } else {
            let mut parts = Vec::new();
            if self.can_go_back() {
                parts.push("[Esc] Back");
            }
            if self.allow_next() {
                if self.has_next() {
                    parts.push("[Enter] Continue →");
                } else {
                    parts.push("[Enter] Finish");
                }
            }
            parts.push("[Ctrl+Q] Cancel");
            parts.join("  ")
        };

        Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
    }

    fn render_dialog(&self, frame: &mut Frame, area: Rect) {
        let Some(message) = &self.dialog else {
            return;
        };

        let width = (area.width * 3 / 5).max(20).min(area.width);
        let height = 7.min(area.height);
        let popup = Rect::new(
            area.x + (area.width.saturating_sub(width)) / 2,
            area.y + (area.height.saturating_sub(height)) / 2,
            width,
            height,
        );

        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title(" Error ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let chunks =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(inner);

        let body = Paragraph::new(message.clone()).wrap(Wrap { trim: false });
        frame.render_widget(body, chunks[0]);

        let hint = Paragraph::new("[Enter] Close")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(hint, chunks[1]);
    }
}

impl Default for TuiWizard {
    fn default() -> Self {
        Self::new()
    }
}

fn page_visible(pages: &[TuiPage], index: usize) -> bool {
    pages[index].visible.as_ref().map_or(true, |f| f())
}

fn commit_input(value: &str, normalize: Option<&NormalizeFn>, store: &StoreFn) {
    let committed = match normalize {
        Some(normalize) => normalize(value),
        None => value.to_string(),
    };
    store(&committed);
}

impl UiToolkit for TuiWizard {
    fn page(&mut self, title: &str, opts: PageOptions) -> Result<PageId> {
        let mut on_show = Vec::new();
        if let Some(callback) = opts.on_show {
            on_show.push(callback);
        }

        self.pages.push(TuiPage {
            title: title.to_string(),
            allow_back: opts.allow_back,
            visible: opts.visible,
            on_show,
            widgets: Vec::new(),
        });

        Ok(PageId(self.pages.len() - 1))
    }

    fn text(&mut self, page: PageId, message: &str) -> Result<()> {
        self.pages[page.0].widgets.push(Widget::Text(message.to_string()));
        Ok(())
    }

    fn url_link(&mut self, page: PageId, url: &str) -> Result<()> {
        self.pages[page.0].widgets.push(Widget::Link(url.to_string()));
        Ok(())
    }

    fn itemized_list(&mut self, page: PageId, title: &str, items: &[String]) -> Result<()> {
        self.pages[page.0].widgets.push(Widget::List {
            title: title.to_string(),
            items: items.to_vec(),
        });
        Ok(())
    }

    fn prompt_input(&mut self, page: PageId, prompt: &str, spec: InputSpec) -> Result<()> {
        self.pages[page.0].widgets.push(Widget::Input {
            prompt: prompt.to_string(),
            value: spec.default.unwrap_or_default(),
            masked: spec.masked,
            normalize: spec.normalize,
            store: spec.store,
        });
        Ok(())
    }

    fn prompt_choice(
        &mut self,
        page: PageId,
        prompt: &str,
        choices: Vec<Choice>,
        store: StoreFn,
    ) -> Result<()> {
        let selected = choices.iter().position(|choice| choice.enabled);
        let selected = selected.expect("prompt_choice requires at least one enabled candidate");

        // Single-choice semantics: something is always selected, starting
        // with the first enabled candidate.
        store(&choices[selected].label);

        self.pages[page.0].widgets.push(Widget::Choice {
            prompt: prompt.to_string(),
            choices,
            selected,
            store,
        });
        Ok(())
    }

    fn step(&mut self, page: PageId, label: &str, action: StepFn) -> Result<()> {
        self.pages[page.0].widgets.push(Widget::Step {
            label: label.to_string(),
            status: StepStatus::Pending,
            action,
        });
        Ok(())
    }

    fn error(&mut self, message: &str) -> Result<()> {
        self.dialog = Some(message.to_string());
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        if self.pages.is_empty() && self.dialog.is_none() {
            return self.result();
        }

        enable_raw_mode()
            .map_err(|e| SiteError::terminal(format!("Failed to enable raw mode: {e}")))?;
        crossterm::execute!(stdout(), EnterAlternateScreen)
            .map_err(|e| SiteError::terminal(format!("Failed to enter alternate screen: {e}")))?;

        let backend = CrosstermBackend::new(stdout());
        let terminal = Terminal::new(backend)
            .map_err(|e| SiteError::terminal(format!("Failed to create terminal: {e}")));

        let loop_result = match terminal {
            Ok(mut terminal) => {
                self.start();
                self.event_loop(&mut terminal)
            }
            Err(e) => Err(e),
        };

        // Cleanup terminal (always attempt cleanup, even on failure)
        let _ = disable_raw_mode();
        let _ = crossterm::execute!(stdout(), LeaveAlternateScreen);

        loop_result.and(self.result())
    }
}
