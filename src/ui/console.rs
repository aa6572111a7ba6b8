//! Console presentation backend
//!
//! A line-oriented backend that interacts inline: every `page()` call
//! decides visibility on the spot, prompts block on standard input until a
//! valid answer arrives, and steps execute synchronously as they are
//! registered. `run()` is therefore almost a no-op; by then everything has
//! already happened.
//!
//! The reader and writer are injectable so the whole prompting behavior is
//! testable without a terminal.

use std::io::{BufRead, BufReader, Stdin, Stdout, Write, stdin, stdout};

use dialoguer::Password;
use tracing::warn;

use crate::error::{Result, SiteError};
use crate::ui::{Choice, InputSpec, PageId, PageOptions, StepFn, StoreFn, UiToolkit};

/// Backend printing to a writer and reading answers from a reader.
pub struct ConsoleUi<R: BufRead, W: Write> {
    reader: R,
    writer: W,
    /// Visibility decision per registered page.
    pages: Vec<bool>,
    /// First step failure; later steps are skipped once set.
    failed: Option<String>,
    /// Use a real non-echoing prompt for masked input. Disabled when the
    /// reader is injected (tests), where answers are read as plain lines.
    terminal_secrets: bool,
}

impl ConsoleUi<BufReader<Stdin>, Stdout> {
    /// Console backend on the process's standard streams.
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(stdin()),
            writer: stdout(),
            pages: Vec::new(),
            failed: None,
            terminal_secrets: true,
        }
    }
}

impl Default for ConsoleUi<BufReader<Stdin>, Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead, W: Write> ConsoleUi<R, W> {
    /// Console backend over arbitrary streams, for tests.
    pub fn with_io(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            pages: Vec::new(),
            failed: None,
            terminal_secrets: false,
        }
    }

    /// Consume the backend and return its writer (test inspection).
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn is_visible(&self, page: PageId) -> bool {
        self.pages.get(page.0).copied().unwrap_or(false)
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        // EOF while a question is pending can't be answered by re-prompting.
        if self.reader.read_line(&mut line)? == 0 {
            return Err(SiteError::terminal("unexpected end of input"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn read_answer(&mut self, prompt: &str, masked: bool) -> Result<String> {
        if masked && self.terminal_secrets {
            let answer = Password::new()
                .with_prompt(prompt)
                .allow_empty_password(true)
                .interact()?;
            return Ok(answer);
        }

        write!(self.writer, "{prompt}: ")?;
        self.writer.flush()?;
        self.read_line()
    }

    fn print_text(&mut self, message: &str, leading_newline: bool) -> Result<()> {
        if leading_newline {
            writeln!(self.writer)?;
        }
        writeln!(self.writer, "    {message}")?;
        Ok(())
    }
}

/// Resolve a choice answer against the enabled candidate labels.
///
/// The answer may be an exact label or a 1-based index into the enabled
/// list; both forms select the identical candidate.
pub fn resolve_choice(answer: &str, labels: &[&str]) -> Option<usize> {
    if let Some(position) = labels.iter().position(|label| *label == answer) {
        return Some(position);
    }

    if let Ok(index) = answer.parse::<usize>() {
        if (1..=labels.len()).contains(&index) {
            return Some(index - 1);
        }
    }

    None
}

impl<R: BufRead, W: Write> UiToolkit for ConsoleUi<R, W> {
    fn page(&mut self, title: &str, mut opts: PageOptions) -> Result<PageId> {
        let visible = opts.visible.as_ref().map_or(true, |f| f());
        self.pages.push(visible);
        let id = PageId(self.pages.len() - 1);

        if !visible {
            return Ok(id);
        }

        if let Some(on_show) = opts.on_show.as_mut() {
            on_show();
        }

        writeln!(self.writer)?;
        writeln!(self.writer)?;
        writeln!(self.writer, "* {title}")?;

        Ok(id)
    }

    fn text(&mut self, page: PageId, message: &str) -> Result<()> {
        if !self.is_visible(page) {
            return Ok(());
        }
        self.print_text(message, true)
    }

    fn url_link(&mut self, page: PageId, url: &str) -> Result<()> {
        self.text(page, url)
    }

    fn itemized_list(&mut self, page: PageId, title: &str, items: &[String]) -> Result<()> {
        if !self.is_visible(page) {
            return Ok(());
        }

        self.print_text(&format!("{title}:"), true)?;
        for item in items {
            self.print_text(&format!("  * {item}"), false)?;
        }
        Ok(())
    }

    fn prompt_input(&mut self, page: PageId, prompt: &str, spec: InputSpec) -> Result<()> {
        if !self.is_visible(page) {
            return Ok(());
        }

        let mut prompt = prompt.to_string();
        if let Some(default) = &spec.default {
            self.print_text(&format!("The default is {default}"), true)?;
            prompt = format!("{prompt} [{default}]");
        }

        writeln!(self.writer)?;

        loop {
            let answer = self.read_answer(&prompt, spec.masked)?;

            let value = if answer.is_empty() {
                match &spec.default {
                    Some(default) => default.clone(),
                    None => {
                        self.error("You must answer this question.")?;
                        continue;
                    }
                }
            } else {
                answer
            };

            let value = match &spec.normalize {
                Some(normalize) => normalize(&value),
                None => value,
            };

            (spec.store)(&value);
            return Ok(());
        }
    }

    fn prompt_choice(
        &mut self,
        page: PageId,
        prompt: &str,
        choices: Vec<Choice>,
        store: StoreFn,
    ) -> Result<()> {
        if !self.is_visible(page) {
            return Ok(());
        }

        let enabled: Vec<&str> = choices
            .iter()
            .filter(|choice| choice.enabled)
            .map(|choice| choice.label.as_str())
            .collect();
        assert!(
            !enabled.is_empty(),
            "prompt_choice requires at least one enabled candidate"
        );

        self.print_text(
            "You can type either the name or the number from the list below.",
            true,
        )?;

        writeln!(self.writer)?;
        for (index, label) in enabled.iter().enumerate() {
            writeln!(self.writer, "    ({}) {label}", index + 1)?;
        }
        writeln!(self.writer)?;

        loop {
            let answer = self.read_answer(prompt, false)?;

            match resolve_choice(&answer, &enabled) {
                Some(index) => {
                    store(enabled[index]);
                    return Ok(());
                }
                None => {
                    self.error(&format!("'{answer}' is not a valid option."))?;
                }
            }
        }
    }

    fn step(&mut self, page: PageId, label: &str, mut action: StepFn) -> Result<()> {
        if !self.is_visible(page) {
            return Ok(());
        }

        if self.failed.is_some() {
            // A previous step failed; the rest of the pipeline is abandoned.
            return Ok(());
        }

        write!(self.writer, "{label} ... ")?;
        self.writer.flush()?;

        match action() {
            Ok(()) => {
                writeln!(self.writer, "OK")?;
            }
            Err(err) => {
                writeln!(self.writer, "FAILED")?;
                warn!(step = label, error = %err, "installation step failed");
                self.error(&err.to_string())?;
                self.failed = Some(format!("{label}: {err}"));
            }
        }

        Ok(())
    }

    fn error(&mut self, message: &str) -> Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "[!] {message}")?;
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        self.writer.flush()?;

        match self.failed.take() {
            Some(message) => Err(SiteError::step(message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn console(input: &str) -> ConsoleUi<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleUi::with_io(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn shared() -> (Rc<RefCell<Option<String>>>, StoreFn) {
        let cell = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&cell);
        (cell, Box::new(move |v: &str| *sink.borrow_mut() = Some(v.to_string())))
    }

    #[test]
    fn test_invisible_page_skips_everything() {
        let mut ui = console("never-read\n");
        let page = ui
            .page("Hidden", PageOptions {
                visible: Some(Box::new(|| false)),
                ..Default::default()
            })
            .unwrap();

        let (cell, store) = shared();
        ui.prompt_input(page, "Value", InputSpec::new(store)).unwrap();
        assert!(cell.borrow().is_none());

        let output = String::from_utf8(ui.into_writer()).unwrap();
        assert!(!output.contains("Hidden"));
    }

    #[test]
    fn test_on_show_fires_for_visible_page() {
        let fired = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&fired);

        let mut ui = console("");
        ui.page("Shown", PageOptions {
            on_show: Some(Box::new(move || *flag.borrow_mut() = true)),
            ..Default::default()
        })
        .unwrap();

        assert!(*fired.borrow());
    }

    #[test]
    fn test_empty_answer_uses_default() {
        let mut ui = console("\n");
        let page = ui.page("Domain", PageOptions::default()).unwrap();

        let (cell, store) = shared();
        ui.prompt_input(
            page,
            "Domain Name",
            InputSpec::new(store).with_default(Some("reviews.example.com".to_string())),
        )
        .unwrap();

        assert_eq!(cell.borrow().as_deref(), Some("reviews.example.com"));
    }

    #[test]
    fn test_empty_answer_without_default_reprompts() {
        let mut ui = console("\n\nfinally\n");
        let page = ui.page("Domain", PageOptions::default()).unwrap();

        let (cell, store) = shared();
        ui.prompt_input(page, "Domain Name", InputSpec::new(store)).unwrap();

        assert_eq!(cell.borrow().as_deref(), Some("finally"));
        let output = String::from_utf8(ui.into_writer()).unwrap();
        assert_eq!(output.matches("You must answer this question.").count(), 2);
    }

    #[test]
    fn test_normalize_runs_once_on_confirm() {
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);

        let mut ui = console("reviews\n");
        let page = ui.page("Root", PageOptions::default()).unwrap();

        let (cell, store) = shared();
        ui.prompt_input(
            page,
            "Root Path",
            InputSpec::new(store).with_normalize(Box::new(move |v| {
                *counter.borrow_mut() += 1;
                crate::normalize::root_url_path(v)
            })),
        )
        .unwrap();

        assert_eq!(cell.borrow().as_deref(), Some("/reviews/"));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_choice_by_label_and_by_index_agree() {
        for input in ["postgresql\n", "2\n"] {
            let mut ui = console(input);
            let page = ui.page("Database", PageOptions::default()).unwrap();

            let (cell, store) = shared();
            ui.prompt_choice(
                page,
                "Database Type",
                vec![
                    Choice::new("mysql", true),
                    Choice::new("postgresql", true),
                    Choice::new("sqlite3", true),
                ],
                store,
            )
            .unwrap();

            assert_eq!(cell.borrow().as_deref(), Some("postgresql"));
        }
    }

    #[test]
    fn test_choice_indexes_only_enabled_candidates() {
        // mysql is disabled, so index 1 is postgresql.
        let mut ui = console("1\n");
        let page = ui.page("Database", PageOptions::default()).unwrap();

        let (cell, store) = shared();
        ui.prompt_choice(
            page,
            "Database Type",
            vec![
                Choice::new("mysql", false),
                Choice::new("postgresql", true),
                Choice::new("sqlite3", true),
            ],
            store,
        )
        .unwrap();

        assert_eq!(cell.borrow().as_deref(), Some("postgresql"));
    }

    #[test]
    fn test_choice_rejects_disabled_and_garbage_answers() {
        // Disabled label, out-of-range index, garbage, then a valid pick.
        let mut ui = console("mysql\n9\nwhat\nsqlite3\n");
        let page = ui.page("Database", PageOptions::default()).unwrap();

        let (cell, store) = shared();
        ui.prompt_choice(
            page,
            "Database Type",
            vec![
                Choice::new("mysql", false),
                Choice::new("postgresql", true),
                Choice::new("sqlite3", true),
            ],
            store,
        )
        .unwrap();

        assert_eq!(cell.borrow().as_deref(), Some("sqlite3"));
        let output = String::from_utf8(ui.into_writer()).unwrap();
        assert_eq!(output.matches("is not a valid option.").count(), 3);
    }

    #[test]
    fn test_resolve_choice() {
        let labels = ["apache", "lighttpd"];
        assert_eq!(resolve_choice("apache", &labels), Some(0));
        assert_eq!(resolve_choice("2", &labels), Some(1));
        assert_eq!(resolve_choice("0", &labels), None);
        assert_eq!(resolve_choice("3", &labels), None);
        assert_eq!(resolve_choice("nginx", &labels), None);
    }

    #[test]
    fn test_step_failure_aborts_remaining_steps() {
        let mut ui = console("");
        let page = ui.page("Installing the site...", PageOptions::default()).unwrap();

        let ran = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&ran);
        ui.step(page, "first", Box::new(move || {
            log.borrow_mut().push("first");
            Ok(())
        }))
        .unwrap();

        let log = Rc::clone(&ran);
        ui.step(page, "second", Box::new(move || {
            log.borrow_mut().push("second");
            Err(SiteError::manage("syncdb exited with code 1"))
        }))
        .unwrap();

        let log = Rc::clone(&ran);
        ui.step(page, "third", Box::new(move || {
            log.borrow_mut().push("third");
            Ok(())
        }))
        .unwrap();

        assert_eq!(*ran.borrow(), vec!["first", "second"]);
        assert!(ui.run().is_err());

        let output = String::from_utf8(ui.into_writer()).unwrap();
        assert!(output.contains("first ... OK"));
        assert!(output.contains("second ... FAILED"));
        assert!(!output.contains("third ..."));
    }

    #[test]
    fn test_run_is_clean_after_successful_steps() {
        let mut ui = console("");
        let page = ui.page("Installing the site...", PageOptions::default()).unwrap();
        ui.step(page, "only", Box::new(|| Ok(()))).unwrap();
        assert!(ui.run().is_ok());
    }
}
