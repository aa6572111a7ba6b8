//! Presentation backends
//!
//! Everything the wizard shows the user goes through the [`UiToolkit`]
//! trait: pages, text, prompts, provisioning steps and errors. Two backends
//! implement it: a blocking console that interacts inline as the wizard is
//! defined, and a full-screen terminal wizard that registers everything
//! first and interacts inside its own event loop. The variant is picked once
//! at startup and never mixed.
//!
//! # Module Structure
//! - `flow` - shown-page stack navigation shared by backends and tests
//! - `console` - blocking line-oriented backend
//! - `tui` - event-driven full-screen backend

pub mod console;
pub mod flow;
pub mod tui;

pub use console::ConsoleUi;
pub use flow::PageFlow;
pub use tui::TuiWizard;

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::site::Site;

/// The site model shared between wizard closures and the command driving
/// them. Single-threaded by design; the wizard never leaves its thread.
pub type SiteRef = Rc<RefCell<Site>>;

/// A page visibility predicate, re-evaluated on every navigation.
pub type VisibleFn = Box<dyn Fn() -> bool>;

/// Callback fired when a page is shown going forward.
pub type OnShowFn = Box<dyn FnMut()>;

/// Transforms a raw answer into its stored form.
pub type NormalizeFn = Box<dyn Fn(&str) -> String>;

/// Writes a confirmed (or, in the full-screen wizard, in-progress) value
/// into the site model. Bindings are typed closures so a bad field name is a
/// compile error, not a runtime surprise.
pub type StoreFn = Box<dyn Fn(&str)>;

/// A provisioning action. Failure is a value, not a panic; the backend
/// reports it and abandons the remaining steps.
pub type StepFn = Box<dyn FnMut() -> Result<()>>;

/// Handle identifying a registered page within its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageId(pub(crate) usize);

/// Options for a new page.
pub struct PageOptions {
    /// Whether "back" may return to this page once it is topmost.
    pub allow_back: bool,
    /// Skip the page entirely when this returns false.
    pub visible: Option<VisibleFn>,
    /// Fired when the page is shown going forward.
    pub on_show: Option<OnShowFn>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            allow_back: true,
            visible: None,
            on_show: None,
        }
    }
}

/// A text prompt bound to one site field.
pub struct InputSpec {
    /// Used when the answer is empty; without it, empty answers re-prompt.
    pub default: Option<String>,
    /// Do not echo the answer.
    pub masked: bool,
    /// Applied before the value reaches the binding.
    pub normalize: Option<NormalizeFn>,
    pub store: StoreFn,
}

impl InputSpec {
    pub fn new(store: StoreFn) -> Self {
        Self {
            default: None,
            masked: false,
            normalize: None,
            store,
        }
    }

    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }

    pub fn masked(mut self) -> Self {
        self.masked = true;
        self
    }

    pub fn with_normalize(mut self, normalize: NormalizeFn) -> Self {
        self.normalize = Some(normalize);
        self
    }
}

/// One candidate in a single-choice prompt. Disabled candidates are shown
/// by the full-screen wizard but can never be selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub enabled: bool,
}

impl Choice {
    pub fn new(label: impl Into<String>, enabled: bool) -> Self {
        Self {
            label: label.into(),
            enabled,
        }
    }
}

/// The interface every presentation backend provides.
pub trait UiToolkit {
    /// Register a page. The console decides visibility immediately and
    /// renders inline; the full-screen wizard defers until navigation.
    fn page(&mut self, title: &str, opts: PageOptions) -> Result<PageId>;

    /// A block of explanatory text on a page.
    fn text(&mut self, page: PageId, message: &str) -> Result<()>;

    /// A URL the user may want to visit.
    fn url_link(&mut self, page: PageId, url: &str) -> Result<()>;

    /// A titled bullet list.
    fn itemized_list(&mut self, page: PageId, title: &str, items: &[String]) -> Result<()>;

    /// Prompt for a line of text bound to a site field.
    fn prompt_input(&mut self, page: PageId, prompt: &str, spec: InputSpec) -> Result<()>;

    /// Prompt for exactly one of the enabled candidates.
    ///
    /// A prompt whose candidates are all disabled is a programming error:
    /// capability-derived visibility is supposed to make that unreachable.
    fn prompt_choice(
        &mut self,
        page: PageId,
        prompt: &str,
        choices: Vec<Choice>,
        store: StoreFn,
    ) -> Result<()>;

    /// One step of a multi-step operation, reported as it starts and
    /// finishes. A failing step aborts the steps after it.
    fn step(&mut self, page: PageId, label: &str, action: StepFn) -> Result<()>;

    /// Show a block of error text.
    fn error(&mut self, message: &str) -> Result<()>;

    /// Enter the backend's interaction loop. The console already interacted
    /// inline, so its `run` only reports a recorded pipeline failure; the
    /// full-screen wizard blocks here until the user closes it.
    fn run(&mut self) -> Result<()>;
}
