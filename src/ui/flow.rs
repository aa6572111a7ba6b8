//! Shown-page stack navigation
//!
//! The wizard's traversal order is the declared page order filtered by
//! visibility predicates that read the site model, so the set of visible
//! pages changes as answers land. Navigation therefore re-derives visibility
//! on every move and remembers the pages actually shown on a stack; going
//! back pops that stack instead of decrementing an index, so pages that were
//! skipped forward are never revisited backward.

/// Navigation state over a fixed number of declared pages.
#[derive(Debug, Default)]
pub struct PageFlow {
    page_count: usize,
    shown: Vec<usize>,
}

impl PageFlow {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            shown: Vec::new(),
        }
    }

    /// The page currently displayed, if navigation has started.
    pub fn current(&self) -> Option<usize> {
        self.shown.last().copied()
    }

    /// Move forward to the first visible page after the current declared
    /// position (or from the beginning when nothing is shown yet), pushing
    /// it onto the shown stack. Returns the new page, or `None` when no
    /// later page is visible.
    pub fn advance(&mut self, visible: impl Fn(usize) -> bool) -> Option<usize> {
        let start = self.current().map_or(0, |index| index + 1);

        for index in start..self.page_count {
            if visible(index) {
                self.shown.push(index);
                return Some(index);
            }
        }

        None
    }

    /// Move back to the most recently shown page. A no-op returning `None`
    /// when the current page forbids going back or there is nothing shown
    /// before it.
    pub fn retreat(&mut self, allow_back: impl Fn(usize) -> bool) -> Option<usize> {
        let top = self.current()?;

        if !allow_back(top) || self.shown.len() < 2 {
            return None;
        }

        self.shown.pop();
        self.current()
    }

    /// Whether any page after the current one is visible right now.
    pub fn has_next(&self, visible: impl Fn(usize) -> bool) -> bool {
        let start = self.current().map_or(0, |index| index + 1);
        (start..self.page_count).any(visible)
    }

    /// Whether [`Self::retreat`] would move, without moving.
    pub fn can_retreat(&self, allow_back: impl Fn(usize) -> bool) -> bool {
        match self.current() {
            Some(top) => allow_back(top) && self.shown.len() >= 2,
            None => false,
        }
    }
}
