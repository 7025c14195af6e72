//! Local view of the figures a session owns.

/// What the session knows about one figure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureInfo {
    pub id: u64,
    pub title: String,
    /// A window is currently open for it.
    pub visible: bool,
    /// `show` has been called at least once.
    pub shown_once: bool,
}

/// Figures in creation order.
#[derive(Debug, Default)]
pub(crate) struct FigureRegistry {
    figures: Vec<FigureInfo>,
}

impl FigureRegistry {
    pub(crate) fn insert(&mut self, id: u64, title: &str) {
        if let Some(existing) = self.get_mut(id) {
            existing.title = title.to_string();
            return;
        }
        self.figures.push(FigureInfo {
            id,
            title: title.to_string(),
            visible: false,
            shown_once: false,
        });
    }

    /// Register a figure that already existed on the daemon side.
    pub(crate) fn restore(&mut self, id: u64) {
        if self.get(id).is_none() {
            self.figures.push(FigureInfo {
                id,
                title: String::new(),
                visible: false,
                shown_once: true,
            });
        }
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.figures.len();
        self.figures.retain(|f| f.id != id);
        self.figures.len() != before
    }

    pub(crate) fn get(&self, id: u64) -> Option<&FigureInfo> {
        self.figures.iter().find(|f| f.id == id)
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut FigureInfo> {
        self.figures.iter_mut().find(|f| f.id == id)
    }

    pub(crate) fn mark_shown(&mut self, id: u64) {
        if let Some(figure) = self.get_mut(id) {
            figure.visible = true;
            figure.shown_once = true;
        }
    }

    /// Returns false for unknown figures.
    pub(crate) fn mark_closed(&mut self, id: u64) -> bool {
        match self.get_mut(id) {
            Some(figure) => {
                figure.visible = false;
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_visible(&self, id: u64) -> bool {
        self.get(id).is_some_and(|f| f.visible)
    }

    pub(crate) fn any_visible(&self) -> bool {
        self.figures.iter().any(|f| f.visible)
    }

    /// Figures that have never been shown and have no window.
    pub(crate) fn never_shown(&self) -> Vec<u64> {
        self.figures
            .iter()
            .filter(|f| !f.visible && !f.shown_once)
            .map(|f| f.id)
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<FigureInfo> {
        self.figures.clone()
    }
}
