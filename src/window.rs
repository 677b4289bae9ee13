//! View attachments
//!
//! A renderer binds to the emulation through a `ScreenWindow`: a handle that
//! names which of the two screens it currently reads and whether a redraw is
//! pending. Windows never own or mutate screen memory; the emulation
//! re-points every window when the current screen switches.

/// Opaque handle for one view attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowId(u64);

/// One renderer's binding to a screen.
pub struct ScreenWindow {
    id: WindowId,
    /// Index of the bound screen (0 = primary, 1 = alternate).
    screen: usize,
    needs_redraw: bool,
}

impl ScreenWindow {
    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn screen_index(&self) -> usize {
        self.screen
    }
}

/// Registry of attached windows.
#[derive(Default)]
pub struct WindowRegistry {
    windows: Vec<ScreenWindow>,
    next_id: u64,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new window bound to `screen`. Starts with a pending redraw
    /// so the renderer paints the initial image.
    pub fn create(&mut self, screen: usize) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        self.windows.push(ScreenWindow {
            id,
            screen,
            needs_redraw: true,
        });
        tracing::debug!(?id, screen, "view attached");
        id
    }

    /// Detach `id`. Unknown ids are ignored.
    pub fn release(&mut self, id: WindowId) {
        self.windows.retain(|w| w.id != id);
    }

    pub fn get(&self, id: WindowId) -> Option<&ScreenWindow> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Re-point every window to `screen` and flag a redraw. Returns how
    /// many windows were notified (0 when nothing was bound elsewhere).
    pub fn repoint_all(&mut self, screen: usize) -> usize {
        let mut notified = 0;
        for window in &mut self.windows {
            if window.screen != screen {
                window.screen = screen;
                window.needs_redraw = true;
                notified += 1;
            }
        }
        notified
    }

    /// Flag every window for redraw (output-changed notification).
    pub fn mark_all(&mut self) {
        for window in &mut self.windows {
            window.needs_redraw = true;
        }
    }

    /// Consume the redraw flag for `id`.
    pub fn take_redraw(&mut self, id: WindowId) -> bool {
        match self.windows.iter_mut().find(|w| w.id == id) {
            Some(window) => std::mem::take(&mut window.needs_redraw),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_take_release() {
        let mut registry = WindowRegistry::new();
        let id = registry.create(0);

        assert!(registry.take_redraw(id), "fresh window needs initial paint");
        assert!(!registry.take_redraw(id));

        registry.release(id);
        assert!(registry.is_empty());
        assert!(!registry.take_redraw(id));
    }

    #[test]
    fn repoint_notifies_only_on_change() {
        let mut registry = WindowRegistry::new();
        let id = registry.create(0);
        registry.take_redraw(id);

        assert_eq!(registry.repoint_all(1), 1);
        assert!(registry.take_redraw(id));
        assert_eq!(registry.get(id).unwrap().screen_index(), 1);

        // Same screen again: nothing to notify.
        assert_eq!(registry.repoint_all(1), 0);
        assert!(!registry.take_redraw(id));
    }

    #[test]
    fn mark_all_flags_every_window() {
        let mut registry = WindowRegistry::new();
        let a = registry.create(0);
        let b = registry.create(0);
        registry.take_redraw(a);
        registry.take_redraw(b);

        registry.mark_all();
        assert!(registry.take_redraw(a));
        assert!(registry.take_redraw(b));
    }
}
