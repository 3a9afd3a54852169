//! Monitor registry: the current set of displays and which one is selected

use tracing::debug;

use crate::platform::MonitorInfo;

/// Snapshot of enumerated monitors plus the selected index.
///
/// Enumeration always replaces the whole set. Selection never fails: an
/// out-of-range index leaves the previous selection in place.
#[derive(Debug, Clone, Default)]
pub struct MonitorRegistry {
    monitors: Vec<MonitorInfo>,
    selected: usize,
}

impl MonitorRegistry {
    pub fn new(monitors: Vec<MonitorInfo>) -> Self {
        Self {
            monitors,
            selected: 0,
        }
    }

    /// Replace the monitor set with a fresh enumeration.
    ///
    /// The selected index survives when it still points at a monitor,
    /// otherwise it falls back to the first one.
    pub fn replace(&mut self, monitors: Vec<MonitorInfo>) {
        self.monitors = monitors;
        if self.selected >= self.monitors.len() {
            self.selected = 0;
        }
        debug!(
            count = self.monitors.len(),
            selected = self.selected,
            "monitors enumerated"
        );
    }

    /// Select by index. Returns false (and changes nothing) when out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.monitors.len() {
            debug!(index, count = self.monitors.len(), "ignoring out-of-range monitor");
            return false;
        }
        self.selected = index;
        true
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&MonitorInfo> {
        self.monitors.get(self.selected)
    }

    pub fn geometry_of(&self, index: usize) -> Option<&MonitorInfo> {
        self.monitors.get(index)
    }

    pub fn monitors(&self) -> &[MonitorInfo] {
        &self.monitors
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::headless::monitor;

    fn two_monitors() -> MonitorRegistry {
        MonitorRegistry::new(vec![
            monitor("DP-1", 0, 0, 1920, 1080),
            monitor("HDMI-A-1", 1920, 0, 2560, 1440),
        ])
    }

    #[test]
    fn out_of_range_selection_keeps_previous() {
        let mut registry = two_monitors();
        assert!(registry.select(1));
        assert!(!registry.select(7));
        assert_eq!(registry.selected_index(), 1);
        assert_eq!(registry.selected().map(|m| m.id.as_str()), Some("HDMI-A-1"));
    }

    #[test]
    fn geometry_lookup() {
        let registry = two_monitors();
        let m = registry.geometry_of(1).unwrap();
        assert_eq!((m.x, m.y, m.width, m.height), (1920, 0, 2560, 1440));
        assert!(registry.geometry_of(2).is_none());
    }

    #[test]
    fn replace_keeps_selection_in_range_else_resets() {
        let mut registry = two_monitors();
        registry.select(1);

        registry.replace(vec![
            monitor("DP-1", 0, 0, 1920, 1080),
            monitor("DP-2", 1920, 0, 1920, 1080),
            monitor("DP-3", 3840, 0, 1920, 1080),
        ]);
        assert_eq!(registry.selected_index(), 1);

        registry.replace(vec![monitor("DP-1", 0, 0, 1920, 1080)]);
        assert_eq!(registry.selected_index(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_registry_has_no_selection() {
        let mut registry = MonitorRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.selected().is_none());
        assert!(!registry.select(0));
    }
}
