//! Registry of installable applications, consulted at window creation.

use desktop_contract::{AppDescriptor, ApplicationId};

/// Ordered descriptor set. Registration order is preserved and doubles as
/// launcher ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppRegistry {
    entries: Vec<AppDescriptor>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_apps(apps: impl IntoIterator<Item = AppDescriptor>) -> Self {
        let mut registry = Self::new();
        for descriptor in apps {
            registry.register(descriptor);
        }
        registry
    }

    /// Adds `descriptor`, replacing any earlier registration of the same app
    /// in place.
    pub fn register(&mut self, descriptor: AppDescriptor) {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.app_id == descriptor.app_id)
        {
            Some(existing) => *existing = descriptor,
            None => self.entries.push(descriptor),
        }
    }

    pub fn descriptor(&self, app_id: &ApplicationId) -> Option<&AppDescriptor> {
        self.entries.iter().find(|entry| entry.app_id == *app_id)
    }

    pub fn contains(&self, app_id: &ApplicationId) -> bool {
        self.descriptor(app_id).is_some()
    }

    /// Descriptors that should appear in a launcher surface.
    pub fn launcher_apps(&self) -> impl Iterator<Item = &AppDescriptor> {
        self.entries.iter().filter(|entry| entry.show_in_launcher)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn descriptor(app_id: &str, title: &str) -> AppDescriptor {
        AppDescriptor::new(ApplicationId::trusted(app_id), title, "icons/generic")
    }

    #[test]
    fn register_replaces_in_place_and_keeps_order() {
        let mut registry = AppRegistry::with_apps([
            descriptor("calc", "Calculator"),
            descriptor("notes", "Notes"),
        ]);
        registry.register(descriptor("calc", "Calculator Pro"));

        assert_eq!(registry.len(), 2);
        let titles: Vec<&str> = registry.iter().map(|entry| entry.title.as_str()).collect();
        assert_eq!(titles, vec!["Calculator Pro", "Notes"]);
    }

    #[test]
    fn launcher_listing_skips_hidden_apps() {
        let mut hidden = descriptor("daemon", "Background Daemon");
        hidden.show_in_launcher = false;
        let registry = AppRegistry::with_apps([descriptor("calc", "Calculator"), hidden]);

        let launcher: Vec<&str> = registry
            .launcher_apps()
            .map(|entry| entry.app_id.as_str())
            .collect();
        assert_eq!(launcher, vec!["calc"]);
        assert!(registry.contains(&ApplicationId::trusted("daemon")));
    }
}
