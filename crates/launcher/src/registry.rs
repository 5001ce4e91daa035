//! Static app registry.
//!
//! The launcher's list of registered applications. Read-only, loaded once
//! at startup into the application state.

/// One registered application.
#[derive(Debug, Clone)]
pub struct AppEntry {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Logo image URL.
    pub logo_url: String,
    /// Where the card links to (internal path or external URL).
    pub app_url: String,
    /// Short description shown on the card.
    pub description: Option<String>,
    /// Accessibility/search hint.
    pub hint: Option<String>,
}

/// Ordered, read-only collection of registered applications.
#[derive(Debug, Clone)]
pub struct AppRegistry {
    entries: Vec<AppEntry>,
}

impl AppRegistry {
    /// The built-in registry.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            entries: vec![AppEntry {
                id: "wisePantry".to_string(),
                name: "WisePantry".to_string(),
                logo_url: "/static/images/wise-pantry.png".to_string(),
                app_url: "/pantry".to_string(),
                description: Some(
                    "WisePantry helps you manage your grocery shopping by allowing you to \
                     save items you need to buy."
                        .to_string(),
                ),
                hint: Some("shopping app".to_string()),
            }],
        }
    }

    /// Registered applications, in display order.
    #[must_use]
    pub fn entries(&self) -> &[AppEntry] {
        &self.entries
    }
}
