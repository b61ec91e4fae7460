//! Naming of cache generations.
//!
//! The lifecycle manager decides which generations survive activation and the
//! router decides which generation each strategy writes to. Both receive the
//! same [`GenerationNamer`], so the names they derive cannot drift apart.

/// Group holding the precached shell and offline document
pub const STATIC: &str = "static";
pub const IMAGES: &str = "images";
pub const PAGES: &str = "pages";

/// Groups whose generations survive activation
pub const RETAINED_GROUPS: [&str; 3] = [STATIC, IMAGES, PAGES];

/// `"<group>-<version>"`
pub fn versioned_name(group: &str, version: &str) -> String {
    format!("{group}-{version}")
}

/// Pure function from `(group, version)` to a generation name
#[derive(Debug, Clone, Copy)]
pub struct GenerationNamer(fn(&str, &str) -> String);

impl GenerationNamer {
    pub fn new(name: fn(&str, &str) -> String) -> Self {
        Self(name)
    }

    pub fn name(&self, group: &str, version: &str) -> String {
        (self.0)(group, version)
    }
}

impl Default for GenerationNamer {
    fn default() -> Self {
        Self(versioned_name)
    }
}
