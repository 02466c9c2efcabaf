//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn source() -> PathBuf {
        "src".into()
    }

    pub fn output() -> PathBuf {
        "site".into()
    }

    /// Editor droppings and dotfiles are never pages.
    pub fn ignore() -> Vec<String> {
        vec![".*".into(), "*~".into(), "*.swp".into(), "*.bak".into()]
    }

    pub fn max_rounds() -> usize {
        8
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8000
    }

    pub fn debounce_ms() -> u64 {
        300
    }
}

// ============================================================================
// [[rule]] Defaults
// ============================================================================

pub mod rule {
    pub fn dest() -> String {
        "{path}".into()
    }
}
