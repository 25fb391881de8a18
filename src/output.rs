//! # Output Configuration
//!
//! Controls how the `ci-compose` commands decorate their terminal output:
//! whether status lines carry emoji and whether pipeline names are styled.
//!
//! The decision honours, in order:
//! - `--color=never|always|auto` on the command line
//! - `NO_COLOR` (any value, see https://no-color.org/)
//! - `CLICOLOR=0` and `CLICOLOR_FORCE=1`
//! - `TERM=dumb`
//! - whether stdout is a terminal
//!
//! ## Usage
//!
//! ```rust
//! use ci_compose::output::{emoji, OutputConfig};
//!
//! let out = OutputConfig::from_env_and_flag("never");
//! assert_eq!(emoji(&out, "✅", "[OK]"), "[OK]");
//! assert_eq!(out.bold("backend"), "backend");
//! ```

use std::env;

use console::style;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Build from the `--color` flag value ("always", "never" or "auto"),
    /// falling back to environment detection for anything but the first two.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Render `text` in bold when colors are enabled.
    pub fn bold(&self, text: &str) -> String {
        if self.use_color {
            style(text).bold().force_styling(true).to_string()
        } else {
            text.to_string()
        }
    }

    /// Render `text` dimmed when colors are enabled.
    pub fn dim(&self, text: &str) -> String {
        if self.use_color {
            style(text).dim().force_styling(true).to_string()
        } else {
            text.to_string()
        }
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji_str` when colors are enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}
