//! Output formatting for different formats.

use clap::ValueEnum;

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables and text
    #[default]
    Pretty,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!(OutputFormat::from_str("json", true).unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::default(), OutputFormat::Pretty);
        assert!(OutputFormat::from_str("yaml", true).is_err());
    }
}
