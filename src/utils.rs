use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(&self) -> &'static str {
        match self {
            Profile::Dev => "grid-dev",
            Profile::Prod => "grid",
        }
    }
}

/// Get the configuration directory path for Grid
/// If profile is Dev, uses "grid-dev" instead of "grid"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "grid", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path for Grid
/// If profile is Dev, uses "grid-dev" instead of "grid"
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "grid", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<chrono::NaiveDate, chrono::ParseError> {
    chrono::NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
}

/// Parse tags from a comma-separated string
/// Returns a vector of trimmed, non-empty tag strings
pub fn parse_tags(tags: Option<&str>) -> Vec<String> {
    match tags {
        Some(tags_str) if !tags_str.trim().is_empty() => tags_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Format tags as a string with brackets: [tag1] [tag2] [tag3]
pub fn format_tags_brackets(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("[{}]", tag))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tags_trims_and_drops_empties() {
        assert_eq!(
            parse_tags(Some(" work, ,home ")),
            vec!["work".to_string(), "home".to_string()]
        );
        assert!(parse_tags(Some("  ")).is_empty());
        assert!(parse_tags(None).is_empty());
    }

    #[test]
    fn format_tags_uses_brackets() {
        let tags = vec!["a".to_string(), "b".to_string()];
        assert_eq!(format_tags_brackets(&tags), "[a] [b]");
    }

    #[test]
    fn parse_date_accepts_iso_dates_only() {
        assert!(parse_date("2024-02-29").is_ok());
        assert!(parse_date("02/29/2024").is_err());
    }

    #[test]
    fn expand_path_leaves_absolute_paths_alone() {
        assert_eq!(expand_path("/tmp/app.db"), PathBuf::from("/tmp/app.db"));
    }
}
