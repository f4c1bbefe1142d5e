use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RcConfig {
    pub history_depth: usize,
    pub coalesce: bool,
    pub table_rows: usize,
    pub table_cols: usize,
    pub table_header: bool,
}

impl Default for RcConfig {
    fn default() -> Self {
        Self {
            history_depth: 100,
            coalesce: true,
            table_rows: 3,
            table_cols: 3,
            table_header: true,
        }
    }
}

pub struct RcLoader;

impl RcLoader {
    /// Get the path to the RC file
    /// Looks for .blockpadrc in:
    /// 1. Current directory
    /// 2. Home directory (~/.blockpadrc)
    pub fn get_rc_path() -> Option<PathBuf> {
        let current_rc = Path::new(".blockpadrc");
        if current_rc.exists() {
            return Some(current_rc.to_path_buf());
        }

        if let Ok(home) = env::var("HOME") {
            let home_rc = Path::new(&home).join(".blockpadrc");
            if home_rc.exists() {
                return Some(home_rc);
            }
        }

        None
    }

    /// Load and parse the RC file
    pub fn load_config() -> RcConfig {
        let mut config = RcConfig::default();

        if let Some(rc_path) = Self::get_rc_path() {
            if let Ok(content) = fs::read_to_string(&rc_path) {
                Self::parse_config_content(&content, &mut config);
            }
            // Silently fall back to defaults if the file is unreadable.
        }

        config
    }

    pub fn parse_config_content(content: &str, config: &mut RcConfig) {
        for line in content.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') || line.starts_with('"') {
                continue;
            }

            Self::parse_config_line(line, config);
        }
    }

    fn parse_config_line(line: &str, config: &mut RcConfig) {
        // Remove inline comments
        let line = if let Some(pos) = line.find('#') {
            &line[..pos]
        } else {
            line
        }
        .trim();

        if let Some(stripped) = line.strip_prefix("set ") {
            let setting = stripped.trim();

            if setting == "coalesce" {
                config.coalesce = true;
            } else if setting == "nocoalesce" {
                config.coalesce = false;
            } else if setting == "tableheader" {
                config.table_header = true;
            } else if setting == "notableheader" {
                config.table_header = false;
            } else if let Some(value) = setting.strip_prefix("history=") {
                if let Ok(depth) = value.parse::<usize>() {
                    if depth > 0 && depth <= 10_000 {
                        config.history_depth = depth;
                    }
                }
            } else if let Some(value) = setting.strip_prefix("tablesize=") {
                // rowsxcols, e.g. tablesize=3x4
                if let Some((rows, cols)) = value.split_once('x') {
                    if let (Ok(rows), Ok(cols)) = (rows.parse::<usize>(), cols.parse::<usize>()) {
                        if (1..=20).contains(&rows) && (1..=20).contains(&cols) {
                            config.table_rows = rows;
                            config.table_cols = cols;
                        }
                    }
                }
            }
            // Unknown settings are ignored, like any rc file.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RcConfig::default();
        assert_eq!(config.history_depth, 100);
        assert!(config.coalesce);
        assert_eq!((config.table_rows, config.table_cols), (3, 3));
        assert!(config.table_header);
    }

    #[test]
    fn test_parse_settings() {
        let mut config = RcConfig::default();
        let content = "\
# my settings
set history=250
set nocoalesce
set tablesize=4x2  # wide tables
set notableheader
";
        RcLoader::parse_config_content(content, &mut config);
        assert_eq!(config.history_depth, 250);
        assert!(!config.coalesce);
        assert_eq!((config.table_rows, config.table_cols), (4, 2));
        assert!(!config.table_header);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let mut config = RcConfig::default();
        RcLoader::parse_config_content(
            "set history=0\nset tablesize=99x1\nset tablesize=junk\nnonsense line\n",
            &mut config,
        );
        assert_eq!(config.history_depth, 100);
        assert_eq!((config.table_rows, config.table_cols), (3, 3));
    }
}
