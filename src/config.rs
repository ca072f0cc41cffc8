//! Runtime settings and connector configuration surface.

use std::env;

use anyhow::{Context, Result};
use serde::Serialize;

/// The platform's maximum addressable cell count per document.
pub const DEFAULT_CAPACITY_CEILING: u64 = 2_000_000;

/// Environment-driven runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub capacity_ceiling: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            env::var("SHEETS_AUDIT_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let capacity_ceiling = match env::var("SHEETS_AUDIT_CELL_LIMIT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid SHEETS_AUDIT_CELL_LIMIT: {}", raw))?,
            Err(_) => DEFAULT_CAPACITY_CEILING,
        };

        Ok(Self {
            bind_addr,
            capacity_ceiling,
        })
    }
}

/// One user-facing configuration input of the connector.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigParam {
    pub name: String,
    pub display_name: String,
    pub help_text: String,
    pub placeholder: String,
}

/// Configuration parameters the reporting tool shows when a user sets up
/// the connector.
pub fn connector_config() -> Vec<ConfigParam> {
    vec![ConfigParam {
        name: "url".to_string(),
        display_name: "Google Sheet Url".to_string(),
        help_text: "Enter the Google Sheet Url to perform the audit on.".to_string(),
        placeholder: "https://docs.google.com/spreadsheets/".to_string(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_config_has_url_param() {
        let params = connector_config();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "url");
    }
}
