//! Server Configuration

/// Settings read from the environment at startup
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Public origin used to build redirect URLs
    pub site_url: String,

    /// Listen address
    pub bind_addr: String,

    /// Mark new purchases as test purchases
    pub test_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:3000".into(),
            bind_addr: "0.0.0.0:3000".into(),
            test_mode: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            site_url: std::env::var("SITE_URL").unwrap_or(defaults.site_url),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            test_mode: std::env::var("TEST_MODE").is_ok_and(|v| parse_flag(&v)),
        }
    }
}

/// `true`/`1`/`yes`, case-insensitive
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
