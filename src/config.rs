use comrak::ComrakOptions;
use gotham_derive::StateData;

use std::path::Path;

/// System wide location of the configuration file.
const SYSTEM_CONFIG: &str = "/etc/scribe/scribe.toml";
/// Fallback location, relative to the working directory.
const LOCAL_CONFIG: &str = "scribe.toml";

/// Application wide settings defined in configuration file.
#[derive(Deserialize, StateData, Clone)]
pub struct Settings {
    /// Path of the SQLite database file
    pub database_url: String,
    /// IP address to bind to
    pub host_address: String,
    /// Cookie settings
    #[serde(default)]
    pub cookie: Cookie,
}

impl Settings {
    pub fn from_slice(data: &[u8]) -> Result<Self, toml::de::Error> {
        toml::from_slice(data)
    }

    /// Reads the system configuration file if there is one, the local one otherwise.
    pub fn load() -> Result<Self, failure::Error> {
        let path = if Path::new(SYSTEM_CONFIG).is_file() {
            Path::new(SYSTEM_CONFIG)
        } else {
            Path::new(LOCAL_CONFIG)
        };
        let data = std::fs::read(path)?;
        tracing::info!("Read settings from {}", path.display());
        Ok(Self::from_slice(&data)?)
    }
}

/// Cookie related settings
#[derive(Deserialize, Clone, Default)]
pub struct Cookie {
    /// Require HTTPS for cookies
    #[serde(default)]
    pub secure: bool,
    /// Restrict cookies to given domain if set
    pub domain: Option<String>,
}

/// Options for markdown formatting of comments. Raw HTML is escaped.
pub const COMRAK_OPTS: ComrakOptions = ComrakOptions {
    hardbreaks: false,
    smart: false,
    github_pre_lang: true,
    width: 0,
    default_info_string: None,
    unsafe_: false,
    ext_strikethrough: true,
    ext_tagfilter: false,
    ext_table: true,
    ext_autolink: true,
    ext_tasklist: false,
    ext_superscript: false,
    ext_header_ids: None,
    ext_footnotes: true,
    ext_description_lists: false,
};

/// Post bodies are written by the admin and may embed HTML.
pub const COMRAK_POST_OPTS: ComrakOptions = ComrakOptions {
    unsafe_: true,
    ..COMRAK_OPTS
};
