use std::path::PathBuf;

/// Upper bound on concurrent members of one room.
pub const MAX_CLIENTS: usize = 50;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub max_clients: usize,
    /// Document root for the static asset fallback.
    pub assets_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_owned(),
            port: 8080,
            max_clients: MAX_CLIENTS,
            assets_dir: PathBuf::from("./public"),
        }
    }
}
