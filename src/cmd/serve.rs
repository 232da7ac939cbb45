//! Board server command: `taskboard serve`.

use anyhow::Result;
use std::path::{Path, PathBuf};

use taskboard::board::server::{self, ServerConfig};
use taskboard::config::TaskboardConfig;

/// CLI flags that override file and environment settings.
#[derive(Debug, Default)]
pub struct ServeOverrides {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub db_path: Option<PathBuf>,
    pub dev: bool,
}

pub fn server_config(
    project_dir: &Path,
    config: &TaskboardConfig,
    overrides: ServeOverrides,
) -> ServerConfig {
    let mut server = config.to_server_config();
    if let Some(port) = overrides.port {
        server.port = port;
    }
    if let Some(host) = overrides.host {
        server.host = host;
    }
    if let Some(db_path) = overrides.db_path {
        server.db_path = db_path;
    }
    server.dev_mode |= overrides.dev;
    server.db_path = project_dir.join(&server.db_path);
    server
}

pub async fn cmd_serve(
    project_dir: &Path,
    config: TaskboardConfig,
    overrides: ServeOverrides,
) -> Result<()> {
    let server = server_config(project_dir, &config, overrides);
    if server.webhook_url.is_none() {
        tracing::info!("no webhook configured, assignment notifications are logged only");
    }
    server::start_server(server).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_win() {
        let mut config = TaskboardConfig::default();
        config.server.port = 4000;
        let server = server_config(
            Path::new("/srv/project"),
            &config,
            ServeOverrides {
                port: Some(5000),
                dev: true,
                ..Default::default()
            },
        );
        assert_eq!(server.port, 5000);
        assert!(server.dev_mode);
        assert_eq!(server.db_path, PathBuf::from("/srv/project/.taskboard/board.db"));
    }

    #[test]
    fn test_absolute_db_path_is_kept() {
        let server = server_config(
            Path::new("/srv/project"),
            &TaskboardConfig::default(),
            ServeOverrides {
                db_path: Some(PathBuf::from("/var/lib/board.db")),
                ..Default::default()
            },
        );
        assert_eq!(server.db_path, PathBuf::from("/var/lib/board.db"));
        assert_eq!(server.port, 3141);
    }
}
