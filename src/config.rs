use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Credentials;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid listen address {addr:?}: {reason}")]
    Addr { addr: String, reason: String },

    #[error("failed to resolve {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Settings of one share. Every field may come from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// `host:port` to listen on; an empty host means every interface.
    pub addr: String,
    pub username: String,
    pub password: String,
    /// Folder to share. Defaults to the current working directory.
    pub root: Option<PathBuf>,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            addr: ":8080".to_string(),
            username: String::new(),
            password: String::new(),
            root: None,
        }
    }
}

impl ShareConfig {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr(&self.addr)
    }

    /// Absolute, symlink-free path of the shared folder.
    pub fn resolve_root(&self) -> Result<PathBuf, ConfigError> {
        let root = self.root.clone().unwrap_or_else(|| PathBuf::from("."));
        let resolved = root
            .canonicalize()
            .map_err(|source| ConfigError::Root { path: root, source })?;
        if !resolved.is_dir() {
            return Err(ConfigError::NotADirectory(resolved));
        }
        Ok(resolved)
    }
}

/// Parses `host:port`. The host may be empty, an IP literal (IPv6 in
/// brackets) or a name that resolves locally.
pub fn parse_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = |reason: &str| ConfigError::Addr {
        addr: addr.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = addr.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
    let port: u16 = port.parse().map_err(|_| invalid("bad port"))?;
    let host = match host.strip_prefix('[') {
        Some(inner) => inner.strip_suffix(']').ok_or_else(|| invalid("unterminated '['"))?,
        None if host.contains(':') => return Err(invalid("too many colons")),
        None => host,
    };

    if host.is_empty() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    (host, port)
        .to_socket_addrs()
        .map_err(|err| invalid(&err.to_string()))?
        .next()
        .ok_or_else(|| invalid("host has no addresses"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ShareConfig::default();
        assert_eq!(config.addr, ":8080");
        assert!(!config.credentials().is_enabled());
        assert_eq!(config.listen_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn test_parse_addr() {
        assert_eq!(parse_addr(":8080").unwrap(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(parse_addr("127.0.0.1:9000").unwrap(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(parse_addr("[::1]:9000").unwrap(), "[::1]:9000".parse().unwrap());
        assert!(parse_addr("localhost:9000").unwrap().ip().is_loopback());
    }

    #[test]
    fn test_parse_addr_malformed() {
        for addr in ["", "8080", "127.0.0.1", ":http", ":99999", "::1:80", "[::1:80"] {
            assert!(matches!(parse_addr(addr), Err(ConfigError::Addr { .. })), "{addr}");
        }
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sharefolder.toml");
        std::fs::write(
            &path,
            "addr = \"127.0.0.1:9000\"\nusername = \"user\"\npassword = \"pass\"\nroot = \"/srv/share\"\n",
        )
        .unwrap();

        let config = ShareConfig::from_file(&path).unwrap();
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.credentials(), Credentials::new("user", "pass"));
        assert_eq!(config.root, Some(PathBuf::from("/srv/share")));
    }

    #[test]
    fn test_from_file_partial_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sharefolder.toml");
        std::fs::write(&path, "username = \"user\"\n").unwrap();

        let config = ShareConfig::from_file(&path).unwrap();
        assert_eq!(config.addr, ":8080");
        assert_eq!(config.username, "user");
        assert!(config.password.is_empty());
    }

    #[test]
    fn test_from_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = ShareConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "addr = [").unwrap();
        assert!(matches!(ShareConfig::from_file(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_resolve_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();

        let config = ShareConfig {
            root: Some(dir.path().to_path_buf()),
            ..ShareConfig::default()
        };
        let root = config.resolve_root().unwrap();
        assert!(root.is_absolute());
        assert_eq!(root, dir.path().canonicalize().unwrap());

        let config = ShareConfig {
            root: Some(file),
            ..ShareConfig::default()
        };
        assert!(matches!(config.resolve_root(), Err(ConfigError::NotADirectory(_))));

        let config = ShareConfig {
            root: Some(dir.path().join("missing")),
            ..ShareConfig::default()
        };
        assert!(matches!(config.resolve_root(), Err(ConfigError::Root { .. })));
    }
}
