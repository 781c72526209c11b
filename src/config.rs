//! Settings resolution
//!
//! Settings are layered from three sources, lowest precedence first:
//!
//! 1. `.fetchrc` in the current directory, then `~/.fetchrc` (the
//!    home file wins for keys present in both)
//! 2. Command-line flags
//! 3. `POP3_*` environment variables, when set and non-empty

use crate::error::{Error, Result};
use ini::{Ini, ParseOption};
use std::env;
use std::path::{Path, PathBuf};

/// Standard POP3-over-TLS port.
pub const DEFAULT_PORT: u16 = 995;

/// Name of the config file looked up in the working and home directories.
pub const CONFIG_FILE_NAME: &str = ".fetchrc";

pub const ENV_USER: &str = "POP3_USER";
pub const ENV_PASSWORD: &str = "POP3_PASSWORD";
pub const ENV_SERVER: &str = "POP3_SERVER";
pub const ENV_DIRECTORY: &str = "POP3_DIRECTORY";
pub const ENV_PORT: &str = "POP3_PORT";

/// How fetched messages are grouped on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubdirMode {
    /// Every part lands directly in the destination directory.
    #[default]
    None,
    /// One subdirectory per message, named by its UID.
    ByUid,
    /// One subdirectory per message, named by its Subject header.
    BySubject,
}

impl SubdirMode {
    /// Build the mode from the `--subdirs` / `--subject` flag pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if both flags are set.
    pub fn from_flags(subdirs: bool, subject: bool) -> Result<Self> {
        match (subdirs, subject) {
            (true, true) => Err(Error::Config(
                "--subdirs and --subject are mutually exclusive".into(),
            )),
            (true, false) => Ok(Self::ByUid),
            (false, true) => Ok(Self::BySubject),
            (false, false) => Ok(Self::None),
        }
    }
}

/// Values read from the INI config files. Absent keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub server: Option<String>,
    pub port: Option<String>,
    pub directory: Option<String>,
}

impl FileConfig {
    /// The config file locations, in the order they are applied.
    #[must_use]
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Read every existing file in `paths`; later files override
    /// earlier ones key by key. Missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a file exists but cannot be read or
    /// parsed.
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Self::default();
        for path in paths {
            match Self::load_file(path)? {
                Some(layer) => {
                    tracing::debug!("Loaded config from {}", path.display());
                    config = config.overlay(layer);
                }
                None => tracing::debug!("No config at {}", path.display()),
            }
        }
        Ok(config)
    }

    /// Parse INI text with `[auth]` and `[locations]` sections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed INI.
    pub fn parse(text: &str) -> Result<Self> {
        let ini = Ini::load_from_str_opt(text, parse_option())
            .map_err(|e| Error::Config(format!("Invalid config: {e}")))?;
        Ok(Self::from_ini(&ini))
    }

    fn load_file(path: &Path) -> Result<Option<Self>> {
        match Ini::load_from_file_opt(path, parse_option()) {
            Ok(ini) => Ok(Some(Self::from_ini(&ini))),
            Err(ini::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Config(format!(
                "Cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    fn from_ini(ini: &Ini) -> Self {
        let get = |section: &str, key: &str| {
            ini.section(Some(section))
                .and_then(|props| props.get(key))
                .map(str::to_string)
        };
        Self {
            user: get("auth", "user"),
            password: get("auth", "password"),
            server: get("auth", "server"),
            port: get("auth", "port"),
            directory: get("locations", "directory"),
        }
    }

    /// Keys set in `other` replace the ones in `self`.
    #[must_use]
    pub fn overlay(self, other: Self) -> Self {
        Self {
            user: other.user.or(self.user),
            password: other.password.or(self.password),
            server: other.server.or(self.server),
            port: other.port.or(self.port),
            directory: other.directory.or(self.directory),
        }
    }
}

/// Plain INI: no quote stripping or backslash escapes.
fn parse_option() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    }
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub user: Option<String>,
    pub password: Option<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub directory: Option<PathBuf>,
}

/// Boolean switches that only come from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub delete_on_fetch: bool,
    pub subdir_mode: SubdirMode,
    /// Accept any server certificate.
    pub insecure: bool,
    /// Reduce part filenames and subject directories to one safe path
    /// component.
    pub sanitize_filenames: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub user: String,
    pub password: String,
    pub server: String,
    pub port: u16,
    pub directory: PathBuf,
    pub delete_on_fetch: bool,
    pub subdir_mode: SubdirMode,
    pub insecure: bool,
    pub sanitize_filenames: bool,
}

impl Settings {
    /// Layer the three sources. `env` looks up an environment variable;
    /// empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a port value is not a valid number.
    pub fn resolve(
        file: &FileConfig,
        cli: &Overrides,
        options: Options,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        let pick = |key: &str, cli: Option<&String>, file: Option<&String>| {
            env(key)
                .or_else(|| cli.cloned())
                .or_else(|| file.cloned())
                .unwrap_or_default()
        };

        let port = match env(ENV_PORT) {
            Some(raw) => parse_port(ENV_PORT, &raw)?,
            None => match (cli.port, file.port.as_deref()) {
                (Some(port), _) => port,
                (None, Some(raw)) => parse_port("[auth] port", raw)?,
                (None, None) => DEFAULT_PORT,
            },
        };

        let directory = env(ENV_DIRECTORY)
            .map(PathBuf::from)
            .or_else(|| cli.directory.clone())
            .or_else(|| file.directory.as_ref().map(PathBuf::from))
            .unwrap_or_default();

        Ok(Self {
            user: pick(ENV_USER, cli.user.as_ref(), file.user.as_ref()),
            password: pick(ENV_PASSWORD, cli.password.as_ref(), file.password.as_ref()),
            server: pick(ENV_SERVER, cli.server.as_ref(), file.server.as_ref()),
            port,
            directory,
            delete_on_fetch: options.delete_on_fetch,
            subdir_mode: options.subdir_mode,
            insecure: options.insecure,
            sanitize_filenames: options.sanitize_filenames,
        })
    }

    /// Resolve against the real config files and process environment.
    ///
    /// Loads a `.env` file first if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a config file is malformed or a port
    /// value is invalid.
    pub fn from_sources(cli: &Overrides, options: Options) -> Result<Self> {
        dotenvy::dotenv().ok();
        let file = FileConfig::load(&FileConfig::default_paths())?;
        Self::resolve(&file, cli, options, |key| env::var(key).ok())
    }

    /// Check that everything needed to connect and write is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first missing setting.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("user", self.user.is_empty()),
            ("password", self.password.is_empty()),
            ("server", self.server.is_empty()),
            ("directory", self.directory.as_os_str().is_empty()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(Error::Config(format!("{name} is not set")));
        }
        Ok(())
    }
}

fn parse_port(source: &str, raw: &str) -> Result<u16> {
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid port in {source}: {e}")))
}
