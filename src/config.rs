use std::io::Read;
use std::path::{Path, PathBuf};

/// Settings for the `grid-2048` binary. Every field has a default, so an
/// empty TOML file (or no file at all) is valid. Command-line flags win over
/// anything set here.
#[derive(Clone, Debug, PartialEq, Default, serde::Deserialize)]
pub struct Config {
    /// Seed for tile spawns; `None` draws one from the OS.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub play: Play,
    #[serde(default)]
    pub soak: Soak,
    #[serde(default)]
    pub trace: Trace,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct Play {
    /// Print the key help before the first board.
    #[serde(default = "default_true")]
    pub show_help: bool,
}

impl Default for Play {
    fn default() -> Self {
        Play { show_help: true }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct Soak {
    #[serde(default = "default_games")]
    pub games: u32,
    /// Stop a game after this many accepted moves.
    #[serde(default)]
    pub max_moves: Option<u64>,
}

impl Default for Soak {
    fn default() -> Self {
        Soak { games: default_games(), max_moves: None }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, Default)]
pub struct Trace {
    /// Directory for `.g2run` files written by `soak`.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_games() -> u32 {
    100
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

impl Config {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut contents = String::new();
        std::fs::File::open(path)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}
