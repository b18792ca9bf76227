use serde::{Deserialize, Serialize};

/// Which FAI photo set a session captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Inspection,
    Packout,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Inspection => "inspection",
            Mode::Packout => "packout",
        }
    }

    /// Title-cased token used in fallback filenames and archive names.
    pub fn file_token(&self) -> &'static str {
        match self {
            Mode::Inspection => "Inspection",
            Mode::Packout => "Packout",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Inspection => "Inspection FAI",
            Mode::Packout => "Packout FAI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }

    /// Parse from the string stored in the database.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "portrait" => Some(Orientation::Portrait),
            "landscape" => Some(Orientation::Landscape),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
