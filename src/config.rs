use clap::ValueEnum;
use std::path::PathBuf;

/// Everything one pipeline run needs to know, built once in `main` and
/// passed by reference to each stage.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service-account key used for both Drive and Cloud Storage.
    pub credentials_path: PathBuf,
    /// Bucket the converted file is published to.
    pub bucket: String,
    /// Slack channel notifications go to.
    pub channel: String,
    /// Substring a remote filename must contain to be selected.
    pub name_marker: String,
    /// Environment variable holding the Slack bot token.
    pub token_var: String,
    /// Where the downloaded and converted files land.
    pub work_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("service-accounts-273522.json"),
            bucket: "siem-prod".to_string(),
            channel: "#teste_save_files_bucket".to_string(),
            name_marker: "Base".to_string(),
            token_var: "SLACK_TOKEN".to_string(),
            work_dir: PathBuf::from("."),
        }
    }
}

/// Which base the run processes. The profiles share the fetch and convert
/// stages and differ only in which optional stages run afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    Desligados,
    Leak,
}

/// Optional stages enabled for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    pub publish: bool,
    pub notify: bool,
}

impl Profile {
    pub fn label(self) -> &'static str {
        match self {
            Profile::Desligados => "Desligados",
            Profile::Leak => "Leak",
        }
    }

    pub fn stages(self) -> Stages {
        match self {
            Profile::Desligados => Stages {
                publish: false,
                notify: false,
            },
            Profile::Leak => Stages {
                publish: true,
                notify: true,
            },
        }
    }
}
