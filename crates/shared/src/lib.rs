pub mod backend_api;
pub mod context;
pub mod error;
pub mod flow;
pub mod message;

pub mod settings {
    use std::env;
    use std::path::PathBuf;

    fn default_true() -> bool {
        true
    }

    /// Application settings for a context aggregation session.
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct AppSettings {
        /// Base URL of the extraction backend (no trailing slash).
        pub api_base_url: String,
        /// Echo the tunneling-proxy bypass header on every request.
        #[serde(default = "default_true")]
        pub send_bypass_header: bool,
        /// Filename used for the persisted context artifact.
        pub context_filename: String,
        /// Override for the direct-download fallback directory.
        #[serde(default)]
        pub download_dir: Option<PathBuf>,
    }

    impl AppSettings {
        /// Load settings from the environment, falling back to defaults.
        pub fn from_env() -> Self {
            Self {
                api_base_url: env::var("CONTEXT_FILE_API_URL")
                    .unwrap_or_else(|_| "http://localhost:3001".to_string()),
                send_bypass_header: true,
                context_filename: "context.txt".to_string(),
                download_dir: env::var("CONTEXT_FILE_DOWNLOAD_DIR").ok().map(PathBuf::from),
            }
        }
    }

    impl Default for AppSettings {
        fn default() -> Self {
            Self {
                api_base_url: "http://localhost:3001".to_string(),
                send_bypass_header: true,
                context_filename: "context.txt".to_string(),
                download_dir: None,
            }
        }
    }

}
