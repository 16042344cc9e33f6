use crate::{api::DEFAULT_API_BASE_URL, storage::default_token_path};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: String,
    /// `None` only when no config directory is known and none was given.
    pub token_file: Option<PathBuf>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_url: String) -> Self {
        Self {
            api_url,
            token_file: default_token_path(),
        }
    }

    pub fn set_token_file(&mut self, token_file: PathBuf) {
        self.token_file = Some(token_file);
    }
}

impl Default for GlobalArgs {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL.to_string())
    }
}
