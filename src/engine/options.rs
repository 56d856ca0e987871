//! Load-time module option parsing (`secret=<path>`, `noskewadj`).

use crate::engine::error::{PamTotpError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleOptions {
    /// Raw, unexpanded path spec; `None` means use the default.
    pub secret_path_spec: Option<String>,
    /// Disables automatic skew search and learning (§4.7).
    pub no_skew_adj: bool,
}

pub const DEFAULT_PATH_SPEC: &str = "~/.google_authenticator";

impl ModuleOptions {
    /// Parse the tokens the host passes at module load. Unknown tokens are
    /// a fatal configuration error.
    pub fn parse<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut opts = ModuleOptions::default();
        for token in tokens {
            if let Some(path) = token.strip_prefix("secret=") {
                opts.secret_path_spec = Some(path.to_string());
            } else if token == "noskewadj" {
                opts.no_skew_adj = true;
            } else {
                return Err(PamTotpError::UnknownOption(token.to_string()));
            }
        }
        Ok(opts)
    }

    pub fn path_spec(&self) -> &str {
        self.secret_path_spec.as_deref().unwrap_or(DEFAULT_PATH_SPEC)
    }
}
