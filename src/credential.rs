//! API key lookup for the notebooks.
//!
//! The key is read from an environment variable first. When the variable is
//! missing or empty the user is asked for it with a masked terminal prompt.

use crate::error::CredentialError;
use std::fmt;

/// Environment variable holding the IonQ API key
pub const DEFAULT_API_KEY_VAR: &str = "IONQ_API_KEY";

/// A value that is empty or only whitespace counts as unset
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Where a credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    Prompt,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Prompt => write!(f, "interactive prompt"),
        }
    }
}

/// A resolved secret. `Debug` never prints the value.
#[derive(Clone)]
pub struct Credential {
    secret: String,
    source: CredentialSource,
}

impl Credential {
    pub fn expose(&self) -> &str {
        &self.secret
    }

    pub fn into_inner(self) -> String {
        self.secret
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.secret.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Masked input from the user
pub trait SecretPrompt {
    fn read_secret(&self, label: &str) -> std::io::Result<String>;
}

/// Prompt on the controlling terminal with echo disabled
pub struct TerminalPrompt;

impl SecretPrompt for TerminalPrompt {
    fn read_secret(&self, label: &str) -> std::io::Result<String> {
        dialoguer::Password::new()
            .with_prompt(label)
            .allow_empty_password(true)
            .interact()
            .map_err(|e| match e {
                dialoguer::Error::IO(io) => io,
            })
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

pub struct CredentialResolver {
    env: EnvLookup,
    prompt: Box<dyn SecretPrompt>,
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new(|name| std::env::var(name).ok(), TerminalPrompt)
    }
}

impl CredentialResolver {
    pub fn new<F, P>(env: F, prompt: P) -> Self
    where
        F: Fn(&str) -> Option<String> + 'static,
        P: SecretPrompt + 'static,
    {
        Self {
            env: Box::new(env),
            prompt: Box::new(prompt),
        }
    }

    /// Resolve the credential named by `variable`.
    ///
    /// A non-blank environment value wins without touching the terminal.
    /// Otherwise the prompt is shown; any prompt failure (no TTY, closed
    /// stream, Ctrl-C) or a blank answer becomes
    /// [`CredentialError::Unavailable`]. Values are returned as given.
    pub fn resolve(&self, variable: &str) -> Result<Credential, CredentialError> {
        if let Some(value) = (self.env)(variable).filter(|v| !is_blank(v)) {
            log::debug!("Using {} from environment", variable);
            return Ok(Credential {
                secret: value,
                source: CredentialSource::Environment,
            });
        }

        log::debug!("{} not set, prompting", variable);
        let label = format!("Enter your IonQ API key ({})", variable);
        match self.prompt.read_secret(&label) {
            Ok(secret) if !is_blank(&secret) => Ok(Credential {
                secret,
                source: CredentialSource::Prompt,
            }),
            Ok(_) => Err(CredentialError::Unavailable {
                variable: variable.to_string(),
                source: None,
            }),
            Err(e) => Err(CredentialError::Unavailable {
                variable: variable.to_string(),
                source: Some(e),
            }),
        }
    }

    pub fn resolve_default(&self) -> Result<Credential, CredentialError> {
        self.resolve(DEFAULT_API_KEY_VAR)
    }
}

/// Resolve the API key from the real environment and terminal
pub fn get_api_key(variable: &str) -> Result<Credential, CredentialError> {
    CredentialResolver::default().resolve(variable)
}
