use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Earthdata Login host, used to pick the right `.netrc` entry.
pub const EARTHDATA_HOST: &str = "urs.earthdata.nasa.gov";

/// Username/password pair for HTTP basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() {
            return Err(Error::Credentials("empty username".into()));
        }
        if password.is_empty() {
            return Err(Error::Credentials("empty password".into()));
        }
        Ok(Self { username, password })
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Source of credentials, injected into [`crate::Client::authenticate`].
pub trait CredentialProvider {
    fn credentials(&self) -> Result<Credentials>;
}

/// A fixed pair, mostly for tests and embedding.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialProvider for StaticCredentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.0.clone())
    }
}

/// Reads `EARTHDATA_USERNAME` / `EARTHDATA_PASSWORD` (names configurable).
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    pub username_var: String,
    pub password_var: String,
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self {
            username_var: "EARTHDATA_USERNAME".to_string(),
            password_var: "EARTHDATA_PASSWORD".to_string(),
        }
    }
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&self) -> Result<Credentials> {
        let get = |var: &str| {
            std::env::var(var).map_err(|_| Error::Credentials(format!("{var} is not set")))
        };
        Credentials::new(get(&self.username_var)?, get(&self.password_var)?)
    }
}

/// Reads a `.netrc` file entry for `machine`.
#[derive(Debug, Clone)]
pub struct NetrcCredentials {
    pub path: PathBuf,
    pub machine: String,
}

impl NetrcCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            machine: EARTHDATA_HOST.to_string(),
        }
    }

    /// `~/.netrc` for the Earthdata Login host.
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Credentials("cannot determine home directory".into()))?;
        Ok(Self::new(home.join(".netrc")))
    }

    fn read(&self, path: &Path) -> Result<Credentials> {
        let body = std::fs::read_to_string(path).map_err(|e| {
            Error::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        parse_netrc(&body, &self.machine).ok_or_else(|| {
            Error::Credentials(format!("no entry for {} in {}", self.machine, path.display()))
        })?
    }
}

impl CredentialProvider for NetrcCredentials {
    fn credentials(&self) -> Result<Credentials> {
        self.read(&self.path)
    }
}

/// Token based `.netrc` lookup: `machine <host> login <user> password <pw>`.
fn parse_netrc(body: &str, machine: &str) -> Option<Result<Credentials>> {
    let tokens: Vec<&str> = body.split_whitespace().collect();
    let mut i = 0;
    while i < tokens.len() {
        let is_match = (tokens[i] == "machine" && tokens.get(i + 1) == Some(&machine))
            || tokens[i] == "default";
        if !is_match {
            i += 1;
            continue;
        }
        i += if tokens[i] == "default" { 1 } else { 2 };

        let mut login = None;
        let mut password = None;
        while i < tokens.len() && tokens[i] != "machine" && tokens[i] != "default" {
            match tokens[i] {
                "login" => login = tokens.get(i + 1).copied(),
                "password" => password = tokens.get(i + 1).copied(),
                _ => {
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }
        return Some(match (login, password) {
            (Some(l), Some(p)) => Credentials::new(l, p),
            _ => Err(Error::Credentials(format!("incomplete entry for {machine}"))),
        });
    }
    None
}

/// Asks on the terminal; the password is read without echo.
#[derive(Debug, Clone, Default)]
pub struct PromptCredentials;

impl CredentialProvider for PromptCredentials {
    fn credentials(&self) -> Result<Credentials> {
        let mut stdout = io::stdout();
        write!(stdout, "Earthdata Login username: ")?;
        stdout.flush()?;
        let mut username = String::new();
        io::stdin().lock().read_line(&mut username)?;
        let password = rpassword::prompt_password("Earthdata Login password: ")?;
        Credentials::new(username.trim(), password)
    }
}

/// Tries each provider in turn and returns the first success.
#[derive(Default)]
pub struct ChainCredentials {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl CredentialProvider for ChainCredentials {
    fn credentials(&self) -> Result<Credentials> {
        let mut reasons = Vec::new();
        for p in &self.providers {
            match p.credentials() {
                Ok(c) => return Ok(c),
                Err(e) => {
                    tracing::debug!(error = %e, "credential provider skipped");
                    reasons.push(e.to_string());
                }
            }
        }
        Err(Error::Credentials(if reasons.is_empty() {
            "no credential providers configured".to_string()
        } else {
            reasons.join("; ")
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_password() {
        let c = Credentials::new("alice", "s3cret").unwrap();
        let shown = format!("{c:?}");
        assert!(shown.contains("alice"));
        assert!(!shown.contains("s3cret"));
    }

    #[test]
    fn empty_fields_are_rejected() {
        assert!(Credentials::new("", "pw").is_err());
        assert!(Credentials::new("alice", "").is_err());
    }

    #[test]
    fn netrc_picks_matching_machine() {
        let body = "machine example.com login bob password hunter2\n\
                    machine urs.earthdata.nasa.gov\n  login alice\n  password s3cret\n";
        let c = parse_netrc(body, EARTHDATA_HOST).unwrap().unwrap();
        assert_eq!(c.username, "alice");
        assert_eq!(c.password(), "s3cret");
        assert!(parse_netrc("machine other login a password b", EARTHDATA_HOST).is_none());
    }

    #[test]
    fn netrc_default_entry_and_incomplete_entry() {
        let c = parse_netrc("default login carol password pw", EARTHDATA_HOST)
            .unwrap()
            .unwrap();
        assert_eq!(c.username, "carol");
        assert!(parse_netrc("machine urs.earthdata.nasa.gov login alice", EARTHDATA_HOST)
            .unwrap()
            .is_err());
    }

    #[test]
    fn netrc_file_provider_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".netrc");
        std::fs::write(&path, "machine urs.earthdata.nasa.gov login alice password s3cret").unwrap();
        let c = NetrcCredentials::new(&path).credentials().unwrap();
        assert_eq!(c.username, "alice");
        assert!(NetrcCredentials::new(dir.path().join("missing")).credentials().is_err());
    }

    #[test]
    fn chain_returns_first_success() {
        let missing = EnvCredentials {
            username_var: "NSIDC_ACCESS_TEST_NO_SUCH_USER".into(),
            password_var: "NSIDC_ACCESS_TEST_NO_SUCH_PASS".into(),
        };
        let chain = ChainCredentials::new()
            .with(missing)
            .with(StaticCredentials(Credentials::new("alice", "pw").unwrap()));
        assert_eq!(chain.credentials().unwrap().username, "alice");
        assert!(ChainCredentials::new().credentials().is_err());
    }
}
