use serde::{Deserialize, Serialize};
use validator::ValidateUrl;

const TRAVIS_BASE_URLS: [&str; 2] = ["https://travis-ci.org/", "https://travis-ci.com/"];
const TRAVIS_URL_FORMAT: &str = "https://travis-ci.org/{owner}/{repo_name}";

/// Represents a Travis CI repository page, e.g. `https://travis-ci.org/emberjs/ember.js`.
///
/// This is the human-facing link a user sends to the bot. The machine-fetchable
/// status endpoint is derived from it with [`TravisRepoUrl::status_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TravisRepoUrl {
    url: String,
}

impl TravisRepoUrl {
    /// Creates a new `TravisRepoUrl` instance.
    ///
    /// A single trailing slash is accepted and dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use travisbot::domain::TravisRepoUrl;
    ///
    /// let url = TravisRepoUrl::new("https://travis-ci.org/emberjs/ember.js").unwrap();
    /// assert_eq!(url.slug(), "emberjs/ember.js");
    /// ```
    pub fn new(url: impl Into<String>) -> Result<Self, String> {
        let url: String = url.into();
        let url = url.trim().trim_end_matches('/').to_string();
        let repo = TravisRepoUrl { url };
        repo.validate()?;
        Ok(repo)
    }

    /// Returns the repository link as sent by the user.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `{owner}/{repo_name}`.
    pub fn slug(&self) -> &str {
        TRAVIS_BASE_URLS
            .iter()
            .find_map(|base| self.url.strip_prefix(base))
            .unwrap_or_default()
    }

    /// Builds the JSON status endpoint polled for this repository.
    pub fn status_url(&self, api_base_url: &str) -> String {
        format!("{}/repos/{}", api_base_url.trim_end_matches('/'), self.slug())
    }

    fn validate(&self) -> Result<(), String> {
        if !self.url.validate_url() {
            return Err(format!("{} is not a valid URL", self.url));
        }
        let Some(path) = TRAVIS_BASE_URLS
            .iter()
            .find_map(|base| self.url.strip_prefix(base))
        else {
            return Err(format!("URL must be in format {TRAVIS_URL_FORMAT}"));
        };
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|part| part.is_empty()) {
            return Err(format!("URL must be in format {TRAVIS_URL_FORMAT}"));
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for TravisRepoUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let url = String::deserialize(deserializer)?;
        TravisRepoUrl::new(url).map_err(serde::de::Error::custom)
    }
}
