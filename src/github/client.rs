use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use octocrab::models::repos::Object;
use octocrab::params::repos::Reference;
use octocrab::Octocrab;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::errors::status_code;
use super::{DeleteOutcome, ScmClient, ScmError};
use crate::config::{ConfigError, GitHubConfig, RateLimitConfig};

/// GitHub REST client for the contents and git-refs APIs.
///
/// Every request waits on a shared rate limiter before going out.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    owner: String,
    repo: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    verify_existing_branch: bool,
}

impl GitHubClient {
    pub fn new(
        token: String,
        owner: String,
        repo: String,
        rate_limit: &RateLimitConfig,
    ) -> Result<Self, ScmError> {
        let octocrab = Octocrab::builder().personal_token(token).build()?;
        Ok(Self::with_octocrab(octocrab, owner, repo, rate_limit))
    }

    /// Point the client at a different API root (GitHub Enterprise, test servers).
    pub fn with_base_uri(
        base_uri: &str,
        token: String,
        owner: String,
        repo: String,
        rate_limit: &RateLimitConfig,
    ) -> Result<Self, ScmError> {
        let octocrab = Octocrab::builder()
            .base_uri(base_uri)?
            .personal_token(token)
            .build()?;
        Ok(Self::with_octocrab(octocrab, owner, repo, rate_limit))
    }

    pub fn from_config(config: &GitHubConfig) -> Result<Self, ConfigError> {
        let token = config.require_token()?;
        let owner = config.require_owner()?;
        let repo = config.require_repo()?;

        let client = match &config.api_base_url {
            Some(base) => Self::with_base_uri(base, token, owner, repo, &config.rate_limit),
            None => Self::new(token, owner, repo, &config.rate_limit),
        }
        .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(client.verify_existing_branch(config.verify_existing_branch))
    }

    fn with_octocrab(
        octocrab: Octocrab,
        owner: String,
        repo: String,
        rate_limit: &RateLimitConfig,
    ) -> Self {
        let per_second =
            NonZeroU32::new(rate_limit.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(rate_limit.burst_capacity).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(burst);

        Self {
            octocrab,
            owner,
            repo,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            verify_existing_branch: false,
        }
    }

    /// When a branch already exists, check it points at the base head
    /// instead of accepting it as is.
    pub fn verify_existing_branch(mut self, verify: bool) -> Self {
        self.verify_existing_branch = verify;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    async fn throttle(&self) {
        self.rate_limiter.until_ready().await;
    }
}

#[async_trait]
impl ScmClient for GitHubClient {
    async fn get_branch_head_sha(&self, branch: &str) -> Result<String, ScmError> {
        self.throttle().await;
        debug!(branch, "GitHub: get ref");

        let reference = self
            .octocrab
            .repos(&self.owner, &self.repo)
            .get_ref(&Reference::Branch(branch.to_string()))
            .await
            .map_err(|e| match status_code(&e) {
                Some(404) => ScmError::NotFound {
                    resource: format!("branch {branch}"),
                },
                _ => ScmError::Api(e),
            })?;

        match reference.object {
            Object::Commit { sha, .. } | Object::Tag { sha, .. } => Ok(sha),
            other => Err(ScmError::InvalidResponse(format!(
                "unexpected ref object for {branch}: {other:?}"
            ))),
        }
    }

    async fn create_branch(&self, new_branch: &str, from_branch: &str) -> Result<(), ScmError> {
        let base_sha = self.get_branch_head_sha(from_branch).await?;
        self.throttle().await;
        info!(branch = new_branch, from = from_branch, "GitHub: create branch");

        match self
            .octocrab
            .repos(&self.owner, &self.repo)
            .create_ref(&Reference::Branch(new_branch.to_string()), base_sha.clone())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if status_code(&e) == Some(422) => {
                warn!(branch = new_branch, "GitHub: branch already exists");
                if !self.verify_existing_branch {
                    return Ok(());
                }
                let actual = self.get_branch_head_sha(new_branch).await?;
                if actual == base_sha {
                    Ok(())
                } else {
                    Err(ScmError::BranchDiverged {
                        branch: new_branch.to_string(),
                        expected: base_sha,
                        actual,
                    })
                }
            }
            Err(e) => Err(ScmError::Api(e)),
        }
    }

    async fn probe_file_sha(&self, branch: &str, path: &str) -> Result<Option<String>, ScmError> {
        self.throttle().await;

        match self
            .octocrab
            .repos(&self.owner, &self.repo)
            .get_content()
            .path(path)
            .r#ref(branch)
            .send()
            .await
        {
            Ok(items) => Ok(items.items.into_iter().next().map(|content| content.sha)),
            Err(e) if status_code(&e) == Some(404) => Ok(None),
            Err(e) => Err(ScmError::Api(e)),
        }
    }

    async fn create_file(
        &self,
        branch: &str,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<(), ScmError> {
        self.throttle().await;
        self.octocrab
            .repos(&self.owner, &self.repo)
            .create_file(path, message, content)
            .branch(branch)
            .send()
            .await?;
        info!(path, branch, "GitHub: file created");
        Ok(())
    }

    async fn update_file(
        &self,
        branch: &str,
        path: &str,
        content: &[u8],
        message: &str,
        sha: &str,
    ) -> Result<(), ScmError> {
        self.throttle().await;
        self.octocrab
            .repos(&self.owner, &self.repo)
            .update_file(path, message, content, sha)
            .branch(branch)
            .send()
            .await?;
        info!(path, branch, "GitHub: file updated");
        Ok(())
    }

    async fn get_file(&self, branch: &str, path: &str) -> Result<Vec<u8>, ScmError> {
        self.throttle().await;
        info!(path, branch, "GitHub: download file");

        let items = self
            .octocrab
            .repos(&self.owner, &self.repo)
            .get_content()
            .path(path)
            .r#ref(branch)
            .send()
            .await
            .map_err(|e| match status_code(&e) {
                Some(404) => ScmError::NotFound {
                    resource: format!("{path} on {branch}"),
                },
                _ => ScmError::Api(e),
            })?;

        let file = items.items.into_iter().next().ok_or_else(|| ScmError::NotFound {
            resource: format!("{path} on {branch}"),
        })?;
        file.decoded_content()
            .map(String::into_bytes)
            .ok_or_else(|| ScmError::InvalidResponse(format!("{path} has no decodable content")))
    }

    async fn delete_file(
        &self,
        branch: &str,
        path: &str,
        message: &str,
    ) -> Result<DeleteOutcome, ScmError> {
        let Some(sha) = self.probe_file_sha(branch, path).await? else {
            info!(path, branch, "GitHub: file not found, skip delete");
            return Ok(DeleteOutcome::AlreadyAbsent);
        };

        self.throttle().await;
        match self
            .octocrab
            .repos(&self.owner, &self.repo)
            .delete_file(path, message, sha)
            .branch(branch)
            .send()
            .await
        {
            Ok(_) => {
                info!(path, branch, "GitHub: deleted file");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if status_code(&e) == Some(404) => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(ScmError::Api(e)),
        }
    }

    async fn delete_branch(&self, branch: &str) -> Result<DeleteOutcome, ScmError> {
        match self.get_branch_head_sha(branch).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                info!(branch, "GitHub: branch not found, skip delete");
                return Ok(DeleteOutcome::AlreadyAbsent);
            }
            Err(e) => return Err(e),
        }

        self.throttle().await;
        let route = format!(
            "/repos/{}/{}/git/refs/heads/{}",
            self.owner, self.repo, branch
        );
        let response = self.octocrab._delete(route, None::<&()>).await?;

        match octocrab::map_github_error(response).await {
            Ok(_) => {
                info!(branch, "GitHub: deleted branch");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if matches!(status_code(&e), Some(404) | Some(422)) => {
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => Err(ScmError::Api(e)),
        }
    }
}
