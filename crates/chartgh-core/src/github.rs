//! Thin blocking client for the parts of the GitHub REST API the plugin uses.

use std::io::Read;

use anyhow::{bail, Context};
use chartgh_domain::RepositoryRef;
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::deadline::Deadline;
use crate::effects::{AssetSource, CatalogSource, ReleaseAsset};
use crate::error::ChartError;

const USER_AGENT: &str = concat!("helm-github/", env!("CARGO_PKG_VERSION"));
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Deserialize)]
struct ReleaseResponse {
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

pub struct GithubClient {
    http: Client,
    api_base: Url,
    token: String,
}

impl GithubClient {
    /// # Errors
    /// Returns an error when `api_url` is not a usable base URL or the HTTP
    /// client cannot be built.
    pub fn new(api_url: &str, token: &str) -> anyhow::Result<Self> {
        let api_base =
            Url::parse(api_url).with_context(|| format!("invalid GitHub API URL '{api_url}'"))?;
        if api_base.cannot_be_a_base() {
            bail!("GitHub API URL '{api_url}' cannot be used as a base");
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_base,
            token: token.to_string(),
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get(
        &self,
        url: Url,
        accept: &str,
        what: &str,
        deadline: Deadline,
    ) -> Result<Response, ChartError> {
        let timeout = deadline.check(&format!("requesting {what}"))?;
        debug!(%url, accept, "GitHub request");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header(ACCEPT, accept)
            .header(API_VERSION_HEADER, API_VERSION)
            .timeout(timeout)
            .send()
            .map_err(|err| transport_error(&err, what, deadline))?;
        check_status(response, what)
    }
}

impl CatalogSource for GithubClient {
    fn fetch_document(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: &str,
        deadline: Deadline,
    ) -> Result<Vec<u8>, ChartError> {
        let mut url = self.endpoint(
            ["repos", repo.owner.as_str(), repo.name.as_str(), "contents"]
                .into_iter()
                .chain(path.split('/')),
        );
        url.query_pairs_mut().append_pair("ref", git_ref);
        let what = format!("{path} in {repo}@{git_ref}");
        let response = self.get(url, RAW_MEDIA_TYPE, &what, deadline)?;
        let bytes = response
            .bytes()
            .map_err(|err| transport_error(&err, &what, deadline))?;
        Ok(bytes.to_vec())
    }
}

impl AssetSource for GithubClient {
    fn release_assets(
        &self,
        repo: &RepositoryRef,
        tag: &str,
        deadline: Deadline,
    ) -> Result<Vec<ReleaseAsset>, ChartError> {
        let url = self.endpoint([
            "repos",
            repo.owner.as_str(),
            repo.name.as_str(),
            "releases",
            "tags",
            tag,
        ]);
        let what = format!("release {tag} of {repo}");
        let response = self.get(url, JSON_MEDIA_TYPE, &what, deadline)?;
        let release: ReleaseResponse = response
            .json()
            .map_err(|err| transport_error(&err, &what, deadline))?;
        Ok(release.assets)
    }

    fn open_asset(
        &self,
        repo: &RepositoryRef,
        asset: &ReleaseAsset,
        deadline: Deadline,
    ) -> Result<Box<dyn Read + Send>, ChartError> {
        let id = asset.id.to_string();
        let url = self.endpoint([
            "repos",
            repo.owner.as_str(),
            repo.name.as_str(),
            "releases",
            "assets",
            id.as_str(),
        ]);
        let what = format!("asset {} of {repo}", asset.name);
        let response = self.get(url, OCTET_STREAM, &what, deadline)?;
        Ok(Box::new(response))
    }
}

fn transport_error(err: &reqwest::Error, what: &str, deadline: Deadline) -> ChartError {
    if err.is_timeout() || deadline.is_expired() {
        return ChartError::DeadlineExceeded {
            context: format!("requesting {what}"),
        };
    }
    ChartError::Remote {
        what: what.to_string(),
        detail: err.to_string(),
    }
}

fn check_status(response: Response, what: &str) -> Result<Response, ChartError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::NOT_FOUND => Err(ChartError::not_found(what)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ChartError::Auth {
            what: what.to_string(),
            status: status.as_u16(),
        }),
        _ => Err(ChartError::Remote {
            what: what.to_string(),
            detail: format!("unexpected status {status}"),
        }),
    }
}
