use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{Error, Result as EResult};
use crate::request::Request;
use crate::sources::{DEFAULT_SOURCE, is_http_url, source_to_base_url};

const PRIVATE_TOKEN: &str = "private-token";

/// Anything that can fetch one dataset request into a local file.
///
/// The enumerator only needs this operation; [`Client`] implements it against
/// the CDS API.
#[cfg_attr(test, mockall::automock)]
pub trait Retriever {
    fn retrieve(&self, dataset: &str, request: &Request, target: &Path) -> EResult<()>;
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Source name (`cds`, `ads`, `ewds`) or an explicit API root URL.
    pub source: String,
    pub key: Option<String>,
    pub verify_tls: bool,
    pub poll_interval: Duration,
    /// Give up waiting for a queued job after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            key: None,
            verify_tls: true,
            poll_interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

impl ClientOptions {
    /// Credentials the way the CDS API tooling finds them: the rc file first,
    /// then `CDSAPI_URL` / `CDSAPI_KEY` on top.
    pub fn from_env() -> EResult<Self> {
        let mut opts = Self::default();

        if let Some(path) = rc_path() {
            if path.is_file() {
                let rc = RcFile::read(&path)?;
                debug!(path = %path.display(), "loaded CDS API rc file");
                rc.apply(&mut opts);
            }
        }

        if let Ok(url) = env::var("CDSAPI_URL") {
            opts.source = url;
        }
        if let Ok(key) = env::var("CDSAPI_KEY") {
            opts.key = Some(key);
        }

        Ok(opts)
    }
}

/// `CDSAPI_RC` if set, else `~/.cdsapirc`.
pub fn rc_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("CDSAPI_RC") {
        return Some(PathBuf::from(p));
    }
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".cdsapirc"))
}

/// Contents of a `.cdsapirc` file (`url: ...`, `key: ...`, `verify: 0|1`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RcFile {
    pub url: Option<String>,
    pub key: Option<String>,
    pub verify: Option<bool>,
}

impl RcFile {
    pub fn read(path: &Path) -> EResult<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn parse(text: &str) -> Self {
        let mut rc = Self::default();
        for line in text.lines() {
            let Some((k, v)) = line.split_once(':') else {
                continue;
            };
            let v = v.trim();
            match k.trim() {
                "url" => rc.url = Some(v.to_string()),
                "key" => rc.key = Some(v.to_string()),
                "verify" => rc.verify = Some(!matches!(v, "0" | "false" | "False")),
                _ => {}
            }
        }
        rc
    }

    fn apply(self, opts: &mut ClientOptions) {
        if let Some(url) = self.url {
            opts.source = url;
        }
        if self.key.is_some() {
            opts.key = self.key;
        }
        if let Some(verify) = self.verify {
            opts.verify_tls = verify;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Accepted,
    Running,
    Successful,
    Failed,
    Dismissed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    #[serde(rename = "jobID")]
    pub job_id: String,
    pub status: JobState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "file:size")]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct JobResults {
    asset: AssetEnvelope,
}

#[derive(Debug, Deserialize)]
struct AssetEnvelope {
    value: Asset,
}

#[derive(Debug, Default, Deserialize)]
struct JobError {
    title: Option<String>,
    detail: Option<String>,
}

/// Blocking client for the CDS retrieve API.
#[derive(Debug, Clone)]
pub struct Client {
    opts: ClientOptions,
    base_url: Url,
    http: HttpClient,
}

impl Client {
    pub fn new(opts: ClientOptions) -> EResult<Self> {
        let base = if is_http_url(&opts.source) {
            opts.source.clone()
        } else {
            source_to_base_url(&opts.source)
                .ok_or_else(|| Error::InvalidRequest(format!("unknown source: {}", opts.source)))?
                .to_string()
        };
        // Trailing slash so that `join` appends instead of replacing the last segment.
        let base_url = Url::parse(&format!("{}/", base.trim_end_matches('/')))?;

        let key = opts.key.as_deref().ok_or_else(|| {
            Error::MissingCredentials(
                rc_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "~/.cdsapirc".to_string()),
            )
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("cdsretrieve-rs/0.1"));
        let mut token = HeaderValue::from_str(key)
            .map_err(|_| Error::InvalidRequest("API key is not a valid header value".into()))?;
        token.set_sensitive(true);
        headers.insert(HeaderName::from_static(PRIVATE_TOKEN), token);

        let mut builder = HttpClient::builder().default_headers(headers);
        if !opts.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        Ok(Self {
            opts,
            base_url,
            http,
        })
    }

    /// Convenience constructor using rc file / environment credentials.
    pub fn from_env() -> EResult<Self> {
        Self::new(ClientOptions::from_env()?)
    }

    fn endpoint(&self, path: &str) -> EResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Queue a request; the returned status carries the job id.
    pub fn submit(&self, dataset: &str, request: &Request) -> EResult<JobStatus> {
        let url = self.endpoint(&format!("retrieve/v1/processes/{dataset}/execution"))?;
        let job: JobStatus = self
            .http
            .post(url)
            .json(&json!({ "inputs": request }))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(job)
    }

    pub fn job_status(&self, job_id: &str) -> EResult<JobStatus> {
        let url = self.endpoint(&format!("retrieve/v1/jobs/{job_id}"))?;
        Ok(self.http.get(url).send()?.error_for_status()?.json()?)
    }

    /// Poll at the configured interval until the job leaves the queue.
    pub fn wait(&self, mut job: JobStatus) -> EResult<JobStatus> {
        let started = Instant::now();
        loop {
            match job.status {
                JobState::Successful => return Ok(job),
                JobState::Failed | JobState::Dismissed => return Err(self.job_failure(&job)),
                JobState::Accepted | JobState::Running | JobState::Unknown => {}
            }

            if let Some(limit) = self.opts.timeout {
                if started.elapsed() >= limit {
                    return Err(Error::JobTimeout(job.job_id));
                }
            }

            debug!(job_id = %job.job_id, state = ?job.status, "job not finished");
            thread::sleep(self.opts.poll_interval);
            job = self.job_status(&job.job_id)?;
        }
    }

    pub fn results(&self, job_id: &str) -> EResult<Asset> {
        let url = self.endpoint(&format!("retrieve/v1/jobs/{job_id}/results"))?;
        let body = self.http.get(url).send()?.error_for_status()?.text()?;
        let results: JobResults = serde_json::from_str(&body)
            .map_err(|e| Error::UnexpectedResponse(format!("job {job_id} results: {e}")))?;
        if results.asset.value.href.trim().is_empty() {
            return Err(Error::UnexpectedResponse(format!(
                "job {job_id} results carry no download link"
            )));
        }
        Ok(results.asset.value)
    }

    /// The results endpoint describes the failure; fall back to the state name
    /// when it cannot be read.
    fn job_failure(&self, job: &JobStatus) -> Error {
        let detail = self
            .endpoint(&format!("retrieve/v1/jobs/{}/results", job.job_id))
            .ok()
            .and_then(|url| self.http.get(url).send().ok())
            .and_then(|resp| resp.json::<JobError>().ok())
            .unwrap_or_default();

        let message = match (detail.title, detail.detail) {
            (Some(title), Some(detail)) => format!("{title}: {detail}"),
            (Some(m), None) | (None, Some(m)) => m,
            (None, None) => format!("{:?}", job.status).to_lowercase(),
        };

        Error::JobFailed {
            job_id: job.job_id.clone(),
            message,
        }
    }

    /// Stream `href` into `<target>.part`, then move it into place.
    fn download(&self, href: &str, target: &Path) -> EResult<u64> {
        let url = self.base_url.join(href)?;

        if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let mut resp = self.http.get(url).send()?.error_for_status()?;
        write_via_part(target, |file| Ok(resp.copy_to(file)?))
    }
}

impl Retriever for Client {
    #[instrument(skip(self, request, target), fields(target = %target.display()))]
    fn retrieve(&self, dataset: &str, request: &Request, target: &Path) -> EResult<()> {
        let job = self.submit(dataset, request)?;
        info!(job_id = %job.job_id, "request queued");

        let job = self.wait(job)?;
        let asset = self.results(&job.job_id)?;
        debug!(href = %asset.href, size = ?asset.size, "result ready");
        let bytes = self.download(&asset.href, target)?;

        info!(job_id = %job.job_id, bytes, "download complete");
        Ok(())
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Run `write` against `<target>.part` and rename it to `target` on success.
/// The part file is removed again if writing or renaming fails.
fn write_via_part<F>(target: &Path, write: F) -> EResult<u64>
where
    F: FnOnce(&mut File) -> EResult<u64>,
{
    let part = part_path(target);
    let finish = |part: &Path| -> EResult<u64> {
        let mut file = File::create(part)?;
        let written = write(&mut file)?;
        file.sync_all()?;
        drop(file);
        fs::rename(part, target)?;
        Ok(written)
    };

    finish(&part).inspect_err(|e| {
        warn!(part = %part.display(), error = %e, "discarding partial download");
        let _ = fs::remove_file(&part);
    })
}
