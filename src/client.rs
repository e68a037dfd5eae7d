use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info, warn};

use crate::archive::{self, CleanupReport};
use crate::capabilities::Capabilities;
use crate::cmr::{self, CmrEntry, FeedResponse, GranuleSummary};
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::{Error, Result as EResult};
use crate::order::{
    Archive, OrderHandle, OrderStatus, PollPolicy, StatusReport, is_plain_order_id,
    parse_order_response, parse_status_response,
};
use crate::request::{Request, RequestMode};
use crate::sources::{Endpoints, source_to_endpoints};
use crate::url_builder::{
    archive_url, capability_url, collections_url, filename_from_disposition, granules_url,
    order_url, page_count, status_url,
};

/// CMR search keys forwarded from an order request when counting granules,
/// each with the subsetting key that stands in for it when absent.
const CMR_KEYS: [(&str, Option<&str>); 4] = [
    ("short_name", None),
    ("version", None),
    ("temporal", Some("time")),
    ("bounding_box", Some("bbox")),
];

/// Longest response body kept in a [`Error::RequestRejected`].
const MAX_ERROR_BODY: usize = 2000;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// `"nsidc"` or an `http(s)` root serving `/search`, `/egi` and `/esir`.
    pub source: String,
    pub verify_tls: bool,
    pub user_agent: String,
    /// Entries per CMR search page.
    pub cmr_page_size: u32,
    /// Granules per order page when the request has no `page_size`.
    pub order_page_size: u32,
    pub poll: PollPolicy,
    /// Per-request timeout. Archives can be large, so there is none by default.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            source: "nsidc".to_string(),
            verify_tls: true,
            user_agent: "nsidc-access-rs/0.1".to_string(),
            cmr_page_size: 100,
            order_page_size: 10,
            poll: PollPolicy::default(),
            request_timeout: None,
        }
    }
}

impl ClientOptions {
    /// Defaults overlaid with `NSIDC_*` environment variables.
    ///
    /// `NSIDC_SOURCE`, `NSIDC_VERIFY_TLS`, `NSIDC_POLL_MAX_ATTEMPTS` (0 = unlimited),
    /// `NSIDC_POLL_DEADLINE_SECS` (0 = none), `NSIDC_POLL_INITIAL_DELAY_SECS`.
    pub fn from_env() -> EResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> EResult<Self> {
        fn num<T: std::str::FromStr>(key: &str, v: &str) -> EResult<T> {
            v.trim()
                .parse()
                .map_err(|_| Error::InvalidRequest(format!("invalid {key}: {v}")))
        }

        let mut opts = Self::default();
        if let Some(v) = get("NSIDC_SOURCE") {
            opts.source = v;
        }
        if let Some(v) = get("NSIDC_VERIFY_TLS") {
            opts.verify_tls = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(Error::InvalidRequest(format!("invalid NSIDC_VERIFY_TLS: {v}"))),
            };
        }
        if let Some(v) = get("NSIDC_POLL_MAX_ATTEMPTS") {
            let n: u32 = num("NSIDC_POLL_MAX_ATTEMPTS", &v)?;
            opts.poll.max_attempts = (n > 0).then_some(n);
        }
        if let Some(v) = get("NSIDC_POLL_DEADLINE_SECS") {
            let n: u64 = num("NSIDC_POLL_DEADLINE_SECS", &v)?;
            opts.poll.deadline = (n > 0).then(|| Duration::from_secs(n));
        }
        if let Some(v) = get("NSIDC_POLL_INITIAL_DELAY_SECS") {
            let n: u64 = num("NSIDC_POLL_INITIAL_DELAY_SECS", &v)?;
            opts.poll.initial_delay = Duration::from_secs(n);
        }
        opts.poll.validate()?;
        Ok(opts)
    }
}

/// What [`Client::retrieve`] did.
#[derive(Debug, Clone, Default)]
pub struct RetrieveSummary {
    pub granules: GranuleSummary,
    pub pages: u32,
    /// Final status of each asynchronous order, in page order.
    pub orders: Vec<StatusReport>,
    pub archives: Vec<Archive>,
    pub extracted_files: usize,
    pub cleanup: CleanupReport,
}

/// NSIDC data access client.
///
/// Holds the HTTP session (cookies included) and, after [`Client::authenticate`],
/// the Earthdata credentials used for every order related request.
#[derive(Debug, Clone)]
pub struct Client {
    opts: ClientOptions,
    endpoints: Endpoints,
    http: HttpClient,
    auth: Option<Credentials>,
}

impl Client {
    pub fn new(opts: ClientOptions) -> EResult<Self> {
        let endpoints = source_to_endpoints(&opts.source)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown source: {}", opts.source)))?;
        opts.poll.validate()?;
        if opts.cmr_page_size == 0 || opts.order_page_size == 0 {
            return Err(Error::InvalidRequest("page sizes must be > 0".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&opts.user_agent)
                .map_err(|_| Error::InvalidRequest(format!("invalid user agent: {}", opts.user_agent)))?,
        );

        let mut builder = HttpClient::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(opts.request_timeout);
        if !opts.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        Ok(Self {
            opts,
            endpoints,
            http,
            auth: None,
        })
    }

    pub fn default_client() -> EResult<Self> {
        Self::new(ClientOptions::default())
    }

    pub fn options(&self) -> &ClientOptions {
        &self.opts
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Check credentials against a dataset's capability document.
    ///
    /// Anything but HTTP 200 is an [`Error::AuthenticationFailure`]. Any failure,
    /// including transport and parse errors, leaves the client unauthenticated. On success the credentials are kept for later calls and
    /// the parsed capabilities are returned.
    pub fn authenticate(
        &mut self,
        provider: &dyn CredentialProvider,
        short_name: &str,
        version: &str,
    ) -> EResult<Capabilities> {
        self.auth = None;
        let creds = provider.credentials()?;
        let url = capability_url(&self.endpoints, short_name, version);
        info!(%url, user = %creds.username, "checking Earthdata credentials");

        let resp = self
            .http
            .get(&url)
            .basic_auth(&creds.username, Some(creds.password()))
            .send()?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(Error::AuthenticationFailure(format!("HTTP {status} from {url}")));
        }

        let caps = Capabilities::parse(&resp.text()?)?;
        self.auth = Some(creds);
        info!(
            variables = caps.variables.len(),
            formats = caps.formats.len(),
            "credentials accepted"
        );
        Ok(caps)
    }

    /// Capability document of a dataset, using the stored credentials.
    pub fn capabilities(&self, short_name: &str, version: &str) -> EResult<Capabilities> {
        let url = capability_url(&self.endpoints, short_name, version);
        let body = self.authed(self.http.get(&url))?.send()?.error_for_status()?.text()?;
        Capabilities::parse(&body)
    }

    fn authed(&self, rb: RequestBuilder) -> EResult<RequestBuilder> {
        let creds = self.auth.as_ref().ok_or_else(|| {
            Error::AuthenticationFailure("not authenticated, call authenticate() first".into())
        })?;
        Ok(rb.basic_auth(&creds.username, Some(creds.password())))
    }

    pub fn search_collections(&self, short_name: &str) -> EResult<Vec<CmrEntry>> {
        let feed: FeedResponse = self
            .http
            .get(collections_url(&self.endpoints))
            .query(&[("short_name", short_name)])
            .header(ACCEPT, "application/json")
            .send()?
            .error_for_status()?
            .json()?;
        debug!(short_name, entries = feed.feed.entry.len(), "collections found");
        Ok(feed.feed.entry)
    }

    /// Highest collection version published under `short_name`.
    pub fn latest_version(&self, short_name: &str) -> EResult<String> {
        let entries = self.search_collections(short_name)?;
        cmr::latest_version(&entries)
            .ok_or_else(|| Error::InvalidRequest(format!("no collection named {short_name}")))
    }

    /// All granules matching the request's name, version, time and area.
    ///
    /// CMR pages are requested until one comes back empty.
    pub fn search_granules(&self, request: &Request) -> EResult<GranuleSummary> {
        if request.get_str("short_name").is_none() {
            return Err(Error::InvalidRequest("short_name is required".into()));
        }
        let mut params: Vec<(String, String)> = CMR_KEYS
            .iter()
            .filter_map(|(key, fallback)| {
                request
                    .get_str(key)
                    .or_else(|| fallback.and_then(|f| request.get_str(f)))
                    .map(|v| (key.to_string(), v))
            })
            .collect();
        params.push(("page_size".to_string(), self.opts.cmr_page_size.to_string()));

        let url = granules_url(&self.endpoints);
        let mut entries = Vec::new();
        let mut page: u32 = 1;
        loop {
            let feed: FeedResponse = self
                .http
                .get(&url)
                .query(&params)
                .query(&[("page_num", page.to_string())])
                .header(ACCEPT, "application/json")
                .send()?
                .error_for_status()?
                .json()?;
            if feed.feed.entry.is_empty() {
                break;
            }
            debug!(page, entries = feed.feed.entry.len(), "granule page");
            entries.extend(feed.feed.entry);
            page += 1;
        }

        let summary = GranuleSummary { entries };
        info!(
            granules = summary.count(),
            total_mb = format!("{:.2}", summary.total_size_mb()),
            "granule search finished"
        );
        Ok(summary)
    }

    /// Submit page 1 of an asynchronous order.
    pub fn submit(&self, request: &Request) -> EResult<OrderHandle> {
        self.submit_page(request, 1)
    }

    /// Submit one page of an asynchronous order.
    pub fn submit_page(&self, request: &Request, page_num: u32) -> EResult<OrderHandle> {
        request.validate()?;
        let mut req = request.clone();
        req.set("request_mode", RequestMode::Async);
        let url = order_url(&self.endpoints, &req, page_num)?;

        let rb = self.authed(self.http.get(url))?;
        info!(page = page_num, "submitting order");
        let resp = rb.send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(Error::RequestRejected {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }
        if status != StatusCode::CREATED {
            debug!(%status, "order accepted with an unusual status");
        }

        let (order_id, initial) = parse_order_response(&body).map_err(|e| match e {
            Error::RequestRejected { body, .. } => Error::RequestRejected {
                status: status.as_u16(),
                body,
            },
            other => other,
        })?;
        let handle = OrderHandle {
            status_url: status_url(&self.endpoints, &order_id),
            status: initial.unwrap_or(OrderStatus::Pending),
            order_id,
        };
        info!(order_id = %handle.order_id, status = %handle.status, "order submitted");
        Ok(handle)
    }

    /// One status check.
    pub fn poll(&self, handle: &OrderHandle) -> EResult<StatusReport> {
        let body = self
            .authed(self.http.get(&handle.status_url))?
            .send()?
            .error_for_status()?
            .text()?;
        let report = parse_status_response(&handle.order_id, &body)?;
        debug!(order_id = %report.order_id, status = %report.status, "order status");
        Ok(report)
    }

    /// Poll until the order is terminal, using the client's [`PollPolicy`].
    pub fn wait(&self, handle: &OrderHandle) -> EResult<StatusReport> {
        self.wait_with(handle, &self.opts.poll)
    }

    /// Poll until the order is terminal or `policy` runs out.
    ///
    /// Only a non-terminal status leads to another attempt; transport and HTTP
    /// errors are returned straight away.
    pub fn wait_with(&self, handle: &OrderHandle, policy: &PollPolicy) -> EResult<StatusReport> {
        policy.validate()?;
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut last = handle.status.clone();

        loop {
            let report = self.poll(handle)?;
            attempts += 1;

            if report.status != last {
                info!(order_id = %handle.order_id, from = %last, to = %report.status, "order status changed");
                last = report.status.clone();
            }
            if report.status.is_terminal() {
                return Ok(report);
            }

            let timeout = || Error::PollTimeout {
                order_id: handle.order_id.clone(),
                attempts,
            };
            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(timeout());
            }
            let delay = policy.delay_for(attempts - 1);
            if policy.deadline.is_some_and(|deadline| {
                started
                    .elapsed()
                    .checked_add(delay)
                    .is_none_or(|next| next > deadline)
            }) {
                return Err(timeout());
            }

            debug!(order_id = %handle.order_id, ?delay, "order not finished yet");
            std::thread::sleep(delay);
        }
    }

    /// Download the archive of a finished order into `dir` as `<order_id>.zip`,
    /// replacing any file of that name.
    ///
    /// Only `complete` and `complete_with_errors` orders have an archive; a
    /// failed order yields [`Error::OrderFailed`] and nothing is written.
    pub fn fetch(&self, report: &StatusReport, dir: &Path) -> EResult<Archive> {
        match &report.status {
            OrderStatus::Complete => {}
            OrderStatus::CompleteWithErrors => {
                warn!(order_id = %report.order_id, messages = ?report.messages, "order completed with errors");
            }
            OrderStatus::Failed => {
                return Err(Error::OrderFailed {
                    order_id: report.order_id.clone(),
                    messages: report.messages.clone(),
                });
            }
            other => {
                return Err(Error::InvalidRequest(format!(
                    "order {} is still {other}",
                    report.order_id
                )));
            }
        }

        if !is_plain_order_id(&report.order_id) {
            return Err(Error::InvalidRequest(format!(
                "order id {:?} is not usable as a file name",
                report.order_id
            )));
        }

        let url = report
            .download_urls
            .first()
            .cloned()
            .unwrap_or_else(|| archive_url(&self.endpoints, &report.order_id));
        let target = dir.join(format!("{}.zip", report.order_id));

        info!(%url, target = %target.display(), "downloading order archive");
        let resp = self.authed(self.http.get(&url))?.send()?;
        let size_bytes = write_body(resp, &url, &target)?;

        Ok(Archive {
            order_id: Some(report.order_id.clone()),
            url,
            path: target,
            size_bytes,
        })
    }

    /// Check the order once and fetch its archive.
    pub fn fetch_order(&self, handle: &OrderHandle, dir: &Path) -> EResult<Archive> {
        let report = self.poll(handle)?;
        self.fetch(&report, dir)
    }

    /// Synchronous ("stream") request: the zip comes back in the response body.
    pub fn download_stream(&self, request: &Request, page_num: u32, dir: &Path) -> EResult<Archive> {
        request.validate()?;
        let mut req = request.clone();
        req.set("request_mode", RequestMode::Stream);
        let url = order_url(&self.endpoints, &req, page_num)?.to_string();

        info!(page = page_num, "requesting streamed order");
        let resp = self.authed(self.http.get(&url))?.send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::RequestRejected {
                status: status.as_u16(),
                body: snippet(&resp.text().unwrap_or_default()),
            });
        }

        let name = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| {
                let short_name = req.get_str("short_name").unwrap_or_default();
                format!("{short_name}_{page_num}.zip")
            });
        let target = dir.join(name);
        let size_bytes = write_body(resp, &url, &target)?;

        Ok(Archive {
            order_id: None,
            url,
            path: target,
            size_bytes,
        })
    }

    /// Whole workflow: count granules, order every page, download, extract,
    /// then flatten `dir`.
    pub fn retrieve(&self, request: &Request, dir: &Path) -> EResult<RetrieveSummary> {
        request.validate()?;
        if self.auth.is_none() {
            return Err(Error::AuthenticationFailure(
                "not authenticated, call authenticate() first".into(),
            ));
        }
        let mode = request.mode()?;
        let page_size = request.page_size_or(self.opts.order_page_size)?;

        let granules = self.search_granules(request)?;
        if granules.count() == 0 {
            warn!("no granules match the request, nothing to order");
            return Ok(RetrieveSummary {
                granules,
                ..RetrieveSummary::default()
            });
        }
        let pages = page_count(granules.count(), page_size)?;

        let mut req = request.clone();
        req.set("page_size", page_size);
        fs::create_dir_all(dir)?;
        info!(
            granules = granules.count(),
            pages,
            mode = mode.as_str(),
            dir = %dir.display(),
            "retrieving order"
        );

        let mut summary = RetrieveSummary {
            granules,
            pages,
            ..RetrieveSummary::default()
        };
        for page in 1..=pages {
            let archive = match mode {
                RequestMode::Async => {
                    let handle = self.submit_page(&req, page)?;
                    let report = self.wait(&handle)?;
                    let archive = self.fetch(&report, dir)?;
                    summary.orders.push(report);
                    archive
                }
                RequestMode::Stream => self.download_stream(&req, page, dir)?,
            };
            summary.extracted_files += archive::extract(&archive.path, dir)?.len();
            fs::remove_file(&archive.path)?;
            info!(page, pages, "page complete");
            summary.archives.push(archive);
        }

        summary.cleanup = archive::cleanup(dir)?;
        Ok(summary)
    }
}

/// Stream a successful response to `target`, replacing any existing file.
///
/// The body goes to a `.part` file first so a failed or empty download never
/// leaves a truncated archive behind.
fn write_body(mut resp: Response, url: &str, target: &Path) -> EResult<u64> {
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::DownloadFailure {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        });
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let part = part_path(target);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&part)?;
    let written = match resp.copy_to(&mut file) {
        Ok(n) => n,
        Err(e) => {
            drop(file);
            let _ = fs::remove_file(&part);
            return Err(Error::DownloadFailure {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }
    };
    drop(file);

    if written == 0 {
        fs::remove_file(&part)?;
        return Err(Error::DownloadFailure {
            url: url.to_string(),
            reason: "empty response body".into(),
        });
    }
    if target.exists() {
        fs::remove_file(target)?;
    }
    fs::rename(&part, target)?;
    debug!(bytes = written, target = %target.display(), "download written");
    Ok(written)
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY {
        trimmed.to_string()
    } else {
        let mut s: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        s.push_str("...");
        s
    }
}
