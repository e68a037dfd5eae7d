#![forbid(unsafe_code)]

//! Rust client for NSIDC DAAC data access.
//!
//! The crate covers the usual workflow for customized Earthdata downloads:
//! search NASA's Common Metadata Repository (CMR) for granules, check which
//! subsetting and reformatting options a dataset offers, submit an order to the
//! access/service API, wait for it to finish, then download and unpack the
//! resulting zip archives.
//!
//! **Quick start**
//! ```no_run
//! use nsidc_access::{ChainCredentials, Client, ClientOptions, EnvCredentials, PromptCredentials, Request};
//!
//! let mut client = Client::new(ClientOptions::default())?;
//!
//! let request = Request::new()
//!     .short_name("ATL07")
//!     .version("002")
//!     .bounding_box("140,72,153,80")
//!     .temporal("2019-03-23T00:00:00Z,2019-03-23T23:59:59Z");
//!
//! let granules = client.search_granules(&request)?;
//! println!("{} granules, {:.2} MB", granules.count(), granules.total_size_mb());
//!
//! let creds = ChainCredentials::new().with(EnvCredentials::default()).with(PromptCredentials);
//! let caps = client.authenticate(&creds, "ATL07", "002")?;
//! println!("{} variables can be subset", caps.variables.len());
//!
//! let summary = client.retrieve(&request.bbox("140,72,153,80"), std::path::Path::new("Outputs"))?;
//! println!("{} files extracted", summary.extracted_files);
//! # Ok::<(), nsidc_access::Error>(())
//! ```
//!
//! **Step by step**
//! ```no_run
//! use std::path::Path;
//! use nsidc_access::{Client, Credentials, Request, StaticCredentials, cleanup, extract};
//!
//! let mut client = Client::default_client()?;
//! client.authenticate(&StaticCredentials(Credentials::new("user", "pass")?), "ATL07", "002")?;
//!
//! let request = Request::new()
//!     .short_name("ATL07")
//!     .version("002")
//!     .time("2019-03-23T00:00:00,2019-03-23T23:59:59");
//! let handle = client.submit(&request)?;
//! let report = client.wait(&handle)?;
//! let archive = client.fetch(&report, Path::new("Outputs"))?;
//! extract(&archive.path, Path::new("Outputs"))?;
//! cleanup(Path::new("Outputs"))?;
//! # Ok::<(), nsidc_access::Error>(())
//! ```
//!
//! Notes:
//! - Orders need an Earthdata Login account; CMR searches do not.
//! - Polling is bounded by [`PollPolicy`]; use [`PollPolicy::fixed`] with
//!   limits removed to poll until the service gives an answer.

mod archive;
mod capabilities;
mod client;
mod cmr;
mod credentials;
mod date;
mod error;
mod order;
mod request;
mod sources;
mod url_builder;
mod xml;

pub use crate::archive::{CleanupReport, cleanup, extract, extract_all};
pub use crate::capabilities::{Capabilities, NO_REFORMATTING, normalize_variable};
pub use crate::client::{Client, ClientOptions, RetrieveSummary};
pub use crate::cmr::{CmrEntry, DEFAULT_FIELDS, GranuleSummary, latest_version};
pub use crate::credentials::{
    ChainCredentials, CredentialProvider, Credentials, EARTHDATA_HOST, EnvCredentials,
    NetrcCredentials, PromptCredentials, StaticCredentials,
};
pub use crate::date::{parse_date_like, parse_range, subset_time_range, temporal_range, whole_day};
pub use crate::error::{Error, Result};
pub use crate::order::{Archive, MAX_POLL_DELAY, OrderHandle, OrderStatus, PollPolicy, StatusReport};
pub use crate::request::{BoundingBox, Request, RequestMode, RequestValue};
pub use crate::sources::{Endpoints, source_to_endpoints};
pub use crate::url_builder::{order_endpoints, page_count};
