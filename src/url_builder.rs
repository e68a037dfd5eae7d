use url::Url;

use crate::error::{Error, Result};
use crate::request::Request;
use crate::sources::Endpoints;

pub fn capability_url(endpoints: &Endpoints, short_name: &str, version: &str) -> String {
    format!("{}/capabilities/{short_name}.{version}.xml", endpoints.egi)
}

pub fn order_base_url(endpoints: &Endpoints) -> String {
    format!("{}/request", endpoints.egi)
}

pub fn status_url(endpoints: &Endpoints, order_id: &str) -> String {
    format!("{}/request/{order_id}", endpoints.egi)
}

pub fn archive_url(endpoints: &Endpoints, order_id: &str) -> String {
    format!("{}/{order_id}.zip", endpoints.esir)
}

pub fn collections_url(endpoints: &Endpoints) -> String {
    format!("{}/collections.json", endpoints.cmr)
}

pub fn granules_url(endpoints: &Endpoints) -> String {
    format!("{}/granules.json", endpoints.cmr)
}

/// Encoded order URL for one page of a request.
pub fn order_url(endpoints: &Endpoints, request: &Request, page_num: u32) -> Result<Url> {
    let mut url = Url::parse(&order_base_url(endpoints))?;
    {
        let mut q = url.query_pairs_mut();
        for (k, v) in request.to_query_pairs() {
            if k != "page_num" {
                q.append_pair(&k, &v);
            }
        }
        q.append_pair("page_num", &page_num.to_string());
    }
    Ok(url)
}

/// Human readable per-page endpoints, unencoded like the service docs show them.
pub fn order_endpoints(endpoints: &Endpoints, request: &Request, pages: u32) -> Vec<String> {
    let mut r = request.clone();
    r.remove("page_num");
    let base = order_base_url(endpoints);
    let params = r.to_query_string();
    (1..=pages)
        .map(|page| format!("{base}?{params}&page_num={page}"))
        .collect()
}

/// Number of order pages needed for `granules` at `page_size` granules per page.
pub fn page_count(granules: usize, page_size: u32) -> Result<u32> {
    if page_size == 0 {
        return Err(Error::InvalidRequest("page_size must be > 0".into()));
    }
    let pages = granules.div_ceil(page_size as usize).max(1);
    u32::try_from(pages).map_err(|_| Error::InvalidRequest(format!("too many pages: {pages}")))
}

/// Pull the file name out of a `Content-Disposition` header.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let name = rest.split(';').next()?.trim().trim_matches('"');
    let name = name.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}
