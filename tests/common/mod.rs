#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::time::Duration;

use nsidc_access::{Client, ClientOptions, Credentials, PollPolicy, Request, StaticCredentials};
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USER: &str = "alice";
pub const PASSWORD: &str = "s3cret";
pub const ORDER_ID: &str = "5000000962482";

pub const CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Capabilities>
  <SubsetAgent id="ICESAT2">
    <SubsetVariable value="gt1l:sea_ice_segments:latitude"/>
    <Format value="" label="No reformatting"/>
    <Format value="NetCDF4-CF"/>
    <Projections normalProj="NetCDF4-CF">
      <Projection value="NO_CHANGE"/>
      <Projection value="GEOGRAPHIC"/>
    </Projections>
  </SubsetAgent>
</Capabilities>"#;

pub fn order_created() -> String {
    order_created_for(ORDER_ID)
}

pub fn order_created_for(order_id: &str) -> String {
    format!(
        r#"<eesi:agentResponse xmlns:eesi="http://eosdis.nasa.gov/esi/rsp/e">
  <order><orderId>{order_id}</orderId><Info>queued</Info></order>
</eesi:agentResponse>"#
    )
}

pub fn status_doc(status: &str, messages: &[&str]) -> String {
    let info: String = messages.iter().map(|m| format!("<info>{m}</info>")).collect();
    format!(
        r#"<eesi:agentResponse xmlns:eesi="http://eosdis.nasa.gov/esi/rsp/e">
  <requestStatus><status>{status}</status><numberProcessed>1</numberProcessed></requestStatus>
  <processInfo>{info}</processInfo>
</eesi:agentResponse>"#
    )
}

pub fn granule_feed(sizes: &[&str]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = sizes
        .iter()
        .enumerate()
        .map(|(i, s)| {
            serde_json::json!({
                "title": format!("SC:ATL07-01_2019032300{i}.h5"),
                "dataset_id": "ATLAS/ICESat-2 L3A Sea Ice Height V002",
                "granule_size": s,
            })
        })
        .collect();
    serde_json::json!({ "feed": { "entry": entries } })
}

/// Zip with one folder per granule, as the order service packs them.
pub fn order_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        w.start_file(*name, zip::write::FileOptions::default()).unwrap();
        w.write_all(data.as_bytes()).unwrap();
    }
    w.finish().unwrap().into_inner()
}

pub fn fast_poll(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
        max_attempts: Some(max_attempts),
        deadline: None,
    }
}

/// Build inside `spawn_blocking`: the blocking client must not live on a runtime thread.
pub fn client_for(uri: &str) -> Client {
    Client::new(ClientOptions {
        source: uri.to_string(),
        poll: fast_poll(10),
        ..ClientOptions::default()
    })
    .unwrap()
}

pub fn creds() -> StaticCredentials {
    StaticCredentials(Credentials::new(USER, PASSWORD).unwrap())
}

pub fn authenticated_client(uri: &str) -> Client {
    let mut client = client_for(uri);
    client.authenticate(&creds(), "ATL07", "002").unwrap();
    client
}

pub fn atl07_request() -> Request {
    Request::new()
        .short_name("ATL07")
        .version("002")
        .bounding_box("140,72,153,80")
        .temporal("2019-03-23T00:00:00Z,2019-03-23T23:59:59Z")
}

pub async fn mount_capabilities(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/egi/capabilities/ATL07.002.xml"))
        .and(basic_auth(USER, PASSWORD))
        .respond_with(ResponseTemplate::new(200).set_body_string(CAPABILITIES))
        .mount(server)
        .await;
}
