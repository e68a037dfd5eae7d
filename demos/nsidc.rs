use std::env;
use std::path::PathBuf;

use nsidc_access::{
    ChainCredentials, Client, ClientOptions, DEFAULT_FIELDS, EnvCredentials, NetrcCredentials,
    PromptCredentials, Request, order_endpoints, page_count, subset_time_range, temporal_range,
    whole_day,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage:
  cargo run --example nsidc -- search <short_name> [day] [bbox]
  cargo run --example nsidc -- capabilities <short_name> [version]
  cargo run --example nsidc -- order <short_name> <day> <bbox> [output_dir]

Example (ATL07 sea ice heights, 2019-03-23, East Siberian Sea):
  cargo run --example nsidc -- order ATL07 2019-03-23 140,72,153,80 Outputs

Notes:
- Orders need an Earthdata Login account. Credentials come from
  EARTHDATA_USERNAME/EARTHDATA_PASSWORD, ~/.netrc, or a prompt.
- Set NSIDC_POLL_MAX_ATTEMPTS / NSIDC_POLL_DEADLINE_SECS to bound polling.
- RUST_LOG=nsidc_access=debug shows every status check.";

fn credentials() -> ChainCredentials {
    let mut chain = ChainCredentials::new().with(EnvCredentials::default());
    if let Ok(netrc) = NetrcCredentials::default_location() {
        chain = chain.with(netrc);
    }
    chain.with(PromptCredentials)
}

fn client() -> nsidc_access::Result<Client> {
    Client::new(ClientOptions::from_env()?)
}

fn request_for(short_name: &str, version: &str, day: &str, bbox: &str) -> nsidc_access::Result<Request> {
    let (start, end) = whole_day(day)?;
    Ok(Request::new()
        .short_name(short_name)
        .version(version)
        .temporal(temporal_range(start, end)?)
        .time(subset_time_range(start, end)?)
        .bounding_box(bbox)
        .bbox(bbox))
}

fn search(args: &[String]) -> nsidc_access::Result<()> {
    let short_name = args.first().map(|s| s.as_str()).unwrap_or("ATL07");
    let client = client()?;

    let collections = client.search_collections(short_name)?;
    for c in &collections {
        println!("{}", c.describe(&DEFAULT_FIELDS));
    }
    let version = nsidc_access::latest_version(&collections).unwrap_or_default();
    println!("Latest version: {version}");

    let day = args.get(1).map(|s| s.as_str()).unwrap_or("2019-03-23");
    let bbox = args.get(2).map(|s| s.as_str()).unwrap_or("140,72,153,80");
    let request = request_for(short_name, &version, day, bbox)?;
    let granules = client.search_granules(&request)?;
    println!(
        "There are {} granules of {short_name} version {version} over the area and time of interest.",
        granules.count()
    );
    if let Some(mean) = granules.mean_size_mb() {
        println!(
            "The average size of each granule is {mean:.2} MB and the total size of all {} granules is {:.2} MB",
            granules.count(),
            granules.total_size_mb()
        );
    }
    Ok(())
}

fn capabilities(args: &[String]) -> nsidc_access::Result<()> {
    let short_name = args.first().map(|s| s.as_str()).unwrap_or("ATL07");
    let mut client = client()?;
    let version = match args.get(1) {
        Some(v) => v.clone(),
        None => client.latest_version(short_name)?,
    };

    let caps = client.authenticate(&credentials(), short_name, &version)?;
    if !caps.has_subset_agent {
        println!("{short_name}.{version} has no customization options.");
        return Ok(());
    }
    println!("Variables ({}):", caps.variables.len());
    for v in &caps.variables {
        println!("  {v}");
    }
    println!("Formats: {}", caps.formats.join(", "));
    println!("Formats that support reprojection: {}", caps.reprojection_formats.join(", "));
    println!("Formats without reprojection: {}", caps.formats_without_reprojection().join(", "));
    println!("Projections: {}", caps.projections.join(", "));
    Ok(())
}

fn order(args: &[String]) -> nsidc_access::Result<()> {
    let (Some(short_name), Some(day), Some(bbox)) = (args.first(), args.get(1), args.get(2)) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let out = PathBuf::from(args.get(3).map(|s| s.as_str()).unwrap_or("Outputs"));

    let mut client = client()?;
    let version = client.latest_version(short_name)?;
    client.authenticate(&credentials(), short_name, &version)?;

    let request = request_for(short_name, &version, day, bbox)?.page_size(10);
    let granules = client.search_granules(&request)?;
    let pages = page_count(granules.count(), 10)?;
    for url in order_endpoints(client.endpoints(), &request, pages) {
        println!("{url}");
    }

    let summary = client.retrieve(&request, &out)?;
    for report in &summary.orders {
        println!("Order {}: {}", report.order_id, report.status);
        for m in &report.messages {
            println!("  {m}");
        }
    }
    println!(
        "Extracted {} files into {} ({} granule folders removed)",
        summary.extracted_files,
        out.display(),
        summary.cleanup.dirs_removed
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() == 1 {
        eprintln!("{USAGE}");
        return;
    }

    let rest = &args[2..];
    let result = match args[1].as_str() {
        "search" => search(rest),
        "capabilities" => capabilities(rest),
        "order" => order(rest),
        _ => {
            eprintln!("Unknown command. Use: search|capabilities|order");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("{} failed: {e}", args[1]);
        std::process::exit(1);
    }
}
