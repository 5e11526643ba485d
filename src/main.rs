use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use gridvault::{GridConfig, SessionContext};

fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cfg = GridConfig::from_env()?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "gridvault",
        "gridvault starting: RUST_LOG='{}', user='{}', host='{}#{}', registry={:?}",
        rust_log, cfg.client_user, cfg.local_host, cfg.local_zone, cfg.registry_file
    );

    let session = SessionContext::from_config(cfg)?;
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: gridvault <path>...");
        eprintln!("  reports the permission decision for each path on the local host");
        return Ok(());
    }

    let host = session.local_host().clone();
    for path in &paths {
        let line = match session.check_path_permission(path, &host) {
            Ok(res) => serde_json::json!({ "path": path, "host": host.to_string(), "permission": res }),
            Err(e) => serde_json::json!({ "path": path, "host": host.to_string(), "error": e, "code": e.code_str() }),
        };
        println!("{}", line);
    }
    Ok(())
}
