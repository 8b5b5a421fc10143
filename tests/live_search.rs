//! Runs against the real ECOTOX site. Opt in with `ECOTOX_LIVE=1 cargo test -- --ignored`.

use std::sync::Arc;

use browser_session::{BrowserSession, ChromiumConfig, ChromiumSession};
use ecotox_query::{QueryCondition, QueryDriver};

fn live_enabled() -> bool {
    std::env::var("ECOTOX_LIVE").map(|v| v == "1").unwrap_or(false)
}

#[tokio::test]
#[ignore]
async fn ddt_against_bluegill_returns_a_summary() {
    if !live_enabled() {
        eprintln!("skipping: set ECOTOX_LIVE=1 to run against the live site");
        return;
    }

    let session = Arc::new(
        ChromiumSession::launch(ChromiumConfig::default())
            .await
            .expect("launch chromium"),
    );
    let port: Arc<dyn BrowserSession> = session.clone();
    let mut driver = QueryDriver::new(port);

    let condition = QueryCondition::new("DDT", "Lepomis", "LC50", 4);
    let result = driver.run(&condition).await.expect("live query");
    assert_eq!(result.summary.split('.').nth(1).map(str::len), Some(5));
    assert!(!driver.state().is_first_query());

    drop(driver);
    if let Ok(session) = Arc::try_unwrap(session) {
        session.shutdown().await;
    }
}
