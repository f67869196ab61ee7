use std::sync::Arc;

use roster_core::export::{dedupe, to_csv_string};
use roster_core::{
    Crawler, MemorySink, MemoryWorkQueue, NullArtifactStore, RecordSink, TracingWorkerReporter,
    WorkerPool,
};
use tokio_util::sync::CancellationToken;

use crate::common::{AGENT_ROOT, FixtureRenderer, LISTING, fast_config};

#[tokio::test]
async fn full_crawl_produces_deduplicated_export() {
    let renderer = FixtureRenderer::jacksonville();
    let crawler = Arc::new(
        Crawler::new(
            &fast_config(),
            renderer.clone(),
            MemoryWorkQueue::new(),
            MemorySink::new(),
            NullArtifactStore,
        )
        .unwrap(),
    );

    let summary = WorkerPool::new(1)
        .run(Arc::clone(&crawler), CancellationToken::new(), Arc::new(TracingWorkerReporter))
        .await
        .unwrap();

    assert_eq!(summary.processed, 7);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.fallback_hops, 1);

    let records = crawler.sink().records().await.unwrap();
    let marcus = records
        .iter()
        .find(|r| r.email == "marcus.lee@example.com")
        .unwrap();
    assert_eq!(marcus.first_name, "Marcus");
    assert_eq!(marcus.last_name, "Lee");
    assert_eq!(marcus.phone, "+19045557788");
    assert_eq!(
        marcus.source_profile_url,
        format!("{AGENT_ROOT}/marcus-lee/aid-2?utm_source=list")
    );
    assert_eq!(
        marcus.source_contact_url,
        format!("{AGENT_ROOT}/marcus-lee/aid-2/contact")
    );

    let csv = to_csv_string(&dedupe(&records)).unwrap();
    assert_eq!(
        csv,
        "EMAIL,FIRSTNAME,LASTNAME,SMS\n\
         jane.public@example.com,Jane Q.,Public,+19045551234\n\
         marcus.lee@example.com,Marcus,Lee,+19045557788\n"
    );

    // Listing pages are each visited once even though page 2 is both
    // "next" and seeded, and Marcus is linked from two pages.
    let opened = renderer.opened();
    assert_eq!(opened.iter().filter(|u| u.contains("?page=2")).count(), 1);
    assert_eq!(opened.iter().filter(|u| u.contains("marcus-lee/aid-2")).count(), 2);
}

#[tokio::test]
async fn exhaustive_links_reach_structured_data_profiles() {
    let renderer = FixtureRenderer::jacksonville();
    let mut config = fast_config();
    config.exhaustive_links = true;
    let crawler = Arc::new(
        Crawler::new(
            &config,
            renderer.clone(),
            MemoryWorkQueue::new(),
            MemorySink::new(),
            NullArtifactStore,
        )
        .unwrap(),
    );

    let summary = WorkerPool::new(4)
        .run(Arc::clone(&crawler), CancellationToken::new(), Arc::new(TracingWorkerReporter))
        .await
        .unwrap();

    assert!(
        renderer
            .opened()
            .contains(&format!("{AGENT_ROOT}/harriet-vance/aid-3"))
    );
    // Harriet has neither an email nor a contact link.
    assert_eq!(summary.records, 3);
    assert_eq!(summary.processed, 8);
}

#[tokio::test]
async fn record_cap_stops_discovery_but_finishes_in_flight_work() {
    let renderer = FixtureRenderer::jacksonville();
    let mut config = fast_config();
    config.max_records = Some(1);
    let crawler = Arc::new(
        Crawler::new(
            &config,
            renderer.clone(),
            MemoryWorkQueue::new(),
            MemorySink::new(),
            NullArtifactStore,
        )
        .unwrap(),
    );

    let summary = WorkerPool::new(1)
        .run(Arc::clone(&crawler), CancellationToken::new(), Arc::new(TracingWorkerReporter))
        .await
        .unwrap();

    assert!(crawler.budget().stop_requested());
    // Jane hits the cap; Marcus was already queued and still completes via
    // his contact page. Nora lives on page 2, which is never opened.
    assert_eq!(summary.records, 2);
    let opened = renderer.opened();
    assert!(!opened.iter().any(|u| u.contains("?page=")));
    assert!(!opened.iter().any(|u| u.contains("nora-king")));
    assert_eq!(opened.first().map(String::as_str), Some(LISTING));
}
