//! End-to-end exercise of the feed pipeline: mock feeds are fetched,
//! staged, swapped live, and then drive classification verdicts.

use std::sync::Arc;
use std::time::Duration;

use riskgate_core::catalog::IndexKind;
use riskgate_core::{
    Classifier, IndexRegistry, IndexValue, MxStatus, RiskLevel, CATALOG, MX_CACHE,
};
use riskgate_intel::{BlocklistLoader, FeedFetcher, FeedSource, LoadState, SnapshotStore};
use riskgate_resolver::{default_pool, MxResolver};

fn sources(base_url: &str) -> Vec<FeedSource> {
    vec![
        FeedSource {
            category: "tor_network_ip".to_string(),
            kind: IndexKind::Ip,
            url: format!("{base_url}/tor"),
        },
        FeedSource {
            category: "reported_ip".to_string(),
            kind: IndexKind::Ip,
            url: format!("{base_url}/reported"),
        },
        FeedSource {
            category: "disposable_email".to_string(),
            kind: IndexKind::Email,
            url: format!("{base_url}/disposable"),
        },
    ]
}

#[tokio::test]
async fn refreshed_feeds_drive_classification() {
    let mut server = mockito::Server::new_async().await;
    let _tor = server
        .mock("GET", "/tor")
        .with_status(200)
        .with_body("# tor exits\n185.220.101.1\n185.220.101.0/24\n")
        .create_async()
        .await;
    let _reported = server
        .mock("GET", "/reported")
        .with_status(200)
        .with_body("198.51.100.1\t4\n")
        .create_async()
        .await;
    let _disposable = server
        .mock("GET", "/disposable")
        .with_status(200)
        .with_body("TempMail.com\n")
        .create_async()
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(IndexRegistry::new());
    let (loader, handle) = BlocklistLoader::with_schedule(
        Arc::clone(&registry),
        FeedFetcher::new().unwrap(),
        SnapshotStore::new(tmp.path()),
        sources(&server.url()),
        Duration::from_secs(86_400),
        Duration::from_secs(3_600),
    );
    let task = tokio::spawn(loader.run());

    // Boot found no snapshot, so the loader fetches immediately; update_now
    // coalesces with (or follows) that first refresh.
    let state = handle.update_now().await;
    assert_eq!(state, LoadState::Ok);

    let status = handle.status();
    assert_eq!(status.last_status, LoadState::Ok);
    assert!(status.last_update.is_some());
    assert_eq!(status.per_category_sizes["tor_network_ip"], 2);
    assert_eq!(status.per_category_sizes["disposable_email"], 1);
    // Categories without a test feed stay present and empty.
    assert_eq!(status.per_category_sizes["vpn_ip"], 0);
    for category in &CATALOG {
        assert!(registry.exists(category.name));
    }

    // Zero-capacity pool: any uncached MX lookup degrades to no_mx, so the
    // test never touches real DNS.
    let resolver = Arc::new(MxResolver::with_pool(default_pool(), 0));
    let classifier = Classifier::new(Arc::clone(&registry), resolver);

    // Seed a deliverable corporate domain.
    registry
        .insert(MX_CACHE, "acme.com", IndexValue::Mx(MxStatus::Valid))
        .unwrap();

    // Exact tor exit hit.
    let verdict = classifier.classify(None, Some("185.220.101.1")).await;
    assert_eq!(verdict.level, RiskLevel::High);
    assert_eq!(verdict.reasons, vec!["tor_network_ip"]);

    // CIDR hit from the same feed.
    let verdict = classifier.classify(None, Some("185.220.101.77")).await;
    assert_eq!(verdict.level, RiskLevel::High);

    // Disposable domain, case-folded at parse time.
    let verdict = classifier.classify(Some("x@tempmail.com"), None).await;
    assert_eq!(verdict.level, RiskLevel::High);
    assert_eq!(verdict.reasons, vec!["disposable_email"]);

    // Reported IP alone is low; a deliverable corporate address cleans it.
    let verdict = classifier.classify(None, Some("198.51.100.1")).await;
    assert_eq!(verdict.level, RiskLevel::Low);
    let verdict = classifier
        .classify(Some("john@acme.com"), Some("198.51.100.1"))
        .await;
    assert_eq!(verdict.level, RiskLevel::None);
    assert!(verdict.reasons.is_empty());

    task.abort();
}

#[tokio::test]
async fn failed_refresh_preserves_previous_verdicts() {
    let mut server = mockito::Server::new_async().await;
    let tor = server
        .mock("GET", "/tor")
        .with_status(200)
        .with_body("185.220.101.1\n")
        .create_async()
        .await;
    let reported = server
        .mock("GET", "/reported")
        .with_status(200)
        .with_body("198.51.100.1\n")
        .create_async()
        .await;
    let disposable = server
        .mock("GET", "/disposable")
        .with_status(200)
        .with_body("tempmail.com\n")
        .create_async()
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(IndexRegistry::new());
    let (loader, handle) = BlocklistLoader::with_schedule(
        Arc::clone(&registry),
        FeedFetcher::new().unwrap(),
        SnapshotStore::new(tmp.path()),
        sources(&server.url()),
        Duration::from_secs(86_400),
        Duration::from_secs(3_600),
    );
    let task = tokio::spawn(loader.run());

    assert_eq!(handle.update_now().await, LoadState::Ok);
    let sizes_before = handle.status().per_category_sizes;

    // Upstream goes dark; the next refresh must fail without touching the
    // live indexes.
    drop(tor);
    drop(reported);
    drop(disposable);
    let _dark = server
        .mock("GET", "/tor")
        .with_status(503)
        .create_async()
        .await;

    let state = handle.update_now().await;
    assert_eq!(
        state,
        LoadState::Error {
            reason: "download_failed".to_string()
        }
    );

    let status = handle.status();
    assert_eq!(status.per_category_sizes, sizes_before);
    assert!(registry
        .lookup("tor_network_ip", "185.220.101.1")
        .is_some());
    assert!(!registry.exists("staging:tor_network_ip"));

    task.abort();
}
