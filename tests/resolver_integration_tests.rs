//! End-to-end resolver tests that go through the real JSON config loader
//! instead of hand-built `ConfigSnapshot`s, exercising the Config Store and
//! Rule Resolver together (spec.md §4.1, §4.5).

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use causeway::config::loader::load_snapshot_from_json_str;
use causeway::resolver::{resolve, Mode, ProbeCache, ResolveRequest, SizeProber};
use url::Url;

struct FixedSizeProber {
    size: Option<u64>,
    calls: AtomicUsize,
}

#[async_trait]
impl SizeProber for FixedSizeProber {
    async fn probe_size(&self, _url: &Url) -> Option<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.size
    }
}

const CONFIG: &str = r#"{
    "MAP": {
        "/b2": {
            "DefaultTarget": "https://b2.example/bucket",
            "Extensions": [
                { "exts": ["jpg", "png"], "target": "https://img-cdn.example", "min": 1024, "max": 2097152 },
                { "exts": ["jpg", "png"], "target": "https://img-origin.example" }
            ]
        },
        "/legacy": {
            "DefaultTarget": "https://legacy.example",
            "Extensions": [
                { "exts": ["zip"], "target": "https://archive.example", "redirect": true }
            ]
        }
    },
    "Compression": { "gzip": true, "brotli": false },
    "Cache": { "enabled": true, "ttl_seconds": 120, "cacheable_extensions": ["jpg", "png"] }
}"#;

#[tokio::test]
async fn routes_through_loaded_config_to_size_bounded_extension_rule() {
    let snapshot = load_snapshot_from_json_str(CONFIG).unwrap();
    let probes = ProbeCache::new(std::time::Duration::from_secs(5));
    let prober = FixedSizeProber {
        size: Some(1536),
        calls: AtomicUsize::new(0),
    };

    let req = ResolveRequest {
        method: "GET",
        path: "/b2/photos/a.jpg",
        query: None,
        host: None,
        accept_encoding: Some("gzip"),
        content_length_hint: None,
    };
    let target = resolve(&snapshot, &req, &probes, &prober).await.unwrap();

    assert_eq!(target.upstream_url.host_str(), Some("img-cdn.example"));
    assert_eq!(target.mode, Mode::Proxy);
    assert_eq!(target.matched_prefix, "/b2");
    assert!(target.cache_policy.enabled);
    // Size fell within the first extension rule's bound, so no probe for a
    // size we already know from the hinted default rule's absence.
    assert!(prober.calls.load(Ordering::SeqCst) <= 1);
}

#[tokio::test]
async fn falls_back_to_unbounded_extension_rule_when_probe_reports_out_of_range() {
    let snapshot = load_snapshot_from_json_str(CONFIG).unwrap();
    let probes = ProbeCache::new(std::time::Duration::from_secs(5));
    let prober = FixedSizeProber {
        size: Some(50_000_000),
        calls: AtomicUsize::new(0),
    };

    let req = ResolveRequest {
        method: "GET",
        path: "/b2/photos/huge.png",
        query: None,
        host: None,
        accept_encoding: None,
        content_length_hint: None,
    };
    let target = resolve(&snapshot, &req, &probes, &prober).await.unwrap();
    assert_eq!(target.upstream_url.host_str(), Some("img-origin.example"));
}

#[tokio::test]
async fn redirect_rule_sets_redirect_mode() {
    let snapshot = load_snapshot_from_json_str(CONFIG).unwrap();
    let probes = ProbeCache::new(std::time::Duration::from_secs(5));
    let prober = FixedSizeProber {
        size: None,
        calls: AtomicUsize::new(0),
    };

    let req = ResolveRequest {
        method: "GET",
        path: "/legacy/old-release.zip",
        query: None,
        host: None,
        accept_encoding: None,
        content_length_hint: None,
    };
    let target = resolve(&snapshot, &req, &probes, &prober).await.unwrap();
    assert_eq!(target.mode, Mode::Redirect);
    assert_eq!(target.upstream_url.host_str(), Some("archive.example"));
}

#[tokio::test]
async fn disabled_rule_in_loaded_config_is_not_routed() {
    let json = r#"{
        "MAP": {
            "/b2": { "DefaultTarget": "https://b2.example", "enabled": false }
        }
    }"#;
    let snapshot = load_snapshot_from_json_str(json).unwrap();
    let probes = ProbeCache::new(std::time::Duration::from_secs(5));
    let prober = FixedSizeProber {
        size: None,
        calls: AtomicUsize::new(0),
    };
    let req = ResolveRequest {
        method: "GET",
        path: "/b2/file.txt",
        query: None,
        host: None,
        accept_encoding: None,
        content_length_hint: None,
    };
    assert!(resolve(&snapshot, &req, &probes, &prober).await.is_err());
}
