//! The Rule Resolver (spec.md §4.1): `resolve(request) -> ResolvedTarget |
//! NotRouted`.

use url::Url;

use crate::config::store::ConfigSnapshot;
use crate::config::rule::{ExtensionRule, PathRule};
use crate::resolver::probe::{ProbeCache, SizeProber};
use crate::resolver::types::{Mode, NotRouted, ResolveRequest, ResolvedTarget};

const MIRROR_PREFIX: &str = "/mirror/";

fn request_extension(path: &str) -> Option<String> {
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    let dot = last_segment.rfind('.')?;
    if dot == 0 || dot == last_segment.len() - 1 {
        return None;
    }
    Some(last_segment[dot + 1..].to_ascii_lowercase())
}

/// Longest PathRule whose path is a segment-boundary prefix of the request
/// path (spec.md §4.1 "Prefix match").
fn longest_matching_rule<'a>(rules: &'a [PathRule], path: &str) -> Option<&'a PathRule> {
    rules
        .iter()
        .filter(|r| r.enabled && r.matches_path(path))
        .max_by_key(|r| r.prefix.len())
}

fn build_target_url(base: &Url, residual_path: &str, query: Option<&str>) -> Option<Url> {
    let mut url = base.clone();
    {
        let mut segments = url.path().trim_end_matches('/').to_string();
        segments.push_str(residual_path);
        url.set_path(&segments);
    }
    url.set_query(query);
    Some(url)
}

/// §4.1 "Extension-rule selection": returns the selected ExtensionRule, if
/// any, after applying extension/host filters and (if needed) the size
/// probe.
async fn select_extension_rule<'a>(
    rule: &'a PathRule,
    ext: &str,
    host: Option<&str>,
    content_length_hint: Option<u64>,
    default_target: &Url,
    probe_cache: &ProbeCache,
    prober: &dyn SizeProber,
) -> Option<&'a ExtensionRule> {
    // Step 2+3: filter by extension and host.
    let candidates: Vec<&ExtensionRule> = rule
        .extension_rules
        .iter()
        .filter(|e| e.matches_extension(ext) && e.matches_host(host))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    // Step 4/7: only probe if at least one candidate has a finite bound.
    let needs_probe = candidates.iter().any(|c| c.size.is_bounded());
    let observed_size = if needs_probe {
        if let Some(hint) = content_length_hint {
            Some(hint)
        } else {
            probe_cache.get_or_probe(default_target, prober).await
        }
    } else {
        None
    };

    // Step 5: first candidate (configuration order) whose range contains
    // the observed size; unknown size falls through to the first candidate
    // that accepts "unknown" (spec.md §4.1 "Failure semantics").
    match observed_size {
        Some(size) => candidates.into_iter().find(|c| c.size.contains(size)),
        None => candidates.into_iter().find(|c| c.size.accepts_unknown()),
    }
}

pub async fn resolve(
    snapshot: &ConfigSnapshot,
    req: &ResolveRequest<'_>,
    probe_cache: &ProbeCache,
    prober: &dyn SizeProber,
) -> Result<ResolvedTarget, NotRouted> {
    if let Some(rest) = req.path.strip_prefix(MIRROR_PREFIX) {
        return resolve_mirror(rest, snapshot);
    }

    let rule = longest_matching_rule(&snapshot.rules, req.path).ok_or_else(|| NotRouted {
        path: req.path.to_string(),
    })?;

    let residual = rule.residual_path(req.path);
    let ext = request_extension(req.path);

    let selected = match &ext {
        Some(ext) => {
            select_extension_rule(
                rule,
                ext,
                req.host,
                req.content_length_hint,
                &rule.default_target,
                probe_cache,
                prober,
            )
            .await
        }
        None => None,
    };

    let (target_base, mode) = match selected {
        Some(ext_rule) => (
            &ext_rule.target,
            if ext_rule.redirect {
                Mode::Redirect
            } else {
                Mode::Proxy
            },
        ),
        None => (&rule.default_target, Mode::Proxy),
    };

    let upstream_url = build_target_url(target_base, residual, req.query).ok_or_else(|| NotRouted {
        path: req.path.to_string(),
    })?;

    Ok(ResolvedTarget {
        upstream_url,
        mode,
        cache_policy: (*snapshot.cache_policy).clone(),
        matched_prefix: rule.prefix.clone(),
    })
}

fn resolve_mirror(rest: &str, snapshot: &ConfigSnapshot) -> Result<ResolvedTarget, NotRouted> {
    let url = Url::parse(rest).map_err(|_| NotRouted {
        path: format!("{MIRROR_PREFIX}{rest}"),
    })?;
    Ok(ResolvedTarget {
        upstream_url: url,
        mode: Mode::Proxy,
        cache_policy: (*snapshot.cache_policy).clone(),
        matched_prefix: MIRROR_PREFIX.trim_end_matches('/').to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::rule::SizeRange;
    use crate::config::schema::{CachePolicy, CompressionPolicy};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedProber(Option<u64>, AtomicUsize);

    #[async_trait::async_trait]
    impl SizeProber for FixedProber {
        async fn probe_size(&self, _url: &Url) -> Option<u64> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0
        }
    }

    fn snapshot_with_b2() -> ConfigSnapshot {
        let ext_rule = ExtensionRule {
            extensions: vec!["jpg".into(), "png".into()],
            target: Url::parse("https://img-cdn.example").unwrap(),
            size: SizeRange::new(Some(1024), Some(2_097_152)).unwrap(),
            hosts: Vec::new(),
            redirect: false,
        };
        let rule = PathRule {
            prefix: "/b2".to_string(),
            default_target: Url::parse("https://b2.example/bucket").unwrap(),
            enabled: true,
            extension_rules: vec![ext_rule],
        };
        ConfigSnapshot {
            rules: Arc::new(vec![rule]),
            cache_policy: Arc::new(CachePolicy {
                enabled: false,
                ttl_seconds: 0,
                min_size: None,
                max_size: None,
                cacheable_extensions: Vec::new(),
            }),
            compression_policy: Arc::new(CompressionPolicy {
                gzip: true,
                brotli: true,
            }),
        }
    }

    fn req<'a>(path: &'a str) -> ResolveRequest<'a> {
        ResolveRequest {
            method: "GET",
            path,
            query: None,
            host: None,
            accept_encoding: None,
            content_length_hint: None,
        }
    }

    #[tokio::test]
    async fn scenario_1_prefix_routing() {
        let snap = snapshot_with_b2();
        let probe_cache = ProbeCache::new(Duration::from_secs(5));
        let prober = FixedProber(None, AtomicUsize::new(0));
        let target = resolve(&snap, &req("/b2/a/b.jpg"), &probe_cache, &prober)
            .await
            .unwrap();
        assert_eq!(target.upstream_url.as_str(), "https://b2.example/bucket/a/b.jpg");
        assert_eq!(target.matched_prefix, "/b2");
    }

    #[tokio::test]
    async fn scenario_2_extension_and_size_routing() {
        let snap = snapshot_with_b2();
        let probe_cache = ProbeCache::new(Duration::from_secs(5));

        let in_range = FixedProber(Some(1_200_000), AtomicUsize::new(0));
        let target = resolve(&snap, &req("/b2/a/b.jpg"), &probe_cache, &in_range)
            .await
            .unwrap();
        assert_eq!(target.upstream_url.host_str(), Some("img-cdn.example"));

        let probe_cache = ProbeCache::new(Duration::from_secs(5));
        let too_small = FixedProber(Some(500), AtomicUsize::new(0));
        let target = resolve(&snap, &req("/b2/a/b.jpg"), &probe_cache, &too_small)
            .await
            .unwrap();
        assert_eq!(target.upstream_url.host_str(), Some("b2.example"));

        let probe_cache = ProbeCache::new(Duration::from_secs(5));
        let too_big = FixedProber(Some(8 * 1024 * 1024), AtomicUsize::new(0));
        let target = resolve(&snap, &req("/b2/a/b.jpg"), &probe_cache, &too_big)
            .await
            .unwrap();
        assert_eq!(target.upstream_url.host_str(), Some("b2.example"));
    }

    #[tokio::test]
    async fn scenario_3_host_scoped_redirect() {
        let mut snap = snapshot_with_b2();
        {
            let rules = Arc::get_mut(&mut snap.rules).unwrap();
            rules[0].extension_rules.push(ExtensionRule {
                extensions: vec!["png".into()],
                target: Url::parse("https://b-cdn.example").unwrap(),
                size: SizeRange::UNBOUNDED,
                hosts: vec!["b.example".into()],
                redirect: true,
            });
        }
        let probe_cache = ProbeCache::new(Duration::from_secs(5));
        let prober = FixedProber(None, AtomicUsize::new(0));

        let b_req = ResolveRequest {
            host: Some("b.example"),
            ..req("/b2/pic.png")
        };
        let target = resolve(&snap, &b_req, &probe_cache, &prober).await.unwrap();
        assert_eq!(target.mode, Mode::Redirect);
        assert_eq!(target.upstream_url.host_str(), Some("b-cdn.example"));

        let a_req = ResolveRequest {
            host: Some("a.example"),
            ..req("/b2/pic.png")
        };
        let target = resolve(&snap, &a_req, &probe_cache, &prober).await.unwrap();
        assert_eq!(target.mode, Mode::Proxy);
        assert_eq!(target.upstream_url.host_str(), Some("b2.example"));
    }

    #[tokio::test]
    async fn not_routed_when_no_prefix_matches() {
        let snap = snapshot_with_b2();
        let probe_cache = ProbeCache::new(Duration::from_secs(5));
        let prober = FixedProber(None, AtomicUsize::new(0));
        let result = resolve(&snap, &req("/other/x.jpg"), &probe_cache, &prober).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn scenario_6_segment_boundary_does_not_leak_across_siblings() {
        let mut snap = snapshot_with_b2();
        {
            let rules = Arc::get_mut(&mut snap.rules).unwrap();
            rules.push(PathRule {
                prefix: "/b2x".to_string(),
                default_target: Url::parse("https://other.example").unwrap(),
                enabled: true,
                extension_rules: Vec::new(),
            });
        }
        let probe_cache = ProbeCache::new(Duration::from_secs(5));
        let prober = FixedProber(None, AtomicUsize::new(0));
        let a = resolve(&snap, &req("/b2/a.jpg"), &probe_cache, &prober).await.unwrap();
        let b = resolve(&snap, &req("/b2x/a.jpg"), &probe_cache, &prober).await.unwrap();
        assert_eq!(a.matched_prefix, "/b2");
        assert_eq!(b.matched_prefix, "/b2x");
    }

    #[tokio::test]
    async fn mirror_prefix_bypasses_path_rules() {
        let snap = snapshot_with_b2();
        let probe_cache = ProbeCache::new(Duration::from_secs(5));
        let prober = FixedProber(None, AtomicUsize::new(0));
        let target = resolve(
            &snap,
            &req("/mirror/https://anywhere.example/a/b?x=1"),
            &probe_cache,
            &prober,
        )
        .await
        .unwrap();
        assert_eq!(target.upstream_url.as_str(), "https://anywhere.example/a/b?x=1");
    }

    #[tokio::test]
    async fn no_extension_uses_default_target() {
        let snap = snapshot_with_b2();
        let probe_cache = ProbeCache::new(Duration::from_secs(5));
        let prober = FixedProber(None, AtomicUsize::new(0));
        let target = resolve(&snap, &req("/b2/noext"), &probe_cache, &prober).await.unwrap();
        assert_eq!(target.upstream_url.host_str(), Some("b2.example"));
    }
}
