//! The Proxy Engine's `ProxyHttp` adapter (spec.md §4.2), generalizing the
//! teacher's `proxy::ProxyRouter`: `upstream_peer` builds an `HttpPeer` from
//! a `ResolvedTarget` instead of a static cluster list, `request_filter`
//! runs the Security Gate then the Rule Resolver instead of a prefix-map
//! lookup, and `fail_to_connect` keeps the teacher's bounded-retry shape.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use pingora::cache::eviction::lru::Manager as LruEvictionManager;
use pingora::cache::key::CacheKey;
use pingora::cache::lock::CacheLock;
use pingora::cache::{NoCacheReason, RespCacheable};
use pingora::http::ResponseHeader;
use pingora::modules::http::compression::{ResponseCompression, ResponseCompressionBuilder};
use pingora::modules::http::HttpModules;
use pingora::prelude::HttpPeer;
use pingora::protocols::http::compression::Algorithm;
use pingora::proxy::{ProxyHttp, Session};
use pingora::{Error, Result};

use crate::cache::{fingerprint::vary_string, is_cacheable, is_full_content_range, Method as CacheMethod, ResponseFacts};
use crate::config::ConfigStore;
use crate::metrics::{CacheOutcome, MetricsCollector};
use crate::proxy::bucket::CacheBucket;
use crate::proxy::compression::{choose_encoding, Encoding};
use crate::proxy::ctx::RouterCtx;
use crate::proxy::headers::should_drop_inbound_xff;
use crate::proxy::request::resolve_client_ip;
use crate::resolver::{resolve, Mode, ProbeCache, ResolveRequest, SizeProber};
use crate::security::{Decision, SecurityGate};

const MB: usize = 1024 * 1024;
/// zlib/brotli compression level passed to pingora's `ResponseCompression`
/// module when a response qualifies (spec.md §4.2); the module is otherwise
/// left at level 0 (disabled) per algorithm, matching its own default.
const COMPRESSION_LEVEL: u32 = 6;

/// Upstream connect/header/body-idle deadlines (spec.md §5 "Timeouts").
/// Not exposed via the on-disk config schema (spec.md §6 lists `MAP`,
/// `Compression`, `Cache` only); kept as engine-level defaults, overridable
/// at construction for tests.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub header: Duration,
    pub body_idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            connect: Duration::from_millis(2_000),
            header: Duration::from_millis(5_000),
            body_idle: Duration::from_millis(10_000),
        }
    }
}

pub struct GatewayEngine {
    pub config_store: ConfigStore,
    pub metrics: MetricsCollector,
    pub security: SecurityGate,
    pub probe_cache: ProbeCache,
    pub prober: Box<dyn SizeProber>,
    pub cache_bucket: CacheBucket,
    pub timeouts: Timeouts,
    pub ingress_trusted: bool,
}

impl GatewayEngine {
    pub fn new(
        config_store: ConfigStore,
        metrics: MetricsCollector,
        security: SecurityGate,
        prober: Box<dyn SizeProber>,
        cache: crate::cache::DiskCache,
    ) -> Self {
        let cache_bucket = CacheBucket::new(cache)
            .with_eviction(LruEvictionManager::<16>::with_capacity(MB * 512, 8192))
            .with_cache_lock(CacheLock::new(Duration::from_millis(1_000)));
        GatewayEngine {
            config_store,
            metrics,
            security,
            probe_cache: ProbeCache::new(Duration::from_secs(5)),
            prober,
            cache_bucket,
            timeouts: Timeouts::default(),
            ingress_trusted: false,
        }
    }

    fn client_ip(&self, session: &Session) -> Option<IpAddr> {
        let header = |name: &str| {
            session
                .get_header(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        let remote = session
            .client_addr()
            .and_then(|a| a.as_inet())
            .map(|a| a.ip());
        resolve_client_ip(
            header("X-Forwarded-For").as_deref(),
            header("X-Real-Ip").as_deref(),
            remote,
            self.ingress_trusted,
        )
    }

    async fn write_plain(&self, session: &mut Session, status: u16, body: &'static str) -> Result<()> {
        let mut header = ResponseHeader::build(status, None)?;
        header.insert_header("Content-Type", "application/json")?;
        session.set_keepalive(None);
        session.write_response_header(Box::new(header), true).await?;
        session
            .write_response_body(Some(Bytes::from_static(body.as_bytes())), true)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProxyHttp for GatewayEngine {
    type CTX = RouterCtx;

    fn new_ctx(&self) -> Self::CTX {
        RouterCtx::new()
    }

    fn init_downstream_modules(&self, modules: &mut HttpModules) {
        // Disabled per algorithm by default; `response_filter` turns the
        // chosen one up once it knows the upstream response qualifies.
        modules.add_module(ResponseCompressionBuilder::enable(0));
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool>
    where
        Self::CTX: Send + Sync,
    {
        let client_ip = self.client_ip(session);
        ctx.client_ip = client_ip;

        if let Some(ip) = client_ip {
            if let Decision::Deny(status) = self.security.preauthorize(ip) {
                ctx.short_circuited = true;
                self.write_plain(session, status, r#"{"error":"forbidden"}"#).await?;
                return Ok(true);
            }
        }

        let snapshot = self.config_store.current();
        let header = session.req_header();
        let path = header.uri.path().to_string();
        let query = header.uri.query().map(|q| q.to_string());
        let host = header
            .headers
            .get("host")
            .and_then(|v| v.to_str().ok())
            .map(|h| h.split(':').next().unwrap_or(h).to_ascii_lowercase());
        let accept_encoding = header
            .headers
            .get("accept-encoding")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let req = ResolveRequest {
            method: header.method.as_str(),
            path: &path,
            query: query.as_deref(),
            host: host.as_deref(),
            accept_encoding: accept_encoding.as_deref(),
            content_length_hint: None,
        };

        let resolved = match resolve(&snapshot, &req, &self.probe_cache, self.prober.as_ref()).await {
            Ok(target) => target,
            Err(_not_routed) => {
                ctx.short_circuited = true;
                self.write_plain(session, 404, r#"{"error":"no route"}"#).await?;
                return Ok(true);
            }
        };

        if resolved.mode == Mode::Redirect {
            ctx.short_circuited = true;
            let mut header = ResponseHeader::build(302, None)?;
            header.insert_header("Location", resolved.upstream_url.as_str())?;
            session.set_keepalive(None);
            session.write_response_header(Box::new(header), true).await?;
            session.write_response_body(None, true).await?;

            // A redirect is a real, successful outcome, unlike the preceding
            // banned/no-route cases — record it directly since `logging`
            // skips any request with `short_circuited` set.
            let latency_ns = ctx.request_start.elapsed().as_nanos() as u64;
            let ip = client_ip.unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
            self.metrics
                .record(&resolved.matched_prefix, 302, latency_ns, 0, ip, CacheOutcome::NotApplicable, 0)
                .await;
            self.security.observe(ip, 302);

            ctx.resolved = Some(resolved);
            return Ok(true);
        }

        let cache_policy_enabled = resolved.cache_policy.enabled;
        ctx.resolved = Some(resolved);

        if cache_policy_enabled {
            self.cache_bucket.enable(session);
        }

        Ok(false)
    }

    async fn upstream_peer(&self, _session: &mut Session, ctx: &mut Self::CTX) -> Result<Box<HttpPeer>> {
        let resolved = ctx.resolved.as_ref().ok_or_else(|| {
            Error::create(
                pingora::ErrorType::InternalError,
                pingora::ErrorSource::Internal,
                Some("upstream_peer called without a resolved target".into()),
                None,
            )
        })?;

        let url = &resolved.upstream_url;
        let host = url
            .host_str()
            .ok_or_else(|| Error::explain(pingora::ErrorType::InternalError, "resolved target has no host"))?;
        let tls = url.scheme() == "https";
        let port = url.port_or_known_default().unwrap_or(if tls { 443 } else { 80 });

        let mut peer = Box::new(HttpPeer::new((host, port), tls, host.to_string()));
        peer.options.connection_timeout = Some(self.timeouts.connect);
        peer.options.read_timeout = Some(self.timeouts.body_idle);
        Ok(peer)
    }

    async fn response_filter(
        &self,
        session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()>
    where
        Self::CTX: Send + Sync,
    {
        if ctx.resolved.is_none() {
            return Ok(());
        }

        let content_type = upstream_response
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let content_length = upstream_response
            .headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let already_encoded = upstream_response
            .headers
            .get(http::header::CONTENT_ENCODING)
            .is_some();
        let accept_encoding = session
            .req_header()
            .headers
            .get(http::header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let compression_policy = self.config_store.current().compression_policy.clone();

        // Streaming threshold (spec.md §4.2): only a body small enough to be
        // read fully up front can have its encoding chosen on the fly;
        // larger bodies are streamed chunk-by-chunk and pass through as-is.
        let encoding = if crate::proxy::streaming::should_buffer_fully(content_length) {
            choose_encoding(
                &compression_policy,
                accept_encoding.as_deref(),
                &content_type,
                content_length,
                already_encoded,
            )
        } else {
            None
        };

        // The actual compression (body encoding, Content-Length removal,
        // chunked framing) is pingora's `ResponseCompression` module's job;
        // we only decide, per spec.md §4.2 policy, which algorithm (if any)
        // it should turn on for this response.
        if let Some(resp_compression) = session.downstream_modules_ctx.get_mut::<ResponseCompression>() {
            match encoding {
                Some(Encoding::Gzip) => resp_compression.adjust_algorithm_level(Algorithm::Gzip, COMPRESSION_LEVEL),
                Some(Encoding::Brotli) => {
                    resp_compression.adjust_algorithm_level(Algorithm::Brotli, COMPRESSION_LEVEL)
                }
                None => {}
            }
        }

        Ok(())
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut pingora::http::RequestHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()>
    where
        Self::CTX: Send + Sync,
    {
        for name in crate::proxy::headers::HOP_BY_HOP {
            upstream_request.remove_header(name);
        }
        if should_drop_inbound_xff(self.ingress_trusted) {
            upstream_request.remove_header("X-Forwarded-For");
        }
        // The downstream Host is almost never the upstream authority once
        // resolved.upstream_url points somewhere else entirely; send the
        // request with the Host the upstream actually expects.
        if let Some(resolved) = ctx.resolved.as_ref() {
            if let Some(host) = resolved.upstream_url.host_str() {
                let authority = match resolved.upstream_url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                };
                upstream_request.insert_header(http::header::HOST, authority)?;
            }
        }
        Ok(())
    }

    fn cache_key_callback(&self, session: &Session, _ctx: &mut Self::CTX) -> Result<CacheKey> {
        let header = session.req_header();
        let accept = header.headers.get("accept").and_then(|v| v.to_str().ok());
        let accept_encoding = header.headers.get("accept-encoding").and_then(|v| v.to_str().ok());
        let mut key = CacheKey::default(header);
        key.set_variance_key(vary_string(accept, accept_encoding));
        Ok(key)
    }

    fn response_cache_filter(
        &self,
        _session: &Session,
        resp: &ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<RespCacheable> {
        let Some(resolved) = ctx.resolved.as_ref() else {
            return Ok(RespCacheable::Uncacheable(NoCacheReason::Custom("no resolved target")));
        };
        let content_length = resp
            .headers
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let extension = resolved
            .upstream_url
            .path()
            .rsplit('/')
            .next()
            .and_then(|seg| seg.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());
        let cache_control = resp.headers.get("cache-control").and_then(|v| v.to_str().ok());
        let vary = resp.headers.get("vary").and_then(|v| v.to_str().ok());
        let content_range = resp
            .headers
            .get(http::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok());

        let facts = ResponseFacts {
            method: CacheMethod::Get,
            status: resp.status.as_u16(),
            extension: extension.as_deref(),
            content_length,
            cache_control,
            vary,
            full_range: is_full_content_range(content_range),
        };
        if is_cacheable(&resolved.cache_policy, &facts) {
            Ok(RespCacheable::Cacheable(pingora::cache::CacheMeta::new(
                std::time::SystemTime::now() + Duration::from_secs(resolved.cache_policy.ttl_seconds.max(0) as u64),
                std::time::SystemTime::now(),
                0,
                0,
                resp.clone(),
            )))
        } else {
            Ok(RespCacheable::Uncacheable(NoCacheReason::Custom("ineligible per policy")))
        }
    }

    fn fail_to_connect(
        &self,
        _session: &mut Session,
        _peer: &HttpPeer,
        ctx: &mut Self::CTX,
        mut e: Box<Error>,
    ) -> Box<Error> {
        if ctx.proxy_retry >= 1 {
            return e;
        }
        ctx.proxy_retry += 1;
        e.set_retry(true);
        e
    }

    async fn logging(&self, session: &mut Session, _e: Option<&Error>, ctx: &mut Self::CTX) {
        if ctx.short_circuited {
            return;
        }
        let status = session
            .response_written()
            .map_or(0, |resp| resp.status.as_u16());
        let bytes = session.body_bytes_sent() as u64;
        let latency_ns = ctx.request_start.elapsed().as_nanos() as u64;

        // pingora's `HttpCache` tracks hit/miss internally; surface it into
        // our own accounting rather than re-deriving it (spec.md §4.3
        // "Cache metrics contract": hits always pass bytes_saved =
        // entry.size, misses pass 0).
        if session.cache.enabled() {
            if session.cache.cache_hit() {
                ctx.cache_outcome = CacheOutcome::Hit;
                ctx.bytes_saved = bytes;
            } else {
                ctx.cache_outcome = CacheOutcome::Miss;
            }
        }
        let prefix = ctx
            .resolved
            .as_ref()
            .map(|r| r.matched_prefix.clone())
            .unwrap_or_else(|| "/".to_string());
        let ip = ctx.client_ip.unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));

        self.metrics
            .record(&prefix, status, latency_ns, bytes, ip, ctx.cache_outcome, ctx.bytes_saved)
            .await;
        self.security.observe(ip, status);
    }
}
