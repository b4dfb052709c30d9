//! Header policy for plain (non-cached) proxying (spec.md §4.2 "PROXY with
//! cache disabled").

/// Hop-by-hop headers stripped before forwarding upstream, case-insensitive.
pub const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailers",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Whether an inbound `X-Forwarded-For` should be dropped (spec.md §4.2:
/// "drop inbound X-Forwarded-For unless the ingress is trusted").
pub fn should_drop_inbound_xff(ingress_trusted: bool) -> bool {
    !ingress_trusted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_is_case_insensitive() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("TRANSFER-ENCODING"));
        assert!(!is_hop_by_hop("Accept"));
    }

    #[test]
    fn untrusted_ingress_drops_xff() {
        assert!(should_drop_inbound_xff(false));
        assert!(!should_drop_inbound_xff(true));
    }
}
