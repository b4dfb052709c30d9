//! Client IP resolution (grounded in the teacher's `glaive/src/request.rs`
//! `RequestProvider::get_client_ip`): `X-Forwarded-For` first, then
//! `X-Real-Ip`, then the socket's remote address — generalized here to a
//! pure function over header values plus the remote address, so it is
//! testable without a live `Session`.

use std::net::IpAddr;

pub fn resolve_client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    remote_addr: Option<IpAddr>,
    ingress_trusted: bool,
) -> Option<IpAddr> {
    if ingress_trusted {
        if let Some(value) = forwarded_for {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return Some(ip);
                }
            }
        }
        if let Some(value) = real_ip {
            if let Ok(ip) = value.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    remote_addr
}
