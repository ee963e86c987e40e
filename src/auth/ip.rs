//! Client address used for post view records and rate-limit keys.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::ConnectInfo,
    http::{Extensions, HeaderMap},
};

use crate::cli::IpExtractor;

/// The client address of a request.
///
/// With a trusted proxy header configured, that header is required and the
/// socket address is never consulted. Without one, the peer address from
/// `ConnectInfo` is used.
pub fn client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    trusted_header: Option<&IpExtractor>,
) -> Result<IpAddr, &'static str> {
    match trusted_header {
        Some(extractor) => extractor.read(headers),
        None => extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(peer)| peer.ip())
            .ok_or("No client IP available"),
    }
}
