use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION, REFERER};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::{Client, Url, redirect};
use thiserror::Error;
use tracing::debug;

use crate::config::IngestConfig;

const MAX_REDIRECTS: usize = 5;

/// One outbound GET.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a Url,
    pub accept: &'static str,
    pub referer: Option<&'a Url>,
    /// Reading stops with [`FetchError::TooLarge`] once the body exceeds this.
    pub max_bytes: u64,
}

/// A completed GET. The body is only read for success statuses.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub reason: String,
    pub content_type: Option<String>,
    /// Final URL after redirects.
    pub url: Url,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("refusing to fetch non-public address {0}")]
    BlockedAddress(IpAddr),
    #[error("too many redirects")]
    TooManyRedirects,
    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("{0}")]
    Http(#[from] reqwest::Error),
}

/// Outbound HTTP used by the ingestion pipeline.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchResponse, FetchError>;
}

/// Decides whether an address may be connected to.
pub type AddressPolicy = fn(IpAddr) -> bool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Raised from inside the client's resolver when every address of a host is
/// refused by the policy.
#[derive(Debug, Error)]
#[error("refusing to connect to non-public address {0}")]
struct RefusedAddress(IpAddr);

/// DNS resolver that only hands the connector addresses the policy accepts,
/// so the address checked is the address connected to.
struct GuardedResolver {
    policy: AddressPolicy,
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_guarded(name.as_str().to_string(), self.policy))
    }
}

async fn resolve_guarded(host: String, policy: AddressPolicy) -> Result<Addrs, BoxError> {
    let resolved: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await?
        .collect();
    let allowed: Vec<SocketAddr> = resolved
        .iter()
        .copied()
        .filter(|addr| policy(addr.ip()))
        .collect();

    if allowed.is_empty() {
        let err: BoxError = match resolved.first() {
            Some(addr) => Box::new(RefusedAddress(addr.ip())),
            None => format!("no addresses found for '{host}'").into(),
        };
        return Err(err);
    }
    if allowed.len() < resolved.len() {
        debug!(%host, "Dropped non-public addresses from resolution");
    }
    let addrs: Addrs = Box::new(allowed.into_iter());
    Ok(addrs)
}

/// `reqwest`-backed fetcher that follows redirects itself so every hop passes
/// the address guard. Host names are resolved by a [`GuardedResolver`]; IP
/// literals never reach a resolver and are checked before the request.
pub struct ReqwestFetcher {
    client: Client,
    policy: AddressPolicy,
}

impl ReqwestFetcher {
    pub fn new(config: &IngestConfig) -> Result<Self, reqwest::Error> {
        let policy: AddressPolicy = if config.allow_private_networks {
            |_| true
        } else {
            is_public
        };
        Self::with_policy(config, policy)
    }

    pub fn with_policy(
        config: &IngestConfig,
        policy: AddressPolicy,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(redirect::Policy::none())
            .no_proxy()
            .dns_resolver(Arc::new(GuardedResolver { policy }))
            .build()?;

        Ok(Self { client, policy })
    }

    fn check_target(&self, url: &Url) -> Result<(), FetchError> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }

        let host = url.host_str().ok_or(FetchError::MissingHost)?;
        let literal = host.trim_start_matches('[').trim_end_matches(']');
        match literal.parse::<IpAddr>() {
            Ok(ip) if !(self.policy)(ip) => Err(FetchError::BlockedAddress(ip)),
            _ => Ok(()),
        }
    }

    async fn read_body(
        mut response: reqwest::Response,
        max_bytes: u64,
    ) -> Result<Vec<u8>, FetchError> {
        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(FetchError::TooLarge { limit: max_bytes });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > max_bytes {
                return Err(FetchError::TooLarge { limit: max_bytes });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchResponse, FetchError> {
        let mut url = request.url.clone();

        for _ in 0..=MAX_REDIRECTS {
            self.check_target(&url)?;

            let mut builder = self.client.get(url.clone()).header(ACCEPT, request.accept);
            if let Some(referer) = request.referer {
                builder = builder.header(REFERER, referer.as_str());
            }
            let response = builder.send().await.map_err(classify_send_error)?;
            let status = response.status();

            if status.is_redirection()
                && let Some(next) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|location| url.join(location).ok())
            {
                debug!(from = %url, to = %next, "Following redirect");
                url = next;
                continue;
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let reason = status.canonical_reason().unwrap_or_default().to_string();

            let body = if status.is_success() {
                Self::read_body(response, request.max_bytes).await?
            } else {
                Vec::new()
            };

            return Ok(FetchResponse {
                status: status.as_u16(),
                reason,
                content_type,
                url,
                body,
            });
        }

        Err(FetchError::TooManyRedirects)
    }
}

/// Surface a refusal from the resolver as [`FetchError::BlockedAddress`].
fn classify_send_error(err: reqwest::Error) -> FetchError {
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(refused) = cause.downcast_ref::<RefusedAddress>() {
            return FetchError::BlockedAddress(refused.0);
        }
        source = cause.source();
    }
    FetchError::Http(err)
}

/// False for loopback, private, link-local, shared (CGNAT), documentation,
/// multicast and unspecified addresses.
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    let shared = a == 100 && (64..128).contains(&b);
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || a == 0
        || shared)
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = first & 0xfe00 == 0xfc00;
    let link_local = first & 0xffc0 == 0xfe80;
    let documentation = first == 0x2001 && ip.segments()[1] == 0x0db8;
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || unique_local
        || link_local
        || documentation)
}
