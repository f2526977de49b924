//! Upstream address resolution.
//!
//! # Responsibilities
//! - Parse a service table entry (`host:port` or `http://host:port/base`)
//! - Build the backend URI for a forwarded request
//!
//! # Design Decisions
//! - Bare `host:port` entries are treated as plain HTTP
//! - Only `http` upstreams are accepted; backends live on the internal network
//! - A base path in the address is prepended to every forwarded path

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::uri::{Authority, Scheme};
use axum::http::Uri;
use thiserror::Error;
use url::Url;

use crate::config::{Service, ServiceTable};

/// Error raised when a service address cannot be used as an upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported scheme {0:?}, only http is supported")]
    UnsupportedScheme(String),

    #[error("address has no host")]
    MissingHost,

    #[error("address must not carry a query or fragment")]
    UnexpectedSuffix,

    #[error("cannot build backend URI: {0}")]
    InvalidUri(String),
}

/// A resolved backend base address.
#[derive(Debug, Clone)]
pub struct Upstream {
    authority: Authority,
    host: String,
    port: u16,
    base_path: String,
}

impl Upstream {
    /// Parse a service table entry.
    pub fn parse(address: &str) -> Result<Self, UpstreamError> {
        let address = address.trim();
        let url = if address.contains("://") {
            Url::parse(address)?
        } else {
            Url::parse(&format!("http://{address}"))?
        };

        if url.scheme() != "http" {
            return Err(UpstreamError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(UpstreamError::UnexpectedSuffix);
        }
        let host = url.host_str().ok_or(UpstreamError::MissingHost)?.to_string();
        let port = url.port_or_known_default().unwrap_or(80);
        let authority = Authority::try_from(format!("{host}:{port}").as_str())
            .map_err(|e| UpstreamError::InvalidUri(e.to_string()))?;

        Ok(Self {
            authority,
            host,
            port,
            base_path: url.path().trim_end_matches('/').to_string(),
        })
    }

    /// `host:port` of the backend.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Host and port for a raw TCP connect.
    pub fn socket_target(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    /// Backend URI for a request whose path below the service prefix is `rest`.
    pub fn uri_for(&self, rest: &str, query: Option<&str>) -> Result<Uri, UpstreamError> {
        let mut path = format!("{}{}", self.base_path, rest);
        if path.is_empty() {
            path.push('/');
        }
        let path_and_query = match query {
            Some(q) => format!("{path}?{q}"),
            None => path,
        };

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| UpstreamError::InvalidUri(e.to_string()))
    }
}

/// A service address that could not be resolved.
#[derive(Debug, Error)]
#[error("service '{service}' has an unusable address: {source}")]
pub struct ResolveError {
    pub service: Service,
    #[source]
    pub source: UpstreamError,
}

/// Resolved upstreams for the configured services.
#[derive(Debug, Clone, Default)]
pub struct UpstreamTable {
    upstreams: BTreeMap<Service, Arc<Upstream>>,
}

impl UpstreamTable {
    /// Parse every configured address. Unconfigured services stay absent.
    pub fn resolve(services: &ServiceTable) -> Result<Self, ResolveError> {
        let mut upstreams = BTreeMap::new();
        for (service, address) in services.configured() {
            let upstream =
                Upstream::parse(address).map_err(|source| ResolveError { service, source })?;
            upstreams.insert(service, Arc::new(upstream));
        }
        Ok(Self { upstreams })
    }

    pub fn get(&self, service: Service) -> Option<Arc<Upstream>> {
        self.upstreams.get(&service).cloned()
    }

    /// Configured services in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Service, &Arc<Upstream>)> + '_ {
        self.upstreams.iter().map(|(service, upstream)| (*service, upstream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_port() {
        let upstream = Upstream::parse("production:8081").unwrap();
        assert_eq!(upstream.authority().as_str(), "production:8081");
        assert_eq!(upstream.socket_target(), ("production", 8081));

        let uri = upstream.uri_for("/harvests/7", Some("year=2024")).unwrap();
        assert_eq!(uri.to_string(), "http://production:8081/harvests/7?year=2024");
    }

    #[test]
    fn test_url_with_base_path() {
        let upstream = Upstream::parse("http://10.0.0.5:9000/api/v2/").unwrap();
        assert_eq!(
            upstream.uri_for("/stock", None).unwrap().to_string(),
            "http://10.0.0.5:9000/api/v2/stock"
        );
        assert_eq!(
            upstream.uri_for("", None).unwrap().to_string(),
            "http://10.0.0.5:9000/api/v2"
        );
    }

    #[test]
    fn test_default_port_and_root_path() {
        let upstream = Upstream::parse("http://reporting").unwrap();
        assert_eq!(upstream.socket_target(), ("reporting", 80));
        assert_eq!(upstream.uri_for("", None).unwrap().to_string(), "http://reporting:80/");
    }

    #[test]
    fn test_rejects_unusable_addresses() {
        assert!(matches!(
            Upstream::parse("https://auth:443"),
            Err(UpstreamError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Upstream::parse("http://sales:80/?x=1"),
            Err(UpstreamError::UnexpectedSuffix)
        ));
        assert!(Upstream::parse("http://").is_err());
        assert!(Upstream::parse("bad host:80").is_err());
    }

    #[test]
    fn test_table_resolves_configured_services_only() {
        let mut services = ServiceTable::default();
        services.set(Service::Warehouse, "warehouse:8085");
        services.set(Service::Auth, "http://auth:8080/v1");

        let table = UpstreamTable::resolve(&services).unwrap();
        assert!(table.get(Service::Production).is_none());
        let order: Vec<Service> = table.iter().map(|(service, _)| service).collect();
        assert_eq!(order, vec![Service::Auth, Service::Warehouse]);
    }

    #[test]
    fn test_table_names_the_broken_service() {
        let mut services = ServiceTable::default();
        services.set(Service::Lighting, "ftp://lights:21");

        let err = UpstreamTable::resolve(&services).unwrap_err();
        assert_eq!(err.service, Service::Lighting);
        assert!(err.to_string().starts_with("service 'lighting'"));
    }
}
