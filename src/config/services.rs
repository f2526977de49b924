//! Backend service table.
//!
//! The set of logical services is closed: adding or removing a backend is a
//! change to [`Service`], visible at compile time wherever services are matched.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::config::env::EnvReader;

/// A logical backend service fronted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    Auth,
    Directory,
    Production,
    Nutrition,
    Protection,
    Warehouse,
    Payroll,
    Sales,
    Lighting,
    Reporting,
    Minio,
}

impl Service {
    /// Number of logical services.
    pub const COUNT: usize = 11;

    /// Every service, in table order.
    pub const ALL: [Service; Self::COUNT] = [
        Service::Auth,
        Service::Directory,
        Service::Production,
        Service::Nutrition,
        Service::Protection,
        Service::Warehouse,
        Service::Payroll,
        Service::Sales,
        Service::Lighting,
        Service::Reporting,
        Service::Minio,
    ];

    /// Path segment used for routing (`/api/<slug>/...`) and in logs.
    pub const fn slug(self) -> &'static str {
        match self {
            Service::Auth => "auth",
            Service::Directory => "directory",
            Service::Production => "production",
            Service::Nutrition => "nutrition",
            Service::Protection => "protection",
            Service::Warehouse => "warehouse",
            Service::Payroll => "payroll",
            Service::Sales => "sales",
            Service::Lighting => "lighting",
            Service::Reporting => "reporting",
            Service::Minio => "minio",
        }
    }

    /// Environment suffix holding this service's address.
    pub const fn env_suffix(self) -> &'static str {
        match self {
            Service::Auth => "SERVICE_AUTH",
            Service::Directory => "SERVICE_DIRECTORY",
            Service::Production => "SERVICE_PRODUCTION",
            Service::Nutrition => "SERVICE_NUTRITION",
            Service::Protection => "SERVICE_PROTECTION",
            Service::Warehouse => "SERVICE_WAREHOUSE",
            Service::Payroll => "SERVICE_PAYROLL",
            Service::Sales => "SERVICE_SALES",
            Service::Lighting => "SERVICE_LIGHTING",
            Service::Reporting => "SERVICE_REPORTING",
            Service::Minio => "SERVICE_MINIO",
        }
    }

    /// Whether requests to this service must carry a verified token.
    ///
    /// The authentication service issues tokens, so its routes accept
    /// anonymous callers.
    pub const fn requires_token(self) -> bool {
        !matches!(self, Service::Auth)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Addresses of the backend services. `None` means "not configured".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceTable {
    addresses: [Option<String>; Service::COUNT],
}

impl ServiceTable {
    pub(crate) fn from_reader(reader: &EnvReader<'_>) -> Self {
        let mut table = Self::default();
        for service in Service::ALL {
            let address = reader.string_value(service.env_suffix(), "");
            let address = address.trim();
            if !address.is_empty() {
                table.set(service, address);
            }
        }
        table
    }

    /// Address configured for `service`, if any.
    pub fn address(&self, service: Service) -> Option<&str> {
        self.addresses[service.index()].as_deref()
    }

    /// Set (or replace) the address of `service`.
    pub fn set(&mut self, service: Service, address: impl Into<String>) {
        self.addresses[service.index()] = Some(address.into());
    }

    /// Services with an address, paired with it.
    pub fn configured(&self) -> impl Iterator<Item = (Service, &str)> + '_ {
        Service::ALL
            .into_iter()
            .filter_map(|service| self.address(service).map(|addr| (service, addr)))
    }
}

impl Serialize for ServiceTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Service::COUNT))?;
        for service in Service::ALL {
            map.serialize_entry(service.slug(), &self.address(service))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_index_order() {
        for (i, service) in Service::ALL.into_iter().enumerate() {
            assert_eq!(service.index(), i);
        }
    }

    #[test]
    fn test_configured_skips_missing() {
        let mut table = ServiceTable::default();
        table.set(Service::Sales, "sales:9000");
        table.set(Service::Minio, "http://minio:9000");

        let configured: Vec<_> = table.configured().collect();
        assert_eq!(
            configured,
            vec![(Service::Sales, "sales:9000"), (Service::Minio, "http://minio:9000")]
        );
        assert_eq!(table.address(Service::Production), None);
    }

    #[test]
    fn test_only_auth_is_anonymous() {
        for service in Service::ALL {
            assert_eq!(service.requires_token(), service != Service::Auth);
        }
    }
}
