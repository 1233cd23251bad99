//! UPnP IGD client adapter: gateway discovery and port-mapping enumeration
//! via the `igd` crate. No UPnP/SSDP/SOAP wire protocol lives here.

use igd::{GetGenericPortMappingEntryError, PortMappingEntry, PortMappingProtocol, SearchOptions};
use monitor_core::{GatewayClient, Protocol, Redirection};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// No IGD answered the SSDP search, or the search itself failed.
    #[error("gateway discovery failed: {0}")]
    Discovery(#[from] igd::SearchError),
    #[error("failed to read mapping table: {0}")]
    Enumeration(#[from] igd::GetGenericPortMappingEntryError),
    #[error("failed to query external address: {0}")]
    ExternalIp(#[from] igd::GetExternalIpError),
}

/// A discovered and selected gateway.
pub struct IgdGateway {
    inner: igd::Gateway,
}

/// Search the local network for an IGD and select the first responder.
/// `delay` caps how long the SSDP search waits for answers.
pub fn discover(delay: Duration) -> Result<IgdGateway, GatewayError> {
    let inner = igd::search_gateway(SearchOptions { timeout: Some(delay), ..Default::default() })?;
    Ok(IgdGateway { inner })
}

impl IgdGateway {
    /// Socket address of the selected device.
    pub fn addr(&self) -> SocketAddrV4 {
        self.inner.addr
    }

    /// Root URL of the selected device's description document.
    pub fn root_url(&self) -> &str {
        &self.inner.root_url
    }

    pub fn external_ip(&self) -> Result<Ipv4Addr, GatewayError> {
        Ok(self.inner.get_external_ip()?)
    }

    /// Drain the index-based mapping enumeration to completion. Devices signal
    /// the end of the table with error 713 (SpecifiedArrayIndexInvalid); any
    /// other enumeration failure propagates.
    pub fn mappings(&self) -> Result<Vec<Redirection>, GatewayError> {
        let mut table = Vec::new();
        for index in 0u32.. {
            match self.inner.get_generic_port_mapping_entry(index) {
                Ok(entry) => table.push(to_redirection(entry)),
                Err(GetGenericPortMappingEntryError::SpecifiedArrayIndexInvalid) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(table)
    }
}

impl GatewayClient for IgdGateway {
    fn redirections(&mut self) -> anyhow::Result<Vec<Redirection>> {
        Ok(self.mappings()?)
    }
}

/// Convert one raw enumeration entry into a record. The enabled flag and
/// lease duration are not part of the record.
fn to_redirection(entry: PortMappingEntry) -> Redirection {
    Redirection {
        protocol: match entry.protocol {
            PortMappingProtocol::TCP => Protocol::TCP,
            PortMappingProtocol::UDP => Protocol::UDP,
        },
        host_ip: entry.internal_client.to_string(),
        host_port: entry.internal_port,
        remote_host: entry.remote_host,
        remote_port: entry.external_port,
        description: entry.port_mapping_description,
    }
}
