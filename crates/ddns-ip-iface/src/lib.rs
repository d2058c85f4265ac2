// # Interface Address Source
//
// Reads the addresses bound to one network interface from the kernel over
// rtnetlink: an RTM_GETLINK dump finds the interface index, an RTM_GETADDR
// dump lists the addresses carrying it.
//
// ## Semantics
//
// - An interface that does not exist is an error (`InterfaceNotFound`)
// - An interface that exists without addresses yields an empty result
// - Addresses keep the order the kernel reports them in
//
// ## Platform Support
//
// Linux only. Other platforms report an address discovery error on every call.

use async_trait::async_trait;
use ddns_core::traits::{AddressSource, DiscoveredAddresses};
use ddns_core::{Error, Result};
use std::net::IpAddr;
use tracing::debug;

/// Address source backed by the local interface table
#[derive(Debug, Clone)]
pub struct InterfaceAddressSource {
    interface: String,
}

impl InterfaceAddressSource {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }
}

#[async_trait]
impl AddressSource for InterfaceAddressSource {
    async fn discover(&self) -> Result<DiscoveredAddresses> {
        let name = self.interface.clone();
        let lookup = tokio::task::spawn_blocking(move || interface_addresses(&name))
            .await
            .map_err(|e| Error::address_discovery(format!("lookup task failed: {}", e)))?;

        let addresses = lookup?.ok_or_else(|| Error::interface_not_found(self.interface.clone()))?;
        debug!(
            interface = %self.interface,
            count = addresses.len(),
            "Read interface addresses"
        );
        Ok(DiscoveredAddresses::classify(
            addresses.iter().map(IpAddr::to_string),
        ))
    }

    fn interface(&self) -> &str {
        &self.interface
    }
}

/// Addresses of `name`, or `None` when no such interface exists
#[cfg(target_os = "linux")]
pub fn interface_addresses(name: &str) -> Result<Option<Vec<IpAddr>>> {
    netlink::interface_addresses(name)
}

#[cfg(not(target_os = "linux"))]
pub fn interface_addresses(_name: &str) -> Result<Option<Vec<IpAddr>>> {
    Err(Error::address_discovery(
        "interface discovery is only supported on Linux",
    ))
}

#[cfg(target_os = "linux")]
mod netlink {
    use ddns_core::{Error, Result};
    use netlink_packet_core::{
        NLM_F_DUMP, NLM_F_REQUEST, NetlinkHeader, NetlinkMessage, NetlinkPayload,
    };
    use netlink_packet_route::address::nlas::Nla as AddressNla;
    use netlink_packet_route::link::nlas::Nla as LinkNla;
    use netlink_packet_route::{AddressMessage, LinkMessage, RtnlMessage};
    use netlink_sys::protocols::NETLINK_ROUTE;
    use netlink_sys::{Socket, SocketAddr};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    const RECV_BUFFER: usize = 1 << 16;

    pub fn interface_addresses(name: &str) -> Result<Option<Vec<IpAddr>>> {
        let socket = open()?;

        let index = dump(&socket, RtnlMessage::GetLink(LinkMessage::default()))?
            .into_iter()
            .find_map(|message| match message {
                RtnlMessage::NewLink(link) if has_name(&link, name) => Some(link.header.index),
                _ => None,
            });
        let Some(index) = index else {
            return Ok(None);
        };

        let addresses = dump(&socket, RtnlMessage::GetAddress(AddressMessage::default()))?
            .into_iter()
            .filter_map(|message| match message {
                RtnlMessage::NewAddress(address) if address.header.index == index => {
                    local_address(&address)
                }
                _ => None,
            })
            .collect();
        Ok(Some(addresses))
    }

    fn open() -> Result<Socket> {
        let mut socket = Socket::new(NETLINK_ROUTE).map_err(netlink_error)?;
        socket.bind_auto().map_err(netlink_error)?;
        socket.connect(&SocketAddr::new(0, 0)).map_err(netlink_error)?;
        Ok(socket)
    }

    /// Send a dump request and collect every reply up to NLMSG_DONE
    fn dump(socket: &Socket, request: RtnlMessage) -> Result<Vec<RtnlMessage>> {
        let mut header = NetlinkHeader::default();
        header.flags = NLM_F_DUMP | NLM_F_REQUEST;
        let mut packet = NetlinkMessage::new(header, NetlinkPayload::from(request));
        packet.finalize();
        let mut buf = vec![0u8; packet.buffer_len()];
        packet.serialize(&mut buf[..]);
        socket.send(&buf, 0).map_err(netlink_error)?;

        let mut replies = Vec::new();
        let mut receive = vec![0u8; RECV_BUFFER];
        loop {
            let size = socket.recv(&mut &mut receive[..], 0).map_err(netlink_error)?;
            let mut offset = 0;
            while offset < size {
                let reply = NetlinkMessage::<RtnlMessage>::deserialize(&receive[offset..size])
                    .map_err(|e| Error::address_discovery(format!("netlink decode: {}", e)))?;
                let length = reply.header.length as usize;
                match reply.payload {
                    NetlinkPayload::Done(_) => return Ok(replies),
                    NetlinkPayload::Error(err) => {
                        return Err(Error::address_discovery(format!("netlink dump: {:?}", err)));
                    }
                    NetlinkPayload::InnerMessage(message) => replies.push(message),
                    _ => {}
                }
                if length == 0 {
                    break;
                }
                offset += length;
            }
        }
    }

    fn has_name(link: &LinkMessage, name: &str) -> bool {
        link.nlas
            .iter()
            .any(|nla| matches!(nla, LinkNla::IfName(ifname) if ifname == name))
    }

    /// IFA_LOCAL when present: on point-to-point links IFA_ADDRESS is the peer
    fn local_address(address: &AddressMessage) -> Option<IpAddr> {
        let local = address.nlas.iter().find_map(|nla| match nla {
            AddressNla::Local(bytes) => Some(bytes),
            _ => None,
        });
        let peer = address.nlas.iter().find_map(|nla| match nla {
            AddressNla::Address(bytes) => Some(bytes),
            _ => None,
        });
        local.or(peer).and_then(|bytes| ip_from_bytes(bytes))
    }

    pub(crate) fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
        if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        } else if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        } else {
            None
        }
    }

    fn netlink_error(err: std::io::Error) -> Error {
        Error::address_discovery(format!("netlink: {}", err))
    }
}
