use std::io;
use std::net::SocketAddr;

use aguada_api::MacAddress;
use aguada_embedded::RadioLink;
use tokio::net::UdpSocket;

/// Node end of the UDP-carried radio link.
///
/// Every frame goes to the configured target whatever link-layer destination the agent
/// asks for; use a broadcast target to reach collectors the way the radio would.
pub struct UdpRadio {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpRadio {
    pub async fn bind(target: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(local).await?;
        socket.set_broadcast(true)?;

        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl RadioLink for UdpRadio {
    type Error = io::Error;

    async fn send(&mut self, destination: MacAddress, frame: &[u8]) -> Result<(), Self::Error> {
        let sent = self.socket.send_to(frame, self.target).await?;
        tracing::trace!(%destination, target = %self.target, sent, "Frame sent");

        Ok(())
    }
}
