use std::io;
use std::net::SocketAddr;

use aguada_embedded::{RadioReceiver, RxMetadata};
use tokio::net::UdpSocket;

use crate::configs::Radio;

/// Collector end of the UDP-carried radio link.
///
/// Datagrams carry no link quality, so every frame is reported with signal strength 0.
pub struct UdpReceiver {
    socket: UdpSocket,
}

impl UdpReceiver {
    pub async fn bind(radio: &Radio) -> io::Result<Self> {
        let socket = UdpSocket::bind((radio.bind_host.as_str(), radio.port())).await?;
        socket.set_broadcast(true)?;

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl RadioReceiver for UdpReceiver {
    type Error = io::Error;

    async fn receive(&mut self, buffer: &mut [u8]) -> Result<(usize, RxMetadata), Self::Error> {
        let (len, peer) = self.socket.recv_from(buffer).await?;
        tracing::trace!(%peer, len, "Datagram received");

        Ok((len, RxMetadata::new(None, 0)))
    }
}
