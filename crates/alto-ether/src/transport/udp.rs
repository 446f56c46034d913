// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP relay speaking the emulator datagram format.
//!
//! # Datagram format
//!
//! ```text
//! +--------+--------+------------------------------+
//! | word count (BE) | payload, 2 * count bytes     |
//! +--------+--------+------------------------------+
//! ```
//!
//! The Ethernet CRC never travels over UDP: it is stripped from frames
//! leaving the Alto and recomputed for frames going to it.

use crate::codec::Frame;
use crate::config::{UDP_HEADER_LEN, UDP_RECV_PORT, UDP_SEND_PORT};
use crate::error::DatagramError;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

/// Largest datagram the relay reads in one go.
pub const MAX_DATAGRAM_LEN: usize = 64 * 1024;

/// Datagram carrying `frame`'s payload (CRC stripped).
pub fn wrap_frame(frame: &Frame) -> Vec<u8> {
    let payload = frame.payload();
    let words = (payload.len() / 2) as u16;
    let mut datagram = Vec::with_capacity(UDP_HEADER_LEN + payload.len());
    datagram.extend_from_slice(&words.to_be_bytes());
    datagram.extend_from_slice(payload);
    datagram
}

/// Payload declared by a datagram's header. Bytes past the declared
/// length are ignored.
pub fn unwrap_datagram(datagram: &[u8]) -> Result<&[u8], DatagramError> {
    if datagram.len() < UDP_HEADER_LEN {
        return Err(DatagramError::MissingHeader {
            len: datagram.len(),
        });
    }
    let words = u16::from_be_bytes([datagram[0], datagram[1]]) as usize;
    let body = &datagram[UDP_HEADER_LEN..];
    body.get(..words * 2).ok_or(DatagramError::Truncated {
        words,
        available: body.len(),
    })
}

/// Addresses the relay binds to and sends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Where datagrams for the Alto arrive.
    pub bind: SocketAddr,
    /// Where frames from the Alto go.
    pub destination: SocketAddr,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, UDP_RECV_PORT)),
            destination: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, UDP_SEND_PORT)),
        }
    }
}

/// Receive socket (polled) plus broadcast send socket.
pub struct UdpRelay {
    recv: mio::net::UdpSocket,
    send: UdpSocket,
    destination: SocketAddr,
}

impl UdpRelay {
    pub fn bind(config: &RelayConfig) -> io::Result<Self> {
        let domain = Domain::for_address(config.bind);
        let recv = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        recv.set_reuse_address(true)?;
        recv.set_broadcast(true)?;
        recv.bind(&config.bind.into())?;
        recv.set_nonblocking(true)?;
        let recv: UdpSocket = recv.into();
        log::info!("[UDP] listening on {}", recv.local_addr()?);

        let send = Socket::new(
            Domain::for_address(config.destination),
            Type::DGRAM,
            Some(Protocol::UDP),
        )?;
        send.set_broadcast(true)?;
        let send: UdpSocket = send.into();
        log::info!("[UDP] sending to {}", config.destination);

        Ok(Self {
            recv: mio::net::UdpSocket::from_std(recv),
            send,
            destination: config.destination,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.recv.local_addr()
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Pollable receive socket.
    pub fn source_mut(&mut self) -> &mut mio::net::UdpSocket {
        &mut self.recv
    }

    /// Read one pending datagram into `buf`; `None` when nothing is queued.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        loop {
            match self.recv.recv_from(buf) {
                Ok(got) => return Ok(Some(got)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Send `frame` (CRC stripped) to the destination.
    pub fn send_frame(&self, frame: &Frame) -> io::Result<usize> {
        let datagram = wrap_frame(frame);
        let sent = self.send.send_to(&datagram, self.destination)?;
        log::debug!(
            "[UDP] sent {} words to {}",
            frame.word_count(),
            self.destination
        );
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use std::time::Duration;

    #[test]
    fn test_wrap_frame_strips_crc() {
        let frame = encode(&[0x42, 0x43, 0x01, 0xC0]).unwrap();
        assert_eq!(wrap_frame(&frame), vec![0x00, 0x02, 0x42, 0x43, 0x01, 0xC0]);
    }

    #[test]
    fn test_unwrap_ignores_trailing_bytes() {
        let datagram = [0x00, 0x01, 0xAB, 0xCD, 0xEE];
        assert_eq!(unwrap_datagram(&datagram).unwrap(), &[0xAB, 0xCD]);
    }

    #[test]
    fn test_unwrap_zero_words() {
        assert_eq!(unwrap_datagram(&[0x00, 0x00]).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_unwrap_errors() {
        assert_eq!(
            unwrap_datagram(&[0x00]),
            Err(DatagramError::MissingHeader { len: 1 })
        );
        assert_eq!(
            unwrap_datagram(&[0x00, 0x03, 1, 2, 3, 4]),
            Err(DatagramError::Truncated {
                words: 3,
                available: 4
            })
        );
    }

    #[test]
    fn test_default_addresses() {
        let config = RelayConfig::default();
        assert_eq!(config.bind.port(), UDP_RECV_PORT);
        assert_eq!(config.destination.port(), UDP_SEND_PORT);
        assert_eq!(
            config.destination.ip(),
            std::net::IpAddr::V4(Ipv4Addr::BROADCAST)
        );
    }

    #[test]
    fn test_relay_send_and_receive() {
        let sink = UdpSocket::bind("127.0.0.1:0").unwrap();
        sink.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let relay = UdpRelay::bind(&RelayConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            destination: sink.local_addr().unwrap(),
        })
        .unwrap();

        let frame = encode(&[0x12, 0x34]).unwrap();
        relay.send_frame(&frame).unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = sink.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x00, 0x01, 0x12, 0x34]);

        let mut buf = [0u8; 16];
        assert_eq!(relay.recv(&mut buf).unwrap(), None);

        sink.send_to(&[0x00, 0x00], relay.local_addr().unwrap())
            .unwrap();
        let mut got = None;
        for _ in 0..200 {
            if let Some((n, _)) = relay.recv(&mut buf).unwrap() {
                got = Some(n);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(got, Some(2));
    }
}
