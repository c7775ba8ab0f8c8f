//! Non-blocking socket abstraction. Every I/O method returns
//! [`nb::Result`] so the caller's run loop can poll this alongside timers
//! without a thread per connection or an async runtime.

use std::io;
use std::net::SocketAddr;

/// A datagram or stream socket that never blocks the caller.
pub trait Socket {
  /// Send a datagram (UDP) or write bytes (TCP) to `addr`. For a
  /// connection-oriented socket `addr` is typically ignored in favor of
  /// whatever `connect` was last called with.
  fn send(&mut self, addr: SocketAddr, data: &[u8]) -> nb::Result<usize, io::Error>;

  /// Receive a datagram or read available bytes into `buf`.
  fn recv(&mut self, buf: &mut [u8]) -> nb::Result<(usize, SocketAddr), io::Error>;

  /// Begin (or continue) connecting to `addr`. Repeated calls while
  /// `WouldBlock` is returned complete the handshake.
  fn connect(&mut self, addr: SocketAddr) -> nb::Result<(), io::Error>;

  /// Tear down the socket.
  fn close(&mut self) -> io::Result<()>;
}

/// A [`Socket`] backed by `std::net::UdpSocket`, set non-blocking at
/// construction.
#[derive(Debug)]
pub struct UdpSocket {
  inner: std::net::UdpSocket,
  peer: Option<SocketAddr>,
}

impl UdpSocket {
  pub fn bind(addr: SocketAddr) -> io::Result<Self> {
    let inner = std::net::UdpSocket::bind(addr)?;
    inner.set_nonblocking(true)?;
    Ok(Self { inner, peer: None })
  }
}

fn to_nb(e: io::Error) -> nb::Error<io::Error> {
  if e.kind() == io::ErrorKind::WouldBlock {
    nb::Error::WouldBlock
  } else {
    nb::Error::Other(e)
  }
}

impl Socket for UdpSocket {
  fn send(&mut self, addr: SocketAddr, data: &[u8]) -> nb::Result<usize, io::Error> {
    self.inner.send_to(data, addr).map_err(to_nb)
  }

  fn recv(&mut self, buf: &mut [u8]) -> nb::Result<(usize, SocketAddr), io::Error> {
    self.inner.recv_from(buf).map_err(to_nb)
  }

  fn connect(&mut self, addr: SocketAddr) -> nb::Result<(), io::Error> {
    self.inner.connect(addr).map_err(to_nb)?;
    self.peer = Some(addr);
    Ok(())
  }

  fn close(&mut self) -> io::Result<()> {
    self.peer = None;
    Ok(())
  }
}

/// A [`Socket`] backed by `std::net::TcpStream`, used for both the CoAP
/// transport itself and its CSM handshake.
#[derive(Debug)]
pub struct TcpSocket {
  inner: Option<std::net::TcpStream>,
}

impl TcpSocket {
  pub fn new() -> Self {
    Self { inner: None }
  }
}

impl Default for TcpSocket {
  fn default() -> Self {
    Self::new()
  }
}

impl Socket for TcpSocket {
  fn send(&mut self, _addr: SocketAddr, data: &[u8]) -> nb::Result<usize, io::Error> {
    use std::io::Write;
    let stream =
      self.inner.as_mut().ok_or_else(|| nb::Error::Other(io::Error::from(io::ErrorKind::NotConnected)))?;
    stream.write(data).map_err(to_nb)
  }

  fn recv(&mut self, buf: &mut [u8]) -> nb::Result<(usize, SocketAddr), io::Error> {
    use std::io::Read;
    let stream =
      self.inner.as_mut().ok_or_else(|| nb::Error::Other(io::Error::from(io::ErrorKind::NotConnected)))?;
    let peer = stream.peer_addr().map_err(to_nb)?;
    let n = stream.read(buf).map_err(to_nb)?;
    Ok((n, peer))
  }

  fn connect(&mut self, addr: SocketAddr) -> nb::Result<(), io::Error> {
    if self.inner.is_none() {
      let stream = std::net::TcpStream::connect(addr).map_err(to_nb)?;
      stream.set_nonblocking(true).map_err(to_nb)?;
      self.inner = Some(stream);
    }
    Ok(())
  }

  fn close(&mut self) -> io::Result<()> {
    self.inner = None;
    Ok(())
  }
}
