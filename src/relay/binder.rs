//! Platform socket binders
//!
//! A relay must be able to rebind its port right after the previous session
//! on that port closed. On unix that needs `SO_REUSEADDR`, otherwise
//! connections lingering in `TIME_WAIT` block the bind. Windows does not
//! hold listeners back this way, and `SO_REUSEADDR` there would let another
//! socket steal the port, so its binder leaves it off.

use std::io;
use std::net::{SocketAddr, TcpListener};

use socket2::{Domain, Protocol, Socket, Type};

/// OS-specific listener creation
pub trait SocketBinder: Send + Sync + 'static {
    /// Bind and listen on `addr`, returning a non-blocking listener
    fn bind(&self, addr: SocketAddr, backlog: i32) -> io::Result<TcpListener>;
}

fn listen(socket: Socket, addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Unix binder with address reuse
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ReuseAddrBinder;

#[cfg(unix)]
impl SocketBinder for ReuseAddrBinder {
    fn bind(&self, addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        listen(socket, addr, backlog)
    }
}

/// Windows binder
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ExclusiveBinder;

#[cfg(windows)]
impl SocketBinder for ExclusiveBinder {
    fn bind(&self, addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        listen(socket, addr, backlog)
    }
}

/// Binder for the compilation target
#[cfg(unix)]
pub type PlatformBinder = ReuseAddrBinder;

/// Binder for the compilation target
#[cfg(windows)]
pub type PlatformBinder = ExclusiveBinder;
