//! Thin libc layer shared by the socket implementations
//!
//! Every handle is created non-blocking and close-on-exec. SIGPIPE is
//! suppressed per call (`MSG_NOSIGNAL`) where the platform supports it,
//! otherwise per socket (`SO_NOSIGPIPE`).

use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use sockio_core::{SockError, SockResult};

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        pub(crate) const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
        const CREATE_FLAGS: libc::c_int = libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;

        unsafe fn raw_accept(
            fd: RawFd,
            addr: *mut libc::sockaddr,
            len: *mut libc::socklen_t,
        ) -> libc::c_int {
            libc::accept4(fd, addr, len, CREATE_FLAGS)
        }

        /// Flags were applied at creation
        fn prepare_fd(_fd: RawFd) -> SockResult<()> {
            Ok(())
        }
    } else {
        pub(crate) const SEND_FLAGS: libc::c_int = 0;
        const CREATE_FLAGS: libc::c_int = 0;

        unsafe fn raw_accept(
            fd: RawFd,
            addr: *mut libc::sockaddr,
            len: *mut libc::socklen_t,
        ) -> libc::c_int {
            libc::accept(fd, addr, len)
        }

        /// Finish setting up a handle the kernel handed out without our flags
        fn prepare_fd(fd: RawFd) -> SockResult<()> {
            unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
                    return Err(os_error("fcntl(O_NONBLOCK)"));
                }
                if libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) < 0 {
                    return Err(os_error("fcntl(FD_CLOEXEC)"));
                }
            }
            #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
            set_option(fd, libc::SOL_SOCKET, libc::SO_NOSIGPIPE, 1)?;
            Ok(())
        }
    }
}

#[inline]
pub(crate) fn last_errno() -> Errno {
    Errno::last()
}

#[inline]
pub(crate) fn os_error(context: &str) -> SockError {
    SockError::from_errno(context, last_errno() as i32)
}

#[inline]
pub(crate) fn would_block(errno: Errno) -> bool {
    errno == Errno::EAGAIN || errno == Errno::EWOULDBLOCK
}

/// Create a non-blocking socket for the address family of `addr`
pub(crate) fn new_socket(addr: &SocketAddr, ty: libc::c_int) -> SockResult<OwnedFd> {
    let domain = match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };

    let fd = unsafe { libc::socket(domain, ty | CREATE_FLAGS, 0) };
    if fd < 0 {
        return Err(os_error("socket"));
    }
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };
    prepare_fd(fd)?;
    Ok(owned)
}

/// Accept one pending connection; `Ok(None)` when none is queued
pub(crate) fn accept(fd: RawFd) -> SockResult<Option<(OwnedFd, Option<SocketAddr>)>> {
    loop {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        let storage_ptr = &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr;

        let client = unsafe { raw_accept(fd, storage_ptr, &mut len) };

        if client < 0 {
            let errno = last_errno();
            if errno == Errno::EINTR {
                continue;
            }
            if would_block(errno) || errno == Errno::ECONNABORTED {
                return Ok(None);
            }
            return Err(SockError::from_errno("accept", errno as i32));
        }

        let owned = unsafe { OwnedFd::from_raw_fd(client) };
        prepare_fd(client)?;
        return Ok(Some((owned, from_sockaddr(&storage, len))));
    }
}

pub(crate) fn set_option(
    fd: RawFd,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> SockResult<()> {
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(os_error("setsockopt"));
    }
    Ok(())
}

/// Pending error of a socket (`SO_ERROR`), 0 when none
pub(crate) fn socket_error(fd: RawFd) -> SockResult<i32> {
    let mut value: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    let ret = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut value as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    };
    if ret < 0 {
        return Err(os_error("getsockopt(SO_ERROR)"));
    }
    Ok(value)
}

pub(crate) fn connect(fd: RawFd, addr: &SocketAddr) -> Result<(), Errno> {
    let (storage, len) = to_sockaddr(addr);
    let ret = unsafe {
        libc::connect(
            fd,
            &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
            len,
        )
    };
    if ret < 0 {
        return Err(last_errno());
    }
    Ok(())
}

pub(crate) fn bind(fd: RawFd, addr: &SocketAddr) -> SockResult<()> {
    let (storage, len) = to_sockaddr(addr);
    let ret = unsafe {
        libc::bind(
            fd,
            &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
            len,
        )
    };
    if ret < 0 {
        return Err(os_error("bind"));
    }
    Ok(())
}

pub(crate) fn listen(fd: RawFd, backlog: i32) -> SockResult<()> {
    if unsafe { libc::listen(fd, backlog) } < 0 {
        return Err(os_error("listen"));
    }
    Ok(())
}

/// `recv(2)` retried on EINTR
pub(crate) fn recv(fd: RawFd, buf: &mut [u8], flags: libc::c_int) -> Result<usize, Errno> {
    loop {
        let n = unsafe {
            libc::recv(
                fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                flags,
            )
        };
        if n >= 0 {
            return Ok(n as usize);
        }
        let errno = last_errno();
        if errno != Errno::EINTR {
            return Err(errno);
        }
    }
}

/// `send(2)` retried on EINTR
pub(crate) fn send(fd: RawFd, buf: &[u8], flags: libc::c_int) -> Result<usize, Errno> {
    loop {
        let n = unsafe {
            libc::send(
                fd,
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                flags | SEND_FLAGS,
            )
        };
        if n >= 0 {
            return Ok(n as usize);
        }
        let errno = last_errno();
        if errno != Errno::EINTR {
            return Err(errno);
        }
    }
}

pub(crate) fn peer_addr(fd: RawFd) -> Option<SocketAddr> {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let ret = unsafe {
        libc::getpeername(
            fd,
            &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
            &mut len,
        )
    };
    if ret < 0 {
        return None;
    }
    from_sockaddr(&storage, len)
}

pub(crate) fn local_addr(fd: RawFd) -> Option<SocketAddr> {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let ret = unsafe {
        libc::getsockname(
            fd,
            &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
            &mut len,
        )
    };
    if ret < 0 {
        return None;
    }
    from_sockaddr(&storage, len)
}

fn to_sockaddr(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(a) => {
            // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = a.port().to_be();
            sin.sin_addr.s_addr = u32::from_ne_bytes(a.ip().octets());
            mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(a) => {
            // SAFETY: as above, for sockaddr_in6
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = a.port().to_be();
            sin6.sin6_addr.s6_addr = a.ip().octets();
            sin6.sin6_flowinfo = a.flowinfo();
            sin6.sin6_scope_id = a.scope_id();
            mem::size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}

fn from_sockaddr(storage: &libc::sockaddr_storage, len: libc::socklen_t) -> Option<SocketAddr> {
    match storage.ss_family as libc::c_int {
        libc::AF_INET if len as usize >= mem::size_of::<libc::sockaddr_in>() => {
            let sin = unsafe { &*(storage as *const _ as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes());
            Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
        }
        libc::AF_INET6 if len as usize >= mem::size_of::<libc::sockaddr_in6>() => {
            let sin6 = unsafe { &*(storage as *const _ as *const libc::sockaddr_in6) };
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
            Some(SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}
