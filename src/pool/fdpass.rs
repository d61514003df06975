//! Descriptor passing over a Unix stream socket (`SCM_RIGHTS`).
//!
//! The sender gives up its descriptor: `send_fd` consumes the `OwnedFd` and
//! closes it once the message is on the wire. The receiver gets a fresh
//! `OwnedFd` it solely owns.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::ptr;

use super::sys::retry_interrupted;

/// Data byte carried alongside the descriptor.
const HANDOFF_TAG: u8 = b'H';

/// Room for one `cmsghdr` plus a single descriptor, 8-byte aligned.
type ControlBuf = [u64; 4];

fn control_len() -> usize {
    unsafe { libc::CMSG_SPACE(mem::size_of::<RawFd>() as libc::c_uint) as usize }
}

/// Sends `fd` over `channel` and closes the local copy.
pub fn send_fd(channel: &UnixStream, fd: OwnedFd) -> io::Result<()> {
    let payload = [HANDOFF_TAG];
    let mut iov = libc::iovec {
        iov_base: payload.as_ptr() as *mut libc::c_void,
        iov_len: payload.len(),
    };
    let mut control: ControlBuf = [0; 4];
    let control_len = control_len();
    debug_assert!(control_len <= mem::size_of::<ControlBuf>());

    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast();
    msg.msg_controllen = control_len as _;

    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        if cmsg.is_null() {
            return Err(io::Error::other("no room for control message"));
        }
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(mem::size_of::<RawFd>() as libc::c_uint) as _;
        ptr::write_unaligned(libc::CMSG_DATA(cmsg) as *mut RawFd, fd.as_raw_fd());
    }

    let sent = retry_interrupted(|| {
        let n = unsafe { libc::sendmsg(channel.as_raw_fd(), &msg, libc::MSG_NOSIGNAL) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    })?;
    if sent != payload.len() {
        return Err(io::Error::new(io::ErrorKind::WriteZero, "descriptor message was cut short"));
    }

    drop(fd);
    Ok(())
}

/// Receives one descriptor from `channel`.
pub fn recv_fd(channel: &UnixStream) -> io::Result<OwnedFd> {
    let mut payload = [0u8; 16];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr().cast(),
        iov_len: payload.len(),
    };
    let mut control: ControlBuf = [0; 4];

    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast();
    msg.msg_controllen = control_len() as _;

    let received = retry_interrupted(|| {
        let n = unsafe { libc::recvmsg(channel.as_raw_fd(), &mut msg, libc::MSG_CMSG_CLOEXEC) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    })?;
    if received == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "rendezvous peer closed before sending a descriptor",
        ));
    }
    if msg.msg_flags & libc::MSG_CTRUNC != 0 {
        return Err(io::Error::other("control message truncated"));
    }

    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        if cmsg.is_null()
            || (*cmsg).cmsg_level != libc::SOL_SOCKET
            || (*cmsg).cmsg_type != libc::SCM_RIGHTS
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "message carried no descriptor",
            ));
        }
        let fd = ptr::read_unaligned(libc::CMSG_DATA(cmsg) as *const RawFd);
        Ok(OwnedFd::from_raw_fd(fd))
    }
}
