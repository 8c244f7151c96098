//! Peer credential checks for socket clients.
//!
//! Only the web application's service account (and operators) may talk to
//! the daemon; the kernel-reported UID is matched against an allow list.

use crate::error::{AuthErrorKind, GuardError};

/// Information about the connected peer.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    /// User ID of the peer process.
    pub uid: u32,
    /// Group ID of the peer process.
    pub gid: u32,
    /// Process ID of the peer process (0 where the platform does not report it).
    pub pid: i32,
}

impl PeerInfo {
    /// Rate limit key for requests from this peer.
    pub fn rate_key(&self) -> String {
        format!("peer:{}", self.uid)
    }
}

/// Check a peer against the allow list. An empty list admits nobody.
pub fn authorize_peer(peer: PeerInfo, allowed_uids: &[u32]) -> Result<PeerInfo, GuardError> {
    if allowed_uids.contains(&peer.uid) {
        Ok(peer)
    } else {
        Err(GuardError::Auth {
            kind: AuthErrorKind::UnauthorizedPeer { uid: peer.uid },
        })
    }
}

/// Read the peer's credentials (SO_PEERCRED) and authorize them.
#[cfg(target_os = "linux")]
pub fn verify_peer<S: std::os::fd::AsFd>(
    stream: &S,
    allowed_uids: &[u32],
) -> Result<PeerInfo, GuardError> {
    use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};

    let creds = getsockopt(stream, PeerCredentials).map_err(|e| GuardError::Socket {
        message: format!("Failed to get peer credentials: {}", e),
    })?;

    authorize_peer(
        PeerInfo {
            uid: creds.uid(),
            gid: creds.gid(),
            pid: creds.pid(),
        },
        allowed_uids,
    )
}

/// Read the peer's credentials (LOCAL_PEERCRED) and authorize them.
#[cfg(target_os = "macos")]
pub fn verify_peer<S: std::os::unix::io::AsRawFd>(
    stream: &S,
    allowed_uids: &[u32],
) -> Result<PeerInfo, GuardError> {
    use nix::libc;
    use std::mem;
    use std::os::raw::c_int;

    const LOCAL_PEERCRED: c_int = 0x001;
    const SOL_LOCAL: c_int = 0;

    #[repr(C)]
    struct XuCred {
        cr_version: u32,
        cr_uid: u32,
        cr_ngroups: i16,
        cr_groups: [u32; 16],
    }

    // SAFETY: XuCred is repr(C) and made only of integers, for which the
    // all-zero bit pattern is valid.
    let mut cred: XuCred = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<XuCred>() as libc::socklen_t;

    // SAFETY: the fd is a live socket owned by `stream`; `cred` is valid,
    // aligned, writable memory of `len` bytes.
    let result = unsafe {
        libc::getsockopt(
            stream.as_raw_fd(),
            SOL_LOCAL,
            LOCAL_PEERCRED,
            &mut cred as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };

    if result != 0 {
        return Err(GuardError::Socket {
            message: format!(
                "Failed to get peer credentials: {}",
                std::io::Error::last_os_error()
            ),
        });
    }

    let gid = if cred.cr_ngroups > 0 {
        cred.cr_groups[0]
    } else {
        0
    };

    authorize_peer(
        PeerInfo {
            uid: cred.cr_uid,
            gid,
            pid: 0,
        },
        allowed_uids,
    )
}
