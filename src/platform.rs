/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Discriminated result of every platform mutation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlatformError {
    #[error("permission denied")]
    Denied,
    #[error("no such file or directory")]
    NotFound,
    #[error("not supported by the filesystem")]
    Unsupported,
    #[error("{0}")]
    Other(String),
}

type Result<T> = std::result::Result<T, PlatformError>;

/// Metadata snapshot of a single path, taken without following the final
/// symlink (lstat semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Permission bits only (`st_mode & 0o7777`).
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub is_symlink: bool,
    pub is_dir: bool,
    pub is_regular: bool,
}

/// Capability surface over the host OS. The engine never touches syscalls
/// directly; everything routes through this trait so transactions can be
/// tested against an in-memory implementation.
///
/// Every call refuses paths with a symlink in any parent segment.
pub trait Platform {
    fn stat(&self, path: &Path) -> Result<FileStat>;
    fn chmod(&self, path: &Path, mode: u32) -> Result<()>;
    /// Change ownership. `None` fields are left unchanged.
    fn chown(&self, path: &Path, owner: Option<&str>, group: Option<&str>) -> Result<()>;
    /// Set or clear the platform immutable attribute. Clearing is idempotent:
    /// clearing an already-mutable file succeeds.
    fn set_immutable(&self, path: &Path, on: bool) -> Result<()>;
    fn is_immutable(&self, path: &Path) -> Result<bool>;
    fn has_elevated_privilege(&self) -> bool;
    fn resolve_user(&self, name: &str) -> Result<u32>;
    fn resolve_group(&self, name: &str) -> Result<u32>;
    fn user_name(&self, uid: u32) -> Option<String>;
    fn group_name(&self, gid: u32) -> Option<String>;
}

/// Refuse any path whose parent segments contain a symlink. The final
/// segment is left to the caller: `stat` reports it, mutations reject it.
fn refuse_symlink_parents(path: &Path) -> Result<()> {
    let mut prefix = PathBuf::new();
    let mut components = path.components().peekable();
    while let Some(component) = components.next() {
        prefix.push(component.as_os_str());
        if components.peek().is_none() {
            break;
        }
        if let Component::Normal(_) = component {
            match fs::symlink_metadata(&prefix) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    return Err(PlatformError::Other(format!(
                        "'{}' traverses a symlink",
                        path.display()
                    )));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn refuse_symlink(path: &Path) -> Result<()> {
    refuse_symlink_parents(path)?;
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Err(PlatformError::Other(format!(
            "'{}' is a symlink",
            path.display()
        ))),
        _ => Ok(()),
    }
}

fn io_error(err: std::io::Error) -> PlatformError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::NotFound => PlatformError::NotFound,
        ErrorKind::PermissionDenied => PlatformError::Denied,
        _ => PlatformError::Other(err.to_string()),
    }
}

fn errno_error(errno: nix::errno::Errno) -> PlatformError {
    use nix::errno::Errno;
    match errno {
        Errno::ENOENT => PlatformError::NotFound,
        Errno::EPERM | Errno::EACCES => PlatformError::Denied,
        Errno::ENOTTY | Errno::EOPNOTSUPP | Errno::ENOSYS | Errno::EINVAL => {
            PlatformError::Unsupported
        }
        other => PlatformError::Other(other.desc().to_owned()),
    }
}

/// The real thing: `std::fs` for metadata and modes, `nix` for ownership and
/// identity, raw `libc` for the immutable attribute.
pub struct HostPlatform;

impl Platform for HostPlatform {
    fn stat(&self, path: &Path) -> Result<FileStat> {
        use std::os::unix::fs::MetadataExt;
        refuse_symlink_parents(path)?;
        let meta = fs::symlink_metadata(path).map_err(io_error)?;
        Ok(FileStat {
            mode: (meta.mode() & 0o7777) as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            is_symlink: meta.file_type().is_symlink(),
            is_dir: meta.is_dir(),
            is_regular: meta.is_file(),
        })
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        refuse_symlink(path)?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(io_error)
    }

    fn chown(&self, path: &Path, owner: Option<&str>, group: Option<&str>) -> Result<()> {
        refuse_symlink(path)?;
        let uid = match owner {
            Some(name) => Some(nix::unistd::Uid::from_raw(self.resolve_user(name)?)),
            None => None,
        };
        let gid = match group {
            Some(name) => Some(nix::unistd::Gid::from_raw(self.resolve_group(name)?)),
            None => None,
        };
        if uid.is_none() && gid.is_none() {
            return Ok(());
        }
        nix::unistd::chown(path, uid, gid).map_err(errno_error)
    }

    fn set_immutable(&self, path: &Path, on: bool) -> Result<()> {
        refuse_symlink(path)?;
        set_immutable_impl(path, on)
    }

    fn is_immutable(&self, path: &Path) -> Result<bool> {
        refuse_symlink(path)?;
        is_immutable_impl(path)
    }

    fn has_elevated_privilege(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn resolve_user(&self, name: &str) -> Result<u32> {
        match nix::unistd::User::from_name(name) {
            Ok(Some(user)) => Ok(user.uid.as_raw()),
            // Accept a raw uid for owners whose name cannot be resolved.
            Ok(None) => name
                .parse::<u32>()
                .map_err(|_| PlatformError::Other(format!("unknown user '{}'", name))),
            Err(errno) => Err(errno_error(errno)),
        }
    }

    fn resolve_group(&self, name: &str) -> Result<u32> {
        match nix::unistd::Group::from_name(name) {
            Ok(Some(group)) => Ok(group.gid.as_raw()),
            Ok(None) => name
                .parse::<u32>()
                .map_err(|_| PlatformError::Other(format!("unknown group '{}'", name))),
            Err(errno) => Err(errno_error(errno)),
        }
    }

    fn user_name(&self, uid: u32) -> Option<String> {
        nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid))
            .ok()
            .flatten()
            .map(|user| user.name)
    }

    fn group_name(&self, gid: u32) -> Option<String> {
        nix::unistd::Group::from_gid(nix::unistd::Gid::from_raw(gid))
            .ok()
            .flatten()
            .map(|group| group.name)
    }
}

#[cfg(target_os = "linux")]
mod attr {
    pub const FS_IOC_GETFLAGS: u64 = 0x8008_6601;
    pub const FS_IOC_SETFLAGS: u64 = 0x4008_6602;
    pub const FS_IMMUTABLE_FL: libc::c_long = 0x0000_0010;
}

#[cfg(target_os = "linux")]
fn inode_flags(file: &fs::File) -> Result<libc::c_long> {
    use std::os::unix::io::AsRawFd;
    let mut flags: libc::c_long = 0;
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), attr::FS_IOC_GETFLAGS as _, &mut flags) };
    if ret != 0 {
        return Err(errno_error(nix::errno::Errno::last()));
    }
    Ok(flags)
}

#[cfg(target_os = "linux")]
fn set_immutable_impl(path: &Path, on: bool) -> Result<()> {
    use std::os::unix::io::AsRawFd;
    let file = fs::File::open(path).map_err(io_error)?;
    let flags = match inode_flags(&file) {
        // A filesystem without inode attributes has nothing to clear.
        Err(PlatformError::Unsupported) if !on => return Ok(()),
        other => other?,
    };
    let wanted = if on {
        flags | attr::FS_IMMUTABLE_FL
    } else {
        flags & !attr::FS_IMMUTABLE_FL
    };
    if wanted == flags {
        return Ok(());
    }
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), attr::FS_IOC_SETFLAGS as _, &wanted) };
    if ret != 0 {
        return Err(errno_error(nix::errno::Errno::last()));
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn is_immutable_impl(path: &Path) -> Result<bool> {
    let file = fs::File::open(path).map_err(io_error)?;
    match inode_flags(&file) {
        Ok(flags) => Ok(flags & attr::FS_IMMUTABLE_FL != 0),
        Err(PlatformError::Unsupported) => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(target_os = "macos")]
fn current_bsd_flags(path: &Path) -> Result<u32> {
    use std::os::macos::fs::MetadataExt;
    let meta = fs::symlink_metadata(path).map_err(io_error)?;
    Ok(meta.st_flags())
}

#[cfg(target_os = "macos")]
fn set_immutable_impl(path: &Path, on: bool) -> Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    const UF_IMMUTABLE: u32 = 0x0000_0002;
    let flags = current_bsd_flags(path)?;
    let wanted = if on {
        flags | UF_IMMUTABLE
    } else {
        flags & !UF_IMMUTABLE
    };
    if wanted == flags {
        return Ok(());
    }
    let cpath = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| PlatformError::Other("path contains a NUL byte".to_owned()))?;
    let ret = unsafe { libc::chflags(cpath.as_ptr(), wanted) };
    if ret != 0 {
        return Err(errno_error(nix::errno::Errno::last()));
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn is_immutable_impl(path: &Path) -> Result<bool> {
    const UF_IMMUTABLE: u32 = 0x0000_0002;
    Ok(current_bsd_flags(path)? & UF_IMMUTABLE != 0)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn set_immutable_impl(_path: &Path, on: bool) -> Result<()> {
    if on {
        Err(PlatformError::Unsupported)
    } else {
        Ok(())
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn is_immutable_impl(_path: &Path) -> Result<bool> {
    Ok(false)
}
