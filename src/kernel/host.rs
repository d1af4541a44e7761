//! Host primitives used by the launch sequence.
//!
//! Every side effect the launcher has on the machine goes through [`Host`].
//! [`LinuxHost`] is the real implementation; tests substitute a recorder.

use crate::config::types::{ProcessIds, TunableError};
use nix::errno::Errno;
use nix::unistd::{Gid, Group, Uid, User};
use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub trait Host {
    /// Open `path` for writing and write `value`. The file is closed before
    /// returning.
    fn write_tunable(&mut self, path: &Path, value: &str) -> Result<(), TunableError>;

    /// passwd entry name for `uid`, `None` if there is none.
    fn user_name(&self, uid: u32) -> nix::Result<Option<String>>;

    /// group entry name for `gid`, `None` if there is none.
    fn group_name(&self, gid: u32) -> nix::Result<Option<String>>;

    fn current_ids(&self) -> ProcessIds;

    fn clear_supplementary_groups(&mut self) -> nix::Result<()>;

    /// Current supplementary group list.
    fn supplementary_groups(&self) -> nix::Result<Vec<u32>>;

    /// MUST be called BEFORE `set_uid`.
    fn set_gid(&mut self, gid: u32) -> nix::Result<()>;

    fn set_uid(&mut self, uid: u32) -> nix::Result<()>;

    /// Replace the process image. Only returns on failure.
    fn exec(&mut self, path: &CStr, argv: &[CString]) -> nix::Result<Infallible>;
}

impl<H: Host + ?Sized> Host for &mut H {
    fn write_tunable(&mut self, path: &Path, value: &str) -> Result<(), TunableError> {
        (**self).write_tunable(path, value)
    }

    fn user_name(&self, uid: u32) -> nix::Result<Option<String>> {
        (**self).user_name(uid)
    }

    fn group_name(&self, gid: u32) -> nix::Result<Option<String>> {
        (**self).group_name(gid)
    }

    fn current_ids(&self) -> ProcessIds {
        (**self).current_ids()
    }

    fn clear_supplementary_groups(&mut self) -> nix::Result<()> {
        (**self).clear_supplementary_groups()
    }

    fn supplementary_groups(&self) -> nix::Result<Vec<u32>> {
        (**self).supplementary_groups()
    }

    fn set_gid(&mut self, gid: u32) -> nix::Result<()> {
        (**self).set_gid(gid)
    }

    fn set_uid(&mut self, uid: u32) -> nix::Result<()> {
        (**self).set_uid(uid)
    }

    fn exec(&mut self, path: &CStr, argv: &[CString]) -> nix::Result<Infallible> {
        (**self).exec(path, argv)
    }
}

/// The running process on a Unix host.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxHost;

impl Host for LinuxHost {
    fn write_tunable(&mut self, path: &Path, value: &str) -> Result<(), TunableError> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| TunableError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        file.write_all(value.as_bytes())
            .map_err(|source| TunableError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    fn user_name(&self, uid: u32) -> nix::Result<Option<String>> {
        Ok(User::from_uid(Uid::from_raw(uid))?.map(|user| user.name))
    }

    fn group_name(&self, gid: u32) -> nix::Result<Option<String>> {
        Ok(Group::from_gid(Gid::from_raw(gid))?.map(|group| group.name))
    }

    fn current_ids(&self) -> ProcessIds {
        use nix::unistd::{getegid, geteuid, getgid, getuid};

        ProcessIds {
            uid: getuid().as_raw(),
            euid: geteuid().as_raw(),
            gid: getgid().as_raw(),
            egid: getegid().as_raw(),
        }
    }

    fn clear_supplementary_groups(&mut self) -> nix::Result<()> {
        // nix leaves setgroups out on these targets.
        #[cfg(not(any(target_vendor = "apple", target_os = "redox", target_os = "haiku")))]
        {
            nix::unistd::setgroups(&[])
        }

        #[cfg(any(target_vendor = "apple", target_os = "redox", target_os = "haiku"))]
        {
            Err(Errno::ENOSYS)
        }
    }

    fn supplementary_groups(&self) -> nix::Result<Vec<u32>> {
        #[cfg(not(any(target_vendor = "apple", target_os = "redox", target_os = "haiku")))]
        {
            Ok(nix::unistd::getgroups()?
                .into_iter()
                .map(|gid| gid.as_raw())
                .collect())
        }

        #[cfg(any(target_vendor = "apple", target_os = "redox", target_os = "haiku"))]
        {
            Err(Errno::ENOSYS)
        }
    }

    fn set_gid(&mut self, gid: u32) -> nix::Result<()> {
        let gid = Gid::from_raw(gid);

        // setresgid also replaces the saved set-group-ID.
        #[cfg(target_os = "linux")]
        {
            nix::unistd::setresgid(gid, gid, gid)
        }

        #[cfg(not(target_os = "linux"))]
        {
            nix::unistd::setgid(gid)
        }
    }

    fn set_uid(&mut self, uid: u32) -> nix::Result<()> {
        let uid = Uid::from_raw(uid);

        #[cfg(target_os = "linux")]
        {
            nix::unistd::setresuid(uid, uid, uid)
        }

        #[cfg(not(target_os = "linux"))]
        {
            nix::unistd::setuid(uid)
        }
    }

    fn exec(&mut self, path: &CStr, argv: &[CString]) -> nix::Result<Infallible> {
        if argv.is_empty() {
            return Err(Errno::EINVAL);
        }
        nix::unistd::execv(path, argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn write_tunable_writes_literal_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overcommit_memory");
        fs::write(&path, "0").unwrap();

        LinuxHost.write_tunable(&path, "1").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "1");
    }

    #[test]
    fn write_tunable_does_not_create_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");

        let err = LinuxHost.write_tunable(&path, "1").unwrap_err();

        assert!(matches!(err, TunableError::Open { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn write_tunable_to_directory_fails_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let err = LinuxHost.write_tunable(dir.path(), "1").unwrap_err();
        assert!(matches!(err, TunableError::Open { .. }));
    }

    #[test]
    fn current_ids_match_libc_view() {
        let ids = LinuxHost.current_ids();
        assert_eq!(ids.uid, nix::unistd::getuid().as_raw());
        assert_eq!(ids.egid, nix::unistd::getegid().as_raw());
    }

    #[test]
    fn clear_groups_reaches_setgroups() {
        if nix::unistd::geteuid().is_root() {
            // Would strip the test process itself.
            return;
        }
        assert_eq!(LinuxHost.clear_supplementary_groups(), Err(Errno::EPERM));
    }

    #[test]
    fn supplementary_groups_match_getgroups() {
        let expected: Vec<u32> = nix::unistd::getgroups()
            .unwrap()
            .into_iter()
            .map(|gid| gid.as_raw())
            .collect();
        assert_eq!(LinuxHost.supplementary_groups().unwrap(), expected);
    }

    #[test]
    fn root_account_resolves() {
        assert_eq!(LinuxHost.user_name(0).unwrap().as_deref(), Some("root"));
    }

    #[test]
    fn exec_with_empty_argv_is_rejected() {
        let path = CString::new("/bin/true").unwrap();
        let err = LinuxHost.exec(&path, &[]).unwrap_err();
        assert_eq!(err, Errno::EINVAL);
    }
}
