//! In-memory host that records every side effect of a launch.
//!
//! Starts out as root with a `redis` account at 999:999. Each step can be
//! told to fail so ordering and short-circuit behaviour can be checked
//! without privileges.

use crate::config::types::{ProcessIds, TunableError};
use crate::kernel::host::Host;
use nix::errno::Errno;
use std::collections::HashMap;
use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    WriteTunable { path: PathBuf, value: String },
    ClearGroups,
    SetGid(u32),
    SetUid(u32),
    Exec { path: String, argv: Vec<String> },
}

#[derive(Debug, Clone, Copy)]
enum TunableFailure {
    Open,
    Write,
}

#[derive(Debug)]
pub struct RecordingHost {
    calls: Vec<HostCall>,
    ids: ProcessIds,
    supplementary: Vec<u32>,
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
    tunable_failure: Option<TunableFailure>,
    groups_errno: Option<Errno>,
    groups_clear_ignored: bool,
    gid_errno: Option<Errno>,
    uid_errno: Option<Errno>,
    uid_change_ignored: bool,
    exec_errno: Errno,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            ids: ProcessIds {
                uid: 0,
                euid: 0,
                gid: 0,
                egid: 0,
            },
            supplementary: vec![0],
            users: HashMap::from([(0, "root".to_string()), (999, "redis".to_string())]),
            groups: HashMap::from([(0, "root".to_string()), (999, "redis".to_string())]),
            tunable_failure: None,
            groups_errno: None,
            groups_clear_ignored: false,
            gid_errno: None,
            uid_errno: None,
            uid_change_ignored: false,
            exec_errno: Errno::ENOENT,
        }
    }

    /// Start as an already unprivileged caller.
    pub fn running_as(mut self, uid: u32, gid: u32) -> Self {
        self.ids = ProcessIds {
            uid,
            euid: uid,
            gid,
            egid: gid,
        };
        self.supplementary = vec![gid];
        self
    }

    pub fn with_supplementary_groups(mut self, groups: &[u32]) -> Self {
        self.supplementary = groups.to_vec();
        self
    }

    /// Host with no passwd/group entries besides root.
    pub fn without_accounts(mut self) -> Self {
        self.users.retain(|uid, _| *uid == 0);
        self.groups.retain(|gid, _| *gid == 0);
        self
    }

    pub fn fail_tunable_open(mut self) -> Self {
        self.tunable_failure = Some(TunableFailure::Open);
        self
    }

    pub fn fail_tunable_write(mut self) -> Self {
        self.tunable_failure = Some(TunableFailure::Write);
        self
    }

    pub fn fail_clear_groups(mut self, errno: Errno) -> Self {
        self.groups_errno = Some(errno);
        self
    }

    /// `clear_supplementary_groups` reports success but keeps the list.
    pub fn ignore_clear_groups(mut self) -> Self {
        self.groups_clear_ignored = true;
        self
    }

    pub fn fail_set_gid(mut self, errno: Errno) -> Self {
        self.gid_errno = Some(errno);
        self
    }

    pub fn fail_set_uid(mut self, errno: Errno) -> Self {
        self.uid_errno = Some(errno);
        self
    }

    /// `set_uid` reports success but leaves the ids untouched.
    pub fn ignore_set_uid(mut self) -> Self {
        self.uid_change_ignored = true;
        self
    }

    /// Errno returned by the recorded exec.
    pub fn exec_errno(mut self, errno: Errno) -> Self {
        self.exec_errno = errno;
        self
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn exec_calls(&self) -> Vec<&HostCall> {
        self.calls
            .iter()
            .filter(|call| matches!(call, HostCall::Exec { .. }))
            .collect()
    }

    pub fn position(&self, wanted: &HostCall) -> Option<usize> {
        self.calls.iter().position(|call| call == wanted)
    }

    pub fn ids(&self) -> ProcessIds {
        self.ids
    }

    pub fn supplementary(&self) -> &[u32] {
        &self.supplementary
    }
}

impl Host for RecordingHost {
    fn write_tunable(&mut self, path: &Path, value: &str) -> Result<(), TunableError> {
        self.calls.push(HostCall::WriteTunable {
            path: path.to_path_buf(),
            value: value.to_string(),
        });

        match self.tunable_failure {
            None => Ok(()),
            Some(TunableFailure::Open) => Err(TunableError::Open {
                path: path.to_path_buf(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            }),
            Some(TunableFailure::Write) => Err(TunableError::Write {
                path: path.to_path_buf(),
                source: io::Error::from_raw_os_error(Errno::EINVAL as i32),
            }),
        }
    }

    fn user_name(&self, uid: u32) -> nix::Result<Option<String>> {
        Ok(self.users.get(&uid).cloned())
    }

    fn group_name(&self, gid: u32) -> nix::Result<Option<String>> {
        Ok(self.groups.get(&gid).cloned())
    }

    fn current_ids(&self) -> ProcessIds {
        self.ids
    }

    fn clear_supplementary_groups(&mut self) -> nix::Result<()> {
        self.calls.push(HostCall::ClearGroups);
        if let Some(errno) = self.groups_errno {
            return Err(errno);
        }
        if !self.groups_clear_ignored {
            self.supplementary.clear();
        }
        Ok(())
    }

    fn supplementary_groups(&self) -> nix::Result<Vec<u32>> {
        Ok(self.supplementary.clone())
    }

    fn set_gid(&mut self, gid: u32) -> nix::Result<()> {
        self.calls.push(HostCall::SetGid(gid));
        if let Some(errno) = self.gid_errno {
            return Err(errno);
        }
        // Only root may pick an arbitrary gid.
        if self.ids.euid != 0 && gid != self.ids.gid {
            return Err(Errno::EPERM);
        }
        self.ids.gid = gid;
        self.ids.egid = gid;
        Ok(())
    }

    fn set_uid(&mut self, uid: u32) -> nix::Result<()> {
        self.calls.push(HostCall::SetUid(uid));
        if let Some(errno) = self.uid_errno {
            return Err(errno);
        }
        if self.ids.euid != 0 && uid != self.ids.uid {
            return Err(Errno::EPERM);
        }
        if !self.uid_change_ignored {
            self.ids.uid = uid;
            self.ids.euid = uid;
        }
        Ok(())
    }

    fn exec(&mut self, path: &CStr, argv: &[CString]) -> nix::Result<Infallible> {
        self.calls.push(HostCall::Exec {
            path: path.to_string_lossy().into_owned(),
            argv: argv
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
        });
        Err(self.exec_errno)
    }
}
