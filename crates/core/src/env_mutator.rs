// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Applies `header.env` after extraction: appending install directories to
//! `PATH` and setting environment variables, persisted to the registry on
//! Windows (user or machine scope) and broadcast to running processes.
//!
//! Failures here never abort installation; each one is reported to the
//! progress sink as a [`ProgressEvent::LogLine`] warning and otherwise
//! ignored, per the non-fatal policy for this stage.

use std::path::Path;

use inspa_config::EnvConfig;

use crate::progress::{ProgressEvent, ProgressSink};

const INSTALL_DIR_PLACEHOLDER: &str = "%INSTALL_DIR%";

/// Applies every `add_path` entry and `set` variable in `env`, substituting
/// `%INSTALL_DIR%` with `install_dir` first. Scope (user vs. machine) is
/// chosen by `env.system_scope`.
pub fn apply(env: &EnvConfig, install_dir: &Path, progress: &ProgressSink) {
    if env.add_path.is_empty() && env.set.is_empty() {
        return;
    }

    let install_dir = install_dir.to_string_lossy();
    let resolved_paths: Vec<String> = env
        .add_path
        .iter()
        .map(|p| substitute_placeholder(p, &install_dir))
        .collect();
    let resolved_vars: Vec<(String, String)> = env
        .set
        .iter()
        .map(|(k, v)| (k.clone(), substitute_placeholder(v, &install_dir)))
        .collect();

    for warning in platform::apply(env.system_scope, &resolved_paths, &resolved_vars) {
        progress.send(ProgressEvent::LogLine(format!(
            "warning: environment mutation failed: {warning}"
        )));
    }
}

fn substitute_placeholder(value: &str, install_dir: &str) -> String {
    value.replace(INSTALL_DIR_PLACEHOLDER, install_dir)
}

/// `true` if `path_value` (a `;`-separated `PATH` string) already contains
/// `candidate` under a case-insensitive, trailing-slash-insensitive compare.
fn path_contains(path_value: &str, candidate: &str) -> bool {
    let normalize = |s: &str| s.trim_end_matches(['\\', '/']).to_ascii_lowercase();
    let candidate = normalize(candidate);
    path_value
        .split(';')
        .any(|segment| normalize(segment) == candidate)
}

#[cfg(target_os = "windows")]
mod platform {
    use windows_sys::Win32::{
        Foundation::{LPARAM, WPARAM},
        UI::WindowsAndMessaging::{
            SendMessageTimeoutW, HWND_BROADCAST, SMTO_ABORTIFHUNG, WM_SETTINGCHANGE,
        },
    };
    use winreg::{enums::*, RegKey};

    use super::path_contains;

    /// Applies mutations to the Windows registry environment block, returning
    /// one warning string per failed operation (registry open/write errors).
    pub fn apply(
        system_scope: bool,
        add_path: &[String],
        set_vars: &[(String, String)],
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        let key = match open_environment_key(system_scope) {
            Ok(key) => key,
            Err(e) => {
                warnings.push(format!("could not open environment registry key: {e}"));
                return warnings;
            }
        };

        if !add_path.is_empty() {
            if let Err(e) = append_to_path(&key, add_path) {
                warnings.push(format!("could not update PATH: {e}"));
            }
        }

        for (name, value) in set_vars {
            if let Err(e) = key.set_value(name, value) {
                warnings.push(format!("could not set {name}: {e}"));
            }
        }

        broadcast_settings_change();
        warnings
    }

    fn open_environment_key(system_scope: bool) -> std::io::Result<RegKey> {
        if system_scope {
            let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
            hklm.open_subkey_with_flags(
                r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment",
                KEY_READ | KEY_WRITE,
            )
        } else {
            let hkcu = RegKey::predef(HKEY_CURRENT_USER);
            hkcu.create_subkey(r"Environment").map(|(key, _)| key)
        }
    }

    fn append_to_path(key: &RegKey, add_path: &[String]) -> std::io::Result<()> {
        let current: String = key.get_value("Path").unwrap_or_default();
        let mut updated = current.clone();
        for dir in add_path {
            if !path_contains(&updated, dir) {
                if !updated.is_empty() && !updated.ends_with(';') {
                    updated.push(';');
                }
                updated.push_str(dir);
            }
        }
        if updated != current {
            key.set_value("Path", &updated)?;
        }
        Ok(())
    }

    /// Broadcasts `WM_SETTINGCHANGE` so running processes notice the change.
    /// Best-effort: a timeout or failure here is not reported as a warning,
    /// since the registry write already succeeded.
    fn broadcast_settings_change() {
        let param: Vec<u16> = "Environment\0".encode_utf16().collect();
        unsafe {
            let mut result = 0usize;
            SendMessageTimeoutW(
                HWND_BROADCAST,
                WM_SETTINGCHANGE,
                0 as WPARAM,
                param.as_ptr() as LPARAM,
                SMTO_ABORTIFHUNG,
                5000,
                &mut result as *mut usize as *mut _,
            );
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    /// This installer's environment mutations are Windows registry writes;
    /// on any other platform there is nothing to persist.
    pub fn apply(
        _system_scope: bool,
        add_path: &[String],
        set_vars: &[(String, String)],
    ) -> Vec<String> {
        if add_path.is_empty() && set_vars.is_empty() {
            Vec::new()
        } else {
            vec!["environment persistence is only supported on Windows".to_string()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::mpsc;

    #[test]
    fn substitutes_install_dir_placeholder() {
        let resolved = substitute_placeholder("%INSTALL_DIR%\\bin", "C:\\Program Files\\Demo");
        assert_eq!(resolved, "C:\\Program Files\\Demo\\bin");
    }

    #[test]
    fn path_contains_is_case_and_trailing_slash_insensitive() {
        assert!(path_contains(
            r"C:\Windows;C:\Demo\Bin\;C:\Other",
            r"c:\demo\bin"
        ));
        assert!(!path_contains(r"C:\Windows;C:\Other", r"C:\Demo\Bin"));
    }

    #[test]
    fn apply_is_a_no_op_for_empty_env() {
        let (tx, rx) = mpsc::channel();
        let sink = ProgressSink::new(tx);
        apply(&EnvConfig::default(), Path::new("/tmp/demo"), &sink);
        assert!(rx.try_recv().is_err());
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn non_windows_apply_reports_a_single_warning_via_progress() {
        let (tx, rx) = mpsc::channel();
        let sink = ProgressSink::new(tx);
        let env = EnvConfig {
            add_path: vec!["%INSTALL_DIR%\\bin".to_string()],
            set: BTreeMap::new(),
            system_scope: false,
        };
        apply(&env, Path::new("/opt/demo"), &sink);
        match rx.try_recv().unwrap() {
            ProgressEvent::LogLine(line) => assert!(line.contains("warning")),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
