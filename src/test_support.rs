//! Fake tools and fixtures shared by the subprocess tests.

use crate::core::models::FocusMode;
use crate::core::target::{normalize, Target};
use crate::executors::env::ExecEnv;
use std::path::{Path, PathBuf};

/// Installs an executable `#!/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Step environment whose `PATH` is the fake-tool dir plus the system bins.
pub fn fake_env(bin_dir: &Path, workdir: &Path) -> ExecEnv {
    ExecEnv::isolated(workdir, &format!("{}:/usr/bin:/bin", bin_dir.display()))
}

/// Shell snippet that reads `-o` into `$out` and `-l` into `$inp`.
pub const ARG_PARSER: &str = r#"out=""
inp=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    -l) inp="$2"; shift ;;
  esac
  shift
done"#;

/// `subfinder` stand-in that writes two hosts to `-o`.
#[cfg(unix)]
pub fn fake_subfinder(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "subfinder",
        &format!("{}\nprintf 'a.example.com\\nb.example.com\\n' > \"$out\"", ARG_PARSER),
    )
}

/// `httpx` stand-in that copies its `-l` list to `-o` and records the path
/// it was given in `<dir>/httpx.input-path`.
#[cfg(unix)]
pub fn fake_httpx(dir: &Path) -> PathBuf {
    let record = dir.join("httpx.input-path");
    write_script(
        dir,
        "httpx",
        &format!(
            "{}\nprintf '%s' \"$inp\" > '{}'\ncat \"$inp\" > \"$out\"",
            ARG_PARSER,
            record.display()
        ),
    )
}

pub fn domain(raw: &str) -> Target {
    normalize(raw, FocusMode::Domain).unwrap()
}
