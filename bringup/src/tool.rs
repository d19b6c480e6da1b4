// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Capabilities provided by external programs. Each capability is a trait so
//! that the extraction logic can be exercised without the host tools, and each
//! has a process-backed implementation that shells out to the usual Android
//! and Linux utilities.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Output, Stdio},
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to run {0:?}")]
    Spawn(String, #[source] io::Error),
    #[error("{program:?} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("{program:?} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("{program:?} produced unexpected output: {line:?}")]
    UnexpectedOutput { program: String, line: String },
    #[error("{program:?} could not find {path:?}")]
    NotFound { program: String, path: String },
    #[error("{0}")]
    Unsupported(String),
    #[error("I/O error: {0}")]
    Io(&'static str, #[source] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

/// Decompiles a flattened device tree into source form.
pub trait DtbDecompiler {
    fn dtb_to_dts(&self, dtb: &Path, dts: &Path) -> Result<()>;
}

/// Unpacks a container into a directory and reports the files it produced.
pub trait Unpacker {
    fn unpack(&self, input: &Path, output_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Read-only loop mounting of filesystem images.
pub trait LoopMount {
    /// Fail early if the caller lacks the privileges needed to mount.
    fn check_privileges(&self) -> Result<()> {
        if is_privileged() {
            Ok(())
        } else {
            Err(Error::Unsupported(
                "Mounting filesystem images requires root privileges".to_owned(),
            ))
        }
    }

    fn mount(&self, image: &Path, mount_point: &Path) -> Result<()>;

    fn unmount(&self, mount_point: &Path) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
}

/// Offline inspection of a filesystem image without mounting it. Paths are
/// absolute within the image.
pub trait FsIntrospect {
    /// List a directory. A missing directory yields an empty list.
    fn list_dir(&self, image: &Path, path: &str) -> Result<Vec<DirEntry>>;

    /// Write the contents of a regular file to `dest`.
    fn dump_file(&self, image: &Path, path: &str, dest: &Path) -> Result<()>;
}

#[cfg(unix)]
pub fn is_privileged() -> bool {
    rustix::process::geteuid().is_root()
}

#[cfg(not(unix))]
pub fn is_privileged() -> bool {
    false
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

fn check_status(program: String, status: ExitStatus, stderr: &[u8]) -> Result<()> {
    if status.success() {
        return Ok(());
    }

    Err(Error::Failed {
        program,
        status: status.to_string(),
        stderr: String::from_utf8_lossy(stderr).trim().to_owned(),
    })
}

/// Run a command to completion and capture its output. A non-zero exit status
/// is an error.
pub fn run(cmd: &mut Command) -> Result<Output> {
    let program = program_name(cmd);
    debug!("Running: {cmd:?}");

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::Spawn(program.clone(), e))?;

    check_status(program, output.status, &output.stderr)?;

    Ok(output)
}

/// Run a command that is expected to produce little output, killing it if it
/// does not exit within `timeout`.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<()> {
    let program = program_name(cmd);
    debug!("Running with {timeout:?} timeout: {cmd:?}");

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Spawn(program.clone(), e))?;

    let start = Instant::now();

    loop {
        if let Some(status) = child.try_wait().map_err(|e| Error::Io("wait", e))? {
            let mut stderr = vec![];
            if let Some(mut pipe) = child.stderr.take() {
                pipe.read_to_end(&mut stderr)
                    .map_err(|e| Error::Io("stderr", e))?;
            }

            return check_status(program, status, &stderr);
        }

        if start.elapsed() >= timeout {
            // The child may have exited in the meantime.
            let _ = child.kill();
            let _ = child.wait();

            return Err(Error::Timeout { program, timeout });
        }

        thread::sleep(Duration::from_millis(20));
    }
}

/// `dtc -I dtb -O dts`.
#[derive(Clone, Debug)]
pub struct Dtc {
    pub program: PathBuf,
}

impl DtbDecompiler for Dtc {
    fn dtb_to_dts(&self, dtb: &Path, dts: &Path) -> Result<()> {
        run(Command::new(&self.program)
            .args(["-q", "-I", "dtb", "-O", "dts", "-o"])
            .arg(dts)
            .arg(dtb))?;

        Ok(())
    }
}

/// `lpunpack` for dynamic partition containers (`super.img`).
#[derive(Clone, Debug)]
pub struct Lpunpack {
    pub program: PathBuf,
}

impl Unpacker for Lpunpack {
    fn unpack(&self, input: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
        run(Command::new(&self.program).arg(input).arg(output_dir))?;

        let mut produced = vec![];

        for entry in fs::read_dir(output_dir).map_err(|e| Error::Io("read_dir", e))? {
            let entry = entry.map_err(|e| Error::Io("read_dir", e))?;
            if entry.file_type().map_err(|e| Error::Io("file_type", e))?.is_file() {
                produced.push(entry.path());
            }
        }

        produced.sort();

        Ok(produced)
    }
}

/// `simg2img` as an alternative to the built-in sparse decoder.
#[derive(Clone, Debug)]
pub struct Simg2img {
    pub program: PathBuf,
}

impl Simg2img {
    pub fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        run(Command::new(&self.program).arg(input).arg(output))?;

        Ok(())
    }
}

/// `mount -o loop,ro` and `umount`.
#[derive(Clone, Debug)]
pub struct Mounter {
    pub mount_program: PathBuf,
    pub umount_program: PathBuf,
    pub timeout: Duration,
}

impl LoopMount for Mounter {
    fn mount(&self, image: &Path, mount_point: &Path) -> Result<()> {
        run_with_timeout(
            Command::new(&self.mount_program)
                .args(["-o", "loop,ro"])
                .arg(image)
                .arg(mount_point),
            self.timeout,
        )
    }

    fn unmount(&self, mount_point: &Path) -> Result<()> {
        run_with_timeout(
            Command::new(&self.umount_program).arg(mount_point),
            self.timeout,
        )
    }
}

/// `debugfs` from e2fsprogs.
#[derive(Clone, Debug)]
pub struct Debugfs {
    pub program: PathBuf,
}

impl Debugfs {
    fn request(&self, request: &str, path: &str) -> Command {
        let mut arg = OsString::from(request);
        arg.push(" \"");
        arg.push(path);
        arg.push("\"");

        let mut cmd = Command::new(&self.program);
        cmd.arg("-R").arg(arg);
        cmd
    }
}

impl FsIntrospect for Debugfs {
    fn list_dir(&self, image: &Path, path: &str) -> Result<Vec<DirEntry>> {
        let program = self.program.to_string_lossy();
        let output = run(self.request("ls -p", path).arg(image))?;

        match check_debugfs_stderr(&program, path, &String::from_utf8_lossy(&output.stderr)) {
            Ok(()) => {}
            Err(Error::NotFound { .. }) => return Ok(vec![]),
            Err(e) => return Err(e),
        }

        parse_ls_p(&program, &String::from_utf8_lossy(&output.stdout))
    }

    fn dump_file(&self, image: &Path, path: &str, dest: &Path) -> Result<()> {
        let file = File::create(dest).map_err(|e| Error::Io("create", e))?;

        let output = run(self.request("cat", path).arg(image).stdout(file))?;

        check_debugfs_stderr(
            &self.program.to_string_lossy(),
            path,
            &String::from_utf8_lossy(&output.stderr),
        )
    }
}

fn is_debugfs_banner(line: &str) -> bool {
    line.strip_prefix("debugfs ")
        .is_some_and(|v| v.starts_with(|c: char| c.is_ascii_digit()) && v.ends_with(')'))
}

/// debugfs exits successfully even when a request fails and only reports the
/// problem on stderr. Every line other than the version banner is an error.
pub fn check_debugfs_stderr(program: &str, path: &str, stderr: &str) -> Result<()> {
    let errors = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !is_debugfs_banner(l))
        .collect::<Vec<_>>();

    if errors.is_empty() {
        Ok(())
    } else if errors.iter().all(|l| l.ends_with("File not found by ext2_lookup")) {
        Err(Error::NotFound {
            program: program.to_owned(),
            path: path.to_owned(),
        })
    } else {
        Err(Error::Failed {
            program: program.to_owned(),
            status: "reported errors".to_owned(),
            stderr: errors.join("\n"),
        })
    }
}

/// Parse the output of debugfs's `ls -p`, which prints one
/// `/inode/mode/uid/gid/name/size/` line per entry with the mode in octal.
/// The `.` and `..` entries are omitted.
pub fn parse_ls_p(program: &str, output: &str) -> Result<Vec<DirEntry>> {
    let mut entries = vec![];

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let unexpected = || Error::UnexpectedOutput {
            program: program.to_owned(),
            line: line.to_owned(),
        };

        let fields = line
            .strip_prefix('/')
            .and_then(|l| l.strip_suffix('/'))
            .ok_or_else(unexpected)?
            .split('/')
            .collect::<Vec<_>>();
        if fields.len() != 6 {
            return Err(unexpected());
        }

        let name = fields[4];
        if name == "." || name == ".." {
            continue;
        }

        let mode = u32::from_str_radix(fields[1], 8).map_err(|_| unexpected())?;
        let kind = match mode & 0o170000 {
            0o040000 => EntryKind::Directory,
            0o100000 => EntryKind::File,
            0o120000 => EntryKind::Symlink,
            _ => EntryKind::Other,
        };

        // Directories print an empty size field.
        let size = if fields[5].is_empty() {
            0
        } else {
            fields[5].parse().map_err(|_| unexpected())?
        };

        entries.push(DirEntry {
            name: name.to_owned(),
            kind,
            size,
        });
    }

    Ok(entries)
}
