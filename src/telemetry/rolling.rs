//! Size-bounded log file. `torgate.log` rolls over to `torgate.log.1`, older
//! backups shift up by one, and anything past the backup limit is dropped.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_BACKUPS: usize = 3;

pub struct RollingFile {
    state: Mutex<State>,
}

struct State {
    path: PathBuf,
    file: File,
    len: u64,
    max_bytes: u64,
    backups: usize,
}

impl RollingFile {
    /// Opens `path` for appending, creating it and its directory if needed.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = open_append(&path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            state: Mutex::new(State {
                path,
                file,
                len,
                max_bytes,
                backups,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // a panic mid-write leaves the file usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

impl State {
    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups == 0 {
            fs::remove_file(&self.path)?;
        } else {
            for n in (1..self.backups).rev() {
                let from = backup_path(&self.path, n);
                if from.exists() {
                    fs::rename(&from, backup_path(&self.path, n + 1))?;
                }
            }
            fs::rename(&self.path, backup_path(&self.path, 1))?;
        }

        self.file = open_append(&self.path)?;
        self.len = 0;
        Ok(())
    }
}

impl Write for State {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.len > 0 && self.len + buf.len() as u64 > self.max_bytes {
            self.roll()?;
        }
        let n = self.file.write(buf)?;
        self.len += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Holds the file lock for one formatted event.
pub struct RollingWriter<'a>(MutexGuard<'a, State>);

impl Write for RollingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingFile {
    type Writer = RollingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RollingWriter(self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("torgate-log-{}", uuid::Uuid::new_v4()))
    }

    fn line(n: usize) -> String {
        format!("{:<39}\n", format!("event {}", n))
    }

    #[test]
    fn test_rolls_over_and_keeps_bounded_backups() {
        let dir = scratch_dir();
        let path = dir.join("torgate.log");
        let log = RollingFile::open(&path, 64, 2).unwrap();

        for n in 1..=5 {
            log.make_writer().write_all(line(n).as_bytes()).unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), line(5));
        assert_eq!(fs::read_to_string(backup_path(&path, 1)).unwrap(), line(4));
        assert_eq!(fs::read_to_string(backup_path(&path, 2)).unwrap(), line(3));
        assert!(!backup_path(&path, 3).exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_reopen_appends_and_counts_existing_bytes() {
        let dir = scratch_dir();
        let path = dir.join("torgate.log");

        {
            let log = RollingFile::open(&path, 100, 1).unwrap();
            log.make_writer().write_all(line(1).as_bytes()).unwrap();
        }

        let log = RollingFile::open(&path, 100, 1).unwrap();
        log.make_writer().write_all(line(2).as_bytes()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), line(1) + &line(2));

        // 80 bytes on disk, the next line crosses 100
        log.make_writer().write_all(line(3).as_bytes()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), line(3));
        assert_eq!(
            fs::read_to_string(backup_path(&path, 1)).unwrap(),
            line(1) + &line(2)
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_oversized_event_is_written_whole() {
        let dir = scratch_dir();
        let path = dir.join("torgate.log");
        let log = RollingFile::open(&path, 8, 1).unwrap();

        log.make_writer().write_all(line(1).as_bytes()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), line(1));
        assert!(!backup_path(&path, 1).exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
