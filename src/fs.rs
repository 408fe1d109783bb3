//! Filesystem capability.
//!
//! The [`Fs`] trait is the seam between the language's file builtins and the
//! host. Relative paths resolve against the capability's working directory,
//! which sessions seed from the directory of their start path.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub trait Fs: Send {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;
    fn write_file(&self, path: &str, data: &[u8]) -> io::Result<()>;
    fn append_file(&self, path: &str, data: &[u8]) -> io::Result<()>;
    fn delete_file(&self, path: &str) -> io::Result<()>;
    fn remove_dir(&self, path: &str) -> io::Result<()>;
    fn remove_dir_all(&self, path: &str) -> io::Result<()>;
    fn exists(&self, path: &str) -> bool;
    fn is_dir(&self, path: &str) -> bool;
    fn is_file(&self, path: &str) -> bool;
    fn list_dir(&self, path: &str) -> io::Result<Vec<String>>;
    fn make_dir(&self, path: &str) -> io::Result<()>;
    fn make_dir_all(&self, path: &str) -> io::Result<()>;
    fn working_dir(&self) -> PathBuf;
    fn set_working_dir(&mut self, path: &str) -> io::Result<()>;
}

/// Direct passthrough to the host filesystem.
pub struct HostFs {
    working_dir: PathBuf,
}

impl HostFs {
    pub fn new() -> HostFs {
        HostFs {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.working_dir.join(p)
        }
    }
}

impl Default for HostFs {
    fn default() -> Self {
        HostFs::new()
    }
}

impl Fs for HostFs {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path))
    }

    fn write_file(&self, path: &str, data: &[u8]) -> io::Result<()> {
        fs::write(self.resolve(path), data)
    }

    fn append_file(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.resolve(path))?;
        file.write_all(data)
    }

    fn delete_file(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(path))
    }

    fn remove_dir(&self, path: &str) -> io::Result<()> {
        fs::remove_dir(self.resolve(path))
    }

    fn remove_dir_all(&self, path: &str) -> io::Result<()> {
        fs::remove_dir_all(self.resolve(path))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }

    fn is_file(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn list_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.resolve(path))? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn make_dir(&self, path: &str) -> io::Result<()> {
        fs::create_dir(self.resolve(path))
    }

    fn make_dir_all(&self, path: &str) -> io::Result<()> {
        fs::create_dir_all(self.resolve(path))
    }

    fn working_dir(&self) -> PathBuf {
        self.working_dir.clone()
    }

    fn set_working_dir(&mut self, path: &str) -> io::Result<()> {
        let full = self.resolve(path);
        if !full.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a directory: {}", full.display()),
            ));
        }
        self.working_dir = full;
        Ok(())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut hfs = HostFs::new();
        hfs.set_working_dir(&dir.path().to_string_lossy()).unwrap();

        hfs.write_file("note.txt", b"hello").unwrap();
        assert!(hfs.exists("note.txt"));
        assert!(hfs.is_file("note.txt"));
        assert!(!hfs.is_dir("note.txt"));
        assert_eq!(hfs.read_file("note.txt").unwrap(), b"hello");

        hfs.append_file("note.txt", b" world").unwrap();
        assert_eq!(hfs.read_file("note.txt").unwrap(), b"hello world");

        hfs.make_dir("sub").unwrap();
        let names = hfs.list_dir(".").unwrap();
        assert!(names.contains(&"note.txt".to_owned()));
        assert!(names.contains(&"sub".to_owned()));

        hfs.delete_file("note.txt").unwrap();
        assert!(!hfs.exists("note.txt"));
        hfs.remove_dir("sub").unwrap();
    }

    #[test]
    fn test_set_working_dir_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut hfs = HostFs::new();
        hfs.set_working_dir(&dir.path().to_string_lossy()).unwrap();
        hfs.write_file("f", b"x").unwrap();
        assert!(hfs.set_working_dir("f").is_err());
        assert!(hfs.set_working_dir("missing").is_err());
    }
}
