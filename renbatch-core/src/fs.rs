use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;

/// What the scanner needs to know about a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// A failed copy, split by the end that failed.
#[derive(Debug)]
pub enum CopyError {
    /// Reading the source or its metadata.
    Source(io::Error),
    /// Writing the copy or moving it into place.
    Destination(io::Error),
}

pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    /// Copies file contents, permissions and modification time.
    fn copy_with_metadata(&self, from: &Path, to: &Path) -> Result<(), CopyError>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
    fn stat(&self, path: &Path) -> io::Result<FileStat>;
    fn is_case_sensitive(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct RealFileSystem {
    case_sensitive: bool,
}

impl RealFileSystem {
    pub fn new() -> Self {
        Self::with_case_sensitivity(!platform_case_insensitive())
    }

    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }
}

impl Default for RealFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Windows and macOS ship case-insensitive (but case-preserving) volumes by default.
pub fn platform_case_insensitive() -> bool {
    cfg!(any(windows, target_os = "macos"))
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn copy_with_metadata(&self, from: &Path, to: &Path) -> Result<(), CopyError> {
        let metadata = std::fs::metadata(from).map_err(CopyError::Source)?;
        let modified = metadata.modified().map_err(CopyError::Source)?;
        let mut reader = File::open(from).map_err(CopyError::Source)?;

        // Copy under a temporary name first so a half-written file never
        // shows up under the final name.
        let mut temp = to.to_path_buf();
        temp.set_file_name(format!(".renbatch-{}.tmp", Uuid::new_v4()));

        let result = write_copy(&mut reader, &temp, modified)
            .and_then(|()| {
                // Applied last so a read-only source still gets its mtime
                std::fs::set_permissions(&temp, metadata.permissions())
                    .map_err(CopyError::Destination)
            })
            .and_then(|()| std::fs::rename(&temp, to).map_err(CopyError::Destination));

        if result.is_err() {
            let _ = std::fs::remove_file(&temp);
        }
        result
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = std::fs::metadata(path)?;
        Ok(FileStat {
            is_file: metadata.is_file(),
            size: metadata.len(),
            modified: metadata.modified()?,
        })
    }

    fn is_case_sensitive(&self, _path: &Path) -> bool {
        self.case_sensitive
    }
}

fn write_copy(reader: &mut File, temp: &Path, modified: SystemTime) -> Result<(), CopyError> {
    let mut writer = File::create_new(temp).map_err(CopyError::Destination)?;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Source(e)),
        };
        writer.write_all(&buf[..n]).map_err(CopyError::Destination)?;
    }
    writer.set_modified(modified).map_err(CopyError::Destination)
}

/// Comparable form of a path: parent resolved through symlinks when it
/// exists, and lowercased on case-insensitive filesystems.
pub fn comparable_path<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> PathBuf {
    let resolved = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            match fs.canonicalize(parent) {
                Ok(parent) => parent.join(name),
                Err(_) => path.to_path_buf(),
            }
        }
        _ => path.to_path_buf(),
    };

    if fs.is_case_sensitive(path) {
        resolved
    } else {
        PathBuf::from(resolved.to_string_lossy().to_lowercase())
    }
}

pub fn same_path<F: FileSystem + ?Sized>(fs: &F, a: &Path, b: &Path) -> bool {
    a == b || comparable_path(fs, a) == comparable_path(fs, b)
}

/// Whether two directories are the same one, following symlinks.
pub fn same_directory<F: FileSystem + ?Sized>(fs: &F, a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs.canonicalize(a), fs.canonicalize(b)) {
        (Ok(a), Ok(b)) if fs.is_case_sensitive(&a) => a == b,
        (Ok(a), Ok(b)) => a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase(),
        _ => false,
    }
}
