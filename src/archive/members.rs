use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};
use tracing::debug;
use zip::ZipArchive;

use crate::error::Result;

/// Text members worth reading: `.txt` extension and not a readme.
pub fn is_eligible_member(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".txt") && !lower.contains("readme")
}

/// An opened zip archive from which eligible text members are read one at a time.
pub struct MemberArchive {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl MemberArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let archive = ZipArchive::new(file)?;
        Ok(Self { path, archive })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of eligible file members, in archive order.
    pub fn eligible_members(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for i in 0..self.archive.len() {
            let entry = self.archive.by_index(i)?;
            let name = entry.name().to_string();
            if entry.is_file() && is_eligible_member(&name) {
                names.push(name);
            } else {
                debug!(zip = %self.path.display(), member = %name, "skipping member");
            }
        }
        Ok(names)
    }

    /// Read one member fully into memory.
    pub fn read_member(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut entry = self.archive.by_name(name)?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use zip::write::SimpleFileOptions;

    #[test]
    fn eligibility_filters_readme_and_extension() {
        assert!(is_eligible_member("FFIEC CDR Call Bulk POR 12312019.txt"));
        assert!(is_eligible_member("Summary Ratios.TXT"));
        assert!(!is_eligible_member("Readme.txt"));
        assert!(!is_eligible_member("docs/README_2019.txt"));
        assert!(!is_eligible_member("schedule.csv"));
    }

    #[test]
    fn lists_and_reads_eligible_members() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        {
            let mut zip = zip::ZipWriter::new(tmp.as_file_mut());
            let options = SimpleFileOptions::default();
            zip.add_directory("sub/", options)?;
            zip.start_file("sub/data.txt", options)?;
            zip.write_all(b"a\tb\n1\t2\n")?;
            zip.start_file("readme.txt", options)?;
            zip.write_all(b"ignore me")?;
            zip.start_file("other.dat", options)?;
            zip.write_all(b"ignore me too")?;
            zip.finish()?;
        }

        let mut archive = MemberArchive::open(tmp.path())?;
        let names = archive.eligible_members()?;
        assert_eq!(names, vec!["sub/data.txt"]);
        assert_eq!(archive.read_member("sub/data.txt")?, b"a\tb\n1\t2\n");
        Ok(())
    }
}
