use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use zip::ZipArchive;

use crate::codespace::Codepoint;
use crate::error::Error;

/// The named-entry archive holding the pre-extracted character data
/// documents, one JSON entry per data set. Each read opens the entry,
/// consumes it fully, and releases it before returning.
#[derive(Debug)]
pub struct Bundle {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl Bundle {
    pub fn open(path: &Path) -> Result<Bundle, Error> {
        let file = File::open(path)
            .map_err(|err| format!("cannot open data bundle {}: {}", path.display(), err))?;
        let archive = ZipArchive::new(file)
            .map_err(|err| format!("{} is not a valid data bundle: {}", path.display(), err))?;
        Ok(Bundle {
            path: path.to_path_buf(),
            archive,
        })
    }

    /// Reads one entry as raw text. A missing entry is fatal and names
    /// the resource: the bundle and the generator version must agree on
    /// the data sets it carries.
    pub fn read(&mut self, name: &str) -> Result<String, Error> {
        let mut entry = self.archive.by_name(name).map_err(|_| {
            format!("data bundle {} has no entry '{}'", self.path.display(), name)
        })?;
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|err| format!("cannot read bundle entry '{}': {}", name, err))?;
        Ok(text)
    }

    /// Reads one entry and decodes it into a typed document.
    pub fn read_json<T: DeserializeOwned>(&mut self, name: &str) -> Result<T, Error> {
        let text = self.read(name)?;
        serde_json::from_str(&text)
            .map_err(|err| format!("malformed bundle entry '{}': {}", name, err).into())
    }
}

/// Parses the hex codepoint keys the data documents use ("0041", "1F600").
pub fn codepoint_from_hex(key: &str, entry: &str) -> Result<Codepoint, Error> {
    Codepoint::from_str_radix(key, 16)
        .map_err(|_| format!("bundle entry '{}' has a malformed codepoint key '{}'", entry, key).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn bundle_with(entries: &[(&str, &str)]) -> (tempfile::TempDir, Bundle) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unicode.bin");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        let bundle = Bundle::open(&path).unwrap();
        (dir, bundle)
    }

    #[test]
    fn test_read_json_entry() {
        let (_dir, mut bundle) = bundle_with(&[("ccc.json", r#"{"ccc": {"0300": 230}}"#)]);
        let value: serde_json::Value = bundle.read_json("ccc.json").unwrap();
        assert_eq!(value["ccc"]["0300"], 230);
    }

    #[test]
    fn test_missing_entry_names_the_resource() {
        let (_dir, mut bundle) = bundle_with(&[("ccc.json", "{}")]);
        let err = bundle.read("gc.json").unwrap_err();
        assert!(err.to_string().contains("no entry 'gc.json'"));
    }

    #[test]
    fn test_malformed_entry_names_the_resource() {
        let (_dir, mut bundle) = bundle_with(&[("gc.json", "not json")]);
        let err = bundle.read_json::<serde_json::Value>("gc.json").unwrap_err();
        assert!(err.to_string().contains("malformed bundle entry 'gc.json'"));
    }

    #[test]
    fn test_missing_bundle_is_fatal() {
        let err = Bundle::open(Path::new("/nonexistent/unicode.bin")).unwrap_err();
        assert!(err.to_string().contains("cannot open data bundle"));
    }

    #[test]
    fn test_codepoint_keys() {
        assert_eq!(codepoint_from_hex("0041", "x").unwrap(), 0x41);
        assert_eq!(codepoint_from_hex("1F600", "x").unwrap(), 0x1F600);
        assert!(codepoint_from_hex("zz", "x").is_err());
    }
}
