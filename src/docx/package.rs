use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, TemplateError};

/// In-memory copy of every zip entry of a docx package, in archive order.
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path) -> Result<Self> {
        let open_err = |message: String| TemplateError::PackageOpen {
            path: path.to_path_buf(),
            message,
        };
        let f = File::open(path).map_err(|e| open_err(e.to_string()))?;
        Self::from_reader(f).map_err(|e| match e {
            TemplateError::PackageOpen { message, .. } => open_err(message),
            other => other,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let open_err = |message: String| TemplateError::PackageOpen {
            path: Default::default(),
            message,
        };
        let mut zip = ZipArchive::new(reader).map_err(|e| open_err(format!("read zip: {e}")))?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| open_err(format!("zip entry {i}: {e}")))?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| open_err(format!("read zip entry {}: {e}", file.name())))?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Replaces the bytes of an existing entry, keeping its zip metadata, or appends a new
    /// deflated entry.
    pub fn set(&mut self, name: &str, data: Vec<u8>) {
        if let Some(ent) = self.entries.iter_mut().find(|e| e.name == name) {
            ent.data = data;
            return;
        }
        self.entries.push(DocxEntry {
            name: name.to_string(),
            data,
            compression: CompressionMethod::Deflated,
            last_modified: zip::DateTime::default(),
            unix_mode: None,
            is_dir: false,
        });
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    pub fn write_to<W: Write + Seek>(&self, sink: W) -> Result<W> {
        let mut zout = ZipWriter::new(sink);
        for ent in &self.entries {
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(ent.name.as_str(), opts)
                    .map_err(|e| TemplateError::archive(format!("add zip dir: {}", ent.name), e))?;
            } else {
                zout.start_file(ent.name.as_str(), opts)
                    .map_err(|e| TemplateError::archive(format!("start zip file: {}", ent.name), e))?;
                zout.write_all(&ent.data).map_err(|e| TemplateError::Io {
                    path: ent.name.clone().into(),
                    source: e,
                })?;
            }
        }
        zout.finish()
            .map_err(|e| TemplateError::archive("finish zip", e))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }
}
