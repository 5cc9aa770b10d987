//! Template session: one loaded package, mutated in place by the substitution engines and
//! serialized once by [`TemplateProcessor::generate`].

mod block;
mod chart;
mod checkbox;
mod image;
mod list;
mod rows;
mod text;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::docx::ns;
use crate::docx::package::DocxPackage;
use crate::docx::rels::Relationships;
use crate::docx::repair::{discover_markers, repair_part};
use crate::docx::xml::{parse_xml_part, write_xml_part, XmlPart};
use crate::error::{Result, TemplateError};
use crate::logging::{ConsoleLog, LogSink};

pub use chart::ChartOptions;

const DEFAULT_MAIN_PART: &str = "word/document.xml";
const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Delimiter written on both sides of a marker name.
    pub marker_symbol: String,
    /// Marker names to repair at load time when Word split them over several runs.
    pub variables: Vec<String>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            marker_symbol: "$".to_string(),
            variables: Vec::new(),
        }
    }
}

impl TemplateOptions {
    pub fn validate(&self) -> Result<()> {
        if self.marker_symbol.is_empty() {
            return Err(TemplateError::InvalidOptions("marker symbol is empty".to_string()));
        }
        if self.marker_symbol.contains(['<', '>', '&', '"', '\'']) || self.marker_symbol.contains(char::is_whitespace) {
            return Err(TemplateError::InvalidOptions(format!(
                "marker symbol {:?} contains markup or whitespace",
                self.marker_symbol
            )));
        }
        Ok(())
    }
}

pub struct TemplateProcessor {
    package: DocxPackage,
    options: TemplateOptions,
    main_part: String,
    core_part: Option<String>,
    working_set: Vec<String>,
    parts: HashMap<String, XmlPart>,
    dirty: BTreeSet<String>,
    log: Box<dyn LogSink>,
}

/// The main document part plus its header and footer parts, in relationship order.
pub fn select_parts(doc_rels: &Relationships) -> Result<Vec<String>> {
    let mut parts = vec![doc_rels.source.clone()];
    for rel in &doc_rels.entries {
        if rel.rel_type != ns::REL_HEADER && rel.rel_type != ns::REL_FOOTER {
            continue;
        }
        let target = doc_rels.part_for_id(&rel.id)?;
        if !parts.contains(&target) {
            parts.push(target);
        }
    }
    Ok(parts)
}

fn load_part<'a>(
    parts: &'a mut HashMap<String, XmlPart>,
    package: &DocxPackage,
    name: &str,
) -> Result<&'a mut XmlPart> {
    if !parts.contains_key(name) {
        let bytes = package
            .get(name)
            .ok_or_else(|| TemplateError::unresolved(name, "part is missing from the package"))?;
        parts.insert(name.to_string(), parse_xml_part(name, bytes)?);
    }
    parts
        .get_mut(name)
        .ok_or_else(|| TemplateError::unresolved(name, "part is missing from the package"))
}

impl TemplateProcessor {
    pub fn load(path: &Path, options: TemplateOptions) -> Result<Self> {
        Self::load_with_log(path, options, Box::new(ConsoleLog::new(true)))
    }

    pub fn load_with_log(path: &Path, options: TemplateOptions, log: Box<dyn LogSink>) -> Result<Self> {
        match DocxPackage::read(path) {
            Ok(package) => Self::open(package, options, log),
            Err(e) => {
                log.fatal(&e.to_string());
                Err(e)
            }
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, options: TemplateOptions, log: Box<dyn LogSink>) -> Result<Self> {
        match DocxPackage::from_bytes(bytes) {
            Ok(package) => Self::open(package, options, log),
            Err(e) => {
                log.fatal(&e.to_string());
                Err(e)
            }
        }
    }

    fn open(package: DocxPackage, options: TemplateOptions, log: Box<dyn LogSink>) -> Result<Self> {
        let mut session = Self {
            package,
            options,
            main_part: DEFAULT_MAIN_PART.to_string(),
            core_part: None,
            working_set: Vec::new(),
            parts: HashMap::new(),
            dirty: BTreeSet::new(),
            log,
        };
        let r = session.prepare();
        session.report(r)?;
        Ok(session)
    }

    fn prepare(&mut self) -> Result<()> {
        self.options.validate()?;

        let root = Relationships::load(&self.package, "")?;
        if let Some(rel) = root.resolve_by_type(ns::REL_OFFICE_DOCUMENT).next() {
            if let Some(target) = root.target_part(rel) {
                self.main_part = target;
            }
        }
        self.core_part = root
            .resolve_by_type(ns::REL_CORE_PROPERTIES)
            .find_map(|rel| root.target_part(rel))
            .or_else(|| Some(CORE_PROPERTIES_PART.to_string()))
            .filter(|p| self.package.contains(p));
        if !self.package.contains(&self.main_part) {
            return Err(TemplateError::unresolved(
                "_rels/.rels",
                format!("main document part {} is missing", self.main_part),
            ));
        }

        let doc_rels = Relationships::load(&self.package, &self.main_part)?;
        self.working_set = select_parts(&doc_rels)?;

        for name in self.working_set.clone() {
            let part = load_part(&mut self.parts, &self.package, &name)?;
            if repair_part(part, &self.options.variables, &self.options.marker_symbol) {
                self.dirty.insert(name);
            }
        }
        Ok(())
    }

    fn report<T>(&self, r: Result<T>) -> Result<T> {
        if let Err(e) = &r {
            self.log.fatal(&e.to_string());
        }
        r
    }

    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    pub fn main_part(&self) -> &str {
        &self.main_part
    }

    /// Parts that text, list and image substitution operate on.
    pub fn working_set(&self) -> &[String] {
        &self.working_set
    }

    pub fn marker(&self, name: &str) -> String {
        format!("{0}{name}{0}", self.options.marker_symbol)
    }

    /// Current state of a part, including edits that have not been serialized yet.
    pub fn part_xml(&self, name: &str) -> Result<String> {
        let bytes = match self.parts.get(name) {
            Some(part) if self.dirty.contains(name) => write_xml_part(part)?,
            _ => self
                .package
                .get(name)
                .ok_or_else(|| TemplateError::unresolved(name, "part is missing from the package"))?
                .to_vec(),
        };
        String::from_utf8(bytes).map_err(|e| TemplateError::malformed(name, e))
    }

    /// Marker names found in the working set, split markers included.
    pub fn template_variables(&self) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for name in &self.working_set {
            if let Some(part) = self.parts.get(name) {
                for var in discover_markers(part, &self.options.marker_symbol) {
                    if !found.contains(&var) {
                        found.push(var);
                    }
                }
            }
        }
        found
    }

    /// Repairs split occurrences of `names` across the working set; `names` join the declared
    /// variables. Returns whether any part changed.
    pub fn repair(&mut self, names: &[String]) -> bool {
        let mut changed = false;
        for name in &self.working_set {
            if let Some(part) = self.parts.get_mut(name) {
                if repair_part(part, names, &self.options.marker_symbol) {
                    self.dirty.insert(name.clone());
                    changed = true;
                }
            }
        }
        for name in names {
            if !self.options.variables.contains(name) {
                self.options.variables.push(name.clone());
            }
        }
        changed
    }

    fn flush(&mut self) -> Result<()> {
        for name in std::mem::take(&mut self.dirty) {
            if let Some(part) = self.parts.get(&name) {
                let bytes = write_xml_part(part)?;
                self.package.set(&name, bytes);
            }
        }
        Ok(())
    }

    /// Serializes the finished package into memory.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let r = self.flush().and_then(|_| self.package.to_bytes());
        self.report(r)
    }

    /// Writes the finished package to `output_name`, adding a `.docx` extension when missing.
    pub fn generate(&mut self, output_name: &str) -> Result<PathBuf> {
        let r = self.generate_inner(output_name);
        self.report(r)
    }

    fn generate_inner(&mut self, output_name: &str) -> Result<PathBuf> {
        if output_name.trim().is_empty() {
            return Err(TemplateError::OutputNameMissing);
        }
        let mut path = PathBuf::from(output_name);
        let has_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("docx"));
        if !has_ext {
            path = PathBuf::from(format!("{output_name}.docx"));
        }
        if path.exists() {
            self.log.info(&format!("overwriting existing file {}", path.display()));
        }

        self.flush()?;
        let bytes = self.package.to_bytes()?;
        std::fs::write(&path, bytes).map_err(|e| TemplateError::Io {
            path: path.clone(),
            source: e,
        })?;
        self.log.info(&format!("wrote {}", path.display()));
        Ok(path)
    }
}
