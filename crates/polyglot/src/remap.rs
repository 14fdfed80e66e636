//! Mapping backend diagnostics back onto submission buffers.
//!
//! A backend rarely compiles a buffer on its own. It wraps one or more
//! buffers in scaffold code and reports diagnostics against that generated
//! unit. [`GeneratedUnitBuilder`] records where each buffer lands while the
//! unit is composed, and [`DiagnosticRemapper`] uses those regions to move a
//! diagnostic from generated coordinates back to the buffer it came from.
//!
//! Diagnostics that land in scaffold code, in a masked buffer, or in another
//! file are dropped.
//!
//! Lines and columns are zero-based throughout; columns count characters.
//! Only the formatted output (see [`RemappedDiagnostic`]'s `Display`) is
//! one-based.

use std::fmt;

use indexmap::IndexMap;
use log::{debug, trace, warn};

use polyglot_parser::{Span, error::Severity};

/// Where one buffer's text sits inside a generated unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferRegion {
    buffer_id: String,
    file: String,
    span: Span,
    active: bool,
}

impl BufferRegion {
    pub fn new(
        buffer_id: impl Into<String>,
        file: impl Into<String>,
        insertion_offset: usize,
        length: usize,
    ) -> Self {
        Self {
            buffer_id: buffer_id.into(),
            file: file.into(),
            span: Span::new(insertion_offset..insertion_offset + length),
            active: true,
        }
    }

    /// Marks the region as masked; its diagnostics are never surfaced.
    pub fn masked(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn buffer_id(&self) -> &str {
        &self.buffer_id
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn insertion_offset(&self) -> usize {
        self.span.start()
    }

    pub fn length(&self) -> usize {
        self.span.len()
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// A generated compilation unit and the regions its buffers occupy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    file: String,
    source: String,
    regions: Vec<BufferRegion>,
}

impl GeneratedUnit {
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn regions(&self) -> &[BufferRegion] {
        &self.regions
    }

    pub fn region(&self, buffer_id: &str) -> Option<&BufferRegion> {
        self.regions
            .iter()
            .find(|region| region.buffer_id == buffer_id)
    }

    /// A remapper for diagnostics reported against this unit.
    pub fn remapper(&self) -> DiagnosticRemapper<'_> {
        DiagnosticRemapper::new(&self.source, &self.file, self.regions.iter().cloned())
    }
}

/// Composes scaffold text and buffers into a [`GeneratedUnit`].
///
/// ```
/// use polyglot::remap::GeneratedUnitBuilder;
///
/// let unit = GeneratedUnitBuilder::new("Program.cs")
///     .scaffold("class C {\n")
///     .buffer("body", "void M() { }\n")
///     .scaffold("}\n")
///     .build();
///
/// assert_eq!(unit.region("body").unwrap().insertion_offset(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct GeneratedUnitBuilder {
    file: String,
    source: String,
    regions: Vec<BufferRegion>,
}

impl GeneratedUnitBuilder {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            source: String::new(),
            regions: Vec::new(),
        }
    }

    /// Appends text that belongs to no buffer.
    pub fn scaffold(mut self, text: &str) -> Self {
        self.source.push_str(text);
        self
    }

    /// Appends a buffer whose diagnostics are surfaced.
    pub fn buffer(self, buffer_id: impl Into<String>, text: &str) -> Self {
        self.push_buffer(buffer_id.into(), text, true)
    }

    /// Appends a buffer that is compiled but whose diagnostics are hidden.
    pub fn masked_buffer(self, buffer_id: impl Into<String>, text: &str) -> Self {
        self.push_buffer(buffer_id.into(), text, false)
    }

    pub fn build(self) -> GeneratedUnit {
        debug!(
            file = self.file.as_str(),
            bytes = self.source.len(),
            regions = self.regions.len();
            "Composed generated unit"
        );
        GeneratedUnit {
            file: self.file,
            source: self.source,
            regions: self.regions,
        }
    }

    fn push_buffer(mut self, buffer_id: String, text: &str, active: bool) -> Self {
        let mut region =
            BufferRegion::new(buffer_id, self.file.clone(), self.source.len(), text.len());
        region.active = active;
        self.regions.push(region);
        self.source.push_str(text);
        self
    }
}

/// A diagnostic as reported by a backend, in generated coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDiagnostic {
    line: usize,
    column: usize,
    severity: Severity,
    code: String,
    message: String,
    file: Option<String>,
}

impl BackendDiagnostic {
    pub fn new(
        line: usize,
        column: usize,
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            line,
            column,
            severity,
            code: code.into(),
            message: message.into(),
            file: None,
        }
    }

    pub fn error(
        line: usize,
        column: usize,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(line, column, Severity::Error, code, message)
    }

    /// Attributes the diagnostic to a specific generated file.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }
}

/// A diagnostic relocated into a buffer's own coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemappedDiagnostic {
    buffer_id: String,
    line: usize,
    column: usize,
    severity: Severity,
    code: String,
    message: String,
}

impl RemappedDiagnostic {
    pub fn buffer_id(&self) -> &str {
        &self.buffer_id
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RemappedDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({},{}): {} {}: {}",
            self.buffer_id,
            self.line + 1,
            self.column + 1,
            self.severity,
            self.code,
            self.message
        )
    }
}

/// Remapped diagnostics grouped by buffer.
///
/// Groups follow the order the buffers appear in the generated unit; each
/// group is sorted by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemappedDiagnostics {
    groups: IndexMap<String, Vec<RemappedDiagnostic>>,
}

impl RemappedDiagnostics {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of diagnostics across all buffers.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.iter().any(|diag| diag.severity().is_error())
    }

    pub fn buffer(&self, buffer_id: &str) -> &[RemappedDiagnostic] {
        self.groups.get(buffer_id).map_or(&[], Vec::as_slice)
    }

    pub fn buffer_ids(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemappedDiagnostic> {
        self.groups.values().flatten()
    }

    /// One formatted line per diagnostic.
    pub fn to_lines(&self) -> Vec<String> {
        self.iter().map(ToString::to_string).collect()
    }
}

/// Moves diagnostics from generated coordinates to buffer coordinates.
#[derive(Debug, Clone)]
pub struct DiagnosticRemapper<'a> {
    source: &'a str,
    active_file: String,
    line_starts: Vec<usize>,
    regions: Vec<BufferRegion>,
}

impl<'a> DiagnosticRemapper<'a> {
    /// `source` is the generated unit the backend compiled and `active_file`
    /// the file it was compiled as. Regions in any other file are ignored.
    pub fn new(
        source: &'a str,
        active_file: impl Into<String>,
        regions: impl IntoIterator<Item = BufferRegion>,
    ) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(index, _)| index + 1))
            .collect();

        Self {
            source,
            active_file: active_file.into(),
            line_starts,
            regions: regions.into_iter().collect(),
        }
    }

    /// Remaps one diagnostic, or returns `None` when it must be dropped.
    pub fn remap(&self, diagnostic: &BackendDiagnostic) -> Option<RemappedDiagnostic> {
        if diagnostic
            .file()
            .is_some_and(|file| file != self.active_file)
        {
            return None;
        }

        let offset = self.generated_offset(diagnostic.line, diagnostic.column)?;
        let region = self.regions.iter().find(|region| {
            region.active && region.file == self.active_file && region.span.contains(offset)
        })?;

        let local = self.source.get(region.span.start()..offset)?;
        let line = local.matches('\n').count();
        let column = local
            .rfind('\n')
            .map_or(local, |index| &local[index + 1..])
            .chars()
            .count();

        trace!(
            buffer = region.buffer_id.as_str(),
            generated_offset = offset,
            line = line,
            column = column;
            "Remapped diagnostic"
        );

        Some(RemappedDiagnostic {
            buffer_id: region.buffer_id.clone(),
            line,
            column,
            severity: diagnostic.severity,
            code: diagnostic.code.clone(),
            message: diagnostic.message.clone(),
        })
    }

    /// Remaps every diagnostic, dropping those outside active buffers.
    pub fn remap_all<'d>(
        &self,
        diagnostics: impl IntoIterator<Item = &'d BackendDiagnostic>,
    ) -> RemappedDiagnostics {
        let mut groups: IndexMap<String, Vec<RemappedDiagnostic>> = self
            .regions
            .iter()
            .map(|region| (region.buffer_id.clone(), Vec::new()))
            .collect();

        let mut dropped = 0usize;
        for diagnostic in diagnostics {
            match self.remap(diagnostic) {
                Some(remapped) => groups
                    .entry(remapped.buffer_id.clone())
                    .or_default()
                    .push(remapped),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(dropped = dropped; "Dropped diagnostics outside active buffers");
        }

        groups.retain(|_, group| !group.is_empty());
        for group in groups.values_mut() {
            group.sort_by_key(|diag| (diag.line, diag.column));
        }

        RemappedDiagnostics { groups }
    }

    /// Byte offset of a zero-based line and character column.
    ///
    /// A column one past the last character of the line is allowed; anything
    /// further, or a line past the end, has no offset.
    fn generated_offset(&self, line: usize, column: usize) -> Option<usize> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map_or(self.source.len(), |next| next - 1);
        let text = self.source[start..end].trim_end_matches('\r');

        match text.char_indices().nth(column) {
            Some((index, _)) => Some(start + index),
            None if column == text.chars().count() => Some(start + text.len()),
            None => None,
        }
    }
}
