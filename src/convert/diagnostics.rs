//! Non-fatal conversion findings.
//!
//! Every diagnostic is attached to the input that caused it, mirrored to the
//! `log` facade and forwarded to the session callback without interrupting
//! the batch.

use std::fmt;

use crate::geom::GeometryValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Remark,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remark => "remark",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// The geometry cannot be represented on the other side at all.
    UnsupportedGeometry,
    /// Converted, but with degraded accuracy.
    ToleranceViolation,
    /// Part of a solid was dropped; the rest was kept.
    PartialAssemblyFailure,
    /// A host service rejected its input.
    HostPlatformFailure,
    /// A cache entry was found unusable and treated as a miss.
    CacheInconsistency,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// The offending input, when there is one to point at.
    pub subject: Option<GeometryValue>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            subject: None,
        }
    }

    #[must_use]
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, message)
    }

    #[must_use]
    pub fn remark(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Remark, kind, message)
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<GeometryValue>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}): {}", self.severity, self.kind, self.message)?;
        if let Some(subject) = &self.subject {
            write!(f, " [{}]", subject.kind_name())?;
        }
        Ok(())
    }
}

pub type DiagnosticCallback = Box<dyn FnMut(&Diagnostic)>;

/// Collected diagnostics plus the caller's optional callback.
#[derive(Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    callback: Option<DiagnosticCallback>,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("entries", &self.entries)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl Diagnostics {
    pub fn set_callback(&mut self, callback: Option<DiagnosticCallback>) {
        self.callback = callback;
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Remark => log::info!("{diagnostic}"),
            Severity::Warning | Severity::Error => log::warn!("{diagnostic}"),
        }
        if let Some(callback) = self.callback.as_mut() {
            callback(&diagnostic);
        }
        self.entries.push(diagnostic);
    }

    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns everything collected so far.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}
