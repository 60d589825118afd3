use std::fmt;

use itertools::Itertools;
use thiserror::Error;

/// A non-fatal finding of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error(
        "class '{class}' resolves the path '{path}' more than once, for members {}",
        .members.iter().map(|m| format!("'{m}'")).join(", ")
    )]
    DuplicatePath {
        class: String,
        path: String,
        members: Vec<String>,
    },
    #[error(
        "class '{class}' has marked members but does not derive from '{root}', the markers are ignored"
    )]
    MarkerOutsideHierarchy { class: String, root: String },
    #[error("class '{class}' is already wired, it was left unchanged")]
    AlreadyWired { class: String },
    #[error("no wired members found, the module was left unchanged")]
    NoMappingsFound,
}

impl Diagnostic {
    pub fn is_warning(&self) -> bool {
        !matches!(self, Self::AlreadyWired { .. } | Self::NoMappingsFound)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dump(&self) {
        let mut warnings = 0;
        for diagnostic in self {
            if diagnostic.is_warning() {
                log::warn!("{diagnostic}");
                warnings += 1;
            } else {
                log::info!("{diagnostic}");
            }
        }
        log::info!("Completed with {warnings} warnings");
    }

    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }
}

impl IntoIterator for Diagnostics {
    type IntoIter = std::vec::IntoIter<Diagnostic>;
    type Item = Diagnostic;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type IntoIter = std::slice::Iter<'a, Diagnostic>;
    type Item = &'a Diagnostic;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in self {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}
