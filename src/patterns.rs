//! Glob matching for file and directory names
//!
//! Ignored names and exclude patterns are simple globs over a single path
//! segment (`*` any run, `?` one character, everything else literal). Each
//! set of globs is compiled once into a `RegexSet`.

use regex::RegexSet;

use crate::error::{IndexError, Result};

/// Convert a name glob to an anchored regex
///
/// `*` and `?` never cross a path separator.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

/// A compiled set of name globs
#[derive(Debug, Clone)]
pub struct NamePatterns {
    globs: Vec<String>,
    set: RegexSet,
}

impl NamePatterns {
    /// Compile a list of globs; blank entries are skipped
    pub fn new<I, S>(globs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let globs: Vec<String> = globs
            .into_iter()
            .map(|g| g.as_ref().trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();

        let set = RegexSet::new(globs.iter().map(|g| glob_to_regex(g))).map_err(|e| {
            IndexError::InvalidPattern {
                pattern: globs.join(";"),
                message: e.to_string(),
            }
        })?;

        Ok(Self { globs, set })
    }

    /// Parse a `;`-separated list such as `CVS;.git;*.pyc`
    pub fn parse_list(list: &str) -> Result<Self> {
        Self::new(list.split(';'))
    }

    /// An empty set that matches nothing
    pub fn empty() -> Self {
        Self {
            globs: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// Whether `name` matches any glob
    pub fn matches(&self, name: &str) -> bool {
        !self.globs.is_empty() && self.set.is_match(name)
    }

    /// The source globs
    pub fn globs(&self) -> &[String] {
        &self.globs
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }
}

impl Default for NamePatterns {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for NamePatterns {
    fn eq(&self, other: &Self) -> bool {
        self.globs == other.globs
    }
}

impl Eq for NamePatterns {}
