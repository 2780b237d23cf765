//! Parsing of human-typed function names.
//!
//! Queries look like `group/name@version`, where both the group and the
//! version are optional and the group may itself contain slashes or `@`
//! signs (e.g. a host-qualified group like `example@git.com`).

use std::fmt;

/// A parsed function name query.
///
/// Parsing is total: any input string decomposes into some combination of
/// group, name, and version, with missing parts left empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FunctionName {
    /// Dotted namespace, possibly containing slashes. Empty if the query
    /// carried no `/`.
    pub group: String,
    /// The function's kind name.
    pub name: String,
    /// Requested version label. Empty if the query carried no `@`.
    pub version: String,
}

impl FunctionName {
    /// Parse a query string into its group, name, and version parts.
    ///
    /// The rightmost `@` splits off the version; the rightmost `/` of the
    /// remainder then splits the group from the name. This never fails:
    /// `"name"` has no group or version, `"a.b/c/name"` keeps `a.b/c` as
    /// the group, and `"group@git.com/name@v1"` resolves the group to
    /// `group@git.com` because only the last `@` is consumed by the
    /// version split.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let (rest, version) = match query.rfind('@') {
            Some(at) => (&query[..at], &query[at + 1..]),
            None => (query, ""),
        };

        let (group, name) = match rest.rfind('/') {
            Some(slash) => (&rest[..slash], &rest[slash + 1..]),
            None => ("", rest),
        };

        Self {
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    /// The qualified name, `group/name`, or just `name` when the group is
    /// empty. Qualified names are the unique key across catalogs and the
    /// installed set.
    #[must_use]
    pub fn qualified(&self) -> String {
        if self.group.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.group, self.name)
        }
    }

    /// True if the query pinned an explicit version.
    #[must_use]
    pub fn has_version(&self) -> bool {
        !self.version.is_empty()
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified())?;
        if !self.version.is_empty() {
            write!(f, "@{}", self.version)?;
        }
        Ok(())
    }
}
