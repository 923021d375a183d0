use common::{Path, RepoError};
use std::collections::BTreeSet;
use std::fmt;

/// Maps the subtree under a path in the federated workspace onto the subtree under a path in a
/// source, minus any exception subtrees.
///
/// Exception paths are relative to the source path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathRule {
    repository_path: Path,
    source_path: Path,
    exceptions: Vec<Path>,
}

impl PathRule {
    /// Creates a new rule.
    ///
    /// # Arguments
    ///
    /// * `repository_path` - Absolute path where the content appears in the federated workspace.
    /// * `source_path` - Absolute path of the content in the source.
    /// * `exceptions` - Relative paths under the source path that the rule does not cover.
    pub fn new(repository_path: Path, source_path: Path, exceptions: Vec<Path>) -> Result<Self, RepoError> {
        if !repository_path.is_absolute() || !source_path.is_absolute() {
            return Err(RepoError::InvalidRule(format!(
                "Rule paths must be absolute: '{}' => '{}'",
                repository_path, source_path
            )));
        }
        if let Some(absolute) = exceptions.iter().find(|e| e.is_absolute()) {
            return Err(RepoError::InvalidRule(format!(
                "Exception path '{}' is not relative",
                absolute
            )));
        }
        Ok(PathRule {
            repository_path,
            source_path,
            exceptions,
        })
    }

    /// Parses `<repository path> => <source path>` followed by any number of `$ <exception>`.
    pub fn parse(definition: &str) -> Result<Self, RepoError> {
        let definition = definition.trim();
        let invalid = || {
            RepoError::InvalidRule(format!(
                "Expected '<repository path> => <source path>' but found '{}'",
                definition
            ))
        };
        let mut sides = definition.splitn(2, "=>");
        let repository = sides
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(invalid)?;
        let rest = sides.next().ok_or_else(invalid)?;
        if rest.contains("=>") {
            return Err(invalid());
        }
        let mut pieces = rest.split('$').map(str::trim);
        let source = pieces
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(invalid)?;
        let mut exceptions = Vec::new();
        for piece in pieces {
            if piece.is_empty() {
                return Err(invalid());
            }
            exceptions.push(parse_path(piece, definition)?);
        }
        PathRule::new(
            parse_path(repository, definition)?,
            parse_path(source, definition)?,
            exceptions,
        )
    }

    pub fn repository_path(&self) -> &Path {
        &self.repository_path
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn exceptions(&self) -> &[Path] {
        &self.exceptions
    }

    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }

    /// True if the source path lies at or below the rule's source path and outside every exception.
    pub fn includes(&self, path_in_source: &Path) -> bool {
        match path_in_source.relative_to(&self.source_path) {
            None => false,
            Some(sub) if sub.is_empty() => true,
            Some(sub) => !self.exceptions.iter().any(|e| sub.is_at_or_below(e)),
        }
    }

    /// Repository paths that are roots of the content this rule exposes.
    pub fn top_level_paths_in_repository(&self) -> Vec<Path> {
        vec![self.repository_path.clone()]
    }

    pub fn is_top_level_path(&self, path: &Path) -> bool {
        self.repository_path == *path
    }

    /// Translates a repository path into the source, or `None` if the rule does not cover it.
    pub fn path_in_source(&self, path_in_repository: &Path) -> Option<Path> {
        let relative = path_in_repository.relative_to(&self.repository_path)?;
        let path_in_source = self.source_path.append(&relative);
        if self.includes(&path_in_source) {
            Some(path_in_source)
        } else {
            None
        }
    }

    /// Translates a source path into the repository, or `None` if the rule does not cover it.
    pub fn path_in_repository(&self, path_in_source: &Path) -> Option<Path> {
        if !self.includes(path_in_source) {
            return None;
        }
        let relative = path_in_source.relative_to(&self.source_path)?;
        Some(self.repository_path.append(&relative))
    }
}

fn parse_path(text: &str, definition: &str) -> Result<Path, RepoError> {
    Path::parse(text).map_err(|e| RepoError::InvalidRule(format!("{} in rule '{}'", e, definition)))
}

impl fmt::Display for PathRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} => {}", self.repository_path, self.source_path)?;
        for exception in &self.exceptions {
            write!(f, " $ {}", exception)?;
        }
        Ok(())
    }
}

/// The rules projecting one workspace of one source into a federated workspace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    source_name: String,
    workspace_name: Option<String>,
    read_only: bool,
    rules: Vec<PathRule>,
    simple: bool,
}

impl Projection {
    /// Creates a new projection.
    ///
    /// # Arguments
    ///
    /// * `source_name` - Name of the source the content comes from.
    /// * `workspace_name` - Workspace in the source, or `None` for its default workspace.
    /// * `read_only` - Whether federated clients may change the projected content.
    /// * `rules` - Rules, in the order they are applied.
    pub fn new(source_name: &str, workspace_name: Option<&str>, read_only: bool, rules: Vec<PathRule>) -> Self {
        let simple = is_simple(&rules);
        Projection {
            source_name: source_name.to_string(),
            workspace_name: workspace_name.map(String::from),
            read_only,
            rules,
            simple,
        }
    }

    pub fn parse_rule(definition: &str) -> Result<PathRule, RepoError> {
        PathRule::parse(definition)
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn workspace_name(&self) -> Option<&str> {
        self.workspace_name.as_deref()
    }

    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// True when no rule's repository path lies at or below another's.
    pub fn is_simple(&self) -> bool {
        self.simple
    }

    /// All source paths the repository path maps to; empty when no rule applies.
    pub fn paths_in_source(&self, path_in_repository: &Path) -> BTreeSet<Path> {
        self.rules
            .iter()
            .filter_map(|rule| rule.path_in_source(path_in_repository))
            .collect()
    }

    /// All repository paths the source path maps to; empty when no rule applies.
    pub fn paths_in_repository(&self, path_in_source: &Path) -> BTreeSet<Path> {
        self.rules
            .iter()
            .filter_map(|rule| rule.path_in_repository(path_in_source))
            .collect()
    }

    /// Top-level repository paths of every rule, in rule order and without duplicates.
    pub fn top_level_paths_in_repository(&self) -> Vec<Path> {
        let mut paths: Vec<Path> = Vec::new();
        for path in self.rules.iter().flat_map(|r| r.top_level_paths_in_repository()) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    pub fn is_top_level_path(&self, path: &Path) -> bool {
        self.rules.iter().any(|r| r.is_top_level_path(path))
    }
}

fn is_simple(rules: &[PathRule]) -> bool {
    for (i, rule) in rules.iter().enumerate() {
        for other in &rules[i + 1..] {
            let (a, b) = (rule.repository_path(), other.repository_path());
            if a.is_at_or_above(b) || b.is_at_or_above(a) {
                return false;
            }
        }
    }
    true
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(workspace) = &self.workspace_name {
            write!(f, "{}@", workspace)?;
        }
        let rules: Vec<String> = self.rules.iter().map(|r| r.to_string()).collect();
        write!(f, "{} {{ {} }}", self.source_name, rules.join(" ; "))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn path(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    fn paths(texts: &[&str]) -> BTreeSet<Path> {
        texts.iter().map(|t| path(t)).collect()
    }

    fn projection(rules: &[&str]) -> Projection {
        let rules = rules.iter().map(|r| PathRule::parse(r).unwrap()).collect();
        Projection::new("source1", Some("ws"), false, rules)
    }

    #[test]
    fn test_rule_round_trips() {
        for text in &["/a/b/c => /x/y", "/ => /", "/a => /", "/ => /b", "/a/b/c => /x/y $ e/f $ e/g"] {
            let rule = Projection::parse_rule(text).unwrap();
            assert_eq!(*text, rule.to_string());
            assert_eq!(rule, PathRule::parse(&rule.to_string()).unwrap());
        }
        let rule = PathRule::parse("  /a/b/c=>/x/y$e/f  ").unwrap();
        assert_eq!(&path("/a/b/c"), rule.repository_path());
        assert_eq!(&path("/x/y"), rule.source_path());
        assert_eq!(&[path("e/f")], rule.exceptions());
    }

    #[test]
    fn test_malformed_rules() {
        for text in &["", "/a", "/a => ", " => /b", "/a => /b => /c", "/a => /b $ ", "/a => /b $ /e", "a => /b"] {
            match PathRule::parse(text) {
                Err(RepoError::InvalidRule(_)) => {}
                other => panic!("expected an invalid rule for '{}', got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_paths_in_source_and_repository() {
        let projection = projection(&["/a/b => /c/d"]);
        assert_eq!(paths(&["/c/d/x"]), projection.paths_in_source(&path("/a/b/x")));
        assert_eq!(paths(&["/c/d"]), projection.paths_in_source(&path("/a/b")));
        assert_eq!(paths(&["/a/b/x"]), projection.paths_in_repository(&path("/c/d/x")));
        assert!(projection.paths_in_source(&path("/a/c")).is_empty());
        assert!(projection.paths_in_source(&path("/a")).is_empty());
        assert!(projection.paths_in_repository(&path("/c")).is_empty());
    }

    #[test]
    fn test_root_rules() {
        let mirror = projection(&["/ => /"]);
        assert_eq!(paths(&["/x/y"]), mirror.paths_in_source(&path("/x/y")));
        assert_eq!(paths(&["/"]), mirror.paths_in_repository(&path("/")));

        let offset = projection(&["/a => /"]);
        assert_eq!(paths(&["/"]), offset.paths_in_source(&path("/a")));
        assert_eq!(paths(&["/b"]), offset.paths_in_source(&path("/a/b")));
        assert_eq!(paths(&["/a/b"]), offset.paths_in_repository(&path("/b")));
    }

    #[test]
    fn test_exceptions() {
        let projection = projection(&["/a => /b $ e/f"]);
        assert_eq!(paths(&["/b/e"]), projection.paths_in_source(&path("/a/e")));
        assert!(projection.paths_in_source(&path("/a/e/f")).is_empty());
        assert!(projection.paths_in_source(&path("/a/e/f/g")).is_empty());
        assert!(projection.paths_in_repository(&path("/b/e/f")).is_empty());
        assert_eq!(paths(&["/a"]), projection.paths_in_repository(&path("/b")));
    }

    #[test]
    fn test_multiple_rules() {
        let projection = projection(&["/a => /x", "/b => /x", "/a => /y"]);
        assert_eq!(paths(&["/x/1", "/y/1"]), projection.paths_in_source(&path("/a/1")));
        assert_eq!(paths(&["/a/1", "/b/1"]), projection.paths_in_repository(&path("/x/1")));
        assert_eq!(vec![path("/a"), path("/b")], projection.top_level_paths_in_repository());
        assert!(projection.is_top_level_path(&path("/b")));
        assert!(!projection.is_top_level_path(&path("/a/1")));
        assert!(!projection.is_simple());
        assert!(projection_is_simple(&["/a => /x", "/b => /y"]));
        assert!(!projection_is_simple(&["/a => /x", "/a/b => /y"]));
    }

    fn projection_is_simple(rules: &[&str]) -> bool {
        projection(rules).is_simple()
    }

    #[test]
    fn test_display() {
        let projection = projection(&["/a => /b", "/ => /c $ d"]);
        assert_eq!("ws@source1 { /a => /b ; / => /c $ d }", projection.to_string());
        let unnamed = Projection::new("s", None, true, vec![PathRule::parse("/ => /").unwrap()]);
        assert_eq!("s { / => / }", unnamed.to_string());
    }
}
