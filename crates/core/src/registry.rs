use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Default)]
struct Node {
    registered: bool,
    children: HashMap<OsString, Node>,
}

/// Nodes are only created by [`PathRegistry::register`] and never removed, so
/// every node with children has at least one registered descendant.
#[derive(Debug, Default)]
pub struct PathRegistry {
    root: Node,
    len: usize,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: impl AsRef<Path>) -> bool {
        let mut node = &mut self.root;
        for segment in segments(path.as_ref()) {
            node = node.children.entry(segment).or_default();
        }
        if node.registered {
            return false;
        }
        node.registered = true;
        self.len += 1;
        true
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.find(path.as_ref()).is_some_and(|node| node.registered)
    }

    pub fn has_registered_descendant(&self, path: impl AsRef<Path>) -> bool {
        self.find(path.as_ref())
            .is_some_and(|node| !node.children.is_empty())
    }

    pub fn covers(&self, path: impl AsRef<Path>) -> bool {
        let mut node = &self.root;
        if node.registered {
            return true;
        }
        for segment in segments(path.as_ref()) {
            match node.children.get(&segment) {
                Some(child) if child.registered => return true,
                Some(child) => node = child,
                None => return false,
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(self.len);
        let mut prefix = PathBuf::new();
        collect(&self.root, &mut prefix, &mut out);
        out
    }

    fn find(&self, path: &Path) -> Option<&Node> {
        let mut node = &self.root;
        for segment in segments(path) {
            node = node.children.get(&segment)?;
        }
        Some(node)
    }
}

fn collect(node: &Node, prefix: &mut PathBuf, out: &mut Vec<PathBuf>) {
    if node.registered {
        out.push(prefix.clone());
    }
    let mut names = node.children.keys().collect::<Vec<_>>();
    names.sort();
    for name in names {
        prefix.push(name);
        collect(&node.children[name], prefix, out);
        prefix.pop();
    }
}

pub fn segments(path: &Path) -> Vec<OsString> {
    let mut out: Vec<OsString> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str().to_os_string()),
            Component::RootDir => out.push(OsStr::new("/").to_os_string()),
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = out
                    .last()
                    .is_some_and(|last| last.as_os_str() == OsStr::new("/"));
                if !at_root {
                    out.pop();
                }
            }
            Component::Normal(name) => out.push(name.to_os_string()),
        }
    }
    out
}

pub fn normalize(path: &Path) -> PathBuf {
    segments(path).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{normalize, PathRegistry};

    #[test]
    fn registration_is_idempotent() {
        let mut registry = PathRegistry::new();
        assert!(registry.register("/Users/alice/Desktop"));
        assert!(!registry.register("/Users/alice/Desktop"));
        assert!(!registry.register("/Users/alice/Desktop/"));
        assert!(registry.contains("/Users/alice/Desktop"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn descendant_queries_are_strict() {
        let mut registry = PathRegistry::new();
        registry.register("/Users/alice/Library/Application Support/Foo");

        assert!(registry.has_registered_descendant("/"));
        assert!(registry.has_registered_descendant("/Users/alice/Library"));
        assert!(registry.has_registered_descendant("/Users/alice/Library/Application Support"));
        assert!(!registry.has_registered_descendant("/Users/alice/Library/Application Support/Foo"));
        assert!(!registry.has_registered_descendant("/Users/bob"));

        assert!(!registry.contains("/Users/alice/Library"));
        assert!(registry.contains("/Users/alice/Library/Application Support/Foo"));
    }

    #[test]
    fn ancestor_registration_keeps_descendant_visible() {
        let mut registry = PathRegistry::new();
        registry.register("/a/b/c");
        registry.register("/a/b");
        assert!(registry.contains("/a/b"));
        assert!(registry.has_registered_descendant("/a/b"));
        assert!(!registry.has_registered_descendant("/a/b/c"));
    }

    #[test]
    fn covers_checks_self_and_ancestors() {
        let mut registry = PathRegistry::new();
        registry.register("/Users/alice/Desktop");
        assert!(registry.covers("/Users/alice/Desktop"));
        assert!(registry.covers("/Users/alice/Desktop/notes/todo.txt"));
        assert!(!registry.covers("/Users/alice"));
        assert!(!registry.covers("/Users/alice/Documents"));
    }

    #[test]
    fn sibling_prefixes_do_not_match() {
        let mut registry = PathRegistry::new();
        registry.register("/Users/alice2/Desktop");
        assert!(!registry.has_registered_descendant("/Users/alice"));
        assert!(!registry.contains("/Users/alice"));
    }

    #[test]
    fn dot_segments_are_normalized() {
        let mut registry = PathRegistry::new();
        registry.register("/Users/./alice/Documents/../Desktop");
        assert!(registry.contains("/Users/alice/Desktop"));
        assert_eq!(
            normalize(Path::new("/../Users//alice/./")),
            PathBuf::from("/Users/alice")
        );
    }

    #[test]
    fn paths_are_listed_in_order() {
        let mut registry = PathRegistry::new();
        registry.register("/b");
        registry.register("/a/z");
        registry.register("/a");
        assert_eq!(
            registry.paths(),
            vec![
                PathBuf::from("/a"),
                PathBuf::from("/a/z"),
                PathBuf::from("/b")
            ]
        );
        assert!(!registry.is_empty());
    }
}
