use crate::error::{AppError, Result};
use crate::fs::tree::{CheckState, NodeId, NodeKind, Tree};

impl Tree {
    /// Set the selection intent of a node and every loaded descendant.
    ///
    /// Cached check states are cleared on the node and all of its ancestors.
    /// Directories that are still deferred remember `value` and hand it to
    /// their entries when they are materialized.
    pub fn set_selected(&mut self, id: NodeId, value: bool) {
        self.invalidate_upwards(id);

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.0];
            node.selected = value;
            node.check_cache.set(None);
            if node.is_deferred() {
                node.pending_selection = Some(value);
            }
            stack.extend(node.children.iter().copied());
        }
    }

    /// Select or deselect the whole tree.
    pub fn select_all(&mut self, value: bool) {
        self.set_selected(self.root(), value);
    }

    /// `set_selected` addressed by root-relative path.
    pub fn set_selected_path(&mut self, path: &str, value: bool) -> Result<()> {
        let id = self
            .lookup(path)
            .ok_or_else(|| AppError::NodeNotFound(path.to_string()))?;
        self.set_selected(id, value);
        Ok(())
    }

    /// Aggregate check state, memoized per node until the next selection
    /// change below it.
    pub fn check_state(&self, id: NodeId) -> CheckState {
        let node = &self.nodes[id.0];
        if let Some(cached) = node.check_cache.get() {
            return cached;
        }

        let state = if node.kind == NodeKind::File || node.children.is_empty() {
            if node.selected {
                CheckState::Checked
            } else {
                CheckState::Unchecked
            }
        } else {
            let mut all_checked = true;
            let mut none_checked = true;
            for &child in &node.children {
                match self.check_state(child) {
                    CheckState::Checked => none_checked = false,
                    CheckState::Unchecked => all_checked = false,
                    CheckState::Indeterminate => {
                        all_checked = false;
                        none_checked = false;
                    }
                }
            }
            match (all_checked, none_checked) {
                (true, _) => CheckState::Checked,
                (_, true) => CheckState::Unchecked,
                _ => CheckState::Indeterminate,
            }
        };

        node.check_cache.set(Some(state));
        state
    }

    /// Clear the cached state of `id` and every ancestor.
    pub(crate) fn invalidate_upwards(&self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0];
            node.check_cache.set(None);
            current = node.parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::fs::memory::MemoryFs;
    use crate::fs::tree::{BuildOptions, CheckState, NodeId, Tree};

    fn sample() -> (MemoryFs, Tree) {
        let mut fs = MemoryFs::new("proj");
        fs.add_file("src/main.rs", "fn main() {}")
            .add_file("src/lib.rs", "")
            .add_file("src/util/mod.rs", "")
            .add_file("README.md", "# proj")
            .add_file("node_modules/left-pad/index.js", "")
            .add_file("node_modules/left-pad/package.json", "{}");
        let tree = Tree::build(&fs, fs.handle(""), &[], BuildOptions::default());
        (fs, tree)
    }

    fn id(tree: &Tree, path: &str) -> NodeId {
        tree.lookup(path).unwrap()
    }

    #[test]
    fn initial_states_follow_defaults() {
        let (_fs, tree) = sample();
        assert_eq!(tree.check_state(id(&tree, "src")), CheckState::Checked);
        assert_eq!(
            tree.check_state(id(&tree, "node_modules")),
            CheckState::Unchecked
        );
        assert_eq!(tree.check_state(tree.root()), CheckState::Indeterminate);
    }

    #[test]
    fn select_then_deselect_is_unchecked() {
        let (_fs, mut tree) = sample();
        let src = id(&tree, "src");
        tree.set_selected(src, true);
        assert_eq!(tree.check_state(src), CheckState::Checked);
        tree.set_selected(src, false);
        assert_eq!(tree.check_state(src), CheckState::Unchecked);
        assert_eq!(
            tree.check_state(id(&tree, "src/util/mod.rs")),
            CheckState::Unchecked
        );
    }

    #[test]
    fn repeated_calls_are_idempotent() {
        let (_fs, mut tree) = sample();
        let root = tree.root();
        tree.set_selected(root, false);
        let first = tree.render_listing();
        tree.set_selected(root, false);
        assert_eq!(tree.render_listing(), first);

        tree.set_selected(root, true);
        let second = tree.render_listing();
        tree.set_selected(root, true);
        assert_eq!(tree.render_listing(), second);
        assert_eq!(tree.check_state(root), CheckState::Checked);
    }

    #[test]
    fn aggregation_covers_all_three_states() {
        let (_fs, mut tree) = sample();
        let src = id(&tree, "src");

        tree.set_selected(src, true);
        assert_eq!(tree.check_state(src), CheckState::Checked);

        tree.set_selected(id(&tree, "src/lib.rs"), false);
        assert_eq!(tree.check_state(src), CheckState::Indeterminate);

        tree.set_selected(id(&tree, "src/main.rs"), false);
        tree.set_selected(id(&tree, "src/util"), false);
        assert_eq!(tree.check_state(src), CheckState::Unchecked);
    }

    #[test]
    fn aggregation_matches_children_everywhere() {
        let (_fs, mut tree) = sample();
        tree.set_selected(id(&tree, "src/util/mod.rs"), false);
        tree.set_selected(id(&tree, "README.md"), false);

        for i in 0..tree.len() {
            let node_id = tree.lookup(&tree.nodes[i].path).unwrap();
            let children = tree.children(node_id);
            if children.is_empty() {
                continue;
            }
            let states: Vec<CheckState> =
                children.iter().map(|c| tree.check_state(*c)).collect();
            let expected = if states.iter().all(|s| *s == CheckState::Checked) {
                CheckState::Checked
            } else if states.iter().all(|s| *s == CheckState::Unchecked) {
                CheckState::Unchecked
            } else {
                CheckState::Indeterminate
            };
            assert_eq!(tree.check_state(node_id), expected, "{}", tree.nodes[i].path);
        }
    }

    #[test]
    fn cache_is_invalidated_up_to_root() {
        let (_fs, mut tree) = sample();
        tree.set_selected(id(&tree, "node_modules"), true);
        assert_eq!(tree.check_state(tree.root()), CheckState::Checked);

        // deep write must reach the cached root state
        tree.set_selected(id(&tree, "src/util/mod.rs"), false);
        assert_eq!(tree.check_state(tree.root()), CheckState::Indeterminate);
        assert_eq!(
            tree.check_state(id(&tree, "src/util")),
            CheckState::Unchecked
        );
    }

    #[test]
    fn empty_directory_behaves_like_leaf() {
        let mut fs = MemoryFs::new("proj");
        fs.add_dir("empty");
        let mut tree = Tree::build(&fs, fs.handle(""), &[], BuildOptions::default());
        let empty = id(&tree, "empty");
        assert_eq!(tree.check_state(empty), CheckState::Checked);
        tree.set_selected(empty, false);
        assert_eq!(tree.check_state(empty), CheckState::Unchecked);
        assert_eq!(tree.check_state(tree.root()), CheckState::Unchecked);
    }

    #[test]
    fn stub_remembers_bulk_selection() {
        let (fs, mut tree) = sample();
        tree.select_all(true);
        let nm = id(&tree, "node_modules");
        tree.materialize(&fs, nm);

        assert!(tree.node(id(&tree, "node_modules/left-pad/index.js")).selected);
        assert_eq!(tree.check_state(nm), CheckState::Checked);
        assert_eq!(tree.check_state(tree.root()), CheckState::Checked);
    }

    #[test]
    fn bulk_deselect_reaches_late_children() {
        let (fs, mut tree) = sample();
        tree.select_all(false);
        let nm = id(&tree, "node_modules");
        tree.materialize(&fs, nm);
        assert!(!tree.node(id(&tree, "node_modules/left-pad/package.json")).selected);
        assert_eq!(tree.check_state(tree.root()), CheckState::Unchecked);
    }

    #[test]
    fn untouched_stub_uses_file_defaults() {
        let (fs, mut tree) = sample();
        let nm = id(&tree, "node_modules");
        assert_eq!(tree.check_state(nm), CheckState::Unchecked);

        tree.materialize(&fs, nm);
        // defaults re-apply: plain files start selected
        assert!(tree.node(id(&tree, "node_modules/left-pad/index.js")).selected);
        assert_eq!(tree.check_state(nm), CheckState::Checked);
    }

    #[test]
    fn set_selected_path_reports_unknown_paths() {
        let (_fs, mut tree) = sample();
        assert!(tree.set_selected_path("src/main.rs", false).is_ok());
        assert!(!tree.node(id(&tree, "src/main.rs")).selected);
        assert!(tree.set_selected_path("src/missing.rs", true).is_err());
    }

    #[test]
    fn deselected_files_are_not_collected() {
        let (_fs, mut tree) = sample();
        tree.set_selected(id(&tree, "src"), false);
        let paths: Vec<String> = tree
            .collect_selected_files()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, vec!["README.md"]);
    }
}
