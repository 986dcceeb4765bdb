//! Tree view of the scopes nested inside one function.

use crate::parse::dump::{Dump, ScopeIdx};

/// Node of the scope tree. Children appear in dump order, so an `Else`
/// scope directly follows the `If` it belongs to; the AST builder consumes
/// the pair. Scopes themselves are never rewritten.
#[derive(Debug, Clone)]
pub struct ScopeNode {
    pub scope: ScopeIdx,
    pub children: Vec<ScopeNode>,
}

impl ScopeNode {
    /// Builds the tree rooted at `root` from all scopes whose `nestedIn`
    /// chain leads to it.
    pub fn build(dump: &Dump, root: ScopeIdx) -> ScopeNode {
        let mut node = ScopeNode {
            scope: root,
            children: Vec::new(),
        };

        for (i, s) in dump.scopes.iter().enumerate() {
            let idx = ScopeIdx(i as u32);
            if idx == root {
                continue;
            }
            if s.nested_in == Some(root) {
                node.children.push(ScopeNode::build(dump, idx));
            }
        }

        node
    }

    pub fn find_by_id(&self, scope: ScopeIdx) -> Option<&ScopeNode> {
        if self.scope == scope {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_id(scope))
    }

    /// Removes the whole subtree rooted at `scope`. Returns whether a node
    /// was removed.
    pub fn remove_by_id(&mut self, scope: ScopeIdx) -> bool {
        if let Some(pos) = self.children.iter().position(|c| c.scope == scope) {
            self.children.remove(pos);
            return true;
        }
        self.children.iter_mut().any(|c| c.remove_by_id(scope))
    }
}

#[test]
fn build_find_remove() {
    use crate::parse::dump::ScopeKind;
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let f = d.scope(ScopeKind::Function, None);
    let if_s = d.scope(ScopeKind::If, Some(f));
    let while_s = d.scope(ScopeKind::While, Some(if_s));
    let else_s = d.scope(ScopeKind::Else, Some(f));

    let mut tree = ScopeNode::build(&d.dump, f);
    assert_eq!(tree.children.len(), 2);
    assert_eq!(tree.children[0].scope, if_s);
    assert_eq!(tree.children[1].scope, else_s);
    assert!(tree.find_by_id(while_s).is_some());

    // Removal takes the whole subtree with it.
    assert!(tree.remove_by_id(if_s));
    assert!(tree.find_by_id(while_s).is_none());
    assert!(!tree.remove_by_id(if_s));

    // A clone is structural: pruning it leaves the original alone.
    let mut copy = tree.clone();
    assert!(copy.remove_by_id(else_s));
    assert!(tree.find_by_id(else_s).is_some());
}
