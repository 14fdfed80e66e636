//! Position queries over a [`SyntaxTree`].

use polyglot_core::identifier::Id;

use crate::tree::{NodeId, NodeKind, SyntaxTree};

impl SyntaxTree {
    /// The deepest node whose full span contains `offset`.
    ///
    /// Spans are half-open, so at a boundary between two nodes the one that
    /// starts at `offset` wins. At the very end of the document the last node
    /// is returned. Returns `None` only when `offset` is past the end.
    pub fn node_at(&self, offset: usize) -> Option<NodeId> {
        if offset > self.source().len() {
            return None;
        }

        let mut current = self.root();
        loop {
            let children = self.children(current);
            let next = children
                .iter()
                .copied()
                .find(|&child| self.node(child).full_span().contains(offset))
                .or_else(|| {
                    children
                        .last()
                        .copied()
                        .filter(|&last| self.node(last).full_span().end() == offset)
                });

            match next {
                Some(child) => current = child,
                None => return Some(current),
            }
        }
    }

    /// The kernel that would execute the text at `offset`.
    ///
    /// Returns `None` on a kernel selector line, which belongs to no kernel,
    /// and for offsets past the end of the document. An action reports the
    /// kernel it runs in; an empty document reports the default kernel.
    pub fn kernel_at(&self, offset: usize) -> Option<Id> {
        let node = self.node_at(offset)?;
        match self.node(node).kind() {
            NodeKind::Submission => Some(self.default_kernel()),
            NodeKind::Language { kernel } => Some(*kernel),
            NodeKind::KernelNameDirective(_) | NodeKind::ProxyKernelNameDirective(_) => None,
            NodeKind::ActionDirective(action) => Some(action.parent_kernel()),
            NodeKind::GenericDirective(generic) => Some(generic.kernel()),
        }
    }

    /// Reassembles the document from the root's children.
    ///
    /// Always equal to [`SyntaxTree::source`]; computed from the nodes rather
    /// than copied so it doubles as a losslessness check.
    pub fn to_original_text(&self) -> String {
        self.children(self.root())
            .iter()
            .map(|&child| self.full_text(child))
            .collect()
    }
}
