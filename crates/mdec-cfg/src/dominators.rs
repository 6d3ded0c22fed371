//! Dominator trees (Cooper, Harvey, Kennedy: "A Simple, Fast Dominance
//! Algorithm").
//!
//! Graphs are plain successor lists indexed by node number, so the same code
//! serves dominators and post-dominators.

use std::collections::BTreeSet;

const UNDEFINED: usize = usize::MAX;

/// Immediate dominators plus the reverse postorder used to compute them.
#[derive(Clone, Debug)]
pub struct DominatorTree {
    idom: Vec<Option<usize>>,
    rpo: Vec<usize>,
    rpo_index: Vec<usize>,
    root: usize,
}

fn predecessors(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut preds = vec![Vec::new(); successors.len()];
    for (node, succs) in successors.iter().enumerate() {
        for &succ in succs {
            if !preds[succ].contains(&node) {
                preds[succ].push(node);
            }
        }
    }
    preds
}

/// Iterative depth-first postorder from `root`, reversed.
fn reverse_postorder(successors: &[Vec<usize>], root: usize) -> Vec<usize> {
    let mut visited = vec![false; successors.len()];
    let mut order = Vec::with_capacity(successors.len());
    let mut stack = vec![(root, 0usize)];
    visited[root] = true;
    while let Some((node, next)) = stack.last_mut() {
        let node = *node;
        if let Some(&succ) = successors[node].get(*next) {
            *next += 1;
            if !visited[succ] {
                visited[succ] = true;
                stack.push((succ, 0));
            }
        } else {
            order.push(node);
            stack.pop();
        }
    }
    order.reverse();
    order
}

impl DominatorTree {
    /// Dominators of the graph rooted at `entry`.
    pub fn compute(successors: &[Vec<usize>], entry: usize) -> Self {
        let rpo = reverse_postorder(successors, entry);
        let mut rpo_index = vec![UNDEFINED; successors.len()];
        for (index, &node) in rpo.iter().enumerate() {
            rpo_index[node] = index;
        }
        let preds = predecessors(successors);

        let mut idom = vec![UNDEFINED; successors.len()];
        idom[entry] = entry;
        let mut changed = true;
        while changed {
            changed = false;
            for &node in rpo.iter().skip(1) {
                let mut new_idom = UNDEFINED;
                for &pred in &preds[node] {
                    if idom[pred] == UNDEFINED {
                        continue;
                    }
                    new_idom = if new_idom == UNDEFINED {
                        pred
                    } else {
                        intersect(&idom, &rpo_index, pred, new_idom)
                    };
                }
                if new_idom != UNDEFINED && idom[node] != new_idom {
                    idom[node] = new_idom;
                    changed = true;
                }
            }
        }

        let idom = idom
            .iter()
            .enumerate()
            .map(|(node, &dom)| (dom != UNDEFINED && node != entry).then_some(dom))
            .collect();
        Self {
            idom,
            rpo,
            rpo_index,
            root: entry,
        }
    }

    /// Post-dominators, with a virtual exit joining every node without
    /// successors. The virtual exit never appears in the result: nodes whose
    /// immediate post-dominator is the exit report `None`.
    pub fn post_dominators(successors: &[Vec<usize>]) -> Self {
        let exit = successors.len();
        let mut reversed = vec![Vec::new(); exit + 1];
        for (node, succs) in successors.iter().enumerate() {
            if succs.is_empty() {
                reversed[exit].push(node);
            }
            for &succ in succs {
                reversed[succ].push(node);
            }
        }
        let mut tree = Self::compute(&reversed, exit);
        tree.idom.truncate(exit);
        for dom in &mut tree.idom {
            if *dom == Some(exit) {
                *dom = None;
            }
        }
        tree.rpo.retain(|&node| node != exit);
        tree.rpo_index.truncate(exit);
        tree
    }

    pub fn idom(&self, node: usize) -> Option<usize> {
        self.idom.get(node).copied().flatten()
    }

    pub fn is_reachable(&self, node: usize) -> bool {
        node == self.root || self.rpo_index.get(node).is_some_and(|&i| i != UNDEFINED)
    }

    /// Whether `a` dominates `b`. Every node dominates itself.
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if !self.is_reachable(b) {
            return false;
        }
        let mut node = b;
        loop {
            if node == a {
                return true;
            }
            match self.idom(node) {
                Some(dom) => node = dom,
                None => return false,
            }
        }
    }

    /// Nodes reachable from the root in reverse postorder.
    pub fn reverse_postorder(&self) -> &[usize] {
        &self.rpo
    }

    /// Position in reverse postorder, if reachable.
    pub fn rpo_position(&self, node: usize) -> Option<usize> {
        self.rpo_index.get(node).copied().filter(|&i| i != UNDEFINED)
    }

    /// Children in the dominator tree.
    pub fn children(&self) -> Vec<Vec<usize>> {
        let mut children = vec![Vec::new(); self.idom.len()];
        for &node in &self.rpo {
            if let Some(dom) = self.idom(node) {
                children[dom].push(node);
            }
        }
        children
    }

    /// Dominance frontier of every node.
    pub fn frontiers(&self, successors: &[Vec<usize>]) -> Vec<BTreeSet<usize>> {
        let preds = predecessors(successors);
        let mut frontiers = vec![BTreeSet::new(); successors.len()];
        for (node, node_preds) in preds.iter().enumerate() {
            if node_preds.len() < 2 || !self.is_reachable(node) {
                continue;
            }
            for &pred in node_preds {
                if !self.is_reachable(pred) {
                    continue;
                }
                let mut runner = Some(pred);
                while let Some(current) = runner {
                    if Some(current) == self.idom(node) {
                        break;
                    }
                    frontiers[current].insert(node);
                    runner = self.idom(current);
                }
            }
        }
        frontiers
    }
}

fn intersect(idom: &[usize], rpo_index: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while rpo_index[a] > rpo_index[b] {
            a = idom[a];
        }
        while rpo_index[b] > rpo_index[a] {
            b = idom[b];
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 -> 1 -> {2, 3} -> 4, 4 -> 1 (loop), 4 -> 5
    fn diamond_loop() -> Vec<Vec<usize>> {
        vec![vec![1], vec![2, 3], vec![4], vec![4], vec![1, 5], vec![]]
    }

    #[test]
    fn test_immediate_dominators() {
        let tree = DominatorTree::compute(&diamond_loop(), 0);
        assert_eq!(tree.idom(0), None);
        assert_eq!(tree.idom(1), Some(0));
        assert_eq!(tree.idom(2), Some(1));
        assert_eq!(tree.idom(3), Some(1));
        assert_eq!(tree.idom(4), Some(1));
        assert_eq!(tree.idom(5), Some(4));
        assert!(tree.dominates(1, 5));
        assert!(!tree.dominates(2, 4));
        assert!(tree.dominates(3, 3));
    }

    #[test]
    fn test_reverse_postorder_starts_at_entry() {
        let tree = DominatorTree::compute(&diamond_loop(), 0);
        let rpo = tree.reverse_postorder();
        assert_eq!(rpo[0], 0);
        assert_eq!(rpo.len(), 6);
        assert!(tree.rpo_position(1) < tree.rpo_position(4));
    }

    #[test]
    fn test_frontiers() {
        let succs = diamond_loop();
        let tree = DominatorTree::compute(&succs, 0);
        let df = tree.frontiers(&succs);
        assert_eq!(df[2], BTreeSet::from([4]));
        assert_eq!(df[3], BTreeSet::from([4]));
        assert_eq!(df[4], BTreeSet::from([1]));
        assert_eq!(df[1], BTreeSet::from([1]));
        assert!(df[0].is_empty());
    }

    #[test]
    fn test_post_dominators() {
        let tree = DominatorTree::post_dominators(&diamond_loop());
        assert_eq!(tree.idom(1), Some(4));
        assert_eq!(tree.idom(2), Some(4));
        assert_eq!(tree.idom(4), Some(5));
        assert_eq!(tree.idom(5), None);
    }

    #[test]
    fn test_unreachable_nodes() {
        let succs = vec![vec![1], vec![], vec![1]];
        let tree = DominatorTree::compute(&succs, 0);
        assert!(!tree.is_reachable(2));
        assert_eq!(tree.idom(2), None);
        assert!(!tree.dominates(0, 2));
    }

    #[test]
    fn test_infinite_loop_has_no_post_dominator() {
        let succs = vec![vec![1], vec![1]];
        let tree = DominatorTree::post_dominators(&succs);
        assert_eq!(tree.idom(0), None);
        assert!(!tree.is_reachable(1));
    }
}
