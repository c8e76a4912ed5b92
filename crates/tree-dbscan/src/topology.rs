//! The shape of the worker tree.

use serde::{Deserialize, Serialize};

use crate::{Result, TdbscanError, TreePosition};

/// A rooted tree over worker ranks `0..n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// The parent of each rank, `None` for the root.
    parents: Vec<Option<usize>>,
    /// The children of each rank, in ascending order.
    children: Vec<Vec<usize>>,
    /// The rank of the root.
    root: usize,
}

impl Topology {
    /// Builds a topology from the parent of each rank.
    ///
    /// # Errors
    ///
    /// * If there are no ranks.
    /// * If there is not exactly one root.
    /// * If a parent is out of range or a rank is its own ancestor.
    pub fn from_parents(parents: Vec<Option<usize>>) -> Result<Self> {
        let n = parents.len();
        if n == 0 {
            return Err(TdbscanError::Config("A tree needs at least one worker".to_string()));
        }

        let roots = parents
            .iter()
            .enumerate()
            .filter_map(|(r, p)| p.is_none().then_some(r))
            .collect::<Vec<_>>();
        let root = match roots.as_slice() {
            [root] => *root,
            _ => {
                return Err(TdbscanError::Config(format!(
                    "A tree needs exactly one root, found {}",
                    roots.len()
                )))
            }
        };

        let mut children = vec![Vec::new(); n];
        for (rank, parent) in parents.iter().enumerate() {
            if let Some(p) = *parent {
                if p >= n {
                    return Err(TdbscanError::Config(format!(
                        "Worker {rank} has parent {p} but there are only {n} workers"
                    )));
                }
                children[p].push(rank);
            }
        }

        // Every rank must reach the root in fewer than n steps.
        for start in 0..n {
            let mut rank = start;
            let mut steps = 0;
            while let Some(p) = parents[rank] {
                rank = p;
                steps += 1;
                if steps >= n {
                    return Err(TdbscanError::Config(format!("Worker {start} is part of a cycle")));
                }
            }
        }

        Ok(Self { parents, children, root })
    }

    /// A root with every other rank as a direct child.
    ///
    /// # Errors
    ///
    /// * If `n` is zero.
    pub fn flat(n: usize) -> Result<Self> {
        Self::from_parents((0..n).map(|r| (r > 0).then_some(0)).collect())
    }

    /// A complete `fanout`-ary tree rooted at rank 0, filled in rank order.
    ///
    /// # Errors
    ///
    /// * If `n` or `fanout` is zero.
    pub fn k_ary(n: usize, fanout: usize) -> Result<Self> {
        if fanout == 0 {
            return Err(TdbscanError::Config("Fan-out must be at least 1".to_string()));
        }
        Self::from_parents((0..n).map(|r| (r > 0).then(|| (r - 1) / fanout)).collect())
    }

    /// The number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Always false; a topology has at least one worker.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// The rank of the root.
    #[must_use]
    pub const fn root(&self) -> usize {
        self.root
    }

    /// The parent of a rank.
    #[must_use]
    pub fn parent(&self, rank: usize) -> Option<usize> {
        self.parents.get(rank).copied().flatten()
    }

    /// The children of a rank, in ascending order.
    #[must_use]
    pub fn children(&self, rank: usize) -> &[usize] {
        self.children.get(rank).map_or(&[], Vec::as_slice)
    }

    /// The parent of every rank.
    #[must_use]
    pub fn parents(&self) -> &[Option<usize>] {
        &self.parents
    }

    /// The number of edges from the root to the deepest leaf.
    #[must_use]
    pub fn depth(&self) -> usize {
        (0..self.len())
            .map(|start| {
                let mut rank = start;
                let mut depth = 0;
                while let Some(p) = self.parents[rank] {
                    rank = p;
                    depth += 1;
                }
                depth
            })
            .max()
            .unwrap_or(0)
    }

    /// The position of a rank, as passed to a worker at start-up.
    ///
    /// # Errors
    ///
    /// * If `rank` is not part of the tree.
    pub fn position(&self, rank: usize) -> Result<TreePosition> {
        TreePosition::new(rank, rank == self.root, self.len())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::Topology;

    #[test]
    fn flat_tree() -> Result<(), String> {
        let topology = Topology::flat(4).map_err(|e| e.to_string())?;
        assert_eq!(topology.root(), 0);
        assert_eq!(topology.children(0), &[1, 2, 3]);
        assert_eq!(topology.parent(2), Some(0));
        assert_eq!(topology.parent(0), None);
        assert_eq!(topology.depth(), 1);
        Ok(())
    }

    #[test_case(1, 2, 0; "single")]
    #[test_case(7, 2, 2; "binary")]
    #[test_case(8, 2, 3; "binary_with_straggler")]
    #[test_case(5, 1, 4; "chain")]
    fn k_ary_depth(n: usize, fanout: usize, depth: usize) -> Result<(), String> {
        let topology = Topology::k_ary(n, fanout).map_err(|e| e.to_string())?;
        assert_eq!(topology.len(), n);
        assert_eq!(topology.depth(), depth);
        Ok(())
    }

    #[test]
    fn asymmetric_tree() -> Result<(), String> {
        let topology = Topology::from_parents(vec![Some(2), None, Some(1), Some(1), Some(0)]).map_err(|e| e.to_string())?;
        assert_eq!(topology.root(), 1);
        assert_eq!(topology.children(1), &[2, 3]);
        assert_eq!(topology.children(4), &[] as &[usize]);
        assert_eq!(topology.depth(), 3);

        let position = topology.position(1).map_err(|e| e.to_string())?;
        assert!(position.is_root);
        Ok(())
    }

    #[test_case(vec![]; "empty")]
    #[test_case(vec![None, None]; "two_roots")]
    #[test_case(vec![Some(1), Some(0)]; "no_root")]
    #[test_case(vec![None, Some(2), Some(1)]; "cycle")]
    #[test_case(vec![None, Some(5)]; "out_of_range")]
    fn invalid(parents: Vec<Option<usize>>) {
        assert!(Topology::from_parents(parents).is_err());
    }
}
