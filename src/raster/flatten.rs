//! Hierarchy inference by pixel-majority voting.
//!
//! After a level is rendered, every pixel it claims votes for the entity that
//! owned the same pixel in the cumulative grid of the coarser levels. The
//! level is then merged into the cumulative grid.

use hashbrown::HashMap;

use super::grid::{LevelGrid, OwnerGrid};

/// Parent vote counts, accumulated over all levels and slices.
#[derive(Debug, Default)]
pub struct ParentVotes {
    votes: HashMap<u32, HashMap<u32, u64>>,
}

impl ParentVotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally votes of the level grid against the cumulative grid, then let
    /// the level overwrite the cumulative grid at every claimed pixel.
    ///
    /// Returns the number of claimed pixels.
    pub fn flatten(&mut self, level: &LevelGrid, cumulative: &mut OwnerGrid) -> u64 {
        debug_assert_eq!(level.width(), cumulative.width());
        debug_assert_eq!(level.height(), cumulative.height());
        let mut claimed = 0;

        for y in 0..level.height() {
            let src = level.row(y);
            let dst = cumulative.row_mut(y);

            // Count runs of identical (child, parent) pairs before touching the map.
            let mut run: Option<(u32, u32, u64)> = None;
            for (id, owner) in src.iter().zip(dst.iter_mut()) {
                if *id == 0 {
                    continue;
                }
                run = match run {
                    Some((c, p, n)) if c == *id && p == *owner => Some((c, p, n + 1)),
                    Some((c, p, n)) => {
                        self.add(c, p, n);
                        Some((*id, *owner, 1))
                    }
                    None => Some((*id, *owner, 1)),
                };
                *owner = *id;
                claimed += 1;
            }
            if let Some((c, p, n)) = run {
                self.add(c, p, n);
            }
        }
        claimed
    }

    fn add(&mut self, child: u32, parent: u32, count: u64) {
        *self
            .votes
            .entry(child)
            .or_default()
            .entry(parent)
            .or_insert(0) += count;
    }

    /// Most voted parent of an entity; ties go to the lowest id.
    ///
    /// 0 means "no parent": either the entity sits mostly on unclaimed
    /// background, or it never received a pixel.
    pub fn parent_of(&self, id: u32) -> u32 {
        let Some(candidates) = self.votes.get(&id) else {
            return 0;
        };
        candidates
            .iter()
            .max_by(|(pa, ca), (pb, cb)| ca.cmp(cb).then_with(|| pb.cmp(pa)))
            .map(|(p, _)| *p)
            .unwrap_or(0)
    }

    /// Total number of pixels won by an entity.
    pub fn pixel_count(&self, id: u32) -> u64 {
        self.votes
            .get(&id)
            .map(|c| c.values().sum())
            .unwrap_or(0)
    }
}
