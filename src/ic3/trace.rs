//! The inductive trace: an arena of lemmas plus frame-indexed sets of the
//! active ones.
//!
//! Each active lemma occupies exactly one frame; membership at frame `k`
//! means the lemma holds at `k` and, syntactically, everywhere below.
//! Callers wanting the semantic frame use [`InductiveTrace::full_frame`].
use std::collections::HashMap;

use super::{Frame, LemmaId, LEVEL_INF};
use crate::types::*;

#[derive(Debug, Clone)]
pub struct LemmaData {
    pub id: LemmaId,
    pub cube: Cube,
    pub level: u32,
    pub deleted: bool,
}

#[derive(Debug, Default)]
struct Frames {
    frames: Vec<Frame>,
    frame_inf: Frame,
}

impl Frames {
    fn add(&mut self, id: LemmaId, level: u32) {
        self.frame_mut(level).insert(id);
    }

    fn remove(&mut self, id: LemmaId, level: u32) {
        let erased = self.frame_mut(level).remove(&id);
        debug_assert!(erased);
    }

    fn frame_mut(&mut self, level: u32) -> &mut Frame {
        if level == LEVEL_INF {
            return &mut self.frame_inf;
        }
        if self.frames.len() <= level as usize {
            self.frames.resize_with(level as usize + 1, Frame::new);
        }
        &mut self.frames[level as usize]
    }

    fn frame(&self, level: u32) -> Option<&Frame> {
        if level == LEVEL_INF {
            Some(&self.frame_inf)
        } else {
            self.frames.get(level as usize)
        }
    }

    fn num_frames(&self) -> usize {
        self.frames.len()
    }

    fn shrink(&mut self, frames: usize) {
        debug_assert!(self.frames.iter().skip(frames).all(Frame::is_empty));
        self.frames.truncate(frames);
    }

    fn clear(&mut self) {
        self.frames.clear();
        self.frame_inf.clear();
    }
}

#[derive(Debug, Default)]
pub struct InductiveTrace {
    frames: Frames,
    lemmas: Vec<LemmaData>,
    cube_to_id: HashMap<Cube, LemmaId>,
    empty: Frame,
}

impl InductiveTrace {
    pub fn new() -> Self {
        InductiveTrace::default()
    }

    /// Add a lemma, deduplicating by sorted cube. An existing lemma is
    /// promoted to the higher of the two levels; a deleted one is revived.
    pub fn add_lemma(&mut self, cube: &Cube, level: u32) -> LemmaId {
        let sorted = sort_cube(cube);
        if let Some(&id) = self.cube_to_id.get(&sorted) {
            let (old_level, deleted) = {
                let lemma = &self.lemmas[id];
                (lemma.level, lemma.deleted)
            };
            let new_level = if deleted { level } else { old_level.max(level) };
            if !deleted {
                self.frames.remove(id, old_level);
            }
            self.frames.add(id, new_level);
            let lemma = &mut self.lemmas[id];
            lemma.level = new_level;
            lemma.deleted = false;
            return id;
        }

        let id = self.lemmas.len();
        self.lemmas.push(LemmaData {
            id,
            cube: sorted.clone(),
            level,
            deleted: false,
        });
        self.frames.add(id, level);
        self.cube_to_id.insert(sorted, id);
        id
    }

    pub fn lemma_exists(&self, cube: &Cube) -> bool {
        self.cube_to_id.contains_key(&sort_cube(cube))
    }

    pub fn lemma_is_active(&self, cube: &Cube) -> bool {
        self.cube_to_id
            .get(&sort_cube(cube))
            .map_or(false, |&id| !self.lemmas[id].deleted)
    }

    pub fn id_of(&self, cube: &Cube) -> LemmaId {
        self.cube_to_id[&sort_cube(cube)]
    }

    pub fn lemma(&self, id: LemmaId) -> &LemmaData {
        &self.lemmas[id]
    }

    pub fn cube_of(&self, id: LemmaId) -> &Cube {
        &self.lemmas[id].cube
    }

    pub fn level_of(&self, id: LemmaId) -> u32 {
        self.lemmas[id].level
    }

    pub fn lemmas(&self) -> &[LemmaData] {
        &self.lemmas
    }

    /// Move a lemma across frames.
    pub fn push_lemma(&mut self, id: LemmaId, level: u32) {
        let old = self.lemmas[id].level;
        debug_assert!(!self.lemmas[id].deleted);
        self.frames.remove(id, old);
        self.frames.add(id, level);
        self.lemmas[id].level = level;
    }

    /// Mark deleted and remove from its frame. The arena slot stays so
    /// indices never dangle.
    pub fn remove_lemma(&mut self, id: LemmaId) {
        debug_assert!(!self.lemmas[id].deleted);
        let level = self.lemmas[id].level;
        self.lemmas[id].deleted = true;
        self.frames.remove(id, level);
    }

    pub fn frame(&self, level: u32) -> &Frame {
        self.frames.frame(level).unwrap_or(&self.empty)
    }

    /// Union of frames `level..` including the infinite frame.
    pub fn full_frame(&self, level: u32) -> Frame {
        let mut full = self.frame(LEVEL_INF).clone();
        for i in level as usize..self.num_frames() {
            full.extend(self.frame(i as u32).iter().copied());
        }
        full
    }

    pub fn num_frames(&self) -> usize {
        self.frames.num_frames()
    }

    /// Pop empty trailing frames below the infinite one.
    pub fn clear_unused_frames(&mut self) {
        let mut keep = self.frames.num_frames();
        while keep > 0 && self.frames.frame((keep - 1) as u32).unwrap().is_empty() {
            keep -= 1;
        }
        self.frames.shrink(keep);
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.lemmas.clear();
        self.cube_to_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(lits: &[Id]) -> Cube {
        lits.to_vec()
    }

    #[test]
    fn test_add_dedups_by_sorted_cube() {
        let mut trace = InductiveTrace::new();
        let a = trace.add_lemma(&cube(&[10, 4]), 1);
        let b = trace.add_lemma(&cube(&[4, 10]), 3);
        assert_eq!(a, b);
        assert_eq!(trace.level_of(a), 3);
        assert!(trace.frame(1).is_empty());
        assert!(trace.frame(3).contains(&a));
        // Promotion never demotes.
        trace.add_lemma(&cube(&[4, 10]), 2);
        assert_eq!(trace.level_of(a), 3);
    }

    #[test]
    fn test_each_lemma_in_one_frame() {
        let mut trace = InductiveTrace::new();
        let a = trace.add_lemma(&cube(&[4]), 1);
        let b = trace.add_lemma(&cube(&[6]), 2);
        trace.push_lemma(a, 2);
        assert!(trace.frame(1).is_empty());
        assert_eq!(trace.frame(2).len(), 2);
        trace.push_lemma(b, LEVEL_INF);
        assert!(trace.frame(LEVEL_INF).contains(&b));
        assert_eq!(trace.frame(2).len(), 1);
    }

    #[test]
    fn test_full_frame_unions_upward() {
        let mut trace = InductiveTrace::new();
        let a = trace.add_lemma(&cube(&[4]), 1);
        let b = trace.add_lemma(&cube(&[6]), 2);
        let c = trace.add_lemma(&cube(&[8]), LEVEL_INF);
        let full1 = trace.full_frame(1);
        assert!(full1.contains(&a) && full1.contains(&b) && full1.contains(&c));
        let full2 = trace.full_frame(2);
        assert!(!full2.contains(&a) && full2.contains(&b) && full2.contains(&c));
    }

    #[test]
    fn test_remove_marks_deleted() {
        let mut trace = InductiveTrace::new();
        let a = trace.add_lemma(&cube(&[4]), 1);
        trace.remove_lemma(a);
        assert!(trace.lemma_exists(&cube(&[4])));
        assert!(!trace.lemma_is_active(&cube(&[4])));
        assert!(trace.frame(1).is_empty());
        // Re-adding revives the same arena slot.
        let b = trace.add_lemma(&cube(&[4]), 2);
        assert_eq!(a, b);
        assert!(trace.lemma_is_active(&cube(&[4])));
    }

    #[test]
    fn test_clear_unused_frames() {
        let mut trace = InductiveTrace::new();
        let a = trace.add_lemma(&cube(&[4]), 3);
        assert_eq!(trace.num_frames(), 4);
        trace.push_lemma(a, 1);
        trace.clear_unused_frames();
        assert_eq!(trace.num_frames(), 2);
    }
}
