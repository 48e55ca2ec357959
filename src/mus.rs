//! Group-activation MUS extraction: soft clause groups behind activation
//! literals, a one-pass UNSAT core, and deletion-based minimization.
use std::collections::HashMap;

use crate::adaptor::SatAdaptor;
use crate::types::*;
use crate::vars::VariableManager;

pub type MusGroupId = usize;

pub struct MusFinder {
    vars: VariableManager,
    solver: SatAdaptor,
    next_group: MusGroupId,
    group_to_act: HashMap<MusGroupId, Id>,
    act_to_group: HashMap<Id, MusGroupId>,
}

impl MusFinder {
    pub fn new(vars: &VariableManager) -> Self {
        MusFinder {
            vars: vars.clone(),
            solver: SatAdaptor::default(),
            next_group: 0,
            group_to_act: HashMap::new(),
            act_to_group: HashMap::new(),
        }
    }

    pub fn add_hard_clause(&mut self, cls: &Clause) {
        self.solver.add_clause(cls);
    }

    pub fn add_hard_clauses(&mut self, vec: &[Clause]) {
        for cls in vec {
            self.add_hard_clause(cls);
        }
    }

    pub fn create_group(&mut self) -> MusGroupId {
        let group = self.next_group;
        self.next_group += 1;
        let act = self.vars.new_internal(&format!("act_musgroup_{}", group));
        self.group_to_act.insert(group, act);
        self.act_to_group.insert(act, group);
        group
    }

    pub fn add_soft_clause_new_group(&mut self, cls: &Clause) -> MusGroupId {
        let group = self.create_group();
        self.add_soft_clause(group, cls);
        group
    }

    pub fn add_soft_clause(&mut self, group: MusGroupId, cls: &Clause) {
        let act = self.group_to_act[&group];
        let mut activated = cls.clone();
        activated.push(negate(act));
        self.solver.add_clause(&activated);
    }

    /// Reduce to an UNSAT core of groups with a single core pass.
    pub fn find_core(&mut self) -> Vec<MusGroupId> {
        let mut core: Vec<MusGroupId> = self.group_to_act.keys().copied().collect();
        core.sort_unstable();
        let unsat = self.is_unsat(&mut core);
        assert!(unsat, "soft groups plus hard clauses must be unsatisfiable");
        core
    }

    /// Deletion-based minimal unsatisfiable subset of the groups.
    pub fn find_mus(&mut self) -> Vec<MusGroupId> {
        let mut mus = self.find_core();
        mus.sort_unstable();

        let mut i = 0;
        while i < mus.len() {
            let gid = mus[i];
            let mut candidate = mus.clone();
            candidate.remove(i);

            if self.is_unsat(&mut candidate) {
                mus = candidate;
                mus.sort_unstable();
                // First group above the removed one that has not been
                // tried yet.
                i = mus.partition_point(|&g| g <= gid);
            } else {
                i += 1;
            }
        }
        mus
    }

    /// UNSAT check of the given groups; on UNSAT the slice shrinks to the
    /// groups in the conflict.
    fn is_unsat(&mut self, core: &mut Vec<MusGroupId>) -> bool {
        let assumps: Cube = core.iter().map(|g| self.group_to_act[g]).collect();
        let mut crits = Cube::new();
        if self.solver.solve_with_crits(&assumps, &mut crits) {
            return false;
        }
        core.clear();
        for act in crits {
            core.push(self.act_to_group[&act]);
        }
        true
    }
}

/// Wrapper keyed by caller-provided IDs (typically gate IDs) so users do
/// not maintain their own group maps.
pub struct MusFinderWrapper {
    finder: MusFinder,
    external_to_group: HashMap<Id, MusGroupId>,
    group_to_external: HashMap<MusGroupId, Id>,
}

impl MusFinderWrapper {
    pub fn new(vars: &VariableManager) -> Self {
        MusFinderWrapper {
            finder: MusFinder::new(vars),
            external_to_group: HashMap::new(),
            group_to_external: HashMap::new(),
        }
    }

    pub fn add_hard_clause(&mut self, cls: &Clause) {
        self.finder.add_hard_clause(cls);
    }

    pub fn add_hard_clauses(&mut self, vec: &[Clause]) {
        self.finder.add_hard_clauses(vec);
    }

    pub fn add_soft_clause(&mut self, external: Id, cls: &Clause) {
        let group = match self.external_to_group.get(&external) {
            Some(&g) => g,
            None => {
                let g = self.finder.create_group();
                self.external_to_group.insert(external, g);
                self.group_to_external.insert(g, external);
                g
            }
        };
        self.finder.add_soft_clause(group, cls);
    }

    fn map_core(&self, internal: &[MusGroupId]) -> Vec<Id> {
        internal
            .iter()
            .map(|g| self.group_to_external[g])
            .collect()
    }

    pub fn find_core(&mut self) -> Vec<Id> {
        let core = self.finder.find_core();
        self.map_core(&core)
    }

    pub fn find_mus(&mut self) -> Vec<Id> {
        let mus = self.finder.find_mus();
        self.map_core(&mus)
    }
}
