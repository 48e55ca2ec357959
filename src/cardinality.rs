//! Cardinality constraints over engine literals: an incremental totalizer
//! and a Batcher odd-even cardinality network. Both produce a sorted output
//! vector; comparisons against a bound become assumption cubes over that
//! vector.
use std::collections::HashSet;

use crate::types::*;
use crate::vars::VariableManager;

/// Common interface of the two constructions.
pub trait CardinalityConstraint {
    fn add_input(&mut self, id: Id);
    fn cardinality(&self) -> u32;
    /// Make the output vector at least `n` bits wide. Never shrinks.
    fn set_cardinality(&mut self, n: u32);
    fn inputs(&self) -> &[Id];
    fn outputs(&self) -> &[Id];
    /// All defining clauses.
    fn cnfize(&mut self) -> ClauseVec;
    /// Only clauses not previously emitted.
    fn incremental_cnfize(&mut self) -> ClauseVec;
    /// Forget what was emitted so the next incremental call returns
    /// everything.
    fn clear_incrementality(&mut self);

    fn input_cardinality(&self) -> u32 {
        self.inputs().len() as u32
    }

    fn output_cardinality(&self) -> u32 {
        self.outputs().len() as u32
    }

    fn add_inputs(&mut self, ids: &[Id]) {
        for &id in ids {
            self.add_input(id);
        }
    }

    /// Assumptions forcing exactly `n` inputs true.
    fn assume_eq(&self, n: u32) -> Cube {
        if n == self.input_cardinality() && n == self.output_cardinality() {
            return self.inputs().to_vec();
        }
        assert!(
            n < self.output_cardinality(),
            "assume_eq bound {} is not covered by the output vector",
            n
        );
        self.outputs()
            .iter()
            .enumerate()
            .map(|(i, &o)| if (i as u32) < n { o } else { negate(o) })
            .collect()
    }

    fn assume_leq(&self, n: u32) -> Cube {
        if n == self.input_cardinality() && n == self.output_cardinality() {
            return Cube::new();
        }
        assert!(
            n < self.output_cardinality(),
            "assume_leq bound {} is not covered by the output vector",
            n
        );
        self.outputs()
            .iter()
            .enumerate()
            .filter(|&(i, _)| i as u32 >= n)
            .map(|(_, &o)| negate(o))
            .collect()
    }

    fn assume_lt(&self, n: u32) -> Cube {
        assert!(n > 0, "assume_lt bound must be positive");
        assert!(
            n <= self.output_cardinality(),
            "assume_lt bound {} is not covered by the output vector",
            n
        );
        self.outputs()
            .iter()
            .enumerate()
            .filter(|&(i, _)| i as u32 >= n - 1)
            .map(|(_, &o)| negate(o))
            .collect()
    }

    fn assume_geq(&self, n: u32) -> Cube {
        if n == self.input_cardinality() && n == self.output_cardinality() {
            return self.inputs().to_vec();
        }
        assert!(
            n < self.output_cardinality(),
            "assume_geq bound {} is not covered by the output vector",
            n
        );
        self.outputs()
            .iter()
            .take(n as usize)
            .copied()
            .collect()
    }

    fn assume_gt(&self, n: u32) -> Cube {
        assert!(
            n < self.output_cardinality(),
            "assume_gt bound {} is not covered by the output vector",
            n
        );
        self.outputs()
            .iter()
            .take(n as usize + 1)
            .copied()
            .collect()
    }
}

//
// Totalizer
//

#[derive(Debug)]
struct TotalizerNode {
    left: Option<Box<TotalizerNode>>,
    right: Option<Box<TotalizerNode>>,
    outputs: Vec<Id>,
    dirty: HashSet<Id>,
    input: Id,
}

impl TotalizerNode {
    fn internal() -> Self {
        TotalizerNode {
            left: None,
            right: None,
            outputs: Vec::new(),
            dirty: HashSet::new(),
            input: ID_NULL,
        }
    }

    fn leaf(id: Id) -> Self {
        TotalizerNode {
            left: None,
            right: None,
            outputs: vec![id],
            dirty: HashSet::new(),
            input: id,
        }
    }

    fn is_leaf(&self) -> bool {
        self.input != ID_NULL
    }

    fn output_size(&self) -> usize {
        self.outputs.len()
    }

    fn input_size(&self) -> usize {
        if self.is_leaf() {
            return 1;
        }
        self.left.as_ref().map_or(0, |l| l.output_size())
            + self.right.as_ref().map_or(0, |r| r.output_size())
    }

    fn add_output(&mut self, id: Id) {
        self.outputs.push(id);
        self.dirty.insert(id);
    }

    fn mark_dirty(&mut self) {
        self.dirty = self.outputs.iter().copied().collect();
        if let Some(l) = self.left.as_mut() {
            l.mark_dirty();
        }
        if let Some(r) = self.right.as_mut() {
            r.mark_dirty();
        }
    }

    fn is_clean(&self) -> bool {
        self.dirty.is_empty()
    }
}

/// Binary-tree totalizer whose internal nodes merge the sorted output
/// vectors of their children. Widening the cardinality appends outputs and
/// emits only the clauses that mention them.
pub struct TotalizerCardinalityConstraint {
    vars: VariableManager,
    root: Option<Box<TotalizerNode>>,
    cardinality: u32,
    outputs: Vec<Id>,
    inputs: Vec<Id>,
}

impl TotalizerCardinalityConstraint {
    pub fn new(vars: &VariableManager) -> Self {
        TotalizerCardinalityConstraint {
            vars: vars.clone(),
            root: None,
            cardinality: 0,
            outputs: Vec::new(),
            inputs: Vec::new(),
        }
    }

    fn fresh_var(vars: &VariableManager) -> Id {
        vars.new_internal("card")
    }

    fn increase_node(node: &mut TotalizerNode, cardinality: u32, vars: &VariableManager) {
        if let Some(l) = node.left.as_mut() {
            Self::increase_node(l, cardinality, vars);
        }
        if let Some(r) = node.right.as_mut() {
            Self::increase_node(r, cardinality, vars);
        }
        if node.is_leaf() {
            return;
        }
        let target = (cardinality as usize).min(node.input_size());
        while node.output_size() < target {
            node.add_output(Self::fresh_var(vars));
        }
    }

    fn update_cached_outputs(&mut self) {
        self.outputs.clear();
        if let Some(root) = self.root.as_ref() {
            self.outputs.extend_from_slice(&root.outputs);
        }
    }

    fn cnfize_node(node: &mut TotalizerNode, cnf: &mut ClauseVec) {
        if node.is_clean() {
            return;
        }
        if node.is_leaf() {
            node.dirty.clear();
            return;
        }
        if let Some(l) = node.left.as_mut() {
            Self::cnfize_node(l, cnf);
        }
        if let Some(r) = node.right.as_mut() {
            Self::cnfize_node(r, cnf);
        }

        // Clause generation follows the classic totalizer recurrence with
        // TRUE/FALSE sentinels framing each output vector.
        let mut a_vec = vec![ID_TRUE];
        let mut b_vec = vec![ID_TRUE];
        let mut r_vec = vec![ID_TRUE];
        if let Some(l) = node.left.as_ref() {
            a_vec.extend_from_slice(&l.outputs);
        }
        if let Some(r) = node.right.as_ref() {
            b_vec.extend_from_slice(&r.outputs);
        }
        r_vec.extend_from_slice(&node.outputs);
        a_vec.push(ID_FALSE);
        b_vec.push(ID_FALSE);
        r_vec.push(ID_FALSE);

        let dirty = |cls: &Clause| cls.iter().any(|&l| node.dirty.contains(&strip(l)));

        for alpha in 0..a_vec.len() - 1 {
            let a0 = a_vec[alpha];
            let a1 = a_vec[alpha + 1];
            for beta in 0..b_vec.len() - 1 {
                let b0 = b_vec[beta];
                let b1 = b_vec[beta + 1];

                let theta = alpha + beta;
                if theta + 1 >= r_vec.len() {
                    continue;
                }
                let r0 = r_vec[theta];
                let r1 = r_vec[theta + 1];

                // The >= direction.
                if a0 != ID_FALSE && b0 != ID_FALSE && r0 != ID_TRUE {
                    let c1 = vec![negate(a0), negate(b0), r0];
                    if dirty(&c1) {
                        cnf.push(c1);
                    }
                }
                // The <= direction.
                if a1 != ID_TRUE && b1 != ID_TRUE && r1 != ID_FALSE {
                    let c2 = vec![a1, b1, negate(r1)];
                    if dirty(&c2) {
                        cnf.push(c2);
                    }
                }
            }
        }

        node.dirty.clear();
    }
}

impl CardinalityConstraint for TotalizerCardinalityConstraint {
    fn add_input(&mut self, id: Id) {
        self.inputs.push(id);
        match self.root.take() {
            Some(old_root) => {
                let mut new_root = TotalizerNode::internal();
                new_root.left = Some(old_root);
                new_root.right = Some(Box::new(TotalizerNode::leaf(id)));
                let target = (self.cardinality as usize).min(new_root.input_size());
                while new_root.output_size() < target {
                    new_root.add_output(Self::fresh_var(&self.vars));
                }
                self.root = Some(Box::new(new_root));
            }
            None => {
                self.root = Some(Box::new(TotalizerNode::leaf(id)));
            }
        }
        self.update_cached_outputs();
    }

    fn cardinality(&self) -> u32 {
        self.cardinality
    }

    fn set_cardinality(&mut self, n: u32) {
        if n <= self.cardinality {
            return;
        }
        self.cardinality = n;
        if let Some(root) = self.root.as_mut() {
            Self::increase_node(root, n, &self.vars);
        }
        self.update_cached_outputs();
    }

    fn inputs(&self) -> &[Id] {
        &self.inputs
    }

    fn outputs(&self) -> &[Id] {
        &self.outputs
    }

    fn cnfize(&mut self) -> ClauseVec {
        self.clear_incrementality();
        self.incremental_cnfize()
    }

    fn incremental_cnfize(&mut self) -> ClauseVec {
        let mut cnf = ClauseVec::new();
        if let Some(root) = self.root.as_mut() {
            Self::cnfize_node(root, &mut cnf);
        }
        cnf
    }

    fn clear_incrementality(&mut self) {
        if let Some(root) = self.root.as_mut() {
            root.mark_dirty();
        }
    }
}

//
// Batcher odd-even sorting / cardinality networks
//

fn fresh_vars(vars: &VariableManager, n: usize) -> Vec<Id> {
    (0..n).map(|_| vars.new_internal("sort")).collect()
}

fn take_odd(vec: &[Id]) -> Vec<Id> {
    vec.iter().skip(1).step_by(2).copied().collect()
}

fn take_even(vec: &[Id]) -> Vec<Id> {
    vec.iter().step_by(2).copied().collect()
}

/// Two-comparator CNF: `y_1 = x_1 | x_2`, `y_2 = x_1 & x_2`.
fn comp(x_1: Id, x_2: Id, y_1: Id, y_2: Id, le: bool, ge: bool) -> ClauseVec {
    debug_assert!(le || ge);
    let mut cnf = ClauseVec::new();
    if le {
        cnf.push(vec![negate(x_1), y_1]);
        cnf.push(vec![negate(x_2), y_1]);
        cnf.push(vec![negate(x_1), negate(x_2), y_2]);
    }
    if ge {
        cnf.push(vec![x_1, negate(y_2)]);
        cnf.push(vec![x_2, negate(y_2)]);
        cnf.push(vec![x_1, x_2, negate(y_1)]);
    }
    cnf
}

pub fn comp_half(x_1: Id, x_2: Id, y_1: Id, y_2: Id) -> ClauseVec {
    comp(x_1, x_2, y_1, y_2, true, false)
}

pub fn comp_full(x_1: Id, x_2: Id, y_1: Id, y_2: Id) -> ClauseVec {
    comp(x_1, x_2, y_1, y_2, true, true)
}

/// `y = x_1 | x_2` for the truncated tail of a simplified merger.
fn partial_comp(x_1: Id, x_2: Id, y: Id, le: bool, ge: bool) -> ClauseVec {
    debug_assert!(le || ge);
    let mut cnf = ClauseVec::new();
    if le {
        cnf.push(vec![negate(x_1), y]);
        cnf.push(vec![negate(x_2), y]);
    }
    if ge {
        cnf.push(vec![x_1, x_2, negate(y)]);
    }
    cnf
}

/// Interleave the even and odd sub-merger outputs back into one vector.
fn zipper_merge(even: &[Id], odd: &[Id], a: usize, b: usize) -> Vec<Id> {
    debug_assert!(even.len() >= odd.len());
    let diff = even.len() - odd.len();
    debug_assert!(diff <= 2);
    if diff == 0 {
        debug_assert!(a % 2 == 0 && b % 2 == 0);
    }
    if diff == 1 {
        debug_assert!((a % 2) != (b % 2));
    }
    if diff == 2 {
        debug_assert!(a % 2 == 1 && b % 2 == 1);
    }

    let mut merged = Vec::with_capacity(even.len() + odd.len());
    if diff <= 1 {
        for i in 0..odd.len() {
            merged.push(even[i]);
            merged.push(odd[i]);
        }
        if diff == 1 {
            merged.push(*even.last().unwrap());
        }
    } else {
        // Both inputs odd: one extra even output lands mid-sequence at
        // position a, the other at the very end.
        let mut i_even = 0;
        let mut i_odd = 0;
        while i_odd < odd.len() {
            merged.push(even[i_even]);
            merged.push(odd[i_odd]);
            i_even += 1;
            i_odd += 1;
            if merged.len() == a + 1 {
                merged.push(even[i_even]);
                i_even += 1;
            }
        }
        debug_assert_eq!(i_even, even.len() - 1);
        merged.push(*even.last().unwrap());
    }
    merged
}

/// Sorted outputs plus defining clauses.
pub type CnfNetwork = (Vec<Id>, ClauseVec);

/// Odd-even merge of two sorted vectors.
pub fn merge_network(
    vars: &VariableManager,
    inputs_a: &[Id],
    inputs_b: &[Id],
    le: bool,
    ge: bool,
) -> CnfNetwork {
    let (a_vec, b_vec) = if inputs_a.len() <= inputs_b.len() {
        (inputs_a, inputs_b)
    } else {
        (inputs_b, inputs_a)
    };
    let a = a_vec.len();
    let b = b_vec.len();
    debug_assert!(le || ge);

    let mut outputs = Vec::new();
    let mut cnf = ClauseVec::new();

    if a == 1 && b == 1 {
        outputs = fresh_vars(vars, 2);
        cnf = comp(a_vec[0], b_vec[0], outputs[0], outputs[1], le, ge);
    } else if a_vec.is_empty() {
        outputs = b_vec.to_vec();
    } else {
        let a_odd = take_odd(a_vec);
        let a_even = take_even(a_vec);
        let b_odd = take_odd(b_vec);
        let b_even = take_even(b_vec);

        let (z_odd, odd_cnf) = merge_network(vars, &a_odd, &b_odd, le, ge);
        let (z_even, even_cnf) = merge_network(vars, &a_even, &b_even, le, ge);

        let z = zipper_merge(&z_even, &z_odd, a, b);

        cnf.extend(odd_cnf);
        cnf.extend(even_cnf);

        outputs.reserve(a + b);
        outputs.push(z[0]);
        let mut i = 1;
        while i + 1 < z.len() {
            let z_i1 = z[i];
            let z_i2 = z[i + 1];
            let y_i1 = vars.new_internal("sort");
            let y_i2 = vars.new_internal("sort");
            cnf.extend(comp(z_i1, z_i2, y_i1, y_i2, le, ge));
            outputs.push(y_i1);
            outputs.push(y_i2);
            i += 2;
        }
        if (a + b) % 2 == 0 {
            debug_assert_eq!(outputs.len(), a + b - 1);
            outputs.push(*z.last().unwrap());
        }
    }

    (outputs, cnf)
}

/// Full odd-even sorting network.
pub fn sorting_network(vars: &VariableManager, inputs: &[Id], le: bool, ge: bool) -> CnfNetwork {
    let n = inputs.len();
    debug_assert!(n > 0);

    if n == 1 {
        return (inputs.to_vec(), ClauseVec::new());
    }
    if n == 2 {
        return merge_network(vars, &inputs[..1], &inputs[1..], le, ge);
    }

    let l = n / 2;
    let (outputs_left, cnf_left) = sorting_network(vars, &inputs[..l], le, ge);
    let (outputs_right, cnf_right) = sorting_network(vars, &inputs[l..], le, ge);
    let (outputs, cnf_merge) = merge_network(vars, &outputs_left, &outputs_right, le, ge);

    let mut cnf = cnf_left;
    cnf.extend(cnf_right);
    cnf.extend(cnf_merge);
    (outputs, cnf)
}

/// Merger truncated at `c` outputs: positions past `c` never matter to the
/// caller, so their comparators are elided.
pub fn simp_merge_network(
    vars: &VariableManager,
    inputs_a: &[Id],
    inputs_b: &[Id],
    c: usize,
    le: bool,
    ge: bool,
) -> CnfNetwork {
    let (mut a_vec, mut b_vec) = if inputs_a.len() <= inputs_b.len() {
        (inputs_a.to_vec(), inputs_b.to_vec())
    } else {
        (inputs_b.to_vec(), inputs_a.to_vec())
    };
    a_vec.truncate(c);
    b_vec.truncate(c);
    let a = a_vec.len();
    let b = b_vec.len();
    debug_assert!(a <= b && b <= c);
    debug_assert!(le || ge);

    let mut outputs = Vec::new();
    let mut cnf = ClauseVec::new();

    if a == 0 {
        outputs = b_vec;
    } else if a == 1 && b == 1 && c == 1 {
        let y = vars.new_internal("sort");
        cnf.extend(partial_comp(a_vec[0], b_vec[0], y, le, ge));
        outputs.push(y);
    } else if a + b <= c {
        let (o, f) = merge_network(vars, &a_vec, &b_vec, le, ge);
        outputs = o;
        cnf = f;
    } else {
        let is_even = c % 2 == 0;

        let a_odd = take_odd(&a_vec);
        let a_even = take_even(&a_vec);
        let b_odd = take_odd(&b_vec);
        let b_even = take_even(&b_vec);

        let odd_size = if is_even { c / 2 } else { (c - 1) / 2 };
        let even_size = if is_even { c / 2 + 1 } else { (c + 1) / 2 };

        let (z_odd, odd_cnf) = simp_merge_network(vars, &a_odd, &b_odd, odd_size, le, ge);
        let (z_even, even_cnf) = simp_merge_network(vars, &a_even, &b_even, even_size, le, ge);

        cnf.extend(odd_cnf);
        cnf.extend(even_cnf);

        outputs.reserve(c);
        outputs.push(z_even[0]);

        if is_even {
            debug_assert_eq!(z_even.len(), c / 2 + 1);
            debug_assert_eq!(z_odd.len(), c / 2);
            for i in 0..c / 2 - 1 {
                let y_1 = vars.new_internal("sort");
                let y_2 = vars.new_internal("sort");
                cnf.extend(comp(z_even[i + 1], z_odd[i], y_1, y_2, le, ge));
                outputs.push(y_1);
                outputs.push(y_2);
            }
            let y_c = vars.new_internal("sort");
            cnf.extend(partial_comp(
                *z_even.last().unwrap(),
                *z_odd.last().unwrap(),
                y_c,
                le,
                ge,
            ));
            outputs.push(y_c);
        } else {
            debug_assert_eq!(z_odd.len(), (c - 1) / 2);
            debug_assert_eq!(z_even.len(), (c + 1) / 2);
            for i in 0..(c - 1) / 2 {
                let y_1 = vars.new_internal("sort");
                let y_2 = vars.new_internal("sort");
                cnf.extend(comp(z_even[i + 1], z_odd[i], y_1, y_2, le, ge));
                outputs.push(y_1);
                outputs.push(y_2);
            }
        }
    }

    (outputs, cnf)
}

/// Sorting network truncated to the first `m` outputs.
pub fn cardinality_network(
    vars: &VariableManager,
    inputs: &[Id],
    m: usize,
    le: bool,
    ge: bool,
) -> CnfNetwork {
    let n = inputs.len();
    debug_assert!(n > 0 && m > 0);

    if n <= m {
        return sorting_network(vars, inputs, le, ge);
    }

    let l = n / 2;
    let (outputs_left, cnf_left) = cardinality_network(vars, &inputs[..l], m, le, ge);
    let (outputs_right, cnf_right) = cardinality_network(vars, &inputs[l..], m, le, ge);
    let (outputs, cnf_merge) = simp_merge_network(vars, &outputs_left, &outputs_right, m, le, ge);

    let mut cnf = cnf_left;
    cnf.extend(cnf_right);
    cnf.extend(cnf_merge);
    (outputs, cnf)
}

/// Cardinality constraint built from a (two-direction) cardinality network.
/// Widening rebuilds the network with fresh outputs; stale clauses left in a
/// solver stay sound because assumptions only mention current outputs.
pub struct SortingCardinalityConstraint {
    vars: VariableManager,
    inputs: Vec<Id>,
    outputs: Vec<Id>,
    cnf: ClauseVec,
    cardinality: u32,
    emitted: usize,
    dirty: bool,
}

impl SortingCardinalityConstraint {
    pub fn new(vars: &VariableManager) -> Self {
        SortingCardinalityConstraint {
            vars: vars.clone(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            cnf: ClauseVec::new(),
            cardinality: 0,
            emitted: 0,
            dirty: false,
        }
    }

    fn rebuild_if_needed(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.emitted = 0;
        self.outputs.clear();
        self.cnf.clear();
        if self.inputs.is_empty() || self.cardinality == 0 {
            return;
        }
        let m = (self.cardinality as usize).min(self.inputs.len());
        let (outputs, cnf) = cardinality_network(&self.vars, &self.inputs, m, true, true);
        self.outputs = outputs;
        self.cnf = cnf;
    }
}

impl CardinalityConstraint for SortingCardinalityConstraint {
    fn add_input(&mut self, id: Id) {
        self.inputs.push(id);
        self.dirty = true;
    }

    fn cardinality(&self) -> u32 {
        self.cardinality
    }

    fn set_cardinality(&mut self, n: u32) {
        if n <= self.cardinality {
            return;
        }
        self.cardinality = n;
        self.dirty = true;
    }

    fn inputs(&self) -> &[Id] {
        &self.inputs
    }

    fn outputs(&self) -> &[Id] {
        &self.outputs
    }

    fn cnfize(&mut self) -> ClauseVec {
        self.rebuild_if_needed();
        self.emitted = self.cnf.len();
        self.cnf.clone()
    }

    fn incremental_cnfize(&mut self) -> ClauseVec {
        self.rebuild_if_needed();
        let new = self.cnf[self.emitted..].to_vec();
        self.emitted = self.cnf.len();
        new
    }

    fn clear_incrementality(&mut self) {
        self.emitted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::SatAdaptor;
    use crate::sat::SatValue;

    fn setup(n: usize) -> (VariableManager, Vec<Id>) {
        let vars = VariableManager::new();
        let inputs = (0..n)
            .map(|i| vars.new_internal(&format!("x{}", i)))
            .collect();
        (vars, inputs)
    }

    fn count_true(solver: &SatAdaptor, lits: &[Id]) -> usize {
        lits.iter()
            .filter(|&&l| solver.get_assignment_to_var(l) == SatValue::True)
            .count()
    }

    fn check_counting<C: CardinalityConstraint>(card: &mut C, inputs: &[Id]) {
        let mut solver = SatAdaptor::default();
        solver.add_clauses(&card.cnfize());

        // First three inputs true, rest false: exactly 3 outputs are high.
        let mut assumps: Cube = inputs[..3].to_vec();
        assumps.extend(inputs[3..].iter().map(|&l| negate(l)));
        assert!(solver.solve(&assumps));
        let high = count_true(&solver, card.outputs());
        assert_eq!(high, 3);

        // assume_eq pins the count both ways.
        let mut eq = card.assume_eq(3);
        eq.extend(inputs[..3].iter().copied());
        eq.extend(inputs[3..].iter().map(|&l| negate(l)));
        assert!(solver.solve(&eq));

        let mut wrong = card.assume_eq(2);
        wrong.extend(inputs[..3].iter().copied());
        wrong.extend(inputs[3..].iter().map(|&l| negate(l)));
        assert!(!solver.solve(&wrong));
    }

    #[test]
    fn test_totalizer_counting() {
        let (vars, inputs) = setup(8);
        let mut card = TotalizerCardinalityConstraint::new(&vars);
        card.add_inputs(&inputs);
        card.set_cardinality(6);
        check_counting(&mut card, &inputs);
        // Five ones is representable, six exceeds the output vector.
        let mut solver = SatAdaptor::default();
        solver.add_clauses(&card.cnfize());
        assert!(solver.solve(&card.assume_eq(5)));
    }

    #[test]
    #[should_panic]
    fn test_totalizer_assume_over_cardinality() {
        let (vars, inputs) = setup(8);
        let mut card = TotalizerCardinalityConstraint::new(&vars);
        card.add_inputs(&inputs);
        card.set_cardinality(6);
        card.cnfize();
        card.assume_eq(6);
    }

    #[test]
    fn test_totalizer_incremental_widening() {
        let (vars, inputs) = setup(6);
        let mut card = TotalizerCardinalityConstraint::new(&vars);
        card.add_inputs(&inputs);
        card.set_cardinality(2);
        let mut solver = SatAdaptor::default();
        solver.add_clauses(&card.incremental_cnfize());
        // <= 1 of six.
        let mut assumps = card.assume_leq(1);
        assumps.extend(inputs[..2].iter().copied());
        assert!(!solver.solve(&assumps));

        // Widen and send only the new clauses.
        card.set_cardinality(4);
        let extra = card.incremental_cnfize();
        assert!(!extra.is_empty());
        solver.add_clauses(&extra);
        let mut assumps = card.assume_leq(3);
        assumps.extend(inputs[..2].iter().copied());
        assert!(solver.solve(&assumps));
        let mut assumps = card.assume_leq(3);
        assumps.extend(inputs[..4].iter().copied());
        assert!(!solver.solve(&assumps));
    }

    #[test]
    fn test_totalizer_full_range_eq() {
        let (vars, inputs) = setup(4);
        let mut card = TotalizerCardinalityConstraint::new(&vars);
        card.add_inputs(&inputs);
        card.set_cardinality(4);
        // n == inputs == outputs returns the inputs themselves.
        assert_eq!(card.assume_eq(4), inputs);
    }

    #[test]
    fn test_sorting_network_counting() {
        let (vars, inputs) = setup(8);
        let mut card = SortingCardinalityConstraint::new(&vars);
        card.add_inputs(&inputs);
        card.set_cardinality(6);
        check_counting(&mut card, &inputs);
    }

    #[test]
    fn test_sorting_network_sorts() {
        let (vars, inputs) = setup(5);
        let (outputs, cnf) = sorting_network(&vars, &inputs, true, true);
        assert_eq!(outputs.len(), 5);
        let mut solver = SatAdaptor::default();
        solver.add_clauses(&cnf);
        for ones in 0..=5usize {
            let assumps: Cube = inputs
                .iter()
                .enumerate()
                .map(|(i, &l)| if i < ones { l } else { negate(l) })
                .collect();
            assert!(solver.solve(&assumps));
            for (i, &o) in outputs.iter().enumerate() {
                let expect = if i < ones {
                    SatValue::True
                } else {
                    SatValue::False
                };
                assert_eq!(solver.get_assignment_to_var(o), expect);
            }
        }
    }

    #[test]
    fn test_cardinality_network_truncation() {
        let (vars, inputs) = setup(7);
        let (outputs, cnf) = cardinality_network(&vars, &inputs, 3, true, true);
        assert_eq!(outputs.len(), 3);
        let mut solver = SatAdaptor::default();
        solver.add_clauses(&cnf);
        // With 4 ones, all three outputs are forced high.
        let assumps: Cube = inputs
            .iter()
            .enumerate()
            .map(|(i, &l)| if i < 4 { l } else { negate(l) })
            .collect();
        assert!(solver.solve(&assumps));
        for &o in &outputs {
            assert_eq!(solver.get_assignment_to_var(o), SatValue::True);
        }
        // Assuming <= 2 (negating output 2) clashes with 4 ones.
        let mut assumps = assumps;
        assumps.push(negate(outputs[2]));
        assert!(!solver.solve(&assumps));
    }

    #[test]
    fn test_sorting_constraint_rebuild() {
        let (vars, inputs) = setup(5);
        let mut card = SortingCardinalityConstraint::new(&vars);
        card.add_inputs(&inputs);
        card.set_cardinality(2);
        let mut solver = SatAdaptor::default();
        solver.add_clauses(&card.cnfize());
        let mut assumps = card.assume_leq(1);
        assumps.extend(inputs[..3].iter().copied());
        assert!(!solver.solve(&assumps));

        // Widening rebuilds with fresh outputs; the stale clauses stay
        // behind harmlessly.
        card.set_cardinality(4);
        solver.add_clauses(&card.cnfize());
        let mut assumps = card.assume_leq(3);
        assumps.extend(inputs[..3].iter().copied());
        assert!(solver.solve(&assumps));
    }
}
