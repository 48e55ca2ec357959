//! The variable manager: mints internal identifiers and cross-indexes them
//! with the external (AIGER) literals of the circuit.
//!
//! Every component of the engine requests fresh variables through the same
//! manager, so it is shared as a cloneable single-threaded handle. The
//! external-to-internal mapping is injective; external literal 0 is wired to
//! `ID_FALSE` up front so constant circuit literals translate like any other.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::aig::{aiger_not, aiger_sign, aiger_strip};
use crate::types::*;

/// A named variable record. `external == 0` means internal / freshly minted.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: Id,
    pub external: ExternalId,
    pub name: String,
}

#[derive(Debug)]
struct VarStore {
    next_id: Id,
    vars: HashMap<Id, Variable>,
    to_external: HashMap<Id, ExternalId>,
    to_internal: HashMap<ExternalId, Id>,
}

impl VarStore {
    fn new() -> Self {
        let mut store = VarStore {
            next_id: MIN_ID,
            vars: HashMap::new(),
            to_external: HashMap::new(),
            to_internal: HashMap::new(),
        };
        store.vars.insert(
            ID_FALSE,
            Variable {
                id: ID_FALSE,
                external: 0,
                name: "false".to_string(),
            },
        );
        store.to_external.insert(ID_FALSE, 0);
        store.to_internal.insert(0, ID_FALSE);
        store
    }
}

/// Cloneable handle to the shared variable store.
#[derive(Debug, Clone)]
pub struct VariableManager {
    store: Rc<RefCell<VarStore>>,
}

impl Default for VariableManager {
    fn default() -> Self {
        VariableManager {
            store: Rc::new(RefCell::new(VarStore::new())),
        }
    }
}

impl VariableManager {
    pub fn new() -> Self {
        VariableManager::default()
    }

    /// Mint a fresh internal identifier. A non-zero `external` registers the
    /// bidirectional mapping to the AIGER literal.
    pub fn new_var(&self, name: &str, external: ExternalId) -> Id {
        let mut store = self.store.borrow_mut();
        let id = store.next_id;
        assert!(id <= MAX_ID);
        store.next_id += ID_INCR;

        let name = if name.is_empty() {
            format!("v{}", id)
        } else {
            name.to_string()
        };
        store.vars.insert(id, Variable { id, external, name });

        if external != 0 {
            debug_assert!(!store.to_external.contains_key(&id));
            debug_assert!(!store.to_internal.contains_key(&external));
            store.to_external.insert(id, external);
            store.to_internal.insert(external, id);
        }

        id
    }

    /// Mint a fresh internal-only identifier.
    pub fn new_internal(&self, name: &str) -> Id {
        self.new_var(name, 0)
    }

    pub fn is_known(&self, id: Id) -> bool {
        self.store.borrow().vars.contains_key(&strip(unprime(id)))
    }

    pub fn is_known_external(&self, external: ExternalId) -> bool {
        self.store
            .borrow()
            .to_internal
            .contains_key(&aiger_strip(external))
    }

    /// Translate an AIGER literal into an internal identifier, preserving the
    /// sign.
    pub fn to_internal(&self, external: ExternalId) -> Result<Id> {
        let store = self.store.borrow();
        let id = store
            .to_internal
            .get(&aiger_strip(external))
            .copied()
            .ok_or(Error::UnknownExternal(external))?;
        Ok(if aiger_sign(external) { negate(id) } else { id })
    }

    /// Invert [`to_internal`](Self::to_internal). The identifier's prime
    /// count must be 0.
    pub fn to_external(&self, id: Id) -> Result<ExternalId> {
        debug_assert!(is_valid_id(id));
        debug_assert_eq!(nprimes(id), 0);
        let neg = is_negated(id);
        let stripped = strip(id);
        let store = self.store.borrow();
        let var = store
            .vars
            .get(&stripped)
            .ok_or(Error::UnknownVariable(stripped))?;
        debug_assert!(!aiger_sign(var.external));
        Ok(if neg { aiger_not(var.external) } else { var.external })
    }

    pub fn var_of(&self, id: Id) -> Result<Variable> {
        debug_assert!(is_valid_id(id));
        let stripped = strip(unprime(id));
        self.store
            .borrow()
            .vars
            .get(&stripped)
            .cloned()
            .ok_or(Error::UnknownVariable(stripped))
    }

    pub fn make_internal(&self, cls: &[ExternalId]) -> Result<Clause> {
        cls.iter().map(|&lit| self.to_internal(lit)).collect()
    }

    pub fn make_internal_vec(&self, vec: &[ExternalClause]) -> Result<ClauseVec> {
        vec.iter().map(|cls| self.make_internal(cls)).collect()
    }

    pub fn make_external(&self, cls: &[Id]) -> Result<ExternalClause> {
        cls.iter().map(|&id| self.to_external(id)).collect()
    }

    pub fn make_external_vec(&self, vec: &[Clause]) -> Result<ExternalClauseVec> {
        vec.iter().map(|cls| self.make_external(cls)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ids_are_spaced() {
        let vars = VariableManager::new();
        let a = vars.new_internal("a");
        let b = vars.new_internal("b");
        assert_eq!(a, MIN_ID);
        assert_eq!(b, a + ID_INCR);
        assert!(vars.is_known(a));
        assert!(!vars.is_known(b + ID_INCR));
    }

    #[test]
    fn test_external_round_trip() {
        let vars = VariableManager::new();
        let a = vars.new_var("i0", 2);
        let b = vars.new_var("i1", 4);
        for &ext in &[2u32, 3, 4, 5] {
            let id = vars.to_internal(ext).unwrap();
            assert_eq!(vars.to_external(id).unwrap(), ext);
        }
        assert_eq!(vars.to_internal(3).unwrap(), negate(a));
        assert_eq!(vars.to_internal(5).unwrap(), negate(b));
        // Constant false is pre-registered as external 0.
        assert_eq!(vars.to_internal(0).unwrap(), ID_FALSE);
        assert_eq!(vars.to_internal(1).unwrap(), ID_TRUE);
    }

    #[test]
    fn test_unknown_lookups() {
        let vars = VariableManager::new();
        assert_eq!(vars.to_internal(10), Err(Error::UnknownExternal(10)));
        assert_eq!(
            vars.to_external(MIN_ID),
            Err(Error::UnknownVariable(MIN_ID))
        );
    }

    #[test]
    fn test_internal_vars_have_no_external() {
        let vars = VariableManager::new();
        let a = vars.new_internal("");
        assert_eq!(vars.var_of(a).unwrap().external, 0);
        assert_eq!(vars.var_of(a).unwrap().name, format!("v{}", a));
    }
}
