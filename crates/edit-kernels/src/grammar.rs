//! The ADP grammar builder and its compiled, densely-indexed form (C2).
//!
//! A grammar is built incrementally via `append_replacement`/`append_deletion`
//! /`append_insertion`, auto-registering nonterminals and operation names the
//! first time they are mentioned. [`Grammar::compile`] then freezes the
//! grammar into dense integer indices so the forward DP never touches a
//! string.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// One named edge out of a nonterminal, plus the nonterminal it leads to.
type Edge = (String, String);

#[derive(Clone, Debug, Default)]
struct RuleEntry {
    reps: Vec<Edge>,
    dels: Vec<Edge>,
    inss: Vec<Edge>,
}

/// A regular tree grammar describing which replace/delete/insert transitions
/// are legal at each nonterminal, built up by name before being [`compile`]d.
///
/// [`compile`]: Grammar::compile
#[derive(Clone, Debug)]
#[must_use]
pub struct Grammar {
    start: String,
    accepting: Vec<String>,
    nonterminals: Vec<String>,
    reps: Vec<String>,
    dels: Vec<String>,
    inss: Vec<String>,
    rules: HashMap<String, RuleEntry>,
}

impl Grammar {
    /// Creates a new grammar with the given start nonterminal and accepting
    /// set. Both are registered as nonterminals immediately.
    pub fn new(start: impl Into<String>, accepting: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let start = start.into();
        let accepting: Vec<String> = accepting.into_iter().map(Into::into).collect();

        let mut gra = Self {
            start: start.clone(),
            accepting: accepting.clone(),
            nonterminals: Vec::new(),
            reps: Vec::new(),
            dels: Vec::new(),
            inss: Vec::new(),
            rules: HashMap::new(),
        };
        gra.register(&start);
        for nont in &accepting {
            gra.register(nont);
        }
        gra
    }

    fn register(&mut self, nont: &str) {
        if !self.nonterminals.iter().any(|n| n == nont) {
            self.nonterminals.push(nont.to_string());
        }
        self.rules.entry(nont.to_string()).or_default();
    }

    /// Adds a replacement transition `source --op--> target`.
    pub fn append_replacement(&mut self, source: impl Into<String>, target: impl Into<String>, op: impl Into<String>) {
        let (source, target, op) = (source.into(), target.into(), op.into());
        if !self.reps.contains(&op) {
            self.reps.push(op.clone());
        }
        self.register(&source);
        self.register(&target);
        self.rules.get_mut(&source).expect("just registered").reps.push((op, target));
    }

    /// Adds a deletion transition `source --op--> target`.
    pub fn append_deletion(&mut self, source: impl Into<String>, target: impl Into<String>, op: impl Into<String>) {
        let (source, target, op) = (source.into(), target.into(), op.into());
        if !self.dels.contains(&op) {
            self.dels.push(op.clone());
        }
        self.register(&source);
        self.register(&target);
        self.rules.get_mut(&source).expect("just registered").dels.push((op, target));
    }

    /// Adds an insertion transition `source --op--> target`.
    pub fn append_insertion(&mut self, source: impl Into<String>, target: impl Into<String>, op: impl Into<String>) {
        let (source, target, op) = (source.into(), target.into(), op.into());
        if !self.inss.contains(&op) {
            self.inss.push(op.clone());
        }
        self.register(&source);
        self.register(&target);
        self.rules.get_mut(&source).expect("just registered").inss.push((op, target));
    }

    /// Returns the number of nonterminals in this grammar.
    pub fn size(&self) -> usize {
        self.nonterminals.len()
    }

    /// Returns the start nonterminal's name.
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Returns the nonterminals in registration order.
    pub fn nonterminals(&self) -> &[String] {
        &self.nonterminals
    }

    /// Freezes this grammar into a [`CompiledGrammar`] with dense integer
    /// indices, validating that every nonterminal/op name mentioned by a
    /// rule was actually registered.
    pub fn compile(&self) -> Result<CompiledGrammar> {
        let nont_idx = index_map(&self.nonterminals);
        let rep_idx = index_map(&self.reps);
        let del_idx = index_map(&self.dels);
        let ins_idx = index_map(&self.inss);

        let start = *nont_idx.get(&self.start).ok_or_else(|| Error::UnknownSymbol {
            symbol: self.start.clone(),
            context: "grammar start".to_string(),
        })?;
        let accepting = self
            .accepting
            .iter()
            .map(|n| lookup(&nont_idx, n, "accepting set"))
            .collect::<Result<Vec<_>>>()?;

        let mut rep_adj = vec![Vec::new(); self.nonterminals.len()];
        let mut del_adj = vec![Vec::new(); self.nonterminals.len()];
        let mut ins_adj = vec![Vec::new(); self.nonterminals.len()];
        let mut rep_inv = vec![Vec::new(); self.nonterminals.len()];
        let mut del_inv = vec![Vec::new(); self.nonterminals.len()];
        let mut ins_inv = vec![Vec::new(); self.nonterminals.len()];

        for (source, nont) in self.nonterminals.iter().enumerate() {
            let entry = self.rules.get(nont).ok_or_else(|| Error::UnknownSymbol {
                symbol: nont.clone(),
                context: "rule table".to_string(),
            })?;
            for (op, target) in &entry.reps {
                let op = lookup(&rep_idx, op, "replacement rule")?;
                let target = lookup(&nont_idx, target, "replacement rule")?;
                rep_adj[source].push((op, target));
                rep_inv[target].push((op, source));
            }
            for (op, target) in &entry.dels {
                let op = lookup(&del_idx, op, "deletion rule")?;
                let target = lookup(&nont_idx, target, "deletion rule")?;
                del_adj[source].push((op, target));
                del_inv[target].push((op, source));
            }
            for (op, target) in &entry.inss {
                let op = lookup(&ins_idx, op, "insertion rule")?;
                let target = lookup(&nont_idx, target, "insertion rule")?;
                ins_adj[source].push((op, target));
                ins_inv[target].push((op, source));
            }
        }

        Ok(CompiledGrammar {
            nonterminals: self.nonterminals.clone(),
            rep_names: self.reps.clone(),
            del_names: self.dels.clone(),
            ins_names: self.inss.clone(),
            start,
            accepting,
            rep_adj,
            del_adj,
            ins_adj,
            rep_inv,
            del_inv,
            ins_inv,
        })
    }
}

fn index_map(names: &[String]) -> HashMap<String, usize> {
    names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect()
}

fn lookup(map: &HashMap<String, usize>, name: &str, context: &str) -> Result<usize> {
    map.get(name).copied().ok_or_else(|| Error::UnknownSymbol {
        symbol: name.to_string(),
        context: context.to_string(),
    })
}

/// A grammar after [`Grammar::compile`], indexed by dense `usize` ids instead
/// of strings. The forward DP and every backtrace routine operate only on
/// this form.
#[derive(Clone, Debug)]
#[must_use]
pub struct CompiledGrammar {
    nonterminals: Vec<String>,
    rep_names: Vec<String>,
    del_names: Vec<String>,
    ins_names: Vec<String>,
    start: usize,
    accepting: Vec<usize>,
    rep_adj: Vec<Vec<(usize, usize)>>,
    del_adj: Vec<Vec<(usize, usize)>>,
    ins_adj: Vec<Vec<(usize, usize)>>,
    rep_inv: Vec<Vec<(usize, usize)>>,
    del_inv: Vec<Vec<(usize, usize)>>,
    ins_inv: Vec<Vec<(usize, usize)>>,
}

impl CompiledGrammar {
    /// Number of nonterminals.
    pub fn size(&self) -> usize {
        self.nonterminals.len()
    }

    /// Index of the start nonterminal.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Indices of the accepting nonterminals.
    pub fn accepting(&self) -> &[usize] {
        &self.accepting
    }

    /// Name of nonterminal `idx`.
    pub fn nonterminal_name(&self, idx: usize) -> &str {
        &self.nonterminals[idx]
    }

    /// Name of replacement operation `idx`.
    pub fn rep_name(&self, idx: usize) -> &str {
        &self.rep_names[idx]
    }

    /// Name of deletion operation `idx`.
    pub fn del_name(&self, idx: usize) -> &str {
        &self.del_names[idx]
    }

    /// Name of insertion operation `idx`.
    pub fn ins_name(&self, idx: usize) -> &str {
        &self.ins_names[idx]
    }

    /// Forward adjacency: `(op, target)` pairs reachable from `source` by a
    /// replacement.
    pub fn reps_from(&self, source: usize) -> &[(usize, usize)] {
        &self.rep_adj[source]
    }

    /// Forward adjacency for deletions.
    pub fn dels_from(&self, source: usize) -> &[(usize, usize)] {
        &self.del_adj[source]
    }

    /// Forward adjacency for insertions.
    pub fn inss_from(&self, source: usize) -> &[(usize, usize)] {
        &self.ins_adj[source]
    }

    /// Inverse adjacency: `(op, source)` pairs that reach `target` by a
    /// replacement.
    pub fn reps_into(&self, target: usize) -> &[(usize, usize)] {
        &self.rep_inv[target]
    }

    /// Inverse adjacency for deletions.
    pub fn dels_into(&self, target: usize) -> &[(usize, usize)] {
        &self.del_inv[target]
    }

    /// Inverse adjacency for insertions.
    pub fn inss_into(&self, target: usize) -> &[(usize, usize)] {
        &self.ins_inv[target]
    }
}

#[cfg(test)]
mod tests {
    use super::Grammar;

    #[test]
    fn construction_registers_start_and_accepting() {
        let mut gra = Grammar::new("A", ["A"]);
        gra.append_replacement("A", "A", "rep");
        gra.append_deletion("A", "A", "del");
        gra.append_insertion("A", "A", "ins");

        assert_eq!(gra.size(), 1);
        assert_eq!(gra.start(), "A");
        assert_eq!(gra.nonterminals(), &["A".to_string()]);
    }

    #[test]
    fn adjacency_lists_match_reference_grammar() {
        let mut gra = Grammar::new("A", ["A", "B", "C"]);
        gra.append_replacement("A", "A", "rep");
        gra.append_deletion("A", "B", "del");
        gra.append_insertion("A", "C", "ins");
        gra.append_replacement("B", "A", "rep");
        gra.append_deletion("B", "B", "skdel");
        gra.append_insertion("B", "C", "ins");
        gra.append_replacement("C", "A", "rep");
        gra.append_insertion("C", "C", "skins");

        let compiled = gra.compile().expect("well-formed grammar compiles");
        assert_eq!(compiled.start(), 0);
        assert_eq!(compiled.accepting(), &[0, 1, 2]);
        assert_eq!(compiled.reps_from(0), &[(0, 0)]);
        assert_eq!(compiled.reps_from(1), &[(0, 0)]);
        assert_eq!(compiled.reps_from(2), &[(0, 0)]);
        assert_eq!(compiled.dels_from(0), &[(0, 1)]);
        assert_eq!(compiled.dels_from(1), &[(1, 1)]);
        assert!(compiled.dels_from(2).is_empty());
        assert_eq!(compiled.inss_from(0), &[(0, 2)]);
        assert_eq!(compiled.inss_from(1), &[(0, 2)]);
        assert_eq!(compiled.inss_from(2), &[(1, 2)]);
    }

    #[test]
    fn inverse_adjacency_lists_match_reference_grammar() {
        let mut gra = Grammar::new("A", ["A", "B", "C"]);
        gra.append_replacement("A", "A", "rep");
        gra.append_deletion("A", "B", "del");
        gra.append_insertion("A", "C", "ins");
        gra.append_replacement("B", "A", "rep");
        gra.append_deletion("B", "B", "skdel");
        gra.append_insertion("B", "C", "ins");
        gra.append_replacement("C", "A", "rep");
        gra.append_insertion("C", "C", "skins");

        let compiled = gra.compile().expect("well-formed grammar compiles");
        assert_eq!(compiled.reps_into(0), &[(0, 0), (0, 1), (0, 2)]);
        assert!(compiled.reps_into(1).is_empty());
        assert!(compiled.reps_into(2).is_empty());
        assert_eq!(compiled.dels_into(1), &[(0, 0), (1, 1)]);
        assert_eq!(compiled.inss_into(2), &[(0, 0), (0, 1), (1, 2)]);
    }
}
