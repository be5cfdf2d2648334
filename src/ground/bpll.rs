//! Statistics-only grounding for pseudo-likelihood learning.
//!
//! Instead of materializing ground formulas, accumulates for each
//! template `f`, conditioning slot `s` and value `v` the summed truth
//! of the groundings of `f` when `s` is forced to `v` and the rest of
//! the world is fixed to the evidence. Slots are MRF variables, or
//! single atoms in by-atom mode (plain pseudo-likelihood).

use common::* ;
use mrf::{ Mrf, TempEvidence } ;

use super::Assignments ;


/// Counts accumulated by the statistics-only grounder.
#[derive(Debug, Clone)]
pub struct BpllStats {
  /// `counts[template][slot][value]`: summed truth of the template's
  /// groundings with the slot forced to the value. Slots a template
  /// never touches are absent.
  pub counts: FmlMap< HashMap< usize, Vec<f64> > >,
  /// Value index of every slot under the evidence.
  pub evidence_values: Vec<usize>,
  /// Number of values of every slot.
  pub value_counts: Vec<usize>,
}

impl BpllStats {
  /// Slots with at least one count for some template.
  pub fn touched_slots(& self) -> Vec<usize> {
    let mut slots = HashSet::new() ;
    for by_slot in & self.counts {
      for slot in by_slot.keys() {
        slots.insert(* slot) ;
      }
    }
    let mut slots: Vec<usize> = slots.into_iter().collect() ;
    slots.sort() ;
    slots
  }
}


/// The statistics-only grounder.
pub struct BpllGrounding {
  /// Condition on single atoms instead of variables.
  pub by_atom: bool,
}

impl BpllGrounding {
  /// Constructor.
  pub fn new(by_atom: bool) -> Self {
    BpllGrounding { by_atom }
  }

  /// Number of slots of an MRF.
  fn slot_count(& self, mrf: & Mrf) -> usize {
    if self.by_atom { mrf.atoms.len() } else { mrf.vars.len() }
  }

  /// Atoms of a slot.
  fn slot_atoms(& self, mrf: & Mrf, slot: usize) -> Vec<AtomIdx> {
    if self.by_atom {
      vec![ AtomIdx::new(slot) ]
    } else {
      mrf.vars[ VarIdx::new(slot) ].atoms.clone()
    }
  }

  /// Atom truths of a value of a slot.
  fn slot_value(& self, mrf: & Mrf, slot: usize, value: usize) -> Vec<f64> {
    if self.by_atom {
      vec![ value as f64 ]
    } else {
      mrf.vars[ VarIdx::new(slot) ].value(value)
    }
  }

  /// Slot owning an atom.
  fn slot_of(& self, mrf: & Mrf, atom: AtomIdx) -> usize {
    if self.by_atom { * atom } else { * mrf.var_idx_of(atom) }
  }

  /// Accumulates the statistics of every template.
  ///
  /// Requires evidence (hard or soft) on every atom; learning drivers
  /// apply the closed-world assumption first.
  pub fn ground(& self, mrf: & Mrf) -> Res<BpllStats> {
    // Learning reads soft evidence as fractional truth.
    let mut ev: Vec< Option<f64> > = Vec::with_capacity(
      mrf.atoms.len()
    ) ;
    for atom in & mrf.atoms {
      ev.push(
        mrf.evidence_of(atom.idx).or( mrf.soft_of(atom.idx) )
      )
    }

    let slot_count = self.slot_count(mrf) ;
    let mut value_counts = Vec::with_capacity(slot_count) ;
    let mut evidence_values = Vec::with_capacity(slot_count) ;
    for slot in 0..slot_count {
      let atoms = self.slot_atoms(mrf, slot) ;
      let mut truths = Vec::with_capacity( atoms.len() ) ;
      for atom in & atoms {
        match ev[* * atom] {
          Some(truth) => truths.push(truth),
          None => bail!(
            "pseudo-likelihood statistics need evidence for every \
            atom, `{}` has none", mrf.atoms[* atom].name
          ),
        }
      }
      if self.by_atom {
        value_counts.push(2) ;
        evidence_values.push(
          if truths[0] > 0. { 1 } else { 0 }
        )
      } else {
        let var = & mrf.vars[ VarIdx::new(slot) ] ;
        value_counts.push( var.value_count() ) ;
        evidence_values.push( var.value_index(& truths) ? )
      }
    }

    let mut counts: FmlMap< HashMap< usize, Vec<f64> > > = vec![
      HashMap::new() ; mrf.mln().formulas.len()
    ].into() ;

    for fml_idx in mrf.mln().formulas.indices() {
      let tpl = mrf.mln().formulas[fml_idx].clone() ;
      if tpl.hard { continue }

      for assig in Assignments::of( & tpl.ast, mrf.mln() ) ? {
        let gnd = tpl.ast.ground(mrf, & assig, false) ? ;
        let mut atoms = AtomSet::new() ;
        gnd.atom_indices(& mut atoms) ;
        let mut slots: Vec<usize> = atoms.iter().map(
          |atom| self.slot_of(mrf, * atom)
        ).collect() ;
        slots.sort() ;
        slots.dedup() ;

        // One row of contributions per slot; discarded when the
        // grounding's truth is identically zero.
        let mut rows: Vec< (usize, Vec<f64>) > = Vec::with_capacity(
          slots.len()
        ) ;
        let mut all_zero = true ;
        for & slot in & slots {
          let atoms = self.slot_atoms(mrf, slot) ;
          let mut row = Vec::with_capacity( value_counts[slot] ) ;
          for value in 0..value_counts[slot] {
            let truths = self.slot_value(mrf, slot, value) ;
            let mut temp = TempEvidence::new(& mut ev) ;
            for (atom, & truth) in atoms.iter().zip( truths.iter() ) {
              temp.set( * atom, Some(truth) )
            }
            let truth = gnd.truth_under( temp.evidence() ).ok_or_else(
              || format!(
                "grounding of template {} is undetermined under \
                complete evidence", fml_idx
              )
            ) ? ;
            if truth != 0. { all_zero = false }
            row.push(truth)
          }
          rows.push( (slot, row) )
        }
        if all_zero { continue }

        for (slot, row) in rows {
          let entry = counts[fml_idx].entry(slot).or_insert_with(
            || vec![ 0. ; value_counts[slot] ]
          ) ;
          for (acc, truth) in entry.iter_mut().zip( row.into_iter() ) {
            * acc += truth
          }
        }
      }
    }

    Ok( BpllStats { counts, evidence_values, value_counts } )
  }
}


#[cfg(test)]
mod test {
  use super::* ;
  use mln::{ Mln, Database } ;

  fn mrf_with_full_evidence() -> Mrf {
    let mln = Mln::parse_str(
      "person = {Ann, Bob}\n\
      Smokes(person)\n\
      Cancer(person)\n\
      1.5      Smokes(x) => Cancer(x)\n",
      false, false,
    ).expect("parses") ;
    let dbs = Database::parse_str(
      "Smokes(Ann)\n\
      Cancer(Ann)\n\
      !Smokes(Bob)\n\
      !Cancer(Bob)\n",
      & mln, false, false,
    ).expect("parses") ;
    let mln = mln.materialize(& dbs).expect("materializes") ;
    Mrf::new( mln, & dbs[0] ).expect("builds")
  }

  #[test]
  fn counts_observed_world() {
    let mrf = mrf_with_full_evidence() ;
    let stats = BpllGrounding::new(false).ground(& mrf).expect(
      "grounds"
    ) ;
    assert_eq!( stats.value_counts, vec![ 2 ; 4 ] ) ;

    // With every slot at its evidence value, each grounding contributes
    // its observed truth: both groundings of the template are true.
    let mut observed = 0. ;
    for by_slot in stats.counts.iter() {
      for (& slot, row) in by_slot {
        // Evidence column of any single slot counts every grounding
        // touching it, so it is bounded by the grounding count.
        assert!( row[ stats.evidence_values[slot] ] <= 2. )
      }
    }
    // Smokes(Ann) true: flipping it cannot make the first grounding
    // true while Cancer(Ann) stays true.
    let atom = mrf.gnd_atom("Smokes(Ann)").expect("known") ;
    let slot = * mrf.var_idx_of(atom) ;
    let row = & stats.counts[ FmlIdx::new(0) ][& slot] ;
    assert_eq!( row[0], 1. ) ;
    assert_eq!( row[1], 1. ) ;
    observed += row[ stats.evidence_values[slot] ] ;
    assert_eq!( observed, 1. )
  }

  #[test]
  fn incomplete_evidence_is_an_error() {
    let mln = Mln::parse_str(
      "person = {Ann}\n\
      Smokes(person)\n\
      0.5      Smokes(x)\n",
      false, false,
    ).expect("parses").materialize(& []).expect("materializes") ;
    let mrf = Mrf::new( mln, & Database::new() ).expect("builds") ;
    assert!(
      BpllGrounding::new(false).ground(& mrf).is_err()
    )
  }

  #[test]
  fn by_atom_slots_are_atoms() {
    let mrf = mrf_with_full_evidence() ;
    let stats = BpllGrounding::new(true).ground(& mrf).expect(
      "grounds"
    ) ;
    assert_eq!( stats.evidence_values.len(), mrf.atoms.len() ) ;
    assert_eq!( stats.value_counts, vec![ 2 ; 4 ] )
  }
}
