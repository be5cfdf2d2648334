//! MRF variables.
//!
//! A variable groups the ground atoms that are assigned jointly: a
//! binary variable owns one atom, a (soft) mutex variable owns all the
//! atoms that differ only in their mutex argument.

use common::* ;


/// Kind of an MRF variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
  /// One atom, two values.
  Binary,
  /// Exactly one of the atoms is true.
  Mutex,
  /// At most one of the atoms is true.
  SoftMutex,
}

/// An MRF variable.
#[derive(Debug, Clone)]
pub struct MrfVar {
  /// Index of this variable.
  pub idx: VarIdx,
  /// Kind.
  pub kind: VarKind,
  /// Display name.
  pub name: String,
  /// Atoms owned by this variable, in atom index order.
  pub atoms: Vec<AtomIdx>,
}

impl MrfVar {

  /// Number of values this variable ranges over.
  pub fn value_count(& self) -> usize {
    match self.kind {
      VarKind::Binary => 2,
      VarKind::Mutex => self.atoms.len(),
      VarKind::SoftMutex => self.atoms.len() + 1,
    }
  }

  /// Truth values of the owned atoms for a value of this variable.
  ///
  /// Binary variables order falsity first. Mutex value `i` sets atom `i`
  /// true and the rest false. The last soft mutex value sets every atom
  /// false.
  pub fn value(& self, value: usize) -> Vec<f64> {
    match self.kind {
      VarKind::Binary => vec![ value as f64 ],
      VarKind::Mutex | VarKind::SoftMutex => {
        let mut res = vec![ 0. ; self.atoms.len() ] ;
        if value < self.atoms.len() {
          res[value] = 1.
        }
        res
      },
    }
  }

  /// Value index corresponding to given truth values of the owned atoms.
  pub fn value_index(& self, truths: & [f64]) -> Res<usize> {
    debug_assert_eq! { truths.len(), self.atoms.len() }
    match self.kind {
      VarKind::Binary => Ok(
        if truths[0] > 0. { 1 } else { 0 }
      ),
      VarKind::Mutex | VarKind::SoftMutex => {
        let mut active = None ;
        for (pos, & truth) in truths.iter().enumerate() {
          if truth > 0. {
            if active.is_some() {
              bail!(
                ErrorKind::InconsistentEvidence(
                  format!(
                    "more than one true atom in mutex variable `{}`",
                    self.name
                  )
                )
              )
            }
            active = Some(pos)
          }
        }
        match (active, self.kind) {
          (Some(pos), _) => Ok(pos),
          (None, VarKind::SoftMutex) => Ok( self.atoms.len() ),
          // Unreachable: the outer match only reaches this code for
          // mutex kinds.
          (None, VarKind::Binary) => unreachable!(),
          (None, VarKind::Mutex) => bail!(
            ErrorKind::InconsistentEvidence(
              format!(
                "no true atom in mutex variable `{}`", self.name
              )
            )
          ),
        }
      },
    }
  }

  /// Values of this variable consistent with some (partial) evidence.
  ///
  /// Returns the value indices with the atom truths they induce. Fails
  /// when the evidence sets two atoms of a mutex variable true.
  pub fn values_under(
    & self, evidence: & [Option<f64>]
  ) -> Res< Vec<(usize, Vec<f64>)> > {
    match self.kind {
      VarKind::Binary => {
        let atom = self.atoms[0] ;
        match evidence[* atom] {
          Some(truth) => {
            let value = if truth > 0. { 1 } else { 0 } ;
            Ok( vec![ (value, vec![ truth ]) ] )
          },
          None => Ok(
            vec![ (0, vec![ 0. ]), (1, vec![ 1. ]) ]
          ),
        }
      },

      VarKind::Mutex | VarKind::SoftMutex => {
        let mut forced = None ;
        let mut excluded = vec![ false ; self.atoms.len() ] ;
        for (pos, atom) in self.atoms.iter().enumerate() {
          match evidence[* * atom] {
            Some(truth) if truth > 0. => {
              if forced.is_some() {
                bail!(
                  ErrorKind::InconsistentEvidence(
                    format!(
                      "evidence sets two atoms of mutex variable `{}` \
                      true", self.name
                    )
                  )
                )
              }
              forced = Some(pos)
            },
            Some(_) => excluded[pos] = true,
            None => (),
          }
        }

        if let Some(pos) = forced {
          return Ok( vec![ (pos, self.value(pos)) ] )
        }

        let mut res = Vec::new() ;
        for pos in 0..self.atoms.len() {
          if ! excluded[pos] {
            res.push( (pos, self.value(pos)) )
          }
        }
        if self.kind == VarKind::SoftMutex {
          res.push(
            ( self.atoms.len(), self.value( self.atoms.len() ) )
          )
        }
        if res.is_empty() {
          bail!(
            ErrorKind::InconsistentEvidence(
              format!(
                "evidence excludes every value of mutex variable `{}`",
                self.name
              )
            )
          )
        }
        Ok(res)
      },
    }
  }

  /// Value index forced by complete evidence over the owned atoms, if
  /// the evidence is complete.
  pub fn evidence_value_index(
    & self, evidence: & [Option<f64>]
  ) -> Res< Option<usize> > {
    let mut truths = Vec::with_capacity( self.atoms.len() ) ;
    for atom in & self.atoms {
      match evidence[* * atom] {
        Some(truth) => truths.push(truth),
        None => return Ok(None),
      }
    }
    self.value_index(& truths).map(Some)
  }

  /// Writes a value of this variable into a world.
  pub fn set_value(& self, value: usize, world: & mut [f64]) {
    for (atom, truth) in self.atoms.iter().zip(
      self.value(value).into_iter()
    ) {
      world[* * atom] = truth
    }
  }
}


#[cfg(test)]
mod test {
  use super::* ;

  fn mutex_var(atoms: usize, soft: bool) -> MrfVar {
    MrfVar {
      idx: VarIdx::zero(),
      kind: if soft { VarKind::SoftMutex } else { VarKind::Mutex },
      name: "v".into(),
      atoms: (0..atoms).map( AtomIdx::new ).collect(),
    }
  }

  #[test]
  fn binary_values() {
    let var = MrfVar {
      idx: VarIdx::zero(),
      kind: VarKind::Binary,
      name: "v".into(),
      atoms: vec![ AtomIdx::new(0) ],
    } ;
    assert_eq!( var.value_count(), 2 ) ;
    assert_eq!( var.value(0), vec![ 0. ] ) ;
    assert_eq!( var.value(1), vec![ 1. ] ) ;
    let vals = var.values_under(& [ None ]).unwrap() ;
    assert_eq!( vals.len(), 2 ) ;
    // Falsity comes first.
    assert_eq!( vals[0].0, 0 )
  }

  #[test]
  fn mutex_values() {
    let var = mutex_var(3, false) ;
    assert_eq!( var.value_count(), 3 ) ;
    assert_eq!( var.value(1), vec![ 0., 1., 0. ] ) ;
    assert_eq!( var.value_index(& [ 0., 0., 1. ]).unwrap(), 2 )
  }

  #[test]
  fn soft_mutex_all_false() {
    let var = mutex_var(2, true) ;
    assert_eq!( var.value_count(), 3 ) ;
    assert_eq!( var.value(2), vec![ 0., 0. ] ) ;
    assert_eq!( var.value_index(& [ 0., 0. ]).unwrap(), 2 )
  }

  #[test]
  fn mutex_conflicting_evidence() {
    let var = mutex_var(2, false) ;
    let err = var.values_under(
      & [ Some(1.), Some(1.) ]
    ).unwrap_err() ;
    assert!( err.is_inconsistent() ) ;
    let err = var.value_index(& [ 1., 1. ]).unwrap_err() ;
    assert!( err.is_inconsistent() )
  }

  #[test]
  fn mutex_partial_evidence_prunes() {
    let var = mutex_var(3, false) ;
    let vals = var.values_under(
      & [ Some(0.), None, None ]
    ).unwrap() ;
    assert_eq!(
      vals.iter().map( |& (v, _)| v ).collect::< Vec<_> >(),
      vec![ 1, 2 ]
    )
  }
}
