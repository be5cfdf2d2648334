//! Negation normal form and clausal form conversion.
//!
//! Both transforms are only meaningful under the classical semantics; the
//! MC-SAT sampler and the WCSP converter apply them to ground formulas.

use logic::Formula ;


impl Formula {

  /// Negation normal form: negations pushed down to the literals,
  /// implications and biimplications expanded.
  pub fn nnf(self) -> Formula {
    match self {
      Formula::Lit { neg, star, pred, args } => Formula::Lit {
        neg, star, pred, args
      },
      Formula::GndLit { neg, atom } => Formula::GndLit { neg, atom },
      Formula::Eq { neg, lhs, rhs } => Formula::Eq { neg, lhs, rhs },
      Formula::Conj(kids) => Formula::Conj(
        kids.into_iter().map(Formula::nnf).collect()
      ),
      Formula::Disj(kids) => Formula::Disj(
        kids.into_iter().map(Formula::nnf).collect()
      ),
      Formula::Impl(lhs, rhs) => Formula::Disj(
        vec![ negate(* lhs).nnf(), rhs.nnf() ]
      ),
      Formula::Biimpl(lhs, rhs) => {
        let (l, r) = (* lhs, * rhs) ;
        Formula::Conj(
          vec![
            Formula::Disj( vec![ negate(l.clone()).nnf(), r.clone().nnf() ] ),
            Formula::Disj( vec![ negate(r).nnf(), l.nnf() ] ),
          ]
        )
      },
      Formula::Neg(kid) => negate(* kid).nnf(),
      Formula::Exist(vars, kid) => Formula::Exist(
        vars, Box::new( kid.nnf() )
      ),
      Formula::TrueFalse(t) => Formula::TrueFalse(t),
    }
  }

  /// Clausal form: a conjunction of disjunctions of literals.
  ///
  /// Only legal on quantifier-free formulas; exponential in the worst
  /// case.
  pub fn cnf(self) -> Formula {
    let nnf = self.nnf() ;
    let clauses = cnf_clauses(nnf) ;
    if clauses.len() == 1 {
      let mut clauses = clauses ;
      let clause = clauses.pop().expect("clauses has exactly one element") ;
      disj_of(clause)
    } else {
      Formula::Conj(
        clauses.into_iter().map(disj_of).collect()
      )
    }
  }
}


/// Negates a formula, without normalizing.
fn negate(f: Formula) -> Formula {
  match f {
    Formula::Lit { neg, star, pred, args } => Formula::Lit {
      neg: ! neg, star, pred, args
    },
    Formula::GndLit { neg, atom } => Formula::GndLit { neg: ! neg, atom },
    Formula::Eq { neg, lhs, rhs } => Formula::Eq { neg: ! neg, lhs, rhs },
    Formula::Conj(kids) => Formula::Disj(
      kids.into_iter().map(negate).collect()
    ),
    Formula::Disj(kids) => Formula::Conj(
      kids.into_iter().map(negate).collect()
    ),
    Formula::Neg(kid) => * kid,
    Formula::Impl(lhs, rhs) => Formula::Conj(
      vec![ * lhs, negate(* rhs) ]
    ),
    Formula::Biimpl(lhs, rhs) => {
      let (l, r) = (* lhs, * rhs) ;
      Formula::Disj(
        vec![
          Formula::Conj( vec![ l.clone(), negate(r.clone()) ] ),
          Formula::Conj( vec![ negate(l), r ] ),
        ]
      )
    },
    Formula::Exist(vars, kid) => Formula::Neg(
      Box::new( Formula::Exist(vars, kid) )
    ),
    Formula::TrueFalse(t) => Formula::TrueFalse(1. - t),
  }
}


/// Clauses of an NNF formula, each clause a vector of literals.
fn cnf_clauses(f: Formula) -> Vec< Vec<Formula> > {
  match f {
    Formula::Conj(kids) => {
      let mut res = Vec::new() ;
      for kid in kids {
        res.extend( cnf_clauses(kid) )
      }
      res
    },
    Formula::Disj(kids) => {
      // Distribute: the cartesian product of the children's clause sets.
      let mut res: Vec< Vec<Formula> > = vec![ vec![] ] ;
      for kid in kids {
        let kid_clauses = cnf_clauses(kid) ;
        let mut next = Vec::with_capacity( res.len() * kid_clauses.len() ) ;
        for lhs in & res {
          for rhs in & kid_clauses {
            let mut clause = lhs.clone() ;
            clause.extend( rhs.iter().cloned() ) ;
            next.push(clause)
          }
        }
        res = next
      }
      res
    },
    leaf => vec![ vec![leaf] ],
  }
}

/// Builds a disjunction, avoiding the wrapper for single literals.
fn disj_of(mut clause: Vec<Formula>) -> Formula {
  if clause.len() == 1 {
    clause.pop().expect("clause has exactly one element")
  } else {
    Formula::Disj(clause)
  }
}


#[cfg(test)]
mod test {
  use logic::{ Formula, Term } ;
  use common::* ;

  fn atom(idx: usize, neg: bool) -> Formula {
    Formula::GndLit { neg, atom: AtomIdx::new(idx) }
  }

  fn worlds(n: usize) -> Vec< Vec<f64> > {
    let mut res = Vec::new() ;
    for bits in 0..(1usize << n) {
      res.push(
        (0..n).map(
          |i| if bits & (1 << i) != 0 { 1. } else { 0. }
        ).collect()
      )
    }
    res
  }

  #[test]
  fn nnf_preserves_truth() {
    let f = Formula::Impl(
      Box::new( Formula::Conj( vec![ atom(0, false), atom(1, true) ] ) ),
      Box::new( Formula::Biimpl(
        Box::new( atom(2, false) ),
        Box::new( Formula::Neg( Box::new( atom(0, false) ) ) ),
      ) ),
    ) ;
    for world in worlds(3) {
      assert_eq!(
        f.truth(& world), f.clone().nnf().truth(& world)
      )
    }
  }

  #[test]
  fn cnf_preserves_truth() {
    let f = Formula::Biimpl(
      Box::new( Formula::Disj( vec![ atom(0, false), atom(1, false) ] ) ),
      Box::new( Formula::Conj( vec![ atom(2, true), atom(3, false) ] ) ),
    ) ;
    let cnf = f.clone().cnf() ;
    assert!( cnf.is_literal() || cnf.is_clause() || match cnf {
      Formula::Conj(ref kids) => kids.iter().all(|k| k.is_clause()),
      _ => false,
    } ) ;
    for world in worlds(4) {
      assert_eq!(
        f.truth(& world), f.clone().cnf().truth(& world)
      )
    }
  }

  #[test]
  fn nnf_negations_on_literals_only() {
    let f = Formula::Neg(
      Box::new( Formula::Conj(
        vec![
          Formula::Eq {
            neg: false,
            lhs: Term::Var("x".into(), false),
            rhs: Term::Var("y".into(), false),
          },
          atom(0, false),
        ]
      ) )
    ) ;
    fn check(f: & Formula) {
      match * f {
        Formula::Neg(_) | Formula::Impl(..) | Formula::Biimpl(..) =>
          panic!("connective survived NNF: {:?}", f),
        Formula::Conj(ref kids) | Formula::Disj(ref kids) =>
          for kid in kids { check(kid) },
        Formula::Exist(_, ref kid) => check(kid),
        _ => (),
      }
    }
    check( & f.nnf() )
  }
}
