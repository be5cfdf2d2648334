//! Grounders: from template formulas to ground formulas.
//!
//! All grounders agree on the ground formula order: template order
//! first, then the deterministic assignment order of each template.
//! With simplification active, soft groundings whose truth is fully
//! determined by the evidence are dropped and counted in the
//! [tally][stats]; determined-true hard groundings are dropped too,
//! while falsified hard groundings are kept so that inference reports
//! unsatisfiability.
//!
//! [stats]: struct.GroundingStats.html (GroundingStats)

use common::* ;
use logic::{ Formula, Term } ;
use mln::{ Mln, TemplateFormula } ;
use mrf::{ Mrf, GndFormula } ;

pub mod fastconj ;
pub mod bpll ;

pub use self::fastconj::FastConjunctionGrounding ;
pub use self::bpll::{ BpllGrounding, BpllStats } ;


/// What a grounding run reports besides the formulas pushed in the MRF.
#[derive(Debug, Clone)]
pub struct GroundingStats {
  /// Per-template sum of the truth values of the groundings dropped
  /// because the evidence fully determined them.
  pub true_tally: FmlMap<f64>,
}
impl GroundingStats {
  /// Zero tally for an MLN.
  pub fn new(mln: & Mln) -> Self {
    GroundingStats {
      true_tally: vec![ 0. ; mln.formulas.len() ].into(),
    }
  }
}

/// Ground formula producers.
pub trait Grounder {
  /// Grounds every template formula into the MRF.
  fn ground(& self, mrf: & mut Mrf) -> Res<GroundingStats> ;
}


/// Iterator over the assignments of a set of variables, rightmost
/// variable moving fastest.
pub struct Assignments {
  vars: Vec< (String, Vec<Sym>) >,
  cursors: Vec<usize>,
  done: bool,
}
impl Assignments {
  /// Assignments of the free variables of a formula.
  pub fn of(fml: & Formula, mln: & Mln) -> Res<Assignments> {
    let doms = fml.variables(mln) ? ;
    let mut vars = Vec::with_capacity( doms.len() ) ;
    let mut done = false ;
    for (var, dom) in doms {
      let csts = mln.domain(& dom).ok_or_else(
        || format!("unknown domain `{}`", dom)
      ) ?.clone() ;
      if csts.is_empty() { done = true }
      vars.push( (var, csts) )
    }
    let cursors = vec![ 0 ; vars.len() ] ;
    Ok( Assignments { vars, cursors, done } )
  }
}
impl Iterator for Assignments {
  type Item = Assignment ;
  fn next(& mut self) -> Option<Assignment> {
    if self.done { return None }
    let mut assig = Assignment::new() ;
    for ( & (ref var, ref csts), & cursor ) in self.vars.iter().zip(
      self.cursors.iter()
    ) {
      assig.insert( var.clone(), csts[cursor].clone() ) ;
    }
    let mut pos = self.cursors.len() ;
    loop {
      if pos == 0 {
        self.done = true ;
        break
      }
      pos -= 1 ;
      self.cursors[pos] += 1 ;
      if self.cursors[pos] < self.vars[pos].1.len() { break } else {
        self.cursors[pos] = 0
      }
    }
    Some(assig)
  }
}


/// Grounds one assignment of a template.
///
/// Shared leaf of every grounder: grounds, optionally simplifies
/// against the evidence, and either records or pushes the result.
pub fn ground_one(
  mrf: & Mrf, fml_idx: FmlIdx, tpl: & TemplateFormula,
  assig: & Assignment, simplify: bool,
  out: & mut Vec<GndFormula>, tally: & mut f64,
) -> Res<()> {
  let gnd = tpl.ast.ground(mrf, assig, false) ? ;
  let gnd = if simplify { gnd.simplified(mrf) } else { gnd } ;
  if simplify {
    if let Formula::TrueFalse(truth) = gnd {
      if ! tpl.hard {
        * tally += truth ;
        return Ok(())
      }
      if truth >= 1. {
        return Ok(())
      }
      // Falsified hard groundings stay so inference sees them.
    }
  }
  out.push(
    GndFormula {
      ast: gnd, weight: tpl.weight, hard: tpl.hard, fml: fml_idx,
    }
  ) ;
  Ok(())
}


/// Plain grounder: enumerates every assignment of every template.
pub struct DefaultGrounding {
  /// Simplify groundings against the evidence.
  pub simplify: bool,
}
impl DefaultGrounding {
  /// Constructor.
  pub fn new(simplify: bool) -> Self {
    DefaultGrounding { simplify }
  }
}
impl Grounder for DefaultGrounding {
  fn ground(& self, mrf: & mut Mrf) -> Res<GroundingStats> {
    let mut stats = GroundingStats::new( mrf.mln() ) ;
    for fml_idx in mrf.mln().formulas.indices() {
      let tpl = mrf.mln().formulas[fml_idx].clone() ;
      let mut out = Vec::new() ;
      let mut tally = 0. ;
      for assig in Assignments::of( & tpl.ast, mrf.mln() ) ? {
        ground_one(
          mrf, fml_idx, & tpl, & assig, self.simplify,
          & mut out, & mut tally,
        ) ?
      }
      stats.true_tally[fml_idx] = tally ;
      for gnd in out {
        mrf.push_gnd_formula(gnd)
      }
    }
    Ok(stats)
  }
}


/// Grounder pruning assignments that falsify an equality constraint.
///
/// Depth-first over the template's variables in their deterministic
/// order; a branch dies as soon as an equality constraint with both
/// sides bound evaluates to false.
pub struct EqualityConstraintGrounder {
  /// Simplify groundings against the evidence.
  pub simplify: bool,
}
impl EqualityConstraintGrounder {
  /// Constructor.
  pub fn new(simplify: bool) -> Self {
    EqualityConstraintGrounder { simplify }
  }

  fn dfs(
    & self, mrf: & Mrf, fml_idx: FmlIdx, tpl: & TemplateFormula,
    vars: & [ (String, Vec<Sym>) ],
    eqs: & [ (bool, Term, Term) ],
    assig: & mut Assignment,
    out: & mut Vec<GndFormula>, tally: & mut f64,
  ) -> Res<()> {
    if let Some( ( & (ref var, ref csts), rest ) ) = vars.split_first() {
      for cst in csts {
        assig.insert( var.clone(), cst.clone() ) ;
        if ! falsifies_eq(eqs, assig) {
          self.dfs(
            mrf, fml_idx, tpl, rest, eqs, assig, out, tally
          ) ?
        }
      }
      assig.remove(var) ;
      Ok(())
    } else {
      ground_one(mrf, fml_idx, tpl, assig, self.simplify, out, tally)
    }
  }
}
impl Grounder for EqualityConstraintGrounder {
  fn ground(& self, mrf: & mut Mrf) -> Res<GroundingStats> {
    let mut stats = GroundingStats::new( mrf.mln() ) ;
    for fml_idx in mrf.mln().formulas.indices() {
      let tpl = mrf.mln().formulas[fml_idx].clone() ;
      let doms = tpl.ast.variables( mrf.mln() ) ? ;
      let mut vars = Vec::with_capacity( doms.len() ) ;
      for (var, dom) in doms {
        let csts = mrf.mln().domain(& dom).ok_or_else(
          || format!("unknown domain `{}`", dom)
        ) ?.clone() ;
        vars.push( (var, csts) )
      }
      let mut eqs = Vec::new() ;
      collect_eqs( & tpl.ast, & mut eqs ) ;

      let mut out = Vec::new() ;
      let mut tally = 0. ;
      self.dfs(
        mrf, fml_idx, & tpl, & vars, & eqs, & mut Assignment::new(),
        & mut out, & mut tally,
      ) ? ;
      stats.true_tally[fml_idx] = tally ;
      for gnd in out {
        mrf.push_gnd_formula(gnd)
      }
    }
    Ok(stats)
  }
}

/// Collects the equality constraints of a formula.
fn collect_eqs(fml: & Formula, eqs: & mut Vec<(bool, Term, Term)>) {
  match * fml {
    Formula::Eq { neg, ref lhs, ref rhs } => eqs.push(
      ( neg, lhs.clone(), rhs.clone() )
    ),
    Formula::Conj(ref kids) | Formula::Disj(ref kids) => for kid in kids {
      collect_eqs(kid, eqs)
    },
    Formula::Neg(ref kid) | Formula::Exist(_, ref kid) => collect_eqs(
      kid, eqs
    ),
    Formula::Impl(ref lhs, ref rhs)
    | Formula::Biimpl(ref lhs, ref rhs) => {
      collect_eqs(lhs, eqs) ;
      collect_eqs(rhs, eqs)
    },
    Formula::Lit { .. }
    | Formula::GndLit { .. }
    | Formula::TrueFalse(_) => (),
  }
}

/// True if the partial binding makes some equality constraint false.
fn falsifies_eq(
  eqs: & [ (bool, Term, Term) ], assig: & Assignment
) -> bool {
  for & (neg, ref lhs, ref rhs) in eqs {
    let lhs = lhs.subst(assig) ;
    let rhs = rhs.subst(assig) ;
    if let (& Term::Cst(ref l), & Term::Cst(ref r)) = (& lhs, & rhs) {
      let eq = l == r ;
      if eq == neg { return true }
    }
  }
  false
}


#[cfg(test)]
mod test {
  use super::* ;
  use mln::Database ;

  fn smokers_mrf(evidence: & str) -> Mrf {
    let mln = Mln::parse_str(
      "person = {Ann, Bob}\n\
      Smokes(person)\n\
      Cancer(person)\n\
      Friends(person, person)\n\
      1.5      Smokes(x) => Cancer(x)\n\
      1.1      Friends(x,y) ^ Smokes(x) => Smokes(y)\n",
      false, false,
    ).expect("parses") ;
    let dbs = Database::parse_str(
      evidence, & mln, false, false
    ).expect("parses") ;
    let mln = mln.materialize(& dbs).expect("materializes") ;
    Mrf::new( mln, & dbs[0] ).expect("builds")
  }

  #[test]
  fn default_grounding_counts() {
    let mut mrf = smokers_mrf("") ;
    DefaultGrounding::new(false).ground(& mut mrf).expect("grounds") ;
    // 2 groundings for the first template, 4 for the second.
    assert_eq!( mrf.gnd_formulas.len(), 6 ) ;
    // Template order first.
    assert_eq!( mrf.gnd_formulas[0].fml, FmlIdx::new(0) ) ;
    assert_eq!( mrf.gnd_formulas[5].fml, FmlIdx::new(1) )
  }

  #[test]
  fn simplification_drops_determined() {
    let mut mrf = smokers_mrf(
      "Smokes(Ann)\n\
      Cancer(Ann)\n"
    ) ;
    let stats = DefaultGrounding::new(true).ground(
      & mut mrf
    ).expect("grounds") ;
    // `Smokes(Ann) => Cancer(Ann)` is determined true and dropped.
    let dropped: f64 = stats.true_tally.iter().sum() ;
    assert!( dropped >= 1. ) ;
    for gnd in & mrf.gnd_formulas {
      assert!( ! gnd.ast.is_true_false() )
    }
  }

  #[test]
  fn equality_grounder_prunes() {
    let mln = Mln::parse_str(
      "person = {Ann, Bob}\n\
      Friends(person, person)\n\
      0.5      Friends(x,y) ^ x =/= y\n",
      false, false,
    ).expect("parses") ;
    let mln = mln.materialize(& []).expect("materializes") ;
    let mut mrf = Mrf::new( mln, & Database::new() ).expect("builds") ;
    EqualityConstraintGrounder::new(false).ground(
      & mut mrf
    ).expect("grounds") ;
    // Only the two off-diagonal assignments survive the pruning.
    assert_eq!( mrf.gnd_formulas.len(), 2 )
  }
}
