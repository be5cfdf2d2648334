//! Fast grounding for conjunctions of literals.
//!
//! Restructures the conjuncts so that equality constraints and
//! mutex-predicate literals come first, then enumerates variable
//! bindings recursively, killing a branch as soon as the evidence fully
//! falsifies the literal under scrutiny. Templates that are not literal
//! conjunctions go through the plain assignment enumeration.

use common::* ;
use common::pool ;
use logic::{ Formula, Term } ;
use mln::TemplateFormula ;
use mrf::{ Mrf, GndFormula } ;

use super::{ Grounder, GroundingStats, Assignments, ground_one } ;


/// The fast-conjunction grounder.
pub struct FastConjunctionGrounding {
  /// Simplify groundings against the evidence.
  pub simplify: bool,
  /// Fan templates out to a worker pool.
  pub multicore: bool,
}

impl FastConjunctionGrounding {
  /// Constructor.
  pub fn new(simplify: bool, multicore: bool) -> Self {
    FastConjunctionGrounding { simplify, multicore }
  }

  /// Grounds one template, independent of the rest.
  fn ground_template(
    & self, mrf: & Mrf, fml_idx: FmlIdx
  ) -> Res< (Vec<GndFormula>, f64) > {
    let tpl = mrf.mln().formulas[fml_idx].clone() ;
    let mut out = Vec::new() ;
    let mut tally = 0. ;

    if tpl.ast.is_lit_conj() {
      let children = reorder( & tpl.ast, mrf ) ;
      let dom_map = tpl.ast.variables( mrf.mln() ) ? ;
      self.conj_dfs(
        mrf, fml_idx, & tpl, & children, & dom_map,
        & mut Assignment::new(), & mut out, & mut tally,
      ) ?
    } else {
      for assig in Assignments::of( & tpl.ast, mrf.mln() ) ? {
        ground_one(
          mrf, fml_idx, & tpl, & assig, self.simplify,
          & mut out, & mut tally,
        ) ?
      }
    }

    Ok( (out, tally) )
  }

  /// Recursive binding enumeration over the reordered conjuncts.
  fn conj_dfs(
    & self, mrf: & Mrf, fml_idx: FmlIdx, tpl: & TemplateFormula,
    children: & [& Formula], dom_map: & BTreeMap<String, String>,
    assig: & mut Assignment,
    out: & mut Vec<GndFormula>, tally: & mut f64,
  ) -> Res<()> {
    let (child, rest) = match children.split_first() {
      Some( (child, rest) ) => (* child, rest),
      None => return ground_one(
        mrf, fml_idx, tpl, assig, self.simplify, out, tally
      ),
    } ;

    // Fresh variables of this literal, deterministic order.
    let mut fresh = Vec::new() ;
    for var in child_vars(child) {
      if assig.contains_key(& var) { continue }
      let dom = dom_map.get(& var).ok_or_else(
        || format!("variable `{}` has no domain", var)
      ) ? ;
      let csts = mrf.mln().domain(dom).ok_or_else(
        || format!("unknown domain `{}`", dom)
      ) ?.clone() ;
      fresh.push( (var, csts) )
    }

    self.bind_fresh(
      mrf, fml_idx, tpl, child, rest, dom_map, & fresh, assig, out, tally
    )
  }

  /// Binds the fresh variables of one literal, then checks it.
  fn bind_fresh(
    & self, mrf: & Mrf, fml_idx: FmlIdx, tpl: & TemplateFormula,
    child: & Formula, rest: & [& Formula],
    dom_map: & BTreeMap<String, String>,
    fresh: & [ (String, Vec<Sym>) ], assig: & mut Assignment,
    out: & mut Vec<GndFormula>, tally: & mut f64,
  ) -> Res<()> {
    if let Some( ( & (ref var, ref csts), more ) ) = fresh.split_first() {
      for cst in csts {
        assig.insert( var.clone(), cst.clone() ) ;
        self.bind_fresh(
          mrf, fml_idx, tpl, child, rest, dom_map, more, assig,
          out, tally,
        ) ?
      }
      assig.remove(var) ;
      Ok(())
    } else {
      if literal_falsified(child, mrf, assig) ? {
        return Ok(())
      }
      self.conj_dfs(mrf, fml_idx, tpl, rest, dom_map, assig, out, tally)
    }
  }
}

/// Variables of one conjunct, sorted.
fn child_vars(child: & Formula) -> Vec<String> {
  let mut res = Vec::new() ;
  let mut push = |term: & Term| if let Term::Var(ref name, _) = * term {
    if ! res.contains(name) {
      res.push( name.clone() )
    }
  } ;
  match * child {
    Formula::Lit { ref args, .. } => for arg in args { push(arg) },
    Formula::Eq { ref lhs, ref rhs, .. } => {
      push(lhs) ;
      push(rhs)
    },
    _ => (),
  }
  res.sort() ;
  res
}

impl Grounder for FastConjunctionGrounding {
  fn ground(& self, mrf: & mut Mrf) -> Res<GroundingStats> {
    let mut stats = GroundingStats::new( mrf.mln() ) ;
    let indices: Vec<FmlIdx> = mrf.mln().formulas.indices().collect() ;

    let grounded = if self.multicore {
      let shared: & Mrf = mrf ;
      let jobs: Vec<(usize, FmlIdx)> = indices.iter().map(
        |idx| (idx.get(), * idx)
      ).collect() ;
      pool::run(
        jobs, pool::default_workers(),
        |_, & fml_idx| self.ground_template(shared, fml_idx)
      ) ?
    } else {
      let mut res = Vec::with_capacity( indices.len() ) ;
      for & fml_idx in & indices {
        res.push( self.ground_template(mrf, fml_idx) ? )
      }
      res
    } ;

    for (fml_idx, (out, tally)) in indices.into_iter().zip(
      grounded.into_iter()
    ) {
      stats.true_tally[fml_idx] = tally ;
      for gnd in out {
        mrf.push_gnd_formula(gnd)
      }
    }
    Ok(stats)
  }
}


/// Reorders the conjuncts: equality constraints first, then literals of
/// mutex predicates, then the rest.
fn reorder<'a>(conj: & 'a Formula, mrf: & Mrf) -> Vec<& 'a Formula> {
  let kids = match * conj {
    Formula::Conj(ref kids) => kids,
    _ => unreachable!("fast path only handles literal conjunctions"),
  } ;
  let mut eqs = Vec::new() ;
  let mut mutexes = Vec::new() ;
  let mut rest = Vec::new() ;
  for kid in kids {
    match * kid {
      Formula::Eq { .. } => eqs.push(kid),
      Formula::Lit { ref pred, .. } => {
        let blocked = mrf.mln().pred_of_name(pred).map(
          |p| p.block_arg().is_some()
        ).unwrap_or(false) ;
        if blocked { mutexes.push(kid) } else { rest.push(kid) }
      },
      _ => rest.push(kid),
    }
  }
  eqs.extend(mutexes) ;
  eqs.extend(rest) ;
  eqs
}

/// True if the evidence fully falsifies a ground instance of a literal.
fn literal_falsified(
  child: & Formula, mrf: & Mrf, assig: & Assignment
) -> Res<bool> {
  match * child {
    Formula::Eq { neg, ref lhs, ref rhs } => {
      match ( lhs.subst(assig), rhs.subst(assig) ) {
        (Term::Cst(ref l), Term::Cst(ref r)) => {
          let eq = l == r ;
          Ok( eq == neg )
        },
        _ => bail!(
          "equality constraint with unbound variables after binding"
        ),
      }
    },
    Formula::Lit { neg, ref pred, ref args, .. } => {
      let mut csts = Vec::with_capacity( args.len() ) ;
      for arg in args {
        match arg.subst(assig) {
          Term::Cst(cst) => csts.push(cst),
          Term::Var(var, _) => bail!(
            "literal `{}` keeps variable `{}` unbound after binding",
            pred, var
          ),
        }
      }
      let atom = mrf.atom_index(pred, & csts) ? ;
      match mrf.evidence_of(atom) {
        Some(truth) => {
          let truth = if neg { 1. - truth } else { truth } ;
          Ok( truth == 0. )
        },
        None => Ok(false),
      }
    },
    _ => Ok(false),
  }
}


#[cfg(test)]
mod test {
  use super::* ;
  use mln::{ Mln, Database } ;
  use ground::DefaultGrounding ;

  fn mrf_of(mln_text: & str, db_text: & str) -> Mrf {
    let mln = Mln::parse_str(mln_text, false, false).expect("parses") ;
    let dbs = Database::parse_str(
      db_text, & mln, false, false
    ).expect("parses") ;
    let mln = mln.materialize(& dbs).expect("materializes") ;
    let db = if dbs.is_empty() {
      Database::new()
    } else {
      dbs[0].clone()
    } ;
    Mrf::new(mln, & db).expect("builds")
  }

  static MLN: & str = "\
    person = {Ann, Bob, Cee}\n\
    Smokes(person)\n\
    Friends(person, person)\n\
    0.7      Friends(x,y) ^ Smokes(x)\n\
  " ;

  #[test]
  fn pruning_matches_default_simplification() {
    let db = "!Smokes(Ann)\n!Smokes(Bob)\n" ;
    let mut fast = mrf_of(MLN, db) ;
    FastConjunctionGrounding::new(true, false).ground(
      & mut fast
    ).expect("grounds") ;
    let mut default = mrf_of(MLN, db) ;
    DefaultGrounding::new(true).ground(& mut default).expect("grounds") ;

    // Same surviving groundings, same order.
    assert_eq!(
      fast.gnd_formulas.len(), default.gnd_formulas.len()
    ) ;
    for (f, d) in fast.gnd_formulas.iter().zip(
      default.gnd_formulas.iter()
    ) {
      assert_eq!( f.ast, d.ast )
    }
  }

  #[test]
  fn multicore_is_deterministic() {
    let db = "!Smokes(Cee)\n" ;
    let mut single = mrf_of(MLN, db) ;
    FastConjunctionGrounding::new(true, false).ground(
      & mut single
    ).expect("grounds") ;
    let mut multi = mrf_of(MLN, db) ;
    FastConjunctionGrounding::new(true, true).ground(
      & mut multi
    ).expect("grounds") ;
    assert_eq!(
      single.gnd_formulas.len(), multi.gnd_formulas.len()
    ) ;
    for (s, m) in single.gnd_formulas.iter().zip(
      multi.gnd_formulas.iter()
    ) {
      assert_eq!( s.ast, m.ast )
    }
  }

  #[test]
  fn falls_back_on_non_conjunctions() {
    let mut mrf = mrf_of(
      "person = {Ann, Bob}\n\
      Smokes(person)\n\
      Cancer(person)\n\
      1.5      Smokes(x) => Cancer(x)\n",
      "",
    ) ;
    FastConjunctionGrounding::new(false, false).ground(
      & mut mrf
    ).expect("grounds") ;
    assert_eq!( mrf.gnd_formulas.len(), 2 )
  }
}
