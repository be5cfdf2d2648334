//! MPE inference through WCSP conversion.

use common::* ;
use logic::Formula ;
use mrf::Mrf ;
use wcsp::{
  Wcsp, Cost, Constraint, sparse_constraint,
  WcspSolver, ExternalSolver, BranchAndBound,
} ;

use std::time::Duration ;

use super::{ Inference, Query, Results } ;


/// The conversion of an MRF into a WCSP.
pub struct Conversion {
  /// The problem.
  pub wcsp: Wcsp,
  /// MRF variable behind each WCSP variable.
  pub vars: Vec<VarIdx>,
  /// WCSP variable of each MRF variable, when not fully determined.
  pub wcsp_of: VarMap< Option<usize> >,
  /// Admissible values of each WCSP variable, in iteration order.
  pub values: Vec< Vec<(usize, Vec<f64>)> >,
}

impl Conversion {

  /// Converts an MRF.
  ///
  /// One WCSP variable per MRF variable the evidence leaves
  /// undetermined; one constraint per ground formula, merged by scope.
  /// Negative soft weights are absorbed by negating the formula.
  pub fn of(mrf: & Mrf) -> Res<Conversion> {
    let mut vars = Vec::new() ;
    let mut wcsp_of: VarMap< Option<usize> > = VarMap::with_capacity(
      mrf.vars.len()
    ) ;
    let mut values = Vec::new() ;
    for var in & mrf.vars {
      let admissible = var.values_under(& mrf.evidence) ? ;
      if admissible.len() > 1 {
        wcsp_of.push( Some( vars.len() ) ) ;
        vars.push(var.idx) ;
        values.push(admissible)
      } else {
        wcsp_of.push(None) ;
      }
    }

    let domains: Vec<usize> = values.iter().map( Vec::len ).collect() ;
    let mut conversion = Conversion {
      wcsp: Wcsp::new( "mrf", domains ),
      vars, wcsp_of, values,
    } ;

    for gnd in & mrf.gnd_formulas {
      conversion.add_formula(mrf, gnd) ?
    }
    Ok(conversion)
  }

  fn add_formula(
    & mut self, mrf: & Mrf, gnd: & ::mrf::GndFormula
  ) -> Res<()> {
    // Negative weights flip the formula.
    let (ast, weight) ;
    if ! gnd.hard && gnd.weight < 0. {
      ast = Formula::Neg( Box::new( gnd.ast.clone() ) ) ;
      weight = - gnd.weight
    } else {
      ast = gnd.ast.clone() ;
      weight = gnd.weight
    }

    let mut atoms = AtomSet::new() ;
    ast.atom_indices(& mut atoms) ;
    let mut scope: Vec<usize> = Vec::new() ;
    for atom in atoms {
      if let Some(wcsp_var) = self.wcsp_of[ mrf.var_idx_of(atom) ] {
        if ! scope.contains(& wcsp_var) {
          scope.push(wcsp_var)
        }
      }
    }
    scope.sort() ;

    if scope.is_empty() {
      // Fully determined by evidence.
      let truth = ast.truth( & mrf.evidence_world() ) ;
      if gnd.hard && truth < 1. {
        bail!( ErrorKind::Unsat )
      }
      return Ok(())
    }

    // Cost of every joint assignment of the scope.
    let mut table = Vec::new() ;
    let mut world = mrf.evidence_world() ;
    let mut cursors = vec![ 0 ; scope.len() ] ;
    'assignments: loop {
      let mut tuple = Vec::with_capacity( scope.len() ) ;
      for (pos, & wcsp_var) in scope.iter().enumerate() {
        let choice = cursors[pos] ;
        tuple.push(choice) ;
        let mrf_var = & mrf.vars[ self.vars[wcsp_var] ] ;
        let ref truths = self.values[wcsp_var][choice].1 ;
        for (atom, & truth) in mrf_var.atoms.iter().zip(
          truths.iter()
        ) {
          world[* * atom] = truth
        }
      }
      let truth = ast.truth(& world) ;
      let cost = if gnd.hard {
        if truth >= 1. {
          Cost::Fin(0.)
        } else if truth <= 0. {
          Cost::Top
        } else {
          bail!( "fuzzy truth value {} in a hard constraint", truth )
        }
      } else {
        Cost::Fin( weight * (1. - truth) )
      } ;
      table.push( (tuple, cost) ) ;

      let mut pos = scope.len() ;
      loop {
        if pos == 0 { break 'assignments }
        pos -= 1 ;
        cursors[pos] += 1 ;
        if cursors[pos] < self.values[ scope[pos] ].len() { break } else {
          cursors[pos] = 0
        }
      }
    }

    self.wcsp.push( sparse_constraint(scope, table) ) ;
    Ok(())
  }

  /// Decodes a solver assignment back into a world.
  pub fn decode(& self, mrf: & Mrf, solution: & [usize]) -> World {
    let mut world = mrf.evidence_world() ;
    for var in & mrf.vars {
      if let Some(wcsp_var) = self.wcsp_of[var.idx] {
        let choice = solution[wcsp_var] ;
        let ref truths = self.values[wcsp_var][choice].1 ;
        for (atom, & truth) in var.atoms.iter().zip( truths.iter() ) {
          world[* * atom] = truth
        }
      } else {
        // Single admissible value.
        let ref truths = var.values_under(& mrf.evidence).expect(
          "admissibility was checked during conversion"
        )[0].1 ;
        for (atom, & truth) in var.atoms.iter().zip( truths.iter() ) {
          world[* * atom] = truth
        }
      }
    }
    world
  }
}


/// MPE inference: converts the MRF, solves, and reads each query's
/// truth off the most probable world.
pub struct WcspInference {
  /// Solver behind the conversion.
  pub solver: Box<dyn WcspSolver>,
}

impl WcspInference {
  /// Engine over a given solver.
  pub fn new(solver: Box<dyn WcspSolver>) -> Self {
    WcspInference { solver }
  }

  /// Engine with the configuration's solver: the external binary, or
  /// the in-process one when requested.
  pub fn from_conf() -> Self {
    if conf.solver.internal {
      WcspInference::new( Box::new(BranchAndBound) )
    } else {
      WcspInference::new(
        Box::new(
          ExternalSolver::new(
            conf.solver.cmd.clone(),
            Duration::from_secs(conf.solver.timeout as u64),
          )
        )
      )
    }
  }

  /// Most probable world of an MRF.
  pub fn mpe(& self, mrf: & Mrf) -> Res<World> {
    let conversion = Conversion::of(mrf) ? ;
    let int = conversion.wcsp.make_integer_costs() ? ;
    log_debug!(
      "wcsp: {} variables, {} constraints, top {}",
      int.domains.len(), int.constraints.len(), int.top
    ) ;
    match self.solver.solve(& int) ? {
      Some(solution) => Ok( conversion.decode(mrf, & solution) ),
      None => bail!( ErrorKind::Unsat ),
    }
  }
}

impl Inference for WcspInference {
  fn run(& self, mrf: & Mrf, queries: & [Query]) -> Res<Results> {
    let world = self.mpe(mrf) ? ;
    let probs = queries.iter().map(
      |query| ( query.text.clone(), query.ast.truth(& world) )
    ).collect() ;
    Ok( Results { probs } )
  }
}


#[cfg(test)]
mod test {
  use super::* ;
  use mln::{ Mln, Database } ;
  use mrf::Mrf ;
  use ground::{ Grounder, DefaultGrounding } ;
  use infer::expand_queries ;

  fn engine() -> WcspInference {
    WcspInference::new( Box::new(BranchAndBound) )
  }

  fn setup(mln_text: & str, db_text: & str) -> Mrf {
    let mln = Mln::parse_str(mln_text, false, false).expect("parses") ;
    let dbs = Database::parse_str(
      db_text, & mln, false, false
    ).expect("parses") ;
    let mln = mln.materialize(& dbs).expect("materializes") ;
    let db = dbs.into_iter().next().unwrap_or_else( Database::new ) ;
    let mut mrf = Mrf::new(mln, & db).expect("builds") ;
    DefaultGrounding::new(true).ground(& mut mrf).expect("grounds") ;
    mrf
  }

  #[test]
  fn mutex_mpe_keeps_evidence() {
    let mrf = setup(
      "obj = {O}\n\
      color = {Red, Green, Blue}\n\
      Color(obj, color!)\n",
      "Color(O, Red)\n",
    ) ;
    let world = engine().mpe(& mrf).expect("solves") ;
    let red = mrf.gnd_atom("Color(O,Red)").expect("known") ;
    let green = mrf.gnd_atom("Color(O,Green)").expect("known") ;
    let blue = mrf.gnd_atom("Color(O,Blue)").expect("known") ;
    assert_eq!( world[* red], 1. ) ;
    assert_eq!( world[* green], 0. ) ;
    assert_eq!( world[* blue], 0. )
  }

  #[test]
  fn weighted_preference_decides_mpe() {
    let mrf = setup(
      "person = {Ann}\n\
      Smokes(person)\n\
      Cancer(person)\n\
      1.5      Smokes(x) => Cancer(x)\n\
      2        Smokes(x)\n",
      "",
    ) ;
    let world = engine().mpe(& mrf).expect("solves") ;
    let smokes = mrf.gnd_atom("Smokes(Ann)").expect("known") ;
    let cancer = mrf.gnd_atom("Cancer(Ann)").expect("known") ;
    assert_eq!( world[* smokes], 1. ) ;
    assert_eq!( world[* cancer], 1. )
  }

  #[test]
  fn hard_formula_binds_mpe() {
    let mrf = setup(
      "person = {Ann}\n\
      Smokes(person)\n\
      Cancer(person)\n\
      2        Smokes(x)\n\
      Smokes(x) => Cancer(x).\n",
      "",
    ) ;
    let world = engine().mpe(& mrf).expect("solves") ;
    let smokes = mrf.gnd_atom("Smokes(Ann)").expect("known") ;
    let cancer = mrf.gnd_atom("Cancer(Ann)").expect("known") ;
    assert_eq!( world[* smokes], 1. ) ;
    assert_eq!( world[* cancer], 1. )
  }

  #[test]
  fn unsat_evidence_fails() {
    let mrf = setup(
      "person = {Ann}\n\
      Smokes(person)\n\
      !Smokes(Ann).\n",
      "Smokes(Ann)\n",
    ) ;
    let err = engine().mpe(& mrf).unwrap_err() ;
    assert!( err.is_unsat() )
  }

  #[test]
  fn run_reports_zero_one_truths() {
    let mrf = setup(
      "person = {Ann}\n\
      Smokes(person)\n\
      2        Smokes(x)\n",
      "",
    ) ;
    let queries = expand_queries(
      & mrf, & [ "Smokes".to_string() ], false
    ).expect("expands") ;
    let results = engine().run(& mrf, & queries).expect("runs") ;
    assert_eq!( results.probs[0].1, 1. )
  }

  #[test]
  fn mpe_matches_brute_force() {
    let mrf = setup(
      "person = {Ann, Bob}\n\
      Smokes(person)\n\
      Friends(person, person)\n\
      0.5      Friends(x,y) ^ Smokes(x)\n\
      -0.3     Smokes(x)\n",
      "Friends(Ann, Bob)\n",
    ) ;
    let conversion = Conversion::of(& mrf).expect("converts") ;
    let int = conversion.wcsp.make_integer_costs().expect("rescales") ;
    let solution = BranchAndBound.solve(& int).expect("solves").expect(
      "feasible"
    ) ;
    let best = int.cost(& solution).expect("finite") ;

    // Exhaustive check over all joint assignments.
    let mut cursors = vec![ 0 ; int.domains.len() ] ;
    loop {
      if let Some(cost) = int.cost(& cursors) {
        assert!( best <= cost )
      }
      let mut pos = cursors.len() ;
      loop {
        if pos == 0 { return }
        pos -= 1 ;
        cursors[pos] += 1 ;
        if cursors[pos] < int.domains[pos] { break } else {
          cursors[pos] = 0
        }
      }
    }
  }
}
