//! Sampling-based inference: Gibbs and MC-SAT.

use common::* ;
use logic::Formula ;
use mrf::{ Mrf, MrfVar } ;

use rand::{ Rng, SeedableRng } ;
use rand_xorshift::XorShiftRng ;

use super::{ Inference, Query, Results } ;


/// Steps between two convergence checks.
const check_interval: usize = 50 ;
/// Convergence threshold on the first query's estimate.
const convergence_threshold: f64 = 1e-3 ;


/// A sampling chain: a current world and per-query truth counters.
struct Chain {
  world: World,
  counts: Vec<f64>,
  steps: usize,
  converged: bool,
  last_estimate: f64,
}
impl Chain {
  fn new(world: World, queries: usize) -> Self {
    Chain {
      world,
      counts: vec![ 0. ; queries ],
      steps: 0,
      converged: false,
      last_estimate: ::std::f64::NAN,
    }
  }

  /// Counts the queries' truth in the current world.
  fn record(& mut self, queries: & [Query]) {
    for (query, count) in queries.iter().zip(
      self.counts.iter_mut()
    ) {
      * count += query.ast.truth(& self.world)
    }
    self.steps += 1
  }

  /// Convergence check on the first query, every `check_interval`
  /// steps once past the minimum step count.
  fn check_convergence(& mut self, min_steps: usize) {
    if self.steps % check_interval != 0 || self.counts.is_empty() {
      return
    }
    let estimate = self.counts[0] / self.steps as f64 ;
    if self.steps >= min_steps
    && (estimate - self.last_estimate).abs() < convergence_threshold {
      self.converged = true
    }
    self.last_estimate = estimate
  }
}

/// Admissible values of every variable under the evidence.
pub fn admissible_values(
  mrf: & Mrf
) -> Res< VarMap< Vec<(usize, Vec<f64>)> > > {
  let mut res = VarMap::with_capacity( mrf.vars.len() ) ;
  for var in & mrf.vars {
    res.push( var.values_under(& mrf.evidence) ? ) ;
  }
  Ok(res)
}

/// A world drawn by assigning each variable a uniformly random
/// admissible value.
pub fn random_world(
  mrf: & Mrf, values: & VarMap< Vec<(usize, Vec<f64>)> >,
  rng: & mut XorShiftRng,
) -> World {
  let mut world = vec![ 0. ; mrf.atoms.len() ] ;
  for var in & mrf.vars {
    let choices = & values[var.idx] ;
    let pick = rng.gen_range( 0..choices.len() ) ;
    write_value( var, & choices[pick].1, & mut world )
  }
  world
}

fn write_value(var: & MrfVar, truths: & [f64], world: & mut [f64]) {
  for (atom, & truth) in var.atoms.iter().zip( truths.iter() ) {
    world[* * atom] = truth
  }
}

/// Averages the per-chain empirical frequencies.
fn average(chains: & [Chain], queries: & [Query]) -> Results {
  let probs = queries.iter().enumerate().map(
    |(pos, query)| {
      let mut sum = 0. ;
      for chain in chains {
        if chain.steps > 0 {
          sum += chain.counts[pos] / chain.steps as f64
        }
      }
      ( query.text.clone(), sum / chains.len() as f64 )
    }
  ).collect() ;
  Results { probs }
}


/// Gibbs sampling.
///
/// Each step resamples every undetermined variable from its Markov
/// blanket: value `i` is drawn with probability proportional to
/// `exp(Σ w·truth)` over the formulas mentioning the variable.
pub struct Gibbs {
  /// Number of parallel chains.
  pub num_chains: usize,
  /// Step budget.
  pub max_steps: usize,
  /// Minimum steps before convergence is considered.
  pub min_steps: usize,
  /// RNG seed.
  pub seed: u64,
}

impl Gibbs {
  /// Engine with the configuration's parameters.
  pub fn from_conf() -> Self {
    Gibbs {
      num_chains: conf.infer.num_chains,
      max_steps: conf.infer.max_steps,
      min_steps: conf.infer.min_steps,
      seed: conf.seed,
    }
  }

  /// One sweep over the undetermined variables of a chain's world.
  pub fn sweep(
    & self, mrf: & Mrf,
    values: & VarMap< Vec<(usize, Vec<f64>)> >,
    world: & mut World, rng: & mut XorShiftRng,
  ) {
    for var in & mrf.vars {
      let choices = & values[var.idx] ;
      if choices.len() < 2 { continue }

      // Markov blanket of the variable.
      let mut blanket: Vec<usize> = Vec::new() ;
      for atom in & var.atoms {
        for & fml in mrf.formulas_of(* atom) {
          if ! blanket.contains(& fml) {
            blanket.push(fml)
          }
        }
      }

      let mut expsums = Vec::with_capacity( choices.len() ) ;
      let mut total = 0. ;
      for & (_, ref truths) in choices {
        write_value( var, truths, world ) ;
        let mut log_weight = 0. ;
        let mut admissible = true ;
        for & fml in & blanket {
          let gnd = & mrf.gnd_formulas[fml] ;
          let truth = gnd.ast.truth(world) ;
          if gnd.hard {
            if truth < 1. {
              admissible = false ;
              break
            }
          } else {
            log_weight += gnd.weight * truth
          }
        }
        let expsum = if admissible { log_weight.exp() } else { 0. } ;
        total += expsum ;
        expsums.push(expsum)
      }

      let pick = if total > 0. {
        // First value meeting the cumulative threshold.
        let threshold = rng.gen::<f64>() * total ;
        let mut cumulative = 0. ;
        let mut pick = choices.len() - 1 ;
        for (pos, & expsum) in expsums.iter().enumerate() {
          cumulative += expsum ;
          if cumulative >= threshold {
            pick = pos ;
            break
          }
        }
        pick
      } else {
        rng.gen_range( 0..choices.len() )
      } ;
      write_value( var, & choices[pick].1, world )
    }
  }
}

impl Inference for Gibbs {
  fn run(& self, mrf: & Mrf, queries: & [Query]) -> Res<Results> {
    let values = admissible_values(mrf) ? ;
    let mut rng = XorShiftRng::seed_from_u64(self.seed) ;

    let mut chains: Vec<Chain> = (0..self.num_chains).map(
      |_| Chain::new(
        random_world(mrf, & values, & mut rng), queries.len()
      )
    ).collect() ;

    for _ in 0..self.max_steps {
      let mut all_converged = true ;
      for chain in & mut chains {
        if chain.converged { continue }
        all_converged = false ;
        self.sweep( mrf, & values, & mut chain.world, & mut rng ) ;
        chain.record(queries) ;
        chain.check_convergence(self.min_steps)
      }
      if all_converged { break }
    }

    // Soft evidence atoms get their empirical frequency reported.
    for atom in & mrf.atoms {
      if let Some(target) = mrf.soft_of(atom.idx) {
        let mut freq = 0. ;
        for chain in & chains {
          if chain.steps > 0 {
            freq += chain.world[* atom.idx]
          }
        }
        log_debug!(
          "soft evidence `{}`: target {}, final frequency {}",
          atom.name, target, freq / chains.len() as f64
        )
      }
    }

    Ok( average(& chains, queries) )
  }
}


/// A CNF clause over ground atoms.
struct Clause {
  lits: Vec< (bool, AtomIdx) >,
  weight: f64,
  hard: bool,
}
impl Clause {
  fn satisfied(& self, world: & [f64]) -> bool {
    self.lits.iter().any(
      |& (neg, atom)| {
        let truth = world[* atom] ;
        if neg { truth < 1. } else { truth > 0. }
      }
    )
  }
}

/// MC-SAT sampling.
///
/// Each step selects a clause subset M (hard clauses always, each
/// satisfied soft clause with probability `1 − exp(−w)`) and repairs
/// the current world, WalkSAT style at the variable level, into a
/// world satisfying M.
pub struct McSat {
  /// Step budget.
  pub max_steps: usize,
  /// Minimum steps before convergence is considered.
  pub min_steps: usize,
  /// RNG seed.
  pub seed: u64,
}

impl McSat {
  /// Engine with the configuration's parameters.
  pub fn from_conf() -> Self {
    McSat {
      max_steps: conf.infer.max_steps,
      min_steps: conf.infer.min_steps,
      seed: conf.seed,
    }
  }

  /// Clausifies the ground formulas, splitting each formula's weight
  /// uniformly over its clauses.
  fn clauses(& self, mrf: & Mrf) -> Res< Vec<Clause> > {
    let mut res = Vec::new() ;
    for gnd in & mrf.gnd_formulas {
      if let Formula::TrueFalse(truth) = gnd.ast {
        if gnd.hard && truth < 1. {
          bail!( ErrorKind::Unsat )
        }
        continue
      }
      let cnf = gnd.ast.clone().cnf() ;
      let disjs: Vec<& Formula> = match cnf {
        Formula::Conj(ref kids) => kids.iter().collect(),
        ref single => vec![ single ],
      } ;
      let mut clauses = Vec::new() ;
      'disjs: for disj in disjs {
        let lits: Vec<& Formula> = match * disj {
          Formula::Disj(ref kids) => kids.iter().collect(),
          ref single => vec![ single ],
        } ;
        let mut clause = Vec::new() ;
        for lit in lits {
          match * lit {
            Formula::GndLit { neg, atom } => clause.push( (neg, atom) ),
            Formula::TrueFalse(truth) => if truth >= 1. {
              // Trivially true clause.
              continue 'disjs
            },
            ref other => bail!(
              "unexpected construct `{}` in clausified formula", other
            ),
          }
        }
        if clause.is_empty() {
          if gnd.hard { bail!( ErrorKind::Unsat ) }
          continue
        }
        clauses.push(clause)
      }
      if clauses.is_empty() { continue }
      let weight = gnd.weight.abs() / clauses.len() as f64 ;
      for lits in clauses {
        res.push( Clause { lits, weight, hard: gnd.hard } )
      }
    }
    Ok(res)
  }

  /// WalkSAT-style repair: flips variables until every clause of `m`
  /// holds, giving up after a flip budget.
  fn repair(
    & self, mrf: & Mrf,
    values: & VarMap< Vec<(usize, Vec<f64>)> >,
    clauses: & [Clause], m: & [usize],
    world: & mut World, rng: & mut XorShiftRng,
  ) -> bool {
    let max_flips = 10 * ( mrf.vars.len() + 1 ) * ( m.len() + 1 ) ;
    for _ in 0..max_flips {
      let unsat: Vec<usize> = m.iter().cloned().filter(
        |& c| ! clauses[c].satisfied(world)
      ).collect() ;
      if unsat.is_empty() { return true }

      let clause = & clauses[ unsat[ rng.gen_range( 0..unsat.len() ) ] ] ;
      let & (neg, atom) = & clause.lits[
        rng.gen_range( 0..clause.lits.len() )
      ] ;
      let var = mrf.var_of(atom) ;
      let choices = & values[var.idx] ;
      if choices.len() < 2 { continue }

      // Values of the variable satisfying the picked literal.
      let fixing: Vec<usize> = (0..choices.len()).filter(
        |& pos| {
          let ref truths = choices[pos].1 ;
          let slot = var.atoms.iter().position(
            |a| * a == atom
          ).expect("literal atom belongs to its variable") ;
          let truth = truths[slot] ;
          if neg { truth < 1. } else { truth > 0. }
        }
      ).collect() ;
      if fixing.is_empty() { continue }
      let pick = fixing[ rng.gen_range( 0..fixing.len() ) ] ;
      write_value( var, & choices[pick].1, world )
    }
    false
  }
}

impl Inference for McSat {
  fn run(& self, mrf: & Mrf, queries: & [Query]) -> Res<Results> {
    let values = admissible_values(mrf) ? ;
    let clauses = self.clauses(mrf) ? ;
    let mut rng = XorShiftRng::seed_from_u64(self.seed) ;

    let hard: Vec<usize> = (0..clauses.len()).filter(
      |& c| clauses[c].hard
    ).collect() ;

    let mut world = random_world(mrf, & values, & mut rng) ;
    if ! self.repair(
      mrf, & values, & clauses, & hard, & mut world, & mut rng
    ) {
      bail!( ErrorKind::Unsat )
    }

    let mut chain = Chain::new(world, queries.len()) ;
    for _ in 0..self.max_steps {
      let mut m = hard.clone() ;
      for (pos, clause) in clauses.iter().enumerate() {
        if clause.hard { continue }
        if clause.satisfied(& chain.world)
        && rng.gen::<f64>() < 1. - (- clause.weight).exp() {
          m.push(pos)
        }
      }
      self.repair(
        mrf, & values, & clauses, & m, & mut chain.world, & mut rng
      ) ;
      chain.record(queries) ;
      chain.check_convergence(self.min_steps) ;
      if chain.converged { break }
    }

    let chains = [ chain ] ;
    Ok( average(& chains, queries) )
  }
}


#[cfg(test)]
mod test {
  use super::* ;
  use mln::{ Mln, Database } ;
  use ground::{ Grounder, DefaultGrounding } ;
  use infer::{ expand_queries, EnumerationAsk } ;

  fn setup(
    mln_text: & str, db_text: & str, query: & str
  ) -> (Mrf, Vec<Query>) {
    let mln = Mln::parse_str(mln_text, false, false).expect("parses") ;
    let dbs = Database::parse_str(
      db_text, & mln, false, false
    ).expect("parses") ;
    let mln = mln.materialize(& dbs).expect("materializes") ;
    let db = dbs.into_iter().next().unwrap_or_else( Database::new ) ;
    let mut mrf = Mrf::new(mln, & db).expect("builds") ;
    DefaultGrounding::new(true).ground(& mut mrf).expect("grounds") ;
    let queries = expand_queries(
      & mrf, & [ query.to_string() ], false
    ).expect("expands") ;
    (mrf, queries)
  }

  static SMOKERS: & str = "\
    person = {Ann, Bob}\n\
    Smokes(person)\n\
    Cancer(person)\n\
    Friends(person, person)\n\
    1.5      Smokes(x) => Cancer(x)\n\
    1.1      Friends(x,y) ^ Smokes(x) => Smokes(y)\n\
  " ;
  static SMOKERS_DB: & str = "\
    Smokes(Ann)\n\
    Friends(Ann, Bob)\n\
  " ;

  #[test]
  fn gibbs_matches_exact_on_smokers() {
    let (mrf, queries) = setup( SMOKERS, SMOKERS_DB, "Cancer(Ann)" ) ;
    let exact = EnumerationAsk.run(& mrf, & queries).expect("exact") ;
    let gibbs = Gibbs {
      num_chains: 3, max_steps: 5000, min_steps: 200, seed: 42,
    }.run(& mrf, & queries).expect("samples") ;
    assert!(
      (exact.probs[0].1 - gibbs.probs[0].1).abs() < 0.05,
      "exact {} vs gibbs {}", exact.probs[0].1, gibbs.probs[0].1
    ) ;
    // The smokers scenario pins the query into a known band.
    assert!( gibbs.probs[0].1 >= 0.80 && gibbs.probs[0].1 <= 0.90 )
  }

  #[test]
  fn mcsat_matches_exact_on_smokers() {
    let (mrf, queries) = setup( SMOKERS, SMOKERS_DB, "Cancer(Ann)" ) ;
    let exact = EnumerationAsk.run(& mrf, & queries).expect("exact") ;
    let mcsat = McSat {
      max_steps: 5000, min_steps: 200, seed: 42,
    }.run(& mrf, & queries).expect("samples") ;
    assert!(
      (exact.probs[0].1 - mcsat.probs[0].1).abs() < 0.07,
      "exact {} vs mcsat {}", exact.probs[0].1, mcsat.probs[0].1
    )
  }

  #[test]
  fn gibbs_respects_mutex_evidence() {
    let (mrf, queries) = setup(
      "obj = {O}\n\
      color = {Red, Green, Blue}\n\
      Color(obj, color!)\n",
      "Color(O, Red)\n",
      "Color(O, Green)",
    ) ;
    let gibbs = Gibbs {
      num_chains: 3, max_steps: 500, min_steps: 100, seed: 7,
    }.run(& mrf, & queries).expect("samples") ;
    assert_eq!( gibbs.probs[0].1, 0. )
  }

  #[test]
  fn mcsat_unsat_on_falsified_hard_formula() {
    let (mrf, queries) = setup(
      "person = {Ann}\n\
      Smokes(person)\n\
      !Smokes(Ann).\n",
      "Smokes(Ann)\n",
      "Smokes(Ann)",
    ) ;
    let err = McSat {
      max_steps: 100, min_steps: 10, seed: 0,
    }.run(& mrf, & queries).unwrap_err() ;
    assert!( err.is_unsat() )
  }

  #[test]
  fn gibbs_is_deterministic_under_a_seed() {
    let (mrf, queries) = setup( SMOKERS, SMOKERS_DB, "Cancer(Bob)" ) ;
    let once = Gibbs {
      num_chains: 2, max_steps: 400, min_steps: 100, seed: 11,
    }.run(& mrf, & queries).expect("samples") ;
    let twice = Gibbs {
      num_chains: 2, max_steps: 400, min_steps: 100, seed: 11,
    }.run(& mrf, & queries).expect("samples") ;
    assert_eq!( once.probs[0].1, twice.probs[0].1 )
  }
}
