//! End-to-end regression tests over the whole pipeline.

use common::* ;
use ground::{ DefaultGrounding, FastConjunctionGrounding, Grounder } ;
use infer::{ self, EnumerationAsk, Gibbs, Inference, WcspInference } ;
use learn::{ Learner, LearnMethod, OptMethod, OptParams } ;
use mln::{ Database, Mln } ;
use mrf::Mrf ;
use wcsp::BranchAndBound ;


/// Parses, materializes and grounds a model with simplification.
fn pipeline(mln_text: & str, db_text: & str) -> Mrf {
  let mln = Mln::parse_str(mln_text, false, false).expect("mln parses") ;
  let dbs = Database::parse_str(
    db_text, & mln, false, false
  ).expect("db parses") ;
  let mln = mln.materialize(& dbs).expect("materializes") ;
  let db = dbs.into_iter().next().unwrap_or_else( Database::new ) ;
  let mut mrf = Mrf::new( mln, & db ).expect("builds") ;
  DefaultGrounding::new(true).ground(& mut mrf).expect("grounds") ;
  mrf
}

fn prob_of(results: & infer::Results, atom: & str) -> f64 {
  for & (ref text, prob) in & results.probs {
    if text == atom { return prob }
  }
  panic!( "no result for `{}`", atom )
}


static smokers_mln: & str = "\
person = {Ann, Bob}\n\
Smokes(person)\n\
Cancer(person)\n\
Friends(person, person)\n\
1.5      Smokes(x) => Cancer(x)\n\
1.1      Friends(x, y) ^ Smokes(x) => Smokes(y)\n\
" ;
static smokers_db: & str = "\
Smokes(Ann)\n\
Friends(Ann, Bob)\n\
" ;

#[test]
fn smokers_gibbs_agrees_with_exact() {
  let mrf = pipeline(smokers_mln, smokers_db) ;
  let queries = infer::expand_queries(
    & mrf, & [ "Cancer(Ann)".to_string() ], false
  ).expect("queries expand") ;

  let exact = EnumerationAsk.run(& mrf, & queries).expect("exact runs") ;
  let exact = prob_of(& exact, "Cancer(Ann)") ;
  assert!(
    exact >= 0.80 && exact <= 0.90,
    "exact Cancer(Ann) = {}", exact
  ) ;

  let gibbs = Gibbs {
    num_chains: 3, max_steps: 5000, min_steps: 200, seed: 42,
  }.run(& mrf, & queries).expect("gibbs runs") ;
  let gibbs = prob_of(& gibbs, "Cancer(Ann)") ;
  assert!(
    (gibbs - exact).abs() < 0.05,
    "gibbs {} vs exact {}", gibbs, exact
  ) ;
  assert!( gibbs >= 0.80 && gibbs <= 0.90 )
}

#[test]
fn gibbs_is_deterministic_for_a_seed() {
  let run = || {
    let mrf = pipeline(smokers_mln, smokers_db) ;
    let queries = infer::expand_queries(
      & mrf, & [ "Cancer(Bob)".to_string() ], false
    ).expect("queries expand") ;
    let results = Gibbs {
      num_chains: 2, max_steps: 500, min_steps: 100, seed: 7,
    }.run(& mrf, & queries).expect("gibbs runs") ;
    prob_of(& results, "Cancer(Bob)")
  } ;
  assert_eq!( run(), run() )
}

#[test]
fn grounding_is_deterministic() {
  let names = || {
    let mrf = pipeline(smokers_mln, smokers_db) ;
    let atoms: Vec<String> = mrf.atoms.iter().map(
      |atom| atom.name.clone()
    ).collect() ;
    let formulas: Vec<String> = mrf.gnd_formulas.iter().map(
      |gnd| format!("{}", gnd.ast)
    ).collect() ;
    (atoms, formulas)
  } ;
  assert_eq!( names(), names() )
}

#[test]
fn multicore_grounding_matches_sequential() {
  let ground_with = |multicore: bool| {
    let mln = Mln::parse_str(smokers_mln, false, false).expect(
      "mln parses"
    ) ;
    let dbs = Database::parse_str(
      smokers_db, & mln, false, false
    ).expect("db parses") ;
    let mln = mln.materialize(& dbs).expect("materializes") ;
    let mut mrf = Mrf::new( mln, & dbs[0] ).expect("builds") ;
    FastConjunctionGrounding::new(true, multicore).ground(
      & mut mrf
    ).expect("grounds") ;
    mrf.gnd_formulas.iter().map(
      |gnd| format!("{}", gnd.ast)
    ).collect::< Vec<String> >()
  } ;
  assert_eq!( ground_with(false), ground_with(true) )
}


#[test]
fn mutex_evidence_zeroes_the_other_colors() {
  let mrf = pipeline(
    "object = {O}\n\
    colorVal = {Red, Green, Blue}\n\
    Color(object, colorVal!)\n\
    0.7      Color(o, Red)\n",
    "Color(O, Red)\n",
  ) ;
  let queries = infer::expand_queries(
    & mrf, & [ "Color".to_string() ], false
  ).expect("queries expand") ;

  let exact = EnumerationAsk.run(& mrf, & queries).expect("exact runs") ;
  assert_eq!( prob_of(& exact, "Color(O,Green)"), 0. ) ;
  assert_eq!( prob_of(& exact, "Color(O,Blue)"), 0. ) ;
  assert_eq!( prob_of(& exact, "Color(O,Red)"), 1. ) ;

  let mpe = WcspInference::new( Box::new(BranchAndBound) ).mpe(
    & mrf
  ).expect("mpe runs") ;
  let red = mrf.gnd_atom("Color(O,Red)").expect("known") ;
  let green = mrf.gnd_atom("Color(O,Green)").expect("known") ;
  let blue = mrf.gnd_atom("Color(O,Blue)").expect("known") ;
  assert_eq!( mpe[* red], 1. ) ;
  assert_eq!( mpe[* green], 0. ) ;
  assert_eq!( mpe[* blue], 0. )
}

#[test]
fn mutex_probabilities_sum_to_one() {
  let mrf = pipeline(
    "object = {O}\n\
    colorVal = {Red, Green, Blue}\n\
    Color(object, colorVal!)\n\
    0.4      Color(o, Green)\n",
    "",
  ) ;
  let queries = infer::expand_queries(
    & mrf, & [ "Color".to_string() ], false
  ).expect("queries expand") ;
  let results = EnumerationAsk.run(& mrf, & queries).expect(
    "exact runs"
  ) ;
  let total: f64 = results.probs.iter().map( |& (_, p)| p ).sum() ;
  assert!( (total - 1.).abs() < 1e-6 ) ;
  for & (_, prob) in & results.probs {
    assert!( prob >= 0. && prob <= 1. )
  }
}


#[test]
fn weight_rescaling_produces_small_integer_costs() {
  let mrf = pipeline(
    "thing = {A}\n\
    P(thing)\n\
    Q(thing)\n\
    R(thing)\n\
    0.25      P(x)\n\
    0.5      Q(x)\n\
    1.25      R(x)\n",
    "",
  ) ;
  let conversion = ::infer::wcsp::Conversion::of(& mrf).expect(
    "converts"
  ) ;
  let int_wcsp = conversion.wcsp.make_integer_costs().expect(
    "rescales"
  ) ;
  let mut costs: Vec<u64> = int_wcsp.constraints.iter().flat_map(
    |c| c.tuples.iter().map(
      |& (_, cost)| cost
    ).chain( Some(c.default) )
  ).filter( |& cost| cost > 0 ).collect() ;
  costs.sort() ;
  assert_eq!( costs, vec![ 1, 2, 5 ] )
}


#[test]
fn empty_domain_grounds_to_an_empty_network() {
  let mln = Mln::parse_str(
    "Q(widget)\n\
    0.5      Q(x)\n",
    false, false,
  ).expect("parses").materialize(& []).expect("materializes") ;
  // The template over the empty domain was skipped entirely.
  assert!( mln.formulas.is_empty() ) ;
  let mut mrf = Mrf::new( mln, & Database::new() ).expect("builds") ;
  DefaultGrounding::new(true).ground(& mut mrf).expect("grounds") ;
  assert!( mrf.atoms.is_empty() ) ;
  assert!( mrf.vars.is_empty() ) ;
  assert!( mrf.gnd_formulas.is_empty() )
}


#[test]
fn unsatisfiable_evidence_fails_the_same_way_everywhere() {
  let mrf = pipeline(
    "thing = {A}\n\
    P(thing)\n\
    !P(A).\n",
    "P(A)\n",
  ) ;
  let queries = infer::expand_queries(
    & mrf, & [ "P(A)".to_string() ], false
  ).expect("queries expand") ;

  let exact = EnumerationAsk.run(& mrf, & queries).unwrap_err() ;
  assert!( exact.is_unsat(), "exact: {}", exact ) ;

  let wcsp = WcspInference::new( Box::new(BranchAndBound) ).run(
    & mrf, & queries
  ).unwrap_err() ;
  assert!( wcsp.is_unsat(), "wcsp: {}", wcsp )
}


#[test]
fn bpll_gradient_vanishes_at_the_learned_weights() {
  use ground::BpllGrounding ;
  use learn::{ BpllObjective, Objective } ;

  let mln = Mln::parse_str(
    "person = {Ann, Bob, Cyn, Dan}\n\
    Smokes(person)\n\
    Cancer(person)\n\
    0      Smokes(x) => Cancer(x)\n\
    0      Smokes(x)\n",
    false, false,
  ).expect("parses") ;
  let dbs = Database::parse_str(
    "Smokes(Ann)\n\
    Cancer(Ann)\n\
    Smokes(Bob)\n\
    Cancer(Bob)\n\
    !Smokes(Cyn)\n\
    Cancer(Cyn)\n\
    !Smokes(Dan)\n\
    !Cancer(Dan)\n",
    & mln, false, false,
  ).expect("parses") ;

  let learner = Learner {
    method: LearnMethod::Bpll,
    optimizer: OptMethod::Bfgs,
    params: OptParams {
      maxiter: 500, gtol: 1e-8, xtol: 1e-12, ftol: 1e-14,
      learning_rate: 0.1,
    },
    prior_stdev: None,
    use_init_weights: false,
    part_size: 1,
    qpreds: vec![],
    epreds: vec![],
    seed: 0,
  } ;
  let learned = learner.learn(& mln, & dbs).expect("learns") ;

  // Observed counts equal expected counts at the optimum: the
  // objective's gradient vanishes.
  let mut mrf = Mrf::new( learned.clone(), & dbs[0] ).expect("builds") ;
  let all: HashSet<String> = vec![ "Smokes", "Cancer" ].into_iter().map(
    String::from
  ).collect() ;
  mrf.apply_closed_world(& all) ;
  let stats = BpllGrounding::new(false).ground(& mrf).expect("grounds") ;
  let mut obj = BpllObjective::new( learned.formulas.len(), & [ stats ] ) ;
  let weights: Vec<f64> = learned.weights().iter().cloned().collect() ;
  let (_, grad) = obj.eval(& weights).expect("evaluates") ;
  for g in & grad {
    assert!( g.abs() < 1e-4, "gradient {:?} at the optimum", grad )
  }
}


#[test]
fn results_round_trip_through_a_database() {
  let mrf = pipeline(
    "thing = {A}\n\
    P(thing)\n\
    2.0      P(x)\n",
    "P(A)\n",
  ) ;
  let queries = infer::expand_queries(
    & mrf, & [ "P".to_string() ], false
  ).expect("queries expand") ;
  let results = WcspInference::new( Box::new(BranchAndBound) ).run(
    & mrf, & queries
  ).expect("runs") ;
  let db = results.to_database(& mrf).expect("converts") ;
  assert_eq!( db.truth_of("P", & [ sym("A") ]), Some(1.) )
}
