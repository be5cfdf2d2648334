//! Exhaustive inference by world enumeration.

use common::* ;

use mrf::Mrf ;

use super::{ Inference, Query, Results } ;


/// Enumerates every world consistent with the evidence and accumulates
/// exact probabilities.
///
/// The weight of a world is `exp(Σ w_i · truth_i)` over the soft ground
/// formulas; a hard ground formula with truth below one zeroes the
/// world. Worlds are streamed, never materialized as a set.
pub struct EnumerationAsk ;

impl Inference for EnumerationAsk {
  fn run(& self, mrf: & Mrf, queries: & [Query]) -> Res<Results> {
    let mut numerators = vec![ 0. ; queries.len() ] ;
    let mut normalizer = 0. ;
    let mut count: usize = 0 ;

    for world in mrf.worlds() ? {
      count += 1 ;
      let mut log_weight = 0. ;
      let mut admissible = true ;
      for gnd in & mrf.gnd_formulas {
        let truth = gnd.ast.truth(& world) ;
        if gnd.hard {
          if truth < 1. {
            admissible = false ;
            break
          }
        } else {
          log_weight += gnd.weight * truth
        }
      }
      if ! admissible { continue }

      let weight = log_weight.exp() ;
      normalizer += weight ;
      for (query, num) in queries.iter().zip( numerators.iter_mut() ) {
        * num += weight * query.ast.truth(& world)
      }
    }
    log_debug!( "exact inference enumerated {} worlds", count ) ;

    if normalizer == 0. {
      bail!( ErrorKind::Unsat )
    }

    let probs = queries.iter().zip( numerators.into_iter() ).map(
      |(query, num)| ( query.text.clone(), num / normalizer )
    ).collect() ;
    Ok( Results { probs } )
  }
}


#[cfg(test)]
mod test {
  use super::* ;
  use mln::{ Mln, Database } ;
  use ground::{ Grounder, DefaultGrounding } ;
  use infer::expand_queries ;

  fn run(
    mln_text: & str, db_text: & str, queries: & [& str]
  ) -> Res<Results> {
    let mln = Mln::parse_str(mln_text, false, false) ? ;
    let dbs = Database::parse_str(db_text, & mln, false, false) ? ;
    let mln = mln.materialize(& dbs) ? ;
    let db = dbs.into_iter().next().unwrap_or_else( Database::new ) ;
    let mut mrf = Mrf::new(mln, & db) ? ;
    DefaultGrounding::new(true).ground(& mut mrf) ? ;
    let queries: Vec<String> = queries.iter().map(
      |q| q.to_string()
    ).collect() ;
    let queries = expand_queries(& mrf, & queries, false) ? ;
    EnumerationAsk.run(& mrf, & queries)
  }

  #[test]
  fn single_weighted_atom() {
    let results = run(
      "person = {Ann}\n\
      Smokes(person)\n\
      2        Smokes(x)\n",
      "",
      & [ "Smokes(Ann)" ],
    ).expect("runs") ;
    // P = e^2 / (1 + e^2).
    let expected = 2.0f64.exp() / ( 1. + 2.0f64.exp() ) ;
    assert!( (results.probs[0].1 - expected).abs() < 1e-9 )
  }

  #[test]
  fn mutex_probabilities_sum_to_one() {
    let results = run(
      "obj = {O}\n\
      color = {Red, Green, Blue}\n\
      Color(obj, color!)\n\
      0.8      Color(x, Red)\n",
      "",
      & [ "Color" ],
    ).expect("runs") ;
    let sum: f64 = results.probs.iter().map( |& (_, p)| p ).sum() ;
    assert!( (sum - 1.).abs() < 1e-6 ) ;
    // The weighted color is the most likely one.
    assert!( results.probs[0].1 > results.probs[1].1 )
  }

  #[test]
  fn mutex_evidence_zeroes_the_rest() {
    let results = run(
      "obj = {O}\n\
      color = {Red, Green, Blue}\n\
      Color(obj, color!)\n",
      "Color(O, Red)\n",
      & [ "Color(O, Green)" ],
    ).expect("runs") ;
    assert_eq!( results.probs[0].1, 0. )
  }

  #[test]
  fn falsified_hard_formula_is_unsat() {
    let err = run(
      "person = {Ann}\n\
      Smokes(person)\n\
      !Smokes(Ann).\n",
      "Smokes(Ann)\n",
      & [ "Smokes(Ann)" ],
    ).unwrap_err() ;
    assert!( err.is_unsat() )
  }
}
