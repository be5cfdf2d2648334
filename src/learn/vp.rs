//! Voted perceptron weight learning.
//!
//! Each iteration solves for the MPE world of the network under the
//! current weights and pushes the weights towards the observed world:
//! `w += η (n(observed) - n(mpe))` per template, where `n` is the
//! summed truth of the template's groundings. The result averages the
//! iterates, which is what gives the method its voting behavior.

use common::* ;
use infer::WcspInference ;
use mrf::Mrf ;

use super::counts_in ;


/// The voted perceptron learner.
pub struct VotedPerceptron {
  /// Number of perceptron iterations.
  pub iterations: usize,
  /// Step size.
  pub learning_rate: f64,
  /// MPE engine.
  pub mpe: WcspInference,
}

impl VotedPerceptron {
  /// Constructor.
  pub fn new(
    iterations: usize, learning_rate: f64, mpe: WcspInference
  ) -> Self {
    VotedPerceptron { iterations: iterations.max(1), learning_rate, mpe }
  }

  /// Runs the perceptron over prediction networks and their observed
  /// worlds. The networks must be grounded without simplification and
  /// carry no evidence, so that the MPE ranges over all worlds ;
  /// their ground weights are refreshed from `weights` before every
  /// prediction. Masked dimensions never move.
  pub fn learn(
    & self, mrfs: & mut [Mrf], observed: & [World],
    weights: & mut Vec<f64>, free: & [bool],
  ) -> Res<()> {
    debug_assert_eq!( mrfs.len(), observed.len() ) ;

    let observed_counts: Vec< FmlMap<f64> > = mrfs.iter().zip(
      observed.iter()
    ).map(
      |(mrf, world)| counts_in(mrf, world)
    ).collect() ;

    let mut sum = vec![ 0. ; weights.len() ] ;
    for iteration in 0..self.iterations {
      let mut grad = vec![ 0. ; weights.len() ] ;
      for (mrf, observed) in mrfs.iter_mut().zip(
        observed_counts.iter()
      ) {
        for gnd in & mut mrf.gnd_formulas {
          if ! gnd.hard {
            gnd.weight = weights[* gnd.fml]
          }
        }
        let mpe_world = self.mpe.mpe(mrf) ? ;
        let predicted = counts_in(mrf, & mpe_world) ;
        for (fml, grad) in grad.iter_mut().enumerate() {
          let fml = FmlIdx::new(fml) ;
          * grad += observed[fml] - predicted[fml]
        }
      }

      for ( (weight, & grad), & free ) in weights.iter_mut().zip(
        grad.iter()
      ).zip( free.iter() ) {
        if free {
          * weight += self.learning_rate * grad
        }
      }
      for (sum, & weight) in sum.iter_mut().zip( weights.iter() ) {
        * sum += weight
      }
      log_debug!(
        "perceptron iteration {}, |grad| {}",
        iteration,
        grad.iter().map( |g| g * g ).sum::<f64>().sqrt()
      )
    }

    for (weight, & sum) in weights.iter_mut().zip( sum.iter() ) {
      * weight = sum / self.iterations as f64
    }
    Ok(())
  }
}


#[cfg(test)]
mod test {
  use super::* ;
  use ground::{ DefaultGrounding, Grounder } ;
  use mln::{ Mln, Database } ;
  use wcsp::BranchAndBound ;

  fn prediction_mrf(mln_text: & str) -> Mrf {
    let mln = Mln::parse_str(mln_text, false, false).expect(
      "parses"
    ).materialize(& []).expect("materializes") ;
    let mut mrf = Mrf::new( mln, & Database::new() ).expect("builds") ;
    DefaultGrounding::new(false).ground(& mut mrf).expect("grounds") ;
    mrf
  }

  #[test]
  fn learns_a_positive_bias_from_a_true_atom() {
    let mut mrf = prediction_mrf(
      "person = {Ann}\n\
      Smokes(person)\n\
      0      Smokes(x)\n",
    ) ;
    let observed = vec![ vec![ 1. ] ] ;
    let mut weights = vec![ 0. ] ;
    let vp = VotedPerceptron::new(
      10, 1.0, WcspInference::new( Box::new(BranchAndBound) )
    ) ;
    vp.learn(
      ::std::slice::from_mut(& mut mrf), & observed,
      & mut weights, & [ true ],
    ).expect("learns") ;
    assert!(
      weights[0] > 0., "learned weight {} is not positive", weights[0]
    )
  }

  #[test]
  fn masked_weights_do_not_move() {
    let mut mrf = prediction_mrf(
      "person = {Ann}\n\
      Smokes(person)\n\
      0      Smokes(x)\n",
    ) ;
    let observed = vec![ vec![ 1. ] ] ;
    let mut weights = vec![ 0. ] ;
    let vp = VotedPerceptron::new(
      5, 1.0, WcspInference::new( Box::new(BranchAndBound) )
    ) ;
    vp.learn(
      ::std::slice::from_mut(& mut mrf), & observed,
      & mut weights, & [ false ],
    ).expect("learns") ;
    assert_eq!( weights[0], 0. )
  }

  #[test]
  fn converges_when_the_mpe_matches_the_evidence() {
    // Both atoms true in the observed world; once the weights are
    // high enough the MPE agrees and the gradient vanishes, so the
    // average stabilizes below the last iterate.
    let mut mrf = prediction_mrf(
      "person = {Ann, Bob}\n\
      Smokes(person)\n\
      0      Smokes(x)\n",
    ) ;
    let observed = vec![ vec![ 1., 1. ] ] ;
    let mut weights = vec![ 0. ] ;
    let vp = VotedPerceptron::new(
      20, 0.5, WcspInference::new( Box::new(BranchAndBound) )
    ) ;
    vp.learn(
      ::std::slice::from_mut(& mut mrf), & observed,
      & mut weights, & [ true ],
    ).expect("learns") ;
    assert!( weights[0] > 0. ) ;
    assert!( weights[0] < 20. * 0.5 * 2. )
  }
}
