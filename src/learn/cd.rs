//! Contrastive divergence weight learning.
//!
//! Approximates the likelihood gradient by contrasting the observed
//! world with a sample obtained from a short Gibbs run started at the
//! observed world: `w += η (n(observed) - n(sample))`. The chain is
//! restarted at the observed world every iteration, so few sweeps per
//! iteration suffice.

use common::* ;
use infer::mcmc::{ admissible_values, Gibbs } ;
use mrf::Mrf ;

use rand::SeedableRng ;
use rand_xorshift::XorShiftRng ;

use super::counts_in ;


/// The contrastive divergence learner.
pub struct ContrastiveDivergence {
  /// Number of gradient iterations.
  pub iterations: usize,
  /// Step size.
  pub learning_rate: f64,
  /// Gibbs sweeps per iteration.
  pub sweeps: usize,
  /// RNG seed.
  pub seed: u64,
}

impl ContrastiveDivergence {
  /// Constructor.
  pub fn new(
    iterations: usize, learning_rate: f64, sweeps: usize, seed: u64
  ) -> Self {
    ContrastiveDivergence {
      iterations: iterations.max(1),
      learning_rate,
      sweeps: sweeps.max(1),
      seed,
    }
  }

  /// Runs the learner over prediction networks and their observed
  /// worlds, with the same contract as the perceptron: networks
  /// grounded without simplification, no evidence, ground weights
  /// refreshed from `weights` before sampling.
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
    let values: Vec<_> = mrfs.iter().map(
      |mrf| admissible_values(mrf)
    ).collect::< Res<_> >() ? ;

    let sampler = Gibbs {
      num_chains: 1,
      max_steps: self.sweeps,
      min_steps: 0,
      seed: self.seed,
    } ;
    let mut rng = XorShiftRng::seed_from_u64(self.seed) ;

    for _ in 0..self.iterations {
      let mut grad = vec![ 0. ; weights.len() ] ;
      for ( (mrf, observed), (world, values) ) in mrfs.iter_mut().zip(
        observed_counts.iter()
      ).zip(
        observed.iter().zip( values.iter() )
      ) {
        for gnd in & mut mrf.gnd_formulas {
          if ! gnd.hard {
            gnd.weight = weights[* gnd.fml]
          }
        }
        let mut sample = world.clone() ;
        for _ in 0..self.sweeps {
          sampler.sweep(mrf, values, & mut sample, & mut rng)
        }
        let contrastive = counts_in(mrf, & sample) ;
        for (fml, grad) in grad.iter_mut().enumerate() {
          let fml = FmlIdx::new(fml) ;
          * grad += observed[fml] - contrastive[fml]
        }
      }

      for ( (weight, & grad), & free ) in weights.iter_mut().zip(
        grad.iter()
      ).zip( free.iter() ) {
        if free {
          * weight += self.learning_rate * grad
        }
      }
    }
    Ok(())
  }
}
