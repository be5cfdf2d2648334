//! Pseudo-likelihood objectives over statistics-only groundings.
//!
//! The objective of weight vector `w` is
//!
//! ```text
//! Σ_s  Σ_f w_f N_f(s = ev_s)  -  log Σ_v exp( Σ_f w_f N_f(s = v) )
//! ```
//!
//! summed over every slot `s` some template touches. `N_f(s = v)` is
//! the summed truth of the groundings of template `f` with slot `s`
//! forced to value `v` and the rest of the world at the evidence,
//! exactly what [`BpllGrounding`][gnd] accumulates. Slots no template
//! touches have a constant conditional and drop out.
//!
//! [gnd]: ../../ground/bpll/struct.BpllGrounding.html
//! (BpllGrounding struct)

use common::* ;
use ground::bpll::BpllStats ;

use super::optimize::Objective ;


/// Per-slot counts, transposed from the per-template statistics for
/// evaluation: for each slot the templates touching it and their
/// per-value counts.
struct SlotCounts {
  /// Slot index.
  slot: usize,
  /// Value index under the evidence.
  evidence_value: usize,
  /// Touching templates and their count rows.
  rows: Vec< (FmlIdx, Vec<f64>) >,
  /// Number of values.
  value_count: usize,
}

/// The (blocked) pseudo-likelihood objective, possibly over several
/// statistics sets (one per training database).
pub struct BpllObjective {
  /// Weight vector dimension, the number of templates.
  dim: usize,
  /// Transposed statistics of every database.
  slots: Vec< Vec<SlotCounts> >,
}

impl BpllObjective {
  /// Transposes the statistics of the training databases.
  pub fn new(dim: usize, stats: & [BpllStats]) -> Self {
    let mut slots = Vec::with_capacity( stats.len() ) ;
    for stats in stats {
      let mut of_db = Vec::new() ;
      for slot in stats.touched_slots() {
        let mut rows = Vec::new() ;
        for fml in stats.counts.indices() {
          if let Some(row) = stats.counts[fml].get(& slot) {
            rows.push( (fml, row.clone()) )
          }
        }
        of_db.push(
          SlotCounts {
            slot,
            evidence_value: stats.evidence_values[slot],
            rows,
            value_count: stats.value_counts[slot],
          }
        )
      }
      slots.push(of_db)
    }
    BpllObjective { dim, slots }
  }

  /// Conditional distribution over the values of a slot.
  fn distribution(counts: & SlotCounts, weights: & [f64]) -> Vec<f64> {
    let mut log_weights = vec![ 0. ; counts.value_count ] ;
    for & (fml, ref row) in & counts.rows {
      for (log_weight, & n) in log_weights.iter_mut().zip( row.iter() ) {
        * log_weight += weights[* fml] * n
      }
    }
    // Log-sum-exp shift for stability.
    let max = log_weights.iter().cloned().fold(
      ::std::f64::NEG_INFINITY, f64::max
    ) ;
    let mut probs: Vec<f64> = log_weights.iter().map(
      |lw| (lw - max).exp()
    ).collect() ;
    let total: f64 = probs.iter().sum() ;
    for p in probs.iter_mut() { * p /= total }
    probs
  }
}

impl Objective for BpllObjective {
  fn eval(& mut self, weights: & [f64]) -> Res<(f64, Vec<f64>)> {
    debug_assert_eq!( weights.len(), self.dim ) ;
    let mut f = 0. ;
    let mut grad = vec![ 0. ; self.dim ] ;

    for of_db in & self.slots {
      for counts in of_db {
        let probs = Self::distribution(counts, weights) ;
        f += probs[counts.evidence_value].max(1e-300).ln() ;
        for & (fml, ref row) in & counts.rows {
          let expected: f64 = probs.iter().zip( row.iter() ).map(
            |(p, n)| p * n
          ).sum() ;
          grad[* fml] += row[counts.evidence_value] - expected
        }
      }
    }

    Ok( (f, grad) )
  }

  /// Analytic diagonal: minus the conditional variance of the counts,
  /// summed over slots.
  fn hessian_diag(& mut self, weights: & [f64]) -> Option< Vec<f64> > {
    let mut diag = vec![ 0. ; self.dim ] ;
    for of_db in & self.slots {
      for counts in of_db {
        let probs = Self::distribution(counts, weights) ;
        for & (fml, ref row) in & counts.rows {
          let mean: f64 = probs.iter().zip( row.iter() ).map(
            |(p, n)| p * n
          ).sum() ;
          let second: f64 = probs.iter().zip( row.iter() ).map(
            |(p, n)| p * n * n
          ).sum() ;
          diag[* fml] -= second - mean * mean
        }
      }
    }
    Some(diag)
  }
}


#[cfg(test)]
mod test {
  use super::* ;
  use ground::bpll::BpllGrounding ;
  use learn::optimize::{ maximize, OptMethod, OptParams } ;
  use mln::{ Mln, Database } ;
  use mrf::Mrf ;

  fn stats_of(mln_text: & str, db_text: & str) -> (usize, BpllStats) {
    let mln = Mln::parse_str(mln_text, false, false).expect("parses") ;
    let dbs = Database::parse_str(
      db_text, & mln, false, false
    ).expect("parses") ;
    let mln = mln.materialize(& dbs).expect("materializes") ;
    let dim = mln.formulas.len() ;
    let mrf = Mrf::new( mln, & dbs[0] ).expect("builds") ;
    let stats = BpllGrounding::new(false).ground(& mrf).expect(
      "grounds"
    ) ;
    (dim, stats)
  }

  #[test]
  fn zero_weights_give_uniform_conditionals() {
    let (dim, stats) = stats_of(
      "person = {Ann, Bob}\n\
      Smokes(person)\n\
      0.5      Smokes(x)\n",
      "Smokes(Ann)\n\
      !Smokes(Bob)\n",
    ) ;
    let mut obj = BpllObjective::new( dim, & [ stats ] ) ;
    let (f, grad) = obj.eval(& [ 0. ]).expect("evaluates") ;
    // Two binary slots, each conditional is 1/2.
    assert!( (f - 2. * 0.5f64.ln()).abs() < 1e-9 ) ;
    // Observed count 1 (Smokes(Ann)), expected 0.5 + 0.5.
    assert!( (grad[0] - 0.).abs() < 1e-9 )
  }

  #[test]
  fn gradient_matches_finite_differences() {
    let (dim, stats) = stats_of(
      "person = {Ann, Bob}\n\
      Smokes(person)\n\
      Cancer(person)\n\
      0.5      Smokes(x) => Cancer(x)\n\
      0.2      Smokes(x)\n",
      "Smokes(Ann)\n\
      Cancer(Ann)\n\
      !Smokes(Bob)\n\
      !Cancer(Bob)\n",
    ) ;
    let mut obj = BpllObjective::new( dim, & [ stats ] ) ;
    let point = vec![ 0.3, -0.7 ] ;
    let (_, grad) = obj.eval(& point).expect("evaluates") ;
    let eps = 1e-6 ;
    for dim in 0..point.len() {
      let mut hi = point.clone() ;
      hi[dim] += eps ;
      let mut lo = point.clone() ;
      lo[dim] -= eps ;
      let (f_hi, _) = obj.eval(& hi).expect("evaluates") ;
      let (f_lo, _) = obj.eval(& lo).expect("evaluates") ;
      let expected = (f_hi - f_lo) / (2. * eps) ;
      assert!(
        (grad[dim] - expected).abs() < 1e-4,
        "gradient {} vs finite difference {}", grad[dim], expected
      )
    }
  }

  #[test]
  fn learning_recovers_the_observed_bias() {
    // Three out of four people smoke; the learned weight of
    // `Smokes(x)` must make the conditional of each slot 3/4,
    // so `w = ln 3`.
    let (dim, stats) = stats_of(
      "person = {Ann, Bob, Cyn, Dan}\n\
      Smokes(person)\n\
      0      Smokes(x)\n",
      "Smokes(Ann)\n\
      Smokes(Bob)\n\
      Smokes(Cyn)\n\
      !Smokes(Dan)\n",
    ) ;
    let mut obj = BpllObjective::new( dim, & [ stats ] ) ;
    let params = OptParams {
      maxiter: 200, gtol: 1e-8, xtol: 1e-10, ftol: 1e-12,
      learning_rate: 0.1,
    } ;
    let weights = maximize(
      OptMethod::Bfgs, & mut obj, vec![ 0. ], & params
    ).expect("optimizes") ;
    assert!(
      ( weights[0] - 3f64.ln() ).abs() < 1e-3,
      "learned {} instead of ln 3", weights[0]
    )
  }

  #[test]
  fn hessian_diagonal_matches_finite_differences() {
    let (dim, stats) = stats_of(
      "person = {Ann, Bob}\n\
      Smokes(person)\n\
      0.5      Smokes(x)\n",
      "Smokes(Ann)\n\
      !Smokes(Bob)\n",
    ) ;
    let mut obj = BpllObjective::new( dim, & [ stats ] ) ;
    let point = vec![ 0.4 ] ;
    let diag = obj.hessian_diag(& point).expect("analytic") ;
    let eps = 1e-5 ;
    let (_, g_hi) = obj.eval(& [ point[0] + eps ]).expect("evaluates") ;
    let (_, g_lo) = obj.eval(& [ point[0] - eps ]).expect("evaluates") ;
    let expected = ( g_hi[0] - g_lo[0] ) / (2. * eps) ;
    assert!(
      (diag[0] - expected).abs() < 1e-4,
      "diagonal {} vs finite difference {}", diag[0], expected
    )
  }
}
