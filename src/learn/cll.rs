//! Composite likelihood over random variable blocks.
//!
//! Variables are shuffled and partitioned into blocks of `part_size` ;
//! the objective is the blocked pseudo-likelihood with a slot being a
//! whole block: for each block, the log conditional probability of its
//! evidence values given the rest of the world. `part_size = 1`
//! coincides with the blocked pseudo-likelihood. The discriminative
//! variant restricts the blocks to query-predicate variables.

use common::* ;
use ground::Assignments ;
use mrf::{ Mrf, TempEvidence } ;

use rand::SeedableRng ;
use rand::seq::SliceRandom ;
use rand_xorshift::XorShiftRng ;

use super::optimize::Objective ;


/// Statistics of the blocked partition.
pub struct CllStats {
  /// Variable blocks.
  pub blocks: Vec< Vec<VarIdx> >,
  /// Number of joint value combinations of every block.
  pub combo_counts: Vec<usize>,
  /// Combination index of every block under the evidence.
  pub evidence_combos: Vec<usize>,
  /// `counts[template][block][combo]`: summed truth of the template's
  /// groundings with the block forced to the combination.
  pub counts: FmlMap< HashMap< usize, Vec<f64> > >,
}

/// Builds composite-likelihood statistics.
pub struct CllGrounding {
  /// Block size.
  pub part_size: usize,
  /// When set, only variables of these predicates enter blocks.
  pub qpreds: Option< HashSet<String> >,
  /// Seed of the partition shuffle.
  pub seed: u64,
}

impl CllGrounding {
  /// Constructor.
  pub fn new(
    part_size: usize, qpreds: Option< HashSet<String> >, seed: u64
  ) -> Self {
    CllGrounding { part_size: part_size.max(1), qpreds, seed }
  }

  /// Decodes a combination index into per-slot value indices, last
  /// slot fastest.
  fn decode(combo: usize, sizes: & [usize]) -> Vec<usize> {
    let mut rest = combo ;
    let mut values = vec![ 0 ; sizes.len() ] ;
    for (value, & size) in values.iter_mut().zip(
      sizes.iter()
    ).rev() {
      * value = rest % size ;
      rest /= size
    }
    values
  }

  /// Accumulates the statistics. Requires evidence on every atom.
  pub fn ground(& self, mrf: & Mrf) -> Res<CllStats> {
    let mut ev: Vec< Option<f64> > = Vec::with_capacity(
      mrf.atoms.len()
    ) ;
    for atom in & mrf.atoms {
      match mrf.evidence_of(atom.idx).or( mrf.soft_of(atom.idx) ) {
        Some(truth) => ev.push( Some(truth) ),
        None => bail!(
          "composite likelihood statistics need evidence for every \
          atom, `{}` has none", atom.name
        ),
      }
    }

    // Eligible variables, shuffled and chunked.
    let mut eligible: Vec<VarIdx> = mrf.vars.iter().filter_map(
      |var| {
        let keep = match self.qpreds {
          None => true,
          Some(ref preds) => {
            let pred = & mrf.atoms[ var.atoms[0] ].pred ;
            preds.contains( & mrf.mln().preds()[* pred].name )
          },
        } ;
        if keep { Some(var.idx) } else { None }
      }
    ).collect() ;
    let mut rng = XorShiftRng::seed_from_u64(self.seed) ;
    eligible.shuffle(& mut rng) ;
    let blocks: Vec< Vec<VarIdx> > = eligible.chunks(
      self.part_size
    ).map( |chunk| chunk.to_vec() ).collect() ;

    let mut block_of: HashMap<VarIdx, usize> = HashMap::new() ;
    for (pos, block) in blocks.iter().enumerate() {
      for & var in block {
        block_of.insert(var, pos) ;
      }
    }

    // Per-block sizes and evidence combinations.
    let mut combo_counts = Vec::with_capacity( blocks.len() ) ;
    let mut evidence_combos = Vec::with_capacity( blocks.len() ) ;
    for block in & blocks {
      let mut combos = 1 ;
      let mut evidence_combo = 0 ;
      for & var in block {
        let var = & mrf.vars[var] ;
        let truths: Vec<f64> = var.atoms.iter().map(
          |atom| ev[* * atom].expect("evidence is complete")
        ).collect() ;
        combos *= var.value_count() ;
        evidence_combo =
          evidence_combo * var.value_count() + var.value_index(& truths) ?
      }
      combo_counts.push(combos) ;
      evidence_combos.push(evidence_combo)
    }

    let mut counts: FmlMap< HashMap< usize, Vec<f64> > > = vec![
      HashMap::new() ; mrf.mln().formulas.len()
    ].into() ;

    for fml_idx in mrf.mln().formulas.indices() {
      let tpl = mrf.mln().formulas[fml_idx].clone() ;
      if tpl.hard { continue }

      for assig in Assignments::of( & tpl.ast, mrf.mln() ) ? {
        let gnd = tpl.ast.ground(mrf, & assig, false) ? ;
        let mut atoms = AtomSet::new() ;
        gnd.atom_indices(& mut atoms) ;
        let mut touched: Vec<usize> = atoms.iter().filter_map(
          |atom| block_of.get( & mrf.var_idx_of(* atom) ).cloned()
        ).collect() ;
        touched.sort() ;
        touched.dedup() ;

        let mut rows: Vec< (usize, Vec<f64>) > = Vec::with_capacity(
          touched.len()
        ) ;
        let mut all_zero = true ;
        for & pos in & touched {
          let block = & blocks[pos] ;
          let sizes: Vec<usize> = block.iter().map(
            |& var| mrf.vars[var].value_count()
          ).collect() ;
          let mut row = Vec::with_capacity( combo_counts[pos] ) ;
          for combo in 0..combo_counts[pos] {
            let values = Self::decode(combo, & sizes) ;
            let mut temp = TempEvidence::new(& mut ev) ;
            for (& var, & value) in block.iter().zip( values.iter() ) {
              let var = & mrf.vars[var] ;
              for (atom, & truth) in var.atoms.iter().zip(
                var.value(value).iter()
              ) {
                temp.set( * atom, Some(truth) )
              }
            }
            let truth = gnd.truth_under( temp.evidence() ).ok_or_else(
              || format!(
                "grounding of template {} is undetermined under \
                complete evidence", fml_idx
              )
            ) ? ;
            if truth != 0. { all_zero = false }
            row.push(truth)
          }
          rows.push( (pos, row) )
        }
        if all_zero { continue }

        for (pos, row) in rows {
          let entry = counts[fml_idx].entry(pos).or_insert_with(
            || vec![ 0. ; combo_counts[pos] ]
          ) ;
          for (acc, truth) in entry.iter_mut().zip( row.into_iter() ) {
            * acc += truth
          }
        }
      }
    }

    Ok( CllStats { blocks, combo_counts, evidence_combos, counts } )
  }
}


/// The composite likelihood objective, same log-sum-exp shape as the
/// pseudo-likelihood but over block combinations.
pub struct CllObjective {
  /// Weight vector dimension.
  dim: usize,
  /// Per database, per block: evidence combination and the touching
  /// templates' count rows.
  blocks: Vec< Vec< (usize, usize, Vec< (FmlIdx, Vec<f64>) >) > >,
}

impl CllObjective {
  /// Transposes the statistics of the training databases.
  pub fn new(dim: usize, stats: & [CllStats]) -> Self {
    let mut by_db = Vec::with_capacity( stats.len() ) ;
    for stats in stats {
      let mut of_db = Vec::new() ;
      for pos in 0..stats.blocks.len() {
        let mut rows = Vec::new() ;
        for fml in stats.counts.indices() {
          if let Some(row) = stats.counts[fml].get(& pos) {
            rows.push( (fml, row.clone()) )
          }
        }
        if ! rows.is_empty() {
          of_db.push(
            ( stats.combo_counts[pos], stats.evidence_combos[pos], rows )
          )
        }
      }
      by_db.push(of_db)
    }
    CllObjective { dim, blocks: by_db }
  }
}

impl Objective for CllObjective {
  fn eval(& mut self, weights: & [f64]) -> Res<(f64, Vec<f64>)> {
    debug_assert_eq!( weights.len(), self.dim ) ;
    let mut f = 0. ;
    let mut grad = vec![ 0. ; self.dim ] ;

    for of_db in & self.blocks {
      for & (combos, evidence_combo, ref rows) in of_db {
        let mut log_weights = vec![ 0. ; combos ] ;
        for & (fml, ref row) in rows {
          for (log_weight, & n) in log_weights.iter_mut().zip(
            row.iter()
          ) {
            * log_weight += weights[* fml] * n
          }
        }
        let max = log_weights.iter().cloned().fold(
          ::std::f64::NEG_INFINITY, f64::max
        ) ;
        let mut probs: Vec<f64> = log_weights.iter().map(
          |lw| (lw - max).exp()
        ).collect() ;
        let total: f64 = probs.iter().sum() ;
        for p in probs.iter_mut() { * p /= total }

        f += probs[evidence_combo].max(1e-300).ln() ;
        for & (fml, ref row) in rows {
          let expected: f64 = probs.iter().zip( row.iter() ).map(
            |(p, n)| p * n
          ).sum() ;
          grad[* fml] += row[evidence_combo] - expected
        }
      }
    }

    Ok( (f, grad) )
  }
}


#[cfg(test)]
mod test {
  use super::* ;
  use learn::bpll::BpllObjective ;
  use ground::bpll::BpllGrounding ;
  use mln::{ Mln, Database } ;

  fn smokers_mrf() -> Mrf {
    let mln = Mln::parse_str(
      "person = {Ann, Bob}\n\
      Smokes(person)\n\
      Cancer(person)\n\
      0.8      Smokes(x) => Cancer(x)\n\
      0.3      Smokes(x)\n",
      false, false,
    ).expect("parses") ;
    let dbs = Database::parse_str(
      "Smokes(Ann)\n\
      Cancer(Ann)\n\
      !Smokes(Bob)\n\
      !Cancer(Bob)\n",
      & mln, false, false,
    ).expect("parses") ;
    let mln = mln.materialize(& dbs).expect("materializes") ;
    Mrf::new( mln, & dbs[0] ).expect("builds")
  }

  #[test]
  fn unit_blocks_match_blocked_pseudo_likelihood() {
    let mrf = smokers_mrf() ;
    let cll = CllGrounding::new(1, None, 42).ground(& mrf).expect(
      "grounds"
    ) ;
    let bpll = BpllGrounding::new(false).ground(& mrf).expect(
      "grounds"
    ) ;
    let mut cll_obj = CllObjective::new( 2, & [ cll ] ) ;
    let mut bpll_obj = BpllObjective::new( 2, & [ bpll ] ) ;
    let point = vec![ 0.4, -0.2 ] ;
    let (f_cll, g_cll) = cll_obj.eval(& point).expect("evaluates") ;
    let (f_bpll, g_bpll) = bpll_obj.eval(& point).expect("evaluates") ;
    assert!( (f_cll - f_bpll).abs() < 1e-9 ) ;
    for (c, b) in g_cll.iter().zip( g_bpll.iter() ) {
      assert!( (c - b).abs() < 1e-9 )
    }
  }

  #[test]
  fn gradient_matches_finite_differences() {
    let mrf = smokers_mrf() ;
    let stats = CllGrounding::new(2, None, 7).ground(& mrf).expect(
      "grounds"
    ) ;
    let mut obj = CllObjective::new( 2, & [ stats ] ) ;
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
  fn query_restriction_drops_other_predicates() {
    let mrf = smokers_mrf() ;
    let mut qpreds = HashSet::new() ;
    qpreds.insert( "Cancer".to_string() ) ;
    let stats = CllGrounding::new(
      1, Some(qpreds), 0
    ).ground(& mrf).expect("grounds") ;
    // Only the two Cancer variables form blocks.
    assert_eq!( stats.blocks.len(), 2 ) ;
    for block in & stats.blocks {
      for & var in block {
        let pred = mrf.atoms[ mrf.vars[var].atoms[0] ].pred ;
        assert_eq!( mrf.mln().preds()[pred].name, "Cancer" )
      }
    }
    // The pure Smokes template touches no block.
    assert!( stats.counts[ FmlIdx::new(1) ].is_empty() )
  }
}
