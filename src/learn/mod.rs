//! Weight learning.
//!
//! The [`Learner`][learner] materializes the network against the
//! training databases, builds the objective of the selected method and
//! maximizes it with the selected optimizer. Hard and fixed-weight
//! templates are masked out of the optimization ; an optional Gaussian
//! prior regularizes the free weights.
//!
//! [learner]: struct.Learner.html (Learner struct)

use common::* ;
use ground::{ BpllGrounding, DefaultGrounding, Grounder } ;
use infer::WcspInference ;
use mln::{ Database, Mln } ;
use mrf::Mrf ;

pub mod optimize ;
pub mod bpll ;
pub mod cll ;
pub mod vp ;
pub mod cd ;

pub use self::optimize::{ maximize, Objective, OptMethod, OptParams } ;
pub use self::bpll::BpllObjective ;
pub use self::cll::{ CllGrounding, CllObjective } ;
pub use self::vp::VotedPerceptron ;
pub use self::cd::ContrastiveDivergence ;


/// Gibbs sweeps per contrastive divergence iteration.
const cd_sweeps: usize = 5 ;


/// Learning method selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnMethod {
  /// Exact log-likelihood, by world enumeration.
  Ll,
  /// Pseudo-likelihood, conditioning on single atoms.
  Pll,
  /// Blocked pseudo-likelihood, conditioning on variables.
  Bpll,
  /// Blocked pseudo-likelihood over custom-grounded statistics.
  BpllCg,
  /// Composite likelihood over random variable blocks.
  Cll,
  /// Discriminative composite likelihood.
  Dcll,
  /// Voted perceptron.
  Vp,
  /// Contrastive divergence.
  Cd,
}
impl LearnMethod {
  /// Parses a learning method name.
  pub fn of_str(s: & str) -> Res<LearnMethod> {
    match s {
      "LL" => Ok( LearnMethod::Ll ),
      "PLL" => Ok( LearnMethod::Pll ),
      "BPLL" => Ok( LearnMethod::Bpll ),
      "BPLL_CG" => Ok( LearnMethod::BpllCg ),
      "CLL" => Ok( LearnMethod::Cll ),
      "DCLL" => Ok( LearnMethod::Dcll ),
      "VP" => Ok( LearnMethod::Vp ),
      "CD" => Ok( LearnMethod::Cd ),
      _ => bail!( "unknown learning method `{}`", s ),
    }
  }
}


/// Summed truth of every non-hard template's groundings in a world.
pub fn counts_in(mrf: & Mrf, world: & World) -> FmlMap<f64> {
  let mut counts: FmlMap<f64> = vec![
    0. ; mrf.mln().formulas.len()
  ].into() ;
  for gnd in & mrf.gnd_formulas {
    if ! gnd.hard {
      counts[gnd.fml] += gnd.ast.truth(world)
    }
  }
  counts
}

/// The world a database observes over a network's atoms,
/// closed-world: atoms without evidence are false.
fn observed_world(mrf: & Mrf, db: & Database) -> World {
  mrf.atoms.iter().map(
    |atom| db.truth_of(
      & mrf.mln().preds()[atom.pred].name, & atom.args
    ).unwrap_or(0.)
  ).collect()
}


/// Exact log-likelihood objective, viable on small networks only.
pub struct LlObjective {
  dim: usize,
  /// Evidence-free grounded networks, one per database.
  mrfs: Vec<Mrf>,
  /// Observed template counts, aligned with the networks.
  observed: Vec< FmlMap<f64> >,
}

impl LlObjective {
  /// Constructor over grounded evidence-free networks.
  pub fn new(dim: usize, mrfs: Vec<Mrf>, observed: Vec< FmlMap<f64> >) -> Self {
    LlObjective { dim, mrfs, observed }
  }
}

impl Objective for LlObjective {
  fn eval(& mut self, weights: & [f64]) -> Res<(f64, Vec<f64>)> {
    debug_assert_eq!( weights.len(), self.dim ) ;
    let mut f = 0. ;
    let mut grad = vec![ 0. ; self.dim ] ;

    for (mrf, observed) in self.mrfs.iter().zip(
      self.observed.iter()
    ) {
      // Template counts and log-weight of every world satisfying the
      // hard templates.
      let mut worlds: Vec< (FmlMap<f64>, f64) > = Vec::new() ;
      'worlds: for world in mrf.worlds() ? {
        for gnd in & mrf.gnd_formulas {
          if gnd.hard && gnd.ast.truth(& world) < 1. {
            continue 'worlds
          }
        }
        let counts = counts_in(mrf, & world) ;
        let log_weight = counts.iter().enumerate().map(
          |(fml, n)| weights[fml] * n
        ).sum() ;
        worlds.push( (counts, log_weight) )
      }
      if worlds.is_empty() {
        bail!( ErrorKind::Unsat )
      }

      // Log-sum-exp normalization.
      let max = worlds.iter().map( |& (_, s)| s ).fold(
        ::std::f64::NEG_INFINITY, f64::max
      ) ;
      let mut z = 0. ;
      let mut expected = vec![ 0. ; self.dim ] ;
      for & (ref counts, log_weight) in & worlds {
        let weight = (log_weight - max).exp() ;
        z += weight ;
        for (expected, n) in expected.iter_mut().zip(
          counts.iter()
        ) {
          * expected += weight * n
        }
      }

      let log_z = max + z.ln() ;
      for ( (grad, observed), expected ) in grad.iter_mut().zip(
        observed.iter()
      ).zip( expected.iter() ) {
        * grad += observed - expected / z
      }
      let fit: f64 = observed.iter().enumerate().map(
        |(fml, n)| weights[fml] * n
      ).sum() ;
      f += fit - log_z
    }

    Ok( (f, grad) )
  }
}


/// Projects an objective onto the free weight dimensions and applies
/// the Gaussian prior.
struct Masked<'a> {
  inner: & 'a mut dyn Objective,
  /// Full weight vector, masked dimensions frozen.
  full: Vec<f64>,
  /// Free dimension indices.
  free: Vec<usize>,
  /// Standard deviation of the prior.
  prior_stdev: Option<f64>,
}

impl<'a> Masked<'a> {
  fn expand(& mut self, reduced: & [f64]) {
    for (& pos, & weight) in self.free.iter().zip( reduced.iter() ) {
      self.full[pos] = weight
    }
  }
}

impl<'a> Objective for Masked<'a> {
  fn eval(& mut self, reduced: & [f64]) -> Res<(f64, Vec<f64>)> {
    self.expand(reduced) ;
    let (mut f, full_grad) = self.inner.eval(& self.full) ? ;
    let mut grad: Vec<f64> = self.free.iter().map(
      |& pos| full_grad[pos]
    ).collect() ;
    if let Some(sigma) = self.prior_stdev {
      let var = sigma * sigma ;
      for (grad, & weight) in grad.iter_mut().zip( reduced.iter() ) {
        f -= weight * weight / (2. * var) ;
        * grad -= weight / var
      }
    }
    Ok( (f, grad) )
  }

  fn hessian_diag(& mut self, reduced: & [f64]) -> Option< Vec<f64> > {
    self.expand(reduced) ;
    let full = self.inner.hessian_diag(& self.full) ? ;
    let mut diag: Vec<f64> = self.free.iter().map(
      |& pos| full[pos]
    ).collect() ;
    if let Some(sigma) = self.prior_stdev {
      for diag in diag.iter_mut() {
        * diag -= 1. / (sigma * sigma)
      }
    }
    Some(diag)
  }
}


/// The learning driver.
pub struct Learner {
  /// Learning method.
  pub method: LearnMethod,
  /// Numerical optimizer for the likelihood-style methods.
  pub optimizer: OptMethod,
  /// Optimizer parameters.
  pub params: OptParams,
  /// Standard deviation of the Gaussian prior, none to deactivate.
  pub prior_stdev: Option<f64>,
  /// Start from the network's weights instead of zero.
  pub use_init_weights: bool,
  /// Block size for composite likelihood.
  pub part_size: usize,
  /// Query predicates for the discriminative methods.
  pub qpreds: Vec<String>,
  /// Evidence predicates, the complement specification of `qpreds`.
  pub epreds: Vec<String>,
  /// RNG seed.
  pub seed: u64,
}

impl Learner {
  /// Learner with the configuration's parameters.
  pub fn from_conf() -> Res<Self> {
    Ok(
      Learner {
        method: LearnMethod::of_str(& conf.learning.method) ?,
        optimizer: OptMethod::of_str(& conf.learning.optimizer) ?,
        params: OptParams {
          maxiter: conf.learning.maxiter,
          gtol: conf.learning.gtol,
          xtol: conf.learning.xtol,
          ftol: conf.learning.ftol,
          learning_rate: conf.learning.learning_rate,
        },
        prior_stdev: conf.learning.prior_stdev,
        use_init_weights: conf.learning.use_init_weights,
        part_size: conf.learning.part_size,
        qpreds: conf.learning.qpreds.clone(),
        epreds: conf.learning.epreds.clone(),
        seed: conf.seed,
      }
    )
  }

  /// Learns the weights from the training databases. Returns the
  /// materialized network with its weights updated ; the input
  /// network is left untouched.
  pub fn learn(& self, mln: & Mln, dbs: & [Database]) -> Res<Mln> {
    if dbs.is_empty() {
      bail!(
        ErrorKind::Learning(
          "no training database provided".to_string()
        )
      )
    }
    let mut learned = mln.materialize(dbs) ? ;
    let dim = learned.formulas.len() ;

    let free: Vec<bool> = learned.formulas.iter().map(
      |fml| ! fml.hard && ! fml.fixed
    ).collect() ;
    let mut full: Vec<f64> = if self.use_init_weights {
      learned.weights().iter().cloned().collect()
    } else {
      vec![ 0. ; dim ]
    } ;

    match self.method {
      LearnMethod::Ll
      | LearnMethod::Pll
      | LearnMethod::Bpll
      | LearnMethod::BpllCg
      | LearnMethod::Cll
      | LearnMethod::Dcll => {
        let mut inner = self.objective(& learned, dbs) ? ;
        self.optimize(& mut * inner, & free, & mut full) ?
      },

      LearnMethod::Vp => {
        let (mut mrfs, observed) = prediction_networks(& learned, dbs) ? ;
        VotedPerceptron::new(
          self.params.maxiter, self.params.learning_rate,
          WcspInference::from_conf(),
        ).learn(
          & mut mrfs, & observed, & mut full, & free
        ).chain_err(
          || ErrorKind::Learning( "voted perceptron failed".to_string() )
        ) ?
      },

      LearnMethod::Cd => {
        let (mut mrfs, observed) = prediction_networks(& learned, dbs) ? ;
        ContrastiveDivergence::new(
          self.params.maxiter, self.params.learning_rate,
          cd_sweeps, self.seed,
        ).learn(
          & mut mrfs, & observed, & mut full, & free
        ).chain_err(
          || ErrorKind::Learning(
            "contrastive divergence failed".to_string()
          )
        ) ?
      },
    }

    if full.iter().any( |w| ! w.is_finite() ) {
      bail!(
        ErrorKind::Learning(
          "learning produced non-finite weights".to_string()
        )
      )
    }
    learned.set_weights( & full.into() ) ;
    Ok(learned)
  }

  /// Builds the objective of a likelihood-style method.
  fn objective(
    & self, learned: & Mln, dbs: & [Database]
  ) -> Res< Box<dyn Objective> > {
    let dim = learned.formulas.len() ;
    match self.method {
      LearnMethod::Ll => {
        let (mrfs, worlds) = prediction_networks(learned, dbs) ? ;
        let observed = mrfs.iter().zip( worlds.iter() ).map(
          |(mrf, world)| counts_in(mrf, world)
        ).collect() ;
        Ok( Box::new( LlObjective::new(dim, mrfs, observed) ) )
      },

      LearnMethod::Pll
      | LearnMethod::Bpll
      | LearnMethod::BpllCg => {
        let by_atom = self.method == LearnMethod::Pll ;
        let grounder = BpllGrounding::new(by_atom) ;
        let mut stats = Vec::with_capacity( dbs.len() ) ;
        for db in dbs {
          let mrf = evidence_network(learned, db) ? ;
          stats.push( grounder.ground(& mrf) ? )
        }
        Ok( Box::new( BpllObjective::new(dim, & stats) ) )
      },

      LearnMethod::Cll | LearnMethod::Dcll => {
        let qpreds = if self.method == LearnMethod::Dcll {
          Some( self.query_preds(learned) ? )
        } else {
          None
        } ;
        let grounder = CllGrounding::new(
          self.part_size, qpreds, self.seed
        ) ;
        let mut stats = Vec::with_capacity( dbs.len() ) ;
        for db in dbs {
          let mrf = evidence_network(learned, db) ? ;
          stats.push( grounder.ground(& mrf) ? )
        }
        Ok( Box::new( CllObjective::new(dim, & stats) ) )
      },

      LearnMethod::Vp | LearnMethod::Cd => bail!(
        "gradient-only methods have no closed-form objective"
      ),
    }
  }

  /// Query predicates of a discriminative run, either given directly
  /// or as the complement of the evidence predicates.
  fn query_preds(& self, learned: & Mln) -> Res< HashSet<String> > {
    if ! self.qpreds.is_empty() {
      return Ok( self.qpreds.iter().cloned().collect() )
    }
    if ! self.epreds.is_empty() {
      let epreds: HashSet<& String> = self.epreds.iter().collect() ;
      return Ok(
        learned.preds().iter().filter_map(
          |pred| if epreds.contains(& pred.name) {
            None
          } else {
            Some( pred.name.clone() )
          }
        ).collect()
      )
    }
    bail!(
      ErrorKind::Learning(
        "discriminative learning needs query predicates".to_string()
      )
    )
  }

  /// Masks and maximizes an objective, writing the free dimensions
  /// back into the full weight vector.
  fn optimize(
    & self, inner: & mut dyn Objective, free: & [bool],
    full: & mut Vec<f64>,
  ) -> Res<()> {
    let free: Vec<usize> = free.iter().enumerate().filter_map(
      |(pos, & free)| if free { Some(pos) } else { None }
    ).collect() ;
    let start: Vec<f64> = free.iter().map( |& pos| full[pos] ).collect() ;
    let mut masked = Masked {
      inner, full: full.clone(), free: free.clone(),
      prior_stdev: self.prior_stdev,
    } ;
    let reduced = maximize(
      self.optimizer, & mut masked, start, & self.params
    ).chain_err(
      || ErrorKind::Learning(
        "weight optimization failed".to_string()
      )
    ) ? ;
    for (& pos, & weight) in free.iter().zip( reduced.iter() ) {
      full[pos] = weight
    }
    Ok(())
  }
}


/// Evidence-complete network of a database: every atom the database
/// is silent about becomes false.
fn evidence_network(learned: & Mln, db: & Database) -> Res<Mrf> {
  let mut mrf = Mrf::new( learned.clone(), db ) ? ;
  let all: HashSet<String> = learned.preds().iter().map(
    |pred| pred.name.clone()
  ).collect() ;
  mrf.apply_closed_world(& all) ;
  Ok(mrf)
}

/// Evidence-free grounded networks and the worlds the databases
/// observe over them, for the world-ranging methods.
fn prediction_networks(
  learned: & Mln, dbs: & [Database]
) -> Res<( Vec<Mrf>, Vec<World> )> {
  let grounder = DefaultGrounding::new(false) ;
  let mut mrfs = Vec::with_capacity( dbs.len() ) ;
  let mut worlds = Vec::with_capacity( dbs.len() ) ;
  for db in dbs {
    let mut mrf = Mrf::new( learned.clone(), & Database::new() ) ? ;
    grounder.ground(& mut mrf) ? ;
    worlds.push( observed_world(& mrf, db) ) ;
    mrfs.push(mrf)
  }
  Ok( (mrfs, worlds) )
}
