//! Rmln's global configuration.

use clap::Arg ;
use ansi::{ Colour, Style } ;

use errors::* ;

/// Clap `App` with static lifetimes.
pub type App = ::clap::App<'static, 'static> ;
/// Clap `ArgMatches` with static lifetime.
pub type Matches = ::clap::ArgMatches<'static> ;




/// Functions all sub-configurations must have.
pub trait SubConf {
  /// True if the options of the subconf need the output directory.
  fn need_out_dir(& self) -> bool ;
}




/// Logic and grammar configuration.
pub struct LogicConf {
  /// Fuzzy semantics flag. Classical `{0,1}` semantics when false.
  pub fuzzy: bool,
  /// PRAC grammar flag. Standard grammar when false.
  pub prac_grammar: bool,
}
impl SubConf for LogicConf {
  fn need_out_dir(& self) -> bool { false }
}
impl LogicConf {
  /// Adds clap options to a clap App.
  pub fn add_args(app: App, mut order: usize) -> App {
    let mut order = || {
      order += 1 ;
      order
    } ;

    app.arg(

      Arg::with_name("logic").long("--logic").help(
        "semantics of the formulas"
      ).validator(
        |s| arg_of_str(
          & s, & [ "classical", "fuzzy" ]
        ).map(|_| ())
      ).value_name(
        "classical|fuzzy"
      ).default_value(
        "classical"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("grammar").long("--grammar").help(
        "grammar used to parse formulas"
      ).validator(
        |s| arg_of_str(
          & s, & [ "standard", "prac" ]
        ).map(|_| ())
      ).value_name(
        "standard|prac"
      ).default_value(
        "standard"
      ).takes_value(true).number_of_values(1).display_order( order() )

    )
  }

  /// Creates itself from some matches.
  pub fn new(matches: & Matches) -> Self {
    let fuzzy = matches.value_of("logic").expect(
      "unreachable(logic): default is provided"
    ) == "fuzzy" ;
    let prac_grammar = matches.value_of("grammar").expect(
      "unreachable(grammar): default is provided"
    ) == "prac" ;
    LogicConf { fuzzy, prac_grammar }
  }
}




/// Grounding configuration.
pub struct GroundConf {
  /// Multicore flag: fan grounding out to a worker pool.
  pub multicore: bool,
  /// Ignore evidence atoms over undeclared predicates instead of failing.
  pub ignore_unknown_preds: bool,
  /// Accept `?atom` lines in databases.
  pub allow_unknown: bool,
}
impl SubConf for GroundConf {
  fn need_out_dir(& self) -> bool { false }
}
impl GroundConf {
  /// Adds clap options to a clap App.
  pub fn add_args(app: App, mut order: usize) -> App {
    let mut order = || {
      order += 1 ;
      order
    } ;

    app.arg(

      Arg::with_name("multicore").long("--multicore").help(
        "(de)activates multicore grounding"
      ).validator(
        bool_validator
      ).value_name(
        bool_format
      ).default_value(
        "no"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("ignore_unknown_preds").long(
        "--ignore_unknown_preds"
      ).help(
        "skip evidence atoms over undeclared predicates instead of failing"
      ).validator(
        bool_validator
      ).value_name(
        bool_format
      ).default_value(
        "no"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("allow_unknown").long("--allow_unknown").help(
        "accept explicit `?atom` unknowns in databases"
      ).validator(
        bool_validator
      ).value_name(
        bool_format
      ).default_value(
        "no"
      ).takes_value(true).number_of_values(1).display_order( order() )

    )
  }

  /// Creates itself from some matches.
  pub fn new(matches: & Matches) -> Self {
    let multicore = bool_of_matches(matches, "multicore") ;
    let ignore_unknown_preds = bool_of_matches(
      matches, "ignore_unknown_preds"
    ) ;
    let allow_unknown = bool_of_matches(matches, "allow_unknown") ;
    GroundConf { multicore, ignore_unknown_preds, allow_unknown }
  }
}




/// Inference configuration.
pub struct InfConf {
  /// Inference method.
  pub method: String,
  /// Number of MCMC chains.
  pub num_chains: usize,
  /// Maximal number of MCMC steps per chain.
  pub max_steps: usize,
  /// Minimal number of MCMC steps before convergence is tested.
  pub min_steps: usize,
  /// Steps between progress reports and time budget checks.
  pub info_interval: usize,
  /// Closed-world flag, applied to all non-query predicates.
  pub cw: bool,
  /// Closed-world predicates.
  pub cw_preds: Vec<String>,
  /// Soft-evidence fitting method.
  pub fitting_method: String,
  /// Soft-evidence fitting threshold.
  pub fitting_threshold: f64,
  /// Maximal number of soft-evidence fitting steps.
  pub fitting_steps: usize,
}
impl SubConf for InfConf {
  fn need_out_dir(& self) -> bool { false }
}
impl InfConf {
  /// Adds clap options to a clap App.
  pub fn add_args(app: App, mut order: usize) -> App {
    let mut order = || {
      order += 1 ;
      order
    } ;

    app.arg(

      Arg::with_name("method").long("--method").short("-m").help(
        "inference method"
      ).validator(
        |s| arg_of_str(
          & s, & [ "Exact", "EnumerationAsk", "Gibbs", "MC-SAT", "WCSP" ]
        ).map(|_| ())
      ).value_name(
        "Exact|EnumerationAsk|Gibbs|MC-SAT|WCSP"
      ).default_value(
        "Exact"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("num_chains").long("--num_chains").help(
        "number of MCMC chains"
      ).validator(
        int_validator
      ).value_name(
        "int"
      ).default_value(
        "3"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("max_steps").long("--max_steps").help(
        "maximal number of MCMC steps per chain"
      ).validator(
        int_validator
      ).value_name(
        "int"
      ).default_value(
        "5000"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("min_steps").long("--min_steps").help(
        "minimal number of MCMC steps before testing convergence"
      ).validator(
        int_validator
      ).value_name(
        "int"
      ).default_value(
        "200"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("info_interval").long("--info_interval").help(
        "steps between MCMC progress reports"
      ).validator(
        int_validator
      ).value_name(
        "int"
      ).default_value(
        "500"
      ).takes_value(true).number_of_values(1).display_order(
        order()
      ).hidden(true)

    ).arg(

      Arg::with_name("cw").long("--cw").help(
        "closed-world assumption for all non-query predicates"
      ).validator(
        bool_validator
      ).value_name(
        bool_format
      ).default_value(
        "no"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("cw_preds").long("--cw_preds").help(
        "comma-separated list of closed-world predicates"
      ).value_name(
        "pred,..."
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("fitting_method").long("--fitting_method").help(
        "soft-evidence fitting method"
      ).value_name(
        "name"
      ).default_value(
        "isiwp"
      ).takes_value(true).number_of_values(1).display_order(
        order()
      ).hidden(true)

    ).arg(

      Arg::with_name("fitting_threshold").long("--fitting_threshold").help(
        "soft-evidence fitting threshold"
      ).validator(
        float_validator
      ).value_name(
        "float"
      ).default_value(
        "0.002"
      ).takes_value(true).number_of_values(1).display_order(
        order()
      ).hidden(true)

    ).arg(

      Arg::with_name("fitting_steps").long("--fitting_steps").help(
        "maximal number of soft-evidence fitting steps"
      ).validator(
        int_validator
      ).value_name(
        "int"
      ).default_value(
        "100"
      ).takes_value(true).number_of_values(1).display_order(
        order()
      ).hidden(true)

    )
  }

  /// Creates itself from some matches.
  pub fn new(matches: & Matches) -> Self {
    let method = matches.value_of("method").expect(
      "unreachable(method): default is provided"
    ).to_string() ;
    let num_chains = int_of_matches(matches, "num_chains") ;
    let max_steps = int_of_matches(matches, "max_steps") ;
    let min_steps = int_of_matches(matches, "min_steps") ;
    let info_interval = int_of_matches(matches, "info_interval") ;
    let cw = bool_of_matches(matches, "cw") ;
    let cw_preds = matches.value_of("cw_preds").map(
      |s| s.split(',').map(
        |p| p.trim().to_string()
      ).filter( |p| ! p.is_empty() ).collect()
    ).unwrap_or_else( Vec::new ) ;
    let fitting_method = matches.value_of("fitting_method").expect(
      "unreachable(fitting_method): default is provided"
    ).to_string() ;
    let fitting_threshold = float_of_matches(matches, "fitting_threshold") ;
    let fitting_steps = int_of_matches(matches, "fitting_steps") ;
    InfConf {
      method, num_chains, max_steps, min_steps, info_interval,
      cw, cw_preds, fitting_method, fitting_threshold, fitting_steps,
    }
  }
}




/// Learning configuration.
pub struct LearnConf {
  /// Learning method.
  pub method: String,
  /// Numerical optimizer.
  pub optimizer: String,
  /// Standard deviation of the Gaussian prior, none to deactivate.
  pub prior_stdev: Option<f64>,
  /// Start from the MLN's weights instead of zero.
  pub use_init_weights: bool,
  /// Maximal number of optimizer iterations.
  pub maxiter: usize,
  /// Gradient norm convergence threshold.
  pub gtol: f64,
  /// Step convergence threshold for derivative-free optimizers.
  pub xtol: f64,
  /// Objective convergence threshold for derivative-free optimizers.
  pub ftol: f64,
  /// Learning rate for direct descent and perceptron-style methods.
  pub learning_rate: f64,
  /// Block size for composite likelihood.
  pub part_size: usize,
  /// Query predicates for discriminative learners.
  pub qpreds: Vec<String>,
  /// Evidence predicates for discriminative learners.
  pub epreds: Vec<String>,
}
impl SubConf for LearnConf {
  fn need_out_dir(& self) -> bool { false }
}
impl LearnConf {
  /// Adds clap options to a clap App.
  pub fn add_args(app: App, mut order: usize) -> App {
    let mut order = || {
      order += 1 ;
      order
    } ;

    app.arg(

      Arg::with_name("learn_method").long("--learn_method").help(
        "weight learning method"
      ).validator(
        |s| arg_of_str(
          & s, & [ "LL", "PLL", "BPLL", "BPLL_CG", "CLL", "DCLL", "VP", "CD" ]
        ).map(|_| ())
      ).value_name(
        "LL|PLL|BPLL|BPLL_CG|CLL|DCLL|VP|CD"
      ).default_value(
        "BPLL"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("optimizer").long("--optimizer").help(
        "numerical optimizer for the learning objective"
      ).validator(
        |s| arg_of_str(
          & s, & [
            "bfgs", "cg", "ncg", "l-bfgs-b", "powell", "fmin",
            "directDescent", "diagonalNewton",
          ]
        ).map(|_| ())
      ).value_name(
        "bfgs|cg|ncg|l-bfgs-b|powell|fmin|directDescent|diagonalNewton"
      ).default_value(
        "bfgs"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("prior_stdev").long("--prior_stdev").help(
        "standard deviation of the Gaussian prior on weights, `none` for \
        no prior"
      ).validator(
        opt_float_validator
      ).value_name(
        "float|none"
      ).default_value(
        "none"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("use_init_weights").long("--use_init_weights").help(
        "start optimization from the MLN's weights instead of zero"
      ).validator(
        bool_validator
      ).value_name(
        bool_format
      ).default_value(
        "no"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("maxiter").long("--maxiter").help(
        "maximal number of optimizer iterations"
      ).validator(
        int_validator
      ).value_name(
        "int"
      ).default_value(
        "200"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("gtol").long("--gtol").help(
        "gradient norm convergence threshold"
      ).validator(
        float_validator
      ).value_name(
        "float"
      ).default_value(
        "1e-3"
      ).takes_value(true).number_of_values(1).display_order(
        order()
      ).hidden(true)

    ).arg(

      Arg::with_name("xtol").long("--xtol").help(
        "step convergence threshold (powell, fmin)"
      ).validator(
        float_validator
      ).value_name(
        "float"
      ).default_value(
        "1e-4"
      ).takes_value(true).number_of_values(1).display_order(
        order()
      ).hidden(true)

    ).arg(

      Arg::with_name("ftol").long("--ftol").help(
        "objective convergence threshold (powell, fmin)"
      ).validator(
        float_validator
      ).value_name(
        "float"
      ).default_value(
        "1e-6"
      ).takes_value(true).number_of_values(1).display_order(
        order()
      ).hidden(true)

    ).arg(

      Arg::with_name("learning_rate").long("--learning_rate").help(
        "learning rate for directDescent, VP and CD"
      ).validator(
        float_validator
      ).value_name(
        "float"
      ).default_value(
        "0.1"
      ).takes_value(true).number_of_values(1).display_order(
        order()
      ).hidden(true)

    ).arg(

      Arg::with_name("part_size").long("--part_size").help(
        "variable block size for composite likelihood"
      ).validator(
        int_validator
      ).value_name(
        "int"
      ).default_value(
        "1"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("qpreds").long("--qpreds").help(
        "comma-separated query predicates for discriminative learning"
      ).value_name(
        "pred,..."
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("epreds").long("--epreds").help(
        "comma-separated evidence predicates for discriminative learning"
      ).value_name(
        "pred,..."
      ).takes_value(true).number_of_values(1).display_order( order() )

    )
  }

  /// Creates itself from some matches.
  pub fn new(matches: & Matches) -> Self {
    let method = matches.value_of("learn_method").expect(
      "unreachable(learn_method): default is provided"
    ).to_string() ;
    let optimizer = matches.value_of("optimizer").expect(
      "unreachable(optimizer): default is provided"
    ).to_string() ;
    let prior_stdev = opt_float_of_matches(matches, "prior_stdev") ;
    let use_init_weights = bool_of_matches(matches, "use_init_weights") ;
    let maxiter = int_of_matches(matches, "maxiter") ;
    let gtol = float_of_matches(matches, "gtol") ;
    let xtol = float_of_matches(matches, "xtol") ;
    let ftol = float_of_matches(matches, "ftol") ;
    let learning_rate = float_of_matches(matches, "learning_rate") ;
    let part_size = int_of_matches(matches, "part_size") ;
    let split = |key| matches.value_of(key).map(
      |s: & str| s.split(',').map(
        |p| p.trim().to_string()
      ).filter( |p: & String| ! p.is_empty() ).collect()
    ).unwrap_or_else( Vec::new ) ;
    let qpreds = split("qpreds") ;
    let epreds = split("epreds") ;
    LearnConf {
      method, optimizer, prior_stdev, use_init_weights, maxiter,
      gtol, xtol, ftol, learning_rate, part_size, qpreds, epreds,
    }
  }
}




/// External WCSP solver configuration.
pub struct SolverConf {
  /// Command used to call the solver.
  pub cmd: String,
  /// Solver timeout in seconds, `0` for none.
  pub timeout: usize,
  /// Use the in-process branch-and-bound solver instead of the external one.
  pub internal: bool,
}
impl SubConf for SolverConf {
  fn need_out_dir(& self) -> bool { false }
}
impl SolverConf {
  /// Adds clap options to a clap App.
  pub fn add_args(app: App, mut order: usize) -> App {
    let mut order = || {
      order += 1 ;
      order
    } ;

    app.arg(

      Arg::with_name("solver_cmd").long("--solver").help(
        "sets the command used to call the external WCSP solver"
      ).default_value(
        "toulbar2"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("solver_timeout").long("--solver_timeout").help(
        "timeout for the external WCSP solver in seconds, `0` for none"
      ).validator(
        int_validator
      ).value_name(
        "int"
      ).default_value(
        "60"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("solver_internal").long("--solver_internal").help(
        "use the in-process branch-and-bound WCSP solver"
      ).validator(
        bool_validator
      ).value_name(
        bool_format
      ).default_value(
        "no"
      ).takes_value(true).number_of_values(1).display_order( order() )

    )
  }

  /// Creates itself from some matches.
  pub fn new(matches: & Matches) -> Self {
    let cmd = matches.value_of("solver_cmd").expect(
      "unreachable(solver_cmd): default is provided"
    ).to_string() ;
    let timeout = int_of_matches(matches, "solver_timeout") ;
    let internal = bool_of_matches(matches, "solver_internal") ;
    SolverConf { cmd, timeout, internal }
  }
}




use std::time::{ Instant, Duration } ;


/// Global configuration.
pub struct Config {
  file: Option<String>,
  /// Database files.
  pub dbs: Vec<String>,
  /// Query strings.
  pub queries: Vec<String>,
  /// Learning mode flag. Inference mode when false.
  pub learn: bool,
  /// Verbosity.
  pub verb: usize,
  /// Statistics flag.
  pub stats: bool,
  /// Seed for the random number generators.
  pub seed: u64,
  /// Instant at which we'll timeout.
  timeout: Option<Instant>,
  /// Output file, stdout when absent.
  pub out_file: Option<String>,
  /// Styles, for coloring.
  styles: Styles,

  /// Logic and grammar configuration.
  pub logic: LogicConf,
  /// Grounding configuration.
  pub ground: GroundConf,
  /// Inference configuration.
  pub infer: InfConf,
  /// Learning configuration.
  pub learning: LearnConf,
  /// External solver configuration.
  pub solver: SolverConf,
}
impl ColorExt for Config {
  fn styles(& self) -> & Styles { & self.styles }
}
impl Config {
  /// Input file.
  #[inline]
  pub fn in_file(& self) -> Option<& String> {
    self.file.as_ref()
  }

  /// True if verbosity is active.
  #[inline]
  pub fn verbose(& self) -> bool {
    self.verb > 0
  }
  /// True if verbosity is at debug level.
  #[inline]
  pub fn debug(& self) -> bool {
    self.verb > 1
  }

  /// Checks if we're out of time.
  #[inline]
  pub fn check_timeout(& self) -> Res<()> {
    if let Some(max) = self.timeout.as_ref() {
      if & Instant::now() > max {
        bail!( ErrorKind::Timeout )
      }
    }
    Ok(())
  }
  /// Time until timeout.
  #[inline]
  pub fn until_timeout(& self) -> Option<Duration> {
    if let Some(timeout) = self.timeout.as_ref() {
      let now = Instant::now() ;
      if & now > timeout {
        Some( Duration::new(0,0) )
      } else {
        Some( * timeout - now )
      }
    } else {
      None
    }
  }

  /// Parses command-line arguments and generates the configuration.
  pub fn clap() -> Self {
    let mut app = App::new( crate_name!() ) ;
    app = Self::add_args(app, 0) ;
    app = LogicConf::add_args(app, 100) ;
    app = GroundConf::add_args(app, 200) ;
    app = InfConf::add_args(app, 300) ;
    app = LearnConf::add_args(app, 400) ;
    app = SolverConf::add_args(app, 500) ;

    let matches = app.get_matches() ;

    // Input file.
    let file = matches.value_of("input file").map(|s| s.to_string()) ;

    // Database files.
    let dbs = matches.values_of("db").map(
      |vals| vals.map(|s| s.to_string()).collect()
    ).unwrap_or_else( Vec::new ) ;

    // Queries.
    let queries = matches.values_of("query").map(
      |vals| vals.flat_map(
        |s| s.split(',').map(
          |q| q.trim().to_string()
        ).filter( |q| ! q.is_empty() ).collect::< Vec<_> >()
      ).collect()
    ).unwrap_or_else( Vec::new ) ;

    // Learning mode.
    let learn = matches.is_present("learn") ;

    // Verbosity
    let mut verb = 0 ;
    for _ in 0..matches.occurrences_of("verb") {
      verb += 1
    }
    for _ in 0..matches.occurrences_of("quiet") {
      if verb > 0 {
        verb -= 1
      }
    }

    // Colors.
    let color = ::atty::is(
      ::atty::Stream::Stdout
    ) && bool_of_matches(& matches, "color") ;
    let styles = Styles::new(color) ;

    // Profiling.
    let stats = bool_of_matches(& matches, "stats") ;

    // Seed.
    let seed = int_of_matches(& matches, "seed") as u64 ;

    // Timeout.
    let timeout = match int_of_matches(& matches, "timeout") {
      0 => None,
      n => Some(
        Instant::now() + Duration::new(n as u64, 0)
      ),
    } ;

    // Output file.
    let out_file = matches.value_of("output").map(|s| s.to_string()) ;

    let logic = LogicConf::new(& matches) ;
    let ground = GroundConf::new(& matches) ;
    let infer = InfConf::new(& matches) ;
    let learning = LearnConf::new(& matches) ;
    let solver = SolverConf::new(& matches) ;

    Config {
      file, dbs, queries, learn, verb, stats, seed,
      timeout, out_file, styles,
      logic, ground, infer, learning, solver,
    }
  }

  /// Adds clap options to a clap App.
  pub fn add_args(app: App, mut order: usize) -> App {
    let mut order = || {
      order += 1 ;
      order
    } ;

    app.author( crate_authors!() ).version(
      * ::common::version
    ).about(
      "Markov Logic Network inference and weight learning engine."
    ).arg(

      Arg::with_name("input file").help(
        "sets the input MLN file to use"
      ).index(1).display_order( order() )

    ).arg(

      Arg::with_name("db").long("--db").short("-d").help(
        "evidence database file (repeatable)"
      ).value_name(
        "FILE"
      ).takes_value(true).multiple(true).number_of_values(
        1
      ).display_order( order() )

    ).arg(

      Arg::with_name("query").long("--query").help(
        "query predicate, ground literal or formula (repeatable)"
      ).value_name(
        "QUERY"
      ).takes_value(true).multiple(true).number_of_values(
        1
      ).display_order( order() )

    ).arg(

      Arg::with_name("learn").long("--learn").short("-l").help(
        "learn formula weights from the databases instead of inferring"
      ).takes_value(false).display_order( order() )

    ).arg(

      Arg::with_name("verb").short("-v").help(
        "increases verbosity"
      ).takes_value(false).multiple(true).display_order( order() )

    ).arg(

      Arg::with_name("quiet").short("-q").help(
        "decreases verbosity"
      ).takes_value(false).multiple(true).display_order( order() )

    ).arg(

      Arg::with_name("color").long("--color").short("-c").help(
        "(de)activates coloring (off if output is not a tty)"
      ).validator(
        bool_validator
      ).value_name(
        bool_format
      ).default_value(
        "on"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("stats").long("--stats").short("-s").help(
        "reports some statistics at the end of the run"
      ).validator(
        bool_validator
      ).value_name(
        bool_format
      ).default_value(
        "no"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("seed").long("--seed").help(
        "seed for the random number generators"
      ).validator(
        int_validator
      ).value_name(
        "int"
      ).default_value(
        "42"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("timeout").long("--timeout").short("-t").help(
        "sets a timeout in seconds, `0` for none"
      ).validator(
        int_validator
      ).value_name(
        "int"
      ).default_value(
        "0"
      ).takes_value(true).number_of_values(1).display_order( order() )

    ).arg(

      Arg::with_name("output").long("--output").short("-o").help(
        "write results to a file instead of stdout"
      ).value_name(
        "FILE"
      ).takes_value(true).number_of_values(1).display_order( order() )

    )
  }
}




/// Contains some styles for coloring.
#[derive(Debug, Clone)]
pub struct Styles {
  /// Emphasis style.
  emph: Style,
  /// Happy style.
  hap: Style,
  /// Sad style.
  sad: Style,
  /// Bad style.
  bad: Style,
}
impl Default for Styles {
  fn default() -> Self { Styles::new(true) }
}
impl ColorExt for Styles {
  fn styles(& self) -> & Styles { self }
}
impl Styles {
  /// Creates some styles.
  pub fn new(colored: bool) -> Self {
    Styles {
      emph: if colored {
        Style::new().bold()
      } else { Style::new() },
      hap: if colored {
        Colour::Green.normal().bold()
      } else { Style::new() },
      sad: if colored {
        Colour::Yellow.normal().bold()
      } else { Style::new() },
      bad: if colored {
        Colour::Red.normal().bold()
      } else { Style::new() },
    }
  }
}




/// Can color things.
pub trait ColorExt {
  /// The styles in the colorizer: emph, happy, sad, and bad.
  #[inline]
  fn styles(& self) -> & Styles ;
  /// String emphasis.
  #[inline]
  fn emph<S: AsRef<str>>(& self, s: S) -> String {
    format!("{}", self.styles().emph.paint(s.as_ref()))
  }
  /// Happy string.
  #[inline]
  fn happy<S: AsRef<str>>(& self, s: S) -> String {
    format!("{}", self.styles().hap.paint(s.as_ref()))
  }
  /// Sad string.
  #[inline]
  fn sad<S: AsRef<str>>(& self, s: S) -> String {
    format!("{}", self.styles().sad.paint(s.as_ref()))
  }
  /// Bad string.
  #[inline]
  fn bad<S: AsRef<str>>(& self, s: S) -> String {
    format!("{}", self.styles().bad.paint(s.as_ref()))
  }
}




/// Format for booleans.
pub static bool_format: & str = "on/true|no/off/false" ;

/// Boolean of a string.
pub fn bool_of_str(s: & str) -> Option<bool> {
  match & s as & str {
    "on" | "true" => Some(true),
    "no" | "off" | "false" => Some(false),
    _ => None,
  }
}

/// Boolean of some matches.
///
/// Assumes a default is provided and the input has been validated with
/// `bool_validator`.
pub fn bool_of_matches(matches: & Matches, key: & str) -> bool {
  matches.value_of(key).and_then(
    |s| bool_of_str(& s)
  ).expect(
    "failed to retrieve boolean argument"
  )
}

/// Integer of some matches.
///
/// Assumes a default is provided and the input has been validated with
/// `int_validator`.
pub fn int_of_matches(matches: & Matches, key: & str) -> usize {
  use std::str::FromStr ;
  matches.value_of(key).map(
    |s| usize::from_str(& s)
  ).expect(
    "failed to retrieve integer argument"
  ).expect(
    "failed to retrieve integer argument"
  )
}

/// Float of some matches.
///
/// Assumes a default is provided and the input has been validated with
/// `float_validator`.
pub fn float_of_matches(matches: & Matches, key: & str) -> f64 {
  use std::str::FromStr ;
  matches.value_of(key).map(
    |s| f64::from_str(& s)
  ).expect(
    "failed to retrieve float argument"
  ).expect(
    "failed to retrieve float argument"
  )
}

/// Optional float of some matches, `none` mapping to `None`.
///
/// Assumes a default is provided and the input has been validated with
/// `opt_float_validator`.
pub fn opt_float_of_matches(matches: & Matches, key: & str) -> Option<f64> {
  use std::str::FromStr ;
  matches.value_of(key).and_then(
    |s| if s == "none" {
      None
    } else {
      Some(
        f64::from_str(& s).expect(
          "failed to retrieve float argument"
        )
      )
    }
  )
}

/// Validates integer input.
pub fn int_validator(s: String) -> Result<(), String> {
  use std::str::FromStr ;
  match usize::from_str(& s) {
    Ok(_) => Ok(()),
    Err(_) => Err(
      format!("expected an integer, got `{}`", s)
    ),
  }
}

/// Validates float input.
pub fn float_validator(s: String) -> Result<(), String> {
  use std::str::FromStr ;
  match f64::from_str(& s) {
    Ok(_) => Ok(()),
    Err(_) => Err(
      format!("expected a float, got `{}`", s)
    ),
  }
}

/// Validates optional float input.
pub fn opt_float_validator(s: String) -> Result<(), String> {
  if s == "none" {
    Ok(())
  } else {
    float_validator(s)
  }
}

/// Validates boolean input.
pub fn bool_validator(s: String) -> Result<(), String> {
  if let Some(_) = bool_of_str(& s) {
    Ok(())
  } else {
    Err(
      format!("expected `on/true` or `off/false`, got `{}`", s)
    )
  }
}

/// Validates an input against a list of recognized values.
pub fn arg_of_str<'a>(
  s: & str, legal: & [& 'a str]
) -> Result<& 'a str, String> {
  for arg in legal {
    if * arg == s {
      return Ok(arg)
    }
  }
  Err(
    format!("expected one of {}, got `{}`", legal.join("|"), s)
  )
}


/// Checks whether a directory exists.
pub fn dir_exists(path: String) -> Result<(), String> {
  if ::std::path::Path::new(& path).is_dir() {
    Ok(())
  } else {
    Err( format!("`{}` is not a directory", path) )
  }
}
