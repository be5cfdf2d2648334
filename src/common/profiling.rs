#![doc = r#"Profiling stuff.

Stopwatches for the grounder, the inference engines and the learning
driver. In `bench` mode, `Profiler` is a unit structure and all profiling
macros are deactivated, so all profiling is completely removed.
"#]

use std::time::{ Instant, Duration } ;

use common::* ;

/// Extends duration with a pretty printing.
pub trait DurationExt {
  /// Nice string representation.
  fn to_str(& self) -> String ;
}
impl DurationExt for Duration {
  fn to_str(& self) -> String {
    format!("{}.{:0>9}", self.as_secs(), self.subsec_nanos())
  }
}


/// Maps strings to counters.
pub type Stats = HashMap<String, usize> ;
/// Provides a debug print function.
pub trait CanPrint {
  /// Debug print (multi-line).
  fn print(& self) ;
}
impl CanPrint for Stats {
  fn print(& self) {
    let mut stats: Vec<_> = self.iter().collect() ;
    stats.sort_unstable() ;
    for (stat, count) in stats {
      let stat_len = ::std::cmp::min( 30, stat.len() ) ;
      println!(
        ";   {0: >1$}{2}: {3: >5}",
        "", 30 - stat_len, conf.emph(stat), count
      )
    }
  }
}


/// A stopwatch: a running tick, if any, and the accumulated time.
struct Watch {
  /// Instant of the last `tick` not `mark`ed yet.
  tick: Option<Instant>,
  /// Time accumulated over completed tick/mark pairs.
  sum: Duration,
}
impl Watch {
  fn new() -> Self {
    Watch { tick: None, sum: Duration::from_secs(0) }
  }
}


/// Profiling structure, only in `not(bench)`.
///
/// Stopwatches are indexed by scope paths and reported in the order
/// the first tick of each scope happened, indented by path depth.
///
/// Internally, the structures are wrapped in `RefCell`s so that mutation
/// does not require `& mut self`.
#[cfg( not(feature = "bench") )]
pub struct Profiler {
  /// Stopwatches, in first-tick order.
  watches: ::std::cell::RefCell<
    Vec< (Vec<& 'static str>, Watch) >
  >,
  /// Starting tick, for total time.
  start: Instant,
  /// Other statistics.
  stats: ::std::cell::RefCell< Stats >,
}
#[cfg(feature = "bench")]
pub struct Profiler ;
impl Profiler {
  /// Constructor.
  #[cfg( not(feature = "bench") )]
  pub fn new() -> Self {
    use std::cell::RefCell ;
    Profiler {
      watches: RefCell::new( Vec::new() ),
      start: Instant::now(),
      stats: RefCell::new( HashMap::new() ),
    }
  }
  #[cfg(feature = "bench")]
  pub fn new() -> Self { Profiler }

  /// Acts on a statistic.
  #[cfg( not(feature = "bench") )]
  pub fn stat_do<F, S>(& self, stat: S, f: F)
  where F: Fn(usize) -> usize, S: Into<String> {
    let stat = stat.into() ;
    let mut map = self.stats.borrow_mut() ;
    let val = map.get(& stat).map(|n| * n).unwrap_or(0) ;
    let _ = map.insert(stat, f(val)) ;
    ()
  }

  /// Ticks.
  #[cfg( not(feature = "bench") )]
  pub fn tick(& self, scope: Vec<& 'static str>) {
    if scope.is_empty() {
      panic!("Profile: can't use scope `total`")
    }
    let mut watches = self.watches.borrow_mut() ;
    for & mut (ref path, ref mut watch) in watches.iter_mut() {
      if * path == scope {
        watch.tick = Some( Instant::now() ) ;
        return ()
      }
    }
    let mut watch = Watch::new() ;
    watch.tick = Some( Instant::now() ) ;
    watches.push( (scope, watch) )
  }

  /// Registers the time since the last tick.
  ///
  /// Panics if there was no tick since the last time registration.
  #[cfg( not(feature = "bench") )]
  pub fn mark(& self, scope: Vec<& 'static str>) {
    let now = Instant::now() ;
    let mut watches = self.watches.borrow_mut() ;
    for & mut (ref path, ref mut watch) in watches.iter_mut() {
      if * path == scope {
        let mut tick = None ;
        ::std::mem::swap(& mut tick, & mut watch.tick) ;
        if let Some(tick) = tick {
          watch.sum += now.duration_since(tick)
        }
        return ()
      }
    }
    panic!("profiling: trying to mark the time without ticking first")
  }

  /// Prints the total time, the stopwatches and the statistics.
  #[cfg( not(feature = "bench") )]
  pub fn print(self, name: & str) {
    println!("; {}:", conf.emph(name)) ;
    println!(
      "; total {}s",
      Instant::now().duration_since(self.start).to_str()
    ) ;
    for & (ref path, ref watch) in self.watches.borrow().iter() {
      if watch.tick.is_some() {
        log_warn!(
          "profiling: still have a live instant for {:?}", path
        )
      }
      println!(
        "; {0: >1$}|- {2}s {3}",
        "", 2 * path.len(), watch.sum.to_str(),
        path.last().unwrap_or(& "?")
      )
    }
    let stats = self.stats.borrow() ;
    if ! stats.is_empty() {
      println!("; stats:") ;
      stats.print()
    }
  }
}
