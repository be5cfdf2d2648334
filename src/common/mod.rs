//! Base types and functions.

pub use std::io::{ Read, Write } ;
pub use std::io::Result as IoRes ;
pub use std::sync::{ Arc, RwLock, Mutex } ;
pub use std::sync::mpsc::{ Receiver, Sender } ;
pub use std::collections::{ HashMap, HashSet, BTreeMap } ;

pub use hashconsing::{ HConsed, HConsign, HashConsign } ;

pub use errors::* ;

#[macro_use]
pub mod macros ;
pub mod config ;
pub mod profiling ;
pub mod pool ;

pub use self::config::* ;
pub use self::profiling::{ Profiler, CanPrint } ;


lazy_static!{
  /// Configuration from clap.
  pub static ref conf: Config = Config::clap() ;
  static ref version_string: String = format!(
    "{}", crate_version!()
  ) ;
  /// Version string.
  pub static ref version: & 'static str = & version_string ;
}


wrap_usize!{
  #[doc = "Predicate index."]
  PrdIdx,
  map: #[doc = "Total map from predicates to something."] PrdMap
}
wrap_usize!{
  #[doc = "Template formula index."]
  FmlIdx,
  map: #[doc = "Total map from template formulas to something."] FmlMap
}
wrap_usize!{
  #[doc = "Ground atom index."]
  AtomIdx,
  map: #[doc = "Total map from ground atoms to something."] AtomMap
}
wrap_usize!{
  #[doc = "MRF variable index."]
  VarIdx,
  map: #[doc = "Total map from MRF variables to something."] VarMap
}


/// An interned constant symbol.
pub type Sym = HConsed<String> ;

lazy_static!{
  /// Constant symbol factory.
  static ref sym_factory: RwLock< HConsign<String> > = RwLock::new(
    HConsign::with_capacity(211)
  ) ;
}

/// Interns a constant symbol.
pub fn sym<S: Into<String>>(s: S) -> Sym {
  sym_factory.mk( s.into() )
}


// |===| Helpers.

/// Stdout.
pub use ::std::io::stdout ;

/// Prints the stats if asked. Does nothing in bench mode.
#[cfg(feature = "bench")]
pub fn print_stats(_: & 'static str, _: Profiler) {}
/// Prints the stats if asked. Does nothing in bench mode.
#[cfg( not(feature = "bench") )]
pub fn print_stats(name: & str, profiler: Profiler) {
  if conf.stats {
    println!("") ;
    profiler.print(name) ;
    println!("")
  }
}


// |===| Type and traits aliases.

/// Set of ground atom indices.
pub type AtomSet = HashSet<AtomIdx> ;

/// Map from variable names to constants, a grounding assignment.
pub type Assignment = HashMap<String, Sym> ;

/// A complete world, one truth value per ground atom.
pub type World = Vec<f64> ;
/// A partial world, `None` meaning unknown.
pub type PartialWorld = Vec< Option<f64> > ;

/// Can write itself in the MLN surface syntax.
pub trait MlnWrite {
  /// Writes itself in the MLN surface syntax.
  fn mln_write<W: Write>(& self, w: & mut W) -> IoRes<()> ;
  /// String version of `mln_write`.
  fn mln_string(& self) -> String {
    let mut buf: Vec<u8> = Vec::with_capacity(17) ;
    self.mln_write(& mut buf).expect(
      "writing to a string buffer cannot fail"
    ) ;
    String::from_utf8_lossy(& buf).into_owned()
  }
}
