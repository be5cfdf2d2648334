//! Rmln is a Markov Logic Network engine: it grounds a weighted
//! first-order knowledge base against evidence databases into a Markov
//! Random Field, answers probabilistic queries over it, and learns
//! formula weights from data.
//!
//! The pipeline is MLN text plus databases → template expansion
//! ([`mln`][mln]) → grounding ([`ground`][ground]) → inference
//! ([`infer`][infer]) or weight learning ([`learn`][learn]).
//!
//! [mln]: mln/index.html (mln module)
//! [ground]: ground/index.html (ground module)
//! [infer]: infer/index.html (infer module)
//! [learn]: learn/index.html (learn module)

#![doc(test(attr(deny(warnings))))]

#![allow(non_upper_case_globals)]
#[macro_use]
extern crate lazy_static ;
#[macro_use]
extern crate error_chain ;
#[macro_use]
extern crate clap ;
#[macro_use]
extern crate log ;
extern crate ansi_term as ansi ;
extern crate hashconsing ;
extern crate rand ;
extern crate rand_xorshift ;
extern crate atty ;
extern crate env_logger ;

#[macro_use]
pub mod common ;
pub mod errors ;
pub mod logic ;
pub mod mln ;
pub mod mrf ;
pub mod ground ;
pub mod wcsp ;
pub mod infer ;
pub mod learn ;
pub mod support ;

#[cfg(test)]
mod tests ;

use common::* ;
use ground::{ DefaultGrounding, FastConjunctionGrounding, Grounder } ;
use infer::{ Inference, Method } ;
use learn::Learner ;
use mln::{ Database, Mln } ;
use mrf::Mrf ;


/// Parses command-line arguments and works.
pub fn work() -> Res<()> {
  let path = match conf.in_file() {
    Some(path) => path,
    None => bail!( "no input MLN file provided" ),
  } ;
  let text = read_file(path) ? ;
  let mln = Mln::parse_str(
    & text, conf.logic.prac_grammar, conf.logic.fuzzy
  ).chain_err(
    || format!("while parsing MLN file `{}`", conf.emph(path))
  ) ? ;

  let mut dbs = Vec::new() ;
  for path in & conf.dbs {
    let text = read_file(path) ? ;
    let mut parsed = Database::parse_str(
      & text, & mln,
      conf.ground.ignore_unknown_preds, conf.ground.allow_unknown,
    ).chain_err(
      || format!("while parsing database file `{}`", conf.emph(path))
    ) ? ;
    dbs.append(& mut parsed)
  }

  if conf.learn {
    learn_and_report(& mln, & dbs)
  } else {
    infer_and_report(& mln, & dbs)
  }
}


/// Reads a file to a string.
fn read_file(path: & str) -> Res<String> {
  use std::fs::OpenOptions ;
  let mut file = OpenOptions::new().read(true).open(path).chain_err(
    || format!("while opening input file `{}`", conf.emph(path))
  ) ? ;
  let mut buf = String::with_capacity(2000) ;
  file.read_to_string(& mut buf).chain_err(
    || format!("while reading input file `{}`", conf.emph(path))
  ) ? ;
  Ok(buf)
}

/// Writes a report to the output file, or stdout when there is none.
fn with_output<F>(f: F) -> Res<()>
where F: FnOnce(& mut dyn Write) -> IoRes<()> {
  if let Some(path) = conf.out_file.as_ref() {
    let mut file = ::std::fs::File::create(path).chain_err(
      || format!("while opening output file `{}`", conf.emph(path))
    ) ? ;
    f(& mut file).chain_err(
      || format!("while writing output file `{}`", conf.emph(path))
    ) ?
  } else {
    let stdout = stdout() ;
    let mut stdout = stdout.lock() ;
    f(& mut stdout).chain_err( || "while writing to stdout" ) ?
  }
  Ok(())
}


/// Runs inference over the union of the databases and reports the
/// query probabilities.
fn infer_and_report(mln: & Mln, dbs: & [Database]) -> Res<()> {
  let profiler = Profiler::new() ;

  let mut evidence = Database::new() ;
  for db in dbs {
    evidence = evidence.union(db) ?
  }

  let materialized = mln.materialize(dbs) ? ;
  let mut mrf = Mrf::new( materialized, & evidence ) ? ;

  let queries = infer::expand_queries(
    & mrf, & conf.queries, conf.logic.prac_grammar
  ) ? ;
  if queries.is_empty() {
    bail!( "no query provided" )
  }

  // Closed world: the explicitly named predicates, or everything but
  // the query predicates under the global flag. Predicates the MLN
  // marks closed-world are always in.
  let mut cw: HashSet<String> = conf.infer.cw_preds.iter().cloned(
  ).collect() ;
  for pred in mrf.mln().preds() {
    if mrf.mln().is_cw(& pred.name) {
      cw.insert( pred.name.clone() ) ;
    }
  }
  if conf.infer.cw {
    let query_preds = infer::query_preds(& mrf, & queries) ;
    for pred in mrf.mln().preds() {
      if ! query_preds.contains(& pred.name) {
        cw.insert( pred.name.clone() ) ;
      }
    }
  }
  mrf.apply_closed_world(& cw) ;

  profile!{ |profiler| tick "grounding" }
  if conf.ground.multicore {
    FastConjunctionGrounding::new(true, true).ground(& mut mrf) ? ;
  } else {
    DefaultGrounding::new(true).ground(& mut mrf) ? ;
  }
  profile!{ |profiler| mark "grounding" }
  log_info!(
    "grounded {} formulas over {} atoms in {} variables",
    mrf.gnd_formulas.len(), mrf.atoms.len(), mrf.vars.len()
  ) ;

  let engine: Box<dyn Inference> = match Method::of_str(
    & conf.infer.method
  ) ? {
    Method::Exact => Box::new( infer::EnumerationAsk ),
    Method::Gibbs => Box::new( infer::Gibbs::from_conf() ),
    Method::McSat => Box::new( infer::McSat::from_conf() ),
    Method::Wcsp => Box::new( infer::WcspInference::from_conf() ),
  } ;
  let results = engine.run(& mrf, & queries) ? ;

  with_output(
    |mut w| results.write(& mut w)
  ) ? ;
  print_stats("inference", profiler) ;
  Ok(())
}


/// Learns weights from the databases and reports the learned MLN.
fn learn_and_report(mln: & Mln, dbs: & [Database]) -> Res<()> {
  let learner = Learner::from_conf() ? ;
  let learned = learner.learn(mln, dbs) ? ;
  with_output(
    |mut w| learned.mln_write(& mut w)
  )
}
