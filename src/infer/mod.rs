//! Inference over ground MRFs.
//!
//! All engines share the query contract: a query is a predicate name
//! (expanded to every ground atom of the predicate), a ground literal,
//! or a formula (expanded to all its groundings). Results map query
//! strings to probabilities, in expansion order.

use common::* ;
use logic::{ Formula, parse } ;
use mln::Database ;
use mrf::Mrf ;
use ground::Assignments ;

pub mod exact ;
pub mod mcmc ;
pub mod wcsp ;

pub use self::exact::EnumerationAsk ;
pub use self::mcmc::{ Gibbs, McSat } ;
pub use self::wcsp::WcspInference ;


/// Inference methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  /// Exhaustive world enumeration.
  Exact,
  /// Gibbs sampling.
  Gibbs,
  /// MC-SAT sampling.
  McSat,
  /// MPE through WCSP conversion.
  Wcsp,
}
impl Method {
  /// Parses a method name.
  pub fn of_str(s: & str) -> Res<Method> {
    match s {
      "Exact" | "EnumerationAsk" => Ok( Method::Exact ),
      "Gibbs" => Ok( Method::Gibbs ),
      "MC-SAT" | "MCSAT" => Ok( Method::McSat ),
      "WCSP" => Ok( Method::Wcsp ),
      _ => bail!( "unknown inference method `{}`", s ),
    }
  }
}


/// An expanded query: a ground formula and its display string.
#[derive(Debug, Clone)]
pub struct Query {
  /// Display string.
  pub text: String,
  /// Ground formula.
  pub ast: Formula,
}

/// Expands query strings against an MRF.
///
/// Predicate names expand to one query per ground atom; everything else
/// parses as a formula and expands to one query per grounding, in the
/// deterministic assignment order.
pub fn expand_queries(
  mrf: & Mrf, queries: & [String], prac: bool
) -> Res< Vec<Query> > {
  let mut res = Vec::new() ;
  for query in queries {
    if let Some(pred) = mrf.mln().pred_idx(query) {
      for atom in & mrf.atoms {
        if atom.pred != pred { continue }
        res.push(
          Query {
            text: atom.name.clone(),
            ast: Formula::GndLit { neg: false, atom: atom.idx },
          }
        )
      }
    } else {
      let ast = parse::parse_formula(query, prac).chain_err(
        || format!("while parsing query `{}`", query)
      ) ? ;
      for assig in Assignments::of( & ast, mrf.mln() ) ? {
        let inst = ast.subst(& assig) ;
        let gnd = inst.ground( mrf, & Assignment::new(), false ) ? ;
        res.push(
          Query { text: format!("{}", inst), ast: gnd }
        )
      }
    }
  }
  Ok(res)
}

/// Predicates named by the queries, for closed-world bookkeeping.
pub fn query_preds(
  mrf: & Mrf, queries: & [Query]
) -> HashSet<String> {
  let mut res = HashSet::new() ;
  for query in queries {
    let mut atoms = AtomSet::new() ;
    query.ast.atom_indices(& mut atoms) ;
    for atom in atoms {
      let pred = mrf.atoms[atom].pred ;
      res.insert( mrf.mln().preds()[pred].name.clone() ) ;
    }
  }
  res
}


/// Inference results, in query-expansion order.
#[derive(Debug, Clone)]
pub struct Results {
  /// Probability of each query.
  pub probs: Vec< (String, f64) >,
}

impl Results {
  /// Writes the results in the `prob  atom` textual form.
  pub fn write<W: Write>(& self, w: & mut W) -> IoRes<()> {
    for & (ref text, prob) in & self.probs {
      writeln!(w, "{:>8.4}  {}", prob, text) ?
    }
    Ok(())
  }

  /// Materializes the results as a database: every query with an
  /// integral probability becomes evidence.
  pub fn to_database(& self, mrf: & Mrf) -> Res<Database> {
    let mut db = Database::new() ;
    for & (ref text, prob) in & self.probs {
      if let Ok( (pred, args) ) = ::mln::database::parse_atom(text) {
        db.add_evidence( mrf.mln(), & pred, args, prob ) ?
      }
    }
    Ok(db)
  }
}


/// Shared engine surface.
pub trait Inference {
  /// Runs the engine over an MRF.
  fn run(& self, mrf: & Mrf, queries: & [Query]) -> Res<Results> ;
}


#[cfg(test)]
mod test {
  use super::* ;
  use mln::Mln ;

  fn mrf() -> Mrf {
    let mln = Mln::parse_str(
      "person = {Ann, Bob}\n\
      Smokes(person)\n\
      Cancer(person)\n\
      1.5      Smokes(x) => Cancer(x)\n",
      false, false,
    ).expect("parses").materialize(& []).expect("materializes") ;
    Mrf::new( mln, & Database::new() ).expect("builds")
  }

  #[test]
  fn predicate_query_expands_to_atoms() {
    let mrf = mrf() ;
    let queries = expand_queries(
      & mrf, & [ "Cancer".to_string() ], false
    ).expect("expands") ;
    assert_eq!( queries.len(), 2 ) ;
    assert_eq!( queries[0].text, "Cancer(Ann)" ) ;
    assert_eq!( queries[1].text, "Cancer(Bob)" )
  }

  #[test]
  fn literal_query_is_single() {
    let mrf = mrf() ;
    let queries = expand_queries(
      & mrf, & [ "Cancer(Ann)".to_string() ], false
    ).expect("expands") ;
    assert_eq!( queries.len(), 1 ) ;
    assert_eq!( queries[0].text, "Cancer(Ann)" )
  }

  #[test]
  fn formula_query_expands_groundings() {
    let mrf = mrf() ;
    let queries = expand_queries(
      & mrf, & [ "Smokes(x) ^ Cancer(x)".to_string() ], false
    ).expect("expands") ;
    assert_eq!( queries.len(), 2 ) ;
    assert_eq!( queries[0].text, "Smokes(Ann) ^ Cancer(Ann)" )
  }

  #[test]
  fn query_pred_collection() {
    let mrf = mrf() ;
    let queries = expand_queries(
      & mrf, & [ "Cancer".to_string() ], false
    ).expect("expands") ;
    let preds = query_preds(& mrf, & queries) ;
    assert!( preds.contains("Cancer") ) ;
    assert!( ! preds.contains("Smokes") )
  }
}
