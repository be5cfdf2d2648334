//! Evidence databases.
//!
//! A database is a set of ground atoms with truth values in `[0, 1]`,
//! plus the constants it mentions sorted into their domains. A single
//! file can hold several databases separated by `---` lines.

use common::* ;
use logic::{ Formula, Term } ;

use super::Mln ;


/// A piece of evidence: a ground atom and its truth value.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
  /// Predicate name.
  pub pred: String,
  /// Constant arguments.
  pub args: Vec<Sym>,
  /// Truth value in `[0, 1]`.
  pub truth: f64,
}
impl Evidence {
  /// Canonical textual form of the atom, `Pred(A,B)`.
  pub fn atom_name(& self) -> String {
    atom_name( & self.pred, & self.args )
  }
}

/// Canonical textual form of a ground atom.
pub fn atom_name(pred: & str, args: & [Sym]) -> String {
  let mut res = String::with_capacity( pred.len() + 2 + 7 * args.len() ) ;
  res.push_str(pred) ;
  res.push('(') ;
  for (pos, arg) in args.iter().enumerate() {
    if pos > 0 { res.push(',') }
    res.push_str( arg.get() )
  }
  res.push(')') ;
  res
}


/// An evidence database.
#[derive(Debug, Clone, Default)]
pub struct Database {
  /// Domain extensions local to this database.
  domains: HashMap< String, Vec<Sym> >,
  /// Evidence atoms, in insertion order.
  pub evidence: Vec<Evidence>,
}

impl Database {

  /// Empty database.
  pub fn new() -> Self {
    Database { domains: HashMap::new(), evidence: Vec::new() }
  }

  /// The database's domain extensions, in name order.
  pub fn domains(& self) -> Vec< (& String, & Vec<Sym>) > {
    let mut res: Vec<_> = self.domains.iter().collect() ;
    res.sort_by_key( |& (name, _)| name ) ;
    res
  }

  /// Adds a constant to a domain.
  pub fn add_constant<S: Into<String>>(& mut self, dom: S, cst: Sym) {
    let dom = self.domains.entry( dom.into() ).or_insert_with(Vec::new) ;
    if ! dom.contains(& cst) {
      dom.push(cst)
    }
  }

  /// Adds an evidence atom, overwriting any previous truth value for the
  /// same atom.
  ///
  /// Checks the atom against the schema and registers its constants in
  /// their domains.
  pub fn add_evidence(
    & mut self, mln: & Mln, pred: & str, args: Vec<Sym>, truth: f64
  ) -> Res<()> {
    let decl = mln.pred_of_name(pred).ok_or_else(
      || ErrorKind::NoSuchPredicate( pred.to_string() )
    ) ? ;
    if args.len() != decl.args.len() {
      bail!(
        "evidence atom `{}` has {} arguments, predicate `{}` expects {}",
        atom_name(pred, & args), args.len(), pred, decl.args.len()
      )
    }
    if ! (0. <= truth && truth <= 1.) {
      bail!(
        "illegal truth value `{}` for evidence atom `{}`",
        truth, atom_name(pred, & args)
      )
    }
    for (arg, spec) in args.iter().zip( decl.args.iter() ) {
      self.add_constant( spec.dom.clone(), arg.clone() )
    }
    for prev in self.evidence.iter_mut() {
      if prev.pred == pred && prev.args == args {
        prev.truth = truth ;
        return Ok(())
      }
    }
    self.evidence.push(
      Evidence { pred: pred.to_string(), args, truth }
    ) ;
    Ok(())
  }

  /// Merges another database into this one.
  ///
  /// The other database's truth values win on conflicting atoms.
  pub fn union(& self, other: & Database) -> Res<Database> {
    let mut res = self.clone() ;
    for (dom, csts) in other.domains() {
      for cst in csts {
        res.add_constant( dom.clone(), cst.clone() )
      }
    }
    'other: for ev in & other.evidence {
      for prev in res.evidence.iter_mut() {
        if prev.pred == ev.pred && prev.args == ev.args {
          prev.truth = ev.truth ;
          continue 'other
        }
      }
      res.evidence.push( ev.clone() )
    }
    Ok(res)
  }

  /// Truth value of a ground atom, `None` when the database does not
  /// mention it.
  pub fn truth_of(& self, pred: & str, args: & [Sym]) -> Option<f64> {
    for ev in & self.evidence {
      if ev.pred == pred && ev.args == args {
        return Some(ev.truth)
      }
    }
    None
  }

  /// Evaluates the groundings of a formula against this database under
  /// the closed-world assumption.
  ///
  /// Returns the groundings in a deterministic order along with their
  /// truth values; atoms the database does not mention count as false.
  pub fn query(
    & self, mln: & Mln, formula: & str, prac: bool
  ) -> Res< Vec<(String, f64)> > {
    let ast = ::logic::parse::parse_formula(formula, prac) ? ;
    let mut merged = mln.clone() ;
    for (dom, csts) in self.domains() {
      for cst in csts {
        merged.add_constant( dom.clone(), cst.clone() )
      }
    }
    let doms = ast.variables(& merged) ? ;
    let vars: Vec<_> = doms.iter().collect() ;

    let mut res = Vec::new() ;
    let mut cursors = vec![ 0 ; vars.len() ] ;
    'all_groundings: loop {
      let mut assig = Assignment::new() ;
      for (pos, & (var, dom)) in vars.iter().enumerate() {
        let csts = merged.domain(dom).ok_or_else(
          || format!("unknown domain `{}`", dom)
        ) ? ;
        if csts.is_empty() { break 'all_groundings }
        assig.insert( var.clone(), csts[ cursors[pos] ].clone() ) ;
      }
      let ground = ast.subst(& assig) ;
      let truth = self.eval(& ground) ? ;
      res.push( (format!("{}", ground), truth) ) ;

      // Next assignment, rightmost variable moves fastest.
      let mut pos = vars.len() ;
      loop {
        if pos == 0 { break 'all_groundings }
        pos -= 1 ;
        cursors[pos] += 1 ;
        let len = merged.domain(vars[pos].1).map(
          |d| d.len()
        ).unwrap_or(0) ;
        if cursors[pos] < len { break } else { cursors[pos] = 0 }
      }
    }
    Ok(res)
  }

  /// Truth value of a ground formula under this database, closed-world.
  fn eval(& self, formula: & Formula) -> Res<f64> {
    let res = match * formula {
      Formula::Lit { neg, ref pred, ref args, .. } => {
        let mut csts = Vec::with_capacity( args.len() ) ;
        for arg in args {
          match * arg {
            Term::Cst(ref cst) => csts.push( cst.clone() ),
            Term::Var(ref var, _) => bail!(
              "query grounding left variable `{}` free", var
            ),
          }
        }
        let truth = self.truth_of(pred, & csts).unwrap_or(0.) ;
        if neg { 1. - truth } else { truth }
      },
      Formula::Eq { neg, ref lhs, ref rhs } => {
        let eq = lhs == rhs ;
        if eq != neg { 1. } else { 0. }
      },
      Formula::Conj(ref kids) => {
        let mut min = 1.0f64 ;
        for kid in kids {
          min = min.min( self.eval(kid) ? )
        }
        min
      },
      Formula::Disj(ref kids) => {
        let mut max = 0.0f64 ;
        for kid in kids {
          max = max.max( self.eval(kid) ? )
        }
        max
      },
      Formula::Neg(ref kid) => 1. - self.eval(kid) ?,
      Formula::Impl(ref lhs, ref rhs) => {
        ( 1. - self.eval(lhs) ? ).max( self.eval(rhs) ? )
      },
      Formula::Biimpl(ref lhs, ref rhs) => {
        let (l, r) = ( self.eval(lhs) ?, self.eval(rhs) ? ) ;
        ( (1. - l).max(r) ).min( (1. - r).max(l) )
      },
      Formula::TrueFalse(t) => t,
      Formula::Exist(_, _) | Formula::GndLit { .. } => bail!(
        "illegal construct in database query `{}`", formula
      ),
    } ;
    Ok(res)
  }

  /// Parses the databases of a text, separated by `---` lines.
  ///
  /// Unknown predicates are errors, unless `ignore_unknown` makes them
  /// skipped lines. Question-marked atoms are errors unless
  /// `allow_unknown`, in which case they are skipped (the atom stays
  /// unknown, which is the default anyway).
  pub fn parse_str(
    text: & str, mln: & Mln, ignore_unknown: bool, allow_unknown: bool
  ) -> Res< Vec<Database> > {
    let text = super::strip_block_comments(text) ;
    let mut dbs = Vec::new() ;
    let mut db = Database::new() ;
    let mut seen_anything = false ;

    for line in text.lines() {
      let line = match line.find("//") {
        Some(pos) => & line[..pos],
        None => line,
      }.trim() ;
      if line.is_empty() { continue }

      if line.chars().all( |c| c == '-' ) && line.len() >= 3 {
        dbs.push( ::std::mem::replace(& mut db, Database::new()) ) ;
        seen_anything = true ;
        continue
      }

      // Domain extension `dom = {c1, c2}`.
      if let Some(eq_pos) = line.find('=') {
        let rhs = line[eq_pos + 1..].trim() ;
        if rhs.starts_with('{') && rhs.ends_with('}') {
          let name = line[..eq_pos].trim() ;
          for cst in rhs[1..rhs.len() - 1].split(',') {
            let cst = cst.trim() ;
            if ! cst.is_empty() {
              db.add_constant( name, sym(cst) )
            }
          }
          seen_anything = true ;
          continue
        }
      }

      let (truth, rest) = if let Some(rest) = line.strip_prefix('!') {
        ( 0., rest.trim() )
      } else if let Some(rest) = line.strip_prefix('?') {
        if ! allow_unknown {
          bail!(
            "unknown-marked atom `{}` (allowing unknown atoms is \
            disabled)", line
          )
        }
        // Unknown is the default truth status, nothing to record.
        let _ = rest ;
        seen_anything = true ;
        continue
      } else if let Some( (truth, rest) ) = super::split_weight(line) {
        ( truth, rest )
      } else {
        ( 1., line )
      } ;

      match parse_atom(rest) {
        Ok( (pred, args) ) => {
          if mln.pred_of_name(& pred).is_none() && ignore_unknown {
            log_warn!( "ignoring atom `{}`: unknown predicate", rest ) ;
            continue
          }
          db.add_evidence(mln, & pred, args, truth) ? ;
          seen_anything = true
        },
        Err(e) => return Err(e).chain_err(
          || format!("while parsing evidence atom `{}`", rest)
        ),
      }
    }

    if ! db.evidence.is_empty() || ! db.domains.is_empty()
    || ! seen_anything {
      dbs.push(db)
    }
    Ok(dbs)
  }
}

impl MlnWrite for Database {
  fn mln_write<W: Write>(& self, w: & mut W) -> IoRes<()> {
    for (name, csts) in self.domains() {
      write!(w, "{} = {{", name) ? ;
      for (idx, cst) in csts.iter().enumerate() {
        if idx > 0 { write!(w, ", ") ? }
        write!(w, "{}", cst.get()) ?
      }
      writeln!(w, "}}") ?
    }
    for ev in & self.evidence {
      if ev.truth == 0. {
        writeln!(w, "!{}", ev.atom_name()) ?
      } else if ev.truth == 1. {
        writeln!(w, "{}", ev.atom_name()) ?
      } else {
        writeln!(w, "{} {}", ev.truth, ev.atom_name()) ?
      }
    }
    Ok(())
  }
}


/// Parses a ground atom `Pred(C1, C2)`.
pub fn parse_atom(text: & str) -> Res<(String, Vec<Sym>)> {
  let open = text.find('(').ok_or_else(
    || format!("expected `(` in `{}`", text)
  ) ? ;
  if ! text.ends_with(')') {
    bail!( "expected trailing `)` in `{}`", text )
  }
  let pred = text[..open].trim() ;
  if pred.is_empty() {
    bail!( "empty predicate name in `{}`", text )
  }
  let mut args = Vec::new() ;
  let inner = & text[open + 1..text.len() - 1] ;
  if ! inner.trim().is_empty() {
    for arg in inner.split(',') {
      let arg = arg.trim() ;
      if arg.is_empty() {
        bail!( "empty argument in `{}`", text )
      }
      args.push( sym(arg) )
    }
  }
  Ok( (pred.to_string(), args) )
}


#[cfg(test)]
mod test {
  use super::* ;

  fn schema() -> Mln {
    Mln::parse_str(
      "Smokes(person)\n\
      Friends(person, person)\n",
      false, false,
    ).expect("parses")
  }

  #[test]
  fn parse_evidence() {
    let mln = schema() ;
    let dbs = Database::parse_str(
      "Smokes(Ann)\n\
      !Smokes(Bob)\n\
      0.6 Friends(Ann, Bob)\n",
      & mln, false, false,
    ).expect("parses") ;
    assert_eq!( dbs.len(), 1 ) ;
    let db = & dbs[0] ;
    assert_eq!( db.evidence.len(), 3 ) ;
    assert_eq!( db.truth_of( "Smokes", & [ sym("Ann") ] ), Some(1.) ) ;
    assert_eq!( db.truth_of( "Smokes", & [ sym("Bob") ] ), Some(0.) ) ;
    assert_eq!(
      db.truth_of( "Friends", & [ sym("Ann"), sym("Bob") ] ), Some(0.6)
    ) ;
    // Constants flow into the database's domain extensions.
    assert_eq!(
      db.domains().into_iter().find( |& (name, _)| name == "person" ).map(
        |(_, csts)| csts.len()
      ),
      Some(2)
    )
  }

  #[test]
  fn parse_multiple_dbs() {
    let mln = schema() ;
    let dbs = Database::parse_str(
      "Smokes(Ann)\n\
      ---\n\
      Smokes(Bob)\n",
      & mln, false, false,
    ).expect("parses") ;
    assert_eq!( dbs.len(), 2 ) ;
    assert_eq!( dbs[0].evidence.len(), 1 ) ;
    assert_eq!( dbs[1].evidence.len(), 1 )
  }

  #[test]
  fn unknown_pred_is_an_error() {
    let mln = schema() ;
    let err = Database::parse_str(
      "Drinks(Ann)\n", & mln, false, false,
    ).unwrap_err() ;
    match * err.kind() {
      ErrorKind::NoSuchPredicate(ref pred) => assert_eq!( pred, "Drinks" ),
      ref kind => panic!( "unexpected error: {}", kind ),
    }
    // The skip flag turns the same line into a warning.
    let dbs = Database::parse_str(
      "Drinks(Ann)\n", & mln, true, false,
    ).expect("parses") ;
    assert!( dbs[0].evidence.is_empty() )
  }

  #[test]
  fn query_closed_world() {
    let mln = schema() ;
    let dbs = Database::parse_str(
      "Smokes(Ann)\n\
      Friends(Ann, Bob)\n",
      & mln, false, false,
    ).expect("parses") ;
    let res = dbs[0].query(
      & mln, "Friends(x, y) ^ Smokes(x)", false
    ).expect("queries") ;
    // Two constants, four groundings.
    assert_eq!( res.len(), 4 ) ;
    let sum: f64 = res.iter().map( |& (_, t)| t ).sum() ;
    assert!( (sum - 1.).abs() < 1e-12 )
  }

  #[test]
  fn union_overwrites() {
    let mln = schema() ;
    let mut a = Database::new() ;
    a.add_evidence( & mln, "Smokes", vec![ sym("Ann") ], 1. ).unwrap() ;
    let mut b = Database::new() ;
    b.add_evidence( & mln, "Smokes", vec![ sym("Ann") ], 0. ).unwrap() ;
    let c = a.union(& b).expect("unions") ;
    assert_eq!( c.evidence.len(), 1 ) ;
    assert_eq!( c.truth_of( "Smokes", & [ sym("Ann") ] ), Some(0.) )
  }
}
