//! Markov Logic Network representation.
//!
//! An MLN bundles a predicate schema, named domains of constants, and
//! weighted template formulas. Templates are expanded against the merged
//! domains of the MLN and some databases by
//! [`materialize`][mat], which produces the ground-ready MLN consumed
//! by the grounders.
//!
//! [mat]: struct.Mln.html#method.materialize
//! (materialize method of Mln)

use common::* ;
use logic::{ Formula, parse } ;

pub mod database ;

pub use self::database::Database ;


/// Kind of a predicate argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
  /// Regular argument.
  Plain,
  /// Mutex argument (`dom!`): exactly one value is true per assignment
  /// of the other arguments.
  Mutex,
  /// Soft mutex argument (`dom?`): at most one value is true.
  SoftMutex,
}

/// A predicate argument: a domain name plus its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
  /// Domain name.
  pub dom: String,
  /// Argument kind.
  pub kind: ArgKind,
}
impl ArgSpec {
  /// Plain argument.
  pub fn plain<S: Into<String>>(dom: S) -> Self {
    ArgSpec { dom: dom.into(), kind: ArgKind::Plain }
  }
  /// Mutex argument.
  pub fn mutex<S: Into<String>>(dom: S) -> Self {
    ArgSpec { dom: dom.into(), kind: ArgKind::Mutex }
  }
  /// Soft mutex argument.
  pub fn soft_mutex<S: Into<String>>(dom: S) -> Self {
    ArgSpec { dom: dom.into(), kind: ArgKind::SoftMutex }
  }
}

/// A predicate: a name and its argument specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
  /// Predicate name.
  pub name: String,
  /// Argument domains.
  pub args: Vec<ArgSpec>,
}
impl Predicate {
  /// Constructor.
  pub fn new<S: Into<String>>(name: S, args: Vec<ArgSpec>) -> Self {
    Predicate { name: name.into(), args }
  }

  /// Position and kind of the mutex argument, if any.
  pub fn block_arg(& self) -> Option<(usize, ArgKind)> {
    for (pos, arg) in self.args.iter().enumerate() {
      if arg.kind != ArgKind::Plain {
        return Some( (pos, arg.kind) )
      }
    }
    None
  }
}
impl MlnWrite for Predicate {
  fn mln_write<W: Write>(& self, w: & mut W) -> IoRes<()> {
    write!(w, "{}(", self.name) ? ;
    for (pos, arg) in self.args.iter().enumerate() {
      if pos > 0 { write!(w, ",") ? }
      write!(w, "{}", arg.dom) ? ;
      match arg.kind {
        ArgKind::Plain => (),
        ArgKind::Mutex => write!(w, "!") ?,
        ArgKind::SoftMutex => write!(w, "?") ?,
      }
    }
    write!(w, ")")
  }
}


/// A weighted template formula.
#[derive(Debug, Clone)]
pub struct TemplateFormula {
  /// The formula.
  pub ast: Formula,
  /// Weight. Only meaningful when the formula is not hard.
  pub weight: f64,
  /// Hard constraint flag.
  pub hard: bool,
  /// Fixed-weight flag: learning leaves this weight untouched.
  pub fixed: bool,
}


/// A Markov Logic Network.
#[derive(Debug, Clone)]
pub struct Mln {
  /// Fuzzy semantics flag.
  pub fuzzy: bool,
  /// Named domains, ordered lists of interned constants.
  domains: HashMap< String, Vec<Sym> >,
  /// Predicates.
  preds: PrdMap<Predicate>,
  /// Map from predicate names to their index.
  pred_idx: HashMap<String, PrdIdx>,
  /// Template formulas.
  pub formulas: FmlMap<TemplateFormula>,
  /// Closed-world predicates.
  cw_preds: HashSet<String>,
}

impl Mln {

  /// Empty MLN.
  pub fn new(fuzzy: bool) -> Self {
    Mln {
      fuzzy,
      domains: HashMap::new(),
      preds: PrdMap::new(),
      pred_idx: HashMap::new(),
      formulas: FmlMap::new(),
      cw_preds: HashSet::new(),
    }
  }

  /// Adds a constant to a domain, creating the domain if needed.
  ///
  /// Keeps insertion order and ignores duplicates.
  pub fn add_constant<S: Into<String>>(& mut self, dom: S, cst: Sym) {
    let dom = self.domains.entry( dom.into() ).or_insert_with(Vec::new) ;
    if ! dom.contains(& cst) {
      dom.push(cst)
    }
  }

  /// The constants of a domain.
  pub fn domain(& self, name: & str) -> Option<& Vec<Sym>> {
    self.domains.get(name)
  }

  /// Iterator over the domains, in name order.
  pub fn domains(& self) -> Vec< (& String, & Vec<Sym>) > {
    let mut res: Vec<_> = self.domains.iter().collect() ;
    res.sort_by_key( |& (name, _)| name ) ;
    res
  }

  /// Declares a predicate.
  ///
  /// At most one argument position may carry a mutex or soft mutex
  /// marker.
  pub fn declare_pred(& mut self, pred: Predicate) -> Res<PrdIdx> {
    if self.pred_idx.contains_key(& pred.name) {
      bail!( "predicate `{}` is declared twice", pred.name )
    }
    let blocks = pred.args.iter().filter(
      |arg| arg.kind != ArgKind::Plain
    ).count() ;
    if blocks > 1 {
      bail!(
        "predicate `{}` has {} mutex argument positions, at most one is \
        supported", pred.name, blocks
      )
    }
    for arg in & pred.args {
      self.domains.entry( arg.dom.clone() ).or_insert_with(Vec::new) ;
    }
    let name = pred.name.clone() ;
    let idx = self.preds.push(pred) ;
    self.pred_idx.insert(name, idx) ;
    Ok(idx)
  }

  /// Predicate of a name.
  pub fn pred_of_name(& self, name: & str) -> Option<& Predicate> {
    self.pred_idx.get(name).map( |idx| & self.preds[* idx] )
  }
  /// Index of a predicate.
  pub fn pred_idx(& self, name: & str) -> Option<PrdIdx> {
    self.pred_idx.get(name).cloned()
  }
  /// The predicates.
  pub fn preds(& self) -> & PrdMap<Predicate> {
    & self.preds
  }

  /// Adds a soft template formula.
  pub fn add_formula(& mut self, ast: Formula, weight: f64) -> FmlIdx {
    self.formulas.push(
      TemplateFormula { ast, weight, hard: false, fixed: false }
    )
  }
  /// Adds a soft template formula with a fixed weight.
  pub fn add_fixed_formula(& mut self, ast: Formula, weight: f64) -> FmlIdx {
    self.formulas.push(
      TemplateFormula { ast, weight, hard: false, fixed: true }
    )
  }
  /// Adds a hard template formula.
  pub fn add_hard_formula(& mut self, ast: Formula) -> FmlIdx {
    self.formulas.push(
      TemplateFormula { ast, weight: 0., hard: true, fixed: true }
    )
  }

  /// Current weight vector.
  pub fn weights(& self) -> FmlMap<f64> {
    self.formulas.iter().map( |f| f.weight ).collect::< Vec<_> >().into()
  }
  /// Overwrites the weights of the non-hard formulas.
  pub fn set_weights(& mut self, weights: & FmlMap<f64>) {
    for (idx, fml) in self.formulas.iter_mut().enumerate() {
      if ! fml.hard {
        fml.weight = weights[ FmlIdx::new(idx) ]
      }
    }
  }

  /// Marks predicates as closed-world.
  pub fn set_cw_preds<S: Into<String>, I: IntoIterator<Item = S>>(
    & mut self, preds: I
  ) -> Res<()> {
    for pred in preds {
      let pred = pred.into() ;
      if ! self.pred_idx.contains_key(& pred) {
        bail!( ErrorKind::NoSuchPredicate(pred) )
      }
      self.cw_preds.insert(pred) ;
    }
    Ok(())
  }
  /// True if a predicate is closed-world.
  pub fn is_cw(& self, pred: & str) -> bool {
    self.cw_preds.contains(pred)
  }

  /// Expands the template formulas against the merged domains of the MLN
  /// and the databases.
  ///
  /// The returned MLN shares the predicate schema, carries the merged
  /// domains, and replaces every template formula by its variants with
  /// inherited weights. Duplicate variants are merged by summing weights.
  /// Formulas over empty domains are dropped with a warning.
  pub fn materialize(& self, dbs: & [Database]) -> Res<Mln> {
    let mut res = self.clone() ;
    res.formulas = FmlMap::new() ;

    for db in dbs {
      for (dom, csts) in db.domains() {
        for cst in csts {
          res.add_constant( dom.clone(), cst.clone() )
        }
      }
    }

    for template in & self.formulas {
      let doms = template.ast.variables(& res) ? ;
      let mut empty = None ;
      for (_, dom) in & doms {
        if res.domain(dom).map( |d| d.is_empty() ).unwrap_or(true) {
          empty = Some( dom.clone() )
        }
      }
      if let Some(dom) = empty {
        log_warn!(
          "skipping formula `{}`: domain `{}` is empty",
          template.ast, dom
        ) ;
        continue
      }

      for variant in template.ast.template_variants(& res) ? {
        // Merge duplicate expansions by summing weights.
        let mut merged = false ;
        for prev in res.formulas.iter_mut() {
          if prev.ast == variant {
            if ! prev.hard && ! template.hard {
              prev.weight += template.weight
            } else {
              prev.hard = true
            }
            merged = true ;
            break
          }
        }
        if ! merged {
          res.formulas.push(
            TemplateFormula {
              ast: variant,
              weight: template.weight,
              hard: template.hard,
              fixed: template.fixed,
            }
          ) ;
        }
      }
    }

    Ok(res)
  }

  /// Parses an MLN from its textual form.
  pub fn parse_str(text: & str, prac: bool, fuzzy: bool) -> Res<Mln> {
    let mut mln = Mln::new(fuzzy) ;
    let text = strip_block_comments(text) ;

    for line in text.lines() {
      let line = match line.find("//") {
        Some(pos) => & line[..pos],
        None => line,
      }.trim() ;
      if line.is_empty() { continue }

      // Domain declaration `dom = {c1, c2}`.
      if let Some(eq_pos) = line.find('=') {
        let rhs = line[eq_pos + 1..].trim() ;
        if rhs.starts_with('{') && rhs.ends_with('}') {
          let name = line[..eq_pos].trim() ;
          if name.is_empty() {
            bail!( "domain declaration with an empty name: `{}`", line )
          }
          for cst in rhs[1..rhs.len() - 1].split(',') {
            let cst = cst.trim() ;
            if ! cst.is_empty() {
              mln.add_constant( name, sym(cst) )
            }
          }
          continue
        }
      }

      // Weighted formula `weight  formula`.
      if let Some( (weight, rest) ) = split_weight(line) {
        let ast = parse::parse_formula(rest, prac).chain_err(
          || format!("while parsing formula `{}`", rest)
        ) ? ;
        mln.add_formula(ast, weight) ;
        continue
      }

      // Hard formula `formula.`
      if line.ends_with('.') {
        let rest = & line[..line.len() - 1] ;
        let ast = parse::parse_formula(rest, prac).chain_err(
          || format!("while parsing formula `{}`", rest)
        ) ? ;
        mln.add_hard_formula(ast) ;
        continue
      }

      // Otherwise, a predicate declaration `pred(dom1, dom2!)`.
      let pred = parse_pred_decl(line).chain_err(
        || format!("while parsing predicate declaration `{}`", line)
      ) ? ;
      mln.declare_pred(pred) ? ;
    }

    Ok(mln)
  }
}

impl MlnWrite for Mln {
  fn mln_write<W: Write>(& self, w: & mut W) -> IoRes<()> {
    for (name, csts) in self.domains() {
      if csts.is_empty() { continue }
      write!(w, "{} = {{", name) ? ;
      for (idx, cst) in csts.iter().enumerate() {
        if idx > 0 { write!(w, ", ") ? }
        write!(w, "{}", cst.get()) ?
      }
      writeln!(w, "}}") ?
    }
    for pred in & self.preds {
      pred.mln_write(w) ? ;
      writeln!(w, "") ?
    }
    for fml in & self.formulas {
      if fml.hard {
        writeln!(w, "{}.", fml.ast) ?
      } else {
        writeln!(w, "{:<8} {}", fml.weight, fml.ast) ?
      }
    }
    Ok(())
  }
}


/// Splits a leading weight off a formula line, if any.
fn split_weight(line: & str) -> Option<(f64, & str)> {
  use std::str::FromStr ;
  let split = line.find( |c: char| c.is_whitespace() ) ? ;
  let (head, rest) = line.split_at(split) ;
  match f64::from_str(head) {
    Ok(weight) => Some( (weight, rest.trim()) ),
    Err(_) => None,
  }
}

/// Parses a predicate declaration `pred(dom1, dom2!, dom3?)`.
fn parse_pred_decl(line: & str) -> Res<Predicate> {
  let open = line.find('(').ok_or_else(
    || format!("expected `(` in `{}`", line)
  ) ? ;
  if ! line.ends_with(')') {
    bail!( "expected trailing `)` in `{}`", line )
  }
  let name = line[..open].trim() ;
  if name.is_empty() || ! name.chars().all(
    |c| c.is_alphanumeric() || c == '_' || c == '-'
  ) {
    bail!( "illegal predicate name `{}`", name )
  }
  let mut args = Vec::new() ;
  for arg in line[open + 1..line.len() - 1].split(',') {
    let arg = arg.trim() ;
    let (dom, kind) = if arg.ends_with('!') {
      ( & arg[..arg.len() - 1], ArgKind::Mutex )
    } else if arg.ends_with('?') {
      ( & arg[..arg.len() - 1], ArgKind::SoftMutex )
    } else {
      ( arg, ArgKind::Plain )
    } ;
    if dom.is_empty() || ! dom.chars().all(
      |c| c.is_alphanumeric() || c == '_' || c == '-'
    ) {
      bail!( "illegal domain name `{}`", dom )
    }
    args.push( ArgSpec { dom: dom.to_string(), kind } )
  }
  Ok( Predicate::new(name, args) )
}

/// Removes `/* ... */` comments.
fn strip_block_comments(text: & str) -> String {
  let mut res = String::with_capacity( text.len() ) ;
  let mut rest = text ;
  while let Some(start) = rest.find("/*") {
    res.push_str( & rest[..start] ) ;
    match rest[start + 2..].find("*/") {
      Some(end) => rest = & rest[start + 2 + end + 2..],
      None => return res,
    }
  }
  res.push_str(rest) ;
  res
}


#[cfg(test)]
mod test {
  use super::* ;

  static SMOKERS: & str = "\
    // The classic smokers example.\n\
    person = {Ann, Bob}\n\
    Smokes(person)\n\
    Cancer(person)\n\
    Friends(person, person)\n\
    1.5      Smokes(x) => Cancer(x)\n\
    1.1      Friends(x,y) ^ Smokes(x) => Smokes(y)\n\
  " ;

  #[test]
  fn parse_smokers() {
    let mln = Mln::parse_str(SMOKERS, false, false).expect("parses") ;
    assert_eq!( mln.preds().len(), 3 ) ;
    assert_eq!( mln.formulas.len(), 2 ) ;
    assert_eq!(
      mln.domain("person").map(|d| d.len()), Some(2)
    ) ;
    assert!( ! mln.formulas[ FmlIdx::new(0) ].hard )
  }

  #[test]
  fn parse_hard_and_mutex() {
    let mln = Mln::parse_str(
      "obj = {O}\n\
      color = {Red, Green}\n\
      Color(obj, color!)\n\
      Color(x, Red) v Color(x, Green).\n",
      false, false,
    ).expect("parses") ;
    let pred = mln.pred_of_name("Color").expect("declared") ;
    assert_eq!( pred.block_arg(), Some( (1, ArgKind::Mutex) ) ) ;
    assert!( mln.formulas[ FmlIdx::new(0) ].hard )
  }

  #[test]
  fn write_parse_round_trip() {
    let mln = Mln::parse_str(SMOKERS, false, false).expect("parses") ;
    let written = mln.mln_string() ;
    let re = Mln::parse_str(& written, false, false).expect("re-parses") ;
    assert_eq!( mln.preds().len(), re.preds().len() ) ;
    assert_eq!( mln.formulas.len(), re.formulas.len() ) ;
    for (f, g) in mln.formulas.iter().zip( re.formulas.iter() ) {
      assert_eq!( f.ast, g.ast ) ;
      assert_eq!( f.weight, g.weight )
    }
  }

  #[test]
  fn materialize_merges_duplicates() {
    let mut mln = Mln::parse_str(
      "topic = {T1, T2}\n\
      Topic(topic)\n",
      false, false,
    ).expect("parses") ;
    let f = ::logic::parse::parse_formula("Topic(+t)", false).expect(
      "parses"
    ) ;
    mln.add_formula(f.clone(), 0.5) ;
    mln.add_formula(f, 0.25) ;
    let ground = mln.materialize(& []).expect("materializes") ;
    // Two variants per template, merged pairwise: T1 and T2.
    assert_eq!( ground.formulas.len(), 2 ) ;
    for fml in & ground.formulas {
      assert!( (fml.weight - 0.75).abs() < 1e-12 )
    }
  }
}
