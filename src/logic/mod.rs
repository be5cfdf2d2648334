//! Formula representation and semantics.
//!
//! Formulas are a tagged-variant tree. The same tree supports the classical
//! `{0,1}` semantics and the fuzzy `[0,1]` semantics: conjunction is `min`,
//! disjunction is `max`, negation is `1 - x` and implication is
//! `max(1 - a, b)`, which collapse to the usual boolean connectives on
//! `{0,1}` worlds.
//!
//! A formula is *ground* when it contains no `Lit`, `Eq` or `Exist` node:
//! literals have been canonicalized to [`GndLit`][gndlit] nodes carrying an
//! atom index into the MRF's atom table, and equalities have been folded to
//! truth constants.
//!
//! [gndlit]: enum.Formula.html#variant.GndLit
//! (GndLit variant of the Formula enum)

use common::* ;
use mln::Mln ;
use mrf::Mrf ;

pub mod parse ;
pub mod cnf ;


/// A term: a variable or an interned constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
  /// A variable. The flag is true for template variables (`+?x`), which
  /// are expanded over their domain at materialization time.
  Var(String, bool),
  /// An interned constant.
  Cst(Sym),
}
impl Term {
  /// The variable name, if any.
  pub fn var(& self) -> Option<& str> {
    match * self {
      Term::Var(ref name, _) => Some(name),
      Term::Cst(_) => None,
    }
  }
  /// True if the term is a template variable.
  pub fn is_template(& self) -> bool {
    match * self {
      Term::Var(_, tmpl) => tmpl,
      Term::Cst(_) => false,
    }
  }
  /// Applies an assignment.
  pub fn subst(& self, assig: & Assignment) -> Term {
    match * self {
      Term::Var(ref name, tmpl) => if let Some(cst) = assig.get(name) {
        Term::Cst( cst.clone() )
      } else {
        Term::Var( name.clone(), tmpl )
      },
      Term::Cst(ref cst) => Term::Cst( cst.clone() ),
    }
  }
}
impl_fmt!{
  Term(self, fmt) {
    match * self {
      Term::Var(ref name, false) => write!(fmt, "{}", name),
      Term::Var(ref name, true) => write!(fmt, "+{}", name),
      Term::Cst(ref cst) => write!(fmt, "{}", cst.get()),
    }
  }
}


/// A formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
  /// A literal over a predicate, possibly with free variables.
  Lit {
    /// Negation flag.
    neg: bool,
    /// Both-polarities template flag (`*P(x)`).
    star: bool,
    /// Predicate name.
    pred: String,
    /// Arguments.
    args: Vec<Term>,
  },
  /// A ground literal, canonicalized through the MRF's atom table.
  GndLit {
    /// Negation flag.
    neg: bool,
    /// Ground atom index.
    atom: AtomIdx,
  },
  /// An equality between two terms.
  Eq {
    /// True for inequality.
    neg: bool,
    /// Left-hand side.
    lhs: Term,
    /// Right-hand side.
    rhs: Term,
  },
  /// Conjunction.
  Conj( Vec<Formula> ),
  /// Disjunction.
  Disj( Vec<Formula> ),
  /// Negation.
  Neg( Box<Formula> ),
  /// Implication.
  Impl( Box<Formula>, Box<Formula> ),
  /// Biimplication.
  Biimpl( Box<Formula>, Box<Formula> ),
  /// Existential quantification.
  Exist( Vec<String>, Box<Formula> ),
  /// Truth constant.
  TrueFalse(f64),
}

impl Formula {

  /// Constructor for a positive literal.
  pub fn lit<S: Into<String>>(pred: S, args: Vec<Term>) -> Self {
    Formula::Lit { neg: false, star: false, pred: pred.into(), args }
  }
  /// Constructor for a negated literal.
  pub fn nlit<S: Into<String>>(pred: S, args: Vec<Term>) -> Self {
    Formula::Lit { neg: true, star: false, pred: pred.into(), args }
  }

  /// True if the formula is a truth constant.
  pub fn is_true_false(& self) -> bool {
    match * self {
      Formula::TrueFalse(_) => true,
      _ => false,
    }
  }

  /// True if the formula is a literal (`Lit`, `GndLit`, `Eq` or a truth
  /// constant).
  pub fn is_literal(& self) -> bool {
    match * self {
      Formula::Lit { .. } |
      Formula::GndLit { .. } |
      Formula::Eq { .. } |
      Formula::TrueFalse(_) => true,
      _ => false,
    }
  }

  /// True if the formula is a literal or a conjunction of literals.
  pub fn is_lit_conj(& self) -> bool {
    match * self {
      Formula::Conj(ref kids) => kids.iter().all(
        |kid| kid.is_literal()
      ),
      ref slf => slf.is_literal(),
    }
  }

  /// True if the formula is a literal or a disjunction of literals.
  pub fn is_clause(& self) -> bool {
    match * self {
      Formula::Disj(ref kids) => kids.iter().all(
        |kid| kid.is_literal()
      ),
      ref slf => slf.is_literal(),
    }
  }

  /// Iterator over the literal leaves of the formula.
  pub fn literals(& self) -> Vec<& Formula> {
    let mut res = Vec::new() ;
    let mut stack = vec![self] ;
    while let Some(f) = stack.pop() {
      match * f {
        Formula::Conj(ref kids) |
        Formula::Disj(ref kids) => for kid in kids {
          stack.push(kid)
        },
        Formula::Neg(ref kid) => stack.push(kid),
        Formula::Impl(ref lhs, ref rhs) |
        Formula::Biimpl(ref lhs, ref rhs) => {
          stack.push(lhs) ;
          stack.push(rhs)
        },
        Formula::Exist(_, ref kid) => stack.push(kid),
        ref leaf => res.push(leaf),
      }
    }
    res.reverse() ;
    res
  }

  /// Collects the ground atom indices appearing in the formula.
  pub fn atom_indices(& self, set: & mut AtomSet) {
    for lit in self.literals() {
      if let Formula::GndLit { atom, .. } = * lit {
        set.insert(atom) ;
      }
    }
  }

  /// Truth value in a complete world.
  ///
  /// Only legal on ground formulas.
  pub fn truth(& self, world: & [f64]) -> f64 {
    match * self {
      Formula::GndLit { neg, atom } => {
        let t = world[* atom] ;
        if neg { 1. - t } else { t }
      },
      Formula::Conj(ref kids) => {
        let mut min = 1f64 ;
        for kid in kids {
          let t = kid.truth(world) ;
          if t < min { min = t }
        }
        min
      },
      Formula::Disj(ref kids) => {
        let mut max = 0f64 ;
        for kid in kids {
          let t = kid.truth(world) ;
          if t > max { max = t }
        }
        max
      },
      Formula::Neg(ref kid) => 1. - kid.truth(world),
      Formula::Impl(ref lhs, ref rhs) => {
        let (a, b) = ( lhs.truth(world), rhs.truth(world) ) ;
        (1. - a).max(b)
      },
      Formula::Biimpl(ref lhs, ref rhs) => {
        let (a, b) = ( lhs.truth(world), rhs.truth(world) ) ;
        ( (1. - a).max(b) ).min( (1. - b).max(a) )
      },
      Formula::TrueFalse(t) => t,
      Formula::Lit { .. } |
      Formula::Eq { .. } |
      Formula::Exist(..) => panic!(
        "truth evaluation of a non-ground formula"
      ),
    }
  }

  /// Truth value under a partial world. `None` iff some atom in the
  /// support is unknown and the known atoms do not determine the result.
  ///
  /// Only legal on ground formulas.
  pub fn truth_under(& self, ev: & [ Option<f64> ]) -> Option<f64> {
    match * self {
      Formula::GndLit { neg, atom } => ev[* atom].map(
        |t| if neg { 1. - t } else { t }
      ),
      Formula::Conj(ref kids) => {
        let mut min = Some(1f64) ;
        for kid in kids {
          match kid.truth_under(ev) {
            Some(t) => if t == 0. {
              return Some(0.)
            } else if let Some(m) = min {
              if t < m { min = Some(t) }
            },
            None => min = None,
          }
        }
        min
      },
      Formula::Disj(ref kids) => {
        let mut max = Some(0f64) ;
        for kid in kids {
          match kid.truth_under(ev) {
            Some(t) => if t == 1. {
              return Some(1.)
            } else if let Some(m) = max {
              if t > m { max = Some(t) }
            },
            None => max = None,
          }
        }
        max
      },
      Formula::Neg(ref kid) => kid.truth_under(ev).map(|t| 1. - t),
      Formula::Impl(ref lhs, ref rhs) => match (
        lhs.truth_under(ev), rhs.truth_under(ev)
      ) {
        (Some(a), Some(b)) => Some( (1. - a).max(b) ),
        (Some(a), None) if a == 0. => Some(1.),
        (None, Some(b)) if b == 1. => Some(1.),
        _ => None,
      },
      Formula::Biimpl(ref lhs, ref rhs) => match (
        lhs.truth_under(ev), rhs.truth_under(ev)
      ) {
        (Some(a), Some(b)) => Some(
          ( (1. - a).max(b) ).min( (1. - b).max(a) )
        ),
        _ => None,
      },
      Formula::TrueFalse(t) => Some(t),
      Formula::Lit { .. } |
      Formula::Eq { .. } |
      Formula::Exist(..) => panic!(
        "truth evaluation of a non-ground formula"
      ),
    }
  }

  /// Free variables of the formula mapped to their domain names.
  ///
  /// Fails when a variable is used with conflicting domains, or when a
  /// variable appears only in (in)equality constraints so that no domain
  /// can be attached to it.
  pub fn variables(& self, mln: & Mln) -> Res< BTreeMap<String, String> > {
    let mut map = BTreeMap::new() ;
    let mut eq_vars = HashSet::new() ;
    self.vars_aux(mln, & mut map, & mut eq_vars, & mut HashSet::new()) ? ;
    for var in eq_vars {
      if ! map.contains_key(& var) {
        bail!(
          "variable `{}` appears only in equality constraints, \
          cannot determine its domain", var
        )
      }
    }
    Ok(map)
  }

  fn vars_aux(
    & self, mln: & Mln,
    map: & mut BTreeMap<String, String>,
    eq_vars: & mut HashSet<String>,
    bound: & mut HashSet<String>,
  ) -> Res<()> {
    match * self {
      Formula::Lit { ref pred, ref args, .. } => {
        let pred = mln.pred_of_name(pred).ok_or_else(
          || ErrorKind::NoSuchPredicate( pred.clone() )
        ) ? ;
        if args.len() != pred.args.len() {
          bail!(
            "predicate `{}` applied to {} arguments, expected {}",
            pred.name, args.len(), pred.args.len()
          )
        }
        for (arg, spec) in args.iter().zip( pred.args.iter() ) {
          if let Term::Var(ref name, _) = * arg {
            if bound.contains(name) { continue }
            if let Some(prev) = map.insert(
              name.clone(), spec.dom.clone()
            ) {
              if prev != spec.dom {
                bail!(
                  "variable `{}` used with conflicting domains \
                  `{}` and `{}`", name, prev, spec.dom
                )
              }
            }
          }
        }
      },
      Formula::Eq { ref lhs, ref rhs, .. } => {
        for term in [lhs, rhs].iter() {
          if let Some(var) = term.var() {
            if ! bound.contains(var) {
              eq_vars.insert( var.to_string() ) ;
            }
          }
        }
      },
      Formula::GndLit { .. } |
      Formula::TrueFalse(_) => (),
      Formula::Conj(ref kids) |
      Formula::Disj(ref kids) => for kid in kids {
        kid.vars_aux(mln, map, eq_vars, bound) ?
      },
      Formula::Neg(ref kid) => kid.vars_aux(mln, map, eq_vars, bound) ?,
      Formula::Impl(ref lhs, ref rhs) |
      Formula::Biimpl(ref lhs, ref rhs) => {
        lhs.vars_aux(mln, map, eq_vars, bound) ? ;
        rhs.vars_aux(mln, map, eq_vars, bound) ?
      },
      Formula::Exist(ref vars, ref kid) => {
        let news: Vec<_> = vars.iter().filter(
          |var| bound.insert( (* var).clone() )
        ).cloned().collect() ;
        kid.vars_aux(mln, map, eq_vars, bound) ? ;
        for var in news {
          bound.remove(& var) ;
        }
      },
    }
    Ok(())
  }

  /// Variables bound by quantifiers together with their domains, so that
  /// grounding can expand them.
  fn bound_var_domains(
    & self, mln: & Mln, vars: & [String]
  ) -> Res< Vec<(String, String)> > {
    // Domains are read off the literals under the quantifier.
    let mut map = BTreeMap::new() ;
    let mut eq_vars = HashSet::new() ;
    self.vars_aux(mln, & mut map, & mut eq_vars, & mut HashSet::new()) ? ;
    let mut res = Vec::with_capacity( vars.len() ) ;
    for var in vars {
      if let Some(dom) = map.get(var) {
        res.push( (var.clone(), dom.clone()) )
      } else {
        bail!(
          "cannot determine the domain of quantified variable `{}`", var
        )
      }
    }
    Ok(res)
  }

  /// Applies an assignment to the formula's variables, without
  /// canonicalizing literals.
  pub fn subst(& self, assig: & Assignment) -> Formula {
    match * self {
      Formula::Lit { neg, star, ref pred, ref args } => Formula::Lit {
        neg, star, pred: pred.clone(),
        args: args.iter().map(|arg| arg.subst(assig)).collect(),
      },
      Formula::GndLit { neg, atom } => Formula::GndLit { neg, atom },
      Formula::Eq { neg, ref lhs, ref rhs } => Formula::Eq {
        neg, lhs: lhs.subst(assig), rhs: rhs.subst(assig),
      },
      Formula::Conj(ref kids) => Formula::Conj(
        kids.iter().map(|kid| kid.subst(assig)).collect()
      ),
      Formula::Disj(ref kids) => Formula::Disj(
        kids.iter().map(|kid| kid.subst(assig)).collect()
      ),
      Formula::Neg(ref kid) => Formula::Neg(
        Box::new( kid.subst(assig) )
      ),
      Formula::Impl(ref lhs, ref rhs) => Formula::Impl(
        Box::new( lhs.subst(assig) ), Box::new( rhs.subst(assig) )
      ),
      Formula::Biimpl(ref lhs, ref rhs) => Formula::Biimpl(
        Box::new( lhs.subst(assig) ), Box::new( rhs.subst(assig) )
      ),
      Formula::Exist(ref vars, ref kid) => {
        // Bound variables shadow the assignment.
        let mut inner = assig.clone() ;
        for var in vars {
          inner.remove(var) ;
        }
        Formula::Exist(
          vars.clone(), Box::new( kid.subst(& inner) )
        )
      },
      Formula::TrueFalse(t) => Formula::TrueFalse(t),
    }
  }

  /// Grounds the formula against an assignment, canonicalizing literals
  /// through the MRF's atom table.
  ///
  /// With `partial`, literals with remaining free variables are kept as
  /// they are; otherwise they are an error. Existential quantifiers are
  /// expanded to disjunctions over the bound variables' domains.
  pub fn ground(
    & self, mrf: & Mrf, assig: & Assignment, partial: bool
  ) -> Res<Formula> {
    match * self {
      Formula::Lit { neg, star, ref pred, ref args } => {
        let mut csts = Some( Vec::with_capacity( args.len() ) ) ;
        let args: Vec<_> = args.iter().map(
          |arg| arg.subst(assig)
        ).collect() ;
        for arg in & args {
          match * arg {
            Term::Cst(ref cst) => if let Some(csts) = csts.as_mut() {
              csts.push( cst.clone() )
            },
            Term::Var(..) => csts = None,
          }
        }
        if let Some(csts) = csts {
          let atom = mrf.atom_index(pred, & csts) ? ;
          Ok( Formula::GndLit { neg, atom } )
        } else if partial {
          Ok( Formula::Lit { neg, star, pred: pred.clone(), args } )
        } else {
          bail!(
            "grounding left free variables in literal `{}({})`",
            pred,
            args.iter().map(
              |a| format!("{}", a)
            ).collect::< Vec<_> >().join(",")
          )
        }
      },
      Formula::GndLit { neg, atom } => Ok( Formula::GndLit { neg, atom } ),
      Formula::Eq { neg, ref lhs, ref rhs } => {
        let (lhs, rhs) = ( lhs.subst(assig), rhs.subst(assig) ) ;
        match (& lhs, & rhs) {
          (& Term::Cst(ref l), & Term::Cst(ref r)) => {
            let eq = l == r ;
            Ok( Formula::TrueFalse(
              if eq != neg { 1. } else { 0. }
            ) )
          },
          _ => if partial {
            Ok( Formula::Eq { neg, lhs, rhs } )
          } else {
            bail!("grounding left free variables in equality constraint")
          },
        }
      },
      Formula::Conj(ref kids) => {
        let mut res = Vec::with_capacity( kids.len() ) ;
        for kid in kids {
          res.push( kid.ground(mrf, assig, partial) ? )
        }
        Ok( Formula::Conj(res) )
      },
      Formula::Disj(ref kids) => {
        let mut res = Vec::with_capacity( kids.len() ) ;
        for kid in kids {
          res.push( kid.ground(mrf, assig, partial) ? )
        }
        Ok( Formula::Disj(res) )
      },
      Formula::Neg(ref kid) => Ok( Formula::Neg(
        Box::new( kid.ground(mrf, assig, partial) ? )
      ) ),
      Formula::Impl(ref lhs, ref rhs) => Ok( Formula::Impl(
        Box::new( lhs.ground(mrf, assig, partial) ? ),
        Box::new( rhs.ground(mrf, assig, partial) ? ),
      ) ),
      Formula::Biimpl(ref lhs, ref rhs) => Ok( Formula::Biimpl(
        Box::new( lhs.ground(mrf, assig, partial) ? ),
        Box::new( rhs.ground(mrf, assig, partial) ? ),
      ) ),
      Formula::Exist(ref vars, ref kid) => {
        let doms = kid.bound_var_domains( mrf.mln(), vars ) ? ;
        let mut inner = assig.clone() ;
        let mut disjuncts = Vec::new() ;
        expand_exist(
          mrf, kid, & doms, 0, & mut inner, partial, & mut disjuncts
        ) ? ;
        Ok( Formula::Disj(disjuncts) )
      },
      Formula::TrueFalse(t) => Ok( Formula::TrueFalse(t) ),
    }
  }

  /// Simplifies the formula under the MRF's evidence: ground literals
  /// whose truth is fixed collapse to truth constants, and determined
  /// subtrees fold away. A fully determined formula becomes a single
  /// `TrueFalse` leaf.
  pub fn simplified(& self, mrf: & Mrf) -> Formula {
    match * self {
      Formula::GndLit { neg, atom } => match mrf.evidence_of(atom) {
        Some(t) => Formula::TrueFalse( if neg { 1. - t } else { t } ),
        None => Formula::GndLit { neg, atom },
      },
      Formula::Conj(ref kids) => {
        let mut res = Vec::with_capacity( kids.len() ) ;
        let mut cst = 1f64 ;
        for kid in kids {
          match kid.simplified(mrf) {
            Formula::TrueFalse(t) => if t == 0. {
              return Formula::TrueFalse(0.)
            } else if t < cst {
              cst = t
            },
            kid => res.push(kid),
          }
        }
        if res.is_empty() {
          Formula::TrueFalse(cst)
        } else if cst < 1. {
          res.push( Formula::TrueFalse(cst) ) ;
          Formula::Conj(res)
        } else if res.len() == 1 {
          res.pop().expect("res has exactly one element")
        } else {
          Formula::Conj(res)
        }
      },
      Formula::Disj(ref kids) => {
        let mut res = Vec::with_capacity( kids.len() ) ;
        let mut cst = 0f64 ;
        for kid in kids {
          match kid.simplified(mrf) {
            Formula::TrueFalse(t) => if t == 1. {
              return Formula::TrueFalse(1.)
            } else if t > cst {
              cst = t
            },
            kid => res.push(kid),
          }
        }
        if res.is_empty() {
          Formula::TrueFalse(cst)
        } else if cst > 0. {
          res.push( Formula::TrueFalse(cst) ) ;
          Formula::Disj(res)
        } else if res.len() == 1 {
          res.pop().expect("res has exactly one element")
        } else {
          Formula::Disj(res)
        }
      },
      Formula::Neg(ref kid) => match kid.simplified(mrf) {
        Formula::TrueFalse(t) => Formula::TrueFalse(1. - t),
        kid => Formula::Neg( Box::new(kid) ),
      },
      Formula::Impl(ref lhs, ref rhs) => {
        let (lhs, rhs) = ( lhs.simplified(mrf), rhs.simplified(mrf) ) ;
        match (& lhs, & rhs) {
          (& Formula::TrueFalse(a), & Formula::TrueFalse(b)) =>
            return Formula::TrueFalse( (1. - a).max(b) ),
          (& Formula::TrueFalse(a), _) => if a == 0. {
            return Formula::TrueFalse(1.)
          } else if a == 1. {
            return rhs
          },
          (_, & Formula::TrueFalse(b)) => if b == 1. {
            return Formula::TrueFalse(1.)
          } else if b == 0. {
            return Formula::Neg( Box::new(lhs) ).simplified(mrf)
          },
          _ => (),
        }
        Formula::Impl( Box::new(lhs), Box::new(rhs) )
      },
      Formula::Biimpl(ref lhs, ref rhs) => {
        let (lhs, rhs) = ( lhs.simplified(mrf), rhs.simplified(mrf) ) ;
        match (& lhs, & rhs) {
          (& Formula::TrueFalse(a), & Formula::TrueFalse(b)) =>
            return Formula::TrueFalse(
              ( (1. - a).max(b) ).min( (1. - b).max(a) )
            ),
          (& Formula::TrueFalse(a), _) => if a == 1. {
            return rhs
          } else if a == 0. {
            return Formula::Neg( Box::new(rhs) ).simplified(mrf)
          },
          (_, & Formula::TrueFalse(b)) => if b == 1. {
            return lhs
          } else if b == 0. {
            return Formula::Neg( Box::new(lhs) ).simplified(mrf)
          },
          _ => (),
        }
        Formula::Biimpl( Box::new(lhs), Box::new(rhs) )
      },
      ref slf => slf.clone(),
    }
  }

  /// Expands template variables (`+?x`) and both-polarities literals
  /// (`*P(x)`) against the MLN's domains. Every returned variant is free
  /// of template markers.
  pub fn template_variants(& self, mln: & Mln) -> Res< Vec<Formula> > {
    let doms = self.variables(mln) ? ;

    // Template variables, in a deterministic order.
    let mut tmpl_vars = Vec::new() ;
    for lit in self.literals() {
      if let Formula::Lit { ref args, .. } = * lit {
        for arg in args {
          if let Term::Var(ref name, true) = * arg {
            if ! tmpl_vars.iter().any(|(n, _): & (String, _)| n == name) {
              let dom = doms.get(name).ok_or_else(
                || format!(
                  "cannot determine the domain of template variable `{}`",
                  name
                )
              ) ? ;
              tmpl_vars.push( (name.clone(), dom.clone()) )
            }
          }
        }
      }
    }

    let mut variants = vec![ self.clone() ] ;
    for (name, dom) in tmpl_vars {
      let csts = mln.domain(& dom).ok_or_else(
        || format!("unknown domain `{}`", dom)
      ) ? ;
      let mut next = Vec::with_capacity( variants.len() * csts.len() ) ;
      for variant in & variants {
        for cst in csts {
          let mut assig = Assignment::new() ;
          assig.insert( name.clone(), cst.clone() ) ;
          next.push( variant.subst(& assig) )
        }
      }
      variants = next
    }

    // `*` literals expand to both polarities.
    let mut res = Vec::with_capacity( variants.len() ) ;
    for variant in variants {
      expand_stars(variant, & mut res)
    }
    Ok(res)
  }
}


/// Expands the first `*` literal of a formula to both polarities,
/// recursively.
fn expand_stars(f: Formula, res: & mut Vec<Formula>) {
  fn fix_first(f: & Formula, neg: bool) -> Option<Formula> {
    match * f {
      Formula::Lit { star: true, ref pred, ref args, .. } => Some(
        Formula::Lit {
          neg, star: false, pred: pred.clone(), args: args.clone()
        }
      ),
      Formula::Conj(ref kids) => fix_first_in(kids, neg).map(Formula::Conj),
      Formula::Disj(ref kids) => fix_first_in(kids, neg).map(Formula::Disj),
      Formula::Neg(ref kid) => fix_first(kid, neg).map(
        |kid| Formula::Neg( Box::new(kid) )
      ),
      Formula::Impl(ref lhs, ref rhs) => if let Some(lhs) = fix_first(
        lhs, neg
      ) {
        Some( Formula::Impl( Box::new(lhs), rhs.clone() ) )
      } else {
        fix_first(rhs, neg).map(
          |rhs| Formula::Impl( lhs.clone(), Box::new(rhs) )
        )
      },
      Formula::Biimpl(ref lhs, ref rhs) => if let Some(lhs) = fix_first(
        lhs, neg
      ) {
        Some( Formula::Biimpl( Box::new(lhs), rhs.clone() ) )
      } else {
        fix_first(rhs, neg).map(
          |rhs| Formula::Biimpl( lhs.clone(), Box::new(rhs) )
        )
      },
      Formula::Exist(ref vars, ref kid) => fix_first(kid, neg).map(
        |kid| Formula::Exist( vars.clone(), Box::new(kid) )
      ),
      _ => None,
    }
  }
  fn fix_first_in(kids: & [Formula], neg: bool) -> Option< Vec<Formula> > {
    for (idx, kid) in kids.iter().enumerate() {
      if let Some(fixed) = fix_first(kid, neg) {
        let mut res = kids.to_vec() ;
        res[idx] = fixed ;
        return Some(res)
      }
    }
    None
  }

  if let Some(pos) = fix_first(& f, false) {
    let neg = fix_first(& f, true).expect(
      "star literal expansion: polarities cannot disagree"
    ) ;
    expand_stars(pos, res) ;
    expand_stars(neg, res)
  } else {
    res.push(f)
  }
}


/// Expands an existential quantifier over the cartesian product of the
/// bound variables' domains.
fn expand_exist(
  mrf: & Mrf, kid: & Formula,
  doms: & [(String, String)], at: usize,
  assig: & mut Assignment, partial: bool,
  res: & mut Vec<Formula>,
) -> Res<()> {
  if at == doms.len() {
    res.push( kid.ground(mrf, assig, partial) ? ) ;
    return Ok(())
  }
  let (ref var, ref dom) = doms[at] ;
  let csts = mrf.mln().domain(dom).ok_or_else(
    || format!("unknown domain `{}`", dom)
  ) ?.clone() ;
  for cst in csts {
    assig.insert( var.clone(), cst ) ;
    expand_exist(mrf, kid, doms, at + 1, assig, partial, res) ?
  }
  assig.remove(var) ;
  Ok(())
}


impl_fmt!{
  Formula(self, fmt) {
    self.write_prec(fmt, 0)
  }
}
impl Formula {
  /// Writes the formula, parenthesizing according to the enclosing
  /// precedence level.
  fn write_prec(
    & self, fmt: & mut ::std::fmt::Formatter, prec: usize
  ) -> ::std::fmt::Result {
    // Precedence levels, loosest first: biimpl 1, impl 2, disj 3, conj 4.
    match * self {
      Formula::Lit { neg, star, ref pred, ref args } => {
        if star {
          write!(fmt, "*") ?
        } else if neg {
          write!(fmt, "!") ?
        }
        write!(fmt, "{}(", pred) ? ;
        for (idx, arg) in args.iter().enumerate() {
          if idx > 0 { write!(fmt, ",") ? }
          write!(fmt, "{}", arg) ?
        }
        write!(fmt, ")")
      },
      Formula::GndLit { neg, atom } => {
        if neg { write!(fmt, "!") ? }
        write!(fmt, "#{}", atom)
      },
      Formula::Eq { neg, ref lhs, ref rhs } => write!(
        fmt, "{} {} {}", lhs, if neg { "=/=" } else { "=" }, rhs
      ),
      Formula::Conj(ref kids) => {
        let close = prec > 4 ;
        if close { write!(fmt, "(") ? }
        for (idx, kid) in kids.iter().enumerate() {
          if idx > 0 { write!(fmt, " ^ ") ? }
          kid.write_prec(fmt, 4) ?
        }
        if close { write!(fmt, ")") ? }
        Ok(())
      },
      Formula::Disj(ref kids) => {
        let close = prec > 3 ;
        if close { write!(fmt, "(") ? }
        for (idx, kid) in kids.iter().enumerate() {
          if idx > 0 { write!(fmt, " v ") ? }
          kid.write_prec(fmt, 3) ?
        }
        if close { write!(fmt, ")") ? }
        Ok(())
      },
      Formula::Neg(ref kid) => {
        write!(fmt, "!(") ? ;
        kid.write_prec(fmt, 0) ? ;
        write!(fmt, ")")
      },
      Formula::Impl(ref lhs, ref rhs) => {
        let close = prec > 2 ;
        if close { write!(fmt, "(") ? }
        lhs.write_prec(fmt, 3) ? ;
        write!(fmt, " => ") ? ;
        rhs.write_prec(fmt, 3) ? ;
        if close { write!(fmt, ")") ? }
        Ok(())
      },
      Formula::Biimpl(ref lhs, ref rhs) => {
        let close = prec > 1 ;
        if close { write!(fmt, "(") ? }
        lhs.write_prec(fmt, 2) ? ;
        write!(fmt, " <=> ") ? ;
        rhs.write_prec(fmt, 2) ? ;
        if close { write!(fmt, ")") ? }
        Ok(())
      },
      Formula::Exist(ref vars, ref kid) => {
        write!(fmt, "EXIST {} (", vars.join(",")) ? ;
        kid.write_prec(fmt, 0) ? ;
        write!(fmt, ")")
      },
      Formula::TrueFalse(t) => if t == 1. {
        write!(fmt, "TRUE")
      } else if t == 0. {
        write!(fmt, "FALSE")
      } else {
        write!(fmt, "{}", t)
      },
    }
  }
}
