//! Ground Markov Random Fields.
//!
//! An MRF owns the materialized MLN, the ground atoms of every
//! predicate, the variables partitioning those atoms, the evidence, and
//! the ground formulas produced by the grounders.
//!
//! Atom truth values live in worlds indexed by [`AtomIdx`][idx];
//! evidence is a partial world assigning `Some` truth to determined
//! atoms.
//!
//! [idx]: ../common/struct.AtomIdx.html (AtomIdx in common)

use common::* ;
use logic::Formula ;
use mln::{ Mln, Database, ArgKind } ;
use mln::database::atom_name ;

pub mod vars ;

pub use self::vars::{ MrfVar, VarKind } ;


/// A ground atom.
#[derive(Debug, Clone)]
pub struct GndAtom {
  /// Index of this atom.
  pub idx: AtomIdx,
  /// Predicate.
  pub pred: PrdIdx,
  /// Constant arguments.
  pub args: Vec<Sym>,
  /// Canonical name, `Pred(A,B)`.
  pub name: String,
}

/// A ground formula.
#[derive(Debug, Clone)]
pub struct GndFormula {
  /// Ground AST, literals are [`GndLit`][gnd]s.
  ///
  /// [gnd]: ../logic/enum.Formula.html#variant.GndLit
  /// (GndLit formula variant)
  pub ast: Formula,
  /// Weight.
  pub weight: f64,
  /// Hard constraint flag.
  pub hard: bool,
  /// Template formula this grounding comes from.
  pub fml: FmlIdx,
}


/// A ground Markov random field.
#[derive(Debug, Clone)]
pub struct Mrf {
  /// The materialized MLN.
  mln: Mln,
  /// Ground atoms.
  pub atoms: AtomMap<GndAtom>,
  /// Map from canonical atom names to atom indices.
  atom_idx: HashMap<String, AtomIdx>,
  /// Variables.
  pub vars: VarMap<MrfVar>,
  /// Variable owning each atom.
  atom_var: AtomMap<VarIdx>,
  /// Hard evidence.
  pub evidence: PartialWorld,
  /// Soft evidence, used as target frequencies by the samplers.
  pub soft: Vec< Option<f64> >,
  /// Ground formulas.
  pub gnd_formulas: Vec<GndFormula>,
  /// Indices in `gnd_formulas` of the formulas mentioning each atom.
  formulas_of_atom: AtomMap< Vec<usize> >,
}

impl Mrf {

  /// Creates the MRF of a materialized MLN and a database.
  ///
  /// Materializes the ground atoms of every predicate, builds the
  /// variables, and loads the database as evidence. Ground formulas are
  /// added separately by the grounders.
  pub fn new(mln: Mln, db: & Database) -> Res<Mrf> {
    let mut atoms = AtomMap::new() ;
    let mut atom_idx = HashMap::new() ;

    for (pred_pos, pred) in mln.preds().iter().enumerate() {
      let pred_pos = PrdIdx::new(pred_pos) ;
      let mut doms = Vec::with_capacity( pred.args.len() ) ;
      let mut empty = false ;
      for arg in & pred.args {
        let dom = mln.domain(& arg.dom).ok_or_else(
          || format!("unknown domain `{}`", arg.dom)
        ) ? ;
        if dom.is_empty() { empty = true }
        doms.push( dom.clone() )
      }
      if empty { continue }

      // Cartesian product, rightmost argument moves fastest.
      let mut cursors = vec![ 0 ; doms.len() ] ;
      'tuples: loop {
        let args: Vec<Sym> = cursors.iter().zip( doms.iter() ).map(
          |(& c, dom)| dom[c].clone()
        ).collect() ;
        let name = atom_name( & pred.name, & args ) ;
        let idx = atoms.next_index() ;
        atoms.push(
          GndAtom { idx, pred: pred_pos, args, name: name.clone() }
        ) ;
        atom_idx.insert(name, idx) ;

        let mut pos = doms.len() ;
        loop {
          if pos == 0 { break 'tuples }
          pos -= 1 ;
          cursors[pos] += 1 ;
          if cursors[pos] < doms[pos].len() { break } else {
            cursors[pos] = 0
          }
        }
      }
    }

    // Variables: mutex arguments group the atoms of their predicate,
    // everything else is binary.
    let mut vars = VarMap::new() ;
    let mut atom_var: AtomMap<VarIdx> = atoms.iter().map(
      |_| VarIdx::zero()
    ).collect::< Vec<_> >().into() ;

    for (pred_pos, pred) in mln.preds().iter().enumerate() {
      let pred_pos = PrdIdx::new(pred_pos) ;
      let block = pred.block_arg() ;

      match block {
        None => for atom in & atoms {
          if atom.pred != pred_pos { continue }
          let idx = vars.next_index() ;
          atom_var[atom.idx] = idx ;
          vars.push(
            MrfVar {
              idx, kind: VarKind::Binary,
              name: atom.name.clone(),
              atoms: vec![ atom.idx ],
            }
          ) ;
        },

        Some( (pos, kind) ) => {
          let kind = match kind {
            ArgKind::Mutex => VarKind::Mutex,
            ArgKind::SoftMutex => VarKind::SoftMutex,
            ArgKind::Plain => unreachable!(
              "block argument cannot be plain"
            ),
          } ;
          // Group by the non-mutex arguments, insertion order.
          let mut groups: Vec< (Vec<Sym>, Vec<AtomIdx>) > = Vec::new() ;
          'atoms: for atom in & atoms {
            if atom.pred != pred_pos { continue }
            let key: Vec<Sym> = atom.args.iter().enumerate().filter_map(
              |(p, arg)| if p == pos { None } else { Some( arg.clone() ) }
            ).collect() ;
            for & mut (ref k, ref mut group) in & mut groups {
              if * k == key {
                group.push(atom.idx) ;
                continue 'atoms
              }
            }
            groups.push( (key, vec![ atom.idx ]) )
          }

          for (_, group) in groups {
            let idx = vars.next_index() ;
            let mut name = format!( "{}(", pred.name ) ;
            let template = & atoms[ group[0] ] ;
            for (p, arg) in template.args.iter().enumerate() {
              if p > 0 { name.push(',') }
              if p == pos { name.push('*') } else {
                name.push_str( arg.get() )
              }
            }
            name.push(')') ;
            for atom in & group {
              atom_var[* atom] = idx
            }
            vars.push( MrfVar { idx, kind, name, atoms: group } ) ;
          }
        },
      }
    }

    let count = atoms.len() ;
    let mut mrf = Mrf {
      mln, atoms, atom_idx, vars, atom_var,
      evidence: vec![ None ; count ],
      soft: vec![ None ; count ],
      gnd_formulas: Vec::new(),
      formulas_of_atom: vec![ Vec::new() ; count ].into(),
    } ;
    mrf.set_evidence(db) ? ;
    Ok(mrf)
  }

  /// Loads a database as evidence.
  ///
  /// Under fuzzy semantics fractional truth values are regular
  /// evidence; under classical semantics they become soft evidence,
  /// target frequencies for the samplers. Soft evidence on an atom of a
  /// mutex variable is inconsistent.
  fn set_evidence(& mut self, db: & Database) -> Res<()> {
    for ev in & db.evidence {
      let atom = self.atom_index( & ev.pred, & ev.args ) ? ;
      let fractional = 0. < ev.truth && ev.truth < 1. ;
      if fractional && self.var_of(atom).kind != VarKind::Binary {
        bail!(
          ErrorKind::InconsistentEvidence(
            format!(
              "soft evidence on atom `{}` of mutex variable `{}`",
              self.atoms[atom].name, self.var_of(atom).name
            )
          )
        )
      }
      if fractional && ! self.mln.fuzzy {
        self.soft[* atom] = Some(ev.truth)
      } else {
        self.evidence[* atom] = Some(ev.truth)
      }
    }
    Ok(())
  }

  /// The materialized MLN.
  pub fn mln(& self) -> & Mln {
    & self.mln
  }

  /// Index of a ground atom given its predicate and arguments.
  pub fn atom_index(& self, pred: & str, args: & [Sym]) -> Res<AtomIdx> {
    if let Some(idx) = self.atom_idx.get(
      & atom_name(pred, args)
    ) {
      return Ok(* idx)
    }
    if self.mln.pred_of_name(pred).is_none() {
      bail!( ErrorKind::NoSuchPredicate( pred.to_string() ) )
    }
    bail!(
      "unknown ground atom `{}`: some constant is not in its domain",
      atom_name(pred, args)
    )
  }

  /// Index of a ground atom given its textual form `Pred(A,B)`.
  pub fn gnd_atom(& self, text: & str) -> Res<AtomIdx> {
    let (pred, args) = ::mln::database::parse_atom(text) ? ;
    self.atom_index( & pred, & args )
  }

  /// Evidence truth value of an atom.
  pub fn evidence_of(& self, atom: AtomIdx) -> Option<f64> {
    self.evidence[* atom]
  }
  /// Soft evidence target frequency of an atom.
  pub fn soft_of(& self, atom: AtomIdx) -> Option<f64> {
    self.soft[* atom]
  }

  /// Variable owning an atom.
  pub fn var_of(& self, atom: AtomIdx) -> & MrfVar {
    & self.vars[ self.atom_var[atom] ]
  }
  /// Index of the variable owning an atom.
  pub fn var_idx_of(& self, atom: AtomIdx) -> VarIdx {
    self.atom_var[atom]
  }

  /// Adds a ground formula.
  pub fn push_gnd_formula(& mut self, gnd: GndFormula) {
    let pos = self.gnd_formulas.len() ;
    let mut atoms = AtomSet::new() ;
    gnd.ast.atom_indices(& mut atoms) ;
    for atom in atoms {
      self.formulas_of_atom[atom].push(pos)
    }
    self.gnd_formulas.push(gnd)
  }

  /// Indices in `gnd_formulas` of the formulas mentioning an atom.
  pub fn formulas_of(& self, atom: AtomIdx) -> & [usize] {
    & self.formulas_of_atom[atom]
  }

  /// Variables not fully determined by the evidence.
  pub fn undetermined_vars(& self) -> Vec<VarIdx> {
    let mut res = Vec::new() ;
    for var in & self.vars {
      if var.atoms.iter().any(
        |atom| self.evidence[* * atom].is_none()
      ) {
        res.push(var.idx)
      }
    }
    res
  }

  /// Applies the closed-world assumption to some predicates: atoms
  /// without evidence become false.
  pub fn apply_closed_world(& mut self, preds: & HashSet<String>) {
    for atom in & self.atoms {
      if self.evidence[* atom.idx].is_none()
      && self.soft[* atom.idx].is_none()
      && preds.contains( & self.mln.preds()[atom.pred].name ) {
        self.evidence[* atom.idx] = Some(0.)
      }
    }
  }

  /// The world dictated by the evidence, atoms without evidence false.
  pub fn evidence_world(& self) -> World {
    self.evidence.iter().map(
      |ev| ev.unwrap_or(0.)
    ).collect()
  }

  /// Streaming iterator over the worlds consistent with the evidence.
  pub fn worlds(& self) -> Res< Worlds > {
    let mut values = Vec::with_capacity( self.vars.len() ) ;
    for var in & self.vars {
      values.push( var.values_under(& self.evidence) ? )
    }
    Ok(
      Worlds {
        vars: & self.vars,
        atom_count: self.atoms.len(),
        cursors: vec![ 0 ; values.len() ],
        values,
        done: false,
      }
    )
  }
}


/// Streaming iterator over the worlds consistent with some evidence.
///
/// Worlds are enumerated in a deterministic order, the last variable
/// moving fastest.
pub struct Worlds<'a> {
  vars: & 'a VarMap<MrfVar>,
  atom_count: usize,
  values: Vec< Vec<(usize, Vec<f64>)> >,
  cursors: Vec<usize>,
  done: bool,
}
impl<'a> Iterator for Worlds<'a> {
  type Item = World ;
  fn next(& mut self) -> Option<World> {
    if self.done { return None }

    let mut world = vec![ 0. ; self.atom_count ] ;
    for (var, (vals, & cursor)) in self.vars.iter().zip(
      self.values.iter().zip( self.cursors.iter() )
    ) {
      let (_, ref truths) = vals[cursor] ;
      for (atom, & truth) in var.atoms.iter().zip( truths.iter() ) {
        world[* * atom] = truth
      }
    }

    let mut pos = self.cursors.len() ;
    loop {
      if pos == 0 {
        self.done = true ;
        break
      }
      pos -= 1 ;
      self.cursors[pos] += 1 ;
      if self.cursors[pos] < self.values[pos].len() { break } else {
        self.cursors[pos] = 0
      }
    }

    Some(world)
  }
}


/// Temporary evidence overlay.
///
/// Records the previous truth status of every atom it sets and restores
/// it on drop.
pub struct TempEvidence<'a> {
  evidence: & 'a mut [ Option<f64> ],
  saved: Vec< (AtomIdx, Option<f64>) >,
}
impl<'a> TempEvidence<'a> {
  /// Constructor.
  pub fn new(evidence: & 'a mut [Option<f64>]) -> Self {
    TempEvidence { evidence, saved: Vec::new() }
  }

  /// Sets the truth status of an atom, remembering the previous one.
  pub fn set(& mut self, atom: AtomIdx, truth: Option<f64>) {
    self.saved.push( (atom, self.evidence[* atom]) ) ;
    self.evidence[* atom] = truth
  }

  /// Current truth status of an atom.
  pub fn get(& self, atom: AtomIdx) -> Option<f64> {
    self.evidence[* atom]
  }

  /// The overlaid evidence.
  pub fn evidence(& self) -> & [ Option<f64> ] {
    self.evidence
  }
}
impl<'a> ::std::ops::Drop for TempEvidence<'a> {
  fn drop(& mut self) {
    // Reverse order, an atom can be set twice.
    while let Some( (atom, old) ) = self.saved.pop() {
      self.evidence[* atom] = old
    }
  }
}


#[cfg(test)]
mod test {
  use super::* ;

  fn mutex_mrf() -> Mrf {
    let mln = Mln::parse_str(
      "obj = {O1, O2}\n\
      color = {Red, Green}\n\
      Color(obj, color!)\n",
      false, false,
    ).expect("parses").materialize(& []).expect("materializes") ;
    Mrf::new( mln, & Database::new() ).expect("builds")
  }

  #[test]
  fn atoms_and_vars() {
    let mrf = mutex_mrf() ;
    assert_eq!( mrf.atoms.len(), 4 ) ;
    assert_eq!( mrf.vars.len(), 2 ) ;
    for var in & mrf.vars {
      assert_eq!( var.kind, VarKind::Mutex ) ;
      assert_eq!( var.value_count(), 2 )
    }
    let atom = mrf.gnd_atom("Color(O1,Green)").expect("known") ;
    assert_eq!( mrf.atoms[atom].name, "Color(O1,Green)" )
  }

  #[test]
  fn world_enumeration() {
    let mrf = mutex_mrf() ;
    let worlds: Vec<_> = mrf.worlds().expect("consistent").collect() ;
    // Two mutex variables with two values each.
    assert_eq!( worlds.len(), 4 ) ;
    for world in & worlds {
      let sum: f64 = world.iter().sum() ;
      assert_eq!( sum, 2. )
    }
  }

  #[test]
  fn evidence_prunes_worlds() {
    let mln = Mln::parse_str(
      "obj = {O1, O2}\n\
      color = {Red, Green}\n\
      Color(obj, color!)\n",
      false, false,
    ).expect("parses").materialize(& []).expect("materializes") ;
    let mut db = Database::new() ;
    db.add_evidence(
      & mln, "Color", vec![ sym("O1"), sym("Red") ], 1.
    ).expect("adds") ;
    let mrf = Mrf::new( mln, & db ).expect("builds") ;
    let worlds: Vec<_> = mrf.worlds().expect("consistent").collect() ;
    assert_eq!( worlds.len(), 2 ) ;
    let atom = mrf.gnd_atom("Color(O1,Red)").expect("known") ;
    for world in & worlds {
      assert_eq!( world[* atom], 1. )
    }
  }

  #[test]
  fn temp_evidence_restores() {
    let mut evidence: Vec< Option<f64> > = vec![ None, Some(1.), None ] ;
    {
      let mut temp = TempEvidence::new(& mut evidence) ;
      temp.set( AtomIdx::new(0), Some(0.) ) ;
      temp.set( AtomIdx::new(1), Some(0.) ) ;
      temp.set( AtomIdx::new(1), None ) ;
      assert_eq!( temp.get( AtomIdx::new(1) ), None )
    }
    assert_eq!( evidence, vec![ None, Some(1.), None ] )
  }

  #[test]
  fn temp_evidence_survives_a_panic() {
    let mut evidence: Vec< Option<f64> > = vec![ None, Some(1.) ] ;
    let res = ::std::panic::catch_unwind(
      ::std::panic::AssertUnwindSafe(
        || {
          let mut temp = TempEvidence::new(& mut evidence) ;
          temp.set( AtomIdx::new(0), Some(0.) ) ;
          panic!("rollback check")
        }
      )
    ) ;
    assert!( res.is_err() ) ;
    assert_eq!( evidence, vec![ None, Some(1.) ] )
  }

  #[test]
  fn soft_evidence_is_separate() {
    let mln = Mln::parse_str(
      "Smokes(person)\n", false, false,
    ).expect("parses") ;
    let dbs = Database::parse_str(
      "0.7 Smokes(Ann)\n", & mln, false, false,
    ).expect("parses") ;
    let mln = mln.materialize(& dbs).expect("materializes") ;
    let mrf = Mrf::new( mln, & dbs[0] ).expect("builds") ;
    let atom = mrf.gnd_atom("Smokes(Ann)").expect("known") ;
    assert_eq!( mrf.evidence_of(atom), None ) ;
    assert_eq!( mrf.soft_of(atom), Some(0.7) )
  }
}
