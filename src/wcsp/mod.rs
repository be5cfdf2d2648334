//! Weighted constraint satisfaction problems.
//!
//! A WCSP holds finite-domain variables and constraints mapping
//! assignment tuples to non-negative costs, with a distinguished top
//! cost denoting infeasibility. Real-valued costs are rescaled to
//! integers before talking to a solver; the textual emission format is
//! bit-exact.

use common::* ;

use std::process::{ Command, Stdio, Child } ;
use std::time::Duration ;


/// Costs above this threshold overflow the solver contract.
pub const max_cost: u64 = 1 << 60 ;


/// A real-valued cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cost {
  /// Finite cost.
  Fin(f64),
  /// Infeasible.
  Top,
}
impl Cost {
  /// Cost addition, top absorbs.
  pub fn add(self, other: Cost) -> Cost {
    match (self, other) {
      (Cost::Fin(l), Cost::Fin(r)) => Cost::Fin(l + r),
      _ => Cost::Top,
    }
  }
  /// True for the top cost.
  pub fn is_top(self) -> bool {
    match self {
      Cost::Top => true,
      Cost::Fin(_) => false,
    }
  }
}

/// A constraint: a default cost plus exceptional tuples.
#[derive(Debug, Clone)]
pub struct Constraint {
  /// WCSP variable indices, in scope order.
  pub scope: Vec<usize>,
  /// Exceptional tuples.
  pub tuples: Vec< (Vec<usize>, Cost) >,
  /// Cost of every tuple not listed.
  pub default: Cost,
}
impl Constraint {
  /// Cost of an assignment restricted to this constraint's scope.
  pub fn cost_of(& self, tuple: & [usize]) -> Cost {
    for & (ref t, cost) in & self.tuples {
      if t.as_slice() == tuple { return cost }
    }
    self.default
  }
}

/// Builds a constraint from a dense cost table, choosing the most
/// frequent cost as the default.
pub fn sparse_constraint(
  scope: Vec<usize>, table: Vec< (Vec<usize>, Cost) >
) -> Constraint {
  // Most frequent cost. Top is compared by tag, finite costs by value.
  let mut best: Option<(Cost, usize)> = None ;
  for & (_, cost) in & table {
    let count = table.iter().filter(
      |& & (_, c)| c == cost
    ).count() ;
    let better = match best {
      None => true,
      Some( (_, best_count) ) => count > best_count,
    } ;
    if better { best = Some( (cost, count) ) }
  }
  let default = best.map( |(cost, _)| cost ).unwrap_or( Cost::Fin(0.) ) ;
  let tuples = table.into_iter().filter(
    |& (_, cost)| cost != default
  ).collect() ;
  Constraint { scope, tuples, default }
}


/// A real-valued WCSP.
#[derive(Debug, Clone)]
pub struct Wcsp {
  /// Problem name, first field of the emission header.
  pub name: String,
  /// Domain size of every variable.
  pub domains: Vec<usize>,
  /// Constraints.
  pub constraints: Vec<Constraint>,
}

impl Wcsp {

  /// Empty problem.
  pub fn new<S: Into<String>>(name: S, domains: Vec<usize>) -> Self {
    Wcsp { name: name.into(), domains, constraints: Vec::new() }
  }

  /// Adds a constraint, merging it into an existing one over the same
  /// scope by elementwise cost addition.
  pub fn push(& mut self, cns: Constraint) {
    for prev in & mut self.constraints {
      if prev.scope == cns.scope {
        merge(prev, cns) ;
        return
      }
    }
    self.constraints.push(cns)
  }

  /// Rescales the costs to integers.
  ///
  /// The divisor is the smallest of 1, the smallest positive cost, and
  /// the smallest non-zero difference between successive distinct
  /// costs. Non-top costs are divided and floored; top becomes the sum
  /// of each constraint's maximal cost plus one.
  pub fn make_integer_costs(& self) -> Res<IntWcsp> {
    let mut costs: Vec<f64> = Vec::new() ;
    for cns in & self.constraints {
      if let Cost::Fin(cost) = cns.default {
        costs.push(cost)
      }
      for & (_, cost) in & cns.tuples {
        if let Cost::Fin(cost) = cost {
          costs.push(cost)
        }
      }
    }
    costs.sort_by(
      |l, r| l.partial_cmp(r).expect("costs are finite")
    ) ;
    costs.dedup() ;

    let mut divisor = 1.0f64 ;
    for & cost in & costs {
      if cost > 0. && cost < divisor { divisor = cost }
    }
    for pair in costs.windows(2) {
      let diff = pair[1] - pair[0] ;
      if diff > 0. && diff < divisor { divisor = diff }
    }

    let int_of = |cost: f64| (cost / divisor).floor() as u64 ;

    // Top: sum of per-constraint maxima, plus one.
    let mut top: u64 = 1 ;
    for cns in & self.constraints {
      let mut max = match cns.default {
        Cost::Fin(cost) => int_of(cost),
        Cost::Top => 0,
      } ;
      for & (_, cost) in & cns.tuples {
        if let Cost::Fin(cost) = cost {
          let cost = int_of(cost) ;
          if cost > max { max = cost }
        }
      }
      top = match top.checked_add(max) {
        Some(top) if top < max_cost => top,
        _ => bail!( ErrorKind::CostOverflow ),
      }
    }

    let mut constraints = Vec::with_capacity( self.constraints.len() ) ;
    for cns in & self.constraints {
      let int_cost = |cost: Cost| match cost {
        Cost::Fin(cost) => int_of(cost),
        Cost::Top => top,
      } ;
      constraints.push(
        IntConstraint {
          scope: cns.scope.clone(),
          tuples: cns.tuples.iter().map(
            |& (ref t, cost)| ( t.clone(), int_cost(cost) )
          ).collect(),
          default: int_cost(cns.default),
        }
      )
    }

    Ok(
      IntWcsp {
        name: self.name.clone(),
        domains: self.domains.clone(),
        constraints, top,
      }
    )
  }
}

/// Merges `cns` into `prev` (same scope) by elementwise addition.
fn merge(prev: & mut Constraint, cns: Constraint) {
  let mut tuples = Vec::new() ;
  for & (ref t, cost) in & prev.tuples {
    tuples.push( ( t.clone(), cost.add( cns.cost_of(t) ) ) )
  }
  for (t, cost) in cns.tuples {
    if prev.tuples.iter().all( |& (ref p, _)| * p != t ) {
      tuples.push( ( t.clone(), prev.default.add(cost) ) )
    }
  }
  prev.default = prev.default.add(cns.default) ;
  prev.tuples = tuples
}


/// An integer-cost constraint.
#[derive(Debug, Clone)]
pub struct IntConstraint {
  /// WCSP variable indices.
  pub scope: Vec<usize>,
  /// Exceptional tuples.
  pub tuples: Vec< (Vec<usize>, u64) >,
  /// Default cost.
  pub default: u64,
}
impl IntConstraint {
  /// Cost of a tuple.
  pub fn cost_of(& self, tuple: & [usize]) -> u64 {
    for & (ref t, cost) in & self.tuples {
      if t.as_slice() == tuple { return cost }
    }
    self.default
  }
}

/// An integer-cost WCSP, ready for emission.
#[derive(Debug, Clone)]
pub struct IntWcsp {
  /// Problem name.
  pub name: String,
  /// Domain size of every variable.
  pub domains: Vec<usize>,
  /// Constraints.
  pub constraints: Vec<IntConstraint>,
  /// Top cost, the infeasibility sentinel.
  pub top: u64,
}

impl IntWcsp {

  /// Emits the problem in the solver's textual format.
  pub fn write<W: Write>(& self, w: & mut W) -> IoRes<()> {
    let maxdom = self.domains.iter().cloned().max().unwrap_or(0) ;
    writeln!(
      w, "{} {} {} {} {}",
      self.name, self.domains.len(), maxdom,
      self.constraints.len(), self.top
    ) ? ;
    let mut first = true ;
    for dom in & self.domains {
      if ! first { write!(w, " ") ? }
      first = false ;
      write!(w, "{}", dom) ?
    }
    writeln!(w, "") ? ;
    for cns in & self.constraints {
      write!(w, "{}", cns.scope.len()) ? ;
      for var in & cns.scope {
        write!(w, " {}", var) ?
      }
      writeln!(w, " {} {}", cns.default, cns.tuples.len()) ? ;
      for & (ref tuple, cost) in & cns.tuples {
        for val in tuple {
          write!(w, "{} ", val) ?
        }
        writeln!(w, "{}", cost) ?
      }
    }
    Ok(())
  }

  /// Total cost of a complete assignment, `None` when some constraint
  /// assigns top.
  pub fn cost(& self, assignment: & [usize]) -> Option<u64> {
    let mut total: u64 = 0 ;
    for cns in & self.constraints {
      let tuple: Vec<usize> = cns.scope.iter().map(
        |& var| assignment[var]
      ).collect() ;
      let cost = cns.cost_of(& tuple) ;
      if cost >= self.top { return None }
      total += cost
    }
    Some(total)
  }
}


/// Solver capability: feed an integer WCSP, get back an optimal
/// assignment of value indices, or nothing when the problem is
/// infeasible.
pub trait WcspSolver {
  /// Solves a problem.
  fn solve(& self, wcsp: & IntWcsp) -> Res< Option< Vec<usize> > > ;
}


/// External solver driven through a child process.
///
/// Writes the problem to a temporary file named after the process id,
/// spawns the solver with `-s <file>`, and keeps the last assignment
/// line following a `New solution` line. A timeout kills the child and
/// triggers one retry with a doubled budget; a second expiry surfaces
/// as unsatisfiability.
pub struct ExternalSolver {
  /// Solver command.
  pub cmd: String,
  /// Initial time budget.
  pub timeout: Duration,
}

impl ExternalSolver {
  /// Constructor.
  pub fn new<S: Into<String>>(cmd: S, timeout: Duration) -> Self {
    ExternalSolver { cmd: cmd.into(), timeout }
  }

  fn problem_file(& self, wcsp: & IntWcsp) -> Res<::std::path::PathBuf> {
    let path = ::std::env::temp_dir().join(
      format!( "{}_{}.wcsp", wcsp.name, ::std::process::id() )
    ) ;
    let mut file = ::std::fs::File::create(& path).chain_err(
      || format!( "while creating solver input `{}`", path.display() )
    ) ? ;
    wcsp.write(& mut file) ? ;
    Ok(path)
  }

  /// One solver run under a time budget.
  fn run_once(
    & self, path: & ::std::path::Path, timeout: Duration
  ) -> Res< Option<String> > {
    let mut child: Child = Command::new(& self.cmd).arg("-s").arg(path)
    .stdout( Stdio::piped() ).stderr( Stdio::null() )
    .spawn().map_err(
      |_| ErrorKind::SolverSpawn( self.cmd.clone() )
    ) ? ;

    let stdout = child.stdout.take().ok_or(
      "could not acquire the solver's stdout"
    ) ? ;
    let (tx, rx) = ::std::sync::mpsc::channel() ;
    let reader = ::std::thread::spawn(
      move || {
        use std::io::Read ;
        let mut stdout = stdout ;
        let mut buf = String::new() ;
        let _ = stdout.read_to_string(& mut buf) ;
        let _ = tx.send(buf) ;
      }
    ) ;

    match rx.recv_timeout(timeout) {
      Ok(output) => {
        let _ = child.wait() ;
        let _ = reader.join() ;
        Ok( Some(output) )
      },
      Err(_) => {
        let _ = child.kill() ;
        let _ = child.wait() ;
        let _ = reader.join() ;
        Ok(None)
      },
    }
  }
}

impl WcspSolver for ExternalSolver {
  fn solve(& self, wcsp: & IntWcsp) -> Res< Option< Vec<usize> > > {
    let path = self.problem_file(wcsp) ? ;

    let mut output = self.run_once(& path, self.timeout) ? ;
    if output.is_none() {
      log_warn!(
        "solver `{}` timed out, retrying with a doubled budget", self.cmd
      ) ;
      output = self.run_once(& path, self.timeout * 2) ?
    }
    let _ = ::std::fs::remove_file(& path) ;

    let output = match output {
      Some(output) => output,
      // Second expiry: no admissible world was found in time.
      None => bail!( ErrorKind::Unsat ),
    } ;

    Ok( parse_solution(& output, wcsp.domains.len()) )
  }
}

/// Extracts the last `New solution` assignment from solver output.
fn parse_solution(output: & str, num_vars: usize) -> Option< Vec<usize> > {
  let mut res = None ;
  let mut expect_assignment = false ;
  for line in output.lines() {
    if expect_assignment {
      expect_assignment = false ;
      let vals: Option< Vec<usize> > = line.split_whitespace().map(
        |tok| tok.parse().ok()
      ).collect() ;
      if let Some(vals) = vals {
        if vals.len() == num_vars {
          res = Some(vals) ;
          continue
        }
      }
    }
    if line.starts_with("New solution") {
      expect_assignment = true
    }
  }
  res
}


/// In-process exhaustive solver, used when no external binary is
/// available and in tests.
///
/// Depth-first branch and bound over the variables in index order,
/// pruning branches whose fully-scoped constraints already cost at
/// least as much as the incumbent.
pub struct BranchAndBound ;

impl BranchAndBound {
  fn dfs(
    wcsp: & IntWcsp, assignment: & mut Vec<usize>,
    best: & mut Option<(u64, Vec<usize>)>,
  ) {
    let var = assignment.len() ;
    if var == wcsp.domains.len() {
      if let Some(cost) = wcsp.cost(assignment) {
        let better = match * best {
          None => true,
          Some( (bound, _) ) => cost < bound,
        } ;
        if better {
          * best = Some( (cost, assignment.clone()) )
        }
      }
      return
    }
    for val in 0..wcsp.domains[var] {
      assignment.push(val) ;
      if ! Self::pruned(wcsp, assignment, best) {
        Self::dfs(wcsp, assignment, best)
      }
      assignment.pop() ;
    }
  }

  /// Lower bound from the constraints whose scope is fully assigned.
  fn pruned(
    wcsp: & IntWcsp, partial: & [usize],
    best: & Option<(u64, Vec<usize>)>,
  ) -> bool {
    let mut bound: u64 = 0 ;
    for cns in & wcsp.constraints {
      if cns.scope.iter().any( |& var| var >= partial.len() ) {
        continue
      }
      let tuple: Vec<usize> = cns.scope.iter().map(
        |& var| partial[var]
      ).collect() ;
      let cost = cns.cost_of(& tuple) ;
      if cost >= wcsp.top { return true }
      bound += cost
    }
    match * best {
      Some( (incumbent, _) ) => bound >= incumbent,
      None => false,
    }
  }
}

impl WcspSolver for BranchAndBound {
  fn solve(& self, wcsp: & IntWcsp) -> Res< Option< Vec<usize> > > {
    let mut best = None ;
    Self::dfs( wcsp, & mut Vec::new(), & mut best ) ;
    Ok( best.map( |(_, assignment)| assignment ) )
  }
}


#[cfg(test)]
mod test {
  use super::* ;

  #[test]
  fn rescaling_scenario() {
    let mut wcsp = Wcsp::new( "p", vec![ 2, 2, 2 ] ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 0 ],
        tuples: vec![ (vec![ 0 ], Cost::Fin(0.25)) ],
        default: Cost::Fin(0.),
      }
    ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 1 ],
        tuples: vec![ (vec![ 0 ], Cost::Fin(0.5)) ],
        default: Cost::Fin(0.),
      }
    ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 2 ],
        tuples: vec![ (vec![ 0 ], Cost::Fin(1.25)) ],
        default: Cost::Fin(0.),
      }
    ) ;
    let int = wcsp.make_integer_costs().expect("rescales") ;
    let costs: Vec<u64> = int.constraints.iter().map(
      |cns| cns.tuples[0].1
    ).collect() ;
    assert_eq!( costs, vec![ 1, 2, 5 ] ) ;
    // Sum of per-constraint maxima plus one.
    assert_eq!( int.top, 9 )
  }

  #[test]
  fn scope_merging_adds_costs() {
    let mut wcsp = Wcsp::new( "p", vec![ 2 ] ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 0 ],
        tuples: vec![ (vec![ 1 ], Cost::Fin(1.)) ],
        default: Cost::Fin(0.),
      }
    ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 0 ],
        tuples: vec![ (vec![ 0 ], Cost::Fin(2.)) ],
        default: Cost::Fin(0.),
      }
    ) ;
    assert_eq!( wcsp.constraints.len(), 1 ) ;
    let cns = & wcsp.constraints[0] ;
    assert_eq!( cns.cost_of(& [ 0 ]), Cost::Fin(2.) ) ;
    assert_eq!( cns.cost_of(& [ 1 ]), Cost::Fin(1.) )
  }

  #[test]
  fn top_saturates_merging() {
    let mut wcsp = Wcsp::new( "p", vec![ 2 ] ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 0 ],
        tuples: vec![ (vec![ 1 ], Cost::Top) ],
        default: Cost::Fin(0.),
      }
    ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 0 ],
        tuples: vec![ (vec![ 1 ], Cost::Fin(3.)) ],
        default: Cost::Fin(0.),
      }
    ) ;
    assert!( wcsp.constraints[0].cost_of(& [ 1 ]).is_top() )
  }

  #[test]
  fn emission_format() {
    let mut wcsp = Wcsp::new( "mrf", vec![ 2, 3 ] ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 0, 1 ],
        tuples: vec![ (vec![ 1, 2 ], Cost::Fin(1.)) ],
        default: Cost::Fin(0.),
      }
    ) ;
    let int = wcsp.make_integer_costs().expect("rescales") ;
    let mut buf: Vec<u8> = Vec::new() ;
    int.write(& mut buf).expect("writes") ;
    let text = String::from_utf8(buf).expect("utf8") ;
    assert_eq!(
      text,
      "mrf 2 3 1 2\n\
      2 3\n\
      2 0 1 0 1\n\
      1 2 1\n"
    )
  }

  #[test]
  fn branch_and_bound_finds_optimum() {
    let mut wcsp = Wcsp::new( "p", vec![ 2, 2 ] ) ;
    // Var 0 wants 1, var 1 wants 0, agreement is forbidden.
    wcsp.push(
      Constraint {
        scope: vec![ 0 ],
        tuples: vec![ (vec![ 0 ], Cost::Fin(2.)) ],
        default: Cost::Fin(0.),
      }
    ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 1 ],
        tuples: vec![ (vec![ 1 ], Cost::Fin(1.)) ],
        default: Cost::Fin(0.),
      }
    ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 0, 1 ],
        tuples: vec![
          (vec![ 0, 0 ], Cost::Top),
          (vec![ 1, 1 ], Cost::Top),
        ],
        default: Cost::Fin(0.),
      }
    ) ;
    let int = wcsp.make_integer_costs().expect("rescales") ;
    let solution = BranchAndBound.solve(& int).expect("solves").expect(
      "feasible"
    ) ;
    assert_eq!( solution, vec![ 1, 0 ] )
  }

  #[test]
  fn infeasible_has_no_solution() {
    let mut wcsp = Wcsp::new( "p", vec![ 2 ] ) ;
    wcsp.push(
      Constraint {
        scope: vec![ 0 ],
        tuples: Vec::new(),
        default: Cost::Top,
      }
    ) ;
    let int = wcsp.make_integer_costs().expect("rescales") ;
    assert_eq!( BranchAndBound.solve(& int).expect("solves"), None )
  }

  #[test]
  fn solution_parsing_keeps_last() {
    let output = "\
      preprocessing\n\
      New solution: 12 (0 backtracks)\n\
      1 0 1\n\
      noise\n\
      New solution: 7 (3 backtracks)\n\
      0 1 1\n\
      end\n\
    " ;
    assert_eq!(
      parse_solution(output, 3), Some( vec![ 0, 1, 1 ] )
    )
  }
}
