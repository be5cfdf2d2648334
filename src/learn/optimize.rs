//! Numerical optimizers for weight learning.
//!
//! Every adapter maximizes an objective `f` with gradient `g` by
//! minimizing `−f` with `−g` internally. Objectives are fallible; a
//! non-finite value or gradient component surfaces as a numerical
//! error.

use common::* ;


/// Convergence parameters, passed through opaquely from the options.
#[derive(Debug, Clone, Copy)]
pub struct OptParams {
  /// Iteration budget.
  pub maxiter: usize,
  /// Gradient norm threshold.
  pub gtol: f64,
  /// Step size threshold.
  pub xtol: f64,
  /// Objective change threshold.
  pub ftol: f64,
  /// Step size for the first-order methods.
  pub learning_rate: f64,
}

/// Optimizer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptMethod {
  /// Quasi-Newton with a dense inverse Hessian estimate.
  Bfgs,
  /// Polak-Ribiere conjugate gradient.
  Cg,
  /// Newton-CG with finite-difference Hessian products.
  Ncg,
  /// Limited-memory BFGS.
  Lbfgsb,
  /// Derivative-free direction set method.
  Powell,
  /// Nelder-Mead simplex.
  Fmin,
  /// Fixed-rate gradient ascent.
  DirectDescent,
  /// Damped diagonal Newton steps.
  DiagonalNewton,
}
impl OptMethod {
  /// Parses an optimizer name.
  pub fn of_str(s: & str) -> Res<OptMethod> {
    match s {
      "bfgs" => Ok( OptMethod::Bfgs ),
      "cg" => Ok( OptMethod::Cg ),
      "ncg" => Ok( OptMethod::Ncg ),
      "l-bfgs-b" => Ok( OptMethod::Lbfgsb ),
      "powell" => Ok( OptMethod::Powell ),
      "fmin" => Ok( OptMethod::Fmin ),
      "directDescent" => Ok( OptMethod::DirectDescent ),
      "diagonalNewton" => Ok( OptMethod::DiagonalNewton ),
      _ => bail!( "unknown optimizer `{}`", s ),
    }
  }
}


/// A maximization objective: value and gradient at a point.
pub trait Objective {
  /// Value and gradient.
  fn eval(& mut self, weights: & [f64]) -> Res<(f64, Vec<f64>)> ;

  /// Diagonal of the Hessian, when the objective can provide it.
  fn hessian_diag(& mut self, _weights: & [f64]) -> Option< Vec<f64> > {
    None
  }
}

/// Checked evaluation: rejects non-finite values and gradients.
fn eval_checked(
  obj: & mut dyn Objective, weights: & [f64]
) -> Res<(f64, Vec<f64>)> {
  let (f, grad) = obj.eval(weights) ? ;
  if ! f.is_finite() || grad.iter().any( |g| ! g.is_finite() ) {
    bail!(
      ErrorKind::Numerical(
        format!("objective produced a non-finite value at {:?}", weights)
      )
    )
  }
  Ok( (f, grad) )
}

fn norm(v: & [f64]) -> f64 {
  v.iter().map( |x| x * x ).sum::<f64>().sqrt()
}
fn dot(l: & [f64], r: & [f64]) -> f64 {
  l.iter().zip( r.iter() ).map( |(l, r)| l * r ).sum()
}
fn axpy(y: & mut [f64], a: f64, x: & [f64]) {
  for (y, & x) in y.iter_mut().zip( x.iter() ) {
    * y += a * x
  }
}

/// Backtracking line search along an ascent direction. Returns the
/// accepted point, value and gradient.
fn line_search(
  obj: & mut dyn Objective, x: & [f64], f: f64, grad: & [f64],
  dir: & [f64],
) -> Res< Option<(Vec<f64>, f64, Vec<f64>)> > {
  let slope = dot(grad, dir) ;
  if slope <= 0. { return Ok(None) }
  let mut step = 1.0f64 ;
  for _ in 0..30 {
    let mut candidate = x.to_vec() ;
    axpy(& mut candidate, step, dir) ;
    match eval_checked(obj, & candidate) {
      Ok( (f_new, g_new) ) => {
        // Armijo condition on the maximization objective.
        if f_new >= f + 1e-4 * step * slope {
          return Ok( Some( (candidate, f_new, g_new) ) )
        }
      },
      // Overflow along the ray shrinks the step instead of failing.
      Err(ref e) if e.is_numerical() => (),
      Err(e) => return Err(e),
    }
    step *= 0.5
  }
  Ok(None)
}

/// Entry point: maximizes the objective from a starting point.
pub fn maximize(
  method: OptMethod, obj: & mut dyn Objective,
  start: Vec<f64>, params: & OptParams,
) -> Res< Vec<f64> > {
  if start.is_empty() { return Ok(start) }
  match method {
    OptMethod::Bfgs => bfgs(obj, start, params),
    OptMethod::Cg => cg(obj, start, params),
    OptMethod::Ncg => ncg(obj, start, params),
    OptMethod::Lbfgsb => lbfgs(obj, start, params),
    OptMethod::Powell => powell(obj, start, params),
    OptMethod::Fmin => nelder_mead(obj, start, params),
    OptMethod::DirectDescent => direct_descent(obj, start, params),
    OptMethod::DiagonalNewton => diagonal_newton(obj, start, params),
  }
}


fn direct_descent(
  obj: & mut dyn Objective, mut x: Vec<f64>, params: & OptParams
) -> Res< Vec<f64> > {
  for _ in 0..params.maxiter {
    let (_, grad) = eval_checked(obj, & x) ? ;
    if norm(& grad) < params.gtol { break }
    axpy(& mut x, params.learning_rate, & grad)
  }
  Ok(x)
}


fn bfgs(
  obj: & mut dyn Objective, mut x: Vec<f64>, params: & OptParams
) -> Res< Vec<f64> > {
  let n = x.len() ;
  // Inverse Hessian estimate of the minimization problem, identity
  // initialized, stored dense row-major.
  let mut h: Vec<f64> = (0..n * n).map(
    |i| if i % (n + 1) == 0 { 1. } else { 0. }
  ).collect() ;

  let (mut f, mut grad) = eval_checked(obj, & x) ? ;
  for _ in 0..params.maxiter {
    if norm(& grad) < params.gtol { break }

    // Ascent direction `h * grad`.
    let mut dir = vec![ 0. ; n ] ;
    for i in 0..n {
      for j in 0..n {
        dir[i] += h[i * n + j] * grad[j]
      }
    }

    let (x_new, f_new, grad_new) = match line_search(
      obj, & x, f, & grad, & dir
    ) ? {
      Some(next) => next,
      None => break,
    } ;

    let s: Vec<f64> = x_new.iter().zip( x.iter() ).map(
      |(n, o)| n - o
    ).collect() ;
    // Minimization-side gradient difference.
    let y: Vec<f64> = grad.iter().zip( grad_new.iter() ).map(
      |(o, n)| o - n
    ).collect() ;
    let sy = dot(& s, & y) ;
    if sy > 1e-12 {
      // Standard BFGS inverse update.
      let rho = 1. / sy ;
      let mut hy = vec![ 0. ; n ] ;
      for i in 0..n {
        for j in 0..n {
          hy[i] += h[i * n + j] * y[j]
        }
      }
      let yhy = dot(& y, & hy) ;
      for i in 0..n {
        for j in 0..n {
          h[i * n + j] +=
            (1. + rho * yhy) * rho * s[i] * s[j]
            - rho * ( hy[i] * s[j] + s[i] * hy[j] )
        }
      }
    }

    let step = norm(& s) ;
    let delta = (f_new - f).abs() ;
    x = x_new ;
    f = f_new ;
    grad = grad_new ;
    if step < params.xtol || delta < params.ftol { break }
  }
  Ok(x)
}


fn lbfgs(
  obj: & mut dyn Objective, mut x: Vec<f64>, params: & OptParams
) -> Res< Vec<f64> > {
  const memory: usize = 10 ;
  let mut pairs: Vec<(Vec<f64>, Vec<f64>, f64)> = Vec::new() ;

  let (mut f, mut grad) = eval_checked(obj, & x) ? ;
  for _ in 0..params.maxiter {
    if norm(& grad) < params.gtol { break }

    // Two-loop recursion on the minimization gradient.
    let mut q: Vec<f64> = grad.iter().map( |g| - g ).collect() ;
    let mut alphas = Vec::with_capacity( pairs.len() ) ;
    for & (ref s, ref y, rho) in pairs.iter().rev() {
      let alpha = rho * dot(s, & q) ;
      axpy(& mut q, - alpha, y) ;
      alphas.push(alpha)
    }
    if let Some( & (ref s, ref y, _) ) = pairs.last() {
      let scale = dot(s, y) / dot(y, y) ;
      for q in q.iter_mut() { * q *= scale }
    }
    for ( & (ref s, ref y, rho), & alpha ) in pairs.iter().zip(
      alphas.iter().rev()
    ) {
      let beta = rho * dot(y, & q) ;
      axpy(& mut q, alpha - beta, s)
    }
    // Back to an ascent direction.
    let dir: Vec<f64> = q.iter().map( |q| - q ).collect() ;

    let (x_new, f_new, grad_new) = match line_search(
      obj, & x, f, & grad, & dir
    ) ? {
      Some(next) => next,
      None => break,
    } ;

    let s: Vec<f64> = x_new.iter().zip( x.iter() ).map(
      |(n, o)| n - o
    ).collect() ;
    let y: Vec<f64> = grad.iter().zip( grad_new.iter() ).map(
      |(o, n)| o - n
    ).collect() ;
    let sy = dot(& s, & y) ;
    if sy > 1e-12 {
      if pairs.len() == memory {
        pairs.remove(0) ;
      }
      pairs.push( (s.clone(), y, 1. / sy) )
    }

    let step = norm(& s) ;
    let delta = (f_new - f).abs() ;
    x = x_new ;
    f = f_new ;
    grad = grad_new ;
    if step < params.xtol || delta < params.ftol { break }
  }
  Ok(x)
}


fn cg(
  obj: & mut dyn Objective, mut x: Vec<f64>, params: & OptParams
) -> Res< Vec<f64> > {
  let (mut f, mut grad) = eval_checked(obj, & x) ? ;
  let mut dir = grad.clone() ;
  for iter in 0..params.maxiter {
    if norm(& grad) < params.gtol { break }

    let (x_new, f_new, grad_new) = match line_search(
      obj, & x, f, & grad, & dir
    ) ? {
      Some(next) => next,
      None => {
        // Restart along the raw gradient once before giving up.
        dir = grad.clone() ;
        match line_search(obj, & x, f, & grad, & dir) ? {
          Some(next) => next,
          None => break,
        }
      },
    } ;

    // Polak-Ribiere with automatic restart.
    let num: f64 = grad_new.iter().zip( grad.iter() ).map(
      |(n, o)| n * (n - o)
    ).sum() ;
    let den = dot(& grad, & grad) ;
    let beta = if den > 0. { (num / den).max(0.) } else { 0. } ;
    let restart = iter % ( x.len() + 1 ) == x.len() ;
    dir = grad_new.iter().zip( dir.iter() ).map(
      |(g, d)| if restart { * g } else { g + beta * d }
    ).collect() ;

    let delta = (f_new - f).abs() ;
    x = x_new ;
    f = f_new ;
    grad = grad_new ;
    if delta < params.ftol { break }
  }
  Ok(x)
}


/// Hessian-vector product of the minimization objective by forward
/// finite differences of the gradient.
fn hessian_vec(
  obj: & mut dyn Objective, x: & [f64], grad: & [f64], v: & [f64]
) -> Res< Vec<f64> > {
  let eps = 1e-6 / norm(v).max(1e-12) ;
  let mut shifted = x.to_vec() ;
  axpy(& mut shifted, eps, v) ;
  let (_, grad_shifted) = eval_checked(obj, & shifted) ? ;
  // Maximization gradients flip sign for the minimization Hessian.
  Ok(
    grad.iter().zip( grad_shifted.iter() ).map(
      |(g, gs)| (g - gs) / eps
    ).collect()
  )
}

fn ncg(
  obj: & mut dyn Objective, mut x: Vec<f64>, params: & OptParams
) -> Res< Vec<f64> > {
  let (mut f, mut grad) = eval_checked(obj, & x) ? ;
  for _ in 0..params.maxiter {
    let gnorm = norm(& grad) ;
    if gnorm < params.gtol { break }

    // Inner CG solve of `H d = g` (minimization side `H d = -∇(-f)`),
    // truncated on negative curvature.
    let n = x.len() ;
    let mut d = vec![ 0. ; n ] ;
    let mut r = grad.clone() ;
    let mut p = r.clone() ;
    let tol = gnorm * (gnorm.sqrt()).min(0.5) ;
    for _ in 0..n.max(1) {
      if norm(& r) <= tol { break }
      let hp = hessian_vec(obj, & x, & grad, & p) ? ;
      let php = dot(& p, & hp) ;
      if php <= 1e-12 {
        if d.iter().all( |& d| d == 0. ) {
          d = grad.clone()
        }
        break
      }
      let alpha = dot(& r, & r) / php ;
      axpy(& mut d, alpha, & p) ;
      let r_prev = dot(& r, & r) ;
      axpy(& mut r, - alpha, & hp) ;
      let beta = dot(& r, & r) / r_prev ;
      p = r.iter().zip( p.iter() ).map(
        |(r, p)| r + beta * p
      ).collect()
    }
    if d.iter().all( |& d| d == 0. ) {
      d = grad.clone()
    }

    let (x_new, f_new, grad_new) = match line_search(
      obj, & x, f, & grad, & d
    ) ? {
      Some(next) => next,
      None => break,
    } ;
    let delta = (f_new - f).abs() ;
    let step = norm(
      & x_new.iter().zip( x.iter() ).map(
        |(n, o)| n - o
      ).collect::< Vec<f64> >()
    ) ;
    x = x_new ;
    f = f_new ;
    grad = grad_new ;
    if step < params.xtol || delta < params.ftol { break }
  }
  Ok(x)
}


fn diagonal_newton(
  obj: & mut dyn Objective, mut x: Vec<f64>, params: & OptParams
) -> Res< Vec<f64> > {
  let (mut f, mut grad) = eval_checked(obj, & x) ? ;
  let mut lambda = 1.0f64 ;
  for _ in 0..params.maxiter {
    if norm(& grad) < params.gtol { break }

    let diag = match obj.hessian_diag(& x) {
      Some(diag) => diag,
      None => {
        // Finite-difference fallback, one probe per dimension.
        let mut diag = Vec::with_capacity( x.len() ) ;
        for i in 0..x.len() {
          let mut v = vec![ 0. ; x.len() ] ;
          v[i] = 1. ;
          let hv = hessian_vec(obj, & x, & grad, & v) ? ;
          diag.push( hv[i] )
        }
        diag
      },
    } ;

    // Damped scaled step `g / (|h| + λ)`.
    let mut candidate = x.clone() ;
    for ( (c, & g), & h ) in candidate.iter_mut().zip(
      grad.iter()
    ).zip( diag.iter() ) {
      * c += g / ( h.abs() + lambda )
    }
    match eval_checked(obj, & candidate) {
      Ok( (f_new, grad_new) ) if f_new > f => {
        // Accepted: relax the damping.
        let delta = f_new - f ;
        x = candidate ;
        f = f_new ;
        grad = grad_new ;
        lambda = ( lambda * 0.5 ).max(1e-8) ;
        if delta < params.ftol { break }
      },
      Ok(_) => {
        lambda *= 4. ;
        if lambda > 1e12 { break }
      },
      Err(ref e) if e.is_numerical() => {
        lambda *= 4. ;
        if lambda > 1e12 { break }
      },
      Err(e) => return Err(e),
    }
  }
  Ok(x)
}


/// One-dimensional maximization by step halving in both directions,
/// used by the derivative-free methods.
fn line_max(
  obj: & mut dyn Objective, x: & [f64], f: f64, dir: & [f64],
) -> Res< Option<(Vec<f64>, f64)> > {
  let mut best: Option<(Vec<f64>, f64, f64)> = None ;
  for & sign in & [ 1.0f64, -1. ] {
    let mut step = 1.0f64 ;
    for _ in 0..20 {
      let mut candidate = x.to_vec() ;
      axpy(& mut candidate, sign * step, dir) ;
      if let Ok( (f_new, _) ) = eval_checked(obj, & candidate) {
        let better = match best {
          None => f_new > f,
          Some( (_, best_f, _) ) => f_new > best_f,
        } ;
        if better {
          best = Some( (candidate, f_new, step) )
        }
      }
      step *= 0.5
    }
  }
  Ok( best.map( |(x, f, _)| (x, f) ) )
}

fn powell(
  obj: & mut dyn Objective, mut x: Vec<f64>, params: & OptParams
) -> Res< Vec<f64> > {
  let n = x.len() ;
  let mut dirs: Vec< Vec<f64> > = (0..n).map(
    |i| (0..n).map( |j| if i == j { 1. } else { 0. } ).collect()
  ).collect() ;

  let (mut f, _) = eval_checked(obj, & x) ? ;
  for _ in 0..params.maxiter {
    let f_start = f ;
    let x_start = x.clone() ;
    let mut biggest = (0, 0.) ;
    for (pos, dir) in dirs.iter().enumerate() {
      if let Some( (x_new, f_new) ) = line_max(obj, & x, f, dir) ? {
        let gain = f_new - f ;
        if gain > biggest.1 { biggest = (pos, gain) }
        x = x_new ;
        f = f_new
      }
    }
    if f - f_start < params.ftol { break }

    // Replace the most successful direction with the overall move.
    let overall: Vec<f64> = x.iter().zip( x_start.iter() ).map(
      |(n, o)| n - o
    ).collect() ;
    if norm(& overall) > params.xtol {
      dirs[biggest.0] = overall
    }
  }
  Ok(x)
}


fn nelder_mead(
  obj: & mut dyn Objective, start: Vec<f64>, params: & OptParams
) -> Res< Vec<f64> > {
  let n = start.len() ;
  // Simplex of n+1 points, value-sorted, best first. Works on the
  // maximization objective directly.
  let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1) ;
  let (f0, _) = eval_checked(obj, & start) ? ;
  simplex.push( (start.clone(), f0) ) ;
  for i in 0..n {
    let mut point = start.clone() ;
    point[i] += if point[i] == 0. { 0.05 } else { 0.1 * point[i] } ;
    let f = match eval_checked(obj, & point) {
      Ok( (f, _) ) => f,
      Err(_) => ::std::f64::NEG_INFINITY,
    } ;
    simplex.push( (point, f) )
  }

  let value = |obj: & mut dyn Objective, point: & [f64]| -> f64 {
    match eval_checked(obj, point) {
      Ok( (f, _) ) => f,
      Err(_) => ::std::f64::NEG_INFINITY,
    }
  } ;

  for _ in 0..params.maxiter {
    simplex.sort_by(
      |l, r| r.1.partial_cmp(& l.1).expect("simplex values are ordered")
    ) ;
    if (simplex[0].1 - simplex[n].1).abs() < params.ftol { break }

    // Centroid of all but the worst.
    let mut centroid = vec![ 0. ; n ] ;
    for & (ref point, _) in & simplex[..n] {
      axpy(& mut centroid, 1. / n as f64, point)
    }
    let worst = simplex[n].clone() ;

    let reflect: Vec<f64> = centroid.iter().zip(
      worst.0.iter()
    ).map( |(c, w)| c + (c - w) ).collect() ;
    let f_reflect = value(obj, & reflect) ;

    if f_reflect > simplex[0].1 {
      // Try to expand.
      let expand: Vec<f64> = centroid.iter().zip(
        worst.0.iter()
      ).map( |(c, w)| c + 2. * (c - w) ).collect() ;
      let f_expand = value(obj, & expand) ;
      simplex[n] = if f_expand > f_reflect {
        (expand, f_expand)
      } else {
        (reflect, f_reflect)
      }
    } else if f_reflect > simplex[n - 1].1 {
      simplex[n] = (reflect, f_reflect)
    } else {
      // Contract towards the centroid.
      let contract: Vec<f64> = centroid.iter().zip(
        worst.0.iter()
      ).map( |(c, w)| c + 0.5 * (w - c) ).collect() ;
      let f_contract = value(obj, & contract) ;
      if f_contract > worst.1 {
        simplex[n] = (contract, f_contract)
      } else {
        // Shrink towards the best point.
        let best = simplex[0].0.clone() ;
        for & mut (ref mut point, ref mut f) in simplex.iter_mut().skip(1) {
          for (p, & b) in point.iter_mut().zip( best.iter() ) {
            * p = b + 0.5 * (* p - b)
          }
          * f = value(obj, point)
        }
      }
    }
  }

  simplex.sort_by(
    |l, r| r.1.partial_cmp(& l.1).expect("simplex values are ordered")
  ) ;
  Ok( simplex.remove(0).0 )
}


#[cfg(test)]
mod test {
  use super::* ;

  /// Concave quadratic `-(x - t)^2` summed over dimensions.
  struct Quadratic {
    target: Vec<f64>,
  }
  impl Objective for Quadratic {
    fn eval(& mut self, weights: & [f64]) -> Res<(f64, Vec<f64>)> {
      let mut f = 0. ;
      let mut grad = Vec::with_capacity( weights.len() ) ;
      for (& w, & t) in weights.iter().zip( self.target.iter() ) {
        f -= (w - t) * (w - t) ;
        grad.push( - 2. * (w - t) )
      }
      Ok( (f, grad) )
    }
    fn hessian_diag(& mut self, _: & [f64]) -> Option< Vec<f64> > {
      Some( vec![ 2. ; self.target.len() ] )
    }
  }

  fn params() -> OptParams {
    OptParams {
      maxiter: 500, gtol: 1e-6, xtol: 1e-10, ftol: 1e-12,
      learning_rate: 0.1,
    }
  }

  fn check(method: OptMethod, tol: f64) {
    let target = vec![ 1.5, -2., 0.25 ] ;
    let mut obj = Quadratic { target: target.clone() } ;
    let res = maximize(
      method, & mut obj, vec![ 0. ; 3 ], & params()
    ).expect("optimizes") ;
    for (r, t) in res.iter().zip( target.iter() ) {
      assert!(
        (r - t).abs() < tol,
        "{:?}: {:?} vs {:?}", method, res, target
      )
    }
  }

  #[test]
  fn bfgs_quadratic() { check( OptMethod::Bfgs, 1e-4 ) }
  #[test]
  fn cg_quadratic() { check( OptMethod::Cg, 1e-4 ) }
  #[test]
  fn ncg_quadratic() { check( OptMethod::Ncg, 1e-3 ) }
  #[test]
  fn lbfgs_quadratic() { check( OptMethod::Lbfgsb, 1e-4 ) }
  #[test]
  fn direct_descent_quadratic() { check( OptMethod::DirectDescent, 1e-3 ) }
  #[test]
  fn diagonal_newton_quadratic() {
    check( OptMethod::DiagonalNewton, 1e-3 )
  }
  #[test]
  fn powell_quadratic() { check( OptMethod::Powell, 0.05 ) }
  #[test]
  fn fmin_quadratic() { check( OptMethod::Fmin, 0.05 ) }

  #[test]
  fn non_finite_objective_is_numerical() {
    struct Bad ;
    impl Objective for Bad {
      fn eval(& mut self, w: & [f64]) -> Res<(f64, Vec<f64>)> {
        Ok( ( ::std::f64::NAN, vec![ 0. ; w.len() ] ) )
      }
    }
    let err = maximize(
      OptMethod::Bfgs, & mut Bad, vec![ 0. ], & params()
    ).unwrap_err() ;
    match * err.kind() {
      ErrorKind::Numerical(_) => (),
      ref kind => panic!( "unexpected error: {}", kind ),
    }
  }
}
