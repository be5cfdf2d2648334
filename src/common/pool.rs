//! Fixed-size worker pool.
//!
//! Fans self-contained units of work out to a fixed number of workers and
//! gathers the results. Each unit carries a deterministic key; results are
//! sorted by key before they are returned, so multicore execution does not
//! change the final ordering. A failing unit aborts the pool: remaining
//! units are dropped and the first error (in key order) is propagated.

use std::sync::atomic::{ AtomicBool, Ordering } ;

use common::* ;


/// Number of workers to use when multicore is active.
pub fn default_workers() -> usize {
  ::std::thread::available_parallelism().map(
    |n| n.get()
  ).unwrap_or(1)
}


/// Runs keyed jobs on `workers` threads and returns the results in key
/// order.
///
/// With `workers <= 1`, runs everything on the caller's thread.
pub fn run<J, R, F>(
  jobs: Vec<(usize, J)>, workers: usize, f: F
) -> Res< Vec<R> >
where J: Send + Sync, R: Send, F: Fn(usize, & J) -> Res<R> + Sync {
  if workers <= 1 || jobs.len() <= 1 {
    let mut res = Vec::with_capacity( jobs.len() ) ;
    for (key, job) in & jobs {
      res.push( (* key, f(* key, job) ?) )
    }
    res.sort_by_key( |& (key, _)| key ) ;
    return Ok( res.into_iter().map(|(_, r)| r).collect() )
  }

  let failed = AtomicBool::new(false) ;
  let queue = Mutex::new( jobs.iter() ) ;
  let (send, recv) = ::std::sync::mpsc::channel() ;

  ::std::thread::scope(
    |scope| {
      for _ in 0..workers {
        let send = send.clone() ;
        let queue = & queue ;
        let failed = & failed ;
        let f = & f ;
        scope.spawn(
          move || loop {
            if failed.load(Ordering::SeqCst) {
              break
            }
            let job = {
              let mut queue = match queue.lock() {
                Ok(queue) => queue,
                Err(_) => break,
              } ;
              queue.next()
            } ;
            let & (key, ref job) = match job {
              Some(job) => job,
              None => break,
            } ;
            let res = f(key, job) ;
            if res.is_err() {
              failed.store(true, Ordering::SeqCst)
            }
            if send.send( (key, res) ).is_err() {
              break
            }
          }
        ) ;
      }
    }
  ) ;
  ::std::mem::drop(send) ;

  let mut res: Vec<(usize, Res<R>)> = recv.iter().collect() ;
  res.sort_by_key( |& (key, _)| key ) ;
  let mut out = Vec::with_capacity( res.len() ) ;
  for (_, r) in res {
    out.push( r ? )
  }
  Ok(out)
}
