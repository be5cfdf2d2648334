//! Entry point for the binary.

extern crate env_logger ;
extern crate rmln ;

use rmln::common::* ;

/// Exit code of an error, by kind: `1` for input problems, `3` for
/// external solver problems, `4` for timeouts, `2` for everything
/// else.
fn exit_code(err: & Error) -> i32 {
  match * err.kind() {
    ErrorKind::ParseError(_)
    | ErrorKind::NoSuchPredicate(_)
    | ErrorKind::Io(_) => 1,
    ErrorKind::SolverSpawn(_) => 3,
    ErrorKind::Timeout => 4,
    _ => 2,
  }
}

fn main() {
  env_logger::init() ;

  // Work and report error if any.
  if let Err(errs) = ::rmln::work() {
    let code = exit_code(& errs) ;
    let errs = match * errs.kind() {
      ErrorKind::SolverSpawn(ref cmd) => format!(
        "could not spawn the WCSP solver using command `{}`\n\
        make sure the binary has that name and is in your path,\n\
        or specify a different command with option `{}`",
        conf.emph(cmd),
        conf.emph("--solver")
      ).into(),
      _ => errs,
    } ;
    print_err(& errs) ;
    ::std::process::exit(code)
  } else {
    ::std::process::exit(0)
  }
}
