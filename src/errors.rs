//! Error types.
//!
//! [`ErrorKind::Unsat`][unsat] is handled as an error so that it propagates
//! upwards naturally, although technically it is not really an error: it is
//! how inference reports that no admissible world exists (zero partition
//! function, or an external solver finding no solution).
//!
//! [unsat]: enum.ErrorKind.html#variant.Unsat
//! (Unsat variant of the ErrorKind enum)

use common::* ;



/// Parse error data.
#[derive(Debug)]
pub struct ParseErrorData {
  /// Error message.
  pub msg: String,
  /// Portion of the line *before* the error token.
  pub pref: String,
  /// Token that caused the error.
  pub token: String,
  /// Portion of the line *after* the error token.
  pub suff: String,
  /// Line of the error, relative to the portion of the input accessible by
  /// whoever constructed the error.
  pub line: Option<usize>,
}
impl_fmt!{
  ParseErrorData(self, fmt) {
    let line_str = if let Some(line) = self.line {
      format!("{} ", line)
    } else { "".into() } ;
    write!(
      fmt, "{}", self.msg
    ) ? ;
    if let Some(line) = self.line {
      writeln!(
        fmt, " at [{}]:", conf.emph(
          & format!("{}:{}", line, self.pref.len() + 1)
        )
      ) ?
    } else {
      writeln!(fmt, ":") ?
    }
    writeln!(
      fmt, "{0: ^1$}|", "", line_str.len()
    ) ? ;
    writeln!(
      fmt, "{}| {}{}{}",
      & line_str,
      conf.emph(& self.pref), conf.bad(& self.token), conf.emph(& self.suff)
    ) ? ;
    writeln!(
      fmt, "{0: ^1$}| {0: ^2$}{3}", "", line_str.len(), self.pref.len(),
      conf.bad( & format!("{0:^>1$}", "", self.token.len()) )
    )
  }
}

error_chain!{
  types {
    Error, ErrorKind, ResultExt, Res ;
  }

  foreign_links {
    Io(::std::io::Error) #[doc = "IO error."] ;
  }

  errors {
    #[doc = "Parse error."]
    ParseError(data: ParseErrorData) {
      description("parse error")
      display("{}", data)
    }
    #[doc = "A database or query mentions an undeclared predicate."]
    NoSuchPredicate(pred: String) {
      description("no such predicate")
      display("no such predicate `{}`", pred)
    }
    #[doc = "Evidence violates a mutex block or a hard formula."]
    InconsistentEvidence(msg: String) {
      description("inconsistent evidence")
      display("inconsistent evidence: {}", msg)
    }
    #[doc = "Not really an error, no admissible world early return."]
    Unsat {
      description("unsat")
      display("unsat")
    }
    #[doc = "WCSP integer rescaling exceeded the platform maximum."]
    CostOverflow {
      description("cost overflow")
      display("wcsp cost overflow")
    }
    #[doc = "An optimizer produced non-finite values."]
    Numerical(msg: String) {
      description("numerical error")
      display("numerical error: {}", msg)
    }
    #[doc = "Non-recoverable learning failure."]
    Learning(msg: String) {
      description("learning error")
      display("learning error: {}", msg)
    }
    #[doc = "Could not spawn the external WCSP solver."]
    SolverSpawn(cmd: String) {
      description("could not spawn solver")
      display("could not spawn solver `{}`", cmd)
    }
    #[doc = "Timeout reached."]
    Timeout {
      description("timeout")
      display("timeout")
    }
  }
}

impl Error {
  /// True if the kind of the error is [`ErrorKind::Unsat`][unsat].
  ///
  /// [unsat]: enum.ErrorKind.html#variant.Unsat
  /// (ErrorKind's Unsat variant)
  pub fn is_unsat(& self) -> bool {
    match * self.kind() {
      ErrorKind::Unsat => true,
      _ => false,
    }
  }

  /// True if the kind of the error is [`ErrorKind::Timeout`][timeout].
  ///
  /// [timeout]: enum.ErrorKind.html#variant.Timeout
  /// (ErrorKind's Timeout variant)
  pub fn is_timeout(& self) -> bool {
    match * self.kind() {
      ErrorKind::Timeout => true,
      _ => false,
    }
  }

  /// True if the error reports inconsistent evidence.
  pub fn is_inconsistent(& self) -> bool {
    match * self.kind() {
      ErrorKind::InconsistentEvidence(_) => true,
      _ => false,
    }
  }

  /// True if the error reports a non-finite optimization step.
  pub fn is_numerical(& self) -> bool {
    match * self.kind() {
      ErrorKind::Numerical(_) => true,
      _ => false,
    }
  }

  /// True for errors the CLI maps to the solver exit code.
  pub fn is_solver(& self) -> bool {
    match * self.kind() {
      ErrorKind::SolverSpawn(_) => true,
      _ => false,
    }
  }
}


/// Prints an error.
pub fn print_err(errs: & Error) {
  println!(
    "{}:", conf.bad("error")
  ) ;
  for err in errs.iter() {
    for line in format!("{}", err).lines() {
      println!("  {}", line)
    }
  }
}
