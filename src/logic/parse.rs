//! Formula parsing.
//!
//! Two grammars share the parser. The *standard* grammar takes lower-case
//! identifiers as variables and upper-case identifiers, numbers or quoted
//! strings as constants. The *PRAC* grammar marks variables with a leading
//! `?` and accepts any other identifier as a constant.
//!
//! Operator precedence, loosest first: `<=>`, `=>`, `v`, `^`, `!`,
//! `EXIST`, atoms and `(in)equality`.

use common::* ;
use logic::{ Formula, Term } ;


/// Parses a formula.
pub fn parse_formula(text: & str, prac: bool) -> Res<Formula> {
  let mut parser = Parser::new(text, prac) ;
  let res = parser.biimpl() ? ;
  parser.ws_cmt() ;
  if ! parser.eof() {
    bail!( parser.error(parser.cursor, "expected end of formula") )
  }
  Ok(res)
}


/// Formula parser.
pub struct Parser<'s> {
  /// Text being parsed.
  string: & 's str,
  /// Current position in the text.
  cursor: usize,
  /// PRAC grammar flag.
  prac: bool,
}

impl<'s> Parser<'s> {

  /// Constructor.
  pub fn new(string: & 's str, prac: bool) -> Self {
    Parser { string, cursor: 0, prac }
  }

  /// True if there's no more text to parse.
  pub fn eof(& self) -> bool {
    self.cursor >= self.string.len()
  }

  /// Generates a parse error at the given position.
  pub fn error<S: Into<String>>(& self, pos: usize, msg: S) -> ErrorKind {
    let msg = msg.into() ;
    let mut line_count = 0 ;
    let mut line_start = 0 ;
    for (idx, char) in self.string.char_indices() {
      if idx >= pos { break }
      if char == '\n' {
        line_count += 1 ;
        line_start = idx + 1
      }
    }
    let line_end = self.string[pos..].find('\n').map(
      |off| pos + off
    ).unwrap_or( self.string.len() ) ;
    let pref = self.string[line_start..pos].to_string() ;
    let mut token_end = pos ;
    for (idx, char) in self.string[pos..line_end].char_indices() {
      if idx > 0 && ! (
        char.is_alphanumeric() || char == '_'
      ) { break }
      token_end = pos + idx + char.len_utf8()
    }
    let token = if pos < line_end {
      self.string[pos..token_end].to_string()
    } else {
      "<eof>".to_string()
    } ;
    let suff = if token_end < line_end {
      self.string[token_end..line_end].to_string()
    } else {
      "".to_string()
    } ;
    ErrorKind::ParseError(
      ParseErrorData {
        msg, pref, token, suff, line: Some(line_count + 1),
      }
    )
  }

  /// Parses some whitespace and comments.
  pub fn ws_cmt(& mut self) {
    let mut done = false ;
    while ! done {
      done = true ;
      while let Some(char) = self.peek() {
        if char.is_whitespace() {
          self.cursor += char.len_utf8()
        } else {
          break
        }
      }
      if self.tag_opt("//") {
        done = false ;
        while let Some(char) = self.peek() {
          self.cursor += char.len_utf8() ;
          if char == '\n' { break }
        }
      } else if self.tag_opt("/*") {
        done = false ;
        while ! self.eof() && ! self.tag_opt("*/") {
          let char = self.peek().expect("not at eof") ;
          self.cursor += char.len_utf8()
        }
      }
    }
  }

  /// Next character, without advancing.
  fn peek(& self) -> Option<char> {
    self.string[self.cursor..].chars().next()
  }

  /// Parses a tag if it's next, returns true on success.
  fn tag_opt(& mut self, tag: & str) -> bool {
    if self.string[self.cursor..].starts_with(tag) {
      self.cursor += tag.len() ;
      true
    } else {
      false
    }
  }

  /// Parses a keyword if it's next and followed by a word boundary.
  fn kw_opt(& mut self, kw: & str) -> bool {
    if self.string[self.cursor..].starts_with(kw) {
      let after = self.string[self.cursor + kw.len()..].chars().next() ;
      match after {
        Some(char) if char.is_alphanumeric() || char == '_' => false,
        _ => {
          self.cursor += kw.len() ;
          true
        },
      }
    } else {
      false
    }
  }

  /// Parses an identifier-like token: an identifier, a number, or a
  /// quoted string.
  fn token_opt(& mut self) -> Option<& 's str> {
    let start = self.cursor ;
    match self.peek() {
      Some('"') => {
        self.cursor += 1 ;
        while let Some(char) = self.peek() {
          self.cursor += char.len_utf8() ;
          if char == '"' { break }
        }
        Some( & self.string[start..self.cursor] )
      },
      Some(char) if char.is_alphanumeric() || char == '_' => {
        while let Some(char) = self.peek() {
          if char.is_alphanumeric() || char == '_' || char == '\'' {
            self.cursor += char.len_utf8()
          } else {
            break
          }
        }
        Some( & self.string[start..self.cursor] )
      },
      _ => None,
    }
  }

  /// True if a token is a variable under the active grammar.
  fn is_var(& self, token: & str) -> bool {
    if token.starts_with('?') {
      true
    } else if self.prac {
      false
    } else {
      token.chars().next().map(
        |char| char.is_lowercase()
      ).unwrap_or(false)
    }
  }

  /// Parses a term: an optional `+` template marker followed by a
  /// variable or a constant.
  fn term(& mut self) -> Res<Term> {
    let start = self.cursor ;
    let tmpl = self.tag_opt("+") ;
    let mut name = String::new() ;
    if self.tag_opt("?") {
      name.push('?')
    }
    match self.token_opt() {
      Some(token) => name.push_str(token),
      None => if name.is_empty() {
        bail!( self.error(start, "expected a term") )
      } else {
        bail!( self.error(self.cursor, "expected a variable name") )
      },
    }
    if self.is_var(& name) {
      Ok( Term::Var(name, tmpl) )
    } else if tmpl {
      bail!(
        self.error(start, "the `+` template marker only applies to variables")
      )
    } else {
      Ok( Term::Cst( sym(name) ) )
    }
  }

  /// Parses a biimplication chain.
  pub fn biimpl(& mut self) -> Res<Formula> {
    let mut res = self.implication() ? ;
    loop {
      self.ws_cmt() ;
      if self.tag_opt("<=>") {
        self.ws_cmt() ;
        let rhs = self.implication() ? ;
        res = Formula::Biimpl( Box::new(res), Box::new(rhs) )
      } else {
        return Ok(res)
      }
    }
  }

  /// Parses an implication (right-associative).
  fn implication(& mut self) -> Res<Formula> {
    let lhs = self.disj() ? ;
    self.ws_cmt() ;
    if self.tag_opt("=>") {
      self.ws_cmt() ;
      let rhs = self.implication() ? ;
      Ok( Formula::Impl( Box::new(lhs), Box::new(rhs) ) )
    } else {
      Ok(lhs)
    }
  }

  /// Parses a disjunction.
  fn disj(& mut self) -> Res<Formula> {
    let mut kids = vec![ self.conj() ? ] ;
    loop {
      self.ws_cmt() ;
      if self.kw_opt("v") {
        self.ws_cmt() ;
        kids.push( self.conj() ? )
      } else {
        break
      }
    }
    if kids.len() == 1 {
      Ok( kids.pop().expect("kids has exactly one element") )
    } else {
      Ok( Formula::Disj(kids) )
    }
  }

  /// Parses a conjunction.
  fn conj(& mut self) -> Res<Formula> {
    let mut kids = vec![ self.unary() ? ] ;
    loop {
      self.ws_cmt() ;
      if self.tag_opt("^") {
        self.ws_cmt() ;
        kids.push( self.unary() ? )
      } else {
        break
      }
    }
    if kids.len() == 1 {
      Ok( kids.pop().expect("kids has exactly one element") )
    } else {
      Ok( Formula::Conj(kids) )
    }
  }

  /// Parses a negation, a quantifier, a parenthesized formula, or an
  /// atom.
  fn unary(& mut self) -> Res<Formula> {
    self.ws_cmt() ;
    if self.tag_opt("!") {
      self.ws_cmt() ;
      let kid = self.unary() ? ;
      Ok(
        match kid {
          Formula::Lit { neg, star, pred, args } => Formula::Lit {
            neg: ! neg, star, pred, args
          },
          Formula::Eq { neg, lhs, rhs } => Formula::Eq {
            neg: ! neg, lhs, rhs
          },
          kid => Formula::Neg( Box::new(kid) ),
        }
      )
    } else if self.kw_opt("EXIST") || self.kw_opt("EXISTS") {
      self.ws_cmt() ;
      let mut vars = Vec::new() ;
      loop {
        let start = self.cursor ;
        match self.term() ? {
          Term::Var(name, false) => vars.push(name),
          _ => bail!(
            self.error(start, "expected a quantified variable")
          ),
        }
        self.ws_cmt() ;
        if ! self.tag_opt(",") {
          break
        }
        self.ws_cmt()
      }
      let kid = self.unary() ? ;
      Ok( Formula::Exist( vars, Box::new(kid) ) )
    } else if self.tag_opt("(") {
      let res = self.biimpl() ? ;
      self.ws_cmt() ;
      if ! self.tag_opt(")") {
        bail!( self.error(self.cursor, "expected closing parenthesis") )
      }
      Ok(res)
    } else {
      let star = self.tag_opt("*") ;
      self.atom_or_eq(star)
    }
  }

  /// Parses a predicate application or an (in)equality constraint.
  fn atom_or_eq(& mut self, star: bool) -> Res<Formula> {
    let start = self.cursor ;
    if self.kw_opt("TRUE") {
      return Ok( Formula::TrueFalse(1.) )
    } else if self.kw_opt("FALSE") {
      return Ok( Formula::TrueFalse(0.) )
    }
    let lhs = self.term() ? ;
    self.ws_cmt() ;
    if self.tag_opt("(") {
      // Predicate application.
      let pred = match lhs {
        Term::Cst(cst) => cst.get().clone(),
        Term::Var(name, false) if ! name.starts_with('?') => name,
        _ => bail!(
          self.error(start, "expected a predicate name")
        ),
      } ;
      let mut args = Vec::new() ;
      self.ws_cmt() ;
      if ! self.tag_opt(")") {
        loop {
          args.push( self.term() ? ) ;
          self.ws_cmt() ;
          if self.tag_opt(",") {
            self.ws_cmt()
          } else if self.tag_opt(")") {
            break
          } else {
            bail!(
              self.error(self.cursor, "expected `,` or `)` in argument list")
            )
          }
        }
      }
      Ok( Formula::Lit { neg: false, star, pred, args } )
    } else if self.tag_opt("=/=") || self.tag_opt("!=") {
      self.ws_cmt() ;
      let rhs = self.term() ? ;
      Ok( Formula::Eq { neg: true, lhs, rhs } )
    } else if self.tag_opt("=") {
      self.ws_cmt() ;
      let rhs = self.term() ? ;
      Ok( Formula::Eq { neg: false, lhs, rhs } )
    } else if star {
      bail!(
        self.error(start, "the `*` marker only applies to literals")
      )
    } else {
      bail!(
        self.error(self.cursor, "expected a predicate application")
      )
    }
  }
}


#[cfg(test)]
mod test {
  use super::parse_formula ;
  use logic::{ Formula, Term } ;
  use common::* ;

  #[test]
  fn standard_grammar() {
    let f = parse_formula(
      "Smokes(x) => Cancer(x)", false
    ).expect("parses") ;
    match f {
      Formula::Impl(ref lhs, _) => match ** lhs {
        Formula::Lit { neg: false, ref pred, ref args, .. } => {
          assert_eq!(pred, "Smokes") ;
          assert_eq!(args, & vec![ Term::Var("x".into(), false) ])
        },
        ref f => panic!("unexpected lhs {:?}", f),
      },
      ref f => panic!("unexpected formula {:?}", f),
    }
  }

  #[test]
  fn prac_grammar() {
    let f = parse_formula(
      "Friends(?x, ?y) ^ Smokes(?x) => Smokes(?y)", true
    ).expect("parses") ;
    // `x` without `?` is a constant under the PRAC grammar.
    let g = parse_formula("Smokes(x)", true).expect("parses") ;
    match g {
      Formula::Lit { ref args, .. } => assert_eq!(
        args, & vec![ Term::Cst( sym("x") ) ]
      ),
      ref g => panic!("unexpected formula {:?}", g),
    }
    match f {
      Formula::Impl(..) => (),
      ref f => panic!("unexpected formula {:?}", f),
    }
  }

  #[test]
  fn precedence() {
    let f = parse_formula(
      "A(x) v B(x) ^ C(x) => D(x)", false
    ).expect("parses") ;
    // `^` binds tighter than `v`, which binds tighter than `=>`.
    match f {
      Formula::Impl(ref lhs, _) => match ** lhs {
        Formula::Disj(ref kids) => {
          assert_eq!(kids.len(), 2) ;
          match kids[1] {
            Formula::Conj(_) => (),
            ref f => panic!("unexpected disjunct {:?}", f),
          }
        },
        ref f => panic!("unexpected lhs {:?}", f),
      },
      ref f => panic!("unexpected formula {:?}", f),
    }
  }

  #[test]
  fn equality_and_templates() {
    let f = parse_formula(
      "x =/= y ^ Foo(+x, y)", false
    ).expect("parses") ;
    match f {
      Formula::Conj(ref kids) => {
        match kids[0] {
          Formula::Eq { neg: true, .. } => (),
          ref f => panic!("unexpected conjunct {:?}", f),
        }
        match kids[1] {
          Formula::Lit { ref args, .. } => assert!(
            args[0].is_template()
          ),
          ref f => panic!("unexpected conjunct {:?}", f),
        }
      },
      ref f => panic!("unexpected formula {:?}", f),
    }
  }

  #[test]
  fn negated_literal() {
    let f = parse_formula("!Smokes(x)", false).expect("parses") ;
    match f {
      Formula::Lit { neg: true, .. } => (),
      ref f => panic!("unexpected formula {:?}", f),
    }
  }

  #[test]
  fn exist() {
    let f = parse_formula(
      "EXIST y (Friends(x, y))", false
    ).expect("parses") ;
    match f {
      Formula::Exist(ref vars, _) => assert_eq!(
        vars, & vec![ "y".to_string() ]
      ),
      ref f => panic!("unexpected formula {:?}", f),
    }
  }

  #[test]
  fn unbalanced_brackets() {
    assert!(
      parse_formula("(Smokes(x) => Cancer(x)", false).is_err()
    ) ;
    assert!(
      parse_formula("Smokes(x))", false).is_err()
    )
  }

  #[test]
  fn write_parse_round_trip() {
    for text in & [
      "Smokes(x) => Cancer(x)",
      "Friends(x,y) ^ Smokes(x) => Smokes(y)",
      "A(x) v (B(x) ^ C(x))",
      "!(A(x) v B(x)) <=> C(x)",
      "x =/= y => !Same(x,y)",
    ] {
      let f = parse_formula(text, false).expect("parses") ;
      let written = format!("{}", f) ;
      let re = parse_formula(& written, false).unwrap_or_else(
        |e| panic!("re-parsing `{}` failed: {}", written, e)
      ) ;
      assert_eq!(f, re, "round trip through `{}`", written)
    }
  }
}
