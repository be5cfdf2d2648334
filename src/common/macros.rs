//! Macros.


/// Does something if not in bench mode.
#[macro_export]
#[cfg(not (feature = "bench") )]
macro_rules! if_not_bench {
  ( then { $($then:tt)* } else { $($else:tt)* } ) => (
    $($then)*
  ) ;
  ($($blah:tt)*) => ($($blah)*) ;
}
#[cfg(feature = "bench")]
macro_rules! if_not_bench {
  ( then { $($then:tt)* } else { $($else:tt)* } ) => (
    $($else)*
  ) ;
  ($($blah:tt)*) => (()) ;
}


/// Gates something by an `if conf.verbose()`. Inactive in bench mode.
#[macro_export]
#[cfg(not(feature = "bench"))]
macro_rules! if_verb {
  ($($blah:tt)*) => (
    if conf.verbose() {
      $($blah)*
    }
  ) ;
}
#[cfg(feature = "bench")]
macro_rules! if_verb {
  ($($blah:tt)*) => (()) ;
}


/// Logs at info level, using `info!`. Inactive in bench mode.
#[cfg(feature = "bench")]
macro_rules! log_info {
  ($($tt:tt)*) => (()) ;
}
#[cfg(not(feature = "bench"))]
macro_rules! log_info {
  ($($tt:tt)*) => ( info!{$($tt)*} ) ;
}


/// Logs at debug level. Inactive in bench mode.
#[cfg( feature = "bench" )]
#[allow(unused_macros)]
macro_rules! log_debug {
  ($($tt:tt)*) => (()) ;
}
#[cfg( not(feature = "bench") )]
macro_rules! log_debug {
  ($($tt:tt)*) => ( debug!{$($tt)*} ) ;
}


/// Logs a warning, using `warn!`. Inactive in bench mode.
#[cfg(feature = "bench")]
macro_rules! log_warn {
  ($($tt:tt)*) => (()) ;
}
#[cfg(not(feature = "bench"))]
macro_rules! log_warn {
  ($($tt:tt)*) => ( warn!{$($tt)*} ) ;
}


/// `Display` implementation.
macro_rules! impl_fmt {
  ($t:ident ( $slf:ident, $fmt:ident ) $b:block) => (
    impl ::std::fmt::Display for $t {
      fn fmt(
        & $slf, $fmt: & mut ::std::fmt::Formatter
      ) -> ::std::fmt::Result $b
    }
  ) ;
}


/// Wraps a `usize` in a zero-cost index type, with an optional total map
/// from indices to some value.
macro_rules! wrap_usize {
  (
    $(#[$meta:meta])* $t:ident
    $(, map: $(#[$map_meta:meta])* $map:ident)*
    $(,)*
  ) => (
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default
    )]
    pub struct $t {
      val: usize
    }
    impl $t {
      /// Wraps a `usize`.
      #[inline]
      pub fn new(val: usize) -> Self { $t { val } }
      /// Zero.
      #[inline]
      pub fn zero() -> Self { $t { val: 0 } }
      /// Accessor.
      #[inline]
      pub fn get(& self) -> usize { self.val }
      /// Increments the index.
      #[inline]
      pub fn inc(& mut self) { self.val += 1 }
    }
    impl From<usize> for $t {
      fn from(val: usize) -> Self { $t { val } }
    }
    impl From<$t> for usize {
      fn from(idx: $t) -> usize { idx.val }
    }
    impl ::std::ops::Deref for $t {
      type Target = usize ;
      fn deref(& self) -> & usize { & self.val }
    }
    impl ::std::fmt::Display for $t {
      fn fmt(& self, fmt: & mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(fmt, "{}", self.val)
      }
    }

    $(
      $(#[$map_meta])*
      #[derive(Debug, Clone, PartialEq, Default)]
      pub struct $map<T> {
        vec: Vec<T>
      }
      impl<T> $map<T> {
        /// Empty map.
        #[inline]
        pub fn new() -> Self { $map { vec: Vec::new() } }
        /// Empty map with some capacity.
        #[inline]
        pub fn with_capacity(capa: usize) -> Self {
          $map { vec: Vec::with_capacity(capa) }
        }
        /// Number of elements.
        #[inline]
        pub fn len(& self) -> usize { self.vec.len() }
        /// True if the map is empty.
        #[inline]
        pub fn is_empty(& self) -> bool { self.vec.is_empty() }
        /// Pushes an element, returns its index.
        #[inline]
        pub fn push(& mut self, elem: T) -> $t {
          let idx = $t::new( self.vec.len() ) ;
          self.vec.push(elem) ;
          idx
        }
        /// Index of the next element pushed.
        #[inline]
        pub fn next_index(& self) -> $t { $t::new( self.vec.len() ) }
        /// Iterator over the elements.
        #[inline]
        pub fn iter(& self) -> ::std::slice::Iter<T> { self.vec.iter() }
        /// Mutable iterator over the elements.
        #[inline]
        pub fn iter_mut(& mut self) -> ::std::slice::IterMut<T> {
          self.vec.iter_mut()
        }
        /// Iterator over indices and elements.
        #[inline]
        pub fn index_iter(
          & self
        ) -> ::std::iter::Map<
          ::std::iter::Enumerate< ::std::slice::Iter<T> >,
          fn ((usize, & T)) -> ($t, & T)
        > {
          fn map<T>(pair: (usize, & T)) -> ($t, & T) {
            ($t::new(pair.0), pair.1)
          }
          self.vec.iter().enumerate().map(map as _)
        }
        /// Iterator over the indices.
        #[inline]
        pub fn indices(
          & self
        ) -> ::std::iter::Map< ::std::ops::Range<usize>, fn (usize) -> $t > {
          (0..self.vec.len()).map($t::new as _)
        }
      }
      impl<T> From< Vec<T> > for $map<T> {
        fn from(vec: Vec<T>) -> Self { $map { vec } }
      }
      impl<T> ::std::ops::Index<$t> for $map<T> {
        type Output = T ;
        fn index(& self, idx: $t) -> & T { & self.vec[idx.val] }
      }
      impl<T> ::std::ops::IndexMut<$t> for $map<T> {
        fn index_mut(& mut self, idx: $t) -> & mut T {
          & mut self.vec[idx.val]
        }
      }
      impl<'a, T> IntoIterator for & 'a $map<T> {
        type Item = & 'a T ;
        type IntoIter = ::std::slice::Iter<'a, T> ;
        fn into_iter(self) -> Self::IntoIter { self.vec.iter() }
      }
      impl<T> IntoIterator for $map<T> {
        type Item = T ;
        type IntoIter = ::std::vec::IntoIter<T> ;
        fn into_iter(self) -> Self::IntoIter { self.vec.into_iter() }
      }
    )*
  ) ;
}


/// Profiling macro.
///
/// If passed `self`, assumes `self` has a `_profiler` field.
#[macro_export]
#[cfg( not(feature = "bench") )]
macro_rules! profile {
  ( | $prof:ident | $stat:expr => add $e:expr ) => (
    $prof.stat_do( $stat, |val| val + $e )
  ) ;
  ( | $prof:ident | $meth:ident $( $scope:expr ),+ $(,)* ) => (
    $prof.$meth(
      vec![ $($scope),+ ]
    )
  ) ;
  ( $slf:ident $stat:expr => add $e:expr ) => ({
    let prof = & $slf._profiler ;
    profile!{ |prof| $stat => add $e }
  }) ;
  ( $slf:ident $meth:ident $( $scope:expr ),+ $(,)* ) => ({
    let prof = & $slf._profiler ;
    profile!{ |prof| $meth $($scope),+ }
  }) ;
}
#[cfg(feature = "bench")]
macro_rules! profile {
  ( $($tt:tt)* ) => (()) ;
}
