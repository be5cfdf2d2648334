//! String clustering for noisy-string domain reduction.
//!
//! Sequential agglomerative hierarchical non-overlapping (SAHN)
//! clustering over Levenshtein distance with complete linkage: two
//! clusters merge only while the distance between their farthest
//! members stays within the threshold. Merging the near-duplicate
//! spellings of a noisy domain shrinks it before grounding.

use common::* ;


/// Levenshtein edit distance, two-row dynamic programming.
pub fn levenshtein(left: & str, right: & str) -> usize {
  let left: Vec<char> = left.chars().collect() ;
  let right: Vec<char> = right.chars().collect() ;
  if left.is_empty() { return right.len() }
  if right.is_empty() { return left.len() }

  let mut prev: Vec<usize> = (0..right.len() + 1).collect() ;
  let mut curr = vec![ 0 ; right.len() + 1 ] ;
  for (row, & l) in left.iter().enumerate() {
    curr[0] = row + 1 ;
    for (col, & r) in right.iter().enumerate() {
      let subst = prev[col] + if l == r { 0 } else { 1 } ;
      curr[col + 1] = subst.min( prev[col + 1] + 1 ).min( curr[col] + 1 )
    }
    ::std::mem::swap(& mut prev, & mut curr)
  }
  prev[ right.len() ]
}


/// Complete-linkage distance between two clusters of string indices.
fn linkage(
  left: & [usize], right: & [usize], dists: & [Vec<usize>]
) -> usize {
  let mut max = 0 ;
  for & l in left {
    for & r in right {
      max = max.max( dists[l][r] )
    }
  }
  max
}

/// Clusters strings by edit distance. Two strings land in the same
/// cluster only if every pair of members is within `max_distance`
/// edits. Clusters are returned in order of their smallest member
/// index, members in input order.
pub fn cluster(strings: & [String], max_distance: usize) -> Vec< Vec<String> > {
  let count = strings.len() ;
  let dists: Vec< Vec<usize> > = (0..count).map(
    |l| (0..count).map(
      |r| levenshtein( & strings[l], & strings[r] )
    ).collect()
  ).collect() ;

  let mut clusters: Vec< Vec<usize> > = (0..count).map(
    |idx| vec![ idx ]
  ).collect() ;

  // Greedy SAHN: merge the closest admissible pair until none is left.
  loop {
    let mut best: Option<(usize, usize, usize)> = None ;
    for l in 0..clusters.len() {
      for r in l + 1..clusters.len() {
        let dist = linkage( & clusters[l], & clusters[r], & dists ) ;
        if dist <= max_distance {
          let better = match best {
            None => true,
            Some( (_, _, best_dist) ) => dist < best_dist,
          } ;
          if better { best = Some( (l, r, dist) ) }
        }
      }
    }
    match best {
      Some( (l, r, _) ) => {
        let right = clusters.remove(r) ;
        clusters[l].extend(right) ;
        clusters[l].sort()
      },
      None => break,
    }
  }

  clusters.sort_by_key( |cluster| cluster[0] ) ;
  clusters.into_iter().map(
    |cluster| cluster.into_iter().map(
      |idx| strings[idx].clone()
    ).collect()
  ).collect()
}

/// Representative of a cluster: the member minimizing the summed
/// distance to the others, ties broken by input order.
pub fn representative(cluster: & [String]) -> Option<& String> {
  let mut best: Option<(& String, usize)> = None ;
  for member in cluster {
    let total: usize = cluster.iter().map(
      |other| levenshtein(member, other)
    ).sum() ;
    let better = match best {
      None => true,
      Some( (_, best_total) ) => total < best_total,
    } ;
    if better { best = Some( (member, total) ) }
  }
  best.map( |(member, _)| member )
}


#[cfg(test)]
mod test {
  use super::* ;

  #[test]
  fn edit_distance() {
    assert_eq!( levenshtein("kitten", "sitting"), 3 ) ;
    assert_eq!( levenshtein("", "abc"), 3 ) ;
    assert_eq!( levenshtein("abc", "abc"), 0 ) ;
    assert_eq!( levenshtein("flaw", "lawn"), 2 )
  }

  #[test]
  fn groups_near_duplicates() {
    let strings: Vec<String> = [
      "Springfield", "Sprngfield", "Springfeld", "Boston", "Bostn",
    ].iter().map( |s| s.to_string() ).collect() ;
    let clusters = cluster(& strings, 2) ;
    assert_eq!( clusters.len(), 2 ) ;
    assert_eq!( clusters[0].len(), 3 ) ;
    assert_eq!( clusters[1].len(), 2 )
  }

  #[test]
  fn complete_linkage_blocks_chaining() {
    // `aabb` is within 2 of both ends but the ends are 4 apart, so
    // complete linkage forbids one big cluster.
    let strings: Vec<String> = [ "aaaa", "aabb", "bbbb" ].iter().map(
      |s| s.to_string()
    ).collect() ;
    let clusters = cluster(& strings, 2) ;
    assert_eq!( clusters.len(), 2 )
  }

  #[test]
  fn zero_threshold_keeps_exact_duplicates_only() {
    let strings: Vec<String> = [ "x", "x", "y" ].iter().map(
      |s| s.to_string()
    ).collect() ;
    let clusters = cluster(& strings, 0) ;
    assert_eq!( clusters, vec![
      vec![ "x".to_string(), "x".to_string() ],
      vec![ "y".to_string() ],
    ] )
  }

  #[test]
  fn representative_is_the_most_central_member() {
    let cluster: Vec<String> = [
      "Springfield", "Sprngfield", "Springfeld",
    ].iter().map( |s| s.to_string() ).collect() ;
    assert_eq!(
      representative(& cluster), Some( & "Springfield".to_string() )
    )
  }
}
