//! CFI Comparison and Ordering
//!
//! Implements comparison logic for CFIs to enable sorting annotations
//! and determining reading progress order.

use std::cmp::Ordering;

use super::parser::parse;
use super::types::*;

/// Compare two optional values; absence sorts before presence
fn compare_present<T>(a: Option<T>, b: Option<T>, cmp: impl FnOnce(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn compare_spatial(a: &Spatial, b: &Spatial) -> Ordering {
    a.y.total_cmp(&b.y).then_with(|| a.x.total_cmp(&b.x))
}

/// Qualifiers of a terminal step
fn compare_terminal(a: &Step, b: &Step) -> Ordering {
    if a.is_element_index() {
        let temporal = compare_present(a.temporal, b.temporal, |x, y| x.total_cmp(&y));
        if temporal != Ordering::Equal {
            return temporal;
        }
        let spatial = compare_present(a.spatial.as_ref(), b.spatial.as_ref(), compare_spatial);
        if spatial != Ordering::Equal {
            return spatial;
        }
    }
    compare_present(a.offset, b.offset, |x, y| x.cmp(&y))
}

/// Compare two step sequences position by position.
///
/// The side missing a step sorts first, and an index of 0 (the virtual
/// before-first position) ends the comparison as equal.
pub fn compare_parts(a: &[Step], b: &[Step]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let (step_a, step_b) = match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => (x, y),
            (None, _) => return Ordering::Less,
            (_, None) => return Ordering::Greater,
        };

        let cmp = step_a.node_index.cmp(&step_b.node_index);
        if cmp != Ordering::Equal {
            return cmp;
        }
        if step_a.node_index == 0 {
            return Ordering::Equal;
        }

        if i + 1 == a.len() && i + 1 == b.len() {
            return compare_terminal(step_a, step_b);
        }
    }
    Ordering::Equal
}

/// Compare two paths part by part; the side missing a part sorts first
pub fn compare_path(a: &Path, b: &Path) -> Ordering {
    let len = a.parts.len().max(b.parts.len());
    for i in 0..len {
        let cmp = match (a.parts.get(i), b.parts.get(i)) {
            (Some(x), Some(y)) => compare_parts(&x.steps, &y.steps),
            (None, _) => Ordering::Less,
            (_, None) => Ordering::Greater,
        };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

/// Compare two parsed CFIs.
///
/// Ranges compare by start, then end. A location compared with a range
/// stands in for the range's start.
pub fn compare(a: &ParsedCfi, b: &ParsedCfi) -> Ordering {
    match (a, b) {
        (ParsedCfi::Location(x), ParsedCfi::Location(y)) => compare_path(x, y),
        (ParsedCfi::Range(x), ParsedCfi::Range(y)) => compare_path(&x.from_path(), &y.from_path())
            .then_with(|| compare_path(&x.to_path(), &y.to_path())),
        (ParsedCfi::Location(x), ParsedCfi::Range(y)) => compare_path(x, &y.from_path()),
        (ParsedCfi::Range(x), ParsedCfi::Location(y)) => compare_path(&x.from_path(), y),
    }
}

/// Sort parsed CFIs in reading order (stable)
pub fn sort(cfis: &mut [ParsedCfi]) {
    cfis.sort_by(compare);
}

/// Determine if `a` comes before `b` in reading order
pub fn is_before(a: &ParsedCfi, b: &ParsedCfi) -> bool {
    compare(a, b) == Ordering::Less
}

/// Determine if `a` comes after `b` in reading order
pub fn is_after(a: &ParsedCfi, b: &ParsedCfi) -> bool {
    compare(a, b) == Ordering::Greater
}

/// Check if a CFI falls within `[start, end]`
pub fn is_in_range(cfi: &ParsedCfi, start: &ParsedCfi, end: &ParsedCfi) -> bool {
    compare(cfi, start) != Ordering::Less && compare(cfi, end) != Ordering::Greater
}

/// Compare two CFI strings, returning their ordering
/// Returns None if either CFI is invalid
pub fn compare_strings(a: &str, b: &str) -> Option<Ordering> {
    let cfi_a = parse(a).ok()?;
    let cfi_b = parse(b).ok()?;
    Some(compare(&cfi_a, &cfi_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> ParsedCfi {
        parse(s).unwrap()
    }

    #[test]
    fn test_cfi_ordering_same_chapter() {
        let a = p("epubcfi(/6/4!/4/2/1:10)");
        let b = p("epubcfi(/6/4!/4/2/1:20)");

        assert_eq!(compare(&a, &b), Ordering::Less);
        assert!(is_before(&a, &b));
        assert!(is_after(&b, &a));
    }

    #[test]
    fn test_cfi_ordering_different_chapters() {
        let a = p("epubcfi(/6/4!/4/2)");
        let b = p("epubcfi(/6/6!/4/2)");
        assert!(is_before(&a, &b));
    }

    #[test]
    fn test_cfi_ordering_nested_depth() {
        let a = p("epubcfi(/6/4!/4/2)");
        let b = p("epubcfi(/6/4!/4/2/1)");

        // Deeper path comes after shallower path
        assert!(is_before(&a, &b));
    }

    #[test]
    fn test_missing_part_sorts_first() {
        let a = p("epubcfi(/6/4)");
        let b = p("epubcfi(/6/4!/2)");
        assert!(is_before(&a, &b));
    }

    #[test]
    fn test_zero_index_is_terminal() {
        let a = p("epubcfi(/4/0/2)");
        let b = p("epubcfi(/4/0/8)");
        assert_eq!(compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_temporal_and_spatial_on_elements() {
        let a = p("epubcfi(/4/2~1.5)");
        let b = p("epubcfi(/4/2~3)");
        let none = p("epubcfi(/4/2)");
        assert!(is_before(&a, &b));
        assert!(is_before(&none, &a));

        let low = p("epubcfi(/4/2@90:10)");
        let high = p("epubcfi(/4/2@10:20)");
        assert!(is_before(&low, &high));
    }

    #[test]
    fn test_offset_absent_sorts_first() {
        let a = p("epubcfi(/4/2/1)");
        let b = p("epubcfi(/4/2/1:0)");
        assert!(is_before(&a, &b));
    }

    #[test]
    fn test_range_comparison() {
        let r1 = p("epubcfi(/4/2,/1:0,/1:5)");
        let r2 = p("epubcfi(/4/2,/1:0,/1:9)");
        let r3 = p("epubcfi(/4/2,/1:3,/1:4)");
        assert!(is_before(&r1, &r2));
        assert!(is_before(&r2, &r3));

        let loc = p("epubcfi(/4/2/1:0)");
        assert_eq!(compare(&loc, &r1), Ordering::Equal);
        assert!(is_before(&loc, &r3));
    }

    #[test]
    fn test_cfi_in_range() {
        let start = p("epubcfi(/6/4!/4/2/1:0)");
        let end = p("epubcfi(/6/4!/4/2/1:100)");
        let middle = p("epubcfi(/6/4!/4/2/1:50)");
        let outside = p("epubcfi(/6/4!/4/2/1:150)");

        assert!(is_in_range(&middle, &start, &end));
        assert!(!is_in_range(&outside, &start, &end));
    }

    #[test]
    fn test_sort_cfis() {
        let mut cfis = vec![
            p("epubcfi(/6/8!/4/2/1:50)"),
            p("epubcfi(/6/4!/4/2/1:10)"),
            p("epubcfi(/6/6!/4/2/1:30)"),
            p("epubcfi(/6/4!/4/2/1:5)"),
        ];

        sort(&mut cfis);

        let sorted: Vec<String> = cfis.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            sorted,
            vec![
                "epubcfi(/6/4!/4/2/1:5)",
                "epubcfi(/6/4!/4/2/1:10)",
                "epubcfi(/6/6!/4/2/1:30)",
                "epubcfi(/6/8!/4/2/1:50)",
            ]
        );
        for pair in cfis.windows(2) {
            assert_ne!(compare(&pair[0], &pair[1]), Ordering::Greater);
        }
    }

    #[test]
    fn test_ordering_is_antisymmetric_and_transitive() {
        let cfis: Vec<ParsedCfi> = [
            "epubcfi(/6/4!/4/2/1:10)",
            "epubcfi(/6/4!/4/2/3:1)",
            "epubcfi(/6/4!/4/4)",
            "epubcfi(/6/4!/4/2)",
            "epubcfi(/6/2!/4/10/1:7)",
        ]
        .iter()
        .map(|s| p(s))
        .collect();

        for a in &cfis {
            for b in &cfis {
                assert_eq!(compare(a, b), compare(b, a).reverse());
                for c in &cfis {
                    if compare(a, b) == Ordering::Less && compare(b, c) == Ordering::Less {
                        assert_eq!(compare(a, c), Ordering::Less);
                    }
                }
            }
        }
    }

    #[test]
    fn test_compare_strings() {
        assert_eq!(
            compare_strings("epubcfi(/6/4!/4/2/1:10)", "epubcfi(/6/4!/4/2/1:20)"),
            Some(Ordering::Less)
        );
        assert_eq!(compare_strings("invalid", "epubcfi(/6/4!/4/2)"), None);
    }
}
