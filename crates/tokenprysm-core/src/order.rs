//! Locale-independent natural ordering.
//!
//! All ordered output of the pipeline (group token lists, `dependencies`,
//! `aliasedBy`) is sorted with this comparison so results are reproducible
//! across platforms and locales. Embedded digit runs compare numerically,
//! so `x2` sorts before `x10`.

use std::cmp::Ordering;

/// Compare two strings with numeric-aware, byte-wise ordering.
///
/// Digit runs are compared by numeric value; when two runs denote the same
/// value, the run with fewer leading zeros sorts first. All other bytes
/// compare by raw byte value, independent of the process locale.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut i = 0;
    let mut j = 0;

    while i < a.len() && j < b.len() {
        let ca = a[i];
        let cb = b[j];

        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let run_a = digit_run(a, i);
            let run_b = digit_run(b, j);
            let ord = cmp_digit_runs(&a[i..run_a], &b[j..run_b]);
            if ord != Ordering::Equal {
                return ord;
            }
            i = run_a;
            j = run_b;
        } else {
            if ca != cb {
                return ca.cmp(&cb);
            }
            i += 1;
            j += 1;
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

/// Sort in natural ascending order and drop duplicates.
pub fn sort_unique_natural(items: &mut Vec<String>) {
    items.sort_by(|a, b| natural_cmp(a, b));
    items.dedup();
}

/// End index (exclusive) of the digit run starting at `start`.
fn digit_run(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    end
}

fn cmp_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let sig_a = trim_leading_zeros(a);
    let sig_b = trim_leading_zeros(b);

    // More significant digits means a larger value; equal lengths compare
    // digit-by-digit. Ties on value fall back to run length so that runs
    // with fewer leading zeros order first.
    sig_a
        .len()
        .cmp(&sig_b.len())
        .then_with(|| sig_a.cmp(sig_b))
        .then_with(|| a.len().cmp(&b.len()))
}

fn trim_leading_zeros(run: &[u8]) -> &[u8] {
    let first = run.iter().position(|&b| b != b'0').unwrap_or(run.len());
    &run[first..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_lt(a: &str, b: &str) {
        assert_eq!(natural_cmp(a, b), Ordering::Less, "{a:?} < {b:?}");
        assert_eq!(natural_cmp(b, a), Ordering::Greater, "{b:?} > {a:?}");
    }

    #[test]
    fn test_plain_byte_order() {
        assert_lt("a", "b");
        assert_lt("alpha", "beta");
        assert_lt("A", "a"); // byte order, not case-folded
        assert_eq!(natural_cmp("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_numeric_runs() {
        assert_lt("x2", "x10");
        assert_lt("x9", "x10");
        assert_lt("x10", "x100");
        assert_lt("color.2", "color.11");
    }

    #[test]
    fn test_prefix_order() {
        assert_lt("color", "color.red");
        assert_lt("x1", "x1a");
    }

    #[test]
    fn test_leading_zeros() {
        assert_lt("a1", "a01");
        assert_lt("a01", "a001");
        assert_lt("a01", "a2");
    }

    #[test]
    fn test_mixed_segments() {
        assert_lt("shade10a2", "shade10a11");
        assert_lt("v1.2.10", "v1.10.2");
    }

    #[test]
    fn test_huge_runs_do_not_overflow() {
        let small = format!("n{}", "9".repeat(30));
        let large = format!("n1{}", "0".repeat(30));
        assert_lt(&small, &large);
    }

    #[test]
    fn test_sort_unique() {
        let mut items = vec![
            "color.x10".to_string(),
            "color.x2".to_string(),
            "color.x10".to_string(),
            "border".to_string(),
        ];
        sort_unique_natural(&mut items);
        assert_eq!(items, ["border", "color.x2", "color.x10"]);
    }
}
