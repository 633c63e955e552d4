//! Version Ordering
//!
//! rpm-style comparison: versions split into alternating numeric and
//! alphabetic segments, numeric segments compare as integers, separators
//! only delimit. Comparator prefixes (`>= > == = != <= <`) parse into the
//! requirement checks used by dependency and meson_version constraints.

use std::cmp::Ordering;

fn segments(s: &str) -> Vec<(bool, String)> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            let mut seg = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() {
                    seg.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            out.push((true, seg));
        } else if c.is_ascii_alphabetic() {
            let mut seg = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphabetic() {
                    seg.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            out.push((false, seg));
        } else {
            // '.', '-' and anything else only separate segments.
            chars.next();
        }
    }
    out
}

/// Total order over version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    let sa = segments(a);
    let sb = segments(b);
    for i in 0..sa.len().max(sb.len()) {
        match (sa.get(i), sb.get(i)) {
            (Some((na, va)), Some((nb, vb))) => {
                let ord = match (na, nb) {
                    (true, true) => {
                        let x: u64 = va.trim_start_matches('0').parse().unwrap_or(0);
                        let y: u64 = vb.trim_start_matches('0').parse().unwrap_or(0);
                        x.cmp(&y)
                    }
                    // A numeric segment outranks an alphabetic one.
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => va.cmp(vb),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => unreachable!(),
        }
    }
    Ordering::Equal
}

/// Split a constraint like ">= 1.2" into its operator and bare version.
fn split_constraint(raw: &str) -> (&str, &str) {
    let raw = raw.trim();
    for op in [">=", "==", "!=", "<=", ">", "<", "="] {
        if let Some(rest) = raw.strip_prefix(op) {
            return (op, rest.trim());
        }
    }
    ("==", raw)
}

/// Check `version` against a single constraint string.
pub fn check_constraint(version: &str, constraint: &str) -> bool {
    let (op, want) = split_constraint(constraint);
    let ord = compare(version, want);
    match op {
        ">=" => ord != Ordering::Less,
        ">" => ord == Ordering::Greater,
        "==" | "=" => ord == Ordering::Equal,
        "!=" => ord != Ordering::Equal,
        "<=" => ord != Ordering::Greater,
        "<" => ord == Ordering::Less,
        _ => unreachable!(),
    }
}

/// Check `version` against every constraint in the list.
pub fn check_all(version: &str, constraints: &[String]) -> bool {
    constraints.iter().all(|c| check_constraint(version, c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_ordering() {
        assert_eq!(compare("1.0", "1.0"), Ordering::Equal);
        assert_eq!(compare("1.0", "1.1"), Ordering::Less);
        assert_eq!(compare("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare("2.0", "10.0"), Ordering::Less);
    }

    #[test]
    fn test_alpha_segments() {
        assert_eq!(compare("1.0a", "1.0b"), Ordering::Less);
        // Numeric beats alphabetic.
        assert_eq!(compare("1.0.1", "1.0a"), Ordering::Greater);
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(compare("1.01", "1.1"), Ordering::Equal);
    }

    #[test]
    fn test_antisymmetry() {
        let pairs = [("1.2.3", "1.2.4"), ("2.0", "2.0"), ("0.9-rc1", "0.9")];
        for (a, b) in pairs {
            assert_eq!(compare(a, b), compare(b, a).reverse());
        }
    }

    #[test]
    fn test_constraints() {
        assert!(check_constraint("1.2.0", ">= 1.0"));
        assert!(check_constraint("1.2.0", ">=1.2.0"));
        assert!(!check_constraint("1.2.0", "> 1.2.0"));
        assert!(check_constraint("1.2.0", "!= 1.3"));
        assert!(check_constraint("1.2.0", "< 2"));
        // Bare version means equality.
        assert!(check_constraint("1.2.0", "1.2.0"));
        assert!(!check_constraint("1.2.0", "1.2.1"));
    }

    #[test]
    fn test_check_all() {
        let cs = vec![">= 1.0".to_string(), "< 2.0".to_string()];
        assert!(check_all("1.5", &cs));
        assert!(!check_all("2.1", &cs));
    }
}
