//! Display order of one tree level: INBOX first, then labels in natural,
//! case-insensitive order.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use super::element::Element;

pub(super) fn level_order(a: &Element, b: &Element) -> Ordering {
    b.is_inbox()
        .cmp(&a.is_inbox())
        .then_with(|| natural_cmp(a.label(), b.label()))
        .then_with(|| a.name().cmp(b.name()))
}

/// Compares strings so that digit runs order by value (`f2 < f10`) and
/// letters ignore case.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        let ord = match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                compare_numbers(&take_digits(&mut a), &take_digits(&mut b))
            }
            (Some(x), Some(y)) => {
                a.next();
                b.next();
                x.to_lowercase().cmp(y.to_lowercase())
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NamespaceKind;

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut elements: Vec<Element> = names
            .iter()
            .map(|n| Element::new(n, Some('/'), NamespaceKind::Personal))
            .collect();
        elements.sort_by(level_order);
        elements.into_iter().map(|e| e.name().to_string()).collect()
    }

    #[test]
    fn natural_numbers() {
        assert_eq!(natural_cmp("folder2", "folder10"), Ordering::Less);
        assert_eq!(natural_cmp("007", "7"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "ab"), Ordering::Less);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(natural_cmp("alpha", "Beta"), Ordering::Less);
        assert_eq!(natural_cmp("Zeta", "zeta"), Ordering::Equal);
    }

    #[test]
    fn inbox_first() {
        assert_eq!(
            sorted(&["Trash", "archive", "INBOX", "Folder10", "folder2"]),
            vec!["INBOX", "archive", "folder2", "Folder10", "Trash"]
        );
    }

    #[test]
    fn sorts_by_label_within_level() {
        assert_eq!(sorted(&["x/Beta", "x/alpha"]), vec!["x/alpha", "x/Beta"]);
    }
}
