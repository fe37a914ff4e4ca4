//! Final pass over enriched leads: keep reachable ones, cap to the requested count.
//!
//! Input order is the pool's completion order, so which leads survive the cap
//! depends on enrichment timing. Callers must not rely on a stable ordering.

use metrics::counter;

use crate::lead::Lead;

pub fn prioritize(leads: Vec<Lead>, limit: usize) -> Vec<Lead> {
    let out: Vec<Lead> = leads
        .into_iter()
        .filter(Lead::has_contact_channel)
        .take(limit)
        .collect();
    counter!("leads_prioritized_total").increment(out.len() as u64);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::Location;

    fn lead(name: &str, phone: Option<&str>, email: Option<&str>) -> Lead {
        let mut l = Lead::new(name, Location::default());
        l.phone = phone.map(str::to_string);
        l.email = email.map(str::to_string);
        l
    }

    #[test]
    fn drops_unreachable_and_truncates() {
        let input = vec![
            lead("a", None, None),
            lead("b", Some("(512) 555-0100"), None),
            lead("c", None, Some("c@c.com")),
            lead("d", Some("(512) 555-0101"), Some("d@d.com")),
        ];
        let out = prioritize(input, 2);
        let names: Vec<_> = out.iter().map(|l| l.practice_name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn limit_larger_than_input() {
        let out = prioritize(vec![lead("x", Some("(512) 555-0100"), None)], 50);
        assert_eq!(out.len(), 1);
    }
}
