//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! `${name}` placeholder substitution for outbound payload templates and
//! provider paths.

use indexmap::IndexMap;

/// Replace every `${name}` occurrence in `template` with the matching entry
/// of `replacements`. Placeholders without a replacement are left verbatim.
pub fn render(template: &str, replacements: &IndexMap<String, String>) -> String {
    let mut rendered = template.to_owned();
    for (name, value) in replacements {
        rendered = rendered.replace(&format!("${{{name}}}"), value);
    }
    rendered
}

/// Names of all `${name}` placeholders in `template`, in order of first
/// occurrence, without duplicates.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                if !name.is_empty() && !names.iter().any(|n| n == name) {
                    names.push(name.to_owned());
                }
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_occurrences() {
        let replacements = IndexMap::from([("value".to_owned(), "5".to_owned())]);
        assert_eq!(
            render("{\"a\": ${value}, \"b\": ${value}}", &replacements),
            "{\"a\": 5, \"b\": 5}"
        );
    }

    #[test]
    fn unmatched_placeholders_stay_verbatim() {
        let replacements = IndexMap::from([("x".to_owned(), "1".to_owned())]);
        assert_eq!(render("${x}/${y}", &replacements), "1/${y}");
    }

    #[test]
    fn placeholder_scan_is_ordered_and_deduplicated() {
        assert_eq!(
            placeholders("/op/${id}?x=${x}&again=${id}"),
            vec!["id".to_owned(), "x".to_owned()]
        );
        assert!(placeholders("no placeholders, ${ unterminated").is_empty());
    }
}
