//! Attribute rules applied when embedded scripts set element attributes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrAction {
    /// Keep the attribute with an empty value.
    Blank,
    /// Drop the attribute.
    Remove,
}

/// The rule for attribute `name`, if any.
pub fn attribute_rule(name: &str) -> Option<AttrAction> {
    match name.to_ascii_lowercase().as_str() {
        "integrity" => Some(AttrAction::Blank),
        "nonce" | "csp" | "credentialless" => Some(AttrAction::Remove),
        _ => None,
    }
}

/// Attributes whose values are URLs.
pub fn is_url_attribute(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "src" | "href" | "action" | "formaction" | "poster" | "data"
    )
}

/// Inline event handler attributes (`onclick`, `onload`, ...).
pub fn is_event_attribute(name: &str) -> bool {
    name.len() > 2 && name.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("on"))
}
