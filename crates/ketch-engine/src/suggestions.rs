//! "Did you mean" suggestions for unknown names
//!
//! Component types and parameter names are short identifiers, so plain
//! Levenshtein distance with a small cutoff is enough.

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Closest candidate to `input`, if any is within range
pub fn closest_match<'a, I>(input: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .map(|candidate| (strsim::levenshtein(input, candidate), candidate))
        .filter(|(distance, _)| *distance > 0 && *distance <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}

/// Help text for a component type missing from the registry
pub fn suggest_component_type<'a, I>(component_type: &str, registered: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let registered: Vec<&str> = registered.into_iter().collect();
    if let Some(candidate) = closest_match(component_type, registered.iter().copied()) {
        return format!("Did you mean `{}`?", candidate);
    }
    if registered.is_empty() {
        "No components are registered, create a Component resource first".to_string()
    } else {
        format!("Registered components: {}", registered.join(", "))
    }
}

/// Help text for a required parameter the link does not supply
pub fn suggest_property<'a, I>(parameter: &str, supplied: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    closest_match(parameter, supplied)
        .map(|candidate| format!("The link sets `{}`, did you mean `{}`?", candidate, parameter))
}
