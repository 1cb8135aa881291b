use crate::types::{AccountKind, Entity, FilterCriteria};

/// True when `entity` passes every criterion. Evaluated before any cache or extraction work.
pub fn accepts(entity: &Entity, criteria: &FilterCriteria) -> bool {
    if let Some(min) = criteria.min_followers
        && entity.followers < min
    {
        return false;
    }
    match criteria.account_kind {
        AccountKind::BusinessOnly if !entity.is_business => return false,
        AccountKind::NonBusinessOnly if entity.is_business => return false,
        _ => {}
    }
    if criteria.verified_only && !entity.is_verified {
        return false;
    }
    if let Some(needle) = criteria.text_filter.as_deref()
        && !needle.is_empty()
        && !entity
            .biography
            .to_lowercase()
            .contains(&needle.to_lowercase())
    {
        return false;
    }
    true
}
