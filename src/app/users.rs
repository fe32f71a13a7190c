//! Participating user resolution
//!
//! Joins the catalog's account list with the configured user profiles. The
//! server owner always takes part; other accounts take part when a profile
//! names them, or when unlisted users are included.

use tracing::{debug, warn};

use crate::app::models::{CatalogUser, UserContext, UserProfile};

fn profile_for<'a>(user: &CatalogUser, profiles: &'a [UserProfile]) -> Option<&'a UserProfile> {
    profiles
        .iter()
        .find(|p| p.name == user.id || p.name.eq_ignore_ascii_case(&user.name))
}

/// Users taking part in this run, in catalog order
pub fn resolve_users(
    catalog_users: &[CatalogUser],
    profiles: &[UserProfile],
    include_unlisted_users: bool,
) -> Vec<UserContext> {
    let mut users = Vec::new();

    for user in catalog_users {
        let profile = profile_for(user, profiles);
        if profile.is_none() && !user.is_owner && !include_unlisted_users {
            debug!("User {} has no profile, not participating", user.name);
            continue;
        }
        users.push(UserContext::from_catalog(user, profile));
    }

    for profile in profiles {
        let known = catalog_users
            .iter()
            .any(|u| u.id == profile.name || u.name.eq_ignore_ascii_case(&profile.name));
        if !known {
            warn!("Configured user {} is not known to the catalog", profile.name);
        }
    }

    users
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, name: &str, is_owner: bool) -> CatalogUser {
        CatalogUser {
            id: id.to_string(),
            name: name.to_string(),
            is_owner,
            is_remote: !is_owner,
        }
    }

    #[test]
    fn test_owner_always_participates() {
        let accounts = vec![account("1", "Owner", true), account("2", "Kid", false)];

        let users = resolve_users(&accounts, &[], false);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Owner");

        let users = resolve_users(&accounts, &[], true);
        assert_eq!(users.len(), 2);
    }

    /// Test profile matching
    ///
    /// Profiles match by id or case-insensitive name and carry their flags
    /// into the context.
    #[test]
    fn test_profiles_apply() {
        let accounts = vec![account("1", "Owner", true), account("2", "Kid", false)];
        let mut kid = UserProfile::new("kid");
        kid.count_for_eviction = false;
        let mut owner = UserProfile::new("1");
        owner.watchlist = false;

        let users = resolve_users(&accounts, &[kid, owner, UserProfile::new("ghost")], false);

        assert_eq!(users.len(), 2);
        assert!(!users[0].watchlist);
        assert!(users[0].count_for_eviction);
        assert_eq!(users[1].name, "Kid");
        assert!(!users[1].count_for_eviction);
    }
}
