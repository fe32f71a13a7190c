//! Selection pass fingerprint
//!
//! A [`Fingerprint`] is the MD5 of a canonical JSON encoding of everything that
//! changes the outcome of a selection pass: the participating users as resolved
//! against the catalog, the lookahead settings, the library selection and the
//! global user skip list. A user joining or leaving the catalog therefore
//! changes the fingerprint just like a configuration edit does.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::app::models::UserContext;
use crate::app::selection::SelectionSettings;

/// 16-byte MD5 fingerprint, displayed and serialized as lowercase hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 16]);

/// Everything a fingerprint covers
#[derive(Debug, Clone, Copy)]
pub struct FingerprintInput<'a> {
    /// Participating users, resolved from the catalog and the profiles
    pub users: &'a [UserContext],
    /// Lookahead, library selection and global skip list
    pub selection: &'a SelectionSettings,
}

#[derive(Serialize)]
struct CanonicalUser {
    id: String,
    name: String,
    on_deck: bool,
    watchlist: bool,
    count_for_eviction: bool,
    skip_titles: Vec<String>,
}

#[derive(Serialize)]
struct Canonical {
    users: Vec<CanonicalUser>,
    on_deck_count: usize,
    watchlist_count: usize,
    max_age_days: Option<u32>,
    libraries: Vec<String>,
    skip_users: Vec<String>,
}

fn sorted_lowercase(values: &[String]) -> Vec<String> {
    let mut values: Vec<String> = values.iter().map(|v| v.to_lowercase()).collect();
    values.sort();
    values.dedup();
    values
}

impl Fingerprint {
    /// Compute the fingerprint of a selection pass
    ///
    /// Users, libraries and skip lists are hashed as sets: they are sorted
    /// (users by catalog id) before encoding, because candidate selection
    /// unions per-user contributions and the outcome does not depend on the
    /// order users or libraries are listed in.
    pub fn compute(input: &FingerprintInput<'_>) -> Self {
        let mut users: Vec<CanonicalUser> = input
            .users
            .iter()
            .map(|user| CanonicalUser {
                id: user.id.clone(),
                name: user.name.to_lowercase(),
                on_deck: user.on_deck,
                watchlist: user.watchlist,
                count_for_eviction: user.count_for_eviction,
                skip_titles: sorted_lowercase(&user.skip_titles),
            })
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));

        let mut libraries = input.selection.libraries.clone();
        libraries.sort();
        libraries.dedup();

        let canonical = Canonical {
            users,
            on_deck_count: input.selection.lookahead.on_deck_count,
            watchlist_count: input.selection.lookahead.watchlist_count,
            max_age_days: input.selection.lookahead.max_age_days,
            libraries,
            skip_users: sorted_lowercase(&input.selection.skip_users),
        };

        // Plain structs of strings, bools and integers always serialize
        let encoded = serde_json::to_vec(&canonical).unwrap_or_default();
        Fingerprint(md5::compute(encoded).0)
    }

    /// Parse a 32-character hex string
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 32 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let mut bytes = [0u8; 16];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).ok()?;
            bytes[i] = u8::from_str_radix(pair, 16).ok()?;
        }
        Some(Fingerprint(bytes))
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fingerprint::from_hex(s).ok_or_else(|| format!("Invalid fingerprint: {}", s))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{CatalogUser, UserProfile};
    use crate::app::selection::Lookahead;

    fn user(id: &str, name: &str) -> UserContext {
        user_with(id, UserProfile::new(name))
    }

    fn user_with(id: &str, profile: UserProfile) -> UserContext {
        let account = CatalogUser {
            id: id.to_string(),
            name: profile.name.clone(),
            is_owner: id == "1",
            is_remote: false,
        };
        UserContext::from_catalog(&account, Some(&profile))
    }

    fn settings() -> SelectionSettings {
        SelectionSettings {
            libraries: vec!["TV Shows".to_string(), "Movies".to_string()],
            lookahead: Lookahead {
                on_deck_count: 2,
                watchlist_count: 5,
                max_age_days: Some(183),
            },
            skip_users: vec!["Guest".to_string()],
        }
    }

    fn fingerprint(users: &[UserContext], selection: &SelectionSettings) -> Fingerprint {
        Fingerprint::compute(&FingerprintInput { users, selection })
    }

    /// Test fingerprint stability
    ///
    /// Reordering users, libraries or skip lists does not change the
    /// fingerprint.
    #[test]
    fn test_fingerprint_ignores_ordering() {
        let users = vec![user("1", "alice"), user("2", "bob")];
        let reversed = vec![user("2", "bob"), user("1", "alice")];
        let mut reordered = settings();
        reordered.libraries.reverse();

        assert_eq!(
            fingerprint(&users, &settings()),
            fingerprint(&reversed, &reordered)
        );
    }

    /// Test fingerprint sensitivity
    ///
    /// Any lookahead, library, or per-user flag change yields a new fingerprint.
    #[test]
    fn test_fingerprint_changes_with_parameters() {
        let users = vec![user("1", "alice")];
        let base = fingerprint(&users, &settings());

        let mut lookahead = settings();
        lookahead.lookahead.on_deck_count = 3;
        assert_ne!(base, fingerprint(&users, &lookahead));

        let mut libraries = settings();
        libraries.libraries.pop();
        assert_ne!(base, fingerprint(&users, &libraries));

        let mut profile = UserProfile::new("alice");
        profile.count_for_eviction = false;
        assert_ne!(base, fingerprint(&[user_with("1", profile)], &settings()));
    }

    /// Test a new participant
    ///
    /// A user appearing in the catalog changes the fingerprint even though
    /// no configuration changed.
    #[test]
    fn test_fingerprint_changes_when_user_joins() {
        let owner = user("1", "alice");
        let base = fingerprint(std::slice::from_ref(&owner), &settings());

        let joined = vec![owner, user("7", "friend")];
        assert_ne!(base, fingerprint(&joined, &settings()));
    }

    #[test]
    fn test_hex_round_trip() {
        let fp = fingerprint(&[user("1", "alice")], &settings());
        let hex = fp.to_hex();

        assert_eq!(hex.len(), 32);
        assert_eq!(hex.parse::<Fingerprint>().unwrap(), fp);
        assert_eq!(
            serde_json::from_str::<Fingerprint>(&serde_json::to_string(&fp).unwrap()).unwrap(),
            fp
        );
        assert!(Fingerprint::from_hex("xyz").is_none());
    }
}
