//! Pure mapping from (project, date) to the journal file path.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::config::Structure;
use crate::consts::{DATE_FORMAT, UNKNOWN};
use crate::utils::short_hash;

/// Slug assignment for every project identity seen in one cycle.
///
/// Aliases and sanitization can map different identities to the same
/// candidate slug. Every claimant of a contested slug gets a short
/// hash suffix, so the assignment depends only on the set of
/// identities, never on processing order.
#[derive(Debug, Default)]
pub(crate) struct SlugTable {
    slugs: HashMap<String, String>,
}

impl SlugTable {
    /// `projects` pairs each identity with its display name (the
    /// configured alias, or the identity itself).
    pub(crate) fn build<'a>(projects: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut claims: BTreeMap<String, BTreeSet<&'a str>> = BTreeMap::new();
        for (identity, display) in projects {
            claims
                .entry(sanitize_slug(display))
                .or_default()
                .insert(identity);
        }
        let mut slugs = HashMap::new();
        for (candidate, identities) in claims {
            let contested = identities.len() > 1;
            for identity in identities {
                let slug = if contested {
                    format!("{candidate}-{}", short_hash(identity))
                } else {
                    candidate.clone()
                };
                slugs.insert(identity.to_string(), slug);
            }
        }
        SlugTable { slugs }
    }

    pub(crate) fn slug(&self, identity: &str) -> &str {
        self.slugs.get(identity).map_or(UNKNOWN, |s| s.as_str())
    }
}

/// Lowercase, keep `[a-z0-9._-]`, map separators to `-`, drop the
/// rest, and collapse dash runs.
pub(crate) fn sanitize_slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.to_lowercase().chars() {
        let mapped = match c {
            'a'..='z' | '0'..='9' | '.' | '_' => Some(c),
            '/' | '\\' | ' ' | '-' | ':' => Some('-'),
            _ => None,
        };
        match mapped {
            Some('-') => {
                if !last_dash && !out.is_empty() {
                    out.push('-');
                    last_dash = true;
                }
            }
            Some(c) => {
                out.push(c);
                last_dash = false;
            }
            None => {}
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Total function from layout, slug, and date to the output path.
/// Same inputs always give the same path; nothing here consults the
/// filesystem.
pub(crate) fn resolve_output_path(
    repo: &Path,
    structure: Structure,
    slug: &str,
    date: NaiveDate,
) -> PathBuf {
    match structure {
        Structure::Date => repo
            .join(date.format("%Y").to_string())
            .join(date.format("%m").to_string())
            .join(date.format("%d").to_string())
            .join(format!("{slug}.md")),
        Structure::Project => repo
            .join(slug)
            .join(format!("{}.md", date.format(DATE_FORMAT))),
    }
}
