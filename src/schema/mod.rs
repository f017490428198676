// Schema resolution module
// Maps CSV header names onto semantic roles via ordered candidate lists


use itertools::Itertools;

use crate::{CsvSearchError, Result};

/// One semantic role a CSV column can serve, with the header names that may
/// carry it, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct RoleSpec {
    pub role: &'static str,
    pub candidates: &'static [&'static str],
    pub required: bool,
}

/// How a projected record's text blob is assembled from resolved fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPolicy {
    /// Use a single designated field, falling back to a secondary one when
    /// the primary is blank. The primary column is kept out of metadata
    /// since its value is already the stored document.
    PrimaryWithFallback {
        primary: &'static str,
        fallback: &'static str,
    },
    /// Join every non-empty resolved field as `"<Label>: <value>"` lines in
    /// declared role order.
    LabeledJoin,
}

/// A named bundle of role specs plus the text policy that goes with them.
#[derive(Debug, Clone, Copy)]
pub struct SchemaProfile {
    pub name: &'static str,
    pub roles: &'static [RoleSpec],
    pub text_policy: TextPolicy,
}

/// Question/answer style datasets: one primary text column with a fallback.
pub static QA_PROFILE: SchemaProfile = SchemaProfile {
    name: "qa",
    roles: &[
        RoleSpec {
            role: "id",
            candidates: &["id", "person_id", "uid"],
            required: false,
        },
        RoleSpec {
            role: "question",
            candidates: &["question", "title", "name"],
            required: true,
        },
        RoleSpec {
            role: "answer",
            candidates: &["answer", "ability", "description", "skill"],
            required: true,
        },
    ],
    text_policy: TextPolicy::PrimaryWithFallback {
        primary: "answer",
        fallback: "question",
    },
};

/// Multi-field tabular datasets (people, skills, programs): every non-empty
/// field contributes a labeled line to the document.
pub static TABLE_PROFILE: SchemaProfile = SchemaProfile {
    name: "table",
    roles: &[
        RoleSpec {
            role: "id",
            candidates: &["id", "person_id", "uid"],
            required: false,
        },
        RoleSpec {
            role: "title",
            candidates: &["title", "name"],
            required: true,
        },
        RoleSpec {
            role: "skills",
            candidates: &["skills", "skill"],
            required: false,
        },
        RoleSpec {
            role: "abilities",
            candidates: &["abilities", "ability"],
            required: false,
        },
        RoleSpec {
            role: "program",
            candidates: &["program", "course", "major"],
            required: false,
        },
    ],
    text_policy: TextPolicy::LabeledJoin,
};

/// All built-in profiles, in the order they are offered to the CLI.
pub static PROFILES: &[&SchemaProfile] = &[&QA_PROFILE, &TABLE_PROFILE];

impl SchemaProfile {
    /// Look up a built-in profile by its CLI name.
    #[inline]
    pub fn by_name(name: &str) -> Option<&'static SchemaProfile> {
        PROFILES.iter().find(|p| p.name == name).copied()
    }

    #[inline]
    pub fn names() -> Vec<&'static str> {
        PROFILES.iter().map(|p| p.name).collect()
    }
}

/// A role that matched an actual CSV column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// The header exactly as written in the CSV.
    pub header: String,
    /// Position of the column in the header row.
    pub index: usize,
}

/// The outcome of resolving a profile against one CSV header row. Built once
/// per ingestion run and read-only afterward.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub profile: &'static SchemaProfile,
    columns: Vec<Option<ResolvedColumn>>,
}

impl ResolvedSchema {
    /// The column resolved for `role`, if any.
    #[inline]
    pub fn column(&self, role: &str) -> Option<&ResolvedColumn> {
        self.profile
            .roles
            .iter()
            .position(|spec| spec.role == role)
            .and_then(|i| self.columns[i].as_ref())
    }

    /// Roles paired with their resolved columns, in declared order.
    #[inline]
    pub fn resolved_roles(&self) -> impl Iterator<Item = (&'static RoleSpec, &ResolvedColumn)> {
        self.profile
            .roles
            .iter()
            .zip(self.columns.iter())
            .filter_map(|(spec, col)| col.as_ref().map(|c| (spec, c)))
    }

    /// Human-readable mapping summary for the post-ingest report, e.g.
    /// `question -> "Title", answer -> "Description"`.
    #[inline]
    pub fn describe(&self) -> String {
        self.resolved_roles()
            .map(|(spec, col)| format!("{} -> \"{}\"", spec.role, col.header))
            .join(", ")
    }
}

fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Resolve a profile's roles against the headers of a CSV file.
///
/// Headers and candidates are compared case-insensitively after trimming
/// surrounding whitespace. For each role the candidate list is walked in
/// declared priority order and the first match wins. A required role with no
/// matching header fails the whole resolution; optional roles degrade to
/// absent. Pure function of the header set and the profile.
#[inline]
pub fn resolve(headers: &[String], profile: &'static SchemaProfile) -> Result<ResolvedSchema> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

    let mut columns = Vec::with_capacity(profile.roles.len());
    for spec in profile.roles {
        let found = spec.candidates.iter().find_map(|candidate| {
            let wanted = normalize_header(candidate);
            normalized.iter().position(|h| *h == wanted)
        });

        match found {
            Some(index) => columns.push(Some(ResolvedColumn {
                header: headers[index].clone(),
                index,
            })),
            None if spec.required => {
                return Err(CsvSearchError::schema(spec.role, spec.candidates));
            }
            None => columns.push(None),
        }
    }

    Ok(ResolvedSchema { profile, columns })
}

/// Display label for a role in joined document text (`skills` -> `Skills`).
#[inline]
pub fn role_label(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
