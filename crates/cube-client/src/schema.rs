//! Condensed view of a schema description.

use serde::Serialize;
use serde_json::Value;

use crate::response::ErrorPayload;

/// A measure or dimension as presented to end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub name: Option<String>,
    /// `shortTitle` when present, otherwise `title`.
    pub title: Option<String>,
    pub description: Option<String>,
}

/// One cube with its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CubeSummary {
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub dimensions: Vec<MemberSummary>,
    pub measures: Vec<MemberSummary>,
}

/// The cubes available from a backend, stripped down to names, titles and
/// descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaSummary {
    pub cubes: Vec<CubeSummary>,
}

impl SchemaSummary {
    /// Summarize a `/meta` payload.
    ///
    /// Returns the backend error instead when the payload is error-shaped.
    pub fn from_meta(meta: &Value) -> Result<Self, ErrorPayload> {
        if let Some(error) = ErrorPayload::from_response(meta) {
            return Err(error);
        }

        let cubes = items(meta, "cubes")
            .map(|cube| CubeSummary {
                name: text(cube, "name"),
                title: text(cube, "title"),
                description: text(cube, "description"),
                dimensions: items(cube, "dimensions").map(member).collect(),
                measures: items(cube, "measures").map(member).collect(),
            })
            .collect();

        Ok(Self { cubes })
    }

    /// Names of every measure across all cubes.
    pub fn measure_names(&self) -> impl Iterator<Item = &str> {
        self.cubes
            .iter()
            .flat_map(|cube| cube.measures.iter())
            .filter_map(|m| m.name.as_deref())
    }

    /// Names of every dimension across all cubes.
    pub fn dimension_names(&self) -> impl Iterator<Item = &str> {
        self.cubes
            .iter()
            .flat_map(|cube| cube.dimensions.iter())
            .filter_map(|d| d.name.as_deref())
    }
}

fn member(value: &Value) -> MemberSummary {
    MemberSummary {
        name: text(value, "name"),
        title: text(value, "shortTitle").or_else(|| text(value, "title")),
        description: text(value, "description"),
    }
}

fn items<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
