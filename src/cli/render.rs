//! Output formatting for lookup results

use anyhow::Result;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::core::model::{Character, LocationRef};
use crate::core::seek::Lookup;
use crate::remote::Catalog;

const UNKNOWN: &str = "unknown";

#[derive(Tabled)]
struct CharacterRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Species")]
    species: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Gender")]
    gender: String,
    #[tabled(rename = "Location of origin")]
    origin: String,
    #[tabled(rename = "Last known location")]
    location: String,
}

/// One character name per line
pub fn names(characters: &[Character]) -> String {
    characters
        .iter()
        .map(|c| format!("{}\n", c.name))
        .collect()
}

/// Character table; unnamed location references are resolved through `lookup`
pub async fn table<C: Catalog>(lookup: &Lookup<'_, C>, characters: &[Character]) -> Result<String> {
    let mut rows = Vec::with_capacity(characters.len());
    for c in characters {
        rows.push(CharacterRow {
            name: c.name.clone(),
            status: c.status.clone(),
            species: c.species.clone(),
            kind: c.kind.clone(),
            gender: c.gender.clone(),
            origin: place(lookup, c.origin.as_ref()).await?,
            location: place(lookup, c.location.as_ref()).await?,
        });
    }

    Ok(Table::new(rows).with(Style::modern()).to_string())
}

async fn place<C: Catalog>(lookup: &Lookup<'_, C>, reference: Option<&LocationRef>) -> Result<String> {
    let Some(reference) = reference else {
        return Ok(UNKNOWN.to_string());
    };
    if let Some(name) = &reference.name {
        return Ok(name.clone());
    }

    Ok(lookup
        .resolve_location(reference.remote_id)
        .await?
        .map(|l| l.name)
        .unwrap_or_else(|| UNKNOWN.to_string()))
}
