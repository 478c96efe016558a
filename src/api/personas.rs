use axum::{extract::Path, http::StatusCode, Json};

use super::types::{PersonaDetail, PersonaSummary};
use crate::markup;
use crate::persona;

pub async fn list_personas() -> Json<Vec<PersonaSummary>> {
    Json(persona::roster().iter().map(PersonaSummary::from).collect())
}

pub async fn get_persona(
    Path(name): Path<String>,
) -> Result<Json<PersonaDetail>, (StatusCode, String)> {
    let persona = persona::find(&name)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown persona: {}", name)))?;
    let blocks = markup::parse_blocks(&persona.bio);
    let bio_html = markup::render_html(&blocks);
    Ok(Json(PersonaDetail {
        name: persona.name,
        role: persona.role,
        focus_areas: persona.focus_areas,
        blocks,
        bio_html,
    }))
}
