use serde::Serialize;
use utoipa::ToSchema;

/// Qualification rules and lock status the prediction UI needs for one
/// tournament.
#[derive(Debug, Serialize, ToSchema)]
pub struct QualificationConfigResponse {
    /// Whether third-placed teams may qualify at all.
    pub allows_third_place: bool,
    /// Tournament-wide cap on third-placed qualifiers.
    pub max_third_place: u32,
    /// Whether the editing window has closed.
    pub is_locked: bool,
}
