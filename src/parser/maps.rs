//! Lookup tables for map identifiers and their overlay URLs.
//!
//! Both tables are incomplete by nature: the client ships new maps over
//! time. Unknown ids pass through as their own display name and unknown
//! display names resolve to [`DEFAULT_OVERLAY_URL`].

/// Internal location id (lowercase) -> display name.
const MAP_NAMES: &[(&str, &str)] = &[
    ("bigmap", "Customs"),
    ("factory4_day", "Factory"),
    ("factory4_night", "Night Factory"),
    ("woods", "Woods"),
    ("shoreline", "Shoreline"),
    ("interchange", "Interchange"),
    ("rezervbase", "Reserve"),
    ("laboratory", "The Lab"),
    ("lighthouse", "Lighthouse"),
    ("tarkovstreets", "Streets of Tarkov"),
    ("sandbox", "Ground Zero"),
    ("sandbox_high", "Ground Zero 21+"),
    ("labyrinth", "The Labyrinth"),
];

/// Display name (lowercase) -> URL path segment.
const OVERLAY_SEGMENTS: &[(&str, &str)] = &[
    ("customs", "customs"),
    ("factory", "factory"),
    ("night factory", "factory"),
    ("woods", "woods"),
    ("shoreline", "shoreline"),
    ("interchange", "interchange"),
    ("reserve", "reserve"),
    ("the lab", "the-lab"),
    ("lighthouse", "lighthouse"),
    ("streets of tarkov", "streets-of-tarkov"),
    ("ground zero", "ground-zero"),
    ("ground zero 21+", "ground-zero"),
    ("the labyrinth", "the-labyrinth"),
];

pub const OVERLAY_BASE_URL: &str = "https://tarkov.dev/map/";
pub const DEFAULT_OVERLAY_URL: &str = "https://tarkov.dev/maps";

/// Translate an internal location id into its display name.
/// `id` is matched case-insensitively; unknown ids are returned unchanged.
pub fn display_name(id: &str) -> String {
    let lower = id.to_lowercase();
    MAP_NAMES
        .iter()
        .find(|(known, _)| *known == lower)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| id.to_string())
}

/// Overlay URL for a map display name.
pub fn overlay_url(display_name: &str) -> String {
    let lower = display_name.to_lowercase();
    OVERLAY_SEGMENTS
        .iter()
        .find(|(known, _)| *known == lower)
        .map(|(_, segment)| format!("{OVERLAY_BASE_URL}{segment}"))
        .unwrap_or_else(|| DEFAULT_OVERLAY_URL.to_string())
}
