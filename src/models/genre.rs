/// Closed set of literary-genre labels offered to the model when genre
/// detection is enabled.
///
/// A genre tag is allowed in addition to the thematic vocabulary and does not
/// count against the thematic tag bounds.
pub const LITERARY_GENRES: [&str; 31] = [
    "poesia",
    "prosa_poetica",
    "diario",
    "ensayo",
    "relato",
    "cuento",
    "microcuento",
    "novela_corta",
    "cronica",
    "carta",
    "epistolario",
    "aforismo",
    "nota",
    "fragmento",
    "memorias",
    "autobiografia",
    "biografia",
    "testimonio",
    "dialogo",
    "monologo",
    "teatro_breve",
    "escena",
    "guion",
    "haiku",
    "tanka",
    "soneto",
    "oda",
    "elegia",
    "satira",
    "epigrama",
    "romance",
];

/// Returns `true` if `tag` is one of the [`LITERARY_GENRES`] (case-sensitive).
pub fn is_literary_genre(tag: &str) -> bool {
    LITERARY_GENRES.contains(&tag)
}
