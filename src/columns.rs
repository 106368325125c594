use std::collections::{BTreeMap, BTreeSet};

/// Canonical team-sheet fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlayerColumn {
    Name,
    Position,
    Heatmap,
    Nineties,
    FoulsCommittedP90,
    FoulsCommittedTotal,
    FoulsSufferedP90,
    FoulsSufferedSeasonalP90,
    YellowCards,
    NinetiesPerCard,
    FoulsPerCard,
    MinutesToFirstCard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefereeColumn {
    Name,
    AvgYellow,
}

/// One canonical field and the header spellings that may carry it.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec<C: 'static> {
    pub column: C,
    pub label: &'static str,
    pub needles: &'static [&'static str],
    pub excludes: &'static [&'static str],
    pub required: bool,
    /// Take the first column when nothing matches.
    pub first_column_fallback: bool,
}

/// Resolution order matters: a header is claimed by the first spec that
/// matches it, so the narrow ratios come before the broad counts.
pub const PLAYER_COLUMNS: &[ColumnSpec<PlayerColumn>] = &[
    ColumnSpec {
        column: PlayerColumn::NinetiesPerCard,
        label: "90s per card",
        needles: &["90s per cartellino", "90s per card", "nineties per card", "90 per card"],
        excludes: &[],
        required: false,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::FoulsPerCard,
        label: "fouls per card",
        needles: &["falli per cartellino", "fouls per card", "fouls/card"],
        excludes: &[],
        required: false,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::MinutesToFirstCard,
        label: "minutes to first card",
        needles: &[
            "ritardo cartellino",
            "minuti primo cartellino",
            "minutes to first card",
            "time to first card",
            "first card minute",
            "card delay",
        ],
        excludes: &[],
        required: false,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::FoulsSufferedSeasonalP90,
        label: "seasonal fouls suffered per 90",
        needles: &[
            "falli subiti 90s stagionale",
            "media falli subiti stagionale",
            "fouls suffered per 90 season",
            "fouls drawn per 90 season",
        ],
        excludes: &[],
        required: false,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::FoulsSufferedP90,
        label: "fouls suffered per 90",
        needles: &[
            "falli subiti 90",
            "fouls suffered per 90",
            "fouls suffered p90",
            "fouls drawn per 90",
            "fouls drawn p90",
            "fld/90",
        ],
        excludes: &["stagionale", "season"],
        required: false,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::FoulsCommittedP90,
        label: "fouls committed per 90",
        needles: &[
            "falli fatti 90",
            "fouls committed per 90",
            "fouls committed p90",
            "fouls per 90",
            "fls/90",
        ],
        excludes: &["cartellino", "card", "stagionale"],
        required: false,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::FoulsCommittedTotal,
        label: "fouls committed",
        needles: &["falli fatti totali", "falli fatti", "fouls committed", "fls"],
        excludes: &["90", "cartellino", "card", "subiti"],
        required: false,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::YellowCards,
        label: "yellow cards",
        needles: &[
            "cartellini gialli totali",
            "gialli totali",
            "cartellini gialli",
            "yellow cards",
            "yellows",
            "crdy",
        ],
        excludes: &["partita", "match", "per ", "90", "25/26", "stagion"],
        required: false,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::Nineties,
        label: "90s played",
        needles: &["90s giocati totali", "90s giocati", "90s played", "nineties played", "90s"],
        excludes: &["cartellino", "card", "falli", "fouls", "media", "avg", "25/26", "stagionale"],
        required: true,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::Position,
        label: "position",
        needles: &["posizione primaria", "posizione", "position", "pos", "ruolo", "role"],
        excludes: &["heat"],
        required: false,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::Heatmap,
        label: "heatmap",
        needles: &["heatmap", "heat map", "activity", "attività", "zona"],
        excludes: &[],
        required: false,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: PlayerColumn::Name,
        label: "player name",
        needles: &["player", "giocatore", "calciatore", "nome", "name"],
        excludes: &[],
        required: true,
        first_column_fallback: true,
    },
];

pub const REFEREE_COLUMNS: &[ColumnSpec<RefereeColumn>] = &[
    ColumnSpec {
        column: RefereeColumn::AvgYellow,
        label: "yellow cards per match",
        needles: &[
            "gialli a partita",
            "gialli ap",
            "gialli per partita",
            "media/partita",
            "yellow per match",
            "yellows per match",
            "yellow per game",
            "cards per match",
            "cards per game",
            "avg",
            "media",
        ],
        excludes: &[],
        required: true,
        first_column_fallback: false,
    },
    ColumnSpec {
        column: RefereeColumn::Name,
        label: "referee name",
        needles: &["nome", "arbitro", "referee", "name"],
        excludes: &[],
        required: true,
        first_column_fallback: true,
    },
];

/// Header index per canonical field, fixed for one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSchema<C: Ord> {
    indices: BTreeMap<C, usize>,
}

impl<C: Ord + Copy> SheetSchema<C> {
    pub fn get(&self, column: C) -> Option<usize> {
        self.indices.get(&column).copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn resolve_schema<C: Ord + Copy>(headers: &[String], specs: &[ColumnSpec<C>]) -> SheetSchema<C> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut claimed: BTreeSet<usize> = BTreeSet::new();
    let mut indices = BTreeMap::new();

    for spec in specs {
        let hit = spec.needles.iter().find_map(|needle| {
            normalized.iter().enumerate().position(|(idx, header)| {
                !claimed.contains(&idx)
                    && !header.is_empty()
                    && header.contains(needle)
                    && !spec.excludes.iter().any(|e| header.contains(e))
            })
        });
        let hit = hit.or_else(|| {
            (spec.first_column_fallback && !normalized.is_empty() && !claimed.contains(&0)).then_some(0)
        });
        if let Some(idx) = hit {
            claimed.insert(idx);
            indices.insert(spec.column, idx);
        }
    }

    SheetSchema { indices }
}

/// Label of the first required field the schema could not resolve.
pub fn missing_required<C: Ord + Copy>(
    schema: &SheetSchema<C>,
    specs: &[ColumnSpec<C>],
) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.required && schema.get(spec.column).is_none())
        .map(|spec| spec.label)
}
