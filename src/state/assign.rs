//! Random content generation shared by the per-variant rules.

use rand::{Rng, seq::IndexedRandom, seq::SliceRandom};
use thiserror::Error;

use crate::state::{
    content::MafiaRole,
    game::{SeatIndex, Symbol, Word},
};

/// Pools the assigners draw secret content from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPools {
    pub impostor_words: Vec<Word>,
    pub charades_words: Vec<Word>,
    pub characters: Vec<Word>,
    pub casino_palette: Vec<Symbol>,
}

/// A content pool required by the variant has no entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("content pool `{0}` is empty")]
pub struct SourceEmpty(pub &'static str);

/// Number of mafia seats for a table of `capacity`.
pub fn team_size(capacity: u32) -> u32 {
    match capacity {
        0..=6 => 1,
        7..=9 => 2,
        10..=12 => 3,
        _ => capacity / 4,
    }
}

/// Deal `mafia` mafia roles and civilians for the rest, shuffled onto seats.
pub fn partition_teams<R: Rng + ?Sized>(capacity: u32, mafia: u32, rng: &mut R) -> Vec<MafiaRole> {
    let mafia = mafia.min(capacity) as usize;
    let mut roles = vec![MafiaRole::Civilian; capacity as usize];
    roles[..mafia].fill(MafiaRole::Mafia);
    roles.shuffle(rng);
    roles
}

/// Uniformly pick a seat, avoiding `exclude` whenever another seat exists.
pub fn pick_seat<R: Rng + ?Sized>(
    capacity: u32,
    exclude: Option<SeatIndex>,
    rng: &mut R,
) -> SeatIndex {
    match exclude {
        Some(excluded) if capacity > 1 && excluded < capacity => {
            // Draw among the other `capacity - 1` seats and skip over the excluded one.
            let drawn = rng.random_range(0..capacity - 1);
            if drawn >= excluded { drawn + 1 } else { drawn }
        }
        _ => rng.random_range(0..capacity.max(1)),
    }
}

/// Draw one entry of `pool`, labelled `name` in the error when empty.
pub fn draw_word<R: Rng + ?Sized>(
    pool: &[Word],
    name: &'static str,
    rng: &mut R,
) -> Result<Word, SourceEmpty> {
    pool.choose(rng).cloned().ok_or(SourceEmpty(name))
}

/// Like [`draw_word`] but avoids repeating `previous` when the pool allows it.
pub fn draw_fresh_word<R: Rng + ?Sized>(
    pool: &[Word],
    name: &'static str,
    previous: Option<&Word>,
    rng: &mut R,
) -> Result<Word, SourceEmpty> {
    let candidates: Vec<&Word> = pool
        .iter()
        .filter(|word| Some(*word) != previous)
        .collect();
    match candidates.choose(rng) {
        Some(word) => Ok((*word).clone()),
        None => draw_word(pool, name, rng),
    }
}

/// Give every seat a symbol from a shuffled palette, wrapping when seats outnumber symbols.
pub fn deal_symbols<R: Rng + ?Sized>(
    capacity: u32,
    palette: &[Symbol],
    rng: &mut R,
) -> Result<Vec<Symbol>, SourceEmpty> {
    if palette.is_empty() {
        return Err(SourceEmpty("casino_palette"));
    }
    let mut shuffled = palette.to_vec();
    shuffled.shuffle(rng);
    Ok((0..capacity as usize)
        .map(|seat| shuffled[seat % shuffled.len()].clone())
        .collect())
}

/// Number of symbols in a casino combination.
pub fn combination_length(capacity: u32) -> usize {
    match capacity {
        0..=3 => 1,
        4 => 2,
        _ => 3,
    }
}

/// Draw a combination, with replacement, from the symbols of every seat but the guesser.
pub fn draw_combination<R: Rng + ?Sized>(
    symbols: &[Symbol],
    guesser: SeatIndex,
    rng: &mut R,
) -> Vec<Symbol> {
    let available: Vec<&Symbol> = symbols
        .iter()
        .enumerate()
        .filter(|(seat, _)| *seat as SeatIndex != guesser)
        .map(|(_, symbol)| symbol)
        .collect();
    if available.is_empty() {
        return Vec::new();
    }
    (0..combination_length(symbols.len() as u32))
        .filter_map(|_| available.choose(rng).map(|symbol| (*symbol).clone()))
        .collect()
}
